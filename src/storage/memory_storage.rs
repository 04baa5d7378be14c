use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::error_handling::types::StorageError;
use crate::storage::storage_trait::Storage;
use crate::storage::types::{Message, User};

/// `Storage` backed by process memory.
pub struct MemoryStorage {
    users: RwLock<HashMap<String, User>>,
    messages: RwLock<Vec<Message>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        info!("MemoryStorage initialized");
        Self {
            users: RwLock::new(HashMap::new()),
            messages: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn insert_user(&self, user: User) -> Result<(), StorageError> {
        let mut users = self.users.write().map_err(|_| StorageError::LockPoisoned)?;
        if users.contains_key(&user.username) {
            return Err(StorageError::Conflict(user.username));
        }
        debug!("Inserted user {}", user.username);
        users.insert(user.username.clone(), user);
        Ok(())
    }

    fn get_user(&self, username: &str) -> Result<User, StorageError> {
        let users = self.users.read().map_err(|_| StorageError::LockPoisoned)?;
        users
            .get(username)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(username.to_string()))
    }

    fn remove_user(&self, username: &str) -> Result<User, StorageError> {
        let mut users = self.users.write().map_err(|_| StorageError::LockPoisoned)?;
        let removed = users
            .remove(username)
            .ok_or_else(|| StorageError::NotFound(username.to_string()))?;
        debug!("Removed user {}", username);
        Ok(removed)
    }

    fn record_login(&self, username: &str, at: DateTime<Utc>) -> Result<User, StorageError> {
        let mut users = self.users.write().map_err(|_| StorageError::LockPoisoned)?;
        let user = users
            .get_mut(username)
            .ok_or_else(|| StorageError::NotFound(username.to_string()))?;
        user.last_login = Some(at);
        Ok(user.clone())
    }

    fn user_count(&self) -> Result<usize, StorageError> {
        Ok(self.users.read().map_err(|_| StorageError::LockPoisoned)?.len())
    }

    fn append_message(&self, message: Message) -> Result<(), StorageError> {
        let mut messages = self.messages.write().map_err(|_| StorageError::LockPoisoned)?;
        debug!("Appending message {} ({} -> {})", message.id, message.sender, message.recipient);
        messages.push(message);
        Ok(())
    }

    fn list_messages(&self, limit: usize, offset: usize) -> Result<Vec<Message>, StorageError> {
        let messages = self.messages.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(messages.iter().skip(offset).take(limit).cloned().collect())
    }

    fn message_count(&self) -> Result<usize, StorageError> {
        Ok(self.messages.read().map_err(|_| StorageError::LockPoisoned)?.len())
    }
}
