//! Storage Trait
//!
//! This module defines the `Storage` trait, the interface the web handlers use
//! to reach account and message records.
//!
//! Every method is atomic with respect to the collection it touches. Callers
//! that need several calls to appear atomic must serialize them themselves.

use crate::error_handling::types::StorageError;
use crate::storage::types::{Message, User};
use chrono::{DateTime, Utc};

pub trait Storage: Send + Sync {
    /// Inserts a new account.
    ///
    /// Fails with `StorageError::Conflict` when the username is taken.
    fn insert_user(&self, user: User) -> Result<(), StorageError>;

    /// Returns a copy of the account record.
    fn get_user(&self, username: &str) -> Result<User, StorageError>;

    /// Removes and returns the account record.
    fn remove_user(&self, username: &str) -> Result<User, StorageError>;

    /// Stamps `last_login` on the account and returns the updated record.
    fn record_login(&self, username: &str, at: DateTime<Utc>) -> Result<User, StorageError>;

    fn user_count(&self) -> Result<usize, StorageError>;

    /// Appends a message at the end of the log.
    fn append_message(&self, message: Message) -> Result<(), StorageError>;

    /// Returns up to `limit` messages starting at `offset`, in insertion order.
    fn list_messages(&self, limit: usize, offset: usize) -> Result<Vec<Message>, StorageError>;

    fn message_count(&self) -> Result<usize, StorageError>;
}
