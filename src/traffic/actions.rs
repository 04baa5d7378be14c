use serde::{Deserialize, Serialize};
use std::fmt;

/// One HTTP call the traffic client knows how to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    HealthCheck,
    Root,
    Register,
    Login,
    Logout,
    GetUser,
    DeleteUser,
    SendMessage,
    ReadMessages,
    Search,
    GetData,
    GetLargeData,
    UploadMetadata,
    Echo,
}

impl Action {
    pub const ALL: [Action; 14] = [
        Action::HealthCheck,
        Action::Root,
        Action::Register,
        Action::Login,
        Action::Logout,
        Action::GetUser,
        Action::DeleteUser,
        Action::SendMessage,
        Action::ReadMessages,
        Action::Search,
        Action::GetData,
        Action::GetLargeData,
        Action::UploadMetadata,
        Action::Echo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Action::HealthCheck => "health_check",
            Action::Root => "root",
            Action::Register => "register",
            Action::Login => "login",
            Action::Logout => "logout",
            Action::GetUser => "get_user",
            Action::DeleteUser => "delete_user",
            Action::SendMessage => "send_message",
            Action::ReadMessages => "read_messages",
            Action::Search => "search",
            Action::GetData => "get_data",
            Action::GetLargeData => "get_large_data",
            Action::UploadMetadata => "upload_metadata",
            Action::Echo => "echo",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
