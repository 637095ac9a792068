use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Avatar shown when a sender or contact has no profile image
pub const PLACEHOLDER_AVATAR: &str = "/placeholder.svg?height=40&width=40";
/// Display name used on messages whose sender has no name
pub const ANONYMOUS_NAME: &str = "Anonymous";
/// Label rendered in place of the time of an unacknowledged message
pub const SENDING_LABEL: &str = "Sending...";

/// How the current session was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    Password,
    Google,
    Github,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Password => write!(f, "email and password"),
            Provider::Google => write!(f, "Google"),
            Provider::Github => write!(f, "GitHub"),
        }
    }
}

/// Identity of the signed-in user, as reported by the identity backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub uid: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub email: Option<String>,
    pub provider: Provider,
}

impl Session {
    pub fn new(uid: &str, provider: Provider) -> Self {
        Session {
            uid: uid.to_string(),
            display_name: None,
            photo_url: None,
            email: None,
            provider,
        }
    }

    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = Some(name.to_string());
        self
    }

    pub fn with_photo_url(mut self, url: &str) -> Self {
        self.photo_url = Some(url.to_string());
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub status: ContactStatus,
    pub last_message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactStatus {
    Online,
    Offline,
}

/// A chat message as shown in the room
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender: String,
    pub display_name: String,
    pub sender_profile_img: String,
    /// `None` until the backend has acknowledged the write
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_pending(&self) -> bool {
        self.timestamp.is_none()
    }

    /// Local `HH:MM`, or the sending placeholder while unacknowledged
    pub fn time_label(&self) -> String {
        match self.timestamp {
            Some(ts) => ts.with_timezone(&Local).format("%H:%M").to_string(),
            None => SENDING_LABEL.to_string(),
        }
    }
}
