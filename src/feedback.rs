// User-visible error state: dismissible notices for transient failures and a
// single inline message for failures the user has to fix themselves.

use chrono::{DateTime, Utc};
use log::debug;

use crate::error::{AuthError, ChatError};

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct Feedback {
    notices: Vec<Notice>,
    inline: Option<String>,
}

impl Feedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_notice(&mut self, text: &str) {
        debug!("Notice: {}", text);
        self.notices.push(Notice {
            text: text.to_string(),
            created_at: Utc::now(),
        });
    }

    /// Permanent failures go inline, everything else becomes a notice
    pub fn report_auth(&mut self, err: &AuthError) {
        if err.is_permanent() {
            self.inline = Some(err.to_string());
        } else {
            self.push_notice(&err.to_string());
        }
    }

    pub fn report(&mut self, err: &ChatError) {
        match err {
            ChatError::Auth(auth) => self.report_auth(auth),
            other => self.push_notice(&other.to_string()),
        }
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn inline(&self) -> Option<&str> {
        self.inline.as_deref()
    }

    pub fn clear_inline(&mut self) {
        self.inline = None;
    }

    /// Dismisses the oldest notice
    pub fn dismiss(&mut self) -> Option<Notice> {
        if self.notices.is_empty() {
            None
        } else {
            Some(self.notices.remove(0))
        }
    }

    pub fn expire(&mut self, timeout_secs: i64) {
        let now = Utc::now();
        self.notices
            .retain(|n| (now - n.created_at).num_seconds() <= timeout_secs);
    }
}
