// Message composer: the input buffer and the single append call it issues

use log::{debug, error, info};

use crate::backend::{fields, DocumentStore, FieldValue, NewRecord};
use crate::error::Result;
use crate::models::{Session, ANONYMOUS_NAME, PLACEHOLDER_AVATAR};

#[derive(Debug, Default)]
pub struct Composer {
    input: String,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: &str) {
        self.input = input.to_string();
    }

    pub fn clear(&mut self) {
        self.input.clear();
    }

    /// The record a submit would append, or `None` when the buffer is blank
    /// or nobody is signed in
    pub fn draft(&self, session: Option<&Session>) -> Option<NewRecord> {
        if self.input.trim().is_empty() {
            return None;
        }
        let session = session?;
        Some(
            NewRecord::new()
                .set(fields::TEXT, self.input.as_str())
                .set(fields::SENDER, session.uid.as_str())
                .set(
                    fields::DISPLAY_NAME,
                    session.display_name.as_deref().unwrap_or(ANONYMOUS_NAME),
                )
                .set(
                    fields::SENDER_PROFILE_IMG,
                    session.photo_url.as_deref().unwrap_or(PLACEHOLDER_AVATAR),
                )
                .set(fields::TIMESTAMP, FieldValue::ServerTimestamp),
        )
    }

    /// Appends the draft to `collection` and clears the buffer on success.
    /// A blank buffer or missing session is a no-op returning `Ok(None)`.
    pub async fn submit(
        &mut self,
        session: Option<&Session>,
        store: &dyn DocumentStore,
        collection: &str,
    ) -> Result<Option<String>> {
        let Some(record) = self.draft(session) else {
            debug!("Nothing to send");
            return Ok(None);
        };
        match store.append(collection, record).await {
            Ok(id) => {
                info!("Sent message {}", id);
                self.clear();
                Ok(Some(id))
            }
            Err(e) => {
                error!("Failed to send message: {}", e);
                Err(e)
            }
        }
    }
}
