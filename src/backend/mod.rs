// Backend seams for chatsphere
// The identity service and the document store are hosted collaborators; the
// rest of the crate only sees the traits and value types defined here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::error::{AuthError, Result};
use crate::models::{Provider, Session};

pub mod memory;

/// Collection holding the shared room's messages
pub const MESSAGES_COLLECTION: &str = "messages";

// Field names of a message record
pub mod fields {
    pub const TEXT: &str = "text";
    pub const SENDER: &str = "sender";
    pub const DISPLAY_NAME: &str = "displayName";
    pub const SENDER_PROFILE_IMG: &str = "senderProfileImg";
    pub const TIMESTAMP: &str = "timestamp";
}

/// A single field value of a stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    Null,
    String(String),
    Timestamp(DateTime<Utc>),
    /// Write-side sentinel asking the backend to stamp its own clock. Reads
    /// back unchanged until the write is acknowledged.
    ServerTimestamp,
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

/// A stored document: server-assigned id plus its fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }
}

/// Payload of an append call; the backend assigns the record id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRecord {
    pub fields: BTreeMap<String, FieldValue>,
}

impl NewRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// Standing query over one collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub order_by: Option<String>,
}

impl Query {
    pub fn collection(name: &str) -> Self {
        Query {
            collection: name.to_string(),
            order_by: None,
        }
    }

    /// Ascending order on `field`
    pub fn order_by(mut self, field: &str) -> Self {
        self.order_by = Some(field.to_string());
        self
    }
}

/// Complete ordered result set of a query at one point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub records: Vec<Record>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Handle on a standing push subscription.
///
/// Values pushed by the backend are received one at a time. `close` releases
/// the registration with the backend exactly once; dropping the handle closes
/// it. Nothing is yielded after close, including values that were already
/// queued.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl<T> Subscription<T> {
    pub fn new<F>(rx: mpsc::UnboundedReceiver<T>, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Subscription {
            rx,
            release: Some(Box::new(release)),
        }
    }

    /// Wait for the next pushed value; `None` once closed
    pub async fn next(&mut self) -> Option<T> {
        if self.is_closed() {
            return None;
        }
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<T> {
        if self.is_closed() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    pub fn is_closed(&self) -> bool {
        self.release.is_none()
    }

    pub fn close(&mut self) {
        if let Some(release) = self.release.take() {
            self.rx.close();
            while self.rx.try_recv().is_ok() {}
            release();
            debug!("Subscription released");
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        if this.is_closed() {
            return Poll::Ready(None);
        }
        this.rx.poll_recv(cx)
    }
}

/// Hosted identity service
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Stream of the current session; the current value is pushed first
    fn subscribe_sessions(&self) -> Subscription<Option<Session>>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> std::result::Result<Session, AuthError>;

    async fn sign_in_with_provider(&self, provider: Provider) -> std::result::Result<Session, AuthError>;

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> std::result::Result<Session, AuthError>;

    async fn sign_out(&self) -> std::result::Result<(), AuthError>;
}

/// Hosted document database
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Full ordered snapshot on subscribe and after every change
    fn subscribe(&self, query: Query) -> Subscription<Snapshot>;

    /// Append one record and return its server-assigned id
    async fn append(&self, collection: &str, record: NewRecord) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counted_subscription() -> (mpsc::UnboundedSender<u32>, Subscription<u32>, Arc<AtomicUsize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let releases = Arc::new(AtomicUsize::new(0));
        let counter = releases.clone();
        let sub = Subscription::new(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (tx, sub, releases)
    }

    #[test]
    fn test_close_releases_once() {
        let (_tx, mut sub, releases) = counted_subscription();
        sub.close();
        sub.close();
        drop(sub);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases() {
        let (_tx, sub, releases) = counted_subscription();
        drop(sub);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_queued_values_discarded_after_close() {
        let (tx, mut sub, _) = counted_subscription();
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        assert_eq!(sub.try_next(), Some(1));
        sub.close();
        assert_eq!(sub.try_next(), None);
        assert!(tx.send(3).is_err());
    }

    #[tokio::test]
    async fn test_stream_ends_after_close() {
        let (tx, mut sub, _) = counted_subscription();
        tx.send(7).unwrap();
        assert_eq!(StreamExt::next(&mut sub).await, Some(7));
        sub.close();
        assert_eq!(StreamExt::next(&mut sub).await, None);
        assert_eq!(sub.next().await, None);
    }

    #[test]
    fn test_new_record_builder() {
        let record = NewRecord::new()
            .set(fields::TEXT, "hi")
            .set(fields::TIMESTAMP, FieldValue::ServerTimestamp);
        assert_eq!(record.get(fields::TEXT), Some(&FieldValue::String("hi".to_string())));
        assert_eq!(record.get(fields::TIMESTAMP), Some(&FieldValue::ServerTimestamp));
    }
}
