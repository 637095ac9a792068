// Common test utilities for integration tests
// Backends, signed-in rooms and a wait helper shared by every test file

#![allow(dead_code)]

use std::sync::{Arc, Once};

use anyhow::Result;
use log::{info, LevelFilter};
use tokio::time::{sleep, timeout, Duration};

use chatsphere::backend::memory::{MemoryIdentity, MemoryStore};
use chatsphere::backend::{IdentityBackend, MESSAGES_COLLECTION};
use chatsphere::live_query::ScrollSurface;
use chatsphere::{ChatRoom, Session};

static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

/// A fresh identity service and store with nobody signed in
pub fn backends() -> (Arc<MemoryIdentity>, Arc<MemoryStore>) {
    setup_logging();
    (Arc::new(MemoryIdentity::new()), Arc::new(MemoryStore::new()))
}

pub async fn sign_up(identity: &MemoryIdentity, email: &str, name: Option<&str>) -> Result<Session> {
    Ok(identity.create_account(email, "password123", name).await?)
}

pub fn mount(identity: &Arc<MemoryIdentity>, store: &Arc<MemoryStore>) -> ChatRoom {
    ChatRoom::mount(&**identity, store.clone(), MESSAGES_COLLECTION)
}

/// Scroll surface that records every scroll request
#[derive(Default)]
pub struct RecordingPane {
    pub scrolls: Vec<usize>,
}

impl ScrollSurface for RecordingPane {
    fn scroll_to_latest(&mut self, len: usize) {
        self.scrolls.push(len);
    }
}

/// Poll `room` until `predicate` holds, failing after `timeout_secs`
pub async fn poll_until(
    room: &mut ChatRoom,
    predicate: impl Fn(&ChatRoom) -> bool,
    timeout_secs: u64,
) -> Result<()> {
    info!("Polling room...");
    match timeout(Duration::from_secs(timeout_secs), async {
        loop {
            room.poll(None);
            if predicate(room) {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    {
        Ok(()) => Ok(()),
        Err(_) => Err(anyhow::anyhow!("Timed out waiting for room state")),
    }
}
