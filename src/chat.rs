// The chat room view state.
// Mounting acquires the session and message subscriptions; unmounting (or
// dropping the room) releases both. Everything else happens in `poll`, which
// the owning loop calls once per frame.

use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::backend::{fields, DocumentStore, IdentityBackend, Query};
use crate::composer::Composer;
use crate::error::{AuthError, Result};
use crate::feedback::Feedback;
use crate::live_query::{MessageFeed, ScrollSurface};
use crate::models::{Contact, Message, Session};
use crate::roster::Roster;
use crate::session::{SessionHandle, SessionProvider};

pub struct ChatRoom {
    store: Arc<dyn DocumentStore>,
    collection: String,
    sessions: SessionProvider,
    feed: MessageFeed,
    roster: Roster,
    composer: Composer,
    feedback: Feedback,
    sends_tx: mpsc::UnboundedSender<Result<String>>,
    sends_rx: mpsc::UnboundedReceiver<Result<String>>,
    in_flight: usize,
    mounted: bool,
}

impl ChatRoom {
    pub fn mount(identity: &dyn IdentityBackend, store: Arc<dyn DocumentStore>, collection: &str) -> Self {
        info!("Mounting chat room on {}", collection);
        let sessions = SessionProvider::start(identity);
        let feed = MessageFeed::open(
            store.as_ref(),
            Query::collection(collection).order_by(fields::TIMESTAMP),
        );
        let (sends_tx, sends_rx) = mpsc::unbounded_channel();
        ChatRoom {
            store,
            collection: collection.to_string(),
            sessions,
            feed,
            roster: Roster::new(),
            composer: Composer::new(),
            feedback: Feedback::new(),
            sends_tx,
            sends_rx,
            in_flight: 0,
            mounted: true,
        }
    }

    /// Applies everything pushed since the last poll. Session pushes and
    /// snapshots are independent of each other. Returns whether any state
    /// changed.
    pub fn poll(&mut self, surface: Option<&mut dyn ScrollSurface>) -> bool {
        if !self.mounted {
            return false;
        }
        let mut changed = false;

        for session in self.sessions.poll() {
            changed = true;
            if let Some(session) = session {
                self.roster.observe(&session);
            }
        }

        changed |= self.feed.poll(surface);

        while let Ok(outcome) = self.sends_rx.try_recv() {
            changed = true;
            self.in_flight = self.in_flight.saturating_sub(1);
            match outcome {
                Ok(_) => self.composer.clear(),
                Err(e) => {
                    error!("Message send failed: {}", e);
                    self.feedback.report(&e);
                }
            }
        }
        changed
    }

    /// Dispatches the composer's draft without waiting for the backend.
    /// Returns whether an append was issued. Submitting again while a send is
    /// in flight issues another append.
    pub fn submit(&mut self) -> bool {
        if !self.mounted {
            warn!("Submit on an unmounted chat room");
            return false;
        }
        let session = self.sessions.current();
        let Some(record) = self.composer.draft(session.as_ref()) else {
            return false;
        };

        self.in_flight += 1;
        let store = self.store.clone();
        let collection = self.collection.clone();
        let tx = self.sends_tx.clone();
        tokio::spawn(async move {
            let outcome = store.append(&collection, record).await;
            // The room may be gone by now; the write stands regardless
            let _ = tx.send(outcome);
        });
        true
    }

    pub fn unmount(&mut self) {
        if self.mounted {
            info!("Unmounting chat room");
            self.mounted = false;
        }
        self.sessions.close();
        self.feed.close();
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn messages(&self) -> &[Message] {
        self.feed.messages()
    }

    pub fn session(&self) -> Option<Session> {
        self.sessions.current()
    }

    pub fn session_handle(&self) -> SessionHandle {
        self.sessions.handle()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Roster entry of a message's sender, if the sender is known
    pub fn sender_contact(&self, message: &Message) -> Option<&Contact> {
        self.roster.get(&message.sender)
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    pub fn feedback(&self) -> &Feedback {
        &self.feedback
    }

    pub fn feedback_mut(&mut self) -> &mut Feedback {
        &mut self.feedback
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Permanent failures stay inline until cleared; transient ones become
    /// expiring notices.
    pub fn report_auth_error(&mut self, err: &AuthError) {
        warn!("Identity error: {}", err);
        self.feedback.report_auth(err);
    }
}

impl Drop for ChatRoom {
    fn drop(&mut self) {
        self.unmount();
    }
}
