// Current-session provider.
// One writer (the identity subscription) publishes immutable session values
// through a watch channel; any number of readers hold a SessionHandle.

use log::{debug, info};
use tokio::sync::watch;

use crate::backend::{IdentityBackend, Subscription};
use crate::models::Session;

/// Read side of the current session
#[derive(Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<Option<Session>>,
}

impl SessionHandle {
    pub fn current(&self) -> Option<Session> {
        self.rx.borrow().clone()
    }

    /// Waits until the provider publishes a new value; `false` once the
    /// provider is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

pub struct SessionProvider {
    subscription: Subscription<Option<Session>>,
    tx: watch::Sender<Option<Session>>,
}

impl SessionProvider {
    /// Registers the single session subscription with `identity`
    pub fn start(identity: &dyn IdentityBackend) -> Self {
        info!("Starting session provider");
        let (tx, _rx) = watch::channel(None);
        SessionProvider {
            subscription: identity.subscribe_sessions(),
            tx,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle { rx: self.tx.subscribe() }
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    /// Replaces the held session wholesale
    pub fn replace(&self, session: Option<Session>) {
        match &session {
            Some(s) => debug!("Session is now {}", s.uid),
            None => debug!("Session cleared"),
        }
        self.tx.send_replace(session);
    }

    /// Drains pushed values. Returns every session pushed, in order, so callers
    /// can react to each one (the held value ends up as the last of them).
    pub fn poll(&mut self) -> Vec<Option<Session>> {
        let mut pushed = Vec::new();
        while let Some(session) = self.subscription.try_next() {
            self.replace(session.clone());
            pushed.push(session);
        }
        pushed
    }

    /// Waits for the next push and applies it; `None` once closed
    pub async fn next(&mut self) -> Option<Option<Session>> {
        let session = self.subscription.next().await?;
        self.replace(session.clone());
        Some(session)
    }

    pub fn close(&mut self) {
        self.subscription.close();
    }

    pub fn is_closed(&self) -> bool {
        self.subscription.is_closed()
    }
}
