// Live query over the room's messages.
// Every push is a complete ordered snapshot; the local list is replaced
// wholesale and never re-sorted here.

use log::{debug, info};

use crate::backend::{DocumentStore, Query, Snapshot, Subscription};
use crate::mapper;
use crate::models::Message;

/// A mounted view that can follow the newest message
pub trait ScrollSurface {
    fn scroll_to_latest(&mut self, len: usize);
}

pub struct MessageFeed {
    subscription: Subscription<Snapshot>,
    messages: Vec<Message>,
    snapshots_seen: usize,
}

impl MessageFeed {
    pub fn open(store: &dyn DocumentStore, query: Query) -> Self {
        info!("Opening live query on {} ordered by {:?}", query.collection, query.order_by);
        MessageFeed {
            subscription: store.subscribe(query),
            messages: Vec::new(),
            snapshots_seen: 0,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn snapshots_seen(&self) -> usize {
        self.snapshots_seen
    }

    pub fn apply<'s>(&mut self, snapshot: &Snapshot, surface: Option<&mut (dyn ScrollSurface + 's)>) {
        self.messages = mapper::map_snapshot(snapshot);
        self.snapshots_seen += 1;
        debug!("Applied snapshot with {} messages", self.messages.len());
        if let Some(surface) = surface {
            surface.scroll_to_latest(self.messages.len());
        }
    }

    /// Applies every queued snapshot; returns whether any arrived
    pub fn poll<'s>(&mut self, mut surface: Option<&mut (dyn ScrollSurface + 's)>) -> bool {
        let mut changed = false;
        while let Some(snapshot) = self.subscription.try_next() {
            self.apply(&snapshot, surface.as_deref_mut());
            changed = true;
        }
        changed
    }

    /// Waits for the next snapshot and applies it; `false` once closed
    pub async fn next<'s>(&mut self, surface: Option<&mut (dyn ScrollSurface + 's)>) -> bool {
        match self.subscription.next().await {
            Some(snapshot) => {
                self.apply(&snapshot, surface);
                true
            }
            None => false,
        }
    }

    pub fn close(&mut self) {
        self.subscription.close();
    }

    pub fn is_closed(&self) -> bool {
        self.subscription.is_closed()
    }
}
