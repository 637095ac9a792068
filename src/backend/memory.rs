// In-process stand-ins for the hosted identity service and document store.
// Both push to subscribers the way the hosted services do and can persist
// their state as JSON so a local room survives restarts.

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{DocumentStore, FieldValue, IdentityBackend, NewRecord, Query, Record, Snapshot, Subscription};
use crate::error::{AuthError, ChatError, Result};
use crate::models::{Provider, Session};

pub const MIN_PASSWORD_LEN: usize = 6;
const RECORD_ID_LEN: usize = 20;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"));

fn lock_state<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

//------------------------------------------------------------------------------
// Identity
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    uid: String,
    email: String,
    salt: String,
    password_hash: String,
    display_name: Option<String>,
    photo_url: Option<String>,
}

impl Account {
    fn session(&self) -> Session {
        Session {
            uid: self.uid.clone(),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            email: Some(self.email.clone()),
            provider: Provider::Password,
        }
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Default)]
struct IdentityState {
    accounts: HashMap<String, Account>,
    providers: HashMap<Provider, Session>,
    current: Option<Session>,
    listeners: HashMap<u64, mpsc::UnboundedSender<Option<Session>>>,
    next_listener: u64,
    released: usize,
    outage: Option<String>,
}

impl IdentityState {
    fn publish(&mut self) {
        let current = self.current.clone();
        self.listeners.retain(|_, tx| tx.send(current.clone()).is_ok());
    }

    fn check_available(&self) -> std::result::Result<(), AuthError> {
        match &self.outage {
            Some(reason) => Err(AuthError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

pub struct MemoryIdentity {
    state: Arc<Mutex<IdentityState>>,
    path: Option<PathBuf>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        MemoryIdentity {
            state: Arc::new(Mutex::new(IdentityState::default())),
            path: None,
        }
    }

    /// Identity service whose accounts are kept in `path`
    pub fn open(path: &Path) -> Result<Self> {
        let identity = MemoryIdentity {
            state: Arc::new(Mutex::new(IdentityState::default())),
            path: Some(path.to_path_buf()),
        };
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let accounts: Vec<Account> = serde_json::from_str(&contents)?;
            info!("Loaded {} accounts from {}", accounts.len(), path.display());
            let mut state = lock_state(&identity.state);
            for account in accounts {
                state.accounts.insert(account.email.to_lowercase(), account);
            }
        }
        Ok(identity)
    }

    /// Session handed out when signing in with `provider`
    pub fn with_provider_identity(self, provider: Provider, session: Session) -> Self {
        lock_state(&self.state).providers.insert(provider, session);
        self
    }

    /// Make every call fail as if the service were unreachable
    pub fn set_outage(&self, reason: Option<&str>) {
        lock_state(&self.state).outage = reason.map(str::to_string);
    }

    pub fn current(&self) -> Option<Session> {
        lock_state(&self.state).current.clone()
    }

    pub fn listener_count(&self) -> usize {
        lock_state(&self.state).listeners.len()
    }

    pub fn released_subscriptions(&self) -> usize {
        lock_state(&self.state).released
    }

    fn save(&self, state: &IdentityState) -> Result<()> {
        if let Some(path) = &self.path {
            let accounts: Vec<&Account> = state.accounts.values().collect();
            let file = File::create(path)?;
            serde_json::to_writer_pretty(file, &accounts)?;
            debug!("Saved {} accounts to {}", accounts.len(), path.display());
        }
        Ok(())
    }

    fn sign_in(state: &mut IdentityState, session: Session) -> Session {
        info!("Signed in {} via {}", session.uid, session.provider);
        state.current = Some(session.clone());
        state.publish();
        session
    }
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_email(email: &str) -> std::result::Result<(), AuthError> {
    if EMAIL_PATTERN.is_match(email) {
        Ok(())
    } else {
        Err(AuthError::InvalidEmail(email.to_string()))
    }
}

#[async_trait]
impl IdentityBackend for MemoryIdentity {
    fn subscribe_sessions(&self) -> Subscription<Option<Session>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut state = lock_state(&self.state);
            let id = state.next_listener;
            state.next_listener += 1;
            // A fresh listener always hears the current value first
            let _ = tx.send(state.current.clone());
            state.listeners.insert(id, tx);
            id
        };
        debug!("Session listener {} registered", id);

        let weak: Weak<Mutex<IdentityState>> = Arc::downgrade(&self.state);
        Subscription::new(rx, move || {
            if let Some(state) = weak.upgrade() {
                let mut state = lock_state(&state);
                state.listeners.remove(&id);
                state.released += 1;
                debug!("Session listener {} released", id);
            }
        })
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> std::result::Result<Session, AuthError> {
        let mut state = lock_state(&self.state);
        state.check_available()?;
        validate_email(email)?;

        let account = state
            .accounts
            .get(&email.to_lowercase())
            .ok_or(AuthError::WrongCredentials)?;
        if account.password_hash != hash_password(&account.salt, password) {
            warn!("Rejected password sign-in for {}", email);
            return Err(AuthError::WrongCredentials);
        }
        let session = account.session();
        Ok(Self::sign_in(&mut state, session))
    }

    async fn sign_in_with_provider(&self, provider: Provider) -> std::result::Result<Session, AuthError> {
        let mut state = lock_state(&self.state);
        state.check_available()?;
        let session = state
            .providers
            .get(&provider)
            .cloned()
            .ok_or(AuthError::ProviderUnavailable(provider))?;
        Ok(Self::sign_in(&mut state, session))
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> std::result::Result<Session, AuthError> {
        let mut state = lock_state(&self.state);
        state.check_available()?;
        validate_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword(MIN_PASSWORD_LEN));
        }
        let key = email.to_lowercase();
        if state.accounts.contains_key(&key) {
            return Err(AuthError::EmailInUse(email.to_string()));
        }

        let salt = Uuid::new_v4().simple().to_string();
        let account = Account {
            uid: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash: hash_password(&salt, password),
            salt,
            display_name: display_name.map(str::to_string),
            photo_url: None,
        };
        info!("Created account {} for {}", account.uid, email);
        let session = account.session();
        state.accounts.insert(key.clone(), account);
        if let Err(e) = self.save(&state) {
            // An account that was never written must not exist
            state.accounts.remove(&key);
            error!("Failed to save accounts: {}", e);
            return Err(AuthError::Unavailable(e.to_string()));
        }
        Ok(Self::sign_in(&mut state, session))
    }

    async fn sign_out(&self) -> std::result::Result<(), AuthError> {
        let mut state = lock_state(&self.state);
        state.check_available()?;
        if let Some(session) = state.current.take() {
            info!("Signed out {}", session.uid);
        }
        state.publish();
        Ok(())
    }
}

//------------------------------------------------------------------------------
// Documents
//------------------------------------------------------------------------------

struct Listener {
    query: Query,
    tx: mpsc::UnboundedSender<Snapshot>,
}

#[derive(Default, Serialize, Deserialize)]
struct Collections {
    collections: HashMap<String, Vec<Record>>,
}

#[derive(Default)]
struct StoreState {
    data: Collections,
    listeners: HashMap<u64, Listener>,
    next_listener: u64,
    released: usize,
    append_log: Vec<NewRecord>,
    write_failure: Option<String>,
}

impl StoreState {
    fn snapshot(&self, query: &Query) -> Snapshot {
        let mut records = self
            .data
            .collections
            .get(&query.collection)
            .cloned()
            .unwrap_or_default();
        if let Some(field) = &query.order_by {
            records.sort_by(|a, b| compare_fields(a.get(field), b.get(field)));
        }
        Snapshot { records }
    }

    fn remove(&mut self, collection: &str, id: &str) {
        if let Some(records) = self.data.collections.get_mut(collection) {
            records.retain(|r| r.id != id);
        }
    }

    fn notify(&mut self, collection: &str) {
        let snapshots: Vec<(u64, Snapshot)> = self
            .listeners
            .iter()
            .filter(|(_, l)| l.query.collection == collection)
            .map(|(id, l)| (*id, self.snapshot(&l.query)))
            .collect();
        for (id, snapshot) in snapshots {
            let delivered = self
                .listeners
                .get(&id)
                .map(|l| l.tx.send(snapshot).is_ok())
                .unwrap_or(false);
            if !delivered {
                self.listeners.remove(&id);
            }
        }
    }
}

// Ascending order: missing or null first, then timestamps, then strings, then
// writes the server has not stamped yet.
fn compare_fields(a: Option<&FieldValue>, b: Option<&FieldValue>) -> Ordering {
    fn rank(v: Option<&FieldValue>) -> u8 {
        match v {
            None | Some(FieldValue::Null) => 0,
            Some(FieldValue::Timestamp(_)) => 1,
            Some(FieldValue::String(_)) => 2,
            Some(FieldValue::ServerTimestamp) => 3,
        }
    }
    match (a, b) {
        (Some(FieldValue::Timestamp(x)), Some(FieldValue::Timestamp(y))) => x.cmp(y),
        (Some(FieldValue::String(x)), Some(FieldValue::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn new_record_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RECORD_ID_LEN)
        .map(char::from)
        .collect()
}

fn stamp(fields: &mut std::collections::BTreeMap<String, FieldValue>) {
    let now = Utc::now();
    for value in fields.values_mut() {
        if *value == FieldValue::ServerTimestamp {
            *value = FieldValue::Timestamp(now);
        }
    }
}

pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    path: Option<PathBuf>,
    ack_delay: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            state: Arc::new(Mutex::new(StoreState::default())),
            path: None,
            ack_delay: Duration::ZERO,
        }
    }

    /// Store whose collections are kept in `path`
    pub fn open(path: &Path) -> Result<Self> {
        let mut state = StoreState::default();
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            state.data = serde_json::from_str(&contents)?;
            let total: usize = state.data.collections.values().map(Vec::len).sum();
            info!("Loaded {} records from {}", total, path.display());
        }
        Ok(MemoryStore {
            state: Arc::new(Mutex::new(state)),
            path: Some(path.to_path_buf()),
            ack_delay: Duration::ZERO,
        })
    }

    /// Delay between a write becoming visible and the server stamping it.
    /// While it lasts, subscribers see the record with an unresolved timestamp.
    pub fn with_ack_delay(mut self, delay: Duration) -> Self {
        self.ack_delay = delay;
        self
    }

    /// Reject every append with `reason` until cleared
    pub fn fail_writes(&self, reason: Option<&str>) {
        lock_state(&self.state).write_failure = reason.map(str::to_string);
    }

    /// Payloads of every append call, accepted or not
    pub fn append_log(&self) -> Vec<NewRecord> {
        lock_state(&self.state).append_log.clone()
    }

    pub fn records(&self, collection: &str) -> Vec<Record> {
        lock_state(&self.state).snapshot(&Query::collection(collection)).records
    }

    pub fn listener_count(&self) -> usize {
        lock_state(&self.state).listeners.len()
    }

    pub fn released_subscriptions(&self) -> usize {
        lock_state(&self.state).released
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let written = File::create(path)
            .map_err(ChatError::from)
            .and_then(|file| serde_json::to_writer_pretty(file, &state.data).map_err(ChatError::from));
        written.map_err(|e| {
            error!("Failed to persist store to {}: {}", path.display(), e);
            ChatError::Storage(format!("{}: {}", path.display(), e))
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn subscribe(&self, query: Query) -> Subscription<Snapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut state = lock_state(&self.state);
            let id = state.next_listener;
            state.next_listener += 1;
            let _ = tx.send(state.snapshot(&query));
            debug!("Snapshot listener {} registered on {}", id, query.collection);
            state.listeners.insert(id, Listener { query, tx });
            id
        };

        let weak: Weak<Mutex<StoreState>> = Arc::downgrade(&self.state);
        Subscription::new(rx, move || {
            if let Some(state) = weak.upgrade() {
                let mut state = lock_state(&state);
                state.listeners.remove(&id);
                state.released += 1;
                debug!("Snapshot listener {} released", id);
            }
        })
    }

    async fn append(&self, collection: &str, record: NewRecord) -> Result<String> {
        let id = new_record_id();
        {
            let mut state = lock_state(&self.state);
            state.append_log.push(record.clone());
            if let Some(reason) = &state.write_failure {
                warn!("Rejecting append to {}: {}", collection, reason);
                return Err(ChatError::Write(reason.clone()));
            }

            let mut fields = record.fields;
            if self.ack_delay.is_zero() {
                stamp(&mut fields);
            }
            state
                .data
                .collections
                .entry(collection.to_string())
                .or_default()
                .push(Record { id: id.clone(), fields });
            if self.ack_delay.is_zero() {
                if let Err(e) = self.persist(&state) {
                    state.remove(collection, &id);
                    return Err(e);
                }
                state.notify(collection);
                debug!("Appended {} to {}", id, collection);
                return Ok(id);
            }
            state.notify(collection);
        }

        tokio::time::sleep(self.ack_delay).await;

        let mut state = lock_state(&self.state);
        if let Some(stored) = state
            .data
            .collections
            .get_mut(collection)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
        {
            stamp(&mut stored.fields);
        }
        let persisted = self.persist(&state);
        if persisted.is_err() {
            // Subscribers already saw the pending write; take it back
            state.remove(collection, &id);
        }
        state.notify(collection);
        persisted?;
        debug!("Appended {} to {} after acknowledgement", id, collection);
        Ok(id)
    }
}
