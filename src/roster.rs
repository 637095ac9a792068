// Contact roster, seeded from the sessions this client has seen

use log::info;

use crate::models::{Contact, ContactStatus, Session, PLACEHOLDER_AVATAR};

/// Name shown for a roster entry whose session has no display name
pub const DEFAULT_CONTACT_NAME: &str = "You";
pub const WELCOME_PREVIEW: &str = "Welcome!";

#[derive(Debug, Default)]
pub struct Roster {
    contacts: Vec<Contact>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a contact for `session` unless one with the same id exists.
    /// Returns whether a contact was added.
    pub fn observe(&mut self, session: &Session) -> bool {
        if self.contains(&session.uid) {
            return false;
        }
        let contact = Contact {
            id: session.uid.clone(),
            name: session
                .display_name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_CONTACT_NAME.to_string()),
            avatar: session
                .photo_url
                .clone()
                .unwrap_or_else(|| PLACEHOLDER_AVATAR.to_string()),
            status: ContactStatus::Online,
            last_message: WELCOME_PREVIEW.to_string(),
        };
        info!("Added {} ({}) to roster", contact.name, contact.id);
        self.contacts.push(contact);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.contacts.iter().any(|c| c.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provider;

    #[test]
    fn test_seed_from_session() {
        let mut roster = Roster::new();
        let session = Session::new("u1", Provider::Password)
            .with_display_name("Ann")
            .with_photo_url("https://img/ann.png");
        assert!(roster.observe(&session));

        let contact = roster.get("u1").unwrap();
        assert_eq!(contact.name, "Ann");
        assert_eq!(contact.avatar, "https://img/ann.png");
        assert_eq!(contact.status, ContactStatus::Online);
        assert_eq!(contact.last_message, WELCOME_PREVIEW);
    }

    #[test]
    fn test_defaults_for_bare_session() {
        let mut roster = Roster::new();
        roster.observe(&Session::new("u2", Provider::Google));
        let contact = roster.get("u2").unwrap();
        assert_eq!(contact.name, DEFAULT_CONTACT_NAME);
        assert_eq!(contact.avatar, PLACEHOLDER_AVATAR);
    }

    #[test]
    fn test_same_id_collapses() {
        let mut roster = Roster::new();
        assert!(roster.observe(&Session::new("u1", Provider::Password).with_display_name("Ann")));
        assert!(!roster.observe(&Session::new("u1", Provider::Github).with_display_name("Annie")));
        assert!(roster.observe(&Session::new("u3", Provider::Password)));
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.get("u1").unwrap().name, "Ann");
    }
}
