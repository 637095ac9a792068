// Re-export modules for the binary and the integration tests
pub mod backend;   // Identity and document backend seams
pub mod chat;
pub mod composer;
pub mod error;
pub mod feedback;
pub mod live_query;
pub mod mapper;
pub mod models;
pub mod roster;
pub mod session;

// Re-export main types for convenience
pub use chat::ChatRoom;
pub use error::{AuthError, ChatError};
pub use models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone, Utc};

    #[test]
    fn test_provider_display() {
        assert_eq!(Provider::Google.to_string(), "Google");
        assert_eq!(Provider::Github.to_string(), "GitHub");
        assert_eq!(Provider::Password.to_string(), "email and password");
    }

    #[test]
    fn test_session_builder() {
        let session = Session::new("u1", Provider::Password)
            .with_display_name("Ann")
            .with_email("ann@example.com");
        assert_eq!(session.uid, "u1");
        assert_eq!(session.display_name.as_deref(), Some("Ann"));
        assert_eq!(session.email.as_deref(), Some("ann@example.com"));
        assert!(session.photo_url.is_none());
    }

    #[test]
    fn test_message_time_label() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let mut msg = Message {
            id: "m1".to_string(),
            text: "hi".to_string(),
            sender: "u1".to_string(),
            display_name: "Ann".to_string(),
            sender_profile_img: PLACEHOLDER_AVATAR.to_string(),
            timestamp: Some(ts),
        };
        let expected = ts.with_timezone(&Local).format("%H:%M").to_string();
        assert_eq!(msg.time_label(), expected);
        assert_eq!(msg.time_label().len(), 5);

        msg.timestamp = None;
        assert!(msg.is_pending());
        assert_eq!(msg.time_label(), SENDING_LABEL);
    }

    #[test]
    fn test_auth_error_permanence() {
        assert!(AuthError::InvalidEmail("x".into()).is_permanent());
        assert!(AuthError::WeakPassword(6).is_permanent());
        assert!(AuthError::WrongCredentials.is_permanent());
        assert!(AuthError::EmailInUse("x".into()).is_permanent());
        assert!(!AuthError::Unavailable("down".into()).is_permanent());
        assert!(!AuthError::ProviderUnavailable(Provider::Github).is_permanent());
    }
}
