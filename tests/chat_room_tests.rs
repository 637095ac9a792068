// End-to-end behaviour of a mounted chat room against the in-process backend

mod common;
use common::{backends, mount, poll_until, sign_up, RecordingPane};

use std::sync::Arc;
use std::time::Duration;

use chatsphere::backend::memory::{MemoryIdentity, MemoryStore};
use chatsphere::backend::{fields, DocumentStore, FieldValue, IdentityBackend, NewRecord, MESSAGES_COLLECTION};
use chatsphere::models::{Provider, Session, ANONYMOUS_NAME, PLACEHOLDER_AVATAR, SENDING_LABEL};
use chatsphere::ChatRoom;

#[tokio::test]
async fn test_hello_from_ann() {
    let (_, store) = backends();
    let ann = Session::new("u1", Provider::Google).with_display_name("Ann");
    let identity = Arc::new(MemoryIdentity::new().with_provider_identity(Provider::Google, ann));
    identity.sign_in_with_provider(Provider::Google).await.unwrap();

    let mut room = mount(&identity, &store);
    room.poll(None);
    room.composer_mut().set_input("hello");
    assert!(room.submit());
    poll_until(&mut room, |r| r.messages().len() == 1 && r.in_flight() == 0, 5).await.unwrap();

    let log = store.append_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].get(fields::TEXT), Some(&FieldValue::from("hello")));
    assert_eq!(log[0].get(fields::SENDER), Some(&FieldValue::from("u1")));
    assert_eq!(log[0].get(fields::DISPLAY_NAME), Some(&FieldValue::from("Ann")));
    assert_eq!(log[0].get(fields::TIMESTAMP), Some(&FieldValue::ServerTimestamp));

    let message = &room.messages()[0];
    assert_eq!(message.text, "hello");
    assert!(message.timestamp.is_some());
    assert_eq!(room.composer().input(), "");
}

#[tokio::test]
async fn test_blank_or_signed_out_submit_is_noop() {
    let (identity, store) = backends();
    let mut room = mount(&identity, &store);
    room.poll(None);

    // Nobody signed in
    room.composer_mut().set_input("hello");
    assert!(!room.submit());
    assert_eq!(room.composer().input(), "hello");

    sign_up(&identity, "ann@example.com", Some("Ann")).await.unwrap();
    room.poll(None);
    for blank in ["", "  ", "\t\n"] {
        room.composer_mut().set_input(blank);
        assert!(!room.submit());
        assert_eq!(room.composer().input(), blank);
    }

    assert_eq!(room.in_flight(), 0);
    assert!(store.append_log().is_empty());
}

#[tokio::test]
async fn test_messages_from_other_clients_arrive_in_order() {
    let (identity, store) = backends();
    let mut room = mount(&identity, &store);
    let mut pane = RecordingPane::default();
    room.poll(Some(&mut pane));

    for text in ["one", "two", "three"] {
        store
            .append(
                MESSAGES_COLLECTION,
                NewRecord::new()
                    .set(fields::TEXT, text)
                    .set(fields::SENDER, "someone-else")
                    .set(fields::TIMESTAMP, FieldValue::ServerTimestamp),
            )
            .await
            .unwrap();
    }
    room.poll(Some(&mut pane));

    let texts: Vec<_> = room.messages().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
    // Initial load plus one snapshot per append
    assert_eq!(pane.scrolls, vec![0, 1, 2, 3]);

    // Unknown sender, no roster entry and default presentation
    let message = &room.messages()[0];
    assert!(room.sender_contact(message).is_none());
    assert_eq!(message.display_name, ANONYMOUS_NAME);
    assert_eq!(message.sender_profile_img, PLACEHOLDER_AVATAR);
}

#[tokio::test]
async fn test_unacknowledged_write_shows_sending() {
    let identity = Arc::new(MemoryIdentity::new());
    let store = Arc::new(MemoryStore::new().with_ack_delay(Duration::from_millis(200)));
    sign_up(&identity, "ann@example.com", Some("Ann")).await.unwrap();

    let mut room = mount(&identity, &store);
    room.poll(None);
    room.composer_mut().set_input("hi");
    assert!(room.submit());

    poll_until(&mut room, |r| r.messages().len() == 1, 5).await.unwrap();
    assert_eq!(room.messages()[0].time_label(), SENDING_LABEL);
    assert_eq!(room.composer().input(), "hi");

    poll_until(&mut room, |r| r.in_flight() == 0, 5).await.unwrap();
    assert!(!room.messages()[0].is_pending());
    assert_eq!(room.composer().input(), "");
}

#[tokio::test]
async fn test_double_submit_sends_twice() {
    let (identity, store) = backends();
    sign_up(&identity, "ann@example.com", None).await.unwrap();
    let mut room = mount(&identity, &store);
    room.poll(None);

    room.composer_mut().set_input("again");
    assert!(room.submit());
    assert!(room.submit());
    assert_eq!(room.in_flight(), 2);
    poll_until(&mut room, |r| r.in_flight() == 0, 5).await.unwrap();
    assert_eq!(room.messages().len(), 2);
}

#[tokio::test]
async fn test_write_failure_surfaces_notice() {
    let (identity, store) = backends();
    sign_up(&identity, "ann@example.com", None).await.unwrap();
    store.fail_writes(Some("permission denied"));

    let mut room = mount(&identity, &store);
    room.poll(None);
    room.composer_mut().set_input("hello");
    assert!(room.submit());
    poll_until(&mut room, |r| r.in_flight() == 0, 5).await.unwrap();

    assert_eq!(room.feedback().notices().len(), 1);
    assert!(room.feedback().notices()[0].text.contains("permission denied"));
    assert_eq!(room.composer().input(), "hello");

    room.feedback_mut().dismiss();
    assert!(room.feedback().notices().is_empty());
}

#[tokio::test]
async fn test_sessions_seed_roster_once_per_id() {
    let (identity, store) = backends();
    let mut room = mount(&identity, &store);

    sign_up(&identity, "ann@example.com", Some("Ann")).await.unwrap();
    identity.sign_out().await.unwrap();
    identity.sign_in_with_password("ann@example.com", "password123").await.unwrap();
    sign_up(&identity, "bob@example.com", None).await.unwrap();
    room.poll(None);

    let names: Vec<_> = room.roster().contacts().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Ann", "You"]);
    assert_eq!(room.session().and_then(|s| s.email).as_deref(), Some("bob@example.com"));
}

#[tokio::test]
async fn test_unmount_releases_each_subscription_once() {
    let (identity, store) = backends();
    sign_up(&identity, "ann@example.com", None).await.unwrap();
    let mut room = mount(&identity, &store);
    room.poll(None);
    assert_eq!(identity.listener_count(), 1);
    assert_eq!(store.listener_count(), 1);

    room.unmount();
    room.unmount();

    // Pushes after teardown are never observed
    identity.sign_out().await.unwrap();
    store
        .append(MESSAGES_COLLECTION, NewRecord::new().set(fields::TEXT, "late"))
        .await
        .unwrap();
    assert!(!room.poll(None));
    assert!(room.messages().is_empty());
    assert!(room.session().is_some());
    assert!(!room.submit());

    drop(room);
    assert_eq!(identity.released_subscriptions(), 1);
    assert_eq!(store.released_subscriptions(), 1);
    assert_eq!(identity.listener_count(), 0);
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn test_drop_without_unmount_releases() {
    let (identity, store) = backends();
    {
        let _room: ChatRoom = mount(&identity, &store);
    }
    assert_eq!(identity.released_subscriptions(), 1);
    assert_eq!(store.released_subscriptions(), 1);
}

#[tokio::test]
async fn test_unsaved_message_surfaces_storage_notice() {
    let (identity, _) = backends();
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::open(&dir.path().join("missing").join("store.json")).unwrap());
    sign_up(&identity, "ann@example.com", None).await.unwrap();

    let mut room = mount(&identity, &store);
    room.poll(None);
    room.composer_mut().set_input("hello");
    assert!(room.submit());
    poll_until(&mut room, |r| r.in_flight() == 0, 5).await.unwrap();

    assert!(room.messages().is_empty());
    assert_eq!(room.feedback().notices().len(), 1);
    assert!(room.feedback().notices()[0].text.starts_with("Storage error"));
    assert_eq!(room.composer().input(), "hello");
}
