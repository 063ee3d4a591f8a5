//! Engine-level property assertions
//!
//! Deterministic checks of the reconciliation contracts: idempotent ingest,
//! tombstone and edit dominance, identity convergence, ordering stability,
//! no duplication, and the one-notification-per-changing-ingest rule.

use chrono::{Duration as ChronoDuration, Utc};
use pretty_assertions::assert_eq;
use tokio::sync::broadcast::error::TryRecvError;
use uuid::Uuid;

use super::setup;
use crate::common::{base_time, delta_new_frame, history_record_value};
use xfchat::transport::HistoryPage;

#[tokio::test]
async fn ingest_is_idempotent() {
    let (session, _, _, conversation_id) = setup();
    let frame = delta_new_frame(
        Uuid::new_v4(),
        conversation_id,
        Uuid::new_v4(),
        "once",
        base_time(),
    );

    assert!(session.handle_delta(frame.clone()).await);
    let snapshot = session.messages().await;
    let revision = session.revision().await;

    assert!(!session.handle_delta(frame).await);
    assert_eq!(session.messages().await, snapshot);
    assert_eq!(session.revision().await, revision);
}

#[tokio::test]
async fn deleted_message_resists_older_realtime_versions() {
    let (session, transport, _, conversation_id) = setup();
    let m42 = Uuid::new_v4();
    let sender = Uuid::new_v4();
    transport
        .script_history(Ok(HistoryPage {
            records: vec![history_record_value(m42, conversation_id, sender, "hi", base_time())],
            has_more: true,
        }))
        .await;
    session.load_older().await.unwrap();
    session.delete_message(m42).await.unwrap();

    // An equal-timestamped, undeleted version from the push stream.
    session
        .handle_delta(delta_new_frame(m42, conversation_id, sender, "hi", base_time()))
        .await;

    assert!(session.message(m42).await.unwrap().is_deleted());
}

#[tokio::test]
async fn local_edit_yields_only_to_strictly_newer_edit() {
    let (session, transport, _, conversation_id) = setup();
    let m42 = Uuid::new_v4();
    let sender = Uuid::new_v4();
    transport
        .script_history(Ok(HistoryPage {
            records: vec![history_record_value(m42, conversation_id, sender, "hi", base_time())],
            has_more: true,
        }))
        .await;
    session.load_older().await.unwrap();
    session.edit_message(m42, "bye").await.unwrap();

    // Older content never wins...
    session
        .handle_delta(delta_new_frame(m42, conversation_id, sender, "hi", base_time()))
        .await;
    assert_eq!(session.message(m42).await.unwrap().content, "bye");

    // ...but a strictly newer remote edit does.
    let newer_edit = Utc::now() + ChronoDuration::seconds(60);
    let mut frame = delta_new_frame(m42, conversation_id, sender, "final", base_time());
    frame["message"]["edited_at"] = serde_json::json!(newer_edit);
    assert!(session.handle_delta(frame).await);
    assert_eq!(session.message(m42).await.unwrap().content, "final");
}

#[tokio::test]
async fn identity_converges_after_resolution() {
    let (session, transport, _, _) = setup();
    let permanent = Uuid::new_v4();
    transport.script_send_ok(permanent, base_time()).await;

    let resolved = session.send_message("converge").await.unwrap();
    assert_eq!(resolved, permanent);

    let messages = session.messages().await;
    let by_permanent: Vec<_> = messages.iter().filter(|m| m.id == permanent).collect();
    assert_eq!(by_permanent.len(), 1);
    assert!(messages.iter().all(|m| m.provisional_id.is_none()));
    assert_eq!(by_permanent[0].content, "converge");
}

#[tokio::test]
async fn list_stays_sorted_and_duplicate_free_across_sources() {
    let (session, transport, _, conversation_id) = setup();
    let sender = Uuid::new_v4();
    let shared_id = Uuid::new_v4();

    transport
        .script_history(Ok(HistoryPage {
            records: vec![
                history_record_value(shared_id, conversation_id, sender, "b", base_time() + ChronoDuration::seconds(20)),
                history_record_value(Uuid::new_v4(), conversation_id, sender, "a", base_time() + ChronoDuration::seconds(10)),
            ],
            has_more: false,
        }))
        .await;
    session.load_older().await.unwrap();

    // The realtime stream redelivers one record and adds another in between.
    session
        .handle_delta(delta_new_frame(
            shared_id,
            conversation_id,
            sender,
            "b",
            base_time() + ChronoDuration::seconds(20),
        ))
        .await;
    session
        .handle_delta(delta_new_frame(
            Uuid::new_v4(),
            conversation_id,
            sender,
            "between",
            base_time() + ChronoDuration::seconds(15),
        ))
        .await;
    transport.script_send_ok(Uuid::new_v4(), base_time() + ChronoDuration::seconds(30)).await;
    session.send_message("newest").await.unwrap();

    let messages = session.messages().await;
    assert_eq!(messages.len(), 4);
    let keys: Vec<_> = messages.iter().map(|m| m.sort_key()).collect();
    let sorted = {
        let mut sorted = keys.clone();
        sorted.sort();
        sorted
    };
    assert_eq!(keys, sorted);
    let unique_ids: std::collections::HashSet<Uuid> = messages.iter().map(|m| m.id).collect();
    assert_eq!(unique_ids.len(), 4);
}

#[tokio::test]
async fn subscribers_get_one_notification_per_changing_ingest() {
    let (session, transport, _, conversation_id) = setup();
    let mut updates = session.subscribe();
    let sender = Uuid::new_v4();

    // One page with three records: exactly one notification.
    transport
        .script_history(Ok(HistoryPage {
            records: (0..3)
                .map(|i| {
                    history_record_value(
                        Uuid::new_v4(),
                        conversation_id,
                        sender,
                        "hi",
                        base_time() + ChronoDuration::seconds(i),
                    )
                })
                .collect(),
            has_more: false,
        }))
        .await;
    session.load_older().await.unwrap();

    let update = updates.try_recv().unwrap();
    assert_eq!(update.conversation_id, conversation_id);
    assert_eq!(updates.try_recv().unwrap_err(), TryRecvError::Empty);

    // A delta that changes nothing sends nothing.
    let duplicate = delta_new_frame(
        session.messages().await[0].id,
        conversation_id,
        sender,
        "hi",
        session.messages().await[0].created_at,
    );
    assert!(!session.handle_delta(duplicate).await);
    assert_eq!(updates.try_recv().unwrap_err(), TryRecvError::Empty);
}
