// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Save, leave-guard and delete flows against the fake backend.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use edit_session_core::{
    DeleteOutcome, EditSession, FieldIssue, FieldValue, IssueKind, LeaveChoice, LookupOption,
    NoticeKind, NoticeTopic, RecordId, Resolution, SessionConfig, SessionError, TagEntry,
};
use edit_session_dry_tests::{
    admin, blog_schema, owner, project_record, project_schema, stranger, viewer, FakeEntityPort,
    ScriptedConfirm, PROJECT_ID,
};
use serde_json::json;

fn project_port() -> FakeEntityPort {
    FakeEntityPort::new().with_record(PROJECT_ID, project_record())
}

async fn edited_project(port: &FakeEntityPort) -> EditSession {
    let mut session = EditSession::new(project_schema(), admin(), SessionConfig::default());
    session.load(port, &RecordId::Num(PROJECT_ID)).await.unwrap();
    session.set_field("project_title", json!("Demo Two")).unwrap();
    session
}

#[tokio::test]
async fn save_rebaselines_and_sends_wire_payload() {
    let port = project_port();
    let mut session = edited_project(&port).await;

    let receipt = session.save(&port).await.unwrap();
    assert_eq!(receipt.id, Some(RecordId::Num(PROJECT_ID)));
    assert!(!session.is_dirty());
    assert_eq!(
        session.snapshot().get("project_title"),
        Some(&FieldValue::text("Demo Two"))
    );

    let payload = port.last_payload().unwrap();
    assert_eq!(payload["id"], json!(PROJECT_ID));
    assert_eq!(payload["project_title"], json!("Demo Two"));
    assert_eq!(payload["url"], json!("demo-two"));
    assert_eq!(payload["budget"], json!(1500));
    assert_eq!(
        payload["skills"],
        json!([
            {"skill_id": 11, "skill_name": "Editing"},
            {"skill_id": 12, "skill_name": "Color"}
        ])
    );
    assert_eq!(payload["thumbnail"], json!("https://cdn.example/thumb.png"));

    let notices = session.drain_notices();
    assert!(notices.iter().any(|n| n.topic == NoticeTopic::Saved));
}

#[tokio::test]
async fn failed_save_keeps_edits_and_allows_retry() {
    let port = project_port();
    let mut session = edited_project(&port).await;
    port.set_fail_on_save(true);

    let err = session.save(&port).await.unwrap_err();
    assert!(matches!(&err, SessionError::TransportFailed(msg) if msg.contains("503")));
    assert!(session.is_dirty());
    assert_eq!(session.field("project_title"), Some(&FieldValue::text("Demo Two")));
    assert_eq!(
        session.snapshot().get("project_title"),
        Some(&FieldValue::text("Demo"))
    );
    let notices = session.drain_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NoticeKind::Error);
    assert_eq!(notices[0].topic, NoticeTopic::Transport);

    port.set_fail_on_save(false);
    session.save(&port).await.unwrap();
    assert!(!session.is_dirty());
    assert_eq!(port.save_count(), 2);
}

#[tokio::test]
async fn validation_failure_never_reaches_the_backend() {
    let port = project_port();
    let mut session = edited_project(&port).await;
    session.set_field("project_title", json!("   ")).unwrap();

    let err = session.save(&port).await.unwrap_err();
    assert_eq!(
        err,
        SessionError::ValidationFailed(vec![FieldIssue {
            field: "project_title".into(),
            kind: IssueKind::Missing,
        }])
    );
    assert_eq!(err.to_string(), "validation failed: project_title (required)");
    assert_eq!(port.save_count(), 0);
    assert!(session
        .drain_notices()
        .iter()
        .any(|n| n.topic == NoticeTopic::Validation));
}

#[tokio::test]
async fn new_entity_gets_server_id_on_first_save() {
    let port = FakeEntityPort::new();
    let mut session = EditSession::new_entity(
        blog_schema(),
        owner(),
        SessionConfig::default(),
        &json!({"title": "Launch Notes", "content": "We shipped."}),
    )
    .unwrap();
    assert_eq!(session.field("slug"), Some(&FieldValue::text("launch-notes")));
    assert!(session.can_mutate());

    let receipt = session.save(&port).await.unwrap();
    assert_eq!(receipt.id, Some(RecordId::Num(1000)));
    assert_eq!(session.entity_id(), Some(&RecordId::Num(1000)));
    assert!(port.payloads()[0].get("id").is_none());

    session.set_field("content", json!("We shipped today.")).unwrap();
    session.save(&port).await.unwrap();
    assert_eq!(port.payloads()[1]["id"], json!(1000));
    assert_eq!(port.save_count(), 2);
}

#[tokio::test]
async fn save_and_leave_saves_then_allows() {
    let port = project_port();
    let confirm = ScriptedConfirm::new().answering(LeaveChoice::SaveAndLeave);
    let mut session = edited_project(&port).await;

    let outcome = session.request_navigate("/dashboard", &port, &confirm).await;
    assert_eq!(outcome.resolution, Resolution::Saved);
    assert!(outcome.allowed());
    assert!(!session.is_dirty());
    assert_eq!(port.save_count(), 1);

    let prompts = confirm.leave_prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].entity, "project");
    assert_eq!(prompts[0].target, "/dashboard");
    assert!(prompts[0].dirty_fields.contains(&"project_title".to_string()));
}

#[tokio::test]
async fn failed_save_and_leave_denies_navigation() {
    let port = project_port();
    port.set_fail_on_save(true);
    let confirm = ScriptedConfirm::new().answering(LeaveChoice::SaveAndLeave);
    let mut session = edited_project(&port).await;

    let outcome = session.request_navigate("/dashboard", &port, &confirm).await;
    assert!(matches!(
        outcome.resolution,
        Resolution::SaveFailed(SessionError::TransportFailed(_))
    ));
    assert!(!outcome.allowed());
    assert!(session.is_dirty());
}

#[tokio::test]
async fn cancel_keeps_session_dirty() {
    let port = project_port();
    let confirm = ScriptedConfirm::new().answering(LeaveChoice::Cancel);
    let mut session = edited_project(&port).await;

    let outcome = session.request_navigate("/dashboard", &port, &confirm).await;
    assert_eq!(outcome.resolution, Resolution::Cancelled);
    assert!(!outcome.allowed());
    assert!(session.has_unsaved_changes());
    assert_eq!(port.save_count(), 0);
}

#[tokio::test]
async fn clean_session_leaves_without_prompt() {
    let port = project_port();
    let confirm = ScriptedConfirm::new();
    let mut session = EditSession::new(project_schema(), admin(), SessionConfig::default());
    session.load(&port, &RecordId::Num(PROJECT_ID)).await.unwrap();

    let outcome = session.request_navigate("/", &port, &confirm).await;
    assert_eq!(outcome.resolution, Resolution::Unguarded);
    assert!(confirm.leave_prompts().is_empty());
}

#[tokio::test]
async fn read_only_session_denies_edits_once_and_never_prompts() {
    for actor in [viewer(), stranger()] {
        let port = project_port();
        let confirm = ScriptedConfirm::new();
        let mut session = EditSession::new(project_schema(), actor, SessionConfig::default());
        session.load(&port, &RecordId::Num(PROJECT_ID)).await.unwrap();
        assert!(!session.can_mutate());

        for title in ["a", "ab", "abc"] {
            assert_eq!(
                session.set_field("project_title", json!(title)),
                Err(SessionError::Unauthorized)
            );
        }
        assert_eq!(
            session.add_tag("skills", TagEntry::keyed(13, "Sound")),
            Err(SessionError::Unauthorized)
        );
        let denials = session
            .drain_notices()
            .into_iter()
            .filter(|n| n.topic == NoticeTopic::AccessDenied)
            .count();
        assert_eq!(denials, 1);
        assert!(!session.is_dirty());
        assert!(!session.has_unsaved_changes());

        assert_eq!(session.save(&port).await, Err(SessionError::Unauthorized));
        let outcome = session.request_navigate("/", &port, &confirm).await;
        assert_eq!(outcome.resolution, Resolution::Unguarded);
        assert!(confirm.leave_prompts().is_empty());
    }
}

#[tokio::test]
async fn owner_can_edit_their_project() {
    let port = project_port();
    let mut session = EditSession::new(project_schema(), owner(), SessionConfig::default());
    session.load(&port, &RecordId::Num(PROJECT_ID)).await.unwrap();
    assert!(session.can_mutate());
    session.set_field("budget", json!("2500")).unwrap();
    assert_eq!(session.field("budget"), Some(&FieldValue::Scalar(json!(2500))));
}

#[tokio::test]
async fn delete_asks_first_then_makes_session_read_only() {
    let port = project_port();
    let declined = ScriptedConfirm::new();
    let mut session = edited_project(&port).await;

    assert_eq!(
        session.delete(&port, &declined).await,
        Ok(DeleteOutcome::Cancelled)
    );
    assert_eq!(port.delete_count(), 0);
    assert!(session.can_mutate());
    assert_eq!(declined.delete_prompts()[0].id, RecordId::Num(PROJECT_ID));

    let confirm = ScriptedConfirm::new().confirming_delete(true);
    assert_eq!(session.delete(&port, &confirm).await, Ok(DeleteOutcome::Deleted));
    assert_eq!(port.deleted(), vec![RecordId::Num(PROJECT_ID)]);
    assert!(!session.can_mutate());
    assert!(!session.has_unsaved_changes());

    let outcome = session.request_navigate("/projects", &port, &confirm).await;
    assert_eq!(outcome.resolution, Resolution::Unguarded);
    assert!(confirm.leave_prompts().is_empty());
}

#[tokio::test]
async fn delete_needs_a_persisted_entity_and_permission() {
    let port = FakeEntityPort::new();
    let confirm = ScriptedConfirm::new().confirming_delete(true);

    let mut fresh = EditSession::new(project_schema(), admin(), SessionConfig::default());
    assert_eq!(
        fresh.delete(&port, &confirm).await,
        Err(SessionError::NotPersisted)
    );

    let port = project_port();
    let mut read_only = EditSession::new(project_schema(), viewer(), SessionConfig::default());
    read_only.load(&port, &RecordId::Num(PROJECT_ID)).await.unwrap();
    assert_eq!(
        read_only.delete(&port, &confirm).await,
        Err(SessionError::Unauthorized)
    );
    assert!(confirm.delete_prompts().is_empty());
}

#[tokio::test]
async fn failed_delete_leaves_session_editable() {
    let port = project_port();
    port.set_fail_on_delete(true);
    let confirm = ScriptedConfirm::new().confirming_delete(true);
    let mut session = edited_project(&port).await;

    assert!(matches!(
        session.delete(&port, &confirm).await,
        Err(SessionError::TransportFailed(_))
    ));
    assert!(session.can_mutate());
    assert!(session.has_unsaved_changes());
}

#[tokio::test]
async fn lookup_options_feed_tag_pickers() {
    let port = project_port().with_lookup(
        "skills",
        vec![
            LookupOption {
                id: RecordId::Num(11),
                label: "Editing".into(),
            },
            LookupOption {
                id: RecordId::Num(13),
                label: "Sound".into(),
            },
        ],
    );
    let mut session = EditSession::new(project_schema(), admin(), SessionConfig::default());
    session.load(&port, &RecordId::Num(PROJECT_ID)).await.unwrap();

    let options = session.lookup_options(&port, "skills").await.unwrap();
    assert_eq!(options.len(), 2);
    let added: Vec<bool> = options
        .into_iter()
        .map(|opt| session.add_tag("skills", opt.into()).unwrap())
        .collect();
    assert_eq!(added, vec![false, true]);
    assert_eq!(session.dirty_fields(), vec!["skills".to_string()]);

    port.set_fail_on_lookup(true);
    assert!(matches!(
        session.lookup_options(&port, "skills").await,
        Err(SessionError::TransportFailed(_))
    ));
}
