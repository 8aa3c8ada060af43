//! Assistant pipeline integration tests
//!
//! Drive whole command cycles against an in-memory store with a
//! scripted chat backend, covering the routing, extraction, duplicate
//! and ownership behavior end to end.

use chrono::{Datelike, Duration, Utc};
use satchel_gateway::assistant::{Assistant, Outcome, Session};
use satchel_gateway::db::{ExamRepo, NewReminder, ReminderRepo};
use satchel_gateway::Error;

mod common;

use common::{create_test_user, setup_test_db, ScriptReply, ScriptedChat};

fn next_month_date() -> String {
    let due = Utc::now() + Duration::days(30);
    format!("{}-{:02}-{:02}", due.year(), due.month(), due.day())
}

#[tokio::test]
async fn test_create_then_query_round_trip() {
    let db = setup_test_db();
    let user = create_test_user(&db, "rhea");
    let due = next_month_date();

    let chat = ScriptedChat::new(vec![ScriptReply::text(format!(
        r#"{{"type":"reminder","title":"Maths HW","subject":"Maths","date":"{due}"}}"#
    ))]);
    let assistant = Assistant::new(db, chat.clone());
    let mut session = Session::new();

    // Create: no open reminders exist yet, so the duplicate guard must
    // short-circuit without a model call
    let outcome = assistant
        .classify_and_execute("remind me about maths hw", &mut session, &user)
        .await
        .unwrap();

    let Outcome::Reminder { title, subject, .. } = outcome else {
        panic!("expected reminder outcome");
    };
    assert_eq!(title, "Maths HW");
    assert_eq!(subject, "Maths");
    assert_eq!(chat.call_count(), 1);

    // Query: the open-records listing goes into the prompt and the
    // model's answer comes back verbatim
    chat.push(ScriptReply::text(format!(
        "You have 1 pending assignment: Maths HW due {due}."
    )));

    let outcome = assistant
        .classify_and_execute("what's pending", &mut session, &user)
        .await
        .unwrap();

    let Outcome::Response { message } = outcome else {
        panic!("expected response outcome");
    };
    assert!(message.contains("Maths HW"));
    assert!(chat.prompt(1).contains("Maths HW"));

    // Both cycles appended their turns
    assert_eq!(session.history().len(), 4);
}

#[tokio::test]
async fn test_identical_create_rejected_as_duplicate() {
    let db = setup_test_db();
    let user = create_test_user(&db, "rhea");
    let due = next_month_date();

    let reminder_json = format!(
        r#"{{"type":"reminder","title":"Maths HW","subject":"Maths","date":"{due}"}}"#
    );

    let chat = ScriptedChat::new(vec![
        ScriptReply::text(reminder_json.clone()),
        // Second cycle: extraction, then the guard's similarity verdict
        ScriptReply::text(reminder_json),
        ScriptReply::text("DUPLICATE|Same assignment already exists"),
    ]);
    let assistant = Assistant::new(db.clone(), chat.clone());
    let mut session = Session::new();

    assistant
        .classify_and_execute("remind me about maths hw", &mut session, &user)
        .await
        .unwrap();

    let outcome = assistant
        .classify_and_execute("remind me about maths hw", &mut session, &user)
        .await
        .unwrap();

    let Outcome::Response { message } = outcome else {
        panic!("expected rejection response");
    };
    assert_eq!(message, "Same assignment already exists");

    // Only the first insert landed
    assert_eq!(ReminderRepo::new(db).list_all().unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_guard_fails_open_on_upstream_error() {
    let db = setup_test_db();
    let user = create_test_user(&db, "rhea");
    let reminders = ReminderRepo::new(db.clone());

    reminders
        .create(
            &NewReminder {
                title: "Physics lab".to_string(),
                subject: "Physics".to_string(),
                deadline: Utc::now() + Duration::days(10),
                description: None,
            },
            &user.id,
        )
        .unwrap();

    let due = next_month_date();
    let chat = ScriptedChat::new(vec![
        ScriptReply::text(format!(
            r#"{{"type":"reminder","title":"Maths HW","subject":"Maths","date":"{due}"}}"#
        )),
        // The guard's model call fails; creation must proceed
        ScriptReply::RateLimited,
    ]);
    let assistant = Assistant::new(db, chat);
    let mut session = Session::new();

    let outcome = assistant
        .classify_and_execute("remind me about maths hw", &mut session, &user)
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::Reminder { .. }));
    assert_eq!(reminders.list_all().unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_scoped_by_subject_and_owner() {
    let db = setup_test_db();
    let user = create_test_user(&db, "rhea");
    let reminders = ReminderRepo::new(db.clone());

    let mut maths_ids = Vec::new();
    for title in ["Maths HW 1", "Maths HW 2"] {
        let r = reminders
            .create(
                &NewReminder {
                    title: title.to_string(),
                    subject: "Maths".to_string(),
                    deadline: Utc::now() + Duration::days(5),
                    description: None,
                },
                &user.id,
            )
            .unwrap();
        maths_ids.push(r.id);
    }
    let physics = reminders
        .create(
            &NewReminder {
                title: "Physics lab".to_string(),
                subject: "Physics".to_string(),
                deadline: Utc::now() + Duration::days(5),
                description: None,
            },
            &user.id,
        )
        .unwrap();

    let chat = ScriptedChat::new(vec![ScriptReply::text(format!(
        r#"{{"type":"delete","item_type":"reminder","item_ids":["{}","{}"]}}"#,
        maths_ids[0], maths_ids[1]
    ))]);
    let assistant = Assistant::new(db, chat.clone());
    let mut session = Session::new();

    let outcome = assistant
        .classify_and_execute("delete all maths assignments", &mut session, &user)
        .await
        .unwrap();

    let Outcome::DeleteSuccess {
        message,
        item_type,
        count,
    } = outcome
    else {
        panic!("expected delete outcome");
    };
    assert_eq!(count, 2);
    assert_eq!(item_type, "reminder");
    assert_eq!(message, "Successfully deleted 2 reminders");

    // The extractor was shown the caller's records, IDs included
    let prompt = chat.prompt(0);
    assert!(prompt.contains(&maths_ids[0]));
    assert!(prompt.contains("Physics lab"));

    // The physics reminder survived
    let left = reminders.list_all().unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, physics.id);
}

#[tokio::test]
async fn test_delete_foreign_ids_silently_excluded() {
    let db = setup_test_db();
    let rhea = create_test_user(&db, "rhea");
    let dev = create_test_user(&db, "dev");
    let reminders = ReminderRepo::new(db.clone());

    let devs = reminders
        .create(
            &NewReminder {
                title: "Dev's essay".to_string(),
                subject: "English".to_string(),
                deadline: Utc::now() + Duration::days(5),
                description: None,
            },
            &dev.id,
        )
        .unwrap();

    // Rhea needs at least one open record or extraction short-circuits
    reminders
        .create(
            &NewReminder {
                title: "Maths HW".to_string(),
                subject: "Maths".to_string(),
                deadline: Utc::now() + Duration::days(5),
                description: None,
            },
            &rhea.id,
        )
        .unwrap();

    // A confused model hands back someone else's ID
    let chat = ScriptedChat::new(vec![ScriptReply::text(format!(
        r#"{{"type":"delete","item_type":"reminder","item_ids":["{}"]}}"#,
        devs.id
    ))]);
    let assistant = Assistant::new(db, chat);
    let mut session = Session::new();

    let outcome = assistant
        .classify_and_execute("delete the essay", &mut session, &rhea)
        .await
        .unwrap();

    let Outcome::DeleteSuccess { message, count, .. } = outcome else {
        panic!("expected delete outcome");
    };
    assert_eq!(count, 0);
    assert_eq!(message, "Successfully deleted 0 reminders");

    // Dev's reminder is untouched
    assert_eq!(reminders.list_all().unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_with_nothing_open_clarifies_without_model() {
    let db = setup_test_db();
    let user = create_test_user(&db, "rhea");

    let chat = ScriptedChat::new(vec![]);
    let assistant = Assistant::new(db, chat.clone());
    let mut session = Session::new();

    let outcome = assistant
        .classify_and_execute("delete my maths homework", &mut session, &user)
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::Clarification { .. }));
    assert_eq!(chat.call_count(), 0);
}

#[tokio::test]
async fn test_exam_without_date_yields_clarification() {
    let db = setup_test_db();
    let user = create_test_user(&db, "rhea");

    let chat = ScriptedChat::new(vec![ScriptReply::text(
        r#"{"type":"exam","subject":"Java"}"#,
    )]);
    let assistant = Assistant::new(db.clone(), chat);
    let mut session = Session::new();

    let outcome = assistant
        .classify_and_execute("schedule java exam", &mut session, &user)
        .await
        .unwrap();

    let Outcome::Clarification { message } = outcome else {
        panic!("expected clarification");
    };
    assert!(message.contains("Java"));

    // Nothing was persisted
    assert!(ExamRepo::new(db).list_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_exam_type_normalized_through_pipeline() {
    let db = setup_test_db();
    let user = create_test_user(&db, "rhea");
    let due = next_month_date();

    let chat = ScriptedChat::new(vec![ScriptReply::text(format!(
        r#"{{"type":"exam","subject":"Java","date":"{due}","time":"10:00","exam_type":"surprise quiz"}}"#
    ))]);
    let assistant = Assistant::new(db.clone(), chat);
    let mut session = Session::new();

    let outcome = assistant
        .classify_and_execute("schedule java quiz", &mut session, &user)
        .await
        .unwrap();

    let Outcome::Exam { exam_type, .. } = outcome else {
        panic!("expected exam outcome");
    };
    assert_eq!(exam_type, "Internal Test");

    let exams = ExamRepo::new(db).list_all().unwrap();
    assert_eq!(exams.len(), 1);
    assert_eq!(exams[0].exam_type, "Internal Test");
    assert_eq!(exams[0].uploader_name, "rhea");
}

#[tokio::test]
async fn test_extractor_delete_shape_overrides_create_route() {
    let db = setup_test_db();
    let user = create_test_user(&db, "rhea");
    let reminders = ReminderRepo::new(db.clone());

    let mine = reminders
        .create(
            &NewReminder {
                title: "Maths HW".to_string(),
                subject: "Maths".to_string(),
                deadline: Utc::now() + Duration::days(5),
                description: None,
            },
            &user.id,
        )
        .unwrap();

    // No delete keyword, so the fast path routes to create; the model
    // disagrees and the pipeline re-routes through the delete flow
    let chat = ScriptedChat::new(vec![
        ScriptReply::text(r#"{"type":"delete"}"#),
        ScriptReply::text(format!(
            r#"{{"type":"delete","item_type":"reminder","item_ids":["{}"]}}"#,
            mine.id
        )),
    ]);
    let assistant = Assistant::new(db, chat.clone());
    let mut session = Session::new();

    let outcome = assistant
        .classify_and_execute("i'm done with the maths homework, drop it", &mut session, &user)
        .await
        .unwrap();

    let Outcome::DeleteSuccess { count, .. } = outcome else {
        panic!("expected delete outcome");
    };
    assert_eq!(count, 1);
    assert_eq!(chat.call_count(), 2);
    assert!(reminders.list_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_model_output_fails_cycle_and_keeps_session() {
    let db = setup_test_db();
    let user = create_test_user(&db, "rhea");

    let chat = ScriptedChat::new(vec![ScriptReply::text(
        "Sorry, I could not make sense of that.",
    )]);
    let assistant = Assistant::new(db, chat);
    let mut session = Session::new();

    let err = assistant
        .classify_and_execute("remind me about maths hw", &mut session, &user)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MalformedModelOutput(_)));
    // Failed cycles append nothing
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_upstream_rate_limit_surfaces_from_extraction() {
    let db = setup_test_db();
    let user = create_test_user(&db, "rhea");

    let chat = ScriptedChat::new(vec![ScriptReply::RateLimited]);
    let assistant = Assistant::new(db, chat);
    let mut session = Session::new();

    let err = assistant
        .classify_and_execute("remind me about maths hw", &mut session, &user)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UpstreamRateLimited(_)));
}

#[tokio::test]
async fn test_history_is_bounded_in_prompts() {
    let db = setup_test_db();
    let user = create_test_user(&db, "rhea");

    let chat = ScriptedChat::new(vec![ScriptReply::text("All caught up!")]);
    let assistant = Assistant::new(db, chat.clone());

    let mut session = Session::new();
    for i in 0..30 {
        session.push_user(format!("old turn {i}"));
    }

    assistant
        .classify_and_execute("what's pending", &mut session, &user)
        .await
        .unwrap();

    // system + 20 recent turns + the query prompt
    let messages = chat.messages(0);
    assert_eq!(messages.len(), 22);
    assert_eq!(messages[1].content, "old turn 10");
}
