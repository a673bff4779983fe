use lunora_core::model::{QuestionDraft, SessionId, StudySession, UserId};
use lunora_core::time::fixed_now;
use lunora_storage::repository::{SessionRecord, SessionStore};
use lunora_storage::sqlite::SqliteSessionStore;

fn draft(subtopic: &str) -> QuestionDraft {
    QuestionDraft {
        prompt: format!("About {subtopic}?"),
        subtopic: Some(subtopic.to_string()),
        options: vec!["yes".to_string(), "no".to_string()],
        correct_answer_index: 0,
    }
}

fn build_session(user: &str, subject: &str) -> StudySession {
    StudySession::new(
        SessionId::generate(),
        UserId::new(user).unwrap(),
        subject,
        "Topic",
        "source text",
        vec![draft("Loops"), draft("Loops"), draft("Arrays")],
        fixed_now(),
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_roundtrip_preserves_answers_and_history() {
    let repo = SqliteSessionStore::connect("sqlite:file:memdb_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let mut session = build_session("u1", "Programming");
    session.record_answer(0, 0, fixed_now()).unwrap();
    session.record_answer(1, 1, fixed_now()).unwrap();
    session.record_answer(2, 0, fixed_now()).unwrap();
    session.complete(fixed_now());

    repo.upsert(&SessionRecord::from_session(&session))
        .await
        .unwrap();

    let fetched = repo.get(session.id()).await.unwrap().expect("present");
    let rebuilt = fetched.into_session().unwrap();

    assert_eq!(rebuilt, session);
    assert_eq!(rebuilt.attempts().len(), 1);
    assert_eq!(rebuilt.attempts()[0].score_percentage(), 67);
    assert_eq!(rebuilt.questions()[1].user_answer_index(), Some(1));
}

#[tokio::test]
async fn sqlite_upsert_replaces_the_whole_document() {
    let repo = SqliteSessionStore::connect("sqlite:file:memdb_upsert?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let mut session = build_session("u1", "Programming");
    repo.upsert(&SessionRecord::from_session(&session))
        .await
        .unwrap();

    session.record_answer(0, 0, fixed_now()).unwrap();
    repo.upsert(&SessionRecord::from_session(&session))
        .await
        .unwrap();

    let fetched = repo.get(session.id()).await.unwrap().expect("present");
    assert_eq!(fetched.completed_questions, 1);
    assert_eq!(fetched.correct_answers, 1);
}

#[tokio::test]
async fn sqlite_lists_by_user_and_subject() {
    let repo = SqliteSessionStore::connect("sqlite:file:memdb_lists?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let prog = build_session("u1", "Programming");
    let hist = build_session("u1", "History");
    let other = build_session("u2", "Programming");
    for s in [&prog, &hist, &other] {
        repo.upsert(&SessionRecord::from_session(s)).await.unwrap();
    }

    let user = UserId::new("u1").unwrap();
    let all = repo.list_for_user(&user).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|r| r.user_id == "u1"));

    let programming = repo.list_for_subject(&user, "Programming").await.unwrap();
    assert_eq!(programming.len(), 1);
    assert_eq!(programming[0].id, prog.id());
}

#[tokio::test]
async fn sqlite_deletes_single_and_by_subject() {
    let repo = SqliteSessionStore::connect("sqlite:file:memdb_deletes?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let a = build_session("u1", "Programming");
    let b = build_session("u1", "Programming");
    let c = build_session("u1", "History");
    let d = build_session("u2", "Programming");
    for s in [&a, &b, &c, &d] {
        repo.upsert(&SessionRecord::from_session(s)).await.unwrap();
    }

    assert!(repo.delete(a.id()).await.unwrap());
    assert!(!repo.delete(a.id()).await.unwrap());

    let user = UserId::new("u1").unwrap();
    let removed = repo.delete_for_subject(&user, "Programming").await.unwrap();
    assert_eq!(removed, 1);

    assert!(repo.get(b.id()).await.unwrap().is_none());
    assert!(repo.get(c.id()).await.unwrap().is_some());
    assert!(repo.get(d.id()).await.unwrap().is_some());
}
