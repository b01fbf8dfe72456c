//! End-to-end job tests against the in-memory store and fake providers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use dailyprep_core::assign::{assign_daily, AssignOutcome};
use dailyprep_core::dataset::upload_questions;
use dailyprep_core::error::{AssignError, EvaluationError, FeedError, SubmissionError};
use dailyprep_core::evaluation::{
    evaluate_answer, evaluation_stats, parse_rubric, submit_peer_evaluation, CRITERIA,
};
use dailyprep_core::feed::{add_comment, feed_page, share_answer, toggle_like};
use dailyprep_core::model::{
    DailyRecord, EvaluationSource, MainsQuestion, Post, PrelimsQuestion, PushToken, QuestionKind,
    UserProfile,
};
use dailyprep_core::push::{
    dispatch, Notification, PushPolicy, DEVICE_NOT_REGISTERED, MAX_BATCH_SIZE,
};
use dailyprep_core::submission::{record_answer_copy, submit_prelims, PointsPolicy};
use dailyprep_core::traits::{
    AnswerEvaluator, EvaluationReply, EvaluationRequest, ImageData, ImageHost, PushErrorDetails,
    PushGateway, PushMessage, PushTicket, Store,
};
use dailyprep_providers::MemoryStore;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
}

fn prelims(id: &str, answer: usize) -> PrelimsQuestion {
    PrelimsQuestion {
        id: id.into(),
        question: format!("Question {id}?"),
        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        answer,
        explanation: None,
        subject: Some("Polity".into()),
        year: None,
    }
}

fn mains(id: &str) -> MainsQuestion {
    MainsQuestion {
        id: id.into(),
        question: format!("Discuss topic {id}."),
        paper: Some("GS2".into()),
        marks: Some(10),
        word_limit: Some(150),
    }
}

fn token(id: &str, value: &str, failures: u32) -> PushToken {
    PushToken {
        id: id.into(),
        user_id: format!("user-{id}"),
        token: value.into(),
        failure_count: failures,
        created_at: Utc::now(),
    }
}

fn image(name: &str) -> ImageData {
    ImageData {
        file_name: name.into(),
        mime_type: ImageData::mime_for(name).into(),
        bytes: vec![0xff, 0xd8, 0xff],
    }
}

fn assign(store: &MemoryStore, kind: QuestionKind, date: NaiveDate, question_id: &str) {
    store.add_daily_record(
        kind,
        DailyRecord {
            date,
            question_id: question_id.into(),
            created_at: Utc::now(),
        },
    );
}

fn notification() -> Notification {
    Notification {
        title: "Daily question".into(),
        body: "Ready".into(),
        data: serde_json::json!({}),
    }
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Tokens containing "dead" are unregistered, tokens containing "flaky" fail.
#[derive(Default)]
struct FakeGateway {
    fail_all: bool,
    calls: AtomicUsize,
    largest_batch: AtomicUsize,
}

#[async_trait]
impl PushGateway for FakeGateway {
    fn name(&self) -> &str {
        "fake"
    }

    async fn send(&self, messages: &[PushMessage]) -> Result<Vec<PushTicket>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.largest_batch.fetch_max(messages.len(), Ordering::SeqCst);
        if self.fail_all {
            anyhow::bail!("gateway unavailable");
        }
        Ok(messages
            .iter()
            .map(|m| {
                if m.to.contains("dead") {
                    PushTicket::Error {
                        message: "not registered".into(),
                        details: Some(PushErrorDetails {
                            error: Some(DEVICE_NOT_REGISTERED.into()),
                        }),
                    }
                } else if m.to.contains("flaky") {
                    PushTicket::Error {
                        message: "temporary failure".into(),
                        details: None,
                    }
                } else {
                    PushTicket::Ok {
                        id: format!("ticket-{}", m.to),
                    }
                }
            })
            .collect())
    }
}

struct FakeEvaluator {
    reply: String,
}

impl FakeEvaluator {
    fn scoring(score: f64) -> Self {
        let criteria: Vec<serde_json::Value> = CRITERIA
            .iter()
            .map(|name| {
                serde_json::json!({
                    "name": name, "score": score, "max_score": 2.0, "comment": "ok"
                })
            })
            .collect();
        let reply = serde_json::json!({
            "total_score": score * CRITERIA.len() as f64,
            "max_score": 10.0,
            "criteria": criteria,
            "strengths": ["clear intro"],
            "improvements": ["add data"],
            "summary": "decent"
        });
        Self {
            reply: format!("```json\n{reply}\n```"),
        }
    }
}

#[async_trait]
impl AnswerEvaluator for FakeEvaluator {
    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationReply> {
        assert!(!request.images.is_empty());
        Ok(EvaluationReply {
            text: self.reply.clone(),
            model: "fake-model".into(),
            latency_ms: 1,
        })
    }
}

#[derive(Default)]
struct FakeHost {
    uploads: AtomicUsize,
}

#[async_trait]
impl ImageHost for FakeHost {
    fn name(&self) -> &str {
        "fake"
    }

    async fn upload(&self, image: &ImageData) -> Result<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(format!("https://img.test/{}", image.file_name))
    }
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn assignment_never_repeats_until_exhausted() {
    let store = MemoryStore::new();
    for i in 0..5 {
        store.add_mains_question(mains(&format!("m{i}")));
    }
    let mut rng = StdRng::seed_from_u64(7);

    let mut seen = HashSet::new();
    for d in 1..=5 {
        let outcome = assign_daily(&store, QuestionKind::Mains, day(d), &mut rng)
            .await
            .unwrap();
        assert!(matches!(outcome, AssignOutcome::Assigned(_)));
        assert!(seen.insert(outcome.record().question_id.clone()));
    }

    let err = assign_daily(&store, QuestionKind::Mains, day(6), &mut rng)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AssignError>(),
        Some(AssignError::PoolExhausted { pool_size: 5, .. })
    ));
    assert_eq!(store.daily_inserts(), 5);
}

#[tokio::test]
async fn assignment_is_idempotent_per_date() {
    let store = MemoryStore::new();
    store.add_prelims_question(prelims("p1", 0));
    store.add_prelims_question(prelims("p2", 0));
    store.add_daily_record(
        QuestionKind::Prelims,
        DailyRecord {
            date: day(3),
            question_id: "p2".into(),
            created_at: Utc::now(),
        },
    );
    let mut rng = StdRng::seed_from_u64(1);

    let outcome = assign_daily(&store, QuestionKind::Prelims, day(3), &mut rng)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        AssignOutcome::AlreadyAssigned(
            store
                .daily_record(QuestionKind::Prelims, day(3))
                .await
                .unwrap()
                .unwrap()
        )
    );
    assert_eq!(store.daily_inserts(), 0);

    // The other track is independent.
    store.add_mains_question(mains("m1"));
    let outcome = assign_daily(&store, QuestionKind::Mains, day(3), &mut rng)
        .await
        .unwrap();
    assert_eq!(outcome.record().question_id, "m1");
}

#[tokio::test]
async fn lost_race_reports_winner() {
    let store = MemoryStore::new();
    store.add_mains_question(mains("m1"));
    store.add_mains_question(mains("m2"));
    store.simulate_race(
        QuestionKind::Mains,
        DailyRecord {
            date: day(9),
            question_id: "winner".into(),
            created_at: Utc::now(),
        },
    );
    let mut rng = StdRng::seed_from_u64(3);

    let outcome = assign_daily(&store, QuestionKind::Mains, day(9), &mut rng)
        .await
        .unwrap();
    match outcome {
        AssignOutcome::AlreadyAssigned(record) => assert_eq!(record.question_id, "winner"),
        other => panic!("expected AlreadyAssigned, got {other:?}"),
    }
    assert_eq!(store.daily_inserts(), 0);
}

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn prelims_scoring_and_streak() {
    let store = MemoryStore::new();
    store.add_user(UserProfile::new("u1", "Asha"));
    store.add_prelims_question(prelims("p1", 2));
    store.add_prelims_question(prelims("p2", 0));
    assign(&store, QuestionKind::Prelims, day(10), "p1");
    assign(&store, QuestionKind::Prelims, day(11), "p2");
    let policy = PointsPolicy::default();

    let sub = submit_prelims(&store, "u1", "p1", 2, day(10), &policy)
        .await
        .unwrap();
    assert!(sub.correct);

    let err = submit_prelims(&store, "u1", "p1", 1, day(10), &policy)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SubmissionError>(),
        Some(SubmissionError::AlreadySubmitted(d)) if *d == day(10)
    ));

    let sub = submit_prelims(&store, "u1", "p2", 3, day(11), &policy)
        .await
        .unwrap();
    assert!(!sub.correct);

    let user = store.user("u1").await.unwrap().unwrap();
    assert_eq!(
        user.points,
        policy.prelims_correct + policy.prelims_attempt
    );
    assert_eq!(user.streak, 2);
    assert_eq!(user.pre_submissions.len(), 2);
}

#[tokio::test]
async fn prelims_rejects_bad_input() {
    let store = MemoryStore::new();
    store.add_user(UserProfile::new("u1", "Asha"));
    store.add_prelims_question(prelims("p1", 0));
    assign(&store, QuestionKind::Prelims, day(1), "p1");
    assign(&store, QuestionKind::Prelims, day(2), "retired");
    let policy = PointsPolicy::default();

    let err = submit_prelims(&store, "u1", "p1", 4, day(1), &policy)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SubmissionError>(),
        Some(SubmissionError::InvalidOption {
            selected: 4,
            available: 4
        })
    ));

    // The assigned id no longer exists in the pool.
    let err = submit_prelims(&store, "u1", "retired", 0, day(2), &policy)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SubmissionError>(),
        Some(SubmissionError::UnknownQuestion(_))
    ));

    let err = submit_prelims(&store, "ghost", "p1", 0, day(1), &policy)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SubmissionError>(),
        Some(SubmissionError::UnknownUser(_))
    ));

    // Nothing was written by the failed attempts.
    let user = store.user("u1").await.unwrap().unwrap();
    assert_eq!(user.points, 0);
    assert!(user.pre_submissions.is_empty());
}

#[tokio::test]
async fn prelims_answer_must_match_assigned_question() {
    let store = MemoryStore::new();
    store.add_user(UserProfile::new("u1", "Asha"));
    store.add_prelims_question(prelims("p1", 0));
    store.add_prelims_question(prelims("p2", 0));
    assign(&store, QuestionKind::Prelims, day(7), "p1");
    let policy = PointsPolicy::default();

    let err = submit_prelims(&store, "u1", "p2", 0, day(7), &policy)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SubmissionError>(),
        Some(SubmissionError::NotAssigned { question_id, .. }) if question_id == "p2"
    ));

    // Nothing assigned yet for the next day.
    let err = submit_prelims(&store, "u1", "p1", 0, day(8), &policy)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SubmissionError>(),
        Some(SubmissionError::NotAssigned { .. })
    ));

    let user = store.user("u1").await.unwrap().unwrap();
    assert!(user.pre_submissions.is_empty());
}

#[tokio::test]
async fn answer_copy_once_per_day() {
    let store = MemoryStore::new();
    store.add_user(UserProfile::new("u1", "Asha"));
    let policy = PointsPolicy::default();

    let err = record_answer_copy(&store, "u1", "m1", vec![], day(4), &policy)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SubmissionError>(),
        Some(SubmissionError::NoImages)
    ));

    let urls = vec!["https://img.test/a.jpg".to_string()];
    record_answer_copy(&store, "u1", "m1", urls.clone(), day(4), &policy)
        .await
        .unwrap();
    assert!(record_answer_copy(&store, "u1", "m1", urls, day(4), &policy)
        .await
        .is_err());

    let user = store.user("u1").await.unwrap().unwrap();
    assert_eq!(user.points, policy.mains_submission);
    assert_eq!(user.mains_answer_copies[&day(4)].question_id, "m1");
}

// ---------------------------------------------------------------------------
// Push dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn flaky_token_deleted_on_third_strike() {
    let store = MemoryStore::new();
    store.add_push_token(token("good", "ExponentPushToken[good]", 0));
    store.add_push_token(token("flaky", "ExponentPushToken[flaky]", 0));
    let gateway: Arc<dyn PushGateway> = Arc::new(FakeGateway::default());
    let policy = PushPolicy::default();

    for expected in 1..=2u32 {
        let summary = dispatch(&store, Arc::clone(&gateway), &notification(), &policy)
            .await
            .unwrap();
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.deleted, 0);
        let tokens = store.push_tokens().await.unwrap();
        let flaky = tokens.iter().find(|t| t.id == "flaky").unwrap();
        assert_eq!(flaky.failure_count, expected);
    }

    let summary = dispatch(&store, gateway, &notification(), &policy)
        .await
        .unwrap();
    assert_eq!(summary.deleted, 1);
    let ids: Vec<String> = store
        .push_tokens()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec!["good".to_string()]);
}

#[tokio::test]
async fn success_resets_and_unregistered_is_dropped() {
    let store = MemoryStore::new();
    store.add_push_token(token("recovering", "ExpoPushToken[ok]", 2));
    store.add_push_token(token("dead", "ExponentPushToken[dead]", 0));
    store.add_push_token(token("junk", "not-a-token", 0));
    let gateway = Arc::new(FakeGateway::default());
    let policy = PushPolicy::default();

    let summary = dispatch(&store, gateway.clone(), &notification(), &policy)
        .await
        .unwrap();
    assert_eq!(summary.total_tokens, 3);
    assert_eq!(summary.invalid, 1);
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

    let tokens = store.push_tokens().await.unwrap();
    let recovering = tokens.iter().find(|t| t.id == "recovering").unwrap();
    assert_eq!(recovering.failure_count, 0);
    assert!(tokens.iter().all(|t| t.id != "dead"));
    // Malformed tokens are skipped, not deleted.
    assert!(tokens.iter().any(|t| t.id == "junk"));
}

#[tokio::test]
async fn failed_batch_counts_as_strike_for_each_token() {
    let store = MemoryStore::new();
    for i in 0..5 {
        store.add_push_token(token(&format!("t{i}"), &format!("ExponentPushToken[{i}]"), 0));
    }
    let gateway = Arc::new(FakeGateway {
        fail_all: true,
        ..Default::default()
    });
    let policy = PushPolicy {
        batch_size: 2,
        ..Default::default()
    };

    let summary = dispatch(&store, gateway.clone(), &notification(), &policy)
        .await
        .unwrap();
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.failed, 5);
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
    assert!(store
        .push_tokens()
        .await
        .unwrap()
        .iter()
        .all(|t| t.failure_count == 1));
}

#[tokio::test]
async fn oversized_batch_setting_is_capped() {
    let store = MemoryStore::new();
    for i in 0..150 {
        store.add_push_token(token(&format!("t{i}"), &format!("ExponentPushToken[{i}]"), 0));
    }
    let gateway = Arc::new(FakeGateway::default());
    let policy = PushPolicy {
        batch_size: 500,
        ..Default::default()
    };

    let summary = dispatch(&store, gateway.clone(), &notification(), &policy)
        .await
        .unwrap();
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.sent, 150);
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
    assert_eq!(gateway.largest_batch.load(Ordering::SeqCst), MAX_BATCH_SIZE);
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn evaluate_answer_records_copy_and_rubric() {
    let store = MemoryStore::new();
    store.add_user(UserProfile::new("u1", "Asha"));
    let question = mains("m1");
    let evaluator = FakeEvaluator::scoring(1.5);
    let host = FakeHost::default();
    let policy = PointsPolicy::default();

    let result = evaluate_answer(
        &store,
        &evaluator,
        &host,
        "u1",
        &question,
        vec![image("page1.jpg"), image("page2.png")],
        day(12),
        &policy,
    )
    .await
    .unwrap();

    assert_eq!(result.copy.image_urls.len(), 2);
    assert!((result.evaluation.rubric.total_score - 7.5).abs() < 1e-9);
    assert_eq!(host.uploads.load(Ordering::SeqCst), 2);

    let stored = store.evaluations_for_user("u1").await.unwrap();
    assert_eq!(stored.len(), 1);
    let user = store.user("u1").await.unwrap().unwrap();
    assert_eq!(user.points, policy.mains_submission);
    assert!(user.mains_answer_copies.contains_key(&day(12)));

    // A second answer for the same day is rejected before uploading.
    let err = evaluate_answer(
        &store,
        &evaluator,
        &host,
        "u1",
        &question,
        vec![image("page3.jpg")],
        day(12),
        &policy,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SubmissionError>(),
        Some(SubmissionError::AlreadySubmitted(_))
    ));
    assert_eq!(host.uploads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unparseable_evaluation_leaves_day_open() {
    let store = MemoryStore::new();
    store.add_user(UserProfile::new("u1", "Asha"));
    let question = mains("m1");
    let host = FakeHost::default();
    let policy = PointsPolicy::default();
    let broken = FakeEvaluator {
        reply: "I cannot read this handwriting.".into(),
    };

    let err = evaluate_answer(
        &store,
        &broken,
        &host,
        "u1",
        &question,
        vec![image("page1.jpg")],
        day(13),
        &policy,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EvaluationError>(),
        Some(EvaluationError::NoJson)
    ));

    let user = store.user("u1").await.unwrap().unwrap();
    assert!(user.mains_answer_copies.is_empty());
    assert_eq!(user.points, 0);

    evaluate_answer(
        &store,
        &FakeEvaluator::scoring(2.0),
        &host,
        "u1",
        &question,
        vec![image("page1.jpg")],
        day(13),
        &policy,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn peer_review_is_stored_and_counted() {
    let store = MemoryStore::new();
    store.add_user(UserProfile::new("author", "Asha"));
    store.add_user(UserProfile::new("reviewer", "Ravi"));
    let policy = PointsPolicy::default();
    let rubric = parse_rubric(&FakeEvaluator::scoring(1.0).reply).unwrap();

    let err = submit_peer_evaluation(&store, "author", "author", day(14), rubric.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EvaluationError>(),
        Some(EvaluationError::SelfReview)
    ));

    let err = submit_peer_evaluation(&store, "reviewer", "author", day(14), rubric.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EvaluationError>(),
        Some(EvaluationError::NoAnswerCopy { date, .. }) if *date == day(14)
    ));

    record_answer_copy(
        &store,
        "author",
        "m9",
        vec!["https://img.test/a.jpg".into()],
        day(14),
        &policy,
    )
    .await
    .unwrap();
    let stored = submit_peer_evaluation(&store, "reviewer", "author", day(14), rubric)
        .await
        .unwrap();
    assert_eq!(stored.question_id, "m9");
    assert_eq!(
        stored.source,
        EvaluationSource::Peer {
            reviewer_id: "reviewer".into()
        }
    );

    let stats = evaluation_stats(&store.evaluations_for_user("author").await.unwrap());
    assert_eq!(stats.count, 1);
    assert_eq!(stats.peer_count, 1);
    assert_eq!(stats.ai_count, 0);
    assert!((stats.average_percent - 50.0).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn share_like_and_comment() {
    let store = MemoryStore::new();
    store.add_user(UserProfile::new("u1", "Asha"));
    store.add_user(UserProfile::new("u2", "Ravi"));
    let policy = PointsPolicy::default();

    let err = share_answer(&store, "u1", day(5), "my answer")
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FeedError>(),
        Some(FeedError::NothingToShare(_))
    ));

    record_answer_copy(
        &store,
        "u1",
        "m1",
        vec!["https://img.test/a.jpg".into()],
        day(5),
        &policy,
    )
    .await
    .unwrap();
    let post = share_answer(&store, "u1", day(5), "  my answer  ")
        .await
        .unwrap();
    assert_eq!(post.caption, "my answer");
    assert_eq!(post.question_id, "m1");

    let state = toggle_like(&store, &post.id, "u2").await.unwrap();
    assert!(state.liked);
    assert_eq!(state.like_count, 1);
    let state = toggle_like(&store, &post.id, "u2").await.unwrap();
    assert!(!state.liked);
    assert_eq!(state.like_count, 0);

    let err = add_comment(&store, &post.id, "u2", "   ").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FeedError>(),
        Some(FeedError::InvalidComment { .. })
    ));
    let err = add_comment(&store, &post.id, "u2", &"x".repeat(1001))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FeedError>(),
        Some(FeedError::InvalidComment { max: 1000 })
    ));
    add_comment(&store, &post.id, "u2", &"x".repeat(1000))
        .await
        .unwrap();
    add_comment(&store, &post.id, "u2", "Nice structure")
        .await
        .unwrap();

    let stored = store.post(&post.id).await.unwrap().unwrap();
    assert_eq!(stored.comment_count, 2);
    assert_eq!(store.comments(&post.id).await.unwrap().len(), 2);

    let err = toggle_like(&store, "missing", "u2").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FeedError>(),
        Some(FeedError::UnknownPost(_))
    ));
}

#[tokio::test]
async fn feed_pages_newest_first() {
    let store = MemoryStore::new();
    let now = Utc::now();
    for i in 0..5 {
        store.add_post(Post {
            id: format!("post{i}"),
            user_id: "u1".into(),
            question_id: "m1".into(),
            date: day(1),
            caption: String::new(),
            image_urls: vec![],
            like_count: 0,
            liked_by: vec![],
            comment_count: 0,
            created_at: now + Duration::minutes(i),
        });
    }

    let first = feed_page(&store, 0, 2).await.unwrap();
    let ids: Vec<&str> = first.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["post4", "post3"]);

    let last = feed_page(&store, 2, 2).await.unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].id, "post0");

    let err = feed_page(&store, 0, 0).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FeedError>(),
        Some(FeedError::InvalidPageSize { .. })
    ));

    let err = feed_page(&store, usize::MAX, 20).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FeedError>(),
        Some(FeedError::InvalidPage(usize::MAX))
    ));
}

// ---------------------------------------------------------------------------
// Dataset upload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_skips_invalid_and_existing() {
    let store = MemoryStore::new();
    store.add_prelims_question(prelims("p1", 0));

    let questions = vec![prelims("p1", 1), prelims("p2", 1), prelims("p3", 9)];
    let summary = upload_questions(&store, &questions, 1).await.unwrap();
    assert_eq!(summary.uploaded, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.already_present, 1);

    assert!(store.prelims_question("p2").await.unwrap().is_some());
    assert!(store.prelims_question("p3").await.unwrap().is_none());
    // The stored copy of p1 is untouched.
    assert_eq!(store.prelims_question("p1").await.unwrap().unwrap().answer, 0);
}
