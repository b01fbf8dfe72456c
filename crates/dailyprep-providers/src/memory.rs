//! In-memory store for testing jobs without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use dailyprep_core::error::StoreError;
use dailyprep_core::model::{
    Comment, DailyRecord, Evaluation, MainsQuestion, PoolEntry, Post, PrelimsQuestion, PushToken,
    QuestionKind, UserProfile,
};
use dailyprep_core::traits::Store;

#[derive(Default)]
struct Inner {
    daily: HashMap<QuestionKind, BTreeMap<NaiveDate, DailyRecord>>,
    prelims: BTreeMap<String, PrelimsQuestion>,
    mains: BTreeMap<String, MainsQuestion>,
    users: HashMap<String, UserProfile>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    evaluations: Vec<Evaluation>,
    push_tokens: Vec<PushToken>,
    /// A record another writer slips in just before the next daily insert.
    pending_race: Option<(QuestionKind, DailyRecord)>,
    daily_inserts: usize,
}

/// A [`Store`] backed by in-process maps.
///
/// Enforces the unique `date` constraint on daily tables the way Postgres
/// does, so the conflict path of assignment can be exercised.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_prelims_question(&self, question: PrelimsQuestion) {
        self.lock().prelims.insert(question.id.clone(), question);
    }

    pub fn add_mains_question(&self, question: MainsQuestion) {
        self.lock().mains.insert(question.id.clone(), question);
    }

    pub fn add_daily_record(&self, kind: QuestionKind, record: DailyRecord) {
        self.lock()
            .daily
            .entry(kind)
            .or_default()
            .insert(record.date, record);
    }

    pub fn add_user(&self, user: UserProfile) {
        self.lock().users.insert(user.id.clone(), user);
    }

    pub fn add_push_token(&self, token: PushToken) {
        self.lock().push_tokens.push(token);
    }

    pub fn add_post(&self, post: Post) {
        self.lock().posts.push(post);
    }

    /// Make the next daily insert for `kind` lose a race against `winner`.
    pub fn simulate_race(&self, kind: QuestionKind, winner: DailyRecord) {
        self.lock().pending_race = Some((kind, winner));
    }

    /// Number of successful daily-record inserts.
    pub fn daily_inserts(&self) -> usize {
        self.lock().daily_inserts
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn daily_record(
        &self,
        kind: QuestionKind,
        date: NaiveDate,
    ) -> Result<Option<DailyRecord>> {
        Ok(self
            .lock()
            .daily
            .get(&kind)
            .and_then(|records| records.get(&date))
            .cloned())
    }

    async fn daily_history(&self, kind: QuestionKind) -> Result<Vec<DailyRecord>> {
        Ok(self
            .lock()
            .daily
            .get(&kind)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_daily_record(&self, kind: QuestionKind, record: &DailyRecord) -> Result<()> {
        let mut inner = self.lock();
        if let Some((race_kind, winner)) = inner.pending_race.take() {
            if race_kind == kind {
                inner
                    .daily
                    .entry(kind)
                    .or_default()
                    .insert(winner.date, winner);
            } else {
                inner.pending_race = Some((race_kind, winner));
            }
        }

        let records = inner.daily.entry(kind).or_default();
        if records.contains_key(&record.date) {
            return Err(StoreError::Conflict {
                table: kind.daily_table().to_string(),
                message: format!("duplicate key value (date)=({})", record.date),
            }
            .into());
        }
        records.insert(record.date, record.clone());
        inner.daily_inserts += 1;
        Ok(())
    }

    async fn question_pool(&self, kind: QuestionKind) -> Result<Vec<PoolEntry>> {
        let inner = self.lock();
        let ids: Vec<PoolEntry> = match kind {
            QuestionKind::Prelims => inner
                .prelims
                .keys()
                .map(|id| PoolEntry { id: id.clone() })
                .collect(),
            QuestionKind::Mains => inner
                .mains
                .keys()
                .map(|id| PoolEntry { id: id.clone() })
                .collect(),
        };
        Ok(ids)
    }

    async fn prelims_question(&self, id: &str) -> Result<Option<PrelimsQuestion>> {
        Ok(self.lock().prelims.get(id).cloned())
    }

    async fn mains_question(&self, id: &str) -> Result<Option<MainsQuestion>> {
        Ok(self.lock().mains.get(id).cloned())
    }

    async fn insert_prelims_questions(&self, questions: &[PrelimsQuestion]) -> Result<()> {
        let mut inner = self.lock();
        if let Some(dup) = questions.iter().find(|q| inner.prelims.contains_key(&q.id)) {
            return Err(StoreError::Conflict {
                table: QuestionKind::Prelims.dataset_table().to_string(),
                message: format!("duplicate key value (id)=({})", dup.id),
            }
            .into());
        }
        for q in questions {
            inner.prelims.insert(q.id.clone(), q.clone());
        }
        Ok(())
    }

    async fn user(&self, id: &str) -> Result<Option<UserProfile>> {
        Ok(self.lock().users.get(id).cloned())
    }

    async fn upsert_user(&self, user: &UserProfile) -> Result<()> {
        self.lock().users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn insert_post(&self, post: &Post) -> Result<()> {
        self.lock().posts.push(post.clone());
        Ok(())
    }

    async fn post(&self, id: &str) -> Result<Option<Post>> {
        Ok(self.lock().posts.iter().find(|p| p.id == id).cloned())
    }

    async fn update_post(&self, post: &Post) -> Result<()> {
        let mut inner = self.lock();
        let slot = inner
            .posts
            .iter_mut()
            .find(|p| p.id == post.id)
            .ok_or_else(|| StoreError::NotFound {
                table: "posts".into(),
                id: post.id.clone(),
            })?;
        *slot = post.clone();
        Ok(())
    }

    async fn posts_page(&self, offset: usize, limit: usize) -> Result<Vec<Post>> {
        let mut posts = self.lock().posts.clone();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<()> {
        self.lock().comments.push(comment.clone());
        Ok(())
    }

    async fn comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .lock()
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }

    async fn insert_evaluation(&self, evaluation: &Evaluation) -> Result<()> {
        self.lock().evaluations.push(evaluation.clone());
        Ok(())
    }

    async fn evaluations_for_user(&self, user_id: &str) -> Result<Vec<Evaluation>> {
        Ok(self
            .lock()
            .evaluations
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn push_tokens(&self) -> Result<Vec<PushToken>> {
        Ok(self.lock().push_tokens.clone())
    }

    async fn set_push_token_failures(&self, id: &str, failure_count: u32) -> Result<()> {
        let mut inner = self.lock();
        let token = inner
            .push_tokens
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound {
                table: "push_tokens".into(),
                id: id.to_string(),
            })?;
        token.failure_count = failure_count;
        Ok(())
    }

    async fn delete_push_token(&self, id: &str) -> Result<()> {
        self.lock().push_tokens.retain(|t| t.id != id);
        Ok(())
    }
}
