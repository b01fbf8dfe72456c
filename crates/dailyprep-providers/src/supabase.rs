//! Supabase row store over the PostgREST HTTP API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;

use dailyprep_core::error::StoreError;
use dailyprep_core::model::{
    Comment, DailyRecord, Evaluation, MainsQuestion, PoolEntry, Post, PrelimsQuestion, PushToken,
    QuestionKind, UserProfile,
};
use dailyprep_core::traits::Store;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Supabase's default `max-rows`; full-table reads are paged at this size.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

const USERS: &str = "users";
const POSTS: &str = "posts";
const COMMENTS: &str = "comments";
const EVALUATIONS: &str = "evaluations";
const PUSH_TOKENS: &str = "push_tokens";

/// PostgREST client authenticated with a service key.
pub struct SupabaseStore {
    base_url: String,
    service_key: String,
    page_size: usize,
    client: reqwest::Client,
}

impl SupabaseStore {
    pub fn new(base_url: &str, service_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            client,
        })
    }

    /// Rows per request for full-table reads. Must not exceed the server's
    /// `max-rows`, or a capped page is mistaken for the last one.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn request(&self, method: Method, table: &str, query: &[(&str, String)]) -> Result<RequestBuilder> {
        let url = Url::parse_with_params(&format!("{}/rest/v1/{table}", self.base_url), query)
            .with_context(|| format!("invalid Supabase URL: {}", self.base_url))?;
        Ok(self
            .client
            .request(method, url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key)))
    }

    async fn send(&self, table: &str, req: RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout(DEFAULT_TIMEOUT_SECS)
            } else {
                StoreError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status < 400 {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status {
            409 => StoreError::Conflict {
                table: table.to_string(),
                message: body,
            },
            401 | 403 => StoreError::AuthenticationFailed(body),
            _ => StoreError::ApiError {
                status,
                message: body,
            },
        })
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let req = self.request(Method::GET, table, query)?;
        let response = self.send(table, req).await?;
        let rows = response.json::<Vec<T>>().await.map_err(|e| StoreError::ApiError {
            status: 0,
            message: format!("failed to parse {table} rows: {e}"),
        })?;
        Ok(rows)
    }

    /// Read every matching row, `page_size` rows at a time, until a short page.
    async fn select_all<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
        order: &str,
    ) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        loop {
            let mut page_query = query.to_vec();
            page_query.push(("order", order.to_string()));
            page_query.push(("offset", rows.len().to_string()));
            page_query.push(("limit", self.page_size.to_string()));

            let page: Vec<T> = self.select(table, &page_query).await?;
            let fetched = page.len();
            rows.extend(page);
            if fetched < self.page_size {
                break;
            }
        }
        tracing::debug!(table, rows = rows.len(), "read all rows");
        Ok(rows)
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let mut query = query.to_vec();
        query.push(("limit", "1".into()));
        Ok(self.select(table, &query).await?.into_iter().next())
    }

    async fn insert<T: Serialize + ?Sized>(&self, table: &str, rows: &T, prefer: &str) -> Result<()> {
        let req = self
            .request(Method::POST, table, &[])?
            .header("Prefer", prefer)
            .json(rows);
        self.send(table, req).await?;
        Ok(())
    }

    async fn patch<T: Serialize + ?Sized>(&self, table: &str, id: &str, body: &T) -> Result<()> {
        let req = self
            .request(Method::PATCH, table, &[("id", eq(id))])?
            .header("Prefer", "return=minimal")
            .json(body);
        self.send(table, req).await?;
        Ok(())
    }
}

/// PostgREST equality filter value.
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl Store for SupabaseStore {
    fn name(&self) -> &str {
        "supabase"
    }

    #[instrument(skip(self))]
    async fn daily_record(
        &self,
        kind: QuestionKind,
        date: NaiveDate,
    ) -> Result<Option<DailyRecord>> {
        self.select_one(
            kind.daily_table(),
            &[("select", "*".into()), ("date", eq(date))],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn daily_history(&self, kind: QuestionKind) -> Result<Vec<DailyRecord>> {
        self.select_all(kind.daily_table(), &[("select", "*".into())], "date.asc")
            .await
    }

    #[instrument(skip(self, record), fields(date = %record.date))]
    async fn insert_daily_record(&self, kind: QuestionKind, record: &DailyRecord) -> Result<()> {
        self.insert(kind.daily_table(), record, "return=minimal").await
    }

    #[instrument(skip(self))]
    async fn question_pool(&self, kind: QuestionKind) -> Result<Vec<PoolEntry>> {
        self.select_all(kind.dataset_table(), &[("select", "id".into())], "id.asc")
            .await
    }

    async fn prelims_question(&self, id: &str) -> Result<Option<PrelimsQuestion>> {
        self.select_one(
            QuestionKind::Prelims.dataset_table(),
            &[("select", "*".into()), ("id", eq(id))],
        )
        .await
    }

    async fn mains_question(&self, id: &str) -> Result<Option<MainsQuestion>> {
        self.select_one(
            QuestionKind::Mains.dataset_table(),
            &[("select", "*".into()), ("id", eq(id))],
        )
        .await
    }

    #[instrument(skip(self, questions), fields(count = questions.len()))]
    async fn insert_prelims_questions(&self, questions: &[PrelimsQuestion]) -> Result<()> {
        self.insert(
            QuestionKind::Prelims.dataset_table(),
            questions,
            "return=minimal",
        )
        .await
    }

    async fn user(&self, id: &str) -> Result<Option<UserProfile>> {
        self.select_one(USERS, &[("select", "*".into()), ("id", eq(id))])
            .await
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn upsert_user(&self, user: &UserProfile) -> Result<()> {
        self.insert(
            USERS,
            user,
            "resolution=merge-duplicates,return=minimal",
        )
        .await
    }

    async fn insert_post(&self, post: &Post) -> Result<()> {
        self.insert(POSTS, post, "return=minimal").await
    }

    async fn post(&self, id: &str) -> Result<Option<Post>> {
        self.select_one(POSTS, &[("select", "*".into()), ("id", eq(id))])
            .await
    }

    async fn update_post(&self, post: &Post) -> Result<()> {
        self.patch(POSTS, &post.id, post).await
    }

    async fn posts_page(&self, offset: usize, limit: usize) -> Result<Vec<Post>> {
        self.select(
            POSTS,
            &[
                ("select", "*".into()),
                ("order", "created_at.desc".into()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<()> {
        self.insert(COMMENTS, comment, "return=minimal").await
    }

    async fn comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        self.select(
            COMMENTS,
            &[
                ("select", "*".into()),
                ("post_id", eq(post_id)),
                ("order", "created_at.asc".into()),
            ],
        )
        .await
    }

    async fn insert_evaluation(&self, evaluation: &Evaluation) -> Result<()> {
        self.insert(EVALUATIONS, evaluation, "return=minimal").await
    }

    async fn evaluations_for_user(&self, user_id: &str) -> Result<Vec<Evaluation>> {
        self.select(
            EVALUATIONS,
            &[
                ("select", "*".into()),
                ("user_id", eq(user_id)),
                ("order", "created_at.desc".into()),
            ],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn push_tokens(&self) -> Result<Vec<PushToken>> {
        self.select(PUSH_TOKENS, &[("select", "*".into())]).await
    }

    async fn set_push_token_failures(&self, id: &str, failure_count: u32) -> Result<()> {
        self.patch(
            PUSH_TOKENS,
            id,
            &serde_json::json!({ "failure_count": failure_count }),
        )
        .await
    }

    async fn delete_push_token(&self, id: &str) -> Result<()> {
        let req = self.request(Method::DELETE, PUSH_TOKENS, &[("id", eq(id))])?;
        self.send(PUSH_TOKENS, req).await?;
        Ok(())
    }
}
