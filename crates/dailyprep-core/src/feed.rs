//! Community feed: shared answers, likes, and comments.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{FeedError, SubmissionError};
use crate::model::{Comment, Post};
use crate::traits::Store;

pub const MAX_PAGE_SIZE: usize = 50;
pub const MAX_COMMENT_CHARS: usize = 1000;

/// Like state after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeState {
    pub liked: bool,
    pub like_count: u32,
}

async fn load_post(store: &dyn Store, post_id: &str) -> Result<Post> {
    Ok(store
        .post(post_id)
        .await?
        .ok_or_else(|| FeedError::UnknownPost(post_id.to_string()))?)
}

/// Publish the user's answer copy for `date` as a feed post.
#[instrument(skip(store, caption), fields(store = store.name()))]
pub async fn share_answer(
    store: &dyn Store,
    user_id: &str,
    date: NaiveDate,
    caption: &str,
) -> Result<Post> {
    let user = store
        .user(user_id)
        .await?
        .ok_or_else(|| SubmissionError::UnknownUser(user_id.to_string()))?;
    let copy = user
        .mains_answer_copies
        .get(&date)
        .ok_or(FeedError::NothingToShare(date))?;

    let post = Post {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        question_id: copy.question_id.clone(),
        date,
        caption: caption.trim().to_string(),
        image_urls: copy.image_urls.clone(),
        like_count: 0,
        liked_by: Vec::new(),
        comment_count: 0,
        created_at: Utc::now(),
    };
    store.insert_post(&post).await?;
    Ok(post)
}

/// One page of the feed, newest first. `page` is zero-based.
pub async fn feed_page(store: &dyn Store, page: usize, page_size: usize) -> Result<Vec<Post>> {
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(FeedError::InvalidPageSize { max: MAX_PAGE_SIZE }.into());
    }
    let offset = page
        .checked_mul(page_size)
        .ok_or(FeedError::InvalidPage(page))?;
    store.posts_page(offset, page_size).await
}

/// Like the post if the user has not, otherwise remove the like.
#[instrument(skip(store), fields(store = store.name()))]
pub async fn toggle_like(store: &dyn Store, post_id: &str, user_id: &str) -> Result<LikeState> {
    let mut post = load_post(store, post_id).await?;

    let liked = match post.liked_by.iter().position(|u| u == user_id) {
        Some(idx) => {
            post.liked_by.remove(idx);
            false
        }
        None => {
            post.liked_by.push(user_id.to_string());
            true
        }
    };
    post.like_count = post.liked_by.len() as u32;
    store.update_post(&post).await?;

    Ok(LikeState {
        liked,
        like_count: post.like_count,
    })
}

/// Add a comment and bump the post's comment counter.
#[instrument(skip(store, text), fields(store = store.name()))]
pub async fn add_comment(
    store: &dyn Store,
    post_id: &str,
    user_id: &str,
    text: &str,
) -> Result<Comment> {
    let text = text.trim();
    let chars = text.chars().count();
    if chars == 0 || chars > MAX_COMMENT_CHARS {
        return Err(FeedError::InvalidComment {
            max: MAX_COMMENT_CHARS,
        }
        .into());
    }

    let mut post = load_post(store, post_id).await?;
    let comment = Comment {
        id: Uuid::new_v4().to_string(),
        post_id: post_id.to_string(),
        user_id: user_id.to_string(),
        text: text.to_string(),
        created_at: Utc::now(),
    };
    store.insert_comment(&comment).await?;

    post.comment_count += 1;
    store.update_post(&post).await?;
    Ok(comment)
}
