//! Review Source
//!
//! The review feed itself comes from an external integration that crawls
//! Google Business Profiles; this core treats it as an opaque source of
//! review records behind a trait. The shipped implementation serves a
//! fixed in-memory set, which is what local development and the test
//! suite use.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{StoreError, StoreResult};

/// One customer review of a business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Record id
    pub id: Uuid,
    /// Display name of the reviewer
    pub author: String,
    /// Star rating, 1 through 5
    pub rating: u8,
    /// Review text
    pub comment: String,
    /// When the review was published
    pub published_at: DateTime<Utc>,
}

/// An opaque source of review records for a business.
#[async_trait::async_trait]
pub trait ReviewSource: Send + Sync {
    /// Fetch the reviews currently known for a business.
    async fn reviews_for_business(&self, business_id: &str) -> StoreResult<Vec<ReviewRecord>>;
}

/// Review source serving a fixed in-memory set, keyed by business id.
#[derive(Debug, Default)]
pub struct StaticReviewSource {
    reviews: RwLock<HashMap<String, Vec<ReviewRecord>>>,
}

impl StaticReviewSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a review for a business.
    pub fn add_review(&self, business_id: &str, author: &str, rating: u8, comment: &str) {
        let record = ReviewRecord {
            id: Uuid::new_v4(),
            author: author.to_string(),
            rating,
            comment: comment.to_string(),
            published_at: Utc::now(),
        };
        self.reviews
            .write()
            .entry(business_id.to_string())
            .or_default()
            .push(record);
    }
}

#[async_trait::async_trait]
impl ReviewSource for StaticReviewSource {
    async fn reviews_for_business(&self, business_id: &str) -> StoreResult<Vec<ReviewRecord>> {
        Ok(self
            .reviews
            .read()
            .get(business_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Review source that always fails, for degradation testing.
#[derive(Debug, Default)]
pub struct UnavailableReviewSource;

#[async_trait::async_trait]
impl ReviewSource for UnavailableReviewSource {
    async fn reviews_for_business(&self, _business_id: &str) -> StoreResult<Vec<ReviewRecord>> {
        Err(StoreError::Unavailable("review source offline".to_string()))
    }
}
