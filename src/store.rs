use std::future::Future;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{Complaint, Review, ReviewStatus, StatisticsPatch};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient infrastructure failure; the next trigger may succeed.
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    /// The target document is missing. Permanent for this invocation.
    #[error("document not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".into()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewFilter {
    pub business_id: Uuid,
    pub status: Option<ReviewStatus>,
}

impl ReviewFilter {
    pub fn approved_for(business_id: Uuid) -> Self {
        Self {
            business_id,
            status: Some(ReviewStatus::Approved),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplaintFilter {
    pub business_id: Uuid,
    pub visible_to_public: Option<bool>,
}

impl ComplaintFilter {
    pub fn public_for(business_id: Uuid) -> Self {
        Self {
            business_id,
            visible_to_public: Some(true),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FindResult<T> {
    pub documents: Vec<T>,
    pub total_count: i64,
}

impl<T> FindResult<T> {
    pub fn new(documents: Vec<T>) -> Self {
        let total_count = documents.len() as i64;
        Self {
            documents,
            total_count,
        }
    }
}

/// Query and partial-update primitives the aggregate recalculator needs.
pub trait DocumentStore: Send + Sync + 'static {
    fn find_reviews(
        &self,
        filter: ReviewFilter,
    ) -> impl Future<Output = Result<FindResult<Review>, StoreError>> + Send;

    fn find_complaints(
        &self,
        filter: ComplaintFilter,
    ) -> impl Future<Output = Result<FindResult<Complaint>, StoreError>> + Send;

    /// Fails with `NotFound` when the business does not exist.
    fn update_statistics(
        &self,
        business_id: Uuid,
        patch: StatisticsPatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
