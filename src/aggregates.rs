//! Recomputes the denormalized `statistics` group of a business from its
//! reviews and complaints.
//!
//! Every recompute re-reads the full qualifying set and overwrites the
//! counters with one partial update. Concurrent recomputes for the same
//! business are not serialized; the last completed write wins.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{Business, Review, StatisticsPatch};
use crate::store::{ComplaintFilter, DocumentStore, ReviewFilter, StoreError};

/// Averages are stored rounded to this many decimal places.
pub const RATING_DECIMALS: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReviewStatistics {
    pub average_rating: f64,
    pub total_reviews: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComplaintStatistics {
    pub total_complaints: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecomputeSummary {
    pub reviews: ReviewStatistics,
    pub complaints: ComplaintStatistics,
}

/// Mean rating of approved reviews, 0 for an empty set.
pub fn summarize_ratings(reviews: &[Review]) -> ReviewStatistics {
    if reviews.is_empty() {
        return ReviewStatistics {
            average_rating: 0.0,
            total_reviews: 0,
        };
    }

    let total: i64 = reviews.iter().map(|review| i64::from(review.rating)).sum();
    let count = reviews.len() as i64;

    ReviewStatistics {
        average_rating: round_rating(total as f64 / count as f64),
        total_reviews: count,
    }
}

fn round_rating(value: f64) -> f64 {
    let scale = 10f64.powi(RATING_DECIMALS);
    (value * scale).round() / scale
}

pub struct AggregateRecalculator<S> {
    store: Arc<S>,
}

impl<S> Clone for AggregateRecalculator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> AggregateRecalculator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn recompute_review_stats(
        &self,
        business_id: Uuid,
    ) -> Result<ReviewStatistics, StoreError> {
        let approved = self
            .store
            .find_reviews(ReviewFilter::approved_for(business_id))
            .await?;
        let stats = summarize_ratings(&approved.documents);

        self.store
            .update_statistics(
                business_id,
                StatisticsPatch {
                    average_rating: Some(stats.average_rating),
                    total_reviews: Some(stats.total_reviews),
                    ..Default::default()
                },
            )
            .await?;

        log::debug!(
            "Recomputed review statistics for business {business_id}: {} reviews, average {}",
            stats.total_reviews,
            stats.average_rating
        );
        Ok(stats)
    }

    pub async fn recompute_complaint_stats(
        &self,
        business_id: Uuid,
    ) -> Result<ComplaintStatistics, StoreError> {
        let visible = self
            .store
            .find_complaints(ComplaintFilter::public_for(business_id))
            .await?;
        let stats = ComplaintStatistics {
            total_complaints: visible.total_count,
        };

        self.store
            .update_statistics(
                business_id,
                StatisticsPatch {
                    total_complaints: Some(stats.total_complaints),
                    ..Default::default()
                },
            )
            .await?;

        log::debug!(
            "Recomputed complaint statistics for business {business_id}: {} public complaints",
            stats.total_complaints
        );
        Ok(stats)
    }

    /// Full resync of both aggregates, used to heal a missed trigger.
    pub async fn recompute_all(&self, business_id: Uuid) -> Result<RecomputeSummary, StoreError> {
        let (reviews, complaints) = futures_util::try_join!(
            self.recompute_review_stats(business_id),
            self.recompute_complaint_stats(business_id),
        )?;

        Ok(RecomputeSummary {
            reviews,
            complaints,
        })
    }

    /// Writes `viewCount + 1` based on the value the reader just saw.
    pub async fn record_view(&self, business: &Business) -> Result<i64, StoreError> {
        let view_count = business.statistics.view_count + 1;
        self.store
            .update_statistics(
                business.id,
                StatisticsPatch {
                    view_count: Some(view_count),
                    ..Default::default()
                },
            )
            .await?;
        Ok(view_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReviewStatus;
    use crate::store::memory::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, AggregateRecalculator<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let recalculator = AggregateRecalculator::new(Arc::clone(&store));
        (store, recalculator)
    }

    #[actix_rt::test]
    async fn averages_approved_reviews() {
        let (store, recalculator) = setup();
        let business = store.add_business();
        for rating in [5, 3, 4] {
            store.add_review(business.id, rating, ReviewStatus::Approved);
        }

        let stats = recalculator.recompute_review_stats(business.id).await.unwrap();

        assert_eq!(stats.total_reviews, 3);
        assert_eq!(stats.average_rating, 4.0);
        let stored = store.statistics(business.id);
        assert_eq!(stored.total_reviews, 3);
        assert_eq!(stored.average_rating, 4.0);
    }

    #[actix_rt::test]
    async fn newly_approved_review_joins_the_average() {
        let (store, recalculator) = setup();
        let business = store.add_business();
        for rating in [5, 3, 4] {
            store.add_review(business.id, rating, ReviewStatus::Approved);
        }
        let pending = store.add_review(business.id, 1, ReviewStatus::Pending);
        recalculator.recompute_review_stats(business.id).await.unwrap();

        store.set_review_status(pending.id, ReviewStatus::Approved);
        recalculator.recompute_review_stats(business.id).await.unwrap();

        let stored = store.statistics(business.id);
        assert_eq!(stored.total_reviews, 4);
        assert_eq!(stored.average_rating, 3.25);
    }

    #[actix_rt::test]
    async fn ignores_reviews_that_are_not_approved() {
        let (store, recalculator) = setup();
        let business = store.add_business();
        let other = store.add_business();
        store.add_review(business.id, 2, ReviewStatus::Approved);
        store.add_review(business.id, 5, ReviewStatus::Pending);
        store.add_review(business.id, 5, ReviewStatus::Rejected);
        store.add_review(business.id, 5, ReviewStatus::Flagged);
        store.add_review(other.id, 5, ReviewStatus::Approved);

        let stats = recalculator.recompute_review_stats(business.id).await.unwrap();

        assert_eq!(stats.total_reviews, 1);
        assert_eq!(stats.average_rating, 2.0);
        assert_eq!(store.statistics(other.id).total_reviews, 0);
    }

    #[actix_rt::test]
    async fn no_approved_reviews_means_zero_not_nan() {
        let (store, recalculator) = setup();
        let business = store.add_business();
        store.add_review(business.id, 4, ReviewStatus::Pending);

        let stats = recalculator.recompute_review_stats(business.id).await.unwrap();

        assert_eq!(stats.total_reviews, 0);
        assert_eq!(stats.average_rating, 0.0);
        assert_eq!(store.statistics(business.id).average_rating, 0.0);
    }

    #[actix_rt::test]
    async fn recompute_is_idempotent() {
        let (store, recalculator) = setup();
        let business = store.add_business();
        for rating in [4, 4, 5] {
            store.add_review(business.id, rating, ReviewStatus::Approved);
        }

        let first = recalculator.recompute_review_stats(business.id).await.unwrap();
        let stored_first = store.statistics(business.id);
        let second = recalculator.recompute_review_stats(business.id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(stored_first, store.statistics(business.id));
        assert_eq!(second.average_rating, 4.33);
    }

    #[actix_rt::test]
    async fn counts_public_complaints_regardless_of_status() {
        let (store, recalculator) = setup();
        let business = store.add_business();
        let resolved = store.add_complaint(business.id, true);
        store.add_complaint(business.id, true);
        store.add_complaint(business.id, false);
        store.update_complaint(resolved.id, |c| {
            c.status = crate::models::ComplaintStatus::Resolved
        });

        let stats = recalculator
            .recompute_complaint_stats(business.id)
            .await
            .unwrap();

        assert_eq!(stats.total_complaints, 2);
        assert_eq!(store.statistics(business.id).total_complaints, 2);
    }

    #[actix_rt::test]
    async fn each_recompute_writes_exactly_once() {
        let (store, recalculator) = setup();
        let business = store.add_business();
        store.add_review(business.id, 3, ReviewStatus::Approved);
        store.add_complaint(business.id, true);

        recalculator.recompute_review_stats(business.id).await.unwrap();
        assert_eq!(store.update_count(), 1);
        recalculator.recompute_complaint_stats(business.id).await.unwrap();
        assert_eq!(store.update_count(), 2);
    }

    #[actix_rt::test]
    async fn review_recompute_leaves_other_counters_alone() {
        let (store, recalculator) = setup();
        let business = store.add_business();
        store.add_complaint(business.id, true);
        recalculator.recompute_complaint_stats(business.id).await.unwrap();
        recalculator.record_view(&store.business(business.id)).await.unwrap();

        store.add_review(business.id, 5, ReviewStatus::Approved);
        recalculator.recompute_review_stats(business.id).await.unwrap();

        let stored = store.statistics(business.id);
        assert_eq!(stored.total_complaints, 1);
        assert_eq!(stored.view_count, 1);
        assert_eq!(stored.total_reviews, 1);
    }

    #[actix_rt::test]
    async fn recompute_all_refreshes_both_groups() {
        let (store, recalculator) = setup();
        let business = store.add_business();
        store.add_review(business.id, 2, ReviewStatus::Approved);
        store.add_review(business.id, 3, ReviewStatus::Approved);
        store.add_complaint(business.id, true);

        let summary = recalculator.recompute_all(business.id).await.unwrap();

        assert_eq!(summary.reviews.average_rating, 2.5);
        assert_eq!(summary.complaints.total_complaints, 1);
    }

    #[actix_rt::test]
    async fn missing_business_is_not_found() {
        let (_store, recalculator) = setup();

        let err = recalculator
            .recompute_review_stats(Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[actix_rt::test]
    async fn outage_surfaces_as_unavailable() {
        let (store, recalculator) = setup();
        let business = store.add_business();
        store.set_unavailable(true);

        let err = recalculator
            .recompute_complaint_stats(business.id)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.update_count(), 0);
    }

    #[actix_rt::test]
    async fn view_count_increments_from_read_value() {
        let (store, recalculator) = setup();
        let business = store.add_business();

        assert_eq!(recalculator.record_view(&business).await.unwrap(), 1);
        let reread = store.business(business.id);
        assert_eq!(recalculator.record_view(&reread).await.unwrap(), 2);
        assert_eq!(store.statistics(business.id).view_count, 2);
    }

    #[actix_rt::test]
    async fn statistics_writes_leave_updated_at_alone() {
        let (store, recalculator) = setup();
        let business = store.add_business();
        store.add_review(business.id, 4, ReviewStatus::Approved);
        store.add_complaint(business.id, true);

        recalculator.record_view(&business).await.unwrap();
        recalculator.recompute_all(business.id).await.unwrap();

        let stored = store.business(business.id);
        assert_eq!(stored.statistics.view_count, 1);
        assert_eq!(stored.statistics.total_reviews, 1);
        assert_eq!(stored.updated_at, business.updated_at);
    }
}
