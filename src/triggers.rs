//! Change notifier wired to the review and complaint write paths.
//!
//! The decision functions are pure; dispatch spawns each recompute as its
//! own task so the triggering request never waits on, or fails because of,
//! the aggregate update.

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::aggregates::AggregateRecalculator;
use crate::models::{Business, Complaint, Review};
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Create,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recompute {
    Reviews(Uuid),
    Complaints(Uuid),
}

/// Optional extra edges on top of the base trigger contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerPolicy {
    /// Also recompute when a review leaves `approved`.
    pub recompute_on_review_exit: bool,
    /// Also recompute when a complaint's visibility flips without a status change.
    pub recompute_on_visibility_change: bool,
}

/// Fires on the edge into `approved`. Under the default policy a review
/// leaving `approved` does not fire, so totals can go stale until the next
/// qualifying change.
pub fn review_trigger(
    policy: &TriggerPolicy,
    previous: Option<&Review>,
    current: &Review,
    _operation: ChangeOperation,
) -> Option<Recompute> {
    let was_approved = previous.is_some_and(|review| review.status.is_approved());
    let is_approved = current.status.is_approved();

    let entered = is_approved && !was_approved;
    let exited = was_approved && !is_approved && policy.recompute_on_review_exit;

    (entered || exited).then_some(Recompute::Reviews(current.business_id))
}

pub fn complaint_trigger(
    policy: &TriggerPolicy,
    previous: Option<&Complaint>,
    current: &Complaint,
    operation: ChangeOperation,
) -> Option<Recompute> {
    let fires = match (operation, previous) {
        (ChangeOperation::Create, _) => true,
        // No prior snapshot to diff against: only a public record can move the count.
        (ChangeOperation::Update, None) => current.visible_to_public,
        (ChangeOperation::Update, Some(previous)) => {
            let status_changed = previous.status != current.status && current.visible_to_public;
            let visibility_changed = policy.recompute_on_visibility_change
                && previous.visible_to_public != current.visible_to_public;
            status_changed || visibility_changed
        }
    };

    fires.then_some(Recompute::Complaints(current.business_id))
}

pub struct ChangeNotifier<S> {
    recalculator: AggregateRecalculator<S>,
    policy: TriggerPolicy,
}

impl<S: DocumentStore> ChangeNotifier<S> {
    pub fn new(recalculator: AggregateRecalculator<S>, policy: TriggerPolicy) -> Self {
        Self {
            recalculator,
            policy,
        }
    }

    pub fn recalculator(&self) -> &AggregateRecalculator<S> {
        &self.recalculator
    }

    pub fn on_review_change(
        &self,
        previous: Option<&Review>,
        current: &Review,
        operation: ChangeOperation,
    ) -> Option<JoinHandle<()>> {
        review_trigger(&self.policy, previous, current, operation).map(|job| self.dispatch(job))
    }

    pub fn on_complaint_change(
        &self,
        previous: Option<&Complaint>,
        current: &Complaint,
        operation: ChangeOperation,
    ) -> Option<JoinHandle<()>> {
        complaint_trigger(&self.policy, previous, current, operation).map(|job| self.dispatch(job))
    }

    /// Bumps the view counter for a non-admin read.
    pub fn on_public_read(&self, business: &Business) -> JoinHandle<()> {
        let recalculator = self.recalculator.clone();
        let business = business.clone();
        tokio::spawn(async move {
            if let Err(err) = recalculator.record_view(&business).await {
                log::warn!("Failed to record view for business {}: {err}", business.id);
            }
        })
    }

    fn dispatch(&self, job: Recompute) -> JoinHandle<()> {
        let recalculator = self.recalculator.clone();
        tokio::spawn(async move {
            let (business_id, result) = match job {
                Recompute::Reviews(business_id) => (
                    business_id,
                    recalculator.recompute_review_stats(business_id).await.map(|_| ()),
                ),
                Recompute::Complaints(business_id) => (
                    business_id,
                    recalculator
                        .recompute_complaint_stats(business_id)
                        .await
                        .map(|_| ()),
                ),
            };

            match result {
                Ok(()) => {}
                Err(StoreError::NotFound(what)) => {
                    log::warn!("Dropping {job:?} for business {business_id}: {what} missing");
                }
                Err(err) => {
                    log::error!("Statistics left stale for business {business_id} after {job:?}: {err}");
                }
            }
        })
    }
}
