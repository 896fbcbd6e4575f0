use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// ============================================================================
// ENUMS
// ============================================================================

/// Listing lifecycle status (this is also a Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "business_listing_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BusinessListingStatus {
    Draft,
    Published,
    UnderReview,
    Suspended,
    Archived,
}

/// Moderation status of a customer review (also a Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "review_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
    Flagged,
}

impl ReviewStatus {
    pub fn is_approved(self) -> bool {
        self == ReviewStatus::Approved
    }
}

/// Complaint workflow status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "complaint_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Submitted,
    UnderReview,
    Forwarded,
    BusinessResponded,
    Resolved,
    Closed,
    Rejected,
}

impl ComplaintStatus {
    pub fn is_final(self) -> bool {
        matches!(self, ComplaintStatus::Resolved | ComplaintStatus::Closed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "complaint_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ComplaintType {
    Quality,
    Billing,
    CustomerService,
    Contract,
    Delivery,
    Advertising,
    Warranty,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "complaint_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ComplaintPriority {
    Low,
    Medium,
    High,
    Urgent,
}

// ============================================================================
// BUSINESSES
// ============================================================================

/// Denormalized counters derived from a business's reviews and complaints.
///
/// Only the aggregate recalculator and the view counter write these columns;
/// no request DTO carries them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BusinessStatistics {
    pub average_rating: f64,
    pub total_reviews: i64,
    pub total_complaints: i64,
    pub view_count: i64,
}

/// Directory listing
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Business {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub primary_category: String,
    pub about: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: BusinessListingStatus,
    pub verified: bool,
    pub featured: bool,
    pub owner_user_id: Option<Uuid>,
    #[sqlx(flatten)]
    pub statistics: BusinessStatistics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Business {
    pub fn is_owned_by(&self, actor_id: Uuid) -> bool {
        self.owner_user_id == Some(actor_id)
    }
}

/// Helper for creating new business
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBusiness {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub primary_category: String,
    pub about: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: BusinessListingStatus,
    pub owner_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial write to the statistics group. `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatisticsPatch {
    pub average_rating: Option<f64>,
    pub total_reviews: Option<i64>,
    pub total_complaints: Option<i64>,
    pub view_count: Option<i64>,
}

impl StatisticsPatch {
    pub fn is_empty(&self) -> bool {
        self.average_rating.is_none()
            && self.total_reviews.is_none()
            && self.total_complaints.is_none()
            && self.view_count.is_none()
    }

    pub fn apply_to(&self, statistics: &mut BusinessStatistics) {
        if let Some(average_rating) = self.average_rating {
            statistics.average_rating = average_rating;
        }
        if let Some(total_reviews) = self.total_reviews {
            statistics.total_reviews = total_reviews;
        }
        if let Some(total_complaints) = self.total_complaints {
            statistics.total_complaints = total_complaints;
        }
        if let Some(view_count) = self.view_count {
            statistics.view_count = view_count;
        }
    }
}

// ============================================================================
// REVIEWS
// ============================================================================

/// Customer review of a business
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: Uuid,
    pub business_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub title: Option<String>,
    pub review_text: String,
    pub terms_accepted: bool,
    pub status: ReviewStatus,
    pub moderation_notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub helpful_count: i32,
    pub reported_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// Staff see every review and authors see their own in any status.
    /// Everyone else only sees approved reviews.
    pub fn visible_to(&self, actor_id: Option<Uuid>, is_admin: bool) -> bool {
        is_admin || self.status.is_approved() || actor_id == Some(self.user_id)
    }

    /// Helpful votes and reports are only taken on published reviews.
    pub fn accepts_engagement(&self) -> bool {
        self.status.is_approved()
    }
}

/// Review as shown to the public, without moderation data.
#[derive(Debug, Clone, Serialize)]
pub struct PublicReview {
    pub id: Uuid,
    pub business_id: Uuid,
    pub rating: i32,
    pub title: Option<String>,
    pub review_text: String,
    pub helpful_count: i32,
    pub created_at: DateTime<Utc>,
}

impl From<Review> for PublicReview {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            business_id: review.business_id,
            rating: review.rating,
            title: review.title,
            review_text: review.review_text,
            helpful_count: review.helpful_count,
            created_at: review.created_at,
        }
    }
}

/// Reader feedback on a published review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewEngagement {
    Helpful,
    Reported,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReview {
    pub id: Uuid,
    pub business_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub title: Option<String>,
    pub review_text: String,
    pub terms_accepted: bool,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// COMPLAINTS
// ============================================================================

/// Customer complaint filed against a business
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Complaint {
    pub id: Uuid,
    pub business_id: Uuid,
    pub submitted_by: Uuid,
    pub complaint_type: ComplaintType,
    pub complaint_summary: String,
    pub complaint_details: String,
    pub desired_resolution: Option<String>,
    pub status: ComplaintStatus,
    pub priority: ComplaintPriority,
    pub visible_to_public: bool,
    pub assigned_to: Option<Uuid>,
    pub business_response: Option<String>,
    pub resolution_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComplaint {
    pub id: Uuid,
    pub business_id: Uuid,
    pub submitted_by: Uuid,
    pub complaint_type: ComplaintType,
    pub complaint_summary: String,
    pub complaint_details: String,
    pub desired_resolution: Option<String>,
    pub status: ComplaintStatus,
    pub priority: ComplaintPriority,
    pub visible_to_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// REQUEST/RESPONSE DTOs
// ============================================================================

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}

/// Request to create a business listing
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBusinessRequest {
    #[validate(length(min = 2, max = 160))]
    pub name: String,
    #[validate(length(min = 2, max = 160))]
    pub slug: Option<String>,
    #[validate(length(min = 2, max = 120))]
    pub primary_category: String,
    #[validate(length(max = 4000))]
    pub about: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub status: Option<BusinessListingStatus>,
    pub owner_user_id: Option<Uuid>,
}

impl CreateBusinessRequest {
    pub fn into_new_business(self) -> NewBusiness {
        let now = Utc::now();
        let slug = match self.slug.as_deref().map(slugify) {
            Some(slug) if !slug.is_empty() => slug,
            _ => slugify(&self.name),
        };

        NewBusiness {
            id: Uuid::new_v4(),
            name: self.name,
            slug,
            primary_category: self.primary_category,
            about: self.about,
            website: self.website,
            phone: self.phone,
            email: self.email,
            status: self.status.unwrap_or(BusinessListingStatus::Draft),
            owner_user_id: self.owner_user_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request to edit a listing. Statistics are deliberately absent.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBusinessRequest {
    #[validate(length(min = 2, max = 160))]
    pub name: String,
    #[validate(length(min = 2, max = 120))]
    pub primary_category: String,
    #[validate(length(max = 4000))]
    pub about: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub status: BusinessListingStatus,
    pub verified: bool,
    pub featured: bool,
}

impl UpdateBusinessRequest {
    pub fn apply_to_existing(&self, existing: &mut Business) {
        existing.name = self.name.clone();
        existing.primary_category = self.primary_category.clone();
        existing.about = self.about.clone();
        existing.website = self.website.clone();
        existing.phone = self.phone.clone();
        existing.email = self.email.clone();
        existing.status = self.status;
        existing.verified = self.verified;
        existing.featured = self.featured;
        existing.updated_at = Utc::now();
    }
}

/// Review submitted by a customer; the author comes from the actor headers.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(min = 3, max = 120))]
    pub title: Option<String>,
    #[validate(length(min = 10, max = 2000))]
    pub review_text: String,
    pub terms_accepted: bool,
}

impl SubmitReviewRequest {
    pub fn validate_business_rules(&self) -> Result<(), String> {
        if !self.terms_accepted {
            return Err("Terms must be accepted before submitting a review".into());
        }
        Ok(())
    }

    pub fn into_new_review(self, business_id: Uuid, user_id: Uuid) -> NewReview {
        let now = Utc::now();
        NewReview {
            id: Uuid::new_v4(),
            business_id,
            user_id,
            rating: self.rating,
            title: self.title,
            review_text: self.review_text,
            terms_accepted: self.terms_accepted,
            status: ReviewStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Moderation decision applied by staff
#[derive(Debug, Deserialize, Validate)]
pub struct ModerateReviewRequest {
    pub status: ReviewStatus,
    #[validate(length(max = 2000))]
    pub moderation_notes: Option<String>,
}

impl ModerateReviewRequest {
    pub fn validate_business_rules(&self) -> Result<(), String> {
        let has_notes = self
            .moderation_notes
            .as_deref()
            .is_some_and(|notes| !notes.trim().is_empty());

        if matches!(self.status, ReviewStatus::Rejected | ReviewStatus::Flagged) && !has_notes {
            return Err("Moderation notes are required when rejecting or flagging a review".into());
        }
        Ok(())
    }

    pub fn apply_to_existing(&self, existing: &mut Review, reviewer_id: Uuid) {
        let now = Utc::now();
        existing.status = self.status;
        if let Some(notes) = &self.moderation_notes {
            existing.moderation_notes = Some(notes.clone());
        }
        existing.reviewed_by = Some(reviewer_id);
        existing.reviewed_at = Some(now);
        existing.updated_at = now;
    }
}

/// Attestations a customer must make before a complaint is accepted.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct ComplaintScreening {
    pub not_buyers_remorse: bool,
    pub not_price_comparison: bool,
    pub not_seeking_apology_only: bool,
    pub not_for_information_only: bool,
    pub not_discrimination_claim: bool,
}

impl ComplaintScreening {
    pub fn passes(&self) -> bool {
        self.not_buyers_remorse
            && self.not_price_comparison
            && self.not_seeking_apology_only
            && self.not_for_information_only
            && self.not_discrimination_claim
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateComplaintRequest {
    pub complaint_type: ComplaintType,
    #[validate(length(min = 10, max = 200))]
    pub complaint_summary: String,
    #[validate(length(min = 20, max = 5000))]
    pub complaint_details: String,
    #[validate(length(max = 2000))]
    pub desired_resolution: Option<String>,
    pub screening: ComplaintScreening,
    pub visible_to_public: Option<bool>,
}

impl CreateComplaintRequest {
    pub fn validate_business_rules(&self) -> Result<(), String> {
        if !self.screening.passes() {
            return Err(
                "Complaint does not pass preliminary screening and cannot be filed".into(),
            );
        }
        Ok(())
    }

    pub fn into_new_complaint(self, business_id: Uuid, submitted_by: Uuid) -> NewComplaint {
        let now = Utc::now();
        NewComplaint {
            id: Uuid::new_v4(),
            business_id,
            submitted_by,
            complaint_type: self.complaint_type,
            complaint_summary: self.complaint_summary,
            complaint_details: self.complaint_details,
            desired_resolution: self.desired_resolution,
            status: ComplaintStatus::Submitted,
            priority: ComplaintPriority::Medium,
            visible_to_public: self.visible_to_public.unwrap_or(true),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Staff workflow update on a complaint
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateComplaintRequest {
    pub status: ComplaintStatus,
    pub priority: ComplaintPriority,
    pub visible_to_public: bool,
    pub assigned_to: Option<Uuid>,
    #[validate(length(max = 4000))]
    pub business_response: Option<String>,
    #[validate(length(max = 4000))]
    pub resolution_summary: Option<String>,
}

impl UpdateComplaintRequest {
    pub fn validate_business_rules(&self) -> Result<(), String> {
        if self.resolution_summary.is_some() && !self.status.is_final() {
            return Err(
                "A resolution summary can only be recorded on resolved or closed complaints"
                    .into(),
            );
        }
        Ok(())
    }

    pub fn apply_to_existing(&self, existing: &mut Complaint) {
        existing.status = self.status;
        existing.priority = self.priority;
        existing.visible_to_public = self.visible_to_public;
        existing.assigned_to = self.assigned_to;
        if let Some(response) = &self.business_response {
            existing.business_response = Some(response.clone());
        }
        if let Some(summary) = &self.resolution_summary {
            existing.resolution_summary = Some(summary.clone());
        }
        existing.updated_at = Utc::now();
    }
}

/// Public response from the business owner to a complaint.
#[derive(Debug, Deserialize, Validate)]
pub struct RespondToComplaintRequest {
    #[validate(length(min = 10, max = 4000))]
    pub response: String,
}

impl RespondToComplaintRequest {
    pub fn validate_business_rules(&self, existing: &Complaint) -> Result<(), String> {
        if existing.status.is_final() || existing.status == ComplaintStatus::Rejected {
            return Err("This complaint is closed and no longer accepts responses".into());
        }
        if self.response.trim().is_empty() {
            return Err("Response text is required".into());
        }
        Ok(())
    }

    pub fn apply_to_existing(&self, existing: &mut Complaint) {
        existing.business_response = Some(self.response.trim().to_string());
        existing.status = ComplaintStatus::BusinessResponded;
        existing.updated_at = Utc::now();
    }
}

/// URL-friendly identifier derived from a display name.
pub fn slugify(value: &str) -> String {
    let cleaned: String = value
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_request(rating: i32, terms_accepted: bool) -> SubmitReviewRequest {
        SubmitReviewRequest {
            rating,
            title: None,
            review_text: "Roof was fixed on time and cleaned up after.".into(),
            terms_accepted,
        }
    }

    #[test]
    fn slugify_matches_listing_urls() {
        assert_eq!(slugify("FG Roofing, Inc."), "fg-roofing-inc");
        assert_eq!(slugify("  Joe's   Diner "), "joes-diner");
        assert_eq!(slugify("already-a_slug"), "already-a_slug");
        assert_eq!(slugify("Café Olé"), "caf-ol");
    }

    #[test]
    fn new_business_falls_back_to_name_slug() {
        let request = CreateBusinessRequest {
            name: "Acme Plumbing".into(),
            slug: Some("!!!".into()),
            primary_category: "plumbing".into(),
            about: None,
            website: None,
            phone: None,
            email: None,
            status: None,
            owner_user_id: None,
        };

        let business = request.into_new_business();
        assert_eq!(business.slug, "acme-plumbing");
        assert_eq!(business.status, BusinessListingStatus::Draft);
    }

    #[test]
    fn review_rating_must_be_between_one_and_five() {
        assert!(review_request(0, true).validate().is_err());
        assert!(review_request(6, true).validate().is_err());
        assert!(review_request(1, true).validate().is_ok());
        assert!(review_request(5, true).validate().is_ok());
    }

    #[test]
    fn review_requires_terms_and_starts_pending() {
        assert!(review_request(4, false).validate_business_rules().is_err());

        let review = review_request(4, true).into_new_review(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(review.status, ReviewStatus::Pending);
    }

    #[test]
    fn rejecting_a_review_requires_notes() {
        let blank = ModerateReviewRequest {
            status: ReviewStatus::Rejected,
            moderation_notes: Some("   ".into()),
        };
        assert!(blank.validate_business_rules().is_err());

        let approve = ModerateReviewRequest {
            status: ReviewStatus::Approved,
            moderation_notes: None,
        };
        assert!(approve.validate_business_rules().is_ok());
    }

    #[test]
    fn complaint_screening_rejects_partial_attestation() {
        let mut screening = ComplaintScreening {
            not_buyers_remorse: true,
            not_price_comparison: true,
            not_seeking_apology_only: true,
            not_for_information_only: true,
            not_discrimination_claim: true,
        };
        assert!(screening.passes());

        screening.not_price_comparison = false;
        assert!(!screening.passes());
    }

    #[test]
    fn resolution_summary_only_on_final_status() {
        let mut request = UpdateComplaintRequest {
            status: ComplaintStatus::UnderReview,
            priority: ComplaintPriority::High,
            visible_to_public: true,
            assigned_to: None,
            business_response: None,
            resolution_summary: Some("Refund issued".into()),
        };
        assert!(request.validate_business_rules().is_err());

        request.status = ComplaintStatus::Resolved;
        assert!(request.validate_business_rules().is_ok());
    }

    fn review_with_status(status: ReviewStatus) -> Review {
        let now = Utc::now();
        Review {
            id: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            rating: 2,
            title: Some("Late again".into()),
            review_text: "Crew showed up two days after the agreed date.".into(),
            terms_accepted: true,
            status,
            moderation_notes: Some("Mentions a staff member by name".into()),
            reviewed_by: Some(Uuid::new_v4()),
            reviewed_at: Some(now),
            helpful_count: 3,
            reported_count: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn complaint_with_status(status: ComplaintStatus) -> Complaint {
        let now = Utc::now();
        Complaint {
            id: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            submitted_by: Uuid::new_v4(),
            complaint_type: ComplaintType::Warranty,
            complaint_summary: "Warranty claim ignored".into(),
            complaint_details: "Two emails and a call about the leak went unanswered.".into(),
            desired_resolution: None,
            status,
            priority: ComplaintPriority::Medium,
            visible_to_public: true,
            assigned_to: None,
            business_response: None,
            resolution_summary: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unapproved_review_visible_only_to_author_and_staff() {
        let flagged = review_with_status(ReviewStatus::Flagged);
        let author = flagged.user_id;

        assert!(!flagged.visible_to(None, false));
        assert!(!flagged.visible_to(Some(Uuid::new_v4()), false));
        assert!(flagged.visible_to(Some(author), false));
        assert!(flagged.visible_to(None, true));

        let approved = review_with_status(ReviewStatus::Approved);
        assert!(approved.visible_to(None, false));
    }

    #[test]
    fn public_review_drops_moderation_fields() {
        let review = review_with_status(ReviewStatus::Approved);
        let json = serde_json::to_value(PublicReview::from(review)).unwrap();
        let object = json.as_object().unwrap();

        for hidden in ["moderation_notes", "reviewed_by", "reviewed_at", "reported_count", "status"] {
            assert!(!object.contains_key(hidden), "{hidden} leaked");
        }
        assert_eq!(object["helpful_count"], 3);
        assert_eq!(object["rating"], 2);
    }

    #[test]
    fn only_approved_reviews_take_engagement() {
        assert!(review_with_status(ReviewStatus::Approved).accepts_engagement());
        for status in [ReviewStatus::Pending, ReviewStatus::Rejected, ReviewStatus::Flagged] {
            assert!(!review_with_status(status).accepts_engagement());
        }
        assert_eq!(
            serde_json::from_str::<ReviewEngagement>("\"reported\"").unwrap(),
            ReviewEngagement::Reported
        );
    }

    #[test]
    fn owner_response_marks_complaint_responded() {
        let request = RespondToComplaintRequest {
            response: "  We have scheduled a free repair visit for Monday.  ".into(),
        };
        let mut complaint = complaint_with_status(ComplaintStatus::Forwarded);
        assert!(request.validate().is_ok());
        assert!(request.validate_business_rules(&complaint).is_ok());

        request.apply_to_existing(&mut complaint);
        assert_eq!(complaint.status, ComplaintStatus::BusinessResponded);
        assert_eq!(
            complaint.business_response.as_deref(),
            Some("We have scheduled a free repair visit for Monday.")
        );
    }

    #[test]
    fn unclaimed_listing_has_no_owner() {
        let store = crate::store::memory::MemoryStore::new();
        let mut business = store.add_business();
        let owner = Uuid::new_v4();
        assert!(!business.is_owned_by(owner));

        business.owner_user_id = Some(owner);
        assert!(business.is_owned_by(owner));
        assert!(!business.is_owned_by(Uuid::new_v4()));
    }

    #[test]
    fn closed_complaints_refuse_owner_responses() {
        let request = RespondToComplaintRequest {
            response: "Sorry to hear that, please call us.".into(),
        };
        for status in [
            ComplaintStatus::Resolved,
            ComplaintStatus::Closed,
            ComplaintStatus::Rejected,
        ] {
            assert!(request
                .validate_business_rules(&complaint_with_status(status))
                .is_err());
        }

        let blank = RespondToComplaintRequest {
            response: "          ".into(),
        };
        assert!(blank
            .validate_business_rules(&complaint_with_status(ComplaintStatus::Submitted))
            .is_err());
    }

    #[test]
    fn statistics_patch_only_touches_set_fields() {
        let mut statistics = BusinessStatistics {
            average_rating: 4.5,
            total_reviews: 2,
            total_complaints: 7,
            view_count: 40,
        };

        let patch = StatisticsPatch {
            total_complaints: Some(3),
            ..Default::default()
        };
        patch.apply_to(&mut statistics);

        assert_eq!(statistics.total_complaints, 3);
        assert_eq!(statistics.average_rating, 4.5);
        assert_eq!(statistics.view_count, 40);
        assert!(StatisticsPatch::default().is_empty());
    }
}
