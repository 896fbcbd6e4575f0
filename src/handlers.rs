use actix_web::{get, post, put, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::clients::notifications::{ComplaintFiledNotification, NotificationsClient};
use crate::database::Database;
use crate::models::{
    ApiResponse, CreateBusinessRequest, CreateComplaintRequest, ModerateReviewRequest,
    PublicReview, RespondToComplaintRequest, ReviewEngagement, SubmitReviewRequest,
    UpdateBusinessRequest, UpdateComplaintRequest,
};
use crate::store::StoreError;
use crate::triggers::{ChangeNotifier, ChangeOperation};

pub type Notifier = ChangeNotifier<Database>;

fn extract_actor_headers(req: &HttpRequest) -> Result<(Uuid, String), String> {
    let actor_id = req
        .headers()
        .get("X-Actor-Id")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| "Missing or invalid X-Actor-Id header".to_string())?;

    let actor_name = req
        .headers()
        .get("X-Actor-Name")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| "Missing X-Actor-Name header".to_string())?;

    Ok((actor_id, actor_name))
}

/// Actor id for routes that also serve anonymous readers.
fn optional_actor_id(req: &HttpRequest) -> Option<Uuid> {
    req.headers()
        .get("X-Actor-Id")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn is_admin(req: &HttpRequest) -> bool {
    req.headers()
        .get("X-Actor-Role")
        .and_then(|h| h.to_str().ok())
        .is_some_and(|role| role.eq_ignore_ascii_case("admin"))
}

/// Staff-only routes need both actor headers and the admin role.
fn require_admin(req: &HttpRequest) -> Result<Uuid, HttpResponse> {
    let (actor_id, _actor_name) = extract_actor_headers(req)
        .map_err(|err| HttpResponse::BadRequest().json(ApiResponse::<()>::error(err)))?;

    if !is_admin(req) {
        return Err(HttpResponse::Forbidden()
            .json(ApiResponse::<()>::error("Admin role required".into())));
    }
    Ok(actor_id)
}

// ============================================================================
// HEALTH CHECK
// ============================================================================

#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "business-directory-review-service",
        "timestamp": chrono::Utc::now()
    }))
}

// ============================================================================
// BUSINESSES
// ============================================================================

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct BusinessListQuery {
    pub min_rating: Option<f64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[post("/businesses")]
pub async fn create_business(
    req: HttpRequest,
    db: web::Data<Database>,
    payload: web::Json<CreateBusinessRequest>,
) -> impl Responder {
    let (_actor_id, _actor_name) = match extract_actor_headers(&req) {
        Ok(headers) => headers,
        Err(err) => {
            return HttpResponse::BadRequest().json(ApiResponse::<()>::error(err));
        }
    };

    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    let new_business = body.into_new_business();
    match db.create_business(new_business).await {
        Ok(business) => HttpResponse::Created().json(ApiResponse::success(business)),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            HttpResponse::Conflict()
                .json(ApiResponse::<()>::error("A listing with this slug already exists".into()))
        }
        Err(err) => {
            log::error!("Failed to create business: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to create business".into()))
        }
    }
}

#[get("/businesses")]
pub async fn list_businesses(
    db: web::Data<Database>,
    query: web::Query<BusinessListQuery>,
) -> impl Responder {
    let min_rating = query.min_rating.unwrap_or(0.0).clamp(0.0, 5.0);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    match db.list_published_businesses(min_rating, limit, offset).await {
        Ok(businesses) => HttpResponse::Ok().json(ApiResponse::success(businesses)),
        Err(err) => {
            log::error!("Failed to list businesses: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to list businesses".into()))
        }
    }
}

#[get("/businesses/{business_id}")]
pub async fn get_business(
    req: HttpRequest,
    db: web::Data<Database>,
    notifier: web::Data<Notifier>,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    let business_id = business_id.into_inner();
    match db.get_business(business_id).await {
        Ok(Some(business)) => {
            if !is_admin(&req) {
                let _ = notifier.on_public_read(&business);
            }
            HttpResponse::Ok().json(ApiResponse::success(business))
        }
        Ok(None) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Business not found".into()))
        }
        Err(err) => {
            log::error!("Failed to get business: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to get business".into()))
        }
    }
}

#[put("/businesses/{business_id}")]
pub async fn update_business(
    req: HttpRequest,
    db: web::Data<Database>,
    business_id: web::Path<Uuid>,
    payload: web::Json<UpdateBusinessRequest>,
) -> impl Responder {
    let (_actor_id, _actor_name) = match extract_actor_headers(&req) {
        Ok(headers) => headers,
        Err(err) => {
            return HttpResponse::BadRequest().json(ApiResponse::<()>::error(err));
        }
    };

    let business_id = business_id.into_inner();
    let body = payload.into_inner();

    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    let mut existing_business = match db.get_business(business_id).await {
        Ok(Some(biz)) => biz,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Business not found".into()));
        }
        Err(err) => {
            log::error!("Failed to fetch business: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to load business".into()));
        }
    };

    body.apply_to_existing(&mut existing_business);

    match db.update_business(existing_business).await {
        Ok(updated) => HttpResponse::Ok().json(ApiResponse::success(updated)),
        Err(err) => {
            log::error!("Failed to update business: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to update business".into()))
        }
    }
}

#[post("/businesses/{business_id}/statistics/recompute")]
pub async fn recompute_business_statistics(
    req: HttpRequest,
    notifier: web::Data<Notifier>,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    if let Err(response) = require_admin(&req) {
        return response;
    }

    let business_id = business_id.into_inner();
    match notifier.recalculator().recompute_all(business_id).await {
        Ok(summary) => HttpResponse::Ok().json(ApiResponse::success(summary)),
        Err(StoreError::NotFound(_)) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Business not found".into()))
        }
        Err(err) => {
            log::error!("Failed to recompute statistics for {business_id}: {err}");
            HttpResponse::ServiceUnavailable()
                .json(ApiResponse::<()>::error("Failed to recompute statistics".into()))
        }
    }
}

// ============================================================================
// REVIEWS
// ============================================================================

#[post("/businesses/{business_id}/reviews")]
pub async fn submit_review(
    req: HttpRequest,
    db: web::Data<Database>,
    notifier: web::Data<Notifier>,
    business_id: web::Path<Uuid>,
    payload: web::Json<SubmitReviewRequest>,
) -> impl Responder {
    let (actor_id, _actor_name) = match extract_actor_headers(&req) {
        Ok(headers) => headers,
        Err(err) => {
            return HttpResponse::BadRequest().json(ApiResponse::<()>::error(err));
        }
    };

    let business_id = business_id.into_inner();
    let body = payload.into_inner();

    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    if let Err(message) = body.validate_business_rules() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(message));
    }

    match db.get_business(business_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Business not found".into()));
        }
        Err(err) => {
            log::error!("Failed to fetch business: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to submit review".into()));
        }
    }

    let new_review = body.into_new_review(business_id, actor_id);
    match db.create_review(new_review).await {
        Ok(review) => {
            notifier.on_review_change(None, &review, ChangeOperation::Create);
            HttpResponse::Created().json(ApiResponse::success(review))
        }
        Err(err) => {
            log::error!("Failed to create review: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to submit review".into()))
        }
    }
}

#[get("/businesses/{business_id}/reviews")]
pub async fn list_business_reviews(
    db: web::Data<Database>,
    business_id: web::Path<Uuid>,
    query: web::Query<PaginationQuery>,
) -> impl Responder {
    let business_id = business_id.into_inner();
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    match db
        .list_approved_reviews_for_business(business_id, limit, offset)
        .await
    {
        Ok(reviews) => {
            let reviews: Vec<PublicReview> = reviews.into_iter().map(PublicReview::from).collect();
            HttpResponse::Ok().json(ApiResponse::success(reviews))
        }
        Err(err) => {
            log::error!("Failed to list reviews: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to list reviews".into()))
        }
    }
}

#[get("/reviews/pending")]
pub async fn list_pending_reviews(
    req: HttpRequest,
    db: web::Data<Database>,
    query: web::Query<PaginationQuery>,
) -> impl Responder {
    if let Err(response) = require_admin(&req) {
        return response;
    }

    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    match db.list_pending_reviews(limit, offset).await {
        Ok(records) => HttpResponse::Ok().json(ApiResponse::success(records)),
        Err(err) => {
            log::error!("Failed to list pending reviews: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to list pending reviews".into()))
        }
    }
}

/// Staff and the author get the full record. Everyone else only sees
/// approved reviews, without moderation data.
#[get("/reviews/{review_id}")]
pub async fn get_review(
    req: HttpRequest,
    db: web::Data<Database>,
    review_id: web::Path<Uuid>,
) -> impl Responder {
    let review_id = review_id.into_inner();
    let actor_id = optional_actor_id(&req);
    let admin = is_admin(&req);

    match db.get_review(review_id).await {
        Ok(Some(review)) if admin || actor_id == Some(review.user_id) => {
            HttpResponse::Ok().json(ApiResponse::success(review))
        }
        Ok(Some(review)) if review.visible_to(actor_id, admin) => {
            HttpResponse::Ok().json(ApiResponse::success(PublicReview::from(review)))
        }
        Ok(_) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Review not found".into()))
        }
        Err(err) => {
            log::error!("Failed to get review: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to get review".into()))
        }
    }
}

#[post("/reviews/{review_id}/helpful")]
pub async fn mark_review_helpful(
    req: HttpRequest,
    db: web::Data<Database>,
    review_id: web::Path<Uuid>,
) -> impl Responder {
    record_engagement(&req, &db, review_id.into_inner(), ReviewEngagement::Helpful).await
}

#[post("/reviews/{review_id}/report")]
pub async fn report_review(
    req: HttpRequest,
    db: web::Data<Database>,
    review_id: web::Path<Uuid>,
) -> impl Responder {
    record_engagement(&req, &db, review_id.into_inner(), ReviewEngagement::Reported).await
}

async fn record_engagement(
    req: &HttpRequest,
    db: &Database,
    review_id: Uuid,
    engagement: ReviewEngagement,
) -> HttpResponse {
    if let Err(err) = extract_actor_headers(req) {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(err));
    }

    match db.get_review(review_id).await {
        Ok(Some(review)) if review.accepts_engagement() => {}
        Ok(Some(_)) | Ok(None) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Review not found".into()));
        }
        Err(err) => {
            log::error!("Failed to fetch review: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to record feedback".into()));
        }
    }

    match db.record_review_engagement(review_id, engagement).await {
        Ok(Some(review)) => {
            HttpResponse::Ok().json(ApiResponse::success(PublicReview::from(review)))
        }
        // Moderated away between the read and the increment.
        Ok(None) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Review not found".into()))
        }
        Err(err) => {
            log::error!("Failed to record {engagement:?} for review {review_id}: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to record feedback".into()))
        }
    }
}

#[put("/reviews/{review_id}/moderation")]
pub async fn moderate_review(
    req: HttpRequest,
    db: web::Data<Database>,
    notifier: web::Data<Notifier>,
    review_id: web::Path<Uuid>,
    payload: web::Json<ModerateReviewRequest>,
) -> impl Responder {
    let reviewer_id = match require_admin(&req) {
        Ok(actor_id) => actor_id,
        Err(response) => return response,
    };

    let review_id = review_id.into_inner();
    let body = payload.into_inner();

    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    if let Err(message) = body.validate_business_rules() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(message));
    }

    let previous = match db.get_review(review_id).await {
        Ok(Some(review)) => review,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Review not found".into()));
        }
        Err(err) => {
            log::error!("Failed to fetch review: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to load review".into()));
        }
    };

    let mut moderated = previous.clone();
    body.apply_to_existing(&mut moderated, reviewer_id);

    match db.update_review_moderation(moderated).await {
        Ok(updated) => {
            notifier.on_review_change(Some(&previous), &updated, ChangeOperation::Update);
            HttpResponse::Ok().json(ApiResponse::success(updated))
        }
        Err(err) => {
            log::error!("Failed to moderate review: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to moderate review".into()))
        }
    }
}

// ============================================================================
// COMPLAINTS
// ============================================================================

#[post("/businesses/{business_id}/complaints")]
pub async fn file_complaint(
    req: HttpRequest,
    db: web::Data<Database>,
    notifier: web::Data<Notifier>,
    notifications: web::Data<Option<NotificationsClient>>,
    business_id: web::Path<Uuid>,
    payload: web::Json<CreateComplaintRequest>,
) -> impl Responder {
    let (actor_id, _actor_name) = match extract_actor_headers(&req) {
        Ok(headers) => headers,
        Err(err) => {
            return HttpResponse::BadRequest().json(ApiResponse::<()>::error(err));
        }
    };

    let business_id = business_id.into_inner();
    let body = payload.into_inner();

    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    if let Err(message) = body.validate_business_rules() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(message));
    }

    let business = match db.get_business(business_id).await {
        Ok(Some(business)) => business,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Business not found".into()));
        }
        Err(err) => {
            log::error!("Failed to fetch business: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to file complaint".into()));
        }
    };

    let new_complaint = body.into_new_complaint(business_id, actor_id);
    match db.create_complaint(new_complaint).await {
        Ok(complaint) => {
            notifier.on_complaint_change(None, &complaint, ChangeOperation::Create);

            if let Some(client) = notifications.get_ref().clone() {
                let notification = ComplaintFiledNotification::new(
                    &complaint,
                    business.name,
                    business.owner_user_id,
                );
                tokio::spawn(async move {
                    if let Err(err) = client.complaint_filed(notification).await {
                        log::warn!("Complaint notification not delivered: {err}");
                    }
                });
            }

            HttpResponse::Created().json(ApiResponse::success(complaint))
        }
        Err(err) => {
            log::error!("Failed to create complaint: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to file complaint".into()))
        }
    }
}

/// Staff and the listing owner see every complaint, hidden ones included.
#[get("/businesses/{business_id}/complaints")]
pub async fn list_business_complaints(
    req: HttpRequest,
    db: web::Data<Database>,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    let (actor_id, _actor_name) = match extract_actor_headers(&req) {
        Ok(headers) => headers,
        Err(err) => {
            return HttpResponse::BadRequest().json(ApiResponse::<()>::error(err));
        }
    };

    let business_id = business_id.into_inner();
    match db.get_business(business_id).await {
        Ok(Some(business)) if is_admin(&req) || business.is_owned_by(actor_id) => {}
        Ok(Some(_)) => {
            return HttpResponse::Forbidden().json(ApiResponse::<()>::error(
                "Not allowed to view complaints for this business".into(),
            ));
        }
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Business not found".into()));
        }
        Err(err) => {
            log::error!("Failed to fetch business: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to list complaints".into()));
        }
    }

    match db.list_complaints_for_business(business_id).await {
        Ok(complaints) => HttpResponse::Ok().json(ApiResponse::success(complaints)),
        Err(err) => {
            log::error!("Failed to list complaints: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to list complaints".into()))
        }
    }
}

/// Visible to staff and to the customer who filed it.
#[get("/complaints/{complaint_id}")]
pub async fn get_complaint(
    req: HttpRequest,
    db: web::Data<Database>,
    complaint_id: web::Path<Uuid>,
) -> impl Responder {
    let (actor_id, _actor_name) = match extract_actor_headers(&req) {
        Ok(headers) => headers,
        Err(err) => {
            return HttpResponse::BadRequest().json(ApiResponse::<()>::error(err));
        }
    };

    let complaint_id = complaint_id.into_inner();
    match db.get_complaint(complaint_id).await {
        Ok(Some(complaint)) if is_admin(&req) || complaint.submitted_by == actor_id => {
            HttpResponse::Ok().json(ApiResponse::success(complaint))
        }
        Ok(Some(_)) => HttpResponse::Forbidden()
            .json(ApiResponse::<()>::error("Not allowed to view this complaint".into())),
        Ok(None) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Complaint not found".into()))
        }
        Err(err) => {
            log::error!("Failed to get complaint: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to get complaint".into()))
        }
    }
}

#[put("/complaints/{complaint_id}")]
pub async fn update_complaint(
    req: HttpRequest,
    db: web::Data<Database>,
    notifier: web::Data<Notifier>,
    complaint_id: web::Path<Uuid>,
    payload: web::Json<UpdateComplaintRequest>,
) -> impl Responder {
    if let Err(response) = require_admin(&req) {
        return response;
    }

    let complaint_id = complaint_id.into_inner();
    let body = payload.into_inner();

    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    if let Err(message) = body.validate_business_rules() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error(message));
    }

    let previous = match db.get_complaint(complaint_id).await {
        Ok(Some(complaint)) => complaint,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Complaint not found".into()));
        }
        Err(err) => {
            log::error!("Failed to fetch complaint: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to load complaint".into()));
        }
    };

    let mut changed = previous.clone();
    body.apply_to_existing(&mut changed);

    match db.update_complaint(changed).await {
        Ok(updated) => {
            notifier.on_complaint_change(Some(&previous), &updated, ChangeOperation::Update);
            HttpResponse::Ok().json(ApiResponse::success(updated))
        }
        Err(err) => {
            log::error!("Failed to update complaint: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to update complaint".into()))
        }
    }
}

/// The listing owner (or staff) answers a complaint on the business's behalf.
#[post("/complaints/{complaint_id}/response")]
pub async fn respond_to_complaint(
    req: HttpRequest,
    db: web::Data<Database>,
    notifier: web::Data<Notifier>,
    complaint_id: web::Path<Uuid>,
    payload: web::Json<RespondToComplaintRequest>,
) -> impl Responder {
    let (actor_id, _actor_name) = match extract_actor_headers(&req) {
        Ok(headers) => headers,
        Err(err) => {
            return HttpResponse::BadRequest().json(ApiResponse::<()>::error(err));
        }
    };

    let complaint_id = complaint_id.into_inner();
    let body = payload.into_inner();

    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    let previous = match db.get_complaint(complaint_id).await {
        Ok(Some(complaint)) => complaint,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Complaint not found".into()));
        }
        Err(err) => {
            log::error!("Failed to fetch complaint: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to load complaint".into()));
        }
    };

    match db.get_business(previous.business_id).await {
        Ok(Some(business)) if is_admin(&req) || business.is_owned_by(actor_id) => {}
        Ok(Some(_)) => {
            return HttpResponse::Forbidden().json(ApiResponse::<()>::error(
                "Only the business owner can respond to this complaint".into(),
            ));
        }
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Business not found".into()));
        }
        Err(err) => {
            log::error!("Failed to fetch business: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to load complaint".into()));
        }
    }

    if let Err(message) = body.validate_business_rules(&previous) {
        return HttpResponse::Conflict().json(ApiResponse::<()>::error(message));
    }

    let mut responded = previous.clone();
    body.apply_to_existing(&mut responded);

    match db.update_complaint(responded).await {
        Ok(updated) => {
            notifier.on_complaint_change(Some(&previous), &updated, ChangeOperation::Update);
            HttpResponse::Ok().json(ApiResponse::success(updated))
        }
        Err(err) => {
            log::error!("Failed to record complaint response: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to record response".into()))
        }
    }
}

// Route-level tests against Postgres; skipped unless TEST_DATABASE_URL is set.
#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::{test, App};
    use serde_json::{json, Value};

    use super::*;
    use crate::aggregates::AggregateRecalculator;
    use crate::database::tests::{seed_business, seed_complaint, seed_review, test_database};
    use crate::models::ReviewStatus;
    use crate::triggers::TriggerPolicy;

    fn notifier_for(db: &Database) -> web::Data<Notifier> {
        let recalculator = AggregateRecalculator::new(Arc::new(db.clone()));
        web::Data::new(ChangeNotifier::new(recalculator, TriggerPolicy::default()))
    }

    macro_rules! directory_app {
        ($db:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($db.clone()))
                    .app_data(notifier_for(&$db))
                    .app_data(web::Data::new(None::<NotificationsClient>))
                    .service(submit_review)
                    .service(get_review)
                    .service(mark_review_helpful)
                    .service(moderate_review)
                    .service(respond_to_complaint),
            )
            .await
        };
    }

    async fn wait_for_total_reviews(db: &Database, business_id: Uuid, expected: i64) -> bool {
        for _ in 0..50 {
            let business = db.get_business(business_id).await.unwrap().unwrap();
            if business.statistics.total_reviews == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[actix_web::test]
    async fn approving_a_review_over_http_refreshes_listing_totals() {
        let Some(db) = test_database().await else { return };
        let app = directory_app!(db);
        let business = seed_business(&db, "Wired Windows").await;
        let author = Uuid::new_v4();

        let submitted: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri(&format!("/businesses/{}/reviews", business.id))
                .insert_header(("X-Actor-Id", author.to_string()))
                .insert_header(("X-Actor-Name", "Dana"))
                .set_json(json!({
                    "rating": 4,
                    "review_text": "Replaced every window in one day.",
                    "terms_accepted": true
                }))
                .to_request(),
        )
        .await;
        let review_id = submitted["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(submitted["data"]["status"], "pending");

        let moderated = test::call_service(
            &app,
            test::TestRequest::put()
                .uri(&format!("/reviews/{review_id}/moderation"))
                .insert_header(("X-Actor-Id", Uuid::new_v4().to_string()))
                .insert_header(("X-Actor-Name", "Moderator"))
                .insert_header(("X-Actor-Role", "admin"))
                .set_json(json!({ "status": "approved" }))
                .to_request(),
        )
        .await;
        assert!(moderated.status().is_success());

        assert!(wait_for_total_reviews(&db, business.id, 1).await);
        let stored = db.get_business(business.id).await.unwrap().unwrap();
        assert_eq!(stored.statistics.average_rating, 4.0);
    }

    #[actix_web::test]
    async fn unapproved_review_is_hidden_from_other_readers() {
        let Some(db) = test_database().await else { return };
        let app = directory_app!(db);
        let business = seed_business(&db, "Private Paving").await;
        let review = seed_review(&db, business.id, 1, ReviewStatus::Flagged).await;
        let uri = format!("/reviews/{}", review.id);

        let anonymous =
            test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(anonymous.status(), actix_web::http::StatusCode::NOT_FOUND);

        let stranger = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&uri)
                .insert_header(("X-Actor-Id", Uuid::new_v4().to_string()))
                .to_request(),
        )
        .await;
        assert_eq!(stranger.status(), actix_web::http::StatusCode::NOT_FOUND);

        let own: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri(&uri)
                .insert_header(("X-Actor-Id", review.user_id.to_string()))
                .to_request(),
        )
        .await;
        assert_eq!(own["data"]["status"], "flagged");

        let helpful = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/reviews/{}/helpful", review.id))
                .insert_header(("X-Actor-Id", Uuid::new_v4().to_string()))
                .insert_header(("X-Actor-Name", "Sam"))
                .to_request(),
        )
        .await;
        assert_eq!(helpful.status(), actix_web::http::StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn approved_review_is_public_without_moderation_fields() {
        let Some(db) = test_database().await else { return };
        let app = directory_app!(db);
        let business = seed_business(&db, "Open Gutters").await;
        let review = seed_review(&db, business.id, 5, ReviewStatus::Approved).await;

        let public: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri(&format!("/reviews/{}", review.id))
                .to_request(),
        )
        .await;
        assert_eq!(public["data"]["rating"], 5);
        assert!(public["data"].get("moderation_notes").is_none());
        assert!(public["data"].get("reported_count").is_none());
    }

    #[actix_web::test]
    async fn only_the_owner_can_answer_a_complaint() {
        let Some(db) = test_database().await else { return };
        let app = directory_app!(db);
        let business = seed_business(&db, "Answering Appliances").await;
        let complaint = seed_complaint(&db, business.id, true).await;
        let uri = format!("/complaints/{}/response", complaint.id);
        let body = json!({ "response": "A technician will visit this week at no charge." });

        let stranger = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&uri)
                .insert_header(("X-Actor-Id", Uuid::new_v4().to_string()))
                .insert_header(("X-Actor-Name", "Competitor"))
                .set_json(&body)
                .to_request(),
        )
        .await;
        assert_eq!(stranger.status(), actix_web::http::StatusCode::FORBIDDEN);

        let owner = business.owner_user_id.unwrap();
        let answered: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri(&uri)
                .insert_header(("X-Actor-Id", owner.to_string()))
                .insert_header(("X-Actor-Name", "Owner"))
                .set_json(&body)
                .to_request(),
        )
        .await;
        assert_eq!(answered["data"]["status"], "business_responded");
        assert_eq!(
            answered["data"]["business_response"],
            "A technician will visit this week at no charge."
        );
    }
}
