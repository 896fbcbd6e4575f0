use std::{borrow::Cow, time::Duration};

use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    Connection, Executor, PgPool,
};
use uuid::Uuid;

use crate::models::{
    Business, Complaint, NewBusiness, NewComplaint, NewReview, Review, ReviewEngagement,
    StatisticsPatch,
};
use crate::store::{
    ComplaintFilter, DocumentStore, FindResult, ReviewFilter, StoreError,
};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Some(Duration::from_secs(600)))
            .test_before_acquire(true);

        let pool = match options.clone().connect(database_url).await {
            Ok(pool) => pool,
            Err(sqlx::Error::Database(db_err)) if db_err.code() == Some(Cow::Borrowed("3D000")) => {
                log::info!("Database missing, attempting to create it");
                create_database_if_missing(database_url).await?;
                options.connect(database_url).await?
            }
            Err(err) => return Err(err),
        };

        // Run embedded migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    // ========================================================================
    // BUSINESSES
    // ========================================================================

    pub async fn create_business(&self, business: NewBusiness) -> Result<Business, sqlx::Error> {
        let NewBusiness {
            id,
            name,
            slug,
            primary_category,
            about,
            website,
            phone,
            email,
            status,
            owner_user_id,
            created_at,
            updated_at,
        } = business;

        sqlx::query_as::<_, Business>(
            r#"
            INSERT INTO businesses (
                id,
                name,
                slug,
                primary_category,
                about,
                website,
                phone,
                email,
                status,
                owner_user_id,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING
                id, name, slug, primary_category, about, website, phone, email,
                status, verified, featured, owner_user_id,
                average_rating, total_reviews, total_complaints, view_count,
                created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(slug)
        .bind(primary_category)
        .bind(about)
        .bind(website)
        .bind(phone)
        .bind(email)
        .bind(status)
        .bind(owner_user_id)
        .bind(created_at)
        .bind(updated_at)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_business(&self, business_id: Uuid) -> Result<Option<Business>, sqlx::Error> {
        sqlx::query_as::<_, Business>(
            r#"
            SELECT
                id, name, slug, primary_category, about, website, phone, email,
                status, verified, featured, owner_user_id,
                average_rating, total_reviews, total_complaints, view_count,
                created_at, updated_at
            FROM businesses
            WHERE id = $1
            "#,
        )
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Published listings, best rated first.
    pub async fn list_published_businesses(
        &self,
        min_rating: f64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Business>, sqlx::Error> {
        sqlx::query_as::<_, Business>(
            r#"
            SELECT
                id, name, slug, primary_category, about, website, phone, email,
                status, verified, featured, owner_user_id,
                average_rating, total_reviews, total_complaints, view_count,
                created_at, updated_at
            FROM businesses
            WHERE status = 'published'
              AND average_rating >= $1
            ORDER BY average_rating DESC, name ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(min_rating)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// Writes the editable listing fields. Statistics columns are never touched here.
    pub async fn update_business(&self, business: Business) -> Result<Business, sqlx::Error> {
        sqlx::query_as::<_, Business>(
            r#"
            UPDATE businesses
            SET
                name = $2,
                primary_category = $3,
                about = $4,
                website = $5,
                phone = $6,
                email = $7,
                status = $8,
                verified = $9,
                featured = $10,
                updated_at = NOW()
            WHERE id = $1
            RETURNING
                id, name, slug, primary_category, about, website, phone, email,
                status, verified, featured, owner_user_id,
                average_rating, total_reviews, total_complaints, view_count,
                created_at, updated_at
            "#,
        )
        .bind(business.id)
        .bind(business.name)
        .bind(business.primary_category)
        .bind(business.about)
        .bind(business.website)
        .bind(business.phone)
        .bind(business.email)
        .bind(business.status)
        .bind(business.verified)
        .bind(business.featured)
        .fetch_one(&self.pool)
        .await
    }

    // ========================================================================
    // REVIEWS
    // ========================================================================

    pub async fn create_review(&self, review: NewReview) -> Result<Review, sqlx::Error> {
        let NewReview {
            id,
            business_id,
            user_id,
            rating,
            title,
            review_text,
            terms_accepted,
            status,
            created_at,
            updated_at,
        } = review;

        sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (
                id,
                business_id,
                user_id,
                rating,
                title,
                review_text,
                terms_accepted,
                status,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING
                id, business_id, user_id, rating, title, review_text, terms_accepted,
                status, moderation_notes, reviewed_by, reviewed_at,
                helpful_count, reported_count, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(business_id)
        .bind(user_id)
        .bind(rating)
        .bind(title)
        .bind(review_text)
        .bind(terms_accepted)
        .bind(status)
        .bind(created_at)
        .bind(updated_at)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_review(&self, review_id: Uuid) -> Result<Option<Review>, sqlx::Error> {
        sqlx::query_as::<_, Review>(
            r#"
            SELECT
                id, business_id, user_id, rating, title, review_text, terms_accepted,
                status, moderation_notes, reviewed_by, reviewed_at,
                helpful_count, reported_count, created_at, updated_at
            FROM reviews
            WHERE id = $1
            "#,
        )
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list_approved_reviews_for_business(
        &self,
        business_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Review>, sqlx::Error> {
        sqlx::query_as::<_, Review>(
            r#"
            SELECT
                id, business_id, user_id, rating, title, review_text, terms_accepted,
                status, moderation_notes, reviewed_by, reviewed_at,
                helpful_count, reported_count, created_at, updated_at
            FROM reviews
            WHERE business_id = $1 AND status = 'approved'
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(business_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn list_pending_reviews(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Review>, sqlx::Error> {
        sqlx::query_as::<_, Review>(
            r#"
            SELECT
                id, business_id, user_id, rating, title, review_text, terms_accepted,
                status, moderation_notes, reviewed_by, reviewed_at,
                helpful_count, reported_count, created_at, updated_at
            FROM reviews
            WHERE status IN ('pending', 'flagged')
            ORDER BY created_at ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn update_review_moderation(&self, review: Review) -> Result<Review, sqlx::Error> {
        sqlx::query_as::<_, Review>(
            r#"
            UPDATE reviews
            SET
                status = $2,
                moderation_notes = $3,
                reviewed_by = $4,
                reviewed_at = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING
                id, business_id, user_id, rating, title, review_text, terms_accepted,
                status, moderation_notes, reviewed_by, reviewed_at,
                helpful_count, reported_count, created_at, updated_at
            "#,
        )
        .bind(review.id)
        .bind(review.status)
        .bind(review.moderation_notes)
        .bind(review.reviewed_by)
        .bind(review.reviewed_at)
        .fetch_one(&self.pool)
        .await
    }

    /// Bumps the helpful or reported counter in place. Returns `None` when the
    /// review is missing or not approved.
    pub async fn record_review_engagement(
        &self,
        review_id: Uuid,
        engagement: ReviewEngagement,
    ) -> Result<Option<Review>, sqlx::Error> {
        let query = match engagement {
            ReviewEngagement::Helpful => {
                r#"
                UPDATE reviews
                SET helpful_count = helpful_count + 1
                WHERE id = $1 AND status = 'approved'
                RETURNING
                    id, business_id, user_id, rating, title, review_text, terms_accepted,
                    status, moderation_notes, reviewed_by, reviewed_at,
                    helpful_count, reported_count, created_at, updated_at
                "#
            }
            ReviewEngagement::Reported => {
                r#"
                UPDATE reviews
                SET reported_count = reported_count + 1
                WHERE id = $1 AND status = 'approved'
                RETURNING
                    id, business_id, user_id, rating, title, review_text, terms_accepted,
                    status, moderation_notes, reviewed_by, reviewed_at,
                    helpful_count, reported_count, created_at, updated_at
                "#
            }
        };

        sqlx::query_as::<_, Review>(query)
            .bind(review_id)
            .fetch_optional(&self.pool)
            .await
    }

    // ========================================================================
    // COMPLAINTS
    // ========================================================================

    pub async fn create_complaint(&self, complaint: NewComplaint) -> Result<Complaint, sqlx::Error> {
        let NewComplaint {
            id,
            business_id,
            submitted_by,
            complaint_type,
            complaint_summary,
            complaint_details,
            desired_resolution,
            status,
            priority,
            visible_to_public,
            created_at,
            updated_at,
        } = complaint;

        sqlx::query_as::<_, Complaint>(
            r#"
            INSERT INTO complaints (
                id,
                business_id,
                submitted_by,
                complaint_type,
                complaint_summary,
                complaint_details,
                desired_resolution,
                status,
                priority,
                visible_to_public,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING
                id, business_id, submitted_by, complaint_type, complaint_summary,
                complaint_details, desired_resolution, status, priority,
                visible_to_public, assigned_to, business_response, resolution_summary,
                created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(business_id)
        .bind(submitted_by)
        .bind(complaint_type)
        .bind(complaint_summary)
        .bind(complaint_details)
        .bind(desired_resolution)
        .bind(status)
        .bind(priority)
        .bind(visible_to_public)
        .bind(created_at)
        .bind(updated_at)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_complaint(&self, complaint_id: Uuid) -> Result<Option<Complaint>, sqlx::Error> {
        sqlx::query_as::<_, Complaint>(
            r#"
            SELECT
                id, business_id, submitted_by, complaint_type, complaint_summary,
                complaint_details, desired_resolution, status, priority,
                visible_to_public, assigned_to, business_response, resolution_summary,
                created_at, updated_at
            FROM complaints
            WHERE id = $1
            "#,
        )
        .bind(complaint_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list_complaints_for_business(
        &self,
        business_id: Uuid,
    ) -> Result<Vec<Complaint>, sqlx::Error> {
        sqlx::query_as::<_, Complaint>(
            r#"
            SELECT
                id, business_id, submitted_by, complaint_type, complaint_summary,
                complaint_details, desired_resolution, status, priority,
                visible_to_public, assigned_to, business_response, resolution_summary,
                created_at, updated_at
            FROM complaints
            WHERE business_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn update_complaint(&self, complaint: Complaint) -> Result<Complaint, sqlx::Error> {
        sqlx::query_as::<_, Complaint>(
            r#"
            UPDATE complaints
            SET
                status = $2,
                priority = $3,
                visible_to_public = $4,
                assigned_to = $5,
                business_response = $6,
                resolution_summary = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING
                id, business_id, submitted_by, complaint_type, complaint_summary,
                complaint_details, desired_resolution, status, priority,
                visible_to_public, assigned_to, business_response, resolution_summary,
                created_at, updated_at
            "#,
        )
        .bind(complaint.id)
        .bind(complaint.status)
        .bind(complaint.priority)
        .bind(complaint.visible_to_public)
        .bind(complaint.assigned_to)
        .bind(complaint.business_response)
        .bind(complaint.resolution_summary)
        .fetch_one(&self.pool)
        .await
    }
}

impl DocumentStore for Database {
    async fn find_reviews(&self, filter: ReviewFilter) -> Result<FindResult<Review>, StoreError> {
        let reviews = sqlx::query_as::<_, Review>(
            r#"
            SELECT
                id, business_id, user_id, rating, title, review_text, terms_accepted,
                status, moderation_notes, reviewed_by, reviewed_at,
                helpful_count, reported_count, created_at, updated_at
            FROM reviews
            WHERE business_id = $1
              AND ($2::review_status IS NULL OR status = $2)
            "#,
        )
        .bind(filter.business_id)
        .bind(filter.status)
        .fetch_all(&self.pool)
        .await?;

        Ok(FindResult::new(reviews))
    }

    async fn find_complaints(
        &self,
        filter: ComplaintFilter,
    ) -> Result<FindResult<Complaint>, StoreError> {
        let complaints = sqlx::query_as::<_, Complaint>(
            r#"
            SELECT
                id, business_id, submitted_by, complaint_type, complaint_summary,
                complaint_details, desired_resolution, status, priority,
                visible_to_public, assigned_to, business_response, resolution_summary,
                created_at, updated_at
            FROM complaints
            WHERE business_id = $1
              AND ($2::BOOLEAN IS NULL OR visible_to_public = $2)
            "#,
        )
        .bind(filter.business_id)
        .bind(filter.visible_to_public)
        .fetch_all(&self.pool)
        .await?;

        Ok(FindResult::new(complaints))
    }

    async fn update_statistics(
        &self,
        business_id: Uuid,
        patch: StatisticsPatch,
    ) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }

        let result = sqlx::query(
            r#"
            UPDATE businesses
            SET
                average_rating = COALESCE($2, average_rating),
                total_reviews = COALESCE($3, total_reviews),
                total_complaints = COALESCE($4, total_complaints),
                view_count = COALESCE($5, view_count)
            WHERE id = $1
            "#,
        )
        .bind(business_id)
        .bind(patch.average_rating)
        .bind(patch.total_reviews)
        .bind(patch.total_complaints)
        .bind(patch.view_count)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("business {business_id}")));
        }
        Ok(())
    }
}

async fn create_database_if_missing(database_url: &str) -> Result<(), sqlx::Error> {
    let options: PgConnectOptions = database_url.parse()?;
    let database_name = options
        .get_database()
        .map(|name| name.to_string())
        .unwrap_or_else(|| "postgres".to_string());

    // Already pointed at the maintenance database.
    if database_name.eq_ignore_ascii_case("postgres") {
        return Ok(());
    }

    let valid_name = database_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_name {
        return Err(sqlx::Error::Configuration(
            format!("refusing to create database with invalid name '{database_name}'").into(),
        ));
    }

    let maintenance_options = options.clone().database("postgres");
    let mut connection = sqlx::postgres::PgConnection::connect_with(&maintenance_options).await?;

    let create_stmt = format!("CREATE DATABASE \"{}\"", database_name);
    match connection.execute(create_stmt.as_str()).await {
        Ok(_) => {
            log::info!("Created database '{}'", database_name);
            Ok(())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.code() == Some(Cow::Borrowed("42P04")) => {
            log::info!("Database '{}' already exists", database_name);
            Ok(())
        }
        Err(err) => Err(err),
    }
}
