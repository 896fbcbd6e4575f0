mod aggregates;
mod clients;
mod config;
mod database;
mod handlers;
mod models;
mod store;
mod triggers;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;

use crate::aggregates::AggregateRecalculator;
use crate::clients::notifications::NotificationsClient;
use crate::config::AppConfig;
use crate::database::Database;
use crate::triggers::ChangeNotifier;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|err| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
    })?;
    let bind_address = config.bind_address();

    let db = Database::connect(&config.database_url, config.db_max_connections)
        .await
        .map_err(|err| {
            log::error!("Failed to initialize database: {err:?}");
            std::io::Error::new(std::io::ErrorKind::Other, err)
        })?;
    log::info!("Database connection established, migrations applied");

    if config.trigger_policy.recompute_on_review_exit {
        log::info!("Review statistics will also be recomputed when a review leaves approved");
    }
    if config.trigger_policy.recompute_on_visibility_change {
        log::info!("Complaint statistics will also be recomputed on visibility changes");
    }

    let recalculator = AggregateRecalculator::new(Arc::new(db.clone()));
    let notifier = web::Data::new(ChangeNotifier::new(recalculator, config.trigger_policy));
    let db_data = web::Data::new(db);

    let notifications = match &config.notifications_service_url {
        Some(url) => {
            log::info!("Complaint notifications will be sent to {url}");
            Some(NotificationsClient::new(url.clone()))
        }
        None => {
            log::warn!("NOTIFICATIONS_SERVICE_URL not set; complaint notifications disabled");
            None
        }
    };
    let notifications = web::Data::new(notifications);

    log::info!(
        "🚀 Starting Business Directory Review Service on {}",
        bind_address
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(db_data.clone())
            .app_data(notifier.clone())
            .app_data(notifications.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .service(
                web::scope("/api/v1")
                    // Health
                    .service(handlers::health_check)
                    // Businesses
                    .service(handlers::create_business)
                    .service(handlers::list_businesses)
                    .service(handlers::get_business)
                    .service(handlers::update_business)
                    .service(handlers::recompute_business_statistics)
                    // Reviews
                    .service(handlers::submit_review)
                    .service(handlers::list_business_reviews)
                    .service(handlers::list_pending_reviews)
                    .service(handlers::get_review)
                    .service(handlers::mark_review_helpful)
                    .service(handlers::report_review)
                    .service(handlers::moderate_review)
                    // Complaints
                    .service(handlers::file_complaint)
                    .service(handlers::list_business_complaints)
                    .service(handlers::get_complaint)
                    .service(handlers::update_complaint)
                    .service(handlers::respond_to_complaint),
            )
    })
    .bind(&bind_address)?
    .run()
    .await
}
