pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full application router. Admin routes check the bearer token
/// inside each handler.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        // Public site
        .route("/api/properties", get(handlers::properties::list_properties))
        .route("/api/properties/:slug", get(handlers::properties::get_property))
        .route(
            "/api/properties/:slug/availability",
            get(handlers::properties::get_availability),
        )
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/quote", post(handlers::bookings::quote))
        .route("/api/calendar.ics", get(handlers::calendar::calendar_feed))
        // Extras
        .route(
            "/api/extras",
            get(handlers::extras::list_public).post(handlers::extras::create_extra),
        )
        .route(
            "/api/extras/:id",
            get(handlers::extras::get_extra)
                .put(handlers::extras::replace_extra)
                .patch(handlers::extras::patch_extra)
                .delete(handlers::extras::delete_extra),
        )
        .route("/api/admin/extras", get(handlers::extras::list_all))
        // Properties back office
        .route(
            "/api/admin/properties",
            post(handlers::properties::create_property),
        )
        .route(
            "/api/admin/properties/:id",
            put(handlers::properties::update_property)
                .delete(handlers::properties::delete_property),
        )
        .route(
            "/api/admin/properties/:id/photos",
            post(handlers::properties::add_photo),
        )
        .route(
            "/api/admin/properties/:id/photos/order",
            put(handlers::properties::reorder_photos),
        )
        .route(
            "/api/admin/photos/:id",
            delete(handlers::properties::delete_photo),
        )
        // Bookings back office
        .route("/api/admin/bookings", get(handlers::bookings::list_bookings))
        .route(
            "/api/admin/bookings/:id",
            get(handlers::bookings::get_booking),
        )
        .route(
            "/api/admin/bookings/:id/status",
            patch(handlers::bookings::update_status),
        )
        // Messaging
        .route("/api/sms/send", post(handlers::sms::send_sms))
        .route("/api/sms/webhook", post(handlers::sms::sms_webhook))
        .route(
            "/api/whatsapp/webhook",
            get(handlers::whatsapp::verify_webhook).post(handlers::whatsapp::receive_webhook),
        )
        .route("/api/whatsapp/send", post(handlers::whatsapp::send_whatsapp))
        .route("/api/admin/messages", get(handlers::messages::list_messages))
        .route(
            "/api/admin/messages/events",
            get(handlers::messages::message_events),
        )
        .route(
            "/api/admin/templates",
            get(handlers::messages::list_templates),
        )
        .route(
            "/api/admin/templates/:id",
            get(handlers::messages::get_template),
        )
        .route(
            "/api/admin/templates/:id/render",
            post(handlers::messages::render_template),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
