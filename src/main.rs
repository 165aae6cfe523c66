use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use staybook::config::AppConfig;
use staybook::db;
use staybook::services::messaging::twilio::TwilioSmsProvider;
use staybook::services::messaging::whatsapp::WhatsAppProvider;
use staybook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    if config.admin_token == "changeme" {
        tracing::warn!("ADMIN_TOKEN is not set, using the insecure default");
    }

    let conn = db::init_db(&config.database_url)?;
    db::seed::seed_templates(&conn, &config.admin_user_id)?;

    if config.twilio_account_sid.is_empty() {
        tracing::warn!("Twilio not configured, SMS sending will fail");
    }
    let sms = TwilioSmsProvider::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_phone_number.clone(),
    );

    if config.whatsapp_access_token.is_empty() {
        tracing::warn!("WhatsApp not configured, WhatsApp sending will fail");
    }
    let whatsapp = WhatsAppProvider::new(
        config.whatsapp_access_token.clone(),
        config.whatsapp_phone_number_id.clone(),
    );

    let (message_tx, _) = broadcast::channel(256);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        sms: Box::new(sms),
        whatsapp: Box::new(whatsapp),
        message_tx,
    });

    let app = staybook::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
