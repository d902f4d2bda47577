//! StepLoop - goal journal with daily reflections

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use steploop::{
    config::Args,
    logging,
    services::{spawn_logging_listener, Services},
    HttpServer, JournalDb, SessionContext, SessionVerifier,
};

/// Session tokens minted in dev mode live for a day
const DEV_TOKEN_EXPIRY_SECS: u64 = 24 * 60 * 60;

const DEV_USER_ID: &str = "dev-user";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  StepLoop - goal journal");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Database: {}", args.database_path.display());
    info!("Session cookie: {}", args.session_cookie);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("======================================");

    let secret = match args.session_secret() {
        Some(secret) => secret,
        None => {
            error!("No session secret configured");
            std::process::exit(1);
        }
    };
    let verifier = SessionVerifier::new(secret, DEV_TOKEN_EXPIRY_SECS)?;

    if args.dev_mode {
        if args.session_secret.is_none() {
            warn!("Development mode enabled - using built-in insecure session secret");
        }
        let dev_session = SessionContext::new(DEV_USER_ID).with_profile(
            Some("dev@localhost".to_string()),
            Some("Developer".to_string()),
            None,
        );
        let token = verifier.issue(&dev_session)?;
        info!("Dev session token for {}: Bearer {}", DEV_USER_ID, token);
    }

    let db = Arc::new(JournalDb::open(&args.database_path)?);
    let stats = db.stats()?;
    info!(
        users = stats.user_count,
        goals = stats.goal_count,
        reflections = stats.reflection_count,
        "Database ready"
    );

    let services = Arc::new(Services::new(db));
    spawn_logging_listener(Arc::clone(&services.events));

    let server = Arc::new(HttpServer::new(
        services,
        verifier,
        args.session_cookie.clone(),
        args.listen,
    ));
    server.run().await?;

    Ok(())
}
