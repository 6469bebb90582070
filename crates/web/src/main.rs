use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::info;

use ecomos_web::server::{TestCredentials, WebServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let web_addr: SocketAddr = std::env::var("ECOMOS_WEB_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3003".to_string())
        .parse()?;

    let db_path = std::env::var("ECOMOS_DB_PATH")
        .ok()
        .and_then(|v| {
            let v = v.trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(PathBuf::from(v))
            }
        });

    // Test-credential seeding is an explicit opt-in; anything but "1" leaves
    // the login form blank and the user table unseeded.
    let test_credentials = match std::env::var("ECOMOS_TEST_CREDENTIALS").ok().as_deref() {
        Some("1") => Some(TestCredentials::default()),
        _ => None,
    };

    let session_ttl_secs = std::env::var("ECOMOS_SESSION_TTL_SECS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok());

    let cfg = WebServerConfig {
        db_path,
        test_credentials,
        session_ttl_secs,
    };

    info!("Starting Ecom OS web on http://{}", web_addr);

    ecomos_web::server::serve(web_addr, cfg).await
}
