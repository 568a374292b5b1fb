use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use pizzasim_session::{SeedState, SessionState};
use pizzasim_web::server::{SimServer, SimServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let addr: SocketAddr = std::env::var("PIZZASIM_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;

    let upstream = std::env::var("PIZZASIM_UPSTREAM").ok().and_then(|v| {
        let v = v.trim();
        if v.is_empty() {
            None
        } else {
            Some(v.to_string())
        }
    });

    let seed = match std::env::var("PIZZASIM_SEED_FILE") {
        Ok(path) if !path.trim().is_empty() => SeedState::from_json_file(path.trim())?,
        _ => SeedState::default(),
    };

    let session = Arc::new(SessionState::install(seed));
    info!("session token: {}", session.token());

    let server = SimServer::new(session, SimServerConfig { upstream });
    info!("Starting PizzaSim surface on http://{}", addr);
    server.serve(addr).await
}
