//! In-process surface fixture for scenario tests

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info};

use pizzasim_common::{Franchise, MenuItem, Order, User};
use pizzasim_session::{FailureScript, SeedState, SessionState};
use pizzasim_web::{SimServer, SimServerConfig};

use crate::error::{HarnessError, HarnessResult};

/// Builder for one seeded simulator surface
#[derive(Debug, Default)]
pub struct Scenario {
    seed: SeedState,
    upstream: Option<String>,
}

impl Scenario {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a fully formed seed instead of the builder methods
    pub fn seeded(seed: SeedState) -> Self {
        Self {
            seed,
            upstream: None,
        }
    }

    pub fn session_user(mut self, user: User) -> Self {
        self.seed = self.seed.with_session_user(user);
        self
    }

    pub fn users(mut self, users: Vec<User>) -> Self {
        self.seed = self.seed.with_users(users);
        self
    }

    pub fn franchises(mut self, franchises: Vec<Franchise>) -> Self {
        self.seed = self.seed.with_franchises(franchises);
        self
    }

    pub fn menu(mut self, menu: Vec<MenuItem>) -> Self {
        self.seed = self.seed.with_menu(menu);
        self
    }

    pub fn orders(mut self, orders: Vec<Order>) -> Self {
        self.seed = self.seed.with_orders(orders);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.seed = self.seed.with_page_size(page_size);
        self
    }

    pub fn fail_once(mut self, script: FailureScript) -> Self {
        self.seed = self.seed.with_failure(script);
        self
    }

    pub fn upstream(mut self, origin: impl Into<String>) -> Self {
        self.upstream = Some(origin.into());
        self
    }

    /// Install the session, bind an ephemeral port, and serve until the
    /// returned handle is dropped.
    pub async fn install(self) -> HarnessResult<SessionHandle> {
        let session = Arc::new(SessionState::install(self.seed));
        let token = session.token();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| HarnessError::ServerStartup(e.to_string()))?;
        let addr = listener
            .local_addr()
            .map_err(|e| HarnessError::ServerStartup(e.to_string()))?;
        let base_url = format!("http://{}", addr);

        let server = SimServer::new(
            session.clone(),
            SimServerConfig {
                upstream: self.upstream,
            },
        );
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = server
                .serve_on(listener, async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        let handle = SessionHandle {
            base_url,
            token,
            session,
            shutdown: Some(shutdown_tx),
        };
        handle.wait_for_healthy().await?;
        info!("scenario surface ready at {}", handle.base_url);
        Ok(handle)
    }
}

/// A running surface plus direct access to its session state
pub struct SessionHandle {
    base_url: String,
    token: String,
    session: Arc<SessionState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl SessionHandle {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Token minted at install time. Login and registration rotate the
    /// live token; read the state for the current one.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Client with the session token pre-set as a bearer header
    pub fn client(&self) -> HarnessResult<reqwest::Client> {
        let mut headers = reqwest::header::HeaderMap::new();
        let bearer = format!("Bearer {}", self.session.token());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&bearer)
                .map_err(|e| HarnessError::ServerStartup(e.to_string()))?,
        );
        Ok(reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(5))
            .build()?)
    }

    async fn wait_for_healthy(&self) -> HarnessResult<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;
        let url = self.url("/healthz");

        let max_attempts = 100;
        for attempt in 1..=max_attempts {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!("surface healthy after {} attempts", attempt);
                    return Ok(());
                }
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
        Err(HarnessError::ServerHealthCheck(max_attempts))
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
