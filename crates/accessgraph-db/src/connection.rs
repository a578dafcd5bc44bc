//! SurrealDB connection for the server process.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::{info, warn};

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// WebSocket address (e.g., `127.0.0.1:8000`).
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials.
    pub username: String,
    pub password: String,
    /// Connection attempts before giving up at startup.
    pub connect_attempts: u32,
    /// Pause between attempts, multiplied by the attempt number.
    pub connect_backoff_ms: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "accessgraph".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
            connect_attempts: 5,
            connect_backoff_ms: 500,
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &self.url)
            .field("namespace", &self.namespace)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("connect_attempts", &self.connect_attempts)
            .field("connect_backoff_ms", &self.connect_backoff_ms)
            .finish()
    }
}

/// An authenticated client bound to the configured namespace and database.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Connect, retrying while the database is still coming up.
    pub async fn connect(config: &DbConfig) -> Result<Self, surrealdb::Error> {
        let attempts = config.connect_attempts.max(1);
        let mut attempt = 1;
        loop {
            match Self::connect_once(config).await {
                Ok(manager) => return Ok(manager),
                Err(e) if attempt < attempts => {
                    warn!(
                        url = %config.url,
                        attempt,
                        attempts,
                        error = %e,
                        "SurrealDB not reachable, retrying"
                    );
                    let pause = config.connect_backoff_ms * u64::from(attempt);
                    tokio::time::sleep(Duration::from_millis(pause)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn connect_once(config: &DbConfig) -> Result<Self, surrealdb::Error> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );
        let db = Surreal::new::<Ws>(&config.url).await?;
        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;
        info!("Connected to SurrealDB");
        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }

    /// Consume the manager, yielding the client for a store backend.
    pub fn into_client(self) -> Surreal<Client> {
        self.db
    }
}
