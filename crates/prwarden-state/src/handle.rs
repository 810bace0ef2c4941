//! SurrealDB connection setup
//!
//! Supports in-memory (`mem://`), embedded (`surrealkv://`) and remote
//! (WebSocket) connections. [`DbConfig::from_env`] picks one from the
//! environment.

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{info, instrument};

use crate::error::StateError;
use crate::migrations;
use crate::Result;

const DEFAULT_NAMESPACE: &str = "prwarden";
const DEFAULT_DATABASE: &str = "main";

/// Credentials for a remote SurrealDB endpoint
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Root user (true) or database user (false)
    pub is_root: bool,
}

/// Configuration for a SurrealDB connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Connection URL (`mem://`, `surrealkv://path`, `wss://host`)
    pub endpoint: String,
    /// Namespace (default: "prwarden")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    pub credentials: Option<Credentials>,
}

impl DbConfig {
    /// Configuration for an unauthenticated endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            credentials: None,
        }
    }

    /// In-memory database
    pub fn in_memory() -> Self {
        Self::new("mem://")
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Authenticate as a database user, or root when `is_root` is set
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        is_root: bool,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
            is_root,
        });
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT with SURREALDB_USERNAME / SURREALDB_PASSWORD
    ///   (remote endpoint; SURREALDB_ROOT=true for root users)
    /// - SURREALDB_URL (unauthenticated URL, e.g. `surrealkv://.prwarden/db`)
    /// - SURREALDB_NAMESPACE (optional, default: "prwarden")
    /// - SURREALDB_DATABASE (optional, default: "main")
    ///
    /// Falls back to `mem://` when neither endpoint variable is set.
    pub fn from_env() -> Result<Self> {
        let base = if let Ok(endpoint) = std::env::var("SURREALDB_ENDPOINT") {
            let username = std::env::var("SURREALDB_USERNAME")
                .map_err(|_| StateError::Config("SURREALDB_USERNAME not set".into()))?;
            let password = std::env::var("SURREALDB_PASSWORD")
                .map_err(|_| StateError::Config("SURREALDB_PASSWORD not set".into()))?;
            let is_root = std::env::var("SURREALDB_ROOT")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
            Self::new(endpoint).with_credentials(username, password, is_root)
        } else if let Ok(url) = std::env::var("SURREALDB_URL") {
            Self::new(url)
        } else {
            Self::in_memory()
        };

        let namespace =
            std::env::var("SURREALDB_NAMESPACE").unwrap_or_else(|_| DEFAULT_NAMESPACE.into());
        let database =
            std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.into());
        Ok(base.with_namespace(namespace).with_database(database))
    }
}

/// Connect, authenticate, select namespace/database and run migrations.
#[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
pub async fn connect(config: &DbConfig) -> Result<Surreal<Any>> {
    let db = surrealdb::engine::any::connect(&config.endpoint)
        .await
        .map_err(|e| {
            StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
        })?;

    if let Some(creds) = &config.credentials {
        if creds.is_root {
            db.signin(Root {
                username: &creds.username,
                password: &creds.password,
            })
            .await
            .map_err(|e| StateError::Connection(format!("Root authentication failed: {e}")))?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &creds.username,
                password: &creds.password,
            })
            .await
            .map_err(|e| StateError::Connection(format!("Database authentication failed: {e}")))?;
        }
    }

    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await
        .map_err(|e| {
            StateError::Connection(format!("Failed to select namespace/database: {e}"))
        })?;

    migrations::init_schema(&db)
        .await
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?;

    info!("SurrealDB connected and schema initialized");
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = DbConfig::new("ws://localhost:8000")
            .with_namespace("ns")
            .with_database("db")
            .with_credentials("user", "pass", true);

        assert_eq!(config.namespace, "ns");
        assert_eq!(config.database, "db");
        let creds = config.credentials.unwrap();
        assert!(creds.is_root);
        assert_eq!(creds.username, "user");
    }

    #[test]
    fn in_memory_uses_default_namespace() {
        let config = DbConfig::in_memory();
        assert_eq!(config.endpoint, "mem://");
        assert_eq!(config.namespace, "prwarden");
        assert!(config.credentials.is_none());
    }
}
