//! Bearer-token validation against the identity store.

use crate::config::DbConfig;
use anyhow::{Context, Result};
use sqlx::{AnyPool, any::AnyPoolOptions};
use std::sync::Arc;
use tracing::{debug, info, warn};

const TOKEN_LOOKUP: &str = "SELECT token FROM person WHERE login = $1";

/// Open the identity-store pool once for the process lifetime.
///
/// The driver is picked from the URL scheme (`postgres://` in production,
/// `sqlite:` for local runs and tests).
pub async fn connect_identity_store(cfg: &DbConfig) -> Result<AnyPool> {
    sqlx::any::install_default_drivers();
    let url = cfg.connect_url()?;
    let pool = AnyPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.acquire_timeout())
        .connect(&url)
        .await
        .context("connecting to identity store")?;
    info!(
        host = %cfg.host,
        dbname = %cfg.dbname,
        max_connections = cfg.max_connections,
        "identity store pool ready"
    );
    Ok(pool)
}

#[derive(Clone)]
pub struct AuthGate {
    /// Shared pool; connections are acquired per lookup and returned on drop.
    pub db: Arc<AnyPool>,
}

impl AuthGate {
    pub fn new(db: AnyPool) -> Self {
        Self { db: Arc::new(db) }
    }

    /// True iff a row exists for `login` and its token equals `token`.
    ///
    /// Unknown login, mismatch and store errors all yield `false` so callers
    /// cannot probe which logins exist.
    pub async fn validate(&self, login: &str, token: &str) -> bool {
        let stored = sqlx::query_scalar::<_, String>(TOKEN_LOOKUP)
            .bind(login)
            .fetch_optional(&*self.db)
            .await;

        match stored {
            Ok(Some(stored)) => {
                let matches = stored == token;
                if !matches {
                    debug!(login, "token mismatch");
                }
                matches
            }
            Ok(None) => {
                debug!(login, "no identity row");
                false
            }
            Err(err) => {
                warn!(login, error = %err, "identity store lookup failed");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) async fn memory_identity_store(rows: &[(&str, &str)]) -> AnyPool {
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("sqlite pool");
    sqlx::query("CREATE TABLE person (login TEXT PRIMARY KEY, token TEXT NOT NULL)")
        .execute(&pool)
        .await
        .expect("create table");
    for (login, token) in rows {
        sqlx::query("INSERT INTO person (login, token) VALUES ($1, $2)")
            .bind(*login)
            .bind(*token)
            .execute(&pool)
            .await
            .expect("insert");
    }
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matching_token_is_accepted() {
        let gate = AuthGate::new(memory_identity_store(&[("alice", "t-alice")]).await);
        assert!(gate.validate("alice", "t-alice").await);
    }

    #[tokio::test]
    async fn mismatch_and_unknown_login_are_rejected() {
        let gate = AuthGate::new(memory_identity_store(&[("alice", "t-alice")]).await);
        assert!(!gate.validate("alice", "t-bob").await);
        assert!(!gate.validate("bob", "t-alice").await);
        assert!(!gate.validate("ALICE", "t-alice").await);
    }

    #[tokio::test]
    async fn store_errors_are_rejections() {
        let pool = memory_identity_store(&[]).await;
        sqlx::query("DROP TABLE person")
            .execute(&pool)
            .await
            .expect("drop");
        let gate = AuthGate::new(pool);
        assert!(!gate.validate("alice", "anything").await);
    }

    #[tokio::test]
    async fn closed_pool_is_a_rejection() {
        let pool = memory_identity_store(&[("alice", "t-alice")]).await;
        pool.close().await;
        let gate = AuthGate::new(pool);
        assert!(!gate.validate("alice", "t-alice").await);
    }
}
