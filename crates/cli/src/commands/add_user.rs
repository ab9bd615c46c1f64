//! `counsel add-user` — create an account.

use anyhow::{bail, Context, Result};

use counsel_config::AppConfig;
use counsel_core::{User, UserStore};
use counsel_gateway::auth;
use counsel_storage::SqliteStore;

pub async fn run(email: &str, name: &str, password: &str) -> Result<()> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        bail!("a valid email is required");
    }
    if password.len() < 8 {
        bail!("password must be at least 8 characters");
    }

    let config = AppConfig::load()?;
    if config.database.url.starts_with("postgres") {
        #[cfg(feature = "postgres")]
        {
            let store = counsel_storage::PostgresStore::connect(
                &config.database.url,
                config.database.max_connections,
            )
            .await?;
            return create(&store, email, name, password).await;
        }
        #[cfg(not(feature = "postgres"))]
        bail!("postgres support is not compiled in — rebuild with --features postgres");
    }

    let store = SqliteStore::new(&config.database.url).await?;
    create(&store, email, name, password).await
}

async fn create(store: &dyn UserStore, email: &str, name: &str, password: &str) -> Result<()> {
    if store.get_by_email(email).await?.is_some() {
        bail!("a user with email {email} already exists");
    }

    let password_hash = auth::hash_password(password)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
    let user = User::new(email, name, password_hash);
    store
        .create(&user)
        .await
        .context("failed to create user")?;

    println!("Created user {} ({})", user.email, user.id);
    Ok(())
}
