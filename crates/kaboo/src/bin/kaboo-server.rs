use kaboo::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), KabooError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(rest = %config.rest_addr, ws = %config.ws_addr, "Kaboo server starting");

    // Development wiring: users live in memory and tokens are taken at
    // face value. Seed KABOO_DEV_USERS="auth0|1:ann,auth0|2:bob".
    let store = MemoryStore::new();
    for user in dev_users() {
        tracing::info!(user_id = %user.id, name = %user.name, "seeded dev user");
        store.insert_user(user).await;
    }

    KabooServerBuilder::new()
        .config(config)
        .build(store, DevAuthenticator)
        .await?
        .run()
        .await
}

/// Parses `KABOO_DEV_USERS` as comma-separated `external_id:name` pairs.
/// The external id doubles as the user id.
fn dev_users() -> Vec<User> {
    let Ok(raw) = std::env::var("KABOO_DEV_USERS") else {
        return Vec::new();
    };
    raw.split(',')
        .filter_map(|entry| {
            let (external, name) = entry.trim().rsplit_once(':')?;
            Some(User {
                id: UserId::new(external),
                external_id: ExternalId::new(external),
                name: name.to_string(),
            })
        })
        .collect()
}
