use jkkn_portal::{
    config::{self, ApiConfigStore, app::env_api_key, database},
    core::notifications::NotificationCache,
    errors::Result,
    myjkkn::{MyJkknClient, NormalizeMode, ReqwestTransport},
    server::{self, AppState},
};
use dotenvy::dotenv;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// How often the persisted MyJKKN API config is checked for outside edits.
const API_CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = config::load_default_config()
        .inspect_err(|e| error!("Failed to load application configuration: {}", e))?;
    info!("Application configuration loaded");

    // 4. Connect to the database and make sure every table exists
    let db = database::create_connection(&app_config.database_url).await?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Open the MyJKKN API config store, seeding it on first run
    let first_run = !app_config.api_config_path.exists();
    let api_store = Arc::new(ApiConfigStore::load(&app_config.api_config_path)?);
    if first_run {
        let settings = app_config.myjkkn.clone();
        api_store.update(|c| {
            if let Some(base_url) = settings.base_url {
                c.base_url = base_url;
            }
            if let Some(proxy_url) = settings.proxy_url {
                c.proxy_url = proxy_url;
            }
        })?;
    }
    if api_store.current().api_key.is_empty() {
        if let Some(key) = env_api_key() {
            api_store.update(|c| c.api_key = key)?;
            info!("MyJKKN API key taken from MYJKKN_API_KEY");
        }
    }
    Arc::clone(&api_store).spawn_file_watcher(API_CONFIG_POLL_INTERVAL);

    // 6. Build the MyJKKN client
    let mode = if app_config.myjkkn.strict_normalization {
        NormalizeMode::Strict
    } else {
        NormalizeMode::Lenient
    };
    let client = MyJkknClient::new(api_store, Arc::new(ReqwestTransport::new()))
        .with_normalize_mode(mode);

    // 7. Serve the HTTP surface
    let state = AppState {
        db,
        client: Arc::new(client),
        notifications: Arc::new(NotificationCache::new(app_config.notification_ttl())),
        cors_origins: app_config.cors_origins.clone(),
    };
    server::serve(&app_config.bind_address, state).await
}
