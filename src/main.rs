use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let admin_set = std::env::var("ADMIN_USERNAME").is_ok();
    let user_set = std::env::var("USER_USERNAME").is_ok();
    info!(
        target: "bytevault",
        "ByteVault starting: RUST_LOG='{}', admin_username_from_env={}, user_username_from_env={}",
        rust_log, admin_set, user_set
    );

    bytevault::server::run().await
}
