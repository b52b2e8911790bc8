use storefront_rbac::authz::RbacSeed;
use storefront_rbac::{app, create_app_with, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let pool = db::init().await?;
    let state = AppState::from_env(pool)?;

    if bootstrap_enabled() {
        let report = match std::env::var("RBAC_SEED_FILE") {
            Ok(path) => {
                let seed = RbacSeed::from_file(&path)?;
                state.manager.bootstrap_with(&seed).await?
            }
            Err(_) => state.manager.bootstrap().await?,
        };
        tracing::info!(created = report.total(), "rbac layout ensured");
    }

    let app = create_app_with(state);

    let port = app::port_from_env();
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()).await?;

    Ok(())
}

/// `RBAC_BOOTSTRAP=false` skips provisioning the default layout at startup.
fn bootstrap_enabled() -> bool {
    std::env::var("RBAC_BOOTSTRAP")
        .map(|value| !matches!(value.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"))
        .unwrap_or(true)
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
