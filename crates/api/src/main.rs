use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sourcegate_api::auth::basic::BasicChain;
use sourcegate_api::auth::iam::IamProxy;
use sourcegate_api::auth::store::PgDirectory;
use sourcegate_api::auth::Authenticator;
use sourcegate_api::config::AppConfig;
use sourcegate_api::router::build_app_router;
use sourcegate_api::state::AppState;
use sourcegate_audit::{params, Actor, EventKind, Status};
use sourcegate_cron::{builtin, CronService, LockRegistry, PgCronLockStore};
use sourcegate_events::EventEmitter;
use sourcegate_secrets::SecretBroker;

const DEFAULT_CONFIG_PATH: &str = "conf/app.ini";
const DEFAULT_LOG_FILTER: &str = "sourcegate=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing();

    // --- Configuration ---
    let config_path =
        std::env::var("SOURCEGATE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = AppConfig::load(Path::new(&config_path))
        .with_context(|| format!("load configuration {config_path}"))?;
    tracing::info!(path = %config_path, host = %config.server.host, port = config.server.port, "Loaded configuration");

    // --- Audit ---
    let audit = sourcegate_audit::init(&config.audit).context("start audit sink")?;
    audit.emit(
        EventKind::ServiceStart,
        &Actor::anonymous(),
        Status::Success,
        "-",
        params([("version", env!("CARGO_PKG_VERSION"))]),
    );

    let root = CancellationToken::new();

    // --- Secret broker ---
    let broker = if config.broker.enabled {
        let broker = SecretBroker::bootstrap(config.broker.clone(), audit.clone())
            .await
            .context("bootstrap secret broker")?;
        sourcegate_secrets::install(Arc::clone(&broker));
        config.apply_secrets(&broker).await?;
        Some(broker)
    } else {
        tracing::info!("Secret store disabled");
        None
    };
    let refresh_handle = broker
        .as_ref()
        .map(|broker| broker.spawn_refresh(root.child_token()));

    // --- Database ---
    let pool = sourcegate_db::create_pool(&config.database.url, config.database.max_connections)
        .await
        .context("connect to database")?;
    sourcegate_db::health_check(&pool)
        .await
        .context("database health check")?;
    sourcegate_db::run_migrations(&pool)
        .await
        .context("run database migrations")?;
    tracing::info!("Database ready");

    // --- Kafka ---
    let events = Arc::new(
        EventEmitter::connect(
            config.kafka.clone(),
            &config.settings,
            broker.as_deref(),
            audit.clone(),
        )
        .await
        .context("connect to Kafka")?,
    );
    sourcegate_events::install(Arc::clone(&events));

    // --- Cron ---
    let registry = LockRegistry::new(Arc::new(PgCronLockStore::new(pool.clone())));
    let mut cron = CronService::new(config.cron.clone(), registry, audit.clone());
    cron.register(builtin::audit_log_cleanup(&config.settings, audit.clone())?)
        .await
        .context("register cron tasks")?;
    let cron = Arc::new(cron);
    cron.start();

    // --- Authentication ---
    let directory = Arc::new(PgDirectory::new(pool.clone()));
    let iam = config.iam.enabled.then(|| {
        IamProxy::new(
            config.iam.clone(),
            directory.clone(),
            directory.clone(),
            audit.clone(),
        )
    });
    if iam.is_none() && !config.jwt.is_configured() {
        tracing::warn!("IAM disabled and no JWT secret configured; only HTTP Basic is available");
    }
    let auth = Authenticator::new(iam, BasicChain::new(config.jwt.clone(), directory));

    // --- App state ---
    let state = AppState {
        pool: Some(pool.clone()),
        config: Arc::new(config.server.clone()),
        auth: Arc::new(auth),
        cron: Arc::clone(&cron),
        events: Arc::clone(&events),
        audit: audit.clone(),
    };
    let app = build_app_router(state, &config.server);

    // --- Start server ---
    let host: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid HOST {}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "Starting server");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(root.clone()))
    .await
    .context("server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let drain = Duration::from_secs(config.server.shutdown_timeout_secs);

    if tokio::time::timeout(drain, cron.shutdown()).await.is_err() {
        tracing::warn!("Cron tasks did not stop in time");
    }
    tracing::info!("Cron scheduler stopped");

    if let Some(handle) = refresh_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        tracing::info!("Secret broker refresh stopped");
    }

    sourcegate_events::shutdown();
    tracing::info!("Kafka client closed");

    pool.close().await;

    audit.emit(
        EventKind::ServiceStop,
        &Actor::anonymous(),
        Status::Success,
        "-",
        params([("version", env!("CARGO_PKG_VERSION"))]),
    );
    sourcegate_audit::shutdown().await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// `RUST_LOG` selects the filter; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for SIGINT or SIGTERM, then cancel `root` so background loops stop
/// alongside the HTTP server.
async fn shutdown_signal(root: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
    root.cancel();
}
