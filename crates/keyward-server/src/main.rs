//! `keyward` entry point

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use keyward_auth::{
    AuthOrchestrator, InMemoryStore, SessionStore, UserDirectory, build_verifier,
    spawn_session_reaper,
};
use keyward_server::cli::{Cli, load_env_files};
use keyward_server::{AppState, logging, router};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// In-flight requests get this long after a shutdown signal before their
/// store and provider calls are cancelled
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_files = load_env_files();
    let cli = Cli::parse();

    logging::init(cli.log_level.as_deref(), cli.log_format)
        .context("failed to initialise logging")?;
    for file in &env_files {
        info!(file = %file.display(), "Loaded environment file");
    }

    let config = Arc::new(cli.auth_config().context("invalid configuration")?);
    let verifier =
        build_verifier(config.google()).context("failed to build the identity verifier")?;
    let (users, sessions) = open_stores(&cli).await?;

    let auth = Arc::new(AuthOrchestrator::new(
        Arc::clone(&config),
        verifier,
        users,
        Arc::clone(&sessions),
    ));

    let reaper = cli.reap_interval().map(|interval| {
        info!(interval_secs = interval.as_secs(), "Starting expired-session reaper");
        spawn_session_reaper(
            sessions,
            Arc::clone(auth.clock()),
            interval,
            config.call_timeout(),
        )
    });

    let shutdown = CancellationToken::new();
    let app = router(AppState::with_shutdown(auth, shutdown.clone()));

    let addr = cli.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        %addr,
        env = %cli.env,
        verifier = %config.google().verifier,
        rotate_refresh_tokens = config.rotate_refresh_tokens(),
        "keyward listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("HTTP server error")?;

    if let Some(reaper) = reaper {
        reaper.abort();
    }
    info!("Server stopped");
    Ok(())
}

async fn open_stores(
    cli: &Cli,
) -> anyhow::Result<(Arc<dyn UserDirectory>, Arc<dyn SessionStore>)> {
    match cli.database_url.as_deref() {
        #[cfg(feature = "postgres")]
        Some(url) => {
            let store = keyward_auth::PgStore::connect(url, cli.database_max_connections)
                .await
                .context("failed to connect to Postgres")?;
            store.migrate().await.context("failed to apply the schema")?;
            info!(max_connections = cli.database_max_connections, "Using Postgres storage");

            let store = Arc::new(store);
            let users: Arc<dyn UserDirectory> = store.clone();
            let sessions: Arc<dyn SessionStore> = store;
            Ok((users, sessions))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => anyhow::bail!(
            "DATABASE_URL is set but keyward was built without the `postgres` feature"
        ),
        None => {
            warn!("DATABASE_URL not set, using in-memory storage (lost on restart)");
            let store = Arc::new(InMemoryStore::new());
            let users: Arc<dyn UserDirectory> = store.clone();
            let sessions: Arc<dyn SessionStore> = store;
            Ok((users, sessions))
        }
    }
}

/// Resolve on Ctrl-C or SIGTERM, then cancel outstanding calls after the grace period
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!(grace_secs = SHUTDOWN_GRACE.as_secs(), "Shutdown signal received, draining requests");
    tokio::spawn(async move {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        shutdown.cancel();
    });
}
