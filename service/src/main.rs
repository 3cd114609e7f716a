use std::sync::Arc;

use inkwell_common::database::connect;
use inkwell_service::domain::publication::PublicationService;
use inkwell_service::domain::repository::ContentRepository;
use inkwell_service::domain::scheduler::Scheduler;
use inkwell_service::infrastructure::AppStateImpl;
use inkwell_service::infrastructure::delivery::LoggingDeliveryNotifier;
use inkwell_service::infrastructure::http::{HttpServer, HttpServerConfig};
use inkwell_service::infrastructure::persistence::{
    MemoryContentRepository, PostgresContentRepository,
};
use inkwell_service::infrastructure::settings::{Settings, StoreKind};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match settings.store {
        StoreKind::Memory => {
            tracing::warn!("using in-memory store, content is lost on restart");
            serve(MemoryContentRepository::new(), &settings).await
        }
        StoreKind::Postgres => {
            let database = connect(settings.database()?).await?;
            tracing::info!("connected to database");
            serve(PostgresContentRepository::new(database), &settings).await
        }
    }
}

async fn serve<R: ContentRepository>(repository: R, settings: &Settings) -> anyhow::Result<()> {
    let options = (&settings.publishing).into();
    let publication = Arc::new(PublicationService::new(
        repository,
        LoggingDeliveryNotifier,
        options,
    ));

    let scheduler = Scheduler::new(Arc::clone(&publication));
    let restored = scheduler.rebuild().await?;
    tracing::info!(restored, "schedule rebuilt from store");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(scheduler.run(wait_for(shutdown_rx)));

    let state = AppStateImpl::new(publication);
    let server_config = HttpServerConfig {
        port: &settings.server_port,
    };
    let http_server = HttpServer::new(state, server_config).await?;

    let served = http_server
        .run(async move {
            shutdown_signal().await;
            shutdown_tx.send_replace(true);
        })
        .await;

    // the sender is dropped with the server, so the scheduler stops either way
    scheduler_task.await?;
    served
}

async fn wait_for(mut shutdown: watch::Receiver<bool>) {
    // a closed channel means the sender is gone, which is shutdown as well
    let _ = shutdown.wait_for(|stopped| *stopped).await;
}

/// Waits for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, shutting down"); }
        () = terminate => { tracing::info!("received SIGTERM, shutting down"); }
    }
}
