use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use role_sync::config::{Config, Secrets};
use role_sync::join::{JOIN_CHANNEL_CAPACITY, spawn_join_worker};
use role_sync::notify::NotificationDispatcher;
use role_sync::platform::GuildClient;
use role_sync::reconcile::Controller;
use role_sync::scheduler::{SyncScheduler, TRIGGER_CHANNEL_CAPACITY};
use role_sync::server::{AppState, build_router};
use role_sync::upstream::ProfileClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "role_sync=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("loading configuration")?;
    let secrets = Secrets::from_env().context("loading secrets")?;

    let platform = Arc::new(
        GuildClient::new(
            config.platform.api_base.clone(),
            config.platform.guild_id.clone(),
            &secrets.platform_token,
            Duration::from_secs(config.platform.request_timeout_secs),
        )
        .context("building platform client")?,
    );
    let upstream = Arc::new(
        ProfileClient::new(
            config.upstream.base_url.clone(),
            &secrets.upstream_api_key,
            Duration::from_secs(config.upstream.request_timeout_secs),
        )
        .context("building upstream client")?,
    );

    let shutdown = CancellationToken::new();

    let mut controller = Controller::new(Arc::clone(&platform), upstream, config.classes.clone())
        .with_snapshot_ttl(config.snapshot_ttl());
    let notifier_task = match config.notify() {
        Some(notify_config) => {
            let (dispatcher, task) = NotificationDispatcher::spawn(
                Arc::clone(&platform),
                notify_config,
                shutdown.child_token(),
            );
            controller = controller.with_notifier(dispatcher);
            Some(task)
        }
        None => {
            info!("No notification channel configured; celebrations disabled");
            None
        }
    };
    let controller = Arc::new(controller);

    let scheduler = Arc::new(SyncScheduler::new(
        Arc::clone(&controller),
        config.scheduler(),
        shutdown.child_token(),
    ));
    scheduler.start().await;

    let (sync_tx, sync_rx) = mpsc::channel(TRIGGER_CHANNEL_CAPACITY);
    let trigger_task = Arc::clone(&scheduler).spawn_trigger_worker(sync_rx, shutdown.child_token());

    let (join_tx, join_rx) = mpsc::channel(JOIN_CHANNEL_CAPACITY);
    let join_task = spawn_join_worker(Arc::clone(&controller), join_rx, shutdown.child_token());

    let app = build_router(AppState::new(
        controller.status(),
        join_tx,
        sync_tx,
        secrets.event_secret.clone(),
    ));

    let addr = config.server.listen_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, classes = config.classes.len(), "Listening");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
                _ = server_shutdown.cancelled() => {}
            }
        })
        .await
        .context("serving HTTP")?;

    shutdown.cancel();
    if let Err(e) = trigger_task.await {
        warn!(error = %e, "Trigger worker panicked");
    }
    scheduler.shutdown().await;
    if let Err(e) = join_task.await {
        warn!(error = %e, "Join worker panicked");
    }
    if let Some(task) = notifier_task
        && let Err(e) = task.await
    {
        warn!(error = %e, "Notification worker panicked");
    }

    info!("Shut down cleanly");
    Ok(())
}
