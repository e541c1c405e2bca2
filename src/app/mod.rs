mod wiring;

use crate::{cli, context, rest, storage};
use anyhow::{Context as AnyhowContext, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct App {
    ctx: context::Context,
    storage: storage::SqliteStorage,
    shutdown: CancellationToken,
}

impl App {
    pub fn from_cli() -> Result<(Self, cli::Cli)> {
        let cli = crate::cli::parse();
        let ctx = context::Context::from_cli(&cli);

        crate::tracing::set_log_file(ctx.config.log_file.as_deref());
        log::info!("🚀 Starting sleeplog");
        log::info!("📂 Data dir: {}", ctx.config.data_dir.to_string_lossy());

        wiring::init_data_dir(&ctx).context("initializing data dir")?;
        let storage = wiring::init_storage(&ctx)?;

        Ok((
            Self {
                ctx,
                storage,
                shutdown: CancellationToken::new(),
            },
            cli,
        ))
    }

    pub async fn run_daemon(&self) -> Result<()> {
        log::info!("🌐 REST API: http://{}", self.ctx.config.api_listen);
        log::info!("📏 Default page size: {}", self.ctx.config.default_limit);
        if let Some(path) = self.ctx.config.log_file.as_deref() {
            log::info!("📝 Log file: {}", path.to_string_lossy());
        }

        let mut rest_handle = self.spawn_rest_server();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => log::info!("🧨 Ctrl-C received, shutting down..."),
            _ = &mut rest_handle => log::error!("REST task exited unexpectedly"),
        }

        self.shutdown.cancel();
        if !rest_handle.is_finished() {
            rest_handle.await.context("joining REST task")?;
        }

        log::info!("✅ Shutdown complete");
        Ok(())
    }

    fn spawn_rest_server(&self) -> JoinHandle<()> {
        let addr = self.ctx.config.api_listen;
        let store = self.storage.clone();
        let default_limit = self.ctx.config.default_limit;
        let token = self.shutdown.clone();

        tokio::spawn(async move {
            if let Err(e) = rest::serve(addr, store, default_limit, token).await {
                log::error!("REST server failed: {:#}", e);
            }
        })
    }
}

pub async fn run() -> Result<()> {
    let (app, cli) = App::from_cli()?;

    if let Some(cmd) = &cli.cmd {
        // one-shot command mode
        return cmd.run(&app.ctx);
    }

    app.run_daemon().await
}
