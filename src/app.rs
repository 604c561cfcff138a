use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use frostwatch_core::{Config, MirrorBackend};
use frostwatch_directory::{
    import_legacy_tokens, load_with_retry, Directory, MemoryMirror, PlainTokens, RemoteMirror,
    SqliteMirror, StartupRetry,
};
use frostwatch_notify::build_notifier;
use frostwatch_sweep::{SweepScheduler, Sweeper};
use frostwatch_weather::{FrostEvaluator, OpenMeteoProvider};

use crate::api::{self, ApiState};

/// Wired service: directory, sweep scheduler and HTTP boundary.
pub struct App {
    config: Arc<Config>,
    directory: Arc<Directory>,
    scheduler: Arc<SweepScheduler>,
}

impl App {
    /// Build every component from `config`.
    ///
    /// Fails if the mirror cannot be opened or loaded within the startup
    /// retry budget.
    pub async fn build(config: Config) -> Result<Self> {
        let mirror = open_mirror(&config)?;

        let directory = load_with_retry(
            mirror,
            config.mirror.timeout(),
            &StartupRetry::from_config(&config.mirror),
        )
        .await
        .context("Failed to load the location directory")?;
        let directory = Arc::new(directory);

        if let Some(path) = &config.legacy.tokens_file {
            let report = import_legacy_tokens(path, &PlainTokens, &directory).await?;
            if !report.is_success() {
                tracing::warn!("{} legacy records could not be imported", report.failed);
            }
        }

        let source = Arc::new(OpenMeteoProvider::new(&config.forecast)?);
        let notifier = build_notifier(&config.notify)?;

        let sweeper = Sweeper::new(directory.clone(), source, notifier)
            .with_evaluator(FrostEvaluator::new(config.forecast.frost_threshold_celsius))
            .with_policy(config.sweep.dedup)
            .with_forecast_timeout(config.forecast.timeout());
        let scheduler = Arc::new(SweepScheduler::new(sweeper, config.sweep.interval()));

        Ok(Self {
            config: Arc::new(config),
            directory,
            scheduler,
        })
    }

    /// Serve the HTTP boundary and run the sweep scheduler until `cancel`
    /// fires. Waits for the in-flight sweep before returning.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let sweeps = Arc::clone(&self.scheduler).spawn(cancel.clone());

        let router = api::router(ApiState {
            directory: self.directory.clone(),
            scheduler: self.scheduler.clone(),
        });

        let bind = &self.config.server.bind;
        let listener = TcpListener::bind(bind)
            .await
            .with_context(|| format!("Failed to bind to {}", bind))?;
        tracing::info!("API server listening on {}", bind);

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(cancel.clone().cancelled_owned())
            .await
            .context("API server error");

        // Server errors also stop the scheduler
        cancel.cancel();
        if let Err(e) = sweeps.await {
            tracing::error!("Sweep scheduler task failed: {}", e);
        }

        served?;
        tracing::info!("Frostwatch stopped");
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }
}

fn open_mirror(config: &Config) -> Result<Arc<dyn RemoteMirror>> {
    let mirror: Arc<dyn RemoteMirror> = match config.mirror.backend {
        MirrorBackend::Sqlite => Arc::new(
            SqliteMirror::open(&config.mirror.db_path).with_context(|| {
                format!(
                    "Failed to open SQLite mirror at {}",
                    config.mirror.db_path.display()
                )
            })?,
        ),
        MirrorBackend::Memory => {
            tracing::warn!("Using in-memory mirror; locations will not survive a restart");
            Arc::new(MemoryMirror::new())
        }
    };
    Ok(mirror)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use frostwatch_core::DeviceToken;
    use std::io::Write;

    fn memory_config() -> Config {
        let mut config = Config::default();
        config.mirror.backend = MirrorBackend::Memory;
        config
    }

    #[tokio::test]
    async fn test_build_with_memory_mirror() {
        let app = App::build(memory_config()).await.unwrap();
        assert!(app.directory().is_empty());
        assert_eq!(app.config().server.bind, "0.0.0.0:5050");
    }

    #[tokio::test]
    async fn test_build_imports_legacy_tokens() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "token-a\ntoken-b\ntoken-a").unwrap();

        let mut config = memory_config();
        config.legacy.tokens_file = Some(file.path().to_path_buf());

        let app = App::build(config).await.unwrap();
        assert_eq!(app.directory().len(), 2);
        assert!(app.directory().contains(&DeviceToken::new("token-b")));
    }

    #[tokio::test]
    async fn test_sqlite_mirror_survives_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.mirror.db_path = dir.path().join("locations.db");

        {
            let app = App::build(config.clone()).await.unwrap();
            app.directory()
                .register(&DeviceToken::new("persisted"))
                .await
                .unwrap();
        }

        let app = App::build(config).await.unwrap();
        assert!(app.directory().contains(&DeviceToken::new("persisted")));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let mut config = memory_config();
        config.server.bind = "127.0.0.1:0".to_string();
        let app = App::build(config).await.unwrap();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(app.run(cancel.clone()));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();

        handle.await.unwrap().unwrap();
    }
}
