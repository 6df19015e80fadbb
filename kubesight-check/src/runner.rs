//! Check lifecycle: engine startup, periodic runs, graceful shutdown.

use std::path::Path;
use std::sync::Arc;

use kubesight_engine::{EmitReport, Engine, KindStatus, MemoryControlPlane, MetricSender};
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, info, warn};

use crate::CHECK_NAME;
use crate::config::CheckConfig;
use crate::error::Result;
use crate::fixture::Fixture;
use crate::sender::build_sender;

/// Runs the check against a fixture-backed control plane.
///
/// # Example
///
/// ```ignore
/// let config = CheckConfig::load("kubesight.json5")?;
/// let runner = CheckRunner::new(config).await?;
/// runner.run().await?;
/// ```
pub struct CheckRunner {
    config: CheckConfig,
    control_plane: Arc<MemoryControlPlane>,
    engine: Engine,
    sender: Box<dyn MetricSender>,
}

impl CheckRunner {
    /// Load the fixture, start the engine and create the sender.
    pub async fn new(config: CheckConfig) -> Result<Self> {
        let sender = build_sender(&config.sender)?;
        Self::with_sender(config, sender).await
    }

    /// Like [`new`](Self::new) with an explicit sender.
    pub async fn with_sender(config: CheckConfig, sender: Box<dyn MetricSender>) -> Result<Self> {
        let control_plane = Arc::new(MemoryControlPlane::new());
        let fixture = Fixture::load(&config.control_plane.fixture)?;
        let loaded = fixture.sync(&control_plane);
        info!(
            fixture = %config.control_plane.fixture.display(),
            objects = loaded.applied,
            "Fixture loaded"
        );

        let engine = config
            .kube_state_metrics
            .builder(Arc::clone(&control_plane))?
            .start()?;

        let startup = config.kube_state_metrics.startup_timeout();
        if timeout(startup, engine.wait_for_initial_lists()).await.is_err() {
            warn!(
                timeout_secs = startup.as_secs(),
                "Some collectors have not listed yet"
            );
        }
        for report in engine.status() {
            match &report.status {
                KindStatus::Failed(reason) => {
                    warn!(kind = %report.kind, reason = %reason, "Collector unavailable, retrying");
                }
                KindStatus::Starting => {
                    warn!(kind = %report.kind, "Collector still listing");
                }
                KindStatus::Running => {}
            }
        }

        Ok(Self {
            config,
            control_plane,
            engine,
            sender,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn fixture_path(&self) -> &Path {
        &self.config.control_plane.fixture
    }

    /// One check run: optionally reload the fixture, then emit a snapshot.
    ///
    /// Reloaded changes reach the stores through the watchers, so they show
    /// up in this run or the next one.
    pub async fn run_once(&self) -> EmitReport {
        if self.config.control_plane.reload {
            match Fixture::load(self.fixture_path()) {
                Ok(fixture) => {
                    let changes = fixture.sync(&self.control_plane);
                    debug!(
                        applied = changes.applied,
                        deleted = changes.deleted,
                        "Fixture reloaded"
                    );
                }
                Err(e) => warn!(error = %e, "Fixture reload failed, keeping previous state"),
            }
        }

        let report = self
            .engine
            .emit(self.sender.as_ref(), &self.config.kube_state_metrics.tags)
            .await;

        info!(
            check = CHECK_NAME,
            emitted = report.emitted,
            failed = report.failed,
            committed = report.committed,
            "Check run complete"
        );
        for status in self.engine.status() {
            debug!(
                kind = %status.kind,
                objects = status.stats.objects,
                events = status.stats.events_applied,
                resyncs = status.stats.resyncs,
                errors = status.stats.generation_errors,
                "Collector status"
            );
        }
        report
    }

    /// Run every `interval_secs` until Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<()> {
        let mut ticker = interval(self.config.kube_state_metrics.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let signal = shutdown_signal();
        tokio::pin!(signal);

        info!(
            check = CHECK_NAME,
            interval_secs = self.config.kube_state_metrics.interval_secs,
            "Check running"
        );

        loop {
            tokio::select! {
                _ = &mut signal => break,
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Stop the engine's watchers.
    pub async fn shutdown(self) {
        self.engine.shutdown().await;
        info!(check = CHECK_NAME, "Check stopped");
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
