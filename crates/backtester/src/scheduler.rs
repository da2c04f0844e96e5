//! Staged simulation lifecycle management.
//!
//! The scheduler owns one run at a time: it walks the pipeline (data load,
//! warm-up, simulate, metrics, finalize), streams progress events over an
//! unbounded channel, and guarantees exactly one terminal event per run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use strategy_core::types::{BacktestResult, SavedStrategy, SimulationWindow};
use strategy_core::{Error, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use market_data::HistoricalDataCache;

use crate::engine::{EngineConfig, ExecutionEngine, RunParams, SimulationRun};
use crate::metrics;

/// Cooperative cancellation flag shared between the scheduler handle and the
/// running simulation task.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pipeline stages in execution order. Each stage owns a slice of the
/// progress range; the simulate stage interpolates within its slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    DataLoad,
    WarmUp,
    Simulate,
    Metrics,
    Finalize,
}

impl Stage {
    pub fn percent(&self) -> u8 {
        match self {
            Stage::DataLoad => 5,
            Stage::WarmUp => 15,
            Stage::Simulate => 30,
            Stage::Metrics => 90,
            Stage::Finalize => 95,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Stage::DataLoad => "Loading historical data",
            Stage::WarmUp => "Verifying data coverage",
            Stage::Simulate => "Replaying strategy",
            Stage::Metrics => "Computing performance metrics",
            Stage::Finalize => "Finalizing results",
        }
    }
}

/// Events emitted by a running simulation, in order. Progress percents are
/// monotonically non-decreasing; exactly one terminal variant (`Complete`,
/// `Cancelled`, or `Error`) closes the stream.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimulationEvent {
    Progress {
        stage: Stage,
        message: String,
        percent: u8,
    },
    Complete(Box<BacktestResult>),
    Cancelled,
    Error { message: String },
}

impl SimulationEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SimulationEvent::Progress { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Complete,
    Cancelled,
    Failed,
}

/// Everything needed to launch one run.
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub strategy: SavedStrategy,
    pub window: SimulationWindow,
    pub initial_capital: Decimal,
    pub tick_interval: Duration,
}

/// Caller-side handle to a launched run: receives events, can request
/// cancellation, and can await task shutdown.
pub struct SimulationHandle {
    events: mpsc::UnboundedReceiver<SimulationEvent>,
    cancel: CancelToken,
    join: JoinHandle<()>,
}

impl SimulationHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Clone of the run's cancel token, for cancelling from another task.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Next event from the run, or `None` once the stream has closed after
    /// its terminal event.
    pub async fn next_event(&mut self) -> Option<SimulationEvent> {
        self.events.recv().await
    }

    /// Wait for the background task to finish.
    pub async fn join(self) {
        let _ = self.join.await;
    }
}

/// Runs at most one simulation at a time and reports its lifecycle state.
pub struct SimulationScheduler {
    cache: Arc<HistoricalDataCache>,
    engine_config: EngineConfig,
    state: Arc<Mutex<SchedulerState>>,
}

impl SimulationScheduler {
    pub fn new(cache: Arc<HistoricalDataCache>, engine_config: EngineConfig) -> Self {
        Self {
            cache,
            engine_config,
            state: Arc::new(Mutex::new(SchedulerState::Idle)),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock().expect("scheduler state lock poisoned")
    }

    /// Launch a run on a background task. Fails without side effects if a
    /// run is already in flight.
    pub fn start(&self, config: BacktestConfig) -> Result<SimulationHandle> {
        {
            let mut state = self.state.lock().expect("scheduler state lock poisoned");
            if *state == SchedulerState::Running {
                return Err(Error::scheduler("a simulation is already running"));
            }
            *state = SchedulerState::Running;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelToken::new();

        let cache = Arc::clone(&self.cache);
        let engine_config = self.engine_config.clone();
        let state = Arc::clone(&self.state);
        let task_cancel = cancel.clone();

        info!(
            strategy = %config.strategy.name,
            start = %config.window.start,
            end = %config.window.end,
            "Scheduling backtest"
        );

        let join = tokio::spawn(async move {
            let outcome =
                run_pipeline(cache, engine_config, config, &task_cancel, &tx).await;

            let final_state = match outcome {
                Ok(Some(result)) => {
                    let _ = tx.send(SimulationEvent::Complete(Box::new(result)));
                    SchedulerState::Complete
                }
                Ok(None) => {
                    let _ = tx.send(SimulationEvent::Cancelled);
                    SchedulerState::Cancelled
                }
                Err(err) => {
                    error!(error = %err, "Backtest pipeline failed");
                    let _ = tx.send(SimulationEvent::Error {
                        message: err.to_string(),
                    });
                    SchedulerState::Failed
                }
            };

            *state.lock().expect("scheduler state lock poisoned") = final_state;
        });

        Ok(SimulationHandle {
            events: rx,
            cancel,
            join,
        })
    }
}

/// Execute the staged pipeline. `Ok(Some(_))` completed, `Ok(None)`
/// cancelled; the caller translates the outcome into the terminal event.
async fn run_pipeline(
    cache: Arc<HistoricalDataCache>,
    engine_config: EngineConfig,
    config: BacktestConfig,
    cancel: &CancelToken,
    tx: &mpsc::UnboundedSender<SimulationEvent>,
) -> Result<Option<BacktestResult>> {
    let params = RunParams {
        window: config.window,
        initial_capital: config.initial_capital,
        tick_interval: config.tick_interval,
    };
    params.validate()?;

    let send_stage = |stage: Stage| {
        let _ = tx.send(SimulationEvent::Progress {
            stage,
            message: stage.message().to_string(),
            percent: stage.percent(),
        });
    };

    if cancel.is_cancelled() {
        return Ok(None);
    }

    send_stage(Stage::DataLoad);
    let assets = config.strategy.referenced_assets();
    cache
        .prefetch(config.window.start, config.window.end, &assets)
        .await;

    if cancel.is_cancelled() {
        return Ok(None);
    }

    send_stage(Stage::WarmUp);
    for asset in &assets {
        if !cache.has_coverage(asset) {
            warn!(asset = %asset, "No cached series; falling back to reference values");
        }
    }

    if cancel.is_cancelled() {
        return Ok(None);
    }

    send_stage(Stage::Simulate);
    let engine = ExecutionEngine::new(Arc::clone(&cache), engine_config);

    // Map simulation progress onto the 30..85 slice, keeping percents
    // monotonic even when tick batches round to the same value.
    let mut last_percent = Stage::Simulate.percent();
    let tx_progress = tx.clone();
    let run = engine
        .simulate(&config.strategy, &params, cancel, |done, total| {
            if total == 0 {
                return;
            }
            let percent = 30 + ((done * 55) / total) as u8;
            if percent > last_percent {
                last_percent = percent;
                let _ = tx_progress.send(SimulationEvent::Progress {
                    stage: Stage::Simulate,
                    message: format!("Replaying strategy ({done}/{total} ticks)"),
                    percent,
                });
            }
        })
        .await?;

    let output = match run {
        SimulationRun::Completed(output) => output,
        SimulationRun::Cancelled => return Ok(None),
    };

    send_stage(Stage::Metrics);
    let computed = metrics::compute(
        &output.equity_curve,
        &output.trades,
        &output.portfolio.lp_positions,
        config.initial_capital,
        config.tick_interval,
    );

    send_stage(Stage::Finalize);
    Ok(Some(BacktestResult {
        strategy_id: config.strategy.id,
        window: config.window,
        initial_capital: config.initial_capital,
        trades: output.trades,
        equity_curve: output.equity_curve,
        metrics: computed,
        final_portfolio: output.portfolio,
        completed_at: Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_starts_clear() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_visible_through_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_stage_percents_ascend() {
        let stages = [
            Stage::DataLoad,
            Stage::WarmUp,
            Stage::Simulate,
            Stage::Metrics,
            Stage::Finalize,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].percent() < pair[1].percent());
        }
    }

    #[test]
    fn test_terminal_event_classification() {
        assert!(!SimulationEvent::Progress {
            stage: Stage::Simulate,
            message: String::new(),
            percent: 40,
        }
        .is_terminal());
        assert!(SimulationEvent::Cancelled.is_terminal());
        assert!(SimulationEvent::Error {
            message: "boom".to_string(),
        }
        .is_terminal());
    }
}
