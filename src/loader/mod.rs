//! Incremental loading of lazily populated surfaces.
//!
//! The loader keeps growing a surface (scroll to the end, press "show more")
//! until the growth measure stops changing for `retry_budget` consecutive
//! cycles. The per-cycle decision lives in [`step`], a pure function, so the
//! retry policy can be checked without a browser.

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::traits::Surface;

/// Progress of one loader invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadState {
    /// Last growth measure taken from the surface
    pub last_observed_size: i64,
    /// No-growth cycles left before the loader gives up
    pub remaining_retries: u32,
}

impl LoadState {
    pub fn new(baseline: i64, retry_budget: u32) -> Self {
        Self {
            last_observed_size: baseline,
            remaining_retries: retry_budget,
        }
    }

    pub fn is_converged(&self) -> bool {
        self.remaining_retries == 0
    }
}

/// What one cycle saw after growing the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Measure read after the grow action settled
    pub size: i64,
    /// Whether a reveal control was activated this cycle
    pub revealed: bool,
}

/// Advance the load state by one cycle.
///
/// A reveal always resets the budget, even when the measure did not move.
/// Without a reveal, any change of the measure (up or down) resets it and an
/// unchanged measure spends one retry.
pub fn step(state: LoadState, observation: Observation, retry_budget: u32) -> LoadState {
    if observation.revealed || observation.size != state.last_observed_size {
        LoadState {
            last_observed_size: observation.size,
            remaining_retries: retry_budget,
        }
    } else {
        LoadState {
            last_observed_size: state.last_observed_size,
            remaining_retries: state.remaining_retries.saturating_sub(1),
        }
    }
}

/// Why a loader invocation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The retry budget ran out: the surface stopped growing
    Converged,
    /// The configured cycle cap was reached first
    CycleCap,
    /// The cancellation signal was raised between cycles
    Cancelled,
}

/// Result of one loader invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    pub final_measure: i64,
    pub cycles: u32,
    pub termination: Termination,
}

impl LoadOutcome {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

/// Drives a [`Surface`] until its content stops growing
pub struct IncrementalLoader {
    config: LoaderConfig,
    cancel: Option<watch::Receiver<bool>>,
}

impl IncrementalLoader {
    pub fn new(config: LoaderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: None,
        })
    }

    /// Stop between cycles once `cancel` holds `true`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run cycles until convergence, the cycle cap or cancellation.
    ///
    /// Faults from `measure` and `grow` are returned to the caller. A fault
    /// from `reveal_more` is logged and counted as "no control found".
    pub async fn run<S>(&self, surface: &S) -> Result<LoadOutcome>
    where
        S: Surface + ?Sized,
    {
        let budget = self.config.retry_budget;
        let baseline = surface.measure().await?;
        let mut state = LoadState::new(baseline, budget);
        let mut cycles = 0u32;

        info!("Loading content (baseline measure {}, retry budget {})", baseline, budget);

        let termination = loop {
            if state.is_converged() {
                break Termination::Converged;
            }
            if self.config.max_cycles.is_some_and(|cap| cycles >= cap) {
                break Termination::CycleCap;
            }
            if self.cancelled() {
                break Termination::Cancelled;
            }

            surface.grow().await?;
            sleep(self.config.post_grow_delay).await;

            let size = surface.measure().await?;

            let revealed = match surface.reveal_more().await {
                Ok(revealed) => revealed,
                Err(e) => {
                    warn!("Reveal control could not be activated: {:#}", e);
                    false
                }
            };

            if revealed {
                sleep(self.config.post_reveal_delay).await;
                sleep(self.config.reveal_load_delay).await;
            }

            state = step(state, Observation { size, revealed }, budget);
            cycles += 1;

            debug!(
                cycle = cycles,
                measure = size,
                revealed,
                remaining_retries = state.remaining_retries,
                "Load cycle finished"
            );
        };

        let outcome = LoadOutcome {
            final_measure: state.last_observed_size,
            cycles,
            termination,
        };

        info!(
            "Loading stopped after {} cycles ({:?}, final measure {})",
            outcome.cycles, outcome.termination, outcome.final_measure
        );

        Ok(outcome)
    }
}
