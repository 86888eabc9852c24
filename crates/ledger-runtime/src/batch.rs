//! Bounded worker pool over the per-message pipeline.
//!
//! Each message is processed in its own blocking task. A semaphore caps how
//! many run at once; outcomes are collected in completion order and handed to
//! the [`Aggregator`] only once every task has joined.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use ledger_core::error::LedgerError;
use ledger_core::models::Provider;
use ledger_data::aggregator::{Aggregator, MasterDataset};
use ledger_data::pipeline::{InboundMessage, MessageOutcome, Pipeline};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Upper bound on concurrent workers.
pub const MAX_WORKERS: usize = 64;

// ── BatchProcessor ────────────────────────────────────────────────────────────

/// Runs a batch of messages through a shared [`Pipeline`].
pub struct BatchProcessor {
    pipeline: Arc<Pipeline>,
    workers: usize,
}

impl BatchProcessor {
    /// `workers` is clamped to `1..=MAX_WORKERS`.
    pub fn new(pipeline: Pipeline, workers: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            workers: workers.clamp(1, MAX_WORKERS),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process every message and return the outcomes in completion order.
    pub async fn process_all(&self, messages: Vec<InboundMessage>) -> Vec<MessageOutcome> {
        let total = messages.len();
        info!(messages = total, workers = self.workers, "starting batch");

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks: JoinSet<MessageOutcome> = JoinSet::new();

        for message in messages {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                // Only happens if the semaphore is closed, which this pool never does.
                break;
            };
            let pipeline = Arc::clone(&self.pipeline);
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let id = message.id().to_string();
                let hint = message.provider_hint;
                run_guarded(id, hint, || pipeline.process(message))
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    debug!(
                        message_id = %outcome.message_id,
                        done = outcomes.len() + 1,
                        total,
                        "{}", outcome.kind
                    );
                    outcomes.push(outcome);
                }
                Err(e) => warn!("worker task ended abnormally: {}", e),
            }
        }
        outcomes
    }

    /// Process every message, then aggregate once all workers have joined.
    pub async fn run(&self, messages: Vec<InboundMessage>) -> MasterDataset {
        let outcomes = self.process_all(messages).await;
        Aggregator::aggregate(outcomes)
    }
}

/// Run `work`, turning a panic into a `Failed` outcome for `message_id`.
fn run_guarded<F>(message_id: String, provider: Option<Provider>, work: F) -> MessageOutcome
where
    F: FnOnce() -> MessageOutcome,
{
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            error!(message_id = %message_id, "worker panicked: {}", reason);
            MessageOutcome::failed(message_id, provider, LedgerError::TaskFailed(reason))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
