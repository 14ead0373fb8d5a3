use crate::planner::KeyBatch;
use crate::transaction::RequestHook;
use crate::transport::{Connector, TransportError};
use parkbench_core::{Summary, CANCEL_GRACE_PERIOD};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// A worker which had to stop because its transport failed fatally.
#[derive(Debug, Error)]
#[error("worker {worker} failed{}: {source}", key_suffix(.key))]
pub struct WorkerFailure {
    pub worker: usize,
    /// `None` when the transport could not be established at all.
    pub key: Option<String>,
    #[source]
    pub source: TransportError,
}

fn key_suffix(key: &Option<String>) -> String {
    key.as_ref()
        .map(|k| format!(" on key {k:?}"))
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub(crate) enum DispatchError {
    /// `partial` is the run as it stood when the failure was observed.
    #[error("{failure}")]
    Fatal {
        #[source]
        failure: WorkerFailure,
        partial: Box<Summary>,
    },

    #[error("worker task panicked: {0}")]
    Panicked(#[source] JoinError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WorkerReport {
    pub issued: usize,
    pub failed: usize,
    pub cancelled: bool,
}

pub(crate) struct WorkerPool<C> {
    connector: Arc<C>,
    hook: RequestHook,
    grace: Duration,
}

impl<C: Connector> WorkerPool<C> {
    pub fn new(connector: Arc<C>, hook: RequestHook) -> Self {
        Self {
            connector,
            hook,
            grace: CANCEL_GRACE_PERIOD,
        }
    }

    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Run every batch on its own task and wait for all of them.
    ///
    /// The first fatal failure cancels the remaining workers: they finish their in-flight call
    /// and stop. Workers still busy after the grace period are aborted.
    pub async fn dispatch(self, batches: Vec<KeyBatch>) -> Result<Vec<WorkerReport>, DispatchError> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        for batch in batches {
            tasks.spawn(run_worker(
                self.connector.clone(),
                batch,
                self.hook.clone(),
                cancelled.clone(),
            ));
        }
        debug!("Dispatched {} workers", tasks.len());

        let mut reports = Vec::with_capacity(tasks.len());
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(err)) => {
                    error!("{err}");
                    failure = Some(DispatchError::Fatal {
                        failure: err,
                        partial: Box::new(self.hook.stats.snapshot_all().summary()),
                    });
                }
                Err(err) => failure = Some(DispatchError::Panicked(err)),
            }

            if failure.is_some() {
                break;
            }
        }

        let Some(failure) = failure else {
            return Ok(reports);
        };

        cancelled.store(true, Ordering::Release);
        warn!(
            "Cancelling {} remaining workers after a fatal error",
            tasks.len()
        );

        let drained = tokio::time::timeout(self.grace, async {
            while let Some(joined) = tasks.join_next().await {
                if let Ok(Err(err)) = joined {
                    debug!("Additional worker failure: {err}");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Workers did not stop within {:?}; aborting them", self.grace);
            tasks.shutdown().await;
        }

        Err(failure)
    }
}

#[instrument(name = "worker", skip_all, fields(worker = batch.worker(), keys = batch.len()))]
async fn run_worker<C: Connector>(
    connector: Arc<C>,
    batch: KeyBatch,
    hook: RequestHook,
    cancelled: Arc<AtomicBool>,
) -> Result<WorkerReport, WorkerFailure> {
    let worker = batch.worker();
    let mut report = WorkerReport::default();

    if batch.is_empty() {
        trace!("Empty batch");
        return Ok(report);
    }

    let mut transport = connector
        .connect(worker)
        .await
        .map_err(|source| WorkerFailure {
            worker,
            key: None,
            source,
        })?;

    for key in batch {
        if cancelled.load(Ordering::Acquire) {
            debug!("Cancelled after {} requests", report.issued);
            report.cancelled = true;
            break;
        }

        match hook.query(&mut transport, &key).await {
            Ok(outcome) => {
                report.issued += 1;
                if !outcome.is_success() {
                    report.failed += 1;
                }
            }
            Err(source) => {
                return Err(WorkerFailure {
                    worker,
                    key: Some(key.to_string()),
                    source,
                })
            }
        }
    }

    trace!(
        "Batch complete: {} requests, {} failed",
        report.issued,
        report.failed
    );
    Ok(report)
}
