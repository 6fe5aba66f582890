//! Supervised per-order polling of the accrual authority.
//!
//! Each submitted order gets one task that queries the authority until the
//! order is terminal. Tasks are deduplicated by order number, bounded by a
//! semaphore, tracked for draining, and cancelled together on shutdown.
//! Orders interrupted by a shutdown or a crash stay `NEW`/`PROCESSING` in
//! storage and are picked up again by [`Reconciler::recover`].

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use loyalty_shared::{AppConfig, ErrorKind};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::accrual::{AccrualAuthority, AccrualError, AccrualReport};
use crate::error::LoyaltyError;
use crate::order::{OrderNumber, OrderRegistry};

/// Timing and concurrency knobs for the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerSettings {
    /// Wait between polls of an order that is still being processed.
    pub poll_interval: Duration,
    /// Wait after a failed query or a transient storage failure.
    pub failure_delay: Duration,
    /// Maximum number of orders polled at the same time.
    pub max_concurrent: usize,
}

impl ReconcilerSettings {
    /// Reads the settings from the accrual and reconciler sections.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            poll_interval: config.accrual.poll_interval(),
            failure_delay: config.accrual.failure_delay(),
            max_concurrent: config.reconciler.max_concurrent,
        }
    }
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            failure_delay: Duration::from_secs(5),
            max_concurrent: 64,
        }
    }
}

/// What the polling loop does after one query.
enum Next {
    Wait(Duration),
    Finished,
    Abandoned,
}

struct Inner {
    registry: OrderRegistry,
    authority: Arc<dyn AccrualAuthority>,
    settings: ReconcilerSettings,
    permits: Semaphore,
    in_flight: DashSet<OrderNumber>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

/// Removes an order from the in-flight set when its task ends, however it ends.
struct InFlightGuard {
    inner: Arc<Inner>,
    number: OrderNumber,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.remove(&self.number);
    }
}

/// Drives orders to a terminal status in the background.
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
}

impl Reconciler {
    /// Creates a reconciler. No task runs until [`Reconciler::spawn`] or
    /// [`Reconciler::recover`] is called.
    #[must_use]
    pub fn new(
        registry: OrderRegistry,
        authority: Arc<dyn AccrualAuthority>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                authority,
                permits: Semaphore::new(settings.max_concurrent.max(1)),
                settings,
                in_flight: DashSet::new(),
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Starts reconciling `number` unless it is already in flight or the
    /// reconciler is shutting down. Returns true if a task was started.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(&self, number: OrderNumber) -> bool {
        if self.inner.shutdown.is_cancelled() {
            return false;
        }
        if !self.inner.in_flight.insert(number.clone()) {
            debug!(order = %number, "Reconciliation already in flight");
            return false;
        }

        let guard = InFlightGuard {
            inner: Arc::clone(&self.inner),
            number: number.clone(),
        };
        let span = info_span!("reconcile", order = %number);
        self.inner.tracker.spawn(
            async move {
                guard.inner.drive(&guard.number).await;
                drop(guard);
            }
            .instrument(span),
        );
        true
    }

    /// Resumes reconciliation for every order not yet terminal.
    ///
    /// Returns how many tasks were started; orders already in flight are
    /// skipped.
    pub async fn recover(&self) -> Result<usize, LoyaltyError> {
        let orders = self.inner.registry.unresolved().await?;
        let total = orders.len();
        let started = orders
            .into_iter()
            .filter(|order| self.spawn(order.number.clone()))
            .count();

        if started > 0 {
            info!(started, unresolved = total, "Resumed reconciliation of unresolved orders");
        }
        Ok(started)
    }

    /// Number of orders currently being reconciled.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Returns true if `number` is currently being reconciled.
    #[must_use]
    pub fn is_in_flight(&self, number: &OrderNumber) -> bool {
        self.inner.in_flight.contains(number)
    }

    /// Waits until every task started so far has finished.
    #[cfg(test)]
    pub(crate) async fn wait_idle(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        if !self.inner.shutdown.is_cancelled() {
            self.inner.tracker.reopen();
        }
    }

    /// Stops accepting orders, interrupts waits and queries, and drains tasks.
    ///
    /// Storage writes already under way complete first.
    pub async fn shutdown(&self) {
        info!(in_flight = self.in_flight(), "Reconciler shutting down");
        self.inner.shutdown.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("Reconciler drained");
    }
}

impl Inner {
    async fn drive(&self, number: &OrderNumber) {
        let _permit = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return,
            permit = self.permits.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return,
            },
        };
        debug!("Reconciliation started");

        loop {
            let result = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    debug!("Reconciliation interrupted during query");
                    return;
                }
                result = self.authority.query(number) => result,
            };

            let next = match result {
                Ok(report) => self.apply(number, &report).await,
                Err(AccrualError::RateLimited { retry_after }) => {
                    let wait = retry_after.unwrap_or(self.settings.failure_delay);
                    warn!(wait_ms = millis(wait), "Accrual service rate limit hit");
                    Next::Wait(wait)
                }
                Err(AccrualError::NotRegistered) => {
                    debug!("Order not yet known to the accrual service");
                    Next::Wait(self.settings.failure_delay)
                }
                Err(err) => {
                    warn!(error = %err, "Accrual query failed");
                    Next::Wait(self.settings.failure_delay)
                }
            };

            match next {
                Next::Finished | Next::Abandoned => return,
                Next::Wait(wait) => {
                    if !self.pause(wait).await {
                        debug!("Reconciliation interrupted during wait");
                        return;
                    }
                }
            }
        }
    }

    async fn apply(&self, number: &OrderNumber, report: &AccrualReport) -> Next {
        let status = report.status.order_status();
        match self
            .registry
            .update_status(number, status, report.accrual)
            .await
        {
            Ok(update) if update.is_final() => {
                info!(status = %update.current, "Order reconciled");
                Next::Finished
            }
            Ok(_) => Next::Wait(self.settings.poll_interval),
            Err(err) if err.kind() == ErrorKind::TransientStorage => {
                warn!(error = %err, "Storage unavailable while applying accrual");
                Next::Wait(self.settings.failure_delay)
            }
            Err(err) => {
                error!(error = %err, "Accrual update rejected, abandoning order");
                Next::Abandoned
            }
        }
    }

    /// Sleeps for `wait`; returns false if shutdown interrupted it.
    async fn pause(&self, wait: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => false,
            () = tokio::time::sleep(wait) => true,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
