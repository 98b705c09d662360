use std::{collections::HashMap, mem, sync::Arc, thread, time::Duration};

use coordinator::{Contribution, Coordinator, Snapshot};
use log::{debug, info, warn};
use tokio::task::{Id, JoinSet};
use worker::{Compute, ComputeErr, Evaluator};

use crate::{config::SchedulerConfig, error::SchedulerErr, metrics::SchedulerMetrics};

/// Where a worker currently is.
///
/// `Running` workers live inside their in-flight compute task and come back
/// with its result. `Parked` workers were throttled for outrunning the
/// staleness bound (or not yet dispatched) and are held here until a fresh
/// skew check clears them. `Failed` workers are out for good.
enum SlotState<C> {
    Running,
    Parked(C),
    Failed,
}

struct WorkerSlot<C> {
    update_count: u64,
    count_at_dispatch: u64,
    retries: u32,
    state: SlotState<C>,
}

impl<C> WorkerSlot<C> {
    fn parked(worker: C) -> Self {
        Self {
            update_count: 0,
            count_at_dispatch: 0,
            retries: 0,
            state: SlotState::Parked(worker),
        }
    }

    fn active(&self) -> bool {
        !matches!(self.state, SlotState::Failed)
    }
}

/// The staleness-bounded dispatch loop.
///
/// Drives rounds of: wait for any in-flight compute to finish, classify the
/// result against the staleness bound, collect a quorum of usable
/// contributions, hand them to the coordinator, and re-dispatch. A single
/// `(quorum_size, staleness_tolerance)` pair covers the whole spectrum from
/// barrier-synchronous to fully asynchronous training.
pub struct Scheduler<C: Compute + 'static> {
    coordinator: Coordinator,
    cfg: SchedulerConfig,
    snapshot: Arc<Snapshot>,
    slots: Vec<WorkerSlot<C>>,
    inflight: JoinSet<(C, Result<Contribution, ComputeErr>)>,
    by_task: HashMap<Id, usize>,
    evaluator: Option<Box<dyn Evaluator + Send>>,
    metrics: SchedulerMetrics,
}

impl<C: Compute + 'static> std::fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("cfg", &self.cfg)
            .field("slots", &self.slots.len())
            .field("inflight", &self.inflight.len())
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl<C: Compute + 'static> Scheduler<C> {
    /// Creates a new `Scheduler` over a worker pool.
    ///
    /// # Arguments
    /// * `coordinator` - The state owner contributions are applied to.
    /// * `workers` - The pool; worker ids must equal their index.
    /// * `cfg` - Dispatch tunables, validated here so a quorum that can
    ///   never fill is rejected before any round runs.
    pub fn new(
        coordinator: Coordinator,
        workers: Vec<C>,
        cfg: SchedulerConfig,
    ) -> Result<Self, SchedulerErr> {
        cfg.validate(workers.len())?;

        for (expected, worker) in workers.iter().enumerate() {
            if worker.id() != expected {
                return Err(SchedulerErr::WorkerNumbering {
                    expected,
                    got: worker.id(),
                });
            }
        }

        let snapshot = Arc::new(coordinator.snapshot());
        let slots = workers.into_iter().map(WorkerSlot::parked).collect();

        Ok(Self {
            coordinator,
            cfg,
            snapshot,
            slots,
            inflight: JoinSet::new(),
            by_task: HashMap::new(),
            evaluator: None,
            metrics: SchedulerMetrics::default(),
        })
    }

    /// Attaches an evaluator invoked every `eval_interval` rounds with the
    /// freshly applied snapshot. A side read only; it never touches
    /// scheduling state.
    pub fn with_evaluator(mut self, evaluator: Box<dyn Evaluator + Send>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Runs the dispatch loop for the configured iteration budget.
    ///
    /// # Returns
    /// The run's metrics, or the first fatal error: a broken model payload
    /// surfacing from apply, or quorum starvation after worker failures.
    pub async fn run(mut self) -> Result<SchedulerMetrics, SchedulerErr> {
        info!(
            workers = self.slots.len(),
            quorum = self.cfg.quorum_size,
            staleness_tolerance = self.cfg.staleness_tolerance;
            "starting dispatch loop"
        );

        for idx in 0..self.slots.len() {
            if let SlotState::Parked(worker) =
                mem::replace(&mut self.slots[idx].state, SlotState::Running)
            {
                self.dispatch(idx, worker, Duration::ZERO);
            }
        }

        for round in 0..self.cfg.iteration_budget {
            let (usable, admitted) = self.collect_quorum().await?;

            self.snapshot = Arc::new(self.coordinator.apply(usable)?);
            self.metrics.add_admitted(admitted.len());

            for (idx, worker) in admitted {
                self.slots[idx].update_count += 1;
                self.dispatch(idx, worker, Duration::ZERO);
            }

            self.release_parked();
            self.note_skew();
            self.metrics.bump_round();

            if round % self.cfg.eval_interval == 0
                && let Some(evaluator) = &mut self.evaluator
            {
                let accuracy = evaluator.accuracy(&self.snapshot.params);
                info!(
                    round = round,
                    version = self.snapshot.version,
                    accuracy = accuracy as f64;
                    "evaluation"
                );
            }
        }

        self.metrics.update_counts = self.slots.iter().map(|s| s.update_count).collect();
        Ok(self.metrics)
    }

    /// Consumes completions until a quorum of usable contributions is
    /// collected.
    ///
    /// Classification anchors on the count recorded when the request was
    /// dispatched, compared against the minimum taken at the top of the
    /// round, so completion order cannot change the verdict. Stale
    /// completions are discarded and their workers parked without a new
    /// request.
    async fn collect_quorum(
        &mut self,
    ) -> Result<(Vec<Contribution>, Vec<(usize, C)>), SchedulerErr> {
        let mut min_count = self.min_update_count().ok_or(SchedulerErr::Starved {
            active: 0,
            quorum: self.cfg.quorum_size,
        })?;

        let mut usable = Vec::with_capacity(self.cfg.quorum_size);
        let mut admitted = Vec::with_capacity(self.cfg.quorum_size);

        while usable.len() < self.cfg.quorum_size {
            let Some(joined) = self.inflight.join_next_with_id().await else {
                // Nothing left in flight: every live worker is parked. A
                // failure may have removed the worker anchoring the minimum,
                // so re-anchor on the surviving population and release before
                // deciding. If nothing becomes dispatchable the quorum can
                // never fill and blocking here would hang forever.
                min_count = self.min_update_count().ok_or(SchedulerErr::Starved {
                    active: 0,
                    quorum: self.cfg.quorum_size,
                })?;
                self.release_parked();

                if self.inflight.is_empty() {
                    return Err(SchedulerErr::Starved {
                        active: self.active_workers(),
                        quorum: self.cfg.quorum_size,
                    });
                }

                continue;
            };

            match joined {
                Ok((task_id, (worker, result))) => {
                    self.by_task.remove(&task_id);
                    let idx = worker.id();

                    match result {
                        Ok(contribution) => {
                            let slot = &mut self.slots[idx];
                            slot.retries = 0;

                            let lead = slot.count_at_dispatch - min_count;

                            if lead <= self.cfg.staleness_tolerance {
                                usable.push(contribution);
                                admitted.push((idx, worker));
                            } else {
                                slot.state = SlotState::Parked(worker);
                                self.metrics.bump_discarded();
                                debug!(
                                    worker_id = idx,
                                    lead = lead;
                                    "stale contribution discarded, worker throttled"
                                );
                            }
                        }
                        Err(err) => self.handle_compute_failure(idx, worker, err)?,
                    }
                }
                Err(join_err) => match self.by_task.remove(&join_err.id()) {
                    Some(idx) => {
                        warn!(worker_id = idx; "compute task died: {join_err}");
                        self.fail_worker(idx)?;
                    }
                    None => warn!("untracked compute task died: {join_err}"),
                },
            }
        }

        Ok((usable, admitted))
    }

    /// Spawns one compute request for `worker` onto the blocking pool,
    /// recording its pre-round count for later classification.
    ///
    /// # Arguments
    /// * `idx` - The worker's slot.
    /// * `worker` - The worker, moved into the task and handed back with
    ///   the result.
    /// * `delay` - Retry backoff, slept on the blocking pool so the
    ///   dispatch loop itself never waits on it.
    fn dispatch(&mut self, idx: usize, worker: C, delay: Duration) {
        let snapshot = Arc::clone(&self.snapshot);
        let slot = &mut self.slots[idx];
        slot.count_at_dispatch = slot.update_count;
        slot.state = SlotState::Running;

        let handle = self.inflight.spawn_blocking(move || {
            let mut worker = worker;

            if !delay.is_zero() {
                thread::sleep(delay);
            }

            let result = worker.compute(&snapshot);
            (worker, result)
        });

        self.by_task.insert(handle.id(), idx);
    }

    /// Re-dispatches every parked worker whose lead over the slowest
    /// dropped back within tolerance, with the current snapshot.
    ///
    /// Runs after every apply: admissions have just raised counts, so this
    /// fresh check is the moment a throttled worker can become eligible
    /// again.
    fn release_parked(&mut self) {
        let Some(min_count) = self.min_update_count() else {
            return;
        };

        for idx in 0..self.slots.len() {
            let slot = &mut self.slots[idx];
            let eligible = matches!(slot.state, SlotState::Parked(_))
                && slot.update_count - min_count <= self.cfg.staleness_tolerance;

            if !eligible {
                continue;
            }

            let SlotState::Parked(worker) = mem::replace(&mut slot.state, SlotState::Running)
            else {
                continue;
            };

            debug!(worker_id = idx; "skew cleared, re-dispatching throttled worker");
            self.dispatch(idx, worker, Duration::ZERO);
        }
    }

    /// Books a failed compute: bounded retry with exponential backoff, then
    /// permanent exclusion.
    fn handle_compute_failure(
        &mut self,
        idx: usize,
        worker: C,
        err: ComputeErr,
    ) -> Result<(), SchedulerErr> {
        let slot = &mut self.slots[idx];
        slot.retries += 1;
        let attempt = slot.retries;

        if attempt > self.cfg.retry_limit {
            warn!(worker_id = idx; "retry budget exhausted, excluding worker: {err}");
            drop(worker);
            return self.fail_worker(idx);
        }

        let backoff = self.cfg.retry_backoff(attempt);
        self.metrics.bump_retries();
        warn!(
            worker_id = idx,
            attempt = attempt;
            "compute failed, retrying in {backoff:?}: {err}"
        );
        self.dispatch(idx, worker, backoff);

        Ok(())
    }

    /// Excludes a worker from the run and checks the quorum can still fill.
    fn fail_worker(&mut self, idx: usize) -> Result<(), SchedulerErr> {
        self.slots[idx].state = SlotState::Failed;
        self.metrics.bump_failed();

        let active = self.active_workers();
        if active < self.cfg.quorum_size {
            return Err(SchedulerErr::Starved {
                active,
                quorum: self.cfg.quorum_size,
            });
        }

        Ok(())
    }

    fn min_update_count(&self) -> Option<u64> {
        self.slots
            .iter()
            .filter(|s| s.active())
            .map(|s| s.update_count)
            .min()
    }

    fn active_workers(&self) -> usize {
        self.slots.iter().filter(|s| s.active()).count()
    }

    fn note_skew(&mut self) {
        let min = self.min_update_count();
        let max = self
            .slots
            .iter()
            .filter(|s| s.active())
            .map(|s| s.update_count)
            .max();

        if let (Some(min), Some(max)) = (min, max) {
            let skew = max - min;
            self.metrics.observe_skew(skew);
            debug_assert!(
                skew <= self.cfg.staleness_tolerance.saturating_add(1),
                "skew {skew} exceeded tolerance bound"
            );
        }
    }
}
