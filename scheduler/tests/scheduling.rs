use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use coordinator::{
    AggregationRule, Contribution, Coordinator, Parameters, Snapshot, UpdateRuleKind,
};
use scheduler::{Scheduler, SchedulerConfig, SchedulerErr};
use worker::{Compute, ComputeErr, Evaluator};

/// A compute source with a rigged duration, producing unit gradients.
struct ScriptedWorker {
    id: usize,
    delay: Duration,
    computed: Arc<AtomicU64>,
}

impl ScriptedWorker {
    fn pool(delays_ms: &[u64]) -> (Vec<ScriptedWorker>, Arc<AtomicU64>) {
        let computed = Arc::new(AtomicU64::new(0));
        let pool = delays_ms
            .iter()
            .enumerate()
            .map(|(id, &ms)| ScriptedWorker {
                id,
                delay: Duration::from_millis(ms),
                computed: Arc::clone(&computed),
            })
            .collect();

        (pool, computed)
    }
}

impl Compute for ScriptedWorker {
    fn id(&self) -> usize {
        self.id
    }

    fn compute(&mut self, snapshot: &Snapshot) -> Result<Contribution, ComputeErr> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        self.computed.fetch_add(1, Ordering::Relaxed);

        Ok(Contribution {
            worker_id: self.id,
            payload: vec![Some(vec![1.0].into_boxed_slice())],
            version: snapshot.version,
        })
    }
}

/// Evaluator recording the scalar parameter at every invocation.
struct RecordingEvaluator {
    trace: Arc<Mutex<Vec<f32>>>,
}

impl Evaluator for RecordingEvaluator {
    fn accuracy(&mut self, params: &Parameters) -> f32 {
        self.trace.lock().unwrap().push(params.tensors()[0][0]);
        0.0
    }
}

fn scalar_coordinator(start: f32, learning_rate: f32) -> Coordinator {
    Coordinator::new(
        Parameters::new(vec![vec![start].into_boxed_slice()]),
        learning_rate,
        AggregationRule::Sum,
        UpdateRuleKind::Plain,
    )
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_unit_workers_walk_the_expected_trace() {
    // sum + plain descent with lr 1.0 and two unit gradients per round
    // subtracts 2.0 each apply: 10 -> 8 -> 6 -> 4.
    let coordinator = scalar_coordinator(10.0, 1.0);
    let (pool, _) = ScriptedWorker::pool(&[0, 0]);
    let trace = Arc::new(Mutex::new(Vec::new()));

    let cfg = SchedulerConfig::new(2, 2, 0, 3, 1);
    let metrics = Scheduler::new(coordinator, pool, cfg)
        .unwrap()
        .with_evaluator(Box::new(RecordingEvaluator {
            trace: Arc::clone(&trace),
        }))
        .run()
        .await
        .unwrap();

    assert_eq!(*trace.lock().unwrap(), vec![8.0, 6.0, 4.0]);
    assert_eq!(metrics.rounds, 3);
    assert_eq!(metrics.admitted, 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_quorum_zero_tolerance_is_a_barrier() {
    // Staggered speeds, but every round needs all four workers: counts
    // stay equal after every apply and nothing is ever discarded.
    let coordinator = scalar_coordinator(0.0, 0.1);
    let (pool, _) = ScriptedWorker::pool(&[0, 3, 6, 9]);

    let cfg = SchedulerConfig::new(4, 4, 0, 5, 100);
    let metrics = Scheduler::new(coordinator, pool, cfg)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(metrics.update_counts, vec![5, 5, 5, 5]);
    assert_eq!(metrics.discarded, 0);
    assert_eq!(metrics.max_skew, 0);
    assert_eq!(metrics.admitted, 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn huge_tolerance_never_discards() {
    // With the bound far beyond any reachable skew the scheduler takes the
    // first completion every round, first-ready-first-served.
    let coordinator = scalar_coordinator(0.0, 0.1);
    let (pool, _) = ScriptedWorker::pool(&[1, 15, 40]);

    let cfg = SchedulerConfig::new(3, 1, 1_000_000, 10, 100);
    let metrics = Scheduler::new(coordinator, pool, cfg)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(metrics.discarded, 0);
    assert_eq!(metrics.rounds, 10);
    assert_eq!(metrics.admitted, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn skew_never_exceeds_tolerance_plus_one() {
    // Two fast workers against one slow one: the fast pair must be
    // throttled once they lead the slow worker by more than the tolerance.
    let coordinator = scalar_coordinator(0.0, 0.1);
    let (pool, _) = ScriptedWorker::pool(&[1, 1, 40]);

    let cfg = SchedulerConfig::new(3, 1, 1, 20, 100);
    let metrics = Scheduler::new(coordinator, pool, cfg)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(
        metrics.max_skew <= 2,
        "observed skew {} above tolerance + 1",
        metrics.max_skew
    );
    assert!(metrics.discarded > 0, "fast workers were never throttled");

    let min = metrics.update_counts.iter().min().unwrap();
    let max = metrics.update_counts.iter().max().unwrap();
    assert!(max - min <= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn quorum_of_one_keeps_equal_workers_in_step() {
    let coordinator = scalar_coordinator(0.0, 0.1);
    let (pool, _) = ScriptedWorker::pool(&[0, 0, 0]);

    let cfg = SchedulerConfig::new(3, 1, 0, 30, 100);
    let metrics = Scheduler::new(coordinator, pool, cfg)
        .unwrap()
        .run()
        .await
        .unwrap();

    let min = metrics.update_counts.iter().min().unwrap();
    let max = metrics.update_counts.iter().max().unwrap();
    assert!(max - min <= 1, "counts {:?} drifted", metrics.update_counts);

    assert_eq!(metrics.update_counts.iter().sum::<u64>(), 30);
    assert_eq!(metrics.admitted, 30);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_consumed_completion_is_admitted_or_discarded() {
    let coordinator = scalar_coordinator(0.0, 0.1);
    let (pool, computed) = ScriptedWorker::pool(&[1, 1]);

    let cfg = SchedulerConfig::new(2, 2, 0, 10, 100);
    let metrics = Scheduler::new(coordinator, pool, cfg)
        .unwrap()
        .run()
        .await
        .unwrap();

    // Barrier mode: every completion the scheduler consumed was admitted,
    // none doubly counted, and each admission incremented exactly one
    // worker count.
    assert_eq!(metrics.admitted, 20);
    assert_eq!(metrics.discarded, 0);
    assert_eq!(metrics.update_counts.iter().sum::<u64>(), 20);
    assert!(computed.load(Ordering::Relaxed) >= 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn evaluator_fires_every_interval() {
    let coordinator = scalar_coordinator(0.0, 0.1);
    let (pool, _) = ScriptedWorker::pool(&[0, 0]);
    let trace = Arc::new(Mutex::new(Vec::new()));

    // Rounds 0, 3, 6 and 9 of a 10-round budget.
    let cfg = SchedulerConfig::new(2, 2, 0, 10, 3);
    Scheduler::new(coordinator, pool, cfg)
        .unwrap()
        .with_evaluator(Box::new(RecordingEvaluator {
            trace: Arc::clone(&trace),
        }))
        .run()
        .await
        .unwrap();

    assert_eq!(trace.lock().unwrap().len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oversized_quorum_is_rejected_at_construction() {
    let coordinator = scalar_coordinator(0.0, 0.1);
    let (pool, _) = ScriptedWorker::pool(&[0, 0]);

    let cfg = SchedulerConfig::new(2, 3, 0, 10, 1);
    let err = Scheduler::new(coordinator, pool, cfg).unwrap_err();

    assert!(matches!(
        err,
        SchedulerErr::InvalidQuorum {
            quorum: 3,
            workers: 2
        }
    ));
}
