use std::{env, error::Error, fs};

use coordinator::{AggregationRule, Coordinator, Parameters, Tensor, UpdateRuleKind};
use log::info;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Deserialize;
use worker::{Batch, Evaluator, InMemoryDataset, Model, ModelErr, ShuffledLoader, Worker};

use scheduler::{Scheduler, SchedulerConfig};

const DIM: usize = 8;
const TRAIN_EXAMPLES: usize = 4096;
const HELD_OUT_EXAMPLES: usize = 512;

/// Full training run configuration, loadable from a JSON file.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct TrainingConfig {
    batch_size: usize,
    num_workers: usize,
    quorum_size: usize,
    staleness_tolerance: u64,
    learning_rate: f32,
    aggregation_rule: AggregationRule,
    update_rule: UpdateRuleKind,
    iteration_budget: u64,
    eval_interval: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 128,
            num_workers: 5,
            quorum_size: 1,
            staleness_tolerance: 9999,
            learning_rate: 0.03,
            aggregation_rule: AggregationRule::Sum,
            update_rule: UpdateRuleKind::Plain,
            iteration_budget: 500,
            eval_interval: 10,
        }
    }
}

/// Least-squares linear model over one weight tensor.
struct LinearModel;

impl LinearModel {
    fn predict(weights: &[f32], row: &[f32]) -> f32 {
        row.iter().zip(weights).map(|(x, w)| x * w).sum()
    }
}

impl Model for LinearModel {
    fn gradient(
        &self,
        params: &Parameters,
        batch: &Batch,
    ) -> Result<Vec<Option<Tensor>>, ModelErr> {
        let weights = &params.tensors()[0];

        if weights.len() != batch.item_len {
            return Err(ModelErr::new(format!(
                "weight dim {} doesn't match feature dim {}",
                weights.len(),
                batch.item_len
            )));
        }

        let mut grad = vec![0.0f32; weights.len()];

        for i in 0..batch.len() {
            let row = batch.row(i);
            let residual = Self::predict(weights, row) - batch.ys[i];

            for (g, x) in grad.iter_mut().zip(row) {
                *g += 2.0 * residual * x;
            }
        }

        let scale = 1.0 / batch.len() as f32;
        grad.iter_mut().for_each(|g| *g *= scale);

        Ok(vec![Some(grad.into_boxed_slice())])
    }
}

/// Counts held-out predictions landing within a fixed tolerance.
struct HeldOutEvaluator {
    dataset: InMemoryDataset,
    tolerance: f32,
}

impl Evaluator for HeldOutEvaluator {
    fn accuracy(&mut self, params: &Parameters) -> f32 {
        let weights = &params.tensors()[0];

        let correct = (0..self.dataset.len())
            .filter(|&i| {
                let pred = LinearModel::predict(weights, self.dataset.row(i));
                (pred - self.dataset.label(i)).abs() <= self.tolerance
            })
            .count();

        100.0 * correct as f32 / self.dataset.len() as f32
    }
}

fn synthetic_dataset(rng: &mut StdRng, examples: usize, truth: &[f32]) -> InMemoryDataset {
    let mut xs = Vec::with_capacity(examples * truth.len());
    let mut ys = Vec::with_capacity(examples);

    for _ in 0..examples {
        let row: Vec<f32> = (0..truth.len()).map(|_| rng.random_range(-1.0..1.0)).collect();
        ys.push(LinearModel::predict(truth, &row));
        xs.extend(row);
    }

    InMemoryDataset::new(xs, ys, truth.len())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cfg: TrainingConfig = match env::args().nth(1) {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => TrainingConfig::default(),
    };

    info!("training config: {cfg:?}");

    let mut rng = StdRng::seed_from_u64(17);
    let truth: Vec<f32> = (0..DIM).map(|_| rng.random_range(-1.0..1.0)).collect();
    let train = synthetic_dataset(&mut rng, TRAIN_EXAMPLES, &truth);
    let held_out = synthetic_dataset(&mut rng, HELD_OUT_EXAMPLES, &truth);

    let init = Parameters::new(vec![vec![0.0; DIM].into_boxed_slice()]);
    let coordinator = Coordinator::new(
        init,
        cfg.learning_rate,
        cfg.aggregation_rule,
        cfg.update_rule,
    )?;

    let workers = (0..cfg.num_workers)
        .map(|id| {
            let loader = ShuffledLoader::new(train.clone(), cfg.batch_size, 100 + id as u64);
            Worker::new(id, loader, LinearModel)
        })
        .collect();

    let sched_cfg = SchedulerConfig::new(
        cfg.num_workers,
        cfg.quorum_size,
        cfg.staleness_tolerance,
        cfg.iteration_budget,
        cfg.eval_interval,
    );

    let evaluator = HeldOutEvaluator {
        dataset: held_out,
        tolerance: 0.1,
    };

    let metrics = Scheduler::new(coordinator.clone(), workers, sched_cfg)?
        .with_evaluator(Box::new(evaluator))
        .run()
        .await?;

    let last = coordinator.snapshot();

    println!("finished at version {}", last.version);
    println!(
        "rounds: {}, admitted: {}, discarded: {}, retries: {}, max skew: {}",
        metrics.rounds, metrics.admitted, metrics.discarded, metrics.retries, metrics.max_skew
    );
    println!("per-worker update counts: {:?}", metrics.update_counts);

    Ok(())
}
