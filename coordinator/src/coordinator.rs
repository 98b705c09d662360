use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::{
    aggregation::AggregationRule,
    error::{ApplyErr, ConfigErr},
    optimization::{Optimizer, UpdateRule, UpdateRuleKind},
    params::{Contribution, Parameters, Snapshot, Version},
};

/// The versioned owner of the canonical model state.
///
/// All mutation happens inside `apply`'s critical section; every other task
/// only ever observes point-in-time snapshot copies. Cloning the coordinator
/// clones the handle, not the state.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Mutex<State>>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator").finish_non_exhaustive()
    }
}

struct State {
    params: Parameters,
    version: Version,
    aggregation: AggregationRule,
    rules: Vec<UpdateRule>,
}

impl Coordinator {
    /// Creates a new `Coordinator` owning `init`.
    ///
    /// One update-rule instance is created per tensor, sized to it, so
    /// accumulator state (velocity, moment estimates) lives exactly as long
    /// as the coordinator.
    ///
    /// # Arguments
    /// * `init` - The initial parameters, version 0.
    /// * `learning_rate` - The step size passed to every rule instance.
    /// * `aggregation` - How admitted payloads are combined.
    /// * `update_rule` - Which update policy to instantiate.
    ///
    /// # Returns
    /// A `ConfigErr` if the learning rate isn't positive or `init` is empty.
    pub fn new(
        init: Parameters,
        learning_rate: f32,
        aggregation: AggregationRule,
        update_rule: UpdateRuleKind,
    ) -> Result<Self, ConfigErr> {
        if !(learning_rate > 0.) {
            return Err(ConfigErr::NonPositiveLearningRate(learning_rate));
        }

        if init.is_empty() {
            return Err(ConfigErr::EmptyParameters);
        }

        let rules = init
            .tensors()
            .iter()
            .map(|t| UpdateRule::for_kind(update_rule, t.len(), learning_rate))
            .collect();

        let state = State {
            params: init,
            version: 0,
            aggregation,
            rules,
        };

        Ok(Self {
            inner: Arc::new(Mutex::new(state)),
        })
    }

    /// Returns a consistent copy of the current `(Parameters, Version)` pair.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.inner.lock();

        Snapshot {
            params: state.params.clone(),
            version: state.version,
        }
    }

    /// Aggregates `contributions`, steps every contributed-to tensor through
    /// its update rule, and advances the version by exactly one.
    ///
    /// Applies serialize on the internal lock: accumulator updates are not
    /// commutative and must never race.
    ///
    /// # Arguments
    /// * `contributions` - A non-empty batch of admitted contributions,
    ///   consumed by this call.
    ///
    /// # Returns
    /// The new `(Parameters, Version)` pair, or an `ApplyErr` on an empty
    /// batch or a payload that breaks the model contract.
    pub fn apply(&self, contributions: Vec<Contribution>) -> Result<Snapshot, ApplyErr> {
        if contributions.is_empty() {
            return Err(ApplyErr::NoContributions);
        }

        let mut state = self.inner.lock();
        let arity = state.params.len();

        for contribution in &contributions {
            if contribution.payload.len() != arity {
                return Err(ApplyErr::PayloadArity {
                    worker_id: contribution.worker_id,
                    got: contribution.payload.len(),
                    expected: arity,
                });
            }
        }

        let oldest = contributions
            .iter()
            .map(|c| c.version)
            .min()
            .unwrap_or(state.version);
        let version_lag = state.version.saturating_sub(oldest);

        let aggregate = state.aggregation.combine(&contributions, arity)?;

        let State { params, rules, .. } = &mut *state;

        params
            .tensors_mut()
            .par_iter_mut()
            .zip(rules.par_iter_mut())
            .zip(aggregate.into_par_iter())
            .enumerate()
            .try_for_each(|(position, ((tensor, rule), grad))| match grad {
                Some(grad) => rule
                    .update_params(&grad, tensor)
                    .map_err(|_| ApplyErr::ShapeMismatch { position }),
                None => Ok(()),
            })?;

        state.version += 1;

        debug!(
            version = state.version,
            contributions = contributions.len(),
            version_lag = version_lag;
            "applied aggregate"
        );

        Ok(Snapshot {
            params: state.params.clone(),
            version: state.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_params(value: f32) -> Parameters {
        Parameters::new(vec![vec![value].into_boxed_slice()])
    }

    fn unit_contribution(worker_id: usize, version: Version) -> Contribution {
        Contribution {
            worker_id,
            payload: vec![Some(vec![1.0].into_boxed_slice())],
            version,
        }
    }

    #[test]
    fn construction_rejects_bad_config() {
        let err = Coordinator::new(
            scalar_params(0.),
            0.0,
            AggregationRule::Sum,
            UpdateRuleKind::Plain,
        )
        .unwrap_err();
        assert_eq!(err, ConfigErr::NonPositiveLearningRate(0.0));

        let err = Coordinator::new(
            Parameters::new(Vec::new()),
            0.1,
            AggregationRule::Sum,
            UpdateRuleKind::Plain,
        )
        .unwrap_err();
        assert_eq!(err, ConfigErr::EmptyParameters);
    }

    #[test]
    fn each_apply_bumps_the_version_by_one() {
        let coordinator = Coordinator::new(
            scalar_params(10.0),
            1.0,
            AggregationRule::Sum,
            UpdateRuleKind::Plain,
        )
        .unwrap();

        assert_eq!(coordinator.snapshot().version, 0);

        for expected in 1..=5 {
            let before = coordinator.snapshot().version;
            let after = coordinator
                .apply(vec![unit_contribution(0, before)])
                .unwrap();
            assert_eq!(after.version, before + 1);
            assert_eq!(after.version, expected);
        }
    }

    #[test]
    fn summed_unit_gradients_walk_the_expected_trace() {
        // Two workers each contributing 1.0 under sum + plain descent with
        // lr 1.0 subtract 2.0 per round: 10 -> 8 -> 6 -> 4.
        let coordinator = Coordinator::new(
            scalar_params(10.0),
            1.0,
            AggregationRule::Sum,
            UpdateRuleKind::Plain,
        )
        .unwrap();

        let mut trace = Vec::new();

        for round in 0..3 {
            let snapshot = coordinator
                .apply(vec![
                    unit_contribution(0, round),
                    unit_contribution(1, round),
                ])
                .unwrap();
            trace.push(snapshot.params.tensors()[0][0]);
        }

        assert_eq!(trace, vec![8.0, 6.0, 4.0]);
    }

    #[test]
    fn all_absent_tensors_are_left_unmodified() {
        let params = Parameters::new(vec![
            vec![1.0].into_boxed_slice(),
            vec![2.0].into_boxed_slice(),
        ]);
        let coordinator =
            Coordinator::new(params, 1.0, AggregationRule::Sum, UpdateRuleKind::Plain).unwrap();

        let contribution = Contribution {
            worker_id: 0,
            payload: vec![Some(vec![1.0].into_boxed_slice()), None],
            version: 0,
        };

        let snapshot = coordinator.apply(vec![contribution]).unwrap();

        assert_eq!(snapshot.params.tensors()[0][0], 0.0);
        assert_eq!(snapshot.params.tensors()[1][0], 2.0);
    }

    #[test]
    fn empty_and_malformed_applies_are_rejected() {
        let coordinator = Coordinator::new(
            scalar_params(0.0),
            1.0,
            AggregationRule::Sum,
            UpdateRuleKind::Plain,
        )
        .unwrap();

        assert_eq!(
            coordinator.apply(Vec::new()).unwrap_err(),
            ApplyErr::NoContributions
        );

        let malformed = Contribution {
            worker_id: 3,
            payload: Vec::new(),
            version: 0,
        };
        assert_eq!(
            coordinator.apply(vec![malformed]).unwrap_err(),
            ApplyErr::PayloadArity {
                worker_id: 3,
                got: 0,
                expected: 1
            }
        );
    }

    #[test]
    fn snapshots_are_isolated_copies() {
        let coordinator = Coordinator::new(
            scalar_params(5.0),
            1.0,
            AggregationRule::Sum,
            UpdateRuleKind::Plain,
        )
        .unwrap();

        let before = coordinator.snapshot();
        coordinator.apply(vec![unit_contribution(0, 0)]).unwrap();

        // The earlier snapshot must not observe the apply.
        assert_eq!(before.params.tensors()[0][0], 5.0);
        assert_eq!(before.version, 0);
    }
}
