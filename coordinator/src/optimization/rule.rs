use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{Adam, GradientDescent, GradientDescentWithMomentum, Optimizer};
use crate::error::{ConfigErr, SizeMismatchErr};

const MOMENTUM: f32 = 0.9;
const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const EPSILON: f32 = 1e-8;

/// Names the update policy applied to every tensor. Hyperparameters beyond
/// the learning rate use the conventional defaults above.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateRuleKind {
    Plain,
    Momentum,
    Adaptive,
}

impl FromStr for UpdateRuleKind {
    type Err = ConfigErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(UpdateRuleKind::Plain),
            "momentum" => Ok(UpdateRuleKind::Momentum),
            "adaptive" => Ok(UpdateRuleKind::Adaptive),
            other => Err(ConfigErr::UnknownUpdateRule(other.to_string())),
        }
    }
}

impl fmt::Display for UpdateRuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateRuleKind::Plain => f.write_str("plain"),
            UpdateRuleKind::Momentum => f.write_str("momentum"),
            UpdateRuleKind::Adaptive => f.write_str("adaptive"),
        }
    }
}

/// One tensor's update policy with its private accumulator state.
///
/// A closed set: the variant is fixed at coordinator construction, never
/// picked per call.
#[derive(Debug)]
pub enum UpdateRule {
    Plain(GradientDescent),
    Momentum(GradientDescentWithMomentum),
    Adaptive(Adam),
}

impl UpdateRule {
    /// Creates the rule instance for one tensor.
    ///
    /// # Arguments
    /// * `kind` - Which update policy to instantiate.
    /// * `len` - The tensor length, sizing any accumulators.
    /// * `learning_rate` - The step size coefficient.
    pub fn for_kind(kind: UpdateRuleKind, len: usize, learning_rate: f32) -> Self {
        match kind {
            UpdateRuleKind::Plain => UpdateRule::Plain(GradientDescent::new(learning_rate)),
            UpdateRuleKind::Momentum => UpdateRule::Momentum(GradientDescentWithMomentum::new(
                len,
                learning_rate,
                MOMENTUM,
            )),
            UpdateRuleKind::Adaptive => {
                UpdateRule::Adaptive(Adam::new(len, learning_rate, BETA1, BETA2, EPSILON))
            }
        }
    }
}

impl Optimizer for UpdateRule {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<(), SizeMismatchErr> {
        match self {
            UpdateRule::Plain(rule) => rule.update_params(grad, params),
            UpdateRule::Momentum(rule) => rule.update_params(grad, params),
            UpdateRule::Adaptive(rule) => rule.update_params(grad, params),
        }
    }
}
