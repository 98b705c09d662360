use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ApplyErr, ConfigErr},
    params::{Contribution, Tensor},
};

/// How multiple contribution payloads are combined into one aggregate,
/// elementwise per tensor position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationRule {
    Sum,
    Mean,
}

impl AggregationRule {
    /// Combines the payloads of `contributions` into one aggregate.
    ///
    /// A worker's `None` entry excludes it from that tensor position; if
    /// every contributor is absent at a position, the aggregate is `None`
    /// and that tensor is left unmodified this round. `Mean` divides by the
    /// number of present contributors per position.
    ///
    /// # Arguments
    /// * `contributions` - The admitted contributions, payloads already
    ///   checked to hold `arity` entries each.
    /// * `arity` - The number of tensor positions in the model.
    ///
    /// # Returns
    /// The combined payload, or a `ShapeMismatch` if two present entries at
    /// the same position disagree on length.
    pub(crate) fn combine(
        &self,
        contributions: &[Contribution],
        arity: usize,
    ) -> Result<Vec<Option<Tensor>>, ApplyErr> {
        let mut aggregate = Vec::with_capacity(arity);

        for position in 0..arity {
            let mut acc: Option<Vec<f32>> = None;
            let mut present = 0usize;

            for contribution in contributions {
                let Some(grad) = &contribution.payload[position] else {
                    continue;
                };

                match &mut acc {
                    None => {
                        acc = Some(grad.to_vec());
                        present = 1;
                    }
                    Some(acc) => {
                        if acc.len() != grad.len() {
                            return Err(ApplyErr::ShapeMismatch { position });
                        }

                        acc.iter_mut().zip(grad.iter()).for_each(|(a, g)| *a += g);
                        present += 1;
                    }
                }
            }

            let combined = acc.map(|mut acc| {
                if let AggregationRule::Mean = self {
                    let scale = 1.0 / present as f32;
                    acc.iter_mut().for_each(|a| *a *= scale);
                }

                acc.into_boxed_slice()
            });

            aggregate.push(combined);
        }

        Ok(aggregate)
    }
}

impl FromStr for AggregationRule {
    type Err = ConfigErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(AggregationRule::Sum),
            "mean" => Ok(AggregationRule::Mean),
            other => Err(ConfigErr::UnknownAggregationRule(other.to_string())),
        }
    }
}

impl fmt::Display for AggregationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationRule::Sum => f.write_str("sum"),
            AggregationRule::Mean => f.write_str("mean"),
        }
    }
}
