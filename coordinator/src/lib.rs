mod aggregation;
mod coordinator;
mod error;
mod optimization;
mod params;

pub use aggregation::AggregationRule;
pub use coordinator::Coordinator;
pub use error::{ApplyErr, ConfigErr, SizeMismatchErr};
pub use optimization::{
    Adam, GradientDescent, GradientDescentWithMomentum, Optimizer, UpdateRule, UpdateRuleKind,
};
pub use params::{Contribution, Parameters, Snapshot, Tensor, Version};
