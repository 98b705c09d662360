pub mod data;
pub mod error;
pub mod model;
pub mod worker;

pub use data::{Batch, DataSource, InMemoryDataset, ShuffledLoader};
pub use error::{ComputeErr, ModelErr};
pub use model::{Evaluator, Model};
pub use worker::{Compute, Worker};
