#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Gaussian affinity between point sets.
pub mod affinity;

/// Expectation step strategies.
pub mod comparer;

/// Error types for the registration pipeline.
pub mod error;

/// Reading and writing point matrices as text.
pub mod io;

/// Non-rigid deformation model.
pub mod nonrigid;

/// Centering and scaling of point set pairs.
pub mod normalize;

/// Statistics of the expectation step.
pub mod probabilities;

/// Rigid deformation model.
pub mod rigid;

/// Registration loop and its configuration.
pub mod runner;

/// Deformation model interface.
pub mod transform;

/// Point matrix helpers.
pub mod utils;

pub use comparer::{comparer_from_name, Comparer, DirectComparer};
pub use error::CpdError;
pub use nonrigid::{nonrigid, Nonrigid};
pub use normalize::{normalize, Normalization};
pub use probabilities::Probabilities;
pub use rigid::{rigid, Rigid};
pub use runner::{Registration, Runner, RunnerConfig};
pub use transform::{Transform, TransformResult};
pub use utils::PointMatrix;
