pub mod config;
pub mod dispatch;
pub mod error;
pub mod evaluation;
pub mod evaluator;
pub mod model;
pub mod partition;
pub mod persist;
pub mod problem;
pub mod sampling;
pub mod session;
pub mod sobol;

pub use config::RunConfig;
pub use error::{Result, SensitivityErr};
pub use evaluation::EvalStats;
pub use evaluator::{Bound, BoundSide, Evaluator, Introspect, ModelSummary};
pub use model::FluxModel;
pub use partition::Layout;
pub use persist::Artifacts;
pub use problem::ProblemDescriptor;
pub use sampling::{Design, SaltelliSampler, Sampler};
pub use session::{Outcome, Plan, Session};
