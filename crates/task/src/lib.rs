//!
//! Shared task façade, error type and external-collaborator contracts for the
//! merge-and-shrink / pattern database core.
//!

mod clock;
mod error;
mod rng;
mod sas_task;
mod task_view;

pub use clock::Clock;
pub use clock::FakeClock;
pub use clock::MonotonicClock;
pub use error::PlannerError;
pub use error::Result;
pub use rng::Rng;
pub use sas_task::RawAxiom;
pub use sas_task::RawEffect;
pub use sas_task::RawOperator;
pub use sas_task::RawTask;
pub use sas_task::SasTask;
pub use task_view::Operator;
pub use task_view::OperatorId;
pub use task_view::TaskView;
pub use task_view::Value;
pub use task_view::VarId;
