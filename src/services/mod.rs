pub mod container_runner;
pub mod progress;
pub mod registrar;

pub use container_runner::{AnalysisRunner, ContainerRunner, RunState};
pub use progress::{ProgressSink, TracingProgress};
pub use registrar::ApplicationRegistrar;
