pub mod loaders;
pub mod outcome;
pub mod report;
pub mod repository;

pub use loaders::load_repositories;
pub use outcome::{ApplicationRef, FailureStage, RunOutcome};
pub use report::{BatchReport, ReportEntry};
pub use repository::{RepositoryDescriptor, RepositoryList};
