pub mod repository_ctx;
pub mod repository_flow;

pub use repository_ctx::RepositoryCtx;
pub use repository_flow::RepositoryFlow;
