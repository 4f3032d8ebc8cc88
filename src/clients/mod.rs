pub mod highlight_client;

pub use highlight_client::HighlightClient;
