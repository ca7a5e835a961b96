pub mod client;
pub mod models;

use async_trait::async_trait;

pub use client::DataFeedClient;
pub use models::{DataPoint, FeedError};

/// Anything the sync loop can pull a fresh batch of records from.
///
/// The production implementation is [`DataFeedClient`]; tests substitute
/// in-memory fakes.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_data(&self) -> Result<Vec<DataPoint>, FeedError>;
}
