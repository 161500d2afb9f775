pub mod cache;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod hybrid;
#[cfg(any(test, feature = "test-util"))]
pub mod mem;
pub mod metrics;
pub mod openai;
pub mod solr;
pub mod traits;

pub use cache::SchemaCache;
pub use catalog::CatalogService;
pub use config::Settings;
pub use engine::*;
#[cfg(any(test, feature = "test-util"))]
pub use mem::{InMemoryBackend, MemCollection, StaticEmbedder, StaticPlanSource};
pub use openai::{OpenAiEmbedder, OpenAiPlanner};
pub use solr::SolrClient;
pub use tokio_util::sync::CancellationToken;
pub use traits::*;
