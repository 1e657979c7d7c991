pub mod dataset;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod joblog;
pub mod normalize;
pub mod page;
pub mod pagination;
pub mod publish;
pub mod render;
pub mod retry;
pub mod runtime;
pub mod settings;
pub mod strategies;
pub mod strategy;
pub mod template;

pub use dataset::{Dataset, ProductRow};
pub use error::ScraperError;
pub use fetch::{FetchRequest, HttpFetcher};
pub use joblog::{job_log_span, JobLogLayer};
pub use page::{PageResult, Payload};
pub use pagination::{PaginationPolicy, MAX_PAGES};
pub use publish::{
    BlobStore, CompletionNotifier, DirectoryBlobStore, HttpBlobStore, HttpNotifier,
    OutputArtifact, PublishError, Publisher,
};
pub use render::{HttpRenderService, NoRenderer, RenderedPageProvider};
pub use retry::RetryPolicy;
pub use runtime::{JobError, JobRuntime};
pub use settings::{FileSettingsSource, HttpSettingsSource, SettingsSource};
pub use strategies::StrategyRegistry;
pub use strategy::BrandStrategy;
