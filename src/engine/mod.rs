pub mod crawler;
pub mod summary;
pub mod sync;

pub use crawler::{crawl, CrawlOptions, ExtensionFilter};
pub use summary::RunSummary;
pub use sync::{synchronize, SyncError, SyncOptions};
