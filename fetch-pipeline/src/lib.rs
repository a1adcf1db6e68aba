pub mod cache;
pub mod pipeline;
pub mod progress;

pub use cache::PreparedCache;
pub use pipeline::{FetchPipeline, FetchReport, FileUploader};
pub use progress::{FetchProgress, ProgressSender};
