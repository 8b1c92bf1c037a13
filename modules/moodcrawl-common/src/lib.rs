pub mod config;
pub mod error;
pub mod lexicon;
pub mod types;

pub use config::{BrowserBackend, CrawlConfig};
pub use error::MoodcrawlError;
pub use types::*;
