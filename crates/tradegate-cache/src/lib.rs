pub mod error;
pub mod memo;
pub mod reader;
pub mod sqlite;

pub use error::CacheError;
pub use memo::{Fingerprint, MemoCache};
pub use reader::SentimentReader;
pub use sqlite::SentimentStore;
