pub mod cache;
pub mod record_store;

pub use cache::{InMemoryCache, KeyedCache};
pub use record_store::{InMemoryRecordStore, RecordFilter, RecordOrder, RecordStore};
