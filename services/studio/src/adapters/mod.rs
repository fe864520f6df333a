pub mod file_store;
pub mod http_api;
pub mod memory_store;

pub use file_store::{FileStore, STORAGE_PREFIX};
pub use http_api::HttpLessonApi;
pub use memory_store::MemoryStore;
