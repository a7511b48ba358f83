pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;
pub mod sweeper;

pub use error::CacheError;
pub use memory::MemoryResultCache;
pub use sqlite::SqliteResultStore;
pub use store::ResultStore;
pub use sweeper::sweep_loop;
