pub mod memory;
pub mod models;
pub mod store;

pub use memory::MemoryStore;
pub use store::{PriceStore, SqliteStore};
