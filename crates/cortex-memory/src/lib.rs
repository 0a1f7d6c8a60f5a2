pub mod db;
pub mod error;
pub mod store;

pub use db::open_durable_tier;
pub use error::MemoryError;
pub use store::{ContextValue, ConversationStore};
