pub mod cache;
pub mod error;
pub mod persistence;
pub mod state;
pub mod traits;

pub use cache::MemoryStore;
pub use error::StoreError;
pub use persistence::FileStore;
pub use state::{ContextRef, DEFAULT_NAMESPACE, SessionState};
pub use traits::StateStore;
