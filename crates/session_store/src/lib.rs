//! Persistence of the host-issued session token and the backend-issued
//! conversation thread token.

mod error;
mod memory;
mod persistence;
mod schema;
mod store;

pub use error::SessionStoreError;
pub use memory::MemorySessionStore;
pub use persistence::{Clock, SessionPersistence, ThreadToken};
pub use schema::{SessionDocument, SESSION_DOCUMENT_VERSION};
pub use store::FileSessionStore;
