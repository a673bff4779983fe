#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    InMemorySessionCache, InMemorySessionStore, SessionCache, SessionRecord, SessionStore,
    Storage, StorageError,
};
pub use sqlite::{SqliteInitError, SqliteSessionStore};
