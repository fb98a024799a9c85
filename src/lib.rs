//! Poll registry: polls and voters kept referentially consistent under
//! mutation, with one vote per user per poll and cascade cleanup on delete.
//!
//! State is saved through an injected [`Persistence`] adapter after every
//! mutating call. [`MemoryStore`] suits tests; [`SqliteStore`] keeps the
//! snapshot in a SQLite database.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod registry;
pub mod voting;

pub use config::StoreConfig;
pub use db::snapshot::{KeyValuePersistence, Persistence, Snapshot};
pub use db::{KeyValueStore, MemoryStore, SqliteStore};
pub use error::{RegistryError, Result, SnapshotError, StoreError};
pub use models::{Poll, PollId, PollOption, User, UserId};
pub use registry::{MemoryRegistry, PollRegistry, SharedRegistry, SqliteRegistry};
pub use voting::{PollResults, VoteCount};
