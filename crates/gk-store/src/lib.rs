//! Persistence for gk-core gesture systems: single-file SQLite databases,
//! JSON wire bridging, asynchronous save/load sessions, and the TOML
//! engine configuration.

pub mod config;
pub mod error;
pub mod json_bridge;
pub mod schema;
pub mod session;
pub mod store;

pub use config::{EngineConfig, data_dir, default_base_dir};
pub use error::{Result, StoreError};
pub use session::{IO_CANCELLED, IoObserver, Session};
pub use store::{Store, import_system, load_part, save_part};
