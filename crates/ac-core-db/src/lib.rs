#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/alpha-crucible/ac-core/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! PostgreSQL storage for raw signals.

pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;
pub mod store;

pub use config::DatabaseConfig;
pub use error::{DbError, Result};
pub use memory::MemoryStore;
pub use postgres::DatabaseManager;
pub use store::{BatchOutcome, SignalStore};

pub use sqlx::postgres::PgSslMode;
