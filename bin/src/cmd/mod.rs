//! CLI subcommand modules.
//!
//! This module contains the implementations for all ac-core CLI subcommands.

pub(crate) mod init;
pub(crate) mod insert;
pub(crate) mod insert_csv;
pub(crate) mod ping;
pub(crate) mod query;
