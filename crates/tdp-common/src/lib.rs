//! TDP Common Library
//!
//! Shared utilities for the TDP workspace members:
//!
//! - **Logging**: tracing subscriber setup with console/file targets
//! - **Checksums**: streaming file integrity hashes
//!
//! # Example
//!
//! ```no_run
//! use tdp_common::checksum::Checksum;
//!
//! fn fingerprint(path: &str) -> anyhow::Result<()> {
//!     let checksum = Checksum::from_file(path)?;
//!     tracing::info!(%checksum, "input fingerprinted");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod logging;
