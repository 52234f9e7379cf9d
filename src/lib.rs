#![doc(html_root_url = "https://docs.rs/tspes/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tspes - single-PID elementary stream extraction
//!
//! `tspes` pulls one elementary stream out of an MPEG transport stream. It
//! decodes the fixed transport header and the adaptation field of each
//! 188-byte packet, follows the continuity counter of the tracked PID, and
//! reassembles the PES packets split across transport packets into
//! contiguous payload units.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! tspes = "0.1.0"
//! ```
//!
//! ```rust,no_run
//! use tspes::config::ExtractorConfig;
//! use tspes::format::ts::extract_file;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractorConfig::new(136)
//!         .with_input("example_new.ts")
//!         .with_output("PID136.mp2");
//!
//!     let stats = extract_file(&config).await?;
//!     println!("{} units, {} bytes", stats.units_written, stats.bytes_written);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `format`: the sink seam and the transport stream implementation
//!   - Packet header and adaptation field decoders
//!   - PES header decoding and the reassembly state machine
//!   - Async framing driver
//!
//! - `config`: extraction settings from defaults, file and environment
//!
//! - `error`: Error handling types and utilities
//!
//! - `utils`: Bitstream reading helpers
//!
/// Error types and utilities
pub mod error;

/// Media format implementations
pub mod format;

/// Common utilities and helper functions
pub mod utils;

/// Configuration module
pub mod config;

pub use error::{Result, TsPesError};
