//! # MPEG Transport Stream (TS) PES Extraction
//!
//! This module pulls one elementary stream out of an MPEG transport stream:
//!
//! - TS packet header and adaptation field decoding, including PCR/OPCR
//! - PES header decoding
//! - PES reassembly across packets with continuity checking
//! - An async driver that frames a byte stream and writes payloads to a sink
//!
//! ## Example Usage
//!
//! ### Feeding packets by hand
//!
//! ```rust
//! use tspes::format::ts::{AssemblerResult, PesAssembler, TSPacketParser, TS_PACKET_SIZE};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let parser = TSPacketParser::new();
//! let mut assembler = PesAssembler::new(136);
//!
//! let mut packet = [0xFFu8; TS_PACKET_SIZE];
//! packet[..4].copy_from_slice(&[0x47, 0x00, 0x64, 0x10]); // PID 100
//!
//! let header = parser.parse_header(&packet)?;
//! let result = assembler.absorb_packet(&packet, &header, None);
//! assert_eq!(result, AssemblerResult::UnexpectedPid);
//! # Ok(())
//! # }
//! ```
//!
//! ### Extracting from a stream
//!
//! ```rust,no_run
//! use tspes::format::ts::PidExtractor;
//! use tokio::fs::File;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let input = File::open("example_new.ts").await?;
//!     let mut output = File::create("PID136.mp2").await?;
//!
//!     let mut extractor = PidExtractor::new(input, 136);
//!     let stats = extractor.run(&mut output).await?;
//!     println!("wrote {} units", stats.units_written);
//!     Ok(())
//! }
//! ```

/// PES reassembly state machine
pub mod assembler;

/// Async framing driver writing completed units to a sink
pub mod extractor;

/// Header and adaptation field decoding
pub mod parser;

/// PES header decoding and reassembled units
pub mod pes;

/// Core TS types and constants
pub mod types;

// Re-export commonly used types and constants
pub use assembler::{AssemblerResult, PesAssembler};
pub use extractor::{extract_file, ExtractStats, PidExtractor};
pub use parser::TSPacketParser;
pub use pes::{PESHeader, PesUnit};
pub use types::{
    AdaptationField,
    ClockReference,
    TSHeader,
    PES_BUFFER_CAPACITY,
    PID_NULL,
    TS_PACKET_SIZE,
    TS_SYNC_BYTE,
};
