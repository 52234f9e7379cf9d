use super::types::{PES_HEADER_SIZE, PES_START_CODE_PREFIX};
use crate::error::{Result, TsPesError};
use bytes::Bytes;
use std::fmt;

// Stream ids whose PES packets carry no optional header.
pub const STREAM_ID_PROGRAM_STREAM_MAP: u8 = 0xBC;
pub const STREAM_ID_PADDING_STREAM: u8 = 0xBE;
pub const STREAM_ID_PRIVATE_STREAM_2: u8 = 0xBF;
pub const STREAM_ID_ECM: u8 = 0xF0;
pub const STREAM_ID_EMM: u8 = 0xF1;
pub const STREAM_ID_DSMCC_STREAM: u8 = 0xF2;
pub const STREAM_ID_ITUT_H222_1_TYPE_E: u8 = 0xF8;
pub const STREAM_ID_PROGRAM_STREAM_DIRECTORY: u8 = 0xFF;

// Elementary stream id ranges
pub const STREAM_ID_AUDIO_MIN: u8 = 0xC0;
pub const STREAM_ID_AUDIO_MAX: u8 = 0xDF;
pub const STREAM_ID_VIDEO_MIN: u8 = 0xE0;
pub const STREAM_ID_VIDEO_MAX: u8 = 0xEF;

/// Returns `true` for the stream ids whose header stops after the packet length.
pub fn is_header_only_stream_id(stream_id: u8) -> bool {
    matches!(
        stream_id,
        STREAM_ID_PROGRAM_STREAM_MAP
            | STREAM_ID_PADDING_STREAM
            | STREAM_ID_PRIVATE_STREAM_2
            | STREAM_ID_ECM
            | STREAM_ID_EMM
            | STREAM_ID_PROGRAM_STREAM_DIRECTORY
            | STREAM_ID_DSMCC_STREAM
            | STREAM_ID_ITUT_H222_1_TYPE_E
    )
}

/// Packetized Elementary Stream (PES) header as used for reassembly.
///
/// Only the fixed prefix is decoded; the optional fields are skipped as a
/// block whose size is given by `header_length`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PESHeader {
    /// Start code prefix, 0x000001 for well-formed packets
    pub start_code_prefix: u32,
    /// Stream identifier indicating content type (video/audio/etc.)
    pub stream_id: u8,
    /// Declared PES packet length; 0 means unbounded
    pub packet_length: u16,
    /// Bytes from the start of the PES packet to the first payload byte
    pub header_length: u16,
}

impl PESHeader {
    /// Decodes a PES header from the start of a transport payload.
    ///
    /// The header length is 6 for the header-only stream ids. For every
    /// other id it is 7 when the byte at offset 6 is zero and
    /// `9 + data[8]` otherwise.
    ///
    /// # Errors
    /// Returns `InvalidData` when `data` is too short to hold the bytes the
    /// length derivation reads.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < PES_HEADER_SIZE {
            return Err(TsPesError::InvalidData("PES header too short".into()));
        }

        let start_code_prefix =
            (data[0] as u32) << 16 | (data[1] as u32) << 8 | data[2] as u32;
        let stream_id = data[3];
        let packet_length = u16::from_be_bytes([data[4], data[5]]);

        let header_length = if is_header_only_stream_id(stream_id) {
            PES_HEADER_SIZE as u16
        } else {
            let data_length = *data
                .get(6)
                .ok_or_else(|| TsPesError::InvalidData("PES header data length missing".into()))?;
            if data_length == 0 {
                PES_HEADER_SIZE as u16 + 1
            } else {
                let explicit = *data.get(8).ok_or_else(|| {
                    TsPesError::InvalidData("PES optional header truncated".into())
                })?;
                9 + explicit as u16
            }
        };

        Ok(Self {
            start_code_prefix,
            stream_id,
            packet_length,
            header_length,
        })
    }

    pub fn has_valid_start_code(&self) -> bool {
        self.start_code_prefix == PES_START_CODE_PREFIX
    }

    /// Unbounded packets declare a length of zero.
    pub fn is_unbounded(&self) -> bool {
        self.packet_length == 0
    }

    pub fn is_audio(&self) -> bool {
        (STREAM_ID_AUDIO_MIN..=STREAM_ID_AUDIO_MAX).contains(&self.stream_id)
    }

    pub fn is_video(&self) -> bool {
        (STREAM_ID_VIDEO_MIN..=STREAM_ID_VIDEO_MAX).contains(&self.stream_id)
    }
}

impl fmt::Display for PESHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PES: PSCP=0x{:06X} SID=0x{:02X} L={} HL={}",
            self.start_code_prefix, self.stream_id, self.packet_length, self.header_length
        )
    }
}

/// A fully reassembled PES unit: the header it started with and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PesUnit {
    /// PID the unit was carried on
    pub pid: u16,
    /// Header decoded from the start packet
    pub header: PESHeader,
    /// Payload bytes with the PES header stripped
    pub data: Bytes,
}

impl PesUnit {
    /// Total PES packet size, header included.
    pub fn packet_len(&self) -> usize {
        self.data.len() + self.header.header_length as usize
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
