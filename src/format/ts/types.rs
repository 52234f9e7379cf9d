use crate::error::Result;
use bytes::{BufMut, BytesMut};
use std::fmt;
use std::time::Duration;

// Well-known PIDs
pub const PID_PAT: u16 = 0x0000;
pub const PID_CAT: u16 = 0x0001;
pub const PID_TSDT: u16 = 0x0002;
pub const PID_IPMT: u16 = 0x0003;
pub const PID_NIT: u16 = 0x0010;
pub const PID_SDT: u16 = 0x0011;
pub const PID_NULL: u16 = 0x1FFF;
pub const PID_MAX: u16 = 0x1FFF;

// Constants
pub const TS_SYNC_BYTE: u8 = 0x47;
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
pub const TS_PAYLOAD_SIZE: usize = TS_PACKET_SIZE - TS_HEADER_SIZE;
pub const PES_HEADER_SIZE: usize = 6;
pub const PES_START_CODE_PREFIX: u32 = 0x000001;
pub const PES_BUFFER_CAPACITY: usize = 200_000;

// Clocks
pub const PTS_HZ: u64 = 90_000;
pub const PCR_HZ: u64 = 27_000_000;
pub const PCR_BASE_MULTIPLIER: u64 = 300;

/// Adaptation field control values.
pub const AFC_PAYLOAD_ONLY: u8 = 0b01;
pub const AFC_ADAPTATION_ONLY: u8 = 0b10;
pub const AFC_ADAPTATION_AND_PAYLOAD: u8 = 0b11;

/// Scrambling control value for which the continuity counter is undefined.
pub const TSC_NO_CONTINUITY: u8 = 0b11;

/// Program clock reference as carried in the adaptation field:
/// 33-bit base at 90 kHz, 6 reserved bits, 9-bit extension at 27 MHz.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockReference {
    pub base: u64,
    pub reserved: u8,
    pub extension: u16,
}

impl ClockReference {
    /// The combined 27 MHz timestamp, `base * 300 + extension`.
    pub fn value(&self) -> u64 {
        self.base * PCR_BASE_MULTIPLIER + self.extension as u64
    }

    /// The combined value as elapsed time since the clock origin.
    pub fn to_duration(&self) -> Duration {
        pcr_to_time(self.value())
    }

    /// The 90 kHz base alone as elapsed time.
    pub fn base_to_duration(&self) -> Duration {
        pts_to_time(self.base)
    }
}

/// Decoded adaptation field of a single transport packet.
///
/// Flags are kept as 0/1 bytes, matching the wire layout of the flag byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdaptationField {
    /// Value of the adaptation_field_length byte
    pub length: u8,
    /// Bytes left after the flag byte and the clock references
    pub stuffing: u8,
    pub discontinuity: u8,
    pub random_access: u8,
    pub es_priority: u8,
    pub pcr_flag: u8,
    pub opcr_flag: u8,
    pub splicing_point_flag: u8,
    pub private_data_flag: u8,
    pub extension_flag: u8,
    pub pcr: Option<ClockReference>,
    pub opcr: Option<ClockReference>,
}

impl AdaptationField {
    /// Bytes the field occupies in the packet, including its length byte.
    ///
    /// A zero length reports zero bytes.
    pub fn num_bytes(&self) -> usize {
        if self.length == 0 {
            0
        } else {
            self.length as usize + 1
        }
    }

    pub fn has_pcr(&self) -> bool {
        self.pcr_flag != 0
    }

    pub fn has_opcr(&self) -> bool {
        self.opcr_flag != 0
    }
}

impl fmt::Display for AdaptationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AF: AF={} DC={} RA={} SP={} PR={} OR={} SF={} TP={} EX={}",
            self.length,
            self.discontinuity,
            self.random_access,
            self.es_priority,
            self.pcr_flag,
            self.opcr_flag,
            self.splicing_point_flag,
            self.private_data_flag,
            self.extension_flag
        )?;
        if let Some(pcr) = &self.pcr {
            write!(f, " PCR={}", pcr.value())?;
        }
        if let Some(opcr) = &self.opcr {
            write!(f, " OPCR={}", opcr.value())?;
        }
        Ok(())
    }
}

/// The fixed 4-byte transport packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TSHeader {
    pub sync_byte: u8, // Expected to be 0x47, not enforced here
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_control: u8,
    pub continuity_counter: u8,
}

impl Default for TSHeader {
    fn default() -> Self {
        Self {
            sync_byte: TS_SYNC_BYTE,
            transport_error: false,
            payload_unit_start: false,
            transport_priority: false,
            pid: 0,
            scrambling_control: 0,
            adaptation_field_control: AFC_PAYLOAD_ONLY,
            continuity_counter: 0,
        }
    }
}

impl TSHeader {
    pub fn has_adaptation_field(&self) -> bool {
        matches!(
            self.adaptation_field_control,
            AFC_ADAPTATION_ONLY | AFC_ADAPTATION_AND_PAYLOAD
        )
    }

    pub fn has_payload(&self) -> bool {
        matches!(
            self.adaptation_field_control,
            AFC_PAYLOAD_ONLY | AFC_ADAPTATION_AND_PAYLOAD
        )
    }

    /// The continuity counter is undefined when scrambling control is `11`.
    pub fn has_continuity_counter(&self) -> bool {
        self.scrambling_control != TSC_NO_CONTINUITY
    }

    pub fn has_valid_sync_byte(&self) -> bool {
        self.sync_byte == TS_SYNC_BYTE
    }

    pub fn is_null(&self) -> bool {
        self.pid == PID_NULL
    }

    /// The header as the big-endian 32-bit word it was read from.
    pub fn raw(&self) -> u32 {
        let mut word = (self.sync_byte as u32) << 24;
        if self.transport_error {
            word |= 1 << 23;
        }
        if self.payload_unit_start {
            word |= 1 << 22;
        }
        if self.transport_priority {
            word |= 1 << 21;
        }
        word |= ((self.pid & PID_MAX) as u32) << 8;
        word |= ((self.scrambling_control & 0x03) as u32) << 6;
        word |= ((self.adaptation_field_control & 0x03) as u32) << 4;
        word | (self.continuity_counter & 0x0f) as u32
    }

    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u32(self.raw());
        Ok(())
    }
}

impl fmt::Display for TSHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TS: SB={} E={} S={} T={} PID={} TSC={} AFC={} CC={}",
            self.sync_byte,
            self.transport_error as u8,
            self.payload_unit_start as u8,
            self.transport_priority as u8,
            self.pid,
            self.scrambling_control,
            self.adaptation_field_control,
            self.continuity_counter
        )
    }
}

// Time conversion utilities
pub fn pcr_to_time(pcr: u64) -> Duration {
    Duration::from_nanos(((pcr as u128 * 1_000_000_000) / PCR_HZ as u128) as u64)
}

pub fn time_to_pcr(time: Duration) -> u64 {
    (time.as_nanos() * PCR_HZ as u128 / 1_000_000_000) as u64
}

pub fn pts_to_time(pts: u64) -> Duration {
    Duration::from_nanos(((pts as u128 * 1_000_000_000) / PTS_HZ as u128) as u64)
}
