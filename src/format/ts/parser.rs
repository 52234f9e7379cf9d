use super::types::*;
use crate::error::{Result, TsPesError};
use crate::utils::BitReader;

/// Stateless decoder for the transport packet header and adaptation field.
///
/// Neither method validates the sync byte; the caller is expected to have
/// aligned the 188-byte framing before trusting the decoded PID.
#[derive(Debug, Default, Clone, Copy)]
pub struct TSPacketParser;

impl TSPacketParser {
    pub fn new() -> Self {
        Self
    }

    /// Decodes the 4-byte header at the start of `data`.
    ///
    /// Only fails when fewer than four bytes are supplied.
    pub fn parse_header(&self, data: &[u8]) -> Result<TSHeader> {
        if data.len() < TS_HEADER_SIZE {
            return Err(TsPesError::InvalidData("TS packet too short".into()));
        }

        let mut reader = BitReader::new(&data[..TS_HEADER_SIZE]);
        Ok(TSHeader {
            sync_byte: reader.read_bits(8)? as u8,
            transport_error: reader.read_bit()?,
            payload_unit_start: reader.read_bit()?,
            transport_priority: reader.read_bit()?,
            pid: reader.read_bits(13)? as u16,
            scrambling_control: reader.read_bits(2)? as u8,
            adaptation_field_control: reader.read_bits(2)? as u8,
            continuity_counter: reader.read_bits(4)? as u8,
        })
    }

    /// Decodes the adaptation field that follows the header.
    ///
    /// When `afc` does not announce an adaptation field, or the announced
    /// length is zero, an all-clear field is returned and nothing past the
    /// length byte is read.
    pub fn parse_adaptation_field(&self, data: &[u8], afc: u8) -> Result<AdaptationField> {
        if afc != AFC_ADAPTATION_ONLY && afc != AFC_ADAPTATION_AND_PAYLOAD {
            return Ok(AdaptationField::default());
        }

        let length = *data
            .get(TS_HEADER_SIZE)
            .ok_or_else(|| TsPesError::InvalidData("Adaptation field length missing".into()))?;
        if length == 0 {
            return Ok(AdaptationField::default());
        }

        let mut reader = BitReader::new(&data[TS_HEADER_SIZE + 1..]);
        let mut field = AdaptationField {
            length,
            stuffing: length - 1,
            discontinuity: reader.read_flag()?,
            random_access: reader.read_flag()?,
            es_priority: reader.read_flag()?,
            pcr_flag: reader.read_flag()?,
            opcr_flag: reader.read_flag()?,
            splicing_point_flag: reader.read_flag()?,
            private_data_flag: reader.read_flag()?,
            extension_flag: reader.read_flag()?,
            pcr: None,
            opcr: None,
        };

        // Stuffing is bookkeeping only and wraps like the 8-bit field it mirrors.
        if field.has_pcr() {
            field.pcr = Some(read_clock_reference(&mut reader)?);
            field.stuffing = field.stuffing.wrapping_sub(6);
        }
        if field.has_opcr() {
            field.opcr = Some(read_clock_reference(&mut reader)?);
            field.stuffing = field.stuffing.wrapping_sub(6);
        }

        Ok(field)
    }
}

fn read_clock_reference(reader: &mut BitReader<'_>) -> Result<ClockReference> {
    if reader.available_bits() < 48 {
        return Err(TsPesError::InvalidData("Clock reference too short".into()));
    }
    Ok(ClockReference {
        base: reader.read_bits_u64(33)?,
        reserved: reader.read_bits(6)? as u8,
        extension: reader.read_bits(9)? as u16,
    })
}
