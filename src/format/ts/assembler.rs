use super::pes::{PESHeader, PesUnit};
use super::types::*;
use bytes::BytesMut;

/// Outcome of absorbing one transport packet.
///
/// None of these are errors; every outcome leaves the assembler ready for
/// the next packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssemblerResult {
    /// The packet belongs to another PID and was ignored
    UnexpectedPid,
    /// A continuation packet arrived while no unit was in progress
    NoActiveUnit,
    /// A continuity counter gap was seen; the unit in progress was dropped
    StreamPacketLost,
    /// A new unit began in this packet
    AssemblingStarted,
    /// Payload was appended to the unit in progress
    AssemblingContinue,
    /// The unit in progress reached its declared length
    AssemblingFinished,
    /// The packet carries only an adaptation field
    NoPayload,
    /// The payload could not hold the headers, or the buffer would overflow
    BufferOverflow,
}

/// Reassembles the PES units of a single PID from its transport packets.
///
/// The assembler is either idle or assembling. Payload is accumulated in a
/// buffer bounded by a fixed capacity; an append that would exceed it is
/// rejected as a whole and drops the unit. A completed unit is moved out of
/// the buffer and kept until [`take_unit`](Self::take_unit) is called.
#[derive(Debug)]
pub struct PesAssembler {
    pid: u16,
    buffer: BytesMut,
    capacity: usize,
    last_continuity_counter: Option<u8>,
    started: bool,
    pes_header: PESHeader,
    finished: Option<PesUnit>,
}

impl PesAssembler {
    /// Creates an assembler tracking `pid` with the default 200 000 byte buffer.
    pub fn new(pid: u16) -> Self {
        Self::with_capacity(pid, PES_BUFFER_CAPACITY)
    }

    pub fn with_capacity(pid: u16, capacity: usize) -> Self {
        Self {
            pid,
            buffer: BytesMut::with_capacity(capacity),
            capacity,
            last_continuity_counter: None,
            started: false,
            pes_header: PESHeader::default(),
            finished: None,
        }
    }

    /// Re-arms the assembler for `pid`, dropping all state and reallocating the buffer.
    pub fn init(&mut self, pid: u16) {
        *self = Self::with_capacity(pid, self.capacity);
    }

    /// Returns to idle and clears the buffer and the continuity record.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.started = false;
        self.pes_header = PESHeader::default();
        self.last_continuity_counter = None;
    }

    pub fn pid(&self) -> u16 {
        self.pid
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Bytes accumulated for the unit in progress.
    pub fn num_packet_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// The payload accumulated so far for the unit in progress.
    pub fn packet(&self) -> &[u8] {
        &self.buffer
    }

    pub fn pes_header(&self) -> &PESHeader {
        &self.pes_header
    }

    pub fn header_length(&self) -> u16 {
        self.pes_header.header_length
    }

    pub fn last_continuity_counter(&self) -> Option<u8> {
        self.last_continuity_counter
    }

    /// Takes the unit completed by the last `AssemblingFinished`, if any.
    pub fn take_unit(&mut self) -> Option<PesUnit> {
        self.finished.take()
    }

    /// Feeds one transport packet with its decoded header and adaptation field.
    ///
    /// `adaptation_field` is only consulted when the header announces one;
    /// passing `None` in that case is treated as a zero-length field.
    pub fn absorb_packet(
        &mut self,
        packet: &[u8; TS_PACKET_SIZE],
        header: &TSHeader,
        adaptation_field: Option<&AdaptationField>,
    ) -> AssemblerResult {
        if header.pid != self.pid {
            return AssemblerResult::UnexpectedPid;
        }

        let current = header.continuity_counter & 0x0f;
        if self.started && header.has_continuity_counter() {
            if let Some(last) = self.last_continuity_counter {
                if (last + 1) & 0x0f != current {
                    log::trace!(
                        "PID {}: continuity counter jumped from {} to {}",
                        self.pid,
                        last,
                        current
                    );
                    self.reset();
                    self.last_continuity_counter = Some(current);
                    return AssemblerResult::StreamPacketLost;
                }
            }
        }
        self.last_continuity_counter = Some(current);

        if !header.has_payload() {
            return AssemblerResult::NoPayload;
        }

        let adaptation_bytes = if header.has_adaptation_field() {
            adaptation_field.map_or(0, AdaptationField::num_bytes)
        } else {
            0
        };
        let payload = match packet.get(TS_HEADER_SIZE + adaptation_bytes..) {
            Some(payload) => payload,
            None => {
                log::trace!(
                    "PID {}: adaptation field of {} bytes leaves no payload",
                    self.pid,
                    adaptation_bytes
                );
                self.reset();
                return AssemblerResult::BufferOverflow;
            }
        };

        if header.payload_unit_start {
            self.start_unit(payload)
        } else {
            self.continue_unit(payload)
        }
    }

    fn start_unit(&mut self, payload: &[u8]) -> AssemblerResult {
        if self.started {
            // The previous unit never reached its declared length.
            self.buffer.clear();
            self.pes_header = PESHeader::default();
        }

        if payload.len() < PES_HEADER_SIZE {
            self.reset();
            return AssemblerResult::BufferOverflow;
        }

        let pes_header = match PESHeader::parse(payload) {
            Ok(pes_header) => pes_header,
            Err(e) => {
                log::trace!("PID {}: {}", self.pid, e);
                self.reset();
                return AssemblerResult::BufferOverflow;
            }
        };

        let header_length = pes_header.header_length as usize;
        if payload.len() < header_length {
            log::trace!(
                "PID {}: PES header needs {} bytes, payload has {}",
                self.pid,
                header_length,
                payload.len()
            );
            self.reset();
            return AssemblerResult::BufferOverflow;
        }

        if !self.append(&payload[header_length..]) {
            self.reset();
            return AssemblerResult::BufferOverflow;
        }

        self.pes_header = pes_header;
        self.started = true;
        AssemblerResult::AssemblingStarted
    }

    fn continue_unit(&mut self, payload: &[u8]) -> AssemblerResult {
        if !self.started {
            return AssemblerResult::NoActiveUnit;
        }

        if !self.append(payload) {
            self.reset();
            return AssemblerResult::BufferOverflow;
        }

        if self.is_complete() {
            self.finish();
            AssemblerResult::AssemblingFinished
        } else {
            AssemblerResult::AssemblingContinue
        }
    }

    /// The declared length counts the 6 prefix bytes that are never buffered.
    fn is_complete(&self) -> bool {
        let declared = self.pes_header.packet_length as usize;
        declared > 0
            && self.buffer.len() + self.pes_header.header_length as usize
                >= declared + PES_HEADER_SIZE
    }

    /// All-or-nothing append bounded by the capacity.
    fn append(&mut self, data: &[u8]) -> bool {
        if self.buffer.len() + data.len() > self.capacity {
            log::trace!(
                "PID {}: appending {} bytes to {} would exceed {}",
                self.pid,
                data.len(),
                self.buffer.len(),
                self.capacity
            );
            return false;
        }
        self.buffer.extend_from_slice(data);
        true
    }

    fn finish(&mut self) {
        if let Some(unit) = &self.finished {
            log::debug!(
                "PID {}: dropping {} byte unit that was never taken",
                self.pid,
                unit.len()
            );
        }
        self.finished = Some(PesUnit {
            pid: self.pid,
            header: self.pes_header,
            data: self.buffer.split().freeze(),
        });
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::parser::TSPacketParser;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    const PID: u16 = 136;

    /// Builds a packet whose payload region is exactly `payload_len` bytes,
    /// padding with an adaptation field when needed.
    fn ts_packet(pid: u16, start: bool, cc: u8, payload_len: usize, fill: u8) -> [u8; TS_PACKET_SIZE] {
        assert!(payload_len == TS_PAYLOAD_SIZE || payload_len <= TS_PAYLOAD_SIZE - 2);
        let mut packet = [fill; TS_PACKET_SIZE];
        let afc = if payload_len == TS_PAYLOAD_SIZE {
            AFC_PAYLOAD_ONLY
        } else {
            AFC_ADAPTATION_AND_PAYLOAD
        };
        packet[0] = TS_SYNC_BYTE;
        packet[1] = (start as u8) << 6 | (pid >> 8) as u8 & 0x1f;
        packet[2] = pid as u8;
        packet[3] = afc << 4 | (cc & 0x0f);
        if afc == AFC_ADAPTATION_AND_PAYLOAD {
            let af_len = TS_PAYLOAD_SIZE - payload_len - 1;
            packet[4] = af_len as u8;
            packet[5] = 0x00;
            for b in &mut packet[6..5 + af_len] {
                *b = 0xFF;
            }
        }
        packet
    }

    /// A start packet with a PES prefix of `stream_id` and `length` in front of the payload.
    fn start_packet(cc: u8, payload_len: usize, stream_id: u8, length: u16) -> [u8; TS_PACKET_SIZE] {
        let mut packet = ts_packet(PID, true, cc, payload_len, 0xAA);
        let offset = TS_PACKET_SIZE - payload_len;
        let [hi, lo] = length.to_be_bytes();
        packet[offset..offset + 6].copy_from_slice(&[0x00, 0x00, 0x01, stream_id, hi, lo]);
        packet
    }

    fn absorb(assembler: &mut PesAssembler, packet: &[u8; TS_PACKET_SIZE]) -> AssemblerResult {
        let parser = TSPacketParser::new();
        let header = parser.parse_header(packet).unwrap();
        let af = parser
            .parse_adaptation_field(packet, header.adaptation_field_control)
            .unwrap();
        assembler.absorb_packet(packet, &header, Some(&af))
    }

    #[test]
    fn test_unexpected_pid() {
        let mut assembler = PesAssembler::new(PID);
        let packet = ts_packet(137, true, 0, TS_PAYLOAD_SIZE, 0);
        assert_eq!(absorb(&mut assembler, &packet), AssemblerResult::UnexpectedPid);
        assert!(!assembler.is_started());
        assert_eq!(assembler.last_continuity_counter(), None);
    }

    #[test]
    fn test_two_packet_unit() {
        let mut assembler = PesAssembler::new(PID);
        // 178 + 184 buffered, 362 + 6 >= 362 + 6
        let first = start_packet(0, TS_PAYLOAD_SIZE, 0xBE, 362);
        let second = ts_packet(PID, false, 1, TS_PAYLOAD_SIZE, 0x55);

        assert_eq!(absorb(&mut assembler, &first), AssemblerResult::AssemblingStarted);
        assert_eq!(assembler.num_packet_bytes(), 178);
        assert_eq!(assembler.header_length(), 6);
        assert_eq!(absorb(&mut assembler, &second), AssemblerResult::AssemblingFinished);

        assert!(!assembler.is_started());
        assert_eq!(assembler.num_packet_bytes(), 0);
        let unit = assembler.take_unit().unwrap();
        assert_eq!(unit.pid, PID);
        assert_eq!(unit.len(), 362);
        assert_eq!(unit.packet_len(), 368);
        assert_eq!(&unit.data[..178], &[0xAA; 178][..]);
        assert_eq!(&unit.data[178..], &[0x55; 184][..]);
        assert!(assembler.take_unit().is_none());
    }

    #[test]
    fn test_one_byte_short_continues() {
        let mut assembler = PesAssembler::new(PID);
        let first = start_packet(0, TS_PAYLOAD_SIZE, 0xBE, 363);
        let second = ts_packet(PID, false, 1, TS_PAYLOAD_SIZE, 0x55);
        let third = ts_packet(PID, false, 2, 10, 0x66);

        assert_eq!(absorb(&mut assembler, &first), AssemblerResult::AssemblingStarted);
        assert_eq!(absorb(&mut assembler, &second), AssemblerResult::AssemblingContinue);
        assert_eq!(absorb(&mut assembler, &third), AssemblerResult::AssemblingFinished);
        assert_eq!(assembler.take_unit().unwrap().len(), 372);
    }

    #[test]
    fn test_audio_stream_header_length() {
        let mut assembler = PesAssembler::new(PID);
        // 0xC0 with a zero byte at offset 6: header length 7
        let mut first = start_packet(4, 100, 0xC0, 100);
        first[TS_PACKET_SIZE - 100 + 6] = 0x00;
        let second = ts_packet(PID, false, 5, 7, 0x11);

        assert_eq!(absorb(&mut assembler, &first), AssemblerResult::AssemblingStarted);
        assert_eq!(assembler.header_length(), 7);
        assert_eq!(assembler.num_packet_bytes(), 93);
        // 100 + 7 >= 100 + 6
        assert_eq!(absorb(&mut assembler, &second), AssemblerResult::AssemblingFinished);
        assert_eq!(assembler.take_unit().unwrap().len(), 100);
    }

    #[test]
    fn test_continuity_gap_reports_loss() {
        let mut assembler = PesAssembler::new(PID);
        let packets = [
            start_packet(3, TS_PAYLOAD_SIZE, 0xC0, 0),
            ts_packet(PID, false, 4, TS_PAYLOAD_SIZE, 0),
            ts_packet(PID, false, 5, TS_PAYLOAD_SIZE, 0),
            ts_packet(PID, false, 7, TS_PAYLOAD_SIZE, 0),
        ];
        let results: Vec<_> = packets.iter().map(|p| absorb(&mut assembler, p)).collect();
        assert_eq!(
            results,
            vec![
                AssemblerResult::AssemblingStarted,
                AssemblerResult::AssemblingContinue,
                AssemblerResult::AssemblingContinue,
                AssemblerResult::StreamPacketLost,
            ]
        );
        assert_eq!(assembler.num_packet_bytes(), 0);
        assert!(!assembler.is_started());
        assert_eq!(assembler.last_continuity_counter(), Some(7));

        // The next continuation has nothing to continue, and no second loss is reported
        let next = ts_packet(PID, false, 8, TS_PAYLOAD_SIZE, 0);
        assert_eq!(absorb(&mut assembler, &next), AssemblerResult::NoActiveUnit);
    }

    #[test]
    fn test_counter_wraps_modulo_16() {
        let mut assembler = PesAssembler::new(PID);
        assert_eq!(
            absorb(&mut assembler, &start_packet(15, TS_PAYLOAD_SIZE, 0xC0, 0)),
            AssemblerResult::AssemblingStarted
        );
        let next = ts_packet(PID, false, 0, TS_PAYLOAD_SIZE, 0);
        assert_eq!(absorb(&mut assembler, &next), AssemblerResult::AssemblingContinue);
    }

    #[test]
    fn test_scrambled_counter_is_not_checked() {
        let mut assembler = PesAssembler::new(PID);
        absorb(&mut assembler, &start_packet(0, TS_PAYLOAD_SIZE, 0xC0, 0));
        let mut next = ts_packet(PID, false, 9, TS_PAYLOAD_SIZE, 0);
        next[3] |= TSC_NO_CONTINUITY << 6;
        assert_eq!(absorb(&mut assembler, &next), AssemblerResult::AssemblingContinue);
        assert_eq!(assembler.last_continuity_counter(), Some(9));
    }

    #[test]
    fn test_restart_discards_previous_unit() {
        let mut assembler = PesAssembler::new(PID);
        absorb(&mut assembler, &start_packet(0, TS_PAYLOAD_SIZE, 0xBE, 1000));
        absorb(&mut assembler, &ts_packet(PID, false, 1, TS_PAYLOAD_SIZE, 0));
        assert_eq!(assembler.num_packet_bytes(), 362);

        assert_eq!(
            absorb(&mut assembler, &start_packet(2, 50, 0xBE, 50)),
            AssemblerResult::AssemblingStarted
        );
        assert_eq!(assembler.num_packet_bytes(), 44);
        assert_eq!(assembler.pes_header().packet_length, 50);
        assert_eq!(
            absorb(&mut assembler, &ts_packet(PID, false, 3, 20, 0)),
            AssemblerResult::AssemblingFinished
        );
        assert_eq!(assembler.take_unit().unwrap().len(), 64);
    }

    #[test]
    fn test_no_payload() {
        let mut assembler = PesAssembler::new(PID);
        let mut packet = ts_packet(PID, false, 0, 10, 0);
        packet[3] = AFC_ADAPTATION_ONLY << 4;
        assert_eq!(absorb(&mut assembler, &packet), AssemblerResult::NoPayload);
        assert_eq!(assembler.last_continuity_counter(), Some(0));
    }

    #[test]
    fn test_continuation_without_unit() {
        let mut assembler = PesAssembler::new(PID);
        let packet = ts_packet(PID, false, 0, TS_PAYLOAD_SIZE, 0);
        assert_eq!(absorb(&mut assembler, &packet), AssemblerResult::NoActiveUnit);
        assert_eq!(assembler.num_packet_bytes(), 0);
    }

    #[test]
    fn test_payload_too_short_for_pes_prefix() {
        let mut assembler = PesAssembler::new(PID);
        let packet = ts_packet(PID, true, 0, 3, 0);
        assert_eq!(absorb(&mut assembler, &packet), AssemblerResult::BufferOverflow);
        assert!(!assembler.is_started());
    }

    #[test]
    fn test_payload_too_short_for_pes_header() {
        let mut assembler = PesAssembler::new(PID);
        let mut packet = start_packet(0, TS_PAYLOAD_SIZE, 0xC0, 0);
        packet[4 + 6] = 0x80;
        packet[4 + 8] = 200;
        assert_eq!(absorb(&mut assembler, &packet), AssemblerResult::BufferOverflow);
        assert_eq!(assembler.num_packet_bytes(), 0);
    }

    #[test]
    fn test_oversized_adaptation_field() {
        let mut assembler = PesAssembler::new(PID);
        let packet = ts_packet(PID, false, 0, TS_PAYLOAD_SIZE, 0);
        let mut header = TSPacketParser::new().parse_header(&packet).unwrap();
        header.adaptation_field_control = AFC_ADAPTATION_AND_PAYLOAD;
        let af = AdaptationField {
            length: 200,
            ..Default::default()
        };
        assert_eq!(
            assembler.absorb_packet(&packet, &header, Some(&af)),
            AssemblerResult::BufferOverflow
        );
    }

    #[test]
    fn test_capacity_overflow() {
        let mut assembler = PesAssembler::new(PID);
        assert_eq!(
            absorb(&mut assembler, &start_packet(0, TS_PAYLOAD_SIZE, 0xBE, 0)),
            AssemblerResult::AssemblingStarted
        );

        // 178 + 1085 * 184 = 199_818; one more packet crosses 200_000
        for i in 1..=1085u32 {
            let packet = ts_packet(PID, false, (i % 16) as u8, TS_PAYLOAD_SIZE, 0);
            assert_eq!(absorb(&mut assembler, &packet), AssemblerResult::AssemblingContinue);
        }
        assert_eq!(assembler.num_packet_bytes(), 199_818);

        let packet = ts_packet(PID, false, (1086 % 16) as u8, TS_PAYLOAD_SIZE, 0);
        assert_eq!(absorb(&mut assembler, &packet), AssemblerResult::BufferOverflow);
        assert_eq!(assembler.num_packet_bytes(), 0);
        assert!(!assembler.is_started());
        assert!(assembler.take_unit().is_none());
    }

    #[test]
    fn test_unbounded_unit_never_finishes() {
        let mut assembler = PesAssembler::with_capacity(PID, 4096);
        absorb(&mut assembler, &start_packet(0, TS_PAYLOAD_SIZE, 0xE0, 0));
        for i in 1..20u8 {
            let packet = ts_packet(PID, false, i % 16, TS_PAYLOAD_SIZE, 0);
            assert_eq!(absorb(&mut assembler, &packet), AssemblerResult::AssemblingContinue);
        }
    }

    #[test]
    fn test_init_rearms_for_new_pid() {
        let mut assembler = PesAssembler::new(PID);
        absorb(&mut assembler, &start_packet(0, TS_PAYLOAD_SIZE, 0xC0, 0));
        assembler.init(256);
        assert_eq!(assembler.pid(), 256);
        assert!(!assembler.is_started());
        assert_eq!(assembler.num_packet_bytes(), 0);
        assert_eq!(assembler.capacity(), PES_BUFFER_CAPACITY);
    }

    #[quickcheck]
    fn prop_buffer_never_exceeds_capacity(steps: Vec<(bool, u8)>) -> bool {
        let mut assembler = PesAssembler::with_capacity(PID, 1000);
        let mut cc = 0u8;
        for (start, len) in steps {
            let len = match len as usize % 184 {
                183 => 184,
                n => n,
            };
            let packet = if start && len >= 6 {
                start_packet(cc, len, 0xBE, 0)
            } else {
                ts_packet(PID, start, cc, len, 0)
            };
            absorb(&mut assembler, &packet);
            if assembler.num_packet_bytes() > assembler.capacity() {
                return false;
            }
            cc = (cc + 1) % 16;
        }
        true
    }

    #[quickcheck]
    fn prop_counter_gap_is_lost(start_cc: u8, gap: u8) -> bool {
        let start_cc = start_cc % 16;
        let gap = 2 + gap % 15;
        let mut assembler = PesAssembler::new(PID);
        absorb(&mut assembler, &start_packet(start_cc, TS_PAYLOAD_SIZE, 0xC0, 0));
        let next = ts_packet(PID, false, (start_cc + gap) % 16, TS_PAYLOAD_SIZE, 0);
        absorb(&mut assembler, &next) == AssemblerResult::StreamPacketLost
            && assembler.num_packet_bytes() == 0
    }
}
