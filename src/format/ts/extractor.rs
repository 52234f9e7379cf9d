use super::assembler::{AssemblerResult, PesAssembler};
use super::parser::TSPacketParser;
use super::types::*;
use crate::config::ExtractorConfig;
use crate::error::Result;
use crate::format::UnitSink;
use std::collections::HashMap;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader, BufWriter};

/// Counters collected over one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Frames read from the input, every PID included
    pub frames_read: usize,
    /// Frames carrying the tracked PID
    pub frames_for_pid: usize,
    /// Bytes discarded while searching for a sync byte
    pub resync_bytes: usize,
    pub units_written: usize,
    pub bytes_written: usize,
    results: HashMap<AssemblerResult, usize>,
}

impl ExtractStats {
    /// How many packets produced `result`.
    pub fn count(&self, result: AssemblerResult) -> usize {
        self.results.get(&result).copied().unwrap_or(0)
    }

    fn record(&mut self, result: AssemblerResult) {
        *self.results.entry(result).or_insert(0) += 1;
    }
}

/// Reads 188-byte frames from a byte stream and extracts one PID's PES payloads.
///
/// Framing is recovered by skipping to the next 0x47 whenever a frame does
/// not start with a sync byte. Completed units go to a [`UnitSink`].
pub struct PidExtractor<R: AsyncRead + Unpin + Send> {
    reader: R,
    parser: TSPacketParser,
    assembler: PesAssembler,
    max_packets: Option<usize>,
    stats: ExtractStats,
}

impl<R: AsyncRead + Unpin + Send> PidExtractor<R> {
    /// Creates an extractor for `pid` reading to end of stream.
    pub fn new(reader: R, pid: u16) -> Self {
        Self {
            reader,
            parser: TSPacketParser::new(),
            assembler: PesAssembler::new(pid),
            max_packets: None,
            stats: ExtractStats::default(),
        }
    }

    /// Stops after `max_packets` frames, counting frames of every PID.
    pub fn with_max_packets(mut self, max_packets: Option<usize>) -> Self {
        self.max_packets = max_packets;
        self
    }

    pub fn assembler(&self) -> &PesAssembler {
        &self.assembler
    }

    pub fn stats(&self) -> &ExtractStats {
        &self.stats
    }

    pub fn into_reader(self) -> R {
        self.reader
    }

    /// Reads until `buf` is full or the stream ends; returns the bytes read.
    async fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Reads the next sync-aligned frame, or `None` at end of stream.
    pub async fn read_frame(&mut self) -> Result<Option<[u8; TS_PACKET_SIZE]>> {
        let mut frame = [0u8; TS_PACKET_SIZE];
        let n = self.fill(&mut frame).await?;
        if n < TS_PACKET_SIZE {
            if n > 0 {
                log::warn!("Discarding {} trailing bytes of a partial frame", n);
            }
            return Ok(None);
        }

        let mut skipped = 0;
        while frame[0] != TS_SYNC_BYTE {
            let pos = frame
                .iter()
                .position(|&b| b == TS_SYNC_BYTE)
                .unwrap_or(TS_PACKET_SIZE);
            frame.copy_within(pos.., 0);
            skipped += pos;

            let kept = TS_PACKET_SIZE - pos;
            let n = self.fill(&mut frame[kept..]).await?;
            if n < pos {
                log::warn!("End of stream while resynchronizing after {} bytes", skipped);
                self.stats.resync_bytes += skipped;
                return Ok(None);
            }
        }

        if skipped > 0 {
            log::warn!("Skipped {} bytes to regain sync", skipped);
            self.stats.resync_bytes += skipped;
        }
        self.stats.frames_read += 1;
        Ok(Some(frame))
    }

    /// Decodes one frame, feeds it to the assembler and writes a completed unit to `sink`.
    pub async fn process_frame<S: UnitSink + ?Sized>(
        &mut self,
        frame: &[u8; TS_PACKET_SIZE],
        sink: &mut S,
    ) -> Result<AssemblerResult> {
        let header = self.parser.parse_header(frame)?;
        if header.pid != self.assembler.pid() {
            self.stats.record(AssemblerResult::UnexpectedPid);
            return Ok(AssemblerResult::UnexpectedPid);
        }

        self.stats.frames_for_pid += 1;
        log::trace!("Packet {:010}: {}", self.stats.frames_read, header);

        let adaptation_field = if header.has_adaptation_field() {
            let af = self
                .parser
                .parse_adaptation_field(frame, header.adaptation_field_control)?;
            log::trace!("{}", af);
            Some(af)
        } else {
            None
        };

        let result = self
            .assembler
            .absorb_packet(frame, &header, adaptation_field.as_ref());
        self.stats.record(result);

        let pid = self.assembler.pid();
        match result {
            AssemblerResult::AssemblingStarted => {
                log::info!("Assembling started: {}", self.assembler.pes_header());
            }
            AssemblerResult::AssemblingFinished => {
                if let Some(unit) = self.assembler.take_unit() {
                    log::info!(
                        "Assembling finished: PacketLen={} HeadLen={} DataLen={}",
                        unit.packet_len(),
                        unit.header.header_length,
                        unit.len()
                    );
                    if !unit.is_empty() {
                        sink.write_unit(&unit.data).await?;
                        self.stats.units_written += 1;
                        self.stats.bytes_written += unit.len();
                    }
                }
            }
            AssemblerResult::StreamPacketLost => {
                log::warn!("Stream packet lost for PID {}, unit dropped", pid);
            }
            AssemblerResult::BufferOverflow => {
                log::warn!("PES assembler buffer overflow for PID {}, unit dropped", pid);
            }
            AssemblerResult::NoActiveUnit => {
                log::debug!("PID {}: continuation packet with no unit in progress", pid);
            }
            AssemblerResult::AssemblingContinue
            | AssemblerResult::NoPayload
            | AssemblerResult::UnexpectedPid => {}
        }

        Ok(result)
    }

    /// Processes frames until end of stream or the packet limit, then flushes `sink`.
    pub async fn run<S: UnitSink + ?Sized>(&mut self, sink: &mut S) -> Result<ExtractStats> {
        loop {
            if let Some(max) = self.max_packets {
                if self.stats.frames_read >= max {
                    log::debug!("Reached the limit of {} packets", max);
                    break;
                }
            }

            match self.read_frame().await? {
                Some(frame) => {
                    self.process_frame(&frame, sink).await?;
                }
                None => {
                    log::debug!("End of transport stream");
                    break;
                }
            }
        }

        sink.flush().await?;
        Ok(self.stats.clone())
    }
}

/// Extracts the configured PID from `config.input_path` into `config.output_path`.
pub async fn extract_file(config: &ExtractorConfig) -> Result<ExtractStats> {
    config.validate()?;

    let input = File::open(&config.input_path).await?;
    let output = File::create(&config.output_path).await?;
    let mut sink = BufWriter::new(output);

    log::info!(
        "Extracting PID {} from {} into {}",
        config.pid,
        config.input_path.display(),
        config.output_path.display()
    );
    let mut extractor = PidExtractor::new(BufReader::new(input), config.pid)
        .with_max_packets(config.max_packets);
    extractor.run(&mut sink).await
}
