//! # Referee Frame Synchronizer
//!
//! Byte-at-a-time parser locating frames in the referee byte stream.
//!
//! ```text
//! SeekSof -> LenLow -> LenHigh -> Seq -> HeaderCrc8 -> Body -> (frame) -> SeekSof
//! ```
//!
//! Any validation failure returns the parser to `SeekSof` and scanning resumes
//! with the next byte. An oversized declared length is rejected as soon as the
//! length is complete, and a bad header CRC8 is rejected before any body byte
//! is read.

use serde::Serialize;
use tracing::{debug, trace};

use super::protocol::{FRAME_MAX_SIZE, FRAME_OVERHEAD, HEADER_SIZE, SOF};
use crate::crc::{verify_crc8, verify_crc16};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    SeekSof,
    LenLow,
    LenHigh,
    Seq,
    HeaderCrc8,
    Body,
}

/// One verified frame, borrowed from the parser's scratch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefereeFrame<'a> {
    pub seq: u8,
    pub cmd_id: u16,
    pub payload: &'a [u8],
}

/// Counters kept by the synchronizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParserStats {
    pub frames_ok: u32,
    pub crc8_errors: u32,
    pub crc16_errors: u32,
    pub oversize: u32,
    pub seq_gaps: u32,
}

impl ParserStats {
    /// Header and body checksum failures together, saturating at `u32::MAX`.
    pub fn crc_errors(&self) -> u32 {
        self.crc8_errors.saturating_add(self.crc16_errors)
    }
}

/// Incremental frame parser.
#[derive(Debug, Clone)]
pub struct FrameSynchronizer {
    step: Step,
    index: usize,
    declared_len: u16,
    scratch: [u8; FRAME_MAX_SIZE],
    last_seq: Option<u8>,
    stats: ParserStats,
}

impl Default for FrameSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSynchronizer {
    pub fn new() -> Self {
        Self {
            step: Step::SeekSof,
            index: 0,
            declared_len: 0,
            scratch: [0; FRAME_MAX_SIZE],
            last_seq: None,
            stats: ParserStats::default(),
        }
    }

    /// Feed a chunk, calling `on_frame` for every verified frame.
    ///
    /// Returns the number of verified frames.
    pub fn feed<F>(&mut self, bytes: &[u8], mut on_frame: F) -> usize
    where
        F: FnMut(RefereeFrame<'_>),
    {
        let mut frames = 0;
        for &byte in bytes {
            if let Some(frame) = self.push(byte) {
                on_frame(frame);
                frames += 1;
            }
        }
        frames
    }

    /// Feed one byte; returns a frame when this byte completes one.
    pub fn push(&mut self, byte: u8) -> Option<RefereeFrame<'_>> {
        match self.step {
            Step::SeekSof => {
                if byte == SOF {
                    self.scratch[0] = byte;
                    self.index = 1;
                    self.step = Step::LenLow;
                }
            }
            Step::LenLow => {
                self.store(byte);
                self.declared_len = u16::from(byte);
                self.step = Step::LenHigh;
            }
            Step::LenHigh => {
                self.store(byte);
                self.declared_len |= u16::from(byte) << 8;

                if FRAME_OVERHEAD + usize::from(self.declared_len) > FRAME_MAX_SIZE {
                    self.stats.oversize = self.stats.oversize.wrapping_add(1);
                    trace!("Referee: declared length {} too large, resyncing", self.declared_len);
                    self.reset();
                } else {
                    self.step = Step::Seq;
                }
            }
            Step::Seq => {
                self.store(byte);
                self.step = Step::HeaderCrc8;
            }
            Step::HeaderCrc8 => {
                self.store(byte);

                if verify_crc8(&self.scratch[..HEADER_SIZE]) {
                    self.step = Step::Body;
                } else {
                    self.stats.crc8_errors = self.stats.crc8_errors.wrapping_add(1);
                    trace!("Referee: header CRC8 mismatch, resyncing");
                    self.reset();
                }
            }
            Step::Body => {
                self.store(byte);

                let total = self.frame_len();
                if self.index >= total {
                    self.reset();

                    if verify_crc16(&self.scratch[..total]) {
                        return Some(self.accept(total));
                    }

                    self.stats.crc16_errors = self.stats.crc16_errors.wrapping_add(1);
                    debug!("Referee: frame CRC16 mismatch");
                }
            }
        }

        None
    }

    pub fn stats(&self) -> &ParserStats {
        &self.stats
    }

    /// Whether the parser is between frames.
    pub fn is_seeking(&self) -> bool {
        self.step == Step::SeekSof
    }

    fn store(&mut self, byte: u8) {
        self.scratch[self.index] = byte;
        self.index += 1;
    }

    fn frame_len(&self) -> usize {
        FRAME_OVERHEAD + usize::from(self.declared_len)
    }

    fn reset(&mut self) {
        self.step = Step::SeekSof;
        self.index = 0;
    }

    fn accept(&mut self, total: usize) -> RefereeFrame<'_> {
        let seq = self.scratch[3];
        if let Some(last) = self.last_seq {
            if seq != last.wrapping_add(1) {
                self.stats.seq_gaps = self.stats.seq_gaps.wrapping_add(1);
                debug!("Referee: sequence gap {} -> {}", last, seq);
            }
        }
        self.last_seq = Some(seq);
        self.stats.frames_ok = self.stats.frames_ok.wrapping_add(1);

        RefereeFrame {
            seq,
            cmd_id: u16::from_le_bytes([self.scratch[HEADER_SIZE], self.scratch[HEADER_SIZE + 1]]),
            payload: &self.scratch[HEADER_SIZE + 2..total - 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::referee::encoder::encode_frame;

    fn frame(seq: u8, cmd_id: u16, payload: &[u8]) -> Vec<u8> {
        encode_frame(seq, cmd_id, payload).unwrap().to_vec()
    }

    fn collect(parser: &mut FrameSynchronizer, bytes: &[u8]) -> Vec<(u8, u16, Vec<u8>)> {
        let mut out = Vec::new();
        parser.feed(bytes, |f| out.push((f.seq, f.cmd_id, f.payload.to_vec())));
        out
    }

    #[test]
    fn test_crc_error_total_saturates() {
        let stats = ParserStats {
            crc8_errors: u32::MAX,
            crc16_errors: 3,
            ..ParserStats::default()
        };
        assert_eq!(stats.crc_errors(), u32::MAX);

        let stats = ParserStats {
            crc8_errors: 2,
            crc16_errors: 3,
            ..ParserStats::default()
        };
        assert_eq!(stats.crc_errors(), 5);
    }

    #[test]
    fn test_single_frame() {
        let mut parser = FrameSynchronizer::new();
        let frames = collect(&mut parser, &frame(0, 0x0002, &[1]));

        assert_eq!(frames, vec![(0, 0x0002, vec![1])]);
        assert!(parser.is_seeking());
        assert_eq!(parser.stats().frames_ok, 1);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut parser = FrameSynchronizer::new();
        let bytes = frame(5, 0x0201, &[7; 13]);

        let mut frames = Vec::new();
        for chunk in bytes.chunks(3) {
            frames.extend(collect(&mut parser, chunk));
        }
        assert_eq!(frames, vec![(5, 0x0201, vec![7; 13])]);
    }

    #[test]
    fn test_leading_garbage_is_skipped() {
        let mut parser = FrameSynchronizer::new();
        let mut bytes = vec![0x00, 0x13, 0xFF];
        bytes.extend(frame(1, 0x0003, &[0; 16]));

        assert_eq!(collect(&mut parser, &bytes).len(), 1);
    }

    #[test]
    fn test_corrupted_header_discards_one_frame() {
        let mut parser = FrameSynchronizer::new();
        let mut bad = frame(1, 0x0002, &[2]);
        bad[4] ^= 0xFF;

        let mut bytes = bad;
        bytes.extend(frame(2, 0x0002, &[1]));

        let frames = collect(&mut parser, &bytes);
        assert_eq!(frames, vec![(2, 0x0002, vec![1])]);
        assert_eq!(parser.stats().crc8_errors, 1);
        assert!(parser.is_seeking());
    }

    #[test]
    fn test_header_crc_failure_resets_before_body() {
        let mut parser = FrameSynchronizer::new();
        let mut bad = frame(1, 0x0002, &[2]);
        bad[4] ^= 0xFF;

        collect(&mut parser, &bad[..HEADER_SIZE]);
        assert!(parser.is_seeking());
    }

    #[test]
    fn test_corrupted_body_is_dropped() {
        let mut parser = FrameSynchronizer::new();
        let mut bad = frame(1, 0x0202, &[3; 14]);
        bad[10] ^= 0x01;

        let mut bytes = bad;
        bytes.extend(frame(2, 0x0202, &[4; 14]));

        let frames = collect(&mut parser, &bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].2, vec![4; 14]);
        assert_eq!(parser.stats().crc16_errors, 1);
    }

    #[test]
    fn test_oversized_length_resyncs_immediately() {
        let mut parser = FrameSynchronizer::new();
        // Declared length 248: 9 + 248 > 256
        collect(&mut parser, &[SOF, 248, 0]);
        assert!(parser.is_seeking());
        assert_eq!(parser.stats().oversize, 1);

        // Largest accepted length
        let max = vec![0x11; FRAME_MAX_SIZE - FRAME_OVERHEAD];
        let frames = collect(&mut parser, &frame(0, 0x0301, &max));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].2.len(), 247);
    }

    #[test]
    fn test_zero_length_frame() {
        let mut parser = FrameSynchronizer::new();
        let frames = collect(&mut parser, &frame(9, 0x0205, &[]));
        assert_eq!(frames, vec![(9, 0x0205, vec![])]);
    }

    #[test]
    fn test_sequence_gaps_are_counted_not_enforced() {
        let mut parser = FrameSynchronizer::new();
        let mut bytes = frame(10, 0x0001, &[0; 11]);
        bytes.extend(frame(11, 0x0001, &[0; 11]));
        bytes.extend(frame(14, 0x0001, &[0; 11]));
        bytes.extend(frame(255, 0x0001, &[0; 11]));
        bytes.extend(frame(0, 0x0001, &[0; 11]));

        assert_eq!(collect(&mut parser, &bytes).len(), 5);
        assert_eq!(parser.stats().seq_gaps, 2);
    }
}
