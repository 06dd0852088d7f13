//! Fixed-length frame assembler for the transparent radio serial link.
//!
//! The radio module forwards the sensor's payload bytes verbatim with no
//! header, length, or checksum. Frames are recovered by counting bytes; a
//! silence longer than the configured gap ends whatever was in flight so a
//! dropped byte costs one frame instead of shifting every frame after it.
use bytes::BytesMut;
use std::time::{Duration, Instant};

pub struct FrameAssembler {
    buf: BytesMut,
    frame_len: usize,
    gap: Duration,
    last_byte: Option<Instant>,
}

impl FrameAssembler {
    pub fn new(frame_len: usize, gap: Duration) -> Self {
        Self {
            buf: BytesMut::with_capacity(frame_len * 4),
            frame_len: frame_len.max(1),
            gap,
            last_byte: None,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Bytes waiting for the rest of their frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Feed a chunk read at `now`. Returns every frame completed by it, in
    /// order. A partial frame left over from before a gap is returned first,
    /// short, so the decoder can reject it.
    pub fn push(&mut self, data: &[u8], now: Instant) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        if data.is_empty() {
            return frames;
        }
        if let Some(stale) = self.flush_stale(now) {
            frames.push(stale);
        }
        self.buf.extend_from_slice(data);
        self.last_byte = Some(now);

        while self.buf.len() >= self.frame_len {
            frames.push(self.buf.split_to(self.frame_len).to_vec());
        }
        frames
    }

    /// Hand back a partial frame once the line has been quiet for longer
    /// than the gap.
    pub fn flush_stale(&mut self, now: Instant) -> Option<Vec<u8>> {
        let last = self.last_byte?;
        if self.buf.is_empty() || now.saturating_duration_since(last) <= self.gap {
            return None;
        }
        self.last_byte = None;
        Some(self.buf.split().to_vec())
    }
}
