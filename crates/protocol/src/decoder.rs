//! Incremental decoding of notification streams.

use crate::codes::HEADER_LEN;
use crate::error::{ProtocolError, Result};
use crate::response::{decode_frame, Response};

/// Accumulates notification chunks and yields complete frames.
///
/// A frame may span several notifications on links with a small MTU, and one
/// notification may carry several frames. Malformed frames are skipped and
/// reported; the decoder never stalls on them.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw notification bytes
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete frame, or `None` when more bytes are needed
    pub fn next_frame(&mut self) -> Option<Result<Response>> {
        match decode_frame(&self.buf) {
            Ok((response, used)) => {
                self.buf.drain(..used);
                Some(Ok(response))
            }
            Err(ProtocolError::Incomplete { .. }) => None,
            Err(err) => {
                let skip = (HEADER_LEN + usize::from(self.buf[1])).min(self.buf.len());
                self.buf.drain(..skip);
                Some(Err(err))
            }
        }
    }

    /// Push a chunk and drain every frame it completes
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Result<Response>> {
        self.push(chunk);
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Bytes waiting for the rest of their frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partial frame, e.g. after a request timed out
    pub fn clear(&mut self) {
        if !self.buf.is_empty() {
            tracing::debug!(dropped = self.buf.len(), "discarding partial frame");
        }
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PressureTemperature;

    fn pt_frame() -> Vec<u8> {
        let mut f = vec![0x17, 8];
        f.extend_from_slice(&100.0f32.to_le_bytes());
        f.extend_from_slice(&20.0f32.to_le_bytes());
        f
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let frame = pt_frame();
        let mut decoder = FrameDecoder::new();

        assert!(decoder.decode(&frame[..3]).is_empty());
        assert_eq!(decoder.buffered(), 3);

        let out = decoder.decode(&frame[3..]);
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0],
            Ok(Response::PressureTemperature(PressureTemperature {
                pressure: 100.0,
                temperature: 20.0
            }))
        );
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_several_frames_in_one_chunk() {
        let mut chunk = pt_frame();
        chunk.extend_from_slice(&[0xB5, 0x00]);
        chunk.extend_from_slice(&[0x15, 4, 0xE8, 0x03]);

        let out = FrameDecoder::new().decode(&chunk);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], Ok(Response::LogComplete));
    }

    #[test]
    fn test_malformed_frame_is_skipped() {
        let mut chunk = vec![0x17, 2, 0x00, 0x00];
        chunk.extend_from_slice(&[0xB5, 0x00]);

        let out = FrameDecoder::new().decode(&chunk);
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], Err(ProtocolError::PayloadTooShort { code: 0x17, .. })));
        assert_eq!(out[1], Ok(Response::LogComplete));
    }

    #[test]
    fn test_clear_discards_partial() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&[0x17, 8, 1]);
        decoder.clear();
        assert_eq!(decoder.decode(&[0xB5, 0]), vec![Ok(Response::LogComplete)]);
    }
}
