//! Scanner for telemetry frames embedded at arbitrary offsets of a flat replay buffer.
//!
//! A frame is laid out as `[type: i32][length: i32][marker ...]`, where `length` counts the
//! marker itself. Frames are not aligned to anything, so the scan walks byte by byte and
//! jumps over a whole frame once one is found.

use serde::Serialize;
use tracing::trace;

/// Literal every telemetry frame payload starts with.
pub const FRAME_MARKER: &[u8] = b"SCAR_EVENT";

/// Leading bytes of a telemetry replay that never contain frames.
pub const SCAN_START: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawFrame {
    pub frame_type: i32,
    pub byte_length: i32,
    /// Offset of the marker in the scanned buffer
    pub offset: usize,
    /// `byte_length` bytes starting at the marker, marker included
    #[serde(skip)]
    pub payload: Vec<u8>,
}

impl RawFrame {
    /// Payload bytes following the marker.
    pub fn body(&self) -> &[u8] {
        self.payload.get(FRAME_MARKER.len()..).unwrap_or_default()
    }
}

fn read_i32(buffer: &[u8], at: usize) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buffer[at..at + 4]);
    i32::from_le_bytes(raw)
}

/// Extracts the frame whose marker starts at `pos`, if the marker matches and the declared
/// length fits the buffer.
fn frame_at(buffer: &[u8], pos: usize) -> Option<RawFrame> {
    if !buffer[pos..].starts_with(FRAME_MARKER) {
        return None;
    }
    let frame_type = read_i32(buffer, pos - 8);
    let byte_length = read_i32(buffer, pos - 4);
    let length = usize::try_from(byte_length).ok()?;
    if length < FRAME_MARKER.len() {
        trace!("marker at {pos} declares impossible length {byte_length}");
        return None;
    }
    let payload = buffer.get(pos..pos.checked_add(length)?)?;
    Some(RawFrame {
        frame_type,
        byte_length,
        offset: pos,
        payload: payload.to_vec(),
    })
}

/// Finds every telemetry frame in `buffer`. Regions that do not hold a frame are skipped,
/// so this never fails.
pub fn scan_frames(buffer: &[u8]) -> Vec<RawFrame> {
    let mut frames = Vec::new();
    if buffer.len() < SCAN_START + FRAME_MARKER.len() {
        return frames;
    }
    let end = buffer.len() - FRAME_MARKER.len();
    let mut pos = SCAN_START;
    while pos <= end {
        if buffer[pos] == FRAME_MARKER[0] {
            if let Some(frame) = frame_at(buffer, pos) {
                trace!(
                    "frame type {} ({} bytes) at {}",
                    frame.frame_type, frame.byte_length, pos
                );
                pos += frame.payload.len();
                frames.push(frame);
                continue;
            }
        }
        pos += 1;
    }
    frames
}
