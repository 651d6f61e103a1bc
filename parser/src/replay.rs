use serde::Serialize;
use std::path::Path;
use tracing::debug;

use crate::chunky::{CHUNKY_MAGIC, ChunkyContainer, read_container};
use crate::decoder::{DecodePolicy, DecodedEvents, decode_container, decode_telemetry};
use crate::error::Error;
use crate::stream::EventStream;
use crate::telemetry::{RawFrame, scan_frames};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReplayFormat {
    /// Structured Chunky container with commands under event folders
    Chunky,
    /// Flat buffer with embedded telemetry frames
    Telemetry,
}

impl ReplayFormat {
    pub fn detect(data: &[u8]) -> Self {
        if data.starts_with(CHUNKY_MAGIC) {
            ReplayFormat::Chunky
        } else {
            ReplayFormat::Telemetry
        }
    }
}

/// A replay held in memory, read-only for its whole lifetime.
#[derive(Debug)]
pub struct ReplayFile {
    pub format: ReplayFormat,
    pub data: Vec<u8>,
}

impl ReplayFile {
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let format = ReplayFormat::detect(&data);
        debug!("{} byte replay detected as {format:?}", data.len());
        Self { format, data }
    }

    pub fn from_file(replay: &Path) -> Result<Self, Error> {
        let data = std::fs::read(replay)?;
        Ok(Self::from_bytes(data))
    }

    /// The container tree, if this is a Chunky replay.
    pub fn container(&self) -> Result<Option<ChunkyContainer>, Error> {
        match self.format {
            ReplayFormat::Chunky => read_container(&self.data).map(Some),
            ReplayFormat::Telemetry => Ok(None),
        }
    }

    /// Telemetry frames found in the replay. Empty for Chunky replays.
    pub fn frames(&self) -> Vec<RawFrame> {
        match self.format {
            ReplayFormat::Chunky => Vec::new(),
            ReplayFormat::Telemetry => scan_frames(&self.data),
        }
    }

    pub fn decode_events(&self, policy: DecodePolicy) -> Result<DecodedEvents, Error> {
        match self.format {
            ReplayFormat::Chunky => decode_container(&read_container(&self.data)?, policy),
            ReplayFormat::Telemetry => decode_telemetry(&self.data, policy),
        }
    }

    pub fn event_stream(&self, policy: DecodePolicy) -> Result<EventStream, Error> {
        Ok(EventStream::from_sources([self.decode_events(policy)?]))
    }
}
