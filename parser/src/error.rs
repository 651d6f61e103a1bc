use thiserror::Error;

use crate::chunky::ChunkTag;
use crate::event::EventKind;
use crate::types::{PlayerId, SquadId};

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("Nom error: {err:?}")]
    Nom {
        err: nom::error::ErrorKind,
        input: Vec<u8>,
    },
    #[error("Invalid Relic Chunky magic")]
    BadMagic,
    #[error("Unsupported Relic Chunky version {0}")]
    UnsupportedVersion(i32),
    #[error("Chunky header length {0} is smaller than the fixed header")]
    InvalidHeaderLength(i32),
    #[error("Unexpected end of data ({remaining} bytes left)")]
    TruncatedRead { remaining: usize },
    #[error("Chunk folders nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize },
    #[error("Unknown chunk type {0}")]
    UnknownChunkType(ChunkTag),
    #[error("Malformed telemetry frame at offset {offset}")]
    MalformedFrame { offset: usize },
    #[error("Could not parse field `{field}` of {kind:?} event")]
    UnparsableField { kind: EventKind, field: &'static str },
    #[error("Unknown event identifier {0:?}")]
    UnknownEventIdentifier(char),
    #[error("Event references player {0} who is not part of the match")]
    UnknownPlayer(PlayerId),
    #[error("Company has no squad with id {0}")]
    UnknownSquad(SquadId),
    #[error("Unable to read file: {err}")]
    Io {
        #[from]
        err: std::io::Error,
    },
    #[error("Invalid JSON: {err}")]
    Json {
        #[from]
        err: serde_json::Error,
    },
}

#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    pub kind: ErrorKind,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error { kind }
    }

    pub(crate) fn unparsable(kind: EventKind, field: &'static str) -> Self {
        Error::new(ErrorKind::UnparsableField { kind, field })
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error { kind }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io { err },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Json { err },
        }
    }
}

impl<'a> nom::error::ParseError<&'a [u8]> for Error {
    fn from_error_kind(input: &'a [u8], kind: nom::error::ErrorKind) -> Self {
        let kind = match kind {
            nom::error::ErrorKind::Eof => ErrorKind::TruncatedRead {
                remaining: input.len(),
            },
            err => ErrorKind::Nom {
                err,
                input: input.to_vec(),
            },
        };
        Error { kind }
    }

    fn append(_input: &'a [u8], _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

impl From<nom::Err<Error>> for Error {
    fn from(err: nom::Err<Error>) -> Self {
        match err {
            nom::Err::Incomplete(_) => Error::new(ErrorKind::TruncatedRead { remaining: 0 }),
            nom::Err::Error(e) | nom::Err::Failure(e) => e,
        }
    }
}

pub fn failure_from_kind(kind: ErrorKind) -> nom::Err<Error> {
    nom::Err::Failure(Error::new(kind))
}

pub type IResult<I, O> = nom::IResult<I, O, Error>;
