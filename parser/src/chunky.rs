//! Reader for the recursive "Relic Chunky" container format.
//!
//! A container is a fixed header followed by a sequence of chunk records. Each record is
//! either a `FOLD` holding further records or a `DATA` leaf holding raw bytes.

use nom::bytes::complete::{tag, take};
use nom::number::complete::{le_i32, le_u32};
use serde::Serialize;
use std::fmt;
use tracing::{debug, trace};
use variantly::Variantly;

use crate::error::{Error, ErrorKind, IResult, failure_from_kind};

pub const CHUNKY_MAGIC: &[u8; 16] = b"Relic Chunky\r\n\x1A\0";
pub const SUPPORTED_VERSION: i32 = 3;
/// Deepest folder nesting accepted before the container is rejected.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Offset of the first byte after the fixed header fields (magic, version, reserved, length).
const FIXED_HEADER_LEN: i32 = 28;

/// A four character chunk tag such as `FOLD`, `DATA` or a chunk name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct ChunkTag(pub [u8; 4]);

impl ChunkTag {
    pub const FOLD: ChunkTag = ChunkTag(*b"FOLD");
    pub const DATA: ChunkTag = ChunkTag(*b"DATA");

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<ChunkTag> for String {
    fn from(tag: ChunkTag) -> String {
        tag.to_string()
    }
}

impl From<&[u8; 4]> for ChunkTag {
    fn from(v: &[u8; 4]) -> Self {
        ChunkTag(*v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChunkKind {
    Folder,
    Data,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Variantly)]
pub enum ChunkBody {
    Folder(Vec<ChunkNode>),
    Data(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkNode {
    tag: ChunkTag,
    descriptor: String,
    version: i32,
    body: ChunkBody,
}

impl ChunkNode {
    pub fn new(tag: ChunkTag, descriptor: impl Into<String>, version: i32, body: ChunkBody) -> Self {
        Self {
            tag,
            descriptor: descriptor.into(),
            version,
            body,
        }
    }

    pub fn kind(&self) -> ChunkKind {
        match self.body {
            ChunkBody::Folder(_) => ChunkKind::Folder,
            ChunkBody::Data(_) => ChunkKind::Data,
        }
    }

    pub fn tag(&self) -> ChunkTag {
        self.tag
    }

    pub fn descriptor(&self) -> &str {
        self.descriptor.as_ref()
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn body(&self) -> &ChunkBody {
        &self.body
    }

    /// Child nodes. Empty for `DATA` nodes.
    pub fn children(&self) -> &[ChunkNode] {
        self.body.folder_ref().map(Vec::as_slice).unwrap_or_default()
    }

    /// Raw payload. `None` for `FOLD` nodes.
    pub fn payload(&self) -> Option<&[u8]> {
        self.body.data_ref().map(Vec::as_slice)
    }

    /// First child with the given name tag. Later duplicates are shadowed.
    pub fn child(&self, tag: ChunkTag) -> Option<&ChunkNode> {
        self.children().iter().find(|child| child.tag == tag)
    }

    /// Visits this node and every descendant depth-first, in document order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a ChunkNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkyContainer {
    format_version: i32,
    roots: Vec<ChunkNode>,
    /// Bytes following the last chunk record that do not start with a chunk type tag.
    #[serde(skip)]
    trailing: Vec<u8>,
}

impl ChunkyContainer {
    pub fn format_version(&self) -> i32 {
        self.format_version
    }

    pub fn roots(&self) -> &[ChunkNode] {
        self.roots.as_ref()
    }

    pub fn trailing(&self) -> &[u8] {
        self.trailing.as_ref()
    }

    /// First root node with the given name tag. Duplicate tags are legal and the later
    /// ones are shadowed.
    pub fn get(&self, tag: ChunkTag) -> Option<&ChunkNode> {
        self.roots.iter().find(|node| node.tag == tag)
    }

    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a ChunkNode)) {
        for root in &self.roots {
            root.walk(visit);
        }
    }
}

fn chunk_tag(i: &[u8]) -> IResult<&[u8], ChunkTag> {
    let (i, raw) = take(4usize)(i)?;
    let mut tag = [0u8; 4];
    tag.copy_from_slice(raw);
    Ok((i, ChunkTag(tag)))
}

fn chunk_kind(i: &[u8]) -> IResult<&[u8], ChunkKind> {
    let (rest, tag) = chunk_tag(i)?;
    match tag {
        ChunkTag::FOLD => Ok((rest, ChunkKind::Folder)),
        ChunkTag::DATA => Ok((rest, ChunkKind::Data)),
        // Recoverable: the caller still holds `i`, so the tag is effectively un-read.
        other => Err(nom::Err::Error(Error::new(ErrorKind::UnknownChunkType(other)))),
    }
}

fn parse_header(i: &[u8]) -> IResult<&[u8], i32> {
    let (i, _) = tag(&CHUNKY_MAGIC[..])(i)
        .map_err(|_: nom::Err<Error>| failure_from_kind(ErrorKind::BadMagic))?;
    let (i, version) = le_i32(i)?;
    if version != SUPPORTED_VERSION {
        return Err(failure_from_kind(ErrorKind::UnsupportedVersion(version)));
    }
    let (i, _reserved) = take(4usize)(i)?;
    let (i, header_len) = le_i32(i)?;
    if header_len < FIXED_HEADER_LEN {
        return Err(failure_from_kind(ErrorKind::InvalidHeaderLength(header_len)));
    }
    let (i, _padding) = take((header_len - FIXED_HEADER_LEN) as usize)(i)?;
    Ok((i, version))
}

fn parse_chunk_node(i: &[u8], format_version: i32, depth: usize) -> IResult<&[u8], ChunkNode> {
    if depth > MAX_NESTING_DEPTH {
        return Err(failure_from_kind(ErrorKind::NestingTooDeep {
            limit: MAX_NESTING_DEPTH,
        }));
    }
    let (i, kind) = chunk_kind(i)?;
    let (i, name) = chunk_tag(i)?;
    let (i, version) = le_i32(i)?;
    let (i, data_length) = le_u32(i)?;
    let (i, descriptor_length) = le_u32(i)?;
    let i = if format_version >= 3 {
        take(8usize)(i)?.0
    } else {
        i
    };
    let (i, descriptor) = if descriptor_length > 0 {
        let (i, raw) = take(descriptor_length as usize)(i)?;
        let descriptor = String::from_utf8_lossy(raw)
            .trim_end_matches('\0')
            .to_string();
        (i, descriptor)
    } else {
        (i, String::new())
    };
    let (i, data) = take(data_length as usize)(i)?;

    trace!("{kind:?} chunk {name} v{version}, {data_length} bytes");

    let body = match kind {
        ChunkKind::Folder => {
            let mut children = Vec::new();
            let mut remaining = data;
            while !remaining.is_empty() {
                // Any failure inside a folder aborts the folder, including unknown tags.
                let (rest, child) = parse_chunk_node(remaining, format_version, depth + 1).map_err(
                    |err| match err {
                        nom::Err::Error(e) => nom::Err::Failure(e),
                        other => other,
                    },
                )?;
                children.push(child);
                remaining = rest;
            }
            ChunkBody::Folder(children)
        }
        ChunkKind::Data => ChunkBody::Data(data.to_vec()),
    };

    Ok((
        i,
        ChunkNode {
            tag: name,
            descriptor,
            version,
            body,
        },
    ))
}

fn parse_container(i: &[u8]) -> IResult<&[u8], ChunkyContainer> {
    let (mut i, format_version) = parse_header(i)?;
    let mut roots = Vec::new();
    while !i.is_empty() {
        match parse_chunk_node(i, format_version, 0) {
            Ok((rest, node)) => {
                roots.push(node);
                i = rest;
            }
            Err(nom::Err::Error(Error {
                kind: ErrorKind::UnknownChunkType(unknown),
            })) => {
                debug!("stopping at non-chunk data (tag {unknown}), {} bytes left", i.len());
                break;
            }
            Err(err) => return Err(err),
        }
    }
    Ok((
        &i[i.len()..],
        ChunkyContainer {
            format_version,
            roots,
            trailing: i.to_vec(),
        },
    ))
}

/// Decodes a complete Chunky container. Partial trees are never returned.
pub fn read_container(data: &[u8]) -> Result<ChunkyContainer, Error> {
    let (_, container) = parse_container(data)?;
    debug!(
        "read chunky v{} with {} root chunks",
        container.format_version,
        container.roots.len()
    );
    Ok(container)
}

/// Reads a container from any byte source. The source is consumed completely.
pub fn read_container_from<R: std::io::Read>(mut reader: R) -> Result<ChunkyContainer, Error> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    read_container(&data)
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    /// Little-endian writer for hand-built containers.
    pub struct ChunkyWriter {
        pub buf: Vec<u8>,
    }

    impl ChunkyWriter {
        pub fn new() -> Self {
            Self::with_padding(&[])
        }

        pub fn with_padding(padding: &[u8]) -> Self {
            let mut buf = Vec::new();
            buf.extend_from_slice(CHUNKY_MAGIC);
            buf.extend_from_slice(&SUPPORTED_VERSION.to_le_bytes());
            buf.extend_from_slice(&1i32.to_le_bytes());
            buf.extend_from_slice(&(FIXED_HEADER_LEN + padding.len() as i32).to_le_bytes());
            buf.extend_from_slice(padding);
            Self { buf }
        }

        pub fn push(&mut self, record: Vec<u8>) -> &mut Self {
            self.buf.extend_from_slice(&record);
            self
        }
    }

    pub fn record(kind: &[u8; 4], name: &[u8; 4], descriptor: &str, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(kind);
        out.extend_from_slice(name);
        out.extend_from_slice(&1i32.to_le_bytes());
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&(descriptor.len() as u32).to_le_bytes());
        out.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(descriptor.as_bytes());
        out.extend_from_slice(body);
        out
    }

    pub fn data(name: &[u8; 4], body: &[u8]) -> Vec<u8> {
        record(b"DATA", name, "", body)
    }

    pub fn folder(name: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
        record(b"FOLD", name, "", &children.concat())
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    #[test]
    fn folder_with_two_data_children() {
        let mut writer = ChunkyWriter::with_padding(&[0xAA; 8]);
        writer.push(folder(
            b"ROOT",
            &[data(b"AAAA", &[1, 2, 3]), data(b"BBBB", b"hello")],
        ));

        let container = read_container(&writer.buf).unwrap();
        assert_eq!(container.format_version(), 3);
        assert_eq!(container.roots().len(), 1);

        let root = &container.roots()[0];
        assert_eq!(root.kind(), ChunkKind::Folder);
        assert_eq!(root.tag(), ChunkTag(*b"ROOT"));
        assert_eq!(root.children().len(), 2);
        assert_eq!(root.children()[0].payload(), Some(&[1u8, 2, 3][..]));
        assert_eq!(root.children()[1].payload(), Some(&b"hello"[..]));
        assert!(root.payload().is_none());
        assert!(container.trailing().is_empty());
    }

    #[test]
    fn descriptor_and_version_are_read() {
        let mut writer = ChunkyWriter::new();
        writer.push(record(b"DATA", b"INFO", "map info", b"x"));

        let container = read_container(&writer.buf).unwrap();
        let node = container.get(ChunkTag(*b"INFO")).unwrap();
        assert_eq!(node.descriptor(), "map info");
        assert_eq!(node.version(), 1);
        assert_eq!(node.payload(), Some(&b"x"[..]));
    }

    #[test]
    fn duplicate_tags_first_match_wins() {
        let mut writer = ChunkyWriter::new();
        writer
            .push(data(b"DUPE", b"first"))
            .push(data(b"DUPE", b"second"));

        let container = read_container(&writer.buf).unwrap();
        assert_eq!(container.roots().len(), 2);
        let node = container.get(ChunkTag(*b"DUPE")).unwrap();
        assert_eq!(node.payload(), Some(&b"first"[..]));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut writer = ChunkyWriter::new();
        writer.push(data(b"AAAA", b"x"));
        writer.buf[0] = b'X';

        let err = read_container(&writer.buf).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::BadMagic));
    }

    #[test]
    fn only_version_three_is_supported() {
        let mut writer = ChunkyWriter::new();
        writer.buf[16..20].copy_from_slice(&4i32.to_le_bytes());

        let err = read_container(&writer.buf).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnsupportedVersion(4)));
    }

    #[test]
    fn truncated_data_chunk_fails_whole_read() {
        let mut writer = ChunkyWriter::new();
        writer.push(data(b"AAAA", b"complete"));
        writer.push(data(b"BBBB", b"cut off here"));
        let len = writer.buf.len();
        writer.buf.truncate(len - 4);

        let err = read_container(&writer.buf).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TruncatedRead { .. }));
    }

    #[test]
    fn unknown_child_type_aborts_folder() {
        let mut writer = ChunkyWriter::new();
        writer.push(folder(b"ROOT", &[record(b"JUNK", b"AAAA", "", b"x")]));

        let err = read_container(&writer.buf).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnknownChunkType(tag) if tag == ChunkTag(*b"JUNK")));
    }

    #[test]
    fn trailing_non_chunk_data_is_kept() {
        let mut writer = ChunkyWriter::new();
        writer.push(data(b"AAAA", b"x"));
        writer.buf.extend_from_slice(b"\x01\x02\x03\x04 trailing");

        let container = read_container(&writer.buf).unwrap();
        assert_eq!(container.roots().len(), 1);
        assert_eq!(container.trailing(), b"\x01\x02\x03\x04 trailing");
    }

    #[test]
    fn short_tail_after_last_chunk_is_truncated() {
        let mut writer = ChunkyWriter::new();
        writer.push(data(b"AAAA", b"x"));
        writer.buf.extend_from_slice(b"FO");

        let err = read_container(&writer.buf).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TruncatedRead { remaining: 2 }));
    }

    /// `levels` folders, each the only child of the one before.
    fn nested_folders(levels: usize) -> Vec<u8> {
        const HEADER_LEN: usize = 28;
        let mut out = Vec::with_capacity(levels * HEADER_LEN);
        for level in 0..levels {
            let body_len = ((levels - level - 1) * HEADER_LEN) as u32;
            out.extend_from_slice(b"FOLD");
            out.extend_from_slice(b"NEST");
            out.extend_from_slice(&1i32.to_le_bytes());
            out.extend_from_slice(&body_len.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&[0u8; 8]);
        }
        out
    }

    #[test]
    fn nesting_up_to_the_limit_is_read() {
        let mut writer = ChunkyWriter::new();
        writer.push(nested_folders(MAX_NESTING_DEPTH + 1));

        let container = read_container(&writer.buf).unwrap();
        let mut depth = 0;
        container.walk(&mut |_| depth += 1);
        assert_eq!(depth, MAX_NESTING_DEPTH + 1);
    }

    #[test]
    fn deeply_nested_folders_are_rejected() {
        let mut writer = ChunkyWriter::new();
        writer.push(nested_folders(MAX_NESTING_DEPTH + 2));
        let err = read_container(&writer.buf).unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::NestingTooDeep {
                limit: MAX_NESTING_DEPTH
            }
        ));

        let mut writer = ChunkyWriter::new();
        writer.push(nested_folders(200_000));
        let err = read_container(&writer.buf).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::NestingTooDeep { .. }));
    }

    #[test]
    fn walk_visits_in_document_order() {
        let mut writer = ChunkyWriter::new();
        writer.push(folder(
            b"ROOT",
            &[folder(b"SUB1", &[data(b"LEAF", b"a")]), data(b"LAST", b"b")],
        ));

        let container = read_container(&writer.buf).unwrap();
        let mut tags = Vec::new();
        container.walk(&mut |node| tags.push(node.tag().to_string()));
        assert_eq!(tags, vec!["ROOT", "SUB1", "LEAF", "LAST"]);
    }
}
