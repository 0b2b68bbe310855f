use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while decoding or encoding a BF2 file.
///
/// Decoding never returns a partial hierarchy: the first error aborts the whole file.
/// Encoding validates the hierarchy before any byte is produced.
#[derive(Debug, Error)]
pub enum Error {
    #[error("input truncated at offset {offset}: needed {needed} bytes, {available} available")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("decoding finished at offset {consumed} but the file is {len} bytes long")]
    TrailingBytes { consumed: usize, len: usize },
    #[error("unsupported file version {major}.{minor}")]
    UnsupportedVersion { major: u32, minor: u32 },
    #[error("unsupported primitive type {0}, only triangle lists are supported")]
    UnsupportedPrimitiveType(u32),
    #[error("malformed BSP: {0}")]
    BspMalformed(String),
    #[error("{vertices} vertices but {materials} vertex materials")]
    VertexMaterialMismatch { vertices: usize, materials: usize },

    #[error("invalid {kind} value {value}")]
    InvalidEnum { kind: &'static str, value: u32 },
    #[error("string is not ASCII")]
    InvalidString,
    #[error("BSP presence flag must be ASCII '0' or '1', found {0:#04x}")]
    InvalidBspFlag(u8),
    #[error("vertex declaration does not end with an unused terminator")]
    MissingDeclarationTerminator,
    #[error("{0} vertices exceed the 16-bit index limit")]
    VertexLimitExceeded(usize),
    #[error("face index {index} out of range ({count} available)")]
    FaceIndexOutOfRange { index: usize, count: usize },
    #[error("vertex {vertex} is missing its {usage:?} attribute")]
    MissingVertexAttribute {
        vertex: usize,
        usage: crate::mesh::VertexUsage,
    },
    #[error("vertex {vertex} has a {usage:?} value that does not match the declared {decl_type:?}")]
    AttributeTypeMismatch {
        vertex: usize,
        usage: crate::mesh::VertexUsage,
        decl_type: crate::mesh::DeclType,
    },
    #[error("vertex declaration lacks the {0:?} usage this mesh kind requires")]
    MissingRequiredUsage(crate::mesh::VertexUsage),
    #[error("{usage:?} attribute at offset {offset} does not fit the {stride} byte vertex stride")]
    AttributeOutOfStride {
        usage: crate::mesh::VertexUsage,
        offset: usize,
        stride: usize,
    },
    #[error("{what} range {start}..{start}+{count} exceeds the {len} available")]
    RangeOutOfBounds {
        what: &'static str,
        start: usize,
        count: usize,
        len: usize,
    },
    #[error("index count {0} is not a whole number of triangles")]
    InvalidIndexCount(usize),
    #[error("BSP leaf holds {0} faces, the format allows at most 255")]
    BspLeafTooLarge(usize),
    #[error("{0} elements do not fit a 32-bit count")]
    CountOverflow(usize),
    #[error("unknown mesh extension {0:?}")]
    UnknownExtension(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}
