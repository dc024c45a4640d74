use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Every way a PDBF load can fail. A load that returns one of these has
/// produced no document.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Could not determine PDBF block size")]
    BlockSizeNotFound,
    #[error("Invalid PDBF block checksum in block {block}")]
    ChecksumMismatch { block: usize },
    #[error("Unexpected marker in {section}: {found}")]
    UnexpectedSentinel { section: &'static str, found: String },
    #[error("Unimplemented format variant: {0}")]
    UnimplementedVariant(String),
    #[error("Read of {wanted} bytes at {position} runs past the end of the buffer ({available} left)")]
    Truncated { position: usize, wanted: usize, available: usize },
    #[error("Offset table entry {index} (adjusted {offset}) is outside the payload")]
    OffsetOutOfRange { index: usize, offset: i64 },
    #[error("Face declares {vertices} vertices; only triangles and quads exist")]
    InvalidFace { vertices: u32 },
    #[error("Texture {index} requested but the list holds {count}")]
    TextureOutOfRange { index: u32, count: usize },
    #[error("Mesh refers to face {face} of object {object}, which the given objects lack")]
    StaleMesh { object: usize, face: usize },
    #[error("Cannot tell asset kind from {0}")]
    UnknownAssetKind(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
