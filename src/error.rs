use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while opening a [`Trajectory`](crate::Trajectory) or querying it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot open trajectory '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read the header of '{}': {source}", .path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("cannot read index file '{}': {source}", .path.display())]
    IndexFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed index file on line {line}: {reason}")]
    IndexParse { line: usize, reason: String },

    #[error("index group '{group}' refers to atom {atom}, but the system has {natoms} atoms")]
    IndexAtomOutOfRange {
        group: String,
        atom: usize,
        natoms: usize,
    },

    #[error("frame {frame} is out of range (the trajectory holds {nframes} frames)")]
    FrameOutOfRange { frame: usize, nframes: usize },

    #[error("atom {atom} is out of range (there are {natoms} atoms)")]
    AtomOutOfRange { atom: usize, natoms: usize },

    #[error("unknown index group '{0}'")]
    UnknownGroup(String),
}

/// Errors produced by the xtc decoder.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("reached the end of the stream")]
    EndOfStream,

    #[error("found invalid magic number '{0}' ({0:#0x})")]
    Magic(i32),

    #[error("atom count must be a positive integer, found {0}")]
    AtomCount(i32),

    #[error("atom count in the header ({header}) does not match the coordinate block ({block})")]
    AtomCountMismatch { header: usize, block: i32 },

    #[error("frame has {found} atoms, but the trajectory has {expected}")]
    AtomCountChanged { expected: usize, found: usize },

    #[error("step must be a positive integer, found {0}")]
    Step(i32),

    #[error("corrupt compressed coordinates: {0}")]
    Corrupt(&'static str),
}

impl DecodeError {
    /// Whether the stream ended in the middle of a frame.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Io(err) if err.kind() == io::ErrorKind::UnexpectedEof)
    }
}
