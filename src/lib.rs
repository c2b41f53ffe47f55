//! Load GROMACS xtc trajectories into memory and query them.
//!
//! A [`Trajectory`] reads a whole xtc file (or a `begin`/`end`/`stride` selection of its frames)
//! when it is opened, and afterwards serves positions, boxes, steps and times by frame index.
//! Atoms can also be addressed through the groups of a GROMACS [`Index`] file.
//!
//! ```no_run
//! use gmxtraj::{Index, Trajectory};
//!
//! # fn main() -> gmxtraj::Result<()> {
//! let index = Index::from_path("index.ndx")?;
//! let traj = Trajectory::options()
//!     .begin(10)
//!     .stride(std::num::NonZeroUsize::new(2).unwrap())
//!     .index(index)
//!     .open("traj.xtc")?;
//!
//! for frame in 0..traj.nframes() {
//!     let sites = traj.group_positions(frame, "SOL")?;
//!     println!("{} {}", traj.time(frame)?, sites.len());
//! }
//! # Ok(())
//! # }
//! ```
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use glam::{Mat3, Vec3};

use crate::reader::{
    read_boxvec, read_compressed_positions, read_f32, read_i32, read_magic,
    read_uncompressed_positions, skip_compressed_positions,
};

pub use crate::error::{DecodeError, Error, Result};
pub use crate::index::Index;
pub use crate::selection::FrameRange;
pub use crate::trajectory::{OpenOptions, Trajectory};

mod error;
pub mod geometry;
mod index;
pub mod reader;
mod selection;
mod trajectory;

/// The box of a frame. Its columns are the three box vectors.
pub type BoxVec = Mat3;

/// One snapshot of the simulated system.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Frame {
    step: u32,
    /// Time in picoseconds.
    time: f32,
    boxvec: BoxVec,
    precision: Option<f32>,
    positions: Vec<Vec3>,
}

impl Frame {
    pub fn new(step: u32, time: f32, boxvec: BoxVec, positions: Vec<Vec3>) -> Self {
        Self {
            step,
            time,
            boxvec,
            precision: None,
            positions,
        }
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    /// Time in picoseconds.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn boxvec(&self) -> BoxVec {
        self.boxvec
    }

    pub fn box_volume(&self) -> f32 {
        geometry::volume(&self.boxvec)
    }

    /// The precision the positions were compressed with.
    ///
    /// Frames of nine atoms or fewer are stored uncompressed and have no precision.
    pub fn precision(&self) -> Option<f32> {
        self.precision
    }

    pub fn natoms(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Returns the position of the atom at `atom`.
    pub fn xyz(&self, atom: usize) -> Result<Vec3> {
        self.positions
            .get(atom)
            .copied()
            .ok_or(Error::AtomOutOfRange {
                atom,
                natoms: self.natoms(),
            })
    }

    /// Returns the positions of the members of `group`, in the order the group lists them.
    pub fn group_positions(&self, index: &Index, group: &str) -> Result<Vec<Vec3>> {
        index
            .group(group)?
            .iter()
            .map(|&atom| self.xyz(atom))
            .collect()
    }
}

/// The fixed-size header that starts every xtc frame.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Header {
    pub magic: i32,
    pub natoms: usize,
    pub step: u32,
    pub time: f32,
    pub boxvec: BoxVec,
    pub natoms_repeated: usize,
}

impl Header {
    /// Size of the header in bytes: magic, natoms, step, time, nine box values and natoms again.
    pub const SIZE: usize = 4 * (4 + 9 + 1);
}

/// A forward-only xtc stream.
///
/// The underlying reader is closed when the [`XTCReader`] is dropped.
#[derive(Debug)]
pub struct XTCReader<R> {
    pub file: R,
    /// Number of frames that were read or skipped so far.
    position: usize,
    scratch: Vec<u8>,
}

impl XTCReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> XTCReader<R> {
    pub const MAGIC: i32 = 1995;

    pub fn new(reader: R) -> Self {
        Self {
            file: reader,
            position: 0,
            scratch: Vec::new(),
        }
    }

    /// Index of the next frame in the stream.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Reads the header of the next frame.
    pub fn read_header(&mut self) -> std::result::Result<Header, DecodeError> {
        let file = &mut self.file;

        let magic = read_magic(file)?.ok_or(DecodeError::EndOfStream)?;
        if magic != Self::MAGIC {
            return Err(DecodeError::Magic(magic));
        }
        let natoms = read_i32(file)?;
        let natoms: usize = natoms
            .try_into()
            .map_err(|_| DecodeError::AtomCount(natoms))?;
        let step = read_i32(file)?;
        let step: u32 = step.try_into().map_err(|_| DecodeError::Step(step))?;
        let time = read_f32(file)?;
        let boxvec = read_boxvec(file)?;
        let natoms_repeated = read_i32(file)?;
        if usize::try_from(natoms_repeated).ok() != Some(natoms) {
            return Err(DecodeError::AtomCountMismatch {
                header: natoms,
                block: natoms_repeated,
            });
        }

        Ok(Header {
            magic,
            natoms,
            step,
            time,
            boxvec,
            natoms_repeated: natoms,
        })
    }

    /// Reads and returns the next [`Frame`] and advances one step.
    pub fn read_frame(&mut self) -> std::result::Result<Frame, DecodeError> {
        let header = self.read_header()?;
        self.read_positions(header)
    }

    /// Decodes the positions that follow `header`, which must have just been read.
    pub(crate) fn read_positions(
        &mut self,
        header: Header,
    ) -> std::result::Result<Frame, DecodeError> {
        let natoms = header.natoms;

        // The atom count is not trusted until the positions have actually been read.
        let mut positions = Vec::with_capacity(natoms.min(reader::RESERVE_LIMIT));
        let precision = if natoms <= 9 {
            // Small systems are stored uncompressed.
            read_uncompressed_positions(&mut self.file, natoms, &mut positions)?;
            None
        } else {
            let precision = read_f32(&mut self.file)?;
            read_compressed_positions(
                &mut self.file,
                natoms,
                precision,
                &mut positions,
                &mut self.scratch,
            )?;
            Some(precision)
        };

        self.position += 1;

        Ok(Frame {
            step: header.step,
            time: header.time,
            boxvec: header.boxvec,
            precision,
            positions,
        })
    }

    /// Moves past the next frame without decoding its positions, returning its header.
    pub fn skip_frame(&mut self) -> std::result::Result<Header, DecodeError> {
        let header = self.read_header()?;
        self.skip_positions(&header)?;
        Ok(header)
    }

    /// Moves past the positions that follow `header`, which must have just been read.
    pub(crate) fn skip_positions(
        &mut self,
        header: &Header,
    ) -> std::result::Result<(), DecodeError> {
        if header.natoms <= 9 {
            reader::discard(&mut self.file, header.natoms as u64 * 3 * 4)?;
        } else {
            skip_compressed_positions(&mut self.file)?;
        }
        self.position += 1;
        Ok(())
    }
}

impl<R: Read + Seek> XTCReader<R> {
    /// Returns the number of atoms in the system, as stated by the first frame.
    ///
    /// The reader is left at the position it was at before.
    pub fn natoms(&mut self) -> std::result::Result<usize, DecodeError> {
        let start = self.file.stream_position()?;
        self.file.seek(SeekFrom::Start(0))?;
        let header = self.read_header();
        self.file.seek(SeekFrom::Start(start))?;
        Ok(header?.natoms)
    }

    /// Returns to the start of the stream.
    pub fn home(&mut self) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.position = 0;
        Ok(())
    }
}
