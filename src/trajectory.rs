use std::io::Read;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use glam::Vec3;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{DecodeError, Error, Result};
use crate::{BoxVec, Frame, FrameRange, Index, XTCReader};

/// Settings for opening a [`Trajectory`].
///
/// Created through [`Trajectory::options`].
#[derive(Debug, Default, Clone)]
pub struct OpenOptions {
    range: FrameRange,
    index: Option<Index>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the first frame to read.
    pub fn begin(&mut self, begin: usize) -> &mut Self {
        self.range.begin = begin;
        self
    }

    /// Exclusive upper bound on the frame index. Without one, the whole file is read.
    pub fn end(&mut self, end: usize) -> &mut Self {
        self.range.end = Some(end);
        self
    }

    /// Keep every `stride`th frame, counted from `begin`.
    pub fn stride(&mut self, stride: NonZeroUsize) -> &mut Self {
        self.range.stride = stride;
        self
    }

    pub fn range(&mut self, range: FrameRange) -> &mut Self {
        self.range = range;
        self
    }

    /// Attach an [`Index`] so that atoms can be looked up by group.
    pub fn index(&mut self, index: Index) -> &mut Self {
        self.index = Some(index);
        self
    }

    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<Trajectory> {
        Trajectory::read(path.as_ref(), self.range, self.index.clone())
    }
}

/// The frames of an xtc file, held in memory.
///
/// All reading happens when the trajectory is opened. After that, it only answers queries.
#[derive(Debug, Clone)]
pub struct Trajectory {
    path: PathBuf,
    natoms: usize,
    frames: Vec<Frame>,
    index: Option<Index>,
}

impl Trajectory {
    /// Reads all frames of the xtc file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read(path.as_ref(), FrameRange::default(), None)
    }

    /// Reads all frames of the xtc file at `path`, with `index` for group lookups.
    pub fn open_with_index<P: AsRef<Path>>(path: P, index: Index) -> Result<Self> {
        Self::read(path.as_ref(), FrameRange::default(), Some(index))
    }

    pub fn options() -> OpenOptions {
        OpenOptions::new()
    }

    #[instrument(skip_all, fields(path = %path.display(), range = ?range))]
    fn read(path: &Path, range: FrameRange, index: Option<Index>) -> Result<Self> {
        info!("opening xtc file");
        let mut reader = XTCReader::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let natoms = reader.natoms().map_err(|source| Error::Header {
            path: path.to_path_buf(),
            source,
        })?;
        info!(natoms, "particles are in the system");

        if let Some(index) = &index {
            for (group, atoms) in index.iter() {
                if let Some(&atom) = atoms.iter().find(|&&atom| atom >= natoms) {
                    return Err(Error::IndexAtomOutOfRange {
                        group: group.to_string(),
                        atom,
                        natoms,
                    });
                }
            }
        }

        let frames = read_frames(&mut reader, natoms, &range);
        // The reader and with it the file are closed here, however the loop ended.
        drop(reader);

        info!(nframes = frames.len(), "finished reading xtc file");
        Ok(Self {
            path: path.to_path_buf(),
            natoms,
            frames,
            index,
        })
    }

    fn frame_checked(&self, frame: usize) -> Result<&Frame> {
        self.frames.get(frame).ok_or(Error::FrameOutOfRange {
            frame,
            nframes: self.nframes(),
        })
    }

    fn index_checked(&self, group: &str) -> Result<&Index> {
        self.index
            .as_ref()
            .ok_or_else(|| Error::UnknownGroup(group.to_string()))
    }

    pub fn frame(&self, frame: usize) -> Result<&Frame> {
        self.frame_checked(frame)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Position of `atom` in `frame`.
    pub fn xyz(&self, frame: usize, atom: usize) -> Result<Vec3> {
        self.frame_checked(frame)?.xyz(atom)
    }

    /// Position of the `atom`th member of `group` in `frame`.
    pub fn group_xyz(&self, frame: usize, group: &str, atom: usize) -> Result<Vec3> {
        let frame = self.frame_checked(frame)?;
        let location = self.index_checked(group)?.location(group, atom)?;
        frame.xyz(location)
    }

    /// All positions in `frame`.
    pub fn positions(&self, frame: usize) -> Result<&[Vec3]> {
        Ok(self.frame_checked(frame)?.positions())
    }

    /// Positions of the members of `group` in `frame`.
    pub fn group_positions(&self, frame: usize, group: &str) -> Result<Vec<Vec3>> {
        let frame = self.frame_checked(frame)?;
        frame.group_positions(self.index_checked(group)?, group)
    }

    pub fn boxvec(&self, frame: usize) -> Result<BoxVec> {
        Ok(self.frame_checked(frame)?.boxvec())
    }

    pub fn box_volume(&self, frame: usize) -> Result<f32> {
        Ok(self.frame_checked(frame)?.box_volume())
    }

    /// Time of `frame` in picoseconds.
    pub fn time(&self, frame: usize) -> Result<f32> {
        Ok(self.frame_checked(frame)?.time())
    }

    pub fn step(&self, frame: usize) -> Result<u32> {
        Ok(self.frame_checked(frame)?.step())
    }

    pub fn precision(&self, frame: usize) -> Result<Option<f32>> {
        Ok(self.frame_checked(frame)?.precision())
    }

    /// Number of atoms in the system.
    pub fn natoms(&self) -> usize {
        self.natoms
    }

    /// Number of atoms in `group`.
    pub fn group_natoms(&self, group: &str) -> Result<usize> {
        self.index_checked(group)?.group_size(group)
    }

    pub fn nframes(&self) -> usize {
        self.frames.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> Option<&Index> {
        self.index.as_ref()
    }
}

/// Streams through `reader`, keeping the frames selected by `range`.
///
/// Frames before `range.begin` and those between strides are skipped without decoding their
/// positions. Whatever goes wrong while streaming ends the read, and the frames kept up to that
/// point are returned.
fn read_frames<R: Read>(
    reader: &mut XTCReader<R>,
    natoms: usize,
    range: &FrameRange,
) -> Vec<Frame> {
    let mut frames = Vec::new();

    loop {
        let idx = reader.position();
        let keep = match range.is_included(idx) {
            Some(keep) => keep,
            None => break,
        };

        // The atom count is checked before any of the payload is read.
        let next = reader.read_header().and_then(|header| {
            check_natoms(header.natoms, natoms)?;
            if keep {
                reader.read_positions(header).map(Some)
            } else {
                reader.skip_positions(&header).map(|_| None)
            }
        });

        match next {
            Ok(Some(frame)) => {
                if frames.len() % 10 == 0 {
                    trace!(
                        frame = idx,
                        time = frame.time(),
                        step = frame.step(),
                        "reading"
                    );
                }
                frames.push(frame);
            }
            Ok(None) => {}
            Err(DecodeError::EndOfStream) => {
                debug!(frame = idx, "reached the end of the stream");
                break;
            }
            Err(err) if err.is_truncated() => {
                warn!(frame = idx, "the file ends in the middle of a frame");
                break;
            }
            Err(err) => {
                warn!(frame = idx, %err, "stopped reading early, keeping the frames read so far");
                break;
            }
        }
    }

    frames
}

fn check_natoms(found: usize, expected: usize) -> Result<(), DecodeError> {
    if found == expected {
        Ok(())
    } else {
        Err(DecodeError::AtomCountChanged { expected, found })
    }
}
