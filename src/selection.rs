use std::num::{NonZeroUsize, ParseIntError};
use std::str::FromStr;

/// A selection of [`Frame`](super::Frame)s to be read into a [`Trajectory`](super::Trajectory).
///
/// The `begin` of a [`FrameRange`] is always bounded, and is zero by default.
/// The `end` may be bounded or unbounded. In case the end is unbounded ([`None`]), the frames up
/// to and including the last frame in the file are considered. If it is bounded by [`Some`]
/// value, it is an exclusive bound on the frame index.
/// The `stride` describes the number of frames that pass in each step, counted from `begin`.
/// The number of skipped frames in between is equal to `stride` - 1.
/// For instance, given a `stride` of four, one frame is read and the following three are skipped.
///
/// # Note
///
/// An instance where `begin` >= `end` is a valid `FrameRange`, but it selects zero frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    pub begin: usize,
    pub end: Option<usize>,
    pub stride: NonZeroUsize,
}

impl FrameRange {
    pub fn new(begin: Option<usize>, end: Option<usize>, stride: Option<NonZeroUsize>) -> Self {
        let mut range = Self {
            end,
            ..Self::default()
        };
        if let Some(begin) = begin {
            range.begin = begin;
        }
        if let Some(stride) = stride {
            range.stride = stride;
        }
        range
    }

    /// Determine whether the frame at index `idx` is included in this [`FrameRange`].
    ///
    /// Will return [`None`] once the index is beyond the scope of this `FrameRange`.
    pub fn is_included(&self, idx: usize) -> Option<bool> {
        if let Some(end) = self.end {
            if end <= idx {
                return None;
            }
        }
        if idx < self.begin {
            return Some(false);
        }
        Some((idx - self.begin) % self.stride == 0)
    }
}

impl Default for FrameRange {
    fn default() -> Self {
        Self {
            begin: 0,
            end: None,
            stride: NonZeroUsize::MIN,
        }
    }
}

/// Parses `begin:end:stride`, where each component may be left empty.
///
/// - `:100` selects the first 100 frames.
/// - `3:14` selects the frames with indices 3 up to and including 13, 11 frames in total.
/// - `:100:2` selects every second frame from the first 100 frames, 50 in total.
impl FromStr for FrameRange {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn component<T: FromStr<Err = ParseIntError>>(
            s: Option<&str>,
        ) -> Result<Option<T>, ParseIntError> {
            s.filter(|s| !s.is_empty()).map(str::parse).transpose()
        }

        let mut components = s.split(':');
        let begin = component(components.next())?;
        let end = component(components.next())?;
        let stride = component(components.next())?;
        Ok(Self::new(begin, end, stride))
    }
}
