//! Writes small xtc files for the tests.
//!
//! Frames of up to nine atoms are written uncompressed, like GROMACS does. Larger frames are
//! compressed using the wide-range layout, where every coordinate gets its own bit width and no
//! run-length coding is used. That is a valid xtc stream that is simple to produce.
#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use glam::{Mat3, Vec3};
use gmxtraj::Frame;

pub const PRECISION: f32 = 1000.0;
const MAGIC: i32 = 1995;
const FIRSTIDX: u32 = 9;

struct BitWriter {
    bytes: Vec<u8>,
    nbits: usize,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            nbits: 0,
        }
    }

    fn write(&mut self, value: u32, nbits: u32) {
        for i in (0..nbits).rev() {
            if self.nbits % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> i) & 1 == 1 {
                let shift = 7 - self.nbits % 8;
                *self.bytes.last_mut().unwrap() |= 1 << shift;
            }
            self.nbits += 1;
        }
    }
}

fn sizeofint(size: u32) -> u32 {
    32 - size.leading_zeros()
}

fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend(v.to_be_bytes());
}

fn put_f32(out: &mut Vec<u8>, v: f32) {
    out.extend(v.to_be_bytes());
}

fn put_vec3(out: &mut Vec<u8>, v: Vec3) {
    for c in v.to_array() {
        put_f32(out, c);
    }
}

/// The position the decoder will produce for `x` after compression.
pub fn quantize(x: Vec3) -> Vec3 {
    let inv = PRECISION.recip();
    ((x * PRECISION).round().as_ivec3()).as_vec3() * inv
}

pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let natoms = frame.natoms() as i32;
    let mut out = Vec::new();
    put_i32(&mut out, MAGIC);
    put_i32(&mut out, natoms);
    put_i32(&mut out, frame.step() as i32);
    put_f32(&mut out, frame.time());
    let boxvec = frame.boxvec();
    put_vec3(&mut out, boxvec.x_axis);
    put_vec3(&mut out, boxvec.y_axis);
    put_vec3(&mut out, boxvec.z_axis);
    put_i32(&mut out, natoms);

    if natoms <= 9 {
        for &position in frame.positions() {
            put_vec3(&mut out, position);
        }
        return out;
    }

    let ints: Vec<[i32; 3]> = frame
        .positions()
        .iter()
        .map(|&x| (x * PRECISION).round().as_ivec3().to_array())
        .collect();
    let mut minint = [i32::MAX; 3];
    let mut maxint = [i32::MIN; 3];
    for coord in &ints {
        for d in 0..3 {
            minint[d] = minint[d].min(coord[d]);
            maxint[d] = maxint[d].max(coord[d]);
        }
    }
    // Force the layout where each coordinate is packed separately.
    maxint[0] = minint[0] + 0x1000000;
    let bitsizes = [0, 1, 2].map(|d| sizeofint((maxint[d] - minint[d]) as u32 + 1));

    let mut bits = BitWriter::new();
    for coord in &ints {
        for d in 0..3 {
            bits.write((coord[d] - minint[d]) as u32, bitsizes[d]);
        }
        bits.write(0, 1); // No run follows.
    }

    put_f32(&mut out, PRECISION);
    for v in minint.into_iter().chain(maxint) {
        put_i32(&mut out, v);
    }
    put_i32(&mut out, FIRSTIDX as i32);
    let count = bits.bytes.len();
    put_i32(&mut out, count as i32);
    out.extend(&bits.bytes);
    out.extend(std::iter::repeat(0).take((4 - count % 4) % 4));
    out
}

pub fn write_xtc(path: impl AsRef<Path>, frames: &[Frame]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    for frame in frames {
        file.write_all(&encode_frame(frame))?;
    }
    file.flush()
}

/// A deterministic trajectory in which frame `i` has step `100 * i` and time `2 * i`.
pub fn make_frames(nframes: usize, natoms: usize) -> Vec<Frame> {
    (0..nframes)
        .map(|i| {
            let boxvec = Mat3::from_diagonal(Vec3::new(3.0, 4.0, 5.0 + i as f32));
            let positions = (0..natoms)
                .map(|a| {
                    let (a, i) = (a as f32, i as f32);
                    Vec3::new(0.25 * a, 0.5 + 0.125 * i, 1.0 - 0.125 * a)
                })
                .collect();
            Frame::new(100 * i as u32, 2.0 * i as f32, boxvec, positions)
        })
        .collect()
}

/// Writes [`make_frames`] to `name` inside `dir` and returns the path.
pub fn fixture(
    dir: &tempfile::TempDir,
    name: &str,
    nframes: usize,
    natoms: usize,
) -> std::path::PathBuf {
    let path = dir.path().join(name);
    write_xtc(&path, &make_frames(nframes, natoms)).unwrap();
    path
}
