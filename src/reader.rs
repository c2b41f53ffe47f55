//! XDR primitives and the xtc coordinate decompression scheme.
use std::io::{self, Read};

use glam::Vec3;

use crate::error::DecodeError;
use crate::BoxVec;

#[rustfmt::skip]
pub const MAGICINTS: [i32; 73] = [
    0,        0,        0,       0,       0,       0,       0,       0,       0,       8,
    10,       12,       16,      20,      25,      32,      40,      50,      64,      80,
    101,      128,      161,     203,     256,     322,     406,     512,     645,     812,
    1024,     1290,     1625,    2048,    2580,    3250,    4096,    5060,    6501,    8192,
    10321,    13003,    16384,   20642,   26007,   32768,   41285,   52015,   65536,   82570,
    104031,   131072,   165140,  208063,  262144,  330280,  416127,  524287,  660561,  832255,
    1048576,  1321122,  1664510, 2097152, 2642245, 3329021, 4194304, 5284491, 6658042, 8388607,
    10568983, 13316085, 16777216
];
pub const FIRSTIDX: usize = 9; // Note that MAGICINTS[FIRSTIDX-1] == 0.

/// Number of bytes between the precision and the opaque block: minint, maxint and smallidx.
pub const NBYTES_POSITIONS_PRELUDE: usize = (3 + 3 + 1) * 4;

/// Upper bound on the positions reserved ahead of decoding, since the atom count of a corrupt
/// header can be arbitrarily large.
pub(crate) const RESERVE_LIMIT: usize = 1 << 20;

/// XDR pads opaque data to a multiple of four bytes.
pub const fn padding(count: usize) -> usize {
    (4 - (count % 4)) % 4
}

/// Reads the magic number that opens a frame.
///
/// Returns [`None`] if the stream ends cleanly before it.
pub(crate) fn read_magic<R: Read>(file: &mut R) -> io::Result<Option<i32>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(Some(i32::from_be_bytes(buf)))
}

pub(crate) fn read_i32<R: Read>(file: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

pub(crate) fn read_u32<R: Read>(file: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

pub(crate) fn read_f32<R: Read>(file: &mut R) -> io::Result<f32> {
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    Ok(f32::from_be_bytes(buf))
}

fn read_i32s<R: Read>(file: &mut R) -> io::Result<[i32; 3]> {
    Ok([read_i32(file)?, read_i32(file)?, read_i32(file)?])
}

fn read_vec3<R: Read>(file: &mut R) -> io::Result<Vec3> {
    Ok(Vec3::new(read_f32(file)?, read_f32(file)?, read_f32(file)?))
}

/// Reads the nine floats of a box. Each consecutive triplet is one box vector, so they become
/// the columns of the matrix.
pub(crate) fn read_boxvec<R: Read>(file: &mut R) -> io::Result<BoxVec> {
    let a = read_vec3(file)?;
    let b = read_vec3(file)?;
    let c = read_vec3(file)?;
    Ok(BoxVec::from_cols(a, b, c))
}

/// Reads `natoms` uncompressed positions, as stored for systems of at most nine atoms.
pub(crate) fn read_uncompressed_positions<R: Read>(
    file: &mut R,
    natoms: usize,
    positions: &mut Vec<Vec3>,
) -> io::Result<()> {
    positions.reserve(natoms.min(RESERVE_LIMIT));
    for _ in 0..natoms {
        positions.push(read_vec3(file)?);
    }
    Ok(())
}

/// Reads an XDR opaque block into `data`, including its trailing padding.
///
/// The buffer only grows as far as the stream actually has bytes, whatever size the block claims.
pub(crate) fn read_opaque<R: Read>(file: &mut R, data: &mut Vec<u8>) -> io::Result<()> {
    let count = read_u32(file)? as usize;
    let nbytes = count as u64 + padding(count) as u64;
    data.clear();
    let read = file.by_ref().take(nbytes).read_to_end(data)?;
    if (read as u64) < nbytes {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

/// Consumes `nbytes` from the reader without keeping them.
pub(crate) fn discard<R: Read>(file: &mut R, nbytes: u64) -> io::Result<()> {
    let copied = io::copy(&mut file.by_ref().take(nbytes), &mut io::sink())?;
    if copied < nbytes {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

/// Skips the compressed coordinate payload that follows the repeated atom count.
pub(crate) fn skip_compressed_positions<R: Read>(file: &mut R) -> io::Result<()> {
    // Precision and prelude.
    discard(file, 4 + NBYTES_POSITIONS_PRELUDE as u64)?;
    let count = read_u32(file)? as usize;
    discard(file, (count + padding(count)) as u64)
}

/// Big-endian bit stream over the compressed bytes of one frame.
struct BitReader<'b> {
    buf: &'b [u8],
    count: usize,
    lastbits: u32,
    lastbyte: u32,
}

impl<'b> BitReader<'b> {
    fn new(buf: &'b [u8]) -> Self {
        Self {
            buf,
            count: 0,
            lastbits: 0,
            lastbyte: 0,
        }
    }

    #[inline]
    fn next_byte(&mut self) -> Result<u32, DecodeError> {
        let byte = *self
            .buf
            .get(self.count)
            .ok_or(DecodeError::Corrupt("bit stream ended early"))?;
        self.count += 1;
        Ok(byte as u32)
    }

    /// Reads `nbits` (at most 32) bits as an unsigned integer.
    fn bits(&mut self, nbits: u32) -> Result<u32, DecodeError> {
        debug_assert!(nbits <= 32);
        let mask = if nbits >= 32 {
            u32::MAX
        } else {
            (1u32 << nbits) - 1
        };

        let mut left = nbits;
        let mut num: u32 = 0;
        while left >= 8 {
            self.lastbyte = (self.lastbyte << 8) | self.next_byte()?;
            num |= ((self.lastbyte >> self.lastbits) & 0xff) << (left - 8);
            left -= 8;
        }
        if left > 0 {
            if self.lastbits < left {
                self.lastbits += 8;
                self.lastbyte = (self.lastbyte << 8) | self.next_byte()?;
            }
            self.lastbits -= left;
            num |= (self.lastbyte >> self.lastbits) & ((1u32 << left) - 1);
        }

        Ok(num & mask)
    }

    /// Reads three integers that were packed together into `nbits` bits using the mixed radix
    /// given by `sizes`.
    fn ints(&mut self, nbits: u32, sizes: [u32; 3]) -> Result<[i32; 3], DecodeError> {
        // The packed value is stored least significant byte first.
        let mut bytes = [0u8; 32];
        let mut nbytes = 0;
        let mut left = nbits;
        while left > 8 {
            bytes[nbytes] = self.bits(8)? as u8;
            nbytes += 1;
            left -= 8;
        }
        if left > 0 {
            bytes[nbytes] = self.bits(left)? as u8;
            nbytes += 1;
        }

        if nbytes <= 8 {
            let v = bytes[..8]
                .iter()
                .rev()
                .fold(0u64, |acc, &byte| (acc << 8) | byte as u64);
            let sz = sizes[2] as u64;
            let szy = sz * sizes[1] as u64;
            let x = v / szy;
            let q = v - x * szy;
            let y = q / sz;
            let z = q - y * sz;
            return Ok([x as i32, y as i32, z as i32]);
        }

        // Long division of the byte string, peeling off z and then y.
        let mut nums = [0i32; 3];
        for i in (1..3).rev() {
            let mut num: u32 = 0;
            for byte in bytes[..nbytes].iter_mut().rev() {
                num = (num << 8) | *byte as u32;
                let p = num / sizes[i];
                *byte = p as u8;
                num -= p * sizes[i];
            }
            nums[i] = num as i32;
        }
        nums[0] = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        Ok(nums)
    }
}

const fn sizeofint(size: u32) -> u32 {
    let mut n: u64 = 1;
    let mut nbits = 0;
    while size as u64 >= n && nbits < 32 {
        nbits += 1;
        n <<= 1;
    }
    nbits
}

/// The number of bits needed to store the product of the three sizes.
fn sizeofints(sizes: [u32; 3]) -> u32 {
    let mut bytes = [0u8; 32];
    bytes[0] = 1;
    let mut nbytes = 1;

    for size in sizes {
        let mut tmp: u64 = 0;
        let mut bytecount = 0;
        while bytecount < nbytes {
            tmp += bytes[bytecount] as u64 * size as u64;
            bytes[bytecount] = (tmp & 0xff) as u8;
            tmp >>= 8;
            bytecount += 1;
        }
        while tmp != 0 {
            bytes[bytecount] = (tmp & 0xff) as u8;
            bytecount += 1;
            tmp >>= 8;
        }
        nbytes = bytecount;
    }

    let mut num = 1u32;
    let mut nbits = 0;
    nbytes -= 1;
    while bytes[nbytes] as u32 >= num {
        nbits += 1;
        num *= 2;
    }
    nbytes as u32 * 8 + nbits
}

/// Packing layout of the full-width coordinates of a frame.
enum Packing {
    /// All three coordinates share one mixed-radix integer of this many bits.
    Joint { bitsize: u32, sizes: [u32; 3] },
    /// The ranges are too large to be multiplied, so each coordinate has its own width.
    Separate { bitsizes: [u32; 3] },
}

impl Packing {
    fn new(minint: [i32; 3], maxint: [i32; 3]) -> Result<Self, DecodeError> {
        let mut sizes = [0u32; 3];
        for d in 0..3 {
            let range = (maxint[d] as i64) - (minint[d] as i64) + 1;
            sizes[d] = u32::try_from(range)
                .ok()
                .filter(|&size| size > 0)
                .ok_or(DecodeError::Corrupt("maxint is smaller than minint"))?;
        }

        if (sizes[0] | sizes[1] | sizes[2]) > 0xffffff {
            Ok(Self::Separate {
                bitsizes: sizes.map(sizeofint),
            })
        } else {
            Ok(Self::Joint {
                bitsize: sizeofints(sizes),
                sizes,
            })
        }
    }

    fn read(&self, bits: &mut BitReader) -> Result<[i32; 3], DecodeError> {
        match *self {
            Packing::Joint { bitsize, sizes } => bits.ints(bitsize, sizes),
            Packing::Separate { bitsizes } => Ok([
                bits.bits(bitsizes[0])? as i32,
                bits.bits(bitsizes[1])? as i32,
                bits.bits(bitsizes[2])? as i32,
            ]),
        }
    }
}

fn magicint(idx: usize) -> Result<i32, DecodeError> {
    match MAGICINTS.get(idx) {
        Some(&0) | None => Err(DecodeError::Corrupt("small-integer index out of range")),
        Some(&v) => Ok(v),
    }
}

/// Decompresses the positions of `natoms` atoms and appends them to `positions`.
///
/// The reader must be positioned right after the precision value of the frame. `scratch` is
/// reused for the compressed bytes.
pub(crate) fn read_compressed_positions<R: Read>(
    file: &mut R,
    natoms: usize,
    precision: f32,
    positions: &mut Vec<Vec3>,
    scratch: &mut Vec<u8>,
) -> Result<(), DecodeError> {
    let invprecision = precision.recip();
    let start = positions.len();
    let target = start + natoms;
    positions.reserve(natoms.min(RESERVE_LIMIT));

    let minint = read_i32s(file)?;
    let maxint = read_i32s(file)?;
    let mut smallidx = read_u32(file)? as usize;
    let packing = Packing::new(minint, maxint)?;

    if !(FIRSTIDX..MAGICINTS.len()).contains(&smallidx) {
        return Err(DecodeError::Corrupt("small-integer index out of range"));
    }
    let mut smaller = MAGICINTS[usize::max(FIRSTIDX, smallidx - 1)] / 2;
    let mut smallnum = MAGICINTS[smallidx] / 2;
    let mut sizesmall = [MAGICINTS[smallidx] as u32; 3];

    read_opaque(file, scratch)?;
    let mut bits = BitReader::new(scratch);

    let push = |positions: &mut Vec<Vec3>, coord: [i32; 3]| {
        if positions.len() >= target {
            return Err(DecodeError::Corrupt("more positions than atoms"));
        }
        positions.push(Vec3::new(
            coord[0] as f32 * invprecision,
            coord[1] as f32 * invprecision,
            coord[2] as f32 * invprecision,
        ));
        Ok(())
    };

    // The run length carries over to following atoms until a new one is flagged.
    let mut run: i32 = 0;
    let mut i = 0;
    while i < natoms {
        let mut coord = packing.read(&mut bits)?;
        for d in 0..3 {
            coord[d] = coord[d].wrapping_add(minint[d]);
        }
        let mut prevcoord = coord;

        let mut is_smaller = 0;
        if bits.bits(1)? == 1 {
            run = bits.bits(5)? as i32;
            is_smaller = run % 3;
            run -= is_smaller;
            is_smaller -= 1;
        }

        if run > 0 {
            for k in (0..run).step_by(3) {
                let delta = bits.ints(smallidx as u32, sizesmall)?;
                i += 1;
                for d in 0..3 {
                    coord[d] = delta[d]
                        .wrapping_add(prevcoord[d])
                        .wrapping_sub(smallnum);
                }
                if k == 0 {
                    // Water is stored as OHH for better compression. Swapping the first two
                    // atoms of the run turns it back into HOH order.
                    std::mem::swap(&mut coord, &mut prevcoord);
                    push(positions, prevcoord)?;
                } else {
                    prevcoord = coord;
                }
                push(positions, coord)?;
            }
        } else {
            push(positions, coord)?;
        }

        match is_smaller.cmp(&0) {
            std::cmp::Ordering::Less => {
                smallidx = smallidx
                    .checked_sub(1)
                    .ok_or(DecodeError::Corrupt("small-integer index out of range"))?;
                smallnum = smaller;
                smaller = if smallidx > FIRSTIDX {
                    MAGICINTS[smallidx - 1] / 2
                } else {
                    0
                };
            }
            std::cmp::Ordering::Greater => {
                smallidx += 1;
                smaller = smallnum;
                smallnum = magicint(smallidx)? / 2;
            }
            std::cmp::Ordering::Equal => {}
        }
        sizesmall = [magicint(smallidx)? as u32; 3];
        i += 1;
    }

    if positions.len() != target {
        return Err(DecodeError::Corrupt("fewer positions than atoms"));
    }
    Ok(())
}
