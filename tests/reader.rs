use std::io::Cursor;

use gmxtraj::{DecodeError, Header, XTCReader};

mod common;
use common::{encode_frame, make_frames};

fn stream(nframes: usize, natoms: usize) -> Cursor<Vec<u8>> {
    let bytes = make_frames(nframes, natoms)
        .iter()
        .flat_map(encode_frame)
        .collect();
    Cursor::new(bytes)
}

#[test]
fn open() -> std::io::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = common::fixture(&dir, "smol.xtc", 2, 3);
    let mut reader = XTCReader::open(&path)?;
    assert_eq!(reader.natoms().unwrap(), 3);
    assert_eq!(reader.position(), 0);
    Ok(())
}

#[test]
fn header() {
    let mut reader = XTCReader::new(stream(2, 12));
    let header = reader.read_header().unwrap();
    assert_eq!(header.magic, XTCReader::<Cursor<Vec<u8>>>::MAGIC);
    assert_eq!(header.natoms, 12);
    assert_eq!(header.natoms_repeated, 12);
    assert_eq!(header.step, 0);
    assert_eq!(reader.file.position(), Header::SIZE as u64);
}

fn home(natoms: usize) {
    let mut reader = XTCReader::new(stream(4, natoms));

    // Go through the frames a first time.
    let mut n1 = 0;
    while reader.read_frame().is_ok() {
        n1 += 1;
    }
    assert!(
        matches!(reader.read_frame(), Err(DecodeError::EndOfStream)),
        "reader should be done by now"
    );

    reader.home().unwrap();
    assert_eq!(reader.position(), 0);

    // Go through the frames again, skipping the odd ones.
    let mut n2 = 0;
    let mut steps = Vec::new();
    loop {
        let next = if n2 % 2 == 0 {
            reader.read_frame().map(|frame| frame.step())
        } else {
            reader.skip_frame().map(|header| header.step)
        };
        match next {
            Ok(step) => steps.push(step),
            Err(DecodeError::EndOfStream) => break,
            Err(err) => panic!("unexpected error: {err}"),
        }
        n2 += 1;
    }

    assert_eq!(n1, n2, "the number of frames that were read should match");
    assert_eq!(reader.position(), 4);
    assert_eq!(steps, [0, 100, 200, 300]);
}

#[test]
fn home_uncompressed() {
    home(3);
}

#[test]
fn home_compressed() {
    home(25);
}

#[test]
fn natoms_keeps_position() {
    let mut reader = XTCReader::new(stream(3, 5));
    reader.read_frame().unwrap();
    let offset = reader.file.position();
    assert_eq!(reader.natoms().unwrap(), 5);
    assert_eq!(reader.file.position(), offset);
    assert_eq!(reader.read_frame().unwrap().step(), 100);
}

#[test]
fn negative_atom_count() {
    let mut bytes = encode_frame(&make_frames(1, 3)[0]);
    bytes[4..8].copy_from_slice(&(-3i32).to_be_bytes());
    let mut reader = XTCReader::new(Cursor::new(bytes));
    assert!(matches!(
        reader.read_frame(),
        Err(DecodeError::AtomCount(-3))
    ));
}

#[test]
fn repeated_atom_count_differs() {
    let mut bytes = encode_frame(&make_frames(1, 3)[0]);
    bytes[52..56].copy_from_slice(&4i32.to_be_bytes());
    let mut reader = XTCReader::new(Cursor::new(bytes));
    assert!(matches!(
        reader.read_header(),
        Err(DecodeError::AtomCountMismatch { header: 3, block: 4 })
    ));
}

#[test]
fn truncated_frame() {
    let mut bytes = encode_frame(&make_frames(1, 30)[0]);
    bytes.truncate(bytes.len() - 5);
    let mut reader = XTCReader::new(Cursor::new(bytes.clone()));
    let err = reader.read_frame().unwrap_err();
    assert!(err.is_truncated(), "{err}");

    let mut reader = XTCReader::new(Cursor::new(bytes));
    assert!(reader.skip_frame().unwrap_err().is_truncated());
    assert_eq!(reader.position(), 0);
}

#[test]
fn negative_step() {
    let mut bytes = encode_frame(&make_frames(1, 3)[0]);
    bytes[8..12].copy_from_slice(&(-1i32).to_be_bytes());
    let mut reader = XTCReader::new(Cursor::new(bytes));
    assert!(matches!(reader.read_header(), Err(DecodeError::Step(-1))));
}

#[test]
fn huge_atom_count() {
    let mut bytes = encode_frame(&make_frames(1, 12)[0]);
    bytes[4..8].copy_from_slice(&i32::MAX.to_be_bytes());
    bytes[52..56].copy_from_slice(&i32::MAX.to_be_bytes());

    let mut reader = XTCReader::new(Cursor::new(bytes.clone()));
    assert_eq!(reader.natoms().unwrap(), i32::MAX as usize);
    assert!(reader.read_frame().is_err());
    assert_eq!(reader.position(), 0);

    let mut reader = XTCReader::new(Cursor::new(bytes));
    assert!(reader.skip_frame().is_ok());
    assert_eq!(reader.position(), 1);
}
