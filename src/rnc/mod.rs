//! # RNC Method 1
//!
//! LZ77 with a 32K window, where literal run lengths, distances, and match lengths are
//! Huffman coded in blocks.  The container has an 18 byte header with CRCs of both the
//! packed and unpacked data, see `Header`.
//!
//! The stream functions can work on a container embedded in a larger file, using
//! `Options::in_offset` and `Options::out_offset`.

use std::io::{Read,Write,Seek,SeekFrom,BufReader,BufWriter};
use crate::{DYNERR,Error,Options};

mod header;
mod pack;
mod unpack;

pub use header::{Header,Method,HEADER_LEN};

/// Expanded data from `expand_slice_lenient`
#[derive(Debug,PartialEq)]
pub enum Expanded {
    Verified(Vec<u8>),
    /// data was fully decoded but its CRC does not match the header
    CrcMismatch { data: Vec<u8>, expected: u16, actual: u16 }
}

impl Expanded {
    pub fn into_data(self) -> Vec<u8> {
        match self {
            Self::Verified(data) => data,
            Self::CrcMismatch { data, .. } => data
        }
    }
}

/// Read the header of a container without decoding anything
pub fn header(slice: &[u8]) -> Result<Header,Error> {
    Header::parse(slice)
}

/// Does the slice start with a method 1 signature
pub fn is_packed(slice: &[u8]) -> bool {
    slice.starts_with(b"RNC\x01")
}

fn unpack_checked(buf: &[u8],opt: &Options) -> Result<Expanded,Error> {
    let header = Header::parse(buf)?;
    if header.unpacked_size as u64 > opt.max_file_size {
        return Err(Error::FileTooLarge);
    }
    let unpacked = unpack::unpack(buf)?;
    if unpacked.crc == unpacked.header.unpacked_crc {
        Ok(Expanded::Verified(unpacked.data))
    } else {
        Ok(Expanded::CrcMismatch { data: unpacked.data, expected: unpacked.header.unpacked_crc, actual: unpacked.crc })
    }
}

fn apply_crc_policy(expanded: Expanded,opt: &Options) -> Result<Vec<u8>,Error> {
    match expanded {
        Expanded::Verified(data) => Ok(data),
        Expanded::CrcMismatch { expected, actual, .. } if opt.strict_crc => {
            Err(Error::UnpackedCrcMismatch { expected, actual })
        },
        Expanded::CrcMismatch { data, expected, actual } => {
            log::warn!("unpacked CRC is {:04X}, header has {:04X}, keeping the data",actual,expected);
            Ok(data)
        }
    }
}

fn skip_to_offset<'a>(slice: &'a [u8],opt: &Options) -> Result<&'a [u8],Error> {
    if opt.in_offset > slice.len() as u64 {
        return Err(Error::FileFormatMismatch);
    }
    Ok(&slice[opt.in_offset as usize..])
}

/// Main compression function.
/// `expanded_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Everything from `opt.in_offset` to the end of the input is packed.
/// Returns (in_size,out_size) or error.
pub fn compress<R,W>(expanded_in: &mut R, compressed_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let mut reader = BufReader::new(expanded_in);
    let mut writer = BufWriter::new(compressed_out);
    let mut expanded_length = reader.seek(SeekFrom::End(0))?;
    if opt.in_offset > expanded_length {
        return Err(Box::new(Error::FileFormatMismatch));
    }
    expanded_length -= opt.in_offset;
    if expanded_length > opt.max_file_size {
        return Err(Box::new(Error::FileTooLarge));
    }
    reader.seek(SeekFrom::Start(opt.in_offset))?;
    let mut dat = Vec::new();
    reader.read_to_end(&mut dat)?;
    let packed = pack::pack(&dat)?;
    writer.seek(SeekFrom::Start(opt.out_offset))?;
    writer.write_all(&packed)?;
    writer.flush()?;
    Ok((expanded_length,packed.len() as u64))
}

/// Main expansion function.
/// `compressed_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `expanded_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Only the container found at `opt.in_offset` is read, anything after it is left alone.
/// Returns (in_size,out_size) or error.
pub fn expand<R,W>(compressed_in: &mut R, expanded_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let mut reader = BufReader::new(compressed_in);
    let mut writer = BufWriter::new(expanded_out);
    let mut available = reader.seek(SeekFrom::End(0))?;
    if opt.in_offset > available {
        return Err(Box::new(Error::FileFormatMismatch));
    }
    available -= opt.in_offset;
    reader.seek(SeekFrom::Start(opt.in_offset))?;
    let mut buf = Vec::new();
    reader.by_ref().take(HEADER_LEN as u64).read_to_end(&mut buf)?;
    let header = Header::parse(&buf)?;
    log::debug!("container declares {} packed bytes, {} unpacked bytes",header.packed_size,header.unpacked_size);
    if header.unpacked_size as u64 > opt.max_file_size {
        return Err(Box::new(Error::FileTooLarge));
    }
    let container_length = HEADER_LEN as u64 + header.packed_size as u64;
    reader.by_ref().take(header.packed_size as u64).read_to_end(&mut buf)?;
    if available > container_length {
        log::warn!("ignoring {} bytes after the container",available - container_length);
    }
    let expanded = apply_crc_policy(unpack_checked(&buf,opt)?,opt)?;
    writer.seek(SeekFrom::Start(opt.out_offset))?;
    writer.write_all(&expanded)?;
    writer.flush()?;
    Ok((container_length,expanded.len() as u64))
}

/// Convenience function, compresses a slice returning a Vec.
/// `opt.in_offset` is honored, `opt.out_offset` only applies to streams.
pub fn compress_slice(slice: &[u8],opt: &Options) -> Result<Vec<u8>,Error> {
    let dat = skip_to_offset(slice,opt)?;
    if dat.len() as u64 > opt.max_file_size {
        return Err(Error::FileTooLarge);
    }
    pack::pack(dat)
}

/// Convenience function, expands a slice returning a Vec.
/// `opt.in_offset` is honored, `opt.out_offset` only applies to streams.
pub fn expand_slice(slice: &[u8],opt: &Options) -> Result<Vec<u8>,Error> {
    let buf = skip_to_offset(slice,opt)?;
    apply_crc_policy(unpack_checked(buf,opt)?,opt)
}

/// Expand a slice, keeping the data if only the unpacked CRC is wrong.
/// Any other failure is still an error, `opt.strict_crc` is not consulted.
pub fn expand_slice_lenient(slice: &[u8],opt: &Options) -> Result<Expanded,Error> {
    let buf = skip_to_offset(slice,opt)?;
    unpack_checked(buf,opt)
}

/// Deterministic text-like test data with plenty of repeats at assorted distances
#[cfg(test)]
pub(crate) fn word_salad(n: usize) -> Vec<u8> {
    const WORDS: [&[u8];14] = [b"the",b"quick",b"brown",b"fox",b"jumps",b"over",b"lazy",b"dog",
        b"RNC",b"archive",b"sprite",b"palette",b"\x00\x01\x02",b"\xff\xfe"];
    let mut x: u64 = 12345;
    let mut ans = Vec::new();
    while ans.len() < n {
        x = (x * 1103515245 + 12345) & 0x7fffffff;
        ans.extend_from_slice(WORDS[(x >> 16) as usize % WORDS.len()]);
        ans.push(match (x >> 8) & 3 {
            0 => b'\n',
            _ => b' '
        });
    }
    ans.truncate(n);
    ans
}

#[cfg(test)]
fn hello_container() -> Vec<u8> {
    [hex::decode("524e4301000000050000000d34d2cbe200011000880001020004").unwrap(),b"hello".to_vec()].concat()
}

#[test]
fn round_trips() {
    let mut cases: Vec<Vec<u8>> = vec![
        Vec::new(),
        b"x".to_vec(),
        b"I am Sam. Sam I am. I do not like this Sam I am.\n".to_vec(),
        vec![0;70000],
        word_salad(100000),
        (0..40000).map(|i: u32| (i.wrapping_mul(2654435761) >> 13) as u8).collect()
    ];
    cases.push(cases[4].iter().rev().cloned().collect());
    for dat in cases {
        let packed = compress_slice(&dat,&crate::STD_OPTIONS).expect("compression failed");
        assert!(is_packed(&packed));
        assert_eq!(header(&packed).expect("header").unpacked_size as usize,dat.len());
        let expanded = expand_slice(&packed,&crate::STD_OPTIONS).expect("expansion failed");
        assert_eq!(expanded,dat);
    }
}

#[test]
fn crc_policy() {
    let mut buf = hello_container();
    buf[12] = 0x12;
    buf[13] = 0x34;
    let mut opt = crate::STD_OPTIONS;
    assert!(matches!(expand_slice(&buf,&opt),Err(Error::UnpackedCrcMismatch { expected: 0x1234, actual: 0x34d2 })));
    opt.strict_crc = false;
    assert_eq!(expand_slice(&buf,&opt).expect("lenient"),b"hello");
    assert_eq!(expand_slice_lenient(&buf,&crate::STD_OPTIONS).expect("lenient"),Expanded::CrcMismatch {
        data: b"hello".to_vec(),
        expected: 0x1234,
        actual: 0x34d2
    });
    assert_eq!(expand_slice_lenient(&buf,&crate::STD_OPTIONS).expect("lenient").into_data(),b"hello");
    assert_eq!(expand_slice_lenient(&hello_container(),&crate::STD_OPTIONS).expect("verified"),Expanded::Verified(b"hello".to_vec()));
    // packed CRC is never forgiven
    let mut buf = hello_container();
    buf[14] ^= 1;
    assert!(matches!(expand_slice_lenient(&buf,&crate::STD_OPTIONS),Err(Error::PackedCrcMismatch { .. })));
}

#[test]
fn embedded_container() {
    let archive = [b"LEADER".to_vec(),hello_container(),b"TRAILER".to_vec()].concat();
    let mut opt = crate::STD_OPTIONS;
    opt.in_offset = 6;
    opt.out_offset = 3;
    let mut src = std::io::Cursor::new(&archive);
    let mut ans = std::io::Cursor::new(Vec::new());
    let (in_size,out_size) = expand(&mut src,&mut ans,&opt).expect("expansion failed");
    assert_eq!((in_size,out_size),(31,5));
    assert_eq!(ans.into_inner(),b"\x00\x00\x00hello");
    assert_eq!(expand_slice(&archive,&opt).expect("expansion failed"),b"hello");
    assert_eq!(expand_slice_lenient(&archive,&opt).expect("expansion failed"),Expanded::Verified(b"hello".to_vec()));

    let mut src = std::io::Cursor::new(b"LEADERhello".to_vec());
    let mut ans = std::io::Cursor::new(Vec::new());
    opt.out_offset = 0;
    let (in_size,out_size) = compress(&mut src,&mut ans,&opt).expect("compression failed");
    assert_eq!((in_size,out_size),(5,31));
    assert_eq!(ans.into_inner(),hello_container());
}

#[test]
fn rejected_input() {
    let mut opt = crate::STD_OPTIONS;
    opt.in_offset = 100;
    assert!(matches!(expand_slice(&hello_container(),&opt),Err(Error::FileFormatMismatch)));
    assert!(matches!(expand_slice_lenient(&hello_container(),&opt),Err(Error::FileFormatMismatch)));
    assert!(matches!(compress_slice(b"hello",&opt),Err(Error::FileFormatMismatch)));
    let mut opt = crate::STD_OPTIONS;
    opt.max_file_size = 4;
    assert!(matches!(expand_slice(&hello_container(),&opt),Err(Error::FileTooLarge)));
    assert!(matches!(expand_slice_lenient(&hello_container(),&opt),Err(Error::FileTooLarge)));
    assert!(matches!(compress_slice(b"hello",&opt),Err(Error::FileTooLarge)));
    assert!(matches!(expand_slice(b"PK\x03\x04",&crate::STD_OPTIONS),Err(Error::InvalidMagic)));
    let mut buf = hello_container();
    buf[3] = 2;
    assert!(!is_packed(&buf));
    assert!(matches!(expand_slice(&buf,&crate::STD_OPTIONS),Err(Error::UnsupportedMethod(2))));
}

#[test]
fn block_limit() {
    // every block covers at most 0x3000 bytes
    let dat = vec![0;256 * 0x3000 + 1];
    match compress_slice(&dat,&crate::STD_OPTIONS) {
        Err(Error::TooManyBlocks(n)) => assert!(n > 255),
        _ => panic!("expected too many blocks")
    }
}
