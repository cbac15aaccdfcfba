//! # rncpack
//!
//! Compress and expand data in the RNC method 1 format ("ProPack"), as found inside
//! the archives of many 1990s games.  The codec works on byte buffers; locating a packed
//! region inside an archive is up to the caller, see `Options::in_offset`.
//!
//! * `rnc::compress_slice` and `rnc::expand_slice` transform buffers
//! * `rnc::compress` and `rnc::expand` transform seekable streams
//!
//! The encoder reproduces the block, token, and Huffman choices of the existing tools
//! bit-for-bit, so that repacked archives stay byte-identical.

mod tools;
pub mod rnc;

type DYNERR = Box<dyn std::error::Error>;

/// Codec Errors
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("file format mismatch")]
    FileFormatMismatch,
    #[error("file too large")]
    FileTooLarge,
    #[error("RNC signature not found")]
    InvalidMagic,
    #[error("RNC method {0} is not supported")]
    UnsupportedMethod(u8),
    #[error("malformed Huffman table")]
    MalformedTable,
    #[error("block has no tokens")]
    EmptyBlock,
    #[error("packed data CRC mismatch, header has {expected:04X}, computed {actual:04X}")]
    PackedCrcMismatch { expected: u16, actual: u16 },
    #[error("unpacked data CRC mismatch, header has {expected:04X}, computed {actual:04X}")]
    UnpackedCrcMismatch { expected: u16, actual: u16 },
    #[error("truncated input")]
    TruncatedInput,
    #[error("back reference of {offset} bytes with only {available} bytes expanded")]
    BadBackReference { offset: usize, available: usize },
    #[error("expanded data overruns the declared size")]
    OutputOverrun,
    #[error("{0} blocks do not fit in the RNC header")]
    TooManyBlocks(usize)
}

/// Broad classes of `Error`, for callers that only care about what went wrong in general.
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum ErrorClass {
    /// the data is not RNC, or its structure is broken
    Format,
    /// a CRC does not match
    Integrity,
    /// a length or distance points outside the available data
    Bounds,
    /// the data cannot be represented within the format's limits
    Limit
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::FileFormatMismatch | Self::InvalidMagic | Self::UnsupportedMethod(_) |
            Self::MalformedTable | Self::EmptyBlock => ErrorClass::Format,
            Self::PackedCrcMismatch {..} | Self::UnpackedCrcMismatch {..} => ErrorClass::Integrity,
            Self::TruncatedInput | Self::BadBackReference {..} | Self::OutputOverrun => ErrorClass::Bounds,
            Self::FileTooLarge | Self::TooManyBlocks(_) => ErrorClass::Limit
        }
    }
}

/// Options controlling compression and expansion
#[derive(Clone)]
pub struct Options {
    /// fail if the CRC of the expanded data does not match the header,
    /// otherwise log a warning and keep the data
    pub strict_crc: bool,
    /// starting position in the input file
    pub in_offset: u64,
    /// starting position in the output file
    pub out_offset: u64,
    /// return error if the expanded data is larger
    pub max_file_size: u64
}

pub const STD_OPTIONS: Options = Options {
    strict_crc: true,
    in_offset: 0,
    out_offset: 0,
    max_file_size: u32::MAX as u64
};

#[test]
fn error_classes() {
    assert_eq!(Error::InvalidMagic.class(),ErrorClass::Format);
    assert_eq!(Error::PackedCrcMismatch { expected: 1, actual: 2 }.class(),ErrorClass::Integrity);
    assert_eq!(Error::BadBackReference { offset: 4, available: 1 }.class(),ErrorClass::Bounds);
    assert_eq!(Error::TooManyBlocks(256).class(),ErrorClass::Limit);
}
