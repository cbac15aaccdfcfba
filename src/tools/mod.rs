//! Low level pieces shared by packing and unpacking.

pub mod bit_stream;
pub mod canonical_huff;
pub mod crc16;
