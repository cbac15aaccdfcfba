//! The 18 byte container header.  All fields are big endian.
//!
//! | Offset | Size | Field |
//! | ------ | ---- | ----- |
//! | 0x00   | 3    | signature "RNC" |
//! | 0x03   | 1    | method |
//! | 0x04   | 4    | unpacked size |
//! | 0x08   | 4    | packed size, not counting the header |
//! | 0x0C   | 2    | CRC of the unpacked data |
//! | 0x0E   | 2    | CRC of the packed data |
//! | 0x10   | 1    | leeway needed for unpacking in place |
//! | 0x11   | 1    | number of blocks |

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::fmt;
use crate::Error;

pub const HEADER_LEN: usize = 18;
const SIGNATURE: &[u8;3] = b"RNC";

/// Packing method from the fourth signature byte
#[derive(FromPrimitive,Debug,Clone,Copy,PartialEq,Eq)]
pub enum Method {
    /// LZ77 with Huffman coded blocks
    One = 1,
    /// LZ77 with flag bits, not supported
    Two = 2
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub struct Header {
    pub method: Method,
    pub unpacked_size: u32,
    pub packed_size: u32,
    pub unpacked_crc: u16,
    pub packed_crc: u16,
    pub leeway: u8,
    pub blocks: u8
}

impl Header {
    /// Parse the header at the start of `buf`, only method 1 is accepted.
    pub fn parse(buf: &[u8]) -> Result<Self,Error> {
        if buf.len() < 4 || &buf[0..3] != SIGNATURE {
            return Err(Error::InvalidMagic);
        }
        let method = match Method::from_u8(buf[3]) {
            Some(Method::One) => Method::One,
            Some(other) => return Err(Error::UnsupportedMethod(other as u8)),
            None => return Err(Error::InvalidMagic)
        };
        if buf.len() < HEADER_LEN {
            return Err(Error::TruncatedInput);
        }
        let be32 = |i: usize| u32::from_be_bytes([buf[i],buf[i+1],buf[i+2],buf[i+3]]);
        let be16 = |i: usize| u16::from_be_bytes([buf[i],buf[i+1]]);
        Ok(Self {
            method,
            unpacked_size: be32(4),
            packed_size: be32(8),
            unpacked_crc: be16(12),
            packed_crc: be16(14),
            leeway: buf[16],
            blocks: buf[17]
        })
    }
    pub fn to_bytes(&self) -> [u8;HEADER_LEN] {
        let mut ans = [0;HEADER_LEN];
        ans[0..3].copy_from_slice(SIGNATURE);
        ans[3] = self.method as u8;
        ans[4..8].copy_from_slice(&self.unpacked_size.to_be_bytes());
        ans[8..12].copy_from_slice(&self.packed_size.to_be_bytes());
        ans[12..14].copy_from_slice(&self.unpacked_crc.to_be_bytes());
        ans[14..16].copy_from_slice(&self.packed_crc.to_be_bytes());
        ans[16] = self.leeway;
        ans[17] = self.blocks;
        ans
    }
}

impl fmt::Display for Header {
    fn fmt(&self,f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f,"method: {}",self.method as u8)?;
        writeln!(f,"unpacked size: {}",self.unpacked_size)?;
        writeln!(f,"packed size: {}",self.packed_size)?;
        writeln!(f,"unpacked CRC: {:04X}",self.unpacked_crc)?;
        writeln!(f,"packed CRC: {:04X}",self.packed_crc)?;
        writeln!(f,"leeway: {}",self.leeway)?;
        write!(f,"blocks: {}",self.blocks)
    }
}

#[test]
fn parse_header() {
    let buf = hex::decode("524e4301000000050000000d34d2cbe20001").unwrap();
    let header = Header::parse(&buf).expect("parse failed");
    assert_eq!(header,Header {
        method: Method::One,
        unpacked_size: 5,
        packed_size: 13,
        unpacked_crc: 0x34d2,
        packed_crc: 0xcbe2,
        leeway: 0,
        blocks: 1
    });
    assert_eq!(header.to_bytes().to_vec(),buf);
}

#[test]
fn reject_headers() {
    assert!(matches!(Header::parse(b"RNX\x01"),Err(Error::InvalidMagic)));
    assert!(matches!(Header::parse(b"RN"),Err(Error::InvalidMagic)));
    assert!(matches!(Header::parse(b"RNC\x07"),Err(Error::InvalidMagic)));
    assert!(matches!(Header::parse(b"RNC\x02\x00\x00"),Err(Error::UnsupportedMethod(2))));
    assert!(matches!(Header::parse(b"RNC\x01\x00\x00\x00\x05"),Err(Error::TruncatedInput)));
}
