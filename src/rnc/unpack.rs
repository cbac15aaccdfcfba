//! Decoder for method 1 payloads.
//!
//! Each block starts with three Huffman tables (raw run lengths, offsets, match lengths)
//! and a 16 bit token count.  A token is a run of literal bytes, followed by a back
//! reference unless it is the last token of the block.

use crate::Error;
use crate::tools::bit_stream::BitReader;
use crate::tools::canonical_huff::HuffDecoder;
use crate::tools::crc16::crc16;
use super::header::{Header,HEADER_LEN};

/// Expanded data, the unpacked CRC has been computed but not yet compared
pub struct Unpacked {
    pub header: Header,
    pub data: Vec<u8>,
    pub crc: u16
}

/// Copy `length` bytes starting `offset` bytes back, one at a time so that
/// an overlapping copy repeats the pattern.
fn copy_back(output: &mut Vec<u8>,offset: usize,length: usize) -> Result<(),Error> {
    if offset == 0 || offset > output.len() {
        return Err(Error::BadBackReference { offset, available: output.len() });
    }
    let start = output.len() - offset;
    for i in start..start+length {
        output.push(output[i]);
    }
    Ok(())
}

/// Unpack the container at the start of `buf`
pub fn unpack(buf: &[u8]) -> Result<Unpacked,Error> {
    let header = Header::parse(buf)?;
    let end = HEADER_LEN + header.packed_size as usize;
    if buf.len() < end {
        log::error!("container needs {} bytes, only {} available",end,buf.len());
        return Err(Error::TruncatedInput);
    }
    if buf.len() > end {
        log::warn!("ignoring {} bytes after the container",buf.len() - end);
    }
    let packed = &buf[HEADER_LEN..end];
    let actual = crc16(packed);
    if actual != header.packed_crc {
        return Err(Error::PackedCrcMismatch { expected: header.packed_crc, actual });
    }
    let unpacked_size = header.unpacked_size as usize;
    // the declared size is not trusted for the allocation
    let mut output: Vec<u8> = Vec::with_capacity(usize::min(unpacked_size,packed.len().saturating_mul(16)));
    let mut bits = BitReader::new(packed,0);
    // flag bits
    bits.read(2);
    for block in 0..header.blocks {
        let raw_table = HuffDecoder::read(&mut bits)?;
        let offset_table = HuffDecoder::read(&mut bits)?;
        let length_table = HuffDecoder::read(&mut bits)?;
        let count = bits.read(16) as usize;
        log::debug!("block {} has {} tokens, starting at output byte {}",block,count,output.len());
        if count == 0 {
            return Err(Error::EmptyBlock);
        }
        for token in 0..count {
            let raw_len = raw_table.decode(&mut bits)? as usize;
            if output.len() + raw_len > unpacked_size {
                return Err(Error::OutputOverrun);
            }
            if raw_len > 0 {
                output.extend_from_slice(bits.read_bytes(raw_len)?);
            }
            if token + 1 == count {
                log::trace!("token {}: raw {}",token,raw_len);
                break;
            }
            let offset = offset_table.decode(&mut bits)? as usize + 1;
            let length = length_table.decode(&mut bits)? as usize + 2;
            log::trace!("token {}: raw {}, copy {} from {} back",token,raw_len,length,offset);
            if output.len() + length > unpacked_size {
                return Err(Error::OutputOverrun);
            }
            copy_back(&mut output,offset,length)?;
        }
    }
    if output.len() < unpacked_size {
        log::error!("expanded {} bytes, header declares {}",output.len(),unpacked_size);
        return Err(Error::TruncatedInput);
    }
    let crc = crc16(&output);
    Ok(Unpacked { header, data: output, crc })
}

#[cfg(test)]
use crate::tools::bit_stream::BitWriter;
#[cfg(test)]
use crate::tools::canonical_huff::{HuffEncoder,SYMBOLS,bit_len};

/// Put a header on `payload`, with CRCs computed from `payload` and `expanded`
#[cfg(test)]
fn seal(payload: &[u8],expanded: &[u8],unpacked_size: u32,blocks: u8) -> Vec<u8> {
    let header = Header {
        method: super::header::Method::One,
        unpacked_size,
        packed_size: payload.len() as u32,
        unpacked_crc: crc16(expanded),
        packed_crc: crc16(payload),
        leeway: 0,
        blocks
    };
    [header.to_bytes().to_vec(),payload.to_vec()].concat()
}

/// One block with tokens given as (literal bytes, offset, length)
#[cfg(test)]
fn block(tokens: &[(&[u8],u32,u32)]) -> Vec<u8> {
    let mut freq = [[0u32;SYMBOLS];3];
    for (lit,offset,length) in tokens {
        freq[0][bit_len(lit.len() as u32)] += 1;
        freq[1][bit_len(offset - 1)] += 1;
        freq[2][bit_len(length - 2)] += 1;
    }
    let tables: Vec<HuffEncoder> = freq.iter().map(|f| HuffEncoder::from_freq(f)).collect();
    let mut bits = BitWriter::new(Vec::new());
    bits.write(0,2);
    for table in &tables {
        table.write_table(&mut bits);
    }
    bits.write(tokens.len() as u32,16);
    for (i,(lit,offset,length)) in tokens.iter().enumerate() {
        tables[0].encode(lit.len() as u32,&mut bits);
        bits.write_bytes(lit);
        if i + 1 < tokens.len() {
            tables[1].encode(offset - 1,&mut bits);
            tables[2].encode(length - 2,&mut bits);
        }
    }
    bits.finish()
}

#[test]
fn unpack_hello() {
    let buf = hex::decode("524e4301000000050000000d34d2cbe200011000880001020004").unwrap();
    let buf = [buf,b"hello".to_vec()].concat();
    let unpacked = unpack(&buf).expect("unpack failed");
    assert_eq!(unpacked.data,b"hello");
    assert_eq!(unpacked.crc,0x34d2);
}

#[test]
fn overlapping_copy() {
    let expanded = [0x41;11];
    let payload = block(&[(b"A",1,10),(b"",1,2)]);
    let buf = seal(&payload,&expanded,11,1);
    let unpacked = unpack(&buf).expect("unpack failed");
    assert_eq!(unpacked.data,expanded.to_vec());
    assert_eq!(unpacked.crc,unpacked.header.unpacked_crc);
}

#[test]
fn zero_blocks() {
    let buf = hex::decode("524e430100000000000000020000000000000000").unwrap();
    assert_eq!(unpack(&buf).expect("empty").data,Vec::<u8>::new());
    let buf = seal(&[0,0],b"",5,0);
    assert!(matches!(unpack(&buf),Err(Error::TruncatedInput)));
}

#[test]
fn damaged_containers() {
    let hello = [hex::decode("524e4301000000050000000d34d2cbe200011000880001020004").unwrap(),b"hello".to_vec()].concat();
    // flip a bit in the packed data
    let mut buf = hello.clone();
    buf[HEADER_LEN + 9] ^= 0x20;
    assert!(matches!(unpack(&buf),Err(Error::PackedCrcMismatch { expected: 0xcbe2, .. })));
    // cut short
    assert!(matches!(unpack(&hello[0..hello.len()-1]),Err(Error::TruncatedInput)));
    // declared size too small for the literal run
    let mut buf = hello.clone();
    buf[7] = 3;
    assert!(matches!(unpack(&buf),Err(Error::OutputOverrun)));
    // trailing bytes are tolerated
    let buf = [hello,vec![0xff,0xff]].concat();
    assert_eq!(unpack(&buf).expect("trailing").data,b"hello");
}

#[test]
fn huge_declared_size() {
    let payload = block(&[(b"A",1,2)]);
    let buf = seal(&payload,b"A",u32::MAX,1);
    assert!(matches!(unpack(&buf),Err(Error::TruncatedInput)));
}

#[test]
fn bad_tokens() {
    let payload = block(&[(b"A",3,2),(b"",1,2)]);
    let buf = seal(&payload,b"",10,1);
    assert!(matches!(unpack(&buf),Err(Error::BadBackReference { offset: 3, available: 1 })));

    let payload = block(&[(b"AB",1,2)]);
    let mut payload = payload[0..payload.len()-1].to_vec();
    // claim 2 literal bytes but keep only 1
    let buf = seal(&payload,b"",2,1);
    assert!(matches!(unpack(&buf),Err(Error::TruncatedInput)));

    let mut bits = BitWriter::new(Vec::new());
    bits.write(0,2);
    for _ in 0..3 {
        HuffEncoder::from_freq(&[1;SYMBOLS]).write_table(&mut bits);
    }
    bits.write(0,16);
    payload = bits.finish();
    let buf = seal(&payload,b"",1,1);
    assert!(matches!(unpack(&buf),Err(Error::EmptyBlock)));
}
