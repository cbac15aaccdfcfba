//! Canonical Huffman tables for RNC blocks.
//!
//! Symbols are bit length buckets: a value `v` is coded as the symbol `bit_len(v)`,
//! followed by the `bit_len(v)-1` low bits of `v` when the symbol is 2 or more
//! (the leading 1 is implied).  A table is stored as a 5 bit symbol count followed
//! by a 4 bit code length for each symbol.  Codes are assigned in order of increasing
//! length, then increasing symbol, and are stored bit reversed since the stream is LSB first.

use num_traits::{PrimInt,Unsigned};
use crate::Error;
use super::bit_stream::{BitReader,BitWriter};

/// number of symbols, i.e., bit length buckets 0..=15
pub const SYMBOLS: usize = 16;
const MAX_CODE_LEN: u8 = 16;

/// number of bits needed to represent `val`, 0 needs no bits
pub fn bit_len<T: PrimInt + Unsigned>(val: T) -> usize {
    (T::zero().count_zeros() - val.leading_zeros()) as usize
}

/// Assign codes to the symbols with non-zero length, returning
/// (symbol,length,reversed code) in the order of assignment.
fn canonical_codes(lengths: &[u8]) -> Vec<(usize,u8,u16)> {
    let mut ans = Vec::new();
    // running code, MSB aligned
    let mut next: u16 = 0;
    for len in 1..=MAX_CODE_LEN {
        for (symbol,_) in lengths.iter().enumerate().filter(|(_,l)| **l == len) {
            let code = (next >> (16 - len)).reverse_bits() >> (16 - len);
            ans.push((symbol,len,code));
            next = next.wrapping_add(1 << (16 - len));
        }
    }
    ans
}

struct Entry {
    len: u8,
    code: u16,
    symbol: u8
}

/// Table used to decode values from a block
pub struct HuffDecoder {
    /// entries in order of increasing code length
    entries: Vec<Entry>
}

impl HuffDecoder {
    /// Read a table from the stream.  An empty table is allowed here, but any
    /// attempt to decode with it is an error.
    pub fn read(bits: &mut BitReader) -> Result<Self,Error> {
        let count = bits.read(5) as usize;
        if count > SYMBOLS {
            log::error!("Huffman table declares {} symbols",count);
            return Err(Error::MalformedTable);
        }
        let lengths: Vec<u8> = (0..count).map(|_| bits.read(4) as u8).collect();
        log::trace!("Huffman code lengths {:?}",lengths);
        let entries = canonical_codes(&lengths).into_iter()
            .map(|(symbol,len,code)| Entry { len, code, symbol: symbol as u8 })
            .collect();
        Ok(Self { entries })
    }
    /// Decode the next value
    pub fn decode(&self,bits: &mut BitReader) -> Result<u32,Error> {
        let peeked = bits.peek(16);
        let entry = match self.entries.iter().find(|e| peeked & ((1 << e.len) - 1) == e.code as u32) {
            Some(e) => e,
            None => return Err(Error::MalformedTable)
        };
        bits.read(entry.len as u32);
        let symbol = entry.symbol as u32;
        match symbol {
            0 | 1 => Ok(symbol),
            _ => Ok(bits.read(symbol - 1) | (1 << (symbol - 1)))
        }
    }
}

/// Node for building the Huffman tree
struct Node {
    freq: u64,
    parent: Option<usize>,
    /// symbol, if this is a leaf
    symbol: Option<usize>
}

/// Table used to encode values into a block
#[derive(Debug,PartialEq)]
pub struct HuffEncoder {
    /// code length by symbol, trailing unused symbols are dropped
    lengths: Vec<u8>,
    /// reversed code by symbol
    codes: Vec<u16>
}

impl HuffEncoder {
    /// Build the table from the symbol frequencies.  Ties are broken exactly
    /// as the existing encoder does, so the same lengths come out.
    pub fn from_freq(freq: &[u32;SYMBOLS]) -> Self {
        let mut nodes: Vec<Node> = freq.iter().enumerate()
            .filter(|(_,f)| **f > 0)
            .map(|(symbol,f)| Node { freq: *f as u64, parent: None, symbol: Some(symbol) })
            .collect();
        // a lone symbol still gets a 1 bit code
        let merges = match nodes.len() {
            0 => 0,
            1 => 1,
            n => n - 1
        };
        for _ in 0..merges {
            // find the two smallest parentless nodes, second one can be missing
            let (mut lo,mut hi) = (0x7ffffffe,0x7fffffff);
            let (mut lo_idx,mut hi_idx) = (0,0);
            for (i,node) in nodes.iter().enumerate().filter(|(_,n)| n.parent.is_none()) {
                if lo > node.freq {
                    hi = lo;
                    hi_idx = lo_idx;
                    lo = node.freq;
                    lo_idx = i;
                } else if hi > node.freq {
                    hi = node.freq;
                    hi_idx = i;
                }
            }
            let parent = nodes.len();
            nodes.push(Node { freq: lo + hi, parent: None, symbol: None });
            nodes[lo_idx].parent = Some(parent);
            nodes[hi_idx].parent = Some(parent);
        }
        let mut lengths = vec![0;SYMBOLS];
        for node in &nodes {
            if let Some(symbol) = node.symbol {
                let mut depth = 0;
                let mut curs = node.parent;
                while let Some(p) = curs {
                    depth += 1;
                    curs = nodes[p].parent;
                }
                lengths[symbol] = depth;
            }
        }
        let mut codes = vec![0;SYMBOLS];
        for (symbol,_,code) in canonical_codes(&lengths) {
            codes[symbol] = code;
        }
        while lengths.len() > 1 && lengths[lengths.len()-1] == 0 {
            lengths.pop();
            codes.pop();
        }
        Self { lengths, codes }
    }
    /// Write the table in the form `HuffDecoder::read` expects
    pub fn write_table(&self,bits: &mut BitWriter) {
        bits.write(self.lengths.len() as u32,5);
        for len in &self.lengths {
            bits.write(*len as u32,4);
        }
    }
    /// Encode a value, its bucket must have had a non-zero frequency
    pub fn encode(&self,val: u32,bits: &mut BitWriter) {
        let symbol = bit_len(val);
        debug_assert!(symbol < self.lengths.len() && self.lengths[symbol] > 0);
        bits.write(self.codes[symbol] as u32,self.lengths[symbol] as u32);
        if symbol > 1 {
            bits.write(val,symbol as u32 - 1);
        }
    }
}

#[test]
fn bucket_sizes() {
    assert_eq!(bit_len(0u32),0);
    assert_eq!(bit_len(1u32),1);
    assert_eq!(bit_len(5u32),3);
    assert_eq!(bit_len(0x7ffeusize),15);
    assert_eq!(bit_len(0xffffu16),16);
}

#[test]
fn tables_match_legacy_encoder() {
    let mut freq = [0;SYMBOLS];
    freq[..5].copy_from_slice(&[8,4,2,1,1]);
    let table = HuffEncoder::from_freq(&freq);
    assert_eq!(table.lengths,vec![1,2,3,4,4]);
    assert_eq!(table.codes,vec![0,1,3,7,15]);

    let mut freq = [0;SYMBOLS];
    freq[1] = 5;
    freq[15] = 3;
    let table = HuffEncoder::from_freq(&freq);
    assert_eq!(table.lengths.len(),16);
    assert_eq!((table.lengths[1],table.codes[1]),(1,0));
    assert_eq!((table.lengths[15],table.codes[15]),(1,1));

    let mut freq = [0;SYMBOLS];
    freq[..4].copy_from_slice(&[3,3,3,3]);
    let table = HuffEncoder::from_freq(&freq);
    assert_eq!(table.lengths,vec![2,2,2,2]);
    assert_eq!(table.codes,vec![0,2,1,3]);
}

#[test]
fn degenerate_tables() {
    let mut freq = [0;SYMBOLS];
    freq[3] = 1;
    let table = HuffEncoder::from_freq(&freq);
    assert_eq!(table.lengths,vec![0,0,0,1]);
    assert_eq!(table.codes[3],0);
    let table = HuffEncoder::from_freq(&[0;SYMBOLS]);
    assert_eq!(table.lengths,vec![0]);
}

#[test]
fn every_value_survives_coding() {
    let table = HuffEncoder::from_freq(&[1;SYMBOLS]);
    // 16 buckets cover everything below 0x8000
    let mut bits = BitWriter::new(Vec::new());
    table.write_table(&mut bits);
    for val in 0..0x8000 {
        table.encode(val,&mut bits);
    }
    let buf = bits.finish();
    let mut bits = BitReader::new(&buf,0);
    let decoder = HuffDecoder::read(&mut bits).expect("table");
    for val in 0..0x8000 {
        assert_eq!(decoder.decode(&mut bits).expect("value"),val);
    }
}

#[test]
fn bad_tables() {
    // 17 symbols
    let buf = [0x11,0x00];
    let mut bits = BitReader::new(&buf,0);
    assert!(matches!(HuffDecoder::read(&mut bits),Err(Error::MalformedTable)));
    // no symbols
    let buf = [0x00,0x00,0x00,0x00];
    let mut bits = BitReader::new(&buf,0);
    let table = HuffDecoder::read(&mut bits).expect("empty table");
    assert!(matches!(table.decode(&mut bits),Err(Error::MalformedTable)));
}
