//! Encoder for method 1 payloads.
//!
//! The input is cut into blocks of at most 0x3000 bytes and 0x1000 tokens.  Within a block
//! the search is greedy with one step of lookahead: a match found at the cursor is held
//! back until the match starting one byte later has been examined, and is given up if the
//! later one is better.  These choices, along with the Huffman tie breaking, are made exactly
//! as the existing tools make them, so that output is reproducible byte for byte.

use crate::Error;
use crate::tools::bit_stream::BitWriter;
use crate::tools::canonical_huff::{HuffEncoder,SYMBOLS,bit_len};
use crate::tools::crc16::crc16;
use super::header::{Header,Method,HEADER_LEN};

/// farthest a back reference can reach
const WINDOW: usize = 0x7fff;
const MAX_MATCH: usize = 0x1000;
const BLOCK_BYTES: usize = 0x3000;
/// tokens in a block, not counting the last one
const MAX_TOKENS: usize = 0xfff;
const HASH_SIZE: usize = 0x8000;
/// the header counts blocks in one byte
const MAX_BLOCKS: usize = 0xff;
/// end of a hash chain
const NIL: u32 = u32::MAX;

/// A run of literal bytes followed by a back reference.
/// The last token of a block has no back reference.
#[derive(Debug,PartialEq)]
struct Token {
    raw_start: usize,
    raw_len: usize,
    offset: usize,
    length: usize
}

impl Token {
    fn at(raw_start: usize) -> Self {
        Self { raw_start, raw_len: 0, offset: 0, length: 0 }
    }
}

#[derive(Debug,Clone,Copy,PartialEq)]
struct Match {
    length: usize,
    offset: usize
}

/// Decide whether `new`, found one byte later, should replace the held match `old`.
/// A longer match has to be close enough to pay for the extra literal.
fn is_better(new: Match,old: Match) -> bool {
    (new.length > old.length && new.offset < old.offset + 0x800) ||
    (new.length > old.length + 1 && new.offset < old.offset + 0x1000) ||
    new.length > old.length + 2
}

/// Hash chains over 3 byte prefixes.  Candidates are visited nearest first, so
/// the first strictly longer match wins ties, same as a scan of every distance.
struct MatchFinder<'a> {
    dat: &'a [u8],
    head: Vec<u32>,
    prev: Vec<u32>,
    /// positions below this are in the chains
    indexed: usize
}

impl<'a> MatchFinder<'a> {
    fn new(dat: &'a [u8]) -> Self {
        Self {
            dat,
            head: vec![NIL;HASH_SIZE],
            prev: vec![NIL;dat.len()],
            indexed: 0
        }
    }
    fn hash(&self,pos: usize) -> usize {
        let d = &self.dat[pos..pos+3];
        (((d[0] as usize) << 10) ^ ((d[1] as usize) << 5) ^ d[2] as usize) & (HASH_SIZE - 1)
    }
    fn index_to(&mut self,pos: usize) {
        while self.indexed < pos {
            let q = self.indexed;
            if q + 3 <= self.dat.len() {
                let h = self.hash(q);
                self.prev[q] = self.head[h];
                self.head[h] = q as u32;
            }
            self.indexed += 1;
        }
    }
    /// Longest match of 3 or more bytes for the data at `pos`, not reading at or beyond `maxpos`
    fn find(&mut self,pos: usize,maxpos: usize) -> Option<Match> {
        self.index_to(pos);
        if pos + 3 > maxpos {
            return None;
        }
        let start = pos.saturating_sub(WINDOW);
        let limit = usize::min(MAX_MATCH,maxpos - pos);
        let mut best = Match { length: 2, offset: 0 };
        let mut curs = self.head[self.hash(pos)];
        while curs != NIL {
            let q = curs as usize;
            if q < start || best.length >= limit {
                break;
            }
            // a block can restart behind the indexed position
            if q < pos {
                let mut n = 0;
                while n < limit && self.dat[pos+n] == self.dat[q+n] {
                    n += 1;
                }
                if n > best.length {
                    best = Match { length: n, offset: pos - q };
                }
            }
            curs = self.prev[q];
        }
        match best.offset {
            0 => None,
            _ => Some(best)
        }
    }
}

/// Tokens of the block being built and the input cursor
struct BlockBuilder {
    tokens: Vec<Token>,
    cpos: usize
}

impl BlockBuilder {
    fn raw(&mut self,n: usize) {
        if let Some(token) = self.tokens.last_mut() {
            token.raw_len += n;
        }
        self.cpos += n;
    }
    fn pair(&mut self,m: Match) {
        if let Some(token) = self.tokens.last_mut() {
            token.offset = m.offset;
            token.length = m.length;
        }
        self.cpos += m.length;
        self.tokens.push(Token::at(self.cpos));
    }
}

struct Packer<'a> {
    dat: &'a [u8],
    finder: MatchFinder<'a>,
    /// start of the next block
    ipos: usize
}

impl<'a> Packer<'a> {
    fn new(dat: &'a [u8]) -> Self {
        Self {
            dat,
            finder: MatchFinder::new(dat),
            ipos: 0
        }
    }
    fn make_block(&mut self) -> Vec<Token> {
        let start = self.ipos;
        let mut maxpos = usize::min(start + BLOCK_BYTES,self.dat.len());
        let mut block = BlockBuilder { tokens: vec![Token::at(start)], cpos: start };
        let mut held: Option<Match> = None;
        while block.cpos < maxpos && block.tokens.len() - 1 < MAX_TOKENS {
            if maxpos - block.cpos < 3 {
                block.raw(maxpos - block.cpos);
                continue;
            }
            let lookahead = match held {
                Some(_) => 1,
                None => 0
            };
            let found = self.finder.find(block.cpos + lookahead,maxpos);
            match (held,found) {
                (Some(old),Some(new)) if is_better(new,old) => {
                    block.raw(1);
                    held = Some(new);
                },
                (Some(_),_) if block.cpos + 1 >= start + BLOCK_BYTES => {
                    // held match is found again by the next block
                    maxpos = block.cpos;
                },
                (Some(old),_) => {
                    block.pair(old);
                    held = None;
                },
                (None,Some(new)) => held = Some(new),
                (None,None) => block.raw(1)
            }
        }
        self.ipos = block.cpos;
        block.tokens
    }
}

fn write_block(bits: &mut BitWriter,dat: &[u8],tokens: &[Token]) {
    let mut freq = [[0u32;SYMBOLS];3];
    for token in tokens {
        freq[0][bit_len(token.raw_len)] += 1;
    }
    for token in &tokens[0..tokens.len()-1] {
        freq[1][bit_len(token.offset - 1)] += 1;
        freq[2][bit_len(token.length - 2)] += 1;
    }
    let tables = freq.map(|f| HuffEncoder::from_freq(&f));
    for table in &tables {
        table.write_table(bits);
    }
    bits.write(tokens.len() as u32,16);
    for (i,token) in tokens.iter().enumerate() {
        tables[0].encode(token.raw_len as u32,bits);
        if token.raw_len > 0 {
            bits.write_bytes(&dat[token.raw_start..token.raw_start+token.raw_len]);
        }
        if i + 1 < tokens.len() {
            tables[1].encode(token.offset as u32 - 1,bits);
            tables[2].encode(token.length as u32 - 2,bits);
        }
    }
}

/// Pack `dat` into a complete container, header included
pub fn pack(dat: &[u8]) -> Result<Vec<u8>,Error> {
    if dat.len() > MAX_BLOCKS * BLOCK_BYTES {
        let blocks = (dat.len() + BLOCK_BYTES - 1) / BLOCK_BYTES;
        log::error!("input needs at least {} blocks",blocks);
        return Err(Error::TooManyBlocks(blocks));
    }
    let unpacked_size = dat.len() as u32;
    let mut header = Header {
        method: Method::One,
        unpacked_size,
        packed_size: 0,
        unpacked_crc: crc16(dat),
        packed_crc: 0,
        leeway: 0,
        blocks: 0
    };
    let mut bits = BitWriter::new(header.to_bytes().to_vec());
    // flag bits
    bits.write(0,2);
    let mut packer = Packer::new(dat);
    let mut blocks: usize = 0;
    loop {
        let start = packer.ipos;
        let tokens = packer.make_block();
        log::debug!("block {} has {} tokens, covering bytes {} to {}",blocks,tokens.len(),start,packer.ipos);
        write_block(&mut bits,dat,&tokens);
        blocks += 1;
        if packer.ipos >= dat.len() {
            break;
        }
    }
    header.blocks = match u8::try_from(blocks) {
        Ok(b) => b,
        Err(_) => {
            log::error!("input needs {} blocks",blocks);
            return Err(Error::TooManyBlocks(blocks));
        }
    };
    let mut ans = bits.finish();
    header.packed_size = (ans.len() - HEADER_LEN) as u32;
    header.packed_crc = crc16(&ans[HEADER_LEN..]);
    ans[0..HEADER_LEN].copy_from_slice(&header.to_bytes());
    Ok(ans)
}

#[test]
fn match_replacement() {
    let old = Match { length: 4, offset: 50 };
    assert!(is_better(Match { length: 5, offset: 100 },old));
    assert!(!is_better(Match { length: 5, offset: 0x950 },old));
    assert!(is_better(Match { length: 6, offset: 0x950 },old));
    assert!(!is_better(Match { length: 6, offset: 0x1100 },old));
    assert!(is_better(Match { length: 7, offset: 0x7000 },old));
    assert!(!is_better(Match { length: 4, offset: 1 },old));
}

#[test]
fn nearest_longest_match() {
    let dat = b"abcdXabcdYabcdZabcdYabcd";
    let mut finder = MatchFinder::new(dat);
    assert_eq!(finder.find(0,dat.len()),None);
    assert_eq!(finder.find(5,dat.len()),Some(Match { length: 4, offset: 5 }));
    // the farther "abcdYabcd" beats the nearer "abcdZ"
    assert_eq!(finder.find(15,dat.len()),Some(Match { length: 9, offset: 10 }));
    assert_eq!(finder.find(20,22),None);
}

#[test]
fn overlapping_match() {
    let dat = [0x41;40];
    let mut finder = MatchFinder::new(&dat);
    assert_eq!(finder.find(1,dat.len()),Some(Match { length: 39, offset: 1 }));
}

#[test]
fn tokens_with_lookahead() {
    let dat = b"abcabcabcabcXabcabcabc";
    let mut packer = Packer::new(dat);
    let tokens = packer.make_block();
    assert_eq!(packer.ipos,dat.len());
    assert_eq!(tokens,vec![
        Token { raw_start: 0, raw_len: 3, offset: 3, length: 9 },
        Token { raw_start: 12, raw_len: 1, offset: 10, length: 9 },
        Token { raw_start: 22, raw_len: 0, offset: 0, length: 0 }
    ]);
}

#[test]
fn reference_containers() {
    let cases: [(&[u8],&str);4] = [
        (b"hello","524e4301000000050000000d34d2cbe2000110008800010200046865\
            6c6c6f"),
        (&[b'A';40],"524e4301000000280000000dec80d886000188881007000020040052410000"),
        (b"I am Sam. Sam I am. I do not like this Sam I am.\n","524e4301000000310000002e2727234a\
            000118080011030021524002a400a0004920616d2053616d2e20156a2e9807646f206e6f74206c696b6520746869730a"),
        (b"abcabcabcabcXabcabcabc","524e43010000001600000012f4b21a4a00010c912800014100200600c48f616263580300")
    ];
    for (dat,expected) in cases {
        let packed = pack(dat).expect("pack failed");
        assert_eq!(hex::encode(&packed),expected);
    }
}

#[test]
fn empty_input() {
    let packed = pack(&[]).expect("pack failed");
    assert_eq!(hex::encode(&packed),"524e4301000000000000000600008ffa0001840810200000");
    let unpacked = super::unpack::unpack(&packed).expect("unpack failed");
    assert!(unpacked.data.is_empty());
}

#[test]
fn several_blocks() {
    let dat = super::word_salad(30000);
    let packed = pack(&dat).expect("pack failed");
    assert_eq!(packed.len(),6243);
    assert_eq!(hex::encode(&packed[0..HEADER_LEN]),"524e430100007530000018510a9966680003");
    assert_eq!(crc16(&packed),0xcd50);
}

#[test]
fn oversized_input() {
    let dat = vec![0;MAX_BLOCKS * BLOCK_BYTES + 1];
    assert!(matches!(pack(&dat),Err(Error::TooManyBlocks(256))));
}
