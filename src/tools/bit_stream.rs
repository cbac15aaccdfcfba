//! Bit streams for the RNC payload.
//!
//! Bits are packed LSB first into 16 bit little endian words.  Literal bytes are
//! interleaved with the words: when the writer has a partially filled word pending,
//! literal bytes are parked immediately after the slot reserved for that word,
//! and the reader mirrors this by loading words lazily.

use crate::Error;

fn mask(bits: u32) -> u32 {
    (1 << bits) - 1
}

/// Reads bit fields and literal bytes from a buffer.
/// Reads beyond the end of the buffer produce zero bits, the format
/// tolerates sloppy trailing bits.
pub struct BitReader<'a> {
    buf: &'a [u8],
    /// byte position of the next word to load
    pos: usize,
    /// loaded bits, the next bit to consume is the LSB
    bit_buf: u32,
    /// number of loaded bits not yet consumed
    bit_count: u32
}

impl<'a> BitReader<'a> {
    /// Create a reader whose first word is at `pos`
    pub fn new(buf: &'a [u8],pos: usize) -> Self {
        Self {
            buf,
            pos,
            bit_buf: 0,
            bit_count: 0
        }
    }
    fn next_word(&self) -> u32 {
        match self.buf.len().checked_sub(self.pos) {
            Some(0) | None => 0,
            Some(1) => self.buf[self.pos] as u32,
            Some(_) => u16::from_le_bytes([self.buf[self.pos],self.buf[self.pos+1]]) as u32
        }
    }
    fn fill(&mut self,bits: u32) {
        while bits > self.bit_count {
            self.bit_buf |= self.next_word() << self.bit_count;
            self.pos += 2;
            self.bit_count += 16;
        }
    }
    /// get the next `bits` bits (at most 16) without consuming them
    pub fn peek(&mut self,bits: u32) -> u32 {
        debug_assert!(bits <= 16);
        self.fill(bits);
        self.bit_buf & mask(bits)
    }
    /// get and consume the next `bits` bits (at most 16)
    pub fn read(&mut self,bits: u32) -> u32 {
        let ans = self.peek(bits);
        self.bit_buf >>= bits;
        self.bit_count -= bits;
        ans
    }
    /// Get `len` literal bytes.  If a whole word was loaded by a peek but not consumed,
    /// it is given back first, since the literal bytes sit where that word was loaded from.
    pub fn read_bytes(&mut self,len: usize) -> Result<&'a [u8],Error> {
        if self.bit_count >= 16 {
            self.bit_count -= 16;
            self.bit_buf &= mask(self.bit_count);
            self.pos -= 2;
        }
        let end = match self.pos.checked_add(len) {
            Some(end) if end <= self.buf.len() => end,
            _ => return Err(Error::TruncatedInput)
        };
        let ans = &self.buf[self.pos..end];
        self.pos = end;
        Ok(ans)
    }
}

/// Writes bit fields and literal bytes, the mirror image of `BitReader`.
pub struct BitWriter {
    buf: Vec<u8>,
    /// byte position where the pending word will be flushed
    pos: usize,
    /// how far to move `pos` after the next flush, grows when literal bytes
    /// are parked behind the pending word
    advance: usize,
    bit_buf: u32,
    bit_count: u32
}

impl BitWriter {
    /// Create a writer that appends to `prefix`
    pub fn new(prefix: Vec<u8>) -> Self {
        Self {
            pos: prefix.len(),
            buf: prefix,
            advance: 2,
            bit_buf: 0,
            bit_count: 0
        }
    }
    fn put(&mut self,at: usize,dat: &[u8]) {
        let end = at + dat.len();
        if self.buf.len() < end {
            self.buf.resize(end,0);
        }
        self.buf[at..end].copy_from_slice(dat);
    }
    /// write the low `bits` bits of `val` (at most 16)
    pub fn write(&mut self,val: u32,bits: u32) {
        debug_assert!(bits <= 16);
        if bits == 0 {
            return;
        }
        self.bit_buf |= (val & mask(bits)) << self.bit_count;
        self.bit_count += bits;
        while self.bit_count >= 16 {
            let word = (self.bit_buf & 0xffff) as u16;
            self.put(self.pos,&word.to_le_bytes());
            self.pos += self.advance;
            self.advance = 2;
            self.bit_buf >>= 16;
            self.bit_count -= 16;
        }
    }
    /// write literal bytes, behind the pending word if there is one
    pub fn write_bytes(&mut self,dat: &[u8]) {
        if self.bit_count == 0 {
            self.put(self.pos,dat);
            self.pos += dat.len();
        } else {
            self.put(self.pos + self.advance,dat);
            self.advance += dat.len();
        }
    }
    /// flush pending bits padded with zeros to a word boundary, and return the buffer
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.write(0,16 - self.bit_count);
        }
        self.buf.truncate(self.pos);
        self.buf
    }
}

#[test]
fn interleaved_fields_and_bytes() {
    let mut bits = BitWriter::new(Vec::new());
    bits.write(0,2);
    bits.write(0b10110,5);
    bits.write_bytes(b"xy");
    bits.write(0xabcd,16);
    bits.write(1,1);
    bits.write_bytes(b"z");
    bits.write(5,3);
    let buf = bits.finish();
    let mut bits = BitReader::new(&buf,0);
    assert_eq!(bits.read(2),0);
    assert_eq!(bits.read(5),0b10110);
    assert_eq!(bits.read_bytes(2).unwrap(),b"xy");
    assert_eq!(bits.read(16),0xabcd);
    assert_eq!(bits.read(1),1);
    assert_eq!(bits.read_bytes(1).unwrap(),b"z");
    assert_eq!(bits.read(3),5);
}

#[test]
fn bytes_parked_behind_pending_word() {
    let mut bits = BitWriter::new(vec![0xee]);
    bits.write(1,4);
    bits.write_bytes(b"ab");
    bits.write(0,12);
    bits.write_bytes(b"c");
    assert_eq!(bits.finish(),vec![0xee,0x01,0x00,b'a',b'b',b'c']);
}

#[test]
fn prefetched_word_is_given_back() {
    let buf = [0x05,0x00,b'a',b'b',0x07,0x00];
    let mut bits = BitReader::new(&buf,0);
    assert_eq!(bits.read(16),5);
    assert_eq!(bits.peek(16),0x6261);
    assert_eq!(bits.read_bytes(2).unwrap(),b"ab");
    assert_eq!(bits.read(16),7);
}

#[test]
fn zero_fill_past_end() {
    let buf = [0x12,0x34,0xff];
    let mut bits = BitReader::new(&buf,0);
    assert_eq!(bits.read(16),0x3412);
    assert_eq!(bits.read(8),0xff);
    assert_eq!(bits.read(16),0);
    assert!(matches!(bits.read_bytes(1),Err(Error::TruncatedInput)));
}
