//! CRC-16 used by RNC headers, this is the reflected form of polynomial 0x8005
//! (0xA001), with zero initial value and no final xor (also known as CRC-16/ARC).

const POLY: u16 = 0xa001;

const fn make_table() -> [u16;256] {
    let mut table = [0;256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = match crc & 1 {
                0 => crc >> 1,
                _ => (crc >> 1) ^ POLY
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static TABLE: [u16;256] = make_table();

/// CRC of the whole slice
pub fn crc16(dat: &[u8]) -> u16 {
    dat.iter().fold(0,|crc,&byte| (crc >> 8) ^ TABLE[((crc ^ byte as u16) & 0xff) as usize])
}

#[test]
fn check_values() {
    assert_eq!(crc16(b"123456789"),0xbb3d);
    assert_eq!(crc16(b"hello"),0x34d2);
    assert_eq!(crc16(&[]),0);
}

#[test]
fn table_entries() {
    assert_eq!(TABLE[0],0);
    assert_eq!(TABLE[1],0xc0c1);
    assert_eq!(TABLE[0x80],0xa001);
    assert_eq!(TABLE[0xff],0x4040);
}
