/// CRC-7 (polynomial x^7 + x^3 + 1) over a command frame or register, returned
/// already shifted into the upper seven bits with the end bit set, ready to be
/// the last byte of a frame.
pub fn crc7(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for mut byte in data.iter().copied() {
        for _ in 0..8 {
            crc <<= 1;
            if (byte ^ crc) & 0x80 != 0 {
                crc ^= 0x09;
            }
            byte <<= 1;
        }
    }
    (crc << 1) | 1
}

/// CRC-16-CCITT (polynomial 0x1021, zero seed) over a data block.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        crc = (crc >> 8) | (crc << 8);
        crc ^= u16::from(byte);
        crc ^= (crc & 0xff) >> 4;
        crc ^= crc << 12;
        crc ^= (crc & 0xff) << 5;
    }
    crc
}
