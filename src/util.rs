use zerocopy::{AsBytes, FromBytes, Unaligned};

#[derive(Debug, AsBytes, FromBytes, Unaligned, PartialEq, Eq, Clone, Copy)]
#[repr(C)]
pub(crate) struct BlockMagic(pub(crate) [u8; 4]);

/// 0xDEADBEEF in network byte order.
pub(crate) const BLOCK_MAGIC: BlockMagic = BlockMagic(*b"\xDE\xAD\xBE\xEF");

/// Reflected 0x8005 polynomial (0xA001) preset to 0xFFFF, no final xor.
pub(crate) const CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_MODBUS);

/// CRC-16 of a block payload as stamped into the block header.
pub fn crc16(payload: &[u8]) -> u16 {
    CRC.checksum(payload)
}

/// True if counter `a` was stamped after counter `b`.
///
/// Serial number comparison, so ordering survives the u32 wrap as long as the live counters span
/// less than half the counter space.
pub(crate) fn counter_newer(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

#[cfg(test)]
mod tests {

    use super::*;

    fn bitwise_crc16(buffer: &[u8]) -> u16 {
        let mut crc = 0xFFFFu16;
        for byte in buffer {
            crc ^= *byte as u16;
            for _ in 0..8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xA001;
                } else {
                    crc >>= 1;
                }
            }
        }
        crc
    }

    #[test]
    fn crc16_check_value() {
        assert_eq!(crc16(b"123456789"), 0x4B37);
    }

    #[test]
    fn crc16_of_nothing_is_preset() {
        assert_eq!(crc16(&[]), 0xFFFF);
    }

    #[test]
    fn crc16_matches_bitwise_form() {
        let txt = rust_counter_strings::generate(4080);
        let data = txt.as_bytes();
        assert_eq!(crc16(data), bitwise_crc16(data));
        let zeros = [0u8; 48];
        assert_eq!(crc16(&zeros), bitwise_crc16(&zeros));
    }

    #[test]
    fn magic_bytes_in_media_order() {
        assert_eq!(BLOCK_MAGIC.as_bytes(), &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn counter_ordering_survives_wrap() {
        assert!(counter_newer(1, 0));
        assert!(!counter_newer(0, 0));
        assert!(!counter_newer(0, 1));
        assert!(counter_newer(0, u32::MAX));
        assert!(counter_newer(5, u32::MAX - 5));
        assert!(!counter_newer(u32::MAX, 0));
    }
}
