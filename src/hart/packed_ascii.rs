//! HART text codecs.
//!
//! Packed ASCII squeezes four 6-bit characters into three bytes; the usable
//! character set is 0x20-0x5F. Unpacking restores each character by setting
//! bit 6 to the complement of bit 5, which is what makes the round trip
//! lossless over that restricted set. Plain text fields (long tag and
//! friends) are ISO-8859-1, NUL-terminated and zero-padded to a fixed width.

use crate::error::HartError;

/// Unpacks a HART packed-ASCII field into a string. Only whole 3-byte
/// groups are translated; a trailing partial group is ignored.
pub fn unpack_ascii(packed: &[u8], packed_length: usize) -> String {
    let groups = packed_length.min(packed.len()) / 3;
    let mut text = String::with_capacity(groups * 4);

    for group in 0..groups {
        let i = group * 3;
        let codes = [
            packed[i] >> 2,
            ((packed[i] << 4) & 0x30) | (packed[i + 1] >> 4),
            ((packed[i + 1] << 2) & 0x3C) | (packed[i + 2] >> 6),
            packed[i + 2] & 0x3F,
        ];
        for code in codes {
            // Bit 6 is the complement of bit 5.
            let mask = ((code & 0x20) << 1) ^ 0x40;
            text.push((code | mask) as char);
        }
    }
    text
}

/// Packs a string into a packed-ASCII field of `packed_length` bytes
/// (a multiple of 3). Input is space-padded, or truncated, to the
/// 4-characters-per-3-bytes capacity of the field.
pub fn pack_ascii(text: &str, packed_length: usize) -> Vec<u8> {
    let groups = packed_length / 3;
    let mut codes: Vec<u8> = text
        .chars()
        .take(groups * 4)
        .map(|c| (c as u8) & 0x3F)
        .collect();
    codes.resize(groups * 4, b' ' & 0x3F);

    let mut packed = Vec::with_capacity(groups * 3);
    for group in codes.chunks_exact(4) {
        packed.push((group[0] << 2) | (group[1] >> 4));
        packed.push((group[1] << 4) | (group[2] >> 2));
        packed.push((group[2] << 6) | group[3]);
    }
    packed
}

/// Encodes an ISO-8859-1 text field: the string's bytes, a terminating NUL,
/// zero-padded to `length`. Fails when the text does not fit.
pub fn encode_text(text: &str, length: usize) -> Result<Vec<u8>, HartError> {
    let mut bytes: Vec<u8> = text
        .chars()
        .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
        .collect();
    bytes.push(0);
    if bytes.len() > length {
        return Err(HartError::TextTooLong { max: length });
    }
    bytes.resize(length, 0);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpack_restores_upper_half_characters() {
        // "ABCD" -> codes 0x01 0x02 0x03 0x04
        let packed = pack_ascii("ABCD", 3);
        assert_eq!(unpack_ascii(&packed, 3), "ABCD");
    }

    #[test]
    fn pack_pads_with_spaces() {
        let packed = pack_ascii("AB", 3);
        assert_eq!(unpack_ascii(&packed, 3), "AB  ");
    }

    #[test]
    fn partial_trailing_group_is_ignored() {
        let packed = pack_ascii("ABCDEFGH", 6);
        assert_eq!(unpack_ascii(&packed[..4], 4), "ABCD");
    }

    #[test]
    fn encode_text_pads_and_terminates() {
        let field = encode_text("TAG", 8).unwrap();
        assert_eq!(field, vec![b'T', b'A', b'G', 0, 0, 0, 0, 0]);
    }

    #[test]
    fn encode_text_rejects_overflow() {
        assert!(matches!(
            encode_text("TOO LONG", 8),
            Err(HartError::TextTooLong { max: 8 })
        ));
    }
}
