//! Fixed-width Latin-1 string fields, as used by the SimConnect wire format.
//!
//! Every codepoint in Latin-1 (ISO-8859-1) maps 1:1 onto the first 256
//! Unicode codepoints, so encode/decode is a direct byte<->char mapping; no
//! external encoding crate is warranted for this.

/// Null-pads `s` to `len` bytes, truncating if needed. Characters outside
/// the Latin-1 range are replaced with `?`.
pub fn encode_fixed(s: &str, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    for (i, ch) in s.chars().enumerate() {
        if i >= len {
            break;
        }
        buf[i] = if (ch as u32) <= 0xFF { ch as u32 as u8 } else { b'?' };
    }
    buf
}

/// Null-strips a fixed-width Latin-1 field back into a `String`.
pub fn decode_fixed(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    bytes[..end].iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_and_strips() {
        let encoded = encode_fixed("hi", 8);
        assert_eq!(encoded, vec![b'h', b'i', 0, 0, 0, 0, 0, 0]);
        assert_eq!(decode_fixed(&encoded), "hi");
    }

    #[test]
    fn truncates_overlong_strings() {
        let encoded = encode_fixed("abcdef", 3);
        assert_eq!(decode_fixed(&encoded), "abc");
    }

    #[test]
    fn empty_string_round_trips() {
        let encoded = encode_fixed("", 4);
        assert_eq!(decode_fixed(&encoded), "");
    }
}
