//! Dotted-quad parsing and formatting.

/// Parse one record into its 32-bit address value.
///
/// Surrounding ASCII whitespace (including `\r\n`) is ignored. Exactly four dot-separated
/// decimal octets are required, each made of digits only and not exceeding 255.
#[inline]
pub fn parse_ipv4(line: &[u8]) -> Option<u32> {
    let line = line.trim_ascii();
    let mut ip = 0u32;
    let mut octets = 0;
    for token in line.split(|&b| b == b'.') {
        if octets == 4 {
            return None;
        }
        ip = (ip << 8) | parse_octet(token)?;
        octets += 1;
    }
    (octets == 4).then_some(ip)
}

#[inline]
fn parse_octet(token: &[u8]) -> Option<u32> {
    if token.is_empty() {
        return None;
    }
    let mut value = 0u32;
    for &b in token {
        if !b.is_ascii_digit() {
            return None;
        }
        value = value * 10 + u32::from(b - b'0');
        if value > 255 {
            return None;
        }
    }
    Some(value)
}

/// Format an address value as a canonical dotted quad.
pub fn format_ipv4(ip: u32) -> String {
    let [a, b, c, d] = ip.to_be_bytes();
    format!("{a}.{b}.{c}.{d}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use test_case::test_case;

    #[test_case(b"0.0.0.0", 0; "zero")]
    #[test_case(b"1.1.1.1", 0x0101_0101; "ones")]
    #[test_case(b"255.255.255.255", u32::MAX; "broadcast")]
    #[test_case(b"192.168.0.1\n", 0xC0A8_0001; "trailing newline")]
    #[test_case(b"10.0.0.7\r\n", 0x0A00_0007; "crlf")]
    #[test_case(b"  8.8.4.4  ", 0x0808_0404; "surrounding spaces")]
    #[test_case(b"001.002.003.004", 0x0102_0304; "leading zeros")]
    fn test_parse_valid(line: &[u8], expected: u32) {
        assert_eq!(parse_ipv4(line), Some(expected));
    }

    #[test_case(b""; "empty")]
    #[test_case(b"not.an.ip"; "words")]
    #[test_case(b"1.2.3"; "three octets")]
    #[test_case(b"1.2.3.4.5"; "five octets")]
    #[test_case(b"1.2.3.256"; "octet out of range")]
    #[test_case(b"1..3.4"; "empty octet")]
    #[test_case(b"1.2.3.4."; "trailing dot")]
    #[test_case(b"+1.2.3.4"; "sign")]
    #[test_case(b"1.2.3.-4"; "negative")]
    #[test_case(b"1.2.3.99999999999"; "overflowing octet")]
    #[test_case(b"1.2 .3.4"; "inner space")]
    fn test_parse_malformed(line: &[u8]) {
        assert_eq!(parse_ipv4(line), None);
    }

    #[test]
    fn test_parse_inverts_format() {
        let mut rng = StdRng::seed_from_u64(7);
        for ip in [0, 1, 255, 256, u32::MAX - 1, u32::MAX]
            .into_iter()
            .chain((0..10_000).map(|_| rng.gen::<u32>()))
        {
            assert_eq!(parse_ipv4(format_ipv4(ip).as_bytes()), Some(ip));
        }
    }
}
