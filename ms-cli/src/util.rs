use std::num::ParseIntError;

fn strip_hex_prefix(value: &str) -> &str {
    if value.to_ascii_lowercase().starts_with("0x") {
        &value[2..]
    } else {
        value
    }
}

pub(crate) fn u8_from_hex(value: &str) -> Result<u8, ParseIntError> {
    u8::from_str_radix(strip_hex_prefix(value), 16)
}

pub(crate) fn u16_from_hex(value: &str) -> Result<u16, ParseIntError> {
    u16::from_str_radix(strip_hex_prefix(value), 16)
}

pub(crate) fn usize_from_hex(value: &str) -> Result<usize, ParseIntError> {
    usize::from_str_radix(strip_hex_prefix(value), 16)
}

/// Format `bytes` as 16-byte rows, labelled with addresses starting at `base`.
pub(crate) fn hexdump(base: usize, bytes: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        out.push_str(&format!("{:04x}:", base + row * 16));
        for byte in chunk {
            out.push_str(&format!(" {byte:02x}"));
        }
        for _ in chunk.len()..16 {
            out.push_str("   ");
        }
        out.push_str("  ");
        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push('\n');
    }
    out
}
