//! 8051 copy stub injected into RAM by the code dumper.
//!
//! The firmware calls the stub from the armed hook. When the mailbox ready byte
//! is non-zero, the stub copies that many bytes of code memory from the source
//! address to the staging address given in the mailbox command, advancing both
//! pointers in place, then clears the ready byte. Only ACC, B, DPTR and PSW are
//! touched, and all of them are saved, so the stub is safe in any register bank.

/// Bytes standing in for the mailbox address in [`TEMPLATE`].
pub const PLACEHOLDER: [u8; 2] = [0xDE, 0xAD];

/// Offsets of every [`PLACEHOLDER`] in [`TEMPLATE`].
pub const RELOCATIONS: [usize; 4] = [11, 19, 40, 69];

/// Unpatched stub. The placeholder appears only as the immediate operand of
/// `mov dptr,#MB`.
#[rustfmt::skip]
pub const TEMPLATE: [u8; 84] = [
    0xC0, 0xE0,             // 00: push acc
    0xC0, 0xF0,             // 02: push b
    0xC0, 0x82,             // 04: push dpl
    0xC0, 0x83,             // 06: push dph
    0xC0, 0xD0,             // 08: push psw
    0x90, 0xDE, 0xAD,       // 10: mov dptr,#MB
    0xE0,                   // 13: movx a,@dptr
    0x60, 0x39,             // 14: jz exit
    0xF5, 0xF0,             // 16: mov b,a
    // loop:
    0x90, 0xDE, 0xAD,       // 18: mov dptr,#MB
    0xA3,                   // 21: inc dptr            ; source high
    0xE0,                   // 22: movx a,@dptr
    0xC0, 0xE0,             // 23: push acc
    0xA3,                   // 25: inc dptr            ; source low
    0xE0,                   // 26: movx a,@dptr
    0x24, 0x01,             // 27: add a,#1
    0xF0,                   // 29: movx @dptr,a
    0x14,                   // 30: dec a
    0xF5, 0x82,             // 31: mov dpl,a
    0xD0, 0x83,             // 33: pop dph
    0xE4,                   // 35: clr a
    0x93,                   // 36: movc a,@a+dptr
    0xC0, 0xE0,             // 37: push acc            ; code byte
    0x90, 0xDE, 0xAD,       // 39: mov dptr,#MB
    0xA3,                   // 42: inc dptr
    0x50, 0x03,             // 43: jnc nocarry
    0xE0,                   // 45: movx a,@dptr
    0x04,                   // 46: inc a
    0xF0,                   // 47: movx @dptr,a
    // nocarry:
    0xA3,                   // 48: inc dptr
    0xA3,                   // 49: inc dptr            ; staging high
    0xE0,                   // 50: movx a,@dptr
    0xC0, 0xE0,             // 51: push acc
    0xA3,                   // 53: inc dptr            ; staging low
    0xE0,                   // 54: movx a,@dptr
    0x04,                   // 55: inc a
    0xF0,                   // 56: movx @dptr,a
    0x14,                   // 57: dec a
    0xF5, 0x82,             // 58: mov dpl,a
    0xD0, 0x83,             // 60: pop dph
    0xD0, 0xE0,             // 62: pop acc
    0xF0,                   // 64: movx @dptr,a
    0xD5, 0xF0, 0xCE,       // 65: djnz b,loop
    0x90, 0xDE, 0xAD,       // 68: mov dptr,#MB
    0xE4,                   // 71: clr a
    0xF0,                   // 72: movx @dptr,a        ; ack
    // exit:
    0xD0, 0xD0,             // 73: pop psw
    0xD0, 0x83,             // 75: pop dph
    0xD0, 0x82,             // 77: pop dpl
    0xD0, 0xF0,             // 79: pop b
    0xD0, 0xE0,             // 81: pop acc
    0x22,                   // 83: ret
];

/// Return a copy of `template` with every [`PLACEHOLDER`] replaced by the
/// big-endian `mailbox_addr`.
pub fn patch(template: &[u8], mailbox_addr: u16) -> Vec<u8> {
    replace_all(template, &PLACEHOLDER, &mailbox_addr.to_be_bytes())
}

/// Replace every non-overlapping occurrence of `pattern` in `haystack`,
/// scanning left to right.
///
/// `pattern` and `replacement` must be the same length.
pub(crate) fn replace_all(haystack: &[u8], pattern: &[u8], replacement: &[u8]) -> Vec<u8> {
    debug_assert_eq!(pattern.len(), replacement.len());
    let mut out = haystack.to_vec();
    if pattern.is_empty() {
        return out;
    }
    let mut i = 0;
    while i + pattern.len() <= out.len() {
        if out[i..i + pattern.len()] == *pattern {
            out[i..i + pattern.len()].copy_from_slice(replacement);
            i += pattern.len();
        } else {
            i += 1;
        }
    }
    out
}
