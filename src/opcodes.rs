//! JVM opcode constants and instruction lengths.
#![allow(dead_code)]

pub(crate) const NOP: u8 = 0x00;
pub(crate) const ACONST_NULL: u8 = 0x01;
pub(crate) const ALOAD_0: u8 = 0x2a;
pub(crate) const IINC: u8 = 0x84;
pub(crate) const TABLESWITCH: u8 = 0xaa;
pub(crate) const LOOKUPSWITCH: u8 = 0xab;
pub(crate) const RETURN: u8 = 0xb1;
pub(crate) const INVOKEVIRTUAL: u8 = 0xb6;
pub(crate) const INVOKESPECIAL: u8 = 0xb7;
pub(crate) const INVOKESTATIC: u8 = 0xb8;
pub(crate) const INVOKEINTERFACE: u8 = 0xb9;
pub(crate) const INVOKEDYNAMIC: u8 = 0xba;
pub(crate) const WIDE: u8 = 0xc4;

/// Length in bytes of a fixed-size instruction, including the opcode.
///
/// Returns `None` for the variable-length opcodes (`tableswitch`,
/// `lookupswitch`, `wide`) and for reserved opcode values.
pub(crate) fn fixed_length(opcode: u8) -> Option<usize> {
    let length = match opcode {
        0x00..=0x0f => 1, // nop, aconst_null, iconst_*..dconst_*
        0x10 => 2,        // bipush
        0x11 => 3,        // sipush
        0x12 => 2,        // ldc
        0x13 | 0x14 => 3, // ldc_w, ldc2_w
        0x15..=0x19 => 2, // iload..aload with a local index
        0x1a..=0x35 => 1, // iload_0..saload
        0x36..=0x3a => 2, // istore..astore with a local index
        0x3b..=0x83 => 1, // istore_0..lxor
        0x84 => 3,        // iinc
        0x85..=0x98 => 1, // conversions and comparisons
        0x99..=0xa8 => 3, // if*, goto, jsr
        0xa9 => 2,        // ret
        0xac..=0xb1 => 1, // ireturn..return
        0xb2..=0xb8 => 3, // getstatic..invokestatic
        0xb9 | 0xba => 5, // invokeinterface, invokedynamic
        0xbb => 3,        // new
        0xbc => 2,        // newarray
        0xbd => 3,        // anewarray
        0xbe | 0xbf => 1, // arraylength, athrow
        0xc0 | 0xc1 => 3, // checkcast, instanceof
        0xc2 | 0xc3 => 1, // monitorenter, monitorexit
        0xc5 => 4,        // multianewarray
        0xc6 | 0xc7 => 3, // ifnull, ifnonnull
        0xc8 | 0xc9 => 5, // goto_w, jsr_w
        _ => return None,
    };
    Some(length)
}
