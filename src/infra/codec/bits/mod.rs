//! Low-level components dedicated to bit manipulation on CAN payloads.
//! Every access works on the fixed eight-byte [`Payload`], viewed either as an
//! Intel (little-endian) or a Motorola (big-endian) 64-bit word, so no read or
//! write can leave the buffer whatever the requested position.
use crate::core::Payload;

/// Mask covering the `width` low bits (width clamped to 32).
#[inline]
pub const fn mask(width: u8) -> u64 {
    let width = if width > 32 { 32 } else { width };
    (1u64 << width) - 1
}

/// Interpret the `width` low bits of `raw` as a two's complement number.
///
/// ```
/// use korri_safety::infra::codec::bits::to_signed;
///
/// assert_eq!(to_signed(0x7FF, 11), -1);
/// assert_eq!(to_signed(0x3FF, 11), 1023);
/// ```
#[inline]
pub fn to_signed(raw: u32, width: u8) -> i32 {
    if width == 0 {
        return 0;
    }
    let width = width.min(32) as u32;
    let shift = 32 - width;
    // Move the sign bit to bit 31 then let the arithmetic shift extend it.
    ((raw << shift) as i32) >> shift
}

/// Encode `value` as a `width`-bit two's complement pattern (inverse of [`to_signed`]).
#[inline]
pub fn from_signed(value: i32, width: u8) -> u32 {
    (value as u32) & mask(width) as u32
}

//==================================================================================BITREADER
/// Reader extracting bit segments from a payload without copies.
pub struct BitReader<'a> {
    /// Source payload (typically the frame being inspected).
    payload: &'a Payload,
}

impl<'a> BitReader<'a> {
    pub fn new(payload: &'a Payload) -> Self {
        Self { payload }
    }

    /// Read `width` bits whose least significant bit sits at `lsb` in the Intel word.
    #[inline]
    pub fn read_le(&self, lsb: u8, width: u8) -> u32 {
        Self::slice_word(self.payload.as_u64_le(), lsb, width)
    }

    /// Read `width` bits whose least significant bit sits at `lsb` in the Motorola word.
    #[inline]
    pub fn read_be(&self, lsb: u8, width: u8) -> u32 {
        Self::slice_word(self.payload.as_u64_be(), lsb, width)
    }

    /// Single bit, `GET_BIT` numbering (byte * 8 + bit).
    #[inline]
    pub fn read_bit(&self, position: u8) -> bool {
        self.read_le(position, 1) != 0
    }

    fn slice_word(word: u64, lsb: u8, width: u8) -> u32 {
        // Out-of-range shifts yield zero instead of overflowing.
        (word.checked_shr(lsb as u32).unwrap_or(0) & mask(width)) as u32
    }
}

//==================================================================================BITWRITER
/// Writer laying bit segments into a payload. Bits outside the field are preserved,
/// so several signals can be packed into the same frame.
pub struct BitWriter<'a> {
    /// Target payload (typically a frame under construction).
    payload: &'a mut Payload,
}

impl<'a> BitWriter<'a> {
    pub fn new(payload: &'a mut Payload) -> Self {
        Self { payload }
    }

    /// Write the `width` low bits of `value` at `lsb` in the Intel word.
    pub fn write_le(&mut self, lsb: u8, width: u8, value: u32) {
        let word = Self::splice_word(self.payload.as_u64_le(), lsb, width, value);
        self.payload.0 = word.to_le_bytes();
    }

    /// Write the `width` low bits of `value` at `lsb` in the Motorola word.
    pub fn write_be(&mut self, lsb: u8, width: u8, value: u32) {
        let word = Self::splice_word(self.payload.as_u64_be(), lsb, width, value);
        self.payload.0 = word.to_be_bytes();
    }

    /// Set or clear a single bit, `GET_BIT` numbering.
    pub fn write_bit(&mut self, position: u8, value: bool) {
        self.write_le(position, 1, value as u32);
    }

    fn splice_word(word: u64, lsb: u8, width: u8, value: u32) -> u64 {
        let field_mask = mask(width).checked_shl(lsb as u32).unwrap_or(0);
        let bits = (value as u64 & mask(width))
            .checked_shl(lsb as u32)
            .unwrap_or(0);
        (word & !field_mask) | (bits & field_mask)
    }
}
