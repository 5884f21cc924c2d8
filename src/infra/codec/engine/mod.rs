//! Generic signal extraction engine driven by compile-time [`FieldDescriptor`]s.
//! It controls the bit-level readers/writers so adapters only declare where a
//! signal lives and never hand-roll shifts and masks.
use super::bits::{from_signed, to_signed, BitReader, BitWriter};
use crate::core::{ByteOrder, FieldDescriptor, Payload};

impl FieldDescriptor {
    /// Raw unsigned value of the field.
    #[inline]
    pub fn extract(&self, payload: &Payload) -> u32 {
        let reader = BitReader::new(payload);
        match self.order() {
            ByteOrder::LittleEndian => reader.read_le(self.lsb_position(), self.width()),
            ByteOrder::BigEndian => reader.read_be(self.lsb_position(), self.width()),
        }
    }

    /// Field value as a signed integer.
    ///
    /// Signed descriptors are sign-extended from their declared width before
    /// any arithmetic; unsigned ones are returned as-is (widths up to 31 bits
    /// always fit).
    #[inline]
    pub fn extract_signed(&self, payload: &Payload) -> i32 {
        let raw = self.extract(payload);
        if self.is_signed() {
            to_signed(raw, self.width())
        } else {
            raw as i32
        }
    }

    /// Flag helper: any non-zero raw value.
    #[inline]
    pub fn is_set(&self, payload: &Payload) -> bool {
        self.extract(payload) != 0
    }

    /// Write a raw unsigned value into the field, truncated to its width.
    pub fn insert(&self, payload: &mut Payload, raw: u32) {
        let mut writer = BitWriter::new(payload);
        match self.order() {
            ByteOrder::LittleEndian => writer.write_le(self.lsb_position(), self.width(), raw),
            ByteOrder::BigEndian => writer.write_be(self.lsb_position(), self.width(), raw),
        }
    }

    /// Write a signed value using the field's two's complement width.
    pub fn insert_signed(&self, payload: &mut Payload, value: i32) {
        self.insert(payload, from_signed(value, self.width()));
    }
}
