//! Defines the "data contract" between the vehicle adapters (the tables)
//! and the safety engine (the interpreter).
//!
//! Adapters declare static descriptors built from these types: which messages
//! are expected on which bus, which frames may be sent, and where every signal
//! lives inside a payload. The engine consumes them without knowing the vehicle.
use crate::error::ConfigError;

/// Classic CAN payload size. Every frame handled by the core carries exactly
/// this many bytes of storage; the DLC tells how many of them are meaningful.
pub const CAN_PAYLOAD_LEN: usize = 8;

/// Maximum number of alternative messages carrying the same logical signal.
pub const MAX_RX_ALTERNATIVES: usize = 3;

/// Capacity of the RX integrity monitor (number of check sets per configuration).
pub const MAX_RX_CHECKS: usize = 8;

//==================================================================================PAYLOAD
/// Fixed eight-byte payload buffer.
///
/// Field access always goes through a [`FieldDescriptor`] whose bounds were
/// validated against this width at compile time, so extraction can never
/// read past the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Payload(pub [u8; CAN_PAYLOAD_LEN]);

impl Payload {
    /// Create a zeroed payload.
    pub const fn new() -> Self {
        Self([0; CAN_PAYLOAD_LEN])
    }

    /// Copy up to eight bytes from `slice`; missing bytes stay at zero.
    #[inline]
    pub fn from_slice(slice: &[u8]) -> Self {
        let mut data = [0; CAN_PAYLOAD_LEN];
        let clamped = slice.len().min(CAN_PAYLOAD_LEN);
        data[..clamped].copy_from_slice(&slice[..clamped]);
        Self(data)
    }

    /// Raw byte view.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; CAN_PAYLOAD_LEN] {
        &self.0
    }

    /// Whole payload as an Intel (little-endian) word: byte 0 holds bits 0..8.
    #[inline]
    pub fn as_u64_le(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }

    /// Whole payload as a Motorola (big-endian) word: byte 0 holds bits 56..64.
    #[inline]
    pub fn as_u64_be(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }
}

//==================================================================================FIELD_DESCRIPTOR
/// Bit numbering convention of a signal, as declared in DBC files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ByteOrder {
    /// Intel: `start_bit` is the least significant bit, growing towards higher bytes.
    LittleEndian,
    /// Motorola: `start_bit` is the most significant bit, growing towards lower bits
    /// of the same byte, then the next byte.
    BigEndian,
}

/// Declarative location of one signal inside a payload.
///
/// Descriptors are meant to be `const` items: the constructors assert their
/// bounds during const evaluation, so an out-of-range layout fails the build.
///
/// ```
/// use korri_safety::core::{FieldDescriptor, Payload};
///
/// // 16-bit Motorola channel in bytes 0..2
/// const RIGHT_REAR: FieldDescriptor = FieldDescriptor::big_endian(7, 16);
/// let payload = Payload([0x12, 0x34, 0, 0, 0, 0, 0, 0]);
/// assert_eq!(RIGHT_REAR.extract(&payload), 0x1234);
/// ```
///
/// The fields are private so no layout can skip those asserts:
///
/// ```compile_fail
/// use korri_safety::core::{ByteOrder, FieldDescriptor};
///
/// let _ = FieldDescriptor { start_bit: 7, width: 40, order: ByteOrder::BigEndian, signed: false };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FieldDescriptor {
    /// DBC start bit (LSB for Intel, MSB for Motorola).
    start_bit: u8,
    /// Field width in bits (1..=32).
    width: u8,
    /// Bit numbering convention.
    order: ByteOrder,
    /// Two's complement field.
    signed: bool,
}

impl FieldDescriptor {
    /// Intel field of `width` bits whose least significant bit is `start_bit`.
    pub const fn little_endian(start_bit: u8, width: u8) -> Self {
        Self::checked(start_bit, width, ByteOrder::LittleEndian)
    }

    /// Motorola field of `width` bits whose most significant bit is `start_bit`.
    pub const fn big_endian(start_bit: u8, width: u8) -> Self {
        Self::checked(start_bit, width, ByteOrder::BigEndian)
    }

    /// Single flag bit (`GET_BIT` style numbering: byte * 8 + bit).
    pub const fn bit(position: u8) -> Self {
        Self::little_endian(position, 1)
    }

    /// Mark the field as two's complement.
    pub const fn signed(self) -> Self {
        Self {
            signed: true,
            ..self
        }
    }

    const fn checked(start_bit: u8, width: u8, order: ByteOrder) -> Self {
        assert!(width >= 1 && width <= 32, "field width must be within 1..=32 bits");
        assert!(start_bit < 64, "start bit outside of an 8-byte payload");
        match order {
            ByteOrder::LittleEndian => {
                assert!(
                    start_bit as u16 + width as u16 <= 64,
                    "Intel field runs past the end of the payload"
                );
            }
            ByteOrder::BigEndian => {
                assert!(
                    motorola_position(start_bit) + 1 >= width,
                    "Motorola field runs past the end of the payload"
                );
            }
        }
        Self {
            start_bit,
            width,
            order,
            signed: false,
        }
    }

    /// DBC start bit (LSB for Intel, MSB for Motorola).
    #[inline]
    pub const fn start_bit(&self) -> u8 {
        self.start_bit
    }

    /// Field width in bits, always within `1..=32`.
    #[inline]
    pub const fn width(&self) -> u8 {
        self.width
    }

    #[inline]
    pub const fn order(&self) -> ByteOrder {
        self.order
    }

    /// Whether the field is read as two's complement.
    #[inline]
    pub const fn is_signed(&self) -> bool {
        self.signed
    }

    /// Position of the least significant bit inside the payload word matching
    /// the byte order ([`Payload::as_u64_le`] or [`Payload::as_u64_be`]).
    pub const fn lsb_position(&self) -> u8 {
        match self.order {
            ByteOrder::LittleEndian => self.start_bit,
            ByteOrder::BigEndian => motorola_position(self.start_bit) + 1 - self.width,
        }
    }

    /// Minimum DLC a message needs for this field to be fully present.
    pub const fn required_len(&self) -> u8 {
        match self.order {
            ByteOrder::LittleEndian => (self.start_bit + self.width - 1) / 8 + 1,
            ByteOrder::BigEndian => 8 - self.lsb_position() / 8,
        }
    }
}

/// Map a DBC bit number (byte * 8 + bit) to its position in the big-endian payload word.
const fn motorola_position(start_bit: u8) -> u8 {
    (7 - start_bit / 8) * 8 + start_bit % 8
}

/// Ties a field descriptor to the message address it is read from, so the
/// configuration can be checked against declared message lengths at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FieldBinding {
    pub address: u32,
    pub field: FieldDescriptor,
}

impl FieldBinding {
    pub const fn new(address: u32, field: FieldDescriptor) -> Self {
        Self { address, field }
    }
}

//==================================================================================MESSAGE_SPEC
/// Static descriptor of an expected inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MessageSpec {
    /// CAN address (11 or 29 bits).
    pub address: u32,
    /// Bus index the message is expected on.
    pub bus: u8,
    /// Expected DLC.
    pub len: u8,
    /// Expected frequency in Hz.
    pub frequency: u32,
    /// Highest counter value before wrap-around; `0` disables the counter check.
    pub max_counter: u8,
    pub ignore_checksum: bool,
    pub ignore_counter: bool,
    pub ignore_quality_flag: bool,
}

impl MessageSpec {
    /// Message with every integrity check enabled.
    pub const fn new(address: u32, bus: u8, len: u8, frequency: u32) -> Self {
        Self {
            address,
            bus,
            len,
            frequency,
            max_counter: 0,
            ignore_checksum: false,
            ignore_counter: false,
            ignore_quality_flag: false,
        }
    }

    /// Message without reliable counter, checksum, or quality flag fields.
    /// Only presence and cadence are monitored.
    pub const fn relaxed(address: u32, bus: u8, len: u8, frequency: u32) -> Self {
        Self {
            ignore_checksum: true,
            ignore_counter: true,
            ignore_quality_flag: true,
            ..Self::new(address, bus, len, frequency)
        }
    }

    /// Set the counter wrap value (counter runs over `0..=max_counter`).
    pub const fn with_max_counter(self, max_counter: u8) -> Self {
        Self {
            max_counter,
            ..self
        }
    }

    /// Place the same message on another bus.
    pub const fn on_bus(self, bus: u8) -> Self {
        Self { bus, ..self }
    }

    /// Shape match: address, bus and DLC.
    #[inline]
    pub fn matches(&self, bus: u8, address: u32, len: usize) -> bool {
        self.address == address && self.bus == bus && self.len as usize == len
    }
}

/// One logical signal: up to three alternative messages, one of which is
/// expected to be live depending on the vehicle variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxCheckSet {
    pub msgs: [Option<MessageSpec>; MAX_RX_ALTERNATIVES],
}

impl RxCheckSet {
    pub const fn single(msg: MessageSpec) -> Self {
        Self {
            msgs: [Some(msg), None, None],
        }
    }

    pub const fn pair(first: MessageSpec, second: MessageSpec) -> Self {
        Self {
            msgs: [Some(first), Some(second), None],
        }
    }

    pub const fn triple(first: MessageSpec, second: MessageSpec, third: MessageSpec) -> Self {
        Self {
            msgs: [Some(first), Some(second), Some(third)],
        }
    }

    /// Declared alternatives, in table order.
    pub fn alternatives(&self) -> impl Iterator<Item = &MessageSpec> {
        self.msgs.iter().flatten()
    }
}

//==================================================================================TX_MSG
/// Whitelisted outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxMsg {
    pub address: u32,
    pub bus: u8,
    pub len: u8,
    /// The address is owned by this system on `bus`: seeing it arrive from the
    /// vehicle means the harness relay is not isolating the stock ECU.
    pub check_relay: bool,
}

impl TxMsg {
    pub const fn new(address: u32, bus: u8, len: u8, check_relay: bool) -> Self {
        Self {
            address,
            bus,
            len,
            check_relay,
        }
    }

    #[inline]
    pub fn matches(&self, bus: u8, address: u32, len: usize) -> bool {
        self.address == address && self.bus == bus && self.len as usize == len
    }
}

//==================================================================================SAFETY_CONFIG
/// Tables of the active variant, selected once at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyConfig {
    pub rx_checks: &'static [RxCheckSet],
    pub tx_msgs: &'static [TxMsg],
}

impl SafetyConfig {
    pub const fn new(rx_checks: &'static [RxCheckSet], tx_msgs: &'static [TxMsg]) -> Self {
        Self { rx_checks, tx_msgs }
    }

    /// Configuration that neither monitors nor sends anything.
    pub const fn empty() -> Self {
        Self::new(&[], &[])
    }

    /// Check table consistency: monitor capacity, non-empty sets, non-zero
    /// cadence, and every bound field fitting inside each declared length of
    /// the messages it is read from.
    pub fn validate(&self, fields: &[FieldBinding]) -> Result<(), ConfigError> {
        if self.rx_checks.len() > MAX_RX_CHECKS {
            return Err(ConfigError::TooManyRxChecks {
                count: self.rx_checks.len(),
                max: MAX_RX_CHECKS,
            });
        }

        for (index, set) in self.rx_checks.iter().enumerate() {
            if set.alternatives().next().is_none() {
                return Err(ConfigError::EmptyRxCheckSet { index });
            }
            if let Some(msg) = set.alternatives().find(|m| m.frequency == 0) {
                return Err(ConfigError::InvalidFrequency {
                    address: msg.address,
                });
            }
        }

        for binding in fields {
            let needed = binding.field.required_len();
            let rx_lens = self
                .rx_checks
                .iter()
                .flat_map(|set| set.alternatives())
                .filter(|m| m.address == binding.address)
                .map(|m| m.len);
            let tx_lens = self
                .tx_msgs
                .iter()
                .filter(|m| m.address == binding.address)
                .map(|m| m.len);

            if let Some(declared) = rx_lens.chain(tx_lens).find(|len| *len < needed) {
                return Err(ConfigError::FieldOutOfBounds {
                    address: binding.address,
                    needed,
                    declared,
                });
            }
        }

        Ok(())
    }
}
