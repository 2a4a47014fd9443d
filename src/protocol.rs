/// Modbus RTU protocol definitions and frame handling
///
/// This module contains the core protocol definitions (function codes,
/// exception codes) and the ADU (Application Data Unit) frame type that
/// everything else in the crate builds on.

use crc::{Crc, CRC_16_MODBUS};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModbusError, ModbusResult};

/// Modbus address type (0-65535)
pub type ModbusAddress = u16;

/// Modbus value type (16-bit register value)
pub type ModbusValue = u16;

/// Modbus device/slave identifier (1-247)
pub type DeviceAddress = u8;

/// Maximum length of an RTU ADU in bytes (address + PDU + CRC)
pub const ADU_LENGTH_MAX: usize = 256;

/// Maximum length of the data section of an ADU (excludes the function code)
pub const ADU_DATA_LENGTH_MAX: usize = 252;

/// Index of the device address field in an ADU
pub const ADU_ADDRESS_INDEX: usize = 0;

/// Index of the function code field in an ADU
pub const ADU_FUNCTION_CODE_INDEX: usize = 1;

/// Index of the first data byte in an ADU (also the exception code position)
pub const ADU_DATA_INDEX: usize = 2;

/// Length of the CRC trailer in bytes
pub const ADU_CRC_LENGTH: usize = 2;

/// CRC calculator for RTU framing (polynomial 0xA001, init 0xFFFF, reflected)
const CRC_MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Modbus function codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ModbusFunction {
    /// Read Coils (0x01)
    ReadCoils = 0x01,
    /// Read Discrete Inputs (0x02)
    ReadDiscreteInputs = 0x02,
    /// Read Holding Registers (0x03)
    ReadHoldingRegisters = 0x03,
    /// Read Input Registers (0x04)
    ReadInputRegisters = 0x04,
    /// Write Single Coil (0x05)
    WriteSingleCoil = 0x05,
    /// Write Single Register (0x06)
    WriteSingleRegister = 0x06,
    /// Write Multiple Coils (0x0F)
    WriteMultipleCoils = 0x0F,
    /// Write Multiple Registers (0x10)
    WriteMultipleRegisters = 0x10,
}

impl ModbusFunction {
    /// Convert from u8 to ModbusFunction
    pub fn from_u8(value: u8) -> ModbusResult<Self> {
        match value {
            0x01 => Ok(ModbusFunction::ReadCoils),
            0x02 => Ok(ModbusFunction::ReadDiscreteInputs),
            0x03 => Ok(ModbusFunction::ReadHoldingRegisters),
            0x04 => Ok(ModbusFunction::ReadInputRegisters),
            0x05 => Ok(ModbusFunction::WriteSingleCoil),
            0x06 => Ok(ModbusFunction::WriteSingleRegister),
            0x0F => Ok(ModbusFunction::WriteMultipleCoils),
            0x10 => Ok(ModbusFunction::WriteMultipleRegisters),
            _ => Err(ModbusError::invalid_function(value)),
        }
    }

    /// Convert to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Check if this is a read function
    pub fn is_read_function(self) -> bool {
        matches!(
            self,
            ModbusFunction::ReadCoils
                | ModbusFunction::ReadDiscreteInputs
                | ModbusFunction::ReadHoldingRegisters
                | ModbusFunction::ReadInputRegisters
        )
    }

    /// Check if this is a write function
    pub fn is_write_function(self) -> bool {
        matches!(
            self,
            ModbusFunction::WriteSingleCoil
                | ModbusFunction::WriteSingleRegister
                | ModbusFunction::WriteMultipleCoils
                | ModbusFunction::WriteMultipleRegisters
        )
    }
}

impl fmt::Display for ModbusFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModbusFunction::ReadCoils => "Read Coils",
            ModbusFunction::ReadDiscreteInputs => "Read Discrete Inputs",
            ModbusFunction::ReadHoldingRegisters => "Read Holding Registers",
            ModbusFunction::ReadInputRegisters => "Read Input Registers",
            ModbusFunction::WriteSingleCoil => "Write Single Coil",
            ModbusFunction::WriteSingleRegister => "Write Single Register",
            ModbusFunction::WriteMultipleCoils => "Write Multiple Coils",
            ModbusFunction::WriteMultipleRegisters => "Write Multiple Registers",
        };
        write!(f, "{} (0x{:02X})", name, *self as u8)
    }
}

/// Modbus exception codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModbusException {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    ServerDeviceFailure = 0x04,
    Acknowledge = 0x05,
    ServerDeviceBusy = 0x06,
    NegativeAcknowledge = 0x07,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayTargetDeviceFailedToRespond = 0x0B,
}

impl ModbusException {
    /// Convert from u8 to ModbusException
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(ModbusException::IllegalFunction),
            0x02 => Some(ModbusException::IllegalDataAddress),
            0x03 => Some(ModbusException::IllegalDataValue),
            0x04 => Some(ModbusException::ServerDeviceFailure),
            0x05 => Some(ModbusException::Acknowledge),
            0x06 => Some(ModbusException::ServerDeviceBusy),
            0x07 => Some(ModbusException::NegativeAcknowledge),
            0x08 => Some(ModbusException::MemoryParityError),
            0x0A => Some(ModbusException::GatewayPathUnavailable),
            0x0B => Some(ModbusException::GatewayTargetDeviceFailedToRespond),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Get human-readable description
    pub fn description(self) -> &'static str {
        match self {
            ModbusException::IllegalFunction => "The function code received in the query is not an allowable action for the server",
            ModbusException::IllegalDataAddress => "The data address received in the query is not an allowable address for the server",
            ModbusException::IllegalDataValue => "A value contained in the query data field is not an allowable value for server",
            ModbusException::ServerDeviceFailure => "An unrecoverable error occurred while the server was attempting to perform the requested action",
            ModbusException::Acknowledge => "The server has accepted the request and is processing it, but a long duration of time will be required to do so",
            ModbusException::ServerDeviceBusy => "The server is engaged in processing a long-duration program command",
            ModbusException::NegativeAcknowledge => "The server cannot perform the program function received in the query",
            ModbusException::MemoryParityError => "The server attempted to read record file, but detected a parity error in the memory",
            ModbusException::GatewayPathUnavailable => "Gateway was unable to allocate an internal communication path",
            ModbusException::GatewayTargetDeviceFailedToRespond => "No response was obtained from the target device",
        }
    }
}

impl fmt::Display for ModbusException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Modbus Exception 0x{:02X}: {}", self.to_u8(), self.description())
    }
}

/// The role a frame is playing in a transaction
///
/// Purely a hint for accessors such as [`ModbusAdu::exception_code`]; it has
/// no effect on the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AduKind {
    /// Freshly created or reset frame
    #[default]
    None,
    /// A request built by (or received from) a client
    Request,
    /// A normal response built by (or received from) a server
    Response,
    /// An exception response
    Exception,
}

/// A Modbus RTU Application Data Unit
///
/// A fixed-capacity frame buffer with typed field accessors, CRC handling
/// and the build/parse primitives both the server and the client are written
/// in terms of.
///
/// Wire layout:
///
/// ```text
/// ┌─────────┬────────────┬──────────────┬───────┬───────┐
/// │ addr(1) │   fc(1)    │ data(0..252) │ CRClo │ CRChi │
/// └─────────┴────────────┴──────────────┴───────┴───────┘
/// ```
///
/// All multi-byte payload fields are big-endian; the CRC trailer is the only
/// little-endian field in a frame.
///
/// The frame tracks `length`, the count of semantically valid leading bytes.
/// No mutator changes `length` implicitly; each documents its effect.
/// Out-of-range reads return 0 and out-of-range writes are refused, so
/// malformed inputs stay survivable.
#[derive(Debug, Clone)]
pub struct ModbusAdu {
    buffer: [u8; ADU_LENGTH_MAX],
    length: usize,
    kind: AduKind,
}

impl Default for ModbusAdu {
    fn default() -> Self {
        Self::new()
    }
}

impl ModbusAdu {
    /// Create a new, empty frame
    pub fn new() -> Self {
        Self {
            buffer: [0u8; ADU_LENGTH_MAX],
            length: 0,
            kind: AduKind::None,
        }
    }

    /// Fixed capacity of the frame buffer
    pub const fn capacity(&self) -> usize {
        ADU_LENGTH_MAX
    }

    /// Count of semantically valid leading bytes
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether the frame currently holds no valid bytes
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The role hint attached to this frame
    pub fn kind(&self) -> AduKind {
        self.kind
    }

    /// Attach a role hint to this frame
    pub fn set_kind(&mut self, kind: AduKind) {
        self.kind = kind;
    }

    /// The valid portion of the frame as a byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.length]
    }

    /// Reset `length` to 0 without clearing any bytes
    ///
    /// Used before reusing a frame for the next exchange.
    pub fn reset_length(&mut self) {
        self.length = 0;
    }

    /// Zero the entire buffer
    ///
    /// Does not change `length`: a frame that claimed N valid bytes still
    /// claims N (now zeroed) bytes afterwards.
    pub fn clear(&mut self) {
        self.buffer.fill(0);
    }

    /// Zero a byte range
    ///
    /// Fails when `index + count` runs past the buffer capacity. Does not
    /// change `length`.
    pub fn clear_range(&mut self, index: usize, count: usize) -> ModbusResult<()> {
        if index + count > ADU_LENGTH_MAX {
            return Err(ModbusError::buffer_overflow(ADU_LENGTH_MAX, index + count));
        }
        self.buffer[index..index + count].fill(0);
        Ok(())
    }

    /// Append a single byte at `length`, advancing `length` by 1
    pub fn push(&mut self, byte: u8) -> ModbusResult<()> {
        if self.length >= ADU_LENGTH_MAX {
            return Err(ModbusError::buffer_overflow(ADU_LENGTH_MAX, self.length + 1));
        }
        self.buffer[self.length] = byte;
        self.length += 1;
        Ok(())
    }

    /// Append a run of bytes at `length`
    ///
    /// The frame is left unchanged when the bytes would not fit.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> ModbusResult<()> {
        if self.length + bytes.len() > ADU_LENGTH_MAX {
            return Err(ModbusError::buffer_overflow(
                ADU_LENGTH_MAX,
                self.length + bytes.len(),
            ));
        }
        self.buffer[self.length..self.length + bytes.len()].copy_from_slice(bytes);
        self.length += bytes.len();
        Ok(())
    }

    /// Append a 16-bit word at `length`, high byte first
    pub fn push_word(&mut self, word: u16) -> ModbusResult<()> {
        self.push_bytes(&word.to_be_bytes())
    }

    /// Append a run of 16-bit words, each high byte first
    pub fn push_words(&mut self, words: &[u16]) -> ModbusResult<()> {
        if self.length + words.len() * 2 > ADU_LENGTH_MAX {
            return Err(ModbusError::buffer_overflow(
                ADU_LENGTH_MAX,
                self.length + words.len() * 2,
            ));
        }
        for &word in words {
            self.push_bytes(&word.to_be_bytes())?;
        }
        Ok(())
    }

    /// Write the device address field
    ///
    /// `length` is advanced only while it is below 2, so the address can be
    /// set before or after the function code without double-counting.
    pub fn set_device_address(&mut self, address: u8) {
        self.buffer[ADU_ADDRESS_INDEX] = address;
        if self.length < 2 {
            self.length += 1;
        }
    }

    /// Write the function code field
    ///
    /// Refuses codes with the exception bit set; use [`Self::set_exception`]
    /// to flag a frame as an exception afterwards. `length` is advanced only
    /// while it is below 2.
    pub fn set_function_code(&mut self, function_code: u8) -> ModbusResult<()> {
        if function_code >= 0x80 {
            return Err(ModbusError::invalid_function(function_code));
        }
        self.buffer[ADU_FUNCTION_CODE_INDEX] = function_code;
        if self.length < 2 {
            self.length += 1;
        }
        Ok(())
    }

    /// OR the exception bit into the function code field
    ///
    /// Requires at least the address and function code to be present, and
    /// refuses a function code that already carries the bit.
    pub fn set_exception(&mut self) -> ModbusResult<()> {
        if self.length < 2 {
            return Err(ModbusError::invalid_state(
                "cannot flag exception before address and function code are set",
            ));
        }
        if self.buffer[ADU_FUNCTION_CODE_INDEX] >= 0x80 {
            return Err(ModbusError::invalid_state(
                "function code already carries the exception bit",
            ));
        }
        self.buffer[ADU_FUNCTION_CODE_INDEX] |= 0x80;
        Ok(())
    }

    /// Write the exception code as the single data byte
    ///
    /// Requires `length` to be exactly 2 (address + function code only);
    /// afterwards `length` is 3.
    pub fn set_exception_code(&mut self, exception_code: u8) -> ModbusResult<()> {
        if self.length != 2 {
            return Err(ModbusError::invalid_state(
                "exception code requires exactly address and function code in the frame",
            ));
        }
        if exception_code >= 0x80 {
            return Err(ModbusError::invalid_data(format!(
                "exception code out of range: {:#04X}",
                exception_code
            )));
        }
        self.buffer[ADU_DATA_INDEX] = exception_code;
        self.length = 3;
        Ok(())
    }

    /// Replace the data section with the given bytes
    ///
    /// Requires the address and function code to be present. `length` is
    /// reset to 2 and ends up as `2 + data.len()`; any previous data or CRC
    /// trailer is discarded.
    pub fn set_data(&mut self, data: &[u8]) -> ModbusResult<()> {
        if self.length < 2 {
            return Err(ModbusError::invalid_state(
                "cannot set data before address and function code are set",
            ));
        }
        if data.len() > ADU_DATA_LENGTH_MAX {
            return Err(ModbusError::buffer_overflow(ADU_DATA_LENGTH_MAX, data.len()));
        }
        self.length = ADU_DATA_INDEX;
        self.push_bytes(data)
    }

    /// Calculate the CRC-16 of the frame contents
    ///
    /// With `crc_present == false` every valid byte participates; with
    /// `crc_present == true` the trailing two bytes are assumed to be an
    /// existing CRC trailer and are excluded.
    pub fn calculate_crc(&self, crc_present: bool) -> u16 {
        let end = if crc_present {
            self.length.saturating_sub(ADU_CRC_LENGTH)
        } else {
            self.length
        };
        CRC_MODBUS.checksum(&self.buffer[..end])
    }

    /// Compute the CRC over the frame and append the trailer
    ///
    /// The low byte is appended first. Requires at least address, function
    /// code and one data byte; `length` grows by 2. Returns the CRC value.
    pub fn set_crc(&mut self) -> ModbusResult<u16> {
        if self.length < 3 {
            return Err(ModbusError::invalid_state(
                "frame too short to carry a CRC",
            ));
        }
        let crc = self.calculate_crc(false);
        self.push_bytes(&crc.to_le_bytes())?;
        Ok(crc)
    }

    /// Verify the trailing CRC against the frame contents
    ///
    /// Recomputes the CRC over everything before the trailer and compares it
    /// byte-for-byte with the stored little-endian trailer. Frames shorter
    /// than 3 bytes never validate.
    pub fn check_crc(&self) -> bool {
        if self.length < 3 {
            return false;
        }
        self.calculate_crc(true) == self.crc()
    }

    /// The device address field
    pub fn device_address(&self) -> u8 {
        self.byte_at(ADU_ADDRESS_INDEX)
    }

    /// The function code field (exception bit included, if set)
    pub fn function_code(&self) -> u8 {
        self.byte_at(ADU_FUNCTION_CODE_INDEX)
    }

    /// The exception code of an exception frame
    ///
    /// Returns the first data byte when the function code carries the
    /// exception bit or the frame is marked [`AduKind::Exception`], and 0
    /// otherwise.
    pub fn exception_code(&self) -> u8 {
        if self.function_code() >= 0x80 || self.kind == AduKind::Exception {
            self.byte_at(ADU_DATA_INDEX)
        } else {
            0
        }
    }

    /// The starting address word of a request (data bytes 0-1)
    pub fn starting_address(&self) -> u16 {
        self.word_at(ADU_DATA_INDEX)
    }

    /// The quantity word of a request (data bytes 2-3)
    pub fn quantity(&self) -> u16 {
        self.word_at(ADU_DATA_INDEX + 2)
    }

    /// The CRC trailer, decoded from its little-endian wire layout
    ///
    /// The trailer is the only little-endian field in a frame; this accessor
    /// decodes it as stored, so a frame built with [`Self::set_crc`]
    /// satisfies `adu.crc() == adu.calculate_crc(true)`. Returns 0 when the
    /// frame is too short to carry a trailer.
    pub fn crc(&self) -> u16 {
        if self.length < 2 {
            return 0;
        }
        u16::from_le_bytes([self.buffer[self.length - 2], self.buffer[self.length - 1]])
    }

    /// Length of the data section (excludes address, function code and CRC)
    pub fn data_length(&self) -> usize {
        if self.length >= 5 {
            self.length - 4
        } else {
            0
        }
    }

    /// A single byte of the frame; 0 when the index is past `length`
    pub fn byte_at(&self, index: usize) -> u8 {
        if index < self.length {
            self.buffer[index]
        } else {
            0
        }
    }

    /// A big-endian word starting at `index`; 0 when it would run past `length`
    pub fn word_at(&self, index: usize) -> u16 {
        if index + 1 < self.length {
            u16::from_be_bytes([self.buffer[index], self.buffer[index + 1]])
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_conversion() {
        assert_eq!(
            ModbusFunction::from_u8(0x03).unwrap(),
            ModbusFunction::ReadHoldingRegisters
        );
        assert_eq!(ModbusFunction::ReadHoldingRegisters.to_u8(), 0x03);

        assert!(ModbusFunction::from_u8(0xFF).is_err());
        assert!(ModbusFunction::from_u8(0x83).is_err());
    }

    #[test]
    fn test_exception_conversion() {
        assert_eq!(
            ModbusException::from_u8(0x02).unwrap(),
            ModbusException::IllegalDataAddress
        );
        assert_eq!(ModbusException::IllegalDataAddress.to_u8(), 0x02);
        assert!(ModbusException::from_u8(0x7F).is_none());
    }

    #[test]
    fn test_word_byte_order() {
        let mut adu = ModbusAdu::new();
        adu.set_device_address(0x11);
        adu.set_function_code(0x03).unwrap();
        adu.push_word(0xABCD).unwrap();

        // Payload words are big-endian: high byte first.
        assert_eq!(adu.word_at(adu.len() - 2), 0xABCD);
        assert_eq!(adu.as_bytes()[2], 0xAB);
        assert_eq!(adu.as_bytes()[3], 0xCD);
    }

    #[test]
    fn test_crc_round_trip() {
        let mut adu = ModbusAdu::new();
        adu.set_device_address(0x01);
        adu.set_function_code(0x03).unwrap();
        adu.push_word(0x0000).unwrap();
        adu.push_word(0x0002).unwrap();

        let crc = adu.set_crc().unwrap();
        assert!(adu.check_crc());
        assert_eq!(adu.calculate_crc(true), crc);
        assert_eq!(adu.crc(), crc);

        // Known vector: 01 03 00 00 00 02 -> CRC 0x0BC4, trailer C4 0B.
        assert_eq!(crc, 0x0BC4);
        assert_eq!(adu.as_bytes(), &[0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B]);
    }

    #[test]
    fn test_crc_known_vectors() {
        let vectors: &[(&[u8], u16)] = &[
            (&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02], 0x0BC4),
            (&[0x01, 0x04, 0x00, 0x00, 0x00, 0x01], 0xCA31),
            (&[0x01, 0x06, 0x00, 0x01, 0x00, 0x03], 0x0B98),
            (&[0x02, 0x03, 0x00, 0x00, 0x00, 0x01], 0x3984),
            (&[0x11, 0x03, 0x00, 0x6B, 0x00, 0x02], 0x47B7),
        ];

        for &(bytes, expected) in vectors {
            let mut adu = ModbusAdu::new();
            adu.set_device_address(bytes[0]);
            adu.set_function_code(bytes[1]).unwrap();
            adu.push_bytes(&bytes[2..]).unwrap();
            assert_eq!(
                adu.calculate_crc(false),
                expected,
                "CRC mismatch for {:02X?}",
                bytes
            );
        }
    }

    #[test]
    fn test_exception_flagging() {
        let mut adu = ModbusAdu::new();
        adu.set_device_address(0x11);
        adu.set_function_code(0x03).unwrap();

        adu.set_exception().unwrap();
        assert_eq!(adu.function_code(), 0x83);

        // Applying the bit twice must be refused.
        assert!(adu.set_exception().is_err());

        adu.set_exception_code(0x02).unwrap();
        assert_eq!(adu.exception_code(), 0x02);
        assert_eq!(adu.len(), 3);

        // Exception code can only land on an address+fc frame.
        assert!(adu.set_exception_code(0x01).is_err());
    }

    #[test]
    fn test_set_data_resets_payload() {
        let mut adu = ModbusAdu::new();
        adu.set_device_address(0x11);
        adu.set_function_code(0x10).unwrap();
        adu.push_bytes(&[0xAA; 10]).unwrap();

        adu.set_data(&[0x00, 0x6B, 0x00, 0x01]).unwrap();
        assert_eq!(adu.len(), 6);
        assert_eq!(adu.starting_address(), 0x006B);

        // Oversized payloads are refused and the frame keeps its bytes.
        assert!(adu.set_data(&[0u8; 253]).is_err());
        assert_eq!(adu.len(), 6);
    }

    #[test]
    fn test_capacity_limits() {
        let mut adu = ModbusAdu::new();
        adu.push_bytes(&[0u8; 256]).unwrap();
        assert!(adu.push(0xFF).is_err());
        assert_eq!(adu.len(), 256);

        let mut adu = ModbusAdu::new();
        adu.push_bytes(&[0u8; 255]).unwrap();
        // A word never splits: the append is refused whole.
        assert!(adu.push_word(0x1234).is_err());
        assert_eq!(adu.len(), 255);
    }

    #[test]
    fn test_soft_boundary_reads() {
        let mut adu = ModbusAdu::new();
        adu.set_device_address(0x11);
        adu.set_function_code(0x03).unwrap();

        assert_eq!(adu.byte_at(5), 0);
        assert_eq!(adu.word_at(1), 0); // second byte past length
        assert_eq!(adu.data_length(), 0);
        assert_eq!(adu.quantity(), 0);
        assert!(!adu.check_crc());
    }

    #[test]
    fn test_length_bump_stops_at_two() {
        let mut adu = ModbusAdu::new();
        adu.set_device_address(0x11);
        assert_eq!(adu.len(), 1);
        // A second address write still bumps toward 2; after that the
        // header setters never move length again.
        adu.set_device_address(0x12);
        assert_eq!(adu.len(), 2);
        adu.set_function_code(0x03).unwrap();
        assert_eq!(adu.len(), 2);
        assert_eq!(adu.device_address(), 0x12);
        assert_eq!(adu.function_code(), 0x03);
    }

    #[test]
    fn test_kind_gates_exception_code() {
        let mut adu = ModbusAdu::new();
        adu.set_device_address(0x11);
        adu.set_function_code(0x03).unwrap();
        adu.push(0x02).unwrap();

        // Normal frame: no exception bit, no Exception kind -> 0.
        assert_eq!(adu.exception_code(), 0);

        adu.set_kind(AduKind::Exception);
        assert_eq!(adu.exception_code(), 0x02);
    }
}
