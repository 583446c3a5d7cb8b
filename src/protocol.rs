/// Modbus protocol definitions and data structures
///
/// This module contains the request/response structures and the function
/// codes the gateway client speaks. The set is deliberately closed: only the
/// coil and holding-register operations the oven driver needs exist here.

use serde::{Deserialize, Serialize};
use std::fmt;
use crate::error::{ModbusError, ModbusResult};

/// Modbus address type (0-65535)
pub type ModbusAddress = u16;

/// Modbus value type (16-bit register value)
pub type ModbusValue = u16;

/// Function codes supported by the gateway client
///
/// Anything outside this set requested of, or returned by, the transport is a
/// caller/library mismatch and surfaces as [`ModbusError::Unsupported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ModbusFunction {
    /// Read Coils (0x01)
    ReadCoils = 0x01,
    /// Read Holding Registers (0x03)
    ReadHoldingRegisters = 0x03,
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
            0x03 => Ok(ModbusFunction::ReadHoldingRegisters),
            0x05 => Ok(ModbusFunction::WriteSingleCoil),
            0x06 => Ok(ModbusFunction::WriteSingleRegister),
            0x0F => Ok(ModbusFunction::WriteMultipleCoils),
            0x10 => Ok(ModbusFunction::WriteMultipleRegisters),
            _ => Err(ModbusError::unsupported(value)),
        }
    }

    /// Convert to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Check if this is a read function
    pub fn is_read_function(self) -> bool {
        matches!(self,
            ModbusFunction::ReadCoils |
            ModbusFunction::ReadHoldingRegisters
        )
    }

    /// Check if this is a write function
    pub fn is_write_function(self) -> bool {
        !self.is_read_function()
    }
}

impl fmt::Display for ModbusFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModbusFunction::ReadCoils => "Read Coils",
            ModbusFunction::ReadHoldingRegisters => "Read Holding Registers",
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
}

/// Modbus request structure
///
/// Transient: constructed per call by the client, consumed by the transport.
/// `quantity` is the register/coil count for reads and the element count for
/// multi-writes; `data` is the wire payload for writes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModbusRequest {
    pub function: ModbusFunction,
    pub address: ModbusAddress,
    pub quantity: u16,
    pub data: Vec<u8>,
    /// Payload is pre-encoded by the caller: transmit verbatim, log as raw hex
    pub encode_skip: bool,
}

impl ModbusRequest {
    /// Create a new read request
    pub fn new_read(function: ModbusFunction, address: ModbusAddress, quantity: u16) -> Self {
        Self {
            function,
            address,
            quantity,
            data: Vec::new(),
            encode_skip: false,
        }
    }

    /// Create a new write request
    pub fn new_write(
        function: ModbusFunction,
        address: ModbusAddress,
        quantity: u16,
        data: Vec<u8>,
    ) -> Self {
        Self {
            function,
            address,
            quantity,
            data,
            encode_skip: false,
        }
    }

    /// Mark the payload as pre-encoded by the caller
    pub fn with_encode_skip(mut self, skip: bool) -> Self {
        self.encode_skip = skip;
        self
    }

    /// Validate the request against frame limits
    ///
    /// Zero quantities are legal here: the gateway expects one round trip
    /// even for an empty read or write, and answers with an empty payload.
    pub fn validate(&self) -> ModbusResult<()> {
        match self.function {
            ModbusFunction::ReadHoldingRegisters => {
                if self.quantity > crate::MAX_REGISTERS_PER_REQUEST {
                    return Err(ModbusError::invalid_data(
                        format!("too many registers requested: {}", self.quantity)
                    ));
                }
            },
            ModbusFunction::ReadCoils => {
                if self.quantity > 2000 {
                    return Err(ModbusError::invalid_data(
                        format!("too many coils requested: {}", self.quantity)
                    ));
                }
            },
            ModbusFunction::WriteMultipleRegisters => {
                if self.data.len() != self.quantity as usize * 2 {
                    return Err(ModbusError::invalid_data(
                        format!("register payload is {} bytes for quantity {}",
                                self.data.len(), self.quantity)
                    ));
                }
            },
            _ => {}
        }

        Ok(())
    }
}

/// Modbus response structure
#[derive(Debug, Clone, PartialEq)]
pub struct ModbusResponse {
    pub function: ModbusFunction,
    pub data: Vec<u8>,
    pub exception: Option<ModbusException>,
}

impl ModbusResponse {
    /// Create a successful response
    pub fn new_success(function: ModbusFunction, data: Vec<u8>) -> Self {
        Self {
            function,
            data,
            exception: None,
        }
    }

    /// Create an exception response
    pub fn new_exception(function: ModbusFunction, exception_code: u8) -> Self {
        let exception = ModbusException::from_u8(exception_code);
        Self {
            function,
            data: Vec::new(),
            exception,
        }
    }

    /// Check if this is an exception response
    pub fn is_exception(&self) -> bool {
        self.exception.is_some()
    }

    /// Get exception error if present
    pub fn get_exception(&self) -> Option<ModbusError> {
        self.exception.map(|exc| {
            ModbusError::exception(self.function.to_u8(), exc.to_u8())
        })
    }

    /// Parse response data as registers (u16 values)
    ///
    /// Expects the byte-count-prefixed payload of a register read response.
    pub fn parse_registers(&self) -> ModbusResult<Vec<u16>> {
        if let Some(error) = self.get_exception() {
            return Err(error);
        }

        if self.data.is_empty() {
            return Err(ModbusError::frame("empty response data"));
        }

        let byte_count = self.data[0] as usize;
        if self.data.len() < 1 + byte_count {
            return Err(ModbusError::frame("incomplete register data"));
        }

        if byte_count % 2 != 0 {
            return Err(ModbusError::frame("invalid register data length"));
        }

        let mut registers = Vec::with_capacity(byte_count / 2);
        for i in (1..1 + byte_count).step_by(2) {
            registers.push(u16::from_be_bytes([self.data[i], self.data[i + 1]]));
        }

        Ok(registers)
    }

    /// Parse response data as bits (bool values)
    ///
    /// Expects the byte-count-prefixed payload of a coil read response.
    /// Returns all packed bits; callers truncate to the requested count.
    pub fn parse_bits(&self) -> ModbusResult<Vec<bool>> {
        if let Some(error) = self.get_exception() {
            return Err(error);
        }

        if self.data.is_empty() {
            return Err(ModbusError::frame("empty response data"));
        }

        let byte_count = self.data[0] as usize;
        if self.data.len() < 1 + byte_count {
            return Err(ModbusError::frame("incomplete bit data"));
        }

        let mut bits = Vec::with_capacity(byte_count * 8);
        for i in 1..1 + byte_count {
            let byte_value = self.data[i];
            for bit_pos in 0..8 {
                bits.push((byte_value & (1 << bit_pos)) != 0);
            }
        }

        Ok(bits)
    }

    /// Parse the echoed (address, quantity) of a multi-write response
    pub fn parse_write_echo(&self) -> ModbusResult<(u16, u16)> {
        if let Some(error) = self.get_exception() {
            return Err(error);
        }

        if self.data.len() < 4 {
            return Err(ModbusError::frame("write echo too short"));
        }

        let address = u16::from_be_bytes([self.data[0], self.data[1]]);
        let value = u16::from_be_bytes([self.data[2], self.data[3]]);
        Ok((address, value))
    }
}

/// Data conversion utilities
pub mod data_utils {
    /// Convert register values to bytes (big-endian)
    pub fn registers_to_bytes(registers: &[u16]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(registers.len() * 2);
        for &register in registers {
            bytes.extend_from_slice(&register.to_be_bytes());
        }
        bytes
    }

    /// Convert bytes to register values (big-endian)
    pub fn bytes_to_registers(bytes: &[u8]) -> crate::error::ModbusResult<Vec<u16>> {
        if bytes.len() % 2 != 0 {
            return Err(crate::error::ModbusError::invalid_data(
                "byte array length must be even".to_string()
            ));
        }

        let mut registers = Vec::with_capacity(bytes.len() / 2);
        for chunk in bytes.chunks(2) {
            registers.push(u16::from_be_bytes([chunk[0], chunk[1]]));
        }
        Ok(registers)
    }

    /// Pack boolean values into bytes
    pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
        let byte_count = (bits.len() + 7) / 8;
        let mut bytes = vec![0u8; byte_count];

        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                bytes[i / 8] |= 1 << (i % 8);
            }
        }

        bytes
    }

    /// Unpack bytes into boolean values
    pub fn unpack_bits(bytes: &[u8], bit_count: usize) -> Vec<bool> {
        let mut bits = Vec::with_capacity(bit_count);

        for i in 0..bit_count {
            let byte_index = i / 8;
            if byte_index < bytes.len() {
                bits.push((bytes[byte_index] & (1 << (i % 8))) != 0);
            } else {
                bits.push(false);
            }
        }

        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_conversion() {
        assert_eq!(ModbusFunction::from_u8(0x03).unwrap(), ModbusFunction::ReadHoldingRegisters);
        assert_eq!(ModbusFunction::ReadHoldingRegisters.to_u8(), 0x03);

        // Discrete inputs and input registers are outside the supported set
        assert!(matches!(
            ModbusFunction::from_u8(0x02),
            Err(ModbusError::Unsupported { code: 0x02 })
        ));
        assert!(matches!(
            ModbusFunction::from_u8(0x04),
            Err(ModbusError::Unsupported { code: 0x04 })
        ));
        assert!(ModbusFunction::from_u8(0xFF).is_err());
    }

    #[test]
    fn test_request_validation() {
        let valid = ModbusRequest::new_read(ModbusFunction::ReadHoldingRegisters, 100, 124);
        assert!(valid.validate().is_ok());

        // Zero quantity is a legal one-round-trip request for this gateway
        let zero = ModbusRequest::new_read(ModbusFunction::ReadHoldingRegisters, 100, 0);
        assert!(zero.validate().is_ok());

        let too_many = ModbusRequest::new_read(ModbusFunction::ReadHoldingRegisters, 100, 200);
        assert!(too_many.validate().is_err());

        let mismatched = ModbusRequest::new_write(
            ModbusFunction::WriteMultipleRegisters, 0, 2, vec![0x00, 0x01],
        );
        assert!(mismatched.validate().is_err());
    }

    #[test]
    fn test_data_utils() {
        let registers = vec![0x1234, 0x5678];
        let bytes = data_utils::registers_to_bytes(&registers);
        assert_eq!(bytes, vec![0x12, 0x34, 0x56, 0x78]);

        let back = data_utils::bytes_to_registers(&bytes).unwrap();
        assert_eq!(back, registers);

        let bits = vec![true, false, true, true, false, false, false, false];
        let packed = data_utils::pack_bits(&bits);
        let unpacked = data_utils::unpack_bits(&packed, bits.len());
        assert_eq!(unpacked, bits);
    }

    #[test]
    fn test_response_parsing() {
        // Register response: byte_count + 2 registers
        let register_data = vec![4, 0x12, 0x34, 0x56, 0x78];
        let response = ModbusResponse::new_success(ModbusFunction::ReadHoldingRegisters, register_data);
        assert_eq!(response.parse_registers().unwrap(), vec![0x1234, 0x5678]);

        // Bit response: byte_count + 1 byte
        let bit_data = vec![1, 0b10101010];
        let response = ModbusResponse::new_success(ModbusFunction::ReadCoils, bit_data);
        let bits = response.parse_bits().unwrap();
        assert!(!bits[0]); // LSB first
        assert!(bits[1]);
        assert!(!bits[2]);
        assert!(bits[3]);

        // Zero-count read answers with an empty payload
        let empty = ModbusResponse::new_success(ModbusFunction::ReadHoldingRegisters, vec![0]);
        assert!(empty.parse_registers().unwrap().is_empty());
    }

    #[test]
    fn test_exception_response() {
        let response = ModbusResponse::new_exception(ModbusFunction::ReadHoldingRegisters, 0x02);
        assert!(response.is_exception());
        match response.get_exception().unwrap() {
            ModbusError::Exception { function, code, .. } => {
                assert_eq!(function, 0x03);
                assert_eq!(code, 0x02);
            },
            other => panic!("unexpected error: {other}"),
        }
    }
}
