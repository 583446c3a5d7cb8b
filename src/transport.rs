//! # Gateway Transport Layer
//!
//! TCP transport for the gateway connection: MBAP framing, transaction id
//! management, per-phase timeouts, and packet logging.
//!
//! The transport performs exactly one exchange per [`ModbusTransport::request`]
//! call and assumes the caller serializes access — the protocol forbids
//! concurrent outstanding requests on one connection, and that guarantee is
//! enforced a level up by [`GatewaySession`](crate::session::GatewaySession).
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use thermo_modbus::transport::{TcpTransport, ModbusTransport};
//! use thermo_modbus::protocol::{ModbusRequest, ModbusFunction};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut transport = TcpTransport::connect(
//!         "127.0.0.1:502".parse()?,
//!         1,
//!         Duration::from_secs(1),
//!     ).await?;
//!
//!     let request = ModbusRequest::new_read(ModbusFunction::ReadHoldingRegisters, 360, 2);
//!     let response = transport.request(&request).await?;
//!     println!("Response: {:?}", response.parse_registers()?);
//!
//!     transport.close().await?;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::time::Duration;
use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::info;

use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{ModbusRequest, ModbusResponse, ModbusFunction};

/// Modbus TCP Application Protocol header size (transaction + protocol + length)
const MBAP_HEADER_SIZE: usize = 6;

/// Format raw bytes as hex string for packet logging
fn format_hex_packet(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Log packet with direction
fn log_packet(direction: &str, data: &[u8], unit_id: u8) {
    info!("[MODBUS-TCP] {} unit:{} {}", direction, unit_id, format_hex_packet(data));
}

/// Transport layer abstraction for the gateway exchange
///
/// The seam exists so the session can drive either a real TCP connection or a
/// test double. Implementations perform one request/response cycle per call
/// and must be `Send + Sync`; exclusive access comes from `&mut self`.
#[async_trait]
pub trait ModbusTransport: Send + Sync {
    /// Send one Modbus request and wait for its response
    ///
    /// Handles the complete cycle: frame encoding, transmission, response
    /// reception and decoding.
    ///
    /// # Errors
    ///
    /// - `ModbusError::Timeout` - a phase of the exchange timed out
    /// - `ModbusError::Io` - the connection failed mid-exchange
    /// - `ModbusError::Connection` - a broken connection could not be re-established
    /// - `ModbusError::Exception` - the device returned a Modbus exception
    /// - `ModbusError::Frame` - the response frame was malformed
    async fn request(&mut self, request: &ModbusRequest) -> ModbusResult<ModbusResponse>;

    /// Check if the transport believes it has an active connection
    ///
    /// A local check only; it does not verify the remote device is responsive.
    fn is_connected(&self) -> bool;

    /// Close the transport connection
    ///
    /// Idempotent; resources are released on every path.
    async fn close(&mut self) -> ModbusResult<()>;

    /// Get communication statistics
    fn get_stats(&self) -> TransportStats;
}

/// Transport layer statistics
#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Modbus TCP transport implementation
pub struct TcpTransport {
    stream: Option<TcpStream>,
    pub address: SocketAddr,
    unit_id: u8,
    timeout: Duration,
    transaction_id: u16,
    stats: TransportStats,
    /// Enable packet logging for debugging
    packet_logging: bool,
}

impl TcpTransport {
    /// Connect to the gateway
    ///
    /// The attempt is bounded by `timeout`; failure or expiry maps to a
    /// `Connection` error naming the target address.
    pub async fn connect(address: SocketAddr, unit_id: u8, timeout_dur: Duration) -> ModbusResult<Self> {
        let stream = Self::open_stream(address, timeout_dur).await?;

        Ok(Self {
            stream: Some(stream),
            address,
            unit_id,
            timeout: timeout_dur,
            transaction_id: 1,
            stats: TransportStats::default(),
            packet_logging: false,
        })
    }

    /// Enable or disable packet logging
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.packet_logging = enabled;
    }

    async fn open_stream(address: SocketAddr, timeout_dur: Duration) -> ModbusResult<TcpStream> {
        match timeout(timeout_dur, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(ModbusError::connection(
                format!("could not connect to '{}': {}", address, e)
            )),
            Err(_) => Err(ModbusError::connection(
                format!("could not connect to '{}': attempt timed out", address)
            )),
        }
    }

    /// Re-establish a connection that a previous failure marked broken
    async fn reconnect(&mut self) -> ModbusResult<()> {
        self.stream = None;
        self.stream = Some(Self::open_stream(self.address, self.timeout).await?);
        Ok(())
    }

    /// Get next transaction ID
    fn next_transaction_id(&mut self) -> u16 {
        self.transaction_id = self.transaction_id.wrapping_add(1);
        if self.transaction_id == 0 {
            self.transaction_id = 1;
        }
        self.transaction_id
    }

    /// Encode request to TCP frame
    fn encode_request(&mut self, request: &ModbusRequest) -> BytesMut {
        let transaction_id = self.next_transaction_id();
        let protocol_id = 0u16; // Always 0 for Modbus

        // PDU length: unit_id + function_code + body
        let pdu_length = 1 + 1 + match request.function {
            ModbusFunction::ReadCoils |
            ModbusFunction::ReadHoldingRegisters => 4, // address (2) + quantity (2)

            ModbusFunction::WriteSingleCoil |
            ModbusFunction::WriteSingleRegister => 4, // address (2) + value (2)

            ModbusFunction::WriteMultipleCoils |
            ModbusFunction::WriteMultipleRegisters => 5 + request.data.len(), // address (2) + quantity (2) + byte_count (1) + data
        };

        let mut frame = BytesMut::with_capacity(MBAP_HEADER_SIZE + pdu_length);

        // MBAP Header: Transaction ID (2) + Protocol ID (2) + Length (2)
        frame.put_u16(transaction_id);
        frame.put_u16(protocol_id);
        frame.put_u16(pdu_length as u16);

        // PDU: Unit ID + Function Code + Address
        frame.put_u8(self.unit_id);
        frame.put_u8(request.function.to_u8());
        frame.put_u16(request.address);

        match request.function {
            ModbusFunction::ReadCoils |
            ModbusFunction::ReadHoldingRegisters => {
                frame.put_u16(request.quantity);
            },

            ModbusFunction::WriteSingleCoil => {
                let value: u16 = if !request.data.is_empty() && request.data[0] != 0 { 0xFF00 } else { 0x0000 };
                frame.put_u16(value);
            },

            ModbusFunction::WriteSingleRegister => {
                if request.data.len() >= 2 {
                    frame.put_slice(&request.data[0..2]);
                } else {
                    frame.put_slice(&[0, 0]);
                }
            },

            ModbusFunction::WriteMultipleCoils |
            ModbusFunction::WriteMultipleRegisters => {
                frame.put_u16(request.quantity);
                frame.put_u8(request.data.len() as u8);
                frame.put_slice(&request.data);
            },
        }

        frame
    }

    /// Decode response from TCP frame
    ///
    /// Transaction ids are not cross-checked: the serializer guarantees one
    /// outstanding exchange, so a response can only pair with the request
    /// that produced it.
    fn decode_response(&self, frame: &[u8]) -> ModbusResult<ModbusResponse> {
        if frame.len() < MBAP_HEADER_SIZE + 2 {
            return Err(ModbusError::frame("frame too short"));
        }

        let length = u16::from_be_bytes([frame[4], frame[5]]);

        if frame.len() < MBAP_HEADER_SIZE + length as usize {
            return Err(ModbusError::frame("incomplete frame"));
        }

        let function_code = frame[7];

        // Exception responses set the high bit of the function code
        if function_code & 0x80 != 0 {
            if frame.len() < MBAP_HEADER_SIZE + 3 {
                return Err(ModbusError::frame("invalid exception response"));
            }

            let original_function = function_code & 0x7F;
            let exception_code = frame[8];

            return Ok(ModbusResponse::new_exception(
                ModbusFunction::from_u8(original_function)?,
                exception_code,
            ));
        }

        let function = ModbusFunction::from_u8(function_code)?;
        let data = frame[MBAP_HEADER_SIZE + 2..MBAP_HEADER_SIZE + length as usize].to_vec();

        Ok(ModbusResponse::new_success(function, data))
    }
}

#[async_trait]
impl ModbusTransport for TcpTransport {
    async fn request(&mut self, request: &ModbusRequest) -> ModbusResult<ModbusResponse> {
        request.validate()?;

        // Reconnect on demand if an earlier failure marked the stream broken
        if self.stream.is_none() {
            self.reconnect().await?;
        }

        let frame = self.encode_request(request);
        self.stats.requests_sent += 1;
        self.stats.bytes_sent += frame.len() as u64;

        if self.packet_logging {
            log_packet("send", &frame, self.unit_id);
        }

        let stream = self.stream.as_mut().expect("stream present after reconnect");

        match timeout(self.timeout, stream.write_all(&frame)).await {
            Ok(Ok(())) => {},
            _ => {
                self.stats.timeouts += 1;
                self.stats.errors += 1;
                self.stream = None; // Mark connection as broken
                return Err(ModbusError::timeout("exchange failed sending request"));
            }
        }

        // Read MBAP header plus the unit byte first; the length field tells
        // us how much of the PDU is still in flight
        let mut header_buf = [0u8; MBAP_HEADER_SIZE + 1];
        match timeout(self.timeout, stream.read_exact(&mut header_buf)).await {
            Ok(Ok(_)) => {},
            _ => {
                self.stats.timeouts += 1;
                self.stats.errors += 1;
                self.stream = None;
                return Err(ModbusError::timeout("exchange failed reading response header"));
            }
        }

        let length = u16::from_be_bytes([header_buf[4], header_buf[5]]);
        if length as usize > crate::MAX_TCP_FRAME_SIZE {
            self.stats.errors += 1;
            return Err(ModbusError::frame("response frame too large"));
        }

        // Read remaining data (-1 for the unit byte already consumed)
        let remaining_bytes = (length as usize).saturating_sub(1);
        let mut response_buf = vec![0u8; MBAP_HEADER_SIZE + 1 + remaining_bytes];
        response_buf[..MBAP_HEADER_SIZE + 1].copy_from_slice(&header_buf);

        if remaining_bytes > 0 {
            match timeout(self.timeout, stream.read_exact(&mut response_buf[MBAP_HEADER_SIZE + 1..])).await {
                Ok(Ok(_)) => {},
                _ => {
                    self.stats.timeouts += 1;
                    self.stats.errors += 1;
                    self.stream = None;
                    return Err(ModbusError::timeout("exchange failed reading response data"));
                }
            }
        }

        self.stats.responses_received += 1;
        self.stats.bytes_received += response_buf.len() as u64;

        if self.packet_logging {
            log_packet("receive", &response_buf, self.unit_id);
        }

        let response = self.decode_response(&response_buf)?;

        if let Some(error) = response.get_exception() {
            self.stats.errors += 1;
            return Err(error);
        }

        Ok(response)
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        Ok(())
    }

    fn get_stats(&self) -> TransportStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport_for_encoding() -> TcpTransport {
        // Never connected; only encode/decode paths are exercised
        TcpTransport {
            stream: None,
            address: "127.0.0.1:502".parse().unwrap(),
            unit_id: 1,
            timeout: Duration::from_millis(100),
            transaction_id: 0,
            stats: TransportStats::default(),
            packet_logging: false,
        }
    }

    #[test]
    fn test_encode_read_request() {
        let mut transport = transport_for_encoding();
        let request = ModbusRequest::new_read(ModbusFunction::ReadHoldingRegisters, 360, 124);
        let frame = transport.encode_request(&request);

        // MBAP: tid=1, pid=0, len=6; PDU: unit, 0x03, addr 360, qty 124
        assert_eq!(&frame[..], &[
            0x00, 0x01, 0x00, 0x00, 0x00, 0x06,
            0x01, 0x03, 0x01, 0x68, 0x00, 0x7C,
        ]);
    }

    #[test]
    fn test_encode_write_multiple_request() {
        let mut transport = transport_for_encoding();
        let data = crate::protocol::data_utils::registers_to_bytes(&[0x41C8, 0x0000]);
        let request = ModbusRequest::new_write(ModbusFunction::WriteMultipleRegisters, 2160, 2, data);
        let frame = transport.encode_request(&request);

        assert_eq!(&frame[..], &[
            0x00, 0x01, 0x00, 0x00, 0x00, 0x0B,
            0x01, 0x10, 0x08, 0x70, 0x00, 0x02, 0x04, 0x41, 0xC8, 0x00, 0x00,
        ]);
    }

    #[test]
    fn test_encode_zero_quantity_read() {
        let mut transport = transport_for_encoding();
        let request = ModbusRequest::new_read(ModbusFunction::ReadHoldingRegisters, 100, 0);
        let frame = transport.encode_request(&request);
        assert_eq!(&frame[8..12], &[0x00, 0x64, 0x00, 0x00]);
    }

    #[test]
    fn test_decode_register_response() {
        let transport = transport_for_encoding();
        let frame = [
            0x00, 0x01, 0x00, 0x00, 0x00, 0x07,
            0x01, 0x03, 0x04, 0x12, 0x34, 0x56, 0x78,
        ];
        let response = transport.decode_response(&frame).unwrap();
        assert_eq!(response.parse_registers().unwrap(), vec![0x1234, 0x5678]);
    }

    #[test]
    fn test_decode_exception_response() {
        let transport = transport_for_encoding();
        let frame = [
            0x00, 0x01, 0x00, 0x00, 0x00, 0x03,
            0x01, 0x83, 0x02,
        ];
        let response = transport.decode_response(&frame).unwrap();
        assert!(response.is_exception());
        assert!(matches!(response.get_exception(), Some(ModbusError::Exception { code: 0x02, .. })));
    }

    #[test]
    fn test_decode_short_frame() {
        let transport = transport_for_encoding();
        assert!(matches!(
            transport.decode_response(&[0x00, 0x01, 0x00]),
            Err(ModbusError::Frame { .. })
        ));
    }

    #[test]
    fn test_transaction_id_wraps_past_zero() {
        let mut transport = transport_for_encoding();
        transport.transaction_id = u16::MAX;
        assert_eq!(transport.next_transaction_id(), 1);
        assert_eq!(transport.next_transaction_id(), 2);
    }

    #[test]
    fn test_hex_formatting() {
        assert_eq!(format_hex_packet(&[0x01, 0xAB, 0x00]), "01 AB 00");
    }
}
