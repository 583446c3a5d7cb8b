/// High-level gateway client
///
/// This is the operation surface the register driver calls: coil and
/// holding-register reads and writes with raw addresses and counts. Requests
/// larger than one protocol frame are split here; every sub-request then goes
/// through the session's serialized exchange.
///
/// Chunking rules (the frame ceiling is 125 registers / 250 bytes):
/// - reads are split into 124-register sub-reads and concatenated in issuance
///   order, so chunking is invisible in the result;
/// - multi-register writes are split into 62-value sub-writes whose addresses
///   advance by a fixed 124-register stride — two registers per process value
///   on this device family. Callers get the last sub-write's response back;
///   per-chunk acknowledgement requires invoking at caller-chosen granularity.

use crate::error::ModbusResult;
use crate::config::GatewayConfig;
use crate::logging::CallbackLogger;
use crate::protocol::{data_utils, ModbusFunction, ModbusRequest, ModbusResponse};
use crate::session::{ConnectionState, GatewaySession};
use crate::transport::{ModbusTransport, TransportStats};
use crate::utils::OperationTimer;
use crate::{READ_CHUNK_REGISTERS, WRITE_CHUNK_REGISTERS, WRITE_CHUNK_STRIDE};

/// Split an oversized read into protocol-legal `(address, count)` sub-reads
///
/// Concatenating the sub-read results in plan order reconstructs the original
/// read exactly; a zero count still yields one (empty) sub-read.
fn read_chunks(address: u16, count: u16) -> Vec<(u16, u16)> {
    let mut chunks = Vec::new();
    let (mut address, mut count) = (address, count);
    while count > READ_CHUNK_REGISTERS {
        chunks.push((address, READ_CHUNK_REGISTERS));
        address = address.wrapping_add(READ_CHUNK_REGISTERS);
        count -= READ_CHUNK_REGISTERS;
    }
    chunks.push((address, count));
    chunks
}

/// Split an oversized write into `(address, value-range)` sub-writes
///
/// Each sub-write consumes 62 values while the address advances by 124
/// registers. The stride is a fidelity requirement of the deployed device
/// family (register-pair layout); do not "correct" it to the chunk length.
fn write_chunks(address: u16, len: usize) -> Vec<(u16, std::ops::Range<usize>)> {
    let mut chunks = Vec::new();
    let mut address = address;
    let mut start = 0;
    while len - start > WRITE_CHUNK_REGISTERS {
        chunks.push((address, start..start + WRITE_CHUNK_REGISTERS));
        address = address.wrapping_add(WRITE_CHUNK_STRIDE);
        start += WRITE_CHUNK_REGISTERS;
    }
    chunks.push((address, start..len));
    chunks
}

/// Client for one oven gateway
///
/// Cheap to share: all methods take `&self` and any number of tasks may call
/// them concurrently — exchanges are serialized by the session underneath.
pub struct GatewayClient {
    session: GatewaySession,
    logger: Option<CallbackLogger>,
}

impl GatewayClient {
    /// Create a client and start connecting to the gateway
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(config: GatewayConfig) -> Self {
        Self {
            session: GatewaySession::connect(config),
            logger: None,
        }
    }

    /// Create a client with exchange logging
    pub fn with_logger(config: GatewayConfig, logger: CallbackLogger) -> Self {
        Self {
            session: GatewaySession::connect(config),
            logger: Some(logger),
        }
    }

    /// Create a client over an already-established transport
    pub fn from_transport(config: GatewayConfig, transport: Box<dyn ModbusTransport>) -> Self {
        Self {
            session: GatewaySession::from_transport(config, transport),
            logger: None,
        }
    }

    /// Attach an exchange logger
    pub fn set_logger(&mut self, logger: CallbackLogger) {
        self.logger = Some(logger);
    }

    /// The underlying session
    pub fn session(&self) -> &GatewaySession {
        &self.session
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Restart the connect attempt after a failure
    pub fn open(&self) -> ModbusResult<()> {
        self.session.open()
    }

    /// Execute a raw request through the serialized exchange
    pub async fn execute_request(&self, request: ModbusRequest) -> ModbusResult<ModbusResponse> {
        if let Some(ref logger) = self.logger {
            logger.log_request(&request);
        }

        let response = self.session.execute(&request).await?;

        if let Some(ref logger) = self.logger {
            logger.log_response(&response);
        }

        Ok(response)
    }

    /// Read coils (function code 0x01)
    ///
    /// Never chunked: coil reads in this system stay within one frame.
    pub async fn read_coils(&self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        let request = ModbusRequest::new_read(ModbusFunction::ReadCoils, address, count);
        let response = self.execute_request(request).await?;
        let mut bits = response.parse_bits()?;
        bits.truncate(count as usize);
        Ok(bits)
    }

    /// Read holding registers (function code 0x03), chunking reads larger
    /// than the frame limit
    ///
    /// The result is the concatenation of all sub-reads in address order; a
    /// zero count still performs exactly one exchange.
    pub async fn read_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        let timer = OperationTimer::start("read_registers");
        let mut registers = Vec::with_capacity(count as usize);

        for (chunk_address, chunk_count) in read_chunks(address, count) {
            let request = ModbusRequest::new_read(
                ModbusFunction::ReadHoldingRegisters,
                chunk_address,
                chunk_count,
            );
            let response = self.execute_request(request).await?;
            registers.extend(response.parse_registers()?);
        }

        timer.stop();
        Ok(registers)
    }

    /// Write a single coil (function code 0x05)
    pub async fn write_coil(&self, address: u16, value: bool) -> ModbusResult<ModbusResponse> {
        let data = if value { vec![0xFF, 0x00] } else { vec![0x00, 0x00] };
        let request = ModbusRequest::new_write(ModbusFunction::WriteSingleCoil, address, 1, data);
        self.execute_request(request).await
    }

    /// Write multiple coils (function code 0x0F)
    ///
    /// Never chunked: coil writes in this system stay within one frame.
    pub async fn write_coils(&self, address: u16, values: &[bool]) -> ModbusResult<ModbusResponse> {
        let request = ModbusRequest::new_write(
            ModbusFunction::WriteMultipleCoils,
            address,
            values.len() as u16,
            data_utils::pack_bits(values),
        );
        self.execute_request(request).await
    }

    /// Write a single register (function code 0x06)
    pub async fn write_register(
        &self,
        address: u16,
        value: u16,
        skip_encode: bool,
    ) -> ModbusResult<ModbusResponse> {
        let request = ModbusRequest::new_write(
            ModbusFunction::WriteSingleRegister,
            address,
            1,
            value.to_be_bytes().to_vec(),
        ).with_encode_skip(skip_encode);
        self.execute_request(request).await
    }

    /// Write holding registers (function code 0x10), chunking writes larger
    /// than the self-imposed 62-value cap
    ///
    /// Returns the response of the last sub-write; an empty `values` still
    /// performs exactly one exchange. `skip_encode` marks the payload as
    /// pre-encoded device words: they are transmitted verbatim and logged as
    /// raw hex instead of decoded values.
    pub async fn write_registers(
        &self,
        address: u16,
        values: &[u16],
        skip_encode: bool,
    ) -> ModbusResult<ModbusResponse> {
        let timer = OperationTimer::start("write_registers");
        let mut last_response = None;

        for (chunk_address, range) in write_chunks(address, values.len()) {
            let chunk = &values[range];
            let request = ModbusRequest::new_write(
                ModbusFunction::WriteMultipleRegisters,
                chunk_address,
                chunk.len() as u16,
                data_utils::registers_to_bytes(chunk),
            ).with_encode_skip(skip_encode);
            last_response = Some(self.execute_request(request).await?);
        }

        timer.stop();
        // The plan always contains at least one sub-write
        Ok(last_response.expect("chunk plan is never empty"))
    }

    /// Whether the transport currently believes it is connected
    pub async fn is_connected(&self) -> bool {
        self.session.is_connected().await
    }

    /// Transport statistics, if the connection was ever established
    pub async fn stats(&self) -> Option<TransportStats> {
        self.session.stats().await
    }

    /// Close the client connection
    ///
    /// Idempotent; safe to call when the connection never came up.
    pub async fn close(&self) -> ModbusResult<()> {
        self.session.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_chunks_within_frame() {
        assert_eq!(read_chunks(100, 1), vec![(100, 1)]);
        assert_eq!(read_chunks(100, 124), vec![(100, 124)]);
    }

    #[test]
    fn test_read_chunks_zero_count_still_one_exchange() {
        assert_eq!(read_chunks(100, 0), vec![(100, 0)]);
    }

    #[test]
    fn test_read_chunks_splits_at_124() {
        assert_eq!(read_chunks(0, 125), vec![(0, 124), (124, 1)]);
        // 200 registers at 360: exactly two sub-reads, 124 then 76
        assert_eq!(read_chunks(360, 200), vec![(360, 124), (484, 76)]);
        assert_eq!(read_chunks(0, 300), vec![(0, 124), (124, 124), (248, 52)]);
    }

    #[test]
    fn test_read_chunks_reassemble_exactly() {
        for count in 0..=300u16 {
            let chunks = read_chunks(1000, count);
            let total: u32 = chunks.iter().map(|&(_, c)| c as u32).sum();
            assert_eq!(total, count as u32);
            // Sub-reads are contiguous in address order
            let mut expected_address = 1000u16;
            for &(address, chunk_count) in &chunks {
                assert_eq!(address, expected_address);
                assert!(chunk_count <= READ_CHUNK_REGISTERS);
                expected_address = expected_address.wrapping_add(chunk_count);
            }
        }
    }

    #[test]
    fn test_write_chunks_within_cap() {
        assert_eq!(write_chunks(360, 0), vec![(360, 0..0)]);
        assert_eq!(write_chunks(360, 1), vec![(360, 0..1)]);
        assert_eq!(write_chunks(360, 62), vec![(360, 0..62)]);
    }

    #[test]
    fn test_write_chunks_stride_is_124() {
        // 62 values consumed per chunk, but the address advances by 124:
        // two registers per process value on this device family
        assert_eq!(write_chunks(360, 63), vec![(360, 0..62), (484, 62..63)]);
        assert_eq!(write_chunks(360, 124), vec![(360, 0..62), (484, 62..124)]);
        assert_eq!(
            write_chunks(360, 140),
            vec![(360, 0..62), (484, 62..124), (608, 124..140)]
        );
        assert_eq!(
            write_chunks(0, 200),
            vec![(0, 0..62), (124, 62..124), (248, 124..186), (372, 186..200)]
        );
    }

    #[test]
    fn test_write_chunks_cover_all_values_once() {
        for len in [0usize, 1, 61, 62, 63, 124, 125, 140, 200] {
            let chunks = write_chunks(2160, len);
            let mut next = 0;
            for (_, range) in &chunks {
                assert_eq!(range.start, next);
                assert!(range.len() <= WRITE_CHUNK_REGISTERS);
                next = range.end;
            }
            assert_eq!(next, len);
        }
    }
}
