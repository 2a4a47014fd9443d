/// Modbus RTU server implementation
///
/// The server is a one-shot transaction handler driven by [`ModbusRtuServer::poll`]:
/// each call opens one receive window, validates whatever arrived, dispatches
/// on the function code and sends at most one response. Data lives in a
/// shared [`ModbusRegisterBank`] so the application can read and write values
/// between polls.
///
/// Validation order inside `poll()`:
/// 1. receive; timeouts and corrupt frames are silently dropped,
/// 2. frames addressed to another device are silently dropped,
/// 3. frames that already carry the exception bit are silently dropped
///    (a server must never receive an exception),
/// 4. dispatch by function code; invalid requests produce exception
///    responses, unknown function codes produce exception 0x01.

use std::time::Duration;

use log::{debug, warn};

use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{
    AduKind, ModbusAdu, ModbusException, ModbusFunction, ADU_DATA_INDEX,
};
use crate::register_bank::{ModbusRegisterBank, RegisterBankStats};
use crate::transport::{RtuLink, SerialPort, TransportStats};

/// Server statistics
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Valid requests addressed to this server
    pub total_requests: u64,
    /// Requests answered with a normal response
    pub successful_requests: u64,
    /// Requests answered with an exception response
    pub exception_responses: u64,
    /// Frames dropped without a response (corrupt, misaddressed, exception-bit)
    pub dropped_frames: u64,
    /// Snapshot of the register bank sizes
    pub register_bank_stats: Option<RegisterBankStats>,
}

/// Modbus RTU server node
///
/// Owns the [`RtuLink`] it answers on plus one request and one response
/// frame that are reused across polls.
pub struct ModbusRtuServer<P: SerialPort> {
    link: RtuLink<P>,
    register_bank: ModbusRegisterBank,
    request: ModbusAdu,
    response: ModbusAdu,
    poll_timeout: Duration,
    stats: ServerStats,
}

impl<P: SerialPort> ModbusRtuServer<P> {
    /// Create a server with a fresh register bank
    pub fn new(link: RtuLink<P>) -> Self {
        Self::with_register_bank(link, ModbusRegisterBank::new())
    }

    /// Create a server sharing an existing register bank
    ///
    /// The application keeps its own clone of the bank to feed input data
    /// and observe writes.
    pub fn with_register_bank(link: RtuLink<P>, register_bank: ModbusRegisterBank) -> Self {
        let mut request = ModbusAdu::new();
        request.set_kind(AduKind::Request);
        let mut response = ModbusAdu::new();
        response.set_kind(AduKind::Response);

        Self {
            link,
            register_bank,
            request,
            response,
            poll_timeout: Duration::from_millis(crate::DEFAULT_POLL_TIMEOUT_MS),
            stats: ServerStats::default(),
        }
    }

    /// A shared handle to the server's register bank
    pub fn register_bank(&self) -> ModbusRegisterBank {
        self.register_bank.clone()
    }

    /// This server's device address on the bus
    pub fn local_address(&self) -> u8 {
        self.link.local_address()
    }

    /// Change the receive window used by each poll
    pub fn set_poll_timeout(&mut self, timeout: Duration) {
        self.poll_timeout = timeout;
    }

    /// Server statistics so far
    pub fn stats(&self) -> ServerStats {
        let mut stats = self.stats.clone();
        stats.register_bank_stats = Some(self.register_bank.stats());
        stats
    }

    /// Link layer statistics so far
    pub fn transport_stats(&self) -> TransportStats {
        self.link.stats()
    }

    /// Handle at most one request
    ///
    /// Returns `Ok(Some(fc))` when a response was sent (`fc` carries the
    /// exception bit when that response was an exception) and `Ok(None)`
    /// when nothing was answered (idle window, corrupt frame, wrong
    /// address, or an exception frame wrongly sent to a server). Transport
    /// failures while sending surface as errors.
    pub async fn poll(&mut self) -> ModbusResult<Option<u8>> {
        match self.link.receive(&mut self.request, self.poll_timeout).await {
            Ok(_) => {}
            Err(ModbusError::Timeout { .. }) => return Ok(None),
            Err(err) => {
                debug!("poll(): dropping unreadable frame: {}", err);
                self.stats.dropped_frames += 1;
                return Ok(None);
            }
        }

        if self.request.device_address() != self.link.local_address() {
            debug!(
                "poll(): request for device {:#04X}, not us ({:#04X})",
                self.request.device_address(),
                self.link.local_address()
            );
            self.stats.dropped_frames += 1;
            return Ok(None);
        }

        if self.request.function_code() & 0x80 != 0 {
            warn!("poll(): dropping exception frame sent to server");
            self.stats.dropped_frames += 1;
            return Ok(None);
        }

        self.stats.total_requests += 1;
        let function_code = self.request.function_code();

        let answered = match ModbusFunction::from_u8(function_code) {
            Ok(ModbusFunction::ReadCoils) => self.handle_read_coils().await?,
            Ok(ModbusFunction::ReadDiscreteInputs) => self.handle_read_discrete_inputs().await?,
            Ok(ModbusFunction::ReadHoldingRegisters) => {
                self.handle_read_holding_registers().await?
            }
            Ok(ModbusFunction::ReadInputRegisters) => self.handle_read_input_registers().await?,
            Ok(ModbusFunction::WriteSingleCoil) => self.handle_write_single_coil().await?,
            Ok(ModbusFunction::WriteSingleRegister) => self.handle_write_single_register().await?,
            Ok(ModbusFunction::WriteMultipleCoils) => self.handle_write_multiple_coils().await?,
            Ok(ModbusFunction::WriteMultipleRegisters) => {
                self.handle_write_multiple_registers().await?
            }
            Err(_) => {
                warn!("poll(): unsupported function code {:#04X}", function_code);
                self.send_exception(function_code, ModbusException::IllegalFunction)
                    .await?
            }
        };

        if answered & 0x80 != 0 {
            self.stats.exception_responses += 1;
        } else {
            self.stats.successful_requests += 1;
        }
        Ok(Some(answered))
    }

    /// Build and send an exception response from scratch
    ///
    /// Returns the function code with the exception bit set.
    async fn send_exception(
        &mut self,
        function_code: u8,
        exception: ModbusException,
    ) -> ModbusResult<u8> {
        debug!(
            "poll(): answering {:#04X} with exception {}",
            function_code, exception
        );
        self.response.reset_length();
        self.response.set_kind(AduKind::Exception);
        self.response.set_device_address(self.link.local_address());
        self.response.set_function_code(function_code)?;
        self.response.set_exception()?;
        self.response.set_exception_code(exception.to_u8())?;
        self.response.set_crc()?;
        self.link.send(&self.response).await?;
        Ok(function_code | 0x80)
    }

    /// Start a normal response frame: address + function code
    fn start_response(&mut self, function: ModbusFunction) -> ModbusResult<()> {
        self.response.reset_length();
        self.response.set_kind(AduKind::Response);
        self.response.set_device_address(self.link.local_address());
        self.response.set_function_code(function.to_u8())
    }

    /// Read a run of bits out of a table, packed LSB-first (0x01 / 0x02)
    ///
    /// Bit N of the request maps to bit `N % 8` of response byte `N / 8`.
    async fn handle_read_bits(
        &mut self,
        function: ModbusFunction,
        discrete_inputs: bool,
    ) -> ModbusResult<u8> {
        let start = self.request.starting_address();
        let quantity = self.request.quantity();

        let valid = quantity <= crate::MAX_READ_COILS
            && if discrete_inputs {
                self.register_bank.is_discrete_input_range_present(start, quantity)
            } else {
                self.register_bank.is_coil_range_present(start, quantity)
            };
        if !valid {
            return self
                .send_exception(function.to_u8(), ModbusException::IllegalDataValue)
                .await;
        }

        debug!(
            "poll(): {} {:#06X}..{:#06X}",
            function,
            start,
            start.wrapping_add(quantity.saturating_sub(1))
        );

        self.start_response(function)?;

        let byte_count = ((quantity + 7) / 8) as usize;
        self.response.push(byte_count as u8)?;

        let mut packed = vec![0u8; byte_count];
        for i in 0..quantity {
            let address = start.wrapping_add(i);
            let value = if discrete_inputs {
                self.register_bank.read_discrete_input(address)?
            } else {
                self.register_bank.read_coil(address)?
            };
            if value {
                packed[(i / 8) as usize] |= 1 << (i % 8);
            }
        }
        self.response.push_bytes(&packed)?;
        self.response.set_crc()?;
        self.link.send(&self.response).await?;
        Ok(function.to_u8())
    }

    async fn handle_read_coils(&mut self) -> ModbusResult<u8> {
        self.handle_read_bits(ModbusFunction::ReadCoils, false).await
    }

    async fn handle_read_discrete_inputs(&mut self) -> ModbusResult<u8> {
        self.handle_read_bits(ModbusFunction::ReadDiscreteInputs, true).await
    }

    /// Read a run of registers out of a table, big-endian (0x03 / 0x04)
    async fn handle_read_registers(
        &mut self,
        function: ModbusFunction,
        input_registers: bool,
    ) -> ModbusResult<u8> {
        let start = self.request.starting_address();
        let quantity = self.request.quantity();

        let valid = quantity <= crate::MAX_READ_REGISTERS
            && if input_registers {
                self.register_bank.is_input_register_range_present(start, quantity)
            } else {
                self.register_bank.is_holding_register_range_present(start, quantity)
            };
        if !valid {
            return self
                .send_exception(function.to_u8(), ModbusException::IllegalDataValue)
                .await;
        }

        debug!(
            "poll(): {} {:#06X}..{:#06X}",
            function,
            start,
            start.wrapping_add(quantity.saturating_sub(1))
        );

        self.start_response(function)?;
        self.response.push((quantity * 2) as u8)?;

        for i in 0..quantity {
            let address = start.wrapping_add(i);
            let value = if input_registers {
                self.register_bank.read_input_register(address)?
            } else {
                self.register_bank.read_holding_register(address)?
            };
            self.response.push_word(value)?;
        }
        self.response.set_crc()?;
        self.link.send(&self.response).await?;
        Ok(function.to_u8())
    }

    async fn handle_read_holding_registers(&mut self) -> ModbusResult<u8> {
        self.handle_read_registers(ModbusFunction::ReadHoldingRegisters, false)
            .await
    }

    async fn handle_read_input_registers(&mut self) -> ModbusResult<u8> {
        self.handle_read_registers(ModbusFunction::ReadInputRegisters, true)
            .await
    }

    /// Write Single Coil (0x05): response mirrors the request byte-for-byte
    async fn handle_write_single_coil(&mut self) -> ModbusResult<u8> {
        let function = ModbusFunction::WriteSingleCoil;
        let address = self.request.starting_address();

        if !self.register_bank.is_coil_present(address) {
            return self
                .send_exception(function.to_u8(), ModbusException::IllegalDataAddress)
                .await;
        }

        // 0x0000 means OFF; the strict encoding for ON is 0xFF00 but any
        // nonzero word is accepted.
        let value = self.request.word_at(ADU_DATA_INDEX + 2) != 0;
        debug!("poll(): {} {:#06X} <- {}", function, address, value);
        self.register_bank.write_coil(address, value)?;

        self.response = self.request.clone();
        self.response.set_kind(AduKind::Response);
        self.link.send(&self.response).await?;
        Ok(function.to_u8())
    }

    /// Write Single Register (0x06): response mirrors the request byte-for-byte
    async fn handle_write_single_register(&mut self) -> ModbusResult<u8> {
        let function = ModbusFunction::WriteSingleRegister;
        let address = self.request.starting_address();

        if !self.register_bank.is_holding_register_present(address) {
            return self
                .send_exception(function.to_u8(), ModbusException::IllegalDataAddress)
                .await;
        }

        let value = self.request.word_at(ADU_DATA_INDEX + 2);
        debug!("poll(): {} {:#06X} <- {:#06X}", function, address, value);
        self.register_bank.write_holding_register(address, value)?;

        self.response = self.request.clone();
        self.response.set_kind(AduKind::Response);
        self.link.send(&self.response).await?;
        Ok(function.to_u8())
    }

    /// Write Multiple Coils (0x0F): response echoes address + quantity
    async fn handle_write_multiple_coils(&mut self) -> ModbusResult<u8> {
        let function = ModbusFunction::WriteMultipleCoils;
        let start = self.request.starting_address();
        let quantity = self.request.quantity();

        if quantity > crate::MAX_WRITE_COILS
            || !self.register_bank.is_coil_range_present(start, quantity)
        {
            return self
                .send_exception(function.to_u8(), ModbusException::IllegalDataAddress)
                .await;
        }

        debug!(
            "poll(): {} {:#06X}..{:#06X}",
            function,
            start,
            start.wrapping_add(quantity.saturating_sub(1))
        );

        // Coil states arrive packed LSB-first after the byte count. Every
        // requested coil gets written; bits the declared byte count does
        // not cover default to OFF.
        let byte_count = self.request.byte_at(ADU_DATA_INDEX + 4) as u16;
        let mut states = vec![false; quantity as usize];
        for i in 0..quantity.min(byte_count.saturating_mul(8)) {
            let byte = self.request.byte_at(ADU_DATA_INDEX + 5 + (i / 8) as usize);
            states[i as usize] = (byte >> (i % 8)) & 0x01 != 0;
        }
        for (i, &value) in states.iter().enumerate() {
            self.register_bank
                .write_coil(start.wrapping_add(i as u16), value)?;
        }

        self.start_response(function)?;
        self.response.push_word(start)?;
        self.response.push_word(quantity)?;
        self.response.set_crc()?;
        self.link.send(&self.response).await?;
        Ok(function.to_u8())
    }

    /// Write Multiple Registers (0x10): response echoes address + quantity
    async fn handle_write_multiple_registers(&mut self) -> ModbusResult<u8> {
        let function = ModbusFunction::WriteMultipleRegisters;
        let start = self.request.starting_address();
        let quantity = self.request.quantity();

        if quantity > crate::MAX_WRITE_REGISTERS
            || !self
                .register_bank
                .is_holding_register_range_present(start, quantity)
        {
            return self
                .send_exception(function.to_u8(), ModbusException::IllegalDataAddress)
                .await;
        }

        debug!(
            "poll(): {} {:#06X}..{:#06X}",
            function,
            start,
            start.wrapping_add(quantity.saturating_sub(1))
        );

        // Every requested register gets written; words the declared byte
        // count does not cover default to 0.
        let byte_count = self.request.byte_at(ADU_DATA_INDEX + 4) as u16;
        let mut values = vec![0u16; quantity as usize];
        for i in 0..quantity.min(byte_count / 2) {
            values[i as usize] = self.request.word_at(ADU_DATA_INDEX + 5 + (i as usize) * 2);
        }
        for (i, &value) in values.iter().enumerate() {
            self.register_bank
                .write_holding_register(start.wrapping_add(i as u16), value)?;
        }

        self.start_response(function)?;
        self.response.push_word(start)?;
        self.response.push_word(quantity)?;
        self.response.set_crc()?;
        self.link.send(&self.response).await?;
        Ok(function.to_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackPort;

    const SERVER_ADDRESS: u8 = 0x11;

    /// A server on one end of a loopback pair; the other end plays client.
    fn test_server() -> (ModbusRtuServer<LoopbackPort>, LoopbackPort) {
        let (server_port, client_port) = LoopbackPort::pair();
        let mut server = ModbusRtuServer::new(RtuLink::new(server_port, SERVER_ADDRESS));
        server.set_poll_timeout(Duration::from_millis(10));
        (server, client_port)
    }

    fn inject_frame(port: &mut LoopbackPort, header: &[u8]) {
        let mut adu = ModbusAdu::new();
        adu.set_device_address(header[0]);
        // Raw push keeps exception-bit codes expressible in tests.
        adu.push(header[1]).unwrap();
        adu.push_bytes(&header[2..]).unwrap();
        adu.set_crc().unwrap();
        for &byte in adu.as_bytes() {
            port.write_byte(byte).unwrap();
        }
    }

    fn drain_frame(port: &mut LoopbackPort) -> Vec<u8> {
        let mut bytes = Vec::new();
        while let Some(byte) = port.read_byte() {
            bytes.push(byte);
        }
        bytes
    }

    #[tokio::test]
    async fn test_read_holding_registers_frame_image() {
        let (mut server, mut client_port) = test_server();
        server
            .register_bank()
            .configure_holding_registers(0x006B, 2)
            .unwrap();

        inject_frame(&mut client_port, &[0x11, 0x03, 0x00, 0x6B, 0x00, 0x02]);
        let answered = server.poll().await.unwrap();
        assert_eq!(answered, Some(0x03));

        // addr, fc, byte count, two zero registers, CRC (lo, hi)
        let response = drain_frame(&mut client_port);
        assert_eq!(
            response,
            vec![0x11, 0x03, 0x04, 0x00, 0x00, 0x00, 0x00, 0xEB, 0xF2]
        );
    }

    #[tokio::test]
    async fn test_read_absent_register_is_illegal_data_value() {
        let (mut server, mut client_port) = test_server();

        inject_frame(&mut client_port, &[0x11, 0x03, 0x00, 0x70, 0x00, 0x02]);
        let answered = server.poll().await.unwrap();
        assert_eq!(answered, Some(0x83));

        let response = drain_frame(&mut client_port);
        assert_eq!(response[..3], [0x11, 0x83, 0x03]);
        assert_eq!(server.stats().exception_responses, 1);
    }

    #[tokio::test]
    async fn test_write_single_coil_mirrors_request() {
        let (mut server, mut client_port) = test_server();
        server.register_bank().configure_coils(0x00AC, 1).unwrap();

        inject_frame(&mut client_port, &[0x11, 0x05, 0x00, 0xAC, 0xFF, 0x00]);
        let answered = server.poll().await.unwrap();
        assert_eq!(answered, Some(0x05));

        let response = drain_frame(&mut client_port);
        assert_eq!(response, vec![0x11, 0x05, 0x00, 0xAC, 0xFF, 0x00, 0x4E, 0x8B]);
        assert!(server.register_bank().read_coil(0x00AC).unwrap());
    }

    #[tokio::test]
    async fn test_write_single_coil_accepts_any_nonzero() {
        let (mut server, mut client_port) = test_server();
        server.register_bank().configure_coils(0x0001, 1).unwrap();

        inject_frame(&mut client_port, &[0x11, 0x05, 0x00, 0x01, 0x12, 0x34]);
        server.poll().await.unwrap();
        assert!(server.register_bank().read_coil(0x0001).unwrap());

        drain_frame(&mut client_port);
        inject_frame(&mut client_port, &[0x11, 0x05, 0x00, 0x01, 0x00, 0x00]);
        server.poll().await.unwrap();
        assert!(!server.register_bank().read_coil(0x0001).unwrap());
    }

    #[tokio::test]
    async fn test_short_write_payload_zero_fills() {
        let (mut server, mut client_port) = test_server();
        let bank = server.register_bank();
        bank.configure_holding_registers(0x0000, 2).unwrap();
        bank.write_holding_register(0x0001, 0x7777).unwrap();

        // Quantity 2 but only one register's worth of payload: the
        // uncovered address is still written, as 0.
        inject_frame(
            &mut client_port,
            &[0x11, 0x10, 0x00, 0x00, 0x00, 0x02, 0x02, 0x12, 0x34],
        );
        let answered = server.poll().await.unwrap();
        assert_eq!(answered, Some(0x10));

        assert_eq!(bank.read_holding_register(0x0000).unwrap(), 0x1234);
        assert_eq!(bank.read_holding_register(0x0001).unwrap(), 0x0000);
    }

    #[tokio::test]
    async fn test_address_mismatch_is_silent() {
        let (mut server, mut client_port) = test_server();

        inject_frame(&mut client_port, &[0x12, 0x03, 0x00, 0x00, 0x00, 0x01]);
        let answered = server.poll().await.unwrap();
        assert_eq!(answered, None);
        assert!(drain_frame(&mut client_port).is_empty());
        assert_eq!(server.stats().dropped_frames, 1);
    }

    #[tokio::test]
    async fn test_exception_request_is_dropped() {
        let (mut server, mut client_port) = test_server();

        inject_frame(&mut client_port, &[0x11, 0x83, 0x02]);
        let answered = server.poll().await.unwrap();
        assert_eq!(answered, None);
        assert!(drain_frame(&mut client_port).is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_function_code() {
        let (mut server, mut client_port) = test_server();

        inject_frame(&mut client_port, &[0x11, 0x08, 0x00, 0x00, 0x00, 0x00]);
        let answered = server.poll().await.unwrap();
        assert_eq!(answered, Some(0x88));

        let response = drain_frame(&mut client_port);
        assert_eq!(response[..3], [0x11, 0x88, 0x01]);
    }

    #[tokio::test]
    async fn test_oversized_read_quantity() {
        let (mut server, mut client_port) = test_server();

        // 0x07D1 coils is one past the RTU limit.
        inject_frame(&mut client_port, &[0x11, 0x01, 0x00, 0x00, 0x07, 0xD1]);
        let answered = server.poll().await.unwrap();
        assert_eq!(answered, Some(0x81));

        let response = drain_frame(&mut client_port);
        assert_eq!(response[..3], [0x11, 0x81, 0x03]);
    }
}
