/// Modbus RTU client implementation
///
/// Every transaction follows the same skeleton: build the request frame,
/// seal it with a CRC, send it, receive within the configured timeout and
/// validate what came back. The response is either a normal response (same
/// function code), an exception (function code + 0x80, surfaced as
/// [`ModbusError::Exception`]) or garbage (surfaced as a frame error).
///
/// The client never retries; callers own the retry policy.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ModbusError, ModbusResult};
use crate::logging::CallbackLogger;
use crate::protocol::{AduKind, ModbusAdu, ModbusFunction, ADU_DATA_INDEX};
use crate::transport::{RtuLink, SerialPort, TransportStats};

/// Trait defining the interface for Modbus client operations
///
/// One async method per supported function code. All methods return the
/// decoded payload on success, surface device exceptions as
/// [`ModbusError::Exception`] and transport problems as the corresponding
/// transport error.
#[async_trait]
pub trait ModbusClient: Send {
    /// Read coils (function code 0x01)
    async fn read_coils(&mut self, address: u16, quantity: u16) -> ModbusResult<Vec<bool>>;

    /// Read discrete inputs (function code 0x02)
    async fn read_discrete_inputs(&mut self, address: u16, quantity: u16)
        -> ModbusResult<Vec<bool>>;

    /// Read holding registers (function code 0x03)
    async fn read_holding_registers(&mut self, address: u16, quantity: u16)
        -> ModbusResult<Vec<u16>>;

    /// Read input registers (function code 0x04)
    async fn read_input_registers(&mut self, address: u16, quantity: u16)
        -> ModbusResult<Vec<u16>>;

    /// Write single coil (function code 0x05)
    async fn write_single_coil(&mut self, address: u16, value: bool) -> ModbusResult<()>;

    /// Write single register (function code 0x06)
    async fn write_single_register(&mut self, address: u16, value: u16) -> ModbusResult<()>;

    /// Write multiple coils (function code 0x0F)
    async fn write_multiple_coils(&mut self, address: u16, values: &[bool]) -> ModbusResult<()>;

    /// Write multiple registers (function code 0x10)
    async fn write_multiple_registers(&mut self, address: u16, values: &[u16])
        -> ModbusResult<()>;
}

/// Modbus RTU client node
///
/// Owns the [`RtuLink`] it talks over plus one request and one response
/// frame that are reused across transactions.
pub struct ModbusRtuClient<P: SerialPort> {
    link: RtuLink<P>,
    request: ModbusAdu,
    response: ModbusAdu,
    receive_timeout: Duration,
    logger: Option<CallbackLogger>,
}

impl<P: SerialPort> ModbusRtuClient<P> {
    /// Create a new client over the given link
    ///
    /// The link's remote address selects which server is spoken to; see
    /// [`Self::set_server_address`].
    pub fn new(link: RtuLink<P>) -> Self {
        let mut request = ModbusAdu::new();
        request.set_kind(AduKind::Request);
        let mut response = ModbusAdu::new();
        response.set_kind(AduKind::Response);

        Self {
            link,
            request,
            response,
            receive_timeout: Duration::from_millis(crate::DEFAULT_RECEIVE_TIMEOUT_MS),
            logger: None,
        }
    }

    /// Create a new client with per-transaction packet logging
    pub fn with_logger(link: RtuLink<P>, logger: CallbackLogger) -> Self {
        let mut client = Self::new(link);
        client.logger = Some(logger);
        client
    }

    /// Select the server this client addresses
    pub fn set_server_address(&mut self, address: u8) {
        self.link.set_remote_address(address);
    }

    /// The server address currently in use
    pub fn server_address(&self) -> u8 {
        self.link.remote_address()
    }

    /// Change the response timeout (default 1000 ms)
    ///
    /// This bounds the whole receive window, not the wait for the first
    /// byte.
    pub fn set_receive_timeout(&mut self, timeout: Duration) {
        self.receive_timeout = timeout;
    }

    /// Link layer statistics so far
    pub fn stats(&self) -> TransportStats {
        self.link.stats()
    }

    /// Start a request frame: server address + function code
    fn start_request(&mut self, function: ModbusFunction) -> ModbusResult<()> {
        self.request.reset_length();
        self.request.set_kind(AduKind::Request);
        self.request.set_device_address(self.link.remote_address());
        self.request.set_function_code(function.to_u8())
    }

    /// Seal, send and await the answer to the request frame
    ///
    /// On return the response frame holds a validated normal response to
    /// the request's function code. Exception responses and responses from
    /// the wrong device become errors.
    async fn transact(&mut self) -> ModbusResult<()> {
        self.request.set_crc()?;

        if let Some(logger) = &self.logger {
            logger.log_request(&self.request);
        }

        self.link.send(&self.request).await?;
        self.link
            .receive(&mut self.response, self.receive_timeout)
            .await?;

        if self.response.device_address() != self.link.remote_address() {
            return Err(ModbusError::address_mismatch(
                self.link.remote_address(),
                self.response.device_address(),
            ));
        }

        let request_fc = self.request.function_code();
        let response_fc = self.response.function_code();

        if response_fc == request_fc {
            self.response.set_kind(AduKind::Response);
            if let Some(logger) = &self.logger {
                logger.log_response(&self.response);
            }
            return Ok(());
        }

        if response_fc > 0x80 {
            self.response.set_kind(AduKind::Exception);
            if let Some(logger) = &self.logger {
                logger.log_response(&self.response);
            }
            return Err(ModbusError::exception(
                request_fc,
                self.response.exception_code(),
            ));
        }

        Err(ModbusError::frame(format!(
            "unexpected function code {:#04X} in response to {:#04X}",
            response_fc, request_fc
        )))
    }

    /// Unpack an LSB-first bit payload from the response
    ///
    /// Bit `i` of the result is bit `i % 8` of data byte `1 + i/8`; the
    /// byte count at data byte 0 bounds how many bits are really there, and
    /// trailing pad bits are ignored.
    fn unpack_bits(&self, quantity: u16) -> Vec<bool> {
        let byte_count = self.response.byte_at(ADU_DATA_INDEX) as usize;
        let available = (byte_count * 8).min(quantity as usize);
        let mut values = Vec::with_capacity(available);
        for i in 0..available {
            let byte = self.response.byte_at(ADU_DATA_INDEX + 1 + i / 8);
            values.push((byte >> (i % 8)) & 0x01 != 0);
        }
        values
    }

    /// Unpack a big-endian register payload from the response
    ///
    /// Byte count at data byte 0, register words from data byte 1 onwards.
    fn unpack_registers(&self, quantity: u16) -> Vec<u16> {
        let byte_count = self.response.byte_at(ADU_DATA_INDEX) as usize;
        let available = (byte_count / 2).min(quantity as usize);
        let mut values = Vec::with_capacity(available);
        for i in 0..available {
            values.push(self.response.word_at(ADU_DATA_INDEX + 1 + i * 2));
        }
        values
    }

    async fn read_bits(
        &mut self,
        function: ModbusFunction,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        self.start_request(function)?;
        self.request.push_word(address)?;
        self.request.push_word(quantity)?;
        self.transact().await?;
        Ok(self.unpack_bits(quantity))
    }

    async fn read_registers(
        &mut self,
        function: ModbusFunction,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.start_request(function)?;
        self.request.push_word(address)?;
        self.request.push_word(quantity)?;
        self.transact().await?;
        Ok(self.unpack_registers(quantity))
    }

    /// Check the echoed (address, quantity) of a multi-write confirmation
    fn confirm_echo(&self, address: u16, quantity: u16) -> ModbusResult<()> {
        if self.response.starting_address() != address || self.response.quantity() != quantity {
            return Err(ModbusError::frame(format!(
                "write confirmation mismatch: got ({:#06X}, {}), expected ({:#06X}, {})",
                self.response.starting_address(),
                self.response.quantity(),
                address,
                quantity
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<P: SerialPort> ModbusClient for ModbusRtuClient<P> {
    async fn read_coils(&mut self, address: u16, quantity: u16) -> ModbusResult<Vec<bool>> {
        self.read_bits(ModbusFunction::ReadCoils, address, quantity).await
    }

    async fn read_discrete_inputs(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        self.read_bits(ModbusFunction::ReadDiscreteInputs, address, quantity)
            .await
    }

    async fn read_holding_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.read_registers(ModbusFunction::ReadHoldingRegisters, address, quantity)
            .await
    }

    async fn read_input_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.read_registers(ModbusFunction::ReadInputRegisters, address, quantity)
            .await
    }

    async fn write_single_coil(&mut self, address: u16, value: bool) -> ModbusResult<()> {
        self.start_request(ModbusFunction::WriteSingleCoil)?;
        self.request.push_word(address)?;
        // ON is encoded strictly on the request side.
        self.request
            .push_word(if value { 0xFF00 } else { 0x0000 })?;
        self.transact().await?;
        Ok(())
    }

    async fn write_single_register(&mut self, address: u16, value: u16) -> ModbusResult<()> {
        self.start_request(ModbusFunction::WriteSingleRegister)?;
        self.request.push_word(address)?;
        self.request.push_word(value)?;
        self.transact().await?;
        Ok(())
    }

    async fn write_multiple_coils(&mut self, address: u16, values: &[bool]) -> ModbusResult<()> {
        self.start_request(ModbusFunction::WriteMultipleCoils)?;
        self.request.push_word(address)?;
        self.request.push_word(values.len() as u16)?;

        let byte_count = (values.len() + 7) / 8;
        self.request.push(byte_count as u8)?;

        for chunk in values.chunks(8) {
            let mut byte = 0u8;
            for (i, &coil) in chunk.iter().enumerate() {
                if coil {
                    byte |= 1 << i;
                }
            }
            self.request.push(byte)?;
        }

        self.transact().await?;
        self.confirm_echo(address, values.len() as u16)
    }

    async fn write_multiple_registers(
        &mut self,
        address: u16,
        values: &[u16],
    ) -> ModbusResult<()> {
        self.start_request(ModbusFunction::WriteMultipleRegisters)?;
        self.request.push_word(address)?;
        self.request.push_word(values.len() as u16)?;
        self.request.push((values.len() * 2) as u8)?;
        self.request.push_words(values)?;

        self.transact().await?;
        self.confirm_echo(address, values.len() as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackPort;

    const SERVER_ADDRESS: u8 = 0x11;

    fn test_client() -> (ModbusRtuClient<LoopbackPort>, LoopbackPort) {
        let (client_port, server_port) = LoopbackPort::pair();
        let mut link = RtuLink::new(client_port, 0x01);
        link.set_remote_address(SERVER_ADDRESS);
        let mut client = ModbusRtuClient::new(link);
        client.set_receive_timeout(Duration::from_millis(15));
        (client, server_port)
    }

    /// Queue a canned server answer before the transaction runs; the
    /// client's receive window picks it up after sending the request.
    fn queue_response(port: &mut LoopbackPort, header: &[u8]) {
        let mut adu = ModbusAdu::new();
        adu.set_device_address(header[0]);
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
    async fn test_read_coils_request_image() {
        let (mut client, mut server_port) = test_client();

        // No server answers, so the call times out; the request image is
        // still on the wire.
        let result = client.read_coils(0x0013, 0x0013).await;
        assert!(matches!(result, Err(ModbusError::Timeout { .. })));

        let request = drain_frame(&mut server_port);
        assert_eq!(
            request,
            vec![0x11, 0x01, 0x00, 0x13, 0x00, 0x13, 0x8E, 0x92]
        );
    }

    #[tokio::test]
    async fn test_read_holding_registers_decodes_standard_layout() {
        let (mut client, mut server_port) = test_client();
        queue_response(
            &mut server_port,
            &[0x11, 0x03, 0x06, 0xAE, 0x41, 0x56, 0x52, 0x43, 0x40],
        );

        let values = client.read_holding_registers(0x006B, 3).await.unwrap();
        assert_eq!(values, vec![0xAE41, 0x5652, 0x4340]);
    }

    #[tokio::test]
    async fn test_read_coils_ignores_pad_bits() {
        let (mut client, mut server_port) = test_client();
        // 19 coils: CD 6B 05 -> pattern 1100 1101 0110 1011 001 (LSB-first)
        queue_response(&mut server_port, &[0x11, 0x01, 0x03, 0xCD, 0x6B, 0x05]);

        let values = client.read_coils(0x0013, 19).await.unwrap();
        assert_eq!(values.len(), 19);
        let expected = [
            true, false, true, true, false, false, true, true, // 0xCD
            true, true, false, true, false, true, true, false, // 0x6B
            true, false, true, // 0x05, pads dropped
        ];
        assert_eq!(values, expected);
    }

    #[tokio::test]
    async fn test_exception_response_surfaces_code() {
        let (mut client, mut server_port) = test_client();
        queue_response(&mut server_port, &[0x11, 0x83, 0x02]);

        let result = client.read_holding_registers(0x0070, 1).await;
        match result {
            Err(ModbusError::Exception { function, code, .. }) => {
                assert_eq!(function, 0x03);
                assert_eq!(code, 0x02);
            }
            other => panic!("expected exception, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_device_address_is_rejected() {
        let (mut client, mut server_port) = test_client();
        queue_response(&mut server_port, &[0x12, 0x03, 0x02, 0x00, 0x00]);

        let result = client.read_holding_registers(0x0000, 1).await;
        assert!(matches!(result, Err(ModbusError::AddressMismatch { .. })));
    }

    #[tokio::test]
    async fn test_multi_write_checks_echo() {
        let (mut client, mut server_port) = test_client();
        // Server echoes the wrong quantity back.
        queue_response(&mut server_port, &[0x11, 0x10, 0x00, 0x01, 0x00, 0x01]);

        let result = client
            .write_multiple_registers(0x0001, &[0x000A, 0x0102])
            .await;
        assert!(matches!(result, Err(ModbusError::Frame { .. })));
    }

    #[tokio::test]
    async fn test_write_single_coil_encoding() {
        let (mut client, mut server_port) = test_client();
        // Mirror response keeps the transaction green.
        queue_response(&mut server_port, &[0x11, 0x05, 0x00, 0xAC, 0xFF, 0x00]);

        client.write_single_coil(0x00AC, true).await.unwrap();
        let request = drain_frame(&mut server_port);
        assert_eq!(
            request,
            vec![0x11, 0x05, 0x00, 0xAC, 0xFF, 0x00, 0x4E, 0x8B]
        );
    }

    #[tokio::test]
    async fn test_oversized_read_goes_to_the_wire() {
        let (mut client, mut server_port) = test_client();
        queue_response(&mut server_port, &[0x11, 0x83, 0x03]);

        // Quantity bounds are checked by the server, not here: the request
        // is sent as built and the exception comes back over the wire.
        let result = client.read_holding_registers(0x0000, 200).await;
        match result {
            Err(ModbusError::Exception { function, code, .. }) => {
                assert_eq!(function, 0x03);
                assert_eq!(code, 0x03);
            }
            other => panic!("expected exception, got {:?}", other),
        }

        let request = drain_frame(&mut server_port);
        assert_eq!(request[..6], [0x11, 0x03, 0x00, 0x00, 0x00, 0xC8]);
    }
}
