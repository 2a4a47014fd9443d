//! Loopback demonstration: a polled RTU server and a transaction client
//! sharing an in-memory bus.
//!
//! Run with `RUST_LOG=debug` to watch the raw frames cross the link.

use std::time::Duration;

use voltage_rtu::{
    console_logger, LoopbackPort, ModbusClient, ModbusRtuClient, ModbusRtuServer,
    OperationTimer, PerformanceMetrics, RtuLink,
};

const SERVER_ADDRESS: u8 = 0x11;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("{}", voltage_rtu::info());
    println!("==========================================");

    let (server_port, client_port) = LoopbackPort::pair();

    // Server node: device 0x11 with a small process image.
    let mut server = ModbusRtuServer::new(RtuLink::new(server_port, SERVER_ADDRESS));
    server.set_poll_timeout(Duration::from_millis(10));

    let bank = server.register_bank();
    bank.configure_coils(0x0000, 8)?;
    bank.configure_discrete_inputs(0x0000, 8)?;
    bank.configure_holding_registers(0x006B, 4)?;
    bank.configure_input_registers(0x0008, 2)?;

    // Simulated field inputs.
    bank.write_discrete_input(0x0002, true)?;
    bank.write_input_register(0x0008, 0x000A)?;
    bank.write_input_register(0x0009, 0x0102)?;

    tokio::spawn(async move {
        loop {
            let _ = server.poll().await;
        }
    });

    // Client node addressing device 0x11, with interpreted packet logging.
    let mut link = RtuLink::new(client_port, 0x01);
    link.set_remote_address(SERVER_ADDRESS);
    let mut client = ModbusRtuClient::with_logger(link, console_logger!());
    client.set_receive_timeout(Duration::from_millis(100));

    let mut metrics = PerformanceMetrics::new();

    // Write then read back every data kind the server exposes.
    let timer = OperationTimer::start("write holding registers");
    client
        .write_multiple_registers(0x006B, &[0xAE41, 0x5652, 0x4340])
        .await?;
    metrics.record_success(timer.stop());

    let timer = OperationTimer::start("read holding registers");
    let registers = client.read_holding_registers(0x006B, 4).await?;
    metrics.record_success(timer.stop());
    println!("holding registers: {:04X?}", registers);

    let timer = OperationTimer::start("write coils");
    client
        .write_multiple_coils(0x0000, &[true, false, true, true, false, false, false, true])
        .await?;
    metrics.record_success(timer.stop());

    let timer = OperationTimer::start("read coils");
    let coils = client.read_coils(0x0000, 8).await?;
    metrics.record_success(timer.stop());
    println!("coils: {:?}", coils);

    let inputs = client.read_discrete_inputs(0x0000, 8).await?;
    println!("discrete inputs: {:?}", inputs);

    let input_registers = client.read_input_registers(0x0008, 2).await?;
    println!("input registers: {:04X?}", input_registers);

    // An absent address: the server answers with an exception.
    match client.read_holding_registers(0x0100, 1).await {
        Err(err) => println!("expected exception: {}", err),
        Ok(_) => println!("unexpected success"),
    }

    println!("==========================================");
    println!(
        "{} transactions, {:.1}% ok, avg {:?}",
        metrics.total_requests,
        metrics.success_rate(),
        metrics.avg_duration
    );
    let stats = client.stats();
    println!(
        "link: {} frames out / {} frames in, {} bytes out / {} bytes in",
        stats.frames_sent, stats.frames_received, stats.bytes_sent, stats.bytes_received
    );

    Ok(())
}
