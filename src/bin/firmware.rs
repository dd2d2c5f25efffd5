#![no_std]
#![no_main]

//! RP2040 firmware binary: owns the real half-duplex RS485 link to the
//! heat pump and drives [`estia_protocol::Engine`] from a plain polling
//! loop, reporting decoded status/sensor data and any unclaimed frames
//! over defmt/RTT.

mod sys;

use core::cell::RefCell;

use defmt::info;
use embassy_executor::Spawner;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::uart::{Blocking, Config, DataBits, Parity, StopBits, Uart};
use embassy_time::{Duration, Instant, Timer};

use estia_protocol::{config, Engine, EngineStatus, UartPort};

/// A handful of bytes the poll loop has already pulled off the wire but
/// the engine hasn't consumed yet; `UartPort::available` tops this up from
/// whatever the UART currently has ready.
struct UartState<'d> {
    uart: Uart<'d, Blocking>,
    staged: heapless::Deque<u8, 32>,
}

/// Bridges the core's [`UartPort`] onto a real UART plus a direction pin
/// driving the half-duplex transceiver's DE/RE line, gated the same way
/// `Engine::write_frame`'s `disable_rx` flag expects around a send.
struct EstiaUart<'d> {
    inner: RefCell<UartState<'d>>,
    de: Output<'d>,
}

impl<'d> EstiaUart<'d> {
    fn new(uart: Uart<'d, Blocking>, de: Output<'d>) -> Self {
        EstiaUart {
            inner: RefCell::new(UartState {
                uart,
                staged: heapless::Deque::new(),
            }),
            de,
        }
    }

    fn drain_ready(state: &mut UartState<'d>) {
        let mut byte = [0u8; 1];
        while state.staged.len() < state.staged.capacity() {
            match state.uart.read(&mut byte) {
                Ok(n) if n > 0 => {
                    if state.staged.push_back(byte[0]).is_err() {
                        break;
                    }
                }
                _ => break,
            }
        }
    }
}

impl UartPort for EstiaUart<'_> {
    fn available(&self) -> usize {
        let mut inner = self.inner.borrow_mut();
        Self::drain_ready(&mut inner);
        inner.staged.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut inner = self.inner.borrow_mut();
        Self::drain_ready(&mut inner);
        inner.staged.pop_front()
    }

    fn write(&mut self, bytes: &[u8]) {
        let _ = self.inner.borrow_mut().uart.write(bytes);
    }

    fn flush(&mut self) {
        let _ = self.inner.borrow_mut().uart.flush();
    }

    /// Active-low DE/RE: low enables the receiver, high enables the
    /// driver for the duration of a send.
    fn enable_rx(&mut self, enabled: bool) {
        self.de
            .set_level(if enabled { Level::Low } else { Level::High });
    }
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    sys::init();
    let p = embassy_rp::init(Default::default());

    let mut cfg = Config::default();
    cfg.baudrate = config::SERIAL_BAUD;
    cfg.data_bits = DataBits::Eight;
    cfg.parity = Parity::Even;
    cfg.stop_bits = StopBits::One;

    // Pick pins that match your board's RS485 transceiver wiring.
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, cfg);
    let de = Output::new(p.PIN_2, Level::Low);
    let mut port = EstiaUart::new(uart, de);

    let mut engine = Engine::new();
    engine.enqueue_sensor_requests(config::DEFAULT_POLL_SET, false);

    loop {
        let now_ms = Instant::now().as_millis() as u32;
        match engine.tick(&mut port, now_ms) {
            EngineStatus::Idle => Timer::after(Duration::from_millis(5)).await,
            EngineStatus::Busy => {}
            EngineStatus::FramePending => {
                while let Some(frame) = engine.take_next_frame() {
                    info!("unclaimed frame, {} bytes", frame.len());
                }
            }
        }

        if engine.has_new_status_data() {
            let status = engine.take_status();
            info!(
                "status: mode={} cooling={} heating={} hot_water={}",
                status.operation_mode, status.cooling, status.heating, status.hot_water
            );
        }

        if engine.has_new_sensor_data() {
            for (name, reading) in engine.take_sensor_readings().iter() {
                info!("{}: {} (x{})", name, reading.value, reading.multiplier);
            }
            engine.enqueue_sensor_requests(config::DEFAULT_POLL_SET, false);
        }
    }
}
