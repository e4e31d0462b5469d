//! EdgeTX serial passthrough handshake
//!
//! Before an internal RF module can be flashed through the radio's USB port,
//! the radio has to stop sending pulses, power-cycle the module with its boot
//! pin held, and bridge USB to the module UART. EdgeTX exposes all of this on
//! its USB CLI:
//!
//! ```text
//! set pulses 0
//! set rfmod 0 power off
//! set rfmod 0 bootpin 1
//! set rfmod 0 power on
//! set rfmod 0 bootpin 0
//! serialpassthrough rfmod 0 460800
//! ```
//!
//! After the last command the module sits in its ROM bootloader and the
//! flashing tool must connect without resetting it first.

use crate::error::HandshakeError;
use crate::transport::serial::SerialTransport;
use crate::transport::Transport;
use std::thread;
use std::time::Duration;

/// Switches a device into bootloader passthrough mode
pub trait Handshake {
    /// Run the handshake on `port`; returns once the device is in passthrough
    fn init(&mut self, port: &str, baud: u32) -> Result<(), HandshakeError>;
}

/// Time the module stays powered off
const POWER_OFF_DELAY: Duration = Duration::from_millis(500);
/// Time between boot pin and power changes
const PIN_DELAY: Duration = Duration::from_millis(100);
/// Time for the radio to set up the bridge
const BRIDGE_DELAY: Duration = Duration::from_millis(200);
/// How long to wait for the CLI reply to drain
const DRAIN_TIMEOUT_MS: u32 = 100;

/// EdgeTX CLI passthrough handshake
#[derive(Debug, Clone)]
pub struct EdgeTxPassthrough {
    power_off_delay: Duration,
    pin_delay: Duration,
    bridge_delay: Duration,
}

impl Default for EdgeTxPassthrough {
    fn default() -> Self {
        Self {
            power_off_delay: POWER_OFF_DELAY,
            pin_delay: PIN_DELAY,
            bridge_delay: BRIDGE_DELAY,
        }
    }
}

impl EdgeTxPassthrough {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override all settle delays
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.power_off_delay = delay;
        self.pin_delay = delay;
        self.bridge_delay = delay;
        self
    }

    /// CLI commands sent to the radio, paired with the delay after each
    fn script(&self, baud: u32) -> Vec<(String, Duration)> {
        vec![
            ("set pulses 0".to_string(), Duration::ZERO),
            ("set rfmod 0 power off".to_string(), self.power_off_delay),
            ("set rfmod 0 bootpin 1".to_string(), self.pin_delay),
            ("set rfmod 0 power on".to_string(), self.pin_delay),
            ("set rfmod 0 bootpin 0".to_string(), Duration::ZERO),
            (
                format!("serialpassthrough rfmod 0 {}", baud),
                self.bridge_delay,
            ),
        ]
    }

    /// Run the handshake over an already-open transport
    pub fn run<T: Transport>(&self, transport: &mut T, baud: u32) -> Result<(), HandshakeError> {
        log::info!("======== PASSTHROUGH INIT ========");

        for (command, delay) in self.script(baud) {
            log::debug!("passthrough: > {}", command);
            transport.write(command.as_bytes())?;
            transport.write(b"\n")?;
            transport.flush()?;
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }

        let mut reply = [0u8; 256];
        let n = transport.read_nonblock(&mut reply, DRAIN_TIMEOUT_MS)?;
        if n > 0 {
            log::debug!(
                "passthrough: < {}",
                String::from_utf8_lossy(&reply[..n]).trim()
            );
        }

        log::info!("======== PASSTHROUGH DONE ========");
        Ok(())
    }
}

impl Handshake for EdgeTxPassthrough {
    fn init(&mut self, port: &str, baud: u32) -> Result<(), HandshakeError> {
        log::info!("Trying to initialize {} @ {}", port, baud);
        let mut transport = SerialTransport::open(port, baud)?;
        self.run(&mut transport, baud)
    }
}
