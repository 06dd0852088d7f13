//! # Radio Link Module
//!
//! Reads raw sensor frames from the point-to-point radio module attached over
//! a serial port. The module is configured in transparent mode: whatever the
//! mailbox sensor transmits arrives here byte-for-byte.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use maildisplay::radio::RadioReader;
//! use maildisplay::telemetry::PayloadFormat;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let reader = RadioReader::open(
//!         "/dev/ttyUSB0",
//!         9600,
//!         PayloadFormat::Primary,
//!         Duration::from_millis(200),
//!         tx,
//!     )?;
//!     tokio::spawn(reader.run());
//!     while let Some(frame) = rx.recv().await {
//!         println!("{} bytes", frame.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The reader is an ordinary tokio task. Each tick makes one port read bounded
//! by a short timeout, so a runtime worker is held for at most that long. The
//! reader owns the port and never touches publisher state; frames cross to the
//! station loop over an unbounded channel. It stops when the receiving side is
//! dropped.

pub mod framer;

use anyhow::Result;
use log::{debug, info, trace, warn};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::sleep;

#[cfg(feature = "serial")]
use anyhow::anyhow;
#[cfg(feature = "serial")]
use serialport::SerialPort;
#[cfg(feature = "serial")]
use std::io::Read;

use crate::logutil::hex_frame;
use crate::telemetry::PayloadFormat;
pub use framer::FrameAssembler;

/// Serial read timeout; also bounds how late a gap flush can be noticed.
const READ_TIMEOUT: Duration = Duration::from_millis(20);

pub type FrameSender = mpsc::UnboundedSender<Vec<u8>>;
pub type FrameReceiver = mpsc::UnboundedReceiver<Vec<u8>>;

pub struct RadioReader {
    port_name: String,
    #[cfg(feature = "serial")]
    port: Box<dyn SerialPort>,
    assembler: FrameAssembler,
    frame_tx: FrameSender,
}

impl RadioReader {
    /// Open the serial port 8N1 and prepare a reader for `format` frames.
    #[cfg(feature = "serial")]
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        format: PayloadFormat,
        frame_gap: Duration,
        frame_tx: FrameSender,
    ) -> Result<Self> {
        info!("Opening radio link on {} at {} baud", port_name, baud_rate);
        let port = serialport::new(port_name, baud_rate)
            .timeout(READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| anyhow!("Failed to open serial port {}: {}", port_name, e))?;
        // Drop anything the module emitted before we were listening.
        let _ = port.clear(serialport::ClearBuffer::Input);
        Ok(Self {
            port_name: port_name.to_string(),
            port,
            assembler: FrameAssembler::new(format.frame_len(), frame_gap),
            frame_tx,
        })
    }

    /// Without serial support compiled in the reader never produces frames.
    #[cfg(not(feature = "serial"))]
    pub fn open(
        port_name: &str,
        _baud_rate: u32,
        format: PayloadFormat,
        frame_gap: Duration,
        frame_tx: FrameSender,
    ) -> Result<Self> {
        warn!("Serial support not compiled in, radio on {} is a mock", port_name);
        Ok(Self {
            port_name: port_name.to_string(),
            assembler: FrameAssembler::new(format.frame_len(), frame_gap),
            frame_tx,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Read until the frame receiver goes away.
    pub async fn run(mut self) -> Result<()> {
        info!("Starting radio reader on {}", self.port_name);
        let mut interval = tokio::time::interval(Duration::from_millis(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.frame_tx.closed() => {
                    debug!("Frame receiver dropped, stopping radio reader");
                    break;
                }
                _ = interval.tick() => {
                    self.read_once().await;
                }
            }
        }

        info!("Radio reader on {} shutting down", self.port_name);
        Ok(())
    }

    async fn read_once(&mut self) {
        #[cfg(feature = "serial")]
        {
            let mut buffer = [0u8; 64];
            match self.port.read(&mut buffer) {
                Ok(n) if n > 0 => {
                    trace!("RAW {} bytes: {}", n, hex_frame(&buffer[..n], 32));
                    let frames = self.assembler.push(&buffer[..n], Instant::now());
                    for frame in frames {
                        self.forward(frame);
                    }
                }
                Ok(_) => {}
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    warn!("Serial read error on {} (continuing): {}", self.port_name, e);
                    sleep(Duration::from_millis(100)).await;
                }
            }
        }

        #[cfg(not(feature = "serial"))]
        {
            sleep(Duration::from_millis(100)).await;
        }

        if let Some(partial) = self.assembler.flush_stale(Instant::now()) {
            self.forward(partial);
        }
    }

    fn forward(&mut self, frame: Vec<u8>) {
        debug!("Radio frame: {}", hex_frame(&frame, 16));
        if self.frame_tx.send(frame).is_err() {
            trace!("Frame dropped, receiver gone");
        }
    }
}
