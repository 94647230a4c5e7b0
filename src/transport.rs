use std::io::{BufRead, BufReader};
use std::time::Duration;

use serialport::SerialPort;

/// Result of a single bounded-wait read.
#[derive(Debug, PartialEq)]
pub enum ReadOutcome {
    /// A complete line, including its terminator.
    Line(Vec<u8>),
    /// Nothing (or only part of a line) arrived within the read timeout.
    Timeout,
    /// End of stream: the device is gone and no more data will arrive.
    Closed,
}

/// A line-oriented byte stream from a device. Implementations must return
/// from `read_line` within their configured read timeout even when the device
/// is silent - the acquisition loop relies on that to check its stop
/// conditions. Closing happens on drop.
pub trait Transport {
    fn read_line(&mut self) -> std::io::Result<ReadOutcome>;

    /// Drops any input that is already queued. Best-effort: the acquisition
    /// loop logs and otherwise ignores failures.
    fn clear_input_buffer(&mut self) -> std::io::Result<()>;
}

pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

pub struct SerialTransport {
    reader: BufReader<Box<dyn SerialPort>>,
    // Part of a line that was received before a read timed out. It's kept
    // until the rest of the line arrives.
    pending: Vec<u8>,
}

impl SerialTransport {
    /// Opens `address` (e.g. "COM3" or "/dev/ttyUSB0") using 8N1 framing,
    /// which is what benchtop scales use almost universally.
    pub fn open(
        address: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> serialport::Result<SerialTransport> {
        let port = serialport::new(address, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            // The timeout bounds read_line, and therefore how quickly the
            // acquisition loop notices cancellation on a silent device.
            .timeout(read_timeout)
            .open()?;
        Ok(SerialTransport::from_port(port))
    }

    pub fn from_port(port: Box<dyn SerialPort>) -> SerialTransport {
        SerialTransport {
            reader: BufReader::new(port),
            pending: Vec::with_capacity(64),
        }
    }
}

impl Transport for SerialTransport {
    fn read_line(&mut self) -> std::io::Result<ReadOutcome> {
        // read_until appends whatever it consumed to pending even when it
        // subsequently fails, so a timeout in the middle of a line doesn't
        // lose the first half.
        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(0) => {
                if self.pending.is_empty() {
                    Ok(ReadOutcome::Closed)
                } else {
                    Ok(ReadOutcome::Line(std::mem::take(&mut self.pending)))
                }
            }
            Ok(_) => Ok(ReadOutcome::Line(std::mem::take(&mut self.pending))),
            Err(error) if error.kind() == std::io::ErrorKind::TimedOut => Ok(ReadOutcome::Timeout),
            Err(error) => Err(error),
        }
    }

    fn clear_input_buffer(&mut self) -> std::io::Result<()> {
        self.pending.clear();
        let buffered = self.reader.buffer().len();
        self.reader.consume(buffered);
        self.reader
            .get_ref()
            .clear(serialport::ClearBuffer::Input)
            .map_err(std::io::Error::from)
    }
}
