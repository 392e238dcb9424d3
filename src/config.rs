use std::time::Duration;

/// Baud rate the sensor board firmware talks at.
pub const DEFAULT_BAUD: u32 = 115200;

/// Number of readings requested when nothing else is asked for.
pub const DEFAULT_COUNT: usize = 200;

/// time, temp, pressure, gas
pub const FIELD_COUNT: usize = 4;

/// Parameters for one acquisition run.
#[derive(Debug, Clone)]
pub struct AcquireConfig {
    /// Serial device path (e.g. /dev/ttyACM0, COM3)
    pub port_path: String,
    pub baud_rate: u32,
    /// Number of line reads performed, and the count sent to the device
    pub count: usize,
    /// Fields a line must carry to be accepted
    pub field_count: usize,
    /// Per-line read timeout
    pub timeout: Duration,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            port_path: String::new(),
            baud_rate: DEFAULT_BAUD,
            count: DEFAULT_COUNT,
            field_count: FIELD_COUNT,
            timeout: Duration::from_millis(100),
        }
    }
}

impl AcquireConfig {
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
