/// Utility functions and helpers
///
/// Performance accounting for transaction loops, hex/duration formatting
/// used by the loggers, and RTU bus timing calculators for callers that
/// drive real serial hardware.

use std::time::{Duration, Instant};

use log::{debug, info, warn};

/// Performance metrics for Modbus transactions
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_duration: Duration,
    pub min_duration: Option<Duration>,
    pub max_duration: Option<Duration>,
    pub avg_duration: Duration,
}

impl PerformanceMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful transaction
    pub fn record_success(&mut self, duration: Duration) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.total_duration += duration;

        self.min_duration = Some(self.min_duration.map_or(duration, |min| min.min(duration)));
        self.max_duration = Some(self.max_duration.map_or(duration, |max| max.max(duration)));

        self.avg_duration = self.total_duration / self.total_requests as u32;
    }

    /// Record a failed transaction
    pub fn record_failure(&mut self, duration: Duration) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.total_duration += duration;

        self.avg_duration = self.total_duration / self.total_requests as u32;
    }

    /// Get success rate as percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        (self.successful_requests as f64 / self.total_requests as f64) * 100.0
    }

    /// Get transactions per second
    pub fn requests_per_second(&self) -> f64 {
        if self.total_duration.is_zero() {
            return 0.0;
        }
        self.total_requests as f64 / self.total_duration.as_secs_f64()
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Timer for measuring operation duration
pub struct OperationTimer {
    start: Instant,
    operation_name: String,
}

impl OperationTimer {
    /// Start a new timer
    pub fn start(operation_name: &str) -> Self {
        debug!("Starting operation: {}", operation_name);
        Self {
            start: Instant::now(),
            operation_name: operation_name.to_string(),
        }
    }

    /// Stop the timer and return duration
    pub fn stop(self) -> Duration {
        let duration = self.start.elapsed();
        debug!("Operation '{}' completed in {:?}", self.operation_name, duration);
        duration
    }

    /// Stop timer and log result
    pub fn stop_and_log(self, success: bool) -> Duration {
        let duration = self.start.elapsed();
        if success {
            info!("Operation '{}' succeeded in {:?}", self.operation_name, duration);
        } else {
            warn!("Operation '{}' failed after {:?}", self.operation_name, duration);
        }
        duration
    }
}

/// RTU bus timing calculators
///
/// The link layer itself works with wall-clock receive windows; these
/// helpers are for port implementations that enforce proper Modbus silent
/// intervals on real hardware.
pub mod timing {
    /// Character transmission time in microseconds
    ///
    /// 11 bits per character: 1 start + 8 data + 1 parity + 1 stop.
    pub fn character_time_us(baud_rate: u32) -> u32 {
        (11 * 1_000_000) / baud_rate
    }

    /// Inter-frame gap (3.5 character times) in microseconds
    ///
    /// Above 19200 baud the standard fixes the gap at 1750 microseconds
    /// instead of scaling it down further.
    pub fn frame_gap_us(baud_rate: u32) -> u32 {
        let gap = character_time_us(baud_rate) * 35 / 10;
        if baud_rate > 19200 {
            gap.max(1750)
        } else {
            gap
        }
    }

    /// Inter-character gap (1.5 character times) in microseconds
    pub fn char_gap_us(baud_rate: u32) -> u32 {
        let gap = character_time_us(baud_rate) * 15 / 10;
        if baud_rate > 19200 {
            gap.max(750)
        } else {
            gap
        }
    }
}

/// Formatting and display utilities
pub mod format {
    use super::*;

    /// Format byte array as hex string
    pub fn bytes_to_hex(bytes: &[u8]) -> String {
        bytes
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Format register values as hex
    pub fn registers_to_hex(registers: &[u16]) -> String {
        registers
            .iter()
            .map(|r| format!("{:04X}", r))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Format duration in a human-readable way
    pub fn format_duration(duration: Duration) -> String {
        let millis = duration.as_millis();
        if millis < 1000 {
            format!("{}ms", millis)
        } else if millis < 60_000 {
            format!("{:.2}s", duration.as_secs_f64())
        } else {
            let mins = millis / 60_000;
            let secs = (millis % 60_000) as f64 / 1000.0;
            format!("{}m {:.1}s", mins, secs)
        }
    }
}

/// Logging utilities
pub mod logging {
    /// Initialize simple logger for testing
    pub fn init_test_logger() {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_performance_metrics() {
        let mut metrics = PerformanceMetrics::new();

        metrics.record_success(Duration::from_millis(100));
        metrics.record_success(Duration::from_millis(200));
        metrics.record_failure(Duration::from_millis(150));

        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.successful_requests, 2);
        assert_eq!(metrics.failed_requests, 1);
        assert!((metrics.success_rate() - 66.67).abs() < 0.1);
        assert_eq!(metrics.min_duration, Some(Duration::from_millis(100)));
        assert_eq!(metrics.max_duration, Some(Duration::from_millis(200)));
    }

    #[test]
    fn test_timing_calculations() {
        for baud_rate in [9600u32, 19200, 38400, 57600, 115200] {
            let char_time = timing::character_time_us(baud_rate);
            let frame_gap = timing::frame_gap_us(baud_rate);

            assert!(char_time > 0);
            assert!(frame_gap >= char_time * 3);

            if baud_rate > 19200 {
                assert!(frame_gap >= 1750);
            }
        }

        // 9600 baud: 11 bits at ~104 us/bit.
        assert_eq!(timing::character_time_us(9600), 1145);
        assert_eq!(timing::frame_gap_us(9600), 4007);
    }

    #[test]
    fn test_formatting() {
        let bytes = vec![0x01, 0x03, 0x10, 0xFF];
        assert_eq!(format::bytes_to_hex(&bytes), "01 03 10 FF");

        let registers = vec![0x1234, 0x5678];
        assert_eq!(format::registers_to_hex(&registers), "1234 5678");

        let duration = Duration::from_millis(1500);
        assert_eq!(format::format_duration(duration), "1.50s");
    }
}
