//! Progress reporting and cooperative cancellation
//!
//! The core components write progress through [`ProgressPort`] and poll it
//! for cancellation between files and between catalog records. The caller
//! owns the port; the core never stores it.

use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::models::ScanSummary;

/// Progress and cancellation channel supplied by the caller
pub trait ProgressPort {
    /// Set the completion percentage (0-100)
    fn set_percentage(&mut self, percentage: u8);

    /// Set the status message
    fn set_message(&mut self, message: &str);

    /// Check whether the caller asked to stop
    fn is_cancelled(&self) -> bool;
}

/// Port that reports nothing and never cancels
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressPort for NoProgress {
    fn set_percentage(&mut self, _percentage: u8) {}

    fn set_message(&mut self, _message: &str) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Shared cancellation flag
#[derive(Debug, Default, Clone)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Compute a percentage from a position, clamped to 100
pub fn percentage(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}

/// Progress message sent during an operation
#[derive(Debug, Clone, Serialize)]
pub struct ProgressMessage {
    /// Message type identifier ("p" for progress)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Completion percentage
    pub pct: u8,
    /// Status message
    pub msg: String,
}

impl ProgressMessage {
    /// Create a new progress message
    pub fn new(seq: u64, ts: u64, pct: u8, msg: String) -> Self {
        Self {
            msg_type: "p",
            seq,
            ts,
            pct,
            msg,
        }
    }
}

/// Done message sent when a scan completes
#[derive(Debug, Clone, Serialize)]
pub struct DoneMessage {
    /// Message type identifier ("done" for completion)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Total number of qualifying files
    #[serde(rename = "tf")]
    pub total_files: u64,
    /// Number of new files
    #[serde(rename = "nf")]
    pub new_files: u64,
    /// Number of files already in the inventory
    #[serde(rename = "ef")]
    pub existing_files: u64,
    /// Number of dead entries
    #[serde(rename = "df")]
    pub dead_files: u64,
    /// Number of errors encountered
    #[serde(rename = "ec")]
    pub error_count: usize,
    /// Total scan duration in milliseconds
    pub ms: u64,
}

impl DoneMessage {
    /// Create a done message from a scan summary
    pub fn from_summary(seq: u64, ts: u64, summary: &ScanSummary) -> Self {
        Self {
            msg_type: "done",
            seq,
            ts,
            total_files: summary.total_files,
            new_files: summary.new_files,
            existing_files: summary.existing_files,
            dead_files: summary.dead_files,
            error_count: summary.error_count(),
            ms: summary.duration_ms,
        }
    }
}

/// Progress port writing JSON lines, stderr by default
///
/// Messages are throttled to one per `interval_ms`, except that reaching
/// 100% is always reported.
pub struct JsonProgress<W: Write = std::io::Stderr> {
    out: W,
    /// Minimum interval between progress messages in milliseconds
    interval_ms: u64,
    /// Last report time
    last_report: Option<Instant>,
    seq: u64,
    start_time: Instant,
    percentage: u8,
    cancel: Option<CancelFlag>,
}

impl JsonProgress<std::io::Stderr> {
    /// Create a reporter writing to stderr
    pub fn stderr(interval_ms: u64) -> Self {
        Self::new(std::io::stderr(), interval_ms)
    }
}

impl<W: Write> JsonProgress<W> {
    /// Create a reporter writing to `out`
    pub fn new(out: W, interval_ms: u64) -> Self {
        Self {
            out,
            interval_ms,
            last_report: None,
            seq: 0,
            start_time: Instant::now(),
            percentage: 0,
            cancel: None,
        }
    }

    /// Let `cancel` stop the operation being reported
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Check if enough time has passed since the last report
    pub fn should_report(&self) -> bool {
        match self.last_report {
            None => true,
            Some(last) => last.elapsed().as_millis() as u64 >= self.interval_ms,
        }
    }

    /// Get the next sequence number (monotonically increasing)
    pub fn next_seq(&mut self) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }

    /// Get the current timestamp in milliseconds since reporter creation
    pub fn current_timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    fn emit<T: Serialize>(&mut self, msg: &T) {
        if let Ok(json) = serde_json::to_string(msg) {
            writeln!(self.out, "{}", json).ok();
            self.out.flush().ok();
        }
    }

    /// Report scan completion
    pub fn report_done(&mut self, summary: &ScanSummary) {
        let seq = self.next_seq();
        let msg = DoneMessage::from_summary(seq, self.current_timestamp(), summary);
        self.emit(&msg);
    }

    /// Consume the reporter and return the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressPort for JsonProgress<W> {
    fn set_percentage(&mut self, percentage: u8) {
        self.percentage = percentage.min(100);
    }

    fn set_message(&mut self, message: &str) {
        if self.percentage < 100 && !self.should_report() {
            return;
        }
        let seq = self.next_seq();
        let msg = ProgressMessage::new(
            seq,
            self.current_timestamp(),
            self.percentage,
            message.to_string(),
        );
        self.emit(&msg);
        self.last_report = Some(Instant::now());
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(out: Vec<u8>) -> Vec<serde_json::Value> {
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 4), 0);
        assert_eq!(percentage(1, 4), 25);
        assert_eq!(percentage(4, 4), 100);
        assert_eq!(percentage(9, 4), 100);
        assert_eq!(percentage(0, 0), 100);
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_no_progress_never_cancels() {
        let mut port = NoProgress;
        port.set_percentage(50);
        port.set_message("scanning");
        assert!(!port.is_cancelled());
    }

    #[test]
    fn test_progress_message_serialization() {
        let msg = ProgressMessage::new(2, 200, 40, "/roms/snes".to_string());
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["_t"], "p");
        assert_eq!(parsed["seq"], 2);
        assert_eq!(parsed["ts"], 200);
        assert_eq!(parsed["pct"], 40);
        assert_eq!(parsed["msg"], "/roms/snes");
    }

    #[test]
    fn test_done_message_serialization() {
        let summary = ScanSummary {
            total_files: 10,
            new_files: 4,
            existing_files: 6,
            dead_files: 2,
            duration_ms: 1500,
            ..Default::default()
        };
        let msg = DoneMessage::from_summary(7, 900, &summary);
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["_t"], "done");
        assert_eq!(parsed["seq"], 7);
        assert_eq!(parsed["tf"], 10);
        assert_eq!(parsed["nf"], 4);
        assert_eq!(parsed["ef"], 6);
        assert_eq!(parsed["df"], 2);
        assert_eq!(parsed["ec"], 0);
        assert_eq!(parsed["ms"], 1500);
    }

    #[test]
    fn test_json_progress_throttles_messages() {
        let mut port = JsonProgress::new(Vec::new(), 60_000);
        port.set_percentage(10);
        port.set_message("first");
        port.set_percentage(20);
        port.set_message("throttled");
        port.set_percentage(100);
        port.set_message("finished");

        let messages = lines(port.into_inner());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["msg"], "first");
        assert_eq!(messages[0]["seq"], 0);
        assert_eq!(messages[1]["msg"], "finished");
        assert_eq!(messages[1]["pct"], 100);
        assert_eq!(messages[1]["seq"], 1);
    }

    #[test]
    fn test_json_progress_cancellation() {
        let unflagged = JsonProgress::new(Vec::new(), 0);
        assert!(!unflagged.is_cancelled());

        let flag = CancelFlag::new();
        let port = JsonProgress::new(Vec::new(), 0).with_cancel(flag.clone());
        assert!(!port.is_cancelled());
        flag.cancel();
        assert!(port.is_cancelled());
    }

    #[test]
    fn test_json_progress_report_done() {
        let mut port = JsonProgress::new(Vec::new(), 0);
        port.report_done(&ScanSummary::default());
        let messages = lines(port.into_inner());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["_t"], "done");
    }

    #[test]
    fn test_percentage_is_clamped() {
        let mut port = JsonProgress::new(Vec::new(), 0);
        port.set_percentage(250);
        port.set_message("over");
        let messages = lines(port.into_inner());
        assert_eq!(messages[0]["pct"], 100);
    }
}
