//! Logger that forwards engine logs to the headless host

use crate::log::{format_entry, LogEntry, LogSeverity, Logger};
use super::message::Message;
use super::pipe::MessageQueue;

/// Queues every entry at or above `min_severity` as a `Message` packet.
/// Packets leave with the next pipe flush.
pub struct HeadlessLogger {
    queue: MessageQueue,
    min_severity: LogSeverity,
}

impl HeadlessLogger {
    pub fn new(queue: MessageQueue) -> Self {
        Self { queue, min_severity: LogSeverity::Info }
    }

    pub fn with_min_severity(mut self, severity: LogSeverity) -> Self {
        self.min_severity = severity;
        self
    }
}

impl Logger for HeadlessLogger {
    fn log(&self, entry: &LogEntry) {
        if entry.severity < self.min_severity {
            return;
        }
        self.queue.push(Message::log(entry.severity, &format_entry(entry)));
    }
}
