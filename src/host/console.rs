use std::io::Write;

use super::Handler;
use crate::models::LogRecord;

/// Local sink printing records to stderr as `[timestamp] [LEVEL] target: message`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleHandler;

impl ConsoleHandler {
    pub fn format(record: &LogRecord) -> String {
        format!(
            "[{}] [{}] {}: {}",
            record.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            record.level,
            record.target,
            record.message
        )
    }
}

impl Handler for ConsoleHandler {
    fn emit(&self, record: &LogRecord) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", Self::format(record));
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
