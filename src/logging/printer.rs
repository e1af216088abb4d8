//! Renders streamed log records for the terminal.
use crate::lang::Translator;
use crate::logio::{LogLevel, LogRecord};
use chrono::{DateTime, Local, Utc};
use colored::{ColoredString, Colorize};

/// Formats log records with a localized level label.
pub struct RecordPrinter {
    translator: Translator,
}

impl RecordPrinter {
    pub fn new(translator: Translator) -> Self {
        Self { translator }
    }

    /// Renders one record as `HH:MM:SS.mmm LEVEL message`, without color.
    pub fn format(&self, record: &LogRecord) -> String {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(record.time)
            .map(|time| time.with_timezone(&Local).format("%H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| record.time.to_string());

        format!(
            "{} {:5} {}",
            timestamp,
            self.level_label(record.level),
            record.message
        )
    }

    /// Prints one record to stdout, colored by level.
    pub fn print(&self, record: &LogRecord) {
        println!("{}", colorize(record.level, self.format(record)));
    }

    fn level_label(&self, level: LogLevel) -> String {
        self.translator
            .lookup(&format!("level.{}", level.as_wire()), &[])
            .unwrap_or_else(|| level.as_wire().to_string())
    }
}

fn colorize(level: LogLevel, line: String) -> ColoredString {
    match level {
        LogLevel::Error => line.red(),
        LogLevel::Warn => line.yellow(),
        LogLevel::Info => line.blue(),
        LogLevel::Debug => line.dimmed(),
    }
}
