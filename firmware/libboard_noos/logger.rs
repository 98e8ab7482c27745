use core::fmt;
use log::{Log, LevelFilter, Metadata, Record, set_logger, set_max_level};

/// Writes timestamped lines through the board's console and timer hooks.
pub struct ConsoleLogger {
    pub write: fn(fmt::Arguments),
    pub now_us: fn() -> u64,
}

impl ConsoleLogger {
    pub fn register(logger: &'static ConsoleLogger, level: LevelFilter) {
        if set_logger(logger).is_err() {
            warn!("global logger already registered");
        }
        set_max_level(level);
    }

    pub fn set_level(level: LevelFilter) {
        set_max_level(level)
    }
}

pub fn format_record<W: fmt::Write>(w: &mut W, timestamp_us: u64, record: &Record) -> fmt::Result {
    let seconds = timestamp_us / 1_000_000;
    let micros  = timestamp_us % 1_000_000;
    writeln!(w, "[{:6}.{:06}s] {:>5}({}): {}",
             seconds, micros, record.level(), record.target(), record.args())
}

struct Forward(fn(fmt::Arguments));

impl fmt::Write for Forward {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        (self.0)(format_args!("{}", s));
        Ok(())
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = format_record(&mut Forward(self.write), (self.now_us)(), record);
        }
    }

    fn flush(&self) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;
    use std::string::String;

    #[test]
    fn line_format() {
        let mut line = String::new();
        format_record(&mut line, 1_500_000,
                      &Record::builder()
                          .args(format_args!("locked"))
                          .level(Level::Info)
                          .target("adf4382")
                          .build()).unwrap();
        assert_eq!(line, "[     1.500000s]  INFO(adf4382): locked\n");
    }

    #[test]
    fn sub_second() {
        let mut line = String::new();
        format_record(&mut line, 42,
                      &Record::builder()
                          .args(format_args!("drp timeout"))
                          .level(Level::Error)
                          .target("xcvr")
                          .build()).unwrap();
        assert_eq!(line, "[     0.000042s] ERROR(xcvr): drp timeout\n");
    }
}
