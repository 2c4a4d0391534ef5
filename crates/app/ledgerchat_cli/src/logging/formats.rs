use std::io::Write;

use flexi_logger::DeferredNow;
use log::{Level, Record};

/// `HH:MM:SS LEVEL message`, with the level omitted for `info`.
pub fn cli_format(w: &mut dyn Write, now: &mut DeferredNow, record: &Record) -> std::io::Result<()> {
    match record.level() {
        Level::Info => write!(w, "{} {}", now.format("%H:%M:%S"), record.args()),
        level => write!(w, "{} {:<5} {}", now.format("%H:%M:%S"), level, record.args()),
    }
}
