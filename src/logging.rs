//! A logging module for commandline usage

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

#[derive(Default)]
/// A logger instance
pub struct Logger {}

static LOGGER: Logger = Logger {};

/// Sets global logger, only records at or below `level` are printed.
///
/// # Errors
///
/// An error is returned if a logger has already been set.
///
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level_name = record.level().to_string().to_lowercase();

        println!("[{}] {}", level_name, record.args());
    }

    fn flush(&self) {}
}

#[test]
fn test_level_filter() {
    use log::{Level, MetadataBuilder};

    // Tests share the process, so a second init is expected to fail.
    let _ = init(LevelFilter::Info);
    log::set_max_level(LevelFilter::Info);

    let debug = MetadataBuilder::new().level(Level::Debug).build();
    assert!(!LOGGER.enabled(&debug));

    let info = MetadataBuilder::new().level(Level::Info).build();
    assert!(LOGGER.enabled(&info));

    let warn = MetadataBuilder::new().level(Level::Warn).build();
    assert!(LOGGER.enabled(&warn));
}
