use log::Level;
use log::LevelFilter;
use log::Log;
use log::Metadata;
use log::Record;

/// Writes records to stderr so event output on stdout stays clean.
pub struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if record.target() == "js-console" {
            let method = match record.level() {
                Level::Error => "error",
                Level::Warn => "warn",
                Level::Info => "log",
                Level::Debug | Level::Trace => "debug",
            };
            eprintln!("[console.{method}] {}", record.args());
            return;
        }

        eprintln!(
            "[{level}][{target}] {message}",
            level = record.level(),
            target = record.target(),
            message = record.args()
        );
    }

    fn flush(&self) {}
}

pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    static LOGGER: StderrLogger = StderrLogger;
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}
