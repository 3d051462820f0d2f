//! Logger that prints messages like `[WARN] Lorem ipsum` to stderr and,
//! optionally, every message up to DEBUG to a log file.

use atty;
use log::{self, Level, Log, Metadata, Record};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

struct Logger {
    level: Level,
    use_color: bool,
    file: Option<Mutex<File>>,
}

fn level_color(level: Level) -> Color {
    match level {
        Level::Error => Color::Red,
        Level::Warn => Color::Yellow,
        Level::Info => Color::Green,
        Level::Debug | Level::Trace => Color::Cyan,
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level || (self.file.is_some() && metadata.level() <= Level::Debug)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if let Some(ref file) = self.file {
            if record.level() <= Level::Debug {
                if let Ok(mut f) = file.lock() {
                    let _ = writeln!(f, "[{}] {}: {}", record.level(), record.target(), record.args());
                }
            }
        }

        if record.level() > self.level {
            return;
        }

        let color_choice = match self.use_color {
            true => ColorChoice::Auto,
            false => ColorChoice::Never,
        };
        let mut stderr = StandardStream::stderr(color_choice);
        let _ = stderr.set_color(ColorSpec::new().set_fg(Some(level_color(record.level()))));
        let _ = write!(&mut stderr, "[{}]", record.level());
        let _ = stderr.reset();
        let _ = writeln!(&mut stderr, " {}", record.args());
    }

    fn flush(&self) {
        if let Some(ref file) = self.file {
            if let Ok(mut f) = file.lock() {
                let _ = f.flush();
            }
        }
    }
}

/// Installs the global logger. `level` gates stderr; when `logfile` is
/// given, everything up to DEBUG is also appended there.
pub fn init(level: Level, logfile: Option<&Path>) {
    let use_color = atty::is(atty::Stream::Stderr);
    let file = logfile.and_then(|path| match File::create(path) {
        Ok(f) => Some(Mutex::new(f)),
        Err(e) => {
            eprintln!("couldn't open log file {}: {}", path.display(), e);
            None
        }
    });
    let max_level = match file {
        Some(_) if level < Level::Debug => Level::Debug,
        _ => level,
    };
    let logger = Logger { level, use_color, file };
    let _ = log::set_boxed_logger(Box::new(logger));
    log::set_max_level(max_level.to_level_filter());
}
