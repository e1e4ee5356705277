// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use std::fs::File;

use simplelog::{Config, LevelFilter, SimpleLogger, WriteLogger};

pub const TRACE_ENV: &str = "P11CLIENT_TRACE";
pub const TRACE_LEVEL_ENV: &str = "P11CLIENT_TRACE_LEVEL";

/// Maps a level name to a filter, unknown names enable everything
pub fn level_from_str(level: Option<&str>) -> LevelFilter {
    match level {
        None => LevelFilter::Error,
        Some(l) => match l {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Trace,
        },
    }
}

/// Initializes a simple logger for tracing purposes based on the values of
/// the environment variable P11CLIENT_TRACE:
/// - stdout -> logs to standard output
/// - file -> any other value is interpreted as a file name to log into
/// - NOT PRESENT -> No tracing is initialized
/// If the logger initialization encounters an error, (for example the log
/// file can't be opened) no tracing is available and no error is reported.
///
/// Additionally the log level can be selected with the environment variable
/// P11CLIENT_TRACE_LEVEL
/// It defaults to LevelFilter::Error.
/// Valid values are: off, error, warn, info, debug, trace.
/// Any incorrect value triggers the highest logging level: LevelFilter::Trace
pub fn log_init() {
    let level = level_from_str(std::env::var(TRACE_LEVEL_ENV).ok().as_deref());
    match std::env::var(TRACE_ENV) {
        Err(_) => return,
        Ok(t) => log_init_to(&t, level),
    }
}

/// Same as [log_init] with an explicit destination and level
pub fn log_init_to(target: &str, level: LevelFilter) {
    match target {
        "stdout" => {
            let _ = SimpleLogger::init(level, Config::default());
        }
        file_name => {
            let file = match File::create(file_name) {
                Ok(w) => w,
                Err(_) => return,
            };
            let _ = WriteLogger::init(level, Config::default(), file);
        }
    }
}

#[test]
pub fn test_init() {
    log_init();
}

#[test]
pub fn test_levels() {
    assert_eq!(level_from_str(None), LevelFilter::Error);
    assert_eq!(level_from_str(Some("warn")), LevelFilter::Warn);
    assert_eq!(level_from_str(Some("bogus")), LevelFilter::Trace);
}
