use std::{
    fs,
    fs::File,
    io,
    io::prelude::Write as _,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
    thread,
    time::SystemTime,
};

use log::{LevelFilter, Log, SetLoggerError};
use thiserror::Error;

pub const LOG_PATH: &str = "./logs/";

#[derive(Debug, Error)]
pub enum LoggerInitErr {
    #[error("unable to create the log file: {}", .0)]
    File(#[from] io::Error),
    #[error(transparent)]
    AlreadySet(#[from] SetLoggerError),
}

/// logs into a new file in [`LOG_PATH`] named after the host and the current time
pub fn init(hostname: impl AsRef<str>, max_level: LevelFilter) -> Result<PathBuf, LoggerInitErr> {
    let logger = Logger::new(LOG_PATH, hostname, max_level)?;
    let path = logger.path.clone();
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(max_level);
    Ok(path)
}

pub struct Logger {
    max_level: LevelFilter,
    path: PathBuf,
    log_file: Mutex<File>,
}

impl Logger {
    pub fn new(
        log_folder: impl AsRef<Path>,
        hostname: impl AsRef<str>,
        max_level: LevelFilter,
    ) -> io::Result<Self> {
        let folder = log_folder.as_ref();
        fs::create_dir_all(folder)?;
        // `:` is not allowed in file names everywhere
        let time = humantime::format_rfc3339_seconds(SystemTime::now())
            .to_string()
            .replace(':', "-");
        let path = folder.join(format!("{}-{}.txt", file_name_safe(hostname.as_ref()), time));
        Ok(Self {
            log_file: Mutex::new(File::options().create(true).append(true).open(&path)?),
            path,
            max_level,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&self) -> MutexGuard<'_, File> {
        self.log_file.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let thread = thread::current();
        let _ = self.file().write_fmt(format_args!(
            "[{}] [{:<5}] [{}] {}\n",
            humantime::format_rfc3339_millis(SystemTime::now()),
            record.level(),
            thread.name().unwrap_or("unnamed"),
            record.args(),
        ));
    }

    fn flush(&self) {
        let _ = self.file().flush();
    }
}

fn file_name_safe(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::env;

    use log::{Level, Metadata};

    use super::*;

    #[test]
    fn level_filter() {
        let dir = env::temp_dir().join(format!("irc-engine-log-{}", std::process::id()));
        let logger = Logger::new(&dir, "irc.example.com", LevelFilter::Info).unwrap();
        let enabled =
            |level| logger.enabled(&Metadata::builder().level(level).target("test").build());
        assert!(enabled(Level::Error));
        assert!(enabled(Level::Info));
        assert!(!enabled(Level::Debug));
        assert!(logger.path().starts_with(&dir));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn host_names_become_file_names() {
        assert_eq!(file_name_safe("irc.example.com"), "irc.example.com");
        assert_eq!(file_name_safe("[::1]"), "[__1]");
    }
}
