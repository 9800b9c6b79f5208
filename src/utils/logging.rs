use chrono::Local;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

pub trait Logger: Send + Sync {
    fn log(&mut self, message: &str);
    fn debug_log(&mut self, message: &str);
}

#[derive(Debug, Clone)]
pub struct FileLogger {
    log_file: String,
    debug: bool,
}

impl FileLogger {
    pub fn new(log_file: &str, debug: bool) -> std::io::Result<Self> {
        // Create log directory if it doesn't exist
        if let Some(parent) = Path::new(log_file).parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(FileLogger {
            log_file: log_file.to_string(),
            debug,
        })
    }

    fn write_to_file(&self, message: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)?;

        writeln!(file, "{}: {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message)
    }
}

impl Logger for FileLogger {
    fn log(&mut self, message: &str) {
        if let Err(e) = self.write_to_file(message) {
            eprintln!("Failed to write to log file: {}", e);
        }
    }

    fn debug_log(&mut self, message: &str) {
        if self.debug {
            if let Err(e) = self.write_to_file(&format!("[DEBUG] {}", message)) {
                eprintln!("Failed to write debug log: {}", e);
            }
        }
    }
}

/// Writes timestamped lines to stderr. Used by the binary during startup.
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    debug: bool,
}

impl ConsoleLogger {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl Logger for ConsoleLogger {
    fn log(&mut self, message: &str) {
        eprintln!("{}: {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message);
    }

    fn debug_log(&mut self, message: &str) {
        if self.debug {
            eprintln!(
                "{}: [DEBUG] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                message
            );
        }
    }
}

// MultiLogger allows logging to multiple destinations
#[derive(Default)]
pub struct MultiLogger {
    loggers: Vec<Box<dyn Logger>>,
}

impl MultiLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, logger: Box<dyn Logger>) -> Self {
        self.loggers.push(logger);
        self
    }
}

impl Logger for MultiLogger {
    fn log(&mut self, message: &str) {
        for logger in &mut self.loggers {
            logger.log(message);
        }
    }

    fn debug_log(&mut self, message: &str) {
        for logger in &mut self.loggers {
            logger.debug_log(message);
        }
    }
}

/// A cloneable handle onto one logger, so several owners can write to the
/// same destinations.
#[derive(Clone)]
pub struct SharedLogger {
    inner: Arc<Mutex<Box<dyn Logger>>>,
}

impl SharedLogger {
    pub fn new(logger: Box<dyn Logger>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(logger)),
        }
    }

    /// Ignores poisoning: a panic elsewhere does not silence the log.
    fn lock(&self) -> MutexGuard<'_, Box<dyn Logger>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Logger for SharedLogger {
    fn log(&mut self, message: &str) {
        self.lock().log(message);
    }

    fn debug_log(&mut self, message: &str) {
        self.lock().debug_log(message);
    }
}

/// Collects messages in memory so tests can assert on what was reported.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MemoryLogger {
    pub logs: Arc<Mutex<Vec<String>>>,
}

#[cfg(test)]
impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.logs
            .lock()
            .map(|logs| logs.iter().any(|line| line.contains(needle)))
            .unwrap_or(false)
    }
}

#[cfg(test)]
impl Logger for MemoryLogger {
    fn log(&mut self, message: &str) {
        if let Ok(mut logs) = self.logs.lock() {
            logs.push(message.to_string());
        }
    }

    fn debug_log(&mut self, message: &str) {
        if let Ok(mut logs) = self.logs.lock() {
            logs.push(format!("DEBUG: {}", message));
        }
    }
}
