//! Named loggers and the process-wide registry that owns them.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use super::Handler;
use crate::models::{LogRecord, Severity};

/// Threshold of a freshly created logger.
pub const DEFAULT_LEVEL: Severity = Severity::Warning;

/// A named logger that filters by severity and fans records out to its handlers.
pub struct Logger {
    name: String,
    level: RwLock<Severity>,
    handlers: RwLock<Vec<Arc<dyn Handler>>>,
}

fn same_handler(a: &Arc<dyn Handler>, b: &Arc<dyn Handler>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

impl Logger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: RwLock::new(DEFAULT_LEVEL),
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Severity {
        *self.level.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_level(&self, level: Severity) {
        *self.level.write().unwrap_or_else(PoisonError::into_inner) = level;
    }

    pub fn is_enabled_for(&self, level: Severity) -> bool {
        level >= self.level()
    }

    /// Attach a handler. Returns `false` if it was already attached.
    pub fn add_handler(&self, handler: Arc<dyn Handler>) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        if handlers.iter().any(|h| same_handler(h, &handler)) {
            return false;
        }
        handlers.push(handler);
        true
    }

    pub fn has_handler(&self, handler: &Arc<dyn Handler>) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|h| same_handler(h, handler))
    }

    /// Detach a handler and close it. Returns `false` if it was not attached.
    pub fn remove_handler(&self, handler: &Arc<dyn Handler>) -> bool {
        let removed = {
            let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
            let before = handlers.len();
            handlers.retain(|h| !same_handler(h, handler));
            before != handlers.len()
        };
        if removed {
            handler.close();
        }
        removed
    }

    /// Detach and close every handler.
    pub fn clear_handlers(&self) {
        let detached = std::mem::take(
            &mut *self.handlers.write().unwrap_or_else(PoisonError::into_inner),
        );
        for handler in detached {
            handler.close();
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    // Handlers are called on a snapshot so a handler may log through this logger.
    fn snapshot(&self) -> Vec<Arc<dyn Handler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn log(&self, level: Severity, message: impl Into<String>) {
        if !self.is_enabled_for(level) {
            return;
        }
        let record = LogRecord::new(level, message, self.name.as_str());
        for handler in self.snapshot() {
            handler.emit(&record);
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Severity::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Severity::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Severity::Error, message);
    }

    pub fn critical(&self, message: impl Into<String>) {
        self.log(Severity::Critical, message);
    }

    pub fn flush(&self) {
        for handler in self.snapshot() {
            handler.flush();
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("handlers", &self.handler_count())
            .finish()
    }
}

/// Owner of named loggers.
///
/// [`LoggerRegistry::global`] is created on first use and lives for the rest of
/// the process; loggers obtained from it are reused by name. [`LoggerRegistry::teardown`]
/// detaches and closes every handler for embedders that need an explicit shutdown.
#[derive(Default)]
pub struct LoggerRegistry {
    loggers: Mutex<HashMap<String, Arc<Logger>>>,
}

static GLOBAL_REGISTRY: OnceLock<LoggerRegistry> = OnceLock::new();

impl LoggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static LoggerRegistry {
        GLOBAL_REGISTRY.get_or_init(LoggerRegistry::new)
    }

    /// Get the logger called `name`, creating it on first use.
    pub fn logger(&self, name: &str) -> Arc<Logger> {
        self.loggers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Logger::new(name)))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Logger>> {
        self.loggers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Drop every logger, closing all attached handlers.
    pub fn teardown(&self) {
        let loggers: Vec<Arc<Logger>> = self
            .loggers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, logger)| logger)
            .collect();
        for logger in loggers {
            logger.clear_handlers();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        records: Mutex<Vec<(Severity, String)>>,
        flushes: AtomicUsize,
        closes: AtomicUsize,
    }

    impl Handler for Counting {
        fn emit(&self, record: &LogRecord) {
            self.records
                .lock()
                .unwrap()
                .push((record.level, record.message.clone()));
        }

        fn flush(&self) {
            self.flushes.fetch_add(1, Ordering::SeqCst);
        }

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_threshold_filters_before_handlers() {
        let logger = Logger::new("test");
        let counting = Arc::new(Counting::default());
        logger.add_handler(counting.clone());

        logger.info("dropped");
        logger.warning("kept");
        logger.set_level(Severity::Debug);
        logger.debug("now kept");

        let records = counting.records.lock().unwrap();
        assert_eq!(
            *records,
            vec![
                (Severity::Warning, "kept".to_string()),
                (Severity::Debug, "now kept".to_string())
            ]
        );
    }

    #[test]
    fn test_handler_attached_once() {
        let logger = Logger::new("test");
        let counting: Arc<dyn Handler> = Arc::new(Counting::default());

        assert!(logger.add_handler(counting.clone()));
        assert!(!logger.add_handler(counting.clone()));
        assert_eq!(logger.handler_count(), 1);
        assert!(logger.has_handler(&counting));
    }

    #[test]
    fn test_remove_handler_closes_it() {
        let logger = Logger::new("test");
        let counting = Arc::new(Counting::default());
        let handler: Arc<dyn Handler> = counting.clone();
        logger.add_handler(handler.clone());

        assert!(logger.remove_handler(&handler));
        assert!(!logger.remove_handler(&handler));
        assert_eq!(counting.closes.load(Ordering::SeqCst), 1);

        logger.critical("nobody listens");
        assert!(counting.records.lock().unwrap().is_empty());
    }

    #[test]
    fn test_registry_reuses_loggers() {
        let registry = LoggerRegistry::new();
        let first = registry.logger("app");
        let second = registry.logger("app");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.get("other").is_none());
    }

    #[test]
    fn test_registry_teardown_closes_handlers() {
        let registry = LoggerRegistry::new();
        let counting = Arc::new(Counting::default());
        registry.logger("app").add_handler(counting.clone());

        registry.teardown();

        assert_eq!(counting.closes.load(Ordering::SeqCst), 1);
        assert!(registry.get("app").is_none());
    }
}
