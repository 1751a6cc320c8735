//! Construction-time client options

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    ClientSection, FaultHook, Handler, NopHandler, DEFAULT_JITTER_MAX_MS,
    DEFAULT_READY_QUEUE_CAPACITY,
};
use scheduler::{JitterSource, RandomJitter};
use validator::Validate;

/// Client options, validated by [`crate::Client::new`]
#[derive(Clone, Validate)]
pub struct ClientOptions {
    /// Ready queue capacity, must be >= 1
    #[validate(range(min = 1, message = "ready_queue_capacity must be >= 1"))]
    pub ready_queue_capacity: usize,

    /// Upper bound of re-enqueue and fast retry delays
    pub jitter_max: Duration,

    /// Receives panics caught while dispatching; `None` ignores them
    pub fault_hook: Option<FaultHook>,

    pub handler: Arc<dyn Handler>,

    pub jitter: Arc<dyn JitterSource>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            ready_queue_capacity: DEFAULT_READY_QUEUE_CAPACITY,
            jitter_max: Duration::from_millis(DEFAULT_JITTER_MAX_MS),
            fault_hook: None,
            handler: Arc::new(NopHandler),
            jitter: Arc::new(RandomJitter::new()),
        }
    }
}

impl ClientOptions {
    /// Options from the `[client]` section of a blueprint
    pub fn from_section(section: &ClientSection) -> Self {
        Self::default()
            .with_ready_queue_capacity(section.ready_queue_capacity)
            .with_jitter_max(Duration::from_millis(section.jitter_max_ms))
    }

    pub fn with_ready_queue_capacity(mut self, capacity: usize) -> Self {
        self.ready_queue_capacity = capacity;
        self
    }

    pub fn with_jitter_max(mut self, jitter_max: Duration) -> Self {
        self.jitter_max = jitter_max;
        self
    }

    pub fn with_fault_hook(mut self, hook: FaultHook) -> Self {
        self.fault_hook = Some(hook);
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("ready_queue_capacity", &self.ready_queue_capacity)
            .field("jitter_max", &self.jitter_max)
            .field("fault_hook", &self.fault_hook.is_some())
            .finish_non_exhaustive()
    }
}
