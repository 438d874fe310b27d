use serde::Deserialize;

/// Default max entries fetched per dispatch cycle.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default failed attempts before an entry is dead-lettered.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Tunables for the delivery pipeline.
///
/// Deserializable from configuration; unset fields take the defaults, and
/// non-positive values are treated as unset when resolved through the
/// `effective_*` accessors.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DeliveryOptions {
    /// Max entries fetched per dispatch cycle.
    pub batch_size: i64,
    /// Failed attempts before dead-lettering.
    pub max_retries: i64,
    /// Whether the inbox idempotency check runs at all. When disabled,
    /// subscribers may be invoked more than once per event.
    pub enable_inbox: bool,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        DeliveryOptions {
            batch_size: DEFAULT_BATCH_SIZE as i64,
            max_retries: DEFAULT_MAX_RETRIES as i64,
            enable_inbox: true,
        }
    }
}

impl DeliveryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_retries(mut self, max_retries: i64) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_inbox_enabled(mut self, enable_inbox: bool) -> Self {
        self.enable_inbox = enable_inbox;
        self
    }

    /// Batch size with non-positive values replaced by the default.
    pub fn effective_batch_size(&self) -> usize {
        if self.batch_size <= 0 {
            DEFAULT_BATCH_SIZE
        } else {
            self.batch_size as usize
        }
    }

    /// Retry ceiling with non-positive values replaced by the default.
    pub fn effective_max_retries(&self) -> u32 {
        if self.max_retries <= 0 {
            DEFAULT_MAX_RETRIES
        } else {
            self.max_retries as u32
        }
    }
}
