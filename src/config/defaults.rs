//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery. Every value here is also the
//! serde default of the matching config field.

// ============================================================================
// Sources
// ============================================================================

/// Interval between poll ticks (seconds).
pub const POLL_INTERVAL_SECS: u64 = 5;

/// Messages requested per source per tick.
pub const MESSAGE_LIMIT: usize = 4;

/// HTTP timeout for feed requests (seconds).
pub const SOURCE_HTTP_TIMEOUT_SECS: u64 = 15;

// ============================================================================
// Batching
// ============================================================================

/// Debounce window opened by the first item of a burst (seconds).
pub const BASE_WINDOW_SECS: u64 = 30;

/// Deadline extension per further item (seconds).
pub const EXTEND_BY_SECS: u64 = 3;

/// Scheduler inbox capacity (items).
pub const SCHEDULER_CHANNEL_SIZE: usize = 256;

// ============================================================================
// Classifier
// ============================================================================

/// Maximum conversation entries kept per classifier.
pub const MAX_HISTORY: usize = 30;

/// Attempts per classification, first try included.
pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff base; the first retry waits this long, each further retry doubles.
pub const BASE_DELAY_MS: u64 = 2_000;

/// Per-attempt HTTP timeout for provider calls (seconds).
pub const CLASSIFIER_HTTP_TIMEOUT_SECS: u64 = 60;

/// Default instruction preamble file.
pub const PREAMBLE_PATH: &str = "system_message.txt";

/// Interval between preamble mtime checks (milliseconds).
pub const PREAMBLE_POLL_INTERVAL_MS: u64 = 2_000;

/// Settle time after a preamble change before reading it (milliseconds).
pub const PREAMBLE_DEBOUNCE_MS: u64 = 500;

// ============================================================================
// Relay
// ============================================================================

/// Telegram Bot API base URL.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Retries on Telegram 429 responses.
pub const TELEGRAM_MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Telegram `sendMessage` text limit (characters).
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// HTTP timeout for relay requests (seconds).
pub const RELAY_HTTP_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Gate
// ============================================================================

/// Alert type that counts as "active".
pub const GATE_ALERT_TYPE: &str = "AIR";

/// HTTP timeout for the gate status request (seconds).
pub const GATE_HTTP_TIMEOUT_SECS: u64 = 10;
