//! Debounce window arithmetic.
//!
//! Kept free of channels and timers so the deadline rules can be checked
//! directly. The scheduler task owns exactly one `Window` at a time.

use std::time::Duration;
use tokio::time::Instant;

/// Timing knobs for the adaptive window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    /// Time from the first item to the default flush
    pub base_window: Duration,
    /// Added to the current deadline for each further item
    pub extend_by: Duration,
    /// Optional cap on `deadline - opened_at`
    pub max_window: Option<Duration>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            base_window: Duration::from_secs(crate::config::defaults::BASE_WINDOW_SECS),
            extend_by: Duration::from_secs(crate::config::defaults::EXTEND_BY_SECS),
            max_window: None,
        }
    }
}

/// An open debounce window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub opened_at: Instant,
    pub deadline: Instant,
    /// Items that extended the deadline (first item excluded)
    pub extensions: u32,
}

impl Window {
    /// Open a window for an item arriving at `now`.
    pub fn open(now: Instant, config: &WindowConfig) -> Self {
        let mut window = Self {
            opened_at: now,
            deadline: now + config.base_window,
            extensions: 0,
        };
        window.clamp(config);
        window
    }

    /// Push the deadline out for one more item.
    ///
    /// The extension is relative to the existing deadline, not to the arrival
    /// time of the item.
    pub fn extend(&mut self, config: &WindowConfig) {
        self.deadline += config.extend_by;
        self.extensions += 1;
        self.clamp(config);
    }

    /// Whether the cap (if any) is already reached.
    pub fn is_capped(&self, config: &WindowConfig) -> bool {
        config
            .max_window
            .is_some_and(|max| self.deadline >= self.opened_at + max)
    }

    fn clamp(&mut self, config: &WindowConfig) {
        if let Some(max) = config.max_window {
            let limit = self.opened_at + max;
            if self.deadline > limit {
                self.deadline = limit;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: u64, extend: u64, max: Option<u64>) -> WindowConfig {
        WindowConfig {
            base_window: Duration::from_secs(base),
            extend_by: Duration::from_secs(extend),
            max_window: max.map(Duration::from_secs),
        }
    }

    #[test]
    fn test_open_sets_base_deadline() {
        let now = Instant::now();
        let w = Window::open(now, &config(30, 3, None));
        assert_eq!(w.deadline - now, Duration::from_secs(30));
        assert_eq!(w.extensions, 0);
    }

    #[test]
    fn test_extension_is_relative_to_previous_deadline() {
        let now = Instant::now();
        let cfg = config(30, 3, None);
        let mut w = Window::open(now, &cfg);
        w.extend(&cfg);
        w.extend(&cfg);
        assert_eq!(w.deadline - now, Duration::from_secs(36));
        assert_eq!(w.extensions, 2);
    }

    #[test]
    fn test_max_window_caps_extensions() {
        let now = Instant::now();
        let cfg = config(30, 3, Some(35));
        let mut w = Window::open(now, &cfg);
        w.extend(&cfg);
        assert!(!w.is_capped(&cfg));
        w.extend(&cfg);
        assert_eq!(w.deadline - now, Duration::from_secs(35));
        assert!(w.is_capped(&cfg));
        w.extend(&cfg);
        assert_eq!(w.deadline - now, Duration::from_secs(35));
    }

    #[test]
    fn test_max_window_below_base_caps_open() {
        let now = Instant::now();
        let cfg = config(30, 3, Some(10));
        let w = Window::open(now, &cfg);
        assert_eq!(w.deadline - now, Duration::from_secs(10));
    }
}
