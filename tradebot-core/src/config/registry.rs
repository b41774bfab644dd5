//! Process-wide registry of signal settings.
//!
//! The registry is the only place configuration is shared: a control surface
//! updates it while the trading loop reads snapshots. Snapshots are taken per
//! module invocation, so an update landing mid-iteration applies to the next
//! module that runs.

use std::sync::{PoisonError, RwLock};

use super::signals::SignalSettings;
use super::ConfigError;

#[derive(Debug, Default)]
pub struct ConfigRegistry {
    inner: RwLock<SignalSettings>,
}

impl ConfigRegistry {
    pub fn new(settings: SignalSettings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> SignalSettings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply a `module.field = value` update (see [`SignalSettings::set`]).
    pub fn update(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.set(key, value)?;
        tracing::info!(key, value, "signal configuration updated");
        Ok(())
    }

    /// Replace every setting at once after validating the new record.
    pub fn replace(&self, settings: SignalSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = settings;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn update_is_visible_in_next_snapshot() {
        let registry = ConfigRegistry::default();
        let before = registry.snapshot();
        registry.update("news.positive_threshold", "0.9").unwrap();
        let after = registry.snapshot();
        assert_eq!(before.news.positive_threshold, 0.80);
        assert_eq!(after.news.positive_threshold, 0.9);
    }

    #[test]
    fn rejected_update_keeps_previous_value() {
        let registry = ConfigRegistry::default();
        assert!(registry.update("spread.limit", "-1").is_err());
        assert_eq!(registry.snapshot().spread.limit, 0.02);
    }

    #[test]
    fn replace_validates() {
        let registry = ConfigRegistry::default();
        let mut bad = SignalSettings::default();
        bad.random.buy_probability = 2.0;
        assert!(registry.replace(bad).is_err());
    }

    #[test]
    fn updates_from_another_thread_are_seen() {
        let registry = Arc::new(ConfigRegistry::default());
        let writer = Arc::clone(&registry);
        thread::spawn(move || writer.update("random.max_quantity", "25").unwrap())
            .join()
            .unwrap();
        assert_eq!(registry.snapshot().random.max_quantity, 25);
    }
}
