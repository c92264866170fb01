//! Active store selection

use std::fmt;

use super::probe::ConnectivityProbe;

/// Which backing store serves reads and receives best-effort writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreMode {
    Remote,
    Local,
}

impl StoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreMode::Remote => "remote",
            StoreMode::Local => "local",
        }
    }
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives [`StoreMode`] from the latest probe result on every call.
///
/// There is no hysteresis and no manual override.
pub struct ModeSelector {
    probe: ConnectivityProbe,
}

impl ModeSelector {
    pub fn new(probe: ConnectivityProbe) -> Self {
        Self { probe }
    }

    pub async fn current_mode(&self) -> StoreMode {
        let mode = if self.probe.is_online().await {
            StoreMode::Remote
        } else {
            StoreMode::Local
        };

        use crate::metrics::STORE_MODE;
        STORE_MODE
            .with_label_values(&[StoreMode::Remote.as_str()])
            .set((mode == StoreMode::Remote) as i64);
        STORE_MODE
            .with_label_values(&[StoreMode::Local.as_str()])
            .set((mode == StoreMode::Local) as i64);

        mode
    }
}
