use std::time::Duration;

/// Decides when a burst of device output counts as finished.
///
/// TELNET carries no end-of-response marker, so a read keeps draining the
/// stream until a full `window` passes with nothing new to read. The
/// terminator variant additionally stops as soon as the gathered bytes end
/// with a known byte, for devices that reliably close every response with
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlePolicy {
    QuietPeriod { window: Duration },
    Terminator { byte: u8, window: Duration },
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self::QuietPeriod {
            window: Duration::from_millis(100),
        }
    }
}

impl SettlePolicy {
    pub fn window(&self) -> Duration {
        match self {
            SettlePolicy::QuietPeriod { window } | SettlePolicy::Terminator { window, .. } => {
                *window
            }
        }
    }

    /// The same policy with a different inactivity window.
    pub fn with_window(self, window: Duration) -> Self {
        match self {
            SettlePolicy::QuietPeriod { .. } => SettlePolicy::QuietPeriod { window },
            SettlePolicy::Terminator { byte, .. } => SettlePolicy::Terminator { byte, window },
        }
    }

    pub fn is_complete(&self, gathered: &[u8]) -> bool {
        match self {
            SettlePolicy::QuietPeriod { .. } => false,
            SettlePolicy::Terminator { byte, .. } => gathered.last() == Some(byte),
        }
    }
}
