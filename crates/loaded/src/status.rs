use core::fmt;

use dom::CachedStatus;
use serde::Serialize;

/// Terminal outcome of a detection cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    /// The resource loaded (and validated, where validation is possible).
    Success,
    /// Abort/error event, broken-resource heuristic, or a zero-size image.
    Error,
    /// The configured deadline passed before any native terminal signal.
    Timeout,
}

impl LoadStatus {
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// The trit cached on the node. Timeouts cache as failures.
    #[inline]
    #[must_use]
    pub const fn cached(self) -> CachedStatus {
        match self {
            Self::Success => CachedStatus::Success,
            Self::Error | Self::Timeout => CachedStatus::Failed,
        }
    }

    /// Outcome replayed from a cached trit, if settled.
    #[inline]
    #[must_use]
    pub const fn from_cached(status: CachedStatus) -> Option<Self> {
        match status {
            CachedStatus::Pending => None,
            CachedStatus::Success => Some(Self::Success),
            CachedStatus::Failed => Some(Self::Error),
        }
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
