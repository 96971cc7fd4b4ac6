//! Identity types for units and their subscribers.

use std::fmt;

/// Identifies one subscription on a broadcaster.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubscriberId(pub u64);

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({})", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Monotonic configuration version. Zero means never configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RuleVersion(pub u64);

impl RuleVersion {
    pub const UNCONFIGURED: RuleVersion = RuleVersion(0);

    #[inline]
    pub fn is_configured(self) -> bool {
        self != Self::UNCONFIGURED
    }

    #[inline]
    pub fn next(self) -> Self {
        RuleVersion(self.0 + 1)
    }
}

impl fmt::Display for RuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
