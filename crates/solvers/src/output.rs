use std::ops::{BitOr, BitOrAssign};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Message categories the solver logs through `tracing`.
///
/// Flags are purely informational: they select which diagnostics are emitted
/// and never change convergence behavior. Errors are always logged, so
/// [`OutputFlags::ERROR`] is the empty set.
///
/// Bit values follow the message types of the NOX solver library so existing
/// integer settings carry over.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OutputFlags(u32);

impl OutputFlags {
    pub const ERROR: Self = Self(0);
    pub const WARNING: Self = Self(0x1);
    pub const OUTER_ITERATION: Self = Self(0x2);
    pub const INNER_ITERATION: Self = Self(0x4);
    pub const PARAMETERS: Self = Self(0x8);
    pub const DETAILS: Self = Self(0x10);
    pub const OUTER_ITERATION_STATUS_TEST: Self = Self(0x20);
    pub const LINEAR_SOLVER_DETAILS: Self = Self(0x40);
    pub const TEST_DETAILS: Self = Self(0x80);
    pub const DEBUG: Self = Self(0x1000);

    /// Creates flags from a raw bitmask.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bitmask.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if every category in `other` is enabled.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for OutputFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for OutputFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_logs_errors_only() {
        let flags = OutputFlags::default();
        assert_eq!(flags, OutputFlags::ERROR);
        assert!(flags.contains(OutputFlags::ERROR));
        assert!(!flags.contains(OutputFlags::WARNING));
    }

    #[test]
    fn combined_flags_contain_each_part() {
        let mut flags = OutputFlags::WARNING | OutputFlags::OUTER_ITERATION;
        flags |= OutputFlags::DEBUG;

        assert_eq!(flags.bits(), 0x1003);
        assert!(flags.contains(OutputFlags::OUTER_ITERATION));
        assert!(flags.contains(OutputFlags::WARNING | OutputFlags::DEBUG));
        assert!(!flags.contains(OutputFlags::INNER_ITERATION));
    }

    #[test]
    fn raw_bits_round_trip() {
        assert_eq!(OutputFlags::from_bits(0x22).bits(), 0x22);
        assert!(OutputFlags::from_bits(0x22).contains(OutputFlags::OUTER_ITERATION_STATUS_TEST));
    }
}
