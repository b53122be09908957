//! Monitor state and kind enumerations.

use core::fmt;

/// Explicit state of a monitor in the registry tree.
///
/// `Inherit` defers to the nearest ancestor with an explicit
/// `Enabled`/`Disabled` state. The root never inherits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SimonState {
    Enabled,
    Disabled,
    #[default]
    Inherit,
}

impl SimonState {
    /// Compact encoding, used to keep the state in an atomic.
    pub const fn as_u8(self) -> u8 {
        match self {
            SimonState::Enabled => 0,
            SimonState::Disabled => 1,
            SimonState::Inherit => 2,
        }
    }

    /// Inverse of [`SimonState::as_u8`]. Unknown values decode as `Inherit`.
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => SimonState::Enabled,
            1 => SimonState::Disabled,
            _ => SimonState::Inherit,
        }
    }
}

impl fmt::Display for SimonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SimonState::Enabled => "enabled",
            SimonState::Disabled => "disabled",
            SimonState::Inherit => "inherit",
        })
    }
}

/// What a monitor measures.
///
/// `Unknown` nodes are created implicitly as ancestors of typed monitors and
/// are promoted in place on first typed access. `Null` monitors are handed
/// out by a disabled registry and ignore every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SimonKind {
    Unknown,
    Counter,
    Stopwatch,
    Null,
}

impl fmt::Display for SimonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SimonKind::Unknown => "unknown",
            SimonKind::Counter => "counter",
            SimonKind::Stopwatch => "stopwatch",
            SimonKind::Null => "null",
        })
    }
}
