//! Guard lifecycle state.

/// Lifecycle of the guard.
///
/// ```text
/// Uninitialized → Initializing → Active
///        ↑              │
///        └── token mint failure
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Uninitialized = 0,
    Initializing = 1,
    Active = 2,
}

impl From<u8> for GuardState {
    fn from(val: u8) -> Self {
        match val {
            1 => GuardState::Initializing,
            2 => GuardState::Active,
            _ => GuardState::Uninitialized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_u8() {
        for state in [GuardState::Uninitialized, GuardState::Initializing, GuardState::Active] {
            assert_eq!(GuardState::from(state as u8), state);
        }
        assert_eq!(GuardState::from(42), GuardState::Uninitialized);
    }
}
