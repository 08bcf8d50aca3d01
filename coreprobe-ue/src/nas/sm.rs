//! 5GSM session state (TS 24.501 §6.1.3.2)

use std::fmt;

/// PDU session state on the UE side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmState {
    /// No user plane for this session
    #[default]
    Inactive,
    /// Establishment request sent, accept outstanding
    ActivePending,
    /// Session established, user plane usable
    Active,
}

impl fmt::Display for SmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmState::Inactive => write!(f, "PDU-SESSION-INACTIVE"),
            SmState::ActivePending => write!(f, "PDU-SESSION-ACTIVE-PENDING"),
            SmState::Active => write!(f, "PDU-SESSION-ACTIVE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        assert_eq!(SmState::default(), SmState::Inactive);
    }

    #[test]
    fn test_display() {
        assert_eq!(SmState::ActivePending.to_string(), "PDU-SESSION-ACTIVE-PENDING");
    }
}
