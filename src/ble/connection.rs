//! Peripheral connection states.

/// Connection state for a peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PeripheralState {
    /// Not connected to the peripheral.
    #[default]
    Disconnected,
    /// Currently attempting to connect.
    Connecting,
    /// Link established, services not yet discovered.
    Connected,
    /// Services discovered and usable.
    Ready,
    /// Currently disconnecting.
    Disconnecting,
    /// The last connection attempt failed.
    FailedToConnect,
}

impl PeripheralState {
    /// Check if the radio link is up.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Ready)
    }

    /// Check if in a transitional state.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }

    /// Check if no further radio callback is expected in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::FailedToConnect)
    }
}

impl std::fmt::Display for PeripheralState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Ready => write!(f, "Ready"),
            Self::Disconnecting => write!(f, "Disconnecting"),
            Self::FailedToConnect => write!(f, "Failed to connect"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peripheral_state() {
        assert!(!PeripheralState::Disconnected.is_connected());
        assert!(PeripheralState::Connected.is_connected());
        assert!(PeripheralState::Ready.is_connected());
        assert!(!PeripheralState::Connecting.is_connected());

        assert!(PeripheralState::Connecting.is_transitioning());
        assert!(PeripheralState::Disconnecting.is_transitioning());
        assert!(!PeripheralState::Ready.is_transitioning());

        assert!(PeripheralState::FailedToConnect.is_terminal());
        assert!(!PeripheralState::Disconnecting.is_terminal());
    }

    #[test]
    fn test_peripheral_state_display() {
        assert_eq!(format!("{}", PeripheralState::Ready), "Ready");
        assert_eq!(
            format!("{}", PeripheralState::FailedToConnect),
            "Failed to connect"
        );
    }
}
