use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Connection lifecycle states for a monitoring session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection and no retry scheduled
    Disconnected,
    /// First connection attempt in flight
    Connecting,
    /// Transport open, messages flowing
    Connected,
    /// Connection lost, backoff timer or retry attempt in flight
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Reconnecting => "RECONNECTING",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: ConnectionState) -> bool {
        use ConnectionState::*;

        match (self, target) {
            // From Disconnected
            (Disconnected, Connecting) => true,

            // From Connecting
            (Connecting, Connected) => true,    // Handshake succeeded
            (Connecting, Reconnecting) => true, // Initial attempt failed, retries armed
            (Connecting, Disconnected) => true, // Caller gave up mid-attempt

            // From Connected
            (Connected, Reconnecting) => true,  // Abnormal closure or read error
            (Connected, Disconnected) => true,  // Explicit disconnect or clean close

            // From Reconnecting
            (Reconnecting, Connected) => true,    // Retry succeeded
            (Reconnecting, Disconnected) => true, // Exhausted or explicit disconnect

            // All other transitions are invalid
            _ => false,
        }
    }

    /// Can outbound traffic be written right now?
    pub fn can_transmit(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Is a retry schedule active?
    pub fn is_retrying(&self) -> bool {
        matches!(self, ConnectionState::Reconnecting)
    }

    /// Is this a resting state with no background activity?
    pub fn is_idle(&self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State transition event (for logging/debugging)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChange {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl StateChange {
    pub fn new(from: ConnectionState, to: ConnectionState, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Identity of one monitoring session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub device_id: String,
    /// Derived WebSocket endpoint this session talks to
    pub endpoint: String,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        session_id: impl Into<String>,
        device_id: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            device_id: device_id.into(),
            endpoint: endpoint.into(),
            started_at: Utc::now(),
        }
    }
}

/// Named server-push interests a session can register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subscription {
    FingerprintUpdates,
    ViolationAlerts,
    DeviceAnalytics,
    SessionIntegrity,
}

impl Subscription {
    /// Every subscription a monitoring session can register
    pub const ALL: [Subscription; 4] = [
        Subscription::FingerprintUpdates,
        Subscription::ViolationAlerts,
        Subscription::DeviceAnalytics,
        Subscription::SessionIntegrity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subscription::FingerprintUpdates => "fingerprint_updates",
            Subscription::ViolationAlerts => "violation_alerts",
            Subscription::DeviceAnalytics => "device_analytics",
            Subscription::SessionIntegrity => "session_integrity",
        }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Subscription {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fingerprint_updates" => Ok(Subscription::FingerprintUpdates),
            "violation_alerts" => Ok(Subscription::ViolationAlerts),
            "device_analytics" => Ok(Subscription::DeviceAnalytics),
            "session_integrity" => Ok(Subscription::SessionIntegrity),
            _ => Err("unknown subscription"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        use ConnectionState::*;

        // Valid transitions
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connecting.can_transition_to(Reconnecting));
        assert!(Connected.can_transition_to(Reconnecting));
        assert!(Connected.can_transition_to(Disconnected));
        assert!(Reconnecting.can_transition_to(Connected));
        assert!(Reconnecting.can_transition_to(Disconnected));

        // Invalid transitions
        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Disconnected.can_transition_to(Reconnecting));
        assert!(!Connected.can_transition_to(Connecting));
        assert!(!Reconnecting.can_transition_to(Connecting));
        assert!(!Connected.can_transition_to(Connected));
    }

    #[test]
    fn test_state_predicates() {
        assert!(ConnectionState::Connected.can_transmit());
        assert!(!ConnectionState::Reconnecting.can_transmit());
        assert!(ConnectionState::Reconnecting.is_retrying());
        assert!(ConnectionState::Disconnected.is_idle());
        assert!(!ConnectionState::Connecting.is_idle());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "CONNECTED");
        assert_eq!(ConnectionState::Reconnecting.to_string(), "RECONNECTING");
    }

    #[test]
    fn test_subscription_round_trip() {
        for subscription in Subscription::ALL {
            let parsed: Subscription = subscription.as_str().parse().unwrap();
            assert_eq!(parsed, subscription);
        }
        assert_eq!(
            "Violation_Alerts".parse::<Subscription>().unwrap(),
            Subscription::ViolationAlerts
        );
        assert!("order_books".parse::<Subscription>().is_err());
    }
}
