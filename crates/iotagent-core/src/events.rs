//! Event types handed to the reporting sink.
//!
//! Each discovery step produces one event. The sink decides where it goes
//! (logs, stdout, eventually the backend).

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{DeviceProfile, DeviceSummary, ProfileOutcome, SweepOutcome};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// An event emitted by the discovery engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryEvent {
    pub id: EventId,
    pub agent_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl DiscoveryEvent {
    pub fn new(agent_id: Uuid, payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            agent_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// The event payload, tagged by type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EventPayload {
    // ── Sweep events ──────────────────────────────────────────
    /// A sweep of a subnet started.
    SweepStarted { scan_id: Uuid, subnet: String },
    /// A sweep finished; `devices` may legitimately be empty.
    SweepCompleted {
        scan_id: Uuid,
        subnet: String,
        device_count: u32,
        devices: Vec<DeviceSummary>,
        duration_ms: u64,
    },
    /// The sweep itself failed. Distinct from an empty network.
    SweepFailed {
        scan_id: Uuid,
        subnet: String,
        error: String,
    },

    // ── Profile events ────────────────────────────────────────
    DeviceProfiled { profile: DeviceProfile },
    DeviceNotFound { ip: Ipv4Addr },
    ProfileFailed { ip: Ipv4Addr, error: String },
}

impl EventPayload {
    /// Map a finished sweep to its event.
    pub fn from_sweep(scan_id: Uuid, outcome: &SweepOutcome, duration_ms: u64) -> Self {
        match outcome {
            SweepOutcome::Completed { subnet, devices } => Self::SweepCompleted {
                scan_id,
                subnet: subnet.clone(),
                device_count: devices.len() as u32,
                devices: devices.clone(),
                duration_ms,
            },
            SweepOutcome::Failed { subnet, error } => Self::SweepFailed {
                scan_id,
                subnet: subnet.clone(),
                error: error.clone(),
            },
        }
    }

    /// Map a profile outcome to its event.
    pub fn from_profile(outcome: &ProfileOutcome) -> Self {
        match outcome {
            ProfileOutcome::Found(profile) => Self::DeviceProfiled {
                profile: profile.clone(),
            },
            ProfileOutcome::NotFound { ip } => Self::DeviceNotFound { ip: *ip },
            ProfileOutcome::Failed { ip, error } => Self::ProfileFailed {
                ip: *ip,
                error: error.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HostStatus;

    #[test]
    fn event_serialization_roundtrip() {
        let event = DiscoveryEvent::new(
            Uuid::new_v4(),
            EventPayload::DeviceNotFound {
                ip: Ipv4Addr::new(10, 0, 0, 7),
            },
        );

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: DiscoveryEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, deserialized.id);
    }

    #[test]
    fn failed_sweep_is_not_completed() {
        let outcome = SweepOutcome::Failed {
            subnet: "10.0.0.0/24".to_string(),
            error: "nmap not found".to_string(),
        };
        let payload = EventPayload::from_sweep(Uuid::nil(), &outcome, 12);
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"event_type\":\"SweepFailed\""));
    }

    #[test]
    fn completed_sweep_counts_devices() {
        let outcome = SweepOutcome::Completed {
            subnet: "10.0.0.0/24".to_string(),
            devices: vec![DeviceSummary {
                ip: Ipv4Addr::new(10, 0, 0, 1),
                hostname: None,
                status: HostStatus::Up,
                mac_address: None,
            }],
        };
        match EventPayload::from_sweep(Uuid::nil(), &outcome, 2500) {
            EventPayload::SweepCompleted { device_count, .. } => assert_eq!(device_count, 1),
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}
