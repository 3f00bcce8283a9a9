//! Reporting sinks for discovery events.
//!
//! Sending results to the backend is not wired up yet; a sink decides where
//! events go in the meantime.

use std::io::Write;
use std::sync::Mutex;

use iotagent_core::events::DiscoveryEvent;

/// Receives every event the orchestrator produces.
pub trait Reporter: Send + Sync {
    fn report(&self, event: &DiscoveryEvent);
}

/// Logs each event through `tracing`, payload serialized as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, event: &DiscoveryEvent) {
        match serde_json::to_string(&event.payload) {
            Ok(payload) => tracing::info!(
                event_id = %event.id.0,
                agent_id = %event.agent_id,
                payload = %payload,
                "Discovery event"
            ),
            Err(e) => tracing::warn!(event_id = %event.id.0, error = %e, "Failed to serialize event"),
        }
    }
}

/// Writes one JSON document per line to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLinesReporter;

impl Reporter for JsonLinesReporter {
    fn report(&self, event: &DiscoveryEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(event_id = %event.id.0, error = %e, "Failed to serialize event");
                return;
            }
        };

        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{line}") {
            tracing::warn!(error = %e, "Failed to write event to stdout");
        }
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<DiscoveryEvent>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiscoveryEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, event: &DiscoveryEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
