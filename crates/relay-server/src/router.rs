//! Per-message dispatch policy.

use std::sync::Arc;

use relay_core::messages::{DeviceCommand, RelayEvent};
use relay_core::{ConnectionId, DeviceId, RelayError, Role};
use relay_enrich::EnrichmentGateway;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::registry::ConnectionRegistry;

/// Result of one fan-out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: Vec<ConnectionId>,
}

/// What the router did with one inbound message.
#[derive(Clone, Debug, PartialEq)]
pub enum RouteOutcome {
    /// Device output fanned out to observers.
    Telemetry { enriched: bool, report: DeliveryReport },
    /// Observer message broadcast to every device.
    Broadcast(DeliveryReport),
    /// Observer command addressed to one device.
    Command(Result<DeviceCommand, RelayError>),
    /// Sender is not classified; the handshake path owns it.
    Unrouted,
}

/// Routes by sender role: devices → all observers, observers → all
/// devices or one addressed device.
pub struct RelayRouter {
    registry: Arc<ConnectionRegistry>,
    gateway: EnrichmentGateway,
}

impl RelayRouter {
    pub fn new(registry: Arc<ConnectionRegistry>, gateway: EnrichmentGateway) -> Self {
        Self { registry, gateway }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub async fn route(&self, sender: &Connection, role: &Role, text: &str) -> RouteOutcome {
        match role {
            Role::Device(device_id) => self.relay_device_message(device_id, text).await,
            Role::Observer => self.relay_observer_message(sender, text),
            Role::Unclassified => RouteOutcome::Unrouted,
        }
    }

    /// Structured (JSON object) telemetry is enriched and merged; anything
    /// else is forwarded verbatim, tagged with the device identity.
    pub async fn relay_device_message(&self, device_id: &DeviceId, text: &str) -> RouteOutcome {
        let (event, enriched) = match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(payload)) => {
                let enriched = self.gateway.is_enabled();
                let data = self.gateway.enrich(payload).await;
                (
                    RelayEvent::Telemetry {
                        device_id: device_id.clone(),
                        data,
                    },
                    enriched,
                )
            }
            _ => (
                RelayEvent::Sensor {
                    device_id: device_id.clone(),
                    message: text.to_owned(),
                },
                false,
            ),
        };

        let Some(json) = event.to_json() else {
            warn!(device_id = %device_id, "failed to serialize telemetry");
            return RouteOutcome::Telemetry {
                enriched,
                report: DeliveryReport::default(),
            };
        };
        let report = fan_out(&self.registry.observers(), &Arc::new(json));
        debug!(
            device_id = %device_id,
            enriched,
            recipients = report.attempted,
            failed = report.failed.len(),
            "telemetry relayed to observers"
        );
        RouteOutcome::Telemetry { enriched, report }
    }

    /// Addressed commands go to one device and the outcome is reported back
    /// to the sender; anything else is broadcast verbatim to all devices.
    pub fn relay_observer_message(&self, sender: &Connection, text: &str) -> RouteOutcome {
        let Some(parsed) = DeviceCommand::from_observer_message(text) else {
            let report = self.broadcast_to_devices(text);
            return RouteOutcome::Broadcast(report);
        };

        let outcome = parsed.and_then(|cmd| self.deliver_command(&cmd).map(|()| cmd));
        let reply = match &outcome {
            Ok(cmd) => RelayEvent::CommandAck {
                device_id: cmd.target.clone(),
                command: cmd.state.wire().to_owned(),
            },
            Err(e) => RelayEvent::error(e),
        };
        if let Err(e) = sender.send_event(&reply) {
            warn!(conn_id = %sender.id, error = %e, "failed to report command outcome");
        }
        RouteOutcome::Command(outcome)
    }

    pub fn broadcast_to_devices(&self, text: &str) -> DeliveryReport {
        let report = fan_out(&self.registry.devices(), &Arc::new(text.to_owned()));
        debug!(
            recipients = report.attempted,
            failed = report.failed.len(),
            "observer message broadcast to devices"
        );
        report
    }

    /// Deliver one command to its addressed device.
    pub fn deliver_command(&self, cmd: &DeviceCommand) -> Result<(), RelayError> {
        let Some(conn) = self.registry.lookup_device(&cmd.target) else {
            warn!(device_id = %cmd.target, "command for unknown device");
            return Err(RelayError::DeviceNotFound(cmd.target.clone()));
        };
        match conn.send_text(cmd.state.wire()) {
            Ok(()) => {
                info!(device_id = %cmd.target, command = cmd.state.wire(), "command sent");
                Ok(())
            }
            Err(e) => {
                warn!(device_id = %cmd.target, conn_id = %conn.id, error = %e, "command delivery failed");
                Err(RelayError::Undeliverable(cmd.target.clone()))
            }
        }
    }
}

/// Send to each recipient independently; one failure never stops the rest.
pub fn fan_out(recipients: &[Arc<Connection>], message: &Arc<String>) -> DeliveryReport {
    let mut report = DeliveryReport {
        attempted: recipients.len(),
        ..DeliveryReport::default()
    };
    for conn in recipients {
        match conn.send(Arc::clone(message)) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!(conn_id = %conn.id, error = %e, "delivery failed");
                report.failed.push(conn.id.clone());
            }
        }
    }
    report
}
