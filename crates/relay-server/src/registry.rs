//! Process-wide set of live connections, partitioned by role.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use relay_core::{ConnectionId, DeviceId, Role};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::connection::Connection;

#[derive(Default)]
struct Slots {
    /// Accepted but not yet classified.
    pending: HashMap<ConnectionId, Arc<Connection>>,
    devices: HashMap<DeviceId, Arc<Connection>>,
    /// Reverse index so unregister never evicts a newer holder of the identity.
    device_of: HashMap<ConnectionId, DeviceId>,
    observers: HashMap<ConnectionId, Arc<Connection>>,
}

impl Slots {
    /// Remove `id` from whichever map holds it.
    fn detach(&mut self, id: &ConnectionId) -> Option<Role> {
        if self.pending.remove(id).is_some() {
            return Some(Role::Unclassified);
        }
        if self.observers.remove(id).is_some() {
            return Some(Role::Observer);
        }
        let device_id = self.device_of.remove(id)?;
        let _ = self.devices.remove(&device_id);
        Some(Role::Device(device_id))
    }
}

/// All reads and writes go through one lock, so a connection is never
/// visible in two role maps at once. Snapshots are copied out before any
/// sends happen.
pub struct ConnectionRegistry {
    slots: RwLock<Slots>,
    next_seq: AtomicU64,
    identity_prefix: String,
    max_send_queue: usize,
}

impl ConnectionRegistry {
    pub fn new(identity_prefix: impl Into<String>, max_send_queue: usize) -> Self {
        Self {
            slots: RwLock::new(Slots::default()),
            next_seq: AtomicU64::new(1),
            identity_prefix: identity_prefix.into(),
            max_send_queue,
        }
    }

    /// Create a connection handle and track it as pending.
    pub fn connect(&self) -> (Arc<Connection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let conn = Arc::new(Connection::new(ConnectionId::new(), tx));
        let _ = self
            .slots
            .write()
            .pending
            .insert(conn.id.clone(), Arc::clone(&conn));
        (conn, rx)
    }

    /// Next `<prefix><n>` not held by a live device. Sequence numbers are
    /// never reused, and ones whose name a device announced for itself are
    /// skipped.
    fn fresh_identity(&self, slots: &Slots) -> DeviceId {
        loop {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            let candidate = DeviceId::assigned(&self.identity_prefix, seq);
            if !slots.devices.contains_key(&candidate) {
                return candidate;
            }
            debug!(device_id = %candidate, "assigned identity already taken, skipping");
        }
    }

    /// Place `conn` under `role`.
    ///
    /// A device identity that is already held is taken over; the previous
    /// holder is returned but not closed. Closed connections are not
    /// registered.
    pub fn register(&self, conn: &Arc<Connection>, role: Role) -> Option<Arc<Connection>> {
        let mut slots = self.slots.write();
        Self::register_locked(&mut slots, conn, role)
    }

    fn register_locked(
        slots: &mut Slots,
        conn: &Arc<Connection>,
        role: Role,
    ) -> Option<Arc<Connection>> {
        let _ = slots.detach(&conn.id);
        if conn.is_closed() {
            return None;
        }
        match role {
            Role::Unclassified => {
                let _ = slots.pending.insert(conn.id.clone(), Arc::clone(conn));
                None
            }
            Role::Observer => {
                let _ = slots.observers.insert(conn.id.clone(), Arc::clone(conn));
                debug!(conn_id = %conn.id, "observer registered");
                None
            }
            Role::Device(device_id) => {
                let displaced = slots.devices.insert(device_id.clone(), Arc::clone(conn));
                if let Some(old) = &displaced {
                    let _ = slots.device_of.remove(&old.id);
                    info!(
                        device_id = %device_id,
                        old_conn = %old.id,
                        new_conn = %conn.id,
                        "device identity taken over by new connection"
                    );
                }
                let _ = slots.device_of.insert(conn.id.clone(), device_id.clone());
                debug!(conn_id = %conn.id, device_id = %device_id, "device registered");
                displaced
            }
        }
    }

    /// Assign a fresh identity and register as a device, atomically.
    pub fn register_anonymous_device(&self, conn: &Arc<Connection>) -> DeviceId {
        let mut slots = self.slots.write();
        let device_id = self.fresh_identity(&slots);
        let _ = Self::register_locked(&mut slots, conn, Role::Device(device_id.clone()));
        device_id
    }

    /// Remove a connection from whichever map holds it. Absent is a no-op.
    pub fn unregister(&self, id: &ConnectionId) -> Option<Role> {
        self.slots.write().detach(id)
    }

    pub fn lookup_device(&self, device_id: &DeviceId) -> Option<Arc<Connection>> {
        self.slots.read().devices.get(device_id).cloned()
    }

    /// Snapshot of current observers.
    pub fn observers(&self) -> Vec<Arc<Connection>> {
        self.slots.read().observers.values().cloned().collect()
    }

    /// Snapshot of current device connections.
    pub fn devices(&self) -> Vec<Arc<Connection>> {
        self.slots.read().devices.values().cloned().collect()
    }

    /// Registered identities, sorted.
    pub fn device_ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.slots.read().devices.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Current role of a connection, `None` once unregistered.
    pub fn role_of(&self, id: &ConnectionId) -> Option<Role> {
        let slots = self.slots.read();
        if slots.pending.contains_key(id) {
            Some(Role::Unclassified)
        } else if slots.observers.contains_key(id) {
            Some(Role::Observer)
        } else {
            slots.device_of.get(id).cloned().map(Role::Device)
        }
    }

    pub fn device_count(&self) -> usize {
        self.slots.read().devices.len()
    }

    pub fn observer_count(&self) -> usize {
        self.slots.read().observers.len()
    }

    pub fn pending_count(&self) -> usize {
        self.slots.read().pending.len()
    }

    /// Connections with no inbound activity for at least `timeout`.
    pub fn idle_connections(&self, timeout: Duration) -> Vec<Arc<Connection>> {
        let slots = self.slots.read();
        slots
            .pending
            .values()
            .chain(slots.devices.values())
            .chain(slots.observers.values())
            .filter(|c| c.idle_for() >= timeout)
            .cloned()
            .collect()
    }
}
