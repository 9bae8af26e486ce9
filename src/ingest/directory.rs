use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use super::buffer::SessionBuffer;
use crate::sensors::{Sample, SensorProfile, SensorType};

/// Unique identifier for users
pub type UserId = String;

/// Buffer shared by every session streaming the same (user, sensor)
pub type SharedBuffer = Arc<Mutex<SessionBuffer>>;

struct BufferSlot {
    buffer: SharedBuffer,
    sessions: usize,
    created_at: DateTime<Utc>,
}

/// Diagnostic view of one directory entry
#[derive(Debug, Clone, Serialize)]
pub struct BufferInfo {
    pub user_id: UserId,
    pub sensor: SensorType,
    pub len: usize,
    pub capacity: usize,
    pub sessions: usize,
    pub created_at: DateTime<Utc>,
}

/// Process-wide map from user to per-sensor buffers
#[derive(Clone, Default)]
pub struct SessionDirectory {
    users: Arc<RwLock<HashMap<UserId, HashMap<SensorType, BufferSlot>>>>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a session to the buffer for (user, sensor), creating it on first use
    pub fn attach(&self, user_id: &str, profile: &SensorProfile) -> BufferLease {
        let mut users = self.users.write();
        let slot = users
            .entry(user_id.to_string())
            .or_default()
            .entry(profile.sensor_type)
            .or_insert_with(|| BufferSlot {
                buffer: Arc::new(Mutex::new(SessionBuffer::new(profile.buffer_capacity))),
                sessions: 0,
                created_at: Utc::now(),
            });
        slot.sessions += 1;

        BufferLease {
            directory: self.clone(),
            user_id: user_id.to_string(),
            sensor: profile.sensor_type,
            buffer: slot.buffer.clone(),
        }
    }

    /// Drop one session's hold on (user, sensor).
    ///
    /// Only that sensor's slot is removed, and only once no session holds it.
    /// Sibling sensors of the same user are untouched.
    /// Returns the number of buffered samples discarded with the slot.
    fn detach(&self, user_id: &str, sensor: SensorType) -> usize {
        let mut users = self.users.write();
        let Some(sensors) = users.get_mut(user_id) else {
            return 0;
        };

        let mut discarded = 0;
        if let Some(slot) = sensors.get_mut(&sensor) {
            slot.sessions = slot.sessions.saturating_sub(1);
            if slot.sessions == 0 {
                discarded = slot.buffer.lock().len();
                if discarded > 0 {
                    warn!(
                        "[{}] Discarding {} unrelayed samples for user {}",
                        sensor, discarded, user_id
                    );
                }
                sensors.remove(&sensor);
            }
        }

        if sensors.is_empty() {
            users.remove(user_id);
        }
        discarded
    }

    /// Current contents of a buffer without mutating it
    pub fn snapshot(&self, user_id: &str, sensor: SensorType) -> Option<Vec<Sample>> {
        let users = self.users.read();
        let slot = users.get(user_id)?.get(&sensor)?;
        let samples = slot.buffer.lock().snapshot();
        Some(samples)
    }

    /// Check whether a (user, sensor) entry exists
    pub fn contains(&self, user_id: &str, sensor: SensorType) -> bool {
        self.users
            .read()
            .get(user_id)
            .is_some_and(|sensors| sensors.contains_key(&sensor))
    }

    /// Number of users with at least one live buffer
    pub fn user_count(&self) -> usize {
        self.users.read().len()
    }

    /// Number of attached sessions across all buffers
    pub fn session_count(&self) -> usize {
        self.users
            .read()
            .values()
            .flat_map(|sensors| sensors.values())
            .map(|slot| slot.sessions)
            .sum()
    }

    /// Diagnostic listing of every buffer
    pub fn list(&self) -> Vec<BufferInfo> {
        let users = self.users.read();
        let mut infos: Vec<BufferInfo> = users
            .iter()
            .flat_map(|(user_id, sensors)| {
                sensors.iter().map(move |(sensor, slot)| {
                    let buffer = slot.buffer.lock();
                    BufferInfo {
                        user_id: user_id.clone(),
                        sensor: *sensor,
                        len: buffer.len(),
                        capacity: buffer.capacity(),
                        sessions: slot.sessions,
                        created_at: slot.created_at,
                    }
                })
            })
            .collect();
        infos.sort_by(|a, b| (&a.user_id, a.sensor).cmp(&(&b.user_id, b.sensor)));
        infos
    }
}

/// A session's hold on its directory entry; released on drop
pub struct BufferLease {
    directory: SessionDirectory,
    user_id: UserId,
    sensor: SensorType,
    buffer: SharedBuffer,
}

impl BufferLease {
    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn sensor(&self) -> SensorType {
        self.sensor
    }
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        self.directory.detach(&self.user_id, self.sensor);
    }
}
