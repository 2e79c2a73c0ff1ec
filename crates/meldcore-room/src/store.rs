//! Snapshot persistence for crash recovery.
//!
//! After every state-changing action the room actor writes its table
//! through a [`SnapshotStore`]. On startup the manager lists stored
//! rooms and respawns an actor for each, so an interrupted game
//! resumes where it left off.

use std::collections::HashMap;
use std::sync::Mutex;

use meldcore_protocol::RoomId;

use crate::table::Table;

/// Errors from snapshot persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The snapshot could not be serialized or parsed back.
    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The backing store failed.
    #[error("snapshot store unavailable: {0}")]
    Unavailable(String),
}

/// Write-through persistence for tables.
///
/// `save` must be atomic per room: a reader never observes a
/// half-written snapshot. The returned futures are `Send` because the
/// room actors awaiting them run on spawned tasks.
pub trait SnapshotStore: Send + Sync + 'static {
    fn save(
        &self,
        table: &Table,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    fn load(
        &self,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<Option<Table>, StoreError>> + Send;

    /// Removes a room's snapshot. Deleting a missing room is not an
    /// error.
    fn delete(
        &self,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Records a finished table for the books and removes it from the
    /// active set, so `list` stops returning it and a restart does not
    /// resurrect it.
    fn archive(
        &self,
        table: &Table,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// All rooms with an active (non-archived) snapshot.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<RoomId>, StoreError>> + Send;
}

/// Mutex-backed store for tests and single-process deployments.
/// Serializes through JSON so the snapshot path is exercised the same
/// way a real backend would.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    snapshots: Mutex<HashMap<RoomId, Vec<u8>>>,
    archived: Mutex<HashMap<RoomId, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rooms whose finished games were archived.
    pub fn archived_rooms(&self) -> Vec<RoomId> {
        self.archived
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RoomId, Vec<u8>>> {
        self.snapshots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SnapshotStore for InMemoryStore {
    async fn save(&self, table: &Table) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(table)?;
        self.lock().insert(table.room_id(), bytes);
        Ok(())
    }

    async fn load(&self, room_id: RoomId) -> Result<Option<Table>, StoreError> {
        match self.lock().get(&room_id) {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, room_id: RoomId) -> Result<(), StoreError> {
        self.lock().remove(&room_id);
        Ok(())
    }

    async fn archive(&self, table: &Table) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(table)?;
        self.lock().remove(&table.room_id());
        self.archived
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(table.room_id(), bytes);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<RoomId>, StoreError> {
        Ok(self.lock().keys().copied().collect())
    }
}
