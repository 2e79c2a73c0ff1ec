//! Room manager: creates, tracks, and routes players to rooms.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use meldcore_cards::{HandValidator, MeldDetector};
use meldcore_protocol::{ClientEvent, JoinRequest, PlayerId, RoomId, VariantConfig};

use crate::config::{MAX_PLAYERS, MIN_PLAYERS, TableConfig};
use crate::room::{PlayerSender, RoomHandle, RoomInfo, spawn_room, spawn_table};
use crate::store::SnapshotStore;
use crate::wallet::WalletService;
use crate::RoomError;

/// Counter for generating unique room IDs. Recovery bumps it past any
/// recovered ID so fresh rooms never collide.
static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Manages all active rooms and tracks which player is in which room.
///
/// This is the entry point for room operations from higher layers
/// (session layer, server accept loop). The wallet, snapshot store,
/// and hand validator are shared by every room it spawns.
pub struct RoomManager<W: WalletService, S: SnapshotStore> {
    /// Active rooms, keyed by room ID.
    rooms: HashMap<RoomId, RoomHandle>,

    /// Maps each player to the room they're currently in.
    /// A player can be in at most ONE room at a time (key invariant).
    player_rooms: HashMap<PlayerId, RoomId>,

    wallet: Arc<W>,
    store: Arc<S>,
    validator: Arc<dyn HandValidator>,
}

impl<W: WalletService, S: SnapshotStore> RoomManager<W, S> {
    /// Creates a manager with the standard meld rules.
    pub fn new(wallet: Arc<W>, store: Arc<S>) -> Self {
        Self::with_validator(wallet, store, Arc::new(MeldDetector::new()))
    }

    /// Creates a manager with a custom hand validator.
    pub fn with_validator(
        wallet: Arc<W>,
        store: Arc<S>,
        validator: Arc<dyn HandValidator>,
    ) -> Self {
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            wallet,
            store,
            validator,
        }
    }

    /// Creates a new room and returns its ID.
    pub fn create_room(&mut self, config: TableConfig) -> RoomId {
        let room_id = RoomId(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed));
        let handle = spawn_room(
            room_id,
            config,
            Arc::clone(&self.validator),
            Arc::clone(&self.wallet),
            Arc::clone(&self.store),
            DEFAULT_CHANNEL_SIZE,
        );
        self.rooms.insert(room_id, handle);
        tracing::info!(%room_id, "room created");
        room_id
    }

    /// Respawns an actor for every table the snapshot store holds.
    /// Called once on startup; a game interrupted by a crash resumes
    /// at its current turn.
    pub async fn recover_all(&mut self) -> Result<usize, RoomError> {
        let mut recovered = 0;
        for room_id in self.store.list().await.map_err(RoomError::Store)? {
            let Some(table) = self.store.load(room_id).await.map_err(RoomError::Store)? else {
                continue;
            };
            for player in table.player_ids() {
                self.player_rooms.insert(player, room_id);
            }
            NEXT_ROOM_ID.fetch_max(room_id.0 + 1, Ordering::Relaxed);
            let handle = spawn_table(
                table,
                Arc::clone(&self.validator),
                Arc::clone(&self.wallet),
                Arc::clone(&self.store),
                DEFAULT_CHANNEL_SIZE,
            );
            self.rooms.insert(room_id, handle);
            recovered += 1;
            tracing::info!(%room_id, "room recovered from snapshot");
        }
        Ok(recovered)
    }

    /// Adds a player to a specific room.
    ///
    /// Enforces the "one room at a time" invariant.
    pub async fn join_room(
        &mut self,
        player_id: PlayerId,
        room_id: RoomId,
        name: String,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        if let Some(current) = self.player_rooms.get(&player_id) {
            return Err(RoomError::AlreadyInRoom(player_id, *current));
        }

        let handle = self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
        handle.join(player_id, name, sender).await?;
        self.player_rooms.insert(player_id, room_id);
        Ok(())
    }

    /// Finds a table matching the request or opens a new one, then
    /// seats the player.
    ///
    /// Matchmaking is deliberately simple: the first joinable room
    /// playing the same variant with the same seat count wins. If a
    /// race fills a room between `info` and `join`, the search keeps
    /// going.
    pub async fn join_or_create(
        &mut self,
        player_id: PlayerId,
        request: JoinRequest,
        sender: PlayerSender,
    ) -> Result<RoomId, RoomError> {
        if let Some(current) = self.player_rooms.get(&player_id) {
            return Err(RoomError::AlreadyInRoom(player_id, *current));
        }
        validate_request(&request)?;

        let config = TableConfig::new(request.variant, request.player_limit).validated();
        for handle in self.rooms.values() {
            let Ok(info) = handle.info().await else { continue };
            if !info.is_joinable()
                || info.variant != config.variant
                || info.player_limit != config.player_limit
            {
                continue;
            }
            if handle
                .join(player_id, request.name.clone(), sender.clone())
                .await
                .is_ok()
            {
                self.player_rooms.insert(player_id, info.room_id);
                return Ok(info.room_id);
            }
        }

        // No matching room — open one.
        let room_id = self.create_room(config);
        let handle = self.rooms.get(&room_id).expect("just created this room");
        handle.join(player_id, request.name, sender).await?;
        self.player_rooms.insert(player_id, room_id);
        Ok(room_id)
    }

    /// Removes a player from their current room. The last player out
    /// of a room that never started closes it.
    pub async fn leave_room(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        let room_id = self
            .player_rooms
            .get(&player_id)
            .copied()
            .ok_or(RoomError::NotInAnyRoom(player_id))?;

        if let Some(handle) = self.rooms.get(&room_id) {
            handle.leave(player_id).await?;
            if let Ok(info) = handle.info().await {
                if info.player_count == 0 {
                    let _ = self.destroy_room(room_id).await;
                }
            }
        }
        self.player_rooms.remove(&player_id);
        Ok(())
    }

    /// Routes a game action from a player to their current room.
    pub async fn route_action(
        &self,
        player_id: PlayerId,
        event: ClientEvent,
    ) -> Result<(), RoomError> {
        let room_id = self
            .player_rooms
            .get(&player_id)
            .ok_or(RoomError::NotInAnyRoom(player_id))?;
        let handle = self.rooms.get(room_id).ok_or(RoomError::NotFound(*room_id))?;
        handle.send_action(player_id, event).await
    }

    /// Marks a player's connection as dropped. Their seat survives for
    /// a reconnect; the room is told so it can show the empty chair.
    pub async fn disconnect(&self, player_id: PlayerId) -> Result<(), RoomError> {
        let room_id = self
            .player_rooms
            .get(&player_id)
            .ok_or(RoomError::NotInAnyRoom(player_id))?;
        let handle = self.rooms.get(room_id).ok_or(RoomError::NotFound(*room_id))?;
        handle.disconnect(player_id).await
    }

    /// Re-attaches a returning player's connection to their seat and
    /// replays a private snapshot through `sender`.
    pub async fn reconnect(
        &self,
        player_id: PlayerId,
        sender: PlayerSender,
    ) -> Result<RoomId, RoomError> {
        let room_id = self
            .player_rooms
            .get(&player_id)
            .copied()
            .ok_or(RoomError::NotInAnyRoom(player_id))?;
        let handle = self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
        handle.reconnect(player_id, sender).await?;
        Ok(room_id)
    }

    /// Returns info about a specific room.
    pub async fn room_info(&self, room_id: RoomId) -> Result<RoomInfo, RoomError> {
        let handle = self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
        handle.info().await
    }

    /// Lists all rooms that are currently joinable.
    ///
    /// Queries each room actor for its current info. Rooms that fail
    /// to respond (e.g., shutting down) are silently skipped.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut infos = Vec::with_capacity(self.rooms.len());
        for handle in self.rooms.values() {
            if let Ok(info) = handle.info().await {
                if info.is_joinable() {
                    infos.push(info);
                }
            }
        }
        infos
    }

    /// Shuts down a room, removes all its players from the index, and
    /// drops its active snapshot so a restart does not revive it.
    pub async fn destroy_room(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let handle = self.rooms.remove(&room_id).ok_or(RoomError::NotFound(room_id))?;
        let _ = handle.shutdown().await;
        self.player_rooms.retain(|_, rid| *rid != room_id);
        if let Err(err) = self.store.delete(room_id).await {
            tracing::warn!(%room_id, %err, "failed to delete destroyed room snapshot");
        }
        tracing::info!(%room_id, "room destroyed");
        Ok(())
    }

    /// Tears down rooms whose game has finished. Returns how many were
    /// removed. Meant to be called periodically by the server.
    pub async fn sweep_finished(&mut self) -> usize {
        let mut finished = Vec::new();
        for (room_id, handle) in &self.rooms {
            match handle.info().await {
                Ok(info) if info.status == crate::config::TableStatus::Finished => {
                    finished.push(*room_id);
                }
                Ok(_) => {}
                // An unresponsive actor is gone; sweep it too.
                Err(_) => finished.push(*room_id),
            }
        }
        for room_id in &finished {
            let _ = self.destroy_room(*room_id).await;
        }
        finished.len()
    }

    /// Returns the room ID a player is currently in, if any.
    pub fn player_room(&self, player_id: &PlayerId) -> Option<RoomId> {
        self.player_rooms.get(player_id).copied()
    }

    /// Returns the number of active rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Lists all active room IDs.
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.keys().copied().collect()
    }
}

/// Rejects out-of-range join parameters before any room is created.
fn validate_request(request: &JoinRequest) -> Result<(), RoomError> {
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&request.player_limit) {
        return Err(RoomError::InvalidRequest(format!(
            "player limit {} is outside {MIN_PLAYERS}..={MAX_PLAYERS}",
            request.player_limit,
        )));
    }
    let stake_ok = match request.variant {
        VariantConfig::Points { per_point_value } => per_point_value > 0.0,
        VariantConfig::Pool { entry_fee, .. } => entry_fee > 0.0,
        VariantConfig::Deals { rounds, entry_fee } => rounds > 0 && entry_fee > 0.0,
    };
    if !stake_ok {
        return Err(RoomError::InvalidRequest("stakes must be positive".into()));
    }
    Ok(())
}
