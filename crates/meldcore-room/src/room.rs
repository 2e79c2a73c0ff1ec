//! Room actor: an isolated Tokio task that owns one table.
//!
//! Each room runs in its own task and talks to the outside world
//! through an mpsc command channel, so the table needs no locks. The
//! actor supplies everything the table deliberately doesn't have: the
//! turn clock, the start countdown, the wallet, and write-through
//! persistence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant as TokioInstant};

use meldcore_cards::HandValidator;
use meldcore_clock::{ClockConfig, TurnClock, TurnPhase as ClockPhase};
use meldcore_protocol::{ClientEvent, PlayerId, Recipient, RoomId, ServerEvent, VariantConfig};

use crate::config::{TableConfig, TableStatus};
use crate::store::SnapshotStore;
use crate::table::{Settlement, Table};
use crate::wallet::WalletService;
use crate::{RoomError, WalletError};

/// Channel sender delivering server events to one player's connection.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// Persistence retry schedule before a table is frozen.
const SAVE_ATTEMPTS: u32 = 3;
const SAVE_BACKOFF: Duration = Duration::from_millis(100);

/// Commands sent to a room actor through its channel. Variants with a
/// `reply` half are request/response; the rest are fire-and-forget.
pub(crate) enum RoomCommand {
    /// Seat a player. Fails if the table is full, started, or the
    /// entry fee cannot be covered.
    Join {
        player_id: PlayerId,
        name: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Remove a player for good (as opposed to a connection drop).
    Leave { player_id: PlayerId, reply: oneshot::Sender<Result<(), RoomError>> },

    /// Deliver a game action from a player. Errors go back to the
    /// player as an in-band `Error` event rather than a reply.
    Action { player_id: PlayerId, event: ClientEvent },

    /// The player's connection dropped; their seat survives.
    Disconnect { player_id: PlayerId },

    /// Re-attach a connection to a surviving seat. On success the new
    /// sender receives a full private snapshot.
    Reconnect {
        player_id: PlayerId,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Request room metadata.
    Info { reply: oneshot::Sender<RoomInfo> },

    /// Shut down the room.
    Shutdown,
}

/// Room metadata, as seen by the manager. Never includes hands.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub status: TableStatus,
    pub variant: VariantConfig,
    pub player_count: usize,
    pub player_limit: usize,
}

impl RoomInfo {
    /// Whether a new player could take a seat right now.
    pub fn is_joinable(&self) -> bool {
        self.status.is_joinable() && self.player_count < self.player_limit
    }
}

/// Handle to a running room actor. Cheap to clone; the manager holds
/// one per room.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub async fn join(
        &self,
        player_id: PlayerId,
        name: String,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join { player_id, name, sender, reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx.await.map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Leave { player_id, reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx.await.map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Delivers a game action (fire-and-forget).
    pub async fn send_action(
        &self,
        player_id: PlayerId,
        event: ClientEvent,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Action { player_id, event })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    pub async fn disconnect(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Disconnect { player_id })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    pub async fn reconnect(
        &self,
        player_id: PlayerId,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Reconnect { player_id, sender, reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx.await.map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Info { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx.await.map_err(|_| RoomError::Unavailable(self.room_id))
    }

    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

/// The actor's state, alive for the duration of its Tokio task.
struct RoomActor<W: WalletService, S: SnapshotStore> {
    table: Table,
    validator: Arc<dyn HandValidator>,
    clock: TurnClock<PlayerId>,
    wallet: Arc<W>,
    store: Arc<S>,
    rng: StdRng,
    senders: HashMap<PlayerId, PlayerSender>,
    receiver: mpsc::Receiver<RoomCommand>,
    /// When the start countdown fires, if one is running.
    start_at: Option<TokioInstant>,
}

/// Sleeps until `at`, or forever when there is no deadline. Keeps the
/// actor's `select!` free of a dummy timer branch.
async fn maybe_sleep_until(at: Option<TokioInstant>) {
    match at {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl<W: WalletService, S: SnapshotStore> RoomActor<W, S> {
    async fn run(mut self) {
        let room_id = self.table.room_id();
        tracing::info!(%room_id, "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle_command(cmd).await {
                        break;
                    }
                }
                expiry = self.clock.expired() => {
                    self.handle_expiry(expiry.holder, expiry.phase).await;
                }
                () = maybe_sleep_until(self.start_at) => {
                    self.start_at = None;
                    self.handle_start().await;
                }
            }
        }

        tracing::info!(%room_id, "room actor stopped");
    }

    /// Processes one command. Returns `true` on shutdown.
    async fn handle_command(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join { player_id, name, sender, reply } => {
                let result = self.handle_join(player_id, name, sender).await;
                let _ = reply.send(result);
            }
            RoomCommand::Leave { player_id, reply } => {
                let result = self.handle_leave(player_id).await;
                let _ = reply.send(result);
            }
            RoomCommand::Action { player_id, event } => {
                self.handle_action(player_id, event).await;
            }
            RoomCommand::Disconnect { player_id } => {
                self.senders.remove(&player_id);
                if let Ok(events) = self.table.mark_disconnected(player_id) {
                    self.dispatch(events);
                    self.persist().await;
                }
            }
            RoomCommand::Reconnect { player_id, sender, reply } => {
                let result = self.handle_reconnect(player_id, sender).await;
                let _ = reply.send(result);
            }
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {
                tracing::info!(room_id = %self.table.room_id(), "room shutting down");
                return true;
            }
        }
        false
    }

    async fn handle_join(
        &mut self,
        player_id: PlayerId,
        name: String,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let events = self.table.add_player(player_id, name)?;

        // Pool and Deals tables charge the entry fee on sitting down.
        // A failed debit gives the seat straight back.
        let fee = self.table.config().variant.entry_fee();
        if fee > 0.0 {
            if let Err(err) = self.wallet.debit(player_id, fee).await {
                let rollback =
                    self.table.remove_player(player_id, self.validator.as_ref(), &mut self.rng);
                debug_assert!(rollback.is_ok());
                if self.table.status() == TableStatus::Waiting {
                    self.start_at = None;
                }
                return Err(match err {
                    WalletError::InsufficientBalance { .. } => {
                        RoomError::InsufficientBalance(player_id)
                    }
                    other => RoomError::Wallet(other),
                });
            }
        }

        self.senders.insert(player_id, sender);
        tracing::info!(
            room_id = %self.table.room_id(),
            %player_id,
            players = self.table.seats().len(),
            "player joined"
        );
        self.dispatch(events);

        if self.table.status() == TableStatus::Starting {
            let countdown = Duration::from_secs(self.table.config().countdown_secs.into());
            self.start_at = Some(TokioInstant::now() + countdown);
        }
        self.persist().await;
        Ok(())
    }

    async fn handle_leave(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        // Leaving before cards are dealt gets the entry fee back.
        let pre_game = !matches!(
            self.table.status(),
            TableStatus::InProgress | TableStatus::Finished
        );
        let events = self.table.remove_player(player_id, self.validator.as_ref(), &mut self.rng)?;
        self.senders.remove(&player_id);

        let fee = self.table.config().variant.entry_fee();
        if pre_game && fee > 0.0 {
            if let Err(err) = self.wallet.credit(player_id, fee).await {
                tracing::error!(
                    room_id = %self.table.room_id(),
                    %player_id,
                    %err,
                    "entry fee refund failed"
                );
            }
        }

        // A leaver aborts the start countdown.
        if self.table.status() == TableStatus::Waiting {
            self.start_at = None;
        }
        tracing::info!(room_id = %self.table.room_id(), %player_id, "player left");
        self.dispatch(events);
        self.after_mutation().await;
        Ok(())
    }

    async fn handle_action(&mut self, player_id: PlayerId, event: ClientEvent) {
        let result = match event {
            ClientEvent::DrawCard { side } => self.table.draw(player_id, side, &mut self.rng),
            ClientEvent::DiscardCard { card } => self.table.discard(player_id, card),
            ClientEvent::DeclareHand { discard } => {
                self.table.declare(player_id, discard, self.validator.as_ref(), &mut self.rng)
            }
            ClientEvent::DropGame => {
                self.table.drop_game(player_id, self.validator.as_ref(), &mut self.rng)
            }
            // Join and leave arrive as dedicated commands; in-game they
            // are out of place.
            ClientEvent::JoinRoom { .. } | ClientEvent::LeaveRoom => {
                Err(RoomError::InvalidState("already seated at a table".into()))
            }
        };

        match result {
            Ok(events) => {
                self.dispatch(events);
                self.after_mutation().await;
            }
            Err(err) => {
                tracing::debug!(
                    room_id = %self.table.room_id(),
                    %player_id,
                    %err,
                    "action rejected"
                );
                self.send_to(
                    player_id,
                    ServerEvent::Error { code: err.code(), message: err.to_string() },
                );
            }
        }
    }

    async fn handle_reconnect(
        &mut self,
        player_id: PlayerId,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let events = self.table.mark_reconnected(player_id)?;
        self.senders.insert(player_id, sender);
        let snapshot = self.table.snapshot_for(player_id)?;
        self.send_to(player_id, snapshot);
        self.dispatch(events);
        self.persist().await;
        tracing::info!(room_id = %self.table.room_id(), %player_id, "player reconnected");
        Ok(())
    }

    /// Start countdown elapsed: deal the first round.
    async fn handle_start(&mut self) {
        match self.table.begin_game(&mut self.rng) {
            Ok(events) => {
                self.dispatch(events);
                self.after_mutation().await;
            }
            Err(err) => {
                tracing::warn!(room_id = %self.table.room_id(), %err, "game start failed");
            }
        }
    }

    /// Turn clock fired. The initial deadline buys a warning and one
    /// extension; the extension's deadline forfeits the turn.
    async fn handle_expiry(&mut self, holder: PlayerId, phase: ClockPhase) {
        if self.table.current_turn() != Some(holder) {
            // The turn moved on while the expiry was in flight.
            return;
        }
        match phase {
            ClockPhase::Initial => {
                let seconds = self.clock.extra_secs() as u32;
                self.dispatch(vec![(
                    Recipient::All,
                    ServerEvent::TurnWarning { player: holder, seconds },
                )]);
                self.clock.extend(holder);
            }
            ClockPhase::Extra => {
                match self.table.timeout(holder, self.validator.as_ref(), &mut self.rng) {
                    Ok(events) => {
                        self.dispatch(events);
                        self.after_mutation().await;
                    }
                    Err(err) => {
                        tracing::warn!(
                            room_id = %self.table.room_id(),
                            %holder,
                            %err,
                            "turn timeout failed"
                        );
                    }
                }
            }
        }
    }

    /// Housekeeping after any table mutation: move money the round
    /// settled, re-point the clock at the current turn, persist, and
    /// archive the table once the game is over.
    async fn after_mutation(&mut self) {
        if let Some(settlement) = self.table.take_settlement() {
            self.apply_settlement(settlement).await;
        }
        self.sync_clock();
        self.persist().await;

        if self.table.status() == TableStatus::Finished {
            if let Err(err) = self.store.archive(&self.table).await {
                tracing::warn!(
                    room_id = %self.table.room_id(),
                    %err,
                    "failed to archive finished room"
                );
            }
        }
    }

    /// Moves the money a settled round owes. Failures are logged and
    /// skipped: entry fees were collected at join time, so a failed
    /// debit only under-collects from a loser, and a failed credit is
    /// re-payable from the logs.
    async fn apply_settlement(&mut self, settlement: Settlement) {
        let room_id = self.table.room_id();
        for (player, amount) in settlement.debits {
            if let Err(err) = self.wallet.debit(player, amount).await {
                tracing::error!(%room_id, %player, amount, %err, "settlement debit failed");
            }
        }
        for (player, amount) in settlement.credits {
            if let Err(err) = self.wallet.credit(player, amount).await {
                tracing::error!(%room_id, %player, amount, %err, "settlement credit failed");
            }
        }
    }

    /// Keeps the clock pointed at whoever holds the turn. Re-arming
    /// only on a holder change preserves a running extension.
    fn sync_clock(&mut self) {
        match self.table.current_turn() {
            Some(player) if self.table.status() == TableStatus::InProgress => {
                if self.clock.holder() != Some(player) {
                    self.clock.arm(player);
                }
            }
            _ => self.clock.cancel(),
        }
    }

    /// Writes the table through the snapshot store, retrying with
    /// backoff. A table that cannot be persisted freezes rather than
    /// keep playing a game that would vanish in a crash.
    async fn persist(&mut self) {
        let room_id = self.table.room_id();
        let mut backoff = SAVE_BACKOFF;
        for attempt in 1..=SAVE_ATTEMPTS {
            match self.store.save(&self.table).await {
                Ok(()) => return,
                Err(err) => {
                    tracing::warn!(%room_id, attempt, %err, "snapshot save failed");
                    if attempt < SAVE_ATTEMPTS {
                        time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        tracing::error!(%room_id, "snapshot save exhausted retries, freezing table");
        self.table.freeze();
        self.clock.cancel();
        self.start_at = None;
        let err = RoomError::Frozen(room_id);
        self.dispatch(vec![(
            Recipient::All,
            ServerEvent::Error { code: err.code(), message: err.to_string() },
        )]);
    }

    /// Fans table events out to their recipients.
    fn dispatch(&self, events: Vec<(Recipient, ServerEvent)>) {
        for (recipient, event) in events {
            match recipient {
                Recipient::All => {
                    for player in self.table.player_ids() {
                        self.send_to(player, event.clone());
                    }
                }
                Recipient::Player(player) => {
                    self.send_to(player, event);
                }
                Recipient::AllExcept(excluded) => {
                    for player in self.table.player_ids() {
                        if player != excluded {
                            self.send_to(player, event.clone());
                        }
                    }
                }
            }
        }
    }

    /// Sends to one player. Silently drops if their connection is gone;
    /// a reconnect replays the state from a snapshot instead.
    fn send_to(&self, player_id: PlayerId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&player_id) {
            let _ = sender.send(event);
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.table.room_id(),
            status: self.table.status(),
            variant: self.table.config().variant,
            player_count: self.table.seats().len(),
            player_limit: self.table.config().player_limit,
        }
    }
}

/// Spawns a room actor for a fresh table and returns its handle.
pub(crate) fn spawn_room<W: WalletService, S: SnapshotStore>(
    room_id: RoomId,
    config: TableConfig,
    validator: Arc<dyn HandValidator>,
    wallet: Arc<W>,
    store: Arc<S>,
    channel_size: usize,
) -> RoomHandle {
    spawn_table(Table::new(room_id, config), validator, wallet, store, channel_size)
}

/// Spawns a room actor around an existing table. Used on startup to
/// resume rooms recovered from the snapshot store.
pub(crate) fn spawn_table<W: WalletService, S: SnapshotStore>(
    table: Table,
    validator: Arc<dyn HandValidator>,
    wallet: Arc<W>,
    store: Arc<S>,
    channel_size: usize,
) -> RoomHandle {
    let room_id = table.room_id();
    let turn_secs = u64::from(table.config().turn_secs);
    let (tx, rx) = mpsc::channel(channel_size);

    let mut actor = RoomActor {
        table,
        validator,
        clock: TurnClock::new(ClockConfig { turn_secs, extra_secs: turn_secs }),
        wallet,
        store,
        rng: StdRng::from_os_rng(),
        senders: HashMap::new(),
        receiver: rx,
        start_at: None,
    };
    // A recovered mid-game table starts its current turn's clock over.
    actor.sync_clock();

    tokio::spawn(actor.run());

    RoomHandle { room_id, sender: tx }
}
