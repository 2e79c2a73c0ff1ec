//! Wallet abstraction for entry fees, penalties, and prizes.
//!
//! The room actor never touches account storage directly; it talks to
//! a [`WalletService`]. Production plugs in a payments backend; tests
//! and the bundled demo use [`InMemoryWallet`].

use std::collections::HashMap;
use std::sync::Mutex;

use meldcore_protocol::PlayerId;

/// Errors from wallet operations.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// A debit would take the balance below zero.
    #[error("player {player} balance {balance:.2} cannot cover {amount:.2}")]
    InsufficientBalance {
        player: PlayerId,
        balance: f64,
        amount: f64,
    },

    /// The player has no account.
    #[error("no wallet for player {0}")]
    UnknownPlayer(PlayerId),

    /// The backing service failed.
    #[error("wallet backend unavailable: {0}")]
    Unavailable(String),
}

/// Moves money in and out of player accounts.
///
/// All amounts are non-negative; direction is carried by the method.
/// Implementations must be atomic per call — a failed debit leaves the
/// balance untouched. The returned futures are `Send` because the room
/// actors awaiting them run on spawned tasks.
pub trait WalletService: Send + Sync + 'static {
    fn balance(
        &self,
        player: PlayerId,
    ) -> impl std::future::Future<Output = Result<f64, WalletError>> + Send;

    /// Withdraws `amount`. Fails with
    /// [`WalletError::InsufficientBalance`] rather than going negative.
    fn debit(
        &self,
        player: PlayerId,
        amount: f64,
    ) -> impl std::future::Future<Output = Result<(), WalletError>> + Send;

    /// Deposits `amount`, creating the account if needed.
    fn credit(
        &self,
        player: PlayerId,
        amount: f64,
    ) -> impl std::future::Future<Output = Result<(), WalletError>> + Send;
}

/// Mutex-backed wallet for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryWallet {
    balances: Mutex<HashMap<PlayerId, f64>>,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a wallet with starting balances.
    pub fn with_balances(entries: impl IntoIterator<Item = (PlayerId, f64)>) -> Self {
        Self { balances: Mutex::new(entries.into_iter().collect()) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PlayerId, f64>> {
        // Poisoning only happens if a panic occurred mid-update; the
        // map itself is always in a consistent state.
        self.balances.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WalletService for InMemoryWallet {
    async fn balance(&self, player: PlayerId) -> Result<f64, WalletError> {
        self.lock()
            .get(&player)
            .copied()
            .ok_or(WalletError::UnknownPlayer(player))
    }

    async fn debit(&self, player: PlayerId, amount: f64) -> Result<(), WalletError> {
        let mut balances = self.lock();
        let balance = balances
            .get_mut(&player)
            .ok_or(WalletError::UnknownPlayer(player))?;
        if *balance < amount {
            return Err(WalletError::InsufficientBalance {
                player,
                balance: *balance,
                amount,
            });
        }
        *balance -= amount;
        Ok(())
    }

    async fn credit(&self, player: PlayerId, amount: f64) -> Result<(), WalletError> {
        *self.lock().entry(player).or_insert(0.0) += amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_debit_reduces_balance() {
        let wallet = InMemoryWallet::with_balances([(PlayerId(1), 100.0)]);
        wallet.debit(PlayerId(1), 25.0).await.unwrap();
        assert_eq!(wallet.balance(PlayerId(1)).await.unwrap(), 75.0);
    }

    #[tokio::test]
    async fn test_debit_insufficient_leaves_balance_untouched() {
        let wallet = InMemoryWallet::with_balances([(PlayerId(1), 10.0)]);
        let err = wallet.debit(PlayerId(1), 25.0).await.unwrap_err();
        assert!(matches!(err, WalletError::InsufficientBalance { .. }));
        assert_eq!(wallet.balance(PlayerId(1)).await.unwrap(), 10.0);
    }

    #[tokio::test]
    async fn test_credit_creates_account() {
        let wallet = InMemoryWallet::new();
        wallet.credit(PlayerId(9), 18.0).await.unwrap();
        assert_eq!(wallet.balance(PlayerId(9)).await.unwrap(), 18.0);
    }

    #[tokio::test]
    async fn test_balance_unknown_player_errors() {
        let wallet = InMemoryWallet::new();
        let err = wallet.balance(PlayerId(2)).await.unwrap_err();
        assert!(matches!(err, WalletError::UnknownPlayer(_)));
    }
}
