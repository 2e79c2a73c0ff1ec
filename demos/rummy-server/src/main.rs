//! Standalone Rummy server with in-memory money and persistence.
//!
//! Connect a WebSocket client to `ws://localhost:8080`, handshake with
//! any numeric token, and send a `JoinRoom` action to be seated. Eight
//! demo accounts (tokens "1" through "8") start with 1000 in chips.

use std::sync::Arc;

use meldcore::prelude::*;
use meldcore::{InMemoryStore, InMemoryWallet};

/// Accepts any numeric token as a player ID. Development only.
struct TokenAuth;

impl Authenticator for TokenAuth {
    async fn authenticate(&self, token: &str) -> Result<PlayerId, SessionError> {
        let id: u64 = token
            .parse()
            .map_err(|_| SessionError::AuthFailed("token must be a number".into()))?;
        Ok(PlayerId(id))
    }
}

fn demo_wallet() -> Arc<InMemoryWallet> {
    Arc::new(InMemoryWallet::with_balances(
        (1..=8).map(|id| (PlayerId(id), 1000.0)),
    ))
}

#[tokio::main]
async fn main() -> Result<(), MeldError> {
    meldcore::init_tracing();

    let server = MeldServerBuilder::new()
        .bind("0.0.0.0:8080")
        .build(TokenAuth, demo_wallet(), Arc::new(InMemoryStore::new()))
        .await?;

    eprintln!("rummy server listening on 0.0.0.0:8080");
    server.run().await
}
