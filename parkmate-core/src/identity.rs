use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::info;

use crate::storage::KeyValueStore;
use crate::CoreResult;

pub const CLIENT_ID_KEY: &str = "parkmate_client_id";
const TOKEN_LEN: usize = 9;

/// Resolves the per-installation client identifier.
///
/// The identifier only tells "my" bookings apart from everybody else's. It is
/// not a credential and is never validated.
#[derive(Clone)]
pub struct ClientIdentityResolver {
    store: Arc<dyn KeyValueStore>,
}

impl ClientIdentityResolver {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Return the persisted identifier, minting and storing one on first use
    pub async fn get_or_create(&self) -> CoreResult<String> {
        if let Some(existing) = self.store.get(CLIENT_ID_KEY).await? {
            if !existing.trim().is_empty() {
                return Ok(existing);
            }
        }

        let client_id = generate_client_id();
        self.store.set(CLIENT_ID_KEY, &client_id).await?;
        info!("Minted client identifier {}", client_id);
        Ok(client_id)
    }
}

fn generate_client_id() -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("client_{}", token)
}
