//! Client-server synchronization over a pluggable transport.
//!
//! The client predicts optimistically, but a confirmed server response
//! always replaces the prediction. A response body the client cannot
//! parse means the two sides disagree, and the only safe recovery is a
//! full state reload.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::api::{
    BuyItemResponse, BuyMachineResponse, BuyStorageResponse, BuyUpgradeResponse,
    ClaimOfflineResponse, EquipResponse, ErrorBody, LoginResponse, PrestigeResponse, Request,
    Response, SaveResponse, SaveSnapshot, StateResponse, UpgradeWeaponResponse,
};
use crate::catalog::{MachineType, UpgradeType};
use crate::error::{SyncError, TransportError};

/// Retries on top of the first attempt when a save fails transiently.
pub const MAX_SAVE_RETRIES: u32 = 2;

/// The wire seam. Tests plug the in-memory server straight in; a real
/// deployment would put HTTP behind this.
pub trait Transport {
    fn send(&mut self, token: Option<&str>, request: &Request)
        -> Result<Response, TransportError>;
}

/// Stateful client endpoint: holds the session token and tracks whether
/// a mutation's outcome is unknown.
pub struct SyncClient<T: Transport> {
    transport: T,
    token: Option<String>,
    /// A mutating request failed transiently, so the server may or may
    /// not have applied it. Saves are refused until a reload
    /// re-establishes authoritative state.
    needs_reload: bool,
}

impl<T: Transport> SyncClient<T> {
    pub fn new(transport: T) -> Self {
        SyncClient {
            transport,
            token: None,
            needs_reload: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn needs_reload(&self) -> bool {
        self.needs_reload
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn request<R: DeserializeOwned>(&mut self, request: &Request) -> Result<R, SyncError> {
        let response = self.transport.send(self.token.as_deref(), request)?;
        if !response.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&response.body)
                .map(|b| b.error)
                .unwrap_or_else(|_| response.body.clone());
            return Err(SyncError::Rejected {
                status: response.status,
                message,
            });
        }
        serde_json::from_str(&response.body).map_err(|e| {
            warn!(error = %e, "unparseable server response");
            SyncError::Desync(format!("unparseable server response: {}", e))
        })
    }

    /// Send a request that changes server state. A transient failure
    /// leaves the outcome unknown; so does a 200 whose body cannot be
    /// parsed, since the server already committed the change. Both
    /// poison further saves.
    fn mutate<R: DeserializeOwned>(&mut self, request: &Request) -> Result<R, SyncError> {
        match self.request(request) {
            Err(e) if e.is_transient() || matches!(e, SyncError::Desync(_)) => {
                warn!("mutation outcome unknown, reload required");
                self.needs_reload = true;
                Err(e)
            }
            other => other,
        }
    }

    pub fn login(&mut self, username: &str) -> Result<LoginResponse, SyncError> {
        let body: LoginResponse = self.request(&Request::Login {
            username: username.to_string(),
        })?;
        self.token = Some(body.token.clone());
        self.needs_reload = false;
        debug!(username, "logged in");
        Ok(body)
    }

    /// Fetch the authoritative state. Clears the reload flag on success.
    pub fn reload(&mut self) -> Result<StateResponse, SyncError> {
        let body: StateResponse = self.request(&Request::GetState)?;
        self.needs_reload = false;
        Ok(body)
    }

    /// Autosave. Retries transient failures up to `MAX_SAVE_RETRIES`
    /// times; refuses outright while a mutation outcome is unknown.
    pub fn save(&mut self, snapshot: SaveSnapshot) -> Result<SaveResponse, SyncError> {
        if self.needs_reload {
            return Err(SyncError::Desync(
                "save suppressed until state is reloaded".to_string(),
            ));
        }
        let request = Request::Save { snapshot };
        let mut attempts = 0;
        loop {
            match self.request(&request) {
                Err(e) if e.is_transient() && attempts < MAX_SAVE_RETRIES => {
                    attempts += 1;
                    warn!(attempts, error = %e, "save failed, retrying");
                }
                other => return other,
            }
        }
    }

    pub fn claim_offline(&mut self) -> Result<ClaimOfflineResponse, SyncError> {
        self.mutate(&Request::ClaimOffline)
    }

    pub fn buy_item(&mut self, item_id: u32, quantity: u32) -> Result<BuyItemResponse, SyncError> {
        self.mutate(&Request::BuyItem { item_id, quantity })
    }

    pub fn buy_machine(
        &mut self,
        ty: MachineType,
        levels: u32,
    ) -> Result<BuyMachineResponse, SyncError> {
        self.mutate(&Request::BuyMachine {
            machine_type: ty,
            levels,
        })
    }

    pub fn buy_upgrade(&mut self, ty: UpgradeType) -> Result<BuyUpgradeResponse, SyncError> {
        self.mutate(&Request::BuyUpgrade { upgrade_type: ty })
    }

    pub fn buy_storage(&mut self) -> Result<BuyStorageResponse, SyncError> {
        self.mutate(&Request::BuyStorage)
    }

    pub fn equip(&mut self, inventory_id: u64, unequip: bool) -> Result<EquipResponse, SyncError> {
        self.mutate(&Request::Equip {
            inventory_id,
            unequip,
        })
    }

    pub fn upgrade_weapon(&mut self, inventory_id: u64) -> Result<UpgradeWeaponResponse, SyncError> {
        self.mutate(&Request::UpgradeWeapon { inventory_id })
    }

    pub fn prestige(&mut self) -> Result<PrestigeResponse, SyncError> {
        self.mutate(&Request::Prestige)
    }
}
