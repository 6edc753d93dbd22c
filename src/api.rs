//! Wire payloads exchanged between the client and the server.
//!
//! Every body is JSON with camelCase keys. The client treats these as the
//! only view it gets of server state: confirmed values in a response
//! always replace whatever the client predicted.

use serde::{Deserialize, Serialize};

use crate::catalog::{MachineType, UpgradeType};
use crate::state::{InventoryEntry, Machine, PrestigeStats, Upgrade};

/// Routed requests. `Login` is the only one that needs no token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "payload", rename_all = "snake_case")]
pub enum Request {
    Login { username: String },
    GetState,
    Save { snapshot: SaveSnapshot },
    ClaimOffline,
    BuyItem { item_id: u32, quantity: u32 },
    BuyMachine { machine_type: MachineType, levels: u32 },
    BuyUpgrade { upgrade_type: UpgradeType },
    BuyStorage,
    Equip { inventory_id: u64, unequip: bool },
    UpgradeWeapon { inventory_id: u64 },
    Prestige,
}

/// Raw endpoint response: HTTP-style status plus a JSON body.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn ok<T: Serialize>(payload: &T) -> Response {
        Response {
            status: 200,
            // Serialization of our own DTOs does not fail.
            body: serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string()),
        }
    }

    pub fn error(status: u16, message: &str) -> Response {
        Response {
            status,
            body: serde_json::to_string(&ErrorBody {
                error: message.to_string(),
            })
            .unwrap_or_else(|_| "{}".to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// The client's floored view of its run, sent on every autosave.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSnapshot {
    pub stage: u32,
    pub scrap: u64,
    pub data: u64,
    pub core_fragments: u64,
    pub boss_hp: u64,
    pub boss_max_hp: u64,
    pub total_taps: u64,
    pub bosses_killed: u64,
    /// Lifetime counters. The server merges these monotonically; a stale
    /// save can never roll them back.
    pub prestige_stats: PrestigeStats,
}

/// The server's full authoritative snapshot, returned on login, state
/// fetch, and desync recovery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub stage: u32,
    pub highest_stage: u32,
    pub scrap: u64,
    pub data: u64,
    pub core_fragments: u64,
    pub total_taps: u64,
    pub bosses_killed: u64,
    pub storage_level: u32,
    pub equipped_weapon_id: Option<u32>,
    pub equipped_armor_id: Option<u32>,
    pub equipped_accessory_id: Option<u32>,
    pub boss_hp: u64,
    pub inventory: Vec<InventoryEntry>,
    pub machines: Vec<Machine>,
    pub upgrades: Vec<Upgrade>,
    pub prestige_stats: PrestigeStats,
    pub last_checkpoint_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub state: StateSnapshot,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    pub state: StateSnapshot,
    /// Present when machines produced anything while the player was away.
    pub offline: Option<OfflineEarningsBody>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineEarningsBody {
    pub scrap: u64,
    pub data: u64,
    pub boss_damage: u64,
    pub seconds_away: u64,
    pub credited_seconds: u64,
    pub was_capped: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub saved_at_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOfflineResponse {
    pub earnings: OfflineEarningsBody,
    pub new_scrap: u64,
    pub new_data: u64,
}

/// Confirmed result of a shop purchase. `new_*` are authoritative
/// balances after the transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyItemResponse {
    pub new_scrap: u64,
    pub new_data: u64,
    pub item: InventoryEntry,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyMachineResponse {
    pub machine_type: MachineType,
    pub new_level: u32,
    pub new_scrap: u64,
    pub new_data: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyUpgradeResponse {
    pub upgrade_type: UpgradeType,
    pub new_level: u32,
    pub new_scrap: u64,
    pub new_data: u64,
    pub new_core_fragments: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyStorageResponse {
    pub new_storage_level: u32,
    pub new_scrap: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipResponse {
    pub item: InventoryEntry,
    pub equipped_weapon_id: Option<u32>,
    pub equipped_armor_id: Option<u32>,
    pub equipped_accessory_id: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeWeaponResponse {
    pub new_scrap: u64,
    pub item: InventoryEntry,
    pub current_damage: u64,
    pub next_upgrade_cost: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrestigeResponse {
    pub core_fragments_earned: u64,
    pub total_core_fragments: u64,
    pub prestige_stats: PrestigeStats,
    /// Upgrades that survive the reset.
    pub permanent_upgrades: Vec<Upgrade>,
    pub highest_stage: u32,
}
