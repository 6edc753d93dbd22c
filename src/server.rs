//! Authoritative in-memory backend.
//!
//! Every handler is one read-check-write transaction over `&mut self`:
//! either the whole mutation applies or none of it does. Currencies are
//! stored as integers at rest; the client's fractional accumulation is
//! floored at the save boundary.
//!
//! Time is injected (`advance`) so tests control offline windows exactly.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::api::{
    BuyItemResponse, BuyMachineResponse, BuyStorageResponse, BuyUpgradeResponse,
    ClaimOfflineResponse, EquipResponse, LoginResponse, OfflineEarningsBody, PrestigeResponse,
    Request, Response, SaveResponse, SaveSnapshot, StateResponse, StateSnapshot,
    UpgradeWeaponResponse,
};
use crate::catalog::{
    item_by_id, Currency, ItemKind, MachineType, UpgradeType, MIN_PRESTIGE_STAGE,
    OFFLINE_CAP_COSTS,
};
use crate::error::ApiError;
use crate::formulas;
use crate::state::{InventoryEntry, Machine, PrestigeStats, Upgrade};

const MAX_USERNAME_LEN: usize = 32;

/// One player's at-rest state.
#[derive(Clone, Debug)]
struct Account {
    username: String,
    stage: u32,
    highest_stage: u32,
    scrap: u64,
    data: u64,
    core_fragments: u64,
    total_taps: u64,
    bosses_killed: u64,
    storage_level: u32,
    equipped_weapon_id: Option<u32>,
    equipped_armor_id: Option<u32>,
    equipped_accessory_id: Option<u32>,
    boss_hp: u64,
    inventory: Vec<InventoryEntry>,
    machines: Vec<Machine>,
    upgrades: Vec<Upgrade>,
    prestige_stats: PrestigeStats,
    /// Single canonical timestamp for offline accrual: advanced by every
    /// successful save and by offline collection.
    last_checkpoint_ms: u64,
}

impl Account {
    fn new(username: &str, now_ms: u64) -> Self {
        Account {
            username: username.to_string(),
            stage: 1,
            highest_stage: 1,
            scrap: 0,
            data: 0,
            core_fragments: 0,
            total_taps: 0,
            bosses_killed: 0,
            storage_level: 1,
            equipped_weapon_id: None,
            equipped_armor_id: None,
            equipped_accessory_id: None,
            boss_hp: formulas::boss_hp(1),
            inventory: Vec::new(),
            machines: Vec::new(),
            upgrades: Vec::new(),
            prestige_stats: PrestigeStats::default(),
            last_checkpoint_ms: now_ms,
        }
    }

    fn upgrade_level(&self, ty: UpgradeType) -> u32 {
        self.upgrades
            .iter()
            .find(|u| u.upgrade_type == ty)
            .map(|u| u.level)
            .unwrap_or(0)
    }

    fn machine_level(&self, ty: MachineType) -> u32 {
        self.machines
            .iter()
            .find(|m| m.machine_type == ty)
            .map(|m| m.level)
            .unwrap_or(0)
    }

    fn balance(&self, currency: Currency) -> u64 {
        match currency {
            Currency::Scrap => self.scrap,
            Currency::Data => self.data,
            Currency::CoreFragments => self.core_fragments,
        }
    }

    /// Check-and-deduct in one step so a failed check cannot leave a
    /// partial write behind.
    fn charge(&mut self, currency: Currency, amount: u64) -> Result<(), ApiError> {
        let available = self.balance(currency);
        if available < amount {
            return Err(ApiError::InsufficientResources {
                currency: currency.name(),
                needed: amount,
                available,
            });
        }
        match currency {
            Currency::Scrap => self.scrap -= amount,
            Currency::Data => self.data -= amount,
            Currency::CoreFragments => self.core_fragments -= amount,
        }
        Ok(())
    }

    fn idle_production(&self) -> formulas::IdleProduction {
        let levels: Vec<(MachineType, u32)> = self
            .machines
            .iter()
            .map(|m| (m.machine_type, m.level))
            .collect();
        formulas::total_idle_production(
            &levels,
            self.upgrade_level(UpgradeType::IdlePower),
            self.upgrade_level(UpgradeType::PermIdleEfficiency),
        )
    }

    fn offline_earnings(&self, now_ms: u64) -> formulas::OfflineEarnings {
        let seconds_away = now_ms.saturating_sub(self.last_checkpoint_ms) / 1000;
        let cap = formulas::offline_cap_secs(
            self.storage_level,
            self.upgrade_level(UpgradeType::PermStorageBoost),
        );
        formulas::offline_earnings(seconds_away, &self.idle_production(), cap)
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            stage: self.stage,
            highest_stage: self.highest_stage,
            scrap: self.scrap,
            data: self.data,
            core_fragments: self.core_fragments,
            total_taps: self.total_taps,
            bosses_killed: self.bosses_killed,
            storage_level: self.storage_level,
            equipped_weapon_id: self.equipped_weapon_id,
            equipped_armor_id: self.equipped_armor_id,
            equipped_accessory_id: self.equipped_accessory_id,
            boss_hp: self.boss_hp,
            inventory: self.inventory.clone(),
            machines: self.machines.clone(),
            upgrades: self.upgrades.clone(),
            prestige_stats: self.prestige_stats,
            last_checkpoint_ms: self.last_checkpoint_ms,
        }
    }
}

/// The whole backend behind the transport seam.
pub struct InMemoryServer {
    accounts: HashMap<String, Account>,
    /// token -> account key
    tokens: HashMap<String, String>,
    next_token: u64,
    next_inventory_id: u64,
    now_ms: u64,
    /// Remaining requests to fail with a 500, for transient-failure tests.
    fail_next: u32,
}

impl InMemoryServer {
    pub fn new() -> Self {
        InMemoryServer {
            accounts: HashMap::new(),
            tokens: HashMap::new(),
            next_token: 1,
            next_inventory_id: 1,
            now_ms: 0,
            fail_next: 0,
        }
    }

    /// Move the server clock forward.
    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Make the next `n` requests fail with a 500.
    pub fn fail_next_requests(&mut self, n: u32) {
        self.fail_next = n;
    }

    /// Route a request. Everything except `Login` requires a valid token.
    pub fn handle(&mut self, token: Option<&str>, request: &Request) -> Response {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            warn!(remaining = self.fail_next, "injected transient failure");
            return Response::error(500, "internal server error");
        }

        let result = match request {
            Request::Login { username } => self.login(username),
            _ => {
                let key = match self.authenticate(token) {
                    Ok(key) => key,
                    Err(e) => return Response::error(e.status(), &e.to_string()),
                };
                match request {
                    Request::Login { .. } => unreachable!(),
                    Request::GetState => self.get_state(&key),
                    Request::Save { snapshot } => self.save(&key, snapshot),
                    Request::ClaimOffline => self.claim_offline(&key),
                    Request::BuyItem { item_id, quantity } => {
                        self.buy_item(&key, *item_id, *quantity)
                    }
                    Request::BuyMachine {
                        machine_type,
                        levels,
                    } => self.buy_machine(&key, *machine_type, *levels),
                    Request::BuyUpgrade { upgrade_type } => {
                        self.buy_upgrade(&key, *upgrade_type)
                    }
                    Request::BuyStorage => self.buy_storage(&key),
                    Request::Equip {
                        inventory_id,
                        unequip,
                    } => self.equip(&key, *inventory_id, *unequip),
                    Request::UpgradeWeapon { inventory_id } => {
                        self.upgrade_weapon(&key, *inventory_id)
                    }
                    Request::Prestige => self.prestige(&key),
                }
            }
        };
        result.unwrap_or_else(|e| Response::error(e.status(), &e.to_string()))
    }

    fn authenticate(&self, token: Option<&str>) -> Result<String, ApiError> {
        token
            .and_then(|t| self.tokens.get(t))
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }

    fn account_mut(&mut self, key: &str) -> &mut Account {
        // Keys come from the token table, which only holds live accounts.
        self.accounts.get_mut(key).expect("account for valid token")
    }

    fn login(&mut self, username: &str) -> Result<Response, ApiError> {
        if username.is_empty() || username.len() > MAX_USERNAME_LEN {
            return Err(ApiError::Validation("invalid username".to_string()));
        }
        let now = self.now_ms;
        let account = self
            .accounts
            .entry(username.to_string())
            .or_insert_with(|| Account::new(username, now));
        let snapshot = account.snapshot();

        let token = format!("tok-{}", self.next_token);
        self.next_token += 1;
        self.tokens.insert(token.clone(), username.to_string());
        info!(username, "login");

        Ok(Response::ok(&LoginResponse {
            token,
            state: snapshot,
        }))
    }

    fn get_state(&mut self, key: &str) -> Result<Response, ApiError> {
        let now = self.now_ms;
        let account = self.account_mut(key);
        let earnings = account.offline_earnings(now);
        let offline = if earnings.scrap > 0 || earnings.data > 0 || earnings.boss_damage > 0 {
            Some(offline_body(&earnings))
        } else {
            None
        };
        Ok(Response::ok(&StateResponse {
            state: account.snapshot(),
            offline,
        }))
    }

    fn save(&mut self, key: &str, snapshot: &SaveSnapshot) -> Result<Response, ApiError> {
        validate_save(snapshot)?;
        let now = self.now_ms;
        let account = self.account_mut(key);

        account.stage = snapshot.stage;
        account.highest_stage = account.highest_stage.max(snapshot.stage);
        account.scrap = snapshot.scrap;
        account.data = snapshot.data;
        account.core_fragments = snapshot.core_fragments;
        account.boss_hp = snapshot.boss_hp;
        account.total_taps = account.total_taps.max(snapshot.total_taps);
        account.bosses_killed = account.bosses_killed.max(snapshot.bosses_killed);
        merge_stats(&mut account.prestige_stats, &snapshot.prestige_stats);
        account.last_checkpoint_ms = now;

        debug!(username = %account.username, stage = snapshot.stage, "save");
        Ok(Response::ok(&SaveResponse { saved_at_ms: now }))
    }

    fn claim_offline(&mut self, key: &str) -> Result<Response, ApiError> {
        let now = self.now_ms;
        let account = self.account_mut(key);
        let earnings = account.offline_earnings(now);

        account.scrap += earnings.scrap;
        account.data += earnings.data;
        account.boss_hp = account.boss_hp.saturating_sub(earnings.boss_damage);
        account.prestige_stats.lifetime_scrap += earnings.scrap;
        account.prestige_stats.lifetime_data += earnings.data;
        account.last_checkpoint_ms = now;

        debug!(
            username = %account.username,
            scrap = earnings.scrap,
            data = earnings.data,
            "offline claim"
        );
        Ok(Response::ok(&ClaimOfflineResponse {
            earnings: offline_body(&earnings),
            new_scrap: account.scrap,
            new_data: account.data,
        }))
    }

    fn buy_item(&mut self, key: &str, item_id: u32, quantity: u32) -> Result<Response, ApiError> {
        let def = item_by_id(item_id)
            .ok_or_else(|| ApiError::NotFound(format!("item {}", item_id)))?;
        if quantity == 0 {
            return Err(ApiError::Validation("quantity must be at least 1".to_string()));
        }
        if quantity > 1 && def.kind != ItemKind::Consumable {
            return Err(ApiError::Validation(format!(
                "only one {} can be owned",
                def.name
            )));
        }
        let account = self.account_mut(key);

        if def.unlock_stage > account.highest_stage {
            return Err(ApiError::Validation(format!(
                "{} unlocks at stage {}",
                def.name, def.unlock_stage
            )));
        }
        let already_owned = account.inventory.iter().any(|e| e.item_id == item_id);
        if already_owned && def.kind != ItemKind::Consumable {
            return Err(ApiError::Validation(format!("{} already owned", def.name)));
        }

        let (currency, unit_cost) = def.cost();
        account.charge(currency, unit_cost * quantity as u64)?;

        let entry = if already_owned {
            let entry = account
                .inventory
                .iter_mut()
                .find(|e| e.item_id == item_id)
                .expect("checked above");
            entry.quantity += quantity;
            entry.clone()
        } else {
            let entry = InventoryEntry {
                inventory_id: self.next_inventory_id,
                item_id,
                quantity,
                upgrade_level: 0,
                is_equipped: false,
            };
            self.next_inventory_id += 1;
            let account = self.account_mut(key);
            account.inventory.push(entry.clone());
            entry
        };

        let account = self.account_mut(key);
        debug!(username = %account.username, item = def.name, "item purchase");
        Ok(Response::ok(&BuyItemResponse {
            new_scrap: account.scrap,
            new_data: account.data,
            item: entry,
        }))
    }

    fn buy_machine(&mut self, key: &str, ty: MachineType, levels: u32) -> Result<Response, ApiError> {
        if levels == 0 {
            return Err(ApiError::Validation("levels must be at least 1".to_string()));
        }
        let account = self.account_mut(key);
        if ty.unlock_stage() > account.highest_stage {
            return Err(ApiError::Validation(format!(
                "{} unlocks at stage {}",
                ty.name(),
                ty.unlock_stage()
            )));
        }
        let level = account.machine_level(ty);
        let cost: u64 = (level..level + levels)
            .map(|l| formulas::machine_cost(ty, l))
            .sum();
        account.charge(ty.cost_currency(), cost)?;

        if let Some(machine) = account.machines.iter_mut().find(|m| m.machine_type == ty) {
            machine.level += levels;
        } else {
            account.machines.push(Machine {
                machine_type: ty,
                level: levels,
            });
        }
        debug!(username = %account.username, machine = ty.name(), level = level + levels, "machine purchase");
        Ok(Response::ok(&BuyMachineResponse {
            machine_type: ty,
            new_level: level + levels,
            new_scrap: account.scrap,
            new_data: account.data,
        }))
    }

    fn buy_upgrade(&mut self, key: &str, ty: UpgradeType) -> Result<Response, ApiError> {
        let account = self.account_mut(key);
        let level = account.upgrade_level(ty);
        if let Some(max) = ty.max_level() {
            if level >= max {
                return Err(ApiError::Validation(format!(
                    "{} is already at max level",
                    ty.name()
                )));
            }
        }
        let cost = formulas::upgrade_cost(ty, level);
        account.charge(ty.cost_currency(), cost)?;

        if let Some(upgrade) = account.upgrades.iter_mut().find(|u| u.upgrade_type == ty) {
            upgrade.level += 1;
        } else {
            account.upgrades.push(Upgrade {
                upgrade_type: ty,
                level: 1,
            });
        }
        debug!(username = %account.username, upgrade = ty.name(), level = level + 1, "upgrade purchase");
        Ok(Response::ok(&BuyUpgradeResponse {
            upgrade_type: ty,
            new_level: level + 1,
            new_scrap: account.scrap,
            new_data: account.data,
            new_core_fragments: account.core_fragments,
        }))
    }

    fn buy_storage(&mut self, key: &str) -> Result<Response, ApiError> {
        let account = self.account_mut(key);
        let level = account.storage_level as usize;
        if level >= OFFLINE_CAP_COSTS.len() {
            return Err(ApiError::Validation(
                "storage is already at max level".to_string(),
            ));
        }
        account.charge(Currency::Scrap, OFFLINE_CAP_COSTS[level])?;
        account.storage_level += 1;
        Ok(Response::ok(&BuyStorageResponse {
            new_storage_level: account.storage_level,
            new_scrap: account.scrap,
        }))
    }

    fn equip(&mut self, key: &str, inventory_id: u64, unequip: bool) -> Result<Response, ApiError> {
        let account = self.account_mut(key);
        let entry = account
            .inventory
            .iter()
            .find(|e| e.inventory_id == inventory_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("inventory entry {}", inventory_id)))?;
        let def = item_by_id(entry.item_id)
            .ok_or_else(|| ApiError::NotFound(format!("item {}", entry.item_id)))?;
        if !def.kind.is_equippable() {
            return Err(ApiError::Validation(
                "this item type cannot be equipped".to_string(),
            ));
        }

        // Clear the slot first; equipping replaces same-kind gear.
        for other in account.inventory.iter_mut() {
            if let Some(other_def) = item_by_id(other.item_id) {
                if other_def.kind == def.kind {
                    other.is_equipped = false;
                }
            }
        }
        let slot_value = if unequip { None } else { Some(entry.item_id) };
        match def.kind {
            ItemKind::Weapon => account.equipped_weapon_id = slot_value,
            ItemKind::Armor => account.equipped_armor_id = slot_value,
            ItemKind::Accessory => account.equipped_accessory_id = slot_value,
            ItemKind::Consumable => unreachable!(),
        }
        let entry = {
            let entry = account
                .inventory
                .iter_mut()
                .find(|e| e.inventory_id == inventory_id)
                .expect("checked above");
            entry.is_equipped = !unequip;
            entry.clone()
        };

        Ok(Response::ok(&EquipResponse {
            item: entry,
            equipped_weapon_id: account.equipped_weapon_id,
            equipped_armor_id: account.equipped_armor_id,
            equipped_accessory_id: account.equipped_accessory_id,
        }))
    }

    fn upgrade_weapon(&mut self, key: &str, inventory_id: u64) -> Result<Response, ApiError> {
        let account = self.account_mut(key);
        let (item_id, level) = account
            .inventory
            .iter()
            .find(|e| e.inventory_id == inventory_id)
            .map(|e| (e.item_id, e.upgrade_level))
            .ok_or_else(|| ApiError::NotFound(format!("inventory entry {}", inventory_id)))?;
        let def = item_by_id(item_id)
            .ok_or_else(|| ApiError::NotFound(format!("item {}", item_id)))?;
        if def.kind != ItemKind::Weapon {
            return Err(ApiError::Validation(
                "only weapons can be upgraded".to_string(),
            ));
        }

        let cost = formulas::weapon_upgrade_cost(def.tier, level);
        account.charge(Currency::Scrap, cost)?;

        let entry = account
            .inventory
            .iter_mut()
            .find(|e| e.inventory_id == inventory_id)
            .expect("checked above");
        entry.upgrade_level += 1;
        let entry = entry.clone();

        Ok(Response::ok(&UpgradeWeaponResponse {
            new_scrap: account.scrap,
            current_damage: formulas::weapon_damage_at_level(
                def.damage_bonus,
                entry.upgrade_level,
            ),
            next_upgrade_cost: formulas::weapon_upgrade_cost(def.tier, entry.upgrade_level),
            item: entry,
        }))
    }

    fn prestige(&mut self, key: &str) -> Result<Response, ApiError> {
        let now = self.now_ms;
        let account = self.account_mut(key);
        if account.highest_stage < MIN_PRESTIGE_STAGE {
            return Err(ApiError::Validation(format!(
                "reboot requires reaching stage {}",
                MIN_PRESTIGE_STAGE
            )));
        }

        let earned = formulas::core_fragments(
            account.highest_stage,
            account.upgrade_level(UpgradeType::PermPrestigeBonus),
        );

        account.prestige_stats.total_prestiges += 1;
        account.prestige_stats.lifetime_core_fragments += earned;
        account.core_fragments += earned;

        // Reset the run. highest_stage survives so shop unlocks persist.
        account.upgrades.retain(|u| u.upgrade_type.is_permanent());
        account.machines.clear();
        account.inventory.clear();
        account.equipped_weapon_id = None;
        account.equipped_armor_id = None;
        account.equipped_accessory_id = None;
        account.stage = 1;
        account.boss_hp = formulas::boss_hp(1);
        account.storage_level = 1;
        account.scrap = formulas::upgrade_effect(
            UpgradeType::PermStartingScrap,
            account.upgrade_level(UpgradeType::PermStartingScrap),
        ) as u64;
        account.data = 0;
        account.total_taps = 0;
        account.bosses_killed = 0;
        account.last_checkpoint_ms = now;

        info!(
            username = %account.username,
            earned,
            total = account.core_fragments,
            "prestige reboot"
        );
        Ok(Response::ok(&PrestigeResponse {
            core_fragments_earned: earned,
            total_core_fragments: account.core_fragments,
            prestige_stats: account.prestige_stats,
            permanent_upgrades: account.upgrades.clone(),
            highest_stage: account.highest_stage,
        }))
    }
}

impl Default for InMemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::sync::Transport for InMemoryServer {
    fn send(
        &mut self,
        token: Option<&str>,
        request: &Request,
    ) -> Result<Response, crate::error::TransportError> {
        Ok(self.handle(token, request))
    }
}

fn offline_body(earnings: &formulas::OfflineEarnings) -> OfflineEarningsBody {
    OfflineEarningsBody {
        scrap: earnings.scrap,
        data: earnings.data,
        boss_damage: earnings.boss_damage,
        seconds_away: earnings.seconds_away,
        credited_seconds: earnings.credited_seconds,
        was_capped: earnings.was_capped,
    }
}

fn validate_save(snapshot: &SaveSnapshot) -> Result<(), ApiError> {
    if snapshot.stage < 1 {
        return Err(ApiError::Validation("stage must be at least 1".to_string()));
    }
    if snapshot.boss_max_hp == 0 {
        return Err(ApiError::Validation("boss max HP must be positive".to_string()));
    }
    if snapshot.boss_hp > snapshot.boss_max_hp {
        return Err(ApiError::Validation(
            "boss HP exceeds its maximum".to_string(),
        ));
    }
    Ok(())
}

/// Elementwise max: lifetime stats only ever grow.
fn merge_stats(current: &mut PrestigeStats, incoming: &PrestigeStats) {
    current.total_prestiges = current.total_prestiges.max(incoming.total_prestiges);
    current.lifetime_scrap = current.lifetime_scrap.max(incoming.lifetime_scrap);
    current.lifetime_data = current.lifetime_data.max(incoming.lifetime_data);
    current.lifetime_core_fragments = current
        .lifetime_core_fragments
        .max(incoming.lifetime_core_fragments);
    current.lifetime_bosses_killed = current
        .lifetime_bosses_killed
        .max(incoming.lifetime_bosses_killed);
    current.lifetime_taps = current.lifetime_taps.max(incoming.lifetime_taps);
    current.highest_damage_hit = current.highest_damage_hit.max(incoming.highest_damage_hit);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(server: &mut InMemoryServer, username: &str) -> (String, StateSnapshot) {
        let resp = server.handle(
            None,
            &Request::Login {
                username: username.to_string(),
            },
        );
        assert_eq!(resp.status, 200, "{}", resp.body);
        let body: LoginResponse = serde_json::from_str(&resp.body).unwrap();
        (body.token, body.state)
    }

    fn save_snapshot(stage: u32, scrap: u64, data: u64) -> SaveSnapshot {
        SaveSnapshot {
            stage,
            scrap,
            data,
            core_fragments: 0,
            boss_hp: formulas::boss_hp(stage),
            boss_max_hp: formulas::boss_hp(stage),
            total_taps: 0,
            bosses_killed: 0,
            prestige_stats: PrestigeStats::default(),
        }
    }

    #[test]
    fn login_creates_fresh_account() {
        let mut server = InMemoryServer::new();
        let (_, state) = login(&mut server, "rebel");
        assert_eq!(state.stage, 1);
        assert_eq!(state.scrap, 0);
        assert_eq!(state.boss_hp, 100);
    }

    #[test]
    fn login_rejects_bad_usernames() {
        let mut server = InMemoryServer::new();
        let resp = server.handle(
            None,
            &Request::Login {
                username: String::new(),
            },
        );
        assert_eq!(resp.status, 400);
        let resp = server.handle(
            None,
            &Request::Login {
                username: "x".repeat(40),
            },
        );
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn requests_require_token() {
        let mut server = InMemoryServer::new();
        let resp = server.handle(None, &Request::GetState);
        assert_eq!(resp.status, 401);
        let resp = server.handle(Some("tok-bogus"), &Request::GetState);
        assert_eq!(resp.status, 401);
    }

    #[test]
    fn save_persists_and_tracks_highest_stage() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        let resp = server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(12, 340, 20),
            },
        );
        assert_eq!(resp.status, 200);

        // A later save at a lower stage keeps the highest-stage mark.
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(5, 400, 25),
            },
        );
        let resp = server.handle(Some(&token), &Request::GetState);
        let body: StateResponse = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body.state.stage, 5);
        assert_eq!(body.state.highest_stage, 12);
        assert_eq!(body.state.scrap, 400);
    }

    #[test]
    fn save_rejects_invalid_snapshots() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        let mut bad = save_snapshot(1, 0, 0);
        bad.boss_hp = bad.boss_max_hp + 1;
        let resp = server.handle(Some(&token), &Request::Save { snapshot: bad });
        assert_eq!(resp.status, 400);

        let mut bad = save_snapshot(1, 0, 0);
        bad.boss_max_hp = 0;
        bad.boss_hp = 0;
        let resp = server.handle(Some(&token), &Request::Save { snapshot: bad });
        assert_eq!(resp.status, 400);

        // Nothing was written
        let resp = server.handle(Some(&token), &Request::GetState);
        let body: StateResponse = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body.state.boss_hp, 100);
    }

    #[test]
    fn lifetime_stats_never_roll_back() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        let mut snap = save_snapshot(2, 10, 0);
        snap.prestige_stats.lifetime_taps = 500;
        server.handle(Some(&token), &Request::Save { snapshot: snap });

        let mut stale = save_snapshot(2, 10, 0);
        stale.prestige_stats.lifetime_taps = 100;
        server.handle(Some(&token), &Request::Save { snapshot: stale });

        let resp = server.handle(Some(&token), &Request::GetState);
        let body: StateResponse = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body.state.prestige_stats.lifetime_taps, 500);
    }

    #[test]
    fn buy_item_full_flow() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(1, 100, 0),
            },
        );
        let resp = server.handle(Some(&token), &Request::BuyItem { item_id: 1, quantity: 1 });
        assert_eq!(resp.status, 200);
        let body: BuyItemResponse = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body.new_scrap, 50);
        assert_eq!(body.item.item_id, 1);
        assert_eq!(body.item.quantity, 1);
    }

    #[test]
    fn buy_item_rejections() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(1, 1_000_000, 0),
            },
        );

        // Unknown item
        let resp = server.handle(Some(&token), &Request::BuyItem { item_id: 999, quantity: 1 });
        assert_eq!(resp.status, 404);

        // Locked: Shock Baton needs highest stage 10
        let resp = server.handle(Some(&token), &Request::BuyItem { item_id: 2, quantity: 1 });
        assert_eq!(resp.status, 400);

        // Insufficient funds
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(1, 10, 0),
            },
        );
        let resp = server.handle(Some(&token), &Request::BuyItem { item_id: 1, quantity: 1 });
        assert_eq!(resp.status, 400);
        let body: crate::api::ErrorBody = serde_json::from_str(&resp.body).unwrap();
        assert!(body.error.contains("insufficient"));

        // Duplicate non-consumable
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(1, 200, 0),
            },
        );
        assert_eq!(
            server
                .handle(Some(&token), &Request::BuyItem { item_id: 1, quantity: 1 })
                .status,
            200
        );
        let resp = server.handle(Some(&token), &Request::BuyItem { item_id: 1, quantity: 1 });
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn consumables_stack_quantity() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(1, 0, 500),
            },
        );

        // Auto-Tap Bot costs 50 data
        server.handle(Some(&token), &Request::BuyItem { item_id: 19, quantity: 1 });
        let resp = server.handle(Some(&token), &Request::BuyItem { item_id: 19, quantity: 1 });
        let body: BuyItemResponse = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body.item.quantity, 2);
        assert_eq!(body.new_data, 400);
    }

    #[test]
    fn machine_purchase_levels_and_costs() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(1, 3_000, 0),
            },
        );
        let resp = server.handle(
            Some(&token),
            &Request::BuyMachine {
                machine_type: MachineType::ScrapCollector,
                levels: 1,
            },
        );
        let body: BuyMachineResponse = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body.new_level, 1);
        assert_eq!(body.new_scrap, 2_000);

        let resp = server.handle(
            Some(&token),
            &Request::BuyMachine {
                machine_type: MachineType::ScrapCollector,
                levels: 1,
            },
        );
        let body: BuyMachineResponse = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body.new_level, 2);
        assert_eq!(body.new_scrap, 850); // 2000 - 1150
    }

    #[test]
    fn machine_bulk_purchase_sums_level_costs() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(1, 10_000, 0),
            },
        );
        let resp = server.handle(
            Some(&token),
            &Request::BuyMachine {
                machine_type: MachineType::ScrapCollector,
                levels: 3,
            },
        );
        let body: BuyMachineResponse = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body.new_level, 3);
        // 1000 + 1150 + 1322
        assert_eq!(body.new_scrap, 10_000 - 3_472);
    }

    #[test]
    fn consumable_bulk_purchase() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(1, 0, 500),
            },
        );
        let resp = server.handle(
            Some(&token),
            &Request::BuyItem {
                item_id: 19,
                quantity: 5,
            },
        );
        let body: BuyItemResponse = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body.item.quantity, 5);
        assert_eq!(body.new_data, 250);

        // Gear cannot be bought in bulk
        let resp = server.handle(
            Some(&token),
            &Request::BuyItem {
                item_id: 1,
                quantity: 2,
            },
        );
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn machine_unlock_gate() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(1, 100_000, 100_000),
            },
        );
        let resp = server.handle(
            Some(&token),
            &Request::BuyMachine {
                machine_type: MachineType::AutoTurret,
                levels: 1,
            },
        );
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn upgrade_max_level_enforced() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        let mut snap = save_snapshot(1, 0, 0);
        snap.core_fragments = 1_000_000_000;
        server.handle(Some(&token), &Request::Save { snapshot: snap });

        for _ in 0..10 {
            let resp = server.handle(
                Some(&token),
                &Request::BuyUpgrade {
                    upgrade_type: UpgradeType::PermStartingScrap,
                },
            );
            assert_eq!(resp.status, 200, "{}", resp.body);
        }
        let resp = server.handle(
            Some(&token),
            &Request::BuyUpgrade {
                upgrade_type: UpgradeType::PermStartingScrap,
            },
        );
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn storage_purchase() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(1, 10_000, 0),
            },
        );
        let resp = server.handle(Some(&token), &Request::BuyStorage);
        let body: BuyStorageResponse = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body.new_storage_level, 2);
        assert_eq!(body.new_scrap, 0);

        let resp = server.handle(Some(&token), &Request::BuyStorage);
        assert_eq!(resp.status, 400); // can't afford level 3
    }

    #[test]
    fn equip_swaps_same_slot() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        let snap = save_snapshot(10, 1_000, 0);
        server.handle(Some(&token), &Request::Save { snapshot: snap });

        let pipe: BuyItemResponse = serde_json::from_str(
            &server
                .handle(Some(&token), &Request::BuyItem { item_id: 1, quantity: 1 })
                .body,
        )
        .unwrap();
        let baton: BuyItemResponse = serde_json::from_str(
            &server
                .handle(Some(&token), &Request::BuyItem { item_id: 2, quantity: 1 })
                .body,
        )
        .unwrap();

        let resp = server.handle(
            Some(&token),
            &Request::Equip {
                inventory_id: pipe.item.inventory_id,
                unequip: false,
            },
        );
        let body: EquipResponse = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body.equipped_weapon_id, Some(1));

        let resp = server.handle(
            Some(&token),
            &Request::Equip {
                inventory_id: baton.item.inventory_id,
                unequip: false,
            },
        );
        let body: EquipResponse = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body.equipped_weapon_id, Some(2));

        // Old weapon got unequipped
        let state: StateResponse =
            serde_json::from_str(&server.handle(Some(&token), &Request::GetState).body).unwrap();
        let pipe_entry = state
            .state
            .inventory
            .iter()
            .find(|e| e.item_id == 1)
            .unwrap();
        assert!(!pipe_entry.is_equipped);
    }

    #[test]
    fn unequip_clears_the_slot() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(1, 100, 0),
            },
        );
        let pipe: BuyItemResponse = serde_json::from_str(
            &server
                .handle(Some(&token), &Request::BuyItem { item_id: 1, quantity: 1 })
                .body,
        )
        .unwrap();
        server.handle(
            Some(&token),
            &Request::Equip {
                inventory_id: pipe.item.inventory_id,
                unequip: false,
            },
        );
        let resp = server.handle(
            Some(&token),
            &Request::Equip {
                inventory_id: pipe.item.inventory_id,
                unequip: true,
            },
        );
        let body: EquipResponse = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body.equipped_weapon_id, None);
        assert!(!body.item.is_equipped);
    }

    #[test]
    fn equip_rejects_consumables() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(1, 0, 100),
            },
        );
        let bought: BuyItemResponse = serde_json::from_str(
            &server
                .handle(Some(&token), &Request::BuyItem { item_id: 19, quantity: 1 })
                .body,
        )
        .unwrap();
        let resp = server.handle(
            Some(&token),
            &Request::Equip {
                inventory_id: bought.item.inventory_id,
                unequip: false,
            },
        );
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn weapon_upgrade_costs_scale_with_tier() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(10, 10_000, 0),
            },
        );
        let baton: BuyItemResponse = serde_json::from_str(
            &server
                .handle(Some(&token), &Request::BuyItem { item_id: 2, quantity: 1 })
                .body,
        )
        .unwrap();
        // Tier 2: base upgrade cost 1000
        let resp = server.handle(
            Some(&token),
            &Request::UpgradeWeapon {
                inventory_id: baton.item.inventory_id,
            },
        );
        let body: UpgradeWeaponResponse = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body.item.upgrade_level, 1);
        assert_eq!(body.new_scrap, 10_000 - 500 - 1_000);
        assert_eq!(body.current_damage, 6); // 5 * 1.2
        assert_eq!(body.next_upgrade_cost, 1_500);
    }

    #[test]
    fn prestige_requires_stage_fifty() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(49, 0, 0),
            },
        );
        let resp = server.handle(Some(&token), &Request::Prestige);
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn prestige_resets_run_but_keeps_permanents() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        let mut snap = save_snapshot(60, 5_000, 1_000);
        snap.core_fragments = 10;
        server.handle(Some(&token), &Request::Save { snapshot: snap });

        // One temp upgrade, one permanent upgrade, one machine, one item.
        server.handle(
            Some(&token),
            &Request::BuyUpgrade {
                upgrade_type: UpgradeType::TapPower,
            },
        );
        server.handle(
            Some(&token),
            &Request::BuyUpgrade {
                upgrade_type: UpgradeType::PermStartingScrap,
            },
        );
        server.handle(
            Some(&token),
            &Request::BuyMachine {
                machine_type: MachineType::ScrapCollector,
                levels: 1,
            },
        );
        server.handle(Some(&token), &Request::BuyItem { item_id: 1, quantity: 1 });

        let resp = server.handle(Some(&token), &Request::Prestige);
        assert_eq!(resp.status, 200, "{}", resp.body);
        let body: PrestigeResponse = serde_json::from_str(&resp.body).unwrap();
        // floor(sqrt(60/10)) = 2 fragments
        assert_eq!(body.core_fragments_earned, 2);
        assert_eq!(body.highest_stage, 60);
        assert_eq!(body.permanent_upgrades.len(), 1);
        assert_eq!(
            body.permanent_upgrades[0].upgrade_type,
            UpgradeType::PermStartingScrap
        );

        let state: StateResponse =
            serde_json::from_str(&server.handle(Some(&token), &Request::GetState).body).unwrap();
        assert_eq!(state.state.stage, 1);
        assert_eq!(state.state.highest_stage, 60);
        assert!(state.state.machines.is_empty());
        assert!(state.state.inventory.is_empty());
        // Starting scrap from the permanent upgrade (level 1 = 1000)
        assert_eq!(state.state.scrap, 1_000);
        assert_eq!(state.state.prestige_stats.total_prestiges, 1);
    }

    #[test]
    fn offline_earnings_accrue_and_claim_once() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(1, 1_000, 0),
            },
        );
        server.handle(
            Some(&token),
            &Request::BuyMachine {
                machine_type: MachineType::ScrapCollector,
                levels: 1,
            },
        );
        // Checkpoint is the save; the machine purchase doesn't move it.
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(1, 0, 0),
            },
        );

        server.advance(600_000); // 10 minutes
        let state: StateResponse =
            serde_json::from_str(&server.handle(Some(&token), &Request::GetState).body).unwrap();
        let offline = state.offline.unwrap();
        assert_eq!(offline.credited_seconds, 600);
        assert_eq!(offline.scrap, 600);
        assert!(!offline.was_capped);

        let claim: ClaimOfflineResponse = serde_json::from_str(
            &server.handle(Some(&token), &Request::ClaimOffline).body,
        )
        .unwrap();
        assert_eq!(claim.earnings.scrap, 600);
        assert_eq!(claim.new_scrap, 600);

        // Claiming again immediately yields nothing.
        let state: StateResponse =
            serde_json::from_str(&server.handle(Some(&token), &Request::GetState).body).unwrap();
        assert!(state.offline.is_none());
    }

    #[test]
    fn offline_earnings_capped_at_storage_window() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(1, 1_000, 0),
            },
        );
        server.handle(
            Some(&token),
            &Request::BuyMachine {
                machine_type: MachineType::ScrapCollector,
                levels: 1,
            },
        );
        server.handle(
            Some(&token),
            &Request::Save {
                snapshot: save_snapshot(1, 0, 0),
            },
        );

        server.advance(10 * 3600 * 1000); // 10 hours, cap is 2
        let claim: ClaimOfflineResponse = serde_json::from_str(
            &server.handle(Some(&token), &Request::ClaimOffline).body,
        )
        .unwrap();
        assert!(claim.earnings.was_capped);
        assert_eq!(claim.earnings.credited_seconds, 7_200);
        assert_eq!(claim.earnings.scrap, 7_200);
    }

    #[test]
    fn injected_failures_return_500_then_recover() {
        let mut server = InMemoryServer::new();
        let (token, _) = login(&mut server, "rebel");
        server.fail_next_requests(2);
        assert_eq!(server.handle(Some(&token), &Request::GetState).status, 500);
        assert_eq!(server.handle(Some(&token), &Request::GetState).status, 500);
        assert_eq!(server.handle(Some(&token), &Request::GetState).status, 200);
    }
}
