//! The live play session: local simulation plus server reconciliation.
//!
//! `GameSession` owns the client state, the fixed-timestep clock, and
//! the damage-number feed. Purchases are predicted nowhere: the caller
//! sends them through `SyncClient` and feeds the confirmed response back
//! through the `apply_*` methods, which overwrite local state with the
//! server's numbers.

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info};

use crate::api::{
    BuyItemResponse, BuyMachineResponse, BuyStorageResponse, BuyUpgradeResponse,
    ClaimOfflineResponse, EquipResponse, OfflineEarningsBody, PrestigeResponse, SaveSnapshot,
    StateSnapshot, UpgradeWeaponResponse,
};
use crate::catalog::{ItemKind, AUTO_SAVE_INTERVAL_MS};
use crate::combat::{self, DefeatRewards, SkillEffect, TapOutcome};
use crate::formulas::OfflineEarnings;
use crate::idle::{self, IdleTickReport};
use crate::state::{Boss, ClientState, DamageEvent};
use crate::time::SimClock;

/// Client-side action failures. These never reach the server.
#[derive(Debug, Error, PartialEq)]
pub enum ActionError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0} is not a consumable")]
    NotConsumable(&'static str),
    #[error("no {0} left")]
    OutOfStock(&'static str),
}

/// Everything one simulation frame produced.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub ticks: u64,
    pub idle: IdleTickReport,
    pub rewards: Option<DefeatRewards>,
    /// The autosave interval elapsed; the caller should snapshot and save.
    pub autosave_due: bool,
}

pub struct GameSession {
    pub state: ClientState,
    clock: SimClock,
    rng: StdRng,
    damage_events: Vec<DamageEvent>,
    next_event_id: u64,
    last_save_ms: u64,
}

impl GameSession {
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Deterministic crit rolls for tests.
    pub fn with_seed(seed: u64) -> Self {
        GameSession {
            state: ClientState::default(),
            clock: SimClock::new(),
            rng: StdRng::seed_from_u64(seed),
            damage_events: Vec::new(),
            next_event_id: 1,
            last_save_ms: 0,
        }
    }

    /// Start a session from the server's authoritative snapshot.
    pub fn from_snapshot(snapshot: &StateSnapshot) -> Self {
        let mut session = Self::new();
        session.apply_snapshot(snapshot);
        session
    }

    /// Replace local state with the server's view. Used on login and on
    /// desync recovery; the boss is rebuilt from its stage, keeping the
    /// saved HP.
    pub fn apply_snapshot(&mut self, snapshot: &StateSnapshot) {
        let mut boss = Boss::for_stage(snapshot.stage);
        boss.hp = snapshot.boss_hp.min(boss.max_hp);

        self.state = ClientState {
            boss,
            inventory: snapshot.inventory.clone(),
            machines: snapshot.machines.clone(),
            upgrades: snapshot.upgrades.clone(),
            prestige: snapshot.prestige_stats,
            ..ClientState::default()
        };
        self.state.progress.stage = snapshot.stage;
        self.state.progress.highest_stage = snapshot.highest_stage;
        // Everything below the current stage has been paid out already.
        self.state.progress.highest_defeated_stage = snapshot.stage.saturating_sub(1);
        self.state.progress.scrap = snapshot.scrap as f64;
        self.state.progress.data = snapshot.data as f64;
        self.state.progress.core_fragments = snapshot.core_fragments;
        self.state.progress.total_taps = snapshot.total_taps;
        self.state.progress.bosses_killed = snapshot.bosses_killed;
        self.state.progress.storage_level = snapshot.storage_level;
        self.state.progress.equipped_weapon_id = snapshot.equipped_weapon_id;
        self.state.progress.equipped_armor_id = snapshot.equipped_armor_id;
        self.state.progress.equipped_accessory_id = snapshot.equipped_accessory_id;
        info!(stage = snapshot.stage, "state loaded from server");
    }

    /// The floored view of the run, for autosaves.
    pub fn save_snapshot(&self) -> SaveSnapshot {
        SaveSnapshot {
            stage: self.state.progress.stage,
            scrap: self.state.progress.scrap.floor() as u64,
            data: self.state.progress.data.floor() as u64,
            core_fragments: self.state.progress.core_fragments,
            boss_hp: self.state.boss.hp,
            boss_max_hp: self.state.boss.max_hp,
            total_taps: self.state.progress.total_taps,
            bosses_killed: self.state.progress.bosses_killed,
            prestige_stats: self.state.prestige,
        }
    }

    /// Resolve a manual tap, queue its damage number, and settle the
    /// boss if it went down.
    pub fn tap(&mut self, now_ms: u64) -> (TapOutcome, Option<DefeatRewards>) {
        let outcome = combat::tap(&mut self.state, &mut self.rng, now_ms);
        self.push_damage_event(outcome.damage, outcome.critical);
        let rewards = if outcome.boss_downed {
            combat::settle_defeat(&mut self.state, now_ms)
        } else {
            None
        };
        (outcome, rewards)
    }

    /// Trigger a skill; instant damage is settled like a tap.
    pub fn use_skill(&mut self, skill: &SkillEffect, now_ms: u64) -> (u64, Option<DefeatRewards>) {
        let damage = combat::use_skill(&mut self.state, skill, now_ms);
        if damage > 0 {
            self.push_damage_event(damage, false);
        }
        let rewards = if self.state.boss.is_defeated() {
            combat::settle_defeat(&mut self.state, now_ms)
        } else {
            None
        };
        (damage, rewards)
    }

    /// Spend one unit of an owned consumable and start its effect.
    pub fn use_consumable(&mut self, inventory_id: u64, now_ms: u64) -> Result<(), ActionError> {
        let entry = self
            .state
            .inventory
            .iter_mut()
            .find(|e| e.inventory_id == inventory_id)
            .ok_or_else(|| ActionError::NotFound(format!("inventory entry {}", inventory_id)))?;
        let def = entry
            .def()
            .ok_or_else(|| ActionError::NotFound(format!("item {}", entry.item_id)))?;
        if def.kind != ItemKind::Consumable {
            return Err(ActionError::NotConsumable(def.name));
        }
        if entry.quantity == 0 {
            return Err(ActionError::OutOfStock(def.name));
        }
        entry.quantity -= 1;
        // Catalog invariant: every consumable carries an effect.
        if let Some(effect) = &def.effect {
            self.state.effects.activate(effect, now_ms);
        }
        debug!(item = def.name, "consumable used");
        Ok(())
    }

    /// Advance the simulation to `now_ms`: idle production, effect
    /// expiry, passive boss kills, autosave scheduling.
    pub fn advance(&mut self, now_ms: u64) -> FrameReport {
        let ticks = self.clock.update(now_ms);
        let mut report = FrameReport {
            ticks,
            ..FrameReport::default()
        };
        if ticks > 0 {
            report.idle = idle::tick_idle(&mut self.state, ticks, now_ms);
            if report.idle.boss_downed {
                report.rewards = combat::settle_defeat(&mut self.state, now_ms);
            }
        }
        self.state.effects.sweep(now_ms);

        if now_ms.saturating_sub(self.last_save_ms) >= AUTO_SAVE_INTERVAL_MS {
            report.autosave_due = true;
        }
        report
    }

    /// Record that a save was confirmed, resetting the autosave timer.
    pub fn mark_saved(&mut self, now_ms: u64) {
        self.last_save_ms = now_ms;
    }

    /// Drain queued damage numbers for display.
    pub fn take_damage_events(&mut self) -> Vec<DamageEvent> {
        std::mem::take(&mut self.damage_events)
    }

    fn push_damage_event(&mut self, amount: u64, critical: bool) {
        self.damage_events.push(DamageEvent {
            id: self.next_event_id,
            amount,
            critical,
        });
        self.next_event_id += 1;
    }

    // Confirmed-response appliers. Server numbers always win.

    pub fn apply_offline(&mut self, claim: &ClaimOfflineResponse) {
        idle::apply_offline_earnings(&mut self.state, &offline_from_body(&claim.earnings));
        self.state.progress.scrap = claim.new_scrap as f64;
        self.state.progress.data = claim.new_data as f64;
    }

    pub fn apply_buy_item(&mut self, confirmed: &BuyItemResponse) {
        self.state.progress.scrap = confirmed.new_scrap as f64;
        self.state.progress.data = confirmed.new_data as f64;
        if let Some(entry) = self
            .state
            .inventory
            .iter_mut()
            .find(|e| e.inventory_id == confirmed.item.inventory_id)
        {
            *entry = confirmed.item.clone();
        } else {
            self.state.inventory.push(confirmed.item.clone());
        }
    }

    pub fn apply_buy_machine(&mut self, confirmed: &BuyMachineResponse) {
        self.state.progress.scrap = confirmed.new_scrap as f64;
        self.state.progress.data = confirmed.new_data as f64;
        if let Some(machine) = self
            .state
            .machines
            .iter_mut()
            .find(|m| m.machine_type == confirmed.machine_type)
        {
            machine.level = confirmed.new_level;
        } else {
            self.state.machines.push(crate::state::Machine {
                machine_type: confirmed.machine_type,
                level: confirmed.new_level,
            });
        }
    }

    pub fn apply_buy_upgrade(&mut self, confirmed: &BuyUpgradeResponse) {
        self.state.progress.scrap = confirmed.new_scrap as f64;
        self.state.progress.data = confirmed.new_data as f64;
        self.state.progress.core_fragments = confirmed.new_core_fragments;
        if let Some(upgrade) = self
            .state
            .upgrades
            .iter_mut()
            .find(|u| u.upgrade_type == confirmed.upgrade_type)
        {
            upgrade.level = confirmed.new_level;
        } else {
            self.state.upgrades.push(crate::state::Upgrade {
                upgrade_type: confirmed.upgrade_type,
                level: confirmed.new_level,
            });
        }
    }

    pub fn apply_buy_storage(&mut self, confirmed: &BuyStorageResponse) {
        self.state.progress.storage_level = confirmed.new_storage_level;
        self.state.progress.scrap = confirmed.new_scrap as f64;
    }

    pub fn apply_equip(&mut self, confirmed: &EquipResponse) {
        self.state.progress.equipped_weapon_id = confirmed.equipped_weapon_id;
        self.state.progress.equipped_armor_id = confirmed.equipped_armor_id;
        self.state.progress.equipped_accessory_id = confirmed.equipped_accessory_id;
        let equipped_ids = [
            confirmed.equipped_weapon_id,
            confirmed.equipped_armor_id,
            confirmed.equipped_accessory_id,
        ];
        for entry in self.state.inventory.iter_mut() {
            entry.is_equipped = equipped_ids.contains(&Some(entry.item_id));
        }
    }

    pub fn apply_upgrade_weapon(&mut self, confirmed: &UpgradeWeaponResponse) {
        self.state.progress.scrap = confirmed.new_scrap as f64;
        if let Some(entry) = self
            .state
            .inventory
            .iter_mut()
            .find(|e| e.inventory_id == confirmed.item.inventory_id)
        {
            *entry = confirmed.item.clone();
        }
    }

    /// Reset the run after a confirmed reboot, keeping only what the
    /// server says survives.
    pub fn apply_prestige(&mut self, confirmed: &PrestigeResponse) {
        let highest_stage = confirmed.highest_stage;
        self.state = ClientState::default();
        self.state.progress.highest_stage = highest_stage;
        self.state.progress.core_fragments = confirmed.total_core_fragments;
        self.state.upgrades = confirmed.permanent_upgrades.clone();
        self.state.prestige = confirmed.prestige_stats;
        self.state.progress.scrap = crate::formulas::upgrade_effect(
            crate::catalog::UpgradeType::PermStartingScrap,
            self.state
                .upgrade_level(crate::catalog::UpgradeType::PermStartingScrap),
        );
        info!(
            fragments = confirmed.core_fragments_earned,
            "reboot applied"
        );
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

fn offline_from_body(body: &OfflineEarningsBody) -> OfflineEarnings {
    OfflineEarnings {
        scrap: body.scrap,
        data: body.data,
        boss_damage: body.boss_damage,
        seconds_away: body.seconds_away,
        credited_seconds: body.credited_seconds,
        was_capped: body.was_capped,
    }
}
