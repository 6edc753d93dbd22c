//! Client-side game state definitions.
//!
//! Currencies accumulate as `f64` on the client (machine output is
//! fractional per second); the server stores integers and flooring
//! happens at the save boundary.

use serde::{Deserialize, Serialize};

use crate::catalog::{item_by_id, ItemDef, MachineType, UpgradeType};
use crate::effects::EffectSet;
use crate::formulas;

/// The boss currently on screen. Fully derived from its stage; never
/// persisted, always regenerated.
#[derive(Clone, Debug, PartialEq)]
pub struct Boss {
    pub name: String,
    pub flavor: &'static str,
    pub stage: u32,
    pub hp: u64,
    pub max_hp: u64,
    pub scrap_reward: u64,
    pub data_reward: u64,
    pub is_mini: bool,
    pub is_named: bool,
    pub is_major: bool,
}

impl Boss {
    /// Construct the boss for a stage at full health.
    pub fn for_stage(stage: u32) -> Self {
        // Ranks are exclusive: major > named > mini.
        let is_major = stage % 100 == 0;
        let is_named = stage % 50 == 0 && !is_major;
        let is_mini = stage % 10 == 0 && !is_named && !is_major;

        let (name, flavor) = if let Some((name, flavor)) = crate::catalog::named_boss(stage) {
            (name.to_string(), flavor)
        } else if is_major {
            (
                format!("ADMIN-{}", stage / 100),
                "THE ADMINISTRATOR is watching...",
            )
        } else if is_mini {
            let (name, flavor) = crate::catalog::REGULAR_BOSS_NAMES
                [(stage / 10) as usize % crate::catalog::REGULAR_BOSS_NAMES.len()];
            (name.to_string(), flavor)
        } else {
            let (name, flavor) = crate::catalog::REGULAR_BOSS_NAMES
                [stage as usize % crate::catalog::REGULAR_BOSS_NAMES.len()];
            (name.to_string(), flavor)
        };

        let max_hp = formulas::boss_hp(stage);
        Boss {
            name,
            flavor,
            stage,
            hp: max_hp,
            max_hp,
            scrap_reward: formulas::scrap_reward(stage),
            data_reward: formulas::data_reward(stage),
            is_mini,
            is_named,
            is_major,
        }
    }

    pub fn is_defeated(&self) -> bool {
        self.hp == 0
    }
}

/// An owned item. References the catalog by stable id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventoryEntry {
    /// Server-assigned row id, unique per account.
    #[serde(rename = "inventoryId")]
    pub inventory_id: u64,
    #[serde(rename = "itemId")]
    pub item_id: u32,
    pub quantity: u32,
    #[serde(rename = "upgradeLevel")]
    pub upgrade_level: u32,
    #[serde(rename = "isEquipped")]
    pub is_equipped: bool,
}

impl InventoryEntry {
    pub fn def(&self) -> Option<&'static ItemDef> {
        item_by_id(self.item_id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    #[serde(rename = "machineType")]
    pub machine_type: MachineType,
    pub level: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Upgrade {
    #[serde(rename = "upgradeType")]
    pub upgrade_type: UpgradeType,
    pub level: u32,
}

/// Lifetime statistics. Monotone: nothing here ever decreases, not even
/// through a prestige reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrestigeStats {
    pub total_prestiges: u64,
    pub lifetime_scrap: u64,
    pub lifetime_data: u64,
    pub lifetime_core_fragments: u64,
    pub lifetime_bosses_killed: u64,
    pub lifetime_taps: u64,
    pub highest_damage_hit: u64,
}

/// Run progression and currencies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub stage: u32,
    /// Highest stage ever reached. Survives prestige.
    pub highest_stage: u32,
    /// Highest stage whose boss kill has already been credited. Makes
    /// defeat handling idempotent per stage.
    pub highest_defeated_stage: u32,
    pub scrap: f64,
    pub data: f64,
    pub core_fragments: u64,
    pub total_taps: u64,
    pub bosses_killed: u64,
    /// Offline storage level (1-based, see the offline cap tables).
    pub storage_level: u32,
    pub equipped_weapon_id: Option<u32>,
    pub equipped_armor_id: Option<u32>,
    pub equipped_accessory_id: Option<u32>,
}

impl Default for Progress {
    fn default() -> Self {
        Progress {
            stage: 1,
            highest_stage: 1,
            highest_defeated_stage: 0,
            scrap: 0.0,
            data: 0.0,
            core_fragments: 0,
            total_taps: 0,
            bosses_killed: 0,
            storage_level: 1,
            equipped_weapon_id: None,
            equipped_armor_id: None,
            equipped_accessory_id: None,
        }
    }
}

/// A resolved tap, for floating damage numbers. Observation only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DamageEvent {
    pub id: u64,
    pub amount: u64,
    pub critical: bool,
}

/// Everything the client simulates locally.
#[derive(Clone, Debug)]
pub struct ClientState {
    pub progress: Progress,
    pub boss: Boss,
    pub inventory: Vec<InventoryEntry>,
    pub machines: Vec<Machine>,
    pub upgrades: Vec<Upgrade>,
    pub prestige: PrestigeStats,
    pub effects: EffectSet,
}

impl Default for ClientState {
    fn default() -> Self {
        ClientState {
            progress: Progress::default(),
            boss: Boss::for_stage(1),
            inventory: Vec::new(),
            machines: Vec::new(),
            upgrades: Vec::new(),
            prestige: PrestigeStats::default(),
            effects: EffectSet::default(),
        }
    }
}

impl ClientState {
    pub fn upgrade_level(&self, ty: UpgradeType) -> u32 {
        self.upgrades
            .iter()
            .find(|u| u.upgrade_type == ty)
            .map(|u| u.level)
            .unwrap_or(0)
    }

    pub fn machine_level(&self, ty: MachineType) -> u32 {
        self.machines
            .iter()
            .find(|m| m.machine_type == ty)
            .map(|m| m.level)
            .unwrap_or(0)
    }

    pub fn machine_levels(&self) -> Vec<(MachineType, u32)> {
        self.machines
            .iter()
            .map(|m| (m.machine_type, m.level))
            .collect()
    }

    fn equipped_def(&self, item_id: Option<u32>) -> Option<&'static ItemDef> {
        item_id.and_then(item_by_id)
    }

    fn equipped_entry(&self, item_id: u32) -> Option<&InventoryEntry> {
        self.inventory
            .iter()
            .find(|e| e.item_id == item_id && e.is_equipped)
    }

    /// Flat tap damage from gear: the weapon at its upgrade level plus
    /// armor/accessory damage bonuses.
    pub fn gear_damage(&self) -> u64 {
        let weapon = self
            .progress
            .equipped_weapon_id
            .and_then(|id| {
                let def = item_by_id(id)?;
                let level = self.equipped_entry(id).map(|e| e.upgrade_level).unwrap_or(0);
                Some(formulas::weapon_damage_at_level(def.damage_bonus, level))
            })
            .unwrap_or(0);
        let armor = self
            .equipped_def(self.progress.equipped_armor_id)
            .map(|d| d.damage_bonus)
            .unwrap_or(0);
        let accessory = self
            .equipped_def(self.progress.equipped_accessory_id)
            .map(|d| d.damage_bonus)
            .unwrap_or(0);
        weapon + armor + accessory
    }

    /// Additive crit chance from equipped gear.
    pub fn gear_crit_bonus(&self) -> f64 {
        [
            self.progress.equipped_weapon_id,
            self.progress.equipped_armor_id,
            self.progress.equipped_accessory_id,
        ]
        .iter()
        .filter_map(|id| self.equipped_def(*id))
        .map(|d| d.crit_chance_bonus)
        .sum()
    }

    /// Multiplicative scrap reward bonus from gear (1.0 when none).
    pub fn gear_scrap_mult(&self) -> f64 {
        [
            self.progress.equipped_weapon_id,
            self.progress.equipped_armor_id,
            self.progress.equipped_accessory_id,
        ]
        .iter()
        .filter_map(|id| self.equipped_def(*id))
        .map(|d| 1.0 + d.scrap_bonus)
        .product()
    }

    /// Multiplicative data reward bonus from gear (1.0 when none).
    pub fn gear_data_mult(&self) -> f64 {
        [
            self.progress.equipped_weapon_id,
            self.progress.equipped_armor_id,
            self.progress.equipped_accessory_id,
        ]
        .iter()
        .filter_map(|id| self.equipped_def(*id))
        .map(|d| 1.0 + d.data_bonus)
        .product()
    }

    pub fn idle_production(&self) -> formulas::IdleProduction {
        formulas::total_idle_production(
            &self.machine_levels(),
            self.upgrade_level(UpgradeType::IdlePower),
            self.upgrade_level(UpgradeType::PermIdleEfficiency),
        )
    }

    pub fn offline_cap_secs(&self) -> u64 {
        formulas::offline_cap_secs(
            self.progress.storage_level,
            self.upgrade_level(UpgradeType::PermStorageBoost),
        )
    }

    /// Entries that can be shown in the equipment panel.
    pub fn equippable_inventory(&self) -> impl Iterator<Item = &InventoryEntry> {
        self.inventory
            .iter()
            .filter(|e| e.def().map(|d| d.kind.is_equippable()).unwrap_or(false))
    }

    /// Total machine levels owned, for stats.
    pub fn total_machine_levels(&self) -> u32 {
        self.machines.iter().map(|m| m.level).sum()
    }
}
