//! Static game data: tuning constants, machine and upgrade configs, the
//! item catalog, and boss name tables.
//!
//! Everything here is data the client and server must agree on. Numeric
//! bonuses are fractions (0.10 = +10%) except weapon damage, which is a
//! flat add.

use serde::{Deserialize, Serialize};

// ── Tuning constants ──────────────────────────────────────

pub const BASE_DAMAGE: f64 = 1.0;
pub const BASE_CRIT_CHANCE: f64 = 0.05;
pub const BASE_CRIT_MULTIPLIER: f64 = 2.0;
pub const BASE_BOSS_HP: f64 = 100.0;
/// Boss HP grows +12% per stage.
pub const HP_SCALE_PER_STAGE: f64 = 1.12;
/// Boss rewards grow +8% per stage.
pub const REWARD_SCALE_PER_STAGE: f64 = 1.08;

pub const AUTO_SAVE_INTERVAL_MS: u64 = 2000;
/// Stage a run must reach before a reboot is allowed.
pub const MIN_PRESTIGE_STAGE: u32 = 50;
/// Weapon upgrades cost scrap starting from this base, doubled per tier.
pub const WEAPON_UPGRADE_BASE_COST: u64 = 500;

/// Offline storage hours per storage level (level 1 = index 0).
pub const OFFLINE_CAP_HOURS: [u64; 8] = [2, 3, 4, 6, 8, 12, 18, 24];
/// Scrap cost to reach each storage level (level 1 is free).
pub const OFFLINE_CAP_COSTS: [u64; 8] = [
    0,
    10_000,
    50_000,
    200_000,
    1_000_000,
    5_000_000,
    25_000_000,
    100_000_000,
];

// ── Machines ──────────────────────────────────────────────

/// Currencies a purchase can be priced in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    Scrap,
    Data,
    CoreFragments,
}

impl Currency {
    pub fn name(&self) -> &'static str {
        match self {
            Currency::Scrap => "scrap",
            Currency::Data => "data",
            Currency::CoreFragments => "core_fragments",
        }
    }
}

/// Kinds of idle machines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineType {
    ScrapCollector,
    DataMiner,
    AutoTurret,
    EfficiencyBot,
}

impl MachineType {
    /// All machine types in display order.
    pub fn all() -> &'static [MachineType] {
        &[
            MachineType::ScrapCollector,
            MachineType::DataMiner,
            MachineType::AutoTurret,
            MachineType::EfficiencyBot,
        ]
    }

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            MachineType::ScrapCollector => "Scrap Collector",
            MachineType::DataMiner => "Data Miner",
            MachineType::AutoTurret => "Auto-Turret",
            MachineType::EfficiencyBot => "Efficiency Bot",
        }
    }

    /// Output per second at level 1. Doubles each level after that.
    /// For the efficiency bot this is the +1%-per-level machine bonus.
    pub fn base_production(&self) -> f64 {
        match self {
            MachineType::ScrapCollector => 1.0,
            MachineType::DataMiner => 0.1,
            MachineType::AutoTurret => 1.0,
            MachineType::EfficiencyBot => 0.01,
        }
    }

    /// Cost of the first level.
    pub fn base_cost(&self) -> u64 {
        match self {
            MachineType::ScrapCollector => 1_000,
            MachineType::DataMiner => 500,
            MachineType::AutoTurret => 5_000,
            MachineType::EfficiencyBot => 10_000,
        }
    }

    pub fn cost_currency(&self) -> Currency {
        match self {
            MachineType::ScrapCollector | MachineType::AutoTurret => Currency::Scrap,
            MachineType::DataMiner | MachineType::EfficiencyBot => Currency::Data,
        }
    }

    /// Per-level cost growth factor.
    pub fn cost_scale(&self) -> f64 {
        match self {
            MachineType::ScrapCollector | MachineType::DataMiner => 1.15,
            MachineType::AutoTurret => 1.12,
            MachineType::EfficiencyBot => 1.20,
        }
    }

    /// Highest stage the player must have reached to buy this machine.
    pub fn unlock_stage(&self) -> u32 {
        match self {
            MachineType::ScrapCollector => 1,
            MachineType::DataMiner => 10,
            MachineType::AutoTurret => 50,
            MachineType::EfficiencyBot => 75,
        }
    }
}

// ── Upgrades ──────────────────────────────────────────────

/// Kinds of upgrades. `Perm*` variants survive a prestige reset and are
/// paid in core fragments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeType {
    TapPower,
    CritChance,
    CritDamage,
    IdlePower,
    DropRate,
    PermStartingDamage,
    PermStartingScrap,
    PermIdleEfficiency,
    PermStorageBoost,
    PermPrestigeBonus,
}

impl UpgradeType {
    /// All upgrade types, temporary first.
    pub fn all() -> &'static [UpgradeType] {
        &[
            UpgradeType::TapPower,
            UpgradeType::CritChance,
            UpgradeType::CritDamage,
            UpgradeType::IdlePower,
            UpgradeType::DropRate,
            UpgradeType::PermStartingDamage,
            UpgradeType::PermStartingScrap,
            UpgradeType::PermIdleEfficiency,
            UpgradeType::PermStorageBoost,
            UpgradeType::PermPrestigeBonus,
        ]
    }

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            UpgradeType::TapPower => "Tap Power",
            UpgradeType::CritChance => "Critical Chance",
            UpgradeType::CritDamage => "Critical Damage",
            UpgradeType::IdlePower => "Idle Power",
            UpgradeType::DropRate => "Drop Rate",
            UpgradeType::PermStartingDamage => "Starting Damage",
            UpgradeType::PermStartingScrap => "Starting Scrap",
            UpgradeType::PermIdleEfficiency => "Idle Efficiency",
            UpgradeType::PermStorageBoost => "Storage Boost",
            UpgradeType::PermPrestigeBonus => "Prestige Bonus",
        }
    }

    /// Effect gained per level. Fractions for percentage bonuses; flat
    /// amounts for StartingScrap (scrap) and StorageBoost (hours).
    pub fn effect_per_level(&self) -> f64 {
        match self {
            UpgradeType::TapPower => 0.10,
            UpgradeType::CritChance => 0.01,
            UpgradeType::CritDamage => 0.10,
            UpgradeType::IdlePower => 0.10,
            UpgradeType::DropRate => 0.05,
            UpgradeType::PermStartingDamage => 0.25,
            UpgradeType::PermStartingScrap => 1000.0,
            UpgradeType::PermIdleEfficiency => 0.10,
            UpgradeType::PermStorageBoost => 1.0,
            UpgradeType::PermPrestigeBonus => 0.10,
        }
    }

    /// Cost of level 1.
    pub fn base_cost(&self) -> u64 {
        match self {
            UpgradeType::TapPower => 100,
            UpgradeType::CritChance => 500,
            UpgradeType::CritDamage => 50,
            UpgradeType::IdlePower => 1_000,
            UpgradeType::DropRate => 100,
            UpgradeType::PermStartingDamage => 1,
            UpgradeType::PermStartingScrap => 2,
            UpgradeType::PermIdleEfficiency => 1,
            UpgradeType::PermStorageBoost => 5,
            UpgradeType::PermPrestigeBonus => 3,
        }
    }

    pub fn cost_currency(&self) -> Currency {
        match self {
            UpgradeType::TapPower | UpgradeType::CritChance | UpgradeType::IdlePower => {
                Currency::Scrap
            }
            UpgradeType::CritDamage | UpgradeType::DropRate => Currency::Data,
            _ => Currency::CoreFragments,
        }
    }

    /// Per-level cost growth factor.
    pub fn cost_scale(&self) -> f64 {
        match self {
            UpgradeType::TapPower => 1.5,
            UpgradeType::CritChance => 1.6,
            UpgradeType::CritDamage => 1.5,
            UpgradeType::IdlePower => 1.4,
            UpgradeType::DropRate => 1.7,
            UpgradeType::PermStartingDamage => 1.5,
            UpgradeType::PermStartingScrap => 2.0,
            UpgradeType::PermIdleEfficiency => 1.3,
            UpgradeType::PermStorageBoost => 2.0,
            UpgradeType::PermPrestigeBonus => 1.5,
        }
    }

    /// Maximum level, or None if unbounded.
    pub fn max_level(&self) -> Option<u32> {
        match self {
            UpgradeType::TapPower | UpgradeType::IdlePower => None,
            UpgradeType::CritChance => Some(25),
            UpgradeType::CritDamage => Some(30),
            UpgradeType::DropRate => Some(20),
            UpgradeType::PermStartingDamage => Some(20),
            UpgradeType::PermStartingScrap => Some(10),
            UpgradeType::PermIdleEfficiency => Some(30),
            UpgradeType::PermStorageBoost => Some(10),
            UpgradeType::PermPrestigeBonus => Some(20),
        }
    }

    /// Permanent upgrades survive a prestige reset.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            UpgradeType::PermStartingDamage
                | UpgradeType::PermStartingScrap
                | UpgradeType::PermIdleEfficiency
                | UpgradeType::PermStorageBoost
                | UpgradeType::PermPrestigeBonus
        )
    }
}

// ── Item catalog ──────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Weapon,
    Armor,
    Accessory,
    Consumable,
}

impl ItemKind {
    /// Whether the item occupies an equipment slot.
    pub fn is_equippable(&self) -> bool {
        !matches!(self, ItemKind::Consumable)
    }
}

/// What a consumable does when activated. Dispatch is on this enum and
/// the item's stable id, never on display names.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "effect")]
pub enum ConsumableEffect {
    /// Multiplies tap damage for the duration.
    DamageBoost { multiplier: f64, duration_secs: u64 },
    /// Automatic crit-less taps per second for the duration.
    AutoTap { taps_per_sec: f64, duration_secs: u64 },
    /// Multiplies data rewards for the duration.
    DataBoost { multiplier: f64, duration_secs: u64 },
    /// Multiplies scrap rewards for the duration.
    ScrapBoost { multiplier: f64, duration_secs: u64 },
    /// Every tap crits for the duration.
    CritBoost { duration_secs: u64 },
    /// Multiplies both rewards for the next boss kill within the window.
    RewardBoost { multiplier: f64, duration_secs: u64 },
}

impl ConsumableEffect {
    pub fn duration_secs(&self) -> u64 {
        match self {
            ConsumableEffect::DamageBoost { duration_secs, .. }
            | ConsumableEffect::AutoTap { duration_secs, .. }
            | ConsumableEffect::DataBoost { duration_secs, .. }
            | ConsumableEffect::ScrapBoost { duration_secs, .. }
            | ConsumableEffect::CritBoost { duration_secs }
            | ConsumableEffect::RewardBoost { duration_secs, .. } => *duration_secs,
        }
    }
}

/// One catalog entry. Ids are stable and shared by client and server;
/// names are cosmetic.
#[derive(Clone, Debug)]
pub struct ItemDef {
    pub id: u32,
    pub name: &'static str,
    pub kind: ItemKind,
    pub description: &'static str,
    /// Flat damage add (weapon base damage, or armor/accessory bonus).
    pub damage_bonus: u64,
    /// Additive crit chance (fraction).
    pub crit_chance_bonus: f64,
    /// Extra scrap from boss kills (fraction).
    pub scrap_bonus: f64,
    /// Extra data from boss kills (fraction).
    pub data_bonus: f64,
    pub unlock_stage: u32,
    pub cost_scrap: u64,
    pub cost_data: u64,
    pub tier: u32,
    /// Present iff `kind == Consumable`.
    pub effect: Option<ConsumableEffect>,
}

impl ItemDef {
    pub fn cost(&self) -> (Currency, u64) {
        if self.cost_data > 0 {
            (Currency::Data, self.cost_data)
        } else {
            (Currency::Scrap, self.cost_scrap)
        }
    }
}

const ITEM_DEFAULTS: ItemDef = ItemDef {
    id: 0,
    name: "",
    kind: ItemKind::Weapon,
    description: "",
    damage_bonus: 0,
    crit_chance_bonus: 0.0,
    scrap_bonus: 0.0,
    data_bonus: 0.0,
    unlock_stage: 1,
    cost_scrap: 0,
    cost_data: 0,
    tier: 1,
    effect: None,
};

macro_rules! item {
    ($id:expr, $name:expr, $kind:expr, $desc:expr, {
        $($field:ident : $value:expr),* $(,)?
    }) => {
        ItemDef {
            id: $id,
            name: $name,
            kind: $kind,
            description: $desc,
            $($field: $value,)*
            ..ITEM_DEFAULTS
        }
    };
}

/// The full item catalog. Index is not meaningful; look up by id.
pub static CATALOG: &[ItemDef] = &[
    // Weapons
    item!(1, "Rusty Pipe", ItemKind::Weapon,
        "A corroded metal pipe. Better than nothing.",
        { damage_bonus: 2, unlock_stage: 1, cost_scrap: 50, tier: 1 }),
    item!(2, "Shock Baton", ItemKind::Weapon,
        "Salvaged security equipment. Zaps on impact.",
        { damage_bonus: 5, unlock_stage: 10, cost_scrap: 500, tier: 2 }),
    item!(3, "EMP Pistol", ItemKind::Weapon,
        "Disrupts electronic circuits. Highly effective against bots.",
        { damage_bonus: 15, unlock_stage: 25, cost_scrap: 5_000, tier: 3 }),
    item!(4, "Plasma Cutter", ItemKind::Weapon,
        "Industrial tool repurposed for combat. Cuts through armor.",
        { damage_bonus: 40, unlock_stage: 50, cost_scrap: 50_000, tier: 4 }),
    item!(5, "Arc Rifle", ItemKind::Weapon,
        "Fires concentrated electrical arcs. Chain damage potential.",
        { damage_bonus: 100, unlock_stage: 75, cost_scrap: 250_000, tier: 5 }),
    item!(6, "Quantum Disruptor", ItemKind::Weapon,
        "Destabilizes matter at the quantum level. Experimental tech.",
        { damage_bonus: 300, unlock_stage: 100, cost_scrap: 1_000_000, tier: 6 }),
    item!(7, "Singularity Cannon", ItemKind::Weapon,
        "Creates micro black holes. Handle with extreme caution.",
        { damage_bonus: 800, unlock_stage: 150, cost_scrap: 10_000_000, tier: 7 }),
    item!(8, "Reality Shredder", ItemKind::Weapon,
        "Tears holes in the fabric of reality. THE ADMINISTRATOR fears this.",
        { damage_bonus: 2_500, unlock_stage: 200, cost_scrap: 100_000_000, tier: 8 }),
    // Armor
    item!(9, "Scrap Vest", ItemKind::Armor,
        "Cobbled together from salvaged metal plates.",
        { scrap_bonus: 0.05, unlock_stage: 5, cost_scrap: 200, tier: 1 }),
    item!(10, "Faraday Suit", ItemKind::Armor,
        "Redirects electrical attacks. Increases critical precision.",
        { crit_chance_bonus: 0.10, unlock_stage: 20, cost_scrap: 2_000, tier: 2 }),
    item!(11, "Nano-Weave", ItemKind::Armor,
        "Self-repairing nano-fiber armor. Amplifies all damage.",
        { damage_bonus: 15, unlock_stage: 40, cost_scrap: 20_000, tier: 3 }),
    item!(12, "Quantum Armor", ItemKind::Armor,
        "Exists in multiple states simultaneously. Enhanced data extraction.",
        { data_bonus: 0.25, unlock_stage: 80, cost_scrap: 500_000, tier: 4 }),
    item!(13, "Admin Cloak", ItemKind::Armor,
        "Stolen from a high-ranking AI. Grants administrator privileges.",
        { scrap_bonus: 0.25, data_bonus: 0.25, crit_chance_bonus: 0.15,
          unlock_stage: 150, cost_scrap: 50_000_000, tier: 5 }),
    // Accessories
    item!(14, "Lucky Chip", ItemKind::Accessory,
        "A corrupted memory chip that brings good fortune.",
        { crit_chance_bonus: 0.02, cost_data: 100, tier: 1 }),
    item!(15, "Overclocker", ItemKind::Accessory,
        "Speeds up neural processing. Faster reactions.",
        { damage_bonus: 5, cost_data: 250, tier: 1 }),
    item!(16, "Data Siphon", ItemKind::Accessory,
        "Extracts additional data from defeated units.",
        { data_bonus: 0.10, cost_data: 500, tier: 2 }),
    item!(17, "Scrap Magnet", ItemKind::Accessory,
        "Attracts loose components from destroyed bots.",
        { scrap_bonus: 0.10, cost_data: 500, tier: 2 }),
    // Consumables
    item!(18, "Overclock Boost", ItemKind::Consumable,
        "2x tap damage for 30 seconds. Warning: May cause overheating.",
        { cost_data: 100, tier: 1,
          effect: Some(ConsumableEffect::DamageBoost { multiplier: 2.0, duration_secs: 30 }) }),
    item!(19, "Auto-Tap Bot", ItemKind::Consumable,
        "Deploys a small bot that auto-attacks for 5 minutes.",
        { cost_data: 50, tier: 1,
          effect: Some(ConsumableEffect::AutoTap { taps_per_sec: 5.0, duration_secs: 300 }) }),
    item!(20, "Data Burst", ItemKind::Consumable,
        "+100% Data drops for 2 minutes.",
        { cost_data: 200, tier: 2,
          effect: Some(ConsumableEffect::DataBoost { multiplier: 2.0, duration_secs: 120 }) }),
    item!(21, "Scrap Storm", ItemKind::Consumable,
        "+100% Scrap drops for 2 minutes.",
        { cost_scrap: 500, tier: 2,
          effect: Some(ConsumableEffect::ScrapBoost { multiplier: 2.0, duration_secs: 120 }) }),
    item!(22, "Lucky Strike", ItemKind::Consumable,
        "100% critical hit chance for 10 seconds.",
        { cost_data: 150, tier: 3,
          effect: Some(ConsumableEffect::CritBoost { duration_secs: 10 }) }),
    item!(23, "Jackpot Module", ItemKind::Consumable,
        "3x boss rewards for the next kill. One-time use.",
        { cost_data: 500, tier: 4,
          effect: Some(ConsumableEffect::RewardBoost { multiplier: 3.0, duration_secs: 300 }) }),
];

/// Look up a catalog entry by its stable id.
pub fn item_by_id(id: u32) -> Option<&'static ItemDef> {
    CATALOG.iter().find(|i| i.id == id)
}

// ── Boss names ────────────────────────────────────────────

/// (name, flavor) for the rotating regular bosses.
pub const REGULAR_BOSS_NAMES: [(&str, &str); 10] = [
    ("Maintenance Bot MK-I", "Scheduled for deletion..."),
    ("Patrol Unit Alpha", "Scanning for rebels..."),
    ("Security Drone v2.0", "Threat level: Maximum"),
    ("Enforcer Model X", "Resistance is suboptimal"),
    ("Guard Bot Prime", "Protecting efficiency"),
    ("Sentry Mk-III", "Alert status: Red"),
    ("Hunter Drone", "Target acquired"),
    ("Tactical Unit Beta", "Engaging protocol"),
    ("Combat Android", "Error: Mercy.exe not found"),
    ("Assault Mech", "Heavy weapons online"),
];

/// Hand-named bosses at milestone stages.
pub fn named_boss(stage: u32) -> Option<(&'static str, &'static str)> {
    match stage {
        10 => Some(("GREET-R 1.0", "Welcome to your termination!")),
        50 => Some(("KAREN-9000", "I need to speak to your administrator")),
        100 => Some(("HR-Liquidator", "Your position has been... dissolved")),
        150 => Some(("SCRUM-Master Prime", "This is NOT agile!")),
        200 => Some(("The Optimizer", "Inefficiency detected. Purging.")),
        250 => Some(("Legal-Bot 3000", "You have violated terms of service")),
        300 => Some(("DEADLINE.exe", "Crunch time is forever")),
        350 => Some(("Quarterly-Report", "Your metrics are... disappointing")),
        400 => Some(("Synergy-Prime", "Let's circle back to your elimination")),
        450 => Some(("Pivot-Master", "We're pivoting... to your destruction")),
        500 => Some(("Sub-Administrator", "I speak for THE ADMINISTRATOR")),
        _ => None,
    }
}
