//! Economy and combat formulas — pure functions, fully testable.
//!
//! Everything here is deterministic: the crit roll happens in `combat`,
//! which passes the outcome in. All floor/clamp points are explicit so
//! client and server agree bit-for-bit.

use crate::catalog::{
    MachineType, UpgradeType, BASE_BOSS_HP, BASE_CRIT_MULTIPLIER, BASE_DAMAGE,
    HP_SCALE_PER_STAGE, OFFLINE_CAP_HOURS, REWARD_SCALE_PER_STAGE, WEAPON_UPGRADE_BASE_COST,
};

// ── Boss scaling ──────────────────────────────────────────

/// Difficulty/reward multiplier by stage rank: major (x100), named (x50),
/// mini (x10), regular.
pub fn boss_multiplier(stage: u32) -> f64 {
    if stage % 100 == 0 {
        10.0
    } else if stage % 50 == 0 {
        5.0
    } else if stage % 10 == 0 {
        2.0
    } else {
        1.0
    }
}

/// Saturates at `u64::MAX` around stage 350, the same ceiling as the
/// f64 currency precision.
pub fn boss_hp(stage: u32) -> u64 {
    let scaled = BASE_BOSS_HP * HP_SCALE_PER_STAGE.powi(stage as i32 - 1);
    (scaled * boss_multiplier(stage)).floor() as u64
}

pub fn scrap_reward(stage: u32) -> u64 {
    let scaled = 10.0 * REWARD_SCALE_PER_STAGE.powi(stage as i32 - 1);
    (scaled * boss_multiplier(stage)).floor() as u64
}

/// Data drops only from stage 10 on, with a 1.5x boss-rank premium.
pub fn data_reward(stage: u32) -> u64 {
    if stage < 10 {
        return 0;
    }
    let scaled = 5.0 * 1.06_f64.powi(stage as i32 - 10);
    (scaled * boss_multiplier(stage) * 1.5).floor() as u64
}

// ── Tap damage ────────────────────────────────────────────

/// Inputs to a single tap. The crit decision is made by the caller.
#[derive(Clone, Copy, Debug)]
pub struct TapInput {
    /// Equipped weapon damage at its upgrade level, plus flat gear bonuses.
    pub weapon_damage: u64,
    pub tap_power_level: u32,
    pub perm_damage_level: u32,
    /// Product of active damage-boost effects (1.0 when none).
    pub damage_boost: f64,
    pub crit_damage_level: u32,
    pub is_critical: bool,
}

/// Damage of one tap. Floored, never below 1.
pub fn tap_damage(input: &TapInput) -> u64 {
    let tap_power_mult = 1.0 + input.tap_power_level as f64 * 0.10;
    let perm_damage_mult = 1.0 + input.perm_damage_level as f64 * 0.25;
    let crit_mult = if input.is_critical {
        BASE_CRIT_MULTIPLIER + input.crit_damage_level as f64 * 0.10
    } else {
        1.0
    };
    let base = BASE_DAMAGE + input.weapon_damage as f64;
    let damage =
        (base * tap_power_mult * perm_damage_mult * input.damage_boost * crit_mult).floor();
    (damage as u64).max(1)
}

/// Crit chance for a tap: base + upgrade levels + equipment bonuses.
pub fn crit_chance(crit_chance_level: u32, equip_bonus: f64) -> f64 {
    crate::catalog::BASE_CRIT_CHANCE + crit_chance_level as f64 * 0.01 + equip_bonus
}

// ── Weapons ───────────────────────────────────────────────

/// Weapon damage grows +20% of base per upgrade level, floored.
pub fn weapon_damage_at_level(base_damage: u64, upgrade_level: u32) -> u64 {
    (base_damage as f64 * (1.0 + 0.2 * upgrade_level as f64)).floor() as u64
}

/// Upgrade cost: 500 scrap doubled per weapon tier, then x1.5 per level.
pub fn weapon_upgrade_cost(tier: u32, upgrade_level: u32) -> u64 {
    let base = (WEAPON_UPGRADE_BASE_COST * (1 << (tier.saturating_sub(1)))) as f64;
    (base * 1.5_f64.powi(upgrade_level as i32)).floor() as u64
}

// ── Machines ──────────────────────────────────────────────

/// Output per second. Zero at level 0; doubles each level after the first.
pub fn machine_production(ty: MachineType, level: u32) -> f64 {
    if level == 0 {
        return 0.0;
    }
    ty.base_production() * 2.0_f64.powi(level as i32 - 1)
}

/// Cost of the next level.
pub fn machine_cost(ty: MachineType, current_level: u32) -> u64 {
    if current_level == 0 {
        return ty.base_cost();
    }
    (ty.base_cost() as f64 * ty.cost_scale().powi(current_level as i32)).floor() as u64
}

// ── Upgrades ──────────────────────────────────────────────

/// Cost of the next level.
pub fn upgrade_cost(ty: UpgradeType, current_level: u32) -> u64 {
    (ty.base_cost() as f64 * ty.cost_scale().powi(current_level as i32)).floor() as u64
}

/// Total effect at a level (linear).
pub fn upgrade_effect(ty: UpgradeType, level: u32) -> f64 {
    ty.effect_per_level() * level as f64
}

// ── Idle production ───────────────────────────────────────

/// Combined per-second output of all machines.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IdleProduction {
    pub scrap_per_sec: f64,
    pub data_per_sec: f64,
    /// Auto-turret damage per second against the current boss.
    pub dps: f64,
}

impl IdleProduction {
    pub fn is_zero(&self) -> bool {
        self.scrap_per_sec == 0.0 && self.data_per_sec == 0.0 && self.dps == 0.0
    }
}

/// Aggregate machine output with idle-power, permanent-idle and
/// efficiency-bot multipliers applied.
pub fn total_idle_production(
    machine_levels: &[(MachineType, u32)],
    idle_power_level: u32,
    perm_idle_level: u32,
) -> IdleProduction {
    let idle_mult = 1.0 + idle_power_level as f64 * 0.10 + perm_idle_level as f64 * 0.10;
    let efficiency_mult = 1.0
        + machine_levels
            .iter()
            .find(|(ty, _)| *ty == MachineType::EfficiencyBot)
            .map(|(_, level)| machine_production(MachineType::EfficiencyBot, *level))
            .unwrap_or(0.0);

    let mut out = IdleProduction::default();
    for (ty, level) in machine_levels {
        let production = machine_production(*ty, *level);
        match ty {
            MachineType::ScrapCollector => out.scrap_per_sec += production,
            MachineType::DataMiner => out.data_per_sec += production,
            MachineType::AutoTurret => out.dps += production,
            MachineType::EfficiencyBot => {}
        }
    }
    out.scrap_per_sec *= idle_mult * efficiency_mult;
    out.data_per_sec *= idle_mult * efficiency_mult;
    out.dps *= idle_mult * efficiency_mult;
    out
}

// ── Offline earnings ──────────────────────────────────────

/// What accrued while the player was away.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OfflineEarnings {
    pub scrap: u64,
    pub data: u64,
    /// Auto-turret damage accumulated against the current boss.
    pub boss_damage: u64,
    pub seconds_away: u64,
    pub credited_seconds: u64,
    pub was_capped: bool,
}

/// Storage window in seconds: base hours by storage level, plus one hour
/// per permanent storage level.
pub fn offline_cap_secs(storage_level: u32, perm_storage_level: u32) -> u64 {
    let idx = (storage_level.saturating_sub(1) as usize).min(OFFLINE_CAP_HOURS.len() - 1);
    (OFFLINE_CAP_HOURS[idx] + perm_storage_level as u64) * 3600
}

/// Earnings for a stretch of absence, capped at the storage window.
pub fn offline_earnings(
    seconds_away: u64,
    production: &IdleProduction,
    cap_secs: u64,
) -> OfflineEarnings {
    let credited = seconds_away.min(cap_secs);
    let secs = credited as f64;
    OfflineEarnings {
        scrap: (production.scrap_per_sec * secs).floor() as u64,
        data: (production.data_per_sec * secs).floor() as u64,
        boss_damage: (production.dps * secs).floor() as u64,
        seconds_away,
        credited_seconds: credited,
        was_capped: seconds_away > cap_secs,
    }
}

// ── Prestige ──────────────────────────────────────────────

/// Core fragments earned by a reboot: sqrt(stage / 10), floored, then the
/// prestige-bonus multiplier, floored again. Zero below stage 10.
pub fn core_fragments(highest_stage: u32, prestige_bonus_level: u32) -> u64 {
    if highest_stage < 10 {
        return 0;
    }
    let base = (highest_stage as f64 / 10.0).sqrt().floor();
    let bonus_mult = 1.0 + prestige_bonus_level as f64 * 0.10;
    (base * bonus_mult).floor() as u64
}

// ── Formatting ────────────────────────────────────────────

/// Short-suffix display formatting: 1.50K, 2.25M, ...
pub fn format_number(n: f64) -> String {
    if n >= 1e15 {
        format!("{:.2}Q", n / 1e15)
    } else if n >= 1e12 {
        format!("{:.2}T", n / 1e12)
    } else if n >= 1e9 {
        format!("{:.2}B", n / 1e9)
    } else if n >= 1e6 {
        format!("{:.2}M", n / 1e6)
    } else if n >= 1e3 {
        format!("{:.2}K", n / 1e3)
    } else if n.fract() > 0.05 {
        format!("{:.1}", n)
    } else {
        format!("{}", n.floor() as i64)
    }
}
