//! Combat logic — pure functions over client state, fully testable.
//!
//! The only nondeterminism is the crit roll, and the `Rng` comes in from
//! the caller, so tests drive everything with a seeded generator.

use rand::Rng;

use crate::catalog::{ConsumableEffect, UpgradeType};
use crate::effects::EffectKind;
use crate::formulas::{self, TapInput};
use crate::state::{Boss, ClientState};

/// Result of one resolved tap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TapOutcome {
    pub damage: u64,
    pub critical: bool,
    /// The boss reached 0 HP on this tap. Rewards are not credited yet;
    /// that happens in `settle_defeat`.
    pub boss_downed: bool,
}

/// Rewards credited for a boss kill, after all multipliers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DefeatRewards {
    pub stage: u32,
    pub scrap: u64,
    pub data: u64,
}

/// Resolve a manual tap against the current boss.
pub fn tap(state: &mut ClientState, rng: &mut impl Rng, now_ms: u64) -> TapOutcome {
    let forced_crit = state.effects.is_active(EffectKind::CritBoost, now_ms);
    let chance = formulas::crit_chance(
        state.upgrade_level(UpgradeType::CritChance),
        state.gear_crit_bonus(),
    );
    let is_critical = forced_crit || rng.gen::<f64>() < chance;

    let damage = formulas::tap_damage(&TapInput {
        weapon_damage: state.gear_damage(),
        tap_power_level: state.upgrade_level(UpgradeType::TapPower),
        perm_damage_level: state.upgrade_level(UpgradeType::PermStartingDamage),
        damage_boost: state.effects.multiplier(EffectKind::DamageBoost, now_ms),
        crit_damage_level: state.upgrade_level(UpgradeType::CritDamage),
        is_critical,
    });

    apply_damage(state, damage);
    state.progress.total_taps += 1;
    state.prestige.lifetime_taps += 1;

    TapOutcome {
        damage,
        critical: is_critical,
        boss_downed: state.boss.is_defeated(),
    }
}

/// Automatic taps from auto-tap bots: never crit, ignore damage boosts.
/// `taps` fractional rates are folded into one floored hit per second.
pub fn auto_tap(state: &mut ClientState, taps_per_sec: f64) -> u64 {
    if taps_per_sec <= 0.0 {
        return 0;
    }
    let damage = formulas::tap_damage(&TapInput {
        weapon_damage: state.gear_damage(),
        tap_power_level: state.upgrade_level(UpgradeType::TapPower),
        perm_damage_level: state.upgrade_level(UpgradeType::PermStartingDamage),
        damage_boost: taps_per_sec,
        crit_damage_level: 0,
        is_critical: false,
    });
    apply_damage(state, damage);
    let taps = taps_per_sec.floor() as u64;
    state.progress.total_taps += taps;
    state.prestige.lifetime_taps += taps;
    damage
}

fn apply_damage(state: &mut ClientState, damage: u64) {
    state.boss.hp = state.boss.hp.saturating_sub(damage);
    if damage > state.prestige.highest_damage_hit {
        state.prestige.highest_damage_hit = damage;
    }
}

/// Credit a downed boss and advance to the next stage.
///
/// Idempotent per stage: a stage at or below `highest_defeated_stage` has
/// already paid out, so a replayed defeat only regenerates the boss and
/// credits nothing.
pub fn settle_defeat(state: &mut ClientState, now_ms: u64) -> Option<DefeatRewards> {
    if !state.boss.is_defeated() {
        return None;
    }
    let stage = state.boss.stage;
    if stage <= state.progress.highest_defeated_stage {
        state.boss = Boss::for_stage(state.progress.stage);
        return None;
    }
    state.progress.highest_defeated_stage = stage;

    let drop_mult = 1.0 + formulas::upgrade_effect(UpgradeType::DropRate, state.upgrade_level(UpgradeType::DropRate));
    let reward_boost = state.effects.multiplier(EffectKind::RewardBoost, now_ms);
    let scrap_mult = state.effects.multiplier(EffectKind::ScrapBoost, now_ms);
    let data_mult = state.effects.multiplier(EffectKind::DataBoost, now_ms);

    let scrap = (state.boss.scrap_reward as f64
        * drop_mult
        * state.gear_scrap_mult()
        * scrap_mult
        * reward_boost)
        .floor() as u64;
    let data = (state.boss.data_reward as f64
        * drop_mult
        * state.gear_data_mult()
        * data_mult
        * reward_boost)
        .floor() as u64;

    state.progress.scrap += scrap as f64;
    state.progress.data += data as f64;
    state.prestige.lifetime_scrap += scrap;
    state.prestige.lifetime_data += data;
    state.progress.bosses_killed += 1;
    state.prestige.lifetime_bosses_killed += 1;

    // Reward boosts are spent on the kill even if time remains.
    state.effects.consume(EffectKind::RewardBoost);

    state.progress.stage = stage + 1;
    if state.progress.stage > state.progress.highest_stage {
        state.progress.highest_stage = state.progress.stage;
    }
    state.boss = Boss::for_stage(state.progress.stage);

    Some(DefeatRewards { stage, scrap, data })
}

/// What a skill does when triggered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SkillEffect {
    /// Immediate damage as a fraction of the boss's max HP. Applied once,
    /// never stored.
    InstantDamage { fraction: f64 },
    /// A timed buff, same machinery as consumables.
    Buff(ConsumableEffect),
}

/// Trigger a skill. Returns the instant damage dealt (0 for buffs).
pub fn use_skill(state: &mut ClientState, skill: &SkillEffect, now_ms: u64) -> u64 {
    match skill {
        SkillEffect::InstantDamage { fraction } => {
            let damage = (state.boss.max_hp as f64 * fraction).floor() as u64;
            apply_damage(state, damage);
            damage
        }
        SkillEffect::Buff(effect) => {
            state.effects.activate(effect, now_ms);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectKind;
    use crate::state::Upgrade;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn tap_damages_boss_and_counts() {
        let mut state = ClientState::default();
        let hp_before = state.boss.hp;
        let outcome = tap(&mut state, &mut rng(), 0);
        assert!(outcome.damage >= 1);
        assert_eq!(state.boss.hp, hp_before - outcome.damage);
        assert_eq!(state.progress.total_taps, 1);
        assert_eq!(state.prestige.lifetime_taps, 1);
    }

    #[test]
    fn crit_boost_forces_crits() {
        let mut state = ClientState::default();
        state.effects.add(EffectKind::CritBoost, 1.0, 10, 0);
        let mut r = rng();
        for _ in 0..20 {
            let outcome = tap(&mut state, &mut r, 0);
            assert!(outcome.critical);
        }
    }

    #[test]
    fn damage_boost_multiplies_taps() {
        let mut base = ClientState::default();
        let mut boosted = ClientState::default();
        boosted.effects.add(EffectKind::DamageBoost, 2.0, 30, 0);
        // No crit variance: compare with crit chance effectively disabled
        // by checking non-crit outcomes from the same seed.
        let a = tap(&mut base, &mut rng(), 0);
        let b = tap(&mut boosted, &mut rng(), 0);
        assert_eq!(a.critical, b.critical);
        if !a.critical {
            assert_eq!(b.damage, a.damage * 2);
        }
    }

    #[test]
    fn highest_damage_hit_tracked() {
        let mut state = ClientState::default();
        state.upgrades.push(Upgrade {
            upgrade_type: UpgradeType::TapPower,
            level: 50,
        });
        let outcome = tap(&mut state, &mut rng(), 0);
        assert_eq!(state.prestige.highest_damage_hit, outcome.damage);
    }

    #[test]
    fn settle_defeat_credits_once_and_advances() {
        let mut state = ClientState::default();
        state.boss.hp = 0;
        let rewards = settle_defeat(&mut state, 0).unwrap();
        assert_eq!(rewards.stage, 1);
        assert_eq!(rewards.scrap, 10);
        assert_eq!(rewards.data, 0);
        assert_eq!(state.progress.stage, 2);
        assert_eq!(state.progress.highest_stage, 2);
        assert_eq!(state.progress.bosses_killed, 1);
        assert_eq!(state.boss.stage, 2);
        assert_eq!(state.boss.hp, state.boss.max_hp);
        assert!((state.progress.scrap - 10.0).abs() < 0.001);
    }

    #[test]
    fn settle_defeat_stage_nine_to_ten() {
        let mut state = ClientState::default();
        state.progress.stage = 9;
        state.progress.highest_stage = 9;
        state.progress.highest_defeated_stage = 8;
        state.boss = Boss::for_stage(9);
        state.boss.hp = 0;

        let rewards = settle_defeat(&mut state, 0).unwrap();
        // Rewards are for the cleared stage: data only starts at 10.
        assert_eq!(rewards.scrap, formulas::scrap_reward(9));
        assert_eq!(rewards.data, 0);
        assert_eq!(state.progress.stage, 10);
        assert_eq!(state.boss.hp, formulas::boss_hp(10));
        assert!(state.boss.is_mini);
    }

    #[test]
    fn settle_defeat_noop_when_boss_alive() {
        let mut state = ClientState::default();
        assert!(settle_defeat(&mut state, 0).is_none());
        assert_eq!(state.progress.stage, 1);
    }

    #[test]
    fn settle_defeat_replay_is_idempotent() {
        let mut state = ClientState::default();
        state.boss.hp = 0;
        assert!(settle_defeat(&mut state, 0).is_some());

        // A stale defeat notification for stage 1 arrives again.
        state.boss = Boss::for_stage(1);
        state.boss.hp = 0;
        assert!(settle_defeat(&mut state, 0).is_none());
        assert_eq!(state.progress.bosses_killed, 1);
        assert_eq!(state.progress.stage, 2);
        assert_eq!(state.boss.stage, 2);
    }

    #[test]
    fn settle_defeat_applies_reward_multipliers() {
        let mut state = ClientState::default();
        state.upgrades.push(Upgrade {
            upgrade_type: UpgradeType::DropRate,
            level: 4, // +20%
        });
        state.effects.add(EffectKind::ScrapBoost, 2.0, 120, 0);
        state.effects.add(EffectKind::RewardBoost, 3.0, 300, 0);
        state.boss.hp = 0;
        let rewards = settle_defeat(&mut state, 0).unwrap();
        // 10 * 1.2 * 2.0 * 3.0 = 72
        assert_eq!(rewards.scrap, 72);
        // Reward boost consumed by the kill
        assert!(!state.effects.is_active(EffectKind::RewardBoost, 0));
        assert!(state.effects.is_active(EffectKind::ScrapBoost, 0));
    }

    #[test]
    fn auto_tap_never_crits_and_scales_with_rate() {
        let mut state = ClientState::default();
        let damage = auto_tap(&mut state, 5.0);
        // (1 + 0) * 5 = 5
        assert_eq!(damage, 5);
        assert_eq!(state.progress.total_taps, 5);
        assert_eq!(auto_tap(&mut state, 0.0), 0);
    }

    #[test]
    fn instant_skill_damages_from_max_hp() {
        let mut state = ClientState::default();
        let dealt = use_skill(&mut state, &SkillEffect::InstantDamage { fraction: 0.25 }, 0);
        assert_eq!(dealt, 25);
        assert_eq!(state.boss.hp, 75);
        assert!(state.effects.is_empty());
    }

    #[test]
    fn buff_skill_stores_effect() {
        let mut state = ClientState::default();
        let dealt = use_skill(
            &mut state,
            &SkillEffect::Buff(ConsumableEffect::DamageBoost {
                multiplier: 2.0,
                duration_secs: 30,
            }),
            0,
        );
        assert_eq!(dealt, 0);
        assert!(state.effects.is_active(EffectKind::DamageBoost, 0));
    }
}
