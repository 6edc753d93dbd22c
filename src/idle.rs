//! Idle production — live per-second ticks and offline collection.

use crate::formulas::OfflineEarnings;
use crate::state::ClientState;

/// What one idle tick produced.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IdleTickReport {
    pub scrap: f64,
    pub data: f64,
    pub turret_damage: u64,
    pub auto_tap_damage: u64,
    /// The boss reached 0 HP from passive damage this tick.
    pub boss_downed: bool,
}

/// Advance idle production by `seconds` of online time.
///
/// Currencies accumulate fractionally; boss damage is floored. Defeat is
/// reported but not settled; the caller decides when to credit it.
pub fn tick_idle(state: &mut ClientState, seconds: u64, now_ms: u64) -> IdleTickReport {
    if seconds == 0 {
        return IdleTickReport::default();
    }
    let production = state.idle_production();
    let secs = seconds as f64;

    let mut report = IdleTickReport {
        scrap: production.scrap_per_sec * secs,
        data: production.data_per_sec * secs,
        ..IdleTickReport::default()
    };
    state.progress.scrap += report.scrap;
    state.progress.data += report.data;

    report.turret_damage = (production.dps * secs).floor() as u64;
    state.boss.hp = state.boss.hp.saturating_sub(report.turret_damage);

    let rate = state.effects.auto_taps_per_sec(now_ms);
    if rate > 0.0 {
        for _ in 0..seconds {
            report.auto_tap_damage += crate::combat::auto_tap(state, rate);
        }
    }

    report.boss_downed = state.boss.is_defeated();
    report
}

/// Apply claimed offline earnings to the client state.
///
/// Turret damage hits the current boss but never advances the stage on
/// its own; a dead boss waits for the next settle.
pub fn apply_offline_earnings(state: &mut ClientState, earnings: &OfflineEarnings) {
    state.progress.scrap += earnings.scrap as f64;
    state.progress.data += earnings.data as f64;
    state.prestige.lifetime_scrap += earnings.scrap;
    state.prestige.lifetime_data += earnings.data;
    state.boss.hp = state.boss.hp.saturating_sub(earnings.boss_damage);
}
