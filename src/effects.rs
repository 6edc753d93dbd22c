//! Timed consumable effects.
//!
//! Same-kind effects stack multiplicatively. Expiry is wall-clock based:
//! queries ignore expired entries even before a sweep removes them, so a
//! late sweep can never change observable behavior.

use crate::catalog::ConsumableEffect;

/// Buff categories. One-shot effects (instant skill damage) are applied
/// immediately and never stored here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectKind {
    DamageBoost,
    AutoTap,
    DataBoost,
    ScrapBoost,
    CritBoost,
    RewardBoost,
}

/// One running buff.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActiveEffect {
    pub kind: EffectKind,
    /// Multiplier for boost kinds; taps per second for AutoTap;
    /// unused (1.0) for CritBoost.
    pub magnitude: f64,
    pub ends_at_ms: u64,
}

impl ActiveEffect {
    pub fn is_active(&self, now_ms: u64) -> bool {
        self.ends_at_ms > now_ms
    }
}

/// The set of currently running buffs.
#[derive(Clone, Debug, Default)]
pub struct EffectSet {
    effects: Vec<ActiveEffect>,
}

impl EffectSet {
    /// Start a catalog consumable's effect at `now_ms`.
    pub fn activate(&mut self, effect: &ConsumableEffect, now_ms: u64) {
        let (kind, magnitude) = match effect {
            ConsumableEffect::DamageBoost { multiplier, .. } => {
                (EffectKind::DamageBoost, *multiplier)
            }
            ConsumableEffect::AutoTap { taps_per_sec, .. } => (EffectKind::AutoTap, *taps_per_sec),
            ConsumableEffect::DataBoost { multiplier, .. } => (EffectKind::DataBoost, *multiplier),
            ConsumableEffect::ScrapBoost { multiplier, .. } => {
                (EffectKind::ScrapBoost, *multiplier)
            }
            ConsumableEffect::CritBoost { .. } => (EffectKind::CritBoost, 1.0),
            ConsumableEffect::RewardBoost { multiplier, .. } => {
                (EffectKind::RewardBoost, *multiplier)
            }
        };
        self.add(kind, magnitude, effect.duration_secs(), now_ms);
    }

    pub fn add(&mut self, kind: EffectKind, magnitude: f64, duration_secs: u64, now_ms: u64) {
        self.effects.push(ActiveEffect {
            kind,
            magnitude,
            ends_at_ms: now_ms + duration_secs * 1000,
        });
    }

    /// Drop expired effects. Returns false when nothing changed, so
    /// periodic sweeps can skip downstream work.
    pub fn sweep(&mut self, now_ms: u64) -> bool {
        let before = self.effects.len();
        self.effects.retain(|e| e.is_active(now_ms));
        self.effects.len() != before
    }

    /// Product of active magnitudes of one kind (1.0 when none).
    pub fn multiplier(&self, kind: EffectKind, now_ms: u64) -> f64 {
        self.effects
            .iter()
            .filter(|e| e.kind == kind && e.is_active(now_ms))
            .map(|e| e.magnitude)
            .product()
    }

    pub fn is_active(&self, kind: EffectKind, now_ms: u64) -> bool {
        self.effects
            .iter()
            .any(|e| e.kind == kind && e.is_active(now_ms))
    }

    /// Combined auto-tap rate across active bots.
    pub fn auto_taps_per_sec(&self, now_ms: u64) -> f64 {
        self.effects
            .iter()
            .filter(|e| e.kind == EffectKind::AutoTap && e.is_active(now_ms))
            .map(|e| e.magnitude)
            .sum()
    }

    /// Remove all effects of one kind regardless of remaining time.
    /// Used to consume reward boosts on a boss kill.
    pub fn consume(&mut self, kind: EffectKind) {
        self.effects.retain(|e| e.kind != kind);
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveEffect> {
        self.effects.iter()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}
