//! Bot population targets
//!
//! The global bot head-count follows a fixed 24-hour traffic curve with
//! a little jitter, then gets apportioned across open public rooms by
//! their traffic weight. The connect/disconnect probabilities live here
//! too; the engine samples them per bot when it rebalances a room.

use rand::Rng;

/// Fraction of the global maximum present at each hour of the day.
/// Trough around 04:00, ramp through the afternoon, peak at 21:00.
pub const HOURLY_TRAFFIC: [f64; 24] = [
    0.12, 0.08, 0.05, 0.04, 0.03, 0.04, 0.07, 0.12, 0.18, 0.24, 0.30, 0.36, 0.42, 0.45, 0.48,
    0.52, 0.58, 0.68, 0.80, 0.90, 0.97, 1.00, 0.75, 0.35,
];

/// Global bot target for the hour, jittered +/-5%
pub fn global_target<R: Rng>(global_max: usize, hour: u32, rng: &mut R) -> usize {
    let curve = HOURLY_TRAFFIC[(hour as usize) % 24];
    let jitter = rng.random_range(0.95..=1.05);
    (global_max as f64 * curve * jitter).round() as usize
}

/// Split the global target across rooms proportionally to their weights
/// (each clamped to [1,10]). Every share except the last is rounded; the
/// last room absorbs the remainder so the shares sum exactly.
pub fn apportion(global: usize, weights: &[f64]) -> Vec<usize> {
    if weights.is_empty() {
        return Vec::new();
    }
    let clamped: Vec<f64> = weights.iter().map(|w| w.clamp(1.0, 10.0)).collect();
    let total: f64 = clamped.iter().sum();

    let mut shares = Vec::with_capacity(clamped.len());
    let mut assigned = 0usize;
    for w in &clamped[..clamped.len() - 1] {
        let share = (global as f64 * w / total).round() as usize;
        let share = share.min(global - assigned);
        shares.push(share);
        assigned += share;
    }
    shares.push(global - assigned);
    shares
}

/// Chance a connected bot leaves when the room is over target.
/// Fatigue grows logarithmically with games played this session;
/// pressure grows with how far over target the room is.
pub fn disconnect_probability(games_played: u32, over_ratio: f64) -> f64 {
    let fatigue = 0.10 * (1.0 + f64::from(games_played)).ln();
    (0.08 + fatigue + 0.5 * over_ratio.max(0.0)).clamp(0.0, 0.95)
}

/// Per-sample +/-10% jitter on an availability weight, kept in [0,1].
/// Each candidate draws its own jitter, so identical profiles do not
/// join in lockstep.
pub fn jittered_availability<R: Rng>(availability: f64, rng: &mut R) -> f64 {
    (availability * rng.random_range(0.9..=1.1)).clamp(0.0, 1.0)
}

/// Chance a candidate bot joins when the room is under target,
/// scaled by its availability for the current day-part
pub fn connect_probability(need: usize, target: usize, availability: f64) -> f64 {
    if target == 0 {
        return 0.0;
    }
    let urgency = (need as f64 / target as f64).min(1.0);
    (0.15 + 0.6 * urgency).clamp(0.0, 0.95) * availability.clamp(0.0, 1.0)
}
