//! Bot answer decisions
//!
//! Given a bot's skill on the question's theme and the question's
//! difficulty bucket, draw a performance sample and map it onto the
//! same answer paths a human has: correct free text (full reward),
//! correct multiple choice (partial credit), or wrong. The delay keeps
//! bots strictly inside the round with a safety margin.

use crate::types::{BotProfile, Question};
use rand::Rng;

/// Minimum delay before a bot answers
pub const MIN_DELAY_MS: u64 = 120;
/// A bot never answers closer than this to the round deadline
pub const SAFETY_MARGIN_MS: u64 = 150;

/// Performance thresholds for difficulty buckets 1-4
const BUCKET_THRESHOLDS: [f64; 4] = [25.0, 45.0, 65.0, 85.0];

/// How far below the threshold still lands partial credit via choices
const CHOICE_WINDOW: f64 = 10.0;

/// Standard deviation of the performance draw around skill
const PERFORMANCE_SIGMA: f64 = 18.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BotOutcome {
    CorrectText,
    CorrectChoice,
    /// Wrong answer; `via_text` picks which path carries the miss
    Wrong { via_text: bool },
}

#[derive(Debug, Clone, Copy)]
pub struct BotDecision {
    pub outcome: BotOutcome,
    pub delay_ms: u64,
}

pub fn threshold_for_bucket(bucket: u8) -> f64 {
    let idx = usize::from(bucket.clamp(1, 4)) - 1;
    BUCKET_THRESHOLDS[idx]
}

/// Draw `x ~ Normal(skill, sigma)` clamped to [0,100] via Box-Muller
pub fn performance_draw<R: Rng>(skill: u8, rng: &mut R) -> f64 {
    let u1: f64 = rng.random_range(f64::EPSILON..1.0);
    let u2: f64 = rng.random_range(0.0..1.0);
    let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
    (f64::from(skill) + PERFORMANCE_SIGMA * z).clamp(0.0, 100.0)
}

/// Map a performance draw onto an outcome for the given bucket
pub fn outcome_for_draw<R: Rng>(draw: f64, skill: u8, bucket: u8, rng: &mut R) -> BotOutcome {
    let threshold = threshold_for_bucket(bucket);
    if draw > threshold {
        BotOutcome::CorrectText
    } else if threshold - draw <= CHOICE_WINDOW {
        BotOutcome::CorrectChoice
    } else {
        // Skilled bots attempt text even when they miss
        let p_text = 0.35 + 0.45 * f64::from(skill) / 100.0;
        BotOutcome::Wrong {
            via_text: rng.random_bool(p_text),
        }
    }
}

/// Answer delay: slower bots answer later on average, with +/-10% jitter,
/// always at least MIN_DELAY_MS and never past the safety margin.
pub fn answer_delay_ms<R: Rng>(
    speed: u8,
    round_ms: u64,
    remaining_ms: u64,
    rng: &mut R,
) -> u64 {
    let speed_factor = 1.0 - f64::from(speed.min(100)) / 100.0;
    let base = round_ms as f64 * (0.15 + speed_factor * 0.65);
    let jittered = base * rng.random_range(0.9..=1.1);

    let hi = remaining_ms.saturating_sub(SAFETY_MARGIN_MS).max(MIN_DELAY_MS);
    (jittered as u64).clamp(MIN_DELAY_MS, hi)
}

pub fn decide<R: Rng>(
    bot: &BotProfile,
    question: &Question,
    round_ms: u64,
    remaining_ms: u64,
    rng: &mut R,
) -> BotDecision {
    let skill = bot.skill_for(&question.theme);
    let draw = performance_draw(skill, rng);
    BotDecision {
        outcome: outcome_for_draw(draw, skill, question.difficulty, rng),
        delay_ms: answer_delay_ms(bot.speed, round_ms, remaining_ms, rng),
    }
}
