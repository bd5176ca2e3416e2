//! Engine configuration loaded from environment variables

/// Runtime tunables for the round engine
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port the server binds to
    pub port: u16,
    /// Default round duration for new rooms, in milliseconds
    pub round_ms: u64,
    /// Pause between the end of one round and the start of the next
    pub round_gap_ms: u64,
    /// How long the final leaderboard stays up before the next game auto-starts
    pub final_board_ms: u64,
    /// Wrong free-text attempts allowed before the round closes for a player
    pub text_lives: u32,
    /// Points for a correct multiple-choice answer
    pub choice_points: u32,
    /// Base points for a correct free-text answer, before the speed bonus
    pub text_points: u32,
    /// Maximum speed bonus, linearly decreasing with text-correct arrival rank
    pub text_speed_bonus_max: u32,
    /// Energy cost of revealing the multiple-choice options (0 = free until
    /// the intended cost is confirmed)
    pub energy_reveal_cost: u32,
    /// Energy regained on answering, capped at `energy_max`
    pub energy_regen: u32,
    pub energy_max: u32,
    /// Global ceiling on simulated players across all public rooms
    pub bot_global_max: usize,
    /// Interval of the background bot rebalance sweep, in seconds
    pub bot_sweep_secs: u64,
    /// Seed for the gameplay RNG; unset means OS entropy
    pub rng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 7225,
            round_ms: 20_000,
            round_gap_ms: 4_000,
            final_board_ms: 10_000,
            text_lives: 3,
            choice_points: 50,
            text_points: 100,
            text_speed_bonus_max: 50,
            energy_reveal_cost: 0,
            energy_regen: 10,
            energy_max: 100,
            bot_global_max: 60,
            bot_sweep_secs: 120,
            rng_seed: None,
        }
    }
}

impl Config {
    /// Load config from QUIZDEN_* environment variables, falling back to
    /// defaults for anything unset or unparsable
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let cfg = Self {
            port: env_parse("QUIZDEN_PORT", defaults.port),
            round_ms: env_parse("QUIZDEN_ROUND_MS", defaults.round_ms),
            round_gap_ms: env_parse("QUIZDEN_ROUND_GAP_MS", defaults.round_gap_ms),
            final_board_ms: env_parse("QUIZDEN_FINAL_BOARD_MS", defaults.final_board_ms),
            text_lives: env_parse("QUIZDEN_TEXT_LIVES", defaults.text_lives),
            choice_points: env_parse("QUIZDEN_CHOICE_POINTS", defaults.choice_points),
            text_points: env_parse("QUIZDEN_TEXT_POINTS", defaults.text_points),
            text_speed_bonus_max: env_parse(
                "QUIZDEN_TEXT_SPEED_BONUS_MAX",
                defaults.text_speed_bonus_max,
            ),
            energy_reveal_cost: env_parse(
                "QUIZDEN_ENERGY_REVEAL_COST",
                defaults.energy_reveal_cost,
            ),
            energy_regen: env_parse("QUIZDEN_ENERGY_REGEN", defaults.energy_regen),
            energy_max: env_parse("QUIZDEN_ENERGY_MAX", defaults.energy_max),
            bot_global_max: env_parse("QUIZDEN_BOT_GLOBAL_MAX", defaults.bot_global_max),
            bot_sweep_secs: env_parse("QUIZDEN_BOT_SWEEP_SECS", defaults.bot_sweep_secs),
            rng_seed: std::env::var("QUIZDEN_RNG_SEED")
                .ok()
                .and_then(|s| s.trim().parse().ok()),
        };

        if cfg.rng_seed.is_some() {
            tracing::warn!("QUIZDEN_RNG_SEED is set - gameplay RNG is deterministic");
        }
        cfg
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
