//! Simulated players
//!
//! Bots carry a speed, per-theme skills, and per-daypart availability.
//! The decision model turns (skill, question difficulty) into an outcome
//! and an answer delay; the population controller keeps public rooms
//! stocked following a diurnal traffic curve.

pub mod decision;
pub mod population;

use crate::types::{BotProfile, DayPart};
use std::collections::HashMap;

/// Build one profile from compact tuples
fn profile(
    id: &str,
    name: &str,
    speed: u8,
    skills: &[(&str, u8)],
    availability: [f64; 4],
) -> BotProfile {
    let [morning, afternoon, evening, night] = availability;
    BotProfile {
        id: id.to_string(),
        name: name.to_string(),
        speed,
        skills: skills
            .iter()
            .map(|(theme, v)| (theme.to_string(), *v))
            .collect(),
        availability: HashMap::from([
            (DayPart::Morning, morning),
            (DayPart::Afternoon, afternoon),
            (DayPart::Evening, evening),
            (DayPart::Night, night),
        ]),
    }
}

/// The built-in bot roster. Skills skew toward one or two themes each so
/// rooms feel populated by people with interests, not clones.
pub fn default_catalog() -> Vec<BotProfile> {
    vec![
        profile(
            "bot-ada",
            "Ada",
            82,
            &[("science", 88), ("history", 60), ("misc", 55)],
            [0.7, 0.6, 0.8, 0.2],
        ),
        profile(
            "bot-marco",
            "Marco",
            45,
            &[("geography", 85), ("sports", 40), ("misc", 50)],
            [0.3, 0.7, 0.9, 0.3],
        ),
        profile(
            "bot-june",
            "June",
            68,
            &[("cinema", 80), ("music", 75), ("misc", 45)],
            [0.2, 0.5, 0.95, 0.6],
        ),
        profile(
            "bot-ravi",
            "Ravi",
            55,
            &[("sports", 90), ("misc", 40)],
            [0.8, 0.6, 0.7, 0.1],
        ),
        profile(
            "bot-elsa",
            "Elsa",
            74,
            &[("literature", 85), ("history", 70), ("misc", 55)],
            [0.6, 0.4, 0.7, 0.4],
        ),
        profile(
            "bot-theo",
            "Theo",
            30,
            &[("history", 65), ("misc", 35)],
            [0.5, 0.5, 0.6, 0.8],
        ),
        profile(
            "bot-mina",
            "Mina",
            88,
            &[("music", 82), ("cinema", 60), ("misc", 58)],
            [0.4, 0.8, 0.9, 0.5],
        ),
        profile(
            "bot-oscar",
            "Oscar",
            52,
            &[("science", 70), ("geography", 65), ("misc", 48)],
            [0.7, 0.7, 0.5, 0.2],
        ),
        profile(
            "bot-lena",
            "Lena",
            63,
            &[("misc", 62)],
            [0.5, 0.6, 0.8, 0.3],
        ),
        profile(
            "bot-yuki",
            "Yuki",
            77,
            &[("cinema", 72), ("literature", 55), ("misc", 50)],
            [0.2, 0.4, 0.8, 0.9],
        ),
        profile(
            "bot-piotr",
            "Piotr",
            40,
            &[("geography", 78), ("history", 58), ("misc", 42)],
            [0.6, 0.5, 0.6, 0.5],
        ),
        profile(
            "bot-carmen",
            "Carmen",
            59,
            &[("sports", 68), ("music", 66), ("misc", 52)],
            [0.4, 0.9, 0.8, 0.2],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_unique_ids() {
        let bots = default_catalog();
        let mut ids: Vec<_> = bots.iter().map(|b| b.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), bots.len());
    }

    #[test]
    fn test_every_bot_has_a_misc_fallback() {
        for bot in default_catalog() {
            assert!(bot.skills.contains_key("misc"), "{} lacks misc", bot.id);
        }
    }
}
