// File: ./src/model/reminder.rs
// Runs before the temporal resolver so "2 hours before" is not read as a duration.

use crate::config::EngineConfig;
use crate::model::item::ReminderSpec;
use crate::model::temporal::{
    parse_compact_amount, parse_compact_duration, parse_english_number, parse_unit,
};
use crate::model::tokenizer::TokenStream;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct ReminderMatch {
    pub reminder: ReminderSpec,
    pub consumed: BTreeSet<usize>,
}

const OFFSET_TAILS: &[&str] = &["before", "ahead", "early", "earlier", "prior", "beforehand"];

/// `rem:15m`, `rem:2h`, `rem:1d`
fn parse_shorthand(token: &str) -> Option<u32> {
    let val = token.strip_prefix("rem:")?;
    if let Some((amt, unit)) = parse_compact_amount(val) {
        return amt.checked_mul(unit.minutes());
    }
    parse_compact_duration(val)
}

/// Length of "remind me (to)" / "reminder" / "alert me" starting at `i`.
fn lead_in(tokens: &TokenStream, i: usize) -> usize {
    match (tokens.text(i), tokens.text(i + 1)) {
        ("remind", "me") | ("alert", "me") | ("notify", "me") | ("ping", "me") => 2,
        ("reminder", _) | ("remind", _) => 1,
        _ => 0,
    }
}

fn preset_at(tokens: &TokenStream, i: usize, config: &EngineConfig) -> Option<(u32, String, usize)> {
    config
        .reminder_presets()
        .iter()
        .find(|(words, _)| {
            words
                .iter()
                .enumerate()
                .all(|(k, w)| tokens.text(i + k) == w.as_str())
        })
        .map(|(words, mins)| (*mins, words.join(" "), words.len()))
}

/// "<N> <unit> before", "<N><unit> early", "an hour ahead"
fn offset_at(tokens: &TokenStream, i: usize) -> Option<(u32, usize)> {
    let (mins, head) = if let (Some(amt), Some(unit)) = (
        parse_english_number(tokens.text(i)),
        parse_unit(tokens.text(i + 1)),
    ) {
        (amt.checked_mul(unit.minutes())?, 2)
    } else if let Some((amt, unit)) = parse_compact_amount(tokens.text(i)) {
        (amt.checked_mul(unit.minutes())?, 1)
    } else {
        return None;
    };
    OFFSET_TAILS
        .contains(&tokens.text(i + head))
        .then_some((mins, head + 1))
}

pub fn resolve_reminder(tokens: &TokenStream, config: &EngineConfig) -> Option<ReminderMatch> {
    for i in 0..tokens.len() {
        let text = tokens.text(i);
        if let Some(mins) = parse_shorthand(text) {
            return Some(ReminderMatch {
                reminder: ReminderSpec::new_relative(mins),
                consumed: BTreeSet::from([i]),
            });
        }

        let lead = lead_in(tokens, i);
        let at = i + lead;
        // "remind me 10 minutes before", "with a reminder the day before"
        let found = preset_at(tokens, at, config)
            .map(|(mins, phrase, len)| (ReminderSpec::from_preset(&phrase, mins), len))
            .or_else(|| {
                offset_at(tokens, at).map(|(mins, len)| (ReminderSpec::new_relative(mins), len))
            });
        if let Some((reminder, len)) = found {
            // A lone preset like "on time" needs the lead-in to count.
            if lead == 0 && reminder.preset.is_some() && reminder.minutes_before == 0 {
                continue;
            }
            let mut first = i;
            // Swallow "with a" / "a" right before a bare preset: "with a reminder 1 hour before"
            if lead > 0 && first > 0 && tokens.text(first - 1) == "a" {
                first -= 1;
                if first > 0 && tokens.text(first - 1) == "with" {
                    first -= 1;
                }
            }
            log::trace!(
                "reminder '{}' -> {} min",
                tokens.joined(first..at + len),
                reminder.minutes_before
            );
            return Some(ReminderMatch {
                reminder,
                consumed: (first..at + len).collect(),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tokenizer::normalize;

    fn resolve(input: &str) -> Option<ReminderMatch> {
        resolve_reminder(&normalize(input), &EngineConfig::default())
    }

    #[test]
    fn offsets_and_presets() {
        let m = resolve("Dentist tomorrow at 3pm remind me 30 minutes before").unwrap();
        assert_eq!(m.reminder.minutes_before, 30);
        assert_eq!(m.consumed, BTreeSet::from([4, 5, 6, 7, 8]));

        let m = resolve("Exam Friday, the day before").unwrap();
        assert_eq!(m.reminder.minutes_before, 1440);
        assert_eq!(m.reminder.preset.as_deref(), Some("the day before"));

        let m = resolve("Call mom at 5 rem:15m").unwrap();
        assert_eq!(m.reminder.minutes_before, 15);
        assert_eq!(resolve("rem:1d").unwrap().reminder.minutes_before, 1440);
        assert_eq!(resolve("an hour early").unwrap().reminder.minutes_before, 60);
    }

    #[test]
    fn on_time_needs_lead_in() {
        assert!(resolve("Arrive on time for the meeting").is_none());
        let m = resolve("remind me on time").unwrap();
        assert_eq!(m.reminder.minutes_before, 0);
    }

    #[test]
    fn durations_are_not_reminders() {
        assert!(resolve("Study for 2 hours").is_none());
    }
}
