// File: ./src/model/item.rs
use crate::config::EngineConfig;
use crate::model::matcher::MatchConfidence;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{Display, EnumIter};

// --- CALLER-SUPPLIED ENTITIES ---

/// A category or course known to the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEntity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

impl NamedEntity {
    pub fn new(id: &str, name: &str, synonyms: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub type Category = NamedEntity;
pub type Course = NamedEntity;

// --- WEEKDAYS ---

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    Display,
)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    /// Accepts full names, short forms and plurals ("mondays"). Two-letter codes
    /// are left out since "we" and "th" are ordinary words in free text.
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        let lower = lower.trim_start_matches('@');
        let singular = lower.strip_suffix('s').filter(|r| r.ends_with("day"));
        match singular.unwrap_or(lower) {
            "mon" | "monday" => Some(Self::Monday),
            "tue" | "tues" | "tuesday" => Some(Self::Tuesday),
            "wed" | "wednesday" => Some(Self::Wednesday),
            "thu" | "thur" | "thurs" | "thursday" => Some(Self::Thursday),
            "fri" | "friday" => Some(Self::Friday),
            "sat" | "saturday" => Some(Self::Saturday),
            "sun" | "sunday" => Some(Self::Sunday),
            _ => None,
        }
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self, Self::Saturday | Self::Sunday)
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Self::Monday,
            chrono::Weekday::Tue => Self::Tuesday,
            chrono::Weekday::Wed => Self::Wednesday,
            chrono::Weekday::Thu => Self::Thursday,
            chrono::Weekday::Fri => Self::Friday,
            chrono::Weekday::Sat => Self::Saturday,
            chrono::Weekday::Sun => Self::Sunday,
        }
    }
}

// --- DATE TYPES ---

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum DateType {
    AllDay(NaiveDate),
    Specific(NaiveDateTime),
}

impl DateType {
    pub fn format_smart(&self) -> String {
        match self {
            DateType::AllDay(d) => d.format("%Y-%m-%d").to_string(),
            DateType::Specific(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

// --- REMINDERS ---

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ReminderSpec {
    pub minutes_before: u32,
    /// Preset phrase the reminder came from, if any ("the day before").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

impl ReminderSpec {
    pub fn new_relative(minutes_before: u32) -> Self {
        Self {
            minutes_before,
            preset: None,
        }
    }

    pub fn from_preset(phrase: &str, minutes_before: u32) -> Self {
        Self {
            minutes_before,
            preset: Some(phrase.to_string()),
        }
    }
}

// --- GRADES ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum GradeValue {
    Fraction { numerator: f64, denominator: f64 },
    Percentage(f64),
    /// Letter grade or international classification token, as written.
    Letter(String),
    PassFail(bool),
}

impl GradeValue {
    /// Normalized 0-100 score, where the grading system defines one.
    /// Letters and international tokens map to the midpoint of their band.
    pub fn percent(&self, config: &EngineConfig) -> Option<f64> {
        match self {
            GradeValue::Fraction {
                numerator,
                denominator,
            } => {
                if *denominator > 0.0 {
                    Some(numerator / denominator * 100.0)
                } else {
                    None
                }
            }
            GradeValue::Percentage(p) => Some(*p),
            GradeValue::Letter(token) => config
                .letter_band(token)
                .or_else(|| config.international_band(token))
                .map(|b| b.midpoint()),
            GradeValue::PassFail(_) => None,
        }
    }

    /// Equal after normalization (within `tolerance` points), or identical
    /// when neither side normalizes.
    pub fn equivalent(&self, other: &GradeValue, config: &EngineConfig, tolerance: f64) -> bool {
        match (self.percent(config), other.percent(config)) {
            (Some(a), Some(b)) => (a - b).abs() <= tolerance,
            (None, None) => match (self, other) {
                (GradeValue::Letter(a), GradeValue::Letter(b)) => a.eq_ignore_ascii_case(b),
                _ => self == other,
            },
            _ => false,
        }
    }
}

// --- SLOT FILLING ---

/// Closed set of slots a caller can be asked to provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, Display)]
pub enum MissingSlot {
    GradeNeedsWeight,
    GradeNeedsAssignmentName,
    GradeNeedsCourse,
    ScheduleNeedsDays,
    ScheduleNeedsTime,
    EventNeedsDate,
}

impl MissingSlot {
    pub fn intent(&self) -> Intent {
        match self {
            Self::GradeNeedsWeight | Self::GradeNeedsAssignmentName | Self::GradeNeedsCourse => {
                Intent::Grade
            }
            Self::ScheduleNeedsDays | Self::ScheduleNeedsTime => Intent::Schedule,
            Self::EventNeedsDate => Intent::Event,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Intent {
    Event,
    Schedule,
    Grade,
}

/// Slots resolved so far for one intent. Carried inside `NeedsMoreInfo` so a
/// follow-up answer can be merged without re-reading the original text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialParse {
    pub intent: Intent,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<DateType>,
    #[serde(default)]
    pub days: BTreeSet<Weekday>,
    #[serde(default)]
    pub start: Option<NaiveTime>,
    #[serde(default)]
    pub end: Option<NaiveTime>,
    /// Minutes.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub reminder: Option<ReminderSpec>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub course_name: Option<String>,
    #[serde(default)]
    pub course_confidence: Option<MatchConfidence>,
    #[serde(default)]
    pub assignment_name: Option<String>,
    #[serde(default)]
    pub grade: Option<GradeValue>,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl PartialParse {
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            title: None,
            date: None,
            days: BTreeSet::new(),
            start: None,
            end: None,
            duration: None,
            reminder: None,
            category_name: None,
            course_name: None,
            course_confidence: None,
            assignment_name: None,
            grade: None,
            weight: None,
        }
    }
}

// --- RESULT ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ParseResult {
    Event {
        title: String,
        date: Option<DateType>,
        category_name: Option<String>,
        reminder: Option<ReminderSpec>,
    },
    ScheduleItem {
        title: String,
        days: BTreeSet<Weekday>,
        start: Option<NaiveTime>,
        end: Option<NaiveTime>,
        /// Minutes.
        duration: Option<u32>,
        reminder: Option<ReminderSpec>,
    },
    Grade {
        course_name: String,
        assignment_name: String,
        grade: GradeValue,
        weight: Option<f64>,
    },
    NeedsMoreInfo {
        prompt: String,
        partial: PartialParse,
        missing: MissingSlot,
        original_input: String,
    },
    Unrecognized {
        original_input: String,
    },
    NotAttempted,
}

impl ParseResult {
    pub fn kind(&self) -> &'static str {
        match self {
            ParseResult::Event { .. } => "event",
            ParseResult::ScheduleItem { .. } => "schedule_item",
            ParseResult::Grade { .. } => "grade",
            ParseResult::NeedsMoreInfo { .. } => "needs_more_info",
            ParseResult::Unrecognized { .. } => "unrecognized",
            ParseResult::NotAttempted => "not_attempted",
        }
    }

    /// Event, schedule item or grade with every required slot present.
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            ParseResult::Event { .. } | ParseResult::ScheduleItem { .. } | ParseResult::Grade { .. }
        )
    }

    pub fn missing_slot(&self) -> Option<MissingSlot> {
        match self {
            ParseResult::NeedsMoreInfo { missing, .. } => Some(*missing),
            _ => None,
        }
    }

    pub fn partial(&self) -> Option<&PartialParse> {
        match self {
            ParseResult::NeedsMoreInfo { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
