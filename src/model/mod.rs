// File: ./src/model/mod.rs
pub mod display;
pub mod grade;
pub mod item;
pub mod matcher;
pub mod merge;
pub mod parser;
pub mod reminder;
pub mod temporal;
pub mod tokenizer;

pub use grade::{GradeAttempt, resolve_grade};
pub use item::{
    Category, Course, DateType, GradeValue, Intent, MissingSlot, NamedEntity, ParseResult,
    PartialParse, ReminderSpec, Weekday,
};
pub use matcher::{EntityMatch, MatchConfidence, match_entity};
pub use temporal::{TemporalMatch, resolve_temporal};
pub use tokenizer::{Token, TokenStream, normalize};
