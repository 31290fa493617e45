// Crate root library declaration and module exports.
pub mod cli;
pub mod config;
pub mod model;
pub mod paths;
pub mod robustness;

pub use config::{EngineConfig, EngineSettings};
pub use model::display::ResultDisplay;
pub use model::item::{
    Category, Course, DateType, GradeValue, Intent, MissingSlot, NamedEntity, ParseResult,
    PartialParse, ReminderSpec, Weekday,
};
pub use model::merge::resume;
pub use model::parser::{parse, parse_at};
pub use robustness::{
    LatencyReport, PerturbationResult, consistency_score, measure_latency, perturb_and_check,
    perturb_and_check_at,
};
