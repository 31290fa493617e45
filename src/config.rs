// File: ./src/config.rs
// Handles engine settings loading, saving, validation and the frozen lookup store.
use crate::model::matcher::SynonymTable;
use crate::paths::AppPaths;
use anyhow::{Context, Error, Result};
use chrono::NaiveTime;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

const TIME_FORMAT: &str = "%H:%M";

fn default_true() -> bool {
    true
}

fn default_class_hours_start() -> String {
    "07:00".to_string()
}
fn default_class_hours_end() -> String {
    "22:00".to_string()
}

fn default_fraction_tolerance() -> f64 {
    0.5
}

fn default_max_input_chars() -> usize {
    500
}

fn default_perturbation_seed() -> u64 {
    0x5EED_CAFE
}
fn default_max_perturbations() -> usize {
    8
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn band(token: &str, system: &str, min: f64, max: f64) -> GradeBand {
    GradeBand {
        token: token.to_string(),
        system: system.to_string(),
        min,
        max,
    }
}

fn default_letter_grades() -> Vec<GradeBand> {
    vec![
        band("A+", "letter", 97.0, 100.0),
        band("A", "letter", 93.0, 96.99),
        band("A-", "letter", 90.0, 92.99),
        band("B+", "letter", 87.0, 89.99),
        band("B", "letter", 83.0, 86.99),
        band("B-", "letter", 80.0, 82.99),
        band("C+", "letter", 77.0, 79.99),
        band("C", "letter", 73.0, 76.99),
        band("C-", "letter", 70.0, 72.99),
        band("D+", "letter", 67.0, 69.99),
        band("D", "letter", 63.0, 66.99),
        band("D-", "letter", 60.0, 62.99),
        band("F", "letter", 0.0, 59.99),
    ]
}

fn default_international_grades() -> Vec<GradeBand> {
    vec![
        // Australian university bands
        band("HD", "au", 85.0, 100.0),
        band("DN", "au", 75.0, 84.99),
        band("CR", "au", 65.0, 74.99),
        // UK degree classifications
        band("1st", "uk", 70.0, 100.0),
        band("First", "uk", 70.0, 100.0),
        band("2:1", "uk", 60.0, 69.99),
        band("2:2", "uk", 50.0, 59.99),
        band("3rd", "uk", 40.0, 49.99),
        band("Third", "uk", 40.0, 49.99),
    ]
}

fn default_pass_tokens() -> Vec<String> {
    words(&["P", "S", "Pass", "Passed", "Satisfactory"])
}
fn default_fail_tokens() -> Vec<String> {
    words(&["U", "Fail", "Failed", "Unsatisfactory"])
}

fn default_category_synonyms() -> BTreeMap<String, Vec<String>> {
    let mut table = BTreeMap::new();
    let mut add = |name: &str, syns: &[&str]| {
        table.insert(name.to_string(), words(syns));
    };
    add("Academics", &["academic", "school", "study", "homework"]);
    add("Fitness", &["gym", "workout", "run", "training", "exercise"]);
    add("Health", &["doctor", "dentist", "checkup", "therapy"]);
    add("Finance", &["bills", "rent", "bank", "budget"]);
    add("Errands", &["groceries", "shopping", "laundry"]);
    add("Work", &["shift", "job", "office"]);
    add("Leisure", &["party", "movie", "concert", "game"]);
    add("Selfcare", &["self-care", "meditation", "spa"]);
    table
}

fn default_reminder_presets() -> BTreeMap<String, u32> {
    let mut presets = BTreeMap::new();
    presets.insert("the day before".to_string(), 1440);
    presets.insert("day before".to_string(), 1440);
    presets.insert("the night before".to_string(), 720);
    presets.insert("night before".to_string(), 720);
    presets.insert("the week before".to_string(), 10080);
    presets.insert("week before".to_string(), 10080);
    presets.insert("on time".to_string(), 0);
    presets
}

fn default_assignment_keywords() -> Vec<String> {
    words(&[
        "exam",
        "quiz",
        "test",
        "assignment",
        "midterm",
        "mid-term",
        "final",
        "project",
        "presentation",
        "report",
        "paper",
        "portfolio",
        "lab",
        "homework",
        "hw",
        "essay",
        "pset",
        "worksheet",
        "practical",
        "thesis",
    ])
}

fn default_event_keywords() -> Vec<String> {
    words(&[
        "meeting",
        "appointment",
        "deadline",
        "due",
        "submission",
        "submit",
        "call",
        "interview",
        "party",
        "exam",
        "quiz",
        "test",
        "midterm",
        "presentation",
        "checkup",
        "birthday",
        "dinner",
        "lunch",
        "concert",
        "visit",
        "remind",
        "finish",
        "complete",
        "pay",
        "buy",
        "return",
        "review",
        "study",
        "pick",
        "email",
        "text",
        "attend",
        "zoom",
    ])
}

fn default_schedule_keywords() -> Vec<String> {
    words(&[
        "class",
        "lecture",
        "lab",
        "tutorial",
        "seminar",
        "practice",
        "training",
        "shift",
        "gym",
        "workout",
        "recitation",
        "rehearsal",
        "club",
        "studio",
    ])
}

fn default_grade_verbs() -> Vec<String> {
    words(&[
        "got", "get", "gotten", "received", "receive", "scored", "score", "earned", "earn",
        "achieved", "grade", "graded", "mark", "marked", "result", "made",
    ])
}

fn default_equivalence_groups() -> Vec<Vec<String>> {
    vec![
        words(&["monday", "mon"]),
        words(&["tuesday", "tue"]),
        words(&["wednesday", "wed"]),
        words(&["thursday", "thu"]),
        words(&["friday", "fri"]),
        words(&["saturday", "sat"]),
        words(&["sunday", "sun"]),
        words(&["tomorrow", "tmrw"]),
        words(&["minutes", "mins"]),
        words(&["hours", "hrs"]),
        words(&["midterm", "mid-term"]),
        words(&["homework", "hw"]),
    ]
}

/// A named score band: a letter grade or an international classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeBand {
    pub token: String,
    #[serde(default)]
    pub system: String,
    pub min: f64,
    pub max: f64,
}

impl GradeBand {
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

/// On-disk shape of the configuration store. Every field has a default so that
/// partial files load.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct EngineSettings {
    #[serde(default = "default_letter_grades")]
    pub letter_grades: Vec<GradeBand>,
    #[serde(default = "default_international_grades")]
    pub international_grades: Vec<GradeBand>,
    #[serde(default = "default_pass_tokens")]
    pub pass_tokens: Vec<String>,
    #[serde(default = "default_fail_tokens")]
    pub fail_tokens: Vec<String>,

    #[serde(default = "default_category_synonyms")]
    pub category_synonyms: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub course_abbreviations: BTreeMap<String, Vec<String>>,

    #[serde(default = "default_class_hours_start")]
    pub class_hours_start: String, // Format "HH:MM"
    #[serde(default = "default_class_hours_end")]
    pub class_hours_end: String, // Format "HH:MM"

    #[serde(default = "default_reminder_presets")]
    pub reminder_presets: BTreeMap<String, u32>,
    #[serde(default)]
    pub default_event_reminder: Option<u32>,
    #[serde(default)]
    pub default_schedule_reminder: Option<u32>,

    #[serde(default = "default_assignment_keywords")]
    pub assignment_keywords: Vec<String>,
    #[serde(default = "default_event_keywords")]
    pub event_keywords: Vec<String>,
    #[serde(default = "default_schedule_keywords")]
    pub schedule_keywords: Vec<String>,
    #[serde(default = "default_grade_verbs")]
    pub grade_verbs: Vec<String>,
    #[serde(default = "default_equivalence_groups")]
    pub equivalence_groups: Vec<Vec<String>>,

    #[serde(default)]
    pub require_weight: bool,
    #[serde(default)]
    pub accept_fuzzy_matches: bool,
    #[serde(default = "default_true")]
    pub schedule_requires_time: bool,
    #[serde(default = "default_fraction_tolerance")]
    pub fraction_tolerance: f64,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    #[serde(default = "default_perturbation_seed")]
    pub perturbation_seed: u64,
    #[serde(default = "default_max_perturbations")]
    pub max_perturbations: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            letter_grades: default_letter_grades(),
            international_grades: default_international_grades(),
            pass_tokens: default_pass_tokens(),
            fail_tokens: default_fail_tokens(),
            category_synonyms: default_category_synonyms(),
            course_abbreviations: BTreeMap::new(),
            class_hours_start: default_class_hours_start(),
            class_hours_end: default_class_hours_end(),
            reminder_presets: default_reminder_presets(),
            default_event_reminder: None,
            default_schedule_reminder: None,
            assignment_keywords: default_assignment_keywords(),
            event_keywords: default_event_keywords(),
            schedule_keywords: default_schedule_keywords(),
            grade_verbs: default_grade_verbs(),
            equivalence_groups: default_equivalence_groups(),
            // Match the serde defaults
            require_weight: false,
            accept_fuzzy_matches: false,
            schedule_requires_time: true,
            fraction_tolerance: default_fraction_tolerance(),
            max_input_chars: default_max_input_chars(),
            perturbation_seed: default_perturbation_seed(),
            max_perturbations: default_max_perturbations(),
        }
    }
}

impl EngineSettings {
    /// Parse settings from a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let settings: EngineSettings =
            toml::from_str(contents).context("Failed to parse engine settings")?;
        Ok(settings)
    }

    /// Load the settings from disk.
    /// Returns a contextualized error if reading or parsing fails.
    pub fn load(path: &Path) -> Result<Self> {
        // Explicitly detect missing file so callers can fall back to defaults.
        if !path.exists() {
            return Err(anyhow::anyhow!("Settings file not found"));
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read settings file '{}': {}", path.display(), e)
        })?;

        let settings: EngineSettings = toml::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("Failed to parse settings file '{}': {}", path.display(), e)
        })?;

        log::debug!("Loaded engine settings from {}", path.display());
        Ok(settings)
    }

    /// Load from the platform settings location, or defaults if no file exists there.
    pub fn load_or_default() -> Result<Self> {
        let path = AppPaths::get_settings_file_path()?;
        match Self::load(&path) {
            Ok(settings) => Ok(settings),
            Err(e) if Self::is_missing_config_error(&e) => {
                log::debug!("No settings at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Whether an error came from a missing settings file rather than a broken one.
    pub fn is_missing_config_error(err: &Error) -> bool {
        if err.to_string().contains("Settings file not found") {
            return true;
        }

        for cause in err.chain() {
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>()
                && io_err.kind() == std::io::ErrorKind::NotFound
            {
                return true;
            }
        }

        false
    }

    /// Save settings, writing through a sibling temp file so readers never see a torn file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, toml_str)
            .with_context(|| format!("Failed to write settings file '{}'", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace settings file '{}'", path.display()))?;
        Ok(())
    }

    /// Reject structurally invalid tables.
    pub fn validate(&self) -> Result<()> {
        for b in self.letter_grades.iter().chain(&self.international_grades) {
            if b.token.trim().is_empty() {
                anyhow::bail!("Grade band with an empty token");
            }
            if !(0.0..=100.0).contains(&b.min) || !(0.0..=100.0).contains(&b.max) {
                anyhow::bail!("Grade band '{}' lies outside 0-100", b.token);
            }
            if b.min > b.max {
                anyhow::bail!("Grade band '{}' has min above max", b.token);
            }
        }

        let pass: HashSet<String> = self.pass_tokens.iter().map(|t| t.to_lowercase()).collect();
        for t in &self.fail_tokens {
            if pass.contains(&t.to_lowercase()) {
                anyhow::bail!("Token '{}' is both a pass and a fail token", t);
            }
        }
        if pass.iter().chain(self.fail_tokens.iter()).any(|t| t.trim().is_empty()) {
            anyhow::bail!("Empty pass/fail token");
        }

        let start = NaiveTime::parse_from_str(&self.class_hours_start, TIME_FORMAT)
            .with_context(|| format!("Invalid class_hours_start '{}'", self.class_hours_start))?;
        let end = NaiveTime::parse_from_str(&self.class_hours_end, TIME_FORMAT)
            .with_context(|| format!("Invalid class_hours_end '{}'", self.class_hours_end))?;
        if start >= end {
            anyhow::bail!(
                "Class hours window {}-{} is empty",
                self.class_hours_start,
                self.class_hours_end
            );
        }

        if !(0.0..=100.0).contains(&self.fraction_tolerance) {
            anyhow::bail!("fraction_tolerance must lie within 0-100");
        }
        if self.max_input_chars == 0 {
            anyhow::bail!("max_input_chars must be positive");
        }
        Ok(())
    }
}

fn lower_set(list: &[String]) -> HashSet<String> {
    list.iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn lower_table(table: &BTreeMap<String, Vec<String>>) -> SynonymTable {
    table
        .iter()
        .map(|(name, syns)| {
            (
                name.trim().to_lowercase(),
                syns.iter().map(|s| s.trim().to_lowercase()).collect(),
            )
        })
        .collect()
}

fn band_index(bands: &[GradeBand]) -> HashMap<String, GradeBand> {
    bands
        .iter()
        .map(|b| (b.token.trim().to_lowercase(), b.clone()))
        .collect()
}

static DEFAULT_CONFIG: Lazy<EngineConfig> = Lazy::new(EngineConfig::default);

/// The frozen configuration store. Built once from [`EngineSettings`]; exposes
/// read-only lookups and is shared by reference across concurrent parses.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    settings: EngineSettings,
    letters: HashMap<String, GradeBand>,
    international: HashMap<String, GradeBand>,
    pass_tokens: HashSet<String>,
    fail_tokens: HashSet<String>,
    category_synonyms: SynonymTable,
    course_abbreviations: SynonymTable,
    class_hours: (NaiveTime, NaiveTime),
    // Longest phrase first so "the day before" wins over "day before".
    reminder_presets: Vec<(Vec<String>, u32)>,
    assignment_keywords: HashSet<String>,
    event_keywords: HashSet<String>,
    schedule_keywords: HashSet<String>,
    grade_verbs: HashSet<String>,
    equivalents: HashMap<String, Vec<String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::build(EngineSettings::default())
    }
}

impl EngineConfig {
    /// Validate `settings` and freeze them into lookup tables.
    pub fn new(settings: EngineSettings) -> Result<Self> {
        if let Err(e) = settings.validate() {
            log::warn!("Rejected engine settings: {:#}", e);
            return Err(e);
        }
        Ok(Self::build(settings))
    }

    /// Process-wide default store, built on first use.
    pub fn shared_default() -> &'static EngineConfig {
        &DEFAULT_CONFIG
    }

    fn build(settings: EngineSettings) -> Self {
        let fallback_start = NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN);
        let fallback_end = NaiveTime::from_hms_opt(22, 0, 0).unwrap_or(NaiveTime::MIN);
        let class_hours = (
            NaiveTime::parse_from_str(&settings.class_hours_start, TIME_FORMAT)
                .unwrap_or(fallback_start),
            NaiveTime::parse_from_str(&settings.class_hours_end, TIME_FORMAT)
                .unwrap_or(fallback_end),
        );

        let mut reminder_presets: Vec<(Vec<String>, u32)> = settings
            .reminder_presets
            .iter()
            .map(|(phrase, mins)| {
                (
                    phrase
                        .split_whitespace()
                        .map(|w| w.to_lowercase())
                        .collect::<Vec<String>>(),
                    *mins,
                )
            })
            .filter(|(phrase, _)| !phrase.is_empty())
            .collect();
        reminder_presets.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let course_abbreviations = lower_table(&settings.course_abbreviations);

        let mut groups: Vec<Vec<String>> = settings
            .equivalence_groups
            .iter()
            .map(|g| g.iter().map(|w| w.trim().to_lowercase()).collect())
            .collect();
        for (name, abbrs) in &settings.course_abbreviations {
            let mut group = vec![name.trim().to_string()];
            group.extend(abbrs.iter().map(|a| a.trim().to_string()));
            groups.push(group);
        }
        let mut equivalents: HashMap<String, Vec<String>> = HashMap::new();
        for group in &groups {
            for member in group {
                let others = group
                    .iter()
                    .filter(|o| *o != member && !o.is_empty())
                    .cloned();
                equivalents
                    .entry(member.to_lowercase())
                    .or_default()
                    .extend(others);
            }
        }

        Self {
            letters: band_index(&settings.letter_grades),
            international: band_index(&settings.international_grades),
            pass_tokens: lower_set(&settings.pass_tokens),
            fail_tokens: lower_set(&settings.fail_tokens),
            category_synonyms: lower_table(&settings.category_synonyms),
            course_abbreviations,
            class_hours,
            reminder_presets,
            assignment_keywords: lower_set(&settings.assignment_keywords),
            event_keywords: lower_set(&settings.event_keywords),
            schedule_keywords: lower_set(&settings.schedule_keywords),
            grade_verbs: lower_set(&settings.grade_verbs),
            equivalents,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn letter_band(&self, token: &str) -> Option<&GradeBand> {
        self.letters.get(&token.to_lowercase())
    }

    pub fn international_band(&self, token: &str) -> Option<&GradeBand> {
        self.international.get(&token.to_lowercase())
    }

    /// `Some(true)` for a pass token, `Some(false)` for a fail token.
    pub fn pass_fail(&self, token: &str) -> Option<bool> {
        let lower = token.to_lowercase();
        if self.pass_tokens.contains(&lower) {
            Some(true)
        } else if self.fail_tokens.contains(&lower) {
            Some(false)
        } else {
            None
        }
    }

    pub fn category_synonyms(&self) -> &SynonymTable {
        &self.category_synonyms
    }

    pub fn course_abbreviations(&self) -> &SynonymTable {
        &self.course_abbreviations
    }

    /// Typical class hours used to settle a bare hour's am/pm reading.
    pub fn class_hours(&self) -> (NaiveTime, NaiveTime) {
        self.class_hours
    }

    pub fn reminder_presets(&self) -> &[(Vec<String>, u32)] {
        &self.reminder_presets
    }

    pub fn default_event_reminder(&self) -> Option<u32> {
        self.settings.default_event_reminder
    }

    pub fn default_schedule_reminder(&self) -> Option<u32> {
        self.settings.default_schedule_reminder
    }

    pub fn is_assignment_keyword(&self, word: &str) -> bool {
        self.assignment_keywords.contains(word)
    }

    pub fn is_event_keyword(&self, word: &str) -> bool {
        self.event_keywords.contains(word)
    }

    pub fn is_schedule_keyword(&self, word: &str) -> bool {
        self.schedule_keywords.contains(word)
    }

    pub fn is_grade_verb(&self, word: &str) -> bool {
        self.grade_verbs.contains(word)
    }

    /// Interchangeable spellings for `word` (lowercase), in configuration order.
    pub fn equivalents(&self, word: &str) -> &[String] {
        self.equivalents
            .get(word)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn require_weight(&self) -> bool {
        self.settings.require_weight
    }

    pub fn accept_fuzzy_matches(&self) -> bool {
        self.settings.accept_fuzzy_matches
    }

    pub fn schedule_requires_time(&self) -> bool {
        self.settings.schedule_requires_time
    }

    pub fn fraction_tolerance(&self) -> f64 {
        self.settings.fraction_tolerance
    }

    pub fn max_input_chars(&self) -> usize {
        self.settings.max_input_chars
    }

    pub fn perturbation_seed(&self) -> u64 {
        self.settings.perturbation_seed
    }

    pub fn max_perturbations(&self) -> usize {
        self.settings.max_perturbations
    }
}
