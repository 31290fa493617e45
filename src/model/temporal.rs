// File: ./src/model/temporal.rs
// Dates, times, durations and recurrence sets, resolved against the caller's `now`.

use crate::config::EngineConfig;
use crate::model::item::{DateType, Weekday};
use crate::model::tokenizer::TokenStream;
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::collections::BTreeSet;
use strum::IntoEnumIterator;

/// Words that may precede a temporal phrase and are consumed with it.
const CONNECTORS: &[&str] = &["at", "on", "by", "around", "from", "between", "starting"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemporalMatch {
    /// A single resolved calendar date.
    pub date: Option<NaiveDate>,
    /// Recurrence day set.
    pub days: BTreeSet<Weekday>,
    /// A recurrence signal was seen ("every", "weekly", plural weekdays).
    pub recurring: bool,
    /// A lone weekday named without next/last/this; `date` holds its next occurrence.
    pub bare_weekday: Option<Weekday>,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    /// Minutes.
    pub duration: Option<u32>,
    /// A bare hour was settled by the class-hours heuristic.
    pub ambiguous_meridiem: bool,
    /// Token indices that belong to temporal phrases.
    pub consumed: BTreeSet<usize>,
}

impl TemporalMatch {
    /// The single date this match points at. A time with no date falls on `today`.
    pub fn instant(&self, today: NaiveDate) -> Option<DateType> {
        let date = self.date.or_else(|| self.start.map(|_| today))?;
        Some(match self.start {
            Some(t) => DateType::Specific(date.and_time(t)),
            None => DateType::AllDay(date),
        })
    }

    pub fn has_time(&self) -> bool {
        self.start.is_some() || self.end.is_some() || self.duration.is_some()
    }

    fn is_empty(&self) -> bool {
        self.consumed.is_empty()
            && self.date.is_none()
            && self.days.is_empty()
            && !self.recurring
            && !self.has_time()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    /// Length in minutes, months and years approximated as 30 and 365 days.
    pub(crate) fn minutes(self) -> u32 {
        match self {
            Unit::Minute => 1,
            Unit::Hour => 60,
            Unit::Day => 1440,
            Unit::Week => 10080,
            Unit::Month => 43200,
            Unit::Year => 525600,
        }
    }
}

pub(crate) fn parse_unit(s: &str) -> Option<Unit> {
    match s {
        "m" | "min" | "mins" | "minute" | "minutes" => Some(Unit::Minute),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(Unit::Hour),
        "d" | "day" | "days" => Some(Unit::Day),
        "w" | "wk" | "wks" | "week" | "weeks" => Some(Unit::Week),
        "mo" | "month" | "months" => Some(Unit::Month),
        "y" | "yr" | "yrs" | "year" | "years" => Some(Unit::Year),
        _ => None,
    }
}

pub(crate) fn parse_english_number(s: &str) -> Option<u32> {
    match s {
        "a" | "an" | "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        "eight" => Some(8),
        "nine" => Some(9),
        "ten" => Some(10),
        "eleven" => Some(11),
        "twelve" => Some(12),
        "fifteen" => Some(15),
        "thirty" => Some(30),
        "forty-five" => Some(45),
        _ => s.parse::<u32>().ok(),
    }
}

/// "3d", "2w", "1mo", "30min"
pub(crate) fn parse_compact_amount(s: &str) -> Option<(u32, Unit)> {
    let idx = s.find(|c: char| !c.is_ascii_digit())?;
    let (amt, unit) = s.split_at(idx);
    Some((amt.parse::<u32>().ok()?, parse_unit(unit)?))
}

/// ISO-8601 style duration: `PT1H30M`, `PT45M`, `P1DT2H`. Returns minutes.
pub fn parse_iso_duration(s: &str) -> Option<u32> {
    let body = s.to_lowercase();
    let body = body.strip_prefix('p')?;
    let mut in_time = false;
    let mut number = String::new();
    let mut total: u64 = 0;
    let mut components = 0;
    for c in body.chars() {
        match c {
            '0'..='9' => number.push(c),
            't' if !in_time && number.is_empty() => in_time = true,
            'd' | 'h' | 'm' | 's' | 'w' => {
                let n: u64 = number.parse().ok()?;
                number.clear();
                let minutes = match (c, in_time) {
                    ('w', false) => n.checked_mul(10080)?,
                    ('d', false) => n.checked_mul(1440)?,
                    ('h', true) => n.checked_mul(60)?,
                    ('m', true) => n,
                    ('s', true) => n / 60,
                    _ => return None,
                };
                total = total.checked_add(minutes)?;
                components += 1;
            }
            _ => return None,
        }
    }
    if components == 0 || !number.is_empty() || total == 0 {
        return None;
    }
    u32::try_from(total).ok()
}

/// Compact hour/minute durations: `90m`, `2h`, `1h30m`, `1h30`, with the
/// `~90m` / `est:90m` estimate prefixes. Returns minutes.
pub fn parse_compact_duration(s: &str) -> Option<u32> {
    let body = s
        .strip_prefix('~')
        .or_else(|| s.strip_prefix("est:"))
        .unwrap_or(s);
    let mut pairs: Vec<(u32, String)> = Vec::new();
    let mut number = String::new();
    let mut unit = String::new();
    for c in body.chars() {
        if c.is_ascii_digit() {
            if !unit.is_empty() {
                pairs.push((number.parse().ok()?, std::mem::take(&mut unit)));
                number.clear();
            }
            number.push(c);
        } else if c.is_ascii_alphabetic() && !number.is_empty() {
            unit.push(c);
        } else {
            return None;
        }
    }
    if number.is_empty() {
        return None;
    }
    let trailing: u32 = number.parse().ok()?;
    let mut total = 0u32;
    if unit.is_empty() {
        // "1h30": trailing minutes after an hour component
        if !matches!(pairs.last(), Some((_, u)) if parse_unit(u) == Some(Unit::Hour)) {
            return None;
        }
        total = trailing;
    } else {
        pairs.push((trailing, unit));
    }
    for (amt, u) in &pairs {
        let minutes = match parse_unit(u)? {
            Unit::Hour => amt.checked_mul(60)?,
            Unit::Minute => *amt,
            _ => return None,
        };
        total = total.checked_add(minutes)?;
    }
    if total == 0 { None } else { Some(total) }
}

#[derive(Debug, Clone, Copy)]
struct Clock {
    hour: u32,
    minute: u32,
    meridiem: Option<Meridiem>,
    /// 24h reading is forced: "00:30", "14:00", "08:15".
    explicit: bool,
    /// Plain integer with no minutes or suffix.
    bare: bool,
}

fn parse_meridiem(s: &str) -> Option<Meridiem> {
    match s.replace('.', "").as_str() {
        "am" => Some(Meridiem::Am),
        "pm" => Some(Meridiem::Pm),
        _ => None,
    }
}

fn parse_clock(s: &str) -> Option<Clock> {
    let cleaned = s.trim_start_matches('@').replace('.', "");
    match cleaned.as_str() {
        "noon" | "midday" => {
            return Some(Clock {
                hour: 12,
                minute: 0,
                meridiem: None,
                explicit: true,
                bare: false,
            });
        }
        "midnight" => {
            return Some(Clock {
                hour: 0,
                minute: 0,
                meridiem: None,
                explicit: true,
                bare: false,
            });
        }
        _ => {}
    }

    let (body, meridiem) = if let Some(b) = cleaned.strip_suffix("am") {
        (b, Some(Meridiem::Am))
    } else if let Some(b) = cleaned.strip_suffix("pm") {
        (b, Some(Meridiem::Pm))
    } else {
        (cleaned.as_str(), None)
    };

    let (h_str, m_str) = match body.split_once(':') {
        Some((h, m)) => (h, Some(m)),
        None => (body, None),
    };
    if h_str.is_empty() || h_str.len() > 2 || !h_str.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hour: u32 = h_str.parse().ok()?;
    let minute: u32 = match m_str {
        Some(m) if m.len() == 2 && m.chars().all(|c| c.is_ascii_digit()) => m.parse().ok()?,
        Some(_) => return None,
        None => 0,
    };
    if meridiem.is_some() && !(1..=12).contains(&hour) {
        return None;
    }
    let bare = m_str.is_none() && meridiem.is_none();
    if bare && hour > 23 {
        return None;
    }
    let explicit = meridiem.is_none()
        && (hour == 0 || hour >= 13 || (h_str.len() == 2 && h_str.starts_with('0')));
    Some(Clock {
        hour,
        minute,
        meridiem,
        explicit,
        bare,
    })
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0).unwrap_or(NaiveTime::MIN)
}

fn last_minute() -> NaiveTime {
    hm(23, 59)
}

fn month_from(s: &str) -> Option<u32> {
    match s {
        "jan" | "january" => Some(1),
        "feb" | "february" => Some(2),
        "mar" | "march" => Some(3),
        "apr" | "april" => Some(4),
        "may" => Some(5),
        "jun" | "june" => Some(6),
        "jul" | "july" => Some(7),
        "aug" | "august" => Some(8),
        "sep" | "sept" | "september" => Some(9),
        "oct" | "october" => Some(10),
        "nov" | "november" => Some(11),
        "dec" | "december" => Some(12),
        _ => None,
    }
}

fn day_of_month(s: &str) -> Option<u32> {
    let digits = ["st", "nd", "rd", "th"]
        .iter()
        .find_map(|suf| s.strip_suffix(suf))
        .unwrap_or(s);
    if digits.is_empty() || digits.len() > 2 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let d: u32 = digits.parse().ok()?;
    (1..=31).contains(&d).then_some(d)
}

fn year_from(s: &str) -> Option<i32> {
    if s.len() != 4 {
        return None;
    }
    let y: i32 = s.parse().ok()?;
    (1900..=2200).contains(&y).then_some(y)
}

/// Nearest occurrence of `target` after `from` (or on it when `include_today`).
pub fn next_weekday(from: NaiveDate, target: Weekday, include_today: bool) -> Option<NaiveDate> {
    let mut d = if include_today { from } else { from.succ_opt()? };
    while Weekday::from(d.weekday()) != target {
        d = d.succ_opt()?;
    }
    Some(d)
}

/// Nearest occurrence of `target` strictly before `from`.
pub fn previous_weekday(from: NaiveDate, target: Weekday) -> Option<NaiveDate> {
    let mut d = from.pred_opt()?;
    while Weekday::from(d.weekday()) != target {
        d = d.pred_opt()?;
    }
    Some(d)
}

fn weekdays() -> BTreeSet<Weekday> {
    Weekday::iter().filter(|d| !d.is_weekend()).collect()
}

fn weekend() -> BTreeSet<Weekday> {
    Weekday::iter().filter(|d| d.is_weekend()).collect()
}

/// "mon/wed/fri" as one token.
fn slash_weekdays(s: &str) -> Option<Vec<Weekday>> {
    if !s.contains('/') {
        return None;
    }
    s.split('/').map(Weekday::parse).collect()
}

struct Scan<'a> {
    ts: &'a TokenStream,
    skip: &'a [bool],
    now: NaiveDateTime,
    window: (NaiveTime, NaiveTime),
    bias: Option<Meridiem>,
    implied_start: Option<NaiveTime>,
    m: TemporalMatch,
}

impl<'a> Scan<'a> {
    /// Token text with the `@` date prefix removed; empty for masked or missing tokens.
    fn word(&self, i: usize) -> &'a str {
        if self.skip.get(i).copied().unwrap_or(false) {
            return "";
        }
        let ts: &'a TokenStream = self.ts;
        ts.text(i).trim_start_matches('@')
    }

    fn today(&self) -> NaiveDate {
        self.now.date()
    }

    fn set_date(&mut self, d: NaiveDate) {
        if self.m.date.is_none() {
            self.m.date = Some(d);
        }
    }

    fn resolve_clock(&mut self, c: Clock, not_before: Option<NaiveTime>) -> NaiveTime {
        if c.hour > 23 {
            return last_minute();
        }
        match c.meridiem {
            Some(Meridiem::Am) => hm(c.hour % 12, c.minute),
            Some(Meridiem::Pm) => hm(c.hour % 12 + 12, c.minute),
            None if c.explicit || c.hour > 12 => hm(c.hour, c.minute),
            None => {
                let am = hm(c.hour % 12, c.minute);
                let pm = hm(c.hour % 12 + 12, c.minute);
                if let Some(floor) = not_before {
                    if am >= floor {
                        return am;
                    }
                    if pm >= floor {
                        return pm;
                    }
                }
                self.m.ambiguous_meridiem = true;
                match self.bias {
                    Some(Meridiem::Am) => am,
                    Some(Meridiem::Pm) => pm,
                    None => {
                        let (lo, hi) = self.window;
                        let am_in = lo <= am && am <= hi;
                        let pm_in = lo <= pm && pm <= hi;
                        if pm_in && !am_in { pm } else { am }
                    }
                }
            }
        }
    }

    fn run(&mut self) {
        let n = self.ts.len();
        let mut i = 0;
        while i < n {
            let word = self.word(i);
            if word.is_empty() {
                i += 1;
                continue;
            }
            let used = if CONNECTORS.contains(&word) {
                match self.recognize(i + 1, word == "between", true) {
                    0 => 0,
                    k => k + 1,
                }
            } else {
                self.recognize(i, false, false)
            };
            if used > 0 {
                log::trace!("temporal phrase '{}'", self.ts.joined(i..i + used));
                self.m.consumed.extend(i..i + used);
                i += used;
            } else {
                i += 1;
            }
        }
    }

    fn recognize(&mut self, i: usize, after_between: bool, after_connector: bool) -> usize {
        if self.word(i).is_empty() {
            return 0;
        }
        let recognizers: [fn(&mut Self, usize) -> usize; 9] = [
            Self::iso_date,
            Self::relative_day,
            Self::qualified,
            Self::recurrence,
            Self::month_date,
            Self::offset,
            Self::duration,
            Self::until,
            Self::weekday_list,
        ];
        for r in recognizers {
            let k = r(self, i);
            if k > 0 {
                return k + self.part_of_day(i + k);
            }
        }
        self.clock(i, after_between, after_connector)
    }

    /// "morning", "afternoon", "evening", "night" right after a date phrase.
    fn part_of_day(&mut self, i: usize) -> usize {
        let (skip_the, w) = if self.word(i) == "in" && self.word(i + 1) == "the" {
            (2, self.word(i + 2))
        } else {
            (0, self.word(i))
        };
        match w {
            "morning" => {
                self.bias = Some(Meridiem::Am);
                skip_the + 1
            }
            "afternoon" | "evening" | "night" => {
                self.bias = Some(Meridiem::Pm);
                skip_the + 1
            }
            _ => 0,
        }
    }

    fn iso_date(&mut self, i: usize) -> usize {
        match NaiveDate::parse_from_str(self.word(i), "%Y-%m-%d") {
            Ok(d) => {
                self.set_date(d);
                1
            }
            Err(_) => 0,
        }
    }

    fn relative_day(&mut self, i: usize) -> usize {
        let today = self.today();
        if self.word(i) == "day" && self.word(i + 1) == "after" && self.word(i + 2) == "tomorrow"
        {
            self.set_date(today + Duration::days(2));
            return 3;
        }
        let (offset, used) = match self.word(i) {
            "today" | "tdy" => (0, 1),
            "tonight" => {
                self.bias = Some(Meridiem::Pm);
                (0, 1)
            }
            "tomorrow" | "tmrw" | "tmr" | "tomorow" => (1, 1),
            "yesterday" | "yday" => (-1, 1),
            _ => return 0,
        };
        self.set_date(today + Duration::days(offset));
        used
    }

    /// next|last|this + weekday | week | month | year | weekend | morning...
    fn qualified(&mut self, i: usize) -> usize {
        let q = self.word(i);
        if !matches!(q, "next" | "last" | "this" | "coming") {
            return 0;
        }
        let target = self.word(i + 1);
        let today = self.today();
        if let Some(day) = Weekday::parse(target) {
            let d = match q {
                "last" => previous_weekday(today, day),
                "this" => next_weekday(today, day, true),
                _ => next_weekday(today, day, false),
            };
            return match d {
                Some(d) => {
                    self.set_date(d);
                    2
                }
                None => 0,
            };
        }
        let sign: i32 = match q {
            "last" => -1,
            "this" => 0,
            _ => 1,
        };
        let d = match target {
            "week" => Some(today + Duration::days(7 * sign as i64)),
            "month" | "year" => {
                let months = if target == "month" { 1 } else { 12 };
                match sign {
                    1 => today.checked_add_months(Months::new(months)),
                    -1 => today.checked_sub_months(Months::new(months)),
                    _ => Some(today),
                }
            }
            "weekend" => match sign {
                -1 => previous_weekday(today, Weekday::Saturday),
                _ => next_weekday(today, Weekday::Saturday, sign == 0),
            },
            "morning" if sign == 0 => {
                self.bias = Some(Meridiem::Am);
                Some(today)
            }
            "afternoon" | "evening" if sign == 0 => {
                self.bias = Some(Meridiem::Pm);
                Some(today)
            }
            _ => None,
        };
        match d {
            Some(d) => {
                self.set_date(d);
                2
            }
            None => 0,
        }
    }

    /// every|each <days> | daily | weekly | weekdays | weekends
    fn recurrence(&mut self, i: usize) -> usize {
        match self.word(i) {
            "daily" => {
                self.m.recurring = true;
                self.m.days.extend(Weekday::iter());
                return 1;
            }
            "weekly" => {
                self.m.recurring = true;
                return 1;
            }
            "weekdays" => {
                self.m.recurring = true;
                self.m.days.extend(weekdays());
                return 1;
            }
            "weekends" => {
                self.m.recurring = true;
                self.m.days.extend(weekend());
                return 1;
            }
            "every" | "each" => {}
            _ => return 0,
        }
        let next = self.word(i + 1);
        match next {
            "day" => {
                self.m.recurring = true;
                self.m.days.extend(Weekday::iter());
                return 2;
            }
            "weekday" | "weekdays" => {
                self.m.recurring = true;
                self.m.days.extend(weekdays());
                return 2;
            }
            "weekend" | "weekends" => {
                self.m.recurring = true;
                self.m.days.extend(weekend());
                return 2;
            }
            "week" => {
                self.m.recurring = true;
                return 2;
            }
            "other" if self.word(i + 2) == "week" => {
                self.m.recurring = true;
                return 3;
            }
            _ => {}
        }
        // "every 2 weeks" / "every 3d"
        if let Some(amt) = parse_english_number(next)
            && amt > 0
            && parse_unit(self.word(i + 2)).is_some()
        {
            self.m.recurring = true;
            return 3;
        }
        if parse_compact_amount(next).is_some() {
            self.m.recurring = true;
            return 2;
        }
        let listed = self.collect_weekdays(i + 1);
        if listed.0.is_empty() {
            return 0;
        }
        self.m.recurring = true;
        self.m.days.extend(listed.0);
        1 + listed.1
    }

    /// Weekday tokens joined by "and"/"&"/"-" and slash lists. Returns the days
    /// and how many tokens they span, and whether any was plural.
    fn collect_weekdays_detail(&self, i: usize) -> (Vec<Weekday>, usize, bool) {
        let mut days = Vec::new();
        let mut plural = false;
        let mut j = i;
        let mut used = 0;
        loop {
            let w = self.word(j);
            if let Some(d) = Weekday::parse(w) {
                plural |= w.ends_with("days");
                days.push(d);
                j += 1;
                used = j - i;
            } else if let Some(list) = slash_weekdays(w) {
                plural = true;
                days.extend(list);
                j += 1;
                used = j - i;
            } else if !days.is_empty() && matches!(w, "and" | "&" | "or" | "+") {
                j += 1;
                continue;
            } else {
                break;
            }
        }
        (days, used, plural)
    }

    fn collect_weekdays(&self, i: usize) -> (Vec<Weekday>, usize) {
        let (days, used, _) = self.collect_weekdays_detail(i);
        (days, used)
    }

    /// Bare weekdays: one singular day is a date, several or plural days are a set.
    fn weekday_list(&mut self, i: usize) -> usize {
        let (days, used, plural) = self.collect_weekdays_detail(i);
        if days.is_empty() {
            return 0;
        }
        if days.len() == 1 && !plural {
            let day = days[0];
            if let Some(d) = next_weekday(self.today(), day, false) {
                self.set_date(d);
            }
            if self.m.bare_weekday.is_none() {
                self.m.bare_weekday = Some(day);
            }
        } else {
            self.m.recurring = true;
            self.m.days.extend(days);
        }
        used
    }

    /// "Oct 12", "October 12th 2026", "12 October"
    fn month_date(&mut self, i: usize) -> usize {
        let (month, day, used) = if let (Some(m), Some(d)) =
            (month_from(self.word(i)), day_of_month(self.word(i + 1)))
        {
            (m, d, 2)
        } else if let (Some(d), Some(m)) =
            (day_of_month(self.word(i)), month_from(self.word(i + 1)))
        {
            (m, d, 2)
        } else {
            return 0;
        };
        let today = self.today();
        if let Some(y) = year_from(self.word(i + used)) {
            return match NaiveDate::from_ymd_opt(y, month, day) {
                Some(d) => {
                    self.set_date(d);
                    used + 1
                }
                None => 0,
            };
        }
        let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
        let resolved = match this_year {
            Some(d) if d >= today => Some(d),
            _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
        };
        match resolved {
            Some(d) => {
                self.set_date(d);
                used
            }
            None => 0,
        }
    }

    fn apply_offset(&mut self, amount: u32, unit: Unit, forward: bool) -> bool {
        let now = self.now;
        let shifted = match unit {
            Unit::Minute | Unit::Hour => {
                let mins = Duration::minutes(amount as i64 * unit.minutes() as i64);
                let dt = if forward {
                    now.checked_add_signed(mins)
                } else {
                    now.checked_sub_signed(mins)
                };
                if let Some(dt) = dt {
                    self.implied_start = Some(hm(dt.hour(), dt.minute()));
                }
                dt.map(|dt| dt.date())
            }
            Unit::Day | Unit::Week => {
                let days = amount as i64 * if unit == Unit::Week { 7 } else { 1 };
                let d = Duration::days(days);
                if forward {
                    now.date().checked_add_signed(d)
                } else {
                    now.date().checked_sub_signed(d)
                }
            }
            Unit::Month | Unit::Year => {
                let per = if unit == Unit::Year { 12 } else { 1 };
                let Some(count) = amount.checked_mul(per) else {
                    return false;
                };
                let months = Months::new(count);
                if forward {
                    now.date().checked_add_months(months)
                } else {
                    now.date().checked_sub_months(months)
                }
            }
        };
        match shifted {
            Some(d) => {
                self.set_date(d);
                true
            }
            None => false,
        }
    }

    /// "in 3 days", "in an hour", "in 2w", "2 weeks from now", "3 days ago"
    fn offset(&mut self, i: usize) -> usize {
        if self.word(i) == "in" {
            if let (Some(amt), Some(unit)) = (
                parse_english_number(self.word(i + 1)),
                parse_unit(self.word(i + 2)),
            ) {
                return if self.apply_offset(amt, unit, true) { 3 } else { 0 };
            }
            if let Some((amt, unit)) = parse_compact_amount(self.word(i + 1)) {
                return if self.apply_offset(amt, unit, true) { 2 } else { 0 };
            }
            return 0;
        }

        let (amt, unit, head) = if let (Some(amt), Some(unit)) =
            (parse_english_number(self.word(i)), parse_unit(self.word(i + 1)))
        {
            (amt, unit, 2)
        } else if let Some((amt, unit)) = parse_compact_amount(self.word(i)) {
            (amt, unit, 1)
        } else {
            return 0;
        };
        let (forward, tail) = match (self.word(i + head), self.word(i + head + 1)) {
            ("ago", _) => (false, 1),
            ("later", _) | ("hence", _) => (true, 1),
            ("from", "now") | ("from", "today") => (true, 2),
            _ => return 0,
        };
        if self.apply_offset(amt, unit, forward) {
            head + tail
        } else {
            0
        }
    }

    /// ISO durations anywhere, "for <amount> <unit>", "for an hour", compact estimates.
    fn duration(&mut self, i: usize) -> usize {
        let w = self.word(i);
        if let Some(mins) = parse_iso_duration(w) {
            self.m.duration.get_or_insert(mins);
            return 1;
        }
        if w.starts_with('~') || w.starts_with("est:") {
            return match parse_compact_duration(w) {
                Some(mins) => {
                    self.m.duration.get_or_insert(mins);
                    1
                }
                None => 0,
            };
        }
        if !matches!(w, "for" | "lasting") {
            return 0;
        }
        let a = self.word(i + 1);
        if let Some(mins) = parse_iso_duration(a).or_else(|| parse_compact_duration(a)) {
            self.m.duration.get_or_insert(mins);
            return 2;
        }
        if a == "half" && matches!(self.word(i + 2), "an" | "a") && self.word(i + 3) == "hour" {
            self.m.duration.get_or_insert(30);
            return 4;
        }
        let amount: Option<f64> = parse_english_number(a)
            .map(|n| n as f64)
            .or_else(|| a.parse::<f64>().ok().filter(|v| *v > 0.0 && v.is_finite()));
        if let (Some(amt), Some(unit)) = (amount, parse_unit(self.word(i + 2)))
            && matches!(unit, Unit::Minute | Unit::Hour)
        {
            let mins = (amt * unit.minutes() as f64).round();
            if mins >= 1.0 && mins <= u32::MAX as f64 {
                self.m.duration.get_or_insert(mins as u32);
                return 3;
            }
        }
        0
    }

    /// "until 5pm" / "till 17:00" with no preceding start.
    fn until(&mut self, i: usize) -> usize {
        if !matches!(self.word(i), "until" | "till" | "til") {
            return 0;
        }
        let Some((c, used)) = self.clock_at(i + 1, true) else {
            return 0;
        };
        let floor = self.m.start;
        let t = self.resolve_clock(c, floor);
        if self.m.end.is_none() {
            self.m.end = Some(t);
        }
        1 + used
    }

    /// Clock token at `i`, absorbing a separate am/pm or "o'clock" token.
    fn clock_at(&self, i: usize, bare_ok: bool) -> Option<(Clock, usize)> {
        let w = self.word(i);
        let mut c = parse_clock(w)?;
        let next = self.word(i + 1);
        if c.meridiem.is_none()
            && !c.explicit
            && let Some(mer) = parse_meridiem(next)
            && (1..=12).contains(&c.hour)
        {
            c.meridiem = Some(mer);
            c.bare = false;
            return Some((c, 2));
        }
        if c.bare && matches!(next, "o'clock" | "oclock") {
            return Some((c, 2));
        }
        if c.bare && !bare_ok {
            return None;
        }
        Some((c, 1))
    }

    /// Clock times and ranges: "2pm", "14:00", "at 2", "10-11:30", "from 2 to 4pm".
    fn clock(&mut self, i: usize, after_between: bool, after_connector: bool) -> usize {
        let w = self.word(i);

        // Single-token range: "10-11:30", "2-4pm", "10am-12pm"
        if let Some((a, b)) = w.split_once('-')
            && let (Some(c1), Some(c2)) = (parse_clock(a), parse_clock(b))
        {
            let mut c2 = c2;
            if c2.meridiem.is_none()
                && let Some(mer) = parse_meridiem(self.word(i + 1))
            {
                c2.meridiem = Some(mer);
                self.assign_range(c1, c2);
                return 2;
            }
            self.assign_range(c1, c2);
            return 1;
        }

        // A range start may be bare when a range marker follows.
        let range_follows = |s: &Self, j: usize| {
            let sep = s.word(j);
            (matches!(sep, "-" | "to" | "until" | "till") || (after_between && sep == "and"))
                && s.clock_at(j + 1, true).is_some()
        };
        let bare_ok = after_connector
            || parse_clock(w).is_some_and(|c| c.bare) && range_follows(self, i + 1);
        let Some((c1, used1)) = self.clock_at(i, bare_ok) else {
            return 0;
        };
        if range_follows(self, i + used1)
            && let Some((c2, used2)) = self.clock_at(i + used1 + 1, true)
        {
            self.assign_range(c1, c2);
            return used1 + 1 + used2;
        }

        if self.m.start.is_some() {
            // A second standalone time closes the window when it is later.
            let floor = self.m.start;
            let t = self.resolve_clock(c1, floor);
            if self.m.end.is_none() && floor.is_some_and(|s| t > s) {
                self.m.end = Some(t);
            }
            return used1;
        }
        let t = self.resolve_clock(c1, None);
        self.m.start = Some(t);
        used1
    }

    fn assign_range(&mut self, mut c1: Clock, c2: Clock) {
        if c1.meridiem.is_none() && !c1.explicit && c2.meridiem.is_some() {
            let mut trial = c1;
            trial.meridiem = c2.meridiem;
            let t1 = self.resolve_clock(trial, None);
            let t2 = self.resolve_clock(c2, None);
            if t1 <= t2 {
                c1 = trial;
            }
        }
        let start = self.resolve_clock(c1, None);
        let end = self.resolve_clock(c2, Some(start));
        if self.m.start.is_none() {
            self.m.start = Some(start);
            self.m.end = Some(end);
        }
    }

    fn finish(mut self) -> TemporalMatch {
        if self.m.start.is_none() {
            self.m.start = self.implied_start;
        }
        let m = &mut self.m;
        if let (Some(s), Some(e)) = (m.start, m.end)
            && e < s
        {
            log::debug!("dropping end {} before start {}", e, s);
            m.end = None;
        }
        match (m.start, m.end, m.duration) {
            (Some(s), None, Some(d)) => {
                let minutes_left = (last_minute() - s).num_minutes().max(0) as u32;
                m.end = Some(if d >= minutes_left {
                    last_minute()
                } else {
                    s + Duration::minutes(d as i64)
                });
            }
            (Some(s), Some(e), None) => {
                m.duration = Some((e - s).num_minutes().max(0) as u32);
            }
            _ => {}
        }
        self.m
    }
}

pub fn resolve_temporal(
    tokens: &TokenStream,
    now: NaiveDateTime,
    config: &EngineConfig,
) -> Option<TemporalMatch> {
    resolve_temporal_masked(tokens, &[], now, config)
}

/// Like [`resolve_temporal`], but tokens flagged in `skip` are invisible
/// (already claimed by another resolver).
pub fn resolve_temporal_masked(
    tokens: &TokenStream,
    skip: &[bool],
    now: NaiveDateTime,
    config: &EngineConfig,
) -> Option<TemporalMatch> {
    let mut scan = Scan {
        ts: tokens,
        skip,
        now,
        window: config.class_hours(),
        bias: None,
        implied_start: None,
        m: TemporalMatch::default(),
    };
    // Part-of-day words bias bare hours wherever they sit in the sentence.
    for i in 0..tokens.len() {
        match scan.word(i) {
            "tonight" | "evening" | "afternoon" => scan.bias = Some(Meridiem::Pm),
            "morning" => scan.bias = Some(Meridiem::Am),
            _ => {}
        }
    }
    scan.run();
    let m = scan.finish();
    if m.is_empty() {
        None
    } else {
        log::debug!(
            "temporal: date={:?} days={:?} start={:?} end={:?} duration={:?}",
            m.date,
            m.days,
            m.start,
            m.end,
            m.duration
        );
        Some(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tokenizer::normalize;

    // Monday 2026-10-19 09:00
    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn resolve(input: &str) -> TemporalMatch {
        resolve_temporal(&normalize(input), now(), &EngineConfig::default()).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn iso_durations() {
        assert_eq!(parse_iso_duration("PT1H30M"), Some(90));
        assert_eq!(parse_iso_duration("pt45m"), Some(45));
        assert_eq!(parse_iso_duration("P1DT2H"), Some(1560));
        assert_eq!(parse_iso_duration("PT"), None);
        assert_eq!(parse_iso_duration("P1M"), None);
        assert_eq!(parse_iso_duration("party"), None);
    }

    #[test]
    fn compact_durations() {
        assert_eq!(parse_compact_duration("90m"), Some(90));
        assert_eq!(parse_compact_duration("1h30m"), Some(90));
        assert_eq!(parse_compact_duration("1h30"), Some(90));
        assert_eq!(parse_compact_duration("~2h"), Some(120));
        assert_eq!(parse_compact_duration("est:45min"), Some(45));
        assert_eq!(parse_compact_duration("30"), None);
        assert_eq!(parse_compact_duration("3d"), None);
    }

    #[test]
    fn clock_parsing() {
        assert!(parse_clock("2:1").is_none());
        assert!(parse_clock("18/20").is_none());
        assert!(parse_clock("13pm").is_none());
        assert!(parse_clock("2:30p.m").unwrap().meridiem == Some(Meridiem::Pm));
        assert!(parse_clock("08:15").unwrap().explicit);
    }

    #[test]
    fn next_and_last_weekday() {
        let m = resolve("next Friday");
        assert_eq!(m.date, NaiveDate::from_ymd_opt(2026, 10, 23));
        let m = resolve("next Monday");
        assert_eq!(m.date, NaiveDate::from_ymd_opt(2026, 10, 26));
        let m = resolve("this Monday");
        assert_eq!(m.date, NaiveDate::from_ymd_opt(2026, 10, 19));
        let m = resolve("last Monday");
        assert_eq!(m.date, NaiveDate::from_ymd_opt(2026, 10, 12));
    }

    #[test]
    fn ambiguous_hours_use_class_window() {
        assert_eq!(resolve("at 2").start, Some(t(14, 0)));
        assert_eq!(resolve("at 8").start, Some(t(8, 0)));
        assert_eq!(resolve("at 12").start, Some(t(12, 0)));
        assert!(resolve("at 2").ambiguous_meridiem);
        assert_eq!(resolve("tonight at 8").start, Some(t(20, 0)));
    }

    #[test]
    fn clamps_out_of_range_times() {
        assert_eq!(resolve("at 25:00").start, Some(t(23, 59)));
        assert_eq!(resolve("9:75").start, Some(t(9, 59)));
    }

    #[test]
    fn ranges() {
        let m = resolve("from 10 to 11:30");
        assert_eq!((m.start, m.end), (Some(t(10, 0)), Some(t(11, 30))));
        assert_eq!(m.duration, Some(90));
        let m = resolve("2-4pm");
        assert_eq!((m.start, m.end), (Some(t(14, 0)), Some(t(16, 0))));
        let m = resolve("from 11 to 1");
        assert_eq!((m.start, m.end), (Some(t(11, 0)), Some(t(13, 0))));
    }

    #[test]
    fn anchored_duration() {
        let m = resolve("from 2pm for PT2H");
        assert_eq!((m.start, m.end, m.duration), (Some(t(14, 0)), Some(t(16, 0)), Some(120)));
        let m = resolve("at 11pm for 3 hours");
        assert_eq!(m.end, Some(t(23, 59)));
    }

    #[test]
    fn instant_falls_back_to_today() {
        let today = now().date();
        assert_eq!(
            resolve("at 3pm").instant(today),
            Some(DateType::Specific(today.and_time(t(15, 0))))
        );
        assert_eq!(
            resolve("tomorrow").instant(today),
            NaiveDate::from_ymd_opt(2026, 10, 20).map(DateType::AllDay)
        );
        assert_eq!(resolve("for 2 hours").instant(today), None);
    }

    #[test]
    fn offsets() {
        assert_eq!(resolve("in 3 days").date, NaiveDate::from_ymd_opt(2026, 10, 22));
        assert_eq!(resolve("2 weeks from now").date, NaiveDate::from_ymd_opt(2026, 11, 2));
        assert_eq!(resolve("3 days ago").date, NaiveDate::from_ymd_opt(2026, 10, 16));
        assert_eq!(resolve("in 1 month").date, NaiveDate::from_ymd_opt(2026, 11, 19));
        let m = resolve("in 2 hours");
        assert_eq!((m.date, m.start), (NaiveDate::from_ymd_opt(2026, 10, 19), Some(t(11, 0))));
    }

    #[test]
    fn recurrence_sets() {
        let m = resolve("every Monday and Wednesday");
        assert!(m.recurring);
        assert_eq!(
            m.days,
            BTreeSet::from([Weekday::Monday, Weekday::Wednesday])
        );
        assert_eq!(resolve("on Tuesdays").days, BTreeSet::from([Weekday::Tuesday]));
        assert_eq!(resolve("mon/wed/fri").days.len(), 3);
        assert_eq!(resolve("daily").days.len(), 7);
        let weekly = resolve("weekly");
        assert!(weekly.recurring && weekly.days.is_empty());
    }

    #[test]
    fn month_names() {
        assert_eq!(resolve("Oct 30").date, NaiveDate::from_ymd_opt(2026, 10, 30));
        assert_eq!(resolve("3rd March").date, NaiveDate::from_ymd_opt(2027, 3, 3));
        assert_eq!(resolve("December 1st 2027").date, NaiveDate::from_ymd_opt(2027, 12, 1));
    }

    #[test]
    fn nothing_temporal() {
        let ts = normalize("Got 18/20 on the quiz");
        assert!(resolve_temporal(&ts, now(), &EngineConfig::default()).is_none());
    }
}
