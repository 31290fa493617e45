// File: ./src/model/display.rs
use crate::model::item::{GradeValue, ParseResult, ReminderSpec, Weekday};
use std::collections::BTreeSet;

pub trait ResultDisplay {
    /// Renders the result as a phrase that parses back to an equivalent result.
    fn to_smart_string(&self) -> String;
}

/// `PT1H30M`, `PT45M`, `PT2H`
pub fn format_iso_duration(minutes: u32) -> String {
    let (h, m) = (minutes / 60, minutes % 60);
    match (h, m) {
        (0, m) => format!("PT{}M", m),
        (h, 0) => format!("PT{}H", h),
        (h, m) => format!("PT{}H{}M", h, m),
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

fn format_grade(grade: &GradeValue) -> String {
    match grade {
        GradeValue::Fraction {
            numerator,
            denominator,
        } => format!(
            "Got {}/{}",
            format_number(*numerator),
            format_number(*denominator)
        ),
        GradeValue::Percentage(p) => format!("Got {}%", format_number(*p)),
        GradeValue::Letter(l) => format!("Got a {}", l),
        GradeValue::PassFail(true) => "Got a pass".to_string(),
        GradeValue::PassFail(false) => "Got a fail".to_string(),
    }
}

fn format_reminder(reminder: &ReminderSpec) -> String {
    match &reminder.preset {
        Some(phrase) => format!("remind me {}", phrase),
        None => format!("rem:{}m", reminder.minutes_before),
    }
}

fn format_days(days: &BTreeSet<Weekday>) -> String {
    let names: Vec<String> = days.iter().map(|d| d.to_string()).collect();
    match names.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
    }
}

impl ResultDisplay for ParseResult {
    fn to_smart_string(&self) -> String {
        let mut s = String::new();
        match self {
            ParseResult::Event {
                title,
                date,
                category_name,
                reminder,
            } => {
                s.push_str(title);
                if let Some(d) = date {
                    s.push_str(&format!(" {}", d.format_smart()));
                }
                if let Some(c) = category_name {
                    let tag: String = c.chars().filter(|ch| !ch.is_whitespace()).collect();
                    s.push_str(&format!(" #{}", tag));
                }
                if let Some(r) = reminder {
                    s.push_str(&format!(" {}", format_reminder(r)));
                }
            }
            ParseResult::ScheduleItem {
                title,
                days,
                start,
                end,
                duration,
                reminder,
            } => {
                s.push_str(title);
                if !days.is_empty() {
                    s.push_str(&format!(" every {}", format_days(days)));
                }
                match (start, end) {
                    (Some(st), Some(en)) => {
                        s.push_str(&format!(" {}-{}", st.format("%H:%M"), en.format("%H:%M")))
                    }
                    (Some(st), None) => {
                        s.push_str(&format!(" {}", st.format("%H:%M")));
                        if let Some(d) = duration {
                            s.push_str(&format!(" for {}", format_iso_duration(*d)));
                        }
                    }
                    _ => {
                        if let Some(d) = duration {
                            s.push_str(&format!(" {}", format_iso_duration(*d)));
                        }
                    }
                }
                if let Some(r) = reminder {
                    s.push_str(&format!(" {}", format_reminder(r)));
                }
            }
            ParseResult::Grade {
                course_name,
                assignment_name,
                grade,
                weight,
            } => {
                s.push_str(&format!(
                    "{} on {} {}",
                    format_grade(grade),
                    course_name,
                    assignment_name
                ));
                if let Some(w) = weight {
                    s.push_str(&format!(" worth {}%", format_number(*w)));
                }
            }
            ParseResult::NeedsMoreInfo { prompt, .. } => s.push_str(prompt),
            ParseResult::Unrecognized { original_input } => s.push_str(original_input),
            ParseResult::NotAttempted => {}
        }
        s
    }
}
