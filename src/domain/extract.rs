use crate::domain::models::{Category, Priority};
use chrono::{Datelike, Days, NaiveDate, NaiveTime};
use regex::Regex;
use std::sync::LazyLock;

/// Candidate task fields recovered from free-form Russian text. Every field
/// except `title` may be absent; the caller applies defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTask {
    pub title: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
}

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[.\-/](\d{1,2})(?:[.\-/](\d{2,4}))?\b").expect("valid date pattern")
});

static CLOCK_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[:.](\d{2})\b").expect("valid time pattern"));

static MERIDIEM_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:в\s*)?(\d{1,2})\s*час(?:а|ов)?\s*(вечера|утра|дня|ночи)\b")
        .expect("valid meridiem pattern")
});

static DATE_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:сегодня|завтра|послезавтра)\b").expect("valid date word pattern")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

const CATEGORY_STEMS: &[(&[&str], Category)] = &[
    (
        &["работ", "офис", "созвон", "митинг", "совещан"],
        Category::Work,
    ),
    (
        &["учеб", "учёб", "универ", "школ", "лекци", "семинар", "дз", "домашк"],
        Category::Study,
    ),
    (
        &["здоров", "спорт", "трениров", "зал", "врач", "клини", "больниц"],
        Category::Health,
    ),
    (
        &["дом", "семь", "личн", "друз", "поездк", "покупк"],
        Category::Personal,
    ),
];

const PRIORITY_STEMS: &[(&[&str], Priority)] = &[
    (
        &["высок", "самое важное", "очень важно", "срочн", "🔥"],
        Priority::High,
    ),
    (&["средн", "обычн"], Priority::Medium),
    (&["низк", "несрочн", "когда-нибудь"], Priority::Low),
];

const PRIORITY_PHRASES: &[&str] = &[
    "высокий приоритет",
    "низкий приоритет",
    "средний приоритет",
    "высокий",
    "низкий",
    "средний",
    "приоритет",
    "важная задача",
    "важно",
    "срочно",
];

const CATEGORY_PHRASES: &[&str] = &[
    "по работе",
    "работа",
    "рабочее",
    "учёба",
    "учеба",
    "по учёбе",
    "по учебе",
    "здоровье",
    "по здоровью",
    "личное",
];

/// Deterministic, network-free parsing of free text into task fields.
/// Identical input always yields identical output.
pub fn extract_task_fields(raw: &str, today: NaiveDate) -> ParsedTask {
    let original = raw.trim();
    let lowered = original.to_lowercase();

    let date = resolve_date(&lowered, today);
    let (time, time_match) = resolve_time(&lowered);
    let category = resolve_category(&lowered);
    let priority = resolve_priority(&lowered);
    let title = clean_title(original, time_match.as_deref());

    ParsedTask {
        title,
        date,
        time,
        category,
        priority,
    }
}

fn resolve_date(lowered: &str, today: NaiveDate) -> Option<NaiveDate> {
    if lowered.contains("послезавтра") {
        return today.checked_add_days(Days::new(2));
    }
    if lowered.contains("завтра") {
        return today.checked_add_days(Days::new(1));
    }
    if lowered.contains("сегодня") {
        return Some(today);
    }

    let captures = NUMERIC_DATE.captures(lowered)?;
    let day: u32 = captures.get(1)?.as_str().parse().ok()?;
    let month: u32 = captures.get(2)?.as_str().parse().ok()?;
    let year = match captures.get(3) {
        Some(group) => {
            let value: i32 = group.as_str().parse().ok()?;
            if value < 100 { value + 2000 } else { value }
        }
        None => today.year(),
    };
    // invalid calendar dates are discarded, not reported
    NaiveDate::from_ymd_opt(year, month, day)
}

fn resolve_time(lowered: &str) -> (Option<NaiveTime>, Option<String>) {
    for captures in MERIDIEM_TIME.captures_iter(lowered) {
        let Some(hour) = captures
            .get(1)
            .and_then(|group| group.as_str().parse::<u32>().ok())
        else {
            continue;
        };
        let Some(meridiem) = captures.get(2).map(|group| group.as_str()) else {
            continue;
        };
        // an out-of-range hour skips this match, it is not a parse error
        let Some(converted) = to_24_hour(hour, meridiem) else {
            continue;
        };
        if let Some(time) = NaiveTime::from_hms_opt(converted, 0, 0) {
            return (Some(time), None);
        }
    }

    for captures in CLOCK_TIME.captures_iter(lowered) {
        let (Some(hour), Some(minute)) = (
            captures
                .get(1)
                .and_then(|group| group.as_str().parse::<u32>().ok()),
            captures
                .get(2)
                .and_then(|group| group.as_str().parse::<u32>().ok()),
        ) else {
            continue;
        };
        if let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) {
            // clock matches are pure ASCII, safe to strip literally later
            let matched = captures.get(0).map(|group| group.as_str().to_string());
            return (Some(time), matched);
        }
    }

    (None, None)
}

fn to_24_hour(hour: u32, meridiem: &str) -> Option<u32> {
    let converted = match meridiem {
        "утра" => match hour {
            12 => 0,
            hour if hour > 12 => return None,
            hour => hour,
        },
        "дня" | "вечера" => match hour {
            hour if hour < 12 => hour + 12,
            12 => 12,
            _ => return None,
        },
        "ночи" => match hour {
            12 => 0,
            hour if hour > 12 => return None,
            hour => hour,
        },
        _ => return None,
    };
    (converted <= 23).then_some(converted)
}

fn resolve_category(lowered: &str) -> Option<Category> {
    for (stems, category) in CATEGORY_STEMS {
        if stems.iter().any(|stem| lowered.contains(stem)) {
            return Some(*category);
        }
    }
    None
}

fn resolve_priority(lowered: &str) -> Option<Priority> {
    for (stems, priority) in PRIORITY_STEMS {
        if stems.iter().any(|stem| lowered.contains(stem)) {
            return Some(*priority);
        }
    }
    None
}

fn clean_title(original: &str, time_match: Option<&str>) -> String {
    let mut title = DATE_WORDS.replace_all(original, "").into_owned();
    title = MERIDIEM_TIME.replace_all(&title, "").into_owned();
    if let Some(matched) = time_match {
        // also drop the leading preposition so "в 17:00" leaves no dangling "в"
        let pattern = format!(r"(?i)(?:\bв\s*)?{}", regex::escape(matched));
        if let Ok(regex) = Regex::new(&pattern) {
            title = regex.replace_all(&title, "").into_owned();
        }
    }
    title = NUMERIC_DATE.replace_all(&title, "").into_owned();
    title = remove_phrases(&title, PRIORITY_PHRASES);
    title = remove_phrases(&title, CATEGORY_PHRASES);

    let collapsed = WHITESPACE.replace_all(&title, " ");
    let trimmed = collapsed.trim_matches([' ', ',', '.', '-']);
    if trimmed.is_empty() {
        original.to_string()
    } else {
        trimmed.to_string()
    }
}

fn remove_phrases(title: &str, phrases: &[&str]) -> String {
    let mut result = title.to_string();
    for phrase in phrases {
        let pattern = format!(r"(?i)\b{}\b", regex::escape(phrase));
        if let Ok(regex) = Regex::new(&pattern) {
            result = regex.replace_all(&result, "").into_owned();
        }
    }
    result
}
