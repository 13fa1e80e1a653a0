use regex::Regex;
use std::sync::LazyLock;

/// Hard upper bound for synthesized titles, counted in characters.
pub const TITLE_MAX_CHARS: usize = 30;
const TITLE_MIN_CHARS: usize = 3;

static TEMPORAL_PHRASES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:сегодня|завтра|послезавтра)?\s*(?:в\s*)?\d{1,2}\s*час(?:а|ов)?\s*(?:вечера|утра|дня|ночи)\b",
        r"(?i)\b(?:сегодня|завтра)\s*в\s*\d{1,2}[:.]?\d{0,2}\b",
        r"(?i)\bв\s*\d{1,2}[:.]?\d{0,2}\b",
        r"(?i)\b\d{1,2}[:.]?\d{0,2}\s*часов?\b",
        r"(?i)\b(?:сегодня|завтра|послезавтра)\b",
        r"(?i)\b(?:срочно|важно)\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid phrase pattern"))
    .collect()
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Enforces the title cap, truncating with an ellipsis marker.
pub fn cap_title(title: &str) -> String {
    if title.chars().count() <= TITLE_MAX_CHARS {
        return title.to_string();
    }
    let head: String = title.chars().take(TITLE_MAX_CHARS - 3).collect();
    format!("{head}...")
}

/// Validates an externally generated title: strips wrapping quotes and
/// rejects degenerate short results. The caller falls back on `None`.
pub fn accept_generated_title(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches(['"', '\'', '«', '»']).trim();
    if trimmed.chars().count() < TITLE_MIN_CHARS {
        return None;
    }
    Some(cap_title(trimmed))
}

/// Deterministic rule-based shortening used when no external generation is
/// available. Always returns a usable title within the cap.
pub fn fallback_title(clean_text: &str) -> String {
    let mut title = clean_text.to_string();
    for pattern in TEMPORAL_PHRASES.iter() {
        title = pattern.replace_all(&title, "").into_owned();
    }
    let collapsed = WHITESPACE.replace_all(&title, " ");
    let trimmed = collapsed.trim_matches([' ', ',', '.', '-']);

    if trimmed.chars().count() < TITLE_MIN_CHARS {
        return canned_title(clean_text).to_string();
    }
    cap_title(trimmed)
}

fn canned_title(text: &str) -> &'static str {
    let lowered = text.to_lowercase();
    if lowered.contains("встреча") {
        "Встреча"
    } else if lowered.contains("собрание") {
        "Собрание"
    } else if lowered.contains("звонок") {
        "Звонок"
    } else if lowered.contains("дело") {
        "Важное дело"
    } else {
        "Новая задача"
    }
}
