//! Decomposes the model's free-form reply into summary, score and follow-up questions.
//!
//! The reply is prose with two marker lines, `SCORE: <number>` and
//! `QUESTIONS: <text>`, optionally preceded by a `Summary:` label. Markers are
//! matched case-insensitively. Anything missing or malformed comes back as
//! `None`; parsing never fails.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)SCORE:\s*([0-9]+(?:\.[0-9]+)?)").expect("score pattern is valid")
});

static QUESTIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)QUESTIONS:\s*(.*)").expect("questions pattern is valid"));

static SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\A\s*summary:(.*?)(?:score:|questions:|\z)")
        .expect("summary pattern is valid")
});

/// Structured outcome of one AI review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub summary: String,
    /// 0.0 – 1.0; absent when the model gave none or an unusable value.
    pub score: Option<f64>,
    /// Follow-up questions for the applicant; absent when there is nothing to ask.
    pub questions: Option<String>,
}

impl Review {
    /// Placeholder recorded when the AI call could not be completed.
    pub fn failed(summary: &str) -> Self {
        Self {
            summary: summary.to_string(),
            score: None,
            questions: None,
        }
    }
}

pub fn parse_review(text: &str) -> Review {
    Review {
        summary: parse_summary(text),
        score: parse_score(text),
        questions: parse_questions(text),
    }
}

pub fn parse_score(text: &str) -> Option<f64> {
    SCORE_RE
        .captures(text)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .filter(|score| (0.0..=1.0).contains(score))
}

pub fn parse_questions(text: &str) -> Option<String> {
    let caps = QUESTIONS_RE.captures(text)?;
    let questions = caps[1].trim();
    if !is_meaningful_question(questions) {
        return None;
    }
    Some(questions.to_string())
}

/// `true` unless the text is blank or the model's "None" sentinel.
pub fn is_meaningful_question(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty() && !text.eq_ignore_ascii_case("none")
}

fn parse_summary(text: &str) -> String {
    if let Some(caps) = SUMMARY_RE.captures(text) {
        return caps[1].trim().to_string();
    }

    text.lines()
        .filter_map(strip_markers)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Removes the SCORE and QUESTIONS markers from one line. A line left blank
/// by the removal is dropped; other prose is kept as written.
fn strip_markers(line: &str) -> Option<String> {
    if !SCORE_RE.is_match(line) && !QUESTIONS_RE.is_match(line) {
        return Some(line.to_string());
    }
    let stripped = SCORE_RE.replace_all(line, "");
    let stripped = QUESTIONS_RE.replace_all(&stripped, "");
    let stripped = stripped.trim();
    (!stripped.is_empty()).then(|| stripped.to_string())
}
