//! Completion Parser — turns free-text model output into structured results.
//!
//! Nothing in here returns an error. Model output format compliance cannot be
//! guaranteed, so every field has a default and every extraction is optional:
//!
//! - score: `FINAL SCORE = <n>` → 0 when absent, always clamped to `[0, max_score]`
//! - feedback: `FINAL FEEDBACK = <rest of text>` → [`NO_FEEDBACK`] when absent
//! - image transcription: text between `QUESTION:` / `STUDENT ANSWER:` / `FINAL SCORE`
//!   → sentinel strings when absent
//! - companion: line scanner over `FEEDBACK` / `KEYWORDS` / `IMPROVEMENT` headers
//!
//! When a grading completion has neither marker, a JSON fallback looks for the
//! largest balanced-brace object and reads `score` / `feedback` from it. The
//! fallback repairs a truncated trailing object by appending the missing `}`s.
//!
//! All functions are pure: the same input always yields the same output.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::grading::models::{
    CompanionResult, GradingResult, ImageGradingResult, ANSWER_NOT_INFERRED, NO_FEEDBACK,
    QUESTION_NOT_INFERRED,
};
use crate::llm_client::strip_json_fences;

static SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)final\s*score\s*=\s*(-?\d+(?:\.\d+)?)").unwrap());
static FEEDBACK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)final\s*feedback\s*=\s*(.*)").unwrap());
static QUESTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)question:\s*(.*?)\s*student\s+answer:").unwrap());
static ANSWER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)student\s+answer:\s*(.*?)\s*final\s*score").unwrap());

// ────────────────────────────────────────────────────────────────────────────
// Grading
// ────────────────────────────────────────────────────────────────────────────

/// Clamps a model-reported score into `[0, max_score]`.
pub fn clamp_score(value: f64, max_score: f64) -> f64 {
    value.min(max_score).max(0.0)
}

fn extract_score(text: &str) -> Option<f64> {
    SCORE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

fn extract_feedback(text: &str) -> Option<String> {
    FEEDBACK_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parses a scored grading completion.
pub fn parse_grading(text: &str, max_score: f64) -> GradingResult {
    let mut score = extract_score(text);
    let mut feedback = extract_feedback(text);

    if score.is_none() && feedback.is_none() {
        if let Some(object) = extract_json_object(text) {
            score = json_score(&object);
            feedback = json_feedback(&object);
        }
    }

    GradingResult {
        score: clamp_score(score.unwrap_or(0.0), max_score),
        feedback: feedback.unwrap_or_else(|| NO_FEEDBACK.to_string()),
    }
}

/// Parses an image grading completion: transcription fields plus score/feedback.
pub fn parse_image_grading(text: &str, max_score: f64) -> ImageGradingResult {
    let question = capture_trimmed(&QUESTION_RE, text)
        .unwrap_or_else(|| QUESTION_NOT_INFERRED.to_string());
    let student_answer =
        capture_trimmed(&ANSWER_RE, text).unwrap_or_else(|| ANSWER_NOT_INFERRED.to_string());
    let graded = parse_grading(text, max_score);

    ImageGradingResult {
        question,
        student_answer,
        score: graded.score,
        feedback: graded.feedback,
    }
}

fn capture_trimmed(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

// ────────────────────────────────────────────────────────────────────────────
// JSON fallback
// ────────────────────────────────────────────────────────────────────────────

/// Finds the largest JSON object embedded in `text`.
///
/// Candidates are top-level brace-balanced spans (string literals respected).
/// An object still open at end of input is closed by appending the missing
/// braces. The longest candidate that parses as an object wins.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let text = strip_json_fences(text);
    let mut candidates: Vec<String> = Vec::new();

    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    candidates.push(text[start..=i].to_string());
                }
            }
            _ => {}
        }
    }

    if depth > 0 && !in_string {
        let mut repaired = text[start..].trim_end().to_string();
        repaired.push_str(&"}".repeat(depth));
        candidates.push(repaired);
    }

    candidates.sort_by_key(|c| std::cmp::Reverse(c.len()));
    candidates
        .iter()
        .filter_map(|c| serde_json::from_str::<Value>(c).ok())
        .find(Value::is_object)
}

fn json_score(object: &Value) -> Option<f64> {
    match object.get("score")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_feedback(object: &Value) -> Option<String> {
    object
        .get("feedback")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ────────────────────────────────────────────────────────────────────────────
// Companion
// ────────────────────────────────────────────────────────────────────────────

/// Which companion section the scanner is currently filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    None,
    Feedback,
    Keywords,
    ImprovementSteps,
}

impl Section {
    /// Recognizes a section header line. Leading markdown (`#`, `*`) is ignored.
    pub fn from_header(line: &str) -> Option<Section> {
        let bare = line
            .trim_start_matches(|c: char| c == '#' || c == '*' || c.is_whitespace())
            .to_uppercase();
        if bare.starts_with("FEEDBACK") {
            Some(Section::Feedback)
        } else if bare.starts_with("KEYWORDS") {
            Some(Section::Keywords)
        } else if bare.starts_with("IMPROVEMENT") {
            Some(Section::ImprovementSteps)
        } else {
            None
        }
    }
}

/// Single-pass line scanner for companion completions.
///
/// Transitions: any header line switches `section` (from any state, including
/// a repeat of the current one) and is dropped. Content lines are routed by the
/// current section; in `None` they are dropped. Blank lines are always dropped.
#[derive(Debug)]
pub struct CompanionScanner {
    section: Section,
    feedback: String,
    keywords: Vec<String>,
    improvement_steps: Vec<String>,
}

impl Default for CompanionScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl CompanionScanner {
    pub fn new() -> Self {
        Self {
            section: Section::None,
            feedback: String::new(),
            keywords: Vec::new(),
            improvement_steps: Vec::new(),
        }
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn feed(&mut self, raw_line: &str) {
        let line = raw_line.trim();

        if let Some(next) = Section::from_header(line) {
            self.section = next;
            return;
        }
        if line.is_empty() {
            return;
        }

        match self.section {
            Section::None => {}
            Section::Feedback => {
                self.feedback.push_str(line);
                self.feedback.push(' ');
            }
            Section::Keywords => push_list_item(&mut self.keywords, line),
            Section::ImprovementSteps => push_list_item(&mut self.improvement_steps, line),
        }
    }

    pub fn finish(self) -> CompanionResult {
        CompanionResult {
            feedback: self.feedback.trim_end().to_string(),
            keywords: self.keywords,
            improvement_steps: self.improvement_steps,
        }
    }
}

fn push_list_item(items: &mut Vec<String>, line: &str) {
    if let Some(item) = line.strip_prefix('-') {
        let item = item.trim();
        if !item.is_empty() {
            items.push(item.to_string());
        }
    }
}

/// Parses a companion completion. Worst case: all three fields empty.
pub fn parse_companion(text: &str) -> CompanionResult {
    let mut scanner = CompanionScanner::new();
    for line in text.lines() {
        scanner.feed(line);
    }
    scanner.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── grading ──────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_grading_well_formed() {
        let text = "Some reasoning first.\nFINAL SCORE = 4.5\nFINAL FEEDBACK = Good work";
        let result = parse_grading(text, 5.0);
        assert_eq!(
            result,
            GradingResult {
                score: 4.5,
                feedback: "Good work".to_string()
            }
        );
    }

    #[test]
    fn test_parse_grading_clamps_high_score() {
        let result = parse_grading("FINAL SCORE = 7\nFINAL FEEDBACK = Great.", 5.0);
        assert_eq!(result.score, 5.0);
        assert_eq!(result.feedback, "Great.");
    }

    #[test]
    fn test_parse_grading_clamps_negative_score() {
        let result = parse_grading("FINAL SCORE = -2\nFINAL FEEDBACK = Wrong.", 5.0);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_parse_grading_missing_score_defaults_to_zero() {
        let result = parse_grading("The answer is mostly right.", 5.0);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.feedback, NO_FEEDBACK);
    }

    #[test]
    fn test_parse_grading_is_case_and_space_insensitive() {
        let result = parse_grading("final score=3\nFinal  Feedback =  ok ", 5.0);
        assert_eq!(result.score, 3.0);
        assert_eq!(result.feedback, "ok");
    }

    #[test]
    fn test_parse_grading_inline_markers() {
        let result = parse_grading("FINAL SCORE = 2.5 FINAL FEEDBACK = Missing units.", 5.0);
        assert_eq!(result.score, 2.5);
        assert_eq!(result.feedback, "Missing units.");
    }

    #[test]
    fn test_parse_grading_feedback_spans_remaining_lines() {
        let text = "FINAL SCORE = 3\nFINAL FEEDBACK = First sentence.\nSecond sentence.\n";
        let result = parse_grading(text, 5.0);
        assert_eq!(result.feedback, "First sentence.\nSecond sentence.");
    }

    #[test]
    fn test_parse_grading_empty_feedback_uses_placeholder() {
        let result = parse_grading("FINAL SCORE = 3\nFINAL FEEDBACK =   ", 5.0);
        assert_eq!(result.feedback, NO_FEEDBACK);
    }

    #[test]
    fn test_score_always_within_bounds() {
        let completions = [
            "",
            "FINAL SCORE = 0",
            "FINAL SCORE = 3.25",
            "FINAL SCORE = 1000000",
            "FINAL SCORE = -0.5",
            "FINAL SCORE = 99999999999999999999999999999999999999",
            "{\"score\": 42}",
            "{\"score\": -7, \"feedback\": \"x\"}",
            "garbage { not json",
        ];
        for max_score in [0.5, 1.0, 5.0, 10.0, 100.0] {
            for text in completions {
                let s = parse_grading(text, max_score).score;
                assert!((0.0..=max_score).contains(&s), "{text:?} / {max_score} → {s}");
            }
        }
    }

    #[test]
    fn test_parse_grading_is_idempotent() {
        let text = "FINAL SCORE = 3.5\nFINAL FEEDBACK = Decent, but incomplete.";
        assert_eq!(parse_grading(text, 5.0), parse_grading(text, 5.0));
        let companion = "FEEDBACK:\nok\nKEYWORDS:\n- a";
        assert_eq!(parse_companion(companion), parse_companion(companion));
    }

    // ── JSON fallback ────────────────────────────────────────────────────────

    #[test]
    fn test_json_fallback_reads_score_and_feedback() {
        let text = "Here you go:\n```json\n{\"score\": 3.5, \"feedback\": \"Solid.\"}\n```";
        let result = parse_grading(text, 5.0);
        assert_eq!(result.score, 3.5);
        assert_eq!(result.feedback, "Solid.");
    }

    #[test]
    fn test_json_fallback_repairs_unterminated_object() {
        let result = parse_grading("{\"score\": 9, \"feedback\": \"ok\"", 5.0);
        assert_eq!(result.score, 5.0);
        assert_eq!(result.feedback, "ok");
    }

    #[test]
    fn test_json_fallback_accepts_numeric_string_score() {
        let result = parse_grading("{\"score\": \"2\"}", 5.0);
        assert_eq!(result.score, 2.0);
        assert_eq!(result.feedback, NO_FEEDBACK);
    }

    #[test]
    fn test_markers_take_precedence_over_json() {
        let text = "{\"score\": 1}\nFINAL SCORE = 4\nFINAL FEEDBACK = Good.";
        assert_eq!(parse_grading(text, 5.0).score, 4.0);
    }

    #[test]
    fn test_extract_json_object_picks_largest() {
        let text = "{\"a\": 1} and then {\"score\": 2, \"nested\": {\"x\": \"}\"}}";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["score"], 2);
        assert_eq!(value["nested"]["x"], "}");
    }

    #[test]
    fn test_extract_json_object_none_without_braces() {
        assert!(extract_json_object("no json here").is_none());
    }

    // ── image ────────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_image_grading_structured() {
        let text = "QUESTION: What is 2+2?\nSTUDENT ANSWER: 4\nFINAL SCORE = 5\nFINAL FEEDBACK = Correct.";
        let result = parse_image_grading(text, 5.0);
        assert_eq!(result.question, "What is 2+2?");
        assert_eq!(result.student_answer, "4");
        assert_eq!(result.score, 5.0);
        assert_eq!(result.feedback, "Correct.");
    }

    #[test]
    fn test_parse_image_grading_markers_on_own_lines() {
        let text = "QUESTION:\nDefine inertia.\n\nSTUDENT ANSWER:\nAn object resists\nchanges in motion.\n\nFINAL SCORE = 4\nFINAL FEEDBACK = Mostly right.";
        let result = parse_image_grading(text, 5.0);
        assert_eq!(result.question, "Define inertia.");
        assert_eq!(result.student_answer, "An object resists\nchanges in motion.");
        assert_eq!(result.score, 4.0);
    }

    #[test]
    fn test_parse_image_grading_partial_success_uses_sentinels() {
        let text = "I could not read the page well.\nFINAL SCORE = 1\nFINAL FEEDBACK = Illegible.";
        let result = parse_image_grading(text, 5.0);
        assert_eq!(result.question, QUESTION_NOT_INFERRED);
        assert_eq!(result.student_answer, ANSWER_NOT_INFERRED);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.feedback, "Illegible.");
    }

    #[test]
    fn test_parse_image_grading_answer_without_score_marker() {
        let text = "QUESTION: Name a noble gas.\nSTUDENT ANSWER: Neon";
        let result = parse_image_grading(text, 5.0);
        assert_eq!(result.question, "Name a noble gas.");
        assert_eq!(result.student_answer, ANSWER_NOT_INFERRED);
        assert_eq!(result.score, 0.0);
    }

    // ── companion ────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_companion_well_formed() {
        let text = "FEEDBACK:\nGood start.\n\nKEYWORDS:\n- photosynthesis\n- chlorophyll\n\nIMPROVEMENT STEPS:\n- Mention sunlight as the energy source";
        let result = parse_companion(text);
        assert_eq!(result.feedback, "Good start.");
        assert_eq!(result.keywords, vec!["photosynthesis", "chlorophyll"]);
        assert_eq!(
            result.improvement_steps,
            vec!["Mention sunlight as the energy source"]
        );
    }

    #[test]
    fn test_parse_companion_multiline_feedback_joined_with_spaces() {
        let result = parse_companion("FEEDBACK:\nLine one.\nLine two.\n");
        assert_eq!(result.feedback, "Line one. Line two.");
    }

    #[test]
    fn test_parse_companion_drops_text_before_first_header() {
        let result = parse_companion("Sure! Here is my feedback.\n- stray\nFEEDBACK:\nNice.");
        assert_eq!(result.feedback, "Nice.");
        assert!(result.keywords.is_empty());
    }

    #[test]
    fn test_parse_companion_drops_non_dash_list_lines() {
        let result = parse_companion("KEYWORDS:\n* starred\n1. numbered\n-  spaced  \n-\n");
        assert_eq!(result.keywords, vec!["spaced"]);
    }

    #[test]
    fn test_parse_companion_repeated_header_reenters_section() {
        let text = "KEYWORDS:\n- a\nIMPROVEMENT STEPS:\n- step\nKEYWORDS:\n- b";
        let result = parse_companion(text);
        assert_eq!(result.keywords, vec!["a", "b"]);
        assert_eq!(result.improvement_steps, vec!["step"]);
    }

    #[test]
    fn test_parse_companion_header_line_content_is_discarded() {
        let result = parse_companion("Feedback: inline text is dropped\nKept.");
        assert_eq!(result.feedback, "Kept.");
    }

    #[test]
    fn test_parse_companion_accepts_markdown_headers() {
        let result = parse_companion("**Keywords:**\n- osmosis\n## Improvement Steps\n- Add an example");
        assert_eq!(result.keywords, vec!["osmosis"]);
        assert_eq!(result.improvement_steps, vec!["Add an example"]);
    }

    #[test]
    fn test_parse_companion_garbage_yields_empty_result() {
        let result = parse_companion("¯\\_(ツ)_/¯\n\n\n12345");
        assert_eq!(result, CompanionResult::default());
        assert_eq!(parse_companion(""), CompanionResult::default());
    }

    #[test]
    fn test_scanner_tracks_section_transitions() {
        let mut scanner = CompanionScanner::new();
        assert_eq!(scanner.section(), Section::None);
        scanner.feed("FEEDBACK:");
        assert_eq!(scanner.section(), Section::Feedback);
        scanner.feed("   ");
        assert_eq!(scanner.section(), Section::Feedback);
        scanner.feed("KEYWORDS:");
        assert_eq!(scanner.section(), Section::Keywords);
        scanner.feed("improvement steps:");
        assert_eq!(scanner.section(), Section::ImprovementSteps);
        let result = scanner.finish();
        assert!(result.feedback.is_empty());
    }
}
