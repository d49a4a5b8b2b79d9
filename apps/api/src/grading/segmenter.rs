//! Question/Answer Segmenter — splits an extracted document into (question, answer) pairs.
//!
//! Recognized layout:
//!
//! ```text
//! Q.1 What is gravity?
//! ANS: A force.
//! Q.2 Define mass.
//! ANSWER - Amount of matter.
//! ```
//!
//! Without any `Q<n>` marker the first line is taken as the question and the
//! rest as the answer. A one-line document yields no pairs.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static QUESTION_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Q\.?\s*\d+[.):]?\s*(.*)$").unwrap());
static ANSWER_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:ANSWER|ANS)\b\s*[:.\-]?\s*(.*)$").unwrap());

/// Framing used by callers when segmentation yields nothing.
pub const FALLBACK_QUESTION: &str = "Evaluate the following answer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub student_answer: String,
}

#[derive(Debug)]
struct OpenPair {
    question: String,
    answer: Vec<String>,
}

impl OpenPair {
    fn close(self) -> QaPair {
        QaPair {
            question: self.question,
            student_answer: self.answer.join(" "),
        }
    }
}

/// Strips an `ANS:` / `ANSWER -` prefix, returning the remainder.
fn answer_body(line: &str) -> Option<&str> {
    ANSWER_MARKER_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

/// Splits `raw_text` into ordered question/answer pairs.
pub fn segment(raw_text: &str) -> Vec<QaPair> {
    let lines: Vec<&str> = raw_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut pairs = Vec::new();
    let mut open: Option<OpenPair> = None;

    for &line in &lines {
        if let Some(caps) = QUESTION_MARKER_RE.captures(line) {
            if let Some(pair) = open.take() {
                pairs.push(pair.close());
            }
            let question = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            open = Some(OpenPair {
                question: question.to_string(),
                answer: Vec::new(),
            });
            continue;
        }

        // Answer lines before the first question have nothing to attach to.
        let Some(pair) = open.as_mut() else {
            continue;
        };

        if let Some(body) = answer_body(line) {
            if !body.is_empty() {
                pair.answer.push(body.to_string());
            }
        } else if pair.question.is_empty() && pair.answer.is_empty() {
            // "Q.1" on its own line: the question text follows.
            pair.question = line.to_string();
        } else {
            pair.answer.push(line.to_string());
        }
    }

    if let Some(pair) = open.take() {
        pairs.push(pair.close());
    }

    if pairs.is_empty() && lines.len() >= 2 {
        let answer: Vec<&str> = lines[1..]
            .iter()
            .map(|l| answer_body(l).unwrap_or(l))
            .filter(|l| !l.is_empty())
            .collect();
        return vec![QaPair {
            question: lines[0].to_string(),
            student_answer: answer.join(" "),
        }];
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(q: &str, a: &str) -> QaPair {
        QaPair {
            question: q.to_string(),
            student_answer: a.to_string(),
        }
    }

    #[test]
    fn test_segment_explicit_markers() {
        let text = "Q.1 What is gravity?\nANS: A force.\nQ.2 Define mass.\nANS: Amount of matter.";
        assert_eq!(
            segment(text),
            vec![
                pair("What is gravity?", "A force."),
                pair("Define mass.", "Amount of matter.")
            ]
        );
    }

    #[test]
    fn test_segment_marker_variants() {
        let text = "q1. Name a metal\nanswer - Iron\nQ 2) Name a gas\nAns. Neon";
        assert_eq!(
            segment(text),
            vec![pair("Name a metal", "Iron"), pair("Name a gas", "Neon")]
        );
    }

    #[test]
    fn test_segment_continuation_lines_join_answer() {
        let text = "Q.1 Explain photosynthesis.\n\n\nANS: Plants convert light\ninto chemical energy.\n\nThey release oxygen.";
        assert_eq!(
            segment(text),
            vec![pair(
                "Explain photosynthesis.",
                "Plants convert light into chemical energy. They release oxygen."
            )]
        );
    }

    #[test]
    fn test_segment_unanswered_question_still_flushed() {
        let text = "Q1 First?\nQ2 Second?\nANS: yes";
        assert_eq!(
            segment(text),
            vec![pair("First?", ""), pair("Second?", "yes")]
        );
    }

    #[test]
    fn test_segment_bare_marker_takes_next_line_as_question() {
        let text = "Q.1\nWhat is an atom?\nANS: The smallest unit of matter.";
        assert_eq!(
            segment(text),
            vec![pair("What is an atom?", "The smallest unit of matter.")]
        );
    }

    #[test]
    fn test_segment_fallback_first_line_is_question() {
        let text = "What is inertia?\nResistance to change\nin motion.";
        assert_eq!(
            segment(text),
            vec![pair("What is inertia?", "Resistance to change in motion.")]
        );
    }

    #[test]
    fn test_segment_fallback_strips_answer_prefix() {
        let text = "Why is the sky blue?\nANS: Rayleigh scattering.";
        assert_eq!(
            segment(text),
            vec![pair("Why is the sky blue?", "Rayleigh scattering.")]
        );
    }

    #[test]
    fn test_segment_single_line_yields_nothing() {
        assert!(segment("Just one line of text").is_empty());
        assert!(segment("   \n\n  ").is_empty());
    }

    #[test]
    fn test_answer_marker_requires_word_boundary() {
        assert!(answer_body("Answering machines are old").is_none());
        assert_eq!(answer_body("ANSWER: 42"), Some("42"));
        assert_eq!(answer_body("ans-42"), Some("42"));
    }

    #[test]
    fn test_question_marker_requires_number() {
        let text = "Quantum states\nare discrete.";
        assert_eq!(segment(text), vec![pair("Quantum states", "are discrete.")]);
    }
}
