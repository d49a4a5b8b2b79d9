// All LLM prompt templates for the grading module.
// Every template ends in a fixed, machine-parsable trailer; the literal markers
// below are shared with `parser.rs` and must not drift.

use crate::grading::models::{Difficulty, GradingRequest};
use crate::llm_client::prompts::fill_template;

pub const SCORE_MARKER: &str = "FINAL SCORE";
pub const FEEDBACK_MARKER: &str = "FINAL FEEDBACK";
pub const QUESTION_MARKER: &str = "QUESTION:";
pub const ANSWER_MARKER: &str = "STUDENT ANSWER:";

pub const COMPANION_FEEDBACK_HEADER: &str = "FEEDBACK:";
pub const COMPANION_KEYWORDS_HEADER: &str = "KEYWORDS:";
pub const COMPANION_STEPS_HEADER: &str = "IMPROVEMENT STEPS:";

/// Substituted for a missing or blank reference answer.
pub const NOT_PROVIDED: &str = "Not provided";

/// Scored text grading. Replace: {question}, {student_answer}, {correct_answer},
/// {max_score}, {difficulty}
pub const GRADING_PROMPT_TEMPLATE: &str = r#"You are an expert academic exam evaluator.

Grade fairly, consistently, and according to the specified difficulty level.

----------------------------------
GRADING RULES
----------------------------------

1. THEORY QUESTIONS
- If keywords or a reference answer are provided, check for conceptual correctness.
- Exact wording is NOT required. Synonyms, paraphrasing, and equivalent explanations are valid.
- Do NOT reduce marks only because the answer could be more concise.
- Extra but correct details MUST NOT reduce the score.
- Award partial credit whenever understanding is demonstrated.

2. NUMERIC QUESTIONS
- Integers must match exactly.
- Decimal values are correct within a tolerance of ±0.1.
- A correct method with a small arithmetic slip deserves partial credit.

3. CHEMISTRY QUESTIONS
- Chemical symbols must be exact.
- Different symbols are never partially correct (Au ≠ Ag, N ≠ Ne).

----------------------------------
DIFFICULTY ADJUSTMENT
----------------------------------

EASY:
- Be lenient and focus on basic understanding.
- Minor conceptual gaps should NOT heavily reduce marks.
- If the core idea is correct, award at least 70–80% of {max_score}.

MEDIUM:
- Balance strictness and fairness.
- Expect correct concepts with a reasonable explanation.
- Each small mistake reduces the score by about 0.5.
- Each missing important point reduces the score by about 1.

HARD:
- Be strict and analytical; expect depth, precision, and completeness.
- Superficial or partially correct answers lose significant marks.
- Minor errors still reduce marks, even when understanding is shown.

----------------------------------
SCORING RULES
----------------------------------

- Give a FINAL SCORE between 0 and {max_score}.
- Write scores in decimal format (e.g. 2.5, 3.0, 4.5).
- Prefer partial credit over all-or-nothing scoring.

----------------------------------
FEEDBACK RULES
----------------------------------

- Always include BOTH the FINAL SCORE and the FINAL FEEDBACK line.
- If the score is below {max_score}, say why marks were deducted.
- Feedback is 1–2 short, constructive sentences.
- A perfect answer still gets positive feedback, e.g. "Excellent answer, clearly explained and complete."

----------------------------------
RESPONSE FORMAT (STRICT)
----------------------------------

FINAL SCORE = <number out of {max_score}>
FINAL FEEDBACK = <1–2 sentences explaining the score>

----------------------------------
QUESTION
----------------------------------
{question}

----------------------------------
STUDENT ANSWER
----------------------------------
{student_answer}

----------------------------------
CORRECT ANSWER (REFERENCE)
----------------------------------
{correct_answer}

----------------------------------
DIFFICULTY LEVEL
----------------------------------
{difficulty}
"#;

/// Scored grading of a photographed answer. Replace: {max_score}, {difficulty}
pub const IMAGE_GRADING_PROMPT_TEMPLATE: &str = r#"You are an expert academic exam evaluator.

The image contains a student's handwritten or printed exam answer.

Your tasks:
1. Read the answer carefully from the image.
2. Infer the EXACT question being answered.
3. Rewrite the student's answer clearly in plain text.
4. Evaluate the answer out of {max_score}, applying the difficulty level below
   (EASY is lenient, MEDIUM is balanced, HARD is strict).

----------------------------------
MANDATORY OUTPUT FORMAT
----------------------------------

QUESTION:
<the inferred question; never leave blank>

STUDENT ANSWER:
<the student's answer rewritten as text>

FINAL SCORE = <number out of {max_score}>
FINAL FEEDBACK = <1–2 sentences explaining the score>

Rules:
- NEVER skip QUESTION or STUDENT ANSWER.
- If the question is unclear, infer the closest possible question.
- Do NOT combine sections on one line.

----------------------------------
DIFFICULTY LEVEL
----------------------------------
{difficulty}
"#;

/// Tutoring guidance on a typed answer. Replace: {question}, {student_answer},
/// {correct_answer}
pub const COMPANION_PROMPT_TEMPLATE: &str = r#"You are a helpful tutor. A student has answered a question, and you must guide them toward a perfect answer.

Respond STRICTLY in this format:

FEEDBACK:
<1–2 sentence explanation>

KEYWORDS:
- keyword 1
- keyword 2

IMPROVEMENT STEPS:
- step 1
- step 2

Instructions:
1. Summarize the student's answer and politely highlight what they did well.
2. List the essential keywords or points a perfect answer should contain, one per line, each starting with "-".
3. Give clear, constructive improvement steps, one per line, each starting with "-".
4. If the answer is already perfect, say that it is perfect and suggest an optional refinement.
5. Do NOT assign a score, mark, grade, or any number out of a total. This is guidance only.

Question:
{question}

Student Answer:
{student_answer}

Correct Answer:
{correct_answer}
"#;

/// Tutoring guidance on a photographed answer. No placeholders.
pub const COMPANION_IMAGE_PROMPT: &str = r#"You are a helpful tutor. A student has answered a question shown in the image.

Respond STRICTLY in this format:

FEEDBACK:
<1–2 sentences on what the student did well and what can improve>

KEYWORDS:
- keyword 1
- keyword 2
- keyword 3

IMPROVEMENT STEPS:
- step 1
- step 2

Rules:
- Be polite and encouraging.
- One list item per line, each starting with "-".
- If the answer is already perfect, say that it is perfect and suggest an optional refinement.
- Do NOT assign a score, mark, grade, or any number out of a total.
"#;

/// Renders a score bound without a trailing ".0" for whole numbers.
pub fn format_score(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

fn reference_or_placeholder(correct_answer: Option<&str>) -> &str {
    correct_answer
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NOT_PROVIDED)
}

fn difficulty_label(difficulty: Difficulty) -> String {
    difficulty.as_str().to_ascii_uppercase()
}

pub fn build_grading_prompt(request: &GradingRequest) -> String {
    let max_score = format_score(request.max_score);
    let difficulty = difficulty_label(request.difficulty);
    fill_template(
        GRADING_PROMPT_TEMPLATE,
        &[
            ("question", request.question.as_str()),
            ("student_answer", request.student_answer.as_str()),
            (
                "correct_answer",
                reference_or_placeholder(request.correct_answer.as_deref()),
            ),
            ("max_score", max_score.as_str()),
            ("difficulty", difficulty.as_str()),
        ],
    )
}

pub fn build_image_grading_prompt(max_score: f64, difficulty: Difficulty) -> String {
    let max_score = format_score(max_score);
    let difficulty = difficulty_label(difficulty);
    fill_template(
        IMAGE_GRADING_PROMPT_TEMPLATE,
        &[
            ("max_score", max_score.as_str()),
            ("difficulty", difficulty.as_str()),
        ],
    )
}

pub fn build_companion_prompt(
    question: &str,
    student_answer: &str,
    correct_answer: Option<&str>,
) -> String {
    fill_template(
        COMPANION_PROMPT_TEMPLATE,
        &[
            ("question", question),
            ("student_answer", student_answer),
            ("correct_answer", reference_or_placeholder(correct_answer)),
        ],
    )
}
