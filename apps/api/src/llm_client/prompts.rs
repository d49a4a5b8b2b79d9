// Shared prompt constants and prompt-building utilities.
// Task prompts live next to the code that parses their output (grading/prompts.rs).

/// System prompt for every scored grading call (text and image).
pub const EVALUATOR_SYSTEM: &str = "You are a strict exam evaluator.";

/// System prompt for every companion (tutoring) call.
pub const TUTOR_SYSTEM: &str = "You are a helpful tutor.";

/// Substitutes `{name}` placeholders in a single left-to-right pass.
///
/// Substituted values are never rescanned, so student text that happens to
/// contain `{question}` stays literal. Unknown placeholders are left as-is.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let extra: usize = values.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
