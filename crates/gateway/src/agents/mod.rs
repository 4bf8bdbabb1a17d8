pub mod cache;
pub mod gatekeeper;
pub mod guidance;
pub mod marketing;
pub mod pii;

use cp_domain::turn::DialogueTurn;

/// Render the last `n` dialogue turns into the `role: text` block the
/// prompts expect, masking PII before anything reaches the model.
pub fn render_dialogue(turns: &[DialogueTurn], last_n: usize) -> String {
    let start = turns.len().saturating_sub(last_n);
    turns[start..]
        .iter()
        .filter_map(|t| {
            let masked = pii::mask_pii(&t.text);
            let trimmed = masked.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(format!("{}: {}", t.speaker.label(), trimmed))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
