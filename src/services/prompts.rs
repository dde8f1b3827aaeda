/// Constraint set for the correction prompt (non-negotiable rules)
pub const CORRECTION_RULES: &str = r#"RULES:
1. Fix only clear transcription errors, misheard fantasy terms, and character names.
2. You MUST NOT substitute pronouns for names or names for pronouns.
3. You MUST NOT invent names that are absent from the roster above.
4. Preserve the grammatical voice and style of the original.
5. Return only the corrected text with no explanations."#;

/// Build the prompt asking whether a segment plausibly fits its context
pub fn build_fit_prompt(text: &str, context: &str, roster_hint: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "You are reviewing a transcript of a tabletop roleplaying game session.\n\n",
    );
    if !roster_hint.is_empty() {
        prompt.push_str(roster_hint);
        prompt.push('\n');
    }
    prompt.push_str(&format!("Context: {}\n\n", context));
    prompt.push_str(&format!("Candidate line: \"{}\"\n\n", text));
    prompt.push_str(
        "Does the candidate line plausibly belong in this context? \
         Answer with exactly YES or NO.",
    );

    prompt
}

/// Build the constrained correction prompt for a segment
pub fn build_correction_prompt(text: &str, context: &str, roster_hint: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "You are correcting transcription errors in a tabletop roleplaying \
         game session transcript.\n\n",
    );
    if !roster_hint.is_empty() {
        prompt.push_str(roster_hint);
        prompt.push('\n');
    }
    if !context.is_empty() {
        prompt.push_str(&format!("Context: {}\n\n", context));
    }
    prompt.push_str(&format!("Original text: \"{}\"\n\n", text));
    prompt.push_str(CORRECTION_RULES);
    prompt.push_str("\n\nCorrected text:");

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_prompt_contains_parts() {
        let prompt = build_fit_prompt("I cast fireball", "the wizard raises his staff", "");
        assert!(prompt.contains("I cast fireball"));
        assert!(prompt.contains("the wizard raises his staff"));
        assert!(prompt.contains("YES or NO"));
    }

    #[test]
    fn test_correction_prompt_includes_rules_and_roster() {
        let prompt = build_correction_prompt(
            "Thoron attacks",
            "the party enters the hall",
            "Characters: Thorin\n",
        );
        assert!(prompt.contains("Characters: Thorin"));
        assert!(prompt.contains("Thoron attacks"));
        assert!(prompt.contains("MUST NOT substitute pronouns"));
        assert!(prompt.contains("MUST NOT invent names"));
        assert!(prompt.ends_with("Corrected text:"));
    }

    #[test]
    fn test_correction_prompt_omits_empty_context() {
        let prompt = build_correction_prompt("hello", "", "");
        assert!(!prompt.contains("Context:"));
    }
}
