//! Utterances that never need a routing-model round trip: slash commands
//! and short affirmations/negations/control phrases always mean
//! "continue the current session."

const SHORT_PHRASES: &[&str] = &[
    "yes", "yeah", "yep", "y", "no", "nope", "n", "ok", "okay", "sure",
    "continue", "stop", "cancel", "go", "go on", "thanks", "thank you",
];

pub fn is_whitelisted_utterance(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.starts_with('/') {
        return true;
    }
    let lowered = trimmed.to_lowercase();
    SHORT_PHRASES.contains(&lowered.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_commands_are_whitelisted() {
        assert!(is_whitelisted_utterance("/compact"));
    }

    #[test]
    fn short_affirmations_are_whitelisted() {
        assert!(is_whitelisted_utterance("yes"));
        assert!(is_whitelisted_utterance("  Ok  "));
    }

    #[test]
    fn ordinary_prose_is_not_whitelisted() {
        assert!(!is_whitelisted_utterance("please refactor the parser module"));
    }
}
