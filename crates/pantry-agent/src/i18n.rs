use std::collections::HashMap;

pub const UNIFIED_ERROR: &str = "agent.unified_error";
pub const TOOL_UNAVAILABLE: &str = "agent.tool_unavailable";
pub const TOOL_FAILED: &str = "agent.tool_failed";
pub const TOOL_CANCELLED: &str = "agent.tool_cancelled";
pub const VALIDATION_FAILED: &str = "agent.validation_failed";

/// Looks up user-facing strings. Placeholders such as `{field}` are filled in by the caller.
pub trait Translator: Send + Sync {
    fn translate(&self, key: &str) -> String;
}

/// Built-in English strings, falling back to the key itself
pub struct EnglishTranslator {
    strings: HashMap<&'static str, &'static str>,
}

impl Default for EnglishTranslator {
    fn default() -> Self {
        let strings = HashMap::from([
            (
                UNIFIED_ERROR,
                "Sorry, something went wrong. Please try again.",
            ),
            (TOOL_UNAVAILABLE, "That action is not available right now."),
            (TOOL_FAILED, "That action could not be completed."),
            (TOOL_CANCELLED, "That action was cancelled."),
            (VALIDATION_FAILED, "Missing or invalid value for \"{field}\"."),
        ]);
        Self { strings }
    }
}

impl Translator for EnglishTranslator {
    fn translate(&self, key: &str) -> String {
        self.strings
            .get(key)
            .map(|s| s.to_string())
            .unwrap_or_else(|| key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_keys() {
        let translator = EnglishTranslator::default();
        assert!(translator.translate(UNIFIED_ERROR).contains("something went wrong"));
        assert_eq!(translator.translate("agent.nope"), "agent.nope");
    }
}
