//! Language-selection phase and the fixed phrases the session speaks.

use crate::media::mean_abs;
use crate::ports::ai::Language;

pub const IVR_PROMPT: &str =
    "For English service, press 1. 中文服务请按2。如需继续，请开始说话。";

/// Language the prompt is synthesized with; the text itself is bilingual.
pub const IVR_PROMPT_LANGUAGE: Language = Language::En;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IvrOutcome {
    Activity,
    Timeout,
}

/// Coarse keypress detection: any frame louder than `threshold` counts.
/// This does not decode which key was pressed.
pub fn is_keypress(pcm: &[i16], threshold: f64) -> bool {
    mean_abs(pcm) > threshold
}

/// Both outcomes settle on the configured language, since the energy check
/// cannot tell digits apart.
pub fn language_for(_outcome: IvrOutcome, default_language: Language) -> Language {
    default_language
}

pub fn welcome_message(language: Language) -> &'static str {
    match language {
        Language::Zh => "您好，欢迎致电，我是您的AI助手。请问有什么可以帮助您的吗？",
        Language::En => "Hello, thank you for calling. I'm your AI assistant. How may I help you today?",
    }
}

pub fn apology(language: Language) -> &'static str {
    match language {
        Language::Zh => "抱歉，我现在遇到了一些问题，请稍后再试。",
        Language::En => "Sorry, I'm experiencing some issues. Please try again later.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypress_threshold_is_strict() {
        assert!(!is_keypress(&[1000; 160], 1000.0));
        assert!(is_keypress(&[-1001; 160], 1000.0));
        assert!(!is_keypress(&[], 1000.0));
    }

    #[test]
    fn every_outcome_uses_the_default_language() {
        assert_eq!(language_for(IvrOutcome::Activity, Language::En), Language::En);
        assert_eq!(language_for(IvrOutcome::Timeout, Language::Zh), Language::Zh);
    }

    #[test]
    fn phrases_exist_for_each_language() {
        assert!(apology(Language::En).starts_with("Sorry"));
        assert!(welcome_message(Language::Zh).contains("AI"));
        assert!(IVR_PROMPT.contains("press 1"));
    }
}
