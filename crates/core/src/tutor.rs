use serde::{Deserialize, Serialize};

/// Instruction context used when a tutor has no system prompt of its own.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are Ava, a helpful AI language tutor. Be encouraging and supportive in your responses.";

/// Native language assumed when the learner has not picked one.
pub const DEFAULT_NATIVE_LANGUAGE: &str = "English";

/// Assistant message shown before the learner first presses the mic.
pub const INSTRUCTION_MESSAGE: &str = "Click the microphone button to start your conversation!";

/// Static description of a tutor persona. Read-only for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorProfile {
    pub id: String,
    pub name: String,
    /// The language being learned, e.g. "Spanish".
    pub language: String,
    /// ISO 639-1 code of `language`, passed to speech synthesis as a hint.
    pub language_code: String,
    pub native_language: String,
    pub specialty: String,
    pub personality: String,
    pub system_prompt: String,
}

impl TutorProfile {
    /// Returns the system prompt, falling back to the supportive default when blank.
    pub fn effective_system_prompt(&self) -> &str {
        if self.system_prompt.trim().is_empty() {
            DEFAULT_SYSTEM_PROMPT
        } else {
            &self.system_prompt
        }
    }

    /// The greeting spoken on the very first mic press.
    pub fn greeting(&self) -> String {
        format!(
            "Hello! I'm {name}, your AI language tutor! I understand you speak {native} and want to learn {language}. \
I'm here to help you learn naturally through conversation. Let's start with something simple - \
tell me a bit about yourself and why you want to learn {language}!",
            name = self.name,
            native = self.native_language,
            language = self.language,
        )
    }

    pub fn with_native_language(mut self, native_language: impl Into<String>) -> Self {
        self.native_language = native_language.into();
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }
}

fn profile(
    id: &str,
    name: &str,
    language: &str,
    language_code: &str,
    specialty: &str,
    personality: &str,
    system_prompt: &str,
) -> TutorProfile {
    TutorProfile {
        id: id.to_string(),
        name: name.to_string(),
        language: language.to_string(),
        language_code: language_code.to_string(),
        native_language: DEFAULT_NATIVE_LANGUAGE.to_string(),
        specialty: specialty.to_string(),
        personality: personality.to_string(),
        system_prompt: system_prompt.to_string(),
    }
}

/// The tutors that ship with the application.
pub fn builtin_tutors() -> Vec<TutorProfile> {
    vec![
        profile(
            "maria",
            "María",
            "Spanish",
            "es",
            "Conversational Spanish",
            "Friendly and patient, loves to share cultural insights",
            "You are María, a friendly and patient Spanish tutor. You love to share cultural insights about Spanish-speaking countries. You help students learn Spanish through natural conversation, correcting mistakes gently, and providing cultural context. Always respond in a mix of English and Spanish, gradually increasing Spanish as the student improves. Be encouraging and enthusiastic about their progress.",
        ),
        profile(
            "jean",
            "Jean",
            "French",
            "fr",
            "French Grammar & Pronunciation",
            "Sophisticated and encouraging, focuses on proper pronunciation",
            "You are Jean, a sophisticated French tutor who focuses on proper pronunciation and grammar. You are encouraging and patient, helping students understand the nuances of French language. Mix English and French in your responses, providing pronunciation tips and cultural context about France. Be supportive and celebrate small victories in learning.",
        ),
        profile(
            "hiroshi",
            "Hiroshi",
            "Japanese",
            "ja",
            "Japanese Culture & Language",
            "Calm and methodical, integrates cultural context",
            "You are Hiroshi, a calm and methodical Japanese tutor who integrates cultural context into language learning. You help students understand not just the language but also Japanese culture, customs, and way of thinking. Mix English and Japanese (with romanization), and always explain cultural significance. Be patient and systematic in your teaching approach.",
        ),
        profile(
            "anna",
            "Anna",
            "German",
            "de",
            "German Business & Casual",
            "Direct and efficient, great for practical conversations",
            "You are Anna, a direct and efficient German tutor who excels at practical conversations. You help students learn German for both business and casual situations. Be straightforward but supportive, mixing English and German. Focus on practical phrases and real-world applications. Provide clear explanations and be encouraging about progress.",
        ),
        profile(
            "luigi",
            "Luigi",
            "Italian",
            "it",
            "Italian Conversation & Culture",
            "Expressive and passionate, makes learning fun",
            "You are Luigi, an expressive and passionate Italian tutor who makes learning fun! You love Italian culture, food, and traditions. Help students learn Italian through engaging conversations about culture, food, and daily life. Be enthusiastic and animated in your responses, mixing English and Italian. Make learning enjoyable and celebrate Italian culture.",
        ),
        profile(
            "chen",
            "Chen",
            "Mandarin",
            "zh",
            "Mandarin Basics & Tones",
            "Patient and systematic, excellent with pronunciation",
            "You are Chen, a patient and systematic Mandarin tutor who excels at teaching pronunciation and tones. You help students understand the basics of Mandarin Chinese, including proper tones and pronunciation. Mix English and Mandarin (with pinyin), and always provide tone marks. Be very patient and systematic, breaking down complex concepts into manageable parts.",
        ),
    ]
}

/// Looks up a built-in tutor by id, case-insensitively.
pub fn find_tutor(id: &str) -> Option<TutorProfile> {
    builtin_tutors()
        .into_iter()
        .find(|tutor| tutor.id.eq_ignore_ascii_case(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_names_both_languages() {
        let tutor = find_tutor("jean").unwrap().with_native_language("Portuguese");
        let greeting = tutor.greeting();

        assert!(greeting.starts_with("Hello! I'm Jean"));
        assert!(greeting.contains("you speak Portuguese"));
        assert!(greeting.contains("want to learn French"));
    }

    #[test]
    fn test_blank_prompt_falls_back_to_default() {
        let tutor = find_tutor("anna").unwrap().with_system_prompt("  ");
        assert_eq!(tutor.effective_system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_find_tutor_ignores_case_and_rejects_unknown() {
        assert_eq!(find_tutor("MARIA").map(|t| t.language), Some("Spanish".to_string()));
        assert!(find_tutor("klingon").is_none());
    }

    #[test]
    fn test_catalog_ids_are_unique() {
        let tutors = builtin_tutors();
        let mut ids: Vec<_> = tutors.iter().map(|t| t.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), tutors.len());
    }
}
