use regex::Regex;

/// Source language of every prompt. The translation set always carries it
/// as the identity entry.
pub const SOURCE_LANGUAGE: &str = "en";

/// The fixed list of target languages, by speaker population.
pub const TARGET_LANGUAGES: [(&str, &str); 20] = [
    ("en", "English"),
    ("zh-CN", "Chinese (Mandarin)"),
    ("hi", "Hindi"),
    ("es", "Spanish"),
    ("ar", "Arabic"),
    ("bn", "Bengali"),
    ("fr", "French"),
    ("ru", "Russian"),
    ("pt", "Portuguese"),
    ("ur", "Urdu"),
    ("id", "Indonesian"),
    ("de", "German"),
    ("ja", "Japanese"),
    ("sw", "Swahili"),
    ("tr", "Turkish"),
    ("vi", "Vietnamese"),
    ("ko", "Korean"),
    ("ta", "Tamil"),
    ("mr", "Marathi"),
    ("fa", "Persian"),
];

/// Look up the display name for a language code.
pub fn language_name(code: &str) -> Option<&'static str> {
    TARGET_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Normalize prompt text before translation: ensure a single space after
/// sentence-ending punctuation and collapse whitespace runs.
pub fn normalize_text(text: &str) -> String {
    let punct = Regex::new(r"([.!?])(\S)").expect("valid regex");
    let spaced = punct.replace_all(text, "$1 $2");
    let spaces = Regex::new(r"\s{2,}").expect("valid regex");
    spaces.replace_all(&spaced, " ").trim().to_string()
}
