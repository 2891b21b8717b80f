//! Whisper language table
//!
//! Codes and display names for the languages whisper models understand,
//! used by the settings UI. Whether a given model actually supports more
//! than English is answered by the loaded engine (or the model name).

use serde::Serialize;

/// A recognisable language, as shown in the preset editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LangInfo {
    pub code: String,
    pub name: String,
}

impl LangInfo {
    fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}

/// (code, name) pairs mirroring whisper.cpp's language list.
pub static LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("zh", "Chinese"),
    ("de", "German"),
    ("es", "Spanish"),
    ("ru", "Russian"),
    ("ko", "Korean"),
    ("fr", "French"),
    ("ja", "Japanese"),
    ("pt", "Portuguese"),
    ("tr", "Turkish"),
    ("pl", "Polish"),
    ("ca", "Catalan"),
    ("nl", "Dutch"),
    ("ar", "Arabic"),
    ("sv", "Swedish"),
    ("it", "Italian"),
    ("id", "Indonesian"),
    ("hi", "Hindi"),
    ("fi", "Finnish"),
    ("vi", "Vietnamese"),
    ("he", "Hebrew"),
    ("uk", "Ukrainian"),
    ("el", "Greek"),
    ("ms", "Malay"),
    ("cs", "Czech"),
    ("ro", "Romanian"),
    ("da", "Danish"),
    ("hu", "Hungarian"),
    ("ta", "Tamil"),
    ("no", "Norwegian"),
    ("th", "Thai"),
    ("ur", "Urdu"),
    ("hr", "Croatian"),
    ("bg", "Bulgarian"),
    ("lt", "Lithuanian"),
    ("la", "Latin"),
    ("mi", "Maori"),
    ("ml", "Malayalam"),
    ("cy", "Welsh"),
    ("sk", "Slovak"),
    ("te", "Telugu"),
    ("fa", "Persian"),
    ("lv", "Latvian"),
    ("bn", "Bengali"),
    ("sr", "Serbian"),
    ("az", "Azerbaijani"),
    ("sl", "Slovenian"),
    ("kn", "Kannada"),
    ("et", "Estonian"),
    ("mk", "Macedonian"),
    ("br", "Breton"),
    ("eu", "Basque"),
    ("is", "Icelandic"),
    ("hy", "Armenian"),
    ("ne", "Nepali"),
    ("mn", "Mongolian"),
    ("bs", "Bosnian"),
    ("kk", "Kazakh"),
    ("sq", "Albanian"),
    ("sw", "Swahili"),
    ("gl", "Galician"),
    ("mr", "Marathi"),
    ("pa", "Punjabi"),
    ("si", "Sinhala"),
    ("km", "Khmer"),
    ("sn", "Shona"),
    ("yo", "Yoruba"),
    ("so", "Somali"),
    ("af", "Afrikaans"),
    ("oc", "Occitan"),
    ("ka", "Georgian"),
    ("be", "Belarusian"),
    ("tg", "Tajik"),
    ("sd", "Sindhi"),
    ("gu", "Gujarati"),
    ("am", "Amharic"),
    ("yi", "Yiddish"),
    ("lo", "Lao"),
    ("uz", "Uzbek"),
    ("fo", "Faroese"),
    ("ht", "Haitian Creole"),
    ("ps", "Pashto"),
    ("tk", "Turkmen"),
    ("nn", "Nynorsk"),
    ("mt", "Maltese"),
    ("sa", "Sanskrit"),
    ("lb", "Luxembourgish"),
    ("my", "Myanmar"),
    ("bo", "Tibetan"),
    ("tl", "Tagalog"),
    ("mg", "Malagasy"),
    ("as", "Assamese"),
    ("tt", "Tatar"),
    ("haw", "Hawaiian"),
    ("ln", "Lingala"),
    ("ha", "Hausa"),
    ("ba", "Bashkir"),
    ("jw", "Javanese"),
    ("su", "Sundanese"),
];

/// Whether `code` is a language the recognition engine accepts.
pub fn is_recognised(code: &str) -> bool {
    LANGUAGES.iter().any(|&(c, _)| c == code)
}

/// Language list for a multilingual model: auto-detect first, then every
/// supported language.
pub fn multilingual_list() -> Vec<LangInfo> {
    let mut langs = Vec::with_capacity(LANGUAGES.len() + 1);
    langs.push(LangInfo::new("auto", "Auto-detect"));
    langs.extend(LANGUAGES.iter().map(|&(code, name)| LangInfo::new(code, name)));
    langs
}

/// Language list for an English-only model.
pub fn english_only_list() -> Vec<LangInfo> {
    vec![LangInfo::new("en", "English")]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_recognised() {
        assert!(is_recognised("en"));
        assert!(is_recognised("uk"));
        assert!(!is_recognised("auto"));
        assert!(!is_recognised("xx"));
    }

    #[test]
    fn test_multilingual_list_leads_with_auto() {
        let langs = multilingual_list();
        assert_eq!(langs[0].code, "auto");
        assert!(langs.len() > 90);
    }

    #[test]
    fn test_english_only_list() {
        let langs = english_only_list();
        assert_eq!(langs.len(), 1);
        assert_eq!(langs[0].code, "en");
    }
}
