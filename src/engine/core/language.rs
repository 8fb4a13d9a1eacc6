/// ISO 639-2 (bibliographic and terminology) and common 639-3 codes
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("afr", "Afrikaans"),
    ("alb", "Albanian"),
    ("sqi", "Albanian"),
    ("amh", "Amharic"),
    ("ara", "Arabic"),
    ("arm", "Armenian"),
    ("hye", "Armenian"),
    ("aze", "Azerbaijani"),
    ("baq", "Basque"),
    ("eus", "Basque"),
    ("bel", "Belarusian"),
    ("ben", "Bengali"),
    ("bos", "Bosnian"),
    ("bul", "Bulgarian"),
    ("bur", "Burmese"),
    ("mya", "Burmese"),
    ("cat", "Catalan"),
    ("chi", "Chinese"),
    ("zho", "Chinese"),
    ("cmn", "Mandarin"),
    ("yue", "Cantonese"),
    ("hrv", "Croatian"),
    ("cze", "Czech"),
    ("ces", "Czech"),
    ("dan", "Danish"),
    ("dut", "Dutch"),
    ("nld", "Dutch"),
    ("eng", "English"),
    ("est", "Estonian"),
    ("fil", "Filipino"),
    ("fin", "Finnish"),
    ("fre", "French"),
    ("fra", "French"),
    ("geo", "Georgian"),
    ("kat", "Georgian"),
    ("ger", "German"),
    ("deu", "German"),
    ("gle", "Irish"),
    ("glg", "Galician"),
    ("gre", "Greek"),
    ("ell", "Greek"),
    ("guj", "Gujarati"),
    ("heb", "Hebrew"),
    ("hin", "Hindi"),
    ("hun", "Hungarian"),
    ("ice", "Icelandic"),
    ("isl", "Icelandic"),
    ("ind", "Indonesian"),
    ("ita", "Italian"),
    ("jpn", "Japanese"),
    ("kan", "Kannada"),
    ("kaz", "Kazakh"),
    ("khm", "Khmer"),
    ("kor", "Korean"),
    ("lao", "Lao"),
    ("lat", "Latin"),
    ("lav", "Latvian"),
    ("lit", "Lithuanian"),
    ("mac", "Macedonian"),
    ("mkd", "Macedonian"),
    ("may", "Malay"),
    ("msa", "Malay"),
    ("mal", "Malayalam"),
    ("mar", "Marathi"),
    ("mon", "Mongolian"),
    ("nep", "Nepali"),
    ("nor", "Norwegian"),
    ("nob", "Norwegian Bokmål"),
    ("nno", "Norwegian Nynorsk"),
    ("per", "Persian"),
    ("fas", "Persian"),
    ("pol", "Polish"),
    ("por", "Portuguese"),
    ("pan", "Punjabi"),
    ("rum", "Romanian"),
    ("ron", "Romanian"),
    ("rus", "Russian"),
    ("srp", "Serbian"),
    ("sin", "Sinhala"),
    ("slo", "Slovak"),
    ("slk", "Slovak"),
    ("slv", "Slovenian"),
    ("spa", "Spanish"),
    ("swa", "Swahili"),
    ("swe", "Swedish"),
    ("tgl", "Tagalog"),
    ("tam", "Tamil"),
    ("tel", "Telugu"),
    ("tha", "Thai"),
    ("tib", "Tibetan"),
    ("bod", "Tibetan"),
    ("tur", "Turkish"),
    ("ukr", "Ukrainian"),
    ("urd", "Urdu"),
    ("uzb", "Uzbek"),
    ("vie", "Vietnamese"),
    ("wel", "Welsh"),
    ("cym", "Welsh"),
    ("zul", "Zulu"),
    ("mul", "Multiple languages"),
    ("zxx", "No linguistic content"),
    ("und", "Undetermined"),
];

/// Look up a language code (case-insensitive)
pub fn language_name(code: &str) -> Option<&'static str> {
    let code = code.trim().to_ascii_lowercase();
    LANGUAGE_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Friendly name for a code, falling back to the raw code when unknown
pub fn language_label(code: &str) -> String {
    language_name(code)
        .map(str::to_string)
        .unwrap_or_else(|| code.trim().to_string())
}
