/// Separators used when text is read as a number
///
/// Carried on the evaluation context so that `"1.234,5"` coerces to a number
/// under a German locale while staying text under `en-US`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueLocale {
    pub decimal_separator: char,
    pub group_separator: char,
}

impl Default for ValueLocale {
    fn default() -> Self {
        Self::en_us()
    }
}

impl ValueLocale {
    #[must_use]
    pub const fn new(decimal_separator: char, group_separator: char) -> Self {
        Self {
            decimal_separator,
            group_separator,
        }
    }

    #[must_use]
    pub const fn en_us() -> Self {
        Self::new('.', ',')
    }

    #[must_use]
    pub const fn de_de() -> Self {
        Self::new(',', '.')
    }

    /// French groups digits with a no-break space
    #[must_use]
    pub const fn fr_fr() -> Self {
        Self::new(',', '\u{00A0}')
    }

    /// Look up a preset by a BCP-47 style id such as `de-DE` or `fr_FR`
    #[must_use]
    pub fn for_locale_id(id: &str) -> Option<Self> {
        let lang = id
            .split(|c| c == '-' || c == '_')
            .next()?
            .to_ascii_lowercase();
        match lang.as_str() {
            "en" => Some(Self::en_us()),
            "de" => Some(Self::de_de()),
            "fr" => Some(Self::fr_fr()),
            _ => None,
        }
    }
}
