use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Transliterates text to ASCII.
///
/// Applies NFKD decomposition, removes combining marks, then drops whatever is still outside
/// ASCII. `"Zoë Ǆ ﬁ"` becomes `"Zoe DZ fi"`; characters without a decomposition vanish.
pub fn transliterate_to_ascii(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(char::is_ascii)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_diacritics() {
        assert_eq!(transliterate_to_ascii("José Müller"), "Jose Muller");
        assert_eq!(transliterate_to_ascii("Ångström"), "Angstrom");
    }

    #[test]
    fn test_compatibility_decomposition() {
        assert_eq!(transliterate_to_ascii("ﬁle Ǆ ①"), "file DZ 1");
    }

    #[test]
    fn test_drops_characters_without_ascii_form() {
        assert_eq!(transliterate_to_ascii("北京 ok"), " ok");
        assert_eq!(transliterate_to_ascii("plain"), "plain");
    }
}
