//! Pluralization rules
//!
//! CLDR cardinal plural categories and the rules that map a number to a
//! category for a given language. English has two forms (one, other), the
//! East Slavic languages four, Arabic all six.

use std::fmt;

use serde::{Deserialize, Serialize};

/// CLDR plural categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluralCategory {
    Zero,
    One,
    Two,
    Few,
    Many,
    Other,
}

impl PluralCategory {
    pub const ALL: [PluralCategory; 6] = [
        PluralCategory::Zero,
        PluralCategory::One,
        PluralCategory::Two,
        PluralCategory::Few,
        PluralCategory::Many,
        PluralCategory::Other,
    ];

    /// Parse a category name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zero => "zero",
            Self::One => "one",
            Self::Two => "two",
            Self::Few => "few",
            Self::Many => "many",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for PluralCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plural category of `n` in `language` (a primary language subtag)
pub fn plural_category(language: &str, n: f64) -> PluralCategory {
    let abs = n.abs();
    let integral = abs.fract() == 0.0;
    let i = abs.trunc() as u64;

    match language {
        // No plural forms
        "ja" | "ko" | "zh" | "vi" | "th" | "id" | "ms" => PluralCategory::Other,

        // 0 and 1 are singular
        "fr" | "pt" if i <= 1 => PluralCategory::One,
        "fr" | "pt" => PluralCategory::Other,

        "ru" | "uk" | "be" => east_slavic(i, integral),
        "pl" => polish(i, integral),
        "cs" | "sk" => czech(i, integral),
        "ar" => arabic(i, integral),

        _ => {
            if integral && i == 1 {
                PluralCategory::One
            } else {
                PluralCategory::Other
            }
        }
    }
}

fn east_slavic(i: u64, integral: bool) -> PluralCategory {
    if !integral {
        return PluralCategory::Other;
    }
    let (last, last_two) = (i % 10, i % 100);
    if last == 1 && last_two != 11 {
        PluralCategory::One
    } else if (2..=4).contains(&last) && !(12..=14).contains(&last_two) {
        PluralCategory::Few
    } else {
        PluralCategory::Many
    }
}

fn polish(i: u64, integral: bool) -> PluralCategory {
    if !integral {
        return PluralCategory::Other;
    }
    let (last, last_two) = (i % 10, i % 100);
    if i == 1 {
        PluralCategory::One
    } else if (2..=4).contains(&last) && !(12..=14).contains(&last_two) {
        PluralCategory::Few
    } else {
        PluralCategory::Many
    }
}

fn czech(i: u64, integral: bool) -> PluralCategory {
    match (integral, i) {
        (false, _) => PluralCategory::Many,
        (true, 1) => PluralCategory::One,
        (true, 2..=4) => PluralCategory::Few,
        _ => PluralCategory::Other,
    }
}

fn arabic(i: u64, integral: bool) -> PluralCategory {
    if !integral {
        return PluralCategory::Other;
    }
    match (i, i % 100) {
        (0, _) => PluralCategory::Zero,
        (1, _) => PluralCategory::One,
        (2, _) => PluralCategory::Two,
        (_, 3..=10) => PluralCategory::Few,
        (_, 11..=99) => PluralCategory::Many,
        _ => PluralCategory::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category() {
        assert_eq!(PluralCategory::parse("ONE"), Some(PluralCategory::One));
        assert_eq!(PluralCategory::parse("other"), Some(PluralCategory::Other));
        assert_eq!(PluralCategory::parse("plural"), None);
    }

    #[test]
    fn test_english() {
        assert_eq!(plural_category("en", 1.0), PluralCategory::One);
        assert_eq!(plural_category("en", 0.0), PluralCategory::Other);
        assert_eq!(plural_category("en", 5.0), PluralCategory::Other);
        assert_eq!(plural_category("en", 1.5), PluralCategory::Other);
        assert_eq!(plural_category("en", -1.0), PluralCategory::One);
    }

    #[test]
    fn test_french_zero_is_singular() {
        assert_eq!(plural_category("fr", 0.0), PluralCategory::One);
        assert_eq!(plural_category("fr", 1.0), PluralCategory::One);
        assert_eq!(plural_category("fr", 2.0), PluralCategory::Other);
    }

    #[test]
    fn test_russian() {
        assert_eq!(plural_category("ru", 1.0), PluralCategory::One);
        assert_eq!(plural_category("ru", 21.0), PluralCategory::One);
        assert_eq!(plural_category("ru", 11.0), PluralCategory::Many);
        assert_eq!(plural_category("ru", 3.0), PluralCategory::Few);
        assert_eq!(plural_category("ru", 13.0), PluralCategory::Many);
        assert_eq!(plural_category("ru", 5.0), PluralCategory::Many);
        assert_eq!(plural_category("ru", 2.5), PluralCategory::Other);
    }

    #[test]
    fn test_arabic() {
        assert_eq!(plural_category("ar", 0.0), PluralCategory::Zero);
        assert_eq!(plural_category("ar", 2.0), PluralCategory::Two);
        assert_eq!(plural_category("ar", 105.0), PluralCategory::Few);
        assert_eq!(plural_category("ar", 111.0), PluralCategory::Many);
        assert_eq!(plural_category("ar", 100.0), PluralCategory::Other);
    }

    #[test]
    fn test_no_plural_languages() {
        assert_eq!(plural_category("ja", 1.0), PluralCategory::Other);
    }
}
