//! Text primitives shared by every crate in the workspace.
//!
//! - [`NonEmptyText`] guarantees trimmed, non-empty content (ids, display names).
//! - [`fold`] produces the diacritic-insensitive, lower-cased form used whenever free text
//!   coming from the document store is compared against a known token ("Confirmado",
//!   "CC - Recuperação", "Masculino", ...).

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// Returns `Err(TextError::Empty)` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Case- and diacritic-insensitive form of `input`.
///
/// Decomposes to NFD, drops combining marks, lower-cases and trims, so that
/// `"  Recuperação "` and `"recuperacao"` fold to the same value.
pub fn fold(input: &str) -> String {
    input
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Returns true when both inputs fold to the same text.
pub fn fold_eq(a: &str, b: &str) -> bool {
    fold(a) == fold(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_input() {
        let text = NonEmptyText::new("  Leito 101 ").expect("valid text");
        assert_eq!(text.as_str(), "Leito 101");
    }

    #[test]
    fn non_empty_text_rejects_whitespace() {
        let err = NonEmptyText::new("   ").expect_err("whitespace should be rejected");
        assert!(matches!(err, TextError::Empty));
    }

    #[test]
    fn fold_strips_accents_and_case() {
        assert_eq!(fold("CC - Recuperação"), "cc - recuperacao");
        assert_eq!(fold(" Confirmado "), "confirmado");
        assert_eq!(fold("Suspeíto"), "suspeito");
    }

    #[test]
    fn fold_eq_matches_accented_and_plain() {
        assert!(fold_eq("Intersexo", "INTERSEXO"));
        assert!(fold_eq("Emergência", "emergencia"));
        assert!(!fold_eq("fem", "feminino"));
    }
}
