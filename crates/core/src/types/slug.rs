//! URL slugs for products, categories, membership modules and lessons.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug cannot be empty")]
    Empty,
    #[error("slug must be at most {max} characters")]
    TooLong { max: usize },
    #[error("slug may only contain lowercase letters, digits and hyphens")]
    InvalidCharacter,
    #[error("slug cannot start or end with a hyphen or contain '--'")]
    MisplacedHyphen,
}

/// A validated URL slug (`[a-z0-9-]`, no leading, trailing or doubled hyphen).
///
/// ```
/// use solenne_core::Slug;
///
/// assert_eq!(Slug::from_title("Sérum Vitamina C 30ml").unwrap().as_str(), "serum-vitamina-c-30ml");
/// assert!(Slug::parse("Bad Slug").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Maximum slug length.
    pub const MAX_LENGTH: usize = 96;

    /// Validate an existing slug.
    ///
    /// # Errors
    ///
    /// Returns a [`SlugError`] describing the first rule the input breaks.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(SlugError::InvalidCharacter);
        }
        if s.starts_with('-') || s.ends_with('-') || s.contains("--") {
            return Err(SlugError::MisplacedHyphen);
        }
        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from free text such as a product name.
    ///
    /// Common Latin accents are folded to ASCII, every other run of
    /// non-alphanumeric characters becomes a single hyphen, and the result
    /// is truncated to [`Self::MAX_LENGTH`].
    ///
    /// # Errors
    ///
    /// Returns `SlugError::Empty` when the title has no usable characters.
    pub fn from_title(title: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(title.len());
        let mut pending_hyphen = false;

        for c in title.chars().flat_map(char::to_lowercase) {
            let folded = fold_accent(c);
            if folded.is_ascii_alphanumeric() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(folded);
            } else {
                pending_hyphen = true;
            }
        }

        out.truncate(Self::MAX_LENGTH);
        let trimmed = out.trim_end_matches('-');
        Self::parse(trimmed)
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(Slug::parse("rosehip-oil").is_ok());
        assert!(Slug::parse("kit-3").is_ok());
        assert!(Slug::parse("a").is_ok());
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
        assert_eq!(Slug::parse("Rosehip"), Err(SlugError::InvalidCharacter));
        assert_eq!(Slug::parse("a b"), Err(SlugError::InvalidCharacter));
        assert_eq!(Slug::parse("-a"), Err(SlugError::MisplacedHyphen));
        assert_eq!(Slug::parse("a-"), Err(SlugError::MisplacedHyphen));
        assert_eq!(Slug::parse("a--b"), Err(SlugError::MisplacedHyphen));
        assert!(matches!(
            Slug::parse(&"a".repeat(97)),
            Err(SlugError::TooLong { .. })
        ));
    }

    #[test]
    fn test_from_title() {
        assert_eq!(
            Slug::from_title("  Óleo de Rosa Mosqueta (30 ml) ").unwrap().as_str(),
            "oleo-de-rosa-mosqueta-30-ml"
        );
        assert_eq!(
            Slug::from_title("Hidratação & Cuidado").unwrap().as_str(),
            "hidratacao-cuidado"
        );
        assert_eq!(Slug::from_title("!!!"), Err(SlugError::Empty));
    }

    #[test]
    fn test_from_title_truncates() {
        let slug = Slug::from_title(&"ab ".repeat(60)).unwrap();
        assert!(slug.as_str().len() <= Slug::MAX_LENGTH);
        assert!(!slug.as_str().ends_with('-'));
    }
}
