//! Validated text primitives shared by the store, core and API crates.

/// Maximum length in bytes of a single object-store path segment.
pub const MAX_SEGMENT_LEN: usize = 255;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// The input exceeded the maximum segment length
    #[error("Text exceeds maximum length of {0} bytes")]
    TooLong(usize),

    /// The input contained a character that is not allowed in a path segment
    #[error("Text contains a forbidden character: {0:?}")]
    ForbiddenCharacter(char),

    /// The input was a relative path component (`.` or `..`)
    #[error("Text cannot be a relative path component")]
    RelativeComponent,
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    ///
    /// # Arguments
    ///
    /// * `input` - Any type that can be converted to a string reference
    ///
    /// # Returns
    ///
    /// Returns `Ok(NonEmptyText)` if the trimmed input is non-empty,
    /// or `Err(TextError::Empty)` if it's empty or contains only whitespace.
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

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A single component of an object-store path.
///
/// Folder names and file names supplied by clients end up inside store paths such as
/// `/forms/{folder}/{file}`. A `PathSegment` can be joined onto a parent path without
/// changing which directory the result lives in:
///
/// - non-empty after trimming
/// - at most [`MAX_SEGMENT_LEN`] bytes
/// - no `/` or `\` separators and no control characters
/// - not `.` or `..`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment(NonEmptyText);

impl PathSegment {
    /// Validates `input` as a single path segment.
    ///
    /// # Errors
    ///
    /// Returns the first [`TextError`] rule the input breaks.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let text = NonEmptyText::new(input)?;
        let s = text.as_str();

        if s.len() > MAX_SEGMENT_LEN {
            return Err(TextError::TooLong(MAX_SEGMENT_LEN));
        }
        if s == "." || s == ".." {
            return Err(TextError::RelativeComponent);
        }
        if let Some(c) = s.chars().find(|c| matches!(c, '/' | '\\') || c.is_control()) {
            return Err(TextError::ForbiddenCharacter(c));
        }

        Ok(Self(text))
    }

    /// Returns the segment as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PathSegment {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}
