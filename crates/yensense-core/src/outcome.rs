//! Parse-or-fallback results for free-text model output

/// Result of turning free text into a structured value
///
/// Both variants carry a usable value, so call sites never have to handle a
/// missing result; the tag only records whether the fallback was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome<T> {
    /// The text had the expected shape
    Parsed(T),
    /// The text was unusable and a deterministic default was substituted
    Fallback(T),
}

impl<T> ParseOutcome<T> {
    /// `Parsed` when `parsed` is `Some`, otherwise `Fallback` built by `fallback`
    pub fn parse_or(parsed: Option<T>, fallback: impl FnOnce() -> T) -> Self {
        match parsed {
            Some(value) => Self::Parsed(value),
            None => Self::Fallback(fallback()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Parsed(value) | Self::Fallback(value) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Parsed(value) | Self::Fallback(value) => value,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseOutcome<U> {
        match self {
            Self::Parsed(value) => ParseOutcome::Parsed(f(value)),
            Self::Fallback(value) => ParseOutcome::Fallback(f(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or() {
        let parsed = ParseOutcome::parse_or(Some(42), || 70);
        assert_eq!(parsed, ParseOutcome::Parsed(42));
        assert!(!parsed.is_fallback());

        let fallback = ParseOutcome::parse_or(None, || 70);
        assert!(fallback.is_fallback());
        assert_eq!(*fallback.value(), 70);
        assert_eq!(fallback.map(|v| v + 1).into_inner(), 71);
    }
}
