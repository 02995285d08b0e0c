//! Outcome of a public adapter operation.

use crate::error::{AdapterError, AdapterResult};

/// What an adapter operation did.
///
/// Operations never fail outright: every variant carries a usable value, and
/// the non-applied variants say why the value is the pre-call one.
#[derive(Debug, Clone)]
#[must_use]
pub enum Outcome<T> {
    /// Every remote write succeeded; the value is the new state.
    Applied(T),
    /// Nothing changed; the value is the state before the call.
    Unchanged(T, AdapterError),
    /// The store accepted an annotation write but not the page write that
    /// should have followed; the value is the state before the call.
    Partial(T, AdapterError),
}

impl<T> Outcome<T> {
    /// Returns the carried value.
    pub fn value(&self) -> &T {
        match self {
            Outcome::Applied(value) | Outcome::Unchanged(value, _) | Outcome::Partial(value, _) => {
                value
            }
        }
    }

    /// Consumes the outcome, returning the carried value.
    pub fn into_value(self) -> T {
        match self {
            Outcome::Applied(value) | Outcome::Unchanged(value, _) | Outcome::Partial(value, _) => {
                value
            }
        }
    }

    /// Returns the reason the operation was not applied.
    pub fn error(&self) -> Option<&AdapterError> {
        match self {
            Outcome::Applied(_) => None,
            Outcome::Unchanged(_, err) | Outcome::Partial(_, err) => Some(err),
        }
    }

    /// Returns true if the operation was fully applied.
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    /// Returns true if the store holds writes the page does not reflect.
    pub fn is_partial(&self) -> bool {
        matches!(self, Outcome::Partial(..))
    }

    /// Converts into a `Result`, dropping the fallback value on error.
    pub fn into_result(self) -> AdapterResult<T> {
        match self {
            Outcome::Applied(value) => Ok(value),
            Outcome::Unchanged(_, err) | Outcome::Partial(_, err) => Err(err),
        }
    }

    /// Maps the carried value, keeping the variant.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Applied(value) => Outcome::Applied(f(value)),
            Outcome::Unchanged(value, err) => Outcome::Unchanged(f(value), err),
            Outcome::Partial(value, err) => Outcome::Partial(f(value), err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applied_outcome() {
        let outcome = Outcome::Applied(3);
        assert!(outcome.is_applied());
        assert!(outcome.error().is_none());
        assert_eq!(*outcome.value(), 3);
        assert_eq!(outcome.into_result().unwrap(), 3);
    }

    #[test]
    fn unchanged_outcome_keeps_value() {
        let outcome = Outcome::Unchanged("before", AdapterError::MissingIdentifier);
        assert!(!outcome.is_applied());
        assert!(!outcome.is_partial());
        assert!(matches!(outcome.error(), Some(AdapterError::MissingIdentifier)));
        assert_eq!(outcome.clone().into_value(), "before");
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn map_preserves_variant() {
        let outcome = Outcome::Partial(2, AdapterError::transport_retryable("down")).map(|n| n * 10);
        assert!(outcome.is_partial());
        assert_eq!(*outcome.value(), 20);
    }
}
