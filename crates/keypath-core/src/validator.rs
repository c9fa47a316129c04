//! # Validators
//!
//! Checks attached to a key at declaration time and run by `Key::set` before
//! anything is written. A rejected value never reaches storage.
//!
//! `None` (a null write) passes every validator except [`NotNull`] and
//! [`ReadOnly`].

use std::fmt;

/// A check run against every value written through a key.
///
/// Returns the rejection reason on failure; the key turns it into a
/// [`crate::ValidationError`] carrying its own name.
pub trait Validator<V>: Send + Sync {
    fn validate(&self, value: Option<&V>) -> Result<(), String>;
}

// =============================================================================
// BUILT-IN VALIDATORS
// =============================================================================

/// Rejects null writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotNull;

impl<V> Validator<V> for NotNull {
    fn validate(&self, value: Option<&V>) -> Result<(), String> {
        match value {
            Some(_) => Ok(()),
            None => Err("value must not be null".to_string()),
        }
    }
}

/// Rejects every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnly;

impl<V> Validator<V> for ReadOnly {
    fn validate(&self, _value: Option<&V>) -> Result<(), String> {
        Err("key is read-only".to_string())
    }
}

/// Inclusive bounds; either side may be open.
#[derive(Debug, Clone)]
pub struct Range<V> {
    min: Option<V>,
    max: Option<V>,
}

impl<V> Validator<V> for Range<V>
where
    V: PartialOrd + fmt::Debug + Send + Sync,
{
    fn validate(&self, value: Option<&V>) -> Result<(), String> {
        let Some(value) = value else {
            return Ok(());
        };
        if let Some(min) = &self.min
            && value < min
        {
            return Err(format!("{value:?} is below the minimum {min:?}"));
        }
        if let Some(max) = &self.max
            && value > max
        {
            return Err(format!("{value:?} is above the maximum {max:?}"));
        }
        Ok(())
    }
}

/// Character-count bounds for text, inclusive.
#[derive(Debug, Clone, Copy)]
pub struct Length {
    min: usize,
    max: usize,
}

impl Validator<String> for Length {
    fn validate(&self, value: Option<&String>) -> Result<(), String> {
        let Some(text) = value else {
            return Ok(());
        };
        let count = text.chars().count();
        if count < self.min || count > self.max {
            return Err(format!(
                "length {} is outside {}..={}",
                count, self.min, self.max
            ));
        }
        Ok(())
    }
}

/// Accepts only members of a fixed set.
#[derive(Debug, Clone)]
pub struct OneOf<V>(Vec<V>);

impl<V> Validator<V> for OneOf<V>
where
    V: PartialEq + fmt::Debug + Send + Sync,
{
    fn validate(&self, value: Option<&V>) -> Result<(), String> {
        match value {
            Some(v) if !self.0.contains(v) => Err(format!("{v:?} is not one of {:?}", self.0)),
            _ => Ok(()),
        }
    }
}

/// Rejects members of a fixed set.
#[derive(Debug, Clone)]
pub struct NoneOf<V>(Vec<V>);

impl<V> Validator<V> for NoneOf<V>
where
    V: PartialEq + fmt::Debug + Send + Sync,
{
    fn validate(&self, value: Option<&V>) -> Result<(), String> {
        match value {
            Some(v) if self.0.contains(v) => Err(format!("{v:?} is forbidden")),
            _ => Ok(()),
        }
    }
}

/// Arbitrary check over non-null values.
pub struct Predicate<V> {
    message: String,
    check: Box<dyn Fn(&V) -> bool + Send + Sync>,
}

impl<V> fmt::Debug for Predicate<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl<V> Validator<V> for Predicate<V> {
    fn validate(&self, value: Option<&V>) -> Result<(), String> {
        match value {
            Some(v) if !(self.check)(v) => Err(self.message.clone()),
            _ => Ok(()),
        }
    }
}

// =============================================================================
// FACTORY FUNCTIONS
// =============================================================================

/// Rejects null writes.
#[must_use]
pub fn not_null() -> NotNull {
    NotNull
}

/// Rejects every write.
#[must_use]
pub fn read_only() -> ReadOnly {
    ReadOnly
}

/// Value must be `>= min`.
#[must_use]
pub fn min<V>(min: V) -> Range<V> {
    Range {
        min: Some(min),
        max: None,
    }
}

/// Value must be `<= max`.
#[must_use]
pub fn max<V>(max: V) -> Range<V> {
    Range {
        min: None,
        max: Some(max),
    }
}

/// Value must lie in `min..=max`.
#[must_use]
pub fn between<V>(min: V, max: V) -> Range<V> {
    Range {
        min: Some(min),
        max: Some(max),
    }
}

/// Text length in characters must lie in `min..=max`.
#[must_use]
pub fn length(min: usize, max: usize) -> Length {
    Length { min, max }
}

/// Value must be one of `allowed`.
#[must_use]
pub fn one_of<V>(allowed: impl IntoIterator<Item = V>) -> OneOf<V> {
    OneOf(allowed.into_iter().collect())
}

/// Value must not be one of `forbidden`.
#[must_use]
pub fn none_of<V>(forbidden: impl IntoIterator<Item = V>) -> NoneOf<V> {
    NoneOf(forbidden.into_iter().collect())
}

/// Custom check; `message` is reported when `check` returns false.
#[must_use]
pub fn predicate<V>(
    message: impl Into<String>,
    check: impl Fn(&V) -> bool + Send + Sync + 'static,
) -> Predicate<V> {
    Predicate {
        message: message.into(),
        check: Box::new(check),
    }
}

// =============================================================================
// TESTS
// =============================================================================
