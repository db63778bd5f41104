//! Session context: the exercise the backend scores frames against.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced when building session context.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("exercise identifier must not be empty")]
    EmptyExercise,
}

/// Identifier of the reference exercise, normalised to lowercase.
///
/// The backend lowercases identifiers on receipt; normalising on the client
/// keeps log output and comparisons consistent with what the server sees.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExerciseId(String);

impl ExerciseId {
    /// Trims and lowercases `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EmptyExercise`] if `raw` is blank.
    pub fn new(raw: &str) -> Result<Self, SessionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SessionError::EmptyExercise);
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ExerciseId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for ExerciseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
