use std::fmt;

use uuid::Uuid;

/// Correlation id attached to every log line of one detection run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunId(String);

impl RunId {
    pub fn new(v: impl Into<String>) -> Self {
        Self(v.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ids_are_unique() {
        assert_ne!(RunId::default(), RunId::default());
    }

    #[test]
    fn explicit_id_round_trips() {
        let id = RunId::new("replay-42");
        assert_eq!(id.as_str(), "replay-42");
        assert_eq!(id.to_string(), "replay-42");
    }
}
