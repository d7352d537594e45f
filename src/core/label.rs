//! Door transition labels.

use serde::{Deserialize, Serialize};

/// Classification of a movement segment.
///
/// `Ignore` only exists during data collection, to drop a segment without
/// training on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Open,
    Closed,
    Ignore,
}

impl Label {
    /// Numeric class code used in training files and model outputs.
    pub fn code(self) -> u8 {
        match self {
            Label::Closed => 0,
            Label::Open => 1,
            Label::Ignore => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Label::Closed),
            1 => Some(Label::Open),
            2 => Some(Label::Ignore),
            _ => None,
        }
    }

    /// Parse the CSV form ("0", "1" or "2").
    pub fn from_csv(s: &str) -> Option<Self> {
        s.trim().parse::<u8>().ok().and_then(Self::from_code)
    }

    /// Whether segments with this label are kept for training.
    pub fn is_trainable(self) -> bool {
        !matches!(self, Label::Ignore)
    }

    /// Name used in published events.
    pub fn display_name(self) -> &'static str {
        match self {
            Label::Open => "Open",
            Label::Closed => "Closed",
            Label::Ignore => "Ignore",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        for label in [Label::Open, Label::Closed, Label::Ignore] {
            assert_eq!(Label::from_code(label.code()), Some(label));
        }
        assert_eq!(Label::from_code(7), None);
    }

    #[test]
    fn test_csv_parsing() {
        assert_eq!(Label::from_csv("1"), Some(Label::Open));
        assert_eq!(Label::from_csv(" 0 "), Some(Label::Closed));
        assert_eq!(Label::from_csv("open"), None);
    }

    #[test]
    fn test_trainable() {
        assert!(Label::Open.is_trainable());
        assert!(!Label::Ignore.is_trainable());
    }
}
