use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Tier directories scanned under every stack, in scan order.
    pub fn all() -> &'static [Difficulty] {
        &[Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// XP awarded when the challenge metadata does not override it.
    pub fn default_xp(self) -> u32 {
        match self {
            Difficulty::Easy => 50,
            Difficulty::Medium => 100,
            Difficulty::Hard => 150,
        }
    }

    /// Lenient parse used for metadata: case-insensitive, unknown → easy.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Challenge ids
// ---------------------------------------------------------------------------

/// Case-folded challenge id. Every id comparison goes through this so that
/// dedup, lookup and completion checks agree.
pub fn id_key(id: &str) -> String {
    id.trim().to_lowercase()
}

pub fn same_id(a: &str, b: &str) -> bool {
    id_key(a) == id_key(b)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_default_xp() {
        assert_eq!(Difficulty::Easy.default_xp(), 50);
        assert_eq!(Difficulty::Medium.default_xp(), 100);
        assert_eq!(Difficulty::Hard.default_xp(), 150);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("HARD".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(" Medium ".parse::<Difficulty>().unwrap(), Difficulty::Medium);
        assert!("nightmare".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::parse_lenient("nightmare"), Difficulty::Easy);
    }

    #[test]
    fn display_matches_tier_dir() {
        for d in Difficulty::all() {
            assert_eq!(d.to_string(), d.as_str());
        }
    }

    #[test]
    fn ids_fold_case_beyond_ascii() {
        assert!(same_id("Git-Hard", " git-hard "));
        assert!(same_id("ÉTAPE-1", "étape-1"));
        assert!(!same_id("git-hard", "git-easy"));
        assert_eq!(id_key("ÉTAPE-1"), "étape-1");
    }
}
