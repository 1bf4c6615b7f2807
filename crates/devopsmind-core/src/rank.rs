//! XP → rank band lookup.
//!
//! A rank is the highest band whose threshold is ≤ the player's XP.
//! [`CANONICAL`] is the only table any code path applies, including the bulk
//! merge performed by `sync`. [`LEGACY_MERGE`] records the alternate bands
//! older releases used for that merge; a profile carrying one of its titles
//! gets a canonical title the next time its XP changes.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankTable {
    /// Ascending `(threshold, title)` pairs. The first threshold must be 0.
    bands: &'static [(u64, &'static str)],
}

pub const CANONICAL: RankTable = RankTable {
    bands: &[
        (0, "Beginner"),
        (200, "Automation Apprentice"),
        (500, "Container Specialist"),
        (1000, "Kubernetes Practitioner"),
        (1500, "DevOps Architect"),
    ],
};

pub const LEGACY_MERGE: RankTable = RankTable {
    bands: &[
        (0, "Beginner"),
        (500, "Explorer"),
        (1500, "Engineer"),
        (3000, "Architect"),
        (5000, "Master"),
    ],
};

impl RankTable {
    /// Title of the highest band whose threshold is ≤ `xp`.
    pub fn rank_for(&self, xp: u64) -> &'static str {
        self.bands
            .iter()
            .rev()
            .find(|(threshold, _)| *threshold <= xp)
            .map(|(_, title)| *title)
            .unwrap_or(self.bands[0].1)
    }

    /// Position of a title in this table, if it belongs to it.
    #[cfg(test)]
    fn position(&self, title: &str) -> Option<usize> {
        self.bands.iter().position(|(_, t)| *t == title)
    }
}

/// Rank for `xp` under the canonical table.
pub fn rank_for(xp: u64) -> &'static str {
    CANONICAL.rank_for(xp)
}
