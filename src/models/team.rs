//! Team classification and alias canonicalization.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Fixed set of teams a job can be routed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// Art, illustration, concept and visual roles.
    Art,
    /// Game, level and systems design roles.
    GameDesign,
    /// Programming and engineering roles.
    Dev,
    /// Everything else (production, QA, marketing, ...).
    Others,
}

/// Alias table consulted by [`Team::sanitize`]. Keys are already lowercased
/// with spaces replaced by underscores.
const ALIASES: &[(Team, &[&str])] = &[
    (
        Team::Art,
        &["art", "aart", "visual_art", "artistic", "concept_art"],
    ),
    (
        Team::GameDesign,
        &[
            "game_design",
            "design",
            "gameplay_design",
            "level_design",
            "systems_design",
        ],
    ),
    (
        Team::Dev,
        &[
            "dev",
            "development",
            "programming",
            "engineering",
            "code",
            "software",
        ],
    ),
    (
        Team::Others,
        &[
            "others",
            "qa",
            "production",
            "producer",
            "biz",
            "marketing",
            "community",
            "support",
        ],
    ),
];

impl Team {
    /// Every team, in display order.
    pub const ALL: [Self; 4] = [Self::Art, Self::GameDesign, Self::Dev, Self::Others];

    /// Canonical snake-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Art => "art",
            Self::GameDesign => "game_design",
            Self::Dev => "dev",
            Self::Others => "others",
        }
    }

    /// Emoji prefix used when rendering postings for this team.
    #[must_use]
    pub fn emoji(self) -> &'static str {
        match self {
            Self::Art => "\u{1f3a8}",
            Self::GameDesign => "\u{1f9e0}",
            Self::Dev => "\u{1f4bb}",
            Self::Others => "\u{1f9e9}",
        }
    }

    /// Map free-form team text onto a canonical team.
    ///
    /// Input is lowercased and spaces become underscores before the alias
    /// lookup. Empty or unrecognized input yields [`Team::Others`].
    #[must_use]
    pub fn sanitize(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase().replace(' ', "_");
        if normalized.is_empty() {
            return Self::Others;
        }
        ALIASES
            .iter()
            .find(|(_, variants)| variants.contains(&normalized.as_str()))
            .map_or(Self::Others, |(team, _)| *team)
    }

    /// Strict parse of a canonical team name (used for configuration keys).
    #[must_use]
    pub fn from_canonical(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace(' ', "_");
        Self::ALL.into_iter().find(|team| team.as_str() == normalized)
    }
}

impl Display for Team {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
