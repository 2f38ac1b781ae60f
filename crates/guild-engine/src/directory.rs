//! # Team Directory
//!
//! The engine does not own teams or users. [`TeamDirectory`] is the seam to
//! the identity collaborator: it answers team membership (to build an
//! [`Actor`]) and team reputation (rating and level, for proposal ranking).

use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use guild_core::{Actor, TeamId, UserId};

/// Public profile of a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamProfile {
    /// Team identifier.
    pub team_id: TeamId,
    /// Display name.
    pub name: String,
    /// Average review rating multiplied by 100 (e.g. 472 = 4.72).
    #[serde(default)]
    pub rating: u32,
    /// Gamified team level.
    #[serde(default)]
    pub level: u32,
    /// Team members.
    #[serde(default)]
    pub members: BTreeSet<UserId>,
}

/// Source of team membership and reputation.
pub trait TeamDirectory: Send + Sync {
    /// Profile of a team, if known.
    fn profile(&self, team_id: &TeamId) -> Option<TeamProfile>;

    /// Teams the user belongs to.
    fn teams_of(&self, user_id: &UserId) -> BTreeSet<TeamId>;

    /// Build an actor for `user_id` with its memberships resolved.
    fn actor_for(&self, user_id: UserId, arbitrator: bool) -> Actor {
        Actor {
            user_id,
            teams: self.teams_of(&user_id),
            arbitrator,
        }
    }
}

/// In-process directory, seeded from configuration or by tests.
#[derive(Debug, Default)]
pub struct InMemoryTeamDirectory {
    teams: RwLock<HashMap<TeamId, TeamProfile>>,
}

impl InMemoryTeamDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory pre-populated with `profiles`.
    pub fn with_profiles(profiles: impl IntoIterator<Item = TeamProfile>) -> Self {
        let dir = Self::new();
        for p in profiles {
            dir.upsert(p);
        }
        dir
    }

    /// Insert or replace a team profile.
    pub fn upsert(&self, profile: TeamProfile) {
        self.teams.write().insert(profile.team_id, profile);
    }

    /// All known profiles.
    pub fn list(&self) -> Vec<TeamProfile> {
        self.teams.read().values().cloned().collect()
    }
}

impl TeamDirectory for InMemoryTeamDirectory {
    fn profile(&self, team_id: &TeamId) -> Option<TeamProfile> {
        self.teams.read().get(team_id).cloned()
    }

    fn teams_of(&self, user_id: &UserId) -> BTreeSet<TeamId> {
        self.teams
            .read()
            .values()
            .filter(|t| t.members.contains(user_id))
            .map(|t| t.team_id)
            .collect()
    }
}
