//! # Actors
//!
//! An [`Actor`] is the resolved identity of the caller of a command: a user
//! id, the teams the user belongs to, and whether the user acts for
//! platform arbitration. The identity collaborator builds it; the engine
//! only asks the boolean predicates below.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::identity::{TeamId, UserId};

/// The caller of an engine command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The calling user.
    pub user_id: UserId,
    /// Teams the user is a member of.
    #[serde(default)]
    pub teams: BTreeSet<TeamId>,
    /// Whether the user acts as platform arbitration.
    #[serde(default)]
    pub arbitrator: bool,
}

impl Actor {
    /// A plain user with no team memberships.
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            teams: BTreeSet::new(),
            arbitrator: false,
        }
    }

    /// A platform arbitrator.
    pub fn arbitrator(user_id: UserId) -> Self {
        Self {
            user_id,
            teams: BTreeSet::new(),
            arbitrator: true,
        }
    }

    /// Add a team membership.
    pub fn with_team(mut self, team: TeamId) -> Self {
        self.teams.insert(team);
        self
    }

    /// Whether this actor is the given client.
    pub fn is_client_of(&self, client_id: &UserId) -> bool {
        &self.user_id == client_id
    }

    /// Whether this actor belongs to the given team.
    pub fn is_member_of(&self, team_id: &TeamId) -> bool {
        self.teams.contains(team_id)
    }

    /// Whether this actor acts for platform arbitration.
    pub fn is_arbitrator(&self) -> bool {
        self.arbitrator
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_predicates() {
        let team = TeamId::new();
        let actor = Actor::user(UserId::new()).with_team(team);
        assert!(actor.is_member_of(&team));
        assert!(!actor.is_member_of(&TeamId::new()));
        assert!(!actor.is_arbitrator());
    }

    #[test]
    fn client_predicate_compares_user_id() {
        let user = UserId::new();
        let actor = Actor::user(user);
        assert!(actor.is_client_of(&user));
        assert!(!actor.is_client_of(&UserId::new()));
    }

    #[test]
    fn arbitrator_constructor_sets_flag() {
        assert!(Actor::arbitrator(UserId::new()).is_arbitrator());
    }
}
