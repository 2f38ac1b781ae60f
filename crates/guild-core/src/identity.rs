//! # Identity Newtypes
//!
//! UUID-backed identifiers for every entity the engine tracks. Each
//! identifier is a distinct type, always valid by construction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Create a new random ", $label, " identifier.")]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a ", $label, " identifier from an existing UUID.")]
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_identifier!(
    /// A marketplace user (client, team member, or arbitrator).
    UserId,
    "user"
);
uuid_identifier!(
    /// A team that bids on projects.
    TeamId,
    "team"
);
uuid_identifier!(
    /// A project posted by a client.
    ProjectId,
    "project"
);
uuid_identifier!(
    /// A team's bid against a project.
    ProposalId,
    "proposal"
);
uuid_identifier!(
    /// A contract materialized from an accepted proposal.
    ContractId,
    "contract"
);
uuid_identifier!(
    /// A separately payable unit of work within a contract.
    MilestoneId,
    "milestone"
);
uuid_identifier!(
    /// A result submission against a milestone.
    SubmissionId,
    "submission"
);
uuid_identifier!(
    /// A dispute raised against a contract or milestone.
    DisputeId,
    "dispute"
);
