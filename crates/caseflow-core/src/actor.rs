//! Caller identity and role context.
//!
//! Every engine call receives an explicit actor context in place of any
//! ambient session state. The engine trusts this context; authenticating
//! it is the job of the adapter layer that produced it.

use serde::{Deserialize, Serialize};

use caseflow_store::{ActorId, OrgId};

/// The side of the hand-off an actor works for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Originating enterprise that owns cases.
    Enterprise,
    /// Collection agency working assigned cases.
    Dca,
}

/// Identity, role, and organization of the caller of an engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor: ActorId,
    pub role: Role,
    pub org: OrgId,
}

impl ActorContext {
    pub fn new(actor: ActorId, role: Role, org: OrgId) -> Self {
        Self { actor, role, org }
    }

    pub fn is_enterprise(&self) -> bool {
        self.role == Role::Enterprise
    }

    pub fn is_dca(&self) -> bool {
        self.role == Role::Dca
    }
}
