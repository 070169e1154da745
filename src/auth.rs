use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::errors::{ProtocolError, Result};
use crate::types::AccountId;

/// roles a caller can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// parameter updates, pause, liquidator management, minting
    Admin,
    /// may liquidate unsafe or overdue lines
    Liquidator,
    /// the credit orchestrator, sole writer of the ledgers
    Orchestrator,
}

/// identity based role checks, in one place
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessControl {
    admin: AccountId,
    orchestrator: AccountId,
    liquidators: BTreeSet<AccountId>,
}

impl AccessControl {
    pub fn new(admin: AccountId, orchestrator: AccountId) -> Self {
        Self {
            admin,
            orchestrator,
            liquidators: BTreeSet::new(),
        }
    }

    pub fn admin(&self) -> &AccountId {
        &self.admin
    }

    pub fn orchestrator(&self) -> &AccountId {
        &self.orchestrator
    }

    pub fn liquidators(&self) -> impl Iterator<Item = &AccountId> {
        self.liquidators.iter()
    }

    pub fn has_role(&self, caller: &AccountId, role: Role) -> bool {
        match role {
            Role::Admin => caller == &self.admin,
            Role::Orchestrator => caller == &self.orchestrator,
            Role::Liquidator => self.liquidators.contains(caller),
        }
    }

    pub fn require(&self, caller: &AccountId, role: Role, action: &str) -> Result<()> {
        self.require_any(caller, &[role], action)
    }

    pub fn require_any(&self, caller: &AccountId, roles: &[Role], action: &str) -> Result<()> {
        if roles.iter().any(|role| self.has_role(caller, *role)) {
            Ok(())
        } else {
            Err(unauthorized(caller, action))
        }
    }

    /// returns true when membership changed
    pub fn set_liquidator(&mut self, liquidator: AccountId, enabled: bool) -> bool {
        if enabled {
            self.liquidators.insert(liquidator)
        } else {
            self.liquidators.remove(&liquidator)
        }
    }
}

/// ledgers accept writes only from the identity that owns them
pub fn ensure_owner(owner: &AccountId, caller: &AccountId, action: &str) -> Result<()> {
    if owner == caller {
        Ok(())
    } else {
        Err(unauthorized(caller, action))
    }
}

fn unauthorized(caller: &AccountId, action: &str) -> ProtocolError {
    ProtocolError::Unauthorized {
        caller: caller.clone(),
        action: action.to_string(),
    }
}
