//! Roles and the acting identity handlers thread through every operation.
//!
//! Role *names* travel in token claims; the numeric ids live in the `rol`
//! directory table. The core only ever sees a resolved [`Role`] — callers
//! that fail to resolve a name must treat the request as forbidden, never
//! as a crash.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A resolved system role. The discriminants match the `rol` directory
/// rows seeded at schema creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
  Pastor,
  Leader,
  Member,
}

impl Role {
  pub fn id(self) -> i64 {
    match self {
      Role::Pastor => 1,
      Role::Leader => 2,
      Role::Member => 3,
    }
  }

  pub fn from_id(id: i64) -> Result<Self> {
    match id {
      1 => Ok(Role::Pastor),
      2 => Ok(Role::Leader),
      3 => Ok(Role::Member),
      other => Err(Error::UnknownRole(other)),
    }
  }

  /// The name stored in the directory and carried in token claims.
  pub fn name(self) -> &'static str {
    match self {
      Role::Pastor => "Pastor",
      Role::Leader => "Lider",
      Role::Member => "Miembro",
    }
  }
}

/// The authenticated identity performing an operation: user id plus the
/// role resolved through the directory.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
  pub user_id: i64,
  pub role:    Role,
}

impl Actor {
  pub fn is_pastor(&self) -> bool { self.role == Role::Pastor }
}
