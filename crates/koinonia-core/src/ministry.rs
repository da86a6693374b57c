//! Ministry — an organisational unit with up to two leader users.
//!
//! Creating a ministry may promote plain persons into Leader users; the
//! two leader slots, when both set, must reference distinct persons.

use serde::Serialize;

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct Ministry {
  pub ministry_id: i64,
  pub name:        String,
  pub description: Option<String>,
  pub status:      String,
  /// User ids of the leader slots.
  pub leader1:     Option<i64>,
  pub leader2:     Option<i64>,
}

/// A person to be promoted into a Leader user as part of ministry
/// creation. The credential hash is produced by the caller (the core has
/// no password dependency); the store generates the username inside the
/// same transaction.
#[derive(Debug, Clone)]
pub struct LeaderPromotion {
  pub person_id:     i64,
  pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewMinistry {
  pub name:        String,
  pub description: Option<String>,
  pub status:      String,
  pub leader1:     Option<LeaderPromotion>,
  pub leader2:     Option<LeaderPromotion>,
}

impl NewMinistry {
  /// Both leader slots, when set, must reference distinct persons.
  pub fn validate(&self) -> Result<()> {
    if let (Some(a), Some(b)) = (&self.leader1, &self.leader2)
      && a.person_id == b.person_id
    {
      return Err(Error::DuplicateLeaders);
    }
    Ok(())
  }
}

/// Credentials echoed back once when a leader user is created.
#[derive(Debug, Clone, Serialize)]
pub struct PromotedLeader {
  pub user_id:   i64,
  pub person_id: i64,
  pub username:  String,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn promotion(person_id: i64) -> LeaderPromotion {
    LeaderPromotion { person_id, password_hash: "$argon2id$stub".into() }
  }

  #[test]
  fn same_person_in_both_slots_rejected() {
    let new = NewMinistry {
      name:        "Alabanza".into(),
      description: None,
      status:      "Activo".into(),
      leader1:     Some(promotion(7)),
      leader2:     Some(promotion(7)),
    };
    assert!(matches!(new.validate(), Err(Error::DuplicateLeaders)));
  }

  #[test]
  fn distinct_persons_accepted() {
    let new = NewMinistry {
      name:        "Alabanza".into(),
      description: None,
      status:      "Activo".into(),
      leader1:     Some(promotion(7)),
      leader2:     Some(promotion(8)),
    };
    assert!(new.validate().is_ok());
  }
}
