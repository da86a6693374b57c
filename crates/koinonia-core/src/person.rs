//! Person — the biographical record of the membership registry.
//!
//! A person exists independently of any login; a [`crate::store::ChurchStore`]
//! user row is only created when the person is promoted into a system role.
//! Persons are never hard-deleted.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
  pub person_id:      i64,
  pub cedula:         Option<String>,
  pub first_names:    String,
  pub last_names:     String,
  pub birth_date:     Option<NaiveDate>,
  pub gender:         Option<String>,
  pub phone:          Option<String>,
  pub address:        Option<String>,
  pub email:          Option<String>,
  pub education:      Option<String>,
  pub nationality:    Option<String>,
  pub profession:     Option<String>,
  pub marital_status: Option<String>,
  pub workplace:      Option<String>,
}

impl Person {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_names, self.last_names)
  }

  /// Whether every biographical field is filled in. Required before the
  /// person can be promoted into a leadership role.
  pub fn is_complete(&self) -> bool {
    fn filled(v: &Option<String>) -> bool {
      v.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
    filled(&self.cedula)
      && self.birth_date.is_some()
      && filled(&self.gender)
      && filled(&self.phone)
      && filled(&self.address)
      && filled(&self.email)
      && filled(&self.education)
      && filled(&self.nationality)
      && filled(&self.profession)
      && filled(&self.marital_status)
      && filled(&self.workplace)
  }

  /// Generated login name for a promoted person: first given name, dot,
  /// first surname, lowercased. The store de-duplicates with a numeric
  /// suffix when taken.
  pub fn base_username(&self) -> String {
    let first = self.first_names.split_whitespace().next().unwrap_or("");
    let last = self.last_names.split_whitespace().next().unwrap_or("");
    format!("{}.{}", first.to_lowercase(), last.to_lowercase())
  }
}

/// Input for person creation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPerson {
  pub cedula:         Option<String>,
  pub first_names:    String,
  pub last_names:     String,
  pub birth_date:     Option<NaiveDate>,
  pub gender:         Option<String>,
  pub phone:          Option<String>,
  pub address:        Option<String>,
  pub email:          Option<String>,
  pub education:      Option<String>,
  pub nationality:    Option<String>,
  pub profession:     Option<String>,
  pub marital_status: Option<String>,
  pub workplace:      Option<String>,
}

/// Partial update for a person. `None` fields are left untouched; each
/// provided field is applied explicitly, replacing the dynamic
/// attribute-patching of the system this one supersedes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonPatch {
  pub cedula:         Option<String>,
  pub first_names:    Option<String>,
  pub last_names:     Option<String>,
  pub birth_date:     Option<NaiveDate>,
  pub gender:         Option<String>,
  pub phone:          Option<String>,
  pub address:        Option<String>,
  pub email:          Option<String>,
  pub education:      Option<String>,
  pub nationality:    Option<String>,
  pub profession:     Option<String>,
  pub marital_status: Option<String>,
  pub workplace:      Option<String>,
}

impl PersonPatch {
  pub fn is_empty(&self) -> bool {
    self.cedula.is_none()
      && self.first_names.is_none()
      && self.last_names.is_none()
      && self.birth_date.is_none()
      && self.gender.is_none()
      && self.phone.is_none()
      && self.address.is_none()
      && self.email.is_none()
      && self.education.is_none()
      && self.nationality.is_none()
      && self.profession.is_none()
      && self.marital_status.is_none()
      && self.workplace.is_none()
  }

  pub fn apply(&self, person: &mut Person) {
    if let Some(v) = &self.cedula { person.cedula = Some(v.clone()); }
    if let Some(v) = &self.first_names { person.first_names = v.clone(); }
    if let Some(v) = &self.last_names { person.last_names = v.clone(); }
    if let Some(v) = self.birth_date { person.birth_date = Some(v); }
    if let Some(v) = &self.gender { person.gender = Some(v.clone()); }
    if let Some(v) = &self.phone { person.phone = Some(v.clone()); }
    if let Some(v) = &self.address { person.address = Some(v.clone()); }
    if let Some(v) = &self.email { person.email = Some(v.clone()); }
    if let Some(v) = &self.education { person.education = Some(v.clone()); }
    if let Some(v) = &self.nationality { person.nationality = Some(v.clone()); }
    if let Some(v) = &self.profession { person.profession = Some(v.clone()); }
    if let Some(v) = &self.marital_status {
      person.marital_status = Some(v.clone());
    }
    if let Some(v) = &self.workplace { person.workplace = Some(v.clone()); }
  }
}

/// An authentication identity bound one-to-one to a person. The `active`
/// flag supersedes deletion.
#[derive(Debug, Clone, Serialize)]
pub struct User {
  pub user_id:   i64,
  pub person_id: i64,
  pub role:      Role,
  pub username:  String,
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub active:    bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn complete_person() -> Person {
    Person {
      person_id:      1,
      cedula:         Some("001-0000000-1".into()),
      first_names:    "Ana María".into(),
      last_names:     "Pérez Gómez".into(),
      birth_date:     NaiveDate::from_ymd_opt(1990, 4, 12),
      gender:         Some("F".into()),
      phone:          Some("809-555-0100".into()),
      address:        Some("Calle 1 #2".into()),
      email:          Some("ana@example.com".into()),
      education:      Some("Universitario".into()),
      nationality:    Some("Dominicana".into()),
      profession:     Some("Contadora".into()),
      marital_status: Some("Casada".into()),
      workplace:      Some("Oficina Central".into()),
    }
  }

  #[test]
  fn complete_person_is_complete() {
    assert!(complete_person().is_complete());
  }

  #[test]
  fn missing_or_blank_field_is_incomplete() {
    let mut p = complete_person();
    p.profession = None;
    assert!(!p.is_complete());

    let mut p = complete_person();
    p.cedula = Some("   ".into());
    assert!(!p.is_complete());
  }

  #[test]
  fn base_username_uses_first_tokens() {
    let p = complete_person();
    assert_eq!(p.base_username(), "ana.pérez");
  }

  #[test]
  fn patch_applies_only_provided_fields() {
    let mut p = complete_person();
    let patch = PersonPatch {
      phone: Some("809-555-0200".into()),
      ..Default::default()
    };
    patch.apply(&mut p);
    assert_eq!(p.phone.as_deref(), Some("809-555-0200"));
    assert_eq!(p.email.as_deref(), Some("ana@example.com"));
  }
}
