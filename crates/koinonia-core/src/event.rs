//! Event workflow — states, actions, and the transition table.
//!
//! The whole lifecycle is driven by one per-action rule table
//! (`EventAction::rule`): every allowed (action, current state, next
//! state) tuple lives there instead of being re-checked per handler.
//! Every transition appends a Motivo audit row owned by the acting user.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, role::Role};

// ─── States ──────────────────────────────────────────────────────────────────

/// Workflow state of an event. Discriminants match the `estado_evento`
/// directory rows (note the historical gap: there is no state 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
  Pending,
  Approved,
  Rejected,
  Cancelled,
  Postponed,
}

impl EventStatus {
  pub fn id(self) -> i64 {
    match self {
      EventStatus::Pending => 1,
      EventStatus::Approved => 2,
      EventStatus::Rejected => 3,
      EventStatus::Cancelled => 4,
      EventStatus::Postponed => 6,
    }
  }

  pub fn from_id(id: i64) -> Result<Self> {
    match id {
      1 => Ok(EventStatus::Pending),
      2 => Ok(EventStatus::Approved),
      3 => Ok(EventStatus::Rejected),
      4 => Ok(EventStatus::Cancelled),
      6 => Ok(EventStatus::Postponed),
      other => Err(Error::UnknownStatus(other)),
    }
  }

  /// Spanish display name, as shown on the wire.
  pub fn label(self) -> &'static str {
    match self {
      EventStatus::Pending => "Pendiente",
      EventStatus::Approved => "Aprobado",
      EventStatus::Rejected => "Rechazado",
      EventStatus::Cancelled => "Cancelado",
      EventStatus::Postponed => "Pospuesto",
    }
  }
}

// ─── Actions ─────────────────────────────────────────────────────────────────

/// A pastor-gated workflow action on an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
  Approve,
  Reject,
  Cancel,
  Postpone,
}

impl EventAction {
  pub fn wire_name(self) -> &'static str {
    match self {
      EventAction::Approve => "aprobar",
      EventAction::Reject => "rechazar",
      EventAction::Cancel => "cancelar",
      EventAction::Postpone => "posponer",
    }
  }

  pub fn from_wire(s: &str) -> Option<Self> {
    match s {
      "aprobar" => Some(EventAction::Approve),
      "rechazar" => Some(EventAction::Reject),
      "cancelar" => Some(EventAction::Cancel),
      "posponer" => Some(EventAction::Postpone),
      _ => None,
    }
  }
}

// ─── Transition table ────────────────────────────────────────────────────────

impl EventAction {
  /// The table row for this action: allowed source states and the
  /// resulting state.
  const fn rule(self) -> (&'static [EventStatus], EventStatus) {
    match self {
      EventAction::Approve => (
        &[EventStatus::Pending, EventStatus::Postponed],
        EventStatus::Approved,
      ),
      EventAction::Reject => (
        &[EventStatus::Pending, EventStatus::Postponed],
        EventStatus::Rejected,
      ),
      EventAction::Cancel => {
        (&[EventStatus::Approved], EventStatus::Cancelled)
      }
      EventAction::Postpone => {
        (&[EventStatus::Pending], EventStatus::Postponed)
      }
    }
  }
}

/// Resolve `action` against `current` through the table. Disallowed
/// source states fail with [`Error::InvalidTransition`]; the caller must
/// leave the event untouched.
pub fn transition(
  action:  EventAction,
  current: EventStatus,
) -> Result<EventStatus> {
  let (allowed, next) = action.rule();
  if allowed.contains(&current) {
    Ok(next)
  } else {
    Err(Error::InvalidTransition { action, current })
  }
}

/// Initial state at creation: pastors self-approve, everyone else starts
/// pending. The accompanying Motivo text is returned for the pastor case.
pub fn initial_status(creator: Role) -> (EventStatus, Option<&'static str>) {
  if creator == Role::Pastor {
    (EventStatus::Approved, Some("Aprobado automáticamente por pastor"))
  } else {
    (EventStatus::Pending, None)
  }
}

/// State after an edit: pastor edits re-approve, anyone else's edit sends
/// the event back through review.
pub fn status_after_edit(editor: Role) -> EventStatus {
  if editor == Role::Pastor {
    EventStatus::Approved
  } else {
    EventStatus::Pending
  }
}

/// Motivo text used when the acting user supplies none.
pub fn default_reason(next: EventStatus) -> String {
  format!("Evento {}", next.label().to_lowercase())
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Event {
  pub event_id:      i64,
  pub name:          String,
  pub ministry_id:   i64,
  pub ministry_name: String,
  pub description:   Option<String>,
  pub date:          NaiveDate,
  pub time:          NaiveTime,
  pub place:         Option<String>,
  /// Owning user. Nullable: events outlive user removal.
  pub owner:         Option<i64>,
  pub owner_name:    Option<String>,
  pub status:        EventStatus,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl Event {
  pub fn is_owned_by(&self, user_id: i64) -> bool {
    self.owner == Some(user_id)
  }
}

#[derive(Debug, Clone)]
pub struct NewEvent {
  pub name:        String,
  pub ministry_id: i64,
  pub description: Option<String>,
  pub date:        NaiveDate,
  pub time:        NaiveTime,
  pub place:       Option<String>,
  pub owner:       i64,
}

/// Partial event update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
  pub name:        Option<String>,
  pub ministry_id: Option<i64>,
  pub description: Option<String>,
  pub date:        Option<NaiveDate>,
  pub time:        Option<NaiveTime>,
  pub place:       Option<String>,
}

/// An append-only audit note attached to an event state change.
#[derive(Debug, Clone, Serialize)]
pub struct Motivo {
  pub motivo_id:   i64,
  pub event_id:    i64,
  pub user_id:     i64,
  pub description: String,
  pub recorded_at: DateTime<Utc>,
}

/// What a pastor action produced: either a direct state change, or — for
/// a non-owner cancellation of an approved event — a request notification
/// with no event mutation at all.
#[derive(Debug, Clone)]
pub enum ActionOutcome {
  StatusChanged(Event),
  CancellationRequested { notification_id: i64 },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn approve_from_pending_and_postponed_only() {
    assert_eq!(
      transition(EventAction::Approve, EventStatus::Pending).unwrap(),
      EventStatus::Approved
    );
    assert_eq!(
      transition(EventAction::Approve, EventStatus::Postponed).unwrap(),
      EventStatus::Approved
    );
    assert!(matches!(
      transition(EventAction::Approve, EventStatus::Cancelled),
      Err(Error::InvalidTransition { .. })
    ));
  }

  #[test]
  fn cancel_only_from_approved() {
    assert_eq!(
      transition(EventAction::Cancel, EventStatus::Approved).unwrap(),
      EventStatus::Cancelled
    );
    for state in [
      EventStatus::Pending,
      EventStatus::Rejected,
      EventStatus::Cancelled,
      EventStatus::Postponed,
    ] {
      assert!(transition(EventAction::Cancel, state).is_err());
    }
  }

  #[test]
  fn reject_from_pending_and_postponed_only() {
    assert_eq!(
      transition(EventAction::Reject, EventStatus::Pending).unwrap(),
      EventStatus::Rejected
    );
    assert_eq!(
      transition(EventAction::Reject, EventStatus::Postponed).unwrap(),
      EventStatus::Rejected
    );
    assert!(transition(EventAction::Reject, EventStatus::Approved).is_err());
  }

  #[test]
  fn postpone_only_from_pending() {
    assert_eq!(
      transition(EventAction::Postpone, EventStatus::Pending).unwrap(),
      EventStatus::Postponed
    );
    assert!(transition(EventAction::Postpone, EventStatus::Postponed).is_err());
  }

  #[test]
  fn pastor_creations_self_approve() {
    let (status, motivo) = initial_status(Role::Pastor);
    assert_eq!(status, EventStatus::Approved);
    assert!(motivo.is_some());

    let (status, motivo) = initial_status(Role::Member);
    assert_eq!(status, EventStatus::Pending);
    assert!(motivo.is_none());
  }

  #[test]
  fn status_ids_round_trip_with_gap() {
    for s in [
      EventStatus::Pending,
      EventStatus::Approved,
      EventStatus::Rejected,
      EventStatus::Cancelled,
      EventStatus::Postponed,
    ] {
      assert_eq!(EventStatus::from_id(s.id()).unwrap(), s);
    }
    assert!(EventStatus::from_id(5).is_err());
  }
}
