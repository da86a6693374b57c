//! Notifications — directed, stateful messages between two users,
//! optionally tied to an event.
//!
//! The mailbox carries the round trip of the cross-user cancellation
//! flow: a pastor's `solicitud_cancelacion` goes to the event owner; the
//! owner's decision either cancels the event or sends a
//! `respuesta_rechazo` back. Once `accion_tomada` is set the
//! notification is terminal.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Error, Result};

/// Message kind, stored and transmitted as its wire string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationKind {
  CancellationRequest,
  RejectionReply,
}

impl NotificationKind {
  pub fn wire_name(self) -> &'static str {
    match self {
      NotificationKind::CancellationRequest => "solicitud_cancelacion",
      NotificationKind::RejectionReply => "respuesta_rechazo",
    }
  }

  pub fn from_wire(s: &str) -> Result<Self> {
    match s {
      "solicitud_cancelacion" => Ok(NotificationKind::CancellationRequest),
      "respuesta_rechazo" => Ok(NotificationKind::RejectionReply),
      other => Err(Error::UnknownNotificationKind(other.to_string())),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
  pub notification_id: i64,
  pub event_id:        Option<i64>,
  pub event_name:      Option<String>,
  pub ministry_name:   Option<String>,
  pub sender_id:       Option<i64>,
  pub sender_name:     Option<String>,
  pub recipient_id:    i64,
  pub kind:            NotificationKind,
  pub message:         String,
  pub rejection_reason: Option<String>,
  pub read:            bool,
  /// Decision outcome; `None` until the recipient responds, then
  /// immutable.
  pub action_taken:    Option<bool>,
  pub created_at:      DateTime<Utc>,
}

impl Notification {
  /// Whether [`respond`](crate::store::ChurchStore::respond_cancellation)
  /// may still act on this notification.
  pub fn ensure_respondable(&self) -> Result<()> {
    if self.kind != NotificationKind::CancellationRequest {
      return Err(Error::NotCancellationRequest(self.notification_id));
    }
    if self.action_taken.is_some() {
      return Err(Error::AlreadyProcessed(self.notification_id));
    }
    Ok(())
  }
}

/// Body of the request notification sent to an event owner.
pub fn cancellation_request_message(event_name: &str, reason: &str) -> String {
  format!(
    "Solicitud de cancelación del evento '{event_name}'. Motivo: {reason}"
  )
}

/// Body of the reply sent back to the requester on rejection.
pub fn rejection_reply_message(
  event_name:    &str,
  ministry_name: &str,
  responder:     &str,
  reason:        &str,
) -> String {
  format!(
    "Tu solicitud de cancelación del evento '{event_name}' \
     (Ministerio: {ministry_name}) fue rechazada por {responder}. \
     Motivo: {reason}"
  )
}
