//! Error types for `koinonia-core`.
//!
//! Display strings double as the client-facing messages of the `{"error"}`
//! envelope, so they are written in Spanish.

use thiserror::Error;

use crate::event::{EventAction, EventStatus};

#[derive(Debug, Error)]
pub enum Error {
  // ── Lookup misses ─────────────────────────────────────────────────────
  #[error("persona no encontrada: {0}")]
  PersonNotFound(i64),

  #[error("usuario no encontrado: {0}")]
  UserNotFound(i64),

  #[error("ministerio no encontrado: {0}")]
  MinistryNotFound(i64),

  #[error("curso no encontrado: {0}")]
  CourseNotFound(i64),

  #[error("criterio no encontrado: {0}")]
  CriterionNotFound(i64),

  #[error("tarea no encontrada: {0}")]
  TaskNotFound(i64),

  #[error("evento no encontrado: {0}")]
  EventNotFound(i64),

  #[error("notificación no encontrada: {0}")]
  NotificationNotFound(i64),

  // ── Rubric validation ─────────────────────────────────────────────────
  #[error("el porcentaje {0:.2} está fuera del rango permitido [0, 100]")]
  PercentageRange(f64),

  #[error("los porcentajes suman {actual:.2}, deben sumar exactamente 100.00")]
  PercentageSum { actual: f64 },

  #[error("el criterio {criterion} no pertenece al curso {course}")]
  CriterionCourseMismatch { criterion: i64, course: i64 },

  // ── Event workflow ────────────────────────────────────────────────────
  #[error("acción no permitida: no se puede {} un evento en estado {}",
          action.wire_name(), current.label())]
  InvalidTransition {
    action:  EventAction,
    current: EventStatus,
  },

  // ── Permissions ───────────────────────────────────────────────────────
  #[error("{0}")]
  Forbidden(String),

  // ── Notifications ─────────────────────────────────────────────────────
  #[error("la notificación {0} no es una solicitud de cancelación")]
  NotCancellationRequest(i64),

  #[error("la notificación {0} ya fue procesada")]
  AlreadyProcessed(i64),

  // ── Ministries / people ───────────────────────────────────────────────
  #[error("ya existe un ministerio con el nombre {0:?}")]
  DuplicateMinistry(String),

  #[error("una persona no puede ocupar ambos cargos de líder")]
  DuplicateLeaders,

  #[error("todos los datos de la persona {0} deben estar completos para asumir un cargo")]
  IncompletePerson(i64),

  // ── Data integrity / backend ──────────────────────────────────────────
  #[error("estado de evento desconocido: {0}")]
  UnknownStatus(i64),

  #[error("rol desconocido: {0}")]
  UnknownRole(i64),

  #[error("tipo de notificación desconocido: {0:?}")]
  UnknownNotificationKind(String),

  /// Backend failure the caller cannot act on. Logged server-side; never
  /// shown verbatim to clients.
  #[error("error de almacenamiento: {0}")]
  Storage(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
