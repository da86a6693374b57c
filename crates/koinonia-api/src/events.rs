//! Event workflow handlers.
//!
//! Creation and edits are open to any authenticated user (the store
//! enforces owner/pastor rules for edits); the `accion` endpoint drives
//! the pastor-gated transition table, and `cancelar` is the owner's
//! toggle. A non-owner pastor cancelling an approved event files a
//! notification instead of mutating the event — the two outcomes are
//! distinguished in the response body.

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use koinonia_core::{
  event::{ActionOutcome, Event, EventAction, EventPatch, Motivo, NewEvent},
  store::ChurchStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{AppState, auth::AuthUser, error::ApiError};

#[derive(Debug, Serialize)]
pub struct EventDto {
  pub id_evento:      i64,
  pub nombre:         String,
  pub id_ministerio:  i64,
  pub ministerio:     String,
  pub descripcion:    Option<String>,
  pub fecha:          NaiveDate,
  pub hora:           NaiveTime,
  pub lugar:          Option<String>,
  pub id_usuario:     Option<i64>,
  pub creador:        Option<String>,
  pub estado:         &'static str,
  pub creado_en:      DateTime<Utc>,
  pub actualizado_en: DateTime<Utc>,
}

impl From<Event> for EventDto {
  fn from(e: Event) -> Self {
    EventDto {
      id_evento:      e.event_id,
      nombre:         e.name,
      id_ministerio:  e.ministry_id,
      ministerio:     e.ministry_name,
      descripcion:    e.description,
      fecha:          e.date,
      hora:           e.time,
      lugar:          e.place,
      id_usuario:     e.owner,
      creador:        e.owner_name,
      estado:         e.status.label(),
      creado_en:      e.created_at,
      actualizado_en: e.updated_at,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct EventBody {
  pub nombre:        String,
  pub id_ministerio: i64,
  pub descripcion:   Option<String>,
  pub fecha:         NaiveDate,
  pub hora:          NaiveTime,
  pub lugar:         Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventPatchBody {
  pub nombre:        Option<String>,
  pub id_ministerio: Option<i64>,
  pub descripcion:   Option<String>,
  pub fecha:         Option<NaiveDate>,
  pub hora:          Option<NaiveTime>,
  pub lugar:         Option<String>,
}

/// `POST /api/eventos` — pastors self-approve, everyone else starts
/// Pendiente.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Json(body): Json<EventBody>,
) -> Result<Json<EventDto>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  if body.nombre.trim().is_empty() {
    return Err(ApiError::BadRequest(
      "el nombre del evento es obligatorio".to_string(),
    ));
  }
  let event = state
    .store
    .create_event(
      NewEvent {
        name:        body.nombre,
        ministry_id: body.id_ministerio,
        description: body.descripcion,
        date:        body.fecha,
        time:        body.hora,
        place:       body.lugar,
        owner:       actor.user_id,
      },
      actor.role,
    )
    .await
    .map_err(ApiError::store)?;
  tracing::info!(event = event.event_id, estado = event.status.label(), "event created");
  Ok(Json(event.into()))
}

/// `GET /api/eventos`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  AuthUser(_actor): AuthUser,
) -> Result<Json<Vec<EventDto>>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let events = state
    .store
    .list_events(None)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(events.into_iter().map(EventDto::from).collect()))
}

/// `GET /api/eventos/mis-eventos`
pub async fn list_mine<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
) -> Result<Json<Vec<EventDto>>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let events = state
    .store
    .list_events(Some(actor.user_id))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(events.into_iter().map(EventDto::from).collect()))
}

/// `GET /api/eventos/{id}`
pub async fn get<S>(
  State(state): State<AppState<S>>,
  AuthUser(_actor): AuthUser,
  Path(id): Path<i64>,
) -> Result<Json<EventDto>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let event = state
    .store
    .get_event(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::store(koinonia_core::Error::EventNotFound(id))
    })?;
  Ok(Json(event.into()))
}

/// `PUT /api/eventos/{id}` — owner or pastor; a non-pastor edit sends
/// the event back through review.
pub async fn update<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Path(id): Path<i64>,
  Json(body): Json<EventPatchBody>,
) -> Result<Json<EventDto>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let patch = EventPatch {
    name:        body.nombre,
    ministry_id: body.id_ministerio,
    description: body.descripcion,
    date:        body.fecha,
    time:        body.hora,
    place:       body.lugar,
  };
  let event = state
    .store
    .update_event(id, actor, patch)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(event.into()))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonBody {
  pub motivo: Option<String>,
}

/// `PATCH /api/eventos/{id}/cancelar` — owner-only Cancelado ⇄ Aprobado
/// toggle.
pub async fn toggle_cancel<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Path(id): Path<i64>,
  body: Option<Json<ReasonBody>>,
) -> Result<Json<EventDto>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let reason = body.and_then(|Json(b)| b.motivo);
  let event = state
    .store
    .toggle_cancel(id, actor.user_id, reason)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(event.into()))
}

#[derive(Debug, Serialize)]
pub struct MotivoDto {
  pub id_motivo:     i64,
  pub id_evento:     i64,
  pub id_usuario:    i64,
  pub descripcion:   String,
  pub registrado_en: DateTime<Utc>,
}

impl From<Motivo> for MotivoDto {
  fn from(m: Motivo) -> Self {
    MotivoDto {
      id_motivo:     m.motivo_id,
      id_evento:     m.event_id,
      id_usuario:    m.user_id,
      descripcion:   m.description,
      registrado_en: m.recorded_at,
    }
  }
}

/// `GET /api/eventos/{id}/motivos` — the event's audit trail, oldest
/// first.
pub async fn list_motivos<S>(
  State(state): State<AppState<S>>,
  AuthUser(_actor): AuthUser,
  Path(id): Path<i64>,
) -> Result<Json<Vec<MotivoDto>>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let motivos = state
    .store
    .list_motivos(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(motivos.into_iter().map(MotivoDto::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ActionBody {
  pub accion: String,
  pub motivo: Option<String>,
}

/// `POST /api/eventos/{id}/accion` — pastor workflow action
/// (`aprobar`, `rechazar`, `cancelar`, `posponer`).
pub async fn apply_action<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Path(id): Path<i64>,
  Json(body): Json<ActionBody>,
) -> Result<Json<Value>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let action = EventAction::from_wire(&body.accion).ok_or_else(|| {
    ApiError::BadRequest(format!("acción desconocida: {}", body.accion))
  })?;

  let outcome = state
    .store
    .apply_action(id, actor, action, body.motivo)
    .await
    .map_err(ApiError::store)?;

  match outcome {
    ActionOutcome::StatusChanged(event) => {
      tracing::info!(
        event = event.event_id,
        estado = event.status.label(),
        "event transitioned"
      );
      Ok(Json(json!({
        "mensaje": format!("Evento {}", event.status.label().to_lowercase()),
        "evento":  EventDto::from(event),
      })))
    }
    ActionOutcome::CancellationRequested { notification_id } => {
      tracing::info!(event = id, notification = notification_id, "cancellation requested");
      Ok(Json(json!({
        "mensaje": "Se envió una solicitud de cancelación al creador del evento",
        "id_notificacion": notification_id,
      })))
    }
  }
}
