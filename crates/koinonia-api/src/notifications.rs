//! Notification mailbox handlers. Every operation is scoped to the
//! authenticated recipient; a notification addressed to someone else is
//! a 404, never a write.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use koinonia_core::{notification::Notification, store::ChurchStore};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{AppState, auth::AuthUser, error::ApiError};

#[derive(Debug, Serialize)]
pub struct NotificationDto {
  pub id_notificacion: i64,
  pub id_evento:       Option<i64>,
  pub evento:          Option<String>,
  pub ministerio:      Option<String>,
  pub id_emisor:       Option<i64>,
  pub emisor:          Option<String>,
  pub tipo:            &'static str,
  pub mensaje:         String,
  pub motivo_rechazo:  Option<String>,
  pub leida:           bool,
  pub accion_tomada:   Option<bool>,
  pub creada_en:       DateTime<Utc>,
}

impl From<Notification> for NotificationDto {
  fn from(n: Notification) -> Self {
    NotificationDto {
      id_notificacion: n.notification_id,
      id_evento:       n.event_id,
      evento:          n.event_name,
      ministerio:      n.ministry_name,
      id_emisor:       n.sender_id,
      emisor:          n.sender_name,
      tipo:            n.kind.wire_name(),
      mensaje:         n.message,
      motivo_rechazo:  n.rejection_reason,
      leida:           n.read,
      accion_tomada:   n.action_taken,
      creada_en:       n.created_at,
    }
  }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
  pub leida: Option<bool>,
}

/// `GET /api/notificaciones?leida=` — the acting user's inbox, newest
/// first.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Query(query): Query<ListQuery>,
) -> Result<Json<Vec<NotificationDto>>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let notifications = state
    .store
    .list_notifications(actor.user_id, query.leida)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(
    notifications.into_iter().map(NotificationDto::from).collect(),
  ))
}

/// `PATCH /api/notificaciones/{id}/leida`
pub async fn mark_read<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .mark_read(id, actor.user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({ "mensaje": "Notificación marcada como leída" })))
}

#[derive(Debug, Deserialize)]
pub struct RespondBody {
  pub id_notificacion: i64,
  pub aprobada:        bool,
  pub motivo_rechazo:  Option<String>,
}

/// `POST /api/notificaciones/responder` — decide a pending cancellation
/// request. Terminal: responding twice fails.
pub async fn respond<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Json(body): Json<RespondBody>,
) -> Result<Json<Value>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let outcome = state
    .store
    .respond_cancellation(
      body.id_notificacion,
      actor.user_id,
      body.aprobada,
      body.motivo_rechazo,
    )
    .await
    .map_err(ApiError::store)?;

  let mensaje = if body.aprobada {
    "Solicitud de cancelación aprobada"
  } else {
    "Solicitud de cancelación rechazada"
  };
  Ok(Json(json!({
    "mensaje":             mensaje,
    "evento_actualizado":  outcome.event_updated,
  })))
}
