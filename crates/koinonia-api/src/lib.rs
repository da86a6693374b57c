//! HTTP layer for Koinonia.
//!
//! Exposes an axum [`Router`] implementing the JSON API backed by any
//! [`ChurchStore`]. All endpoints except `POST /api/login` require a
//! bearer token.

pub mod auth;
pub mod courses;
pub mod error;
pub mod events;
pub mod ministries;
pub mod notifications;
pub mod persons;
pub mod session;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, patch, post, put},
};
use koinonia_core::store::ChurchStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  pub jwt_secret: String,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: ChurchStore> {
  pub store: Arc<S>,
  pub auth:  Arc<AuthConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the API.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  Router::new()
    .route("/api/login", post(session::login::<S>))
    .route(
      "/api/usuarios/cambiar-contrasena",
      put(session::change_password::<S>),
    )
    .route(
      "/api/personas",
      get(persons::list::<S>).post(persons::create::<S>),
    )
    .route(
      "/api/personas/{id}",
      get(persons::get::<S>).put(persons::update::<S>),
    )
    .route("/api/personas/{id}/promover", post(persons::promote::<S>))
    .route(
      "/api/personas/{id}/calificaciones",
      get(courses::student_report::<S>),
    )
    .route(
      "/api/ministerios",
      get(ministries::list::<S>).post(ministries::create::<S>),
    )
    .route(
      "/api/cursos",
      get(courses::list::<S>).post(courses::create::<S>),
    )
    .route(
      "/api/cursos/{id}",
      get(courses::get::<S>).put(courses::update::<S>),
    )
    .route(
      "/api/cursos/{id}/criterios",
      get(courses::list_criteria::<S>).put(courses::replace_criteria::<S>),
    )
    .route(
      "/api/cursos/{id}/participantes",
      get(courses::list_participants::<S>)
        .put(courses::set_participants::<S>),
    )
    .route(
      "/api/cursos/{id}/participantes/{id_persona}/nota-final",
      get(courses::final_grade_report::<S>),
    )
    .route(
      "/api/cursos/{id}/asistencia",
      post(courses::record_attendance::<S>),
    )
    .route(
      "/api/cursos/{id}/tareas",
      get(courses::list_tasks::<S>).post(courses::create_task::<S>),
    )
    .route("/api/tareas/{id}", put(courses::update_task::<S>))
    .route(
      "/api/tareas/{id}/calificaciones",
      get(courses::task_roster::<S>).post(courses::record_grades::<S>),
    )
    .route(
      "/api/eventos",
      get(events::list::<S>).post(events::create::<S>),
    )
    .route("/api/eventos/mis-eventos", get(events::list_mine::<S>))
    .route(
      "/api/eventos/{id}",
      get(events::get::<S>).put(events::update::<S>),
    )
    .route("/api/eventos/{id}/cancelar", patch(events::toggle_cancel::<S>))
    .route("/api/eventos/{id}/accion", post(events::apply_action::<S>))
    .route("/api/eventos/{id}/motivos", get(events::list_motivos::<S>))
    .route("/api/notificaciones", get(notifications::list::<S>))
    .route(
      "/api/notificaciones/{id}/leida",
      patch(notifications::mark_read::<S>),
    )
    .route(
      "/api/notificaciones/responder",
      post(notifications::respond::<S>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────
