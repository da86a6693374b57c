//! Ministry handlers. Creating a ministry may promote plain persons
//! into Leader users in the same transaction; their initial password is
//! their cédula.

use axum::{Json, extract::State};
use koinonia_core::{
  ministry::{LeaderPromotion, Ministry, NewMinistry, PromotedLeader},
  store::ChurchStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
  AppState,
  auth::{AuthUser, hash_password},
  error::ApiError,
};

#[derive(Debug, Serialize)]
pub struct MinistryDto {
  pub id_ministerio: i64,
  pub nombre:        String,
  pub descripcion:   Option<String>,
  pub estatus:       String,
  pub id_lider1:     Option<i64>,
  pub id_lider2:     Option<i64>,
}

impl From<Ministry> for MinistryDto {
  fn from(m: Ministry) -> Self {
    MinistryDto {
      id_ministerio: m.ministry_id,
      nombre:        m.name,
      descripcion:   m.description,
      estatus:       m.status,
      id_lider1:     m.leader1,
      id_lider2:     m.leader2,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct PromotedLeaderDto {
  pub id_usuario:     i64,
  pub id_persona:     i64,
  pub nombre_usuario: String,
}

impl From<PromotedLeader> for PromotedLeaderDto {
  fn from(p: PromotedLeader) -> Self {
    PromotedLeaderDto {
      id_usuario:     p.user_id,
      id_persona:     p.person_id,
      nombre_usuario: p.username,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct MinistryBody {
  pub nombre:      String,
  pub descripcion: Option<String>,
  pub estatus:     Option<String>,
  pub id_lider1:   Option<i64>,
  pub id_lider2:   Option<i64>,
}

/// Build a promotion for a leader slot; the password hash comes from the
/// person's cédula, so the record must carry one.
async fn leader_promotion<S>(
  state:     &AppState<S>,
  person_id: i64,
) -> Result<LeaderPromotion, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let person = state
    .store
    .get_person(person_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::store(koinonia_core::Error::PersonNotFound(person_id))
    })?;
  let cedula = person.cedula.ok_or_else(|| {
    ApiError::store(koinonia_core::Error::IncompletePerson(person_id))
  })?;
  let password_hash = hash_password(&cedula).map_err(ApiError::internal)?;
  Ok(LeaderPromotion { person_id, password_hash })
}

/// `POST /api/ministerios` — pastor only.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Json(body): Json<MinistryBody>,
) -> Result<Json<Value>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  if !actor.is_pastor() {
    return Err(ApiError::Forbidden(
      "solo un pastor puede crear ministerios".to_string(),
    ));
  }
  if body.nombre.trim().is_empty() {
    return Err(ApiError::BadRequest(
      "el nombre del ministerio es obligatorio".to_string(),
    ));
  }

  let leader1 = match body.id_lider1 {
    Some(id) => Some(leader_promotion(&state, id).await?),
    None => None,
  };
  let leader2 = match body.id_lider2 {
    Some(id) => Some(leader_promotion(&state, id).await?),
    None => None,
  };

  let (ministry, promoted) = state
    .store
    .add_ministry(NewMinistry {
      name: body.nombre,
      description: body.descripcion,
      status: body.estatus.unwrap_or_else(|| "Activo".to_string()),
      leader1,
      leader2,
    })
    .await
    .map_err(ApiError::store)?;

  tracing::info!(ministry = %ministry.name, "ministry created");
  Ok(Json(json!({
    "mensaje":            "Ministerio creado",
    "ministerio":         MinistryDto::from(ministry),
    "lideres_promovidos": promoted
      .into_iter()
      .map(PromotedLeaderDto::from)
      .collect::<Vec<_>>(),
  })))
}

/// `GET /api/ministerios`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  AuthUser(_actor): AuthUser,
) -> Result<Json<Vec<MinistryDto>>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let ministries =
    state.store.list_ministries().await.map_err(ApiError::store)?;
  Ok(Json(ministries.into_iter().map(MinistryDto::from).collect()))
}
