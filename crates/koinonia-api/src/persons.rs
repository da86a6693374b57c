//! Membership registry handlers: person CRUD and role promotion.

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::NaiveDate;
use koinonia_core::{
  person::{NewPerson, Person, PersonPatch},
  role::Role,
  store::ChurchStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
  AppState,
  auth::{AuthUser, hash_password},
  error::ApiError,
  session::UserDto,
};

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PersonDto {
  pub id_persona:       i64,
  pub cedula:           Option<String>,
  pub nombres:          String,
  pub apellidos:        String,
  pub fecha_nacimiento: Option<NaiveDate>,
  pub genero:           Option<String>,
  pub telefono:         Option<String>,
  pub direccion:        Option<String>,
  pub correo:           Option<String>,
  pub nivel_estudios:   Option<String>,
  pub nacionalidad:     Option<String>,
  pub profesion:        Option<String>,
  pub estado_civil:     Option<String>,
  pub lugar_trabajo:    Option<String>,
}

impl From<Person> for PersonDto {
  fn from(p: Person) -> Self {
    PersonDto {
      id_persona:       p.person_id,
      cedula:           p.cedula,
      nombres:          p.first_names,
      apellidos:        p.last_names,
      fecha_nacimiento: p.birth_date,
      genero:           p.gender,
      telefono:         p.phone,
      direccion:        p.address,
      correo:           p.email,
      nivel_estudios:   p.education,
      nacionalidad:     p.nationality,
      profesion:        p.profession,
      estado_civil:     p.marital_status,
      lugar_trabajo:    p.workplace,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct PersonBody {
  pub cedula:           Option<String>,
  pub nombres:          String,
  pub apellidos:        String,
  pub fecha_nacimiento: Option<NaiveDate>,
  pub genero:           Option<String>,
  pub telefono:         Option<String>,
  pub direccion:        Option<String>,
  pub correo:           Option<String>,
  pub nivel_estudios:   Option<String>,
  pub nacionalidad:     Option<String>,
  pub profesion:        Option<String>,
  pub estado_civil:     Option<String>,
  pub lugar_trabajo:    Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PersonPatchBody {
  pub cedula:           Option<String>,
  pub nombres:          Option<String>,
  pub apellidos:        Option<String>,
  pub fecha_nacimiento: Option<NaiveDate>,
  pub genero:           Option<String>,
  pub telefono:         Option<String>,
  pub direccion:        Option<String>,
  pub correo:           Option<String>,
  pub nivel_estudios:   Option<String>,
  pub nacionalidad:     Option<String>,
  pub profesion:        Option<String>,
  pub estado_civil:     Option<String>,
  pub lugar_trabajo:    Option<String>,
}

impl From<PersonPatchBody> for PersonPatch {
  fn from(b: PersonPatchBody) -> Self {
    PersonPatch {
      cedula:         b.cedula,
      first_names:    b.nombres,
      last_names:     b.apellidos,
      birth_date:     b.fecha_nacimiento,
      gender:         b.genero,
      phone:          b.telefono,
      address:        b.direccion,
      email:          b.correo,
      education:      b.nivel_estudios,
      nationality:    b.nacionalidad,
      profession:     b.profesion,
      marital_status: b.estado_civil,
      workplace:      b.lugar_trabajo,
    }
  }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// `POST /api/personas`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  AuthUser(_actor): AuthUser,
  Json(body): Json<PersonBody>,
) -> Result<Json<PersonDto>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  if body.nombres.trim().is_empty() || body.apellidos.trim().is_empty() {
    return Err(ApiError::BadRequest(
      "nombres y apellidos son obligatorios".to_string(),
    ));
  }
  let person = state
    .store
    .add_person(NewPerson {
      cedula:         body.cedula,
      first_names:    body.nombres,
      last_names:     body.apellidos,
      birth_date:     body.fecha_nacimiento,
      gender:         body.genero,
      phone:          body.telefono,
      address:        body.direccion,
      email:          body.correo,
      education:      body.nivel_estudios,
      nationality:    body.nacionalidad,
      profession:     body.profesion,
      marital_status: body.estado_civil,
      workplace:      body.lugar_trabajo,
    })
    .await
    .map_err(ApiError::store)?;
  Ok(Json(person.into()))
}

/// `GET /api/personas`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  AuthUser(_actor): AuthUser,
) -> Result<Json<Vec<PersonDto>>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let persons =
    state.store.list_persons().await.map_err(ApiError::store)?;
  Ok(Json(persons.into_iter().map(PersonDto::from).collect()))
}

/// `GET /api/personas/{id}`
pub async fn get<S>(
  State(state): State<AppState<S>>,
  AuthUser(_actor): AuthUser,
  Path(id): Path<i64>,
) -> Result<Json<PersonDto>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let person = state
    .store
    .get_person(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::store(koinonia_core::Error::PersonNotFound(id))
    })?;
  Ok(Json(person.into()))
}

/// `PUT /api/personas/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  AuthUser(_actor): AuthUser,
  Path(id): Path<i64>,
  Json(body): Json<PersonPatchBody>,
) -> Result<Json<PersonDto>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let patch: PersonPatch = body.into();
  if patch.is_empty() {
    return Err(ApiError::BadRequest(
      "no se proporcionaron campos para actualizar".to_string(),
    ));
  }
  let person = state
    .store
    .update_person(id, patch)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(person.into()))
}

#[derive(Debug, Deserialize)]
pub struct PromoteBody {
  pub rol: String,
}

/// `POST /api/personas/{id}/promover` — pastor only. The initial
/// password is the person's cédula; the store generates the username.
pub async fn promote<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Path(id): Path<i64>,
  Json(body): Json<PromoteBody>,
) -> Result<Json<Value>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  if !actor.is_pastor() {
    return Err(ApiError::Forbidden(
      "solo un pastor puede promover personas".to_string(),
    ));
  }

  let role_id = state
    .store
    .role_id_by_name(body.rol.clone())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::BadRequest(format!("rol desconocido: {}", body.rol))
    })?;
  let role = Role::from_id(role_id).map_err(ApiError::store)?;

  let person = state
    .store
    .get_person(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::store(koinonia_core::Error::PersonNotFound(id))
    })?;
  let cedula = person.cedula.clone().ok_or_else(|| {
    ApiError::store(koinonia_core::Error::IncompletePerson(id))
  })?;
  let hash = hash_password(&cedula).map_err(ApiError::internal)?;

  let user = state
    .store
    .promote_person(id, role, hash)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(person = id, role = role.name(), "person promoted");
  Ok(Json(json!({
    "mensaje": "Persona promovida",
    "usuario": UserDto::from(&user),
  })))
}
