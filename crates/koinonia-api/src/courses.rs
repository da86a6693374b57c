//! Course, rubric, and grading handlers.
//!
//! Rubric replacement is all-or-nothing: the handler hands the full
//! `criterios` set to the store, which validates the 100.00 sum and
//! applies it in one transaction. Reads are open to any authenticated
//! user; mutations are gated to pastors and leaders.

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::{NaiveDate, NaiveTime};
use koinonia_core::{
  course::{
    AttendanceEntry, Course, CoursePatch, Criterion, CriterionEntry,
    CriterionScore, GradeEntry, GradeReportRow, NewCourse, NewTask,
    RosterRow, Task, TaskPatch, TaskRow, final_grade,
  },
  role::{Actor, Role},
  store::ChurchStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{AppState, auth::AuthUser, error::ApiError};

fn ensure_staff(actor: &Actor) -> Result<(), ApiError> {
  match actor.role {
    Role::Pastor | Role::Leader => Ok(()),
    Role::Member => Err(ApiError::Forbidden(
      "solo pastores y líderes pueden gestionar cursos".to_string(),
    )),
  }
}

// ─── Courses ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CourseDto {
  pub id_curso:     i64,
  pub nombre:       String,
  pub descripcion:  Option<String>,
  pub fecha_inicio: NaiveDate,
  pub fecha_fin:    NaiveDate,
  pub hora_inicio:  NaiveTime,
  pub hora_fin:     NaiveTime,
  pub id_usuario:   i64,
}

impl From<Course> for CourseDto {
  fn from(c: Course) -> Self {
    CourseDto {
      id_curso:     c.course_id,
      nombre:       c.name,
      descripcion:  c.description,
      fecha_inicio: c.start_date,
      fecha_fin:    c.end_date,
      hora_inicio:  c.start_time,
      hora_fin:     c.end_time,
      id_usuario:   c.owner,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct CourseBody {
  pub nombre:       String,
  pub descripcion:  Option<String>,
  pub fecha_inicio: NaiveDate,
  pub fecha_fin:    NaiveDate,
  pub hora_inicio:  NaiveTime,
  pub hora_fin:     NaiveTime,
}

#[derive(Debug, Default, Deserialize)]
pub struct CoursePatchBody {
  pub nombre:       Option<String>,
  pub descripcion:  Option<String>,
  pub fecha_inicio: Option<NaiveDate>,
  pub fecha_fin:    Option<NaiveDate>,
  pub hora_inicio:  Option<NaiveTime>,
  pub hora_fin:     Option<NaiveTime>,
}

/// `POST /api/cursos` — the acting user becomes the owner; the default
/// rubric is seeded in the same transaction.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Json(body): Json<CourseBody>,
) -> Result<Json<CourseDto>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  ensure_staff(&actor)?;
  if body.nombre.trim().is_empty() {
    return Err(ApiError::BadRequest(
      "el nombre del curso es obligatorio".to_string(),
    ));
  }
  let course = state
    .store
    .create_course(NewCourse {
      name:        body.nombre,
      description: body.descripcion,
      start_date:  body.fecha_inicio,
      end_date:    body.fecha_fin,
      start_time:  body.hora_inicio,
      end_time:    body.hora_fin,
      owner:       actor.user_id,
    })
    .await
    .map_err(ApiError::store)?;
  Ok(Json(course.into()))
}

/// `GET /api/cursos`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  AuthUser(_actor): AuthUser,
) -> Result<Json<Vec<CourseDto>>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let courses =
    state.store.list_courses().await.map_err(ApiError::store)?;
  Ok(Json(courses.into_iter().map(CourseDto::from).collect()))
}

/// `GET /api/cursos/{id}`
pub async fn get<S>(
  State(state): State<AppState<S>>,
  AuthUser(_actor): AuthUser,
  Path(id): Path<i64>,
) -> Result<Json<CourseDto>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let course = state
    .store
    .get_course(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::store(koinonia_core::Error::CourseNotFound(id))
    })?;
  Ok(Json(course.into()))
}

/// `PUT /api/cursos/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Path(id): Path<i64>,
  Json(body): Json<CoursePatchBody>,
) -> Result<Json<CourseDto>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  ensure_staff(&actor)?;
  let patch = CoursePatch {
    name:        body.nombre,
    description: body.descripcion,
    start_date:  body.fecha_inicio,
    end_date:    body.fecha_fin,
    start_time:  body.hora_inicio,
    end_time:    body.hora_fin,
  };
  let course = state
    .store
    .update_course(id, patch)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(course.into()))
}

// ─── Rubric ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CriterionDto {
  pub id_rubrica:      i64,
  pub id_curso:        i64,
  pub nombre_criterio: String,
  pub porcentaje:      f64,
}

impl From<Criterion> for CriterionDto {
  fn from(c: Criterion) -> Self {
    CriterionDto {
      id_rubrica:      c.criterion_id,
      id_curso:        c.course_id,
      nombre_criterio: c.name,
      porcentaje:      c.percentage,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct CriterionInput {
  pub id_rubrica:      Option<i64>,
  pub nombre_criterio: String,
  pub porcentaje:      f64,
}

#[derive(Debug, Deserialize)]
pub struct CriteriaBody {
  pub criterios: Vec<CriterionInput>,
}

/// `GET /api/cursos/{id}/criterios`
pub async fn list_criteria<S>(
  State(state): State<AppState<S>>,
  AuthUser(_actor): AuthUser,
  Path(id): Path<i64>,
) -> Result<Json<Vec<CriterionDto>>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let criteria = state
    .store
    .list_criteria(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(criteria.into_iter().map(CriterionDto::from).collect()))
}

/// `PUT /api/cursos/{id}/criterios` — full-set replacement.
pub async fn replace_criteria<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Path(id): Path<i64>,
  Json(body): Json<CriteriaBody>,
) -> Result<Json<Value>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  ensure_staff(&actor)?;
  let entries = body
    .criterios
    .into_iter()
    .map(|c| CriterionEntry {
      id:         c.id_rubrica,
      name:       c.nombre_criterio,
      percentage: c.porcentaje,
    })
    .collect();
  let criteria = state
    .store
    .replace_criteria(id, entries)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({
    "mensaje":   "Criterios actualizados",
    "criterios": criteria
      .into_iter()
      .map(CriterionDto::from)
      .collect::<Vec<_>>(),
  })))
}

// ─── Participants and attendance ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ParticipantsBody {
  pub participantes: Vec<i64>,
}

/// `GET /api/cursos/{id}/participantes`
pub async fn list_participants<S>(
  State(state): State<AppState<S>>,
  AuthUser(_actor): AuthUser,
  Path(id): Path<i64>,
) -> Result<Json<Vec<crate::persons::PersonDto>>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let persons = state
    .store
    .list_participants(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(persons.into_iter().map(Into::into).collect()))
}

/// `PUT /api/cursos/{id}/participantes` — enrolment replacement.
pub async fn set_participants<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Path(id): Path<i64>,
  Json(body): Json<ParticipantsBody>,
) -> Result<Json<Value>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  ensure_staff(&actor)?;
  let diff = state
    .store
    .set_participants(id, body.participantes)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({
    "mensaje":    "Participantes actualizados",
    "agregados":  diff.added,
    "eliminados": diff.removed,
  })))
}

#[derive(Debug, Deserialize)]
pub struct AttendanceInput {
  pub id_persona: i64,
  pub presente:   bool,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceBody {
  pub fecha:       NaiveDate,
  pub asistencias: Vec<AttendanceInput>,
}

/// `POST /api/cursos/{id}/asistencia` — batch upsert for one date.
pub async fn record_attendance<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Path(id): Path<i64>,
  Json(body): Json<AttendanceBody>,
) -> Result<Json<Value>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  ensure_staff(&actor)?;
  let entries = body
    .asistencias
    .into_iter()
    .map(|a| AttendanceEntry { person_id: a.id_persona, present: a.presente })
    .collect();
  state
    .store
    .record_attendance(id, body.fecha, entries)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({ "mensaje": "Asistencia registrada" })))
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TaskDto {
  pub id_tarea:      i64,
  pub id_curso:      i64,
  pub id_rubrica:    i64,
  pub titulo:        String,
  pub descripcion:   Option<String>,
  pub fecha_entrega: NaiveDate,
}

impl From<Task> for TaskDto {
  fn from(t: Task) -> Self {
    TaskDto {
      id_tarea:      t.task_id,
      id_curso:      t.course_id,
      id_rubrica:    t.criterion_id,
      titulo:        t.title,
      descripcion:   t.description,
      fecha_entrega: t.due_date,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct TaskRowDto {
  pub id_tarea:        i64,
  pub titulo:          String,
  pub descripcion:     Option<String>,
  pub fecha_entrega:   NaiveDate,
  pub nombre_criterio: String,
  pub porcentaje:      f64,
}

impl From<TaskRow> for TaskRowDto {
  fn from(t: TaskRow) -> Self {
    TaskRowDto {
      id_tarea:        t.task_id,
      titulo:          t.title,
      descripcion:     t.description,
      fecha_entrega:   t.due_date,
      nombre_criterio: t.criterion_name,
      porcentaje:      t.percentage,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct TaskBody {
  pub id_rubrica:    i64,
  pub titulo:        String,
  pub descripcion:   Option<String>,
  pub fecha_entrega: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskPatchBody {
  pub id_rubrica:    Option<i64>,
  pub titulo:        Option<String>,
  pub descripcion:   Option<String>,
  pub fecha_entrega: Option<NaiveDate>,
}

/// `GET /api/cursos/{id}/tareas`
pub async fn list_tasks<S>(
  State(state): State<AppState<S>>,
  AuthUser(_actor): AuthUser,
  Path(id): Path<i64>,
) -> Result<Json<Vec<TaskRowDto>>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let tasks =
    state.store.list_tasks(id).await.map_err(ApiError::store)?;
  Ok(Json(tasks.into_iter().map(TaskRowDto::from).collect()))
}

/// `POST /api/cursos/{id}/tareas` — the criterion must belong to the
/// course.
pub async fn create_task<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Path(id): Path<i64>,
  Json(body): Json<TaskBody>,
) -> Result<Json<TaskDto>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  ensure_staff(&actor)?;
  let task = state
    .store
    .add_task(NewTask {
      course_id:    id,
      criterion_id: body.id_rubrica,
      title:        body.titulo,
      description:  body.descripcion,
      due_date:     body.fecha_entrega,
    })
    .await
    .map_err(ApiError::store)?;
  Ok(Json(task.into()))
}

/// `PUT /api/tareas/{id}`
pub async fn update_task<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Path(id): Path<i64>,
  Json(body): Json<TaskPatchBody>,
) -> Result<Json<TaskDto>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  ensure_staff(&actor)?;
  let patch = TaskPatch {
    criterion_id: body.id_rubrica,
    title:        body.titulo,
    description:  body.descripcion,
    due_date:     body.fecha_entrega,
  };
  let task = state
    .store
    .update_task(id, patch)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(task.into()))
}

// ─── Grades ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GradeInput {
  pub id_persona: i64,
  pub nota:       f64,
}

#[derive(Debug, Deserialize)]
pub struct GradesBody {
  pub calificaciones: Vec<GradeInput>,
}

/// `POST /api/tareas/{id}/calificaciones` — upsert, last write wins.
pub async fn record_grades<S>(
  State(state): State<AppState<S>>,
  AuthUser(actor): AuthUser,
  Path(id): Path<i64>,
  Json(body): Json<GradesBody>,
) -> Result<Json<Value>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  ensure_staff(&actor)?;
  let entries = body
    .calificaciones
    .into_iter()
    .map(|g| GradeEntry { person_id: g.id_persona, score: g.nota })
    .collect();
  state
    .store
    .record_grades(id, entries)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({ "mensaje": "Calificaciones registradas" })))
}

#[derive(Debug, Serialize)]
pub struct RosterRowDto {
  pub id_persona:      i64,
  pub nombre_completo: String,
  pub nota:            Option<f64>,
}

impl From<RosterRow> for RosterRowDto {
  fn from(r: RosterRow) -> Self {
    RosterRowDto {
      id_persona:      r.person_id,
      nombre_completo: r.full_name,
      nota:            r.score,
    }
  }
}

/// `GET /api/tareas/{id}/calificaciones` — every enrolled participant,
/// graded or not.
pub async fn task_roster<S>(
  State(state): State<AppState<S>>,
  AuthUser(_actor): AuthUser,
  Path(id): Path<i64>,
) -> Result<Json<Vec<RosterRowDto>>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let roster =
    state.store.task_roster(id).await.map_err(ApiError::store)?;
  Ok(Json(roster.into_iter().map(RosterRowDto::from).collect()))
}

#[derive(Debug, Serialize)]
pub struct GradeReportRowDto {
  pub id_tarea:        i64,
  pub titulo:          String,
  pub nombre_criterio: String,
  pub nota:            f64,
}

impl From<GradeReportRow> for GradeReportRowDto {
  fn from(r: GradeReportRow) -> Self {
    GradeReportRowDto {
      id_tarea:        r.task_id,
      titulo:          r.task_title,
      nombre_criterio: r.criterion_name,
      nota:            r.score,
    }
  }
}

/// `GET /api/personas/{id}/calificaciones` — flat report across all
/// courses; an ungraded student gets an empty list, not an error.
pub async fn student_report<S>(
  State(state): State<AppState<S>>,
  AuthUser(_actor): AuthUser,
  Path(id): Path<i64>,
) -> Result<Json<Vec<GradeReportRowDto>>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let rows = state
    .store
    .grades_for_person(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(rows.into_iter().map(GradeReportRowDto::from).collect()))
}

#[derive(Debug, Serialize)]
pub struct CriterionScoreDto {
  pub id_rubrica:      i64,
  pub nombre_criterio: String,
  pub porcentaje:      f64,
  pub nota:            Option<f64>,
}

impl From<CriterionScore> for CriterionScoreDto {
  fn from(c: CriterionScore) -> Self {
    CriterionScoreDto {
      id_rubrica:      c.criterion_id,
      nombre_criterio: c.name,
      porcentaje:      c.percentage,
      nota:            c.score,
    }
  }
}

/// `GET /api/cursos/{id_curso}/participantes/{id_persona}/nota-final` —
/// weighted final grade plus the per-criterion breakdown.
pub async fn final_grade_report<S>(
  State(state): State<AppState<S>>,
  AuthUser(_actor): AuthUser,
  Path((course_id, person_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, ApiError>
where
  S: ChurchStore + Clone + Send + Sync + 'static,
{
  let scores = state
    .store
    .criterion_scores(course_id, person_id)
    .await
    .map_err(ApiError::store)?;
  let total = final_grade(&scores);
  Ok(Json(json!({
    "id_curso":   course_id,
    "id_persona": person_id,
    "nota_final": total,
    "criterios":  scores
      .into_iter()
      .map(CriterionScoreDto::from)
      .collect::<Vec<_>>(),
  })))
}
