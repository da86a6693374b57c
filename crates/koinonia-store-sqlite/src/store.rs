//! [`SqliteStore`] — the SQLite implementation of [`ChurchStore`].
//!
//! Trait methods hand a sync helper to [`tokio_rusqlite::Connection::call`];
//! the helper owns its transaction, so a domain failure anywhere in a
//! multi-step operation rolls the whole step back.

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};

use koinonia_core::{
  Error as CoreError,
  course::{
    AttendanceEntry, Course, CoursePatch, Criterion, CriterionEntry,
    CriterionScore, EnrollmentDiff, GradeEntry, GradeReportRow, NewCourse,
    NewTask, RosterRow, Task, TaskPatch, TaskRow, default_criteria,
    validate_percentages,
  },
  event::{
    ActionOutcome, Event, EventAction, EventPatch, EventStatus, Motivo,
    NewEvent, default_reason, initial_status, status_after_edit, transition,
  },
  ministry::{Ministry, NewMinistry, PromotedLeader},
  notification::{
    Notification, NotificationKind, cancellation_request_message,
    rejection_reply_message,
  },
  person::{NewPerson, Person, PersonPatch, User},
  role::{Actor, Role},
  store::{ChurchStore, RespondOutcome},
};

use crate::{
  Error, Result,
  encode::{
    RawCourse, RawEvent, RawNotification, RawPerson, RawUser, decode_date,
    decode_dt, encode_date, encode_dt, encode_time,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Koinonia church store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row readers ─────────────────────────────────────────────────────────────

const PERSON_COLS: &str = "id_persona, cedula, nombres, apellidos, \
   fecha_nacimiento, genero, telefono, direccion, correo, nivel_estudios, \
   nacionalidad, profesion, estado_civil, lugar_trabajo";

fn read_person_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPerson> {
  Ok(RawPerson {
    person_id:      row.get(0)?,
    cedula:         row.get(1)?,
    first_names:    row.get(2)?,
    last_names:     row.get(3)?,
    birth_date:     row.get(4)?,
    gender:         row.get(5)?,
    phone:          row.get(6)?,
    address:        row.get(7)?,
    email:          row.get(8)?,
    education:      row.get(9)?,
    nationality:    row.get(10)?,
    profession:     row.get(11)?,
    marital_status: row.get(12)?,
    workplace:      row.get(13)?,
  })
}

const USER_COLS: &str =
  "id_usuario, id_persona, id_rol, nombre_usuario, contrasena, activo";

fn read_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawUser> {
  Ok(RawUser {
    user_id:       row.get(0)?,
    person_id:     row.get(1)?,
    role_id:       row.get(2)?,
    username:      row.get(3)?,
    password_hash: row.get(4)?,
    active:        row.get(5)?,
  })
}

const COURSE_COLS: &str = "id_curso, nombre, descripcion, fecha_inicio, \
   fecha_fin, hora_inicio, hora_fin, id_usuario";

fn read_course_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCourse> {
  Ok(RawCourse {
    course_id:   row.get(0)?,
    name:        row.get(1)?,
    description: row.get(2)?,
    start_date:  row.get(3)?,
    end_date:    row.get(4)?,
    start_time:  row.get(5)?,
    end_time:    row.get(6)?,
    owner:       row.get(7)?,
  })
}

const EVENT_SELECT: &str = "
  SELECT e.id_evento, e.nombre, e.id_ministerio, m.nombre,
         e.descripcion, e.fecha, e.hora, e.lugar,
         e.id_usuario, p.nombres || ' ' || p.apellidos,
         e.id_estado, e.creado_en, e.actualizado_en
  FROM eventos e
  JOIN ministerio m ON m.id_ministerio = e.id_ministerio
  LEFT JOIN usuarios u ON u.id_usuario = e.id_usuario
  LEFT JOIN personas p ON p.id_persona = u.id_persona";

fn read_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEvent> {
  Ok(RawEvent {
    event_id:      row.get(0)?,
    name:          row.get(1)?,
    ministry_id:   row.get(2)?,
    ministry_name: row.get(3)?,
    description:   row.get(4)?,
    date:          row.get(5)?,
    time:          row.get(6)?,
    place:         row.get(7)?,
    owner:         row.get(8)?,
    owner_name:    row.get(9)?,
    status_id:     row.get(10)?,
    created_at:    row.get(11)?,
    updated_at:    row.get(12)?,
  })
}

const NOTIF_SELECT: &str = "
  SELECT n.id_notificacion, n.id_evento, e.nombre, m.nombre,
         n.id_emisor, p.nombres || ' ' || p.apellidos,
         n.id_receptor, n.tipo, n.mensaje, n.motivo_rechazo,
         n.leida, n.accion_tomada, n.creada_en
  FROM notificaciones n
  LEFT JOIN eventos e ON e.id_evento = n.id_evento
  LEFT JOIN ministerio m ON m.id_ministerio = e.id_ministerio
  LEFT JOIN usuarios u ON u.id_usuario = n.id_emisor
  LEFT JOIN personas p ON p.id_persona = u.id_persona";

fn read_notification_row(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<RawNotification> {
  Ok(RawNotification {
    notification_id:  row.get(0)?,
    event_id:         row.get(1)?,
    event_name:       row.get(2)?,
    ministry_name:    row.get(3)?,
    sender_id:        row.get(4)?,
    sender_name:      row.get(5)?,
    recipient_id:     row.get(6)?,
    kind:             row.get(7)?,
    message:          row.get(8)?,
    rejection_reason: row.get(9)?,
    read:             row.get(10)?,
    action_taken:     row.get(11)?,
    created_at:       row.get(12)?,
  })
}

// ─── Lookup helpers ──────────────────────────────────────────────────────────
//
// These run on the rusqlite thread; callers inside a transaction pass the
// transaction handle (it derefs to `Connection`).

fn person_row(conn: &Connection, id: i64) -> Result<Option<RawPerson>> {
  Ok(
    conn
      .query_row(
        &format!("SELECT {PERSON_COLS} FROM personas WHERE id_persona = ?1"),
        params![id],
        read_person_row,
      )
      .optional()?,
  )
}

fn fetch_person(conn: &Connection, id: i64) -> Result<Person> {
  person_row(conn, id)?
    .ok_or(CoreError::PersonNotFound(id))?
    .into_person()
}

fn user_row(conn: &Connection, id: i64) -> Result<Option<RawUser>> {
  Ok(
    conn
      .query_row(
        &format!("SELECT {USER_COLS} FROM usuarios WHERE id_usuario = ?1"),
        params![id],
        read_user_row,
      )
      .optional()?,
  )
}

fn user_by_person(
  conn:      &Connection,
  person_id: i64,
) -> Result<Option<RawUser>> {
  Ok(
    conn
      .query_row(
        &format!("SELECT {USER_COLS} FROM usuarios WHERE id_persona = ?1"),
        params![person_id],
        read_user_row,
      )
      .optional()?,
  )
}

fn user_full_name(conn: &Connection, user_id: i64) -> Result<String> {
  conn
    .query_row(
      "SELECT p.nombres || ' ' || p.apellidos
       FROM usuarios u
       JOIN personas p ON p.id_persona = u.id_persona
       WHERE u.id_usuario = ?1",
      params![user_id],
      |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| Error::from(CoreError::UserNotFound(user_id)))
}

fn course_exists(conn: &Connection, id: i64) -> Result<()> {
  let found: bool = conn
    .query_row(
      "SELECT 1 FROM curso WHERE id_curso = ?1",
      params![id],
      |_| Ok(true),
    )
    .optional()?
    .unwrap_or(false);
  if found { Ok(()) } else { Err(CoreError::CourseNotFound(id).into()) }
}

fn ministry_exists(conn: &Connection, id: i64) -> Result<()> {
  let found: bool = conn
    .query_row(
      "SELECT 1 FROM ministerio WHERE id_ministerio = ?1",
      params![id],
      |_| Ok(true),
    )
    .optional()?
    .unwrap_or(false);
  if found { Ok(()) } else { Err(CoreError::MinistryNotFound(id).into()) }
}

fn criterion_record(conn: &Connection, id: i64) -> Result<Option<Criterion>> {
  Ok(
    conn
      .query_row(
        "SELECT id_rubrica, id_curso, nombre_criterio, porcentaje
         FROM rubrica WHERE id_rubrica = ?1",
        params![id],
        |row| {
          Ok(Criterion {
            criterion_id: row.get(0)?,
            course_id:    row.get(1)?,
            name:         row.get(2)?,
            percentage:   row.get(3)?,
          })
        },
      )
      .optional()?,
  )
}

fn task_record(conn: &Connection, id: i64) -> Result<Option<Task>> {
  let raw: Option<(i64, i64, i64, String, Option<String>, String)> = conn
    .query_row(
      "SELECT id_tarea, id_curso, id_rubrica, titulo, descripcion,
              fecha_entrega
       FROM tarea WHERE id_tarea = ?1",
      params![id],
      |row| {
        Ok((
          row.get(0)?,
          row.get(1)?,
          row.get(2)?,
          row.get(3)?,
          row.get(4)?,
          row.get(5)?,
        ))
      },
    )
    .optional()?;

  raw
    .map(|(task_id, course_id, criterion_id, title, description, due)| {
      Ok(Task {
        task_id,
        course_id,
        criterion_id,
        title,
        description,
        due_date: decode_date(&due)?,
      })
    })
    .transpose()
}

fn event_row(conn: &Connection, id: i64) -> Result<Option<RawEvent>> {
  Ok(
    conn
      .query_row(
        &format!("{EVENT_SELECT} WHERE e.id_evento = ?1"),
        params![id],
        read_event_row,
      )
      .optional()?,
  )
}

fn fetch_event(conn: &Connection, id: i64) -> Result<Event> {
  event_row(conn, id)?
    .ok_or(CoreError::EventNotFound(id))?
    .into_event()
}

fn motivos_of_event(
  conn:     &Connection,
  event_id: i64,
) -> Result<Vec<(i64, i64, String, String)>> {
  let mut stmt = conn.prepare(
    "SELECT id_motivo, id_usuario, descripcion, registrado_en
     FROM motivos_evento WHERE id_evento = ?1 ORDER BY id_motivo",
  )?;
  let rows = stmt
    .query_map(params![event_id], |row| {
      Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn notification_row(
  conn: &Connection,
  id:   i64,
) -> Result<Option<RawNotification>> {
  Ok(
    conn
      .query_row(
        &format!("{NOTIF_SELECT} WHERE n.id_notificacion = ?1"),
        params![id],
        read_notification_row,
      )
      .optional()?,
  )
}

// ─── Mutation helpers ────────────────────────────────────────────────────────

fn set_event_status(
  conn:   &Connection,
  id:     i64,
  status: EventStatus,
  now:    &str,
) -> Result<()> {
  conn.execute(
    "UPDATE eventos SET id_estado = ?1, actualizado_en = ?2
     WHERE id_evento = ?3",
    params![status.id(), now, id],
  )?;
  Ok(())
}

fn insert_motivo(
  conn:     &Connection,
  event_id: i64,
  user_id:  i64,
  text:     &str,
  now:      &str,
) -> Result<()> {
  conn.execute(
    "INSERT INTO motivos_evento (id_evento, id_usuario, descripcion,
                                 registrado_en)
     VALUES (?1, ?2, ?3, ?4)",
    params![event_id, user_id, text, now],
  )?;
  Ok(())
}

/// Find a free login name: the base, then `base2`, `base3`, …
fn unique_username(conn: &Connection, base: &str) -> Result<String> {
  let mut candidate = base.to_string();
  let mut n = 1;
  loop {
    let taken: bool = conn
      .query_row(
        "SELECT 1 FROM usuarios WHERE nombre_usuario = ?1",
        params![candidate],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false);
    if !taken {
      return Ok(candidate);
    }
    n += 1;
    candidate = format!("{base}{n}");
  }
}

/// Create or re-role the user row for a person. Promotion never demotes:
/// an existing user already holding a higher role keeps it.
fn promote(
  conn:          &Connection,
  person_id:     i64,
  role:          Role,
  password_hash: &str,
) -> Result<User> {
  let person = fetch_person(conn, person_id)?;
  if !person.is_complete() {
    return Err(CoreError::IncompletePerson(person_id).into());
  }

  match user_by_person(conn, person_id)? {
    Some(raw) => {
      let mut user = raw.into_user()?;
      // Lower role id means higher rank.
      if role.id() < user.role.id() {
        conn.execute(
          "UPDATE usuarios SET id_rol = ?1 WHERE id_usuario = ?2",
          params![role.id(), user.user_id],
        )?;
        user.role = role;
      }
      Ok(user)
    }
    None => {
      let username = unique_username(conn, &person.base_username())?;
      conn.execute(
        "INSERT INTO usuarios (id_persona, id_rol, nombre_usuario, contrasena)
         VALUES (?1, ?2, ?3, ?4)",
        params![person_id, role.id(), username, password_hash],
      )?;
      Ok(User {
        user_id: conn.last_insert_rowid(),
        person_id,
        role,
        username,
        password_hash: password_hash.to_string(),
        active: true,
      })
    }
  }
}

fn criteria_of_course(
  conn:      &Connection,
  course_id: i64,
) -> Result<Vec<Criterion>> {
  let mut stmt = conn.prepare(
    "SELECT id_rubrica, id_curso, nombre_criterio, porcentaje
     FROM rubrica WHERE id_curso = ?1 ORDER BY id_rubrica",
  )?;
  let rows = stmt
    .query_map(params![course_id], |row| {
      Ok(Criterion {
        criterion_id: row.get(0)?,
        course_id:    row.get(1)?,
        name:         row.get(2)?,
        percentage:   row.get(3)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// Full-set criterion replacement. Validates the incoming set as a whole
/// before touching any row; ids not present in the set are deleted, which
/// cascades their tasks and grades.
fn replace_criterion_set(
  conn:      &Connection,
  course_id: i64,
  entries:   &[CriterionEntry],
) -> Result<Vec<Criterion>> {
  course_exists(conn, course_id)?;
  validate_percentages(entries.iter().map(|e| e.percentage))?;

  let existing: Vec<i64> = {
    let mut stmt = conn
      .prepare("SELECT id_rubrica FROM rubrica WHERE id_curso = ?1")?;
    stmt
      .query_map(params![course_id], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };

  let mut keep = Vec::with_capacity(entries.len());
  for entry in entries {
    match entry.id {
      Some(id) => {
        if !existing.contains(&id) {
          return Err(CoreError::CriterionNotFound(id).into());
        }
        conn.execute(
          "UPDATE rubrica SET nombre_criterio = ?1, porcentaje = ?2
           WHERE id_rubrica = ?3",
          params![entry.name, entry.percentage, id],
        )?;
        keep.push(id);
      }
      None => {
        conn.execute(
          "INSERT INTO rubrica (id_curso, nombre_criterio, porcentaje)
           VALUES (?1, ?2, ?3)",
          params![course_id, entry.name, entry.percentage],
        )?;
        keep.push(conn.last_insert_rowid());
      }
    }
  }

  for id in existing.into_iter().filter(|id| !keep.contains(id)) {
    conn.execute("DELETE FROM rubrica WHERE id_rubrica = ?1", params![id])?;
  }

  criteria_of_course(conn, course_id)
}

fn grade_report(
  conn:      &Connection,
  person_id: i64,
) -> Result<Vec<GradeReportRow>> {
  if person_row(conn, person_id)?.is_none() {
    return Err(CoreError::PersonNotFound(person_id).into());
  }
  let mut stmt = conn.prepare(
    "SELECT t.id_tarea, t.titulo, r.nombre_criterio, c.nota
     FROM calificacion c
     JOIN tarea t ON t.id_tarea = c.id_tarea
     JOIN rubrica r ON r.id_rubrica = t.id_rubrica
     WHERE c.id_persona = ?1
     ORDER BY t.id_tarea",
  )?;
  let rows = stmt
    .query_map(params![person_id], |row| {
      Ok(GradeReportRow {
        task_id:        row.get(0)?,
        task_title:     row.get(1)?,
        criterion_name: row.get(2)?,
        score:          row.get(3)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn roster_for_task(conn: &Connection, task_id: i64) -> Result<Vec<RosterRow>> {
  let task =
    task_record(conn, task_id)?.ok_or(CoreError::TaskNotFound(task_id))?;
  let mut stmt = conn.prepare(
    "SELECT p.id_persona, p.nombres || ' ' || p.apellidos, c.nota
     FROM curso_participante cp
     JOIN personas p ON p.id_persona = cp.id_persona
     LEFT JOIN calificacion c
       ON c.id_persona = cp.id_persona AND c.id_tarea = ?1
     WHERE cp.id_curso = ?2
     ORDER BY p.apellidos, p.nombres",
  )?;
  let rows = stmt
    .query_map(params![task_id, task.course_id], |row| {
      Ok(RosterRow {
        person_id: row.get(0)?,
        full_name: row.get(1)?,
        score:     row.get(2)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

// ─── Transactional operations ────────────────────────────────────────────────

fn do_update_person(
  conn:  &mut Connection,
  id:    i64,
  patch: PersonPatch,
) -> Result<Person> {
  let tx = conn.transaction()?;
  let mut person = fetch_person(&tx, id)?;
  patch.apply(&mut person);
  tx.execute(
    "UPDATE personas SET cedula = ?1, nombres = ?2, apellidos = ?3,
       fecha_nacimiento = ?4, genero = ?5, telefono = ?6, direccion = ?7,
       correo = ?8, nivel_estudios = ?9, nacionalidad = ?10,
       profesion = ?11, estado_civil = ?12, lugar_trabajo = ?13
     WHERE id_persona = ?14",
    params![
      person.cedula,
      person.first_names,
      person.last_names,
      person.birth_date.map(encode_date),
      person.gender,
      person.phone,
      person.address,
      person.email,
      person.education,
      person.nationality,
      person.profession,
      person.marital_status,
      person.workplace,
      id,
    ],
  )?;
  tx.commit()?;
  Ok(person)
}

fn do_promote_person(
  conn:          &mut Connection,
  person_id:     i64,
  role:          Role,
  password_hash: String,
) -> Result<User> {
  let tx = conn.transaction()?;
  let user = promote(&tx, person_id, role, &password_hash)?;
  tx.commit()?;
  Ok(user)
}

fn do_add_ministry(
  conn:  &mut Connection,
  input: NewMinistry,
) -> Result<(Ministry, Vec<PromotedLeader>)> {
  input.validate()?;
  let tx = conn.transaction()?;

  let duplicate: Option<i64> = tx
    .query_row(
      "SELECT id_ministerio FROM ministerio WHERE lower(nombre) = lower(?1)",
      params![input.name],
      |row| row.get(0),
    )
    .optional()?;
  if duplicate.is_some() {
    return Err(CoreError::DuplicateMinistry(input.name).into());
  }

  let mut promoted = Vec::new();
  let mut leader_ids: [Option<i64>; 2] = [None, None];
  for (slot, promo) in
    [input.leader1, input.leader2].into_iter().enumerate()
  {
    if let Some(promo) = promo {
      let user =
        promote(&tx, promo.person_id, Role::Leader, &promo.password_hash)?;
      leader_ids[slot] = Some(user.user_id);
      promoted.push(PromotedLeader {
        user_id:   user.user_id,
        person_id: user.person_id,
        username:  user.username,
      });
    }
  }

  tx.execute(
    "INSERT INTO ministerio (nombre, descripcion, estatus, id_lider1,
                             id_lider2)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    params![
      input.name,
      input.description,
      input.status,
      leader_ids[0],
      leader_ids[1],
    ],
  )?;
  let ministry = Ministry {
    ministry_id: tx.last_insert_rowid(),
    name:        input.name,
    description: input.description,
    status:      input.status,
    leader1:     leader_ids[0],
    leader2:     leader_ids[1],
  };
  tx.commit()?;
  Ok((ministry, promoted))
}

fn do_create_course(conn: &mut Connection, input: NewCourse) -> Result<Course> {
  let tx = conn.transaction()?;
  if user_row(&tx, input.owner)?.is_none() {
    return Err(CoreError::UserNotFound(input.owner).into());
  }
  tx.execute(
    "INSERT INTO curso (nombre, descripcion, fecha_inicio, fecha_fin,
                        hora_inicio, hora_fin, id_usuario)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      input.name,
      input.description,
      encode_date(input.start_date),
      encode_date(input.end_date),
      encode_time(input.start_time),
      encode_time(input.end_time),
      input.owner,
    ],
  )?;
  let course_id = tx.last_insert_rowid();
  replace_criterion_set(&tx, course_id, &default_criteria())?;
  tx.commit()?;
  Ok(Course {
    course_id,
    name: input.name,
    description: input.description,
    start_date: input.start_date,
    end_date: input.end_date,
    start_time: input.start_time,
    end_time: input.end_time,
    owner: input.owner,
  })
}

fn do_update_course(
  conn:  &mut Connection,
  id:    i64,
  patch: CoursePatch,
) -> Result<Course> {
  let tx = conn.transaction()?;
  let raw = tx
    .query_row(
      &format!("SELECT {COURSE_COLS} FROM curso WHERE id_curso = ?1"),
      params![id],
      read_course_row,
    )
    .optional()?
    .ok_or(CoreError::CourseNotFound(id))?;
  let mut course = raw.into_course()?;

  if let Some(v) = patch.name { course.name = v; }
  if let Some(v) = patch.description { course.description = Some(v); }
  if let Some(v) = patch.start_date { course.start_date = v; }
  if let Some(v) = patch.end_date { course.end_date = v; }
  if let Some(v) = patch.start_time { course.start_time = v; }
  if let Some(v) = patch.end_time { course.end_time = v; }

  tx.execute(
    "UPDATE curso SET nombre = ?1, descripcion = ?2, fecha_inicio = ?3,
       fecha_fin = ?4, hora_inicio = ?5, hora_fin = ?6
     WHERE id_curso = ?7",
    params![
      course.name,
      course.description,
      encode_date(course.start_date),
      encode_date(course.end_date),
      encode_time(course.start_time),
      encode_time(course.end_time),
      id,
    ],
  )?;
  tx.commit()?;
  Ok(course)
}

fn do_replace_criteria(
  conn:      &mut Connection,
  course_id: i64,
  entries:   Vec<CriterionEntry>,
) -> Result<Vec<Criterion>> {
  let tx = conn.transaction()?;
  let criteria = replace_criterion_set(&tx, course_id, &entries)?;
  tx.commit()?;
  Ok(criteria)
}

fn do_set_participants(
  conn:       &mut Connection,
  course_id:  i64,
  person_ids: Vec<i64>,
) -> Result<EnrollmentDiff> {
  let tx = conn.transaction()?;
  course_exists(&tx, course_id)?;

  let current: Vec<i64> = {
    let mut stmt = tx.prepare(
      "SELECT id_persona FROM curso_participante WHERE id_curso = ?1",
    )?;
    stmt
      .query_map(params![course_id], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };

  let mut added = Vec::new();
  for id in &person_ids {
    if current.contains(id) || added.contains(id) {
      continue;
    }
    if person_row(&tx, *id)?.is_none() {
      return Err(CoreError::PersonNotFound(*id).into());
    }
    tx.execute(
      "INSERT INTO curso_participante (id_curso, id_persona)
       VALUES (?1, ?2)",
      params![course_id, id],
    )?;
    added.push(*id);
  }

  let removed: Vec<i64> = current
    .into_iter()
    .filter(|id| !person_ids.contains(id))
    .collect();
  for id in &removed {
    tx.execute(
      "DELETE FROM curso_participante
       WHERE id_curso = ?1 AND id_persona = ?2",
      params![course_id, id],
    )?;
  }

  tx.commit()?;
  Ok(EnrollmentDiff { added, removed })
}

fn do_record_attendance(
  conn:      &mut Connection,
  course_id: i64,
  date:      NaiveDate,
  entries:   Vec<AttendanceEntry>,
) -> Result<()> {
  let tx = conn.transaction()?;
  course_exists(&tx, course_id)?;
  let date_str = encode_date(date);
  for entry in &entries {
    tx.execute(
      "INSERT INTO asistencia_curso (id_curso, id_persona, fecha, presente)
       VALUES (?1, ?2, ?3, ?4)
       ON CONFLICT(id_curso, id_persona, fecha)
       DO UPDATE SET presente = excluded.presente",
      params![course_id, entry.person_id, date_str, entry.present],
    )?;
  }
  tx.commit()?;
  Ok(())
}

fn do_add_task(conn: &mut Connection, input: NewTask) -> Result<Task> {
  let tx = conn.transaction()?;
  course_exists(&tx, input.course_id)?;
  let criterion = criterion_record(&tx, input.criterion_id)?
    .ok_or(CoreError::CriterionNotFound(input.criterion_id))?;
  if criterion.course_id != input.course_id {
    return Err(
      CoreError::CriterionCourseMismatch {
        criterion: input.criterion_id,
        course:    input.course_id,
      }
      .into(),
    );
  }
  tx.execute(
    "INSERT INTO tarea (id_curso, id_rubrica, titulo, descripcion,
                        fecha_entrega)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    params![
      input.course_id,
      input.criterion_id,
      input.title,
      input.description,
      encode_date(input.due_date),
    ],
  )?;
  let task = Task {
    task_id:      tx.last_insert_rowid(),
    course_id:    input.course_id,
    criterion_id: input.criterion_id,
    title:        input.title,
    description:  input.description,
    due_date:     input.due_date,
  };
  tx.commit()?;
  Ok(task)
}

fn do_update_task(
  conn:  &mut Connection,
  id:    i64,
  patch: TaskPatch,
) -> Result<Task> {
  let tx = conn.transaction()?;
  let mut task = task_record(&tx, id)?.ok_or(CoreError::TaskNotFound(id))?;

  if let Some(criterion_id) = patch.criterion_id {
    let criterion = criterion_record(&tx, criterion_id)?
      .ok_or(CoreError::CriterionNotFound(criterion_id))?;
    if criterion.course_id != task.course_id {
      return Err(
        CoreError::CriterionCourseMismatch {
          criterion: criterion_id,
          course:    task.course_id,
        }
        .into(),
      );
    }
    task.criterion_id = criterion_id;
  }
  if let Some(v) = patch.title { task.title = v; }
  if let Some(v) = patch.description { task.description = Some(v); }
  if let Some(v) = patch.due_date { task.due_date = v; }

  tx.execute(
    "UPDATE tarea SET id_rubrica = ?1, titulo = ?2, descripcion = ?3,
       fecha_entrega = ?4
     WHERE id_tarea = ?5",
    params![
      task.criterion_id,
      task.title,
      task.description,
      encode_date(task.due_date),
      id,
    ],
  )?;
  tx.commit()?;
  Ok(task)
}

fn do_record_grades(
  conn:    &mut Connection,
  task_id: i64,
  entries: Vec<GradeEntry>,
) -> Result<()> {
  let tx = conn.transaction()?;
  if task_record(&tx, task_id)?.is_none() {
    return Err(CoreError::TaskNotFound(task_id).into());
  }
  for entry in &entries {
    if person_row(&tx, entry.person_id)?.is_none() {
      return Err(CoreError::PersonNotFound(entry.person_id).into());
    }
    tx.execute(
      "INSERT INTO calificacion (id_tarea, id_persona, nota)
       VALUES (?1, ?2, ?3)
       ON CONFLICT(id_tarea, id_persona) DO UPDATE SET nota = excluded.nota",
      params![task_id, entry.person_id, entry.score],
    )?;
  }
  tx.commit()?;
  Ok(())
}

fn do_create_event(
  conn:         &mut Connection,
  input:        NewEvent,
  creator_role: Role,
) -> Result<Event> {
  let tx = conn.transaction()?;
  ministry_exists(&tx, input.ministry_id)?;
  if user_row(&tx, input.owner)?.is_none() {
    return Err(CoreError::UserNotFound(input.owner).into());
  }

  let (status, motivo) = initial_status(creator_role);
  let now = encode_dt(Utc::now());
  tx.execute(
    "INSERT INTO eventos (nombre, id_ministerio, descripcion, fecha, hora,
                          lugar, id_usuario, id_estado, creado_en,
                          actualizado_en)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    params![
      input.name,
      input.ministry_id,
      input.description,
      encode_date(input.date),
      encode_time(input.time),
      input.place,
      input.owner,
      status.id(),
      now,
      now,
    ],
  )?;
  let event_id = tx.last_insert_rowid();
  if let Some(text) = motivo {
    insert_motivo(&tx, event_id, input.owner, text, &now)?;
  }
  let raw = event_row(&tx, event_id)?
    .ok_or(CoreError::EventNotFound(event_id))?;
  tx.commit()?;
  raw.into_event()
}

fn do_update_event(
  conn:  &mut Connection,
  id:    i64,
  actor: Actor,
  patch: EventPatch,
) -> Result<Event> {
  let tx = conn.transaction()?;
  let event = fetch_event(&tx, id)?;
  if !actor.is_pastor() && !event.is_owned_by(actor.user_id) {
    return Err(
      CoreError::Forbidden(
        "no tiene permiso para modificar este evento".into(),
      )
      .into(),
    );
  }
  if let Some(ministry_id) = patch.ministry_id {
    ministry_exists(&tx, ministry_id)?;
  }

  let name        = patch.name.unwrap_or(event.name);
  let ministry_id = patch.ministry_id.unwrap_or(event.ministry_id);
  let description = patch.description.or(event.description);
  let date        = patch.date.unwrap_or(event.date);
  let time        = patch.time.unwrap_or(event.time);
  let place       = patch.place.or(event.place);

  // Edits restart the review: pastors re-approve their changes in place,
  // everyone else's edit goes back to Pendiente.
  let next = status_after_edit(actor.role);
  let now = encode_dt(Utc::now());
  tx.execute(
    "UPDATE eventos SET nombre = ?1, id_ministerio = ?2, descripcion = ?3,
       fecha = ?4, hora = ?5, lugar = ?6, id_estado = ?7,
       actualizado_en = ?8
     WHERE id_evento = ?9",
    params![
      name,
      ministry_id,
      description,
      encode_date(date),
      encode_time(time),
      place,
      next.id(),
      now,
      id,
    ],
  )?;
  if next != event.status {
    let text = if actor.is_pastor() {
      "Aprobado automáticamente por pastor".to_string()
    } else {
      default_reason(next)
    };
    insert_motivo(&tx, id, actor.user_id, &text, &now)?;
  }
  let raw = event_row(&tx, id)?.ok_or(CoreError::EventNotFound(id))?;
  tx.commit()?;
  raw.into_event()
}

fn do_toggle_cancel(
  conn:          &mut Connection,
  id:            i64,
  actor_user_id: i64,
  reason:        Option<String>,
) -> Result<Event> {
  let tx = conn.transaction()?;
  let event = fetch_event(&tx, id)?;
  if !event.is_owned_by(actor_user_id) {
    return Err(
      CoreError::Forbidden(
        "solo el creador del evento puede cancelarlo o reactivarlo".into(),
      )
      .into(),
    );
  }

  let next = if event.status == EventStatus::Cancelled {
    EventStatus::Approved
  } else {
    EventStatus::Cancelled
  };
  let text = reason.unwrap_or_else(|| {
    if next == EventStatus::Cancelled {
      "Cancelado por el creador".to_string()
    } else {
      "Reactivado por el creador".to_string()
    }
  });

  let now = encode_dt(Utc::now());
  set_event_status(&tx, id, next, &now)?;
  insert_motivo(&tx, id, actor_user_id, &text, &now)?;
  let raw = event_row(&tx, id)?.ok_or(CoreError::EventNotFound(id))?;
  tx.commit()?;
  raw.into_event()
}

fn do_apply_action(
  conn:   &mut Connection,
  id:     i64,
  actor:  Actor,
  action: EventAction,
  reason: Option<String>,
) -> Result<ActionOutcome> {
  let tx = conn.transaction()?;
  let event = fetch_event(&tx, id)?;
  if !actor.is_pastor() {
    return Err(
      CoreError::Forbidden(
        "solo un pastor puede gestionar el estado de los eventos".into(),
      )
      .into(),
    );
  }

  let now = encode_dt(Utc::now());
  match (action, event.owner) {
    // A pastor cancelling somebody else's event does not mutate it;
    // the owner gets a request to decide instead.
    (EventAction::Cancel, Some(owner)) if owner != actor.user_id => {
      transition(action, event.status)?;
      let message = cancellation_request_message(
        &event.name,
        reason.as_deref().unwrap_or("Sin motivo"),
      );
      tx.execute(
        "INSERT INTO notificaciones (id_evento, id_emisor, id_receptor,
                                     tipo, mensaje, creada_en)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
          event.event_id,
          actor.user_id,
          owner,
          NotificationKind::CancellationRequest.wire_name(),
          message,
          now,
        ],
      )?;
      let notification_id = tx.last_insert_rowid();
      tx.commit()?;
      Ok(ActionOutcome::CancellationRequested { notification_id })
    }
    _ => {
      let next = transition(action, event.status)?;
      set_event_status(&tx, id, next, &now)?;
      let text = reason.unwrap_or_else(|| default_reason(next));
      insert_motivo(&tx, id, actor.user_id, &text, &now)?;
      let raw = event_row(&tx, id)?.ok_or(CoreError::EventNotFound(id))?;
      tx.commit()?;
      Ok(ActionOutcome::StatusChanged(raw.into_event()?))
    }
  }
}

fn do_respond_cancellation(
  conn:             &mut Connection,
  notification_id:  i64,
  recipient_id:     i64,
  approved:         bool,
  rejection_reason: Option<String>,
) -> Result<RespondOutcome> {
  let tx = conn.transaction()?;
  let notification = notification_row(&tx, notification_id)?
    .ok_or(CoreError::NotificationNotFound(notification_id))?
    .into_notification()?;
  if notification.recipient_id != recipient_id {
    // Someone else's mailbox: indistinguishable from a missing row.
    return Err(CoreError::NotificationNotFound(notification_id).into());
  }
  notification.ensure_respondable()?;

  let now = encode_dt(Utc::now());
  let mut event_updated = false;

  if approved {
    if let Some(event_id) = notification.event_id
      && let Some(raw) = event_row(&tx, event_id)?
    {
      let event = raw.into_event()?;
      if event.status != EventStatus::Cancelled {
        set_event_status(&tx, event_id, EventStatus::Cancelled, &now)?;
        let text = format!(
          "Cancelación aprobada. Motivo original: {}",
          notification.message
        );
        insert_motivo(&tx, event_id, recipient_id, &text, &now)?;
        event_updated = true;
      }
    }
    tx.execute(
      "UPDATE notificaciones SET leida = 1, accion_tomada = 1
       WHERE id_notificacion = ?1",
      params![notification_id],
    )?;
  } else {
    tx.execute(
      "UPDATE notificaciones SET leida = 1, accion_tomada = 0
       WHERE id_notificacion = ?1",
      params![notification_id],
    )?;
    if let Some(sender) = notification.sender_id {
      let responder = user_full_name(&tx, recipient_id)?;
      let message = rejection_reply_message(
        notification.event_name.as_deref().unwrap_or("(evento eliminado)"),
        notification.ministry_name.as_deref().unwrap_or("-"),
        &responder,
        rejection_reason.as_deref().unwrap_or("Sin motivo"),
      );
      tx.execute(
        "INSERT INTO notificaciones (id_evento, id_emisor, id_receptor,
                                     tipo, mensaje, motivo_rechazo,
                                     creada_en)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
          notification.event_id,
          recipient_id,
          sender,
          NotificationKind::RejectionReply.wire_name(),
          message,
          rejection_reason,
          now,
        ],
      )?;
    }
  }

  tx.commit()?;
  Ok(RespondOutcome { event_updated })
}

// ─── ChurchStore impl ────────────────────────────────────────────────────────

impl ChurchStore for SqliteStore {
  type Error = Error;

  // ── Persons ───────────────────────────────────────────────────────────

  async fn add_person(&self, input: NewPerson) -> Result<Person> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO personas (cedula, nombres, apellidos,
             fecha_nacimiento, genero, telefono, direccion, correo,
             nivel_estudios, nacionalidad, profesion, estado_civil,
             lugar_trabajo)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
          params![
            input.cedula,
            input.first_names,
            input.last_names,
            input.birth_date.map(encode_date),
            input.gender,
            input.phone,
            input.address,
            input.email,
            input.education,
            input.nationality,
            input.profession,
            input.marital_status,
            input.workplace,
          ],
        )?;
        Ok(Person {
          person_id:      conn.last_insert_rowid(),
          cedula:         input.cedula,
          first_names:    input.first_names,
          last_names:     input.last_names,
          birth_date:     input.birth_date,
          gender:         input.gender,
          phone:          input.phone,
          address:        input.address,
          email:          input.email,
          education:      input.education,
          nationality:    input.nationality,
          profession:     input.profession,
          marital_status: input.marital_status,
          workplace:      input.workplace,
        })
      })
      .await
      .map_err(Error::from)
  }

  async fn get_person(&self, id: i64) -> Result<Option<Person>> {
    let raw = self.conn.call(move |conn| Ok(person_row(conn, id))).await??;
    raw.map(RawPerson::into_person).transpose()
  }

  async fn list_persons(&self) -> Result<Vec<Person>> {
    let raws: Vec<RawPerson> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PERSON_COLS} FROM personas ORDER BY id_persona"
        ))?;
        let rows = stmt
          .query_map([], read_person_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawPerson::into_person).collect()
  }

  async fn update_person(&self, id: i64, patch: PersonPatch) -> Result<Person> {
    self
      .conn
      .call(move |conn| Ok(do_update_person(conn, id, patch)))
      .await?
  }

  // ── Users and roles ───────────────────────────────────────────────────

  async fn find_user_by_username(
    &self,
    username: String,
  ) -> Result<Option<User>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {USER_COLS} FROM usuarios WHERE nombre_usuario = ?1"
              ),
              params![username],
              read_user_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn get_user(&self, id: i64) -> Result<Option<User>> {
    let raw = self.conn.call(move |conn| Ok(user_row(conn, id))).await??;
    raw.map(RawUser::into_user).transpose()
  }

  async fn set_password(
    &self,
    user_id:       i64,
    password_hash: String,
  ) -> Result<()> {
    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE usuarios SET contrasena = ?1 WHERE id_usuario = ?2",
          params![password_hash, user_id],
        )?)
      })
      .await?;
    if changed == 0 {
      return Err(CoreError::UserNotFound(user_id).into());
    }
    Ok(())
  }

  async fn promote_person(
    &self,
    person_id:     i64,
    role:          Role,
    password_hash: String,
  ) -> Result<User> {
    self
      .conn
      .call(move |conn| {
        Ok(do_promote_person(conn, person_id, role, password_hash))
      })
      .await?
  }

  async fn role_id_by_name(&self, name: String) -> Result<Option<i64>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT id_rol FROM rol WHERE nombre = ?1",
                params![name],
                |row| row.get(0),
              )
              .optional()?,
          )
        })
        .await?,
    )
  }

  // ── Ministries ────────────────────────────────────────────────────────

  async fn add_ministry(
    &self,
    input: NewMinistry,
  ) -> Result<(Ministry, Vec<PromotedLeader>)> {
    self
      .conn
      .call(move |conn| Ok(do_add_ministry(conn, input)))
      .await?
  }

  async fn list_ministries(&self) -> Result<Vec<Ministry>> {
    Ok(
      self
        .conn
        .call(|conn| {
          let mut stmt = conn.prepare(
            "SELECT id_ministerio, nombre, descripcion, estatus, id_lider1,
                    id_lider2
             FROM ministerio ORDER BY id_ministerio",
          )?;
          let rows = stmt
            .query_map([], |row| {
              Ok(Ministry {
                ministry_id: row.get(0)?,
                name:        row.get(1)?,
                description: row.get(2)?,
                status:      row.get(3)?,
                leader1:     row.get(4)?,
                leader2:     row.get(5)?,
              })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  // ── Courses and rubric ────────────────────────────────────────────────

  async fn create_course(&self, input: NewCourse) -> Result<Course> {
    self
      .conn
      .call(move |conn| Ok(do_create_course(conn, input)))
      .await?
  }

  async fn get_course(&self, id: i64) -> Result<Option<Course>> {
    let raw: Option<RawCourse> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {COURSE_COLS} FROM curso WHERE id_curso = ?1"),
              params![id],
              read_course_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawCourse::into_course).transpose()
  }

  async fn list_courses(&self) -> Result<Vec<Course>> {
    let raws: Vec<RawCourse> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {COURSE_COLS} FROM curso ORDER BY id_curso"
        ))?;
        let rows = stmt
          .query_map([], read_course_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawCourse::into_course).collect()
  }

  async fn update_course(&self, id: i64, patch: CoursePatch) -> Result<Course> {
    self
      .conn
      .call(move |conn| Ok(do_update_course(conn, id, patch)))
      .await?
  }

  async fn replace_criteria(
    &self,
    course_id: i64,
    entries:   Vec<CriterionEntry>,
  ) -> Result<Vec<Criterion>> {
    self
      .conn
      .call(move |conn| Ok(do_replace_criteria(conn, course_id, entries)))
      .await?
  }

  async fn list_criteria(&self, course_id: i64) -> Result<Vec<Criterion>> {
    self
      .conn
      .call(move |conn| {
        Ok(
          course_exists(conn, course_id)
            .and_then(|()| criteria_of_course(conn, course_id)),
        )
      })
      .await?
  }

  async fn set_participants(
    &self,
    course_id:  i64,
    person_ids: Vec<i64>,
  ) -> Result<EnrollmentDiff> {
    self
      .conn
      .call(move |conn| Ok(do_set_participants(conn, course_id, person_ids)))
      .await?
  }

  async fn list_participants(&self, course_id: i64) -> Result<Vec<Person>> {
    let raws: Vec<RawPerson> = self
      .conn
      .call(move |conn| {
        Ok(course_exists(conn, course_id).and_then(|()| {
          let mut stmt = conn.prepare(&format!(
            "SELECT {PERSON_COLS} FROM personas
             WHERE id_persona IN
               (SELECT id_persona FROM curso_participante
                WHERE id_curso = ?1)
             ORDER BY apellidos, nombres"
          ))?;
          let rows = stmt
            .query_map(params![course_id], read_person_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        }))
      })
      .await??;
    raws.into_iter().map(RawPerson::into_person).collect()
  }

  async fn record_attendance(
    &self,
    course_id: i64,
    date:      NaiveDate,
    entries:   Vec<AttendanceEntry>,
  ) -> Result<()> {
    self
      .conn
      .call(move |conn| Ok(do_record_attendance(conn, course_id, date, entries)))
      .await?
  }

  // ── Tasks and grades ──────────────────────────────────────────────────

  async fn add_task(&self, input: NewTask) -> Result<Task> {
    self.conn.call(move |conn| Ok(do_add_task(conn, input))).await?
  }

  async fn update_task(&self, id: i64, patch: TaskPatch) -> Result<Task> {
    self
      .conn
      .call(move |conn| Ok(do_update_task(conn, id, patch)))
      .await?
  }

  async fn list_tasks(&self, course_id: i64) -> Result<Vec<TaskRow>> {
    let raws: Vec<(i64, String, Option<String>, String, String, f64)> = self
      .conn
      .call(move |conn| {
        Ok(course_exists(conn, course_id).and_then(|()| {
          let mut stmt = conn.prepare(
            "SELECT t.id_tarea, t.titulo, t.descripcion, t.fecha_entrega,
                    r.nombre_criterio, r.porcentaje
             FROM tarea t
             JOIN rubrica r ON r.id_rubrica = t.id_rubrica
             WHERE t.id_curso = ?1
             ORDER BY t.id_tarea",
          )?;
          let rows = stmt
            .query_map(params![course_id], |row| {
              Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
              ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        }))
      })
      .await??;

    raws
      .into_iter()
      .map(|(task_id, title, description, due, criterion_name, percentage)| {
        Ok(TaskRow {
          task_id,
          title,
          description,
          due_date: decode_date(&due)?,
          criterion_name,
          percentage,
        })
      })
      .collect()
  }

  async fn record_grades(
    &self,
    task_id: i64,
    entries: Vec<GradeEntry>,
  ) -> Result<()> {
    self
      .conn
      .call(move |conn| Ok(do_record_grades(conn, task_id, entries)))
      .await?
  }

  async fn grades_for_person(
    &self,
    person_id: i64,
  ) -> Result<Vec<GradeReportRow>> {
    self
      .conn
      .call(move |conn| Ok(grade_report(conn, person_id)))
      .await?
  }

  async fn task_roster(&self, task_id: i64) -> Result<Vec<RosterRow>> {
    self
      .conn
      .call(move |conn| Ok(roster_for_task(conn, task_id)))
      .await?
  }

  async fn criterion_scores(
    &self,
    course_id: i64,
    person_id: i64,
  ) -> Result<Vec<CriterionScore>> {
    self
      .conn
      .call(move |conn| {
        Ok(course_exists(conn, course_id).and_then(|()| {
          let mut stmt = conn.prepare(
            "SELECT r.id_rubrica, r.nombre_criterio, r.porcentaje,
                    (SELECT c.nota FROM calificacion c
                     JOIN tarea t ON t.id_tarea = c.id_tarea
                     WHERE t.id_rubrica = r.id_rubrica
                       AND c.id_persona = ?2
                     ORDER BY c.id_calificacion DESC
                     LIMIT 1)
             FROM rubrica r
             WHERE r.id_curso = ?1
             ORDER BY r.id_rubrica",
          )?;
          let rows = stmt
            .query_map(params![course_id, person_id], |row| {
              Ok(CriterionScore {
                criterion_id: row.get(0)?,
                name:         row.get(1)?,
                percentage:   row.get(2)?,
                score:        row.get(3)?,
              })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        }))
      })
      .await?
  }

  // ── Events ────────────────────────────────────────────────────────────

  async fn create_event(
    &self,
    input:        NewEvent,
    creator_role: Role,
  ) -> Result<Event> {
    self
      .conn
      .call(move |conn| Ok(do_create_event(conn, input, creator_role)))
      .await?
  }

  async fn get_event(&self, id: i64) -> Result<Option<Event>> {
    let raw = self.conn.call(move |conn| Ok(event_row(conn, id))).await??;
    raw.map(RawEvent::into_event).transpose()
  }

  async fn list_events(&self, owned_by: Option<i64>) -> Result<Vec<Event>> {
    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(owner) = owned_by {
          let mut stmt = conn.prepare(&format!(
            "{EVENT_SELECT} WHERE e.id_usuario = ?1 ORDER BY e.id_evento"
          ))?;
          stmt
            .query_map(params![owner], read_event_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt =
            conn.prepare(&format!("{EVENT_SELECT} ORDER BY e.id_evento"))?;
          stmt
            .query_map([], read_event_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn list_motivos(&self, event_id: i64) -> Result<Vec<Motivo>> {
    let raws: Vec<(i64, i64, String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          fetch_event(conn, event_id)
            .and_then(|_| motivos_of_event(conn, event_id)),
        )
      })
      .await??;
    raws
      .into_iter()
      .map(|(motivo_id, user_id, description, at)| {
        Ok(Motivo {
          motivo_id,
          event_id,
          user_id,
          description,
          recorded_at: decode_dt(&at)?,
        })
      })
      .collect()
  }

  async fn update_event(
    &self,
    id:    i64,
    actor: Actor,
    patch: EventPatch,
  ) -> Result<Event> {
    self
      .conn
      .call(move |conn| Ok(do_update_event(conn, id, actor, patch)))
      .await?
  }

  async fn toggle_cancel(
    &self,
    id:            i64,
    actor_user_id: i64,
    reason:        Option<String>,
  ) -> Result<Event> {
    self
      .conn
      .call(move |conn| Ok(do_toggle_cancel(conn, id, actor_user_id, reason)))
      .await?
  }

  async fn apply_action(
    &self,
    id:     i64,
    actor:  Actor,
    action: EventAction,
    reason: Option<String>,
  ) -> Result<ActionOutcome> {
    self
      .conn
      .call(move |conn| Ok(do_apply_action(conn, id, actor, action, reason)))
      .await?
  }

  // ── Notification mailbox ──────────────────────────────────────────────

  async fn list_notifications(
    &self,
    recipient_id: i64,
    read:         Option<bool>,
  ) -> Result<Vec<Notification>> {
    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(read) = read {
          let mut stmt = conn.prepare(&format!(
            "{NOTIF_SELECT} WHERE n.id_receptor = ?1 AND n.leida = ?2
             ORDER BY n.id_notificacion DESC"
          ))?;
          stmt
            .query_map(params![recipient_id, read], read_notification_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "{NOTIF_SELECT} WHERE n.id_receptor = ?1
             ORDER BY n.id_notificacion DESC"
          ))?;
          stmt
            .query_map(params![recipient_id], read_notification_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;
    raws
      .into_iter()
      .map(RawNotification::into_notification)
      .collect()
  }

  async fn mark_read(
    &self,
    notification_id: i64,
    recipient_id:    i64,
  ) -> Result<()> {
    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE notificaciones SET leida = 1
           WHERE id_notificacion = ?1 AND id_receptor = ?2",
          params![notification_id, recipient_id],
        )?)
      })
      .await?;
    if changed == 0 {
      return Err(CoreError::NotificationNotFound(notification_id).into());
    }
    Ok(())
  }

  async fn respond_cancellation(
    &self,
    notification_id:  i64,
    recipient_id:     i64,
    approved:         bool,
    rejection_reason: Option<String>,
  ) -> Result<RespondOutcome> {
    self
      .conn
      .call(move |conn| {
        Ok(do_respond_cancellation(
          conn,
          notification_id,
          recipient_id,
          approved,
          rejection_reason,
        ))
      })
      .await?
  }
}
