//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, dates `YYYY-MM-DD`, times `HH:MM:SS`.
//! Booleans use rusqlite's native integer mapping.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use koinonia_core::{
  course::Course,
  event::{Event, EventStatus},
  notification::{Notification, NotificationKind},
  person::{Person, User},
  role::Role,
};

use crate::{Error, Result};

// ─── Date and time ───────────────────────────────────────────────────────────

pub const DATE_FMT: &str = "%Y-%m-%d";
pub const TIME_FMT: &str = "%H:%M:%S";

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FMT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FMT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_time(t: NaiveTime) -> String { t.format(TIME_FMT).to_string() }

pub fn decode_time(s: &str) -> Result<NaiveTime> {
  NaiveTime::parse_from_str(s, TIME_FMT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `personas` row.
pub struct RawPerson {
  pub person_id:      i64,
  pub cedula:         Option<String>,
  pub first_names:    String,
  pub last_names:     String,
  pub birth_date:     Option<String>,
  pub gender:         Option<String>,
  pub phone:          Option<String>,
  pub address:        Option<String>,
  pub email:          Option<String>,
  pub education:      Option<String>,
  pub nationality:    Option<String>,
  pub profession:     Option<String>,
  pub marital_status: Option<String>,
  pub workplace:      Option<String>,
}

impl RawPerson {
  pub fn into_person(self) -> Result<Person> {
    let birth_date =
      self.birth_date.as_deref().map(decode_date).transpose()?;
    Ok(Person {
      person_id:      self.person_id,
      cedula:         self.cedula,
      first_names:    self.first_names,
      last_names:     self.last_names,
      birth_date,
      gender:         self.gender,
      phone:          self.phone,
      address:        self.address,
      email:          self.email,
      education:      self.education,
      nationality:    self.nationality,
      profession:     self.profession,
      marital_status: self.marital_status,
      workplace:      self.workplace,
    })
  }
}

/// Raw values read directly from a `usuarios` row.
pub struct RawUser {
  pub user_id:       i64,
  pub person_id:     i64,
  pub role_id:       i64,
  pub username:      String,
  pub password_hash: String,
  pub active:        bool,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:       self.user_id,
      person_id:     self.person_id,
      role:          Role::from_id(self.role_id)?,
      username:      self.username,
      password_hash: self.password_hash,
      active:        self.active,
    })
  }
}

/// Raw strings read directly from a `curso` row.
pub struct RawCourse {
  pub course_id:   i64,
  pub name:        String,
  pub description: Option<String>,
  pub start_date:  String,
  pub end_date:    String,
  pub start_time:  String,
  pub end_time:    String,
  pub owner:       i64,
}

impl RawCourse {
  pub fn into_course(self) -> Result<Course> {
    Ok(Course {
      course_id:   self.course_id,
      name:        self.name,
      description: self.description,
      start_date:  decode_date(&self.start_date)?,
      end_date:    decode_date(&self.end_date)?,
      start_time:  decode_time(&self.start_time)?,
      end_time:    decode_time(&self.end_time)?,
      owner:       self.owner,
    })
  }
}

/// Raw strings read from an `eventos` row joined with ministry and owner
/// names.
pub struct RawEvent {
  pub event_id:      i64,
  pub name:          String,
  pub ministry_id:   i64,
  pub ministry_name: String,
  pub description:   Option<String>,
  pub date:          String,
  pub time:          String,
  pub place:         Option<String>,
  pub owner:         Option<i64>,
  pub owner_name:    Option<String>,
  pub status_id:     i64,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawEvent {
  pub fn into_event(self) -> Result<Event> {
    Ok(Event {
      event_id:      self.event_id,
      name:          self.name,
      ministry_id:   self.ministry_id,
      ministry_name: self.ministry_name,
      description:   self.description,
      date:          decode_date(&self.date)?,
      time:          decode_time(&self.time)?,
      place:         self.place,
      owner:         self.owner,
      owner_name:    self.owner_name,
      status:        EventStatus::from_id(self.status_id)?,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read from a `notificaciones` row joined with event,
/// ministry and sender names.
pub struct RawNotification {
  pub notification_id:  i64,
  pub event_id:         Option<i64>,
  pub event_name:       Option<String>,
  pub ministry_name:    Option<String>,
  pub sender_id:        Option<i64>,
  pub sender_name:      Option<String>,
  pub recipient_id:     i64,
  pub kind:             String,
  pub message:          String,
  pub rejection_reason: Option<String>,
  pub read:             bool,
  pub action_taken:     Option<bool>,
  pub created_at:       String,
}

impl RawNotification {
  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id:  self.notification_id,
      event_id:         self.event_id,
      event_name:       self.event_name,
      ministry_name:    self.ministry_name,
      sender_id:        self.sender_id,
      sender_name:      self.sender_name,
      recipient_id:     self.recipient_id,
      kind:             NotificationKind::from_wire(&self.kind)?,
      message:          self.message,
      rejection_reason: self.rejection_reason,
      read:             self.read,
      action_taken:     self.action_taken,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}
