//! The `ChurchStore` trait and supporting outcome types.
//!
//! The trait is implemented by storage backends (e.g.
//! `koinonia-store-sqlite`). The HTTP layer depends on this abstraction,
//! not on any concrete backend.
//!
//! Every multi-step mutation (rubric replacement, event transition plus
//! Motivo, notification response plus event update) is a single trait
//! method so the backend can run it inside one atomic transaction —
//! partial effects must be impossible under concurrent access or crash,
//! and read-then-act checks re-read inside that transaction.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  course::{
    AttendanceEntry, Course, CoursePatch, Criterion, CriterionEntry,
    CriterionScore, EnrollmentDiff, GradeEntry, GradeReportRow, NewCourse,
    NewTask, RosterRow, Task, TaskPatch, TaskRow,
  },
  event::{ActionOutcome, Event, EventAction, EventPatch, Motivo, NewEvent},
  ministry::{Ministry, NewMinistry, PromotedLeader},
  notification::Notification,
  person::{NewPerson, Person, PersonPatch, User},
  role::{Actor, Role},
};

// ─── Outcome types ───────────────────────────────────────────────────────────

/// Result of responding to a cancellation request: whether the referenced
/// event was actually set to Cancelado.
#[derive(Debug, Clone, Copy)]
pub struct RespondOutcome {
  pub event_updated: bool,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Koinonia persistence backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (tokio with `axum`).
pub trait ChurchStore: Send + Sync {
  type Error: std::error::Error
    + Into<crate::Error>
    + Send
    + Sync
    + 'static;

  // ── Persons ───────────────────────────────────────────────────────────

  fn add_person(
    &self,
    input: NewPerson,
  ) -> impl Future<Output = Result<Person, Self::Error>> + Send + '_;

  fn get_person(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + '_;

  fn list_persons(
    &self,
  ) -> impl Future<Output = Result<Vec<Person>, Self::Error>> + Send + '_;

  /// Apply a partial update; untouched fields keep their value.
  fn update_person(
    &self,
    id: i64,
    patch: PersonPatch,
  ) -> impl Future<Output = Result<Person, Self::Error>> + Send + '_;

  // ── Users and roles ───────────────────────────────────────────────────

  fn find_user_by_username(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn set_password(
    &self,
    user_id: i64,
    password_hash: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Promote a person into `role`, creating the user row (with a
  /// generated, de-duplicated username) or re-roling an existing one.
  /// The person's biographical record must be complete; the check runs
  /// inside the promotion transaction.
  fn promote_person(
    &self,
    person_id: i64,
    role: Role,
    password_hash: String,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Role-directory lookup. Unknown names yield `Ok(None)` — callers
  /// treat that as forbidden, never as an error.
  fn role_id_by_name(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Option<i64>, Self::Error>> + Send + '_;

  // ── Ministries ────────────────────────────────────────────────────────

  /// Create a ministry, promoting any supplied leaders in the same
  /// transaction. Fails on duplicate names (case-insensitive) and when
  /// both slots reference the same person.
  fn add_ministry(
    &self,
    input: NewMinistry,
  ) -> impl Future<Output = Result<(Ministry, Vec<PromotedLeader>), Self::Error>>
  + Send
  + '_;

  fn list_ministries(
    &self,
  ) -> impl Future<Output = Result<Vec<Ministry>, Self::Error>> + Send + '_;

  // ── Courses and rubric ────────────────────────────────────────────────

  /// Create a course and seed the default criteria atomically; the seed
  /// set passes through the same percentage validator as user edits.
  fn create_course(
    &self,
    input: NewCourse,
  ) -> impl Future<Output = Result<Course, Self::Error>> + Send + '_;

  fn get_course(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Course>, Self::Error>> + Send + '_;

  fn list_courses(
    &self,
  ) -> impl Future<Output = Result<Vec<Course>, Self::Error>> + Send + '_;

  fn update_course(
    &self,
    id: i64,
    patch: CoursePatch,
  ) -> impl Future<Output = Result<Course, Self::Error>> + Send + '_;

  /// Replace the full criterion set of a course in one atomic step:
  /// ids present are updated, ids absent are deleted, entries without an
  /// id are inserted. Validation failure leaves storage unchanged.
  fn replace_criteria(
    &self,
    course_id: i64,
    entries: Vec<CriterionEntry>,
  ) -> impl Future<Output = Result<Vec<Criterion>, Self::Error>> + Send + '_;

  /// Criteria in creation order.
  fn list_criteria(
    &self,
    course_id: i64,
  ) -> impl Future<Output = Result<Vec<Criterion>, Self::Error>> + Send + '_;

  /// Replace the enrolment set; returns the applied diff.
  fn set_participants(
    &self,
    course_id: i64,
    person_ids: Vec<i64>,
  ) -> impl Future<Output = Result<EnrollmentDiff, Self::Error>> + Send + '_;

  fn list_participants(
    &self,
    course_id: i64,
  ) -> impl Future<Output = Result<Vec<Person>, Self::Error>> + Send + '_;

  /// Batch-upsert attendance flags for one date.
  fn record_attendance(
    &self,
    course_id: i64,
    date: NaiveDate,
    entries: Vec<AttendanceEntry>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Tasks and grades ──────────────────────────────────────────────────

  /// The task's criterion must belong to the task's course.
  fn add_task(
    &self,
    input: NewTask,
  ) -> impl Future<Output = Result<Task, Self::Error>> + Send + '_;

  fn update_task(
    &self,
    id: i64,
    patch: TaskPatch,
  ) -> impl Future<Output = Result<Task, Self::Error>> + Send + '_;

  fn list_tasks(
    &self,
    course_id: i64,
  ) -> impl Future<Output = Result<Vec<TaskRow>, Self::Error>> + Send + '_;

  /// Upsert one grade per (task, person); last write wins, no history.
  fn record_grades(
    &self,
    task_id: i64,
    entries: Vec<GradeEntry>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Flat grade listing for one person across all courses. An empty
  /// result is a valid, empty list.
  fn grades_for_person(
    &self,
    person_id: i64,
  ) -> impl Future<Output = Result<Vec<GradeReportRow>, Self::Error>> + Send + '_;

  /// Every enrolled participant of the task's course, left-joined
  /// against grades — ungraded participants carry `score: None`.
  fn task_roster(
    &self,
    task_id: i64,
  ) -> impl Future<Output = Result<Vec<RosterRow>, Self::Error>> + Send + '_;

  /// Per-criterion latest recorded score for one participant, in
  /// criterion creation order; input for the weighted final grade.
  fn criterion_scores(
    &self,
    course_id: i64,
    person_id: i64,
  ) -> impl Future<Output = Result<Vec<CriterionScore>, Self::Error>> + Send + '_;

  // ── Events ────────────────────────────────────────────────────────────

  /// Create an event; initial status per the creator's role, with the
  /// automatic Motivo for pastor self-approval written in the same
  /// transaction.
  fn create_event(
    &self,
    input: NewEvent,
    creator_role: Role,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  fn get_event(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + '_;

  /// All events, or only those owned by `owned_by`, ordered by id.
  fn list_events(
    &self,
    owned_by: Option<i64>,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  /// The event's append-only audit trail, oldest first.
  fn list_motivos(
    &self,
    event_id: i64,
  ) -> impl Future<Output = Result<Vec<Motivo>, Self::Error>> + Send + '_;

  /// Partial edit by the owner or a pastor; the resulting status (and
  /// pastor re-approval Motivo) is decided inside the transaction.
  fn update_event(
    &self,
    id: i64,
    actor: Actor,
    patch: EventPatch,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  /// Owner-only toggle: Cancelado ⇄ Aprobado from any state, with a
  /// Motivo.
  fn toggle_cancel(
    &self,
    id: i64,
    actor_user_id: i64,
    reason: Option<String>,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  /// Pastor workflow action resolved through the transition table. A
  /// non-owner `cancelar` on an approved event mutates nothing and files
  /// a cancellation-request notification instead.
  fn apply_action(
    &self,
    id: i64,
    actor: Actor,
    action: EventAction,
    reason: Option<String>,
  ) -> impl Future<Output = Result<ActionOutcome, Self::Error>> + Send + '_;

  // ── Notification mailbox ──────────────────────────────────────────────

  /// The recipient's inbox, newest first; `read` filters on the read
  /// flag when set.
  fn list_notifications(
    &self,
    recipient_id: i64,
    read: Option<bool>,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  /// Strict ownership: a notification addressed to someone else is a
  /// lookup miss, never a write.
  fn mark_read(
    &self,
    notification_id: i64,
    recipient_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Decide an unprocessed cancellation request: approval cancels the
  /// referenced event (plus Motivo); rejection files a reply
  /// notification to the requester. Either branch marks the original
  /// processed and read — one transaction, terminal thereafter.
  fn respond_cancellation(
    &self,
    notification_id: i64,
    recipient_id: i64,
    approved: bool,
    rejection_reason: Option<String>,
  ) -> impl Future<Output = Result<RespondOutcome, Self::Error>> + Send + '_;
}
