//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{NaiveDate, NaiveTime};
use koinonia_core::{
  Error as CoreError,
  course::{
    AttendanceEntry, Course, CriterionEntry, GradeEntry, NewCourse, NewTask,
    final_grade,
  },
  event::{ActionOutcome, EventAction, EventStatus, NewEvent},
  ministry::{LeaderPromotion, NewMinistry},
  notification::NotificationKind,
  person::{NewPerson, PersonPatch, User},
  role::{Actor, Role},
  store::ChurchStore,
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_person(first: &str, last: &str) -> NewPerson {
  NewPerson {
    cedula:         Some(format!("001-{first}{last}")),
    first_names:    first.to_string(),
    last_names:     last.to_string(),
    birth_date:     NaiveDate::from_ymd_opt(1990, 4, 12),
    gender:         Some("F".into()),
    phone:          Some("809-555-0100".into()),
    address:        Some("Calle 1 #2".into()),
    email:          Some(format!("{first}.{last}@example.com")),
    education:      Some("Universitario".into()),
    nationality:    Some("Dominicana".into()),
    profession:     Some("Contadora".into()),
    marital_status: Some("Soltera".into()),
    workplace:      Some("Oficina Central".into()),
  }
}

async fn promoted(s: &SqliteStore, first: &str, last: &str, role: Role) -> User {
  let person = s.add_person(new_person(first, last)).await.unwrap();
  s.promote_person(person.person_id, role, "$argon2id$stub".into())
    .await
    .unwrap()
}

async fn ministry_id(s: &SqliteStore, name: &str) -> i64 {
  let (ministry, _) = s
    .add_ministry(NewMinistry {
      name:        name.to_string(),
      description: None,
      status:      "Activo".into(),
      leader1:     None,
      leader2:     None,
    })
    .await
    .unwrap();
  ministry.ministry_id
}

async fn course(s: &SqliteStore, owner: i64) -> Course {
  s.create_course(NewCourse {
    name:        "Discipulado I".into(),
    description: None,
    start_date:  NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
    end_date:    NaiveDate::from_ymd_opt(2024, 6, 28).unwrap(),
    start_time:  NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
    end_time:    NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
    owner,
  })
  .await
  .unwrap()
}

fn event_input(ministry: i64, owner: i64) -> NewEvent {
  NewEvent {
    name:        "Vigilia".into(),
    ministry_id: ministry,
    description: None,
    date:        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
    time:        NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
    place:       Some("Templo central".into()),
    owner,
  }
}

fn actor(user: &User) -> Actor {
  Actor { user_id: user.user_id, role: user.role }
}

// ─── Persons and users ───────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_person() {
  let s = store().await;
  let person = s.add_person(new_person("Ana", "Pérez")).await.unwrap();

  let fetched = s.get_person(person.person_id).await.unwrap().unwrap();
  assert_eq!(fetched.full_name(), "Ana Pérez");
  assert_eq!(fetched.birth_date, NaiveDate::from_ymd_opt(1990, 4, 12));
}

#[tokio::test]
async fn get_person_missing_returns_none() {
  let s = store().await;
  assert!(s.get_person(99).await.unwrap().is_none());
}

#[tokio::test]
async fn update_person_applies_only_patched_fields() {
  let s = store().await;
  let person = s.add_person(new_person("Ana", "Pérez")).await.unwrap();

  let updated = s
    .update_person(person.person_id, PersonPatch {
      phone: Some("809-555-0200".into()),
      ..Default::default()
    })
    .await
    .unwrap();

  assert_eq!(updated.phone.as_deref(), Some("809-555-0200"));
  assert_eq!(updated.email, person.email);
}

#[tokio::test]
async fn update_missing_person_errors() {
  let s = store().await;
  let err = s
    .update_person(42, PersonPatch::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::PersonNotFound(42))));
}

#[tokio::test]
async fn promotion_creates_user_with_generated_username() {
  let s = store().await;
  let user = promoted(&s, "Juan", "García", Role::Member).await;

  assert_eq!(user.username, "juan.garcía");
  assert_eq!(user.role, Role::Member);
  assert!(user.active);

  let found = s.find_user_by_username("juan.garcía".into()).await.unwrap();
  assert_eq!(found.unwrap().user_id, user.user_id);
}

#[tokio::test]
async fn username_collision_gets_numeric_suffix() {
  let s = store().await;
  let first = promoted(&s, "Juan", "García", Role::Member).await;
  let second = promoted(&s, "Juan", "García", Role::Member).await;

  assert_eq!(first.username, "juan.garcía");
  assert_eq!(second.username, "juan.garcía2");
}

#[tokio::test]
async fn promotion_requires_complete_person() {
  let s = store().await;
  let mut input = new_person("Ana", "Pérez");
  input.profession = None;
  let person = s.add_person(input).await.unwrap();

  let err = s
    .promote_person(person.person_id, Role::Leader, "$argon2id$stub".into())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::IncompletePerson(_))));
}

#[tokio::test]
async fn promotion_never_demotes() {
  let s = store().await;
  let user = promoted(&s, "Pedro", "Díaz", Role::Pastor).await;

  let again = s
    .promote_person(user.person_id, Role::Leader, "$argon2id$stub".into())
    .await
    .unwrap();
  assert_eq!(again.role, Role::Pastor);
  assert_eq!(again.user_id, user.user_id);
}

#[tokio::test]
async fn role_directory_lookup() {
  let s = store().await;
  assert_eq!(s.role_id_by_name("Pastor".into()).await.unwrap(), Some(1));
  assert_eq!(s.role_id_by_name("Lider".into()).await.unwrap(), Some(2));
  assert_eq!(s.role_id_by_name("Obispo".into()).await.unwrap(), None);
}

#[tokio::test]
async fn set_password_for_missing_user_errors() {
  let s = store().await;
  let err = s.set_password(7, "$argon2id$new".into()).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::UserNotFound(7))));
}

// ─── Ministries ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn ministry_creation_promotes_leaders() {
  let s = store().await;
  let a = s.add_person(new_person("Ana", "Pérez")).await.unwrap();
  let b = s.add_person(new_person("Luis", "Rojas")).await.unwrap();

  let (ministry, promoted) = s
    .add_ministry(NewMinistry {
      name:        "Alabanza".into(),
      description: Some("Música y adoración".into()),
      status:      "Activo".into(),
      leader1:     Some(LeaderPromotion {
        person_id:     a.person_id,
        password_hash: "$argon2id$stub".into(),
      }),
      leader2:     Some(LeaderPromotion {
        person_id:     b.person_id,
        password_hash: "$argon2id$stub".into(),
      }),
    })
    .await
    .unwrap();

  assert_eq!(promoted.len(), 2);
  assert_eq!(ministry.leader1, Some(promoted[0].user_id));
  assert_eq!(ministry.leader2, Some(promoted[1].user_id));

  let user = s.get_user(promoted[0].user_id).await.unwrap().unwrap();
  assert_eq!(user.role, Role::Leader);
}

#[tokio::test]
async fn duplicate_ministry_name_rejected_case_insensitively() {
  let s = store().await;
  ministry_id(&s, "Alabanza").await;

  let err = s
    .add_ministry(NewMinistry {
      name:        "ALABANZA".into(),
      description: None,
      status:      "Activo".into(),
      leader1:     None,
      leader2:     None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DuplicateMinistry(_))));
}

#[tokio::test]
async fn same_person_in_both_leader_slots_rejected() {
  let s = store().await;
  let a = s.add_person(new_person("Ana", "Pérez")).await.unwrap();

  let slot = || {
    Some(LeaderPromotion {
      person_id:     a.person_id,
      password_hash: "$argon2id$stub".into(),
    })
  };
  let err = s
    .add_ministry(NewMinistry {
      name:        "Jóvenes".into(),
      description: None,
      status:      "Activo".into(),
      leader1:     slot(),
      leader2:     slot(),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DuplicateLeaders)));

  // Nothing was created.
  assert!(s.list_ministries().await.unwrap().is_empty());
}

// ─── Courses and rubric ──────────────────────────────────────────────────────

#[tokio::test]
async fn new_course_is_seeded_with_default_criteria() {
  let s = store().await;
  let teacher = promoted(&s, "Rosa", "Méndez", Role::Leader).await;
  let course = course(&s, teacher.user_id).await;

  let criteria = s.list_criteria(course.course_id).await.unwrap();
  let names: Vec<&str> = criteria.iter().map(|c| c.name.as_str()).collect();
  assert_eq!(names, ["Asistencia", "Actuación", "Tareas", "Examen"]);

  let total: f64 = criteria.iter().map(|c| c.percentage).sum();
  assert_eq!(total, 100.0);
}

#[tokio::test]
async fn invalid_replacement_set_leaves_rubric_unchanged() {
  let s = store().await;
  let teacher = promoted(&s, "Rosa", "Méndez", Role::Leader).await;
  let course = course(&s, teacher.user_id).await;

  let entries = [10.0, 20.0, 30.0, 41.0]
    .iter()
    .map(|p| CriterionEntry {
      id:         None,
      name:       format!("Criterio {p}"),
      percentage: *p,
    })
    .collect();
  let err = s
    .replace_criteria(course.course_id, entries)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::PercentageSum { actual }) if actual == 101.0
  ));

  // The seeded defaults survive intact.
  let criteria = s.list_criteria(course.course_id).await.unwrap();
  assert_eq!(criteria.len(), 4);
  assert_eq!(criteria[0].name, "Asistencia");
}

#[tokio::test]
async fn replacement_updates_keeps_and_deletes() {
  let s = store().await;
  let teacher = promoted(&s, "Rosa", "Méndez", Role::Leader).await;
  let course = course(&s, teacher.user_id).await;
  let seeded = s.list_criteria(course.course_id).await.unwrap();

  // Rename the first criterion, keep it at 40, add a new one at 60,
  // drop the other three.
  let replaced = s
    .replace_criteria(course.course_id, vec![
      CriterionEntry {
        id:         Some(seeded[0].criterion_id),
        name:       "Participación".into(),
        percentage: 40.0,
      },
      CriterionEntry {
        id:         None,
        name:       "Proyecto final".into(),
        percentage: 60.0,
      },
    ])
    .await
    .unwrap();

  assert_eq!(replaced.len(), 2);
  assert_eq!(replaced[0].criterion_id, seeded[0].criterion_id);
  assert_eq!(replaced[0].name, "Participación");
  assert_eq!(replaced[1].name, "Proyecto final");
}

#[tokio::test]
async fn replacement_with_foreign_criterion_id_errors() {
  let s = store().await;
  let teacher = promoted(&s, "Rosa", "Méndez", Role::Leader).await;
  let course = course(&s, teacher.user_id).await;

  let err = s
    .replace_criteria(course.course_id, vec![CriterionEntry {
      id:         Some(999),
      name:       "Fantasma".into(),
      percentage: 100.0,
    }])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::CriterionNotFound(999))));
}

#[tokio::test]
async fn set_participants_reports_the_applied_diff() {
  let s = store().await;
  let teacher = promoted(&s, "Rosa", "Méndez", Role::Leader).await;
  let course = course(&s, teacher.user_id).await;
  let a = s.add_person(new_person("Ana", "Pérez")).await.unwrap();
  let b = s.add_person(new_person("Luis", "Rojas")).await.unwrap();
  let c = s.add_person(new_person("Eva", "Santos")).await.unwrap();

  let diff = s
    .set_participants(course.course_id, vec![a.person_id, b.person_id])
    .await
    .unwrap();
  assert_eq!(diff.added, vec![a.person_id, b.person_id]);
  assert!(diff.removed.is_empty());

  let diff = s
    .set_participants(course.course_id, vec![b.person_id, c.person_id])
    .await
    .unwrap();
  assert_eq!(diff.added, vec![c.person_id]);
  assert_eq!(diff.removed, vec![a.person_id]);

  let enrolled = s.list_participants(course.course_id).await.unwrap();
  assert_eq!(enrolled.len(), 2);
}

#[tokio::test]
async fn attendance_rerecording_overwrites() {
  let s = store().await;
  let teacher = promoted(&s, "Rosa", "Méndez", Role::Leader).await;
  let course = course(&s, teacher.user_id).await;
  let a = s.add_person(new_person("Ana", "Pérez")).await.unwrap();
  s.set_participants(course.course_id, vec![a.person_id])
    .await
    .unwrap();

  let date = NaiveDate::from_ymd_opt(2024, 2, 5).unwrap();
  let entry = |present| {
    vec![AttendanceEntry { person_id: a.person_id, present }]
  };
  s.record_attendance(course.course_id, date, entry(false))
    .await
    .unwrap();
  // Correcting the same date must not violate the (course, person, date)
  // key.
  s.record_attendance(course.course_id, date, entry(true))
    .await
    .unwrap();
}

// ─── Tasks and grades ────────────────────────────────────────────────────────

async fn course_with_task(s: &SqliteStore) -> (Course, i64, i64) {
  let teacher = promoted(s, "Rosa", "Méndez", Role::Leader).await;
  let course_rec = course(s, teacher.user_id).await;
  let criteria = s.list_criteria(course_rec.course_id).await.unwrap();
  let criterion_id = criteria[2].criterion_id; // Tareas
  let task = s
    .add_task(NewTask {
      course_id: course_rec.course_id,
      criterion_id,
      title: "Resumen capítulo 1".into(),
      description: None,
      due_date: NaiveDate::from_ymd_opt(2024, 2, 12).unwrap(),
    })
    .await
    .unwrap();
  (course_rec, criterion_id, task.task_id)
}

#[tokio::test]
async fn task_criterion_must_belong_to_the_course() {
  let s = store().await;
  let teacher = promoted(&s, "Rosa", "Méndez", Role::Leader).await;
  let first = course(&s, teacher.user_id).await;
  let second = course(&s, teacher.user_id).await;
  let foreign = s.list_criteria(second.course_id).await.unwrap()[0]
    .criterion_id;

  let err = s
    .add_task(NewTask {
      course_id:    first.course_id,
      criterion_id: foreign,
      title:        "Tarea".into(),
      description:  None,
      due_date:     NaiveDate::from_ymd_opt(2024, 2, 12).unwrap(),
    })
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::CriterionCourseMismatch { .. })
  ));
}

#[tokio::test]
async fn grade_rerecording_overwrites_without_history() {
  let s = store().await;
  let (course_rec, _, task_id) = course_with_task(&s).await;
  let a = s.add_person(new_person("Ana", "Pérez")).await.unwrap();
  s.set_participants(course_rec.course_id, vec![a.person_id])
    .await
    .unwrap();

  let grade = |score| vec![GradeEntry { person_id: a.person_id, score }];
  s.record_grades(task_id, grade(70.0)).await.unwrap();
  s.record_grades(task_id, grade(85.0)).await.unwrap();

  let report = s.grades_for_person(a.person_id).await.unwrap();
  assert_eq!(report.len(), 1);
  assert_eq!(report[0].score, 85.0);
  assert_eq!(report[0].criterion_name, "Tareas");
}

#[tokio::test]
async fn grade_report_for_ungraded_person_is_empty() {
  let s = store().await;
  let a = s.add_person(new_person("Ana", "Pérez")).await.unwrap();
  assert!(s.grades_for_person(a.person_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn grade_report_for_missing_person_errors() {
  let s = store().await;
  let err = s.grades_for_person(404).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::PersonNotFound(404))));
}

#[tokio::test]
async fn roster_includes_ungraded_participants() {
  let s = store().await;
  let (course_rec, _, task_id) = course_with_task(&s).await;
  let a = s.add_person(new_person("Ana", "Pérez")).await.unwrap();
  let b = s.add_person(new_person("Luis", "Rojas")).await.unwrap();
  s.set_participants(course_rec.course_id, vec![a.person_id, b.person_id])
    .await
    .unwrap();
  s.record_grades(task_id, vec![GradeEntry {
    person_id: a.person_id,
    score:     90.0,
  }])
  .await
  .unwrap();

  let roster = s.task_roster(task_id).await.unwrap();
  assert_eq!(roster.len(), 2);

  let ana = roster.iter().find(|r| r.person_id == a.person_id).unwrap();
  let luis = roster.iter().find(|r| r.person_id == b.person_id).unwrap();
  assert_eq!(ana.score, Some(90.0));
  assert_eq!(luis.score, None);
}

#[tokio::test]
async fn final_grade_weights_per_criterion_scores() {
  let s = store().await;
  let (course_rec, _, task_id) = course_with_task(&s).await;
  let a = s.add_person(new_person("Ana", "Pérez")).await.unwrap();
  s.set_participants(course_rec.course_id, vec![a.person_id])
    .await
    .unwrap();
  s.record_grades(task_id, vec![GradeEntry {
    person_id: a.person_id,
    score:     90.0,
  }])
  .await
  .unwrap();

  let scores = s
    .criterion_scores(course_rec.course_id, a.person_id)
    .await
    .unwrap();
  assert_eq!(scores.len(), 4);
  assert_eq!(
    scores.iter().find(|c| c.name == "Tareas").unwrap().score,
    Some(90.0)
  );

  // Only Tareas (30%) is graded: 0.30 × 90.
  assert_eq!(final_grade(&scores), 27.0);
}

// ─── Event workflow ──────────────────────────────────────────────────────────

#[tokio::test]
async fn pastor_created_events_start_approved() {
  let s = store().await;
  let pastor = promoted(&s, "Pedro", "Díaz", Role::Pastor).await;
  let ministry = ministry_id(&s, "Jóvenes").await;

  let event = s
    .create_event(event_input(ministry, pastor.user_id), Role::Pastor)
    .await
    .unwrap();
  assert_eq!(event.status, EventStatus::Approved);
}

#[tokio::test]
async fn member_created_events_start_pending() {
  let s = store().await;
  let member = promoted(&s, "Ana", "Pérez", Role::Member).await;
  let ministry = ministry_id(&s, "Jóvenes").await;

  let event = s
    .create_event(event_input(ministry, member.user_id), Role::Member)
    .await
    .unwrap();
  assert_eq!(event.status, EventStatus::Pending);
  assert_eq!(event.owner, Some(member.user_id));
  assert_eq!(event.ministry_name, "Jóvenes");
}

#[tokio::test]
async fn pastor_approves_pending_event() {
  let s = store().await;
  let member = promoted(&s, "Ana", "Pérez", Role::Member).await;
  let pastor = promoted(&s, "Pedro", "Díaz", Role::Pastor).await;
  let ministry = ministry_id(&s, "Jóvenes").await;
  let event = s
    .create_event(event_input(ministry, member.user_id), Role::Member)
    .await
    .unwrap();

  let outcome = s
    .apply_action(event.event_id, actor(&pastor), EventAction::Approve, None)
    .await
    .unwrap();
  match outcome {
    ActionOutcome::StatusChanged(updated) => {
      assert_eq!(updated.status, EventStatus::Approved);
    }
    other => panic!("unexpected outcome: {other:?}"),
  }
}

#[tokio::test]
async fn disallowed_transition_is_rejected() {
  let s = store().await;
  let member = promoted(&s, "Ana", "Pérez", Role::Member).await;
  let pastor = promoted(&s, "Pedro", "Díaz", Role::Pastor).await;
  let ministry = ministry_id(&s, "Jóvenes").await;
  let event = s
    .create_event(event_input(ministry, member.user_id), Role::Member)
    .await
    .unwrap();

  // Pending events cannot be cancelled through the workflow.
  let err = s
    .apply_action(event.event_id, actor(&pastor), EventAction::Cancel, None)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::InvalidTransition { .. })
  ));

  let unchanged = s.get_event(event.event_id).await.unwrap().unwrap();
  assert_eq!(unchanged.status, EventStatus::Pending);
}

#[tokio::test]
async fn workflow_actions_are_pastor_only() {
  let s = store().await;
  let member = promoted(&s, "Ana", "Pérez", Role::Member).await;
  let ministry = ministry_id(&s, "Jóvenes").await;
  let event = s
    .create_event(event_input(ministry, member.user_id), Role::Member)
    .await
    .unwrap();

  let err = s
    .apply_action(event.event_id, actor(&member), EventAction::Approve, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::Forbidden(_))));
}

#[tokio::test]
async fn owner_toggle_flips_between_cancelled_and_approved() {
  let s = store().await;
  let pastor = promoted(&s, "Pedro", "Díaz", Role::Pastor).await;
  let ministry = ministry_id(&s, "Jóvenes").await;
  let event = s
    .create_event(event_input(ministry, pastor.user_id), Role::Pastor)
    .await
    .unwrap();

  let cancelled = s
    .toggle_cancel(event.event_id, pastor.user_id, None)
    .await
    .unwrap();
  assert_eq!(cancelled.status, EventStatus::Cancelled);

  let restored = s
    .toggle_cancel(event.event_id, pastor.user_id, None)
    .await
    .unwrap();
  assert_eq!(restored.status, EventStatus::Approved);
}

#[tokio::test]
async fn toggle_is_owner_only() {
  let s = store().await;
  let member = promoted(&s, "Ana", "Pérez", Role::Member).await;
  let pastor = promoted(&s, "Pedro", "Díaz", Role::Pastor).await;
  let ministry = ministry_id(&s, "Jóvenes").await;
  let event = s
    .create_event(event_input(ministry, member.user_id), Role::Member)
    .await
    .unwrap();

  let err = s
    .toggle_cancel(event.event_id, pastor.user_id, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::Forbidden(_))));
}

#[tokio::test]
async fn owner_edit_sends_event_back_to_review() {
  let s = store().await;
  let member = promoted(&s, "Ana", "Pérez", Role::Member).await;
  let pastor = promoted(&s, "Pedro", "Díaz", Role::Pastor).await;
  let ministry = ministry_id(&s, "Jóvenes").await;
  let event = s
    .create_event(event_input(ministry, member.user_id), Role::Member)
    .await
    .unwrap();
  s.apply_action(event.event_id, actor(&pastor), EventAction::Approve, None)
    .await
    .unwrap();

  let edited = s
    .update_event(
      event.event_id,
      actor(&member),
      koinonia_core::event::EventPatch {
        place: Some("Patio".into()),
        ..Default::default()
      },
    )
    .await
    .unwrap();
  assert_eq!(edited.status, EventStatus::Pending);
  assert_eq!(edited.place.as_deref(), Some("Patio"));
}

#[tokio::test]
async fn transitions_append_to_the_audit_trail() {
  let s = store().await;
  let member = promoted(&s, "Ana", "Pérez", Role::Member).await;
  let pastor = promoted(&s, "Pedro", "Díaz", Role::Pastor).await;
  let ministry = ministry_id(&s, "Jóvenes").await;
  let event = s
    .create_event(event_input(ministry, member.user_id), Role::Member)
    .await
    .unwrap();
  assert!(s.list_motivos(event.event_id).await.unwrap().is_empty());

  // Approval with an explicit reason.
  s.apply_action(
    event.event_id,
    actor(&pastor),
    EventAction::Approve,
    Some("Todo en orden".into()),
  )
  .await
  .unwrap();
  let motivos = s.list_motivos(event.event_id).await.unwrap();
  assert_eq!(motivos.len(), 1);
  assert_eq!(motivos[0].user_id, pastor.user_id);
  assert_eq!(motivos[0].description, "Todo en orden");

  // Owner toggle with the generated text.
  s.toggle_cancel(event.event_id, member.user_id, None)
    .await
    .unwrap();
  let motivos = s.list_motivos(event.event_id).await.unwrap();
  assert_eq!(motivos.len(), 2);
  assert_eq!(motivos[1].user_id, member.user_id);
  assert_eq!(motivos[1].description, "Cancelado por el creador");

  // A pastor edit re-approves the event and records that too.
  s.update_event(
    event.event_id,
    actor(&pastor),
    koinonia_core::event::EventPatch {
      place: Some("Anexo".into()),
      ..Default::default()
    },
  )
  .await
  .unwrap();
  let motivos = s.list_motivos(event.event_id).await.unwrap();
  assert_eq!(motivos.len(), 3);
  assert_eq!(motivos[2].description, "Aprobado automáticamente por pastor");
}

#[tokio::test]
async fn pastor_creation_records_the_automatic_approval() {
  let s = store().await;
  let pastor = promoted(&s, "Pedro", "Díaz", Role::Pastor).await;
  let ministry = ministry_id(&s, "Jóvenes").await;
  let event = s
    .create_event(event_input(ministry, pastor.user_id), Role::Pastor)
    .await
    .unwrap();

  let motivos = s.list_motivos(event.event_id).await.unwrap();
  assert_eq!(motivos.len(), 1);
  assert_eq!(motivos[0].user_id, pastor.user_id);
  assert_eq!(motivos[0].description, "Aprobado automáticamente por pastor");
}

#[tokio::test]
async fn motivos_for_missing_event_error() {
  let s = store().await;
  let err = s.list_motivos(404).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::EventNotFound(404))));
}

// ─── Cancellation round trip ─────────────────────────────────────────────────

/// Approved member event plus a second pastor who requests its
/// cancellation.
async fn cancellation_fixture(s: &SqliteStore) -> (i64, User, User, i64) {
  let member = promoted(s, "Ana", "Pérez", Role::Member).await;
  let pastor = promoted(s, "Pedro", "Díaz", Role::Pastor).await;
  let ministry = ministry_id(s, "Jóvenes").await;
  let event = s
    .create_event(event_input(ministry, member.user_id), Role::Member)
    .await
    .unwrap();
  s.apply_action(event.event_id, actor(&pastor), EventAction::Approve, None)
    .await
    .unwrap();

  let outcome = s
    .apply_action(
      event.event_id,
      actor(&pastor),
      EventAction::Cancel,
      Some("Conflicto de agenda".into()),
    )
    .await
    .unwrap();
  let notification_id = match outcome {
    ActionOutcome::CancellationRequested { notification_id } => {
      notification_id
    }
    other => panic!("unexpected outcome: {other:?}"),
  };
  (event.event_id, member, pastor, notification_id)
}

#[tokio::test]
async fn non_owner_cancel_files_a_request_instead_of_mutating() {
  let s = store().await;
  let (event_id, member, pastor, _) = cancellation_fixture(&s).await;

  let event = s.get_event(event_id).await.unwrap().unwrap();
  assert_eq!(event.status, EventStatus::Approved);

  let inbox = s
    .list_notifications(member.user_id, None)
    .await
    .unwrap();
  assert_eq!(inbox.len(), 1);
  let request = &inbox[0];
  assert_eq!(request.kind, NotificationKind::CancellationRequest);
  assert_eq!(request.sender_id, Some(pastor.user_id));
  assert!(!request.read);
  assert!(request.action_taken.is_none());
  assert!(request.message.contains("Conflicto de agenda"));
}

#[tokio::test]
async fn approving_the_request_cancels_the_event() {
  let s = store().await;
  let (event_id, member, _, notification_id) = cancellation_fixture(&s).await;

  let outcome = s
    .respond_cancellation(notification_id, member.user_id, true, None)
    .await
    .unwrap();
  assert!(outcome.event_updated);

  let event = s.get_event(event_id).await.unwrap().unwrap();
  assert_eq!(event.status, EventStatus::Cancelled);

  let inbox = s.list_notifications(member.user_id, None).await.unwrap();
  assert_eq!(inbox[0].action_taken, Some(true));
  assert!(inbox[0].read);
}

#[tokio::test]
async fn approved_cancellation_appends_a_motivo() {
  let s = store().await;
  let (event_id, member, _, notification_id) = cancellation_fixture(&s).await;
  let before = s.list_motivos(event_id).await.unwrap().len();

  s.respond_cancellation(notification_id, member.user_id, true, None)
    .await
    .unwrap();

  let motivos = s.list_motivos(event_id).await.unwrap();
  assert_eq!(motivos.len(), before + 1);
  let last = motivos.last().unwrap();
  assert_eq!(last.user_id, member.user_id);
  assert!(last.description.contains("Cancelación aprobada"));
}

#[tokio::test]
async fn rejecting_the_request_notifies_the_requester() {
  let s = store().await;
  let (event_id, member, pastor, notification_id) =
    cancellation_fixture(&s).await;

  let outcome = s
    .respond_cancellation(
      notification_id,
      member.user_id,
      false,
      Some("El evento ya fue anunciado".into()),
    )
    .await
    .unwrap();
  assert!(!outcome.event_updated);

  let event = s.get_event(event_id).await.unwrap().unwrap();
  assert_eq!(event.status, EventStatus::Approved);

  let reply = &s.list_notifications(pastor.user_id, None).await.unwrap()[0];
  assert_eq!(reply.kind, NotificationKind::RejectionReply);
  assert_eq!(reply.sender_id, Some(member.user_id));
  assert_eq!(
    reply.rejection_reason.as_deref(),
    Some("El evento ya fue anunciado")
  );
  assert!(reply.message.contains("Ana Pérez"));
}

#[tokio::test]
async fn responding_twice_is_rejected() {
  let s = store().await;
  let (_, member, _, notification_id) = cancellation_fixture(&s).await;

  s.respond_cancellation(notification_id, member.user_id, false, None)
    .await
    .unwrap();
  let err = s
    .respond_cancellation(notification_id, member.user_id, true, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::AlreadyProcessed(_))));
}

#[tokio::test]
async fn mailbox_is_scoped_to_its_recipient() {
  let s = store().await;
  let (_, _, pastor, notification_id) = cancellation_fixture(&s).await;

  // The request sits in the owner's mailbox, not the pastor's.
  let err = s
    .mark_read(notification_id, pastor.user_id)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::NotificationNotFound(_))
  ));

  let err = s
    .respond_cancellation(notification_id, pastor.user_id, true, None)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::NotificationNotFound(_))
  ));
}

#[tokio::test]
async fn unread_filter_hides_read_notifications() {
  let s = store().await;
  let (_, member, _, notification_id) = cancellation_fixture(&s).await;

  s.mark_read(notification_id, member.user_id).await.unwrap();

  let unread = s
    .list_notifications(member.user_id, Some(false))
    .await
    .unwrap();
  assert!(unread.is_empty());

  let read = s
    .list_notifications(member.user_id, Some(true))
    .await
    .unwrap();
  assert_eq!(read.len(), 1);
}
