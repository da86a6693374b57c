//! Courses, rubric criteria, tasks, and grade aggregation.
//!
//! The rubric invariant: the percentages of a course's criterion set sum
//! to exactly 100.00 (2 decimals). One generic validator enforces it
//! everywhere — including for the default criteria seeded at course
//! creation, so a future edit to the default table cannot silently break
//! the invariant.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Course ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Course {
  pub course_id:   i64,
  pub name:        String,
  pub description: Option<String>,
  pub start_date:  NaiveDate,
  pub end_date:    NaiveDate,
  pub start_time:  NaiveTime,
  pub end_time:    NaiveTime,
  /// Owning user; cascades course/rubric/task/grade deletion.
  pub owner:       i64,
}

#[derive(Debug, Clone)]
pub struct NewCourse {
  pub name:        String,
  pub description: Option<String>,
  pub start_date:  NaiveDate,
  pub end_date:    NaiveDate,
  pub start_time:  NaiveTime,
  pub end_time:    NaiveTime,
  pub owner:       i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoursePatch {
  pub name:        Option<String>,
  pub description: Option<String>,
  pub start_date:  Option<NaiveDate>,
  pub end_date:    Option<NaiveDate>,
  pub start_time:  Option<NaiveTime>,
  pub end_time:    Option<NaiveTime>,
}

// ─── Rubric ──────────────────────────────────────────────────────────────────

/// A named grading dimension with a percentage weight within a course.
#[derive(Debug, Clone, Serialize)]
pub struct Criterion {
  pub criterion_id: i64,
  pub course_id:    i64,
  pub name:         String,
  pub percentage:   f64,
}

/// One entry of a full-set rubric replacement. `id` present: update in
/// place; absent: insert. Existing criteria missing from the replacement
/// set are deleted.
#[derive(Debug, Clone, Deserialize)]
pub struct CriterionEntry {
  pub id:         Option<i64>,
  pub name:       String,
  pub percentage: f64,
}

/// Criteria seeded at course creation; validated at seed time like any
/// other replacement set.
pub const DEFAULT_CRITERIA: &[(&str, f64)] = &[
  ("Asistencia", 10.0),
  ("Actuación", 30.0),
  ("Tareas", 30.0),
  ("Examen", 30.0),
];

pub fn round2(x: f64) -> f64 { (x * 100.0).round() / 100.0 }

/// The one rubric validator: every percentage in [0, 100], and the sum,
/// rounded to 2 decimals, exactly 100.00. Any failure aborts the whole
/// batch.
pub fn validate_percentages<I>(percentages: I) -> Result<()>
where
  I: IntoIterator<Item = f64>,
{
  let mut sum = 0.0;
  for p in percentages {
    if !(0.0..=100.0).contains(&p) {
      return Err(Error::PercentageRange(p));
    }
    sum += p;
  }
  let sum = round2(sum);
  if (sum * 100.0).round() as i64 != 10_000 {
    return Err(Error::PercentageSum { actual: sum });
  }
  Ok(())
}

pub fn default_criteria() -> Vec<CriterionEntry> {
  DEFAULT_CRITERIA
    .iter()
    .map(|(name, percentage)| CriterionEntry {
      id:         None,
      name:       (*name).to_string(),
      percentage: *percentage,
    })
    .collect()
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

/// A task belongs to exactly one course and references exactly one
/// criterion of that course.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
  pub task_id:      i64,
  pub course_id:    i64,
  pub criterion_id: i64,
  pub title:        String,
  pub description:  Option<String>,
  pub due_date:     NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewTask {
  pub course_id:    i64,
  pub criterion_id: i64,
  pub title:        String,
  pub description:  Option<String>,
  pub due_date:     NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
  pub criterion_id: Option<i64>,
  pub title:        Option<String>,
  pub description:  Option<String>,
  pub due_date:     Option<NaiveDate>,
}

/// Task listing row enriched with its criterion.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRow {
  pub task_id:        i64,
  pub title:          String,
  pub description:    Option<String>,
  pub due_date:       NaiveDate,
  pub criterion_name: String,
  pub percentage:     f64,
}

// ─── Grades ──────────────────────────────────────────────────────────────────

/// One (person, score) pair of a grade batch. At most one grade row per
/// (task, person): recording again overwrites, no history kept.
#[derive(Debug, Clone, Deserialize)]
pub struct GradeEntry {
  pub person_id: i64,
  pub score:     f64,
}

/// One row of a student's flat grade report across courses.
#[derive(Debug, Clone, Serialize)]
pub struct GradeReportRow {
  pub task_id:        i64,
  pub task_title:     String,
  pub criterion_name: String,
  pub score:          f64,
}

/// One row of a task roster: every enrolled participant appears, graded
/// or not. `score` stays `None` for ungraded students so callers can show
/// "not yet graded" instead of omitting the row.
#[derive(Debug, Clone, Serialize)]
pub struct RosterRow {
  pub person_id: i64,
  pub full_name: String,
  pub score:     Option<f64>,
}

/// Per-criterion input of a final-grade computation: the criterion weight
/// and the latest recorded task score under it, if any.
#[derive(Debug, Clone, Serialize)]
pub struct CriterionScore {
  pub criterion_id: i64,
  pub name:         String,
  pub percentage:   f64,
  pub score:        Option<f64>,
}

/// Weighted final grade: `Σ(percentage/100 × latest score)`. Criteria
/// with no graded task contribute 0.
pub fn final_grade(per_criterion: &[CriterionScore]) -> f64 {
  let total = per_criterion
    .iter()
    .map(|c| c.percentage / 100.0 * c.score.unwrap_or(0.0))
    .sum();
  round2(total)
}

/// Attendance flag for one participant on one date; batches are upserted
/// per (course, person, date).
#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceEntry {
  pub person_id: i64,
  pub present:   bool,
}

/// Result of an enrolment replacement — the set diff actually applied.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentDiff {
  pub added:   Vec<i64>,
  pub removed: Vec<i64>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_sum_to_one_hundred() {
    assert!(
      validate_percentages(default_criteria().iter().map(|c| c.percentage))
        .is_ok()
    );
  }

  #[test]
  fn sum_off_by_one_rejected_with_actual_sum() {
    let err =
      validate_percentages([10.0, 20.0, 30.0, 41.0]).unwrap_err();
    match err {
      Error::PercentageSum { actual } => assert_eq!(actual, 101.0),
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn fractional_sum_rounds_to_two_decimals() {
    // 33.33 * 3 = 99.99 — not 100.00 even after rounding.
    assert!(validate_percentages([33.33, 33.33, 33.33]).is_err());
    // 33.33 + 33.33 + 33.34 = 100.00 exactly at 2 decimals.
    assert!(validate_percentages([33.33, 33.33, 33.34]).is_ok());
  }

  #[test]
  fn out_of_range_percentage_rejected() {
    assert!(matches!(
      validate_percentages([-5.0, 105.0]),
      Err(Error::PercentageRange(_))
    ));
  }

  #[test]
  fn final_grade_weights_latest_scores() {
    let per = vec![
      CriterionScore {
        criterion_id: 1,
        name:         "Asistencia".into(),
        percentage:   10.0,
        score:        Some(100.0),
      },
      CriterionScore {
        criterion_id: 2,
        name:         "Actuación".into(),
        percentage:   30.0,
        score:        Some(80.0),
      },
      CriterionScore {
        criterion_id: 3,
        name:         "Tareas".into(),
        percentage:   30.0,
        score:        Some(90.0),
      },
      CriterionScore {
        criterion_id: 4,
        name:         "Examen".into(),
        percentage:   30.0,
        score:        None,
      },
    ];
    // 10 + 24 + 27 + 0
    assert_eq!(final_grade(&per), 61.0);
  }
}
