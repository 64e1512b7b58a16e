//! Personal record policy
//!
//! A record is replaced only when a new result is strictly better under the
//! lexicographic order on (weight, reps). A heavier lift with fewer reps
//! still counts as better; a lighter lift never does, whatever the reps.

use chrono::{DateTime, Utc};

use crate::db::{Exercise, PersonalRecord};

/// True if (weight, reps) is strictly above the current record
pub fn dominates(weight: f64, reps: i64, current: &PersonalRecord) -> bool {
    weight > current.weight || (weight == current.weight && reps > current.reps)
}

/// Build a candidate record; needs weight and reps both present and non-zero
pub fn candidate(
    exercise_name: &str,
    weight: Option<f64>,
    reps: Option<i64>,
    now: DateTime<Utc>,
) -> Option<PersonalRecord> {
    let weight = weight.filter(|w| *w != 0.0)?;
    let reps = reps.filter(|r| *r != 0)?;
    if exercise_name.is_empty() {
        return None;
    }
    Some(PersonalRecord {
        exercise_name: exercise_name.to_string(),
        weight,
        reps,
        date: now,
    })
}

/// Returns the candidate if it should replace `existing`
pub fn improved(existing: Option<&PersonalRecord>, candidate: PersonalRecord) -> Option<PersonalRecord> {
    match existing {
        Some(current) if !dominates(candidate.weight, candidate.reps, current) => None,
        _ => Some(candidate),
    }
}

/// Whether the exercise's logged values are exactly the stored record
pub fn holds_record(exercise: &Exercise, record: Option<&PersonalRecord>) -> bool {
    match record {
        Some(record) => {
            record.exercise_name == exercise.name
                && exercise.weight == Some(record.weight)
                && exercise.reps == Some(record.reps)
        }
        None => false,
    }
}
