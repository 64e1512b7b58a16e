//! Query layer - the read/write vocabulary used by the screens and the CLI
//!
//! Shapes results and orchestrates multi-table writes. Workout references are
//! checked here; the table primitives underneath stay permissive.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::models::*;
use super::tables::{insert_exercises, insert_workout, remove_exercises_of_workout, workout_from_row};
use super::{Database, StoreError};
use crate::live::{Change, Table};
use crate::stats::records;

/// Result of saving an exercise's numbers
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub exercise: Exercise,
    /// Set when this save replaced (or created) the personal record
    pub new_record: Option<PersonalRecord>,
}

impl SaveOutcome {
    pub fn is_pr(&self) -> bool {
        self.exercise.is_pr
    }
}

impl Database {
    /// Workouts, most recent first
    pub fn list_workouts(&self) -> Result<Vec<Workout>, StoreError> {
        self.workouts_by_date(Order::Desc)
    }

    pub fn workout_exercises(&self, workout_id: i64) -> Result<Vec<Exercise>, StoreError> {
        self.exercises_of_workout(workout_id)
    }

    pub fn require_workout(&self, id: i64) -> Result<Workout, StoreError> {
        self.get_workout(id)?.ok_or_else(|| StoreError::not_found("workout", id))
    }

    pub fn create_blank_workout(&self, name: &str, now: DateTime<Utc>) -> Result<i64, StoreError> {
        let id = self.add_workout(&NewWorkout { name: name.to_string(), date: now })?;
        info!(id, name, "workout created");
        Ok(id)
    }

    /// Start a workout from a template.
    ///
    /// Template names are resolved against the catalog; each name found
    /// becomes one exercise with the catalog's default sets and reps. Names
    /// missing from the catalog are skipped. Catalog names are unique, so a
    /// name never yields more than one exercise.
    pub fn create_workout_from_template(&self, template_id: i64, now: DateTime<Utc>) -> Result<i64, StoreError> {
        let template = self
            .get_predefined_workout(template_id)?
            .ok_or_else(|| StoreError::not_found("template", template_id))?;
        let catalog = self.predefined_exercises_by_names(&template.exercises)?;

        let entries: Vec<&PredefinedExercise> = template
            .exercises
            .iter()
            .filter_map(|name| catalog.iter().find(|e| &e.name == name))
            .collect();
        if entries.len() < template.exercises.len() {
            debug!(
                template = %template.name,
                missing = template.exercises.len() - entries.len(),
                "template names missing from catalog"
            );
        }

        let tx = self.conn().unchecked_transaction()?;
        let id = insert_workout(&tx, &NewWorkout { name: template.name.clone(), date: now })?;
        let rows: Vec<NewExercise> = entries.iter().map(|e| NewExercise::from_catalog(id, e)).collect();
        insert_exercises(&tx, &rows)?;
        tx.commit()?;

        self.publish(Change::workout(Table::Workouts, id));
        self.publish(Change::workout(Table::Exercises, id));
        info!(id, template = %template.name, exercises = rows.len(), "workout created from template");
        Ok(id)
    }

    pub fn set_workout_date(&self, id: i64, date: DateTime<Utc>) -> Result<(), StoreError> {
        self.update_workout(id, &WorkoutPatch { name: None, date: Some(date) })
    }

    /// Append catalog exercises (by catalog id) to an existing workout
    pub fn add_catalog_exercises(&self, workout_id: i64, catalog_ids: &[i64]) -> Result<Vec<i64>, StoreError> {
        self.require_workout(workout_id)?;
        let entries = self.predefined_exercises_by_ids(catalog_ids)?;
        let rows: Vec<NewExercise> = entries
            .iter()
            .map(|e| NewExercise::from_catalog(workout_id, e))
            .collect();
        self.add_exercises(&rows)
    }

    pub fn patch_exercise(&self, id: i64, patch: &ExercisePatch) -> Result<(), StoreError> {
        self.update_exercise(id, patch)
    }

    pub fn delete_exercise(&self, id: i64) -> Result<(), StoreError> {
        if self.remove_exercise(id)? {
            Ok(())
        } else {
            Err(StoreError::not_found("exercise", id))
        }
    }

    /// Delete a workout and its exercises in one transaction.
    /// Returns how many exercises went with it.
    pub fn delete_workout(&self, id: i64) -> Result<usize, StoreError> {
        let tx = self.conn().unchecked_transaction()?;
        if tx.execute("DELETE FROM workouts WHERE id = ?1", [id])? == 0 {
            return Err(StoreError::not_found("workout", id));
        }
        let exercises = remove_exercises_of_workout(&tx, id)?;
        tx.commit()?;

        self.publish(Change::workout(Table::Workouts, id));
        self.publish(Change::workout(Table::Exercises, id));
        info!(id, exercises, "workout deleted");
        Ok(exercises)
    }

    /// Save edited numbers, then update the personal record for the
    /// exercise name if the new (weight, reps) beats it.
    ///
    /// `is_pr` is set when this save raised the record, and kept only while
    /// the exercise still matches the record it set. Tying a record held by
    /// another exercise does not flag it.
    pub fn save_exercise(&self, id: i64, patch: &ExercisePatch, now: DateTime<Utc>) -> Result<SaveOutcome, StoreError> {
        self.update_exercise(id, patch)?;
        let mut exercise = self
            .get_exercise(id)?
            .ok_or_else(|| StoreError::not_found("exercise", id))?;

        let existing = self.get_record(&exercise.name)?;
        let new_record = records::candidate(&exercise.name, exercise.weight, exercise.reps, now)
            .and_then(|candidate| records::improved(existing.as_ref(), candidate));
        if let Some(record) = &new_record {
            self.put_record(record)?;
            info!(exercise = %record.exercise_name, weight = record.weight, reps = record.reps, "new personal record");
        }

        let current = new_record.as_ref().or(existing.as_ref());
        let is_pr = new_record.is_some() || (exercise.is_pr && records::holds_record(&exercise, current));
        if is_pr != exercise.is_pr {
            self.update_exercise(id, &ExercisePatch { is_pr: Some(is_pr), ..Default::default() })?;
            exercise.is_pr = is_pr;
        }

        Ok(SaveOutcome { exercise, new_record })
    }

    /// Dashboard rows: exercise count and summed duration per workout
    pub fn workout_summaries(&self) -> Result<Vec<WorkoutSummary>, StoreError> {
        let mut stmt = self.conn().prepare(
            "SELECT w.id, w.name, w.date, COUNT(e.id), COALESCE(SUM(e.duration), 0)
             FROM workouts w
             LEFT JOIN exercises e ON e.workout_id = w.id
             GROUP BY w.id
             ORDER BY w.date DESC, w.id DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let count: i64 = row.get(3)?;
                Ok(WorkoutSummary {
                    workout: workout_from_row(row)?,
                    exercise_count: usize::try_from(count).unwrap_or(0),
                    duration_minutes: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Catalog grouped by muscle group, groups in first-seen order
    pub fn catalog_by_muscle_group(&self) -> Result<Vec<(String, Vec<PredefinedExercise>)>, StoreError> {
        let mut groups: Vec<(String, Vec<PredefinedExercise>)> = Vec::new();
        for entry in self.predefined_exercises()? {
            match groups.iter_mut().find(|(group, _)| *group == entry.muscle_group) {
                Some((_, entries)) => entries.push(entry),
                None => groups.push((entry.muscle_group.clone(), vec![entry])),
            }
        }
        Ok(groups)
    }

    pub fn templates(&self) -> Result<Vec<PredefinedWorkout>, StoreError> {
        self.predefined_workouts()
    }

    /// Remove exercises whose workout no longer exists
    pub fn purge_orphan_exercises(&self) -> Result<usize, StoreError> {
        let removed = self.conn().execute(
            "DELETE FROM exercises WHERE workout_id NOT IN (SELECT id FROM workouts)",
            [],
        )?;
        if removed > 0 {
            self.publish(Change::table(Table::Exercises));
            info!(removed, "orphaned exercises purged");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 3, 18, 0, 0).unwrap()
    }

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        seed::run(&db).unwrap();
        db
    }

    fn template_named(db: &Database, name: &str) -> PredefinedWorkout {
        db.templates().unwrap().into_iter().find(|t| t.name == name).unwrap()
    }

    fn numbers(weight: f64, reps: i64) -> ExercisePatch {
        ExercisePatch {
            sets: Patch::Set(3),
            reps: Patch::Set(reps),
            weight: Patch::Set(weight),
            ..Default::default()
        }
    }

    #[test]
    fn test_list_workouts_newest_first() {
        let db = seeded();
        let old = db.create_blank_workout("old", now() - chrono::Duration::days(2)).unwrap();
        let new = db.create_blank_workout("new", now()).unwrap();
        let ids: Vec<i64> = db.list_workouts().unwrap().iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![new, old]);
    }

    #[test]
    fn test_template_creates_one_exercise_per_name() {
        let db = seeded();
        let template = template_named(&db, "Jambes / Gainage");

        let id = db.create_workout_from_template(template.id, now()).unwrap();

        let workout = db.get_workout(id).unwrap().unwrap();
        assert_eq!(workout.name, "Jambes / Gainage");
        let exercises = db.workout_exercises(id).unwrap();
        let names: Vec<&str> = exercises.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, template.exercises.iter().map(String::as_str).collect::<Vec<_>>());

        let squat = &exercises[0];
        assert_eq!((squat.sets, squat.reps), (Some(4), Some(7)));
        assert_eq!(squat.weight, None);
        assert_eq!(squat.duration, None);
    }

    #[test]
    fn test_template_skips_unknown_names() {
        let db = seeded();
        db.add_predefined_workouts(&[NewPredefinedWorkout {
            name: "Mixte".into(),
            exercises: vec!["Squat barre".into(), "Burpees".into(), "Tractions pronation".into()],
        }])
        .unwrap();
        let template = template_named(&db, "Mixte");

        let id = db.create_workout_from_template(template.id, now()).unwrap();
        let names: Vec<String> = db.workout_exercises(id).unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Squat barre", "Tractions pronation"]);
    }

    #[test]
    fn test_unknown_template_is_not_found() {
        let db = seeded();
        let err = db.create_workout_from_template(999, now()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "template", .. }));
        assert!(db.list_workouts().unwrap().is_empty());
    }

    #[test]
    fn test_set_workout_date() {
        let db = seeded();
        let id = db.create_blank_workout("Séance personnalisée", now()).unwrap();
        let date = Utc.with_ymd_and_hms(2023, 12, 24, 10, 0, 0).unwrap();
        db.set_workout_date(id, date).unwrap();
        assert_eq!(db.require_workout(id).unwrap().date, date);
    }

    #[test]
    fn test_add_catalog_exercises() {
        let db = seeded();
        let id = db.create_blank_workout("Séance personnalisée", now()).unwrap();
        let catalog = db.predefined_exercises().unwrap();

        let added = db.add_catalog_exercises(id, &[catalog[0].id, catalog[5].id]).unwrap();
        assert_eq!(added.len(), 2);

        let exercises = db.workout_exercises(id).unwrap();
        assert_eq!(exercises[0].name, catalog[0].name);
        assert_eq!(exercises[1].sets, catalog[5].default_sets);
    }

    #[test]
    fn test_add_catalog_exercises_to_missing_workout() {
        let db = seeded();
        let catalog = db.predefined_exercises().unwrap();
        let err = db.add_catalog_exercises(77, &[catalog[0].id]).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "workout", id: 77 }));
        assert!(db.exercises(Order::Asc).unwrap().is_empty());
    }

    #[test]
    fn test_delete_workout_cascades_only_its_exercises() {
        let db = seeded();
        let legs = template_named(&db, "Jambes / Gainage");
        let pull = template_named(&db, "Dos / Biceps");
        let a = db.create_workout_from_template(legs.id, now()).unwrap();
        let b = db.create_workout_from_template(pull.id, now()).unwrap();

        let removed = db.delete_workout(a).unwrap();

        assert_eq!(removed, legs.exercises.len());
        assert!(db.get_workout(a).unwrap().is_none());
        assert!(db.workout_exercises(a).unwrap().is_empty());
        assert_eq!(db.workout_exercises(b).unwrap().len(), pull.exercises.len());
    }

    #[test]
    fn test_delete_missing_workout() {
        let db = seeded();
        assert!(matches!(db.delete_workout(5).unwrap_err(), StoreError::NotFound { .. }));
    }

    #[test]
    fn test_delete_exercise() {
        let db = seeded();
        let id = db.create_blank_workout("x", now()).unwrap();
        let catalog = db.predefined_exercises().unwrap();
        let ids = db.add_catalog_exercises(id, &[catalog[0].id]).unwrap();

        db.delete_exercise(ids[0]).unwrap();
        assert!(db.workout_exercises(id).unwrap().is_empty());
        assert!(matches!(db.delete_exercise(ids[0]).unwrap_err(), StoreError::NotFound { .. }));
    }

    #[test]
    fn test_save_exercise_records_and_flags_pr() {
        let db = seeded();
        let id = db.create_blank_workout("x", now()).unwrap();
        let catalog = db.predefined_exercises_by_names(&["Squat barre"]).unwrap();
        let ids = db.add_catalog_exercises(id, &[catalog[0].id]).unwrap();

        let outcome = db.save_exercise(ids[0], &numbers(80.0, 5), now()).unwrap();
        assert!(outcome.is_pr());
        assert_eq!(outcome.new_record.as_ref().map(|r| (r.weight, r.reps)), Some((80.0, 5)));

        let stored = db.get_record("Squat barre").unwrap().unwrap();
        assert_eq!((stored.weight, stored.reps), (80.0, 5));
        assert!(db.get_exercise(ids[0]).unwrap().unwrap().is_pr);

        // Saving the same numbers again keeps the flag but sets no new record
        let again = db.save_exercise(ids[0], &numbers(80.0, 5), now()).unwrap();
        assert!(again.new_record.is_none());
        assert!(again.is_pr());
    }

    #[test]
    fn test_save_exercise_lighter_attempt_keeps_record() {
        let db = seeded();
        let id = db.create_blank_workout("x", now()).unwrap();
        let catalog = db.predefined_exercises_by_names(&["Squat barre"]).unwrap();
        let mut ids = db.add_catalog_exercises(id, &[catalog[0].id]).unwrap();
        ids.extend(db.add_catalog_exercises(id, &[catalog[0].id]).unwrap());

        db.save_exercise(ids[0], &numbers(80.0, 5), now()).unwrap();
        let second = db.save_exercise(ids[1], &numbers(75.0, 10), now()).unwrap();
        assert!(second.new_record.is_none());
        assert!(!second.is_pr());

        let third = db.save_exercise(ids[1], &numbers(80.0, 6), now()).unwrap();
        assert!(third.is_pr());
        // The first set no longer matches the record
        let first = db.save_exercise(ids[0], &ExercisePatch::default(), now()).unwrap();
        assert!(!first.is_pr());

        let stored = db.get_record("Squat barre").unwrap().unwrap();
        assert_eq!((stored.weight, stored.reps), (80.0, 6));
    }

    #[test]
    fn test_tying_a_record_is_not_a_pr() {
        let db = seeded();
        let catalog = db.predefined_exercises_by_names(&["Squat barre"]).unwrap();
        let monday = db.create_blank_workout("lundi", now()).unwrap();
        let friday = db.create_blank_workout("vendredi", now()).unwrap();
        let first = db.add_catalog_exercises(monday, &[catalog[0].id]).unwrap()[0];
        let repeat = db.add_catalog_exercises(friday, &[catalog[0].id]).unwrap()[0];

        assert!(db.save_exercise(first, &numbers(80.0, 5), now()).unwrap().is_pr());
        let tie = db.save_exercise(repeat, &numbers(80.0, 5), now()).unwrap();
        assert!(tie.new_record.is_none());
        assert!(!tie.is_pr());
        assert!(!db.get_exercise(repeat).unwrap().unwrap().is_pr);
        assert!(db.get_exercise(first).unwrap().unwrap().is_pr);
    }

    #[test]
    fn test_non_finite_weight_is_rejected() {
        let db = seeded();
        let id = db.create_blank_workout("x", now()).unwrap();
        let catalog = db.predefined_exercises_by_names(&["Squat barre"]).unwrap();
        let ids = db.add_catalog_exercises(id, &[catalog[0].id]).unwrap();
        db.save_exercise(ids[0], &numbers(60.0, 5), now()).unwrap();

        let err = db.save_exercise(ids[0], &numbers(f64::INFINITY, 5), now()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidValue { field: "weight", .. }));
        let err = db.patch_exercise(ids[0], &numbers(f64::NAN, 5)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidValue { field: "weight", .. }));
        assert!(db.save_exercise(ids[0], &numbers(-1.0, 5), now()).is_err());

        assert_eq!(db.get_exercise(ids[0]).unwrap().unwrap().weight, Some(60.0));
        let stored = db.get_record("Squat barre").unwrap().unwrap();
        assert_eq!((stored.weight, stored.reps), (60.0, 5));

        // A real heavier lift still becomes the record
        let outcome = db.save_exercise(ids[0], &numbers(500.0, 5), now()).unwrap();
        assert!(outcome.is_pr());
        assert_eq!(db.get_record("Squat barre").unwrap().unwrap().weight, 500.0);
    }

    #[test]
    fn test_save_exercise_without_weight_sets_no_record() {
        let db = seeded();
        let id = db.create_blank_workout("x", now()).unwrap();
        let catalog = db.predefined_exercises_by_names(&["Planche / gainage"]).unwrap();
        let ids = db.add_catalog_exercises(id, &[catalog[0].id]).unwrap();

        let patch = ExercisePatch { duration: Patch::Set(5), ..Default::default() };
        let outcome = db.save_exercise(ids[0], &patch, now()).unwrap();
        assert!(outcome.new_record.is_none());
        assert!(db.personal_records().unwrap().is_empty());
    }

    #[test]
    fn test_save_missing_exercise() {
        let db = seeded();
        let err = db.save_exercise(404, &numbers(50.0, 5), now()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "exercise", id: 404 }));
    }

    #[test]
    fn test_workout_summaries() {
        let db = seeded();
        let legs = template_named(&db, "Jambes / Gainage");
        let id = db.create_workout_from_template(legs.id, now()).unwrap();
        let empty = db.create_blank_workout("vide", now() - chrono::Duration::days(1)).unwrap();

        let ex = db.workout_exercises(id).unwrap();
        db.patch_exercise(ex[0].id, &ExercisePatch { duration: Patch::Set(20), ..Default::default() }).unwrap();
        db.patch_exercise(ex[1].id, &ExercisePatch { duration: Patch::Set(15), ..Default::default() }).unwrap();

        let summaries = db.workout_summaries().unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].workout.id, id);
        assert_eq!(summaries[0].exercise_count, 6);
        assert_eq!(summaries[0].duration_minutes, 35);
        assert_eq!(summaries[1].workout.id, empty);
        assert_eq!(summaries[1].exercise_count, 0);
        assert_eq!(summaries[1].duration_minutes, 0);
    }

    #[test]
    fn test_catalog_by_muscle_group() {
        let db = seeded();
        let groups = db.catalog_by_muscle_group().unwrap();
        assert_eq!(groups[0].0, "Pectoraux");
        let total: usize = groups.iter().map(|(_, entries)| entries.len()).sum();
        assert_eq!(total, 16);
        let legs = groups.iter().find(|(g, _)| g == "Jambes").unwrap();
        assert_eq!(legs.1.len(), 3);
    }

    #[test]
    fn test_purge_orphans() {
        let db = seeded();
        let legs = template_named(&db, "Jambes / Gainage");
        let a = db.create_workout_from_template(legs.id, now()).unwrap();
        let b = db.create_blank_workout("b", now()).unwrap();
        let catalog = db.predefined_exercises().unwrap();
        db.add_catalog_exercises(b, &[catalog[0].id]).unwrap();

        // Two-step delete interrupted after the first step
        db.remove_workout(a).unwrap();

        assert_eq!(db.purge_orphan_exercises().unwrap(), 6);
        assert_eq!(db.exercises(Order::Asc).unwrap().len(), 1);
        assert_eq!(db.purge_orphan_exercises().unwrap(), 0);
    }
}
