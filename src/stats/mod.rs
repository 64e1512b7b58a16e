//! Stats module - dashboard figures derived from workouts, exercises and records
//!
//! Everything here is a pure function of a snapshot plus "now". The time zone
//! of `now` decides where days start, so production code passes
//! `Local::now()` and tests pass fixed UTC instants.

pub mod records;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};

use crate::db::{Exercise, PersonalRecord, Workout};

/// Figures shown at the top of the dashboard
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub streak: u32,
    pub workouts_this_week: usize,
    pub weekly_target: u32,
    pub records_this_week: usize,
    pub total_volume_tonnes: f64,
}

impl DashboardStats {
    /// Volume with one decimal, e.g. "12.4"
    pub fn volume_label(&self) -> String {
        format!("{:.1}", self.total_volume_tonnes)
    }
}

/// Training analytics over one snapshot
pub struct Analytics {
    workouts: Vec<Workout>,
    exercises: Vec<Exercise>,
    records: Vec<PersonalRecord>,
}

impl Analytics {
    pub fn new(workouts: Vec<Workout>, exercises: Vec<Exercise>, records: Vec<PersonalRecord>) -> Self {
        Self { workouts, exercises, records }
    }

    /// Consecutive training days ending today or yesterday
    pub fn current_streak<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> u32 {
        let tz = now.timezone();
        let dates: Vec<NaiveDate> = self
            .workouts
            .iter()
            .map(|w| w.date.with_timezone(&tz).date_naive())
            .collect();
        streak(&dates, now.date_naive())
    }

    pub fn workouts_this_week<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> usize {
        let tz = now.timezone();
        let start = week_start(now.date_naive());
        self.workouts
            .iter()
            .filter(|w| w.date.with_timezone(&tz).date_naive() >= start)
            .count()
    }

    pub fn records_this_week<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> usize {
        let tz = now.timezone();
        let start = week_start(now.date_naive());
        self.records
            .iter()
            .filter(|r| r.date.with_timezone(&tz).date_naive() >= start)
            .count()
    }

    /// Sum of weight x reps x sets over every exercise, in tonnes.
    /// Not limited to the current week.
    pub fn total_volume_tonnes(&self) -> f64 {
        // f64 `sum` of nothing is -0.0, which would print as "-0.0"
        let kg = self.exercises.iter().map(Exercise::volume).fold(0.0, |acc, v| acc + v);
        kg / 1000.0
    }

    pub fn summary<Tz: TimeZone>(&self, now: &DateTime<Tz>, weekly_target: u32) -> DashboardStats {
        DashboardStats {
            streak: self.current_streak(now),
            workouts_this_week: self.workouts_this_week(now),
            weekly_target,
            records_this_week: self.records_this_week(now),
            total_volume_tonnes: self.total_volume_tonnes(),
        }
    }
}

/// Streak over calendar dates.
///
/// Dates are deduplicated and walked newest first. If the newest is older
/// than yesterday the streak is 0; otherwise it counts the run of dates one
/// day apart, stopping at the first gap.
pub fn streak(dates: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut unique = dates.to_vec();
    unique.sort_unstable_by(|a, b| b.cmp(a));
    unique.dedup();

    let Some(latest) = unique.first() else {
        return 0;
    };
    if *latest < today - Duration::days(1) {
        return 0;
    }

    let mut count = 1;
    for pair in unique.windows(2) {
        if pair[0] - pair[1] == Duration::days(1) {
            count += 1;
        } else {
            break;
        }
    }
    count
}

/// Most recent Sunday on or before `today`
pub fn week_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(i64::from(today.weekday().num_days_from_sunday()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn workout(id: i64, date: DateTime<Utc>) -> Workout {
        Workout { id, name: "Séance".to_string(), date }
    }

    fn exercise(workout_id: i64, sets: i64, reps: i64, weight: f64) -> Exercise {
        Exercise {
            id: 0,
            workout_id,
            name: "Squat barre".to_string(),
            sets: Some(sets),
            reps: Some(reps),
            weight: Some(weight),
            duration: None,
            is_pr: false,
        }
    }

    fn record(name: &str, date: DateTime<Utc>) -> PersonalRecord {
        PersonalRecord {
            exercise_name: name.to_string(),
            weight: 100.0,
            reps: 5,
            date,
        }
    }

    #[test]
    fn test_streak_three_days_ending_today() {
        let dates = [date(2024, 1, 3), date(2024, 1, 2), date(2024, 1, 1)];
        assert_eq!(streak(&dates, date(2024, 1, 3)), 3);
    }

    #[test]
    fn test_streak_stale_is_zero() {
        assert_eq!(streak(&[date(2024, 1, 1)], date(2024, 1, 5)), 0);
    }

    #[test]
    fn test_streak_ending_yesterday_counts() {
        let dates = [date(2024, 1, 2), date(2024, 1, 1)];
        assert_eq!(streak(&dates, date(2024, 1, 3)), 2);
    }

    #[test]
    fn test_streak_stops_at_gap() {
        let dates = [date(2024, 1, 10), date(2024, 1, 9), date(2024, 1, 7), date(2024, 1, 6)];
        assert_eq!(streak(&dates, date(2024, 1, 10)), 2);
    }

    #[test]
    fn test_streak_ignores_duplicates_and_order() {
        let dates = [date(2024, 1, 1), date(2024, 1, 3), date(2024, 1, 2), date(2024, 1, 3)];
        assert_eq!(streak(&dates, date(2024, 1, 3)), 3);
    }

    #[test]
    fn test_streak_empty() {
        assert_eq!(streak(&[], date(2024, 1, 3)), 0);
    }

    #[test]
    fn test_streak_truncates_to_day() {
        // Two sessions on the same day, one the evening before
        let analytics = Analytics::new(
            vec![
                workout(1, at(2024, 1, 3, 7)),
                workout(2, at(2024, 1, 3, 19)),
                workout(3, at(2024, 1, 2, 22)),
            ],
            vec![],
            vec![],
        );
        assert_eq!(analytics.current_streak(&at(2024, 1, 3, 20)), 2);
    }

    #[test]
    fn test_week_start_is_sunday() {
        // 2024-01-03 is a Wednesday
        assert_eq!(week_start(date(2024, 1, 3)), date(2023, 12, 31));
        assert_eq!(week_start(date(2023, 12, 31)), date(2023, 12, 31));
        assert_eq!(week_start(date(2024, 1, 6)), date(2023, 12, 31));
    }

    #[test]
    fn test_weekly_counts() {
        let analytics = Analytics::new(
            vec![
                workout(1, at(2024, 1, 3, 8)),
                workout(2, at(2023, 12, 31, 0)),
                workout(3, at(2023, 12, 30, 23)),
            ],
            vec![],
            vec![
                record("Squat barre", at(2024, 1, 1, 9)),
                record("Tractions pronation", at(2023, 12, 29, 9)),
            ],
        );
        let now = at(2024, 1, 3, 12);
        assert_eq!(analytics.workouts_this_week(&now), 2);
        assert_eq!(analytics.records_this_week(&now), 1);
    }

    #[test]
    fn test_volume_is_global() {
        let analytics = Analytics::new(
            vec![workout(1, at(2023, 6, 1, 8)), workout(2, at(2024, 1, 3, 8))],
            vec![exercise(1, 4, 7, 100.0), exercise(2, 3, 10, 50.0)],
            vec![],
        );
        // 2800 + 1500
        assert!((analytics.total_volume_tonnes() - 4.3).abs() < 1e-9);
    }

    #[test]
    fn test_summary_and_label() {
        let analytics = Analytics::new(
            vec![workout(1, at(2024, 1, 3, 8))],
            vec![exercise(1, 3, 5, 82.5)],
            vec![record("Squat barre", at(2024, 1, 3, 9))],
        );
        let stats = analytics.summary(&at(2024, 1, 3, 12), 3);

        assert_eq!(stats.streak, 1);
        assert_eq!(stats.workouts_this_week, 1);
        assert_eq!(stats.weekly_target, 3);
        assert_eq!(stats.records_this_week, 1);
        // 1237.5 kg
        assert_eq!(stats.volume_label(), "1.2");
    }

    #[test]
    fn test_empty_snapshot() {
        let stats = Analytics::new(vec![], vec![], vec![]).summary(&at(2024, 1, 3, 12), 3);
        assert_eq!(stats.streak, 0);
        assert_eq!(stats.volume_label(), "0.0");
        assert!(stats.total_volume_tonnes.is_sign_positive());
    }

    #[test]
    fn test_volume_without_weights_is_positive_zero() {
        let mut bodyweight = exercise(1, 3, 10, 0.0);
        bodyweight.weight = None;
        let analytics = Analytics::new(vec![workout(1, at(2024, 1, 3, 8))], vec![bodyweight], vec![]);
        assert_eq!(analytics.summary(&at(2024, 1, 3, 12), 3).volume_label(), "0.0");
    }
}
