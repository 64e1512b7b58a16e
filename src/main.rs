//! gainz - Personal workout tracker

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gainz::config;
use gainz::form;
use gainz::db::{Database, ExercisePatch, Order, Patch};
use gainz::seed;
use gainz::stats::Analytics;
use gainz::tui::{App, Route, Settings};

#[derive(Parser)]
#[command(name = "gainz")]
#[command(author, version, about = "Personal workout tracker")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "GAINZ_DB")]
    db: Option<PathBuf>,

    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open TUI dashboard
    Tui {
        /// Start on this route, e.g. "/workout/3"
        #[arg(long, default_value = "/")]
        route: String,
    },

    /// List workouts, most recent first
    List {
        /// Number of workouts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show one workout with its exercises
    Show { workout_id: i64 },

    /// Create a workout, blank or from a template
    New {
        /// Template id or name (see `templates`)
        #[arg(short, long)]
        template: Option<String>,

        /// Name of a blank workout
        #[arg(short, long, conflicts_with = "template")]
        name: Option<String>,
    },

    /// List workout templates
    Templates,

    /// List catalog exercises by muscle group
    Catalog,

    /// Add catalog exercises to a workout
    Add {
        workout_id: i64,

        /// Catalog exercise ids
        #[arg(required = true)]
        exercise_ids: Vec<i64>,
    },

    /// Record numbers for an exercise and update personal records
    Log {
        exercise_id: i64,

        #[arg(short, long)]
        sets: Option<i64>,

        #[arg(short, long)]
        reps: Option<i64>,

        /// Weight in kg
        #[arg(short, long, value_parser = weight_arg)]
        weight: Option<f64>,

        /// Duration in minutes
        #[arg(short, long)]
        duration: Option<i64>,
    },

    /// Move a workout to another day (YYYY-MM-DD)
    Date { workout_id: i64, date: String },

    /// Remove an exercise from its workout
    Rm { exercise_id: i64 },

    /// Delete a workout and its exercises
    Delete { workout_id: i64 },

    /// Show training statistics
    Stats,

    /// List personal records
    Records,

    /// Show the catalog seed version and the steps applied at startup
    Seed,

    /// Remove exercises whose workout was deleted
    PurgeOrphans,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::config_path);
    let config = config::load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path());
    let db = Database::open(&db_path).with_context(|| format!("opening {}", db_path.display()))?;
    let report = seed::run(&db)?;
    if !report.is_noop() {
        info!(from = report.from, to = report.to, "catalog seeded");
    }

    match cli.command.unwrap_or(Commands::Tui { route: "/".to_string() }) {
        Commands::Tui { route } => {
            let mut app = App::new(db, Settings::from(&config), Route::parse(&route))?;
            app.run()?;
        }

        Commands::List { limit } => {
            println!("Recent workouts:");
            println!("{:-<60}", "");
            for s in db.workout_summaries()?.iter().take(limit) {
                println!(
                    "{:>4} | {} | {:30} | {:2} exercices | {} min",
                    s.workout.id,
                    s.workout.date.with_timezone(&Local).format("%Y-%m-%d"),
                    s.workout.name,
                    s.exercise_count,
                    s.duration_minutes
                );
            }
        }

        Commands::Show { workout_id } => {
            let workout = db.require_workout(workout_id)?;
            println!("{} - {}", workout.name, workout.date.with_timezone(&Local).format("%Y-%m-%d"));
            println!("{:-<60}", "");
            for e in db.workout_exercises(workout_id)? {
                println!(
                    "{:>4} | {:40} | {} x {} | {} kg | {} min{}",
                    e.id,
                    e.name,
                    show(e.sets),
                    show(e.reps),
                    show(e.weight),
                    show(e.duration),
                    if e.is_pr { " | PR" } else { "" }
                );
            }
        }

        Commands::New { template, name } => {
            let id = match template {
                Some(template) => {
                    let templates = db.templates()?;
                    let found = templates
                        .iter()
                        .find(|t| template.parse::<i64>().is_ok_and(|id| id == t.id) || t.name == template)
                        .ok_or_else(|| anyhow!("no template {template:?}"))?;
                    db.create_workout_from_template(found.id, Utc::now())?
                }
                None => {
                    let name = name.unwrap_or_else(|| config.blank_workout_name.clone());
                    db.create_blank_workout(&name, Utc::now())?
                }
            };
            println!("Created workout {id}");
        }

        Commands::Templates => {
            for t in db.templates()? {
                println!("{:>3} | {}", t.id, t.name);
                for name in &t.exercises {
                    println!("      - {name}");
                }
            }
        }

        Commands::Catalog => {
            for (group, entries) in db.catalog_by_muscle_group()? {
                println!("{group}");
                for e in entries {
                    println!("  {:>3} | {:45} | {} x {}", e.id, e.name, show(e.default_sets), show(e.default_reps));
                }
            }
        }

        Commands::Add { workout_id, exercise_ids } => {
            let ids = db.add_catalog_exercises(workout_id, &exercise_ids)?;
            println!("Added {} exercise(s) to workout {}", ids.len(), workout_id);
        }

        Commands::Log { exercise_id, sets, reps, weight, duration } => {
            let patch = ExercisePatch {
                sets: sets.map_or(Patch::Keep, Patch::Set),
                reps: reps.map_or(Patch::Keep, Patch::Set),
                weight: weight.map_or(Patch::Keep, Patch::Set),
                duration: duration.map_or(Patch::Keep, Patch::Set),
                is_pr: None,
            };
            if patch.is_empty() {
                bail!("nothing to log: pass --sets, --reps, --weight or --duration");
            }
            let outcome = db.save_exercise(exercise_id, &patch, Utc::now())?;
            let e = &outcome.exercise;
            println!("Logged: {} - {} x {} @ {} kg", e.name, show(e.sets), show(e.reps), show(e.weight));
            if let Some(record) = outcome.new_record {
                println!("New personal record: {} kg x {}", record.weight, record.reps);
            }
        }

        Commands::Date { workout_id, date } => {
            db.set_workout_date(workout_id, local_midnight(&date)?)?;
            println!("Workout {workout_id} moved to {date}");
        }

        Commands::Rm { exercise_id } => {
            db.delete_exercise(exercise_id)?;
            println!("Removed exercise {exercise_id}");
        }

        Commands::Delete { workout_id } => {
            let removed = db.delete_workout(workout_id)?;
            println!("Deleted workout {workout_id} ({removed} exercise(s))");
        }

        Commands::Stats => {
            let analytics = Analytics::new(db.list_workouts()?, db.exercises(Order::Asc)?, db.personal_records()?);
            let stats = analytics.summary(&Local::now(), config.weekly_target);

            println!("Training Statistics");
            println!("{:-<40}", "");
            println!("Streak:            {} day(s)", stats.streak);
            println!("This week:         {}/{}", stats.workouts_this_week, stats.weekly_target);
            println!("Records this week: {}", stats.records_this_week);
            println!("Total volume:      {} t", stats.volume_label());
        }

        Commands::Records => {
            for r in db.personal_records()? {
                println!(
                    "{:45} | {} kg x {} | {}",
                    r.exercise_name,
                    r.weight,
                    r.reps,
                    r.date.with_timezone(&Local).format("%Y-%m-%d")
                );
            }
        }

        Commands::Seed => {
            println!("Seed version {} (applied at startup: {:?})", report.to, report.applied);
        }

        Commands::PurgeOrphans => {
            let removed = db.purge_orphan_exercises()?;
            println!("Removed {removed} orphaned exercise(s)");
        }
    }

    Ok(())
}

fn show<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Finite, non-negative kg
fn weight_arg(input: &str) -> Result<f64, String> {
    match form::parse_weight(input) {
        Ok(Some(weight)) => Ok(weight),
        Ok(None) => Err("weight is empty".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// `YYYY-MM-DD` at local midnight
fn local_midnight(input: &str) -> Result<DateTime<Utc>> {
    let day = NaiveDate::parse_from_str(input, "%Y-%m-%d").with_context(|| format!("invalid date {input:?}"))?;
    let date = Local
        .from_local_datetime(&day.and_time(NaiveTime::MIN))
        .earliest()
        .ok_or_else(|| anyhow!("{day} has no local midnight"))?;
    Ok(date.with_timezone(&Utc))
}
