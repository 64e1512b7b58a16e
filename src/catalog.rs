//! Built-in exercise catalog and workout templates
//!
//! These are the canonical definitions the seed runner writes into the
//! catalog tables. Three training days (A/B/C), each a template.

use crate::db::{NewPredefinedExercise, NewPredefinedWorkout};

/// Muscle groups used to group the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MuscleGroup {
    Chest,
    Triceps,
    Shoulders,
    Back,
    Hamstrings,
    Biceps,
    Legs,
    Core,
}

impl MuscleGroup {
    /// Label stored in the catalog table
    pub fn label(&self) -> &'static str {
        match self {
            MuscleGroup::Chest => "Pectoraux",
            MuscleGroup::Triceps => "Triceps",
            MuscleGroup::Shoulders => "Épaules",
            MuscleGroup::Back => "Dos",
            MuscleGroup::Hamstrings => "Ischios",
            MuscleGroup::Biceps => "Biceps",
            MuscleGroup::Legs => "Jambes",
            MuscleGroup::Core => "Gainage",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogExercise {
    pub name: &'static str,
    pub muscle_group: MuscleGroup,
    pub default_sets: i64,
    pub default_reps: i64, // seconds for timed holds
}

impl CatalogExercise {
    pub fn to_row(&self) -> NewPredefinedExercise {
        NewPredefinedExercise {
            name: self.name.to_string(),
            muscle_group: self.muscle_group.label().to_string(),
            default_sets: Some(self.default_sets),
            default_reps: Some(self.default_reps),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Template {
    pub name: &'static str,
    pub exercises: &'static [CatalogExercise],
}

impl Template {
    pub fn to_row(&self) -> NewPredefinedWorkout {
        NewPredefinedWorkout {
            name: self.name.to_string(),
            exercises: self.exercises.iter().map(|e| e.name.to_string()).collect(),
        }
    }
}

/// Day A - push
pub const DAY_A: &[CatalogExercise] = &[
    CatalogExercise {
        name: "Développé couché barre",
        muscle_group: MuscleGroup::Chest,
        default_sets: 4,
        default_reps: 7,
    },
    CatalogExercise {
        name: "Développé incliné haltères ou barre",
        muscle_group: MuscleGroup::Chest,
        default_sets: 3,
        default_reps: 9,
    },
    CatalogExercise {
        name: "Dips (barres parallèles ou entre 2 bancs)",
        muscle_group: MuscleGroup::Triceps,
        default_sets: 3,
        default_reps: 10,
    },
    CatalogExercise {
        name: "Élévations latérales haltères",
        muscle_group: MuscleGroup::Shoulders,
        default_sets: 3,
        default_reps: 14,
    },
    CatalogExercise {
        name: "Extension triceps à la poulie",
        muscle_group: MuscleGroup::Triceps,
        default_sets: 3,
        default_reps: 14,
    },
];

/// Day B - pull
pub const DAY_B: &[CatalogExercise] = &[
    CatalogExercise {
        name: "Tractions pronation",
        muscle_group: MuscleGroup::Back,
        default_sets: 4,
        default_reps: 8,
    },
    CatalogExercise {
        name: "Rowing barre ou haltères",
        muscle_group: MuscleGroup::Back,
        default_sets: 3,
        default_reps: 10,
    },
    CatalogExercise {
        name: "Soulevé de terre jambes tendues (SDT JT)",
        muscle_group: MuscleGroup::Hamstrings,
        default_sets: 3,
        default_reps: 9,
    },
    CatalogExercise {
        name: "Curl biceps barre ou haltères",
        muscle_group: MuscleGroup::Biceps,
        default_sets: 3,
        default_reps: 11,
    },
    CatalogExercise {
        name: "Facepull (poulie ou élastique)",
        muscle_group: MuscleGroup::Shoulders,
        default_sets: 3,
        default_reps: 14,
    },
];

/// Day C - legs and core
pub const DAY_C: &[CatalogExercise] = &[
    CatalogExercise {
        name: "Squat barre",
        muscle_group: MuscleGroup::Legs,
        default_sets: 4,
        default_reps: 7,
    },
    CatalogExercise {
        name: "Fentes avant",
        muscle_group: MuscleGroup::Legs,
        default_sets: 3,
        default_reps: 11,
    },
    CatalogExercise {
        name: "Leg curl machine",
        muscle_group: MuscleGroup::Hamstrings,
        default_sets: 3,
        default_reps: 9,
    },
    CatalogExercise {
        name: "Mollets debout",
        muscle_group: MuscleGroup::Legs,
        default_sets: 3,
        default_reps: 18,
    },
    CatalogExercise {
        name: "Planche / gainage",
        muscle_group: MuscleGroup::Core,
        default_sets: 3,
        default_reps: 45,
    },
    CatalogExercise {
        name: "Abdos type relevé de jambes suspendu ou crunch lesté",
        muscle_group: MuscleGroup::Core,
        default_sets: 3,
        default_reps: 15,
    },
];

pub const TEMPLATES: &[Template] = &[
    Template {
        name: "Pecs / Triceps / Épaules",
        exercises: DAY_A,
    },
    Template {
        name: "Dos / Biceps",
        exercises: DAY_B,
    },
    Template {
        name: "Jambes / Gainage",
        exercises: DAY_C,
    },
];

/// Every catalog exercise, day A then B then C
pub fn all_exercises() -> Vec<&'static CatalogExercise> {
    DAY_A.iter().chain(DAY_B.iter()).chain(DAY_C.iter()).collect()
}

pub fn find_exercise_by_name(name: &str) -> Option<&'static CatalogExercise> {
    all_exercises().into_iter().find(|e| e.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_names_unique() {
        let names: HashSet<_> = all_exercises().iter().map(|e| e.name).collect();
        assert_eq!(names.len(), 16);
    }

    #[test]
    fn test_templates_reference_catalog() {
        for template in TEMPLATES {
            for name in template.to_row().exercises {
                assert!(find_exercise_by_name(&name).is_some(), "{name} missing");
            }
        }
    }

    #[test]
    fn test_to_row_carries_defaults() {
        let row = find_exercise_by_name("Planche / gainage").unwrap().to_row();
        assert_eq!(row.muscle_group, "Gainage");
        assert_eq!(row.default_sets, Some(3));
        assert_eq!(row.default_reps, Some(45));
    }
}
