use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::profile::Profile;

static EXERCISE_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/data/exercises");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("exercise file {0} is not valid utf-8")]
    Encoding(String),
    #[error("unable to parse exercise data in {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate exercise id: {0}")]
    DuplicateId(String),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Push,
    Pull,
    Squat,
    Hinge,
    Core,
    Mobility,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MovementPattern {
    HorizontalPush,
    VerticalPush,
    HorizontalPull,
    VerticalPull,
    Squat,
    Lunge,
    HipHinge,
    CoreAntiExtension,
    CoreAntiRotation,
    CoreFlexion,
    Mobility,
    PelvicFloor,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Contraindication {
    Postpartum,
    Back,
    LowerBack,
    Knee,
    Hip,
    Shoulder,
    Wrist,
    DiastasisRecti,
}

/// One entry of the exercise catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub movement_pattern: MovementPattern,
    /// 1 = beginner, 2 = intermediate, 3 = advanced
    pub difficulty: u8,
    /// Length of one timed set in seconds
    pub duration_s: u32,
    #[serde(default)]
    pub equipment_required: bool,
    /// Only served to postpartum profiles
    #[serde(default)]
    pub postpartum_only: bool,
    #[serde(default)]
    pub contraindications: Vec<Contraindication>,
    /// Next, harder exercise in the same movement family
    #[serde(default)]
    pub progression_to: Option<String>,
    #[serde(default)]
    pub instructions: String,
}

impl Exercise {
    pub fn is_suitable_for_contraindications(&self, user_contraindications: &[Contraindication]) -> bool {
        !self
            .contraindications
            .iter()
            .any(|c| user_contraindications.contains(c))
    }

    pub fn is_suitable_for_difficulty(&self, max_difficulty: u8) -> bool {
        self.difficulty <= max_difficulty
    }

    /// Isometric and mobility work is served as timed sets, everything else as reps.
    pub fn is_timed(&self) -> bool {
        matches!(
            self.movement_pattern,
            MovementPattern::CoreAntiExtension
                | MovementPattern::CoreAntiRotation
                | MovementPattern::CoreFlexion
                | MovementPattern::PelvicFloor
                | MovementPattern::Mobility
        )
    }
}

/// Ordered exercise catalog with an id index
#[derive(Debug, Clone, Default)]
pub struct ExerciseCatalog {
    entries: Vec<Exercise>,
    index: HashMap<String, usize>,
}

impl ExerciseCatalog {
    pub fn new(entries: Vec<Exercise>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(entries.len());
        for (pos, exercise) in entries.iter().enumerate() {
            if index.insert(exercise.id.clone(), pos).is_some() {
                return Err(CatalogError::DuplicateId(exercise.id.clone()));
            }
        }
        Ok(Self { entries, index })
    }

    /// Catalog compiled into the binary from `data/exercises/*.json`
    pub fn builtin() -> Result<Self, CatalogError> {
        let mut files: Vec<_> = EXERCISE_DIR
            .files()
            .filter(|f| f.path().extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort_by(|a, b| a.path().cmp(b.path()));

        let mut entries = Vec::new();
        for file in files {
            let name = file.path().display().to_string();
            let contents = file
                .contents_utf8()
                .ok_or_else(|| CatalogError::Encoding(name.clone()))?;
            let mut parsed: Vec<Exercise> = serde_json::from_str(contents)
                .map_err(|source| CatalogError::Parse { file: name, source })?;
            entries.append(&mut parsed);
        }
        Self::new(entries)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let entries = serde_json::from_str(json).map_err(|source| CatalogError::Parse {
            file: "<inline>".to_string(),
            source,
        })?;
        Self::new(entries)
    }

    pub fn get(&self, id: &str) -> Option<&Exercise> {
        self.index.get(id).map(|&pos| &self.entries[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exercise> {
        self.entries.iter()
    }

    /// Other exercises sharing the movement pattern of `id`
    pub fn same_pattern(&self, id: &str) -> Vec<&Exercise> {
        match self.get(id) {
            Some(source) => self
                .entries
                .iter()
                .filter(|e| e.id != id && e.movement_pattern == source.movement_pattern)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Exercises that may be served to `profile`, in catalog order
    pub fn eligible_for(&self, profile: &Profile) -> Vec<&Exercise> {
        let contraindications = profile.all_contraindications();
        let max_difficulty = profile.max_difficulty();
        self.entries
            .iter()
            .filter(|e| !e.equipment_required || profile.has_equipment_anchor)
            .filter(|e| !e.postpartum_only || profile.is_postpartum)
            .filter(|e| e.is_suitable_for_contraindications(&contraindications))
            .filter(|e| e.is_suitable_for_difficulty(max_difficulty))
            .collect()
    }

    /// Copy holding only what `profile` may be served, plus the ids in `keep`
    pub fn restricted_to<'a>(&self, profile: &Profile, keep: impl IntoIterator<Item = &'a str>) -> Self {
        let mut allowed: HashSet<&str> = keep.into_iter().collect();
        allowed.extend(self.eligible_for(profile).into_iter().map(|e| e.id.as_str()));

        let entries: Vec<Exercise> = self
            .entries
            .iter()
            .filter(|e| allowed.contains(e.id.as_str()))
            .cloned()
            .collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(pos, e)| (e.id.clone(), pos))
            .collect();
        Self { entries, index }
    }

    /// Display name, falling back to the raw id for unknown entries
    pub fn name_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map(|e| e.name.as_str()).unwrap_or(id)
    }
}
