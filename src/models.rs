use anyhow::Error;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Unit an activity's distances are entered and displayed in. Distances are
/// always persisted in meters regardless of the display unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    Km,
    M,
}

impl DistanceUnit {
    pub fn as_str(&self) -> &str {
        match self {
            DistanceUnit::Km => "km",
            DistanceUnit::M => "m",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "km" => Ok(DistanceUnit::Km),
            "m" => Ok(DistanceUnit::M),
            _ => Err(Error::msg(format!("Unknown distance unit: {}", s))),
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Activity {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub color: String,
    pub distance_unit: DistanceUnit,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbActivity {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub name: Option<String>,
    pub color: Option<String>,
    pub distance_unit: Option<String>,
}

impl From<DbActivity> for Activity {
    fn from(row: DbActivity) -> Self {
        Self {
            id: row.id.unwrap_or_default(),
            user_id: row.user_id.unwrap_or_default(),
            name: row.name.unwrap_or_default(),
            color: row.color.unwrap_or_default(),
            distance_unit: row
                .distance_unit
                .as_deref()
                .and_then(|s| DistanceUnit::from_str(s).ok())
                .unwrap_or_default(),
        }
    }
}

/// Free-form per-workout metrics. Known keys are typed; anything else the
/// client stores rides along in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvancedMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpe: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_hr: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_m: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AdvancedMetrics {
    pub fn from_json(raw: Option<&str>) -> Self {
        raw.and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }
}

/// Denormalized activity fields for display and aggregation
#[derive(Debug, Serialize, Clone)]
pub struct ActivitySummary {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub distance_unit: DistanceUnit,
}

#[derive(Debug, Serialize, Clone)]
pub struct Workout {
    pub id: i64,
    pub user_id: i64,
    pub workout_date: NaiveDate,
    pub position: i64,
    pub activity: ActivitySummary,
    pub title: String,
    pub duration_min: Option<i64>,
    pub distance_m: Option<i64>,
    pub notes: Option<String>,
    pub advanced: AdvancedMetrics,
    pub done: bool,
    pub done_at: Option<DateTime<Utc>>,
    pub actual_duration_min: Option<i64>,
    pub actual_distance_m: Option<i64>,
    pub actual_notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbWorkout {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub workout_date: Option<NaiveDate>,
    pub position: Option<i64>,
    pub activity_id: Option<i64>,
    pub activity_name: Option<String>,
    pub activity_color: Option<String>,
    pub activity_unit: Option<String>,
    pub title: Option<String>,
    pub duration_min: Option<i64>,
    pub distance_m: Option<i64>,
    pub notes: Option<String>,
    pub advanced: Option<String>,
    pub done: Option<bool>,
    pub done_at: Option<NaiveDateTime>,
    pub actual_duration_min: Option<i64>,
    pub actual_distance_m: Option<i64>,
    pub actual_notes: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbWorkout> for Workout {
    fn from(row: DbWorkout) -> Self {
        Self {
            id: row.id.unwrap_or_default(),
            user_id: row.user_id.unwrap_or_default(),
            workout_date: row.workout_date.unwrap_or_default(),
            position: row.position.unwrap_or_default(),
            activity: ActivitySummary {
                id: row.activity_id.unwrap_or_default(),
                name: row.activity_name.unwrap_or_default(),
                color: row.activity_color.unwrap_or_default(),
                distance_unit: row
                    .activity_unit
                    .as_deref()
                    .and_then(|s| DistanceUnit::from_str(s).ok())
                    .unwrap_or_default(),
            },
            title: row.title.unwrap_or_default(),
            duration_min: row.duration_min,
            distance_m: row.distance_m,
            notes: row.notes,
            advanced: AdvancedMetrics::from_json(row.advanced.as_deref()),
            done: row.done.unwrap_or_default(),
            done_at: row
                .done_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc)),
            actual_duration_min: row.actual_duration_min,
            actual_distance_m: row.actual_distance_m,
            actual_notes: row.actual_notes,
            updated_at: row
                .updated_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
                .unwrap_or_else(Utc::now),
        }
    }
}

/// Planning preferences stored as a JSON column on the profile row, kept
/// open-ended for forward compatibility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningPrefs {
    #[serde(default)]
    pub available_days: Vec<String>,
    #[serde(default)]
    pub weekly_target_hours: f64,
    #[serde(default)]
    pub weekly_target_km: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_day: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct Profile {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub age: Option<i64>,
    pub objective: String,
    pub sports: Vec<String>,
    pub planning_prefs: PlanningPrefs,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbProfile {
    pub user_id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i64>,
    pub objective: Option<String>,
    pub sports: Option<String>,
    pub planning_prefs: Option<String>,
}

impl From<DbProfile> for Profile {
    fn from(row: DbProfile) -> Self {
        Self {
            user_id: row.user_id.unwrap_or_default(),
            first_name: row.first_name.unwrap_or_default(),
            last_name: row.last_name.unwrap_or_default(),
            age: row.age,
            objective: row.objective.unwrap_or_else(|| "forme".to_string()),
            sports: row
                .sports
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or_default(),
            planning_prefs: row
                .planning_prefs
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or_default(),
        }
    }
}
