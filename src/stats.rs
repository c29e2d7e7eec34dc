use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

use crate::models::Workout;
use crate::units::minutes_to_compact;

/// Training load attributed to one activity within a period.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityLoad {
    pub activity_id: i64,
    pub name: String,
    pub color: String,
    pub minutes: i64,
    /// Compact display form of `minutes` ("45 min", "1h05")
    pub minutes_label: String,
    pub km: f64,
}

/// Planned vs. realized aggregates for one period.
///
/// "Done" sums use `actual_*` values only: a completed workout whose actual
/// fields were left empty contributes nothing to the realized totals.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodStats {
    pub planned_sessions: usize,
    pub done_sessions: usize,

    pub planned_min: i64,
    pub planned_km: f64,
    pub done_min: i64,
    pub done_km: f64,

    pub avg_planned_min: f64,
    pub avg_done_min: f64,

    pub by_activity_planned: Vec<ActivityLoad>,
    pub by_activity_done: Vec<ActivityLoad>,

    pub busiest_day: Option<NaiveDate>,
    pub busiest_day_min: i64,

    pub main_sport_planned: Option<String>,
    pub main_sport_done: Option<String>,
}

impl PeriodStats {
    pub fn compute(workouts: &[Workout]) -> Self {
        let planned_sessions = workouts.len();
        let done_sessions = workouts.iter().filter(|w| w.done).count();

        let mut planned_min = 0i64;
        let mut planned_km = 0f64;
        let mut done_min = 0i64;
        let mut done_km = 0f64;

        let mut by_act_planned: HashMap<i64, ActivityLoad> = HashMap::new();
        let mut by_act_done: HashMap<i64, ActivityLoad> = HashMap::new();
        let mut by_day_done_min: HashMap<NaiveDate, i64> = HashMap::new();

        for w in workouts {
            let p_min = w.duration_min.unwrap_or(0);
            let p_km = w.distance_m.map(|m| m as f64 / 1000.0).unwrap_or(0.0);

            planned_min += p_min;
            planned_km += p_km;

            let entry = by_act_planned
                .entry(w.activity.id)
                .or_insert_with(|| ActivityLoad {
                    activity_id: w.activity.id,
                    name: w.activity.name.clone(),
                    color: w.activity.color.clone(),
                    minutes: 0,
                    minutes_label: String::new(),
                    km: 0.0,
                });
            entry.minutes += p_min;
            entry.km += p_km;

            if w.done {
                let r_min = w.actual_duration_min.unwrap_or(0);
                let r_km = w
                    .actual_distance_m
                    .map(|m| m as f64 / 1000.0)
                    .unwrap_or(0.0);

                done_min += r_min;
                done_km += r_km;

                let entry = by_act_done
                    .entry(w.activity.id)
                    .or_insert_with(|| ActivityLoad {
                        activity_id: w.activity.id,
                        name: w.activity.name.clone(),
                        color: w.activity.color.clone(),
                        minutes: 0,
                        minutes_label: String::new(),
                        km: 0.0,
                    });
                entry.minutes += r_min;
                entry.km += r_km;

                *by_day_done_min.entry(w.workout_date).or_insert(0) += r_min;
            }
        }

        let avg_planned_min = if planned_sessions > 0 {
            planned_min as f64 / planned_sessions as f64
        } else {
            0.0
        };
        let avg_done_min = if done_sessions > 0 {
            done_min as f64 / done_sessions as f64
        } else {
            0.0
        };

        let mut by_activity_planned: Vec<ActivityLoad> = by_act_planned.into_values().collect();
        by_activity_planned.sort_by(|a, b| b.minutes.cmp(&a.minutes));

        let mut by_activity_done: Vec<ActivityLoad> = by_act_done.into_values().collect();
        by_activity_done.sort_by(|a, b| b.minutes.cmp(&a.minutes));

        for load in by_activity_planned.iter_mut().chain(by_activity_done.iter_mut()) {
            load.minutes_label = minutes_to_compact(Some(load.minutes));
        }

        // Ties resolved by earliest date so the answer is stable
        let busiest = by_day_done_min
            .into_iter()
            .max_by(|(d1, m1), (d2, m2)| m1.cmp(m2).then(d2.cmp(d1)));

        Self {
            planned_sessions,
            done_sessions,
            planned_min,
            planned_km,
            done_min,
            done_km,
            avg_planned_min,
            avg_done_min,
            main_sport_planned: by_activity_planned.first().map(|a| a.name.clone()),
            main_sport_done: by_activity_done.first().map(|a| a.name.clone()),
            by_activity_planned,
            by_activity_done,
            busiest_day: busiest.map(|(d, _)| d),
            busiest_day_min: busiest.map(|(_, m)| m).unwrap_or(0),
        }
    }
}

/// Period-over-period change in percent. A previous value of zero maps to
/// +100% when the current value is positive and 0% when both are zero, so a
/// first week of training never divides by zero.
pub fn pct_delta(current: f64, previous: f64) -> f64 {
    if previous <= 0.0 {
        if current > 0.0 { 100.0 } else { 0.0 }
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Percentage deltas between two periods, one per headline stat.
#[derive(Debug, Clone, Serialize)]
pub struct StatsDelta {
    pub planned_min_pct: f64,
    pub done_min_pct: f64,
    pub planned_km_pct: f64,
    pub done_km_pct: f64,
    pub planned_sessions_pct: f64,
    pub done_sessions_pct: f64,
}

impl StatsDelta {
    pub fn between(current: &PeriodStats, previous: &PeriodStats) -> Self {
        Self {
            planned_min_pct: pct_delta(current.planned_min as f64, previous.planned_min as f64),
            done_min_pct: pct_delta(current.done_min as f64, previous.done_min as f64),
            planned_km_pct: pct_delta(current.planned_km, previous.planned_km),
            done_km_pct: pct_delta(current.done_km, previous.done_km),
            planned_sessions_pct: pct_delta(
                current.planned_sessions as f64,
                previous.planned_sessions as f64,
            ),
            done_sessions_pct: pct_delta(
                current.done_sessions as f64,
                previous.done_sessions as f64,
            ),
        }
    }
}
