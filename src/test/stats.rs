#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::db::set_workout_done;
    use crate::models::{ActivitySummary, AdvancedMetrics, DistanceUnit, Workout};
    use crate::stats::{PeriodStats, StatsDelta, pct_delta};
    use crate::test::test_utils::{
        TestDbBuilder, body_json, date, login_test_user, setup_test_client,
    };
    use rocket::http::Status;

    fn summary(id: i64, name: &str) -> ActivitySummary {
        ActivitySummary {
            id,
            name: name.to_string(),
            color: "#22c55e".to_string(),
            distance_unit: DistanceUnit::Km,
        }
    }

    fn planned(
        id: i64,
        day: &str,
        activity: (i64, &str),
        duration_min: Option<i64>,
        distance_m: Option<i64>,
    ) -> Workout {
        Workout {
            id,
            user_id: 1,
            workout_date: date(day),
            position: 0,
            activity: summary(activity.0, activity.1),
            title: String::new(),
            duration_min,
            distance_m,
            notes: None,
            advanced: AdvancedMetrics::default(),
            done: false,
            done_at: None,
            actual_duration_min: None,
            actual_distance_m: None,
            actual_notes: None,
            updated_at: Utc::now(),
        }
    }

    fn done(
        id: i64,
        day: &str,
        activity: (i64, &str),
        planned_min: Option<i64>,
        actual_min: Option<i64>,
        actual_m: Option<i64>,
    ) -> Workout {
        let mut workout = planned(id, day, activity, planned_min, None);
        workout.done = true;
        workout.done_at = Some(Utc::now());
        workout.actual_duration_min = actual_min;
        workout.actual_distance_m = actual_m;
        workout
    }

    #[test]
    fn test_pct_delta_edges() {
        assert_eq!(pct_delta(0.0, 0.0), 0.0);
        assert_eq!(pct_delta(5.0, 0.0), 100.0);
        assert_eq!(pct_delta(15.0, 10.0), 50.0);
        assert_eq!(pct_delta(5.0, 10.0), -50.0);
        assert_eq!(pct_delta(0.0, 10.0), -100.0);
    }

    #[test]
    fn test_compute_planned_totals() {
        let workouts = vec![
            planned(1, "2024-03-04", (1, "Course"), Some(60), Some(10000)),
            planned(2, "2024-03-05", (1, "Course"), Some(30), None),
            planned(3, "2024-03-06", (2, "Vélo"), None, Some(25000)),
        ];

        let stats = PeriodStats::compute(&workouts);

        assert_eq!(stats.planned_sessions, 3);
        assert_eq!(stats.planned_min, 90);
        assert_eq!(stats.planned_km, 35.0);
        assert_eq!(stats.avg_planned_min, 30.0);
        assert_eq!(stats.done_sessions, 0);
        assert_eq!(stats.done_min, 0);
        assert!(stats.busiest_day.is_none());
    }

    #[test]
    fn test_done_sums_use_actuals_only() {
        // Completed without actuals recorded: counts as a session, adds nothing
        let workouts = vec![
            done(1, "2024-03-04", (1, "Course"), Some(60), None, None),
            done(2, "2024-03-05", (1, "Course"), Some(60), Some(50), Some(9000)),
        ];

        let stats = PeriodStats::compute(&workouts);

        assert_eq!(stats.done_sessions, 2);
        assert_eq!(stats.done_min, 50);
        assert_eq!(stats.done_km, 9.0);
        assert_eq!(stats.avg_done_min, 25.0);
        assert_eq!(stats.planned_min, 120);
    }

    #[test]
    fn test_by_activity_ordering_and_main_sport() {
        let workouts = vec![
            planned(1, "2024-03-04", (1, "Course"), Some(30), None),
            planned(2, "2024-03-05", (2, "Vélo"), Some(120), None),
            done(3, "2024-03-06", (1, "Course"), Some(60), Some(60), None),
            done(4, "2024-03-07", (2, "Vélo"), Some(45), Some(20), None),
        ];

        let stats = PeriodStats::compute(&workouts);

        // Planned: Vélo 165 min vs Course 90 min
        assert_eq!(stats.by_activity_planned[0].name, "Vélo");
        assert_eq!(stats.by_activity_planned[0].minutes, 165);
        assert_eq!(stats.by_activity_planned[0].minutes_label, "2h45");
        assert_eq!(stats.main_sport_planned.as_deref(), Some("Vélo"));

        // Done: Course 60 min vs Vélo 20 min
        assert_eq!(stats.by_activity_done[0].name, "Course");
        assert_eq!(stats.by_activity_done[1].minutes_label, "20 min");
        assert_eq!(stats.main_sport_done.as_deref(), Some("Course"));
    }

    #[test]
    fn test_busiest_day() {
        let workouts = vec![
            done(1, "2024-03-04", (1, "Course"), None, Some(30), None),
            done(2, "2024-03-06", (1, "Course"), None, Some(20), None),
            done(3, "2024-03-06", (1, "Course"), None, Some(30), None),
        ];

        let stats = PeriodStats::compute(&workouts);
        assert_eq!(stats.busiest_day, Some(date("2024-03-06")));
        assert_eq!(stats.busiest_day_min, 50);
    }

    #[test]
    fn test_busiest_day_tie_prefers_earliest() {
        let workouts = vec![
            done(1, "2024-03-08", (1, "Course"), None, Some(40), None),
            done(2, "2024-03-04", (1, "Course"), None, Some(40), None),
        ];

        let stats = PeriodStats::compute(&workouts);
        assert_eq!(stats.busiest_day, Some(date("2024-03-04")));
    }

    #[test]
    fn test_stats_delta() {
        let current = PeriodStats::compute(&[
            planned(1, "2024-03-04", (1, "Course"), Some(90), None),
        ]);
        let previous = PeriodStats::compute(&[
            planned(2, "2024-02-26", (1, "Course"), Some(45), None),
        ]);

        let delta = StatsDelta::between(&current, &previous);
        assert_eq!(delta.planned_min_pct, 100.0);
        assert_eq!(delta.planned_sessions_pct, 0.0);
        // No realized load on either side
        assert_eq!(delta.done_min_pct, 0.0);
    }

    #[rocket::async_test]
    async fn test_stats_endpoint() {
        let test_db = TestDbBuilder::new()
            .user("athlete@example.com")
            .activity("athlete@example.com", "Course", "#22c55e", "km")
            // Current week (cursor 2024-03-06)
            .workout("athlete@example.com", "Course", "2024-03-04", Some(60), Some(10000))
            .workout("athlete@example.com", "Course", "2024-03-06", Some(30), None)
            // Previous week
            .workout("athlete@example.com", "Course", "2024-02-26", Some(45), Some(8000))
            .build()
            .await
            .expect("test db");

        let user_id = test_db.user_id("athlete@example.com").unwrap();

        // Realize one current workout and the previous one
        set_workout_done(
            &test_db.pool,
            user_id,
            test_db.workout_ids[0],
            Some(50),
            Some(9000),
            None,
        )
        .await
        .unwrap();
        set_workout_done(
            &test_db.pool,
            user_id,
            test_db.workout_ids[2],
            Some(100),
            Some(8000),
            None,
        )
        .await
        .unwrap();

        let (client, _) = setup_test_client(test_db).await;
        login_test_user(&client, "athlete@example.com").await;

        let response = client
            .get("/api/stats?view=week&cursor=2024-03-06")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let stats = body_json(response).await;
        assert_eq!(stats["from"], "2024-03-04");
        assert_eq!(stats["to"], "2024-03-10");

        assert_eq!(stats["current"]["planned_sessions"], 2);
        assert_eq!(stats["current"]["planned_min"], 90);
        assert_eq!(stats["current"]["done_sessions"], 1);
        assert_eq!(stats["current"]["done_min"], 50);
        assert_eq!(stats["current"]["done_km"], 9.0);
        assert_eq!(stats["current"]["by_activity_done"][0]["minutes_label"], "50 min");
        assert_eq!(stats["current"]["busiest_day"], "2024-03-04");

        assert_eq!(stats["previous"]["planned_min"], 45);
        assert_eq!(stats["previous"]["done_min"], 100);

        // (90 - 45) / 45 and (50 - 100) / 100
        assert_eq!(stats["delta"]["planned_min_pct"], 100.0);
        assert_eq!(stats["delta"]["done_min_pct"], -50.0);
    }
}
