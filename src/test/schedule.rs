#[cfg(test)]
mod tests {
    use chrono::{Datelike, Weekday};

    use crate::schedule::{
        Granularity, Period, iso_week_number, month_grid, start_of_week_monday, week_days,
    };
    use crate::test::test_utils::{
        body_json, create_standard_test_db, date, login_test_user, setup_test_client,
    };
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    #[test]
    fn test_start_of_week_monday() {
        // Wednesday, Monday and Sunday of the same week
        assert_eq!(start_of_week_monday(date("2024-03-06")), date("2024-03-04"));
        assert_eq!(start_of_week_monday(date("2024-03-04")), date("2024-03-04"));
        assert_eq!(start_of_week_monday(date("2024-03-10")), date("2024-03-04"));
    }

    #[test]
    fn test_iso_week_numbers() {
        assert_eq!(iso_week_number(date("2024-01-01")), 1);
        assert_eq!(iso_week_number(date("2023-12-31")), 52);
        assert_eq!(iso_week_number(date("2024-03-04")), 10);
    }

    #[test]
    fn test_week_days() {
        let days = week_days(date("2024-03-06"));

        assert_eq!(days.len(), 7);
        assert_eq!(days[0], date("2024-03-04"));
        assert_eq!(days[6], date("2024-03-10"));
        for pair in days.windows(2) {
            assert_eq!(pair[1], pair[0].succ_opt().unwrap());
        }
    }

    #[test]
    fn test_month_grid_padded_to_full_weeks() {
        let grid = month_grid(date("2024-02-15"));

        assert_eq!(grid.len(), 5);
        for week in &grid {
            assert_eq!(week.len(), 7);
            assert_eq!(week[0].weekday(), Weekday::Mon);
            assert_eq!(week[6].weekday(), Weekday::Sun);
        }

        // Leading/trailing pad days come from the neighbor months
        assert_eq!(grid[0][0], date("2024-01-29"));
        assert_eq!(grid[4][6], date("2024-03-03"));

        let all_days: Vec<_> = grid.iter().flatten().collect();
        assert!(all_days.contains(&&date("2024-02-01")));
        assert!(all_days.contains(&&date("2024-02-29")));
    }

    #[test]
    fn test_period_containing() {
        let week = Period::containing(date("2024-03-06"), Granularity::Week);
        assert_eq!(week.start, date("2024-03-04"));
        assert_eq!(week.end_exclusive, date("2024-03-11"));
        assert_eq!(week.last_day(), date("2024-03-10"));

        let month = Period::containing(date("2024-02-15"), Granularity::Month);
        assert_eq!(month.start, date("2024-02-01"));
        assert_eq!(month.last_day(), date("2024-02-29"));

        let year = Period::containing(date("2024-05-05"), Granularity::Year);
        assert_eq!(year.start, date("2024-01-01"));
        assert_eq!(year.last_day(), date("2024-12-31"));
    }

    #[test]
    fn test_period_previous() {
        let week = Period::containing(date("2024-03-06"), Granularity::Week);
        let previous = week.previous(Granularity::Week);
        assert_eq!(previous.start, date("2024-02-26"));
        assert_eq!(previous.end_exclusive, week.start);

        let month = Period::containing(date("2024-03-15"), Granularity::Month);
        let previous = month.previous(Granularity::Month);
        assert_eq!(previous.start, date("2024-02-01"));
        assert_eq!(previous.last_day(), date("2024-02-29"));
    }

    #[rocket::async_test]
    async fn test_schedule_week_endpoint() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        login_test_user(&client, "athlete@example.com").await;

        let response = client
            .post("/api/workouts")
            .header(ContentType::JSON)
            .body(
                json!({
                    "workout_date": "2024-03-04",
                    "new_activity": {"name": "Yoga", "color": "#a855f7", "distance_unit": "km"},
                    "duration_hhmm": "1:00"
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .get("/api/schedule?view=week&cursor=2024-03-06")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let schedule = body_json(response).await;
        assert_eq!(schedule["view"], "week");
        assert_eq!(schedule["from"], "2024-03-04");
        assert_eq!(schedule["to"], "2024-03-10");

        let weeks = schedule["weeks"].as_array().unwrap();
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0]["iso_week"], 10);
        assert_eq!(weeks[0]["days"].as_array().unwrap().len(), 7);

        let day_workouts = schedule["workouts_by_date"]["2024-03-04"].as_array().unwrap();
        assert_eq!(day_workouts.len(), 1);
        assert_eq!(day_workouts[0]["title"], "Yoga — 60 min");
    }

    #[rocket::async_test]
    async fn test_schedule_month_endpoint() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        login_test_user(&client, "athlete@example.com").await;

        let response = client
            .get("/api/schedule?view=month&cursor=2024-02-15")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let schedule = body_json(response).await;
        assert_eq!(schedule["from"], "2024-01-29");
        assert_eq!(schedule["to"], "2024-03-03");

        let weeks = schedule["weeks"].as_array().unwrap();
        assert_eq!(weeks.len(), 5);

        // Pad days carry in_month = false
        let first_day = &weeks[0]["days"][0];
        assert_eq!(first_day["date"], "2024-01-29");
        assert_eq!(first_day["in_month"], false);

        let mid_day = &weeks[2]["days"][0];
        assert_eq!(mid_day["in_month"], true);
    }

    #[rocket::async_test]
    async fn test_schedule_rejects_year_view() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        login_test_user(&client, "athlete@example.com").await;

        let response = client.get("/api/schedule?view=year").dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);
    }
}
