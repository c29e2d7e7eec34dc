#[cfg(test)]
pub mod test_utils {
    use std::collections::HashMap;
    use std::sync::Once;

    use chrono::NaiveDate;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::{Client, LocalResponse};
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};

    use crate::db::{NewWorkout, create_user, insert_workout, upsert_activity};
    use crate::error::AppError;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    pub fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
    }

    pub struct TestUser {
        pub email: String,
        pub password: String,
    }

    pub struct TestActivity {
        pub owner_email: String,
        pub name: String,
        pub color: String,
        pub distance_unit: String,
    }

    pub struct TestWorkout {
        pub owner_email: String,
        pub activity_name: String,
        pub workout_date: NaiveDate,
        pub duration_min: Option<i64>,
        pub distance_m: Option<i64>,
    }

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        activities: Vec<TestActivity>,
        workouts: Vec<TestWorkout>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(mut self, email: &str) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn activity(
            mut self,
            owner_email: &str,
            name: &str,
            color: &str,
            distance_unit: &str,
        ) -> Self {
            self.activities.push(TestActivity {
                owner_email: owner_email.to_string(),
                name: name.to_string(),
                color: color.to_string(),
                distance_unit: distance_unit.to_string(),
            });
            self
        }

        pub fn workout(
            mut self,
            owner_email: &str,
            activity_name: &str,
            workout_date: &str,
            duration_min: Option<i64>,
            distance_m: Option<i64>,
        ) -> Self {
            self.workouts.push(TestWorkout {
                owner_email: owner_email.to_string(),
                activity_name: activity_name.to_string(),
                workout_date: date(workout_date),
                duration_min,
                distance_m,
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .is_test(true)
                    .parse_filters("debug")
                    .try_init();
            });

            // One connection so every query sees the same in-memory database
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut activity_id_map: HashMap<String, i64> = HashMap::new();
            let mut workout_ids: Vec<i64> = Vec::new();

            for user in &self.users {
                let user_id = create_user(&pool, &user.email, &user.password).await?;
                user_id_map.insert(user.email.clone(), user_id);
            }

            for activity in &self.activities {
                let owner_id = user_id_map
                    .get(&activity.owner_email)
                    .copied()
                    .expect("unknown test user for activity");

                let created = upsert_activity(
                    &pool,
                    owner_id,
                    &activity.name,
                    &activity.color,
                    &activity.distance_unit,
                )
                .await?;

                activity_id_map.insert(activity.name.clone(), created.id);
            }

            for workout in &self.workouts {
                let owner_id = user_id_map
                    .get(&workout.owner_email)
                    .copied()
                    .expect("unknown test user for workout");
                let activity_id = activity_id_map
                    .get(&workout.activity_name)
                    .copied()
                    .expect("unknown test activity for workout");

                let id = insert_workout(
                    &pool,
                    owner_id,
                    &NewWorkout {
                        workout_date: workout.workout_date,
                        activity_id,
                        title: workout.activity_name.clone(),
                        duration_min: workout.duration_min,
                        distance_m: workout.distance_m,
                        notes: None,
                        advanced: Default::default(),
                    },
                )
                .await?;

                workout_ids.push(id);
            }

            Ok(TestDb {
                pool,
                user_id_map,
                activity_id_map,
                workout_ids,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub activity_id_map: HashMap<String, i64>,
        /// Ids of builder-created workouts, in insertion order
        pub workout_ids: Vec<i64>,
    }

    impl TestDb {
        pub fn user_id(&self, email: &str) -> Option<i64> {
            self.user_id_map.get(email).copied()
        }

        pub fn activity_id(&self, name: &str) -> Option<i64> {
            self.activity_id_map.get(name).copied()
        }
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .user("athlete@example.com")
            .activity("athlete@example.com", "Course", "#22c55e", "km")
            .activity("athlete@example.com", "Vélo", "#f97316", "km")
            .activity("athlete@example.com", "Natation", "#3b82f6", "m")
            .build()
            .await
            .expect("failed to build test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = crate::init_rocket(test_db.pool.clone());
        let client = Client::tracked(rocket)
            .await
            .expect("valid rocket instance");
        (client, test_db)
    }

    pub async fn login_test_user(client: &Client, email: &str) {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": email,
                    "password": STANDARD_PASSWORD
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
    }

    pub async fn body_json(response: LocalResponse<'_>) -> serde_json::Value {
        let body = response.into_string().await.expect("response body");
        serde_json::from_str(&body).expect("JSON response body")
    }
}
