#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod db;
mod error;
mod models;
mod reorder;
mod schedule;
mod stats;
mod telemetry;
mod units;
mod validation;

#[cfg(test)]
mod test;

use std::time::Duration;

use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use tracing::warn;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

pub fn init_rocket(pool: SqlitePool) -> Rocket<Build> {
    rocket::build()
        .manage(pool)
        .mount(
            "/api",
            routes![
                api::api_signup,
                api::api_login,
                api::api_logout,
                api::api_me,
                api::api_me_unauthorized,
                api::api_get_profile,
                api::api_put_profile,
                api::api_get_activities,
                api::api_create_activity,
                api::api_upsert_activity,
                api::api_update_activity,
                api::api_delete_activity,
                api::api_get_workouts,
                api::api_create_workout,
                api::api_update_workout,
                api::api_delete_workout,
                api::api_mark_workout_done,
                api::api_mark_workout_undone,
                api::api_move_workout,
                api::api_get_schedule,
                api::api_get_stats,
                api::health,
            ],
        )
        .register("/api", catchers![auth::authentication::unauthorized_api])
        .attach(telemetry::TelemetryFairing)
        .attach(AdHoc::on_shutdown("Flush telemetry", |_| {
            Box::pin(async {
                telemetry::shutdown_telemetry();
            })
        }))
}

#[launch]
async fn rocket() -> _ {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://training-planner.db?mode=rwc".to_string());

    let pool = SqlitePool::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let sweeper_pool = pool.clone();
    rocket::tokio::spawn(async move {
        let mut interval = rocket::tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(err) = db::clean_expired_sessions(&sweeper_pool).await {
                warn!(error = %err, "Failed to clean expired sessions");
            }
        }
    });

    init_rocket(pool)
}
