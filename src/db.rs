use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{DbUser, DbUserSession, User, UserSession};
use crate::error::AppError;
use crate::models::{
    Activity, AdvancedMetrics, DbActivity, DbProfile, DbWorkout, PlanningPrefs, Profile, Workout,
};

const WORKOUT_COLUMNS: &str = "w.id, w.user_id, w.workout_date, w.position, w.activity_id, \
     a.name AS activity_name, a.color AS activity_color, a.distance_unit AS activity_unit, \
     w.title, w.duration_min, w.distance_m, w.notes, w.advanced, w.done, w.done_at, \
     w.actual_duration_min, w.actual_distance_m, w.actual_notes, w.updated_at";

/* ---------------- users & sessions ---------------- */

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    let row = sqlx::query_as::<_, DbUser>("SELECT id, email FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_user_by_email(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, DbUser>("SELECT id, email FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(User::from))
}

#[instrument(skip_all, fields(email))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<i64, AppError> {
    info!("Creating new user");

    if find_user_by_email(pool, email).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Email '{}' is already registered",
            email
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query("INSERT INTO users (email, password) VALUES (?, ?)")
        .bind(email)
        .bind(hashed_password)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: i64,
    email: String,
    password: String,
}

#[instrument(skip_all, fields(email))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let row =
        sqlx::query_as::<_, CredentialRow>("SELECT id, email, password FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await?;

    match row {
        Some(row) => match bcrypt::verify(password, &row.password) {
            Ok(true) => Ok(Some(User {
                id: row.id,
                email: row.email,
            })),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query("INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, user_id, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/* ---------------- profiles ---------------- */

#[instrument]
pub async fn get_profile(pool: &Pool<Sqlite>, user_id: i64) -> Result<Option<Profile>, AppError> {
    let row = sqlx::query_as::<_, DbProfile>(
        "SELECT user_id, first_name, last_name, age, objective, sports, planning_prefs
         FROM profiles WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Profile::from))
}

#[instrument(skip(pool, sports, planning_prefs))]
pub async fn upsert_profile(
    pool: &Pool<Sqlite>,
    user_id: i64,
    first_name: &str,
    last_name: &str,
    age: Option<i64>,
    objective: &str,
    sports: &[String],
    planning_prefs: &PlanningPrefs,
) -> Result<Profile, AppError> {
    info!("Upserting profile");

    let sports_json = serde_json::to_string(sports)?;
    let prefs_json = serde_json::to_string(planning_prefs)?;

    let row = sqlx::query_as::<_, DbProfile>(
        "INSERT INTO profiles (user_id, first_name, last_name, age, objective, sports, planning_prefs)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (user_id) DO UPDATE SET
             first_name = excluded.first_name,
             last_name = excluded.last_name,
             age = excluded.age,
             objective = excluded.objective,
             sports = excluded.sports,
             planning_prefs = excluded.planning_prefs
         RETURNING user_id, first_name, last_name, age, objective, sports, planning_prefs",
    )
    .bind(user_id)
    .bind(first_name)
    .bind(last_name)
    .bind(age)
    .bind(objective)
    .bind(sports_json)
    .bind(prefs_json)
    .fetch_one(pool)
    .await?;

    Ok(Profile::from(row))
}

/* ---------------- activities ---------------- */

#[instrument]
pub async fn get_activities(pool: &Pool<Sqlite>, user_id: i64) -> Result<Vec<Activity>, AppError> {
    let rows = sqlx::query_as::<_, DbActivity>(
        "SELECT id, user_id, name, color, distance_unit
         FROM activities WHERE user_id = ? ORDER BY name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Activity::from).collect())
}

#[instrument]
pub async fn get_activity(
    pool: &Pool<Sqlite>,
    user_id: i64,
    id: i64,
) -> Result<Activity, AppError> {
    let row = sqlx::query_as::<_, DbActivity>(
        "SELECT id, user_id, name, color, distance_unit
         FROM activities WHERE id = ? AND user_id = ?",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(activity) => Ok(Activity::from(activity)),
        _ => Err(AppError::NotFound(format!("Activity {} not found", id))),
    }
}

#[instrument]
pub async fn create_activity(
    pool: &Pool<Sqlite>,
    user_id: i64,
    name: &str,
    color: &str,
    distance_unit: &str,
) -> Result<i64, AppError> {
    info!("Creating activity");

    let res = sqlx::query(
        "INSERT INTO activities (user_id, name, color, distance_unit) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(name)
    .bind(color)
    .bind(distance_unit)
    .execute(pool)
    .await;

    match res {
        Ok(res) => Ok(res.last_insert_rowid()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
            AppError::Conflict(format!("Activity '{}' already exists", name)),
        ),
        Err(err) => Err(err.into()),
    }
}

/// Inline-create path of the workout form: keyed on (user_id, name), an
/// existing activity gets its color and unit overwritten.
#[instrument]
pub async fn upsert_activity(
    pool: &Pool<Sqlite>,
    user_id: i64,
    name: &str,
    color: &str,
    distance_unit: &str,
) -> Result<Activity, AppError> {
    info!("Upserting activity");

    let row = sqlx::query_as::<_, DbActivity>(
        "INSERT INTO activities (user_id, name, color, distance_unit) VALUES (?, ?, ?, ?)
         ON CONFLICT (user_id, name) DO UPDATE SET
             color = excluded.color,
             distance_unit = excluded.distance_unit
         RETURNING id, user_id, name, color, distance_unit",
    )
    .bind(user_id)
    .bind(name)
    .bind(color)
    .bind(distance_unit)
    .fetch_one(pool)
    .await?;

    Ok(Activity::from(row))
}

#[instrument]
pub async fn update_activity(
    pool: &Pool<Sqlite>,
    user_id: i64,
    id: i64,
    name: &str,
    color: &str,
    distance_unit: &str,
) -> Result<(), AppError> {
    info!("Updating activity");

    let res = sqlx::query(
        "UPDATE activities SET name = ?, color = ?, distance_unit = ?
         WHERE id = ? AND user_id = ?",
    )
    .bind(name)
    .bind(color)
    .bind(distance_unit)
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await;

    match res {
        Ok(res) if res.rows_affected() == 0 => {
            Err(AppError::NotFound(format!("Activity {} not found", id)))
        }
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
            AppError::Conflict(format!("Activity '{}' already exists", name)),
        ),
        Err(err) => Err(err.into()),
    }
}

#[instrument]
pub async fn delete_activity(pool: &Pool<Sqlite>, user_id: i64, id: i64) -> Result<(), AppError> {
    info!("Deleting activity");

    let referencing: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM workouts WHERE activity_id = ? AND user_id = ?",
    )
    .bind(id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    if referencing > 0 {
        return Err(AppError::Conflict(format!(
            "Activity {} still has {} workouts",
            id, referencing
        )));
    }

    let res = sqlx::query("DELETE FROM activities WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Activity {} not found", id)));
    }

    Ok(())
}

/// First-login seed: the starter set the onboarding flow expects.
#[instrument]
pub async fn ensure_default_activities(pool: &Pool<Sqlite>, user_id: i64) -> Result<(), AppError> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activities WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    if existing > 0 {
        return Ok(());
    }

    info!("Seeding default activities");
    for (name, color, unit) in [
        ("Course", "#22c55e", "km"),
        ("Vélo", "#f97316", "km"),
        ("Natation", "#3b82f6", "m"),
    ] {
        sqlx::query("INSERT INTO activities (user_id, name, color, distance_unit) VALUES (?, ?, ?, ?)")
            .bind(user_id)
            .bind(name)
            .bind(color)
            .bind(unit)
            .execute(pool)
            .await?;
    }

    Ok(())
}

/* ---------------- workouts ---------------- */

#[instrument]
pub async fn get_workouts_range(
    pool: &Pool<Sqlite>,
    user_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Workout>, AppError> {
    let sql = format!(
        "SELECT {WORKOUT_COLUMNS}
         FROM workouts w JOIN activities a ON a.id = w.activity_id
         WHERE w.user_id = ? AND w.workout_date >= ? AND w.workout_date <= ?
         ORDER BY w.workout_date, w.position"
    );

    let rows = sqlx::query_as::<_, DbWorkout>(&sql)
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Workout::from).collect())
}

#[instrument]
pub async fn get_workout(pool: &Pool<Sqlite>, user_id: i64, id: i64) -> Result<Workout, AppError> {
    let sql = format!(
        "SELECT {WORKOUT_COLUMNS}
         FROM workouts w JOIN activities a ON a.id = w.activity_id
         WHERE w.id = ? AND w.user_id = ?"
    );

    let row = sqlx::query_as::<_, DbWorkout>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(workout) => Ok(Workout::from(workout)),
        _ => Err(AppError::NotFound(format!("Workout {} not found", id))),
    }
}

/// Ordered workout ids of one day, the lists the reorder engine works over.
#[instrument]
pub async fn day_workout_ids(
    pool: &Pool<Sqlite>,
    user_id: i64,
    date: NaiveDate,
) -> Result<Vec<i64>, AppError> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM workouts WHERE user_id = ? AND workout_date = ? ORDER BY position",
    )
    .bind(user_id)
    .bind(date)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

pub struct NewWorkout {
    pub workout_date: NaiveDate,
    pub activity_id: i64,
    pub title: String,
    pub duration_min: Option<i64>,
    pub distance_m: Option<i64>,
    pub notes: Option<String>,
    pub advanced: AdvancedMetrics,
}

#[instrument(skip(pool, workout))]
pub async fn insert_workout(
    pool: &Pool<Sqlite>,
    user_id: i64,
    workout: &NewWorkout,
) -> Result<i64, AppError> {
    info!("Creating workout");

    // Append at the end of the day, keeping positions dense
    let position: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM workouts WHERE user_id = ? AND workout_date = ?")
            .bind(user_id)
            .bind(workout.workout_date)
            .fetch_one(pool)
            .await?;

    let advanced_json = serde_json::to_string(&workout.advanced)?;
    let now = Utc::now().naive_utc();

    let res = sqlx::query(
        "INSERT INTO workouts
             (user_id, workout_date, position, activity_id, title,
              duration_min, distance_m, notes, advanced, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(workout.workout_date)
    .bind(position)
    .bind(workout.activity_id)
    .bind(&workout.title)
    .bind(workout.duration_min)
    .bind(workout.distance_m)
    .bind(&workout.notes)
    .bind(advanced_json)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, title, notes, advanced))]
pub async fn update_workout(
    pool: &Pool<Sqlite>,
    user_id: i64,
    id: i64,
    activity_id: i64,
    title: &str,
    duration_min: Option<i64>,
    distance_m: Option<i64>,
    notes: Option<&str>,
    advanced: &AdvancedMetrics,
) -> Result<(), AppError> {
    info!("Updating workout");

    let advanced_json = serde_json::to_string(advanced)?;
    let now = Utc::now().naive_utc();

    let res = sqlx::query(
        "UPDATE workouts
         SET activity_id = ?, title = ?, duration_min = ?, distance_m = ?,
             notes = ?, advanced = ?, updated_at = ?
         WHERE id = ? AND user_id = ?",
    )
    .bind(activity_id)
    .bind(title)
    .bind(duration_min)
    .bind(distance_m)
    .bind(notes)
    .bind(advanced_json)
    .bind(now)
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Workout {} not found", id)));
    }

    Ok(())
}

#[instrument]
pub async fn delete_workout(pool: &Pool<Sqlite>, user_id: i64, id: i64) -> Result<(), AppError> {
    info!("Deleting workout");

    let date: Option<NaiveDate> =
        sqlx::query_scalar("SELECT workout_date FROM workouts WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    let Some(date) = date else {
        return Err(AppError::NotFound(format!("Workout {} not found", id)));
    };

    sqlx::query("DELETE FROM workouts WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    reindex_day(pool, user_id, date).await?;

    Ok(())
}

/// Rewrites one day's positions to a dense 0-based sequence in display order.
#[instrument]
pub async fn reindex_day(
    pool: &Pool<Sqlite>,
    user_id: i64,
    date: NaiveDate,
) -> Result<(), AppError> {
    let ids = day_workout_ids(pool, user_id, date).await?;

    for (position, id) in ids.iter().enumerate() {
        sqlx::query("UPDATE workouts SET position = ? WHERE id = ? AND user_id = ?")
            .bind(position as i64)
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// One row update of a move plan. Each call is independently atomic; a
/// multi-row move is not (recovery after partial failure is a range reload).
#[instrument]
pub async fn update_workout_slot(
    pool: &Pool<Sqlite>,
    user_id: i64,
    id: i64,
    date: NaiveDate,
    position: i64,
) -> Result<(), AppError> {
    let now = Utc::now().naive_utc();

    let res = sqlx::query(
        "UPDATE workouts SET workout_date = ?, position = ?, updated_at = ?
         WHERE id = ? AND user_id = ?",
    )
    .bind(date)
    .bind(position)
    .bind(now)
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Workout {} not found", id)));
    }

    Ok(())
}

#[instrument(skip(pool, actual_notes))]
pub async fn set_workout_done(
    pool: &Pool<Sqlite>,
    user_id: i64,
    id: i64,
    actual_duration_min: Option<i64>,
    actual_distance_m: Option<i64>,
    actual_notes: Option<&str>,
) -> Result<(), AppError> {
    info!("Marking workout done");

    let now = Utc::now().naive_utc();

    let res = sqlx::query(
        "UPDATE workouts
         SET done = 1, done_at = ?, actual_duration_min = ?, actual_distance_m = ?,
             actual_notes = ?, updated_at = ?
         WHERE id = ? AND user_id = ?",
    )
    .bind(now)
    .bind(actual_duration_min)
    .bind(actual_distance_m)
    .bind(actual_notes)
    .bind(now)
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Workout {} not found", id)));
    }

    Ok(())
}

#[instrument]
pub async fn set_workout_undone(
    pool: &Pool<Sqlite>,
    user_id: i64,
    id: i64,
) -> Result<(), AppError> {
    info!("Clearing workout done status");

    let now = Utc::now().naive_utc();

    let res = sqlx::query(
        "UPDATE workouts
         SET done = 0, done_at = NULL, actual_duration_min = NULL,
             actual_distance_m = NULL, actual_notes = NULL, updated_at = ?
         WHERE id = ? AND user_id = ?",
    )
    .bind(now)
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Workout {} not found", id)));
    }

    Ok(())
}
