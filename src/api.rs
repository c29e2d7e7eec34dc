use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use rocket::State;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{SESSION_TOKEN_COOKIE, User, UserSession};
use crate::db::{
    NewWorkout, authenticate_user, create_activity, create_user, create_user_session,
    day_workout_ids, delete_activity, delete_workout, ensure_default_activities,
    get_activities, get_activity, get_profile, get_workout, get_workouts_range, insert_workout,
    invalidate_session, set_workout_done, set_workout_undone, update_activity, update_workout,
    update_workout_slot, upsert_activity, upsert_profile,
};
use crate::error::AppError;
use crate::models::{Activity, AdvancedMetrics, DistanceUnit, PlanningPrefs, Profile, Workout};
use crate::reorder::plan_move;
use crate::schedule::{Granularity, Period, iso_week_number, month_grid, week_days};
use crate::stats::{PeriodStats, StatsDelta};
use crate::units::{auto_title, display_to_meters, hhmm_to_minutes};
use crate::validation::{AppErrorExt, JsonValidateExt, ToValidationResponse, ValidationResponse};

const SESSION_HOURS: i64 = 24;

/* ---------------- auth ---------------- */

#[derive(Deserialize, Validate, Clone)]
pub struct SignupRequest {
    #[validate(email(message = "A valid email address is required"))]
    email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "A valid email address is required"))]
    email: String,
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
    pub redirect_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: i64,
    pub email: String,
    pub has_profile: bool,
}

async fn open_session(
    db: &Pool<Sqlite>,
    cookies: &CookieJar<'_>,
    user: &User,
) -> Result<(), AppError> {
    let token = UserSession::generate_token();
    let expires_at = Utc::now() + chrono::Duration::hours(SESSION_HOURS);

    create_user_session(db, user.id, &token, expires_at.naive_utc()).await?;

    cookies.add_private(
        Cookie::build((SESSION_TOKEN_COOKIE, token))
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(rocket::time::Duration::hours(SESSION_HOURS)),
    );

    cookies.add_private(
        Cookie::build(("logged_in", user.email.clone()))
            .same_site(SameSite::Lax)
            .max_age(rocket::time::Duration::hours(SESSION_HOURS)),
    );

    Ok(())
}

/// Unauthenticated users land on the login page; users without a profile are
/// sent through onboarding first.
fn post_login_redirect(has_profile: bool) -> String {
    if has_profile {
        "/dashboard".to_string()
    } else {
        "/onboarding".to_string()
    }
}

#[post("/signup", data = "<signup>")]
pub async fn api_signup(
    signup: Json<SignupRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LoginResponse>, Custom<Json<ValidationResponse>>> {
    let validated = signup.validate_custom()?;

    let user_id = create_user(db, &validated.email, &validated.password)
        .await
        .validate_custom()?;

    let user = User {
        id: user_id,
        email: validated.email,
    };

    ensure_default_activities(db, user.id).await.validate_custom()?;
    open_session(db, cookies, &user).await.validate_custom()?;

    Ok(Json(LoginResponse {
        success: true,
        user: Some(UserData {
            id: user.id,
            email: user.email,
            has_profile: false,
        }),
        error: None,
        redirect_url: Some(post_login_redirect(false)),
    }))
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LoginResponse>, Custom<Json<ValidationResponse>>> {
    let validated = login.validate_custom()?;

    match authenticate_user(db, &validated.email, &validated.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            open_session(db, cookies, &user).await.validate_custom()?;

            let has_profile = get_profile(db, user.id).await.validate_custom()?.is_some();

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData {
                    id: user.id,
                    email: user.email,
                    has_profile,
                }),
                error: None,
                redirect_url: Some(post_login_redirect(has_profile)),
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("Invalid email or password".to_string()),
            redirect_url: None,
        })),
    }
}

#[post("/logout")]
pub async fn api_logout(cookies: &CookieJar<'_>, db: &State<Pool<Sqlite>>) -> Status {
    let token = cookies
        .get_private(SESSION_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        let _ = invalidate_session(db, &token).await;
    }

    cookies.remove_private(Cookie::build(SESSION_TOKEN_COOKIE));
    cookies.remove_private(Cookie::build("logged_in"));

    Status::Ok
}

#[get("/me")]
pub async fn api_me(user: User, db: &State<Pool<Sqlite>>) -> Result<Json<UserData>, Status> {
    let has_profile = get_profile(db, user.id).await?.is_some();

    Ok(Json(UserData {
        id: user.id,
        email: user.email,
        has_profile,
    }))
}

#[get("/me", rank = 2)]
pub async fn api_me_unauthorized() -> Status {
    Status::Unauthorized
}

/* ---------------- profile ---------------- */

#[derive(Deserialize, Validate, Clone)]
pub struct ProfileUpdateRequest {
    #[validate(length(min = 1, message = "First name is required"))]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    age: Option<i64>,
    objective: String,
    #[serde(default)]
    sports: Vec<String>,
    #[serde(default)]
    planning_prefs: PlanningPrefs,
}

#[get("/profile")]
pub async fn api_get_profile(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Profile>, Status> {
    match get_profile(db, user.id).await? {
        Some(profile) => Ok(Json(profile)),
        None => Err(Status::NotFound),
    }
}

#[put("/profile", data = "<profile>")]
pub async fn api_put_profile(
    profile: Json<ProfileUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Profile>, Custom<Json<ValidationResponse>>> {
    let validated = profile.validate_custom()?;

    if !["forme", "competition"].contains(&validated.objective.as_str()) {
        return Err(AppError::Validation(format!(
            "Unknown objective: {}",
            validated.objective
        ))
        .to_validation_response());
    }

    let saved = upsert_profile(
        db,
        user.id,
        validated.first_name.trim(),
        validated.last_name.trim(),
        validated.age,
        &validated.objective,
        &validated.sports,
        &validated.planning_prefs,
    )
    .await
    .validate_custom()?;

    Ok(Json(saved))
}

/* ---------------- activities ---------------- */

#[derive(Deserialize, Validate, Clone)]
pub struct ActivityRequest {
    #[validate(length(min = 1, message = "Activity name is required"))]
    name: String,
    #[serde(default = "default_color")]
    color: String,
    #[serde(default = "default_unit")]
    distance_unit: String,
}

fn default_color() -> String {
    "#22c55e".to_string()
}

fn default_unit() -> String {
    "km".to_string()
}

fn check_unit(unit: &str) -> Result<DistanceUnit, AppError> {
    DistanceUnit::from_str(unit).map_err(|err| AppError::Validation(err.to_string()))
}

#[get("/activities")]
pub async fn api_get_activities(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Activity>>, Status> {
    let activities = get_activities(db, user.id).await?;
    Ok(Json(activities))
}

#[post("/activities", data = "<activity>")]
pub async fn api_create_activity(
    activity: Json<ActivityRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Activity>, Custom<Json<ValidationResponse>>> {
    let validated = activity.validate_custom()?;
    check_unit(&validated.distance_unit).validate_custom()?;

    let id = create_activity(
        db,
        user.id,
        validated.name.trim(),
        &validated.color,
        &validated.distance_unit,
    )
    .await
    .validate_custom()?;

    let created = get_activity(db, user.id, id).await.validate_custom()?;
    Ok(Json(created))
}

#[post("/activities/upsert", data = "<activity>")]
pub async fn api_upsert_activity(
    activity: Json<ActivityRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Activity>, Custom<Json<ValidationResponse>>> {
    let validated = activity.validate_custom()?;
    check_unit(&validated.distance_unit).validate_custom()?;

    let saved = upsert_activity(
        db,
        user.id,
        validated.name.trim(),
        &validated.color,
        &validated.distance_unit,
    )
    .await
    .validate_custom()?;

    Ok(Json(saved))
}

#[put("/activities/<id>", data = "<activity>")]
pub async fn api_update_activity(
    id: i64,
    activity: Json<ActivityRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Activity>, Custom<Json<ValidationResponse>>> {
    let validated = activity.validate_custom()?;
    check_unit(&validated.distance_unit).validate_custom()?;

    update_activity(
        db,
        user.id,
        id,
        validated.name.trim(),
        &validated.color,
        &validated.distance_unit,
    )
    .await
    .validate_custom()?;

    let updated = get_activity(db, user.id, id).await.validate_custom()?;
    Ok(Json(updated))
}

#[delete("/activities/<id>")]
pub async fn api_delete_activity(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    delete_activity(db, user.id, id).await.validate_custom()?;
    Ok(Status::Ok)
}

/* ---------------- workouts ---------------- */

#[derive(Deserialize, Validate, Clone)]
pub struct InlineActivityRequest {
    #[validate(length(min = 1, message = "Activity name is required"))]
    name: String,
    #[serde(default = "default_color")]
    color: String,
    #[serde(default = "default_unit")]
    distance_unit: String,
}

#[derive(Deserialize, Validate, Clone)]
pub struct WorkoutCreateRequest {
    workout_date: String,
    #[serde(default)]
    activity_id: Option<i64>,
    #[serde(default)]
    #[validate(nested)]
    new_activity: Option<InlineActivityRequest>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration_hhmm: Option<String>,
    /// Distance in the activity's display unit (km or m)
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    advanced: Option<AdvancedMetrics>,
}

#[derive(Deserialize, Validate, Clone)]
pub struct WorkoutUpdateRequest {
    #[serde(default)]
    activity_id: Option<i64>,
    #[serde(default)]
    #[validate(nested)]
    new_activity: Option<InlineActivityRequest>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration_hhmm: Option<String>,
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    advanced: Option<AdvancedMetrics>,
}

fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid date: {}", s)))
}

fn parse_distance(value: Option<f64>, unit: DistanceUnit) -> Result<Option<i64>, AppError> {
    match value {
        None => Ok(None),
        Some(v) if !v.is_finite() || v < 0.0 => Err(AppError::Validation(format!(
            "Distance must be a non-negative number, got {}",
            v
        ))),
        Some(v) => Ok(Some(display_to_meters(v, unit))),
    }
}

fn parse_duration(hhmm: Option<&str>) -> Result<Option<i64>, AppError> {
    match hhmm.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => hhmm_to_minutes(s).map(Some).ok_or_else(|| {
            AppError::Validation(format!("Invalid duration '{}', expected hh:mm", s))
        }),
    }
}

/// Pick an existing activity or inline-create one (upsert on (user, name)).
async fn resolve_activity(
    db: &Pool<Sqlite>,
    user_id: i64,
    activity_id: Option<i64>,
    new_activity: Option<&InlineActivityRequest>,
) -> Result<Activity, AppError> {
    if let Some(new_act) = new_activity {
        let name = new_act.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Activity name is required".to_string()));
        }
        check_unit(&new_act.distance_unit)?;
        return upsert_activity(db, user_id, name, &new_act.color, &new_act.distance_unit).await;
    }

    match activity_id {
        Some(id) => get_activity(db, user_id, id).await,
        None => Err(AppError::Validation(
            "Pick an activity or create one".to_string(),
        )),
    }
}

fn final_title(
    title: Option<&str>,
    activity: &Activity,
    duration_min: Option<i64>,
    distance_m: Option<i64>,
) -> String {
    match title.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => auto_title(&activity.name, activity.distance_unit, duration_min, distance_m),
    }
}

#[get("/workouts?<from>&<to>")]
pub async fn api_get_workouts(
    from: String,
    to: String,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Workout>>, Status> {
    let from = parse_date(&from)?;
    let to = parse_date(&to)?;

    let workouts = get_workouts_range(db, user.id, from, to).await?;
    Ok(Json(workouts))
}

#[post("/workouts", data = "<workout>")]
pub async fn api_create_workout(
    workout: Json<WorkoutCreateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Workout>, Custom<Json<ValidationResponse>>> {
    let validated = workout.validate_custom()?;

    let date = parse_date(&validated.workout_date).validate_custom()?;
    let activity = resolve_activity(
        db,
        user.id,
        validated.activity_id,
        validated.new_activity.as_ref(),
    )
    .await
    .validate_custom()?;

    let duration_min = parse_duration(validated.duration_hhmm.as_deref()).validate_custom()?;
    let distance_m =
        parse_distance(validated.distance, activity.distance_unit).validate_custom()?;

    let title = final_title(validated.title.as_deref(), &activity, duration_min, distance_m);

    let new_workout = NewWorkout {
        workout_date: date,
        activity_id: activity.id,
        title,
        duration_min,
        distance_m,
        notes: validated
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from),
        advanced: validated.advanced.unwrap_or_default(),
    };

    let id = insert_workout(db, user.id, &new_workout)
        .await
        .validate_custom()?;

    let created = get_workout(db, user.id, id).await.validate_custom()?;
    Ok(Json(created))
}

#[put("/workouts/<id>", data = "<workout>")]
pub async fn api_update_workout(
    id: i64,
    workout: Json<WorkoutUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Workout>, Custom<Json<ValidationResponse>>> {
    let validated = workout.validate_custom()?;

    let existing = get_workout(db, user.id, id).await.validate_custom()?;

    let activity = match (validated.activity_id, validated.new_activity.as_ref()) {
        (None, None) => get_activity(db, user.id, existing.activity.id)
            .await
            .validate_custom()?,
        (activity_id, new_activity) => {
            resolve_activity(db, user.id, activity_id, new_activity)
                .await
                .validate_custom()?
        }
    };

    let duration_min = parse_duration(validated.duration_hhmm.as_deref()).validate_custom()?;
    let distance_m =
        parse_distance(validated.distance, activity.distance_unit).validate_custom()?;

    let title = final_title(validated.title.as_deref(), &activity, duration_min, distance_m);

    update_workout(
        db,
        user.id,
        id,
        activity.id,
        &title,
        duration_min,
        distance_m,
        validated
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty()),
        &validated.advanced.unwrap_or_default(),
    )
    .await
    .validate_custom()?;

    let updated = get_workout(db, user.id, id).await.validate_custom()?;
    Ok(Json(updated))
}

#[delete("/workouts/<id>")]
pub async fn api_delete_workout(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    delete_workout(db, user.id, id).await?;
    Ok(Status::Ok)
}

#[derive(Deserialize, Clone)]
pub struct MarkDoneRequest {
    #[serde(default)]
    actual_duration_hhmm: Option<String>,
    /// Distance in the activity's display unit
    #[serde(default)]
    actual_distance: Option<f64>,
    #[serde(default)]
    actual_notes: Option<String>,
}

#[post("/workouts/<id>/done", data = "<done>")]
pub async fn api_mark_workout_done(
    id: i64,
    done: Json<MarkDoneRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Workout>, Custom<Json<ValidationResponse>>> {
    let request = done.into_inner();

    let workout = get_workout(db, user.id, id).await.validate_custom()?;

    let actual_duration_min =
        parse_duration(request.actual_duration_hhmm.as_deref()).validate_custom()?;
    let actual_distance_m =
        parse_distance(request.actual_distance, workout.activity.distance_unit)
            .validate_custom()?;

    set_workout_done(
        db,
        user.id,
        id,
        actual_duration_min,
        actual_distance_m,
        request
            .actual_notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty()),
    )
    .await
    .validate_custom()?;

    let updated = get_workout(db, user.id, id).await.validate_custom()?;
    Ok(Json(updated))
}

#[post("/workouts/<id>/undone")]
pub async fn api_mark_workout_undone(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Workout>, Status> {
    set_workout_undone(db, user.id, id).await?;

    let updated = get_workout(db, user.id, id).await?;
    Ok(Json(updated))
}

#[derive(Deserialize, Clone)]
pub struct MoveWorkoutRequest {
    workout_id: i64,
    to_date: String,
    /// Target-day workout to insert before; appended when absent
    #[serde(default)]
    before_id: Option<i64>,
}

/// Drag-and-drop persistence: reindexes the source and target day and moves
/// the workout's date. Row updates are applied one by one with no surrounding
/// transaction; a partial failure leaves the day lists for the client to
/// reload.
#[post("/workouts/move", data = "<request>")]
pub async fn api_move_workout(
    request: Json<MoveWorkoutRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    let request = request.into_inner();

    let to_date = parse_date(&request.to_date).validate_custom()?;
    let workout = get_workout(db, user.id, request.workout_id)
        .await
        .validate_custom()?;

    let from_ids = day_workout_ids(db, user.id, workout.workout_date)
        .await
        .validate_custom()?;
    let to_ids = day_workout_ids(db, user.id, to_date)
        .await
        .validate_custom()?;

    let updates = plan_move(
        workout.workout_date,
        &from_ids,
        to_date,
        &to_ids,
        request.workout_id,
        request.before_id,
    )
    .validate_custom()?;

    for update in updates {
        update_workout_slot(
            db,
            user.id,
            update.workout_id,
            update.workout_date,
            update.position,
        )
        .await
        .validate_custom()?;
    }

    Ok(Status::Ok)
}

/* ---------------- schedule ---------------- */

#[derive(Serialize)]
pub struct DayCell {
    pub date: NaiveDate,
    pub in_month: bool,
}

#[derive(Serialize)]
pub struct WeekRow {
    pub iso_week: u32,
    pub days: Vec<DayCell>,
}

#[derive(Serialize)]
pub struct ScheduleResponse {
    pub view: Granularity,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub weeks: Vec<WeekRow>,
    pub workouts_by_date: BTreeMap<NaiveDate, Vec<Workout>>,
}

fn parse_view(view: Option<&str>, default: Granularity) -> Result<Granularity, AppError> {
    match view {
        None => Ok(default),
        Some(s) => Granularity::from_str(s).map_err(|err| AppError::Validation(err.to_string())),
    }
}

fn parse_cursor(cursor: Option<&str>) -> Result<NaiveDate, AppError> {
    match cursor {
        None => Ok(Utc::now().date_naive()),
        Some(s) => parse_date(s),
    }
}

#[get("/schedule?<view>&<cursor>")]
pub async fn api_get_schedule(
    view: Option<String>,
    cursor: Option<String>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ScheduleResponse>, Status> {
    use chrono::Datelike;

    let view = parse_view(view.as_deref(), Granularity::Week)?;
    let cursor = parse_cursor(cursor.as_deref())?;

    let weeks: Vec<Vec<NaiveDate>> = match view {
        Granularity::Week => vec![week_days(cursor)],
        Granularity::Month => month_grid(cursor),
        Granularity::Year => {
            return Err(AppError::Validation(
                "Schedule supports week and month views".to_string(),
            )
            .into());
        }
    };

    let from = weeks[0][0];
    let to = weeks[weeks.len() - 1][6];

    let week_rows: Vec<WeekRow> = weeks
        .iter()
        .map(|days| WeekRow {
            iso_week: iso_week_number(days[0]),
            days: days
                .iter()
                .map(|d| DayCell {
                    date: *d,
                    in_month: view == Granularity::Week
                        || (d.month() == cursor.month() && d.year() == cursor.year()),
                })
                .collect(),
        })
        .collect();

    let workouts = get_workouts_range(db, user.id, from, to).await?;

    let mut workouts_by_date: BTreeMap<NaiveDate, Vec<Workout>> = BTreeMap::new();
    for workout in workouts {
        workouts_by_date
            .entry(workout.workout_date)
            .or_default()
            .push(workout);
    }

    Ok(Json(ScheduleResponse {
        view,
        from,
        to,
        weeks: week_rows,
        workouts_by_date,
    }))
}

/* ---------------- stats ---------------- */

#[derive(Serialize)]
pub struct StatsResponse {
    pub view: Granularity,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub current: PeriodStats,
    pub previous: PeriodStats,
    pub delta: StatsDelta,
}

#[get("/stats?<view>&<cursor>")]
pub async fn api_get_stats(
    view: Option<String>,
    cursor: Option<String>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<StatsResponse>, Status> {
    let view = parse_view(view.as_deref(), Granularity::Week)?;
    let cursor = parse_cursor(cursor.as_deref())?;

    let period = Period::containing(cursor, view);
    let previous = period.previous(view);

    let current_workouts =
        get_workouts_range(db, user.id, period.start, period.last_day()).await?;
    let previous_workouts =
        get_workouts_range(db, user.id, previous.start, previous.last_day()).await?;

    let current_stats = PeriodStats::compute(&current_workouts);
    let previous_stats = PeriodStats::compute(&previous_workouts);
    let delta = StatsDelta::between(&current_stats, &previous_stats);

    Ok(Json(StatsResponse {
        view,
        from: period.start,
        to: period.last_day(),
        current: current_stats,
        previous: previous_stats,
        delta,
    }))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
