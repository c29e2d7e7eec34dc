use crate::models::DistanceUnit;

/// Parses an "hh:mm" duration into minutes. Rejects anything that is not two
/// numeric fields.
pub fn hhmm_to_minutes(hhmm: &str) -> Option<i64> {
    let (h, m) = hhmm.split_once(':')?;
    let h: i64 = h.trim().parse().ok()?;
    let m: i64 = m.trim().parse().ok()?;
    if h < 0 || !(0..60).contains(&m) {
        return None;
    }
    Some(h * 60 + m)
}

/// Compact duration label: "45 min", "1h05".
pub fn minutes_to_compact(min: Option<i64>) -> String {
    match min {
        None => "—".to_string(),
        Some(m) if m < 60 => format!("{} min", m),
        Some(m) => format!("{}h{:02}", m / 60, m % 60),
    }
}

/// Converts a distance entered in the activity's display unit to meters.
pub fn display_to_meters(value: f64, unit: DistanceUnit) -> i64 {
    match unit {
        DistanceUnit::M => value.round() as i64,
        DistanceUnit::Km => (value * 1000.0).round() as i64,
    }
}

/// Renders stored meters in the activity's display unit: "500 m", "10.0 km".
pub fn meters_to_display(meters: i64, unit: DistanceUnit) -> String {
    match unit {
        DistanceUnit::M => format!("{} m", meters),
        DistanceUnit::Km => format!("{:.1} km", meters as f64 / 1000.0),
    }
}

/// Title used when the workout form leaves the title blank:
/// "«activity» — «N min» — «distance»", omitting absent parts.
pub fn auto_title(
    activity_name: &str,
    unit: DistanceUnit,
    duration_min: Option<i64>,
    distance_m: Option<i64>,
) -> String {
    let mut parts = vec![activity_name.to_string()];
    if let Some(min) = duration_min {
        parts.push(format!("{} min", min));
    }
    if let Some(m) = distance_m {
        parts.push(meters_to_display(m, unit));
    }
    parts.join(" — ")
}
