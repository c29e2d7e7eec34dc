use chrono::NaiveDate;

use crate::error::AppError;

/// One row update produced by a move: the workout's new day and position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotUpdate {
    pub workout_id: i64,
    pub workout_date: NaiveDate,
    pub position: i64,
}

/// Plans a drag-and-drop move over the per-day ordered lists.
///
/// The moved workout leaves the source day, lands in the target day before
/// `before_id` (appended when `before_id` is absent or not in the target day),
/// and both days are reindexed to a dense 0-based sequence. The returned
/// updates cover every workout of both days so persisted positions always
/// match display order.
pub fn plan_move(
    from_date: NaiveDate,
    from_ids: &[i64],
    to_date: NaiveDate,
    to_ids: &[i64],
    workout_id: i64,
    before_id: Option<i64>,
) -> Result<Vec<SlotUpdate>, AppError> {
    if !from_ids.contains(&workout_id) {
        return Err(AppError::NotFound(format!(
            "Workout {} not found on {}",
            workout_id, from_date
        )));
    }

    let remaining: Vec<i64> = from_ids.iter().copied().filter(|&id| id != workout_id).collect();

    let mut target: Vec<i64> = if from_date == to_date {
        remaining.clone()
    } else {
        to_ids.to_vec()
    };

    let insert_at = before_id
        .and_then(|before| target.iter().position(|&id| id == before))
        .unwrap_or(target.len());
    target.insert(insert_at, workout_id);

    let mut updates = Vec::with_capacity(remaining.len() + target.len());

    if from_date != to_date {
        for (position, &id) in remaining.iter().enumerate() {
            updates.push(SlotUpdate {
                workout_id: id,
                workout_date: from_date,
                position: position as i64,
            });
        }
    }

    for (position, &id) in target.iter().enumerate() {
        updates.push(SlotUpdate {
            workout_id: id,
            workout_date: to_date,
            position: position as i64,
        });
    }

    Ok(updates)
}
