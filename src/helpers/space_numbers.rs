use std::ops::RangeInclusive;

use crate::error::{AppError, AppResult};

/// Upper bound on the spaces a single request may add to a lot.
pub const MAX_SPACES_PER_REQUEST: u32 = 500;

/// Numbers for `count` new spaces appended after the `existing` ones of a lot.
pub fn next_space_numbers(existing: usize, count: u32) -> AppResult<RangeInclusive<i32>> {
    if count == 0 {
        return Err(AppError::Validation("At least one parking space must be added".into()));
    }
    if count > MAX_SPACES_PER_REQUEST {
        return Err(AppError::Validation(format!(
            "At most {} parking spaces can be added at once",
            MAX_SPACES_PER_REQUEST
        )));
    }

    let first = i32::try_from(existing)
        .ok()
        .and_then(|n| n.checked_add(1))
        .ok_or_else(|| AppError::Validation("Parking lot has too many spaces".into()))?;
    let last = i32::try_from(count)
        .ok()
        .and_then(|n| first.checked_add(n - 1))
        .ok_or_else(|| AppError::Validation(format!("Cannot add {} parking spaces", count)))?;

    Ok(first..=last)
}
