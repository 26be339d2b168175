use crate::error::{AppError, AppResult};
use crate::models::reservation::{Reservation, TimeWindow};

/// Half-open intervals intersect when each one starts before the other ends.
pub fn overlaps(existing: &TimeWindow, candidate: &TimeWindow) -> bool {
    existing.start < candidate.end && candidate.start < existing.end
}

/// A space is available when none of its reservations intersects the candidate window.
pub fn is_available(reservations: &[Reservation], candidate: &TimeWindow) -> bool {
    !reservations
        .iter()
        .any(|reservation| overlaps(&reservation.window(), candidate))
}

pub fn validate_window(window: &TimeWindow) -> AppResult<()> {
    if window.start >= window.end {
        return Err(AppError::Validation(format!(
            "Reservation must end after it starts ({} >= {})",
            window.start, window.end
        )));
    }
    Ok(())
}
