use serde::{Deserialize, Serialize};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::error::{AppError, AppResult};
use crate::models::reservation::TimeWindow;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const DISPLAY_FORMAT: &[FormatItem<'static>] =
    format_description!("[day]/[month]/[year] [hour repr:12]:[minute] [period]");

/// Wall-clock reservation times as picked by the user, plus the user's offset from UTC.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WindowSelection {
    /// `YYYY-MM-DD`
    pub start_date: String,
    pub end_date: String,
    pub start_hour: u8,
    pub start_minute: u8,
    pub end_hour: u8,
    pub end_minute: u8,
    #[serde(default)]
    pub utc_offset_minutes: i16,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReservationWindow {
    pub window: TimeWindow,
    pub start_text: String,
    pub end_text: String,
}

impl WindowSelection {
    pub fn offset(&self) -> AppResult<UtcOffset> {
        let minutes = i32::from(self.utc_offset_minutes);
        UtcOffset::from_whole_seconds(minutes * 60).map_err(|e| {
            AppError::Validation(format!("Invalid UTC offset {} minutes: {}", minutes, e))
        })
    }

    /// Resolves the selection to UTC instants and the strings shown back to the user.
    pub fn resolve(&self) -> AppResult<ReservationWindow> {
        let offset = self.offset()?;
        let start = local_instant(&self.start_date, self.start_hour, self.start_minute, offset)?;
        let end = local_instant(&self.end_date, self.end_hour, self.end_minute, offset)?;

        Ok(ReservationWindow {
            window: TimeWindow { start, end },
            start_text: display(start, offset)?,
            end_text: display(end, offset)?,
        })
    }
}

fn parse_date(date: &str) -> AppResult<Date> {
    Date::parse(date, DATE_FORMAT)
        .map_err(|e| AppError::Validation(format!("Invalid date {:?}: {}", date, e)))
}

/// The instant at which the clock reads `hour:minute` on `date` in the zone at `offset`, in UTC.
fn local_instant(date: &str, hour: u8, minute: u8, offset: UtcOffset) -> AppResult<OffsetDateTime> {
    let date = parse_date(date)?;
    let time = Time::from_hms(hour, minute, 0)
        .map_err(|e| AppError::Validation(format!("Invalid time {:02}:{:02}: {}", hour, minute, e)))?;

    PrimitiveDateTime::new(date, time)
        .assume_offset(offset)
        .checked_to_offset(UtcOffset::UTC)
        .ok_or_else(|| out_of_range(date, hour, minute))
}

fn out_of_range(date: Date, hour: u8, minute: u8) -> AppError {
    AppError::Validation(format!(
        "{} {:02}:{:02} is outside the supported date range",
        date, hour, minute
    ))
}

fn display(instant: OffsetDateTime, offset: UtcOffset) -> AppResult<String> {
    instant
        .checked_to_offset(offset)
        .ok_or_else(|| AppError::Validation(format!("{} cannot be shown at offset {}", instant, offset)))?
        .format(DISPLAY_FORMAT)
        .map_err(|e| AppError::Unknown(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn selection(offset_minutes: i16) -> WindowSelection {
        WindowSelection {
            start_date: "2024-03-10".into(),
            end_date: "2024-03-10".into(),
            start_hour: 9,
            start_minute: 30,
            end_hour: 17,
            end_minute: 0,
            utc_offset_minutes: offset_minutes,
        }
    }

    #[test]
    fn utc_selection_is_taken_as_is() {
        let resolved = selection(0).resolve().unwrap();

        assert_eq!(resolved.window.start, datetime!(2024-03-10 09:30 UTC));
        assert_eq!(resolved.window.end, datetime!(2024-03-10 17:00 UTC));
    }

    #[test]
    fn zone_offset_is_subtracted() {
        // Bogota, UTC-5: 09:30 local is 14:30 UTC.
        let resolved = selection(-300).resolve().unwrap();
        assert_eq!(resolved.window.start, datetime!(2024-03-10 14:30 UTC));
        assert_eq!(resolved.window.end, datetime!(2024-03-10 22:00 UTC));

        // Madrid in winter, UTC+1.
        let resolved = selection(60).resolve().unwrap();
        assert_eq!(resolved.window.start, datetime!(2024-03-10 08:30 UTC));
    }

    #[test]
    fn late_evening_crosses_into_the_next_utc_day() {
        let mut late = selection(-300);
        late.end_hour = 22;
        let resolved = late.resolve().unwrap();

        assert_eq!(resolved.window.end, datetime!(2024-03-11 03:00 UTC));
    }

    #[test]
    fn display_text_uses_the_callers_clock() {
        let resolved = selection(-300).resolve().unwrap();

        assert_eq!(resolved.start_text, "10/03/2024 09:30 AM");
        assert_eq!(resolved.end_text, "10/03/2024 05:00 PM");
    }

    #[test]
    fn multi_day_selection() {
        let mut multi_day = selection(0);
        multi_day.end_date = "2024-03-12".into();
        multi_day.end_hour = 8;
        let resolved = multi_day.resolve().unwrap();

        assert_eq!(resolved.window.end, datetime!(2024-03-12 08:00 UTC));
    }

    #[test]
    fn invalid_components_are_rejected() {
        let mut bad_hour = selection(0);
        bad_hour.start_hour = 24;
        assert!(matches!(bad_hour.resolve(), Err(AppError::Validation(_))));

        let mut bad_minute = selection(0);
        bad_minute.end_minute = 60;
        assert!(matches!(bad_minute.resolve(), Err(AppError::Validation(_))));

        let mut bad_date = selection(0);
        bad_date.start_date = "10/03/2024".into();
        assert!(matches!(bad_date.resolve(), Err(AppError::Validation(_))));

        assert!(matches!(selection(i16::MAX).resolve(), Err(AppError::Validation(_))));
    }

    #[test]
    fn selections_past_the_last_representable_instant_are_rejected() {
        // 22:00 at UTC-2 on the last supported day is already the following year in UTC.
        let mut last_day = selection(-120);
        last_day.start_date = "9999-12-31".into();
        last_day.end_date = "9999-12-31".into();
        last_day.start_hour = 21;
        last_day.end_hour = 22;
        assert!(matches!(last_day.resolve(), Err(AppError::Validation(_))));

        last_day.end_hour = 21;
        last_day.end_minute = 59;
        let resolved = last_day.resolve().unwrap();
        assert_eq!(resolved.window.end, datetime!(9999-12-31 23:59 UTC));
    }

    #[test]
    fn selections_before_the_first_representable_instant_are_rejected() {
        let mut first_day = selection(120);
        first_day.start_date = "-9999-01-01".into();
        first_day.start_hour = 1;
        assert!(matches!(first_day.resolve(), Err(AppError::Validation(_))));
    }
}
