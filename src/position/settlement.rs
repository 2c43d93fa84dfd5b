//! Settlement day arithmetic for the GB power market.
//!
//! A settlement day for date D runs from 23:00 UK local time on D-1 to
//! 23:00 on D. Clock changes make it 23 hours long in spring and 25 in
//! autumn; every other day has 24 hourly periods.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Europe::London;
use chrono_tz::Tz;

use super::error::PositionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementDay {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub periods: usize,
}

impl SettlementDay {
    /// The settlement day for calendar date `date`
    pub fn for_date(date: NaiveDate) -> Result<Self, PositionError> {
        let start_local = date
            .pred_opt()
            .and_then(|previous| previous.and_hms_opt(23, 0, 0))
            .ok_or(PositionError::InvalidDate(date))?;
        let end_local = date
            .and_hms_opt(23, 0, 0)
            .ok_or(PositionError::InvalidDate(date))?;

        let start_utc = to_utc(start_local).ok_or(PositionError::InvalidDate(date))?;
        let end_utc = to_utc(end_local).ok_or(PositionError::InvalidDate(date))?;
        let periods = (end_utc - start_utc).num_hours() as usize;

        Ok(Self {
            start_utc,
            end_utc,
            periods,
        })
    }

    /// UK local start time of every period, in order
    pub fn local_times(&self) -> Vec<DateTime<Tz>> {
        (0..self.periods as i64)
            .map(|i| (self.start_utc + Duration::hours(i)).with_timezone(&London))
            .collect()
    }
}

/// The settlement day containing the local date of `day`
pub fn settlement_day(day: DateTime<FixedOffset>) -> Result<SettlementDay, PositionError> {
    SettlementDay::for_date(day.date_naive())
}

/// Local start time of each settlement period for the local date of `day`
pub fn local_times(day: DateTime<FixedOffset>) -> Result<Vec<DateTime<Tz>>, PositionError> {
    Ok(settlement_day(day)?.local_times())
}

fn to_utc(local: NaiveDateTime) -> Option<DateTime<Utc>> {
    London
        .from_local_datetime(&local)
        .single()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().expect("valid time")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn hours(day: &SettlementDay) -> Vec<String> {
        day.local_times()
            .iter()
            .map(|t| t.format("%H:%M").to_string())
            .collect()
    }

    #[test]
    fn long_day_has_25_periods() {
        let day = SettlementDay::for_date(date(2014, 10, 26)).expect("settlement day");
        assert_eq!(day.start_utc, utc(2014, 10, 25, 22));
        assert_eq!(day.end_utc, utc(2014, 10, 26, 23));
        assert_eq!(day.periods, 25);
        assert_eq!(
            &hours(&day)[..5],
            &["23:00", "00:00", "01:00", "01:00", "02:00"]
        );
        assert_eq!(hours(&day).last().map(String::as_str), Some("22:00"));
    }

    #[test]
    fn winter_day_has_24_periods() {
        let day = SettlementDay::for_date(date(2014, 12, 12)).expect("settlement day");
        assert_eq!(day.start_utc, utc(2014, 12, 11, 23));
        assert_eq!(day.end_utc, utc(2014, 12, 12, 23));
        assert_eq!(day.periods, 24);
    }

    #[test]
    fn short_day_has_23_periods() {
        let day = SettlementDay::for_date(date(2015, 3, 29)).expect("settlement day");
        assert_eq!(day.start_utc, utc(2015, 3, 28, 23));
        assert_eq!(day.end_utc, utc(2015, 3, 29, 22));
        assert_eq!(day.periods, 23);
        assert_eq!(&hours(&day)[..3], &["23:00", "00:00", "02:00"]);
    }

    #[test]
    fn summer_day_has_24_periods() {
        let day = SettlementDay::for_date(date(2015, 5, 10)).expect("settlement day");
        assert_eq!(day.start_utc, utc(2015, 5, 9, 22));
        assert_eq!(day.end_utc, utc(2015, 5, 10, 22));
        assert_eq!(day.periods, 24);

        let expected: Vec<String> = std::iter::once(23)
            .chain(0..23)
            .map(|h| format!("{:02}:00", h))
            .collect();
        assert_eq!(hours(&day), expected);
    }

    #[test]
    fn settlement_day_uses_the_local_date() {
        let offset = FixedOffset::east_opt(3600).expect("offset");
        let day = offset
            .with_ymd_and_hms(2015, 5, 10, 0, 30, 0)
            .single()
            .expect("valid time");
        let settlement = settlement_day(day).expect("settlement day");
        assert_eq!(settlement.start_utc, utc(2015, 5, 9, 22));
        assert_eq!(local_times(day).expect("local times").len(), 24);
    }
}
