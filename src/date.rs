//! OLE Automation date serials
//!
//! Spreadsheet cells store dates as a floating point day count where day 0 is
//! 1899-12-30, the integer part counts days and the fraction is the time of day
//! measured forward from midnight (also for negative days).

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::error::{ExcelError, Result};

const TICKS_PER_MILLISECOND: i64 = 10_000;
const TICKS_PER_SECOND: i64 = TICKS_PER_MILLISECOND * 1000;
const TICKS_PER_DAY: i64 = TICKS_PER_SECOND * 86_400;
const MILLIS_PER_DAY: i64 = 86_400_000;

const DAYS_PER_YEAR: i64 = 365;
const DAYS_PER_4_YEARS: i64 = DAYS_PER_YEAR * 4 + 1;
const DAYS_PER_100_YEARS: i64 = DAYS_PER_4_YEARS * 25 - 1;
const DAYS_PER_400_YEARS: i64 = DAYS_PER_100_YEARS * 4 + 1;

/// Days from 0001-01-01 to 1899-12-30
const DAYS_TO_1899: i64 = DAYS_PER_400_YEARS * 4 + DAYS_PER_100_YEARS * 3 - 367;

const DOUBLE_DATE_OFFSET: i64 = DAYS_TO_1899 * TICKS_PER_DAY;

/// 0100-01-01, the first representable date
const OA_DATE_MIN_AS_TICKS: i64 = (DAYS_PER_100_YEARS - DAYS_PER_YEAR) * TICKS_PER_DAY;

/// Serials must stay strictly above this value
pub const OA_DATE_MIN: f64 = -657_435.0;
/// Serials must stay strictly below this value (10000-01-01)
pub const OA_DATE_MAX: f64 = 2_958_466.0;

/// Number of 100ns ticks since 0001-01-01T00:00:00
///
/// `None` when the count does not fit an `i64`, which happens around year 29000
/// in either direction.
fn ticks(dt: &NaiveDateTime) -> Option<i64> {
    let days = dt.date().num_days_from_ce() as i64 - 1;
    let seconds = dt.time().num_seconds_from_midnight() as i64;
    // Leap-second representation can push nanoseconds past one second.
    let nanos = (dt.time().nanosecond() as i64).min(999_999_999);
    days.checked_mul(TICKS_PER_DAY)?
        .checked_add(seconds * TICKS_PER_SECOND + nanos / 100)
}

/// Convert a timestamp to its OLE Automation serial
///
/// A timestamp on 0001-01-01 (time only) is treated as a time on 1899-12-30,
/// so `00:00` maps to `0.0` and `06:00` to `0.25`. Dates before 0100-01-01
/// fail with [`ExcelError::DateOverflow`].
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use excelgen::date::to_oa_date;
///
/// let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// assert_eq!(to_oa_date(&epoch).unwrap(), 0.0);
/// ```
pub fn to_oa_date(dt: &NaiveDateTime) -> Result<f64> {
    let mut value = ticks(dt).ok_or_else(|| ExcelError::DateOverflow(dt.to_string()))?;
    if value < 0 {
        return Err(ExcelError::DateOverflow(dt.to_string()));
    }

    if value == 0 {
        return Ok(0.0);
    }

    if value < TICKS_PER_DAY {
        value += DOUBLE_DATE_OFFSET;
    }

    if value < OA_DATE_MIN_AS_TICKS {
        return Err(ExcelError::DateOverflow(dt.to_string()));
    }

    let mut millis = (value - DOUBLE_DATE_OFFSET) / TICKS_PER_MILLISECOND;
    if millis < 0 {
        let frac = millis % MILLIS_PER_DAY;
        if frac != 0 {
            millis -= (MILLIS_PER_DAY + frac) * 2;
        }
    }

    let serial = millis as f64 / MILLIS_PER_DAY as f64;
    if serial <= OA_DATE_MIN || serial >= OA_DATE_MAX {
        return Err(ExcelError::DateOverflow(dt.to_string()));
    }

    Ok(serial)
}
