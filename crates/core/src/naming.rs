//! Output image naming convention.
//!
//! Saved images are named `{prefix}-output_{YYYYMMDD-HHMMSS}-{NNNN}.png`.
//! The timestamp has one-second resolution, so the four-digit random
//! suffix is the only thing separating images saved within the same
//! second. A clash overwrites the earlier file.

use std::ops::RangeInclusive;

use chrono::NaiveDateTime;
use rand::Rng;

/// Range the disambiguating suffix is drawn from.
pub const SUFFIX_RANGE: RangeInclusive<u16> = 1000..=9999;

/// Timestamp layout used in output filenames.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Build an output filename from its parts.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use comfybatch_core::naming::output_filename;
///
/// let at = NaiveDate::from_ymd_opt(2024, 3, 9)
///     .unwrap()
///     .and_hms_opt(7, 5, 1)
///     .unwrap();
/// assert_eq!(output_filename("cat", at, 4821), "cat-output_20240309-070501-4821.png");
/// ```
pub fn output_filename(prefix: &str, at: NaiveDateTime, suffix: u16) -> String {
    format!("{prefix}-output_{}-{suffix:04}.png", at.format(TIMESTAMP_FORMAT))
}

/// Build an output filename for the current local time with a random suffix.
pub fn random_output_filename<R: Rng + ?Sized>(prefix: &str, rng: &mut R) -> String {
    let suffix = rng.random_range(SUFFIX_RANGE);
    output_filename(prefix, chrono::Local::now().naive_local(), suffix)
}
