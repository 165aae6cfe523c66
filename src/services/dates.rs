use chrono::NaiveDate;

/// Every date from `start` to `end`, both included. Empty when `end` is
/// before `start`.
pub fn get_dates_in_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// Absolute number of days between two dates.
pub fn calculate_nights(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days().abs()
}

/// Whether the closed intervals `[a_start, a_end]` and `[b_start, b_end]`
/// share at least one day.
pub fn date_ranges_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// Whether two stays compete for a night. Check-out day is free for the
/// next arrival, so the intervals are half-open.
pub fn stays_overlap(
    a_check_in: NaiveDate,
    a_check_out: NaiveDate,
    b_check_in: NaiveDate,
    b_check_out: NaiveDate,
) -> bool {
    a_check_in < b_check_out && b_check_in < a_check_out
}
