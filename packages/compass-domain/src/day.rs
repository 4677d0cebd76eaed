use time::{Duration, OffsetDateTime, Time, UtcOffset};

/// Exclusions reset at local midnight, so their lifetime is computed per call rather than as a
/// fixed duration.
pub fn next_local_midnight(now: OffsetDateTime, utc_offset_hours: i8) -> OffsetDateTime {
	let offset = UtcOffset::from_hms(utc_offset_hours, 0, 0).unwrap_or(UtcOffset::UTC);
	let local = now.to_offset(offset);
	let next_day = local.date().saturating_add(Duration::days(1));

	OffsetDateTime::new_in_offset(next_day, Time::MIDNIGHT, offset)
}
