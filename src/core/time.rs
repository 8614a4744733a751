use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime, PrimitiveDateTime};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

/// Roughly ten years; keeps the subtraction inside the representable date range.
const MAX_LOOKBACK_MINUTES: u64 = 5_256_000;

pub(crate) fn minutes_before(value: PrimitiveDateTime, minutes: u64) -> PrimitiveDateTime {
    value - Duration::minutes(minutes.min(MAX_LOOKBACK_MINUTES) as i64)
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Month, Time};

    fn at(hour: u8, minute: u8) -> PrimitiveDateTime {
        let date = Date::from_calendar_date(2025, Month::May, 14).unwrap();
        PrimitiveDateTime::new(date, Time::from_hms(hour, minute, 0).unwrap())
    }

    #[test]
    fn format_primitive_outputs_utc_z() {
        assert_eq!(format_primitive(at(9, 5)), "2025-05-14T09:05:00Z");
    }

    #[test]
    fn minutes_before_crosses_hour_boundary() {
        assert_eq!(minutes_before(at(10, 10), 30), at(9, 40));
        assert_eq!(minutes_before(at(10, 10), 0), at(10, 10));
    }
}
