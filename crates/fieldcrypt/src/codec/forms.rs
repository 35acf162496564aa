//! Canonical string projections for the supported column types.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use super::{CanonicalError, CanonicalForm};

/// Plain text, stored as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextForm;

impl CanonicalForm for TextForm {
    type Value = String;

    fn name(&self) -> &'static str {
        "text"
    }

    fn to_canonical(&self, value: &String) -> String {
        value.clone()
    }

    fn from_canonical(&self, canonical: &str) -> Result<String, CanonicalError> {
        Ok(canonical.to_owned())
    }
}

const PRESENT_TAG: char = '1';
const ABSENT_TAG: &str = "0";

/// Optional text with an explicit presence tag.
///
/// `Some(v)` becomes `"1" + v` and `None` becomes `"0"`, so an empty string and
/// an absent value stay distinct.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionalTextForm;

impl CanonicalForm for OptionalTextForm {
    type Value = Option<String>;

    fn name(&self) -> &'static str {
        "optional-text"
    }

    fn to_canonical(&self, value: &Option<String>) -> String {
        match value {
            Some(v) => format!("{PRESENT_TAG}{v}"),
            None => ABSENT_TAG.to_owned(),
        }
    }

    fn from_canonical(&self, canonical: &str) -> Result<Option<String>, CanonicalError> {
        if let Some(rest) = canonical.strip_prefix(PRESENT_TAG) {
            return Ok(Some(rest.to_owned()));
        }
        if canonical == ABSENT_TAG {
            return Ok(None);
        }
        Err(CanonicalError("missing presence tag".into()))
    }
}

/// Fixed-point decimal text.
///
/// Without a scale the decimal's own scale is kept (`12.50` stays `12.50`).
/// With a scale, values are rounded half-to-even to exactly that many places
/// before encryption; that rounding is the only loss.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalForm {
    scale: Option<u32>,
}

impl DecimalForm {
    pub fn with_scale(scale: u32) -> Self {
        Self { scale: Some(scale) }
    }

    pub fn scale(&self) -> Option<u32> {
        self.scale
    }

    fn rounded(&self, value: &Decimal) -> Decimal {
        match self.scale {
            Some(dp) => {
                let mut rounded =
                    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven);
                rounded.rescale(dp);
                rounded
            }
            None => *value,
        }
    }
}

impl CanonicalForm for DecimalForm {
    type Value = Decimal;

    fn name(&self) -> &'static str {
        "decimal"
    }

    fn to_canonical(&self, value: &Decimal) -> String {
        self.rounded(value).to_string()
    }

    fn from_canonical(&self, canonical: &str) -> Result<Decimal, CanonicalError> {
        Decimal::from_str_exact(canonical).map_err(|e| CanonicalError(e.to_string()))
    }

    /// `12.5` and `12.50` are the same amount.
    fn comparison_key(&self, value: &Decimal) -> String {
        self.rounded(value).normalize().to_string()
    }
}

/// UTC timestamp as RFC 3339 with as many sub-second digits as needed.
///
/// Time of day is preserved down to the nanosecond.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeForm;

impl CanonicalForm for DateTimeForm {
    type Value = DateTime<Utc>;

    fn name(&self) -> &'static str {
        "datetime"
    }

    fn to_canonical(&self, value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    fn from_canonical(&self, canonical: &str) -> Result<DateTime<Utc>, CanonicalError> {
        DateTime::parse_from_rfc3339(canonical)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| CanonicalError(e.to_string()))
    }
}

/// Long-form date text, e.g. `Friday, October 16, 2026`.
const LONG_DATE_FORMAT: &str = "%A, %B %d, %Y";

/// Calendar date in long form. Carries no time of day.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongDateForm;

impl CanonicalForm for LongDateForm {
    type Value = NaiveDate;

    fn name(&self) -> &'static str {
        "date"
    }

    fn to_canonical(&self, value: &NaiveDate) -> String {
        value.format(LONG_DATE_FORMAT).to_string()
    }

    fn from_canonical(&self, canonical: &str) -> Result<NaiveDate, CanonicalError> {
        NaiveDate::parse_from_str(canonical, LONG_DATE_FORMAT)
            .map_err(|e| CanonicalError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{AsymmetricCodec, DateTimeCodec, DecimalCodec, LongDateCodec};
    use crate::testing;
    use chrono::{NaiveDateTime, TimeZone, Timelike};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn text_round_trips_through_codec() {
        let codec = AsymmetricCodec::new(testing::engine(), TextForm);
        for value in ["", "alice", "Zoë Ünïcode", "483920"] {
            let stored = codec.encode(&value.to_owned()).unwrap();
            assert_eq!(codec.decode(&stored).unwrap(), value);
        }
    }

    #[test]
    fn optional_text_keeps_empty_and_absent_apart() {
        let form = OptionalTextForm;
        assert_eq!(form.to_canonical(&None), "0");
        assert_eq!(form.to_canonical(&Some(String::new())), "1");
        assert_eq!(form.from_canonical("1").unwrap(), Some(String::new()));
        assert_eq!(form.from_canonical("0").unwrap(), None);
        assert_eq!(form.from_canonical("10").unwrap(), Some("0".to_owned()));
        assert!(form.from_canonical("").is_err());
        assert!(form.from_canonical("x").is_err());
    }

    #[test]
    fn optional_text_round_trips_through_codec() {
        let codec = AsymmetricCodec::new(testing::engine(), OptionalTextForm);
        for value in [None, Some(String::new()), Some("+1 555 0100".to_owned())] {
            let stored = codec.encode(&value).unwrap();
            assert_eq!(codec.decode(&stored).unwrap(), value);
        }
    }

    #[test]
    fn decimal_keeps_two_places_exactly() {
        let codec = DecimalCodec::new(testing::engine(), DecimalForm::default());
        for s in ["0.00", "12.50", "-1234567.89", "0.01", "99999999999.99"] {
            let value = dec(s);
            let decoded = codec.decode(&codec.encode(&value).unwrap()).unwrap();
            assert_eq!(decoded, value);
            // Scale survives too, not just numeric equality.
            assert_eq!(decoded.to_string(), s);
        }
    }

    #[test]
    fn decimal_with_scale_rounds_half_even() {
        let form = DecimalForm::with_scale(2);
        assert_eq!(form.to_canonical(&dec("12.345")), "12.34");
        assert_eq!(form.to_canonical(&dec("12.355")), "12.36");
        assert_eq!(form.to_canonical(&dec("7")), "7.00");
        assert_eq!(form.scale(), Some(2));
    }

    #[test]
    fn decimal_comparison_ignores_trailing_zeros() {
        let plain = DecimalForm::default();
        assert_eq!(plain.comparison_key(&dec("12.50")), "12.5");
        assert_eq!(plain.comparison_key(&dec("12.5")), "12.5");
        assert_eq!(plain.to_canonical(&dec("12.50")), "12.50");

        let cents = DecimalForm::with_scale(2);
        assert_eq!(cents.comparison_key(&dec("12.345")), "12.34");
        assert_eq!(cents.comparison_key(&dec("7")), "7");
    }

    #[test]
    fn decimal_rejects_garbage() {
        assert!(DecimalForm::default().from_canonical("12,50").is_err());
    }

    #[test]
    fn datetime_preserves_time_of_day() {
        let codec = DateTimeCodec::new(testing::engine(), DateTimeForm);
        let value = Utc
            .with_ymd_and_hms(2026, 10, 16, 14, 35, 9)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        let decoded = codec.decode(&codec.encode(&value).unwrap()).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(decoded.hour(), 14);
        assert_eq!(decoded.nanosecond(), 123_456_789);
    }

    #[test]
    fn datetime_canonical_is_rfc3339_utc() {
        let value = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(DateTimeForm.to_canonical(&value), "2026-01-02T03:04:05Z");
    }

    #[test]
    fn datetime_accepts_offsets_and_normalises_to_utc() {
        let parsed = DateTimeForm
            .from_canonical("2026-10-16T10:00:00+02:00")
            .unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap());
    }

    #[test]
    fn long_date_round_trips_calendar_dates() {
        let codec = LongDateCodec::new(testing::engine(), LongDateForm);
        for (y, m, d) in [(2026, 10, 16), (2000, 2, 29), (1999, 12, 31)] {
            let value = NaiveDate::from_ymd_opt(y, m, d).unwrap();
            assert_eq!(codec.decode(&codec.encode(&value).unwrap()).unwrap(), value);
        }
    }

    #[test]
    fn long_date_format_drops_time_of_day() {
        let moment: NaiveDateTime = NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let canonical = LongDateForm.to_canonical(&moment.date());
        assert_eq!(canonical, "Friday, October 16, 2026");
        // Only the calendar date comes back; the 23:59:59 is gone.
        let back = LongDateForm.from_canonical(&canonical).unwrap();
        assert_eq!(back.and_hms_opt(0, 0, 0).unwrap().time().hour(), 0);
        assert_ne!(back.and_hms_opt(0, 0, 0).unwrap(), moment);
    }

    #[test]
    fn long_date_rejects_wrong_weekday() {
        assert!(LongDateForm
            .from_canonical("Monday, October 16, 2026")
            .is_err());
    }
}
