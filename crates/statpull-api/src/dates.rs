// Date-range arithmetic for day-level report chunking.

use chrono::NaiveDate;

use crate::error::Error;

/// Date format used by both providers' query parameters.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Every calendar day in `start..=end`, in chronological order.
pub fn split_days(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, Error> {
    if end < start {
        return Err(Error::InvalidDateRange {
            start: format_date(start),
            end: format_date(end),
        });
    }
    Ok(start.iter_days().take_while(|d| *d <= end).collect())
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| Error::SamplingRecovery {
        message: format!("cannot parse {raw:?} as {DATE_FORMAT}: {e}"),
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn d(raw: &str) -> NaiveDate {
        parse_date(raw).unwrap()
    }

    #[test]
    fn splits_across_month_boundary() {
        let days = split_days(d("2024-02-27"), d("2024-03-02")).unwrap();
        let rendered: Vec<String> = days.into_iter().map(format_date).collect();
        assert_eq!(
            rendered,
            ["2024-02-27", "2024-02-28", "2024-02-29", "2024-03-01", "2024-03-02"]
        );
    }

    #[test]
    fn single_day_range() {
        assert_eq!(split_days(d("2024-01-01"), d("2024-01-01")).unwrap().len(), 1);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = split_days(d("2024-01-05"), d("2024-01-01")).unwrap_err();
        assert!(matches!(err, Error::InvalidDateRange { .. }));
    }

    #[test]
    fn relative_dates_cannot_be_split() {
        assert!(matches!(
            parse_date("7daysAgo"),
            Err(Error::SamplingRecovery { .. })
        ));
    }
}
