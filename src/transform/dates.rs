//! Calendar conversions for Thai solar (Buddhist era) and English-layout dates.

use chrono::NaiveDate;

/// Offset between the Thai solar calendar year and the Gregorian year.
pub const BUDDHIST_ERA_OFFSET: i64 = 543;

/// Layouts tried by [`eng_date_to_iso`], first match wins.
const ENG_DATE_LAYOUTS: &[&str] = &["%m/%d/%Y", "%m-%d-%Y", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// Converts `YYYY-MM-DD` with a Buddhist-era year into ISO form.
///
/// Returns `None` when the input does not split into exactly three numeric,
/// hyphen-separated parts. Month and day ranges are not checked.
pub fn buddhist_to_iso(value: &str) -> Option<String> {
    let parts = value.trim().split('-').collect::<Vec<_>>();
    let [year, month, day] = parts.as_slice() else {
        return None;
    };
    let year = parse_part(year)? - BUDDHIST_ERA_OFFSET;
    let month = parse_part(month)?;
    let day = parse_part(day)?;
    Some(format!("{year:04}-{month:02}-{day:02}"))
}

/// Converts common English date layouts into ISO `YYYY-MM-DD`.
pub fn eng_date_to_iso(value: &str) -> Option<String> {
    let trimmed = value.trim();
    ENG_DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(trimmed, layout).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// True when the value is a real calendar date in ISO `YYYY-MM-DD` form.
pub fn is_iso_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").is_ok()
}

fn parse_part(part: &str) -> Option<i64> {
    part.trim().parse::<i64>().ok()
}
