use chrono::NaiveDate;

/// Short human date, e.g. `Mar 5, 2027`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

pub fn format_deadline(deadline: Option<NaiveDate>) -> String {
    match deadline {
        Some(date) => format_date(date),
        None => "Flexible".to_string(),
    }
}
