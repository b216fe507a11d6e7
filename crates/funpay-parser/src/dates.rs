use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

const TODAY: [&str; 3] = ["сегодня", "сьогодні", "today"];
const YESTERDAY: [&str; 3] = ["вчера", "вчора", "yesterday"];

fn month_number(name: &str) -> Option<u32> {
    let month = match name {
        "января" | "січня" | "January" => 1,
        "февраля" | "лютого" | "February" => 2,
        "марта" | "березня" | "March" => 3,
        "апреля" | "квітня" | "April" => 4,
        "мая" | "травня" | "May" => 5,
        "июня" | "червня" | "June" => 6,
        "июля" | "липня" | "July" => 7,
        "августа" | "серпня" | "August" => 8,
        "сентября" | "вересня" | "September" => 9,
        "октября" | "жовтня" | "October" => 10,
        "ноября" | "листопада" | "November" => 11,
        "декабря" | "грудня" | "December" => 12,
        _ => return None,
    };
    Some(month)
}

fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let (hours, minutes) = raw.trim().split_once(':')?;
    NaiveTime::from_hms_opt(hours.trim().parse().ok()?, minutes.trim().parse().ok()?, 0)
}

/// Parses the sales listing's relative or absolute creation time.
///
/// Accepted shapes: `today, HH:MM`, `yesterday, HH:MM`, `DD month, HH:MM` and
/// `DD month YYYY, HH:MM`, in Russian, Ukrainian or English.
pub fn parse_order_date(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let (day_part, clock_part) = text.trim().split_once(", ")?;
    let time = parse_clock(clock_part)?;
    let day_part = day_part.trim();

    if TODAY.iter().any(|word| day_part.contains(word)) {
        return Some(now.date().and_time(time));
    }
    if YESTERDAY.iter().any(|word| day_part.contains(word)) {
        return Some((now.date() - Duration::days(1)).and_time(time));
    }

    let mut pieces = day_part.split_whitespace();
    let day: u32 = pieces.next()?.parse().ok()?;
    let month = month_number(pieces.next()?)?;
    let year = match pieces.next() {
        Some(raw) => raw.parse().ok()?,
        None => now.year(),
    };
    Some(NaiveDate::from_ymd_opt(year, month, day)?.and_time(time))
}
