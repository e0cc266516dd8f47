//! This client fetches the InsideKino release schedule and parses it into film release events.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use chrono::{Datelike, Duration, Local, NaiveDate};
use ical::{
    generator::{IcalCalendar, IcalCalendarBuilder, IcalEvent, IcalEventBuilder, Property},
    ical_property,
};
use regex::Regex;
use reqwest::Response;
use scraper::{ElementRef, Html, Selector};

static URL: &str = "https://www.insidekino.com/DStarts/DStartplan.htm";
static PROD_ID: &str = "-//Deutsche Kinostarts//insidekino.com";
static CALENDAR_NAME: &str = "Deutsche Kinostarts";
static TIMEZONE: &str = "Europe/Berlin";
static FORMAT: &str = "%Y%m%d";

/// The class InsideKino puts on the cells of the date column.
static DATE_CELL_SELECTOR: &str = "td.auto-style68";

static MONTHS: [&str; 12] = [
    "Januar",
    "Februar",
    "März",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

/// Get the calendar of upcoming film release dates.
///
/// Only releases on or after `today` are included.
pub async fn get(today: NaiveDate) -> Result<IcalCalendar> {
    let response = get_response().await?;
    let events = parse(&response.text().await?, today)?;
    Ok(get_calendar(&events))
}

/// Get the release schedule page from InsideKino.
async fn get_response() -> Result<Response> {
    let client = reqwest::Client::new();
    let response = client.get(URL).send().await?;
    Ok(response.error_for_status()?)
}

/// Build the calendar from the harvested release events.
fn get_calendar(events: &[Event]) -> IcalCalendar {
    let changed = Local::now().format("%Y%m%dT%H%M%S").to_string();
    let mut calendar = IcalCalendarBuilder::version("2.0")
        .gregorian()
        .prodid(PROD_ID)
        .build();
    calendar
        .properties
        .push(ical_property!("X-WR-CALNAME", CALENDAR_NAME));
    calendar
        .properties
        .push(ical_property!("X-WR-TIMEZONE", TIMEZONE));
    let mut occurrences: HashMap<(NaiveDate, &str), u32> = HashMap::new();
    for event in events {
        let occurrence = occurrences
            .entry((event.date, event.title.as_str()))
            .and_modify(|occurrence| *occurrence += 1)
            .or_insert(1);
        calendar.events.push(get_event(event, *occurrence, &changed));
    }
    calendar
}

/// Build an all-day event for a film release.
///
/// The end date is exclusive, so it is the day after the release date.
fn get_event(event: &Event, occurrence: u32, changed: &str) -> IcalEvent {
    let start = event.date.format(FORMAT).to_string();
    let end = (event.date + Duration::days(1)).format(FORMAT).to_string();
    IcalEventBuilder::tzid(TIMEZONE)
        .uid(uid(&event.date, &event.title, occurrence))
        .changed(changed)
        .start_day(start)
        .end_day(end)
        .set(ical_property!("SUMMARY", event.title.as_str()))
        .build()
}

/// Get a unique id for a film release event.
///
/// The id is derived from date and title, so refreshing the feed keeps the
/// identity of unchanged events stable. The same title can start twice on one
/// date in different distribution categories; the occurrence counter keeps
/// those ids distinct. Changing this function is a breaking change!
fn uid(date: &NaiveDate, title: &str, occurrence: u32) -> String {
    let whitespace_regex = Regex::new(r"\s+").unwrap();
    let title = whitespace_regex.replace_all(title, "-");
    let date = date.format(FORMAT);
    match occurrence {
        1 => format!("Kinostart_{date}_{title}@insidekino.com"),
        occurrence => format!("Kinostart_{date}_{title}_{occurrence}@insidekino.com"),
    }
}

/// Parse the release schedule page into film release events.
///
/// Cells with unparseable dates are skipped, as are releases before `today`.
/// A date cell without a following title row means the page layout changed
/// and is an error.
fn parse(html: &str, today: NaiveDate) -> Result<Vec<Event>> {
    let dom = Html::parse_document(html);
    let date_cell_selector = Selector::parse(DATE_CELL_SELECTOR).unwrap();
    let upcoming_years: Vec<String> = (today.year()..today.year() + 10)
        .map(|year| year.to_string())
        .collect();
    let mut events: Vec<Event> = vec![];
    for date_cell in dom.select(&date_cell_selector) {
        let date_text: String = date_cell.text().map(str::trim).collect();
        if !upcoming_years.iter().any(|year| date_text.contains(year)) {
            continue;
        }
        let Ok(date) = parse_date(&date_text) else {
            continue;
        };
        if date < today {
            continue;
        }
        let titles: Vec<String> = title_cells(date_cell)?
            .iter()
            .flat_map(|cell| parse_titles(cell))
            .collect();
        for title in merge_split_titles(&titles) {
            events.push(Event { date, title });
        }
    }
    Ok(events)
}

/// Collect the text of every cell in the row directly below the date row.
///
/// The `<br>` breaks of the source markup become newlines in the cell text.
/// This is the only place tied to the page's row layout.
fn title_cells(date_cell: ElementRef) -> Result<Vec<String>> {
    let cell_selector = Selector::parse("td").unwrap();
    let date_row = date_cell
        .ancestors()
        .find_map(|node| ElementRef::wrap(node).filter(|element| element.value().name() == "tr"))
        .ok_or_else(|| anyhow!("date cell is not part of a table row"))?;
    let title_row = date_row
        .next_siblings()
        .find_map(|node| ElementRef::wrap(node).filter(|element| element.value().name() == "tr"))
        .ok_or_else(|| anyhow!("no title row follows the date row"))?;
    Ok(title_row
        .select(&cell_selector)
        .map(|cell| cell.text().collect::<Vec<_>>().join("\n"))
        .collect())
}

/// Parse a German date string like "7. August 2025" into a date.
///
/// Annotations in parentheses, e.g. "14. August 2025 (Mariä Himmelfahrt/Fr)",
/// are ignored.
fn parse_date(date_text: &str) -> Result<NaiveDate> {
    let date_text = match date_text.split_once('(') {
        Some((date_text, _)) => date_text,
        None => date_text,
    }
    .trim();
    let tokens: Vec<&str> = date_text.split_whitespace().collect();
    let &[day, month_name, year] = tokens.as_slice() else {
        bail!("expected \"<day>. <month> <year>\", got {date_text:?}");
    };
    let day: u32 = day.trim_end_matches('.').parse()?;
    let month =
        month_number(month_name).ok_or_else(|| anyhow!("unknown month name {month_name:?}"))?;
    let year: i32 = year.parse()?;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| anyhow!("no such calendar date: {date_text:?}"))
}

fn month_number(name: &str) -> Option<u32> {
    MONTHS
        .iter()
        .position(|month| *month == name)
        .map(|index| index as u32 + 1)
}

/// Extract film titles from the text of a single table cell.
///
/// Lines starting with a parenthesis or the re-release marker "WA" carry the
/// distributor code of the previous line and are appended to it.
fn parse_titles(text: &str) -> Vec<String> {
    let mut titles: Vec<String> = vec![];
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match titles.last_mut() {
            Some(title) if line.starts_with('(') || line.starts_with("WA") => {
                title.push(' ');
                title.push_str(line);
            }
            _ => titles.push(String::from(line)),
        }
    }
    titles
}

/// Join titles whose distributor code ended up in the following fragment.
///
/// A fragment without parentheses directly before one with parentheses is one
/// title split across cell boundaries, e.g. "Plattfuß am" and "Nil (CRC) WA".
fn merge_split_titles(titles: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = vec![];
    let mut index = 0;
    while index < titles.len() {
        match titles.get(index + 1) {
            Some(next) if !titles[index].contains('(') && next.contains('(') => {
                merged.push(format!("{} {}", titles[index], next));
                index += 2;
            }
            _ => {
                merged.push(titles[index].clone());
                index += 1;
            }
        }
    }
    merged
}

/// A film release: one title on one start date.
///
/// The same title may appear more than once per date when it starts in
/// several distribution categories.
#[derive(Debug, PartialEq)]
struct Event {
    pub date: NaiveDate,
    pub title: String,
}
