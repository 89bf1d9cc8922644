//! iCalendar feed parsing.
//!
//! Decodes the raw bytes of a fetched resource, reads the VCALENDAR and
//! produces `RemoteEvent`s grouped by UID. VEVENTs that carry a
//! RECURRENCE-ID are override instances and are attached to their master
//! event as exceptions; the master events keep the order they had in the
//! feed.

use std::collections::HashMap;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use icalendar::parser::{read_calendar, unfold, Component, Property};
use icalendar::{CalendarDateTime, DatePerhapsTime};

use crate::error::{AppResult, SyncError};
use crate::models::{CalendarMetadata, RemoteEvent};

/// Everything a feed contributes to the local calendar.
#[derive(Debug, Clone, Default)]
pub struct ParsedCalendar {
    pub metadata: CalendarMetadata,
    pub events: Vec<RemoteEvent>,
}

/// Parses a fetched resource into calendar metadata and events.
///
/// `charset` is the label from the Content-Type header; anything unknown
/// (or absent) falls back to UTF-8.
pub fn parse_calendar(data: &[u8], charset: Option<&str>) -> AppResult<ParsedCalendar> {
    let text = decode(data, charset);
    let unfolded = unfold(&text);
    let calendar = read_calendar(&unfolded).map_err(SyncError::parse)?;

    let mut calendar_props: Vec<&Property> = calendar.properties.iter().collect();
    let mut vevents: Vec<&Component> = Vec::new();
    for component in &calendar.components {
        collect_components(component, &mut calendar_props, &mut vevents);
    }

    let metadata = CalendarMetadata {
        name: find_calendar_prop(&calendar_props, &["NAME", "X-WR-CALNAME"])
            .map(|p| p.val.to_string()),
        color: find_calendar_prop(&calendar_props, &["COLOR", "X-APPLE-CALENDAR-COLOR"])
            .and_then(|p| parse_css_color(p.val.as_ref())),
    };

    // group VEVENTs by UID, keeping first-seen order of the UIDs
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<RemoteEvent>> = HashMap::new();
    for vevent in vevents {
        let Some(uid) = vevent.find_prop("UID").map(|p| p.val.to_string()) else {
            log::warn!("Ignoring VEVENT without UID");
            continue;
        };
        let event = parse_event(vevent, uid.clone());
        if !groups.contains_key(&uid) {
            order.push(uid.clone());
        }
        groups.entry(uid).or_default().push(event);
    }

    let events = order
        .into_iter()
        .filter_map(|uid| groups.remove(&uid))
        .map(assemble_group)
        .collect();

    Ok(ParsedCalendar { metadata, events })
}

fn decode(data: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, had_errors) = encoding.decode(data);
    if had_errors {
        log::warn!("Malformed {} input, replacement characters inserted", encoding.name());
    }
    text.into_owned()
}

/// Collects calendar-level properties and VEVENTs wherever the parser put
/// them, including inside a retained VCALENDAR wrapper component.
fn collect_components<'a>(
    component: &'a Component<'a>,
    calendar_props: &mut Vec<&'a Property<'a>>,
    vevents: &mut Vec<&'a Component<'a>>,
) {
    if component.name == "VEVENT" {
        vevents.push(component);
    } else {
        if component.name == "VCALENDAR" {
            calendar_props.extend(component.properties.iter());
        }
        for child in &component.components {
            collect_components(child, calendar_props, vevents);
        }
    }
}

fn find_calendar_prop<'a>(
    properties: &[&'a Property<'a>],
    names: &[&str],
) -> Option<&'a Property<'a>> {
    names
        .iter()
        .find_map(|wanted| properties.iter().find(|p| p.name == *wanted).copied())
}

/// `#RRGGBB` or `#AARRGGBB` to an ARGB integer.
pub fn parse_css_color(value: &str) -> Option<i32> {
    let hex = value.trim().strip_prefix('#')?;
    match hex.len() {
        6 => u32::from_str_radix(hex, 16)
            .ok()
            .map(|rgb| (0xFF00_0000u32 | rgb) as i32),
        8 => u32::from_str_radix(hex, 16).ok().map(|argb| argb as i32),
        _ => None,
    }
}

fn parse_event(vevent: &Component, uid: String) -> RemoteEvent {
    let mut event = RemoteEvent::new(uid);

    event.recurrence_id = vevent.find_prop("RECURRENCE-ID").map(|p| p.val.to_string());
    event.summary = vevent.find_prop("SUMMARY").map(|p| p.val.to_string());
    event.description = vevent.find_prop("DESCRIPTION").map(|p| p.val.to_string());
    event.location = vevent.find_prop("LOCATION").map(|p| p.val.to_string());
    event.rrule = vevent.find_prop("RRULE").map(|p| p.val.to_string());

    if let Some(prop) = vevent.find_prop("DTSTART") {
        if let Ok(dpt) = DatePerhapsTime::try_from(prop) {
            event.all_day = matches!(dpt, DatePerhapsTime::Date(_));
            event.start = to_utc(dpt);
        }
    }
    if let Some(prop) = vevent.find_prop("DTEND") {
        if let Ok(dpt) = DatePerhapsTime::try_from(prop) {
            event.end = to_utc(dpt);
        }
    }

    event.last_modified = vevent
        .find_prop("LAST-MODIFIED")
        .and_then(|p| parse_utc_stamp(p.val.as_ref()));

    event.reminders = vevent
        .components
        .iter()
        .filter(|c| c.name == "VALARM")
        .filter_map(|alarm| {
            let trigger = alarm.find_prop("TRIGGER")?.val.as_ref();
            parse_trigger_minutes(trigger)
        })
        .collect();

    event
}

/// The master is the first VEVENT without a RECURRENCE-ID; every other
/// instance becomes an exception. A group consisting solely of overrides
/// has lost its master upstream, so the first override stands in for it.
fn assemble_group(mut group: Vec<RemoteEvent>) -> RemoteEvent {
    let master_index = group
        .iter()
        .position(|e| e.recurrence_id.is_none())
        .unwrap_or(0);
    let mut master = group.remove(master_index);
    master.exceptions = group;
    master
}

/// Converts any iCalendar date or date-time shape to UTC. Date-only values
/// map to midnight UTC; floating times are interpreted in the system zone.
fn to_utc(dpt: DatePerhapsTime) -> Option<DateTime<Utc>> {
    match dpt {
        DatePerhapsTime::Date(date) => Some(date.and_hms_opt(0, 0, 0)?.and_utc()),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(datetime)) => Some(datetime),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => Local
            .from_local_datetime(&naive)
            .single()
            .map(|local| local.with_timezone(&Utc)),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            match tzid.parse::<chrono_tz::Tz>() {
                Ok(tz) => tz
                    .from_local_datetime(&date_time)
                    .single()
                    .map(|zoned| zoned.with_timezone(&Utc)),
                Err(_) => {
                    log::warn!("Unrecognized timezone '{tzid}', treating as local time");
                    Local
                        .from_local_datetime(&date_time)
                        .single()
                        .map(|local| local.with_timezone(&Utc))
                }
            }
        }
    }
}

/// `20240102T100000Z` to epoch milliseconds.
fn parse_utc_stamp(value: &str) -> Option<i64> {
    let naive =
        NaiveDateTime::parse_from_str(value.trim_end_matches('Z'), "%Y%m%dT%H%M%S").ok()?;
    Some(naive.and_utc().timestamp_millis())
}

/// TRIGGER duration to minutes before the event start (`-PT15M` is 15).
/// Triggers after the start come out negative; absolute-time triggers are
/// not durations and yield `None`.
fn parse_trigger_minutes(value: &str) -> Option<i64> {
    let is_before = value.starts_with('-');
    let duration_str = value.trim_start_matches(['-', '+']);
    let duration = iso8601::duration(duration_str).ok()?;
    let std_duration: std::time::Duration = duration.into();
    let minutes = (std_duration.as_secs() / 60) as i64;
    Some(if is_before { minutes } else { -minutes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse(ics: &str) -> ParsedCalendar {
        parse_calendar(ics.as_bytes(), None).unwrap()
    }

    #[test]
    fn test_parse_basic_event() {
        let parsed = parse(
            "BEGIN:VCALENDAR\r\n\
             VERSION:2.0\r\n\
             PRODID:TEST\r\n\
             BEGIN:VEVENT\r\n\
             UID:event1@example.com\r\n\
             SUMMARY:Team meeting\r\n\
             DESCRIPTION:Weekly status\r\n\
             LOCATION:Room 4\r\n\
             DTSTART:20240102T100000Z\r\n\
             DTEND:20240102T110000Z\r\n\
             LAST-MODIFIED:20240101T120000Z\r\n\
             END:VEVENT\r\n\
             END:VCALENDAR\r\n",
        );

        assert_eq!(parsed.events.len(), 1);
        let event = &parsed.events[0];
        assert_eq!(event.uid, "event1@example.com");
        assert_eq!(event.summary.as_deref(), Some("Team meeting"));
        assert_eq!(event.location.as_deref(), Some("Room 4"));
        assert_eq!(
            event.start,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap())
        );
        assert!(!event.all_day);
        assert_eq!(
            event.last_modified,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap().timestamp_millis())
        );
    }

    #[test]
    fn test_calendar_metadata() {
        let parsed = parse(
            "BEGIN:VCALENDAR\r\n\
             VERSION:2.0\r\n\
             PRODID:TEST\r\n\
             X-WR-CALNAME:Holidays\r\n\
             COLOR:#112233\r\n\
             END:VCALENDAR\r\n",
        );
        assert_eq!(parsed.metadata.name.as_deref(), Some("Holidays"));
        assert_eq!(parsed.metadata.color, Some(0xFF112233u32 as i32));
    }

    #[test]
    fn test_uid_less_event_skipped() {
        let parsed = parse(
            "BEGIN:VCALENDAR\r\n\
             VERSION:2.0\r\n\
             PRODID:TEST\r\n\
             BEGIN:VEVENT\r\n\
             SUMMARY:No UID here\r\n\
             DTSTART:20240102T100000Z\r\n\
             END:VEVENT\r\n\
             BEGIN:VEVENT\r\n\
             UID:kept@example.com\r\n\
             SUMMARY:Kept\r\n\
             DTSTART:20240102T100000Z\r\n\
             END:VEVENT\r\n\
             END:VCALENDAR\r\n",
        );
        assert_eq!(parsed.events.len(), 1);
        assert_eq!(parsed.events[0].uid, "kept@example.com");
    }

    #[test]
    fn test_recurrence_override_attached_to_master() {
        let parsed = parse(
            "BEGIN:VCALENDAR\r\n\
             VERSION:2.0\r\n\
             PRODID:TEST\r\n\
             BEGIN:VEVENT\r\n\
             UID:weekly@example.com\r\n\
             SUMMARY:Weekly\r\n\
             DTSTART:20240101T100000Z\r\n\
             RRULE:FREQ=WEEKLY\r\n\
             LAST-MODIFIED:20240101T000000Z\r\n\
             END:VEVENT\r\n\
             BEGIN:VEVENT\r\n\
             UID:weekly@example.com\r\n\
             RECURRENCE-ID:20240108T100000Z\r\n\
             SUMMARY:Weekly (moved)\r\n\
             DTSTART:20240108T120000Z\r\n\
             LAST-MODIFIED:20240105T000000Z\r\n\
             END:VEVENT\r\n\
             END:VCALENDAR\r\n",
        );

        assert_eq!(parsed.events.len(), 1);
        let master = &parsed.events[0];
        assert!(master.recurrence_id.is_none());
        assert_eq!(master.rrule.as_deref(), Some("FREQ=WEEKLY"));
        assert_eq!(master.exceptions.len(), 1);
        assert_eq!(
            master.exceptions[0].recurrence_id.as_deref(),
            Some("20240108T100000Z")
        );
        assert_eq!(master.exceptions[0].summary.as_deref(), Some("Weekly (moved)"));
    }

    #[test]
    fn test_override_before_master_still_grouped() {
        let parsed = parse(
            "BEGIN:VCALENDAR\r\n\
             VERSION:2.0\r\n\
             PRODID:TEST\r\n\
             BEGIN:VEVENT\r\n\
             UID:weekly@example.com\r\n\
             RECURRENCE-ID:20240108T100000Z\r\n\
             SUMMARY:Moved\r\n\
             DTSTART:20240108T120000Z\r\n\
             END:VEVENT\r\n\
             BEGIN:VEVENT\r\n\
             UID:weekly@example.com\r\n\
             SUMMARY:Weekly\r\n\
             DTSTART:20240101T100000Z\r\n\
             RRULE:FREQ=WEEKLY\r\n\
             END:VEVENT\r\n\
             END:VCALENDAR\r\n",
        );

        assert_eq!(parsed.events.len(), 1);
        let master = &parsed.events[0];
        assert!(master.recurrence_id.is_none());
        assert_eq!(master.exceptions.len(), 1);
    }

    #[test]
    fn test_orphan_override_stands_in_for_master() {
        let parsed = parse(
            "BEGIN:VCALENDAR\r\n\
             VERSION:2.0\r\n\
             PRODID:TEST\r\n\
             BEGIN:VEVENT\r\n\
             UID:orphan@example.com\r\n\
             RECURRENCE-ID:20240108T100000Z\r\n\
             SUMMARY:Orphan\r\n\
             DTSTART:20240108T120000Z\r\n\
             END:VEVENT\r\n\
             END:VCALENDAR\r\n",
        );

        assert_eq!(parsed.events.len(), 1);
        assert_eq!(parsed.events[0].recurrence_id.as_deref(), Some("20240108T100000Z"));
        assert!(parsed.events[0].exceptions.is_empty());
    }

    #[test]
    fn test_all_day_event() {
        let parsed = parse(
            "BEGIN:VCALENDAR\r\n\
             VERSION:2.0\r\n\
             PRODID:TEST\r\n\
             BEGIN:VEVENT\r\n\
             UID:allday@example.com\r\n\
             SUMMARY:Holiday\r\n\
             DTSTART;VALUE=DATE:20240102\r\n\
             DTEND;VALUE=DATE:20240103\r\n\
             END:VEVENT\r\n\
             END:VCALENDAR\r\n",
        );

        let event = &parsed.events[0];
        assert!(event.all_day);
        assert_eq!(
            event.start,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(
            event.end,
            Some(Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_zoned_datetime_converted_to_utc() {
        let parsed = parse(
            "BEGIN:VCALENDAR\r\n\
             VERSION:2.0\r\n\
             PRODID:TEST\r\n\
             BEGIN:VEVENT\r\n\
             UID:zoned@example.com\r\n\
             SUMMARY:Zoned\r\n\
             DTSTART;TZID=America/New_York:20240102T120000\r\n\
             END:VEVENT\r\n\
             END:VCALENDAR\r\n",
        );

        // 12:00 New York in January is 17:00 UTC
        assert_eq!(
            parsed.events[0].start,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 17, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_valarm_triggers() {
        let parsed = parse(
            "BEGIN:VCALENDAR\r\n\
             VERSION:2.0\r\n\
             PRODID:TEST\r\n\
             BEGIN:VEVENT\r\n\
             UID:alarms@example.com\r\n\
             SUMMARY:Alarms\r\n\
             DTSTART:20240102T100000Z\r\n\
             BEGIN:VALARM\r\n\
             ACTION:DISPLAY\r\n\
             TRIGGER:-PT15M\r\n\
             END:VALARM\r\n\
             BEGIN:VALARM\r\n\
             ACTION:DISPLAY\r\n\
             TRIGGER:-P1D\r\n\
             END:VALARM\r\n\
             END:VEVENT\r\n\
             END:VCALENDAR\r\n",
        );

        assert_eq!(parsed.events[0].reminders, vec![15, 1440]);
    }

    #[test]
    fn test_folded_lines() {
        let parsed = parse(
            "BEGIN:VCALENDAR\r\n\
             VERSION:2.0\r\n\
             PRODID:TEST\r\n\
             BEGIN:VEVENT\r\n\
             UID:folded@example.com\r\n\
             SUMMARY:A very long su\r\n mmary line\r\n\
             DTSTART:20240102T100000Z\r\n\
             END:VEVENT\r\n\
             END:VCALENDAR\r\n",
        );
        assert_eq!(
            parsed.events[0].summary.as_deref(),
            Some("A very long summary line")
        );
    }

    #[test]
    fn test_latin1_charset_decoded() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(
            b"BEGIN:VCALENDAR\r\n\
              VERSION:2.0\r\n\
              PRODID:TEST\r\n\
              BEGIN:VEVENT\r\n\
              UID:latin1@example.com\r\n\
              SUMMARY:Caf",
        );
        bytes.push(0xE9); // 'e' acute in ISO-8859-1
        bytes.extend_from_slice(
            b"\r\n\
              DTSTART:20240102T100000Z\r\n\
              END:VEVENT\r\n\
              END:VCALENDAR\r\n",
        );

        let parsed = parse_calendar(&bytes, Some("ISO-8859-1")).unwrap();
        assert_eq!(parsed.events[0].summary.as_deref(), Some("Caf\u{e9}"));
    }

    #[test]
    fn test_garbage_input_is_parse_error() {
        let result = parse_calendar(b"not a calendar at all", None);
        assert!(matches!(result, Err(SyncError::Parse(_))));
    }

    #[test]
    fn test_css_color_parsing() {
        assert_eq!(parse_css_color("#112233"), Some(0xFF112233u32 as i32));
        assert_eq!(parse_css_color("#80112233"), Some(0x80112233u32 as i32));
        assert_eq!(parse_css_color("red"), None);
        assert_eq!(parse_css_color("#12"), None);
    }
}
