//! Events (camps, trips, nights away...) of a section

use chrono::{DateTime, NaiveTime};
use chrono_tz::Tz;
use serde_json::Value;

use crate::error::OsmError;
use crate::record::Record;
use crate::traits::RecordView;
use crate::utils::{id_of, items_of, localize, parse_date, parse_time, text_of};

/// An event, with its start and end localised to the OSM timezone
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    id: String,
    name: String,
    start_time: DateTime<Tz>,
    end_time: DateTime<Tz>,
    record: Record,
}

impl Event {
    /// Build an event from an events summary record.
    ///
    /// A missing start time means midnight, a missing end time means the start time,
    /// and a missing end date means the event ends the day it starts. An event never ends before it starts.
    /// A date or time that is present but cannot be parsed makes the whole record invalid.
    pub fn from_record(record: Record) -> Result<Self, OsmError> {
        let id = id_of(&record, "eventid", "Event")?;
        let name = text_of(&record, "name").unwrap_or_default().to_string();

        let start_date = text_of(&record, "startdate")
            .ok_or_else(|| OsmError::invalid("Event", format!("event {} has no start date", id)))?;
        let start_date = parse_date(start_date)
            .ok_or_else(|| OsmError::invalid("Event", format!("event {} has an invalid start date {:?}", id, start_date)))?;
        let end_date = match text_of(&record, "enddate") {
            None => start_date,
            Some(text) => parse_date(text)
                .ok_or_else(|| OsmError::invalid("Event", format!("event {} has an invalid end date {:?}", id, text)))?,
        };

        let start = time_field(&record, "starttime", &id)?.unwrap_or(NaiveTime::MIN);
        let end = time_field(&record, "endtime", &id)?.unwrap_or(start);

        let start_time = localize(start_date, start);
        let mut end_time = localize(end_date, end);
        if end_time < start_time {
            log::debug!("Event {} ends before it starts, using its start as its end", id);
            end_time = start_time;
        }

        Ok(Self {
            id,
            name,
            start_time,
            end_time,
            record,
        })
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn start_time(&self) -> DateTime<Tz> { self.start_time }
    pub fn end_time(&self) -> DateTime<Tz> { self.end_time }
}

impl RecordView for Event {
    fn kind(&self) -> &'static str { "Event" }
    fn record(&self) -> &Record { &self.record }
}

fn time_field(record: &Record, key: &str, id: &str) -> Result<Option<NaiveTime>, OsmError> {
    match text_of(record, key) {
        None => Ok(None),
        Some(text) => parse_time(text)
            .map(Some)
            .ok_or_else(|| OsmError::invalid("Event", format!("event {} has an invalid {} {:?}", id, key, text))),
    }
}

/// Parse the events summary. Invalid events are skipped with a warning
pub fn events_from_value(value: &Value, section: &str) -> Vec<Event> {
    items_of(value)
        .into_iter()
        .filter_map(|record| match Event::from_record(record) {
            Ok(event) => Some(event),
            Err(err) => {
                log::warn!("{}: skipping an event: {}", section, err);
                None
            },
        })
        .collect()
}
