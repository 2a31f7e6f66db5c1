//! The weekly meetings of a section

use chrono::{DateTime, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde_json::Value;

use crate::error::OsmError;
use crate::record::Record;
use crate::traits::RecordView;
use crate::utils::{id_of, items_of, localize, parse_date, parse_time, text_of};

/// A meeting of the programme
#[derive(Clone, Debug, PartialEq)]
pub struct Meeting {
    id: String,
    title: String,
    meeting_date: NaiveDate,
    start_time: DateTime<Tz>,
    end_time: DateTime<Tz>,
    record: Record,
}

impl Meeting {
    /// Build a meeting from a programme summary record.
    ///
    /// Meeting times are often left blank or mistyped by leaders: a bad start time becomes midday,
    /// a bad end time becomes the start time. Only the date is mandatory.
    pub fn from_record(record: Record) -> Result<Self, OsmError> {
        let id = id_of(&record, "eveningid", "Meeting")?;
        let title = text_of(&record, "title").unwrap_or_default().to_string();

        let date_text = text_of(&record, "meetingdate").unwrap_or_default();
        let meeting_date = parse_date(date_text)
            .ok_or_else(|| OsmError::invalid("Meeting", format!("meeting {} has an invalid date {:?}", id, date_text)))?;

        let start = text_of(&record, "starttime")
            .and_then(parse_time)
            .unwrap_or_else(midday);
        let end = text_of(&record, "endtime")
            .and_then(parse_time)
            .unwrap_or(start);

        Ok(Self {
            id,
            title,
            meeting_date,
            start_time: localize(meeting_date, start),
            end_time: localize(meeting_date, end),
            record,
        })
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn title(&self) -> &str { &self.title }
    pub fn meeting_date(&self) -> NaiveDate { self.meeting_date }
    pub fn start_time(&self) -> DateTime<Tz> { self.start_time }
    pub fn end_time(&self) -> DateTime<Tz> { self.end_time }
}

impl RecordView for Meeting {
    fn kind(&self) -> &'static str { "Meeting" }
    fn record(&self) -> &Record { &self.record }
}

fn midday() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN)
}


/// The meetings of a section for a term
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Programme {
    meetings: Vec<Meeting>,
}

impl Programme {
    pub fn new(meetings: Vec<Meeting>) -> Self {
        Self { meetings }
    }

    /// Parse the programme summary. Meetings with an invalid date are skipped with a warning
    pub fn from_value(value: &Value, section: &str) -> Self {
        let meetings = items_of(value)
            .into_iter()
            .filter_map(|record| match Meeting::from_record(record) {
                Ok(meeting) => Some(meeting),
                Err(err) => {
                    log::warn!("{}: skipping a meeting: {}", section, err);
                    None
                },
            })
            .collect();
        Self { meetings }
    }

    /// The meetings, in the order OSM returned them
    pub fn meetings(&self) -> &[Meeting] {
        &self.meetings
    }

    /// The meetings sorted by date, then start time
    pub fn meetings_by_date(&self) -> Vec<&Meeting> {
        let mut sorted: Vec<&Meeting> = self.meetings.iter().collect();
        sorted.sort_by_key(|m| (m.meeting_date, m.start_time));
        sorted
    }

    pub fn len(&self) -> usize {
        self.meetings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meetings.is_empty()
    }
}
