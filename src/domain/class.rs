use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset, Weekday};

use crate::domain::session::TimeRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }

    pub fn weekday(&self) -> Weekday {
        match self {
            DayOfWeek::Monday => Weekday::Monday,
            DayOfWeek::Tuesday => Weekday::Tuesday,
            DayOfWeek::Wednesday => Weekday::Wednesday,
            DayOfWeek::Thursday => Weekday::Thursday,
            DayOfWeek::Friday => Weekday::Friday,
            DayOfWeek::Saturday => Weekday::Saturday,
            DayOfWeek::Sunday => Weekday::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "monday" => Ok(DayOfWeek::Monday),
            "tuesday" => Ok(DayOfWeek::Tuesday),
            "wednesday" => Ok(DayOfWeek::Wednesday),
            "thursday" => Ok(DayOfWeek::Thursday),
            "friday" => Ok(DayOfWeek::Friday),
            "saturday" => Ok(DayOfWeek::Saturday),
            "sunday" => Ok(DayOfWeek::Sunday),
            other => Err(format!("unknown day: {}", other)),
        }
    }
}

/// A recurring weekly slot, in minutes since local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySlot {
    pub day: DayOfWeek,
    start_minute: u16,
    end_minute: u16,
}

impl WeeklySlot {
    pub fn parse(day: DayOfWeek, start: &str, end: &str) -> Result<Self, String> {
        let start_minute = parse_hhmm(start)?;
        let end_minute = parse_hhmm(end)?;
        if start_minute >= end_minute {
            return Err("startTime must be before endTime".to_string());
        }
        Ok(Self {
            day,
            start_minute,
            end_minute,
        })
    }

    pub fn overlaps(&self, other: &WeeklySlot) -> bool {
        self.day == other.day
            && self.start_minute < other.end_minute
            && other.start_minute < self.end_minute
    }

    /// True when the range lies on this slot's weekday and inside its hours,
    /// judged in the offset the range's start was expressed in.
    pub fn contains(&self, range: &TimeRange) -> bool {
        let start = range.start();
        let end = range.end().to_offset(start.offset());
        if start.weekday() != self.day.weekday() || end.date() != start.date() {
            return false;
        }
        minute_of_day(start) >= self.start_minute && minute_of_day(end) <= self.end_minute
    }

    /// The slot's concrete ranges for `weeks` consecutive weeks, starting with
    /// the first matching weekday on or after `from`.
    pub fn occurrences(&self, from: Date, weeks: u32, offset: UtcOffset) -> Vec<TimeRange> {
        let mut ranges = Vec::with_capacity(weeks as usize);
        let mut next = Some(from);
        while let Some(date) = next {
            if date.weekday() == self.day.weekday() {
                break;
            }
            next = date.checked_add(Duration::days(1));
        }

        // Weeks past the last representable date are dropped.
        for _ in 0..weeks {
            let Some(date) = next else { break };
            let start = at_minute(date, self.start_minute, offset);
            let end = at_minute(date, self.end_minute, offset);
            if let Some(range) = start.zip(end).and_then(|(start, end)| TimeRange::new(start, end)) {
                ranges.push(range);
            }
            next = date.checked_add(Duration::weeks(1));
        }
        ranges
    }
}

fn parse_hhmm(value: &str) -> Result<u16, String> {
    let invalid = || format!("invalid time '{}', expected HH:MM", value);
    let (hours, minutes) = value.split_once(':').ok_or_else(invalid)?;
    if hours.len() != 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    let hours: u16 = hours.parse().map_err(|_| invalid())?;
    let minutes: u16 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

fn minute_of_day(value: OffsetDateTime) -> u16 {
    u16::from(value.hour()) * 60 + u16::from(value.minute())
}

/// `None` when the instant has no UTC representation.
fn at_minute(date: Date, minute: u16, offset: UtcOffset) -> Option<OffsetDateTime> {
    let time = Time::from_hms((minute / 60) as u8, (minute % 60) as u8, 0).unwrap_or(Time::MIDNIGHT);
    let local = PrimitiveDateTime::new(date, time);
    local
        .checked_sub(Duration::seconds(i64::from(offset.whole_seconds())))
        .map(|_| local.assume_offset(offset))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub tutor_id: String,
    pub code: String,
    pub subject: String,
    pub day: DayOfWeek,
    pub start_time: String,
    pub end_time: String,
    pub max_students: i64,
    pub current_enrollment: i64,
    pub is_online: bool,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Class {
    pub fn slot(&self) -> Result<WeeklySlot, String> {
        WeeklySlot::parse(self.day, &self.start_time, &self.end_time)
    }

    pub fn is_full(&self) -> bool {
        self.current_enrollment >= self.max_students
    }
}
