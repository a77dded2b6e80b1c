use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recovery program a feed (and every meeting it lists) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Program {
    Aa,
    Na,
    Smart,
    Test,
    Other,
}

impl Program {
    pub const ALL: [Program; 5] = [
        Program::Aa,
        Program::Na,
        Program::Smart,
        Program::Test,
        Program::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Program::Aa => "AA",
            Program::Na => "NA",
            Program::Smart => "SMART",
            Program::Test => "TEST",
            Program::Other => "OTHER",
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Program {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AA" => Ok(Program::Aa),
            "NA" => Ok(Program::Na),
            "SMART" => Ok(Program::Smart),
            "TEST" => Ok(Program::Test),
            "OTHER" => Ok(Program::Other),
            other => Err(format!("Unknown program '{other}'")),
        }
    }
}

/// Canonical meeting produced by normalization, ready to be upserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalMeeting {
    pub external_id: String,
    pub program: Program,
    pub name: String,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: Option<i16>,
    pub time: String,
    pub timezone: String,
    pub join_url: String,
    pub source_feed: String,
}

/// A stored meeting row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MeetingRecord {
    pub id: i64,
    pub external_id: String,
    pub program: String,
    pub name: String,
    pub day_of_week: Option<i16>,
    #[sqlx(rename = "start_time")]
    pub time: String,
    pub timezone: String,
    pub join_url: String,
    pub source_feed: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

/// Result of upserting one meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    AlreadyExisted,
}

/// Filters for the public meeting search.
#[derive(Debug, Clone, Default)]
pub struct MeetingSearch {
    pub program: Option<Program>,
    pub external_id: Option<String>,
    pub day_of_week: Option<i16>,
    pub name_query: Option<String>,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Clone)]
pub struct MeetingPage {
    pub items: Vec<MeetingRecord>,
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProgramCount {
    pub program: String,
    pub count: i64,
}

/// Stored-meeting counts for the admin statistics endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MeetingStats {
    pub total: i64,
    pub by_program: Vec<ProgramCount>,
    pub last_synced_at: Option<DateTime<Utc>>,
}
