use std::collections::{BTreeMap, HashSet};

use reqwest::Url;

use crate::feeds::tsml::{first_day, normalize_time};
use crate::feeds::{FeedSource, RawMeeting};
use crate::models::meeting::{ExternalMeeting, Program};

/// Per-program counts gathered while normalizing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeCounts {
    pub fetched: usize,
    pub dropped: usize,
    pub duplicates: usize,
}

/// Canonical, deduplicated meetings plus what was discarded on the way.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub meetings: Vec<ExternalMeeting>,
    pub fetched: usize,
    pub dropped: usize,
    pub duplicates: usize,
    pub by_program: BTreeMap<Program, NormalizeCounts>,
}

/// Normalize every source's raw records, in the order given.
///
/// The first record seen for an external ID wins; later ones with the same
/// ID, from the same feed or another, are counted as duplicates.
pub fn normalize<'a, I>(inputs: I) -> Normalized
where
    I: IntoIterator<Item = (&'a FeedSource, &'a [RawMeeting])>,
{
    let mut out = Normalized::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (source, records) in inputs {
        for raw in records {
            out.fetched += 1;
            let counts = out.by_program.entry(source.program).or_default();
            counts.fetched += 1;

            let Some(meeting) = normalize_record(source, raw) else {
                out.dropped += 1;
                counts.dropped += 1;
                continue;
            };

            if !seen.insert(meeting.external_id.clone()) {
                out.duplicates += 1;
                counts.duplicates += 1;
                continue;
            }
            out.meetings.push(meeting);
        }
    }

    out
}

/// Map one raw record to the canonical shape; `None` when it has no usable
/// external identifier.
pub fn normalize_record(source: &FeedSource, raw: &RawMeeting) -> Option<ExternalMeeting> {
    let external_id = external_id(raw)?;

    let name = raw
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .or(raw.slug.as_deref().map(str::trim))
        .unwrap_or_default()
        .to_string();

    Some(ExternalMeeting {
        external_id,
        program: source.program,
        name,
        day_of_week: raw.day.as_ref().and_then(first_day),
        time: raw.time.as_deref().map(normalize_time).unwrap_or_default(),
        timezone: raw.timezone.as_deref().unwrap_or_default().trim().to_string(),
        join_url: raw.conference_url.as_deref().unwrap_or_default().trim().to_string(),
        source_feed: source.name.clone(),
    })
}

/// The conferencing provider's meeting ID: taken from the join URL when it
/// is a Zoom link, otherwise from an explicit ID field.
pub fn external_id(raw: &RawMeeting) -> Option<String> {
    raw.conference_url
        .as_deref()
        .and_then(zoom_meeting_id)
        .or_else(|| raw.conference_id.as_deref().and_then(clean_meeting_id))
        .or_else(|| raw.meeting_id.as_deref().and_then(clean_meeting_id))
}

/// Extract the numeric meeting ID from a Zoom join link.
///
/// Handles `https://<sub>.zoom.us/j/<id>`, `/w/<id>`, `/s/<id>`,
/// `/wc/join/<id>` and `zoommtg://zoom.us/join?confno=<id>`.
pub fn zoom_meeting_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    if host != "zoom.us" && !host.ends_with(".zoom.us") {
        return None;
    }

    if let Some((_, confno)) = parsed.query_pairs().find(|(k, _)| k == "confno") {
        return clean_meeting_id(&confno);
    }

    let mut segments = parsed.path_segments()?;
    while let Some(segment) = segments.next() {
        if matches!(segment, "j" | "w" | "s" | "join") {
            return segments.next().and_then(clean_meeting_id);
        }
    }
    None
}

/// Zoom IDs are 9 to 11 digits, often displayed with spaces or dashes.
fn clean_meeting_id(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    let valid = (9..=11).contains(&cleaned.len()) && cleaned.chars().all(|c| c.is_ascii_digit());
    valid.then_some(cleaned)
}
