use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::types::*;

const MEETING_COLUMNS: &str = "id, external_id, program, name, day_of_week, start_time, timezone, \
                               join_url, source_feed, first_seen_at, last_synced_at";

/// Insert the meeting, or refresh it if its external ID is already stored.
///
/// One statement keyed on the unique `external_id` constraint, so overlapping
/// sync runs cannot create a second row for the same meeting. `first_seen_at`
/// is only written on insert. `xmax = 0` holds only for a freshly inserted
/// tuple, which is how the outcome is reported without a second query.
pub async fn upsert(
    pool: &PgPool,
    meeting: &ExternalMeeting,
    seen_at: DateTime<Utc>,
) -> Result<UpsertOutcome, sqlx::Error> {
    let (inserted,): (bool,) = sqlx::query_as(
        "INSERT INTO external_meetings \
             (external_id, program, name, day_of_week, start_time, timezone, join_url, source_feed, \
              first_seen_at, last_synced_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9) \
         ON CONFLICT (external_id) DO UPDATE SET \
             program = EXCLUDED.program, \
             name = EXCLUDED.name, \
             day_of_week = EXCLUDED.day_of_week, \
             start_time = EXCLUDED.start_time, \
             timezone = EXCLUDED.timezone, \
             join_url = EXCLUDED.join_url, \
             source_feed = EXCLUDED.source_feed, \
             last_synced_at = EXCLUDED.last_synced_at \
         RETURNING (xmax = 0) AS inserted",
    )
    .bind(&meeting.external_id)
    .bind(meeting.program.as_str())
    .bind(&meeting.name)
    .bind(meeting.day_of_week)
    .bind(&meeting.time)
    .bind(&meeting.timezone)
    .bind(&meeting.join_url)
    .bind(&meeting.source_feed)
    .bind(seen_at)
    .fetch_one(pool)
    .await?;

    Ok(if inserted {
        UpsertOutcome::Inserted
    } else {
        UpsertOutcome::AlreadyExisted
    })
}

pub async fn find_by_external_id(
    pool: &PgPool,
    external_id: &str,
) -> Result<Option<MeetingRecord>, sqlx::Error> {
    sqlx::query_as::<_, MeetingRecord>(&format!(
        "SELECT {MEETING_COLUMNS} FROM external_meetings WHERE external_id = $1"
    ))
    .bind(external_id)
    .fetch_optional(pool)
    .await
}

fn push_search_filters(qb: &mut QueryBuilder<'_, Postgres>, search: &MeetingSearch) {
    qb.push(" WHERE 1 = 1");
    if let Some(program) = search.program {
        qb.push(" AND program = ").push_bind(program.as_str().to_string());
    }
    if let Some(external_id) = &search.external_id {
        qb.push(" AND external_id = ").push_bind(external_id.clone());
    }
    if let Some(day) = search.day_of_week {
        qb.push(" AND day_of_week = ").push_bind(day);
    }
    if let Some(q) = search.name_query.as_deref().filter(|q| !q.is_empty()) {
        qb.push(" AND name ILIKE ").push_bind(format!("%{}%", escape_like(q)));
    }
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Paginated search over stored meetings, ordered by day, time, then name.
pub async fn search(pool: &PgPool, search: &MeetingSearch) -> Result<MeetingPage, sqlx::Error> {
    let page = search.page.max(1);
    let per_page = search.per_page.clamp(1, 100);

    let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM external_meetings");
    push_search_filters(&mut count_qb, search);
    let (total_count,): (i64,) = count_qb.build_query_as().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {MEETING_COLUMNS} FROM external_meetings"));
    push_search_filters(&mut qb, search);
    qb.push(" ORDER BY day_of_week NULLS LAST, start_time, name, id LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind((page - 1).saturating_mul(per_page));

    let items = qb.build_query_as::<MeetingRecord>().fetch_all(pool).await?;

    Ok(MeetingPage {
        items,
        page,
        per_page,
        total_count,
    })
}

/// Counts grouped by program, plus the most recent sync timestamp.
pub async fn stats(pool: &PgPool) -> Result<MeetingStats, sqlx::Error> {
    let by_program = sqlx::query_as::<_, ProgramCount>(
        "SELECT program, COUNT(*) AS count FROM external_meetings \
         GROUP BY program ORDER BY program",
    )
    .fetch_all(pool)
    .await?;

    let (last_synced_at,): (Option<DateTime<Utc>>,) =
        sqlx::query_as("SELECT MAX(last_synced_at) FROM external_meetings")
            .fetch_one(pool)
            .await?;

    Ok(MeetingStats {
        total: by_program.iter().map(|p| p.count).sum(),
        by_program,
        last_synced_at,
    })
}

/// Largest retention window accepted for pruning (100 years).
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Delete meetings not re-observed since `cutoff`. Returns the number removed.
pub async fn prune_not_synced_since(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM external_meetings WHERE last_synced_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn count_all(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM external_meetings")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
