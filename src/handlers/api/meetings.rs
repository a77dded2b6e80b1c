use std::collections::HashMap;

use actix_web::{HttpResponse, web};
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::meeting::{self, MeetingSearch, Program};

use super::PaginatedResponse;

/// Turn query parameters into a search. Unknown programs and out-of-range
/// days are rejected rather than silently ignored.
pub fn parse_search(query: &HashMap<String, String>) -> Result<MeetingSearch, AppError> {
    let non_empty = |key: &str| query.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    let program = non_empty("program")
        .map(|p| p.parse::<Program>())
        .transpose()
        .map_err(AppError::BadRequest)?;

    let day_of_week = match non_empty("day") {
        Some(d) => match d.parse::<i16>() {
            Ok(day) if (0..=6).contains(&day) => Some(day),
            _ => return Err(AppError::BadRequest(format!("day must be 0-6, got '{d}'"))),
        },
        None => None,
    };

    let page = query
        .get("page")
        .and_then(|p| p.parse::<i64>().ok())
        .unwrap_or(1)
        .max(1);
    let per_page = query
        .get("per_page")
        .and_then(|p| p.parse::<i64>().ok())
        .unwrap_or(25)
        .clamp(1, 100);

    if (page - 1).checked_mul(per_page).is_none() {
        return Err(AppError::BadRequest(format!("page {page} is out of range")));
    }

    Ok(MeetingSearch {
        program,
        external_id: non_empty("external_id").map(str::to_string),
        day_of_week,
        name_query: non_empty("q").map(str::to_string),
        page,
        per_page,
    })
}

/// GET /api/meetings - Search stored meetings.
/// Query params: program, external_id, day (0-6), q, page (default 1), per_page (default 25).
pub async fn search(
    pool: web::Data<PgPool>,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    let search = parse_search(&query)?;
    let page = meeting::search(&pool, &search).await?;

    Ok(HttpResponse::Ok().json(PaginatedResponse {
        items: page.items,
        page: page.page,
        per_page: page.per_page,
        total: page.total_count,
    }))
}

/// GET /api/meetings/{external_id}
pub async fn read(
    pool: web::Data<PgPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let external_id = path.into_inner();
    let found = meeting::find_by_external_id(&pool, &external_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(found))
}
