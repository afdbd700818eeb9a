//! Database helpers for courses and lessons.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::{CourseResponse, LessonResponse, LessonSummary};
use crate::api::handlers::auth::utils::is_unique_violation;

/// Outcome for inserts keyed by a caller-chosen slug.
#[derive(Debug)]
pub(super) enum InsertOutcome {
    Created,
    Conflict,
}

pub(super) async fn insert_course(
    pool: &PgPool,
    slug: &str,
    title: &str,
    description: &str,
    lessons: i32,
    hours: i32,
) -> Result<InsertOutcome> {
    let query = r"
        INSERT INTO courses (slug, title, description, lessons, hours)
        VALUES ($1, $2, $3, $4, $5)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(slug)
        .bind(title)
        .bind(description)
        .bind(lessons)
        .bind(hours)
        .execute(pool)
        .instrument(span)
        .await;

    match result {
        Ok(_) => Ok(InsertOutcome::Created),
        Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert course"),
    }
}

pub(super) async fn lookup_course_id(pool: &PgPool, slug: &str) -> Result<Option<Uuid>> {
    let query = "SELECT id FROM courses WHERE slug = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(slug)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup course id")?;
    Ok(row.map(|row| row.get("id")))
}

pub(super) async fn insert_lesson(
    pool: &PgPool,
    course_id: Uuid,
    lesson: &super::types::LessonRequest,
) -> Result<InsertOutcome> {
    let query = r"
        INSERT INTO lessons
            (course_id, slug, title, seconds, video, description, position, free)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(course_id)
        .bind(&lesson.slug)
        .bind(&lesson.title)
        .bind(lesson.seconds)
        .bind(&lesson.video)
        .bind(&lesson.description)
        .bind(lesson.position)
        .bind(lesson.free)
        .execute(pool)
        .instrument(span)
        .await;

    match result {
        Ok(_) => Ok(InsertOutcome::Created),
        Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert lesson"),
    }
}

pub(super) async fn list_courses(pool: &PgPool) -> Result<Vec<CourseResponse>> {
    let query = r"
        SELECT slug, title, description, lessons, hours
        FROM courses
        ORDER BY created_at DESC
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list courses")?;

    Ok(rows
        .into_iter()
        .map(|row| CourseResponse {
            slug: row.get("slug"),
            title: row.get("title"),
            description: row.get("description"),
            lessons: row.get("lessons"),
            hours: row.get("hours"),
        })
        .collect())
}

pub(super) struct CourseHeader {
    pub(super) id: Uuid,
    pub(super) slug: String,
    pub(super) title: String,
    pub(super) description: String,
}

pub(super) async fn lookup_course(pool: &PgPool, slug: &str) -> Result<Option<CourseHeader>> {
    let query = "SELECT id, slug, title, description FROM courses WHERE slug = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(slug)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup course")?;
    Ok(row.map(|row| CourseHeader {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        description: row.get("description"),
    }))
}

pub(super) async fn list_lessons(pool: &PgPool, course_id: Uuid) -> Result<Vec<LessonSummary>> {
    let query = r"
        SELECT slug, title, seconds, position, free
        FROM lessons
        WHERE course_id = $1
        ORDER BY position ASC
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(course_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list lessons")?;

    Ok(rows
        .into_iter()
        .map(|row| LessonSummary {
            slug: row.get("slug"),
            title: row.get("title"),
            seconds: row.get("seconds"),
            position: row.get("position"),
            free: row.get("free"),
        })
        .collect())
}

pub(super) async fn lookup_lesson(
    pool: &PgPool,
    course_slug: &str,
    lesson_slug: &str,
) -> Result<Option<LessonResponse>> {
    let query = r"
        SELECT courses.slug AS course_slug,
               lessons.slug,
               lessons.title,
               lessons.seconds,
               lessons.video,
               lessons.description,
               lessons.position,
               lessons.free
        FROM lessons
        JOIN courses ON courses.id = lessons.course_id
        WHERE courses.slug = $1
          AND lessons.slug = $2
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(course_slug)
        .bind(lesson_slug)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup lesson")?;

    Ok(row.map(|row| LessonResponse {
        course_slug: row.get("course_slug"),
        slug: row.get("slug"),
        title: row.get("title"),
        seconds: row.get("seconds"),
        video: row.get("video"),
        description: row.get("description"),
        position: row.get("position"),
        free: row.get("free"),
    }))
}

#[cfg(test)]
mod tests {
    use super::InsertOutcome;

    #[test]
    fn insert_outcome_debug_names() {
        assert_eq!(format!("{:?}", InsertOutcome::Created), "Created");
        assert_eq!(format!("{:?}", InsertOutcome::Conflict), "Conflict");
    }
}
