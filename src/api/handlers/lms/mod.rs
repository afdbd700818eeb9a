//! Course and lesson endpoints.
//!
//! Writes sit behind the editor guard; reads are public except paid lesson
//! content, which needs a signed-in caller.

mod storage;
pub(crate) mod types;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use regex::Regex;
use sqlx::PgPool;
use tracing::error;

use crate::api::handlers::auth::OptionalPrincipal;
use storage::{
    insert_course, insert_lesson, list_courses, list_lessons, lookup_course, lookup_course_id,
    lookup_lesson, InsertOutcome,
};
use types::{CourseDetailResponse, CourseRequest, CourseResponse, LessonRequest, LessonResponse};

fn valid_slug(slug: &str) -> bool {
    Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").is_ok_and(|regex| regex.is_match(slug))
}

#[utoipa::path(
    post,
    path = "/lms/course",
    request_body = CourseRequest,
    responses(
        (status = 201, description = "Course created"),
        (status = 400, description = "Validation error", body = String),
        (status = 409, description = "Course slug already exists", body = String)
    ),
    tag = "lms"
)]
pub async fn create_course(
    pool: Extension<PgPool>,
    payload: Option<Json<CourseRequest>>,
) -> impl IntoResponse {
    let request: CourseRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    if !valid_slug(&request.slug) {
        return (StatusCode::BAD_REQUEST, "Invalid slug".to_string()).into_response();
    }
    if request.title.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing title".to_string()).into_response();
    }

    match insert_course(
        &pool,
        &request.slug,
        request.title.trim(),
        &request.description,
        request.lessons,
        request.hours,
    )
    .await
    {
        Ok(InsertOutcome::Created) => StatusCode::CREATED.into_response(),
        Ok(InsertOutcome::Conflict) => (
            StatusCode::CONFLICT,
            "Course slug already exists".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to insert course: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/lms/lesson",
    request_body = LessonRequest,
    responses(
        (status = 201, description = "Lesson created"),
        (status = 400, description = "Validation error", body = String),
        (status = 404, description = "Course not found", body = String),
        (status = 409, description = "Lesson slug already exists in course", body = String)
    ),
    tag = "lms"
)]
pub async fn create_lesson(
    pool: Extension<PgPool>,
    payload: Option<Json<LessonRequest>>,
) -> impl IntoResponse {
    let request: LessonRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    if !valid_slug(&request.course_slug) || !valid_slug(&request.slug) {
        return (StatusCode::BAD_REQUEST, "Invalid slug".to_string()).into_response();
    }
    if request.title.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing title".to_string()).into_response();
    }

    let course_id = match lookup_course_id(&pool, &request.course_slug).await {
        Ok(Some(course_id)) => course_id,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "Course not found".to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to lookup course: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match insert_lesson(&pool, course_id, &request).await {
        Ok(InsertOutcome::Created) => StatusCode::CREATED.into_response(),
        Ok(InsertOutcome::Conflict) => (
            StatusCode::CONFLICT,
            "Lesson slug already exists in course".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to insert lesson: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/lms/courses",
    responses(
        (status = 200, description = "Course catalog", body = [CourseResponse]),
        (status = 404, description = "No courses yet")
    ),
    tag = "lms"
)]
pub async fn courses(pool: Extension<PgPool>) -> impl IntoResponse {
    match list_courses(&pool).await {
        Ok(courses) if courses.is_empty() => StatusCode::NOT_FOUND.into_response(),
        Ok(courses) => (StatusCode::OK, Json(courses)).into_response(),
        Err(err) => {
            error!("Failed to list courses: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/lms/course/{slug}",
    params(
        ("slug" = String, Path, description = "Course slug")
    ),
    responses(
        (status = 200, description = "Course with lesson listing", body = CourseDetailResponse),
        (status = 404, description = "Course not found")
    ),
    tag = "lms"
)]
pub async fn course(pool: Extension<PgPool>, Path(slug): Path<String>) -> impl IntoResponse {
    let course = match lookup_course(&pool, &slug).await {
        Ok(Some(course)) => course,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to lookup course: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let lessons = match list_lessons(&pool, course.id).await {
        Ok(lessons) => lessons,
        Err(err) => {
            error!("Failed to list lessons: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let response = CourseDetailResponse {
        slug: course.slug,
        title: course.title,
        description: course.description,
        lessons,
    };
    (StatusCode::OK, Json(response)).into_response()
}

#[utoipa::path(
    get,
    path = "/lms/course/{slug}/lesson/{lesson}",
    params(
        ("slug" = String, Path, description = "Course slug"),
        ("lesson" = String, Path, description = "Lesson slug")
    ),
    responses(
        (status = 200, description = "Lesson content", body = LessonResponse),
        (status = 401, description = "Paid lesson requires a session"),
        (status = 404, description = "Lesson not found")
    ),
    tag = "lms"
)]
pub async fn lesson(
    pool: Extension<PgPool>,
    Extension(OptionalPrincipal(principal)): Extension<OptionalPrincipal>,
    Path((slug, lesson_slug)): Path<(String, String)>,
) -> impl IntoResponse {
    let lesson = match lookup_lesson(&pool, &slug, &lesson_slug).await {
        Ok(Some(lesson)) => lesson,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to lookup lesson: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // Free lessons are the teaser; paid content needs a signed-in caller.
    if !lesson.free && principal.is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    (StatusCode::OK, Json(lesson)).into_response()
}
