//! `OpenAPI` document for the HTTP surface.

use utoipa::OpenApi;

use super::handlers::{auth, health, lms};

/// Add new `#[utoipa::path]` handlers here so they show up in Swagger UI.
#[derive(OpenApi)]
#[openapi(
    info(
        contact(name = "Team Aula", email = "team@aula.dev"),
        license(name = "BSD-3-Clause", identifier = "BSD-3-Clause")
    ),
    paths(
        health::health,
        auth::register::register,
        auth::login::login,
        auth::session::session,
        auth::session::logout,
        auth::password_change::password_update,
        auth::recovery::password_forgot,
        auth::recovery::password_reset,
        lms::create_course,
        lms::create_lesson,
        lms::courses,
        lms::course,
        lms::lesson,
    ),
    components(schemas(
        health::Health,
        auth::role::Role,
        auth::types::RegisterRequest,
        auth::types::LoginRequest,
        auth::types::SessionResponse,
        auth::types::PasswordUpdateRequest,
        auth::types::PasswordForgotRequest,
        auth::types::PasswordResetRequest,
        auth::types::MessageResponse,
        lms::types::CourseRequest,
        lms::types::LessonRequest,
        lms::types::CourseResponse,
        lms::types::CourseDetailResponse,
        lms::types::LessonSummary,
        lms::types::LessonResponse,
    )),
    tags(
        (name = "auth", description = "Accounts, sessions, and password recovery"),
        (name = "lms", description = "Course catalog and lesson content"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
