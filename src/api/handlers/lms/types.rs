//! Request/response types for course and lesson endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CourseRequest {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub lessons: i32,
    #[serde(default)]
    pub hours: i32,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LessonRequest {
    pub course_slug: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub seconds: i32,
    #[serde(default)]
    pub video: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub free: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CourseResponse {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub lessons: i32,
    pub hours: i32,
}

/// Lesson listing inside a course: everything except the video source.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LessonSummary {
    pub slug: String,
    pub title: String,
    pub seconds: i32,
    pub position: i32,
    pub free: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CourseDetailResponse {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub lessons: Vec<LessonSummary>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LessonResponse {
    pub course_slug: String,
    pub slug: String,
    pub title: String,
    pub seconds: i32,
    pub video: String,
    pub description: String,
    pub position: i32,
    pub free: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn course_request_defaults_optional_fields() -> Result<()> {
        let request: CourseRequest =
            serde_json::from_str(r#"{"slug":"rust-101","title":"Rust 101"}"#)?;
        assert_eq!(request.slug, "rust-101");
        assert_eq!(request.description, "");
        assert_eq!(request.lessons, 0);
        assert_eq!(request.hours, 0);
        Ok(())
    }

    #[test]
    fn lesson_request_defaults_free_to_false() -> Result<()> {
        let request: LessonRequest = serde_json::from_str(
            r#"{"course_slug":"rust-101","slug":"intro","title":"Intro"}"#,
        )?;
        assert!(!request.free);
        assert_eq!(request.position, 0);
        Ok(())
    }

    #[test]
    fn lesson_summary_has_no_video_field() -> Result<()> {
        let summary = LessonSummary {
            slug: "intro".to_string(),
            title: "Intro".to_string(),
            seconds: 300,
            position: 1,
            free: true,
        };
        let value = serde_json::to_value(&summary)?;
        assert!(value.get("video").is_none());
        Ok(())
    }
}
