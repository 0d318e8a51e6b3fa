use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::LessonProgress;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProgressPatchRequest {
    pub watched_seconds: i32,
}

/// Progress for one (lesson, student) pair. Absence of a stored row is the
/// valid "not started" state, so this view always exists.
#[derive(Debug, Serialize, ToSchema)]
pub struct LessonProgressView {
    pub lesson_id: Uuid,
    pub student_id: Uuid,
    pub watched_seconds: i32,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LessonProgressView {
    pub fn not_started(lesson_id: Uuid, student_id: Uuid) -> Self {
        Self {
            lesson_id,
            student_id,
            watched_seconds: 0,
            is_completed: false,
            completed_at: None,
        }
    }
}

impl From<LessonProgress> for LessonProgressView {
    fn from(row: LessonProgress) -> Self {
        Self {
            lesson_id: row.lesson_id,
            student_id: row.student_id,
            watched_seconds: row.watched_seconds,
            is_completed: row.is_completed,
            completed_at: row.completed_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CourseProgressView {
    pub course_id: Uuid,
    pub percent: f64,
    pub items: Vec<LessonProgressView>,
}
