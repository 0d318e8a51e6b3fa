use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Lesson;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLessonRequest {
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub duration_seconds: i32,
    pub order_index: i32,
    pub is_free: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLessonRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub order_index: Option<i32>,
    pub is_free: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LessonList {
    pub items: Vec<Lesson>,
}
