use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Course, CourseLevel, CourseStatus};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCourseRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub level: CourseLevel,
    pub is_free: bool,
    pub price: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub level: Option<CourseLevel>,
    pub is_free: Option<bool>,
    pub price: Option<i64>,
    pub rating: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCourseStatusRequest {
    pub status: CourseStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CourseList {
    pub items: Vec<Course>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CourseWithTeacher {
    pub course: Course,
    pub teacher_name: String,
}
