use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Course;

#[derive(Debug, Serialize, ToSchema)]
pub struct EnrollmentDto {
    pub id: Uuid,
    pub course: Course,
    pub progress: f64,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EnrollmentList {
    pub items: Vec<EnrollmentDto>,
}
