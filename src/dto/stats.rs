use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_teachers: i64,
    pub total_students: i64,
    pub total_courses: i64,
    pub published_courses: i64,
    pub total_enrollments: i64,
    pub completed_lessons: i64,
    pub revenue: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserGrowthPoint {
    pub month: String,
    pub signups: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserGrowthStats {
    pub points: Vec<UserGrowthPoint>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CoursePerformanceRow {
    pub course_id: Uuid,
    pub title: String,
    pub enrollments: i64,
    pub avg_progress: f64,
    pub completion_rate: f64,
    pub revenue: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CoursePerformanceStats {
    pub items: Vec<CoursePerformanceRow>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentStatusRow {
    pub status: String,
    pub count: i64,
    pub amount: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentStats {
    pub rows: Vec<PaymentStatusRow>,
}
