use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest, UpdateProfileRequest, UserProfile},
        courses::{CourseList, CourseWithTeacher, CreateCourseRequest, UpdateCourseRequest, UpdateCourseStatusRequest},
        enrollments::{EnrollmentDto, EnrollmentList},
        lessons::{CreateLessonRequest, LessonList, UpdateLessonRequest},
        payments::{CreatePaymentRequest, PaymentList, UpdatePaymentStatusRequest},
        progress::{CourseProgressView, LessonProgressView, ProgressPatchRequest},
        stats::{
            CoursePerformanceRow, CoursePerformanceStats, DashboardStats, PaymentStats,
            PaymentStatusRow, UserGrowthPoint, UserGrowthStats,
        },
    },
    models::{Course, CourseEnrollment, CourseLevel, CourseStatus, Lesson, LessonProgress, Payment, PaymentStatus, Role, User},
    response::{ApiResponse, Meta},
    routes::{admin, auth, courses, enrollments, health, lessons, params, payments},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        auth::update_profile,
        courses::list_courses,
        courses::get_course,
        courses::create_course,
        courses::update_course,
        courses::update_course_status,
        courses::delete_course,
        courses::list_lessons,
        courses::create_lesson,
        courses::enroll,
        courses::course_progress,
        lessons::get_lesson,
        lessons::update_lesson,
        lessons::delete_lesson,
        lessons::get_progress,
        lessons::record_watch,
        lessons::complete_lesson,
        enrollments::list_my_enrollments,
        payments::create_payment,
        payments::list_my_payments,
        admin::list_users,
        admin::delete_user,
        admin::list_all_payments,
        admin::update_payment_status,
        admin::dashboard_stats,
        admin::user_growth_stats,
        admin::course_performance_stats,
        admin::payment_stats
    ),
    components(
        schemas(
            User,
            Course,
            Lesson,
            CourseEnrollment,
            LessonProgress,
            Payment,
            Role,
            CourseStatus,
            CourseLevel,
            PaymentStatus,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            UserProfile,
            UpdateProfileRequest,
            CreateCourseRequest,
            UpdateCourseRequest,
            UpdateCourseStatusRequest,
            CourseList,
            CourseWithTeacher,
            CreateLessonRequest,
            UpdateLessonRequest,
            LessonList,
            EnrollmentDto,
            EnrollmentList,
            ProgressPatchRequest,
            LessonProgressView,
            CourseProgressView,
            CreatePaymentRequest,
            UpdatePaymentStatusRequest,
            PaymentList,
            DashboardStats,
            UserGrowthPoint,
            UserGrowthStats,
            CoursePerformanceRow,
            CoursePerformanceStats,
            PaymentStatusRow,
            PaymentStats,
            admin::UserList,
            params::Pagination,
            params::CourseQuery,
            params::PaymentListQuery,
            params::UserListQuery,
            Meta,
            ApiResponse<Course>,
            ApiResponse<CourseList>,
            ApiResponse<CourseWithTeacher>,
            ApiResponse<LessonList>,
            ApiResponse<LessonProgressView>,
            ApiResponse<CourseProgressView>,
            ApiResponse<PaymentList>,
            ApiResponse<EnrollmentList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication and profile endpoints"),
        (name = "Courses", description = "Course catalog and management endpoints"),
        (name = "Lessons", description = "Lesson endpoints"),
        (name = "Enrollments", description = "Enrollment endpoints"),
        (name = "Progress", description = "Lesson progress endpoints"),
        (name = "Payments", description = "Payment endpoints"),
        (name = "Admin", description = "Admin moderation and stats endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
