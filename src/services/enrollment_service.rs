use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::enrollments::{EnrollmentDto, EnrollmentList},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    models::{Course, CourseEnrollment, CourseLevel, CourseStatus, Role},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Enroll the calling student. Idempotent: the unique (course_id, student_id)
/// pair plus DO NOTHING means a double click converges on one row, and the
/// enrollment counter moves only when a row was actually inserted.
pub async fn enroll(
    state: &AppState,
    user: &AuthUser,
    course_id: Uuid,
) -> AppResult<ApiResponse<CourseEnrollment>> {
    ensure_role(user, Role::Student)?;

    let course: Option<Course> = sqlx::query_as("SELECT * FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_optional(&state.pool)
        .await?;
    let course = match course {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    if course.status != CourseStatus::Published {
        return Err(AppError::BadRequest(
            "course is not open for enrollment".into(),
        ));
    }

    if !course.is_free {
        let paid: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM payments WHERE user_id = $1 AND course_id = $2 AND status = 'completed'",
        )
        .bind(user.user_id)
        .bind(course_id)
        .fetch_optional(&state.pool)
        .await?;
        if paid.is_none() {
            return Err(AppError::BadRequest(
                "course requires a completed payment".into(),
            ));
        }
    }

    let mut tx = state.pool.begin().await?;
    let inserted = insert_enrollment(&mut tx, course_id, user.user_id).await?;
    let enrollment = match inserted {
        Some(e) => e,
        None => {
            // Already enrolled; hand back the existing row.
            sqlx::query_as::<_, CourseEnrollment>(
                "SELECT * FROM course_enrollments WHERE course_id = $1 AND student_id = $2",
            )
            .bind(course_id)
            .bind(user.user_id)
            .fetch_one(&mut *tx)
            .await?
        }
    };
    tx.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "course_enroll",
        Some("course_enrollments"),
        Some(serde_json::json!({ "course_id": course_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Enrolled",
        enrollment,
        Some(Meta::empty()),
    ))
}

/// Shared with the payment path: insert the enrollment row if absent and bump
/// the course counter inside the caller's transaction. Returns None when the
/// student was already enrolled.
pub(crate) async fn insert_enrollment(
    tx: &mut Transaction<'_, Postgres>,
    course_id: Uuid,
    student_id: Uuid,
) -> AppResult<Option<CourseEnrollment>> {
    let inserted: Option<CourseEnrollment> = sqlx::query_as(
        r#"
        INSERT INTO course_enrollments (id, course_id, student_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (course_id, student_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(course_id)
    .bind(student_id)
    .fetch_optional(&mut **tx)
    .await?;

    if inserted.is_some() {
        sqlx::query(
            "UPDATE courses SET enrollment_count = enrollment_count + 1, updated_at = now() WHERE id = $1",
        )
        .bind(course_id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(inserted)
}

pub async fn list_my_enrollments(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<EnrollmentList>> {
    let (page, limit, offset) = pagination.normalize();

    #[derive(Debug, FromRow)]
    struct EnrollmentWithCourseRow {
        enrollment_id: Uuid,
        progress: f64,
        enrolled_at: DateTime<Utc>,
        course_id: Uuid,
        teacher_id: Uuid,
        title: String,
        description: Option<String>,
        category: String,
        #[sqlx(try_from = "String")]
        level: CourseLevel,
        #[sqlx(try_from = "String")]
        status: CourseStatus,
        is_free: bool,
        price: i64,
        enrollment_count: i32,
        total_lessons: i32,
        duration_hours: f64,
        rating: f64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    }

    let rows = sqlx::query_as::<_, EnrollmentWithCourseRow>(
        r#"
        SELECT ce.id AS enrollment_id, ce.progress, ce.enrolled_at,
               c.id AS course_id, c.teacher_id, c.title, c.description, c.category,
               c.level, c.status, c.is_free, c.price, c.enrollment_count,
               c.total_lessons, c.duration_hours, c.rating, c.created_at, c.updated_at
        FROM course_enrollments ce
        JOIN courses c ON c.id = ce.course_id
        WHERE ce.student_id = $1
        ORDER BY ce.enrolled_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM course_enrollments WHERE student_id = $1")
            .bind(user.user_id)
            .fetch_one(&state.pool)
            .await?;

    let items = rows
        .into_iter()
        .map(|row| EnrollmentDto {
            id: row.enrollment_id,
            course: Course {
                id: row.course_id,
                teacher_id: row.teacher_id,
                title: row.title,
                description: row.description,
                category: row.category,
                level: row.level,
                status: row.status,
                is_free: row.is_free,
                price: row.price,
                enrollment_count: row.enrollment_count,
                total_lessons: row.total_lessons,
                duration_hours: row.duration_hours,
                rating: row.rating,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            progress: row.progress,
            enrolled_at: row.enrolled_at,
        })
        .collect();

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "Enrollments",
        EnrollmentList { items },
        Some(meta),
    ))
}
