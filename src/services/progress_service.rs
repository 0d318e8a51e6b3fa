use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::progress::{CourseProgressView, LessonProgressView, ProgressPatchRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Lesson, LessonProgress},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Point lookup. A missing row is the valid "not started" state, never an
/// error.
pub async fn get_progress(
    state: &AppState,
    user: &AuthUser,
    lesson_id: Uuid,
) -> AppResult<ApiResponse<LessonProgressView>> {
    let lesson: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM lessons WHERE id = $1")
        .bind(lesson_id)
        .fetch_optional(&state.pool)
        .await?;
    if lesson.is_none() {
        return Err(AppError::NotFound);
    }

    let row: Option<LessonProgress> = sqlx::query_as(
        "SELECT * FROM lesson_progress WHERE lesson_id = $1 AND student_id = $2",
    )
    .bind(lesson_id)
    .bind(user.user_id)
    .fetch_optional(&state.pool)
    .await?;

    let view = match row {
        Some(p) => p.into(),
        None => LessonProgressView::not_started(lesson_id, user.user_id),
    };
    Ok(ApiResponse::success("Progress", view, None))
}

/// Record partial watch time. One atomic upsert keyed on the unique
/// (lesson_id, student_id) pair; watch time only ever moves forward and the
/// completion flag is left alone.
pub async fn record_watch(
    state: &AppState,
    user: &AuthUser,
    lesson_id: Uuid,
    payload: ProgressPatchRequest,
) -> AppResult<ApiResponse<LessonProgressView>> {
    if payload.watched_seconds < 0 {
        return Err(AppError::BadRequest(
            "watched_seconds cannot be negative".into(),
        ));
    }
    ensure_enrolled(state, user, lesson_id).await?;

    let row: LessonProgress = sqlx::query_as(
        r#"
        INSERT INTO lesson_progress (id, lesson_id, student_id, watched_seconds)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (lesson_id, student_id) DO UPDATE
        SET watched_seconds = GREATEST(lesson_progress.watched_seconds, EXCLUDED.watched_seconds),
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(lesson_id)
    .bind(user.user_id)
    .bind(payload.watched_seconds)
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::success("Progress saved", row.into(), None))
}

/// The video-end event. Idempotent: two rapid calls land on the same row,
/// completion never reverses and completed_at keeps its first value. The
/// enrollment's aggregate percentage is recomputed in the same transaction.
pub async fn complete_lesson(
    state: &AppState,
    user: &AuthUser,
    lesson_id: Uuid,
) -> AppResult<ApiResponse<LessonProgressView>> {
    let lesson = ensure_enrolled(state, user, lesson_id).await?;

    let mut tx = state.pool.begin().await?;

    let row: LessonProgress = sqlx::query_as(
        r#"
        INSERT INTO lesson_progress (id, lesson_id, student_id, watched_seconds, is_completed, completed_at)
        VALUES ($1, $2, $3, $4, TRUE, now())
        ON CONFLICT (lesson_id, student_id) DO UPDATE
        SET watched_seconds = GREATEST(lesson_progress.watched_seconds, EXCLUDED.watched_seconds),
            is_completed = TRUE,
            completed_at = COALESCE(lesson_progress.completed_at, EXCLUDED.completed_at),
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(lesson_id)
    .bind(user.user_id)
    .bind(lesson.duration_seconds)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE course_enrollments ce
        SET progress = sub.pct
        FROM (
            SELECT COUNT(*) FILTER (WHERE lp.is_completed) * 100.0 / GREATEST(COUNT(*), 1) AS pct
            FROM lessons l
            LEFT JOIN lesson_progress lp ON lp.lesson_id = l.id AND lp.student_id = $2
            WHERE l.course_id = $1
        ) sub
        WHERE ce.course_id = $1 AND ce.student_id = $2
        "#,
    )
    .bind(lesson.course_id)
    .bind(user.user_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "lesson_completed",
        Some("lesson_progress"),
        Some(serde_json::json!({ "lesson_id": lesson_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Lesson completed",
        row.into(),
        Some(Meta::empty()),
    ))
}

/// Progress for every lesson of a course in a single query, plus the
/// enrollment's aggregate percentage.
pub async fn course_progress(
    state: &AppState,
    user: &AuthUser,
    course_id: Uuid,
) -> AppResult<ApiResponse<CourseProgressView>> {
    let course: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_optional(&state.pool)
        .await?;
    if course.is_none() {
        return Err(AppError::NotFound);
    }

    let percent: Option<(f64,)> = sqlx::query_as(
        "SELECT progress FROM course_enrollments WHERE course_id = $1 AND student_id = $2",
    )
    .bind(course_id)
    .bind(user.user_id)
    .fetch_optional(&state.pool)
    .await?;
    let percent = match percent {
        Some((p,)) => p,
        None => return Err(AppError::Forbidden),
    };

    #[derive(Debug, FromRow)]
    struct BulkProgressRow {
        lesson_id: Uuid,
        watched_seconds: i32,
        is_completed: bool,
        completed_at: Option<DateTime<Utc>>,
    }

    let rows = sqlx::query_as::<_, BulkProgressRow>(
        r#"
        SELECT l.id AS lesson_id,
               COALESCE(lp.watched_seconds, 0) AS watched_seconds,
               COALESCE(lp.is_completed, FALSE) AS is_completed,
               lp.completed_at
        FROM lessons l
        LEFT JOIN lesson_progress lp
          ON lp.lesson_id = l.id AND lp.student_id = $2
        WHERE l.course_id = $1
        ORDER BY l.order_index ASC, l.created_at ASC
        "#,
    )
    .bind(course_id)
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    let items = rows
        .into_iter()
        .map(|row| LessonProgressView {
            lesson_id: row.lesson_id,
            student_id: user.user_id,
            watched_seconds: row.watched_seconds,
            is_completed: row.is_completed,
            completed_at: row.completed_at,
        })
        .collect();

    let data = CourseProgressView {
        course_id,
        percent,
        items,
    };
    Ok(ApiResponse::success("Course progress", data, None))
}

/// Progress rows may only reference lessons of a course the student is
/// enrolled in.
async fn ensure_enrolled(
    state: &AppState,
    user: &AuthUser,
    lesson_id: Uuid,
) -> AppResult<Lesson> {
    let lesson: Option<Lesson> = sqlx::query_as("SELECT * FROM lessons WHERE id = $1")
        .bind(lesson_id)
        .fetch_optional(&state.pool)
        .await?;
    let lesson = match lesson {
        Some(l) => l,
        None => return Err(AppError::NotFound),
    };

    let enrolled: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM course_enrollments WHERE course_id = $1 AND student_id = $2",
    )
    .bind(lesson.course_id)
    .bind(user.user_id)
    .fetch_optional(&state.pool)
    .await?;
    if enrolled.is_none() {
        return Err(AppError::Forbidden);
    }

    Ok(lesson)
}
