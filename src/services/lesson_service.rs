use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, FromQueryResult, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::lessons::{CreateLessonRequest, LessonList, UpdateLessonRequest},
    entity::{
        course_enrollments::{Column as EnrollCol, Entity as CourseEnrollments},
        courses::{Column as CourseCol, Entity as Courses, Model as CourseModel},
        lessons::{ActiveModel, Column, Entity as Lessons, Model as LessonModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, can_manage_course},
    models::{CourseStatus, Lesson, Role},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Ordered lesson list for a course. Paid lessons keep their video URL only
/// for enrolled students, the owning teacher and admins.
pub async fn list_lessons(
    state: &AppState,
    viewer: Option<&AuthUser>,
    course_id: Uuid,
) -> AppResult<ApiResponse<LessonList>> {
    let course = find_visible_course(state, viewer, course_id).await?;

    let models = Lessons::find()
        .filter(Column::CourseId.eq(course_id))
        .order_by_asc(Column::OrderIndex)
        .order_by_asc(Column::CreatedAt)
        .all(&state.orm)
        .await?;

    let full_access = has_full_access(state, viewer, &course).await?;
    let items = models
        .into_iter()
        .map(|m| gate_lesson(lesson_from_entity(m), full_access))
        .collect();

    Ok(ApiResponse::success("Lessons", LessonList { items }, None))
}

pub async fn get_lesson(
    state: &AppState,
    viewer: Option<&AuthUser>,
    id: Uuid,
) -> AppResult<ApiResponse<Lesson>> {
    let model = Lessons::find_by_id(id).one(&state.orm).await?;
    let model = match model {
        Some(l) => l,
        None => return Err(AppError::NotFound),
    };

    let course = find_visible_course(state, viewer, model.course_id).await?;
    let full_access = has_full_access(state, viewer, &course).await?;

    Ok(ApiResponse::success(
        "Lesson",
        gate_lesson(lesson_from_entity(model), full_access),
        None,
    ))
}

pub async fn create_lesson(
    state: &AppState,
    user: &AuthUser,
    course_id: Uuid,
    payload: CreateLessonRequest,
) -> AppResult<ApiResponse<Lesson>> {
    if payload.duration_seconds < 0 {
        return Err(AppError::BadRequest(
            "duration_seconds cannot be negative".into(),
        ));
    }
    if payload.order_index < 0 {
        return Err(AppError::BadRequest("order_index cannot be negative".into()));
    }

    let txn = state.orm.begin().await?;

    let course = Courses::find_by_id(course_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let course = match course {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };
    can_manage_course(user, course.teacher_id)?;

    let lesson = ActiveModel {
        id: Set(Uuid::new_v4()),
        course_id: Set(course_id),
        title: Set(payload.title),
        description: Set(payload.description),
        video_url: Set(payload.video_url),
        duration_seconds: Set(payload.duration_seconds),
        order_index: Set(payload.order_index),
        is_free: Set(payload.is_free),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    recompute_course_totals(&txn, course_id).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "lesson_create",
        Some("lessons"),
        Some(serde_json::json!({ "lesson_id": lesson.id, "course_id": course_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Lesson created",
        lesson_from_entity(lesson),
        Some(Meta::empty()),
    ))
}

pub async fn update_lesson(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateLessonRequest,
) -> AppResult<ApiResponse<Lesson>> {
    let txn = state.orm.begin().await?;

    let existing = Lessons::find_by_id(id).one(&txn).await?;
    let existing = match existing {
        Some(l) => l,
        None => return Err(AppError::NotFound),
    };
    let course_id = existing.course_id;

    let course = Courses::find_by_id(course_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let course = match course {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };
    can_manage_course(user, course.teacher_id)?;

    let mut active: ActiveModel = existing.into();
    if let Some(title) = payload.title {
        active.title = Set(title);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(video_url) = payload.video_url {
        active.video_url = Set(Some(video_url));
    }
    if let Some(duration_seconds) = payload.duration_seconds {
        if duration_seconds < 0 {
            return Err(AppError::BadRequest(
                "duration_seconds cannot be negative".into(),
            ));
        }
        active.duration_seconds = Set(duration_seconds);
    }
    if let Some(order_index) = payload.order_index {
        if order_index < 0 {
            return Err(AppError::BadRequest("order_index cannot be negative".into()));
        }
        active.order_index = Set(order_index);
    }
    if let Some(is_free) = payload.is_free {
        active.is_free = Set(is_free);
    }

    let lesson = active.update(&txn).await?;

    recompute_course_totals(&txn, course_id).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "lesson_update",
        Some("lessons"),
        Some(serde_json::json!({ "lesson_id": lesson.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        lesson_from_entity(lesson),
        Some(Meta::empty()),
    ))
}

pub async fn delete_lesson(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;

    let existing = Lessons::find_by_id(id).one(&txn).await?;
    let existing = match existing {
        Some(l) => l,
        None => return Err(AppError::NotFound),
    };
    let course_id = existing.course_id;

    let course = Courses::find_by_id(course_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let course = match course {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };
    can_manage_course(user, course.teacher_id)?;

    Lessons::delete_by_id(id).exec(&txn).await?;

    recompute_course_totals(&txn, course_id).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "lesson_delete",
        Some("lessons"),
        Some(serde_json::json!({ "lesson_id": id, "course_id": course_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Keep the denormalized course counters in step with the lesson table.
/// Runs inside the caller's transaction, with the course row locked.
async fn recompute_course_totals(
    txn: &sea_orm::DatabaseTransaction,
    course_id: Uuid,
) -> AppResult<()> {
    #[derive(Debug, FromQueryResult)]
    struct LessonTotals {
        cnt: i64,
        secs: Option<i64>,
    }

    let totals = Lessons::find()
        .select_only()
        .column_as(Expr::col(Column::Id).count(), "cnt")
        .column_as(Expr::col(Column::DurationSeconds).sum(), "secs")
        .filter(Column::CourseId.eq(course_id))
        .into_model::<LessonTotals>()
        .one(txn)
        .await?
        .unwrap_or(LessonTotals { cnt: 0, secs: None });

    Courses::update_many()
        .col_expr(CourseCol::TotalLessons, Expr::value(totals.cnt as i32))
        .col_expr(
            CourseCol::DurationHours,
            Expr::value(totals.secs.unwrap_or(0) as f64 / 3600.0),
        )
        .col_expr(CourseCol::UpdatedAt, Expr::value(Utc::now()))
        .filter(CourseCol::Id.eq(course_id))
        .exec(txn)
        .await?;

    Ok(())
}

/// Course lookup with the same visibility rule as the course read path:
/// unpublished courses exist only for their owner and admins.
async fn find_visible_course(
    state: &AppState,
    viewer: Option<&AuthUser>,
    course_id: Uuid,
) -> AppResult<CourseModel> {
    let course = Courses::find_by_id(course_id).one(&state.orm).await?;
    let course = match course {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    if course.status != CourseStatus::Published.as_str() {
        let allowed = viewer
            .map(|v| can_manage_course(v, course.teacher_id).is_ok())
            .unwrap_or(false);
        if !allowed {
            return Err(AppError::NotFound);
        }
    }
    Ok(course)
}

async fn has_full_access(
    state: &AppState,
    viewer: Option<&AuthUser>,
    course: &CourseModel,
) -> AppResult<bool> {
    let viewer = match viewer {
        Some(v) => v,
        None => return Ok(false),
    };
    match viewer.role {
        Role::Admin => Ok(true),
        Role::Teacher => Ok(viewer.user_id == course.teacher_id),
        Role::Student => {
            let enrolled = CourseEnrollments::find()
                .filter(EnrollCol::CourseId.eq(course.id))
                .filter(EnrollCol::StudentId.eq(viewer.user_id))
                .one(&state.orm)
                .await?;
            Ok(enrolled.is_some())
        }
    }
}

fn gate_lesson(mut lesson: Lesson, full_access: bool) -> Lesson {
    if !full_access && !lesson.is_free {
        lesson.video_url = None;
    }
    lesson
}

fn lesson_from_entity(model: LessonModel) -> Lesson {
    Lesson {
        id: model.id,
        course_id: model.course_id,
        title: model.title,
        description: model.description,
        video_url: model.video_url,
        duration_seconds: model.duration_seconds,
        order_index: model.order_index,
        is_free: model.is_free,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
