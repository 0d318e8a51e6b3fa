use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::courses::{
        CourseList, CourseWithTeacher, CreateCourseRequest, UpdateCourseRequest,
        UpdateCourseStatusRequest,
    },
    entity::{
        courses::{ActiveModel, Column, Entity as Courses, Model as CourseModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, can_manage_course, ensure_admin, ensure_teacher},
    models::{Course, CourseStatus},
    response::{ApiResponse, Meta},
    routes::params::{CourseQuery, CourseSortBy, SortOrder},
    state::AppState,
};

/// Catalog search. Only published courses are listed, whoever asks.
pub async fn list_courses(
    state: &AppState,
    query: CourseQuery,
) -> AppResult<ApiResponse<CourseList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(Column::Status.eq(CourseStatus::Published.as_str()));

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Title).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern.clone()))
                .add(Expr::col(Column::Category).ilike(pattern)),
        );
    }

    if let Some(category) = query.category.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::Category.eq(category.clone()));
    }

    if let Some(level) = query.level {
        condition = condition.add(Column::Level.eq(level.as_str()));
    }

    let sort_by = query.sort_by.unwrap_or(CourseSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        CourseSortBy::CreatedAt => Column::CreatedAt,
        CourseSortBy::Rating => Column::Rating,
        CourseSortBy::Title => Column::Title,
    };

    let mut finder = Courses::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(course_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    let data = CourseList { items };
    Ok(ApiResponse::success("Courses", data, Some(meta)))
}

/// One course with the teacher's name joined in. Unpublished courses are
/// visible only to their owner or an admin.
pub async fn get_course(
    state: &AppState,
    viewer: Option<&AuthUser>,
    id: Uuid,
) -> AppResult<ApiResponse<CourseWithTeacher>> {
    let model = Courses::find_by_id(id).one(&state.orm).await?;
    let model = match model {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    let course = course_from_entity(model)?;
    if course.status != CourseStatus::Published {
        let allowed = viewer
            .map(|v| can_manage_course(v, course.teacher_id).is_ok())
            .unwrap_or(false);
        if !allowed {
            return Err(AppError::NotFound);
        }
    }

    let teacher = Users::find_by_id(course.teacher_id).one(&state.orm).await?;
    let teacher_name = teacher.map(|t| t.name).unwrap_or_default();

    let data = CourseWithTeacher {
        course,
        teacher_name,
    };
    Ok(ApiResponse::success("Course", data, None))
}

pub async fn create_course(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCourseRequest,
) -> AppResult<ApiResponse<Course>> {
    ensure_teacher(user)?;
    if !payload.is_free && payload.price <= 0 {
        return Err(AppError::BadRequest(
            "price must be greater than 0 for a paid course".into(),
        ));
    }

    let id = Uuid::new_v4();
    let active = ActiveModel {
        id: Set(id),
        teacher_id: Set(user.user_id),
        title: Set(payload.title),
        description: Set(payload.description),
        category: Set(payload.category),
        level: Set(payload.level.as_str().to_string()),
        status: Set(CourseStatus::Draft.as_str().to_string()),
        is_free: Set(payload.is_free),
        price: Set(if payload.is_free { 0 } else { payload.price }),
        enrollment_count: Set(0),
        total_lessons: Set(0),
        duration_hours: Set(0.0),
        rating: Set(0.0),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let course = active.insert(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "course_create",
        Some("courses"),
        Some(serde_json::json!({ "course_id": course.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Course created",
        course_from_entity(course)?,
        Some(Meta::empty()),
    ))
}

pub async fn update_course(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCourseRequest,
) -> AppResult<ApiResponse<Course>> {
    let existing = Courses::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };
    can_manage_course(user, existing.teacher_id)?;

    // Rating is a moderation knob, not something teachers set on themselves.
    if payload.rating.is_some() {
        ensure_admin(user)?;
    }

    let mut active: ActiveModel = existing.into();
    if let Some(title) = payload.title {
        active.title = Set(title);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(category) = payload.category {
        active.category = Set(category);
    }
    if let Some(level) = payload.level {
        active.level = Set(level.as_str().to_string());
    }
    if let Some(is_free) = payload.is_free {
        active.is_free = Set(is_free);
    }
    if let Some(price) = payload.price {
        if price < 0 {
            return Err(AppError::BadRequest("price cannot be negative".into()));
        }
        active.price = Set(price);
    }
    if let Some(rating) = payload.rating {
        if !(0.0..=5.0).contains(&rating) {
            return Err(AppError::BadRequest("rating must be within 0..=5".into()));
        }
        active.rating = Set(rating);
    }
    active.updated_at = Set(Utc::now().into());

    let course = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "course_update",
        Some("courses"),
        Some(serde_json::json!({ "course_id": course.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        course_from_entity(course)?,
        Some(Meta::empty()),
    ))
}

pub async fn update_course_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCourseStatusRequest,
) -> AppResult<ApiResponse<Course>> {
    let existing = Courses::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };
    can_manage_course(user, existing.teacher_id)?;

    let current: CourseStatus = existing
        .status
        .parse()
        .map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))?;
    if !current.can_transition_to(payload.status) {
        return Err(AppError::BadRequest(format!(
            "cannot transition course from {} to {}",
            current, payload.status
        )));
    }

    let mut active: ActiveModel = existing.into();
    active.status = Set(payload.status.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let course = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "course_status_update",
        Some("courses"),
        Some(serde_json::json!({ "course_id": course.id, "status": course.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Status updated",
        course_from_entity(course)?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_course(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing = Courses::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };
    can_manage_course(user, existing.teacher_id)?;

    // Lessons, enrollments and progress rows go with the course via FK cascade.
    Courses::delete_by_id(id).exec(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "course_delete",
        Some("courses"),
        Some(serde_json::json!({ "course_id": id })),
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

pub(crate) fn course_from_entity(model: CourseModel) -> AppResult<Course> {
    Ok(Course {
        id: model.id,
        teacher_id: model.teacher_id,
        title: model.title,
        description: model.description,
        category: model.category,
        level: model
            .level
            .parse()
            .map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))?,
        status: model
            .status
            .parse()
            .map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))?,
        is_free: model.is_free,
        price: model.price,
        enrollment_count: model.enrollment_count,
        total_lessons: model.total_lessons,
        duration_hours: model.duration_hours,
        rating: model.rating,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}
