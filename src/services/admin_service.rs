use chrono::Utc;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::payments::{PaymentList, UpdatePaymentStatusRequest},
    dto::stats::{
        CoursePerformanceRow, CoursePerformanceStats, DashboardStats, PaymentStats,
        PaymentStatusRow, UserGrowthPoint, UserGrowthStats,
    },
    entity::{
        payments::{Column as PaymentCol, Entity as Payments, Model as PaymentModel},
        users::{Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Payment, User},
    response::{ApiResponse, Meta},
    routes::admin::UserList,
    routes::params::{PaymentListQuery, Pagination, SortOrder, UserListQuery},
    services::enrollment_service,
    state::AppState,
};

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(role) = query.role {
        condition = condition.add(UserCol::Role.eq(role.as_str()));
    }

    let finder = Users::find()
        .filter(condition)
        .order_by_desc(UserCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(user_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

pub async fn delete_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    if id == user.user_id {
        return Err(AppError::BadRequest(
            "cannot delete your own account".into(),
        ));
    }

    let result = Users::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "user_delete",
        Some("users"),
        Some(serde_json::json!({ "deleted_user_id": id })),
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

pub async fn list_all_payments(
    state: &AppState,
    user: &AuthUser,
    query: PaymentListQuery,
) -> AppResult<ApiResponse<PaymentList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(PaymentCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Payments::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(PaymentCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(PaymentCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(payment_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Payments",
        PaymentList { items },
        Some(meta),
    ))
}

/// Admin payment review. Transitions run under a row lock and only the
/// validated forward transitions are accepted; completing a payment enrolls
/// the payer in the same transaction.
pub async fn update_payment_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdatePaymentStatusRequest,
) -> AppResult<ApiResponse<Payment>> {
    ensure_admin(user)?;

    let mut tx = state.pool.begin().await?;

    let payment: Option<Payment> = sqlx::query_as("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    let payment = match payment {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    if !payment.status.can_transition_to(payload.status) {
        return Err(AppError::BadRequest(format!(
            "cannot transition payment from {} to {}",
            payment.status, payload.status
        )));
    }

    let updated: Payment = sqlx::query_as(
        "UPDATE payments SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.status.as_str())
    .fetch_one(&mut *tx)
    .await?;

    if updated.status == crate::models::PaymentStatus::Completed {
        enrollment_service::insert_enrollment(&mut tx, updated.course_id, updated.user_id).await?;
    }

    tx.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_status_update",
        Some("payments"),
        Some(serde_json::json!({ "payment_id": updated.id, "status": updated.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment updated",
        updated,
        Some(Meta::empty()),
    ))
}

pub async fn dashboard_stats(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<DashboardStats>> {
    ensure_admin(user)?;

    #[derive(Debug, FromRow)]
    struct DashboardRow {
        total_users: i64,
        total_teachers: i64,
        total_students: i64,
        total_courses: i64,
        published_courses: i64,
        total_enrollments: i64,
        completed_lessons: i64,
        revenue: i64,
    }

    let row: DashboardRow = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users) AS total_users,
            (SELECT COUNT(*) FROM users WHERE role = 'teacher') AS total_teachers,
            (SELECT COUNT(*) FROM users WHERE role = 'student') AS total_students,
            (SELECT COUNT(*) FROM courses) AS total_courses,
            (SELECT COUNT(*) FROM courses WHERE status = 'published') AS published_courses,
            (SELECT COUNT(*) FROM course_enrollments) AS total_enrollments,
            (SELECT COUNT(*) FROM lesson_progress WHERE is_completed) AS completed_lessons,
            (SELECT COALESCE(SUM(amount), 0) FROM payments WHERE status = 'completed')::int8 AS revenue
        "#,
    )
    .fetch_one(&state.pool)
    .await?;

    let data = DashboardStats {
        total_users: row.total_users,
        total_teachers: row.total_teachers,
        total_students: row.total_students,
        total_courses: row.total_courses,
        published_courses: row.published_courses,
        total_enrollments: row.total_enrollments,
        completed_lessons: row.completed_lessons,
        revenue: row.revenue,
    };
    Ok(ApiResponse::success("Dashboard", data, None))
}

pub async fn user_growth_stats(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<UserGrowthStats>> {
    ensure_admin(user)?;

    #[derive(Debug, FromRow)]
    struct GrowthRow {
        month: String,
        signups: i64,
    }

    let rows = sqlx::query_as::<_, GrowthRow>(
        r#"
        SELECT to_char(date_trunc('month', created_at), 'YYYY-MM') AS month,
               COUNT(*) AS signups
        FROM users
        WHERE created_at >= date_trunc('month', now()) - interval '11 months'
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let points = rows
        .into_iter()
        .map(|r| UserGrowthPoint {
            month: r.month,
            signups: r.signups,
        })
        .collect();

    Ok(ApiResponse::success(
        "User growth",
        UserGrowthStats { points },
        None,
    ))
}

pub async fn course_performance_stats(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CoursePerformanceStats>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    #[derive(Debug, FromRow)]
    struct PerformanceRow {
        course_id: Uuid,
        title: String,
        enrollments: i64,
        avg_progress: f64,
        completion_rate: f64,
        revenue: i64,
    }

    let rows = sqlx::query_as::<_, PerformanceRow>(
        r#"
        SELECT c.id AS course_id, c.title,
               COUNT(ce.id) AS enrollments,
               COALESCE(AVG(ce.progress), 0)::float8 AS avg_progress,
               COALESCE(COUNT(*) FILTER (WHERE ce.progress >= 100) * 100.0
                   / NULLIF(COUNT(ce.id), 0), 0)::float8 AS completion_rate,
               COALESCE((SELECT SUM(p.amount) FROM payments p
                   WHERE p.course_id = c.id AND p.status = 'completed'), 0)::int8 AS revenue
        FROM courses c
        LEFT JOIN course_enrollments ce ON ce.course_id = c.id
        GROUP BY c.id, c.title
        ORDER BY enrollments DESC, c.created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM courses")
        .fetch_one(&state.pool)
        .await?;

    let items = rows
        .into_iter()
        .map(|r| CoursePerformanceRow {
            course_id: r.course_id,
            title: r.title,
            enrollments: r.enrollments,
            avg_progress: r.avg_progress,
            completion_rate: r.completion_rate,
            revenue: r.revenue,
        })
        .collect();

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "Course performance",
        CoursePerformanceStats { items },
        Some(meta),
    ))
}

pub async fn payment_stats(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<PaymentStats>> {
    ensure_admin(user)?;

    #[derive(Debug, FromRow)]
    struct StatusRow {
        status: String,
        count: i64,
        amount: i64,
    }

    let rows = sqlx::query_as::<_, StatusRow>(
        r#"
        SELECT status, COUNT(*) AS count, COALESCE(SUM(amount), 0)::int8 AS amount
        FROM payments
        GROUP BY status
        ORDER BY status
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let rows = rows
        .into_iter()
        .map(|r| PaymentStatusRow {
            status: r.status,
            count: r.count,
            amount: r.amount,
        })
        .collect();

    Ok(ApiResponse::success(
        "Payment stats",
        PaymentStats { rows },
        None,
    ))
}

fn user_from_entity(model: UserModel) -> AppResult<User> {
    Ok(User {
        id: model.id,
        email: model.email,
        password_hash: model.password_hash,
        name: model.name,
        role: model
            .role
            .parse()
            .map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))?,
        avatar_url: model.avatar_url,
        bio: model.bio,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn payment_from_entity(model: PaymentModel) -> AppResult<Payment> {
    Ok(Payment {
        id: model.id,
        user_id: model.user_id,
        course_id: model.course_id,
        amount: model.amount,
        status: model
            .status
            .parse()
            .map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))?,
        reference: model.reference,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}
