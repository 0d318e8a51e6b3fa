use chrono::Utc;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::payments::{CreatePaymentRequest, PaymentList},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    models::{Course, CourseStatus, Payment, PaymentStatus, Role},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Open a pending payment for a priced course. Re-requesting while a pending
/// payment exists returns that payment instead of stacking up new rows.
pub async fn create_payment(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePaymentRequest,
) -> AppResult<ApiResponse<Payment>> {
    ensure_role(user, Role::Student)?;

    let course: Option<Course> = sqlx::query_as("SELECT * FROM courses WHERE id = $1")
        .bind(payload.course_id)
        .fetch_optional(&state.pool)
        .await?;
    let course = match course {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    if course.status != CourseStatus::Published {
        return Err(AppError::BadRequest(
            "course is not available for purchase".into(),
        ));
    }
    if course.is_free {
        return Err(AppError::BadRequest(
            "course is free, enroll directly".into(),
        ));
    }

    let existing: Option<Payment> = sqlx::query_as(
        r#"
        SELECT * FROM payments
        WHERE user_id = $1 AND course_id = $2 AND status IN ('pending', 'completed')
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user.user_id)
    .bind(course.id)
    .fetch_optional(&state.pool)
    .await?;

    if let Some(payment) = existing {
        return match payment.status {
            PaymentStatus::Completed => {
                Err(AppError::BadRequest("course is already paid".into()))
            }
            _ => Ok(ApiResponse::success("Payment pending", payment, None)),
        };
    }

    let id = Uuid::new_v4();
    let reference = build_payment_reference(id);
    let payment: Payment = sqlx::query_as(
        r#"
        INSERT INTO payments (id, user_id, course_id, amount, status, reference)
        VALUES ($1, $2, $3, $4, 'pending', $5)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user.user_id)
    .bind(course.id)
    .bind(course.price)
    .bind(reference)
    .fetch_one(&state.pool)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_created",
        Some("payments"),
        Some(serde_json::json!({ "payment_id": payment.id, "course_id": course.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment created",
        payment,
        Some(Meta::empty()),
    ))
}

pub async fn list_my_payments(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<PaymentList>> {
    let (page, limit, offset) = pagination.normalize();

    let items = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "Payments",
        PaymentList { items },
        Some(meta),
    ))
}

pub(crate) fn build_payment_reference(payment_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = payment_id.to_string();
    let short = &suffix[..8];
    format!("PAY-{}-{}", date, short)
}
