use std::sync::Arc;

use axum_elearning_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::payments::{CreatePaymentRequest, UpdatePaymentStatusRequest},
    entity::{
        course_enrollments::{Column as EnrollCol, Entity as Enrollments},
        courses::ActiveModel as CourseActive,
        payments::{Column as PaymentCol, Entity as Payments},
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{PaymentStatus, Role},
    ratelimit::RateLimiter,
    services::{admin_service, enrollment_service, payment_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

// Paid-course flow: enrollment is blocked until a payment completes, the
// completing transition enrolls the payer, and the status machine refuses to
// rewind.
#[tokio::test]
async fn payment_gates_enrollment_and_transitions_forward_only() -> anyhow::Result<()> {
    let state = match setup_state().await? {
        Some(s) => s,
        None => return Ok(()),
    };

    let teacher_id = create_user(&state, "teacher", "teacher@example.com").await?;
    let student_id = create_user(&state, "student", "student@example.com").await?;
    let admin_id = create_user(&state, "admin", "admin@example.com").await?;

    let course_id = create_paid_course(&state, teacher_id, "Advanced SQL", 5000).await?;

    let student = AuthUser {
        user_id: student_id,
        role: Role::Student,
    };
    let admin = AuthUser {
        user_id: admin_id,
        role: Role::Admin,
    };

    // No completed payment yet, so enrollment is refused.
    let err = enrollment_service::enroll(&state, &student, course_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Opening a payment twice does not stack rows; the pending one comes back.
    let payment = payment_service::create_payment(
        &state,
        &student,
        CreatePaymentRequest { course_id },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.amount, 5000);
    assert!(payment.reference.starts_with("PAY-"));

    let again = payment_service::create_payment(
        &state,
        &student,
        CreatePaymentRequest { course_id },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(again.id, payment.id);

    let payment_rows = Payments::find()
        .filter(PaymentCol::UserId.eq(student_id))
        .filter(PaymentCol::CourseId.eq(course_id))
        .count(&state.orm)
        .await?;
    assert_eq!(payment_rows, 1);

    // Completing the payment enrolls the payer in the same transaction.
    let completed = admin_service::update_payment_status(
        &state,
        &admin,
        payment.id,
        UpdatePaymentStatusRequest {
            status: PaymentStatus::Completed,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(completed.status, PaymentStatus::Completed);

    let enrollment_rows = Enrollments::find()
        .filter(EnrollCol::CourseId.eq(course_id))
        .filter(EnrollCol::StudentId.eq(student_id))
        .count(&state.orm)
        .await?;
    assert_eq!(enrollment_rows, 1);

    // The explicit enroll call is now a no-op, not a second row.
    enrollment_service::enroll(&state, &student, course_id).await?;
    let enrollment_rows = Enrollments::find()
        .filter(EnrollCol::CourseId.eq(course_id))
        .filter(EnrollCol::StudentId.eq(student_id))
        .count(&state.orm)
        .await?;
    assert_eq!(enrollment_rows, 1);

    let (enrollment_count,): (i32,) =
        sqlx::query_as("SELECT enrollment_count FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_one(&state.pool)
            .await?;
    assert_eq!(enrollment_count, 1);

    // A completed payment cannot be rewound to pending.
    let err = admin_service::update_payment_status(
        &state,
        &admin,
        payment.id,
        UpdatePaymentStatusRequest {
            status: PaymentStatus::Pending,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Refund is the one forward move left.
    let refunded = admin_service::update_payment_status(
        &state,
        &admin,
        payment.id,
        UpdatePaymentStatusRequest {
            status: PaymentStatus::Refunded,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);

    Ok(())
}

async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    sqlx::query(
        "TRUNCATE TABLE lesson_progress, course_enrollments, payments, lessons, courses, audit_logs, users RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await?;

    Ok(Some(AppState {
        pool,
        orm,
        rate_limiter: Arc::new(RateLimiter::new(100, 1.0)),
    }))
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        name: Set(email.split('@').next().unwrap_or("user").to_string()),
        role: Set(role.into()),
        avatar_url: Set(None),
        bio: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_paid_course(
    state: &AppState,
    teacher_id: Uuid,
    title: &str,
    price: i64,
) -> anyhow::Result<Uuid> {
    let course = CourseActive {
        id: Set(Uuid::new_v4()),
        teacher_id: Set(teacher_id),
        title: Set(title.to_string()),
        description: Set(None),
        category: Set("databases".into()),
        level: Set("advanced".into()),
        status: Set("published".into()),
        is_free: Set(false),
        price: Set(price),
        enrollment_count: Set(0),
        total_lessons: Set(0),
        duration_hours: Set(0.0),
        rating: Set(0.0),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(course.id)
}
