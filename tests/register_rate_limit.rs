use std::sync::Arc;

use axum_elearning_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::auth::RegisterRequest,
    error::AppError,
    models::Role,
    ratelimit::RateLimiter,
    services::auth_service,
    state::AppState,
};

// Registration is throttled server-side, per email: once the bucket is dry
// the caller gets 429 regardless of what else is wrong with the request.
#[tokio::test]
async fn repeated_registration_attempts_hit_the_limiter() -> anyhow::Result<()> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(());
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

    // Two attempts, no refill: the third must be rejected up front.
    let state = AppState {
        pool,
        orm,
        rate_limiter: Arc::new(RateLimiter::new(2, 0.0)),
    };

    let created = auth_service::register_user(&state, request("limited@example.com"))
        .await?
        .data
        .unwrap();
    assert_eq!(created.role, Role::Student);

    let err = auth_service::register_user(&state, request("limited@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = auth_service::register_user(&state, request("limited@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RateLimited));

    // A different address still has its own budget.
    auth_service::register_user(&state, request("fresh@example.com")).await?;

    // Admin self-registration is rejected outright.
    let err = auth_service::register_user(
        &state,
        RegisterRequest {
            email: "boss@example.com".into(),
            password: "secret123".into(),
            name: "Boss".into(),
            role: Role::Admin,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

fn request(email: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.into(),
        password: "secret123".into(),
        name: "Limited".into(),
        role: Role::Student,
    }
}
