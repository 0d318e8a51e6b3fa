use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum_elearning_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

// Fixed IDs keep the seed idempotent across runs.
const COURSE_ID: &str = "2f6c0d9e-7c1a-4b62-9b87-3f2a40d16f01";
const LESSON_IDS: [&str; 3] = [
    "7a3e1c40-51d2-4f8b-8a09-b64b5a9c2d11",
    "7a3e1c40-51d2-4f8b-8a09-b64b5a9c2d12",
    "7a3e1c40-51d2-4f8b-8a09-b64b5a9c2d13",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id =
        ensure_user_with_role(&pool, "admin@example.com", "admin123", "Admin", "admin").await?;
    let teacher_id =
        ensure_user_with_role(&pool, "teacher@example.com", "teacher123", "Sara Ahmed", "teacher")
            .await?;
    let student_id =
        ensure_user_with_role(&pool, "student@example.com", "student123", "Omar Khaled", "student")
            .await?;
    seed_sample_course(&pool, teacher_id).await?;

    println!("Seed completed. Admin ID: {admin_id}, Teacher ID: {teacher_id}, Student ID: {student_id}");
    Ok(())
}

async fn ensure_user_with_role(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    name: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, name, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(name)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(row.0)
}

async fn seed_sample_course(pool: &sqlx::PgPool, teacher_id: Uuid) -> anyhow::Result<()> {
    let course_id = Uuid::parse_str(COURSE_ID)?;
    sqlx::query(
        r#"
        INSERT INTO courses (id, teacher_id, title, description, category, level, status, is_free, price)
        VALUES ($1, $2, $3, $4, $5, 'beginner', 'published', TRUE, 0)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(course_id)
    .bind(teacher_id)
    .bind("أساسيات البرمجة بلغة Python")
    .bind("مقدمة عملية إلى البرمجة بلغة بايثون للمبتدئين")
    .bind("programming")
    .execute(pool)
    .await?;

    let lessons = [
        ("مقدمة إلى بايثون", 1, 420),
        ("المتغيرات وأنواع البيانات", 2, 540),
        ("الجمل الشرطية والحلقات", 3, 660),
    ];

    for ((title, order_index, duration_seconds), lesson_id) in lessons.into_iter().zip(LESSON_IDS) {
        sqlx::query(
            r#"
            INSERT INTO lessons (id, course_id, title, video_url, duration_seconds, order_index, is_free)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::parse_str(lesson_id)?)
        .bind(course_id)
        .bind(title)
        .bind(format!("https://videos.example.com/python/{order_index}.mp4"))
        .bind(duration_seconds)
        .bind(order_index)
        .execute(pool)
        .await?;
    }

    // Keep the denormalized counters honest for the seeded rows.
    sqlx::query(
        r#"
        UPDATE courses c
        SET total_lessons = sub.cnt,
            duration_hours = sub.secs / 3600.0
        FROM (
            SELECT COUNT(*) AS cnt, COALESCE(SUM(duration_seconds), 0) AS secs
            FROM lessons WHERE course_id = $1
        ) sub
        WHERE c.id = $1
        "#,
    )
    .bind(course_id)
    .execute(pool)
    .await?;

    println!("Seeded sample course");
    Ok(())
}
