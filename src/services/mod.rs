pub mod admin_service;
pub mod auth_service;
pub mod course_service;
pub mod enrollment_service;
pub mod lesson_service;
pub mod payment_service;
pub mod progress_service;
