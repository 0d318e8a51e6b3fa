pub mod audit_logs;
pub mod course_enrollments;
pub mod courses;
pub mod lesson_progress;
pub mod lessons;
pub mod payments;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use course_enrollments::Entity as CourseEnrollments;
pub use courses::Entity as Courses;
pub use lesson_progress::Entity as LessonProgress;
pub use lessons::Entity as Lessons;
pub use payments::Entity as Payments;
pub use users::Entity as Users;
