#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("You are already enrolled in this course")]
    AlreadyEnrolled { course_id: String },
    #[error("Course {0} not found in catalog")]
    CourseNotFound(String),
    #[error("Instructor application {0} not found")]
    ApplicationNotFound(i64),
    #[error("User {user_id} already has an open instructor application ({status})")]
    ApplicationExists { user_id: String, status: String },
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Fatal error: {0}")]
    Fatal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
