pub mod course;
pub mod state;
pub mod store;

pub use course::{CourseSnapshot, CourseStatus, Difficulty, DurationRange, EnrolledCourse};
pub use state::{EnrollmentState, LearningStats, persisted_schema};
pub use store::{EnrollOutcome, EnrollmentStore};
