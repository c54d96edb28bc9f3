use time::OffsetDateTime;
use tracing::{info, warn};

use super::course::{CourseSnapshot, CourseStatus, EnrolledCourse};
use super::state::{EnrollmentState, LearningStats};
use crate::storage::Storage;
use crate::utils::local_now;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollOutcome {
    Enrolled,
    AlreadyEnrolled,
}

/// A user session's enrollments, written through to `storage` under `key`
/// after every mutation.
///
/// Nothing here returns an error. A rejected enrollment is reported both by the
/// returned [`EnrollOutcome`] and by [`EnrollmentStore::error`], and storage
/// failures are only logged.
pub struct EnrollmentStore<S: Storage> {
    storage: S,
    key: String,
    state: EnrollmentState,
    error: Option<String>,
    clock: fn() -> OffsetDateTime,
}

impl<S: Storage> EnrollmentStore<S> {
    /// Rehydrates from `storage`. Missing or unreadable records start empty.
    pub fn open(storage: S, key: impl Into<String>) -> Self {
        let key = key.into();
        let state = load_state(&storage, &key);
        info!(
            "loaded {} enrolled courses from {key}",
            state.enrolled_courses.len()
        );
        Self {
            storage,
            key,
            state,
            error: None,
            clock: local_now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> &EnrollmentState {
        &self.state
    }

    pub fn enrolled_courses(&self) -> &[EnrolledCourse] {
        self.state.courses()
    }

    /// Message left by the last rejected mutation, cleared by the next successful one.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Replaces the in-memory registry with what storage currently holds.
    pub fn reload(&mut self) {
        self.state = load_state(&self.storage, &self.key);
        self.error = None;
    }

    pub fn enroll_in_course(&mut self, course: CourseSnapshot) -> EnrollOutcome {
        match self.state.enroll(course, (self.clock)()) {
            Ok(next) => {
                self.commit(next);
                EnrollOutcome::Enrolled
            }
            Err(e) => {
                warn!("enroll rejected: {e}");
                self.error = Some(e.to_string());
                EnrollOutcome::AlreadyEnrolled
            }
        }
    }

    pub fn unenroll_from_course(&mut self, course_id: &str) {
        let next = self.state.unenroll(course_id);
        self.commit(next);
    }

    /// `progress` is expected in `0..=100` and `completed_lessons` in
    /// `0..=total_lessons`. The store records whatever it is given.
    pub fn update_course_progress(&mut self, course_id: &str, progress: u32, completed_lessons: u32) {
        let next = self
            .state
            .update_progress(course_id, progress, completed_lessons, (self.clock)());
        self.commit(next);
    }

    pub fn mark_course_completed(&mut self, course_id: &str) {
        let next = self.state.mark_completed(course_id, (self.clock)());
        self.commit(next);
    }

    pub fn get_enrolled_course(&self, course_id: &str) -> Option<&EnrolledCourse> {
        self.state.get(course_id)
    }

    pub fn is_enrolled(&self, course_id: &str) -> bool {
        self.state.is_enrolled(course_id)
    }

    pub fn get_courses_by_status(&self, status: CourseStatus) -> Vec<&EnrolledCourse> {
        self.state.by_status(status)
    }

    pub fn get_total_progress(&self) -> u32 {
        self.state.total_progress()
    }

    pub fn get_learning_stats(&self) -> LearningStats {
        self.state.learning_stats()
    }

    fn commit(&mut self, next: EnrollmentState) {
        self.state = next;
        self.error = None;
        if let Err(e) = self.persist() {
            warn!("failed to persist enrollments to {}: {e:#}", self.key);
        }
    }

    fn persist(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string(&self.state)?;
        self.storage.set_item(&self.key, &json)
    }
}

fn load_state(storage: &impl Storage, key: &str) -> EnrollmentState {
    let raw = match storage.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return EnrollmentState::default(),
        Err(e) => {
            warn!("failed to read {key}, starting empty: {e:#}");
            return EnrollmentState::default();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!("stored enrollments under {key} are unreadable, starting empty: {e}");
        EnrollmentState::default()
    })
}
