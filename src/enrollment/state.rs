use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::course::{CourseSnapshot, CourseStatus, EnrolledCourse};
use crate::error::{Error, Result};

/// The enrollment registry as a plain value.
///
/// Transitions borrow the current state and hand back the next one, so callers
/// decide where the state lives. This is also exactly what gets persisted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentState {
    #[serde(default)]
    pub enrolled_courses: Vec<EnrolledCourse>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LearningStats {
    pub total_courses: usize,
    pub completed_courses: usize,
    pub in_progress_courses: usize,
    pub total_hours: u64,
    pub average_progress: u32,
}

impl EnrollmentState {
    pub fn courses(&self) -> &[EnrolledCourse] {
        &self.enrolled_courses
    }

    pub fn len(&self) -> usize {
        self.enrolled_courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enrolled_courses.is_empty()
    }

    pub fn enroll(&self, snapshot: CourseSnapshot, now: OffsetDateTime) -> Result<Self> {
        if self.is_enrolled(&snapshot.id) {
            return Err(Error::AlreadyEnrolled {
                course_id: snapshot.id,
            });
        }
        let mut next = self.clone();
        next.enrolled_courses.push(EnrolledCourse::new(snapshot, now));
        Ok(next)
    }

    /// Unknown ids leave the state as it is.
    pub fn unenroll(&self, course_id: &str) -> Self {
        Self {
            enrolled_courses: self
                .enrolled_courses
                .iter()
                .filter(|c| c.id != course_id)
                .cloned()
                .collect(),
        }
    }

    /// Caller keeps `progress` within `0..=100` and `completed_lessons` within
    /// `0..=total_lessons`; values are recorded as given.
    pub fn update_progress(
        &self,
        course_id: &str,
        progress: u32,
        completed_lessons: u32,
        now: OffsetDateTime,
    ) -> Self {
        self.map_course(course_id, |course| {
            course.set_progress(progress, completed_lessons, now)
        })
    }

    pub fn mark_completed(&self, course_id: &str, now: OffsetDateTime) -> Self {
        self.map_course(course_id, |course| course.complete(now))
    }

    fn map_course(&self, course_id: &str, f: impl FnOnce(&mut EnrolledCourse)) -> Self {
        let mut next = self.clone();
        if let Some(course) = next.enrolled_courses.iter_mut().find(|c| c.id == course_id) {
            f(course);
        }
        next
    }

    pub fn get(&self, course_id: &str) -> Option<&EnrolledCourse> {
        self.enrolled_courses.iter().find(|c| c.id == course_id)
    }

    pub fn is_enrolled(&self, course_id: &str) -> bool {
        self.get(course_id).is_some()
    }

    pub fn by_status(&self, status: CourseStatus) -> Vec<&EnrolledCourse> {
        self.enrolled_courses
            .iter()
            .filter(|c| c.status == status)
            .collect()
    }

    fn count_status(&self, status: CourseStatus) -> usize {
        self.enrolled_courses
            .iter()
            .filter(|c| c.status == status)
            .count()
    }

    /// Mean progress rounded half up, `0` for an empty registry.
    pub fn total_progress(&self) -> u32 {
        rounded_mean(self.enrolled_courses.iter().map(|c| c.progress))
    }

    pub fn learning_stats(&self) -> LearningStats {
        LearningStats {
            total_courses: self.len(),
            completed_courses: self.count_status(CourseStatus::Completed),
            in_progress_courses: self.count_status(CourseStatus::InProgress),
            total_hours: self
                .enrolled_courses
                .iter()
                .map(|c| u64::from(c.estimated_hours()))
                .sum(),
            average_progress: self.total_progress(),
        }
    }
}

/// JSON Schema of the persisted registry record
pub fn persisted_schema() -> schemars::schema::RootSchema {
    let mut settings = schemars::r#gen::SchemaSettings::draft07();
    settings.option_add_null_type = false;
    settings.inline_subschemas = true;
    settings.into_generator().into_root_schema_for::<EnrollmentState>()
}

fn rounded_mean(values: impl Iterator<Item = u32>) -> u32 {
    let (sum, n) = values.fold((0u64, 0u64), |(sum, n), v| (sum + u64::from(v), n + 1));
    if n == 0 {
        return 0;
    }
    ((2 * sum + n) / (2 * n)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::course::sample_snapshot;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-05-01 09:00 UTC);
    const T1: OffsetDateTime = datetime!(2024-05-02 09:00 UTC);

    fn with_progress(values: &[u32]) -> EnrollmentState {
        let mut state = EnrollmentState::default();
        for (i, p) in values.iter().enumerate() {
            let id = i.to_string();
            state = state
                .enroll(sample_snapshot(&id, 10, "2 hours"), T0)
                .unwrap()
                .update_progress(&id, *p, 0, T1);
        }
        state
    }

    #[test]
    fn enroll_starts_fresh() {
        let state = EnrollmentState::default()
            .enroll(sample_snapshot("101", 10, "6-8 hours"), T0)
            .unwrap();
        let course = state.get("101").unwrap();
        assert_eq!(course.progress, 0);
        assert_eq!(course.completed_lessons, 0);
        assert_eq!(course.status, CourseStatus::NotStarted);
        assert_eq!(course.enrolled_at, T0);
        assert_eq!(course.last_accessed, None);
    }

    #[test]
    fn duplicate_enroll_is_rejected() {
        let state = EnrollmentState::default()
            .enroll(sample_snapshot("101", 10, "6-8 hours"), T0)
            .unwrap();
        let err = state
            .enroll(sample_snapshot("101", 3, "1 hours"), T1)
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyEnrolled { ref course_id } if course_id == "101"));
        assert_eq!(err.to_string(), "You are already enrolled in this course");
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("101").unwrap().total_lessons, 10);
    }

    #[test]
    fn transitions_leave_previous_state_alone() {
        let before = with_progress(&[0]);
        let after = before.update_progress("0", 50, 5, T1);
        assert_eq!(before.get("0").unwrap().progress, 0);
        assert_eq!(after.get("0").unwrap().progress, 50);
    }

    #[test]
    fn progress_derives_status() {
        let state = with_progress(&[0]);
        let s = state.update_progress("0", 0, 0, T1);
        assert_eq!(s.get("0").unwrap().status, CourseStatus::NotStarted);
        let s = state.update_progress("0", 37, 4, T1);
        assert_eq!(s.get("0").unwrap().status, CourseStatus::InProgress);
        let s = state.update_progress("0", 100, 10, T1);
        assert_eq!(s.get("0").unwrap().status, CourseStatus::Completed);
        assert_eq!(s.get("0").unwrap().last_accessed, Some(T1));
    }

    #[test]
    fn completed_can_move_back_through_progress() {
        let state = with_progress(&[0]).mark_completed("0", T1);
        let state = state.update_progress("0", 40, 4, T1);
        assert_eq!(state.get("0").unwrap().status, CourseStatus::InProgress);
    }

    #[test]
    fn mark_completed_from_any_state() {
        for p in [0, 45, 100] {
            let state = with_progress(&[p]).mark_completed("0", T1);
            let course = state.get("0").unwrap();
            assert_eq!(course.progress, 100);
            assert_eq!(course.completed_lessons, course.total_lessons);
            assert_eq!(course.status, CourseStatus::Completed);
        }
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let state = with_progress(&[10, 20]);
        assert_eq!(state.unenroll("nope"), state);
        assert_eq!(state.update_progress("nope", 50, 1, T1), state);
        assert_eq!(state.mark_completed("nope", T1), state);
    }

    #[test]
    fn unenroll_removes_and_keeps_order() {
        let state = with_progress(&[10, 20, 30]).unenroll("1");
        let ids: Vec<_> = state.courses().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["0", "2"]);
    }

    #[test]
    fn by_status_keeps_registry_order() {
        let state = with_progress(&[50, 0, 100, 20]);
        let ids: Vec<_> = state
            .by_status(CourseStatus::InProgress)
            .into_iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, ["0", "3"]);
        assert_eq!(state.by_status(CourseStatus::Completed).len(), 1);
    }

    #[test]
    fn total_progress() {
        assert_eq!(EnrollmentState::default().total_progress(), 0);
        assert_eq!(with_progress(&[40, 60]).total_progress(), 50);
        assert_eq!(with_progress(&[0, 1]).total_progress(), 1);
        assert_eq!(with_progress(&[10, 10, 11]).total_progress(), 10);
    }

    #[test]
    fn learning_stats() {
        let mut state = EnrollmentState::default();
        for (id, duration) in [("a", "6-8 hours"), ("b", "hours"), ("c", "12 hours")] {
            state = state.enroll(sample_snapshot(id, 10, duration), T0).unwrap();
        }
        let state = state
            .update_progress("a", 50, 5, T1)
            .mark_completed("c", T1);
        assert_eq!(
            state.learning_stats(),
            LearningStats {
                total_courses: 3,
                completed_courses: 1,
                in_progress_courses: 1,
                total_hours: 18,
                average_progress: 50,
            }
        );
        assert_eq!(EnrollmentState::default().learning_stats(), LearningStats::default());
    }

    #[test]
    fn schema_names_persisted_fields() {
        let schema = serde_json::to_value(persisted_schema()).unwrap();
        let course = &schema["properties"]["enrolledCourses"]["items"]["properties"];
        assert_eq!(course["enrolledAt"]["type"], "string");
        assert!(course.get("lastAccessed").is_some());
        let required = schema["properties"]["enrolledCourses"]["items"]["required"]
            .as_array()
            .unwrap();
        assert!(!required.contains(&serde_json::json!("lastAccessed")));
    }

    #[test]
    fn persisted_layout() {
        let state = with_progress(&[25]);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["enrolledCourses"][0]["progress"], 25);
        let back: EnrollmentState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
