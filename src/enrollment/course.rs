use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl CourseStatus {
    /// `0` is not started, exactly `100` is completed, everything else is in progress.
    /// Out of range values are not corrected here.
    pub fn from_progress(progress: u32) -> Self {
        match progress {
            0 => CourseStatus::NotStarted,
            100 => CourseStatus::Completed,
            _ => CourseStatus::InProgress,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::NotStarted => "not_started",
            CourseStatus::InProgress => "in_progress",
            CourseStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CourseStatus {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(CourseStatus::NotStarted),
            "in_progress" => Ok(CourseStatus::InProgress),
            "completed" => Ok(CourseStatus::Completed),
            _ => anyhow::bail!("unknown course status {s:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        };
        f.write_str(s)
    }
}

/// Catalog fields copied into an enrollment when it is created
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseSnapshot {
    pub id: String,
    pub title: String,
    pub instructor: String,
    pub thumbnail: String,
    pub category: String,
    pub description: String,
    pub rating: f32,
    pub difficulty: Difficulty,
    pub total_lessons: u32,
    /// Free text such as "6-8 hours"
    pub estimated_duration: String,
}

/// A user's enrollment in one catalog course.
///
/// Display metadata is a snapshot taken at enrollment time, it does not follow
/// later catalog edits.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledCourse {
    pub id: String,
    pub title: String,
    pub instructor: String,
    pub thumbnail: String,
    pub category: String,
    pub description: String,
    pub rating: f32,
    pub difficulty: Difficulty,
    /// Percentage, expected in `0..=100`
    pub progress: u32,
    pub status: CourseStatus,
    #[serde(with = "time::serde::rfc3339")]
    #[schemars(with = "String")]
    pub enrolled_at: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<String>")]
    pub last_accessed: Option<OffsetDateTime>,
    pub total_lessons: u32,
    pub completed_lessons: u32,
    pub estimated_duration: String,
}

impl EnrolledCourse {
    pub fn new(snapshot: CourseSnapshot, enrolled_at: OffsetDateTime) -> Self {
        let CourseSnapshot {
            id,
            title,
            instructor,
            thumbnail,
            category,
            description,
            rating,
            difficulty,
            total_lessons,
            estimated_duration,
        } = snapshot;
        Self {
            id,
            title,
            instructor,
            thumbnail,
            category,
            description,
            rating,
            difficulty,
            progress: 0,
            status: CourseStatus::NotStarted,
            enrolled_at,
            last_accessed: None,
            total_lessons,
            completed_lessons: 0,
            estimated_duration,
        }
    }

    /// Sets progress and completed lessons, re-deriving the status.
    pub fn set_progress(&mut self, progress: u32, completed_lessons: u32, now: OffsetDateTime) {
        self.progress = progress;
        self.completed_lessons = completed_lessons;
        self.status = CourseStatus::from_progress(progress);
        self.last_accessed = Some(now);
    }

    pub fn complete(&mut self, now: OffsetDateTime) {
        self.set_progress(100, self.total_lessons, now);
    }

    pub fn estimated_hours(&self) -> u32 {
        duration_hours(&self.estimated_duration)
    }
}

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").expect("valid regex"));
static RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)(?:\s*-\s*([0-9]+))?").expect("valid regex"));

/// Hours counted for a free text duration: the first run of ASCII digits, `0` without one.
pub fn duration_hours(text: &str) -> u32 {
    DIGITS
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Structured form of a duration like "6-8 hours" or "12 hours".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DurationRange {
    pub min_hours: u32,
    pub max_hours: u32,
}

impl DurationRange {
    pub fn parse(text: &str) -> Option<Self> {
        let caps = RANGE.captures(text)?;
        let min_hours = caps.get(1)?.as_str().parse().ok()?;
        let max_hours = match caps.get(2) {
            Some(m) => m.as_str().parse().ok()?,
            None => min_hours,
        };
        Some(Self {
            min_hours,
            max_hours: max_hours.max(min_hours),
        })
    }
}

impl fmt::Display for DurationRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min_hours == self.max_hours {
            write!(f, "{} hours", self.min_hours)
        } else {
            write!(f, "{}-{} hours", self.min_hours, self.max_hours)
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_snapshot(id: &str, total_lessons: u32, duration: &str) -> CourseSnapshot {
    CourseSnapshot {
        id: id.to_string(),
        title: format!("Course {id}"),
        instructor: "Ada Lovelace".to_string(),
        thumbnail: format!("/img/{id}.png"),
        category: "Programming".to_string(),
        description: "Learn things".to_string(),
        rating: 4.5,
        difficulty: Difficulty::Beginner,
        total_lessons,
        estimated_duration: duration.to_string(),
    }
}
