use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::enrollment::{CourseSnapshot, Difficulty, DurationRange};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogCourse {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub instructor: String,
    pub thumbnail: String,
    pub category: String,
    pub description: String,
    pub rating: f32,
    #[serde(default)]
    pub students: u32,
    pub difficulty: Difficulty,
    pub total_lessons: u32,
    pub estimated_duration: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub featured: bool,
}

impl CatalogCourse {
    /// Copy of the display fields taken at enrollment time
    pub fn snapshot(&self) -> CourseSnapshot {
        CourseSnapshot {
            id: self.id.clone(),
            title: self.title.clone(),
            instructor: self.instructor.clone(),
            thumbnail: self.thumbnail.clone(),
            category: self.category.clone(),
            description: self.description.clone(),
            rating: self.rating,
            difficulty: self.difficulty,
            total_lessons: self.total_lessons,
            estimated_duration: self.estimated_duration.clone(),
        }
    }

    pub fn duration_range(&self) -> Option<DurationRange> {
        DurationRange::parse(&self.estimated_duration)
    }

    fn matches(&self, needle: &str) -> bool {
        [
            &self.title,
            &self.description,
            &self.instructor,
            &self.category,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Read-only course catalog, in file order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    courses: Vec<CatalogCourse>,
}

impl Catalog {
    pub fn new(courses: Vec<CatalogCourse>) -> Self {
        Self { courses }
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let courses: Vec<CatalogCourse> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog {}", path.display()))?;
        info!("loaded {} catalog courses from {}", courses.len(), path.display());
        Ok(Self::new(courses))
    }

    pub fn courses(&self) -> &[CatalogCourse] {
        &self.courses
    }

    pub fn by_id(&self, id: &str) -> Option<&CatalogCourse> {
        self.courses.iter().find(|c| c.id == id)
    }

    /// Like [`Catalog::by_id`] but unknown ids are an error
    pub fn get(&self, id: &str) -> Result<&CatalogCourse> {
        self.by_id(id)
            .ok_or_else(|| Error::CourseNotFound(id.to_string()))
    }

    pub fn by_slug(&self, slug: &str) -> Option<&CatalogCourse> {
        self.courses.iter().find(|c| c.slug == slug)
    }

    pub fn by_category(&self, category: &str) -> Vec<&CatalogCourse> {
        self.courses
            .iter()
            .filter(|c| same_text(&c.category, category))
            .collect()
    }

    /// Case-insensitive substring match on title, description, instructor and category.
    /// A blank query matches everything.
    pub fn search(&self, query: &str) -> Vec<&CatalogCourse> {
        let needle = query.trim().to_lowercase();
        self.courses.iter().filter(|c| c.matches(&needle)).collect()
    }

    pub fn featured(&self, limit: usize) -> Vec<&CatalogCourse> {
        self.courses
            .iter()
            .filter(|c| c.featured)
            .take(limit)
            .collect()
    }

    pub fn popular(&self, limit: usize) -> Vec<&CatalogCourse> {
        let mut courses: Vec<_> = self.courses.iter().collect();
        courses.sort_by(|a, b| {
            b.students
                .cmp(&a.students)
                .then_with(|| b.rating.total_cmp(&a.rating))
        });
        courses.truncate(limit);
        courses
    }

    pub fn related(&self, id: &str, limit: usize) -> Vec<&CatalogCourse> {
        let Some(course) = self.by_id(id) else {
            return Vec::new();
        };
        self.courses
            .iter()
            .filter(|c| c.id != course.id && same_text(&c.category, &course.category))
            .take(limit)
            .collect()
    }

    pub fn categories(&self) -> Vec<&str> {
        self.courses
            .iter()
            .map(|c| c.category.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Case-insensitive equality, folded the same way as [`Catalog::search`]
fn same_text(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(id: &str, category: &str, students: u32, rating: f32, featured: bool) -> CatalogCourse {
        CatalogCourse {
            id: id.to_string(),
            slug: format!("course-{id}"),
            title: format!("{category} course {id}"),
            instructor: "Grace Hopper".to_string(),
            thumbnail: String::new(),
            category: category.to_string(),
            description: "An introduction".to_string(),
            rating,
            students,
            difficulty: Difficulty::Intermediate,
            total_lessons: 12,
            estimated_duration: "6-8 hours".to_string(),
            price: None,
            featured,
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            course("1", "Design", 100, 4.1, true),
            course("2", "Programming", 900, 4.8, false),
            course("3", "Programming", 900, 4.9, true),
            course("4", "Data", 50, 3.0, false),
        ])
    }

    fn ids(courses: Vec<&CatalogCourse>) -> Vec<&str> {
        courses.into_iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn lookups() {
        let catalog = catalog();
        assert_eq!(catalog.by_slug("course-3").unwrap().id, "3");
        assert!(catalog.by_id("9").is_none());
        assert!(matches!(catalog.get("9"), Err(Error::CourseNotFound(id)) if id == "9"));
        assert_eq!(ids(catalog.by_category("programming")), ["2", "3"]);
    }

    #[test]
    fn category_matching_folds_like_search() {
        let catalog = Catalog::new(vec![
            course("1", "Éducation", 10, 4.0, false),
            course("2", "éducation", 20, 4.0, false),
            course("3", "Design", 30, 4.0, false),
        ]);
        assert_eq!(ids(catalog.by_category("ÉDUCATION")), ["1", "2"]);
        assert_eq!(ids(catalog.by_category("éducation")), ["1", "2"]);
        assert_eq!(ids(catalog.search("éducation")), ["1", "2"]);
        assert_eq!(ids(catalog.related("1", 5)), ["2"]);
    }

    #[test]
    fn search_is_case_insensitive() {
        let catalog = catalog();
        assert_eq!(ids(catalog.search("DATA")), ["4"]);
        assert_eq!(ids(catalog.search("hopper")).len(), 4);
        assert_eq!(catalog.search("").len(), 4);
        assert!(catalog.search("cooking").is_empty());
    }

    #[test]
    fn selections() {
        let catalog = catalog();
        assert_eq!(ids(catalog.featured(5)), ["1", "3"]);
        assert_eq!(ids(catalog.popular(3)), ["3", "2", "1"]);
        assert_eq!(ids(catalog.related("2", 5)), ["3"]);
        assert!(catalog.related("missing", 5).is_empty());
        assert_eq!(catalog.categories(), ["Data", "Design", "Programming"]);
    }

    #[test]
    fn snapshot_copies_display_fields() {
        let catalog = catalog();
        let course = catalog.by_id("2").unwrap();
        let snapshot = course.snapshot();
        assert_eq!(snapshot.id, "2");
        assert_eq!(snapshot.total_lessons, 12);
        assert_eq!(snapshot.estimated_duration, "6-8 hours");
        assert_eq!(course.duration_range().unwrap().max_hours, 8);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"id":"101","slug":"rust-basics","title":"Rust Basics","instructor":"Ferris",
                "thumbnail":"/r.png","category":"Programming","description":"Ownership and more",
                "rating":4.7,"difficulty":"Beginner","totalLessons":10,"estimatedDuration":"6-8 hours"}]"#,
        )
        .unwrap();
        let catalog = Catalog::load(&path).unwrap();
        let course = catalog.by_id("101").unwrap();
        assert_eq!(course.students, 0);
        assert!(!course.featured);
        assert!(Catalog::load(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn bundled_catalog_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/catalog.json");
        let catalog = Catalog::load(path).unwrap();
        assert_eq!(catalog.by_slug("rust-fundamentals").unwrap().total_lessons, 10);
        assert!(catalog.courses().iter().all(|c| c.duration_range().is_some()));
    }
}
