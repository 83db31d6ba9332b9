use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{CourseId, LessonId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub currency: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

impl Course {
    pub fn is_free(&self) -> bool {
        self.price.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCourse {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub currency: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

/// Course fields as submitted by staff.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseDraft {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub course_id: CourseId,
    pub title: String,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLesson {
    pub course_id: CourseId,
    pub title: String,
    pub position: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LessonDraft {
    pub title: String,
    #[serde(default)]
    pub position: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseDetail {
    pub course: Course,
    pub lessons: Vec<Lesson>,
}
