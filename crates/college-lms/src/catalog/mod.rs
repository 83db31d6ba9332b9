//! Course catalog: courses, their ordered lessons and publication state.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{Course, CourseDetail, CourseDraft, Lesson, LessonDraft, NewCourse, NewLesson};
pub use repository::CourseRepository;
pub use router::catalog_router;
pub use service::{CatalogError, CatalogService};
