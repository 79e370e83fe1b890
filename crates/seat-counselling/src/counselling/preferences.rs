use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::domain::{CounsellingPhase, CourseId, StudentId};
use super::error::{CounsellingError, ValidationError};
use super::phase::PhaseController;
use super::repository::CounsellingRepository;

/// Keeps each student's ordered, duplicate-free course list.
pub struct PreferenceStore<R> {
    repository: Arc<R>,
    phase: Arc<PhaseController<R>>,
}

impl<R> PreferenceStore<R>
where
    R: CounsellingRepository + 'static,
{
    pub fn new(repository: Arc<R>, phase: Arc<PhaseController<R>>) -> Self {
        Self { repository, phase }
    }

    /// Replaces the student's whole list. Position 1 is the most wanted course.
    pub fn submit(
        &self,
        student_id: &StudentId,
        course_ids: Vec<CourseId>,
    ) -> Result<Vec<CourseId>, CounsellingError> {
        let phase = self.phase.shared();
        if *phase != CounsellingPhase::PreferenceOpen {
            return Err(CounsellingError::phase("submit preferences", *phase));
        }

        if self.repository.student(student_id)?.is_none() {
            return Err(ValidationError::UnknownStudent(student_id.0.clone()).into());
        }

        let mut seen = BTreeSet::new();
        for course_id in &course_ids {
            if !seen.insert(course_id) {
                return Err(ValidationError::DuplicateCourse(course_id.0.clone()).into());
            }
            match self.repository.course(course_id)? {
                None => return Err(ValidationError::UnknownCourse(course_id.0.clone()).into()),
                Some(course) if !course.active => {
                    return Err(ValidationError::InactiveCourse(course_id.0.clone()).into())
                }
                Some(_) => {}
            }
        }

        self.repository
            .replace_preferences(student_id, course_ids.clone())?;
        debug!(student = %student_id.0, count = course_ids.len(), "preferences replaced");

        Ok(course_ids)
    }
}
