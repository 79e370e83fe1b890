use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::domain::{
    Allocation, CounsellingPhase, Course, CourseId, PaymentRecord, Student, StudentId,
};
use super::repository::{CounsellingRepository, RepositoryError, StoreSnapshot};

/// Process-local store backing the service binary, the demo and the tests.
///
/// All tables sit behind one lock, which makes every trait method atomic and
/// lets `snapshot` return a consistent view.
#[derive(Debug, Default, Clone)]
pub struct MemoryRepository {
    state: Arc<RwLock<StoreSnapshot>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreSnapshot>, RepositoryError> {
        self.state
            .read()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreSnapshot>, RepositoryError> {
        self.state
            .write()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }
}

impl CounsellingRepository for MemoryRepository {
    fn snapshot(&self) -> Result<StoreSnapshot, RepositoryError> {
        Ok(self.read()?.clone())
    }

    fn load_phase(&self) -> Result<CounsellingPhase, RepositoryError> {
        Ok(self.read()?.phase)
    }

    fn save_phase(&self, phase: CounsellingPhase) -> Result<(), RepositoryError> {
        self.write()?.phase = phase;
        Ok(())
    }

    fn insert_student(&self, student: Student) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        if state.students.contains_key(&student.id) {
            return Err(RepositoryError::DuplicateKey("id"));
        }
        if state
            .students
            .values()
            .any(|existing| existing.rank == student.rank)
        {
            return Err(RepositoryError::DuplicateKey("rank"));
        }
        state.students.insert(student.id.clone(), student);
        Ok(())
    }

    fn student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        Ok(self.read()?.students.get(id).cloned())
    }

    fn insert_course(&self, course: Course) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        if state.courses.contains_key(&course.id) {
            return Err(RepositoryError::DuplicateKey("id"));
        }
        if state.courses.values().any(|existing| {
            existing.institution_id == course.institution_id && existing.code == course.code
        }) {
            return Err(RepositoryError::DuplicateKey("code"));
        }
        state.courses.insert(course.id.clone(), course);
        Ok(())
    }

    fn course(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError> {
        Ok(self.read()?.courses.get(id).cloned())
    }

    fn replace_preferences(
        &self,
        student_id: &StudentId,
        courses: Vec<CourseId>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        if !state.students.contains_key(student_id) {
            return Err(RepositoryError::NotFound);
        }
        if courses.is_empty() {
            state.preferences.remove(student_id);
        } else {
            state.preferences.insert(student_id.clone(), courses);
        }
        Ok(())
    }

    fn preferences(&self, student_id: &StudentId) -> Result<Vec<CourseId>, RepositoryError> {
        Ok(self
            .read()?
            .preferences
            .get(student_id)
            .cloned()
            .unwrap_or_default())
    }

    fn payment(&self, student_id: &StudentId) -> Result<Option<PaymentRecord>, RepositoryError> {
        Ok(self.read()?.payments.get(student_id).cloned())
    }

    fn save_payment(&self, record: PaymentRecord) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        if !state.students.contains_key(&record.student_id) {
            return Err(RepositoryError::NotFound);
        }
        state.payments.insert(record.student_id.clone(), record);
        Ok(())
    }

    fn commit_allocations(
        &self,
        allocations: Vec<Allocation>,
        phase: CounsellingPhase,
    ) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        if !state.allocations.is_empty() {
            return Err(RepositoryError::Conflict);
        }
        state.allocations = allocations
            .into_iter()
            .map(|allocation| (allocation.student_id.clone(), allocation))
            .collect();
        state.phase = phase;
        Ok(())
    }

    fn reset(&self) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        state.allocations.clear();
        state.payments.clear();
        state.phase = CounsellingPhase::Setup;
        Ok(())
    }
}
