use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::{
    Allocation, CounsellingPhase, Course, CourseId, PaymentRecord, Student, StudentId,
};

/// Point-in-time copy of every authoritative table. Produced under a single
/// read so no table reflects a later state than another.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreSnapshot {
    pub phase: CounsellingPhase,
    pub students: BTreeMap<StudentId, Student>,
    pub courses: BTreeMap<CourseId, Course>,
    pub preferences: BTreeMap<StudentId, Vec<CourseId>>,
    pub payments: BTreeMap<StudentId, PaymentRecord>,
    pub allocations: BTreeMap<StudentId, Allocation>,
}

impl StoreSnapshot {
    /// Allocation rows referencing the course.
    pub fn seats_filled(&self, course_id: &CourseId) -> u32 {
        self.allocations
            .values()
            .filter(|allocation| &allocation.course_id == course_id)
            .count() as u32
    }

    pub fn preferences_of(&self, student_id: &StudentId) -> &[CourseId] {
        self.preferences
            .get(student_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Storage abstraction so the counselling core can be exercised in isolation.
///
/// Every method is one atomic unit: it either applies in full or returns an
/// error with the store untouched.
pub trait CounsellingRepository: Send + Sync {
    fn snapshot(&self) -> Result<StoreSnapshot, RepositoryError>;

    fn load_phase(&self) -> Result<CounsellingPhase, RepositoryError>;
    fn save_phase(&self, phase: CounsellingPhase) -> Result<(), RepositoryError>;

    /// Fails with `DuplicateKey("id")` or `DuplicateKey("rank")`, checked in
    /// that order under the same write.
    fn insert_student(&self, student: Student) -> Result<(), RepositoryError>;
    fn student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError>;
    /// Fails with `DuplicateKey("id")` or `DuplicateKey("code")`.
    fn insert_course(&self, course: Course) -> Result<(), RepositoryError>;
    fn course(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError>;

    /// Replaces the full preference list of one student.
    fn replace_preferences(
        &self,
        student_id: &StudentId,
        courses: Vec<CourseId>,
    ) -> Result<(), RepositoryError>;
    fn preferences(&self, student_id: &StudentId) -> Result<Vec<CourseId>, RepositoryError>;

    fn payment(&self, student_id: &StudentId) -> Result<Option<PaymentRecord>, RepositoryError>;
    fn save_payment(&self, record: PaymentRecord) -> Result<(), RepositoryError>;

    /// Writes every allocation row together with the phase change.
    fn commit_allocations(
        &self,
        allocations: Vec<Allocation>,
        phase: CounsellingPhase,
    ) -> Result<(), RepositoryError>;

    /// Drops all allocation and payment rows and moves the phase to `Setup`.
    fn reset(&self) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    /// A unique key other than the primary record was already taken.
    #[error("unique key '{0}' is already taken")]
    DuplicateKey(&'static str),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
