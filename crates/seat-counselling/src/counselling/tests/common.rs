use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

use axum::response::Response;
use serde_json::Value;

use crate::config::CounsellingConfig;
use crate::counselling::domain::{
    Allocation, CounsellingPhase, Course, CourseId, CourseRegistration, PaymentMethod,
    PaymentRecord, Student, StudentCategory, StudentId, StudentRegistration,
};
use crate::counselling::memory::MemoryRepository;
use crate::counselling::payment::ScriptedGateway;
use crate::counselling::repository::{CounsellingRepository, RepositoryError, StoreSnapshot};
use crate::counselling::service::CounsellingService;

pub(super) type TestService<R = MemoryRepository> = CounsellingService<R, ScriptedGateway>;

pub(super) fn sid(id: &str) -> StudentId {
    StudentId(id.to_string())
}

pub(super) fn cid(id: &str) -> CourseId {
    CourseId(id.to_string())
}

pub(super) fn cids(ids: &[&str]) -> Vec<CourseId> {
    ids.iter().map(|id| cid(id)).collect()
}

pub(super) fn student_registration(id: &str, rank: u32) -> StudentRegistration {
    StudentRegistration {
        id: id.to_string(),
        name: format!("Student {id}"),
        rank,
        category: StudentCategory::General,
    }
}

pub(super) fn course_registration(id: &str, capacity: u32) -> CourseRegistration {
    CourseRegistration {
        id: id.to_string(),
        institution_id: "abc-engineering".to_string(),
        name: format!("Course {id}"),
        code: id.to_ascii_uppercase(),
        capacity,
        active: true,
    }
}

pub(super) fn config() -> CounsellingConfig {
    CounsellingConfig {
        counselling_fee: 500,
        payment_success_rate: 1.0,
    }
}

pub(super) fn build_service() -> (TestService, Arc<MemoryRepository>, Arc<ScriptedGateway>) {
    build_service_with(Arc::new(MemoryRepository::default()))
}

pub(super) fn build_service_with<R>(repository: Arc<R>) -> (TestService<R>, Arc<R>, Arc<ScriptedGateway>)
where
    R: CounsellingRepository + 'static,
{
    let gateway = Arc::new(ScriptedGateway::approving());
    let service = CounsellingService::new(repository.clone(), gateway.clone(), config())
        .expect("service loads phase");
    (service, repository, gateway)
}

/// Registers the courses and students and leaves the round in
/// `RegistrationOpen`.
pub(super) fn seed<R>(service: &TestService<R>, courses: &[(&str, u32)], students: &[(&str, u32)])
where
    R: CounsellingRepository + 'static,
{
    service.open_registration().expect("registration opens");
    for (id, capacity) in courses {
        service
            .add_course(course_registration(id, *capacity))
            .expect("course added");
    }
    for (id, rank) in students {
        service
            .register_student(student_registration(id, *rank))
            .expect("student registered");
    }
}

/// Pays for every listed student, opens preferences and submits each list.
pub(super) fn pay_and_prefer<R>(service: &TestService<R>, choices: &[(&str, &[&str])])
where
    R: CounsellingRepository + 'static,
{
    for (student, _) in choices {
        service
            .process_payment(&sid(student), PaymentMethod::Upi)
            .expect("payment processed");
    }
    if service.phase() == CounsellingPhase::RegistrationOpen {
        service.open_preferences().expect("preferences open");
    }
    for (student, courses) in choices {
        service
            .submit_preferences(&sid(student), cids(courses))
            .expect("preferences accepted");
    }
}

/// Three paid students chasing Y (one seat) and X (two seats).
pub(super) fn contested_round<R>(service: &TestService<R>)
where
    R: CounsellingRepository + 'static,
{
    seed(
        service,
        &[("x", 2), ("y", 1)],
        &[("s1", 1), ("s2", 2), ("s3", 3)],
    );
    pay_and_prefer(
        service,
        &[("s1", &["y", "x"]), ("s2", &["x"]), ("s3", &["x"])],
    );
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Delegates to memory but refuses the allocation commit and the reset.
#[derive(Default)]
pub(super) struct FailingCommitRepository {
    pub(super) inner: MemoryRepository,
}

impl CounsellingRepository for FailingCommitRepository {
    fn snapshot(&self) -> Result<StoreSnapshot, RepositoryError> {
        self.inner.snapshot()
    }

    fn load_phase(&self) -> Result<CounsellingPhase, RepositoryError> {
        self.inner.load_phase()
    }

    fn save_phase(&self, phase: CounsellingPhase) -> Result<(), RepositoryError> {
        self.inner.save_phase(phase)
    }

    fn insert_student(&self, student: Student) -> Result<(), RepositoryError> {
        self.inner.insert_student(student)
    }

    fn student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        self.inner.student(id)
    }

    fn insert_course(&self, course: Course) -> Result<(), RepositoryError> {
        self.inner.insert_course(course)
    }

    fn course(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError> {
        self.inner.course(id)
    }

    fn replace_preferences(
        &self,
        student_id: &StudentId,
        courses: Vec<CourseId>,
    ) -> Result<(), RepositoryError> {
        self.inner.replace_preferences(student_id, courses)
    }

    fn preferences(&self, student_id: &StudentId) -> Result<Vec<CourseId>, RepositoryError> {
        self.inner.preferences(student_id)
    }

    fn payment(&self, student_id: &StudentId) -> Result<Option<PaymentRecord>, RepositoryError> {
        self.inner.payment(student_id)
    }

    fn save_payment(&self, record: PaymentRecord) -> Result<(), RepositoryError> {
        self.inner.save_payment(record)
    }

    fn commit_allocations(
        &self,
        _allocations: Vec<Allocation>,
        _phase: CounsellingPhase,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn reset(&self) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Memory store whose next `snapshot` call parks until the test releases it,
/// which holds an allocation run in flight.
pub(super) struct GatedRepository {
    pub(super) inner: MemoryRepository,
    armed: AtomicBool,
    pub(super) entered: Barrier,
    pub(super) release: Barrier,
}

impl GatedRepository {
    pub(super) fn new() -> Self {
        Self {
            inner: MemoryRepository::default(),
            armed: AtomicBool::new(false),
            entered: Barrier::new(2),
            release: Barrier::new(2),
        }
    }

    pub(super) fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl CounsellingRepository for GatedRepository {
    fn snapshot(&self) -> Result<StoreSnapshot, RepositoryError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.wait();
            self.release.wait();
        }
        self.inner.snapshot()
    }

    fn load_phase(&self) -> Result<CounsellingPhase, RepositoryError> {
        self.inner.load_phase()
    }

    fn save_phase(&self, phase: CounsellingPhase) -> Result<(), RepositoryError> {
        self.inner.save_phase(phase)
    }

    fn insert_student(&self, student: Student) -> Result<(), RepositoryError> {
        self.inner.insert_student(student)
    }

    fn student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        self.inner.student(id)
    }

    fn insert_course(&self, course: Course) -> Result<(), RepositoryError> {
        self.inner.insert_course(course)
    }

    fn course(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError> {
        self.inner.course(id)
    }

    fn replace_preferences(
        &self,
        student_id: &StudentId,
        courses: Vec<CourseId>,
    ) -> Result<(), RepositoryError> {
        self.inner.replace_preferences(student_id, courses)
    }

    fn preferences(&self, student_id: &StudentId) -> Result<Vec<CourseId>, RepositoryError> {
        self.inner.preferences(student_id)
    }

    fn payment(&self, student_id: &StudentId) -> Result<Option<PaymentRecord>, RepositoryError> {
        self.inner.payment(student_id)
    }

    fn save_payment(&self, record: PaymentRecord) -> Result<(), RepositoryError> {
        self.inner.save_payment(record)
    }

    fn commit_allocations(
        &self,
        allocations: Vec<Allocation>,
        phase: CounsellingPhase,
    ) -> Result<(), RepositoryError> {
        self.inner.commit_allocations(allocations, phase)
    }

    fn reset(&self) -> Result<(), RepositoryError> {
        self.inner.reset()
    }
}
