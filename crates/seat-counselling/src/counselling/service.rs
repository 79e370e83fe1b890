use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::domain::{
    CounsellingPhase, Course, CourseId, CourseRegistration, InstitutionId, PaymentMethod,
    PaymentRecord, PaymentStatus, Rank, Student, StudentId, StudentRegistration,
};
use super::eligibility::EligibilityGate;
use super::error::{CounsellingError, ValidationError};
use super::export::{allocation_rows, AllocationExportRow};
use super::payment::{PaymentDesk, PaymentGateway};
use super::phase::{AllocationSummary, PhaseController};
use super::preferences::PreferenceStore;
use super::repository::{CounsellingRepository, RepositoryError};
use super::statistics::{CounsellingStatistics, StatisticsAggregator};
use crate::config::CounsellingConfig;

/// Seat a student ended up with, resolved to its institution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocatedSeat {
    pub course_id: CourseId,
    pub institution_id: InstitutionId,
    pub preference_rank: u32,
}

/// Everything a student dashboard shows for one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentStatusView {
    pub student_id: StudentId,
    pub rank: Rank,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    pub preferences: Vec<CourseId>,
    pub eligible: bool,
    pub can_submit_preferences: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation: Option<AllocatedSeat>,
}

/// Service composing the phase controller, preference store, payment desk and
/// statistics over one repository.
pub struct CounsellingService<R, G> {
    repository: Arc<R>,
    phase: Arc<PhaseController<R>>,
    preferences: PreferenceStore<R>,
    payments: PaymentDesk<R, G>,
    statistics: StatisticsAggregator<R>,
}

impl<R, G> CounsellingService<R, G>
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(
        repository: Arc<R>,
        gateway: Arc<G>,
        config: CounsellingConfig,
    ) -> Result<Self, CounsellingError> {
        let phase = Arc::new(PhaseController::load(repository.clone())?);
        let preferences = PreferenceStore::new(repository.clone(), phase.clone());
        let payments = PaymentDesk::new(
            repository.clone(),
            gateway,
            phase.clone(),
            config.counselling_fee,
        );
        let statistics = StatisticsAggregator::new(repository.clone());

        Ok(Self {
            repository,
            phase,
            preferences,
            payments,
            statistics,
        })
    }

    pub fn phase(&self) -> CounsellingPhase {
        self.phase.current()
    }

    pub fn open_registration(&self) -> Result<CounsellingPhase, CounsellingError> {
        self.phase.open_registration()
    }

    pub fn open_preferences(&self) -> Result<CounsellingPhase, CounsellingError> {
        self.phase.open_preferences()
    }

    pub fn register_student(
        &self,
        registration: StudentRegistration,
    ) -> Result<Student, CounsellingError> {
        let phase = self.phase.shared();
        if !phase.accepts_registration() {
            return Err(CounsellingError::phase("register student", *phase));
        }

        let id = registration.id.trim();
        if id.is_empty() {
            return Err(ValidationError::MissingField("student id").into());
        }
        if registration.rank == 0 {
            return Err(ValidationError::InvalidRank.into());
        }

        let student = Student {
            id: StudentId(id.to_string()),
            name: registration.name.trim().to_string(),
            rank: Rank(registration.rank),
            category: registration.category,
        };

        match self.repository.insert_student(student.clone()) {
            Ok(()) => {}
            Err(RepositoryError::DuplicateKey("rank")) => {
                return Err(ValidationError::DuplicateRank(registration.rank).into())
            }
            Err(RepositoryError::DuplicateKey(_)) => {
                return Err(ValidationError::AlreadyRegistered {
                    entity: "student",
                    id: student.id.0.clone(),
                }
                .into())
            }
            Err(other) => return Err(other.into()),
        }

        info!(student = %student.id.0, rank = student.rank.0, "student registered");
        Ok(student)
    }

    pub fn add_course(&self, registration: CourseRegistration) -> Result<Course, CounsellingError> {
        let phase = self.phase.shared();
        if !phase.accepts_registration() {
            return Err(CounsellingError::phase("add course", *phase));
        }

        let id = registration.id.trim();
        if id.is_empty() {
            return Err(ValidationError::MissingField("course id").into());
        }
        let institution_id = registration.institution_id.trim();
        if institution_id.is_empty() {
            return Err(ValidationError::MissingField("institution id").into());
        }
        if registration.capacity == 0 {
            return Err(ValidationError::InvalidCapacity.into());
        }

        let course = Course {
            id: CourseId(id.to_string()),
            institution_id: InstitutionId(institution_id.to_string()),
            name: registration.name.trim().to_string(),
            code: registration.code.trim().to_string(),
            capacity: registration.capacity,
            active: registration.active,
        };

        match self.repository.insert_course(course.clone()) {
            Ok(()) => {}
            Err(RepositoryError::DuplicateKey(_)) => {
                return Err(ValidationError::AlreadyRegistered {
                    entity: "course",
                    id: course.id.0.clone(),
                }
                .into())
            }
            Err(other) => return Err(other.into()),
        }

        info!(course = %course.id.0, capacity = course.capacity, "course added");
        Ok(course)
    }

    pub fn submit_preferences(
        &self,
        student_id: &StudentId,
        course_ids: Vec<CourseId>,
    ) -> Result<Vec<CourseId>, CounsellingError> {
        self.preferences.submit(student_id, course_ids)
    }

    pub fn process_payment(
        &self,
        student_id: &StudentId,
        method: PaymentMethod,
    ) -> Result<PaymentRecord, CounsellingError> {
        self.payments.process(student_id, method)
    }

    pub fn run_allocation(&self) -> Result<AllocationSummary, CounsellingError> {
        self.phase.run_allocation()
    }

    pub fn reset_system(&self) -> Result<(), CounsellingError> {
        self.phase.reset()
    }

    pub fn statistics(&self) -> Result<CounsellingStatistics, CounsellingError> {
        self.statistics.snapshot()
    }

    pub fn export_allocations(&self) -> Result<Vec<AllocationExportRow>, CounsellingError> {
        let snapshot = self.repository.snapshot()?;
        Ok(allocation_rows(&snapshot))
    }

    pub fn student_status(
        &self,
        student_id: &StudentId,
    ) -> Result<StudentStatusView, CounsellingError> {
        let snapshot = self.repository.snapshot()?;
        let student = snapshot
            .students
            .get(student_id)
            .ok_or_else(|| ValidationError::UnknownStudent(student_id.0.clone()))?;

        let payment = snapshot.payments.get(student_id);
        let preferences = snapshot.preferences_of(student_id).to_vec();
        let allocation = snapshot.allocations.get(student_id).map(|allocation| {
            let institution_id = snapshot
                .courses
                .get(&allocation.course_id)
                .map(|course| course.institution_id.clone())
                .unwrap_or_else(|| InstitutionId(String::new()));
            AllocatedSeat {
                course_id: allocation.course_id.clone(),
                institution_id,
                preference_rank: allocation.preference_rank,
            }
        });

        Ok(StudentStatusView {
            student_id: student.id.clone(),
            rank: student.rank,
            payment_status: payment.map(|record| record.status),
            eligible: EligibilityGate::is_eligible(payment, &preferences),
            can_submit_preferences: snapshot.phase == CounsellingPhase::PreferenceOpen,
            preferences,
            allocation,
        })
    }
}
