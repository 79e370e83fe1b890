//! Seat counselling round: registration, fee payment, preference intake and
//! the one-shot rank-priority allocation, gated by a single phase value.

pub mod domain;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod export;
pub mod memory;
pub mod payment;
pub mod phase;
pub mod preferences;
pub mod repository;
pub mod router;
pub mod service;
pub mod statistics;

#[cfg(test)]
mod tests;

pub use domain::{
    Allocation, CounsellingPhase, Course, CourseId, CourseRegistration, InstitutionId,
    PaymentMethod, PaymentRecord, PaymentStatus, Rank, Student, StudentCategory, StudentId,
    StudentRegistration,
};
pub use eligibility::EligibilityGate;
pub use engine::{AllocationEngine, AllocationPlan, SeatAssignment, SeatLedger};
pub use error::{CounsellingError, ValidationError};
pub use export::{allocation_rows, write_csv, AllocationExportRow};
pub use memory::MemoryRepository;
pub use payment::{
    ChargeRequest, GatewayOutcome, PaymentDesk, PaymentGateway, RandomizedGateway,
    ScriptedGateway,
};
pub use phase::{AllocationSummary, PhaseController};
pub use preferences::PreferenceStore;
pub use repository::{CounsellingRepository, RepositoryError, StoreSnapshot};
pub use router::{counselling_router, PaymentRequest, PreferenceSubmission};
pub use service::{AllocatedSeat, CounsellingService, StudentStatusView};
pub use statistics::{CounsellingStatistics, CourseUtilization, StatisticsAggregator};
