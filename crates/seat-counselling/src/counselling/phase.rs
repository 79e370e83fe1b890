use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::domain::{Allocation, CounsellingPhase, StudentId};
use super::eligibility::EligibilityGate;
use super::engine::{AllocationEngine, SeatLedger};
use super::error::CounsellingError;
use super::repository::CounsellingRepository;

/// Outcome of a committed allocation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationSummary {
    pub eligible_count: usize,
    pub allocated_count: usize,
    pub unallocated_student_ids: Vec<StudentId>,
    pub completed_at: DateTime<Utc>,
}

/// Owner of the round's single phase value.
///
/// Per-student writers (preferences, payments, registration) hold the shared
/// side of the phase lock for the duration of their write; transitions and the
/// allocation run take the exclusive side.
pub struct PhaseController<R> {
    repository: Arc<R>,
    engine: AllocationEngine,
    phase: RwLock<CounsellingPhase>,
    running: AtomicBool,
}

/// Clears the in-flight flag however the run ends.
struct RunTicket<'a>(&'a AtomicBool);

impl Drop for RunTicket<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<R> PhaseController<R>
where
    R: CounsellingRepository + 'static,
{
    /// Reads the persisted phase once; from here on the controller is the
    /// only writer.
    pub fn load(repository: Arc<R>) -> Result<Self, CounsellingError> {
        let phase = repository.load_phase()?;
        Ok(Self {
            repository,
            engine: AllocationEngine::new(),
            phase: RwLock::new(phase),
            running: AtomicBool::new(false),
        })
    }

    pub fn current(&self) -> CounsellingPhase {
        *self.shared()
    }

    pub(crate) fn shared(&self) -> RwLockReadGuard<'_, CounsellingPhase> {
        self.phase.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn exclusive(&self) -> RwLockWriteGuard<'_, CounsellingPhase> {
        self.phase.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn open_registration(&self) -> Result<CounsellingPhase, CounsellingError> {
        self.transition(
            "open registration",
            CounsellingPhase::Setup,
            CounsellingPhase::RegistrationOpen,
        )
    }

    pub fn open_preferences(&self) -> Result<CounsellingPhase, CounsellingError> {
        self.transition(
            "open preferences",
            CounsellingPhase::RegistrationOpen,
            CounsellingPhase::PreferenceOpen,
        )
    }

    fn transition(
        &self,
        operation: &'static str,
        from: CounsellingPhase,
        to: CounsellingPhase,
    ) -> Result<CounsellingPhase, CounsellingError> {
        let mut phase = self.exclusive();
        if *phase != from {
            return Err(CounsellingError::phase(operation, *phase));
        }

        self.repository.save_phase(to)?;
        *phase = to;
        info!(from = from.label(), to = to.label(), "counselling phase changed");
        Ok(to)
    }

    /// Runs the allocation pass and commits it together with the move to
    /// `AllocationCompleted`. A second caller arriving while a run is in
    /// flight is turned away immediately.
    pub fn run_allocation(&self) -> Result<AllocationSummary, CounsellingError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("rejected allocation run: another run is in flight");
            return Err(CounsellingError::Concurrency);
        }
        let _ticket = RunTicket(&self.running);

        let mut phase = self.exclusive();
        if *phase != CounsellingPhase::PreferenceOpen {
            return Err(CounsellingError::phase("run allocation", *phase));
        }

        let snapshot = self.repository.snapshot()?;
        let eligible = EligibilityGate::eligible_students(&snapshot);

        let capacities: BTreeMap<_, _> = snapshot
            .courses
            .values()
            .filter(|course| course.active)
            .map(|course| (course.id.clone(), course.capacity))
            .collect();

        let mut seats = SeatLedger::new();
        for (course_id, capacity) in &capacities {
            let taken = snapshot.seats_filled(course_id);
            seats.set(course_id.clone(), capacity.saturating_sub(taken));
        }

        let plan = self
            .engine
            .run(&eligible, &snapshot.preferences, &mut seats);

        if let Err(violation) = plan.verify(&capacities) {
            error!(%violation, "allocation aborted before commit");
            return Err(CounsellingError::InvariantViolation(violation));
        }

        let completed_at = Utc::now();
        let rows = plan
            .assignments
            .iter()
            .map(|assignment| Allocation {
                student_id: assignment.student_id.clone(),
                course_id: assignment.course_id.clone(),
                preference_rank: assignment.preference_rank,
                allocated_at: completed_at,
            })
            .collect();

        self.repository
            .commit_allocations(rows, CounsellingPhase::AllocationCompleted)?;
        *phase = CounsellingPhase::AllocationCompleted;

        let summary = AllocationSummary {
            eligible_count: eligible.len(),
            allocated_count: plan.assignments.len(),
            unallocated_student_ids: plan.unallocated,
            completed_at,
        };

        info!(
            eligible = summary.eligible_count,
            allocated = summary.allocated_count,
            unallocated = summary.unallocated_student_ids.len(),
            "seat allocation committed"
        );

        Ok(summary)
    }

    /// Clears allocations and payments and returns the round to `Setup`.
    pub fn reset(&self) -> Result<(), CounsellingError> {
        let mut phase = self.exclusive();
        let previous = *phase;

        self.repository.reset()?;
        *phase = CounsellingPhase::Setup;

        info!(from = previous.label(), "counselling round reset");
        Ok(())
    }
}
