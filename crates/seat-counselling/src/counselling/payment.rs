use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use rand::Rng;
use tracing::{info, warn};

use super::domain::{PaymentMethod, PaymentRecord, PaymentStatus, StudentId};
use super::error::{CounsellingError, ValidationError};
use super::phase::PhaseController;
use super::repository::CounsellingRepository;

/// What the gateway is asked to collect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest<'a> {
    pub student_id: &'a StudentId,
    pub transaction_id: &'a str,
    pub amount: u32,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    Approved { reference: String },
    Declined { reason: String },
}

/// Outbound payment capability. Implementations must resolve every charge
/// exactly once.
pub trait PaymentGateway: Send + Sync {
    fn charge(&self, request: &ChargeRequest<'_>) -> GatewayOutcome;
}

/// Mock gateway approving a fixed share of charges at random.
#[derive(Debug, Clone, Copy)]
pub struct RandomizedGateway {
    success_rate: f64,
}

impl RandomizedGateway {
    pub const DECLINE_REASON: &'static str = "insufficient funds or card declined";

    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }
}

impl PaymentGateway for RandomizedGateway {
    fn charge(&self, _request: &ChargeRequest<'_>) -> GatewayOutcome {
        let mut rng = rand::thread_rng();
        if rng.gen_bool(self.success_rate) {
            GatewayOutcome::Approved {
                reference: format!("GW{}", rng.gen_range(100_000..=999_999)),
            }
        } else {
            GatewayOutcome::Declined {
                reason: Self::DECLINE_REASON.to_string(),
            }
        }
    }
}

/// Deterministic gateway: approves everyone except the listed students.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    declined: BTreeSet<StudentId>,
    charges: Mutex<Vec<StudentId>>,
}

impl ScriptedGateway {
    pub fn approving() -> Self {
        Self::default()
    }

    pub fn declining<I>(students: I) -> Self
    where
        I: IntoIterator<Item = StudentId>,
    {
        Self {
            declined: students.into_iter().collect(),
            charges: Mutex::new(Vec::new()),
        }
    }

    /// Students charged so far, in call order.
    pub fn charges(&self) -> Vec<StudentId> {
        self.charges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PaymentGateway for ScriptedGateway {
    fn charge(&self, request: &ChargeRequest<'_>) -> GatewayOutcome {
        self.charges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.student_id.clone());

        if self.declined.contains(request.student_id) {
            GatewayOutcome::Declined {
                reason: "declined by scripted gateway".to_string(),
            }
        } else {
            GatewayOutcome::Approved {
                reference: format!("GW-{}", request.transaction_id),
            }
        }
    }
}

static TRANSACTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_transaction_id() -> String {
    let id = TRANSACTION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("txn-{id:06}")
}

/// Runs fee payments. Different students proceed in parallel; calls for the
/// same student are serialized and persist only the settled record.
pub struct PaymentDesk<R, G> {
    repository: Arc<R>,
    gateway: Arc<G>,
    phase: Arc<PhaseController<R>>,
    fee: u32,
    in_flight: Mutex<HashMap<StudentId, Arc<Mutex<()>>>>,
}

impl<R, G> PaymentDesk<R, G>
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(
        repository: Arc<R>,
        gateway: Arc<G>,
        phase: Arc<PhaseController<R>>,
        fee: u32,
    ) -> Self {
        Self {
            repository,
            gateway,
            phase,
            fee,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn student_lock(&self, student_id: &StudentId) -> Arc<Mutex<()>> {
        let mut locks = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(student_id.clone()).or_default().clone()
    }

    /// Drops the student's entry once no other caller holds or waits on it.
    /// Handles are only cloned under the map lock, so a count of two (map plus
    /// `lock`) means nobody else can be queued.
    fn release_student_lock(&self, student_id: &StudentId, lock: Arc<Mutex<()>>) {
        let mut locks = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&lock) == 2 {
            locks.remove(student_id);
        }
    }

    /// Students with a payment currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Charges the participation fee. Already completed payments are returned
    /// untouched; failed ones are retried from `Pending`.
    pub fn process(
        &self,
        student_id: &StudentId,
        method: PaymentMethod,
    ) -> Result<PaymentRecord, CounsellingError> {
        let _phase = self.phase.shared();

        if self.repository.student(student_id)?.is_none() {
            return Err(ValidationError::UnknownStudent(student_id.0.clone()).into());
        }

        let lock = self.student_lock(student_id);
        let outcome = {
            let _serialized = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.settle(student_id, method)
        };
        self.release_student_lock(student_id, lock);
        outcome
    }

    /// Moves the student's record to a settled state. Callers hold the
    /// student's lock.
    fn settle(
        &self,
        student_id: &StudentId,
        method: PaymentMethod,
    ) -> Result<PaymentRecord, CounsellingError> {
        let now = Utc::now();
        let mut record = match self.repository.payment(student_id)? {
            Some(existing)
                if matches!(
                    existing.status,
                    PaymentStatus::Completed | PaymentStatus::Processing
                ) =>
            {
                return Ok(existing);
            }
            Some(mut existing) => {
                if existing.status == PaymentStatus::Failed {
                    advance(&mut existing, PaymentStatus::Pending);
                    existing.failure_reason = None;
                }
                existing.method = method;
                existing
            }
            None => PaymentRecord {
                student_id: student_id.clone(),
                transaction_id: next_transaction_id(),
                amount: self.fee,
                method,
                status: PaymentStatus::Pending,
                gateway_reference: None,
                failure_reason: None,
                paid_at: None,
                created_at: now,
                updated_at: now,
            },
        };

        advance(&mut record, PaymentStatus::Processing);

        let outcome = self.gateway.charge(&ChargeRequest {
            student_id,
            transaction_id: &record.transaction_id,
            amount: record.amount,
            method,
        });

        let settled_at = Utc::now();
        match outcome {
            GatewayOutcome::Approved { reference } => {
                advance(&mut record, PaymentStatus::Completed);
                record.gateway_reference = Some(reference);
                record.paid_at = Some(settled_at);
            }
            GatewayOutcome::Declined { reason } => {
                advance(&mut record, PaymentStatus::Failed);
                record.failure_reason = Some(reason);
            }
        }
        record.updated_at = settled_at;

        self.repository.save_payment(record.clone())?;

        match record.status {
            PaymentStatus::Completed => info!(
                student = %student_id.0,
                transaction = %record.transaction_id,
                method = record.method.label(),
                "counselling fee collected"
            ),
            _ => warn!(
                student = %student_id.0,
                transaction = %record.transaction_id,
                reason = record.failure_reason.as_deref().unwrap_or_default(),
                "counselling fee payment failed"
            ),
        }

        Ok(record)
    }
}

fn advance(record: &mut PaymentRecord, next: PaymentStatus) {
    debug_assert!(
        record.status.can_transition_to(next),
        "illegal payment transition {:?} -> {:?}",
        record.status,
        next
    );
    record.status = next;
}
