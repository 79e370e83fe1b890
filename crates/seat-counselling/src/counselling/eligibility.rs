use super::domain::{CourseId, PaymentRecord, Student};
use super::repository::StoreSnapshot;

/// Decides who takes part in the allocation run.
#[derive(Debug, Default, Clone, Copy)]
pub struct EligibilityGate;

impl EligibilityGate {
    /// Eligible iff the fee is paid and at least one preference is on file.
    pub fn is_eligible(payment: Option<&PaymentRecord>, preferences: &[CourseId]) -> bool {
        payment.is_some_and(PaymentRecord::is_completed) && !preferences.is_empty()
    }

    /// Eligible students from the snapshot, ordered by ascending rank.
    pub fn eligible_students(snapshot: &StoreSnapshot) -> Vec<Student> {
        let mut eligible: Vec<Student> = snapshot
            .students
            .values()
            .filter(|student| {
                Self::is_eligible(
                    snapshot.payments.get(&student.id),
                    snapshot.preferences_of(&student.id),
                )
            })
            .cloned()
            .collect();
        eligible.sort_by_key(|student| student.rank);
        eligible
    }
}
