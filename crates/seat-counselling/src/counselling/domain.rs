use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for registered students.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StudentId(pub String);

/// Identifier wrapper for courses offered in the round.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CourseId(pub String);

/// Identifier wrapper for the institution that owns a course.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstitutionId(pub String);

/// Merit position of a student. `1` is the highest priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rank(pub u32);

/// Reservation category carried for reporting; the allocation pass ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudentCategory {
    General,
    Obc,
    Sc,
    St,
}

impl StudentCategory {
    pub const fn label(self) -> &'static str {
        match self {
            StudentCategory::General => "General",
            StudentCategory::Obc => "OBC",
            StudentCategory::Sc => "SC",
            StudentCategory::St => "ST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub rank: Rank,
    pub category: StudentCategory,
}

/// A course and its seat capacity. Occupancy is always derived from
/// allocation rows and never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub institution_id: InstitutionId,
    pub name: String,
    pub code: String,
    pub capacity: u32,
    pub active: bool,
}

/// Seat assignment produced by the allocation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub student_id: StudentId,
    pub course_id: CourseId,
    /// 1-based position in the student's preference list that was satisfied.
    pub preference_rank: u32,
    pub allocated_at: DateTime<Utc>,
}

/// Global phase gating which counselling operations are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounsellingPhase {
    #[default]
    Setup,
    RegistrationOpen,
    PreferenceOpen,
    AllocationCompleted,
}

impl CounsellingPhase {
    pub const fn label(self) -> &'static str {
        match self {
            CounsellingPhase::Setup => "setup",
            CounsellingPhase::RegistrationOpen => "registration_open",
            CounsellingPhase::PreferenceOpen => "preference_open",
            CounsellingPhase::AllocationCompleted => "allocation_completed",
        }
    }

    /// Registration collaborators may add students and courses.
    pub const fn accepts_registration(self) -> bool {
        matches!(
            self,
            CounsellingPhase::Setup | CounsellingPhase::RegistrationOpen
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }

    /// Legal forward moves, plus the retry edge from `Failed` back to `Pending`.
    pub const fn can_transition_to(self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Processing)
                | (PaymentStatus::Processing, PaymentStatus::Completed)
                | (PaymentStatus::Processing, PaymentStatus::Failed)
                | (PaymentStatus::Failed, PaymentStatus::Pending)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    NetBanking,
    Upi,
    Wallet,
}

impl PaymentMethod {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "Credit Card",
            PaymentMethod::DebitCard => "Debit Card",
            PaymentMethod::NetBanking => "Net Banking",
            PaymentMethod::Upi => "UPI",
            PaymentMethod::Wallet => "Digital Wallet",
        }
    }
}

/// Participation fee payment for a single student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub student_id: StudentId,
    pub transaction_id: String,
    pub amount: u32,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}

/// Registration payload for a student, validated before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRegistration {
    pub id: String,
    pub name: String,
    pub rank: u32,
    pub category: StudentCategory,
}

/// Registration payload for a course offered by an institution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRegistration {
    pub id: String,
    pub institution_id: String,
    pub name: String,
    pub code: String,
    pub capacity: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}
