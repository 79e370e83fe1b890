use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{CounsellingPhase, CourseId, InstitutionId};
use super::error::CounsellingError;
use super::repository::{CounsellingRepository, StoreSnapshot};

/// Seat usage for one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseUtilization {
    pub course_id: CourseId,
    pub institution_id: InstitutionId,
    pub capacity: u32,
    pub seats_filled: u32,
    pub available_seats: u32,
}

/// Read-only counts for the admin dashboard, all taken from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounsellingStatistics {
    pub phase: CounsellingPhase,
    pub allocation_completed: bool,
    pub total_students: usize,
    pub paid_count: usize,
    pub students_with_preferences: usize,
    pub allocated_count: usize,
    pub total_seats: u64,
    pub seats_filled: u64,
    pub utilization_percentage: f64,
    pub payment_percentage: f64,
    pub preference_percentage: f64,
    pub courses: Vec<CourseUtilization>,
    pub generated_at: DateTime<Utc>,
}

impl CounsellingStatistics {
    pub fn from_snapshot(snapshot: &StoreSnapshot, generated_at: DateTime<Utc>) -> Self {
        let total_students = snapshot.students.len();
        let paid_count = snapshot
            .payments
            .values()
            .filter(|payment| payment.is_completed())
            .count();
        let students_with_preferences = snapshot
            .preferences
            .values()
            .filter(|courses| !courses.is_empty())
            .count();
        let allocated_count = snapshot.allocations.len();

        // Only active courses carry seats.
        let courses: Vec<CourseUtilization> = snapshot
            .courses
            .values()
            .filter(|course| course.active)
            .map(|course| {
                let seats_filled = snapshot.seats_filled(&course.id);
                CourseUtilization {
                    course_id: course.id.clone(),
                    institution_id: course.institution_id.clone(),
                    capacity: course.capacity,
                    seats_filled,
                    available_seats: course.capacity.saturating_sub(seats_filled),
                }
            })
            .collect();

        let total_seats = courses.iter().map(|course| u64::from(course.capacity)).sum();
        let seats_filled = allocated_count as u64;

        Self {
            phase: snapshot.phase,
            allocation_completed: snapshot.phase == CounsellingPhase::AllocationCompleted,
            total_students,
            paid_count,
            students_with_preferences,
            allocated_count,
            total_seats,
            seats_filled,
            utilization_percentage: percentage(seats_filled, total_seats),
            payment_percentage: percentage(paid_count as u64, total_students as u64),
            preference_percentage: percentage(
                students_with_preferences as u64,
                total_students as u64,
            ),
            courses,
            generated_at,
        }
    }
}

/// Share of `part` in `whole`, rounded to two decimals; `0` for an empty whole.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let raw = part as f64 / whole as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

pub struct StatisticsAggregator<R> {
    repository: Arc<R>,
}

impl<R> StatisticsAggregator<R>
where
    R: CounsellingRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn snapshot(&self) -> Result<CounsellingStatistics, CounsellingError> {
        let snapshot = self.repository.snapshot()?;
        Ok(CounsellingStatistics::from_snapshot(&snapshot, Utc::now()))
    }
}
