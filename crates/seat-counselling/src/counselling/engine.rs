//! Rank-priority seat allocation.
//!
//! The pass is a serial dictatorship: students are taken strictly by
//! ascending rank and each one takes the first course in their list that
//! still has a free seat. Nobody placed earlier is ever revisited.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::domain::{CourseId, Rank, Student, StudentId};

/// Remaining-seat counters keyed by course.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeatLedger {
    remaining: BTreeMap<CourseId, u32>,
}

impl SeatLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_course(mut self, course_id: CourseId, seats: u32) -> Self {
        self.remaining.insert(course_id, seats);
        self
    }

    pub fn set(&mut self, course_id: CourseId, seats: u32) {
        self.remaining.insert(course_id, seats);
    }

    pub fn remaining(&self, course_id: &CourseId) -> u32 {
        self.remaining.get(course_id).copied().unwrap_or(0)
    }

    fn take_seat(&mut self, course_id: &CourseId) -> bool {
        match self.remaining.get_mut(course_id) {
            Some(seats) if *seats > 0 => {
                *seats -= 1;
                true
            }
            _ => false,
        }
    }
}

/// One placed student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatAssignment {
    pub student_id: StudentId,
    pub rank: Rank,
    pub course_id: CourseId,
    /// 1-based preference position that was satisfied.
    pub preference_rank: u32,
}

/// Result of one allocation pass, in rank order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationPlan {
    pub assignments: Vec<SeatAssignment>,
    pub unallocated: Vec<StudentId>,
}

impl AllocationPlan {
    pub fn assignment_for(&self, student_id: &StudentId) -> Option<&SeatAssignment> {
        self.assignments
            .iter()
            .find(|assignment| &assignment.student_id == student_id)
    }

    /// Checks the plan against the original capacities: one row per student
    /// and never more rows for a course than it has seats.
    pub fn verify(&self, capacities: &BTreeMap<CourseId, u32>) -> Result<(), String> {
        let mut placed = BTreeSet::new();
        let mut filled: BTreeMap<&CourseId, u32> = BTreeMap::new();

        for assignment in &self.assignments {
            if !placed.insert(&assignment.student_id) {
                return Err(format!(
                    "student '{}' received more than one seat",
                    assignment.student_id.0
                ));
            }
            *filled.entry(&assignment.course_id).or_default() += 1;
        }

        for (course_id, count) in filled {
            let capacity = capacities.get(course_id).copied().unwrap_or(0);
            if count > capacity {
                return Err(format!(
                    "course '{}' holds {count} allocations for {capacity} seats",
                    course_id.0
                ));
            }
        }

        if let Some(student_id) = self
            .unallocated
            .iter()
            .find(|student_id| placed.contains(student_id))
        {
            return Err(format!(
                "student '{}' is both placed and unallocated",
                student_id.0
            ));
        }

        Ok(())
    }
}

/// Stateless allocator; all state flows through its arguments.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllocationEngine;

impl AllocationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Runs a single forward pass. `students` may arrive in any order; they
    /// are consumed by ascending rank. `seats` is decremented in place.
    pub fn run(
        &self,
        students: &[Student],
        preferences: &BTreeMap<StudentId, Vec<CourseId>>,
        seats: &mut SeatLedger,
    ) -> AllocationPlan {
        let mut ordered: Vec<&Student> = students.iter().collect();
        ordered.sort_by_key(|student| student.rank);

        let mut plan = AllocationPlan::default();

        for student in ordered {
            let choices = preferences
                .get(&student.id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            let placed = choices
                .iter()
                .enumerate()
                .find(|(_, course_id)| seats.take_seat(course_id));

            match placed {
                Some((position, course_id)) => plan.assignments.push(SeatAssignment {
                    student_id: student.id.clone(),
                    rank: student.rank,
                    course_id: course_id.clone(),
                    preference_rank: position as u32 + 1,
                }),
                None => plan.unallocated.push(student.id.clone()),
            }
        }

        plan
    }
}
