use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::domain::{CourseId, InstitutionId, Rank, StudentId};
use super::repository::StoreSnapshot;

/// One committed allocation joined with the data a results sheet needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationExportRow {
    pub student_id: StudentId,
    pub rank: Rank,
    pub course_id: CourseId,
    pub institution_id: InstitutionId,
    pub preference_rank: u32,
    pub allocated_at: DateTime<Utc>,
}

/// Allocation rows ordered by ascending student rank.
pub fn allocation_rows(snapshot: &StoreSnapshot) -> Vec<AllocationExportRow> {
    let mut rows: Vec<AllocationExportRow> = snapshot
        .allocations
        .values()
        .filter_map(|allocation| {
            let student = snapshot.students.get(&allocation.student_id)?;
            let course = snapshot.courses.get(&allocation.course_id)?;
            Some(AllocationExportRow {
                student_id: student.id.clone(),
                rank: student.rank,
                course_id: course.id.clone(),
                institution_id: course.institution_id.clone(),
                preference_rank: allocation.preference_rank,
                allocated_at: allocation.allocated_at,
            })
        })
        .collect();
    rows.sort_by_key(|row| row.rank);
    rows
}

#[derive(Serialize)]
struct CsvRow<'a> {
    student_id: &'a str,
    rank: u32,
    course_id: &'a str,
    institution_id: &'a str,
    preference_rank: u32,
    allocated_at: String,
}

/// Writes the rows as CSV with a header line.
pub fn write_csv<W: Write>(rows: &[AllocationExportRow], writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    if rows.is_empty() {
        csv_writer.write_record([
            "student_id",
            "rank",
            "course_id",
            "institution_id",
            "preference_rank",
            "allocated_at",
        ])?;
    }

    for row in rows {
        csv_writer.serialize(CsvRow {
            student_id: &row.student_id.0,
            rank: row.rank.0,
            course_id: &row.course_id.0,
            institution_id: &row.institution_id.0,
            preference_rank: row.preference_rank,
            allocated_at: row.allocated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}
