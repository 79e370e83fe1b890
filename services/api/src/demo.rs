use crate::infra::{counselling_config_summary, sample_students, seed_sample_round};
use clap::Args;
use seat_counselling::config::{AppConfig, CounsellingConfig};
use seat_counselling::counselling::{
    write_csv, AllocationExportRow, AllocationSummary, CounsellingService, CounsellingStatistics,
    CourseId, MemoryRepository, PaymentMethod, PaymentRecord, ScriptedGateway, StudentId,
};
use seat_counselling::error::AppError;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Write the allocation table to this CSV file.
    #[arg(long)]
    pub(crate) export: Option<PathBuf>,
    /// Have the gateway decline this student's fee payment (repeatable).
    #[arg(long)]
    pub(crate) decline: Vec<String>,
}

const DEMO_METHODS: [PaymentMethod; 5] = [
    PaymentMethod::CreditCard,
    PaymentMethod::DebitCard,
    PaymentMethod::NetBanking,
    PaymentMethod::Upi,
    PaymentMethod::Wallet,
];

pub(crate) struct DemoRound {
    pub(crate) payments: Vec<PaymentRecord>,
    pub(crate) summary: AllocationSummary,
    pub(crate) statistics: CounsellingStatistics,
    pub(crate) rows: Vec<AllocationExportRow>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let round = play_round(&args.decline, config.counselling)?;

    println!("Seat counselling demo");
    println!("Configuration: {}", counselling_config_summary(&config.counselling));
    render_round(&round);

    if let Some(path) = args.export {
        let writer = BufWriter::new(File::create(&path)?);
        write_csv(&round.rows, writer)?;
        println!("\nAllocation table written to {}", path.display());
    }

    Ok(())
}

/// Drives one sample round end to end with a scripted gateway.
pub(crate) fn play_round(
    declined: &[String],
    config: CounsellingConfig,
) -> Result<DemoRound, AppError> {
    let gateway = ScriptedGateway::declining(declined.iter().cloned().map(StudentId));
    let service = CounsellingService::new(
        Arc::new(MemoryRepository::new()),
        Arc::new(gateway),
        config,
    )?;

    seed_sample_round(&service)?;

    let mut payments = Vec::new();
    for (index, (student, _)) in sample_students().enumerate() {
        let method = DEMO_METHODS[index % DEMO_METHODS.len()];
        payments.push(service.process_payment(&StudentId(student.id), method)?);
    }

    service.open_preferences()?;
    for (student, choices) in sample_students() {
        if choices.is_empty() {
            continue;
        }
        let choices = choices.into_iter().map(CourseId).collect();
        service.submit_preferences(&StudentId(student.id), choices)?;
    }

    let summary = service.run_allocation()?;
    let statistics = service.statistics()?;
    let rows = service.export_allocations()?;

    Ok(DemoRound {
        payments,
        summary,
        statistics,
        rows,
    })
}

fn render_round(round: &DemoRound) {
    println!("\nFee payments");
    for payment in &round.payments {
        let detail = payment
            .failure_reason
            .as_deref()
            .or(payment.gateway_reference.as_deref())
            .unwrap_or("-");
        println!(
            "  {:<8} {:<14} {:<10} {}",
            payment.student_id.0,
            payment.method.label(),
            payment.status.label(),
            detail
        );
    }

    let stats = &round.statistics;
    println!("\nStatistics");
    println!("  Phase: {}", stats.phase.label());
    println!("  Registered students: {}", stats.total_students);
    println!(
        "  Paid: {} ({:.2}%)",
        stats.paid_count, stats.payment_percentage
    );
    println!(
        "  With preferences: {} ({:.2}%)",
        stats.students_with_preferences, stats.preference_percentage
    );
    println!("  Eligible: {}", round.summary.eligible_count);
    println!("  Allocated: {}", stats.allocated_count);
    println!(
        "  Seats filled: {}/{} ({:.2}%)",
        stats.seats_filled, stats.total_seats, stats.utilization_percentage
    );

    println!("\nCourse utilization");
    for course in &stats.courses {
        println!(
            "  {:<8} {:<4} {}/{} filled, {} open",
            course.course_id.0,
            course.institution_id.0,
            course.seats_filled,
            course.capacity,
            course.available_seats
        );
    }

    println!("\nAllocations");
    if round.rows.is_empty() {
        println!("  none");
    }
    for row in &round.rows {
        println!(
            "  #{:<3} {:<8} -> {:<8} ({}) choice {}",
            row.rank.0, row.student_id.0, row.course_id.0, row.institution_id.0, row.preference_rank
        );
    }

    if !round.summary.unallocated_student_ids.is_empty() {
        let unallocated: Vec<&str> = round
            .summary
            .unallocated_student_ids
            .iter()
            .map(|id| id.0.as_str())
            .collect();
        println!("\nEligible but unallocated: {}", unallocated.join(", "));
    }
}
