use std::sync::Arc;

use seat_counselling::config::CounsellingConfig;
use seat_counselling::counselling::{
    CounsellingPhase, CounsellingService, CourseId, CourseRegistration, MemoryRepository,
    PaymentMethod, ScriptedGateway, StudentCategory, StudentId, StudentRegistration,
};

type Service = CounsellingService<MemoryRepository, ScriptedGateway>;

fn service_with(gateway: ScriptedGateway) -> Service {
    CounsellingService::new(
        Arc::new(MemoryRepository::new()),
        Arc::new(gateway),
        CounsellingConfig::default(),
    )
    .expect("service builds")
}

fn course(id: &str, institution: &str, capacity: u32) -> CourseRegistration {
    CourseRegistration {
        id: id.to_string(),
        institution_id: institution.to_string(),
        name: format!("{id} programme"),
        code: id.to_ascii_uppercase(),
        capacity,
        active: true,
    }
}

fn student(id: &str, rank: u32) -> StudentRegistration {
    StudentRegistration {
        id: id.to_string(),
        name: id.to_string(),
        rank,
        category: StudentCategory::Obc,
    }
}

fn courses(ids: &[&str]) -> Vec<CourseId> {
    ids.iter().map(|id| CourseId(id.to_string())).collect()
}

fn sid(id: &str) -> StudentId {
    StudentId(id.to_string())
}

#[test]
fn scarce_seat_goes_to_the_better_rank() {
    let service = service_with(ScriptedGateway::approving());
    service.open_registration().expect("registration opens");
    service.add_course(course("x", "north", 1)).expect("x");
    service.add_course(course("y", "south", 1)).expect("y");
    service.register_student(student("rank1", 1)).expect("rank1");
    service.register_student(student("rank2", 2)).expect("rank2");
    for id in ["rank1", "rank2"] {
        service
            .process_payment(&sid(id), PaymentMethod::Upi)
            .expect("payment");
    }
    service.open_preferences().expect("preferences open");
    service
        .submit_preferences(&sid("rank1"), courses(&["x", "y"]))
        .expect("rank1 preferences");
    service
        .submit_preferences(&sid("rank2"), courses(&["x"]))
        .expect("rank2 preferences");

    let summary = service.run_allocation().expect("allocation runs");

    assert_eq!(summary.allocated_count, 1);
    assert_eq!(summary.unallocated_student_ids, vec![sid("rank2")]);
    let rows = service.export_allocations().expect("export");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].student_id, sid("rank1"));
    assert_eq!(rows[0].course_id, CourseId("x".to_string()));
    assert_eq!(rows[0].institution_id.0, "north");
    assert_eq!(rows[0].preference_rank, 1);
}

#[test]
fn declined_payment_keeps_the_top_rank_out() {
    let service = service_with(ScriptedGateway::declining([sid("topper")]));
    service.open_registration().expect("registration opens");
    service.add_course(course("x", "north", 1)).expect("x");
    service.register_student(student("topper", 1)).expect("topper");
    service.register_student(student("runner", 2)).expect("runner");
    service
        .process_payment(&sid("topper"), PaymentMethod::CreditCard)
        .expect("payment attempt");
    service
        .process_payment(&sid("runner"), PaymentMethod::CreditCard)
        .expect("payment");
    service.open_preferences().expect("preferences open");
    for id in ["topper", "runner"] {
        service
            .submit_preferences(&sid(id), courses(&["x"]))
            .expect("preferences");
    }

    let summary = service.run_allocation().expect("allocation runs");

    assert_eq!(summary.eligible_count, 1);
    let topper = service.student_status(&sid("topper")).expect("status");
    assert!(!topper.eligible);
    assert!(topper.allocation.is_none());
    let runner = service.student_status(&sid("runner")).expect("status");
    assert_eq!(
        runner.allocation.map(|seat| seat.course_id),
        Some(CourseId("x".to_string()))
    );
}

#[test]
fn reset_returns_to_setup_with_empty_results() {
    let service = service_with(ScriptedGateway::approving());
    service.open_registration().expect("registration opens");
    service.add_course(course("x", "north", 2)).expect("x");
    service.register_student(student("a", 1)).expect("a");
    service
        .process_payment(&sid("a"), PaymentMethod::Wallet)
        .expect("payment");
    service.open_preferences().expect("preferences open");
    service
        .submit_preferences(&sid("a"), courses(&["x"]))
        .expect("preferences");
    service.run_allocation().expect("allocation runs");

    service.reset_system().expect("reset");

    assert_eq!(service.phase(), CounsellingPhase::Setup);
    let stats = service.statistics().expect("statistics");
    assert_eq!(stats.paid_count, 0);
    assert_eq!(stats.allocated_count, 0);
    assert_eq!(stats.seats_filled, 0);
    assert!(service.export_allocations().expect("export").is_empty());
}
