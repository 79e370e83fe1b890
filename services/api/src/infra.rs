use metrics_exporter_prometheus::PrometheusHandle;
use seat_counselling::config::CounsellingConfig;
use seat_counselling::counselling::{
    CounsellingError, CounsellingRepository, CounsellingService, CourseRegistration,
    PaymentGateway, StudentCategory, StudentRegistration,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Courses offered in the sample round: (id, institution, name, code, seats).
const SAMPLE_COURSES: [(&str, &str, &str, &str, u32); 4] = [
    ("abc-cse", "abc", "Computer Science Engineering", "CSE", 2),
    ("abc-ece", "abc", "Electronics and Communication", "ECE", 2),
    ("xyz-me", "xyz", "Mechanical Engineering", "ME", 1),
    ("xyz-cse", "xyz", "Computer Science Engineering", "CSE", 1),
];

/// Students in the sample round with their rank and ordered choices.
const SAMPLE_STUDENTS: [(&str, &str, u32, StudentCategory, &[&str]); 7] = [
    ("stu-001", "John Doe", 1, StudentCategory::General, &["abc-cse", "xyz-cse"]),
    ("stu-002", "Jane Smith", 2, StudentCategory::Obc, &["abc-cse", "abc-ece"]),
    ("stu-003", "Ravi Kumar", 3, StudentCategory::General, &["abc-cse", "xyz-cse"]),
    ("stu-004", "Priya Patel", 4, StudentCategory::Sc, &["xyz-cse", "abc-cse"]),
    ("stu-005", "Amit Singh", 5, StudentCategory::St, &["abc-ece"]),
    ("stu-006", "Neha Gupta", 6, StudentCategory::General, &["abc-ece", "xyz-me"]),
    ("stu-007", "Karan Mehta", 7, StudentCategory::Obc, &[]),
];

pub(crate) fn sample_courses() -> impl Iterator<Item = CourseRegistration> {
    SAMPLE_COURSES
        .into_iter()
        .map(|(id, institution, name, code, capacity)| CourseRegistration {
            id: id.to_string(),
            institution_id: institution.to_string(),
            name: name.to_string(),
            code: code.to_string(),
            capacity,
            active: true,
        })
}

pub(crate) fn sample_students() -> impl Iterator<Item = (StudentRegistration, Vec<String>)> {
    SAMPLE_STUDENTS
        .into_iter()
        .map(|(id, name, rank, category, choices)| {
            (
                StudentRegistration {
                    id: id.to_string(),
                    name: name.to_string(),
                    rank,
                    category,
                },
                choices.iter().map(|choice| choice.to_string()).collect(),
            )
        })
}

/// Registers the sample courses and students; leaves the round in
/// `RegistrationOpen`.
pub(crate) fn seed_sample_round<R, G>(
    service: &CounsellingService<R, G>,
) -> Result<(), CounsellingError>
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    service.open_registration()?;
    for course in sample_courses() {
        service.add_course(course)?;
    }
    for (student, _) in sample_students() {
        service.register_student(student)?;
    }
    Ok(())
}

pub(crate) fn counselling_config_summary(config: &CounsellingConfig) -> String {
    format!(
        "fee {} | gateway success rate {:.0}%",
        config.counselling_fee,
        config.payment_success_rate * 100.0
    )
}
