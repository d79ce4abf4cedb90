use serde::{Deserialize, Serialize};

/// WAEC ordinal grade scale as used on Liberian report cards.
/// Lower point value is better (A1 = 1, F9 = 11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GradeLevel {
    A1,
    A2,
    A3,
    B2,
    B3,
    C4,
    C5,
    C6,
    D7,
    E8,
    F9,
}

impl GradeLevel {
    pub fn points(self) -> i64 {
        match self {
            GradeLevel::A1 => 1,
            GradeLevel::A2 => 2,
            GradeLevel::A3 => 3,
            GradeLevel::B2 => 4,
            GradeLevel::B3 => 5,
            GradeLevel::C4 => 6,
            GradeLevel::C5 => 7,
            GradeLevel::C6 => 8,
            GradeLevel::D7 => 9,
            GradeLevel::E8 => 10,
            GradeLevel::F9 => 11,
        }
    }

    /// Credit pass is C6 or better.
    pub fn is_credit(self) -> bool {
        self.points() <= GradeLevel::C6.points()
    }

    pub fn description(self) -> &'static str {
        match self {
            GradeLevel::A1 => "Excellent",
            GradeLevel::A2 => "Very Good",
            GradeLevel::A3 => "Good",
            GradeLevel::B2 => "Good",
            GradeLevel::B3 => "Fair",
            GradeLevel::C4 => "Credit",
            GradeLevel::C5 => "Credit",
            GradeLevel::C6 => "Credit",
            GradeLevel::D7 => "Pass",
            GradeLevel::E8 => "Pass",
            GradeLevel::F9 => "Fail",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GradeLevel::A1 => "A1",
            GradeLevel::A2 => "A2",
            GradeLevel::A3 => "A3",
            GradeLevel::B2 => "B2",
            GradeLevel::B3 => "B3",
            GradeLevel::C4 => "C4",
            GradeLevel::C5 => "C5",
            GradeLevel::C6 => "C6",
            GradeLevel::D7 => "D7",
            GradeLevel::E8 => "E8",
            GradeLevel::F9 => "F9",
        }
    }
}

/// Percentage bands, inclusive lower bounds, scanned in descending order.
/// Anything below the last bound is F9. The bands partition 0..=100 with no
/// gaps or overlaps; do not reorder.
const GRADE_BANDS: [(f64, GradeLevel); 10] = [
    (80.0, GradeLevel::A1),
    (75.0, GradeLevel::A2),
    (70.0, GradeLevel::A3),
    (65.0, GradeLevel::B2),
    (60.0, GradeLevel::B3),
    (55.0, GradeLevel::C4),
    (50.0, GradeLevel::C5),
    (45.0, GradeLevel::C6),
    (40.0, GradeLevel::D7),
    (35.0, GradeLevel::E8),
];

/// Map a raw percentage to its grade band. Out-of-range input is not
/// rejected: anything >= 80 is A1 and anything below 35 is F9, including
/// negative values and values above 100. That clamp-to-extremes behavior is
/// relied on upstream for sentinel scores.
pub fn classify(percentage: f64) -> GradeLevel {
    for (lower_bound, level) in GRADE_BANDS {
        if percentage >= lower_bound {
            return level;
        }
    }
    GradeLevel::F9
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalGradeResult {
    pub final_score: i64,
    pub grade: GradeLevel,
}

/// Weighted final score: 30% continuous assessment, 70% external exam,
/// rounded half-away-from-zero to the nearest integer before banding.
pub fn final_grade(continuous_assessment: f64, external_exam: f64) -> FinalGradeResult {
    let final_score = (continuous_assessment * 0.3 + external_exam * 0.7).round() as i64;
    FinalGradeResult {
        final_score,
        grade: classify(final_score as f64),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectGrade {
    pub subject: String,
    pub grade: GradeLevel,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityResult {
    pub is_eligible: bool,
    pub credit_pass_count: usize,
    pub has_english_credit: bool,
    pub has_math_credit: bool,
    pub missing_requirements: Vec<String>,
}

const REQUIRED_CREDIT_PASSES: usize = 5;

fn subject_matches(name: &str, needles: &[&str]) -> bool {
    let lowered = name.to_lowercase();
    needles.iter().any(|n| lowered.contains(n))
}

/// University-admission eligibility: at least five credit passes including
/// credit-level English and Mathematics. Required subjects are found by
/// case-insensitive substring match on the subject name; the first matching
/// entry wins if a student carries more than one.
pub fn check_eligibility(subject_grades: &[SubjectGrade]) -> EligibilityResult {
    let credit_pass_count = subject_grades
        .iter()
        .filter(|sg| sg.grade.is_credit())
        .count();

    let english = subject_grades
        .iter()
        .find(|sg| subject_matches(&sg.subject, &["english", "language arts"]));
    let math = subject_grades
        .iter()
        .find(|sg| subject_matches(&sg.subject, &["math"]));

    let has_english_credit = english.map(|sg| sg.grade.is_credit()).unwrap_or(false);
    let has_math_credit = math.map(|sg| sg.grade.is_credit()).unwrap_or(false);

    let mut missing_requirements = Vec::new();
    if credit_pass_count < REQUIRED_CREDIT_PASSES {
        missing_requirements.push(format!(
            "Needs {} more credit pass(es)",
            REQUIRED_CREDIT_PASSES - credit_pass_count
        ));
    }
    if !has_english_credit {
        missing_requirements.push("Credit pass in English Language required".to_string());
    }
    if !has_math_credit {
        missing_requirements.push("Credit pass in Mathematics required".to_string());
    }

    EligibilityResult {
        is_eligible: missing_requirements.is_empty(),
        credit_pass_count,
        has_english_credit,
        has_math_credit,
        missing_requirements,
    }
}

const AGGREGATE_SUBJECT_COUNT: usize = 6;

/// Sum of the best six subject point values (fewer if fewer supplied).
/// Lower is better.
pub fn aggregate_score(grades: &[GradeLevel]) -> i64 {
    let mut points: Vec<i64> = grades.iter().map(|g| g.points()).collect();
    points.sort_unstable();
    points.iter().take(AGGREGATE_SUBJECT_COUNT).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Division {
    DivisionI,
    DivisionII,
    DivisionIII,
    NoDivision,
}

impl Division {
    pub fn label(self) -> &'static str {
        match self {
            Division::DivisionI => "Division I",
            Division::DivisionII => "Division II",
            Division::DivisionIII => "Division III",
            Division::NoDivision => "No Division",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Division::DivisionI => "Distinction level pass",
            Division::DivisionII => "Strong pass",
            Division::DivisionIII => "Pass",
            Division::NoDivision => "Aggregate or core-subject requirements not met",
        }
    }
}

/// Division classification from an aggregate score. Without credit-level
/// English and Mathematics the result is No Division regardless of score.
/// Band upper bounds are inclusive.
pub fn classify_division(aggregate: i64, has_english_and_math_credit: bool) -> Division {
    if !has_english_and_math_credit {
        return Division::NoDivision;
    }
    match aggregate {
        a if a <= 24 => Division::DivisionI,
        a if a <= 36 => Division::DivisionII,
        a if a <= 48 => Division::DivisionIII,
        _ => Division::NoDivision,
    }
}
