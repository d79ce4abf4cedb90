use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{parse_when, AttendanceStatus, StudentActivitySnapshot};

/// The closed set of award conditions. Unknown discriminants are carried
/// through so a rule referencing a retired condition evaluates to "no
/// suggestion" instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleCondition {
    AttendancePerfectWeek,
    AssignmentSubmittedEarly,
    AssignmentHighScore,
    ParticipationActive,
    BehaviorExcellent,
    ImprovementSignificant,
    Unknown(String),
}

impl RuleCondition {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "attendance_perfect_week" => RuleCondition::AttendancePerfectWeek,
            "assignment_submitted_early" => RuleCondition::AssignmentSubmittedEarly,
            "assignment_high_score" => RuleCondition::AssignmentHighScore,
            "participation_active" => RuleCondition::ParticipationActive,
            "behavior_excellent" => RuleCondition::BehaviorExcellent,
            "improvement_significant" => RuleCondition::ImprovementSignificant,
            other => RuleCondition::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RuleCondition::AttendancePerfectWeek => "attendance_perfect_week",
            RuleCondition::AssignmentSubmittedEarly => "assignment_submitted_early",
            RuleCondition::AssignmentHighScore => "assignment_high_score",
            RuleCondition::ParticipationActive => "participation_active",
            RuleCondition::BehaviorExcellent => "behavior_excellent",
            RuleCondition::ImprovementSignificant => "improvement_significant",
            RuleCondition::Unknown(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTrigger {
    Automatic,
    TeacherSuggestion,
}

impl RuleTrigger {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "automatic" => Some(RuleTrigger::Automatic),
            "teacher_suggestion" => Some(RuleTrigger::TeacherSuggestion),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuleTrigger::Automatic => "automatic",
            RuleTrigger::TeacherSuggestion => "teacher_suggestion",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_early: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improvement_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_level_restriction: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PointRule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub condition: RuleCondition,
    pub point_value: i64,
    pub trigger: RuleTrigger,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
    pub parameters: RuleParameters,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointSuggestion {
    pub id: String,
    pub rule_id: String,
    pub student_id: String,
    pub teacher_id: String,
    pub reason: String,
    pub suggested_points: i64,
    pub is_applied: bool,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<String>,
}

const DEFAULT_MIN_SCORE: f64 = 85.0;
const DEFAULT_DAYS_EARLY: i64 = 1;
const DEFAULT_IMPROVEMENT_THRESHOLD: f64 = 10.0;

/// Letter grades mapped to representative percentages. Strings that are
/// neither numeric nor a recognized letter parse to None ("unscored") and
/// are excluded from thresholds and averages.
fn letter_to_percent(letter: &str) -> Option<f64> {
    match letter {
        "A+" => Some(97.0),
        "A" => Some(93.0),
        "A-" => Some(90.0),
        "B+" => Some(87.0),
        "B" => Some(83.0),
        "B-" => Some(80.0),
        "C+" => Some(77.0),
        "C" => Some(73.0),
        "C-" => Some(70.0),
        "D+" => Some(67.0),
        "D" => Some(63.0),
        "D-" => Some(60.0),
        "F" => Some(50.0),
        _ => None,
    }
}

pub fn numeric_score(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<f64>() {
        return Some(v);
    }
    letter_to_percent(trimmed.to_ascii_uppercase().as_str())
}

fn within_last_days(now: DateTime<Utc>, when: DateTime<Utc>, days: i64) -> bool {
    let age = now.signed_duration_since(when);
    age >= Duration::zero() && age <= Duration::days(days)
}

fn within_day_range(now: DateTime<Utc>, when: DateTime<Utc>, from_days: i64, to_days: i64) -> bool {
    let age = now.signed_duration_since(when);
    age > Duration::days(from_days) && age <= Duration::days(to_days)
}

fn enrolled_in_subject(snapshot: &StudentActivitySnapshot, subject_id: &str) -> bool {
    snapshot.classes.iter().any(|class| {
        class.student_ids.iter().any(|s| s == &snapshot.student.id)
            && class.subject_ids.iter().any(|s| s == subject_id)
    })
}

/// Evaluates the configured award rules against one student's activity.
/// Stateless between calls; rules are read-only after construction, so one
/// engine may serve concurrent per-student evaluations.
pub struct RuleEngine {
    rules: Vec<PointRule>,
}

impl RuleEngine {
    /// Inactive rules are discarded up front and can never produce a
    /// suggestion.
    pub fn new(rules: Vec<PointRule>) -> Self {
        RuleEngine {
            rules: rules.into_iter().filter(|r| r.is_active).collect(),
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Runs every active rule against the snapshot. `now` anchors all
    /// relative-time windows so results are reproducible in tests.
    pub fn evaluate(
        &self,
        snapshot: &StudentActivitySnapshot,
        teacher_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<PointSuggestion> {
        let mut suggestions = Vec::new();
        for rule in &self.rules {
            if let Some(restriction) = &rule.parameters.grade_level_restriction {
                if restriction.trim() != snapshot.student.grade_level.trim() {
                    continue;
                }
            }
            let (should_suggest, reason) = evaluate_condition(rule, snapshot, now);
            if should_suggest {
                suggestions.push(PointSuggestion {
                    id: Uuid::new_v4().to_string(),
                    rule_id: rule.id.clone(),
                    student_id: snapshot.student.id.clone(),
                    teacher_id: teacher_id.to_string(),
                    reason,
                    suggested_points: rule.point_value,
                    is_applied: false,
                    created_at: now.to_rfc3339(),
                    applied_at: None,
                });
            }
        }
        suggestions
    }
}

fn evaluate_condition(
    rule: &PointRule,
    snapshot: &StudentActivitySnapshot,
    now: DateTime<Utc>,
) -> (bool, String) {
    match &rule.condition {
        RuleCondition::AttendancePerfectWeek => attendance_perfect_week(snapshot, now),
        RuleCondition::AssignmentSubmittedEarly => assignment_submitted_early(rule, snapshot, now),
        RuleCondition::AssignmentHighScore => assignment_high_score(rule, snapshot, now),
        RuleCondition::ParticipationActive => participation_active(snapshot, now),
        RuleCondition::BehaviorExcellent => behavior_excellent(snapshot, now),
        RuleCondition::ImprovementSignificant => improvement_significant(rule, snapshot, now),
        RuleCondition::Unknown(raw) => (false, format!("unrecognized rule condition: {}", raw)),
    }
}

/// At least five attendance records in the last seven days, every one of
/// them present. Late does not count.
fn attendance_perfect_week(snapshot: &StudentActivitySnapshot, now: DateTime<Utc>) -> (bool, String) {
    let recent: Vec<&AttendanceStatus> = snapshot
        .attendance
        .iter()
        .filter(|r| parse_when(&r.date).is_some_and(|d| within_last_days(now, d, 7)))
        .map(|r| &r.status)
        .collect();
    if recent.len() >= 5 && recent.iter().all(|s| **s == AttendanceStatus::Present) {
        (
            true,
            format!(
                "Perfect attendance: present for all {} school days this week",
                recent.len()
            ),
        )
    } else {
        (false, String::new())
    }
}

fn assignment_submitted_early(
    rule: &PointRule,
    snapshot: &StudentActivitySnapshot,
    now: DateTime<Utc>,
) -> (bool, String) {
    let required_days_early = rule.parameters.days_early.unwrap_or(DEFAULT_DAYS_EARLY);
    if let Some(subject_id) = &rule.parameters.subject_id {
        if !enrolled_in_subject(snapshot, subject_id) {
            return (false, String::new());
        }
    }
    for grade in &snapshot.grades {
        let (Some(due_raw), Some(submitted_raw)) = (&grade.due_date, &grade.submission_date) else {
            continue;
        };
        let (Some(due), Some(submitted)) = (parse_when(due_raw), parse_when(submitted_raw)) else {
            continue;
        };
        if !within_last_days(now, submitted, 1) {
            continue;
        }
        let days_early = due.signed_duration_since(submitted).num_days();
        if days_early >= required_days_early {
            return (
                true,
                format!(
                    "Submitted \"{}\" {} day(s) before the due date",
                    grade.name, days_early
                ),
            );
        }
    }
    (false, String::new())
}

fn assignment_high_score(
    rule: &PointRule,
    snapshot: &StudentActivitySnapshot,
    now: DateTime<Utc>,
) -> (bool, String) {
    let min_score = rule.parameters.min_score.unwrap_or(DEFAULT_MIN_SCORE);
    if let Some(subject_id) = &rule.parameters.subject_id {
        if !enrolled_in_subject(snapshot, subject_id) {
            return (false, String::new());
        }
    }
    for grade in &snapshot.grades {
        let Some(assigned) = parse_when(&grade.date_assigned) else {
            continue;
        };
        if !within_last_days(now, assigned, 1) {
            continue;
        }
        let Some(score) = numeric_score(&grade.score) else {
            continue;
        };
        if score >= min_score {
            return (
                true,
                format!(
                    "Scored {} on \"{}\" (threshold {})",
                    score, grade.name, min_score
                ),
            );
        }
    }
    (false, String::new())
}

/// Heuristic: no explicit participation tracking exists, so two graded
/// activities plus any point movement in the last seven days stands in for
/// active participation.
fn participation_active(snapshot: &StudentActivitySnapshot, now: DateTime<Utc>) -> (bool, String) {
    let graded = snapshot
        .grades
        .iter()
        .filter(|g| parse_when(&g.date_assigned).is_some_and(|d| within_last_days(now, d, 7)))
        .count();
    let point_events = snapshot
        .point_transactions
        .iter()
        .filter(|t| parse_when(&t.date).is_some_and(|d| within_last_days(now, d, 7)))
        .count();
    if graded >= 2 && point_events >= 1 {
        (
            true,
            format!(
                "Active this week: {} graded activities and {} point event(s) in the last 7 days",
                graded, point_events
            ),
        )
    } else {
        (false, String::new())
    }
}

/// Heuristic: three or more attendance records in the last seven days with
/// at least 80% present, plus at least one positive point transaction in the
/// same window.
fn behavior_excellent(snapshot: &StudentActivitySnapshot, now: DateTime<Utc>) -> (bool, String) {
    let recent: Vec<&AttendanceStatus> = snapshot
        .attendance
        .iter()
        .filter(|r| parse_when(&r.date).is_some_and(|d| within_last_days(now, d, 7)))
        .map(|r| &r.status)
        .collect();
    if recent.len() < 3 {
        return (false, String::new());
    }
    let present = recent
        .iter()
        .filter(|s| ***s == AttendanceStatus::Present)
        .count();
    let present_rate = present as f64 / recent.len() as f64;
    let has_positive_points = snapshot.point_transactions.iter().any(|t| {
        t.points > 0 && parse_when(&t.date).is_some_and(|d| within_last_days(now, d, 7))
    });
    if present_rate >= 0.8 && has_positive_points {
        (
            true,
            format!(
                "Excellent behavior: {:.0}% attendance and positive point activity this week",
                present_rate * 100.0
            ),
        )
    } else {
        (false, String::new())
    }
}

/// Mean score in the last 7 days against the mean from 7-14 days ago. Both
/// windows must hold at least one scored record; a brand-new student has
/// nothing to compare against and never fires this rule.
fn improvement_significant(
    rule: &PointRule,
    snapshot: &StudentActivitySnapshot,
    now: DateTime<Utc>,
) -> (bool, String) {
    let threshold = rule
        .parameters
        .improvement_threshold
        .unwrap_or(DEFAULT_IMPROVEMENT_THRESHOLD);

    let mut recent = Vec::new();
    let mut older = Vec::new();
    for grade in &snapshot.grades {
        let Some(assigned) = parse_when(&grade.date_assigned) else {
            continue;
        };
        let Some(score) = numeric_score(&grade.score) else {
            continue;
        };
        if within_last_days(now, assigned, 7) {
            recent.push(score);
        } else if within_day_range(now, assigned, 7, 14) {
            older.push(score);
        }
    }
    if recent.is_empty() || older.is_empty() {
        return (false, String::new());
    }

    let recent_mean = recent.iter().sum::<f64>() / recent.len() as f64;
    let older_mean = older.iter().sum::<f64>() / older.len() as f64;
    let delta = recent_mean - older_mean;
    if delta >= threshold {
        (
            true,
            format!(
                "Average score improved from {:.1} to {:.1} (+{:.1}) over the last two weeks",
                older_mean, recent_mean, delta
            ),
        )
    } else {
        (false, String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AttendanceRecord, GradeRecord, PointTransaction, SchoolClass, StudentInfo,
    };
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> String {
        (fixed_now() - Duration::days(days)).to_rfc3339()
    }

    fn rule(condition: RuleCondition) -> PointRule {
        PointRule {
            id: "rule-1".to_string(),
            name: "Test rule".to_string(),
            description: String::new(),
            condition,
            point_value: 5,
            trigger: RuleTrigger::TeacherSuggestion,
            is_active: true,
            created_by: "admin".to_string(),
            created_at: days_ago(30),
            updated_at: days_ago(30),
            parameters: RuleParameters::default(),
        }
    }

    fn snapshot() -> StudentActivitySnapshot {
        StudentActivitySnapshot {
            student: StudentInfo {
                id: "student-1".to_string(),
                grade_level: "9".to_string(),
            },
            attendance: Vec::new(),
            grades: Vec::new(),
            point_transactions: Vec::new(),
            classes: Vec::new(),
        }
    }

    fn attendance(days: i64, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            date: days_ago(days),
            status,
        }
    }

    fn grade_record(id: &str, days: i64, score: &str) -> GradeRecord {
        GradeRecord {
            id: id.to_string(),
            student_id: "student-1".to_string(),
            class_id: "class-1".to_string(),
            subject_id: None,
            name: format!("Assignment {}", id),
            score: score.to_string(),
            max_score: Some(100.0),
            date_assigned: days_ago(days),
            due_date: None,
            submission_date: None,
            liberian_grade: None,
            continuous_assessment: None,
            external_examination: None,
            term: None,
        }
    }

    fn transaction(days: i64, points: i64) -> PointTransaction {
        PointTransaction {
            id: format!("txn-{}-{}", days, points),
            student_id: "student-1".to_string(),
            teacher_id: "teacher-1".to_string(),
            points,
            reason: "test".to_string(),
            date: days_ago(days),
        }
    }

    #[test]
    fn perfect_week_fires_on_five_present_days() {
        let mut snap = snapshot();
        for d in 1..=5 {
            snap.attendance.push(attendance(d, AttendanceStatus::Present));
        }
        let engine = RuleEngine::new(vec![rule(RuleCondition::AttendancePerfectWeek)]);
        let suggestions = engine.evaluate(&snap, "teacher-1", fixed_now());
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].suggested_points, 5);
        assert!(!suggestions[0].is_applied);
    }

    #[test]
    fn perfect_week_suppressed_by_any_late_or_absent_day() {
        for spoiler in [AttendanceStatus::Late, AttendanceStatus::Absent] {
            let mut snap = snapshot();
            for d in 1..=4 {
                snap.attendance.push(attendance(d, AttendanceStatus::Present));
            }
            snap.attendance.push(attendance(5, spoiler));
            let engine = RuleEngine::new(vec![rule(RuleCondition::AttendancePerfectWeek)]);
            assert!(engine.evaluate(&snap, "teacher-1", fixed_now()).is_empty());
        }
    }

    #[test]
    fn perfect_week_needs_five_records_in_window() {
        let mut snap = snapshot();
        for d in 1..=4 {
            snap.attendance.push(attendance(d, AttendanceStatus::Present));
        }
        // A fifth present day outside the window does not count.
        snap.attendance.push(attendance(9, AttendanceStatus::Present));
        let engine = RuleEngine::new(vec![rule(RuleCondition::AttendancePerfectWeek)]);
        assert!(engine.evaluate(&snap, "teacher-1", fixed_now()).is_empty());
    }

    #[test]
    fn grade_level_restriction_skips_other_grades() {
        let mut restricted = rule(RuleCondition::AttendancePerfectWeek);
        restricted.parameters.grade_level_restriction = Some("9".to_string());
        let mut snap = snapshot();
        snap.student.grade_level = "10".to_string();
        for d in 1..=5 {
            snap.attendance.push(attendance(d, AttendanceStatus::Present));
        }
        let engine = RuleEngine::new(vec![restricted]);
        assert!(engine.evaluate(&snap, "teacher-1", fixed_now()).is_empty());
    }

    #[test]
    fn inactive_rules_never_suggest() {
        let mut inactive = rule(RuleCondition::AttendancePerfectWeek);
        inactive.is_active = false;
        let mut active = rule(RuleCondition::ParticipationActive);
        active.id = "rule-2".to_string();
        let mut snap = snapshot();
        for d in 1..=5 {
            snap.attendance.push(attendance(d, AttendanceStatus::Present));
        }
        snap.grades.push(grade_record("g1", 2, "90"));
        snap.grades.push(grade_record("g2", 3, "80"));
        snap.point_transactions.push(transaction(2, 3));

        let engine = RuleEngine::new(vec![inactive, active]);
        assert_eq!(engine.rule_count(), 1);
        let suggestions = engine.evaluate(&snap, "teacher-1", fixed_now());
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].rule_id, "rule-2");
    }

    #[test]
    fn early_submission_fires_for_recent_submissions_only() {
        let mut early = rule(RuleCondition::AssignmentSubmittedEarly);
        early.parameters.days_early = Some(2);
        let mut snap = snapshot();

        let mut g = grade_record("g1", 0, "75");
        g.submission_date = Some(days_ago(0));
        g.due_date = Some((fixed_now() + Duration::days(3)).to_rfc3339());
        snap.grades.push(g);

        let engine = RuleEngine::new(vec![early.clone()]);
        let suggestions = engine.evaluate(&snap, "teacher-1", fixed_now());
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].reason.contains("Assignment g1"));

        // Same assignment submitted a week ago is outside the 1-day window.
        snap.grades[0].submission_date = Some(days_ago(7));
        let engine = RuleEngine::new(vec![early]);
        assert!(engine.evaluate(&snap, "teacher-1", fixed_now()).is_empty());
    }

    #[test]
    fn early_submission_subject_filter_requires_enrollment() {
        let mut early = rule(RuleCondition::AssignmentSubmittedEarly);
        early.parameters.subject_id = Some("subj-math".to_string());
        let mut snap = snapshot();
        let mut g = grade_record("g1", 0, "75");
        g.submission_date = Some(days_ago(0));
        g.due_date = Some((fixed_now() + Duration::days(2)).to_rfc3339());
        snap.grades.push(g);

        let engine = RuleEngine::new(vec![early.clone()]);
        assert!(engine.evaluate(&snap, "teacher-1", fixed_now()).is_empty());

        snap.classes.push(SchoolClass {
            id: "class-1".to_string(),
            student_ids: vec!["student-1".to_string()],
            subject_ids: vec!["subj-math".to_string()],
            teacher_ids: vec!["teacher-1".to_string()],
        });
        let engine = RuleEngine::new(vec![early]);
        assert_eq!(engine.evaluate(&snap, "teacher-1", fixed_now()).len(), 1);
    }

    #[test]
    fn high_score_accepts_numeric_and_letter_scores() {
        let high = rule(RuleCondition::AssignmentHighScore);
        let mut snap = snapshot();
        snap.grades.push(grade_record("g1", 0, "A"));
        let engine = RuleEngine::new(vec![high.clone()]);
        let suggestions = engine.evaluate(&snap, "teacher-1", fixed_now());
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].reason.contains("93"));

        // B+ maps to 87 which clears the default 85 threshold; B (83) does not.
        snap.grades[0].score = "B+".to_string();
        assert_eq!(
            RuleEngine::new(vec![high.clone()])
                .evaluate(&snap, "teacher-1", fixed_now())
                .len(),
            1
        );
        snap.grades[0].score = "B".to_string();
        assert!(RuleEngine::new(vec![high.clone()])
            .evaluate(&snap, "teacher-1", fixed_now())
            .is_empty());

        // Unparseable scores are treated as unscored, not as zero.
        snap.grades[0].score = "incomplete".to_string();
        assert!(RuleEngine::new(vec![high])
            .evaluate(&snap, "teacher-1", fixed_now())
            .is_empty());
    }

    #[test]
    fn high_score_honors_min_score_parameter_and_window() {
        let mut high = rule(RuleCondition::AssignmentHighScore);
        high.parameters.min_score = Some(90.0);
        let mut snap = snapshot();
        snap.grades.push(grade_record("g1", 0, "88"));
        assert!(RuleEngine::new(vec![high.clone()])
            .evaluate(&snap, "teacher-1", fixed_now())
            .is_empty());

        snap.grades[0].score = "92".to_string();
        assert_eq!(
            RuleEngine::new(vec![high.clone()])
                .evaluate(&snap, "teacher-1", fixed_now())
                .len(),
            1
        );

        // A qualifying score graded three days ago is outside the 1-day window.
        snap.grades[0].date_assigned = days_ago(3);
        assert!(RuleEngine::new(vec![high])
            .evaluate(&snap, "teacher-1", fixed_now())
            .is_empty());
    }

    #[test]
    fn participation_requires_grades_and_point_activity() {
        let participation = rule(RuleCondition::ParticipationActive);
        let mut snap = snapshot();
        snap.grades.push(grade_record("g1", 2, "70"));
        snap.grades.push(grade_record("g2", 4, "65"));
        assert!(RuleEngine::new(vec![participation.clone()])
            .evaluate(&snap, "teacher-1", fixed_now())
            .is_empty());

        // Any point movement counts, including deductions.
        snap.point_transactions.push(transaction(3, -2));
        assert_eq!(
            RuleEngine::new(vec![participation])
                .evaluate(&snap, "teacher-1", fixed_now())
                .len(),
            1
        );
    }

    #[test]
    fn behavior_requires_attendance_rate_and_positive_points() {
        let behavior = rule(RuleCondition::BehaviorExcellent);
        let mut snap = snapshot();
        for d in 1..=4 {
            snap.attendance.push(attendance(d, AttendanceStatus::Present));
        }
        snap.attendance.push(attendance(5, AttendanceStatus::Late));
        snap.point_transactions.push(transaction(2, 4));

        // 4 of 5 present = 80%, which qualifies.
        assert_eq!(
            RuleEngine::new(vec![behavior.clone()])
                .evaluate(&snap, "teacher-1", fixed_now())
                .len(),
            1
        );

        // Only a deduction in the window: no suggestion.
        snap.point_transactions[0].points = -4;
        assert!(RuleEngine::new(vec![behavior.clone()])
            .evaluate(&snap, "teacher-1", fixed_now())
            .is_empty());

        // 3 of 5 present = 60%, below the bar even with positive points.
        snap.point_transactions[0].points = 4;
        snap.attendance[3].status = AttendanceStatus::Absent;
        assert!(RuleEngine::new(vec![behavior])
            .evaluate(&snap, "teacher-1", fixed_now())
            .is_empty());
    }

    #[test]
    fn improvement_compares_weekly_means() {
        let improvement = rule(RuleCondition::ImprovementSignificant);
        let mut snap = snapshot();
        snap.grades.push(grade_record("old1", 10, "60"));
        snap.grades.push(grade_record("old2", 12, "70"));
        snap.grades.push(grade_record("new1", 2, "80"));
        snap.grades.push(grade_record("new2", 3, "90"));

        let suggestions =
            RuleEngine::new(vec![improvement]).evaluate(&snap, "teacher-1", fixed_now());
        assert_eq!(suggestions.len(), 1);
        // 65.0 -> 85.0 is a 20-point jump, cited to one decimal place.
        assert!(suggestions[0].reason.contains("65.0"));
        assert!(suggestions[0].reason.contains("85.0"));
        assert!(suggestions[0].reason.contains("+20.0"));
    }

    #[test]
    fn improvement_needs_both_windows_populated() {
        let improvement = rule(RuleCondition::ImprovementSignificant);
        let mut snap = snapshot();
        // A new student with only recent grades never fires this rule.
        snap.grades.push(grade_record("new1", 2, "95"));
        snap.grades.push(grade_record("new2", 3, "98"));
        assert!(RuleEngine::new(vec![improvement])
            .evaluate(&snap, "teacher-1", fixed_now())
            .is_empty());
    }

    #[test]
    fn improvement_below_threshold_does_not_fire() {
        let mut improvement = rule(RuleCondition::ImprovementSignificant);
        improvement.parameters.improvement_threshold = Some(15.0);
        let mut snap = snapshot();
        snap.grades.push(grade_record("old1", 10, "70"));
        snap.grades.push(grade_record("new1", 2, "80"));
        assert!(RuleEngine::new(vec![improvement])
            .evaluate(&snap, "teacher-1", fixed_now())
            .is_empty());
    }

    #[test]
    fn unknown_condition_is_a_quiet_no_match() {
        let retired = rule(RuleCondition::parse("homework_streak"));
        assert_eq!(retired.condition.as_str(), "homework_streak");
        let mut snap = snapshot();
        for d in 1..=5 {
            snap.attendance.push(attendance(d, AttendanceStatus::Present));
        }
        assert!(RuleEngine::new(vec![retired])
            .evaluate(&snap, "teacher-1", fixed_now())
            .is_empty());
    }

    #[test]
    fn suggestion_ids_are_unique_within_a_batch() {
        let mut snap = snapshot();
        for d in 1..=5 {
            snap.attendance.push(attendance(d, AttendanceStatus::Present));
        }
        snap.point_transactions.push(transaction(2, 3));
        let mut second = rule(RuleCondition::BehaviorExcellent);
        second.id = "rule-2".to_string();
        let engine = RuleEngine::new(vec![rule(RuleCondition::AttendancePerfectWeek), second]);
        let suggestions = engine.evaluate(&snap, "teacher-1", fixed_now());
        assert_eq!(suggestions.len(), 2);
        assert_ne!(suggestions[0].id, suggestions[1].id);
        assert_eq!(suggestions[0].created_at, fixed_now().to_rfc3339());
    }
}
