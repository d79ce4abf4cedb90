use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::grading::GradeLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub date: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    #[serde(default)]
    pub subject_id: Option<String>,
    /// Assignment name shown to teachers; used verbatim in suggestion text.
    pub name: String,
    /// Raw score as entered: numeric ("87.5") or a letter grade ("B+").
    pub score: String,
    #[serde(default)]
    pub max_score: Option<f64>,
    pub date_assigned: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub submission_date: Option<String>,
    #[serde(default)]
    pub liberian_grade: Option<GradeLevel>,
    #[serde(default)]
    pub continuous_assessment: Option<f64>,
    #[serde(default)]
    pub external_examination: Option<f64>,
    #[serde(default)]
    pub term: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointTransaction {
    pub id: String,
    pub student_id: String,
    pub teacher_id: String,
    pub points: i64,
    pub reason: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolClass {
    pub id: String,
    #[serde(default)]
    pub student_ids: Vec<String>,
    #[serde(default)]
    pub subject_ids: Vec<String>,
    #[serde(default)]
    pub teacher_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    pub id: String,
    pub grade_level: String,
}

/// One student's slice of history, assembled by the caller per evaluation
/// call. The engine treats this as read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentActivitySnapshot {
    pub student: StudentInfo,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
    #[serde(default)]
    pub grades: Vec<GradeRecord>,
    #[serde(default)]
    pub point_transactions: Vec<PointTransaction>,
    #[serde(default)]
    pub classes: Vec<SchoolClass>,
}

/// Lenient ISO-8601 parse: RFC 3339 date-time first, then a plain date taken
/// as midnight UTC. Unparseable values return None and simply fall outside
/// every evaluation window.
pub fn parse_when(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}
