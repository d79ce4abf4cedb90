use crate::grading::{
    aggregate_score, check_eligibility, classify, classify_division, final_grade, GradeLevel,
    SubjectGrade,
};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde::Deserialize;
use serde_json::json;

fn get_f64(params: &serde_json::Value, key: &str) -> Option<f64> {
    params.get(key).and_then(|v| v.as_f64())
}

fn grade_json(grade: GradeLevel) -> serde_json::Value {
    json!({
        "grade": grade.as_str(),
        "description": grade.description(),
        "points": grade.points(),
        "isCredit": grade.is_credit(),
    })
}

fn handle_classify(req: &Request) -> serde_json::Value {
    let Some(percentage) = get_f64(&req.params, "percentage") else {
        return err(&req.id, "bad_params", "missing percentage", None);
    };
    ok(&req.id, grade_json(classify(percentage)))
}

fn handle_final_grade(req: &Request) -> serde_json::Value {
    let Some(ca) = get_f64(&req.params, "continuousAssessment") else {
        return err(&req.id, "bad_params", "missing continuousAssessment", None);
    };
    let Some(exam) = get_f64(&req.params, "externalExam") else {
        return err(&req.id, "bad_params", "missing externalExam", None);
    };
    let result = final_grade(ca, exam);
    let mut body = grade_json(result.grade);
    body["finalScore"] = json!(result.final_score);
    ok(&req.id, body)
}

fn handle_check_eligibility(req: &Request) -> serde_json::Value {
    let Some(subjects_raw) = req.params.get("subjects") else {
        return err(&req.id, "bad_params", "missing subjects", None);
    };
    let subjects: Vec<SubjectGrade> = match serde_json::from_value(subjects_raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("invalid subjects: {}", e), None),
    };
    let result = check_eligibility(&subjects);
    match serde_json::to_value(&result) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_aggregate_score(req: &Request) -> serde_json::Value {
    let Some(grades_raw) = req.params.get("grades") else {
        return err(&req.id, "bad_params", "missing grades", None);
    };
    let grades: Vec<GradeLevel> = match serde_json::from_value(grades_raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("invalid grades: {}", e), None),
    };
    ok(&req.id, json!({ "aggregateScore": aggregate_score(&grades) }))
}

fn handle_classify_division(req: &Request) -> serde_json::Value {
    let Some(aggregate) = req.params.get("aggregateScore").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing aggregateScore", None);
    };
    let Some(has_core) = req
        .params
        .get("hasEnglishAndMathCredit")
        .and_then(|v| v.as_bool())
    else {
        return err(&req.id, "bad_params", "missing hasEnglishAndMathCredit", None);
    };
    let division = classify_division(aggregate, has_core);
    ok(
        &req.id,
        json!({
            "division": division.label(),
            "description": division.description(),
        }),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportCardSubject {
    subject: String,
    continuous_assessment: f64,
    external_exam: f64,
}

/// Composes the calculator over a full subject slate: per-subject final
/// grades, eligibility, aggregate score, and division in one call.
fn handle_report_card(req: &Request) -> serde_json::Value {
    let Some(subjects_raw) = req.params.get("subjects") else {
        return err(&req.id, "bad_params", "missing subjects", None);
    };
    let subjects: Vec<ReportCardSubject> = match serde_json::from_value(subjects_raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("invalid subjects: {}", e), None),
    };

    let mut subject_rows = Vec::new();
    let mut subject_grades = Vec::new();
    let mut levels = Vec::new();
    for s in &subjects {
        let result = final_grade(s.continuous_assessment, s.external_exam);
        let mut row = grade_json(result.grade);
        row["subject"] = json!(s.subject);
        row["finalScore"] = json!(result.final_score);
        subject_rows.push(row);
        subject_grades.push(SubjectGrade {
            subject: s.subject.clone(),
            grade: result.grade,
        });
        levels.push(result.grade);
    }

    let eligibility = check_eligibility(&subject_grades);
    let aggregate = aggregate_score(&levels);
    let division = classify_division(
        aggregate,
        eligibility.has_english_credit && eligibility.has_math_credit,
    );

    let eligibility_json = match serde_json::to_value(&eligibility) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "serialize_failed", e.to_string(), None),
    };
    ok(
        &req.id,
        json!({
            "subjects": subject_rows,
            "eligibility": eligibility_json,
            "aggregateScore": aggregate,
            "division": {
                "division": division.label(),
                "description": division.description(),
            },
        }),
    )
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grading.classify" => Some(handle_classify(req)),
        "grading.finalGrade" => Some(handle_final_grade(req)),
        "grading.checkEligibility" => Some(handle_check_eligibility(req)),
        "grading.aggregateScore" => Some(handle_aggregate_score(req)),
        "grading.classifyDivision" => Some(handle_classify_division(req)),
        "grading.reportCard" => Some(handle_report_card(req)),
        _ => None,
    }
}
