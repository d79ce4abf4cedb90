use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::models::{parse_when, StudentActivitySnapshot};
use crate::rules::{PointSuggestion, RuleEngine};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::json;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

fn bad_params(message: impl Into<String>) -> HandlerErr {
    HandlerErr {
        code: "bad_params",
        message: message.into(),
        details: None,
    }
}

fn db_err(code: &'static str, e: rusqlite::Error) -> HandlerErr {
    HandlerErr {
        code,
        message: e.to_string(),
        details: None,
    }
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| bad_params(format!("missing {}", key)))
}

fn suggestion_to_json(suggestion: &PointSuggestion) -> serde_json::Value {
    serde_json::to_value(suggestion).unwrap_or_else(|_| json!({}))
}

fn parse_now(params: &serde_json::Value) -> Result<DateTime<Utc>, HandlerErr> {
    let Some(raw) = params.get("now") else {
        return Ok(Utc::now());
    };
    if raw.is_null() {
        return Ok(Utc::now());
    }
    let Some(s) = raw.as_str() else {
        return Err(bad_params("now must be an ISO-8601 string"));
    };
    parse_when(s).ok_or_else(|| bad_params("now must be an ISO-8601 string"))
}

/// Runs every active rule against the supplied snapshot, persists whatever
/// fires, and returns the new suggestions. The snapshot itself is never
/// stored; only the outcomes are.
fn suggestions_evaluate(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_str(params, "teacherId")?;
    let Some(snapshot_raw) = params.get("snapshot") else {
        return Err(bad_params("missing snapshot"));
    };
    let snapshot: StudentActivitySnapshot = serde_json::from_value(snapshot_raw.clone())
        .map_err(|e| bad_params(format!("invalid snapshot: {}", e)))?;
    let now = parse_now(params)?;

    let rules = db::load_rules(conn, true).map_err(|e| db_err("db_query_failed", e))?;
    let engine = RuleEngine::new(rules);
    let suggestions = engine.evaluate(&snapshot, &teacher_id, now);

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| db_err("db_tx_failed", e))?;
    for suggestion in &suggestions {
        db::insert_suggestion(&tx, suggestion).map_err(|e| db_err("db_update_failed", e))?;
    }
    tx.commit().map_err(|e| db_err("db_commit_failed", e))?;

    let suggestions_json: Vec<serde_json::Value> =
        suggestions.iter().map(suggestion_to_json).collect();
    Ok(json!({
        "evaluatedRules": engine.rule_count(),
        "suggestions": suggestions_json,
    }))
}

fn suggestions_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = params.get("studentId").and_then(|v| v.as_str());
    let pending_only = params
        .get("pendingOnly")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let mut sql = format!(
        "SELECT {} FROM point_suggestions WHERE 1=1",
        db::SUGGESTION_COLUMNS
    );
    let mut args: Vec<Value> = Vec::new();
    if let Some(student_id) = student_id {
        sql.push_str(" AND student_id = ?");
        args.push(Value::Text(student_id.to_string()));
    }
    if pending_only {
        sql.push_str(" AND is_applied = 0");
    }
    sql.push_str(" ORDER BY created_at, id");

    let mut stmt = conn.prepare(&sql).map_err(|e| db_err("db_query_failed", e))?;
    let suggestions = stmt
        .query_map(params_from_iter(args), db::suggestion_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| db_err("db_query_failed", e))?;

    let suggestions_json: Vec<serde_json::Value> =
        suggestions.iter().map(suggestion_to_json).collect();
    Ok(json!({ "suggestions": suggestions_json }))
}

fn load_suggestion(
    conn: &Connection,
    suggestion_id: &str,
) -> Result<Option<PointSuggestion>, HandlerErr> {
    conn.query_row(
        &format!(
            "SELECT {} FROM point_suggestions WHERE id = ?",
            db::SUGGESTION_COLUMNS
        ),
        [suggestion_id],
        db::suggestion_from_row,
    )
    .optional()
    .map_err(|e| db_err("db_query_failed", e))
}

/// Marks a suggestion applied and hands back the point-award payload. The
/// award itself (crediting the student's balance) happens outside this
/// daemon, in whatever system owns point transactions.
fn suggestions_apply(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let suggestion_id = get_required_str(params, "suggestionId")?;
    let Some(mut suggestion) = load_suggestion(conn, &suggestion_id)? else {
        return Err(HandlerErr {
            code: "not_found",
            message: "suggestion not found".to_string(),
            details: None,
        });
    };
    if suggestion.is_applied {
        return Err(HandlerErr {
            code: "already_applied",
            message: "suggestion has already been applied".to_string(),
            details: None,
        });
    }
    suggestion.is_applied = true;
    suggestion.applied_at = Some(Utc::now().to_rfc3339());
    conn.execute(
        "UPDATE point_suggestions SET is_applied = 1, applied_at = ? WHERE id = ?",
        rusqlite::params![suggestion.applied_at, suggestion.id],
    )
    .map_err(|e| db_err("db_update_failed", e))?;

    Ok(json!({
        "suggestion": suggestion_to_json(&suggestion),
        "pointAward": {
            "studentId": suggestion.student_id,
            "teacherId": suggestion.teacher_id,
            "points": suggestion.suggested_points,
            "reason": suggestion.reason,
        },
    }))
}

fn suggestions_dismiss(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let suggestion_id = get_required_str(params, "suggestionId")?;
    let Some(suggestion) = load_suggestion(conn, &suggestion_id)? else {
        return Err(HandlerErr {
            code: "not_found",
            message: "suggestion not found".to_string(),
            details: None,
        });
    };
    if suggestion.is_applied {
        return Err(HandlerErr {
            code: "already_applied",
            message: "applied suggestions cannot be dismissed".to_string(),
            details: None,
        });
    }
    conn.execute(
        "DELETE FROM point_suggestions WHERE id = ?",
        [&suggestion_id],
    )
    .map_err(|e| db_err("db_update_failed", e))?;
    Ok(json!({ "ok": true }))
}

fn with_db(
    state: &mut AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "suggestions.evaluate" => Some(with_db(state, req, suggestions_evaluate)),
        "suggestions.list" => Some(with_db(state, req, suggestions_list)),
        "suggestions.apply" => Some(with_db(state, req, suggestions_apply)),
        "suggestions.dismiss" => Some(with_db(state, req, suggestions_dismiss)),
        _ => None,
    }
}
