use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::rules::{PointRule, RuleCondition, RuleParameters, RuleTrigger};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

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

fn parse_parameters(raw: Option<&serde_json::Value>) -> Result<RuleParameters, HandlerErr> {
    let Some(raw) = raw else {
        return Ok(RuleParameters::default());
    };
    if raw.is_null() {
        return Ok(RuleParameters::default());
    }
    serde_json::from_value(raw.clone())
        .map_err(|e| bad_params(format!("invalid parameters: {}", e)))
}

fn parse_trigger(raw: Option<&serde_json::Value>) -> Result<RuleTrigger, HandlerErr> {
    let Some(raw) = raw else {
        return Ok(RuleTrigger::TeacherSuggestion);
    };
    let Some(s) = raw.as_str() else {
        return Err(bad_params("trigger must be a string"));
    };
    RuleTrigger::parse(s)
        .ok_or_else(|| bad_params("trigger must be automatic or teacher_suggestion"))
}

pub fn rule_to_json(rule: &PointRule) -> serde_json::Value {
    json!({
        "id": rule.id,
        "name": rule.name,
        "description": rule.description,
        "condition": rule.condition.as_str(),
        "pointValue": rule.point_value,
        "trigger": rule.trigger.as_str(),
        "isActive": rule.is_active,
        "createdBy": rule.created_by,
        "createdAt": rule.created_at,
        "updatedAt": rule.updated_at,
        "parameters": serde_json::to_value(&rule.parameters).unwrap_or_else(|_| json!({})),
    })
}

fn rules_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let condition_raw = get_required_str(params, "condition")?;
    let point_value = params
        .get("pointValue")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| bad_params("missing pointValue"))?;
    let description = params
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let trigger = parse_trigger(params.get("trigger"))?;
    let is_active = params
        .get("isActive")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    let created_by = params
        .get("createdBy")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let parameters = parse_parameters(params.get("parameters"))?;

    let now = Utc::now().to_rfc3339();
    let rule = PointRule {
        id: Uuid::new_v4().to_string(),
        name,
        description,
        condition: RuleCondition::parse(&condition_raw),
        point_value,
        trigger,
        is_active,
        created_by,
        created_at: now.clone(),
        updated_at: now,
        parameters,
    };
    db::insert_rule(conn, &rule).map_err(|e| db_err("db_update_failed", e))?;
    Ok(json!({ "rule": rule_to_json(&rule) }))
}

fn rules_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let active_only = params
        .get("activeOnly")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let rules = db::load_rules(conn, active_only).map_err(|e| db_err("db_query_failed", e))?;
    let rules_json: Vec<serde_json::Value> = rules.iter().map(rule_to_json).collect();
    Ok(json!({ "rules": rules_json }))
}

fn load_rule(conn: &Connection, rule_id: &str) -> Result<Option<PointRule>, HandlerErr> {
    conn.query_row(
        &format!("SELECT {} FROM point_rules WHERE id = ?", db::RULE_COLUMNS),
        [rule_id],
        db::rule_from_row,
    )
    .optional()
    .map_err(|e| db_err("db_query_failed", e))
}

fn rules_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let rule_id = get_required_str(params, "ruleId")?;
    let Some(mut rule) = load_rule(conn, &rule_id)? else {
        return Err(HandlerErr {
            code: "not_found",
            message: "rule not found".to_string(),
            details: None,
        });
    };
    let patch = params.get("patch").cloned().unwrap_or_else(|| json!({}));

    if let Some(name) = patch.get("name").and_then(|v| v.as_str()) {
        rule.name = name.to_string();
    }
    if let Some(description) = patch.get("description").and_then(|v| v.as_str()) {
        rule.description = description.to_string();
    }
    if let Some(condition) = patch.get("condition").and_then(|v| v.as_str()) {
        rule.condition = RuleCondition::parse(condition);
    }
    if let Some(point_value) = patch.get("pointValue").and_then(|v| v.as_i64()) {
        rule.point_value = point_value;
    }
    if patch.get("trigger").is_some() {
        rule.trigger = parse_trigger(patch.get("trigger"))?;
    }
    if let Some(is_active) = patch.get("isActive").and_then(|v| v.as_bool()) {
        rule.is_active = is_active;
    }
    if patch.get("parameters").is_some() {
        rule.parameters = parse_parameters(patch.get("parameters"))?;
    }
    rule.updated_at = Utc::now().to_rfc3339();

    let parameters =
        serde_json::to_string(&rule.parameters).unwrap_or_else(|_| "{}".to_string());
    conn.execute(
        "UPDATE point_rules SET name = ?, description = ?, condition = ?, point_value = ?,
             trigger_type = ?, is_active = ?, updated_at = ?, parameters = ?
         WHERE id = ?",
        rusqlite::params![
            rule.name,
            rule.description,
            rule.condition.as_str(),
            rule.point_value,
            rule.trigger.as_str(),
            rule.is_active as i64,
            rule.updated_at,
            parameters,
            rule.id,
        ],
    )
    .map_err(|e| db_err("db_update_failed", e))?;
    Ok(json!({ "rule": rule_to_json(&rule) }))
}

fn rules_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let rule_id = get_required_str(params, "ruleId")?;
    if load_rule(conn, &rule_id)?.is_none() {
        return Err(HandlerErr {
            code: "not_found",
            message: "rule not found".to_string(),
            details: None,
        });
    }
    let tx = conn.unchecked_transaction().map_err(|e| db_err("db_tx_failed", e))?;
    tx.execute("DELETE FROM point_suggestions WHERE rule_id = ?", [&rule_id])
        .map_err(|e| db_err("db_update_failed", e))?;
    tx.execute("DELETE FROM point_rules WHERE id = ?", [&rule_id])
        .map_err(|e| db_err("db_update_failed", e))?;
    tx.commit().map_err(|e| db_err("db_commit_failed", e))?;
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
        "rules.create" => Some(with_db(state, req, rules_create)),
        "rules.list" => Some(with_db(state, req, rules_list)),
        "rules.update" => Some(with_db(state, req, rules_update)),
        "rules.delete" => Some(with_db(state, req, rules_delete)),
        _ => None,
    }
}
