use rusqlite::{Connection, Row};
use std::path::Path;

use crate::rules::{PointRule, PointSuggestion, RuleCondition, RuleParameters, RuleTrigger};

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("gradepoint.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS point_rules(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            condition TEXT NOT NULL,
            point_value INTEGER NOT NULL,
            trigger_type TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            parameters TEXT NOT NULL DEFAULT '{}'
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_point_rules_active ON point_rules(is_active)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS point_suggestions(
            id TEXT PRIMARY KEY,
            rule_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            teacher_id TEXT NOT NULL,
            reason TEXT NOT NULL,
            suggested_points INTEGER NOT NULL,
            is_applied INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            applied_at TEXT,
            FOREIGN KEY(rule_id) REFERENCES point_rules(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_point_suggestions_rule ON point_suggestions(rule_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_point_suggestions_student ON point_suggestions(student_id)",
        [],
    )?;

    Ok(conn)
}

// "trigger" is a sqlite keyword, hence trigger_type.
pub const RULE_COLUMNS: &str = "id, name, description, condition, point_value, trigger_type, \
     is_active, created_by, created_at, updated_at, parameters";

pub fn rule_from_row(row: &Row) -> rusqlite::Result<PointRule> {
    let condition_raw: String = row.get(3)?;
    let trigger_raw: String = row.get(5)?;
    let parameters_raw: String = row.get(10)?;
    let parameters: RuleParameters = serde_json::from_str(&parameters_raw).unwrap_or_default();
    Ok(PointRule {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        condition: RuleCondition::parse(&condition_raw),
        point_value: row.get(4)?,
        trigger: RuleTrigger::parse(&trigger_raw).unwrap_or(RuleTrigger::TeacherSuggestion),
        is_active: row.get::<_, i64>(6)? != 0,
        created_by: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        parameters,
    })
}

pub fn load_rules(conn: &Connection, active_only: bool) -> rusqlite::Result<Vec<PointRule>> {
    let sql = if active_only {
        format!(
            "SELECT {} FROM point_rules WHERE is_active = 1 ORDER BY created_at, id",
            RULE_COLUMNS
        )
    } else {
        format!(
            "SELECT {} FROM point_rules ORDER BY created_at, id",
            RULE_COLUMNS
        )
    };
    let mut stmt = conn.prepare(&sql)?;
    let rules = stmt.query_map([], rule_from_row)?.collect();
    rules
}

pub fn insert_rule(conn: &Connection, rule: &PointRule) -> rusqlite::Result<()> {
    let parameters = serde_json::to_string(&rule.parameters).unwrap_or_else(|_| "{}".to_string());
    conn.execute(
        "INSERT INTO point_rules(id, name, description, condition, point_value, trigger_type,
             is_active, created_by, created_at, updated_at, parameters)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            rule.id,
            rule.name,
            rule.description,
            rule.condition.as_str(),
            rule.point_value,
            rule.trigger.as_str(),
            rule.is_active as i64,
            rule.created_by,
            rule.created_at,
            rule.updated_at,
            parameters,
        ],
    )?;
    Ok(())
}

pub const SUGGESTION_COLUMNS: &str =
    "id, rule_id, student_id, teacher_id, reason, suggested_points, is_applied, created_at, applied_at";

pub fn suggestion_from_row(row: &Row) -> rusqlite::Result<PointSuggestion> {
    Ok(PointSuggestion {
        id: row.get(0)?,
        rule_id: row.get(1)?,
        student_id: row.get(2)?,
        teacher_id: row.get(3)?,
        reason: row.get(4)?,
        suggested_points: row.get(5)?,
        is_applied: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
        applied_at: row.get(8)?,
    })
}

pub fn insert_suggestion(conn: &Connection, suggestion: &PointSuggestion) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO point_suggestions(id, rule_id, student_id, teacher_id, reason,
             suggested_points, is_applied, created_at, applied_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            suggestion.id,
            suggestion.rule_id,
            suggestion.student_id,
            suggestion.teacher_id,
            suggestion.reason,
            suggestion.suggested_points,
            suggestion.is_applied as i64,
            suggestion.created_at,
            suggestion.applied_at,
        ],
    )?;
    Ok(())
}
