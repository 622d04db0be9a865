// view_store.rs — SQLite-backed goal read model.
//
// The projector hands over keyed partial patches; the adapter resolves
// them against the current row under the connection lock and writes the
// full row back. Replaying the same patch twice lands on the same row,
// which keeps rebuilds safe.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

use waymark_domain::{GoalStatus, GoalView, GoalViewPatch, GoalViewStore};
use waymark_events::StoreError;

use crate::{backend_err, SharedConnection};

const SELECT_COLUMNS: &str = "id, objective, status, version, note, claimed_by, updated_at";

/// The goal view adapter.
pub struct SqliteGoalViews {
    conn: SharedConnection,
}

impl SqliteGoalViews {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn write_row(&self, view: &GoalView) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO goal_views \
             (id, objective, status, version, note, claimed_by, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                view.id,
                view.objective,
                view.status.to_string(),
                view.version,
                view.note,
                view.claimed_by,
                view.updated_at.to_rfc3339(),
            ],
        )
        .map_err(backend_err)?;
        Ok(())
    }
}

fn view_from_row(row: &Row<'_>) -> rusqlite::Result<GoalView> {
    let status_raw: String = row.get(2)?;
    let status = GoalStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unknown status '{status_raw}'").into(),
        )
    })?;

    let updated_raw: String = row.get(6)?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(GoalView {
        id: row.get(0)?,
        objective: row.get(1)?,
        status,
        version: row.get(3)?,
        note: row.get(4)?,
        claimed_by: row.get(5)?,
        updated_at,
    })
}

impl GoalViewStore for SqliteGoalViews {
    fn find_by_id(&self, id: &str) -> Result<Option<GoalView>, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM goal_views WHERE id = ?1"),
            params![id],
            view_from_row,
        )
        .optional()
        .map_err(backend_err)
    }

    fn find_by_status(&self, status: GoalStatus) -> Result<Vec<GoalView>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM goal_views WHERE status = ?1 ORDER BY id"
            ))
            .map_err(backend_err)?;
        let rows = stmt
            .query_map(params![status.to_string()], view_from_row)
            .map_err(backend_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend_err)
    }

    fn list(&self) -> Result<Vec<GoalView>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!("SELECT {SELECT_COLUMNS} FROM goal_views ORDER BY id"))
            .map_err(backend_err)?;
        let rows = stmt.query_map([], view_from_row).map_err(backend_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend_err)
    }

    fn upsert(&self, patch: &GoalViewPatch) -> Result<(), StoreError> {
        let mut view = self.find_by_id(&patch.id)?.unwrap_or_else(|| GoalView {
            id: patch.id.clone(),
            objective: String::new(),
            status: GoalStatus::ToDo,
            version: 0,
            note: None,
            claimed_by: None,
            updated_at: patch.updated_at,
        });

        view.version = patch.version;
        view.updated_at = patch.updated_at;
        if let Some(objective) = &patch.objective {
            view.objective = objective.clone();
        }
        if let Some(status) = patch.status {
            view.status = status;
        }
        patch.note.apply_to(&mut view.note);
        patch.claimed_by.apply_to(&mut view.claimed_by);

        self.write_row(&view)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM goal_views WHERE id = ?1", params![id])
            .map_err(backend_err)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM goal_views", [])
            .map_err(backend_err)?;
        Ok(())
    }
}
