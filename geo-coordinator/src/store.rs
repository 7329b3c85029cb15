//! Durable progress store: three logical tables backed by a single SQLite
//! file, matching §4.E's `regions` / `scan_cells` / `scan_meta` schema.

use std::path::Path;

use rusqlite::{params, Connection};

use crate::registry::{RegionState, RegionStatus};
use crate::CoordinatorError;

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, CoordinatorError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, CoordinatorError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), CoordinatorError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS regions (
                key TEXT PRIMARY KEY,
                region_x INTEGER NOT NULL,
                region_y INTEGER NOT NULL,
                status TEXT NOT NULL,
                total_cells INTEGER NOT NULL,
                scanned_cells INTEGER NOT NULL,
                assigned_worker TEXT NOT NULL,
                started_at REAL NOT NULL,
                completed_at REAL NOT NULL,
                error TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS scan_cells (
                region_key TEXT NOT NULL,
                cell_x INTEGER NOT NULL,
                cell_y INTEGER NOT NULL,
                height INTEGER NOT NULL,
                nswe INTEGER NOT NULL,
                PRIMARY KEY (region_key, cell_x, cell_y)
            );
            CREATE TABLE IF NOT EXISTS scan_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    pub fn load_regions(&self) -> Result<Vec<RegionState>, CoordinatorError> {
        let mut stmt = self.conn.prepare(
            "SELECT region_x, region_y, status, total_cells, scanned_cells,
                    assigned_worker, started_at, completed_at, error
             FROM regions",
        )?;
        let rows = stmt.query_map([], |row| {
            let status: String = row.get(2)?;
            Ok(RegionState {
                region_x: row.get(0)?,
                region_y: row.get(1)?,
                status: RegionStatus::parse(&status).unwrap_or(RegionStatus::Pending),
                total_cells: row.get(3)?,
                scanned_cells: row.get(4)?,
                assigned_worker: row.get(5)?,
                started_at: row.get(6)?,
                completed_at: row.get(7)?,
                error: row.get(8)?,
            })
        })?;

        let mut regions = Vec::new();
        for row in rows {
            regions.push(row?);
        }
        Ok(regions)
    }

    pub fn persist_region(&self, region: &RegionState) -> Result<(), CoordinatorError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO regions
                (key, region_x, region_y, status, total_cells, scanned_cells,
                 assigned_worker, started_at, completed_at, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                region.key(),
                region.region_x,
                region.region_y,
                region.status.as_str(),
                region.total_cells,
                region.scanned_cells,
                region.assigned_worker,
                region.started_at,
                region.completed_at,
                region.error,
            ],
        )?;
        Ok(())
    }

    pub fn record_cell(
        &self,
        region_key: &str,
        cell_x: i64,
        cell_y: i64,
        height: i16,
        nswe: u8,
    ) -> Result<(), CoordinatorError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO scan_cells (region_key, cell_x, cell_y, height, nswe)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![region_key, cell_x, cell_y, height, nswe],
        )?;
        Ok(())
    }

    pub fn load_scanned_cells(
        &self,
        region_key: &str,
    ) -> Result<Vec<(i64, i64, i16, u8)>, CoordinatorError> {
        let mut stmt = self.conn.prepare(
            "SELECT cell_x, cell_y, height, nswe FROM scan_cells WHERE region_key = ?1",
        )?;
        let rows = stmt.query_map(params![region_key], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?;

        let mut cells = Vec::new();
        for row in rows {
            cells.push(row?);
        }
        Ok(cells)
    }

    pub fn set_scan_config(&self, scan_mode: &str, step: u32) -> Result<(), CoordinatorError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO scan_meta (key, value) VALUES ('scan_mode', ?1)",
            params![scan_mode],
        )?;
        self.conn.execute(
            "INSERT OR REPLACE INTO scan_meta (key, value) VALUES ('step', ?1)",
            params![step.to_string()],
        )?;
        Ok(())
    }

    pub fn load_scan_config(&self) -> Result<Option<(String, u32)>, CoordinatorError> {
        let mode: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM scan_meta WHERE key = 'scan_mode'",
                [],
                |row| row.get(0),
            )
            .ok();
        let step: Option<u32> = self
            .conn
            .query_row("SELECT value FROM scan_meta WHERE key = 'step'", [], |row| {
                row.get::<_, String>(0)
            })
            .ok()
            .and_then(|s: String| s.parse().ok());

        Ok(mode.zip(step))
    }

    /// Truncates all three tables.
    pub fn reset(&self) -> Result<(), CoordinatorError> {
        self.conn.execute_batch(
            "DELETE FROM regions; DELETE FROM scan_cells; DELETE FROM scan_meta;",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_region_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let mut region = RegionState::new(22, 16, 65536);
        region.status = RegionStatus::Scanning;
        region.assigned_worker = "scanner01".to_string();

        store.persist_region(&region).unwrap();
        let loaded = store.load_regions().unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].key(), "22_16");
        assert_eq!(loaded[0].status, RegionStatus::Scanning);
        assert_eq!(loaded[0].assigned_worker, "scanner01");
    }

    #[test]
    fn scan_cells_upsert_on_conflict() {
        let store = Store::open_in_memory().unwrap();
        store.record_cell("22_16", 3, 4, 100, 0xFF).unwrap();
        store.record_cell("22_16", 3, 4, 200, 0x0F).unwrap();

        let cells = store.load_scanned_cells("22_16").unwrap();
        assert_eq!(cells, vec![(3, 4, 200, 0x0F)]);
    }

    #[test]
    fn reset_truncates_all_tables() {
        let store = Store::open_in_memory().unwrap();
        store.persist_region(&RegionState::new(0, 0, 1)).unwrap();
        store.record_cell("0_0", 0, 0, 0, 0xFF).unwrap();
        store.set_scan_config("cell", 1).unwrap();

        store.reset().unwrap();

        assert!(store.load_regions().unwrap().is_empty());
        assert!(store.load_scanned_cells("0_0").unwrap().is_empty());
        assert!(store.load_scan_config().unwrap().is_none());
    }
}
