use rusqlite::{Connection, Result as SqlResult};
use std::path::{Path, PathBuf};

/// The History catalog records every committed replacement: when it
/// happened, what was replaced, and where the result image was written.
pub struct History {
    conn: Connection,
    db_path: PathBuf,
}

/// One committed edit, newest first in queries.
#[derive(Debug, Clone, PartialEq)]
pub struct EditRecord {
    pub id: i64,
    /// Unix timestamp of the commit
    pub created_at: i64,
    /// Catalog id of the replacement item (e.g. "sofa")
    pub item_id: String,
    /// "furniture" or "decoration"
    pub item_kind: String,
    /// Path of the saved result PNG
    pub result_path: String,
}

impl History {
    /// Create a History instance backed by the default database.
    ///
    /// The database file lives in the user's data directory:
    /// - Linux: ~/.local/share/room-studio/studio.db
    /// - macOS: ~/Library/Application Support/room-studio/studio.db
    /// - Windows: %APPDATA%\room-studio\studio.db
    pub fn new() -> SqlResult<Self> {
        Self::open_at(&Self::default_db_path())
    }

    /// Open (or create) a history database at an explicit path.
    pub fn open_at(db_path: &Path) -> SqlResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .expect("Failed to create application data directory");
        }

        let conn = Connection::open(db_path)?;

        let history = History {
            conn,
            db_path: db_path.to_path_buf(),
        };
        history.init_schema()?;

        Ok(history)
    }

    fn default_db_path() -> PathBuf {
        let mut path = data_dir();
        path.push("studio.db");
        path
    }

    fn init_schema(&self) -> SqlResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS edits (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at      INTEGER NOT NULL,
                item_id         TEXT NOT NULL,
                item_kind       TEXT NOT NULL,
                result_path     TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_edits_created_at
             ON edits(created_at DESC)",
            [],
        )?;

        Ok(())
    }

    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Record a committed replacement. Returns the new row id.
    pub fn record_edit(&self, item_id: &str, item_kind: &str, result_path: &str) -> SqlResult<i64> {
        self.conn.execute(
            "INSERT INTO edits (created_at, item_id, item_kind, result_path)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                chrono::Utc::now().timestamp(),
                item_id,
                item_kind,
                result_path,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn edit_count(&self) -> SqlResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM edits", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Most recent edits, newest first.
    pub fn recent(&self, limit: usize) -> SqlResult<Vec<EditRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at, item_id, item_kind, result_path
             FROM edits ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;

        let record_iter = stmt.query_map([limit], |row| {
            Ok(EditRecord {
                id: row.get(0)?,
                created_at: row.get(1)?,
                item_id: row.get(2)?,
                item_kind: row.get(3)?,
                result_path: row.get(4)?,
            })
        })?;

        let mut records = Vec::new();
        for record in record_iter {
            records.push(record?);
        }

        Ok(records)
    }
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("db_path", &self.db_path)
            .finish()
    }
}

/// Application data directory (history database, saved results).
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_dir()
        .or_else(dirs::home_dir)
        .expect("Could not determine user data directory");
    path.push("room-studio");
    path
}

/// Directory where committed result images are written.
pub fn results_dir() -> PathBuf {
    let mut path = data_dir();
    path.push("results");
    path
}
