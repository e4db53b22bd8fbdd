//! 分析历史 - SQLite

use rusqlite::{params, Connection, Result as SqliteResult, Row};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// 一次分析的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRecord {
    pub request_id: String,
    pub file_name: String,
    pub source_hash: String,
    pub procedure_count: i64,
    pub edge_count: i64,
    pub code_found: bool,
    /// 写入时由数据库填充
    pub created_at: Option<String>,
}

/// 历史数据库
pub struct History {
    conn: Connection,
}

impl History {
    pub fn open(path: &Path) -> SqliteResult<Self> {
        if let Some(parent) = path.parent() {
            // 目录创建失败时交给 Connection::open 报错
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        let history = Self { conn };
        history.init_schema()?;
        Ok(history)
    }

    pub fn open_in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let history = Self { conn };
        history.init_schema()?;
        Ok(history)
    }

    /// 默认路径 `<data-local-dir>/vbadoc/history.db`
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("vbadoc")
            .join("history.db")
    }

    fn init_schema(&self) -> SqliteResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS analyses (
                id INTEGER PRIMARY KEY,
                request_id TEXT NOT NULL UNIQUE,
                file_name TEXT NOT NULL,
                source_hash TEXT NOT NULL,
                procedure_count INTEGER NOT NULL,
                edge_count INTEGER NOT NULL,
                code_found INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_analyses_hash ON analyses(source_hash);
            "#,
        )?;
        Ok(())
    }

    /// 写入一条记录
    pub fn record(&self, record: &HistoryRecord) -> SqliteResult<i64> {
        self.conn.execute(
            "INSERT INTO analyses (request_id, file_name, source_hash, procedure_count, edge_count, code_found)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                record.request_id,
                record.file_name,
                record.source_hash,
                record.procedure_count,
                record.edge_count,
                record.code_found,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// 最近的记录，新的在前
    pub fn recent(&self, limit: usize) -> SqliteResult<Vec<HistoryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT request_id, file_name, source_hash, procedure_count, edge_count, code_found, created_at
             FROM analyses ORDER BY id DESC LIMIT ?",
        )?;
        let rows = stmt.query_map([limit as i64], Self::from_row)?;
        rows.collect()
    }

    /// 按请求 id 查找
    pub fn find(&self, request_id: &str) -> SqliteResult<Option<HistoryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT request_id, file_name, source_hash, procedure_count, edge_count, code_found, created_at
             FROM analyses WHERE request_id = ?",
        )?;
        match stmt.query_row([request_id], Self::from_row) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 相同源码此前分析过的次数
    pub fn count_by_hash(&self, source_hash: &str) -> SqliteResult<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM analyses WHERE source_hash = ?",
            [source_hash],
            |row| row.get(0),
        )
    }

    fn from_row(row: &Row<'_>) -> SqliteResult<HistoryRecord> {
        Ok(HistoryRecord {
            request_id: row.get(0)?,
            file_name: row.get(1)?,
            source_hash: row.get(2)?,
            procedure_count: row.get(3)?,
            edge_count: row.get(4)?,
            code_found: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}
