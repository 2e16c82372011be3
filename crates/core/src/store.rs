//! Durable, normalized store (C8) backed by `rusqlite` (bundled SQLite).
//!
//! Schema and public API are the literal table/method list of spec.md §4.8,
//! which is itself the schema `original_source/orc/storage/graph_db.py`
//! already establishes in `_init_db`. Overlay tables are normalized with a
//! `file_path` foreign key plus a `data_json` column carrying the
//! overlay-specific fields, the same blob-alongside-indexed-columns shape
//! the original uses for `extras_json`/`metadata_json`.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;

use crate::error::{OrcError, OrcResult};
use crate::model::{
    ApiEndpoint, ClassRecord, ConcurrencyPattern, ConfigUsage, CrossCuttingConcern, DataModel,
    DatabaseQuery, ErrorHandler, ExportKind, ExportRecord, FileRecord, FunctionRecord,
    ManifestEntry, ParseResult, ResolvedDependencies, SecurityRisk, SideEffect,
};

/// The nine semantic overlay tables, in the order spec.md §4.8 lists them.
const OVERLAY_TABLES: &[&str] = &[
    "api_endpoints",
    "database_queries",
    "error_handlers",
    "config_usage",
    "side_effects",
    "cross_cutting_concerns",
    "security_risks",
    "data_models",
    "concurrency_patterns",
];

pub struct Store {
    conn: Mutex<Connection>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    pub total_files: u64,
    pub total_functions: u64,
    pub total_classes: u64,
    pub by_language: Vec<(String, u64)>,
    pub average_complexity: f64,
    pub max_complexity: u32,
}

#[derive(Debug, Clone)]
pub struct FunctionQueryRow {
    pub id: String,
    pub file_path: String,
    pub name: String,
    pub language: String,
    pub line_start: u32,
    pub line_end: u32,
    pub complexity: u32,
}

#[derive(Debug, Clone)]
pub struct ClassQueryRow {
    pub id: String,
    pub file_path: String,
    pub name: String,
    pub language: String,
}

#[derive(Debug, Clone)]
pub struct SymbolMatch {
    pub kind: String,
    pub name: String,
    pub file: String,
    pub language: Option<String>,
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,
}

impl Store {
    pub fn open(db_path: &Path) -> OrcResult<Store> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path).map_err(|e| OrcError::store(e.to_string()))?;
        let store = Store { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn in_memory() -> OrcResult<Store> {
        let conn = Connection::open_in_memory().map_err(|e| OrcError::store(e.to_string()))?;
        let store = Store { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> OrcResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS file_index (
                path TEXT PRIMARY KEY,
                language TEXT,
                framework TEXT,
                loc INTEGER,
                last_modified REAL,
                hash TEXT,
                metadata_json TEXT
            );
            CREATE TABLE IF NOT EXISTS function_index (
                id TEXT PRIMARY KEY,
                file_path TEXT NOT NULL,
                name TEXT NOT NULL,
                language TEXT,
                line_start INTEGER,
                line_end INTEGER,
                complexity INTEGER,
                calls_json TEXT,
                extras_json TEXT
            );
            CREATE TABLE IF NOT EXISTS class_index (
                id TEXT PRIMARY KEY,
                file_path TEXT NOT NULL,
                name TEXT NOT NULL,
                language TEXT,
                bases_json TEXT,
                extras_json TEXT
            );
            CREATE TABLE IF NOT EXISTS import_index (
                file_path TEXT NOT NULL,
                module TEXT NOT NULL,
                count INTEGER DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS export_index (
                file_path TEXT NOT NULL,
                symbol TEXT NOT NULL,
                kind TEXT
            );
            CREATE TABLE IF NOT EXISTS index_manifest (
                path TEXT PRIMARY KEY,
                language TEXT,
                last_modified REAL,
                hash TEXT,
                last_indexed_at REAL
            );
            CREATE TABLE IF NOT EXISTS graphs (
                graph_type TEXT PRIMARY KEY,
                data BLOB NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_function_index_file ON function_index(file_path);
            CREATE INDEX IF NOT EXISTS idx_class_index_file ON class_index(file_path);
            CREATE INDEX IF NOT EXISTS idx_import_index_file ON import_index(file_path);
            CREATE INDEX IF NOT EXISTS idx_export_index_file ON export_index(file_path);
            ",
        )
        .map_err(|e| OrcError::store(e.to_string()))?;

        for table in OVERLAY_TABLES {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                        file_path TEXT NOT NULL,
                        line INTEGER,
                        data_json TEXT NOT NULL
                    )"
                ),
                [],
            )
            .map_err(|e| OrcError::store(e.to_string()))?;
            conn.execute(
                &format!("CREATE INDEX IF NOT EXISTS idx_{table}_file ON {table}(file_path)"),
                [],
            )
            .map_err(|e| OrcError::store(e.to_string()))?;
        }

        Ok(())
    }

    pub fn upsert_file_index(&self, file: &FileRecord) -> OrcResult<()> {
        let conn = self.conn.lock().unwrap();
        let metadata_json = serde_json::to_string(&file.metadata).map_err(|e| OrcError::store(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO file_index
             (path, language, framework, loc, last_modified, hash, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                file.path,
                file.language.as_str(),
                file.framework,
                file.loc,
                file.last_modified,
                file.content_hash,
                metadata_json,
            ],
        )
        .map_err(|e| OrcError::store(e.to_string()))?;
        Ok(())
    }

    pub fn bulk_upsert_functions(&self, functions: &std::collections::BTreeMap<String, FunctionRecord>) -> OrcResult<()> {
        if functions.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| OrcError::store(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO function_index
                     (id, file_path, name, language, line_start, line_end, complexity, calls_json, extras_json)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .map_err(|e| OrcError::store(e.to_string()))?;
            for func in functions.values() {
                let calls_json = serde_json::to_string(&func.calls).map_err(|e| OrcError::store(e.to_string()))?;
                let extras = serde_json::json!({
                    "parameters": func.parameters,
                    "docstring": func.docstring,
                    "is_exported": func.is_exported,
                    "is_async": func.is_async,
                    "return_type": func.return_type,
                    "decorators": func.decorators,
                });
                stmt.execute(params![
                    func.id,
                    func.file_path,
                    func.name,
                    func.language.as_str(),
                    func.line_start,
                    func.line_end,
                    func.complexity,
                    calls_json,
                    extras.to_string(),
                ])
                .map_err(|e| OrcError::store(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| OrcError::store(e.to_string()))?;
        Ok(())
    }

    pub fn bulk_upsert_classes(&self, classes: &std::collections::BTreeMap<String, ClassRecord>) -> OrcResult<()> {
        if classes.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| OrcError::store(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO class_index
                     (id, file_path, name, language, bases_json, extras_json)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(|e| OrcError::store(e.to_string()))?;
            for class in classes.values() {
                let bases_json = serde_json::to_string(&class.bases).map_err(|e| OrcError::store(e.to_string()))?;
                let extras = serde_json::json!({
                    "methods": class.methods,
                    "docstring": class.docstring,
                    "decorators": class.decorators,
                    "line_start": class.line_start,
                    "line_end": class.line_end,
                });
                stmt.execute(params![
                    class.id,
                    class.file_path,
                    class.name,
                    class.language.as_str(),
                    bases_json,
                    extras.to_string(),
                ])
                .map_err(|e| OrcError::store(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| OrcError::store(e.to_string()))?;
        Ok(())
    }

    pub fn bulk_upsert_imports(&self, file_path: &str, imports: &std::collections::BTreeMap<String, u64>) -> OrcResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| OrcError::store(e.to_string()))?;
        tx.execute("DELETE FROM import_index WHERE file_path = ?1", params![file_path])
            .map_err(|e| OrcError::store(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare("INSERT INTO import_index (file_path, module, count) VALUES (?1, ?2, ?3)")
                .map_err(|e| OrcError::store(e.to_string()))?;
            for (module, count) in imports {
                stmt.execute(params![file_path, module, count]).map_err(|e| OrcError::store(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| OrcError::store(e.to_string()))?;
        Ok(())
    }

    pub fn bulk_upsert_exports(&self, file_path: &str, exports: &std::collections::BTreeMap<String, ExportRecord>) -> OrcResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| OrcError::store(e.to_string()))?;
        tx.execute("DELETE FROM export_index WHERE file_path = ?1", params![file_path])
            .map_err(|e| OrcError::store(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare("INSERT INTO export_index (file_path, symbol, kind) VALUES (?1, ?2, ?3)")
                .map_err(|e| OrcError::store(e.to_string()))?;
            for (symbol, record) in exports {
                let kind = match record.kind {
                    ExportKind::Function => "function",
                    ExportKind::Class => "class",
                    ExportKind::Default => "default",
                };
                stmt.execute(params![file_path, symbol, kind]).map_err(|e| OrcError::store(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| OrcError::store(e.to_string()))?;
        Ok(())
    }

    fn bulk_upsert_overlay<T: Serialize>(&self, table: &str, file_path: &str, rows: &[T], line_of: impl Fn(&T) -> u32) -> OrcResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| OrcError::store(e.to_string()))?;
        tx.execute(&format!("DELETE FROM {table} WHERE file_path = ?1"), params![file_path])
            .map_err(|e| OrcError::store(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare(&format!("INSERT INTO {table} (file_path, line, data_json) VALUES (?1, ?2, ?3)"))
                .map_err(|e| OrcError::store(e.to_string()))?;
            for row in rows {
                let data_json = serde_json::to_string(row).map_err(|e| OrcError::store(e.to_string()))?;
                stmt.execute(params![file_path, line_of(row), data_json]).map_err(|e| OrcError::store(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| OrcError::store(e.to_string()))?;
        Ok(())
    }

    /// Applies one file's full parsed overlay set, replacing any previous
    /// rows for that file across all nine overlay tables.
    pub fn bulk_upsert_overlays_for_file(
        &self,
        file_path: &str,
        api_endpoints: &[ApiEndpoint],
        database_queries: &[DatabaseQuery],
        error_handlers: &[ErrorHandler],
        config_usage: &[ConfigUsage],
        side_effects: &[SideEffect],
        cross_cutting_concerns: &[CrossCuttingConcern],
        security_risks: &[SecurityRisk],
        data_models: &[DataModel],
        concurrency_patterns: &[ConcurrencyPattern],
    ) -> OrcResult<()> {
        self.bulk_upsert_overlay("api_endpoints", file_path, api_endpoints, |r| r.line)?;
        self.bulk_upsert_overlay("database_queries", file_path, database_queries, |r| r.line)?;
        self.bulk_upsert_overlay("error_handlers", file_path, error_handlers, |r| r.line)?;
        self.bulk_upsert_overlay("config_usage", file_path, config_usage, |r| r.line)?;
        self.bulk_upsert_overlay("side_effects", file_path, side_effects, |r| r.line)?;
        self.bulk_upsert_overlay("cross_cutting_concerns", file_path, cross_cutting_concerns, |r| r.line)?;
        self.bulk_upsert_overlay("security_risks", file_path, security_risks, |r| r.line)?;
        self.bulk_upsert_overlay("data_models", file_path, data_models, |r| r.line)?;
        self.bulk_upsert_overlay("concurrency_patterns", file_path, concurrency_patterns, |r| r.line)?;
        Ok(())
    }

    /// Cascading delete of every row touching `path`, across function/class/
    /// import/export/overlay/file/manifest tables.
    pub fn clear_file_index_for_path(&self, path: &str) -> OrcResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM function_index WHERE file_path = ?1", params![path])
            .map_err(|e| OrcError::store(e.to_string()))?;
        conn.execute("DELETE FROM class_index WHERE file_path = ?1", params![path])
            .map_err(|e| OrcError::store(e.to_string()))?;
        conn.execute("DELETE FROM import_index WHERE file_path = ?1", params![path])
            .map_err(|e| OrcError::store(e.to_string()))?;
        conn.execute("DELETE FROM export_index WHERE file_path = ?1", params![path])
            .map_err(|e| OrcError::store(e.to_string()))?;
        for table in OVERLAY_TABLES {
            conn.execute(&format!("DELETE FROM {table} WHERE file_path = ?1"), params![path])
                .map_err(|e| OrcError::store(e.to_string()))?;
        }
        conn.execute("DELETE FROM file_index WHERE path = ?1", params![path])
            .map_err(|e| OrcError::store(e.to_string()))?;
        Ok(())
    }

    // --- Manifest helpers -------------------------------------------------

    pub fn get_manifest_entry(&self, path: &str) -> OrcResult<Option<ManifestEntry>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT path, language, last_modified, hash, last_indexed_at FROM index_manifest WHERE path = ?1",
            params![path],
            |row| {
                let language: String = row.get(1)?;
                Ok(ManifestEntry {
                    path: row.get(0)?,
                    language: crate::model::Language::from_name(&language),
                    last_modified: row.get(2)?,
                    hash: row.get(3)?,
                    last_indexed_at: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(|e| OrcError::store(e.to_string()))
    }

    pub fn iter_manifest_paths(&self) -> OrcResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT path FROM index_manifest").map_err(|e| OrcError::store(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| OrcError::store(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| OrcError::store(e.to_string()))
    }

    pub fn upsert_manifest_entry(&self, entry: &ManifestEntry) -> OrcResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO index_manifest (path, language, last_modified, hash, last_indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![entry.path, entry.language.as_str(), entry.last_modified, entry.content_hash, entry.last_indexed_at],
        )
        .map_err(|e| OrcError::store(e.to_string()))?;
        Ok(())
    }

    pub fn delete_manifest_entry(&self, path: &str) -> OrcResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM index_manifest WHERE path = ?1", params![path]).map_err(|e| OrcError::store(e.to_string()))?;
        Ok(())
    }

    // --- Search and query --------------------------------------------------

    pub fn search_symbols(&self, query: &str, limit: usize) -> OrcResult<Vec<SymbolMatch>> {
        let conn = self.conn.lock().unwrap();
        let needle = format!("%{}%", query.to_lowercase());
        let mut results = Vec::new();

        let mut stmt = conn
            .prepare(
                "SELECT name, file_path, language, line_start, line_end FROM function_index
                 WHERE lower(name) LIKE ?1 LIMIT ?2",
            )
            .map_err(|e| OrcError::store(e.to_string()))?;
        let rows = stmt
            .query_map(params![needle, limit as i64], |row| {
                Ok(SymbolMatch {
                    kind: "function".into(),
                    name: row.get(0)?,
                    file: row.get(1)?,
                    language: row.get(2)?,
                    line_start: row.get(3)?,
                    line_end: row.get(4)?,
                })
            })
            .map_err(|e| OrcError::store(e.to_string()))?;
        for row in rows {
            results.push(row.map_err(|e| OrcError::store(e.to_string()))?);
        }

        let remaining = limit.saturating_sub(results.len());
        if remaining > 0 {
            let mut stmt = conn
                .prepare("SELECT name, file_path, language FROM class_index WHERE lower(name) LIKE ?1 LIMIT ?2")
                .map_err(|e| OrcError::store(e.to_string()))?;
            let rows = stmt
                .query_map(params![needle, remaining as i64], |row| {
                    Ok(SymbolMatch {
                        kind: "class".into(),
                        name: row.get(0)?,
                        file: row.get(1)?,
                        language: row.get(2)?,
                        line_start: None,
                        line_end: None,
                    })
                })
                .map_err(|e| OrcError::store(e.to_string()))?;
            for row in rows {
                results.push(row.map_err(|e| OrcError::store(e.to_string()))?);
            }
        }

        let remaining = limit.saturating_sub(results.len());
        if remaining > 0 {
            let mut stmt = conn
                .prepare("SELECT path, language FROM file_index WHERE lower(path) LIKE ?1 LIMIT ?2")
                .map_err(|e| OrcError::store(e.to_string()))?;
            let rows = stmt
                .query_map(params![needle, remaining as i64], |row| {
                    let path: String = row.get(0)?;
                    Ok(SymbolMatch {
                        kind: "file".into(),
                        name: path.clone(),
                        file: path,
                        language: row.get(1)?,
                        line_start: None,
                        line_end: None,
                    })
                })
                .map_err(|e| OrcError::store(e.to_string()))?;
            for row in rows {
                results.push(row.map_err(|e| OrcError::store(e.to_string()))?);
            }
        }

        Ok(results)
    }

    pub fn query_functions(
        &self,
        pattern: Option<&str>,
        min_complexity: Option<u32>,
        file_pattern: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> OrcResult<Vec<FunctionQueryRow>> {
        let conn = self.conn.lock().unwrap();
        let like_pattern = pattern.map(|p| format!("%{}%", p.to_lowercase()));
        let like_file = file_pattern.map(|p| format!("%{p}%"));

        let mut stmt = conn
            .prepare(
                "SELECT id, file_path, name, language, line_start, line_end, complexity FROM function_index
                 WHERE (:pat IS NULL OR lower(name) LIKE :pat)
                   AND (:mc IS NULL OR complexity >= :mc)
                   AND (:fp IS NULL OR file_path LIKE :fp)
                 ORDER BY complexity DESC LIMIT :lim OFFSET :off",
            )
            .map_err(|e| OrcError::store(e.to_string()))?;

        let rows = stmt
            .query_map(
                rusqlite::named_params! {
                    ":pat": like_pattern,
                    ":mc": min_complexity,
                    ":fp": like_file,
                    ":lim": limit as i64,
                    ":off": offset as i64,
                },
                |row| {
                    Ok(FunctionQueryRow {
                        id: row.get(0)?,
                        file_path: row.get(1)?,
                        name: row.get(2)?,
                        language: row.get(3)?,
                        line_start: row.get(4)?,
                        line_end: row.get(5)?,
                        complexity: row.get(6)?,
                    })
                },
            )
            .map_err(|e| OrcError::store(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| OrcError::store(e.to_string()))
    }

    pub fn query_classes(&self, pattern: Option<&str>, limit: usize, offset: usize) -> OrcResult<Vec<ClassQueryRow>> {
        let conn = self.conn.lock().unwrap();
        let like_pattern = pattern.map(|p| format!("%{}%", p.to_lowercase()));
        let mut stmt = conn
            .prepare("SELECT id, file_path, name, language FROM class_index WHERE (:p IS NULL OR lower(name) LIKE :p) ORDER BY name LIMIT :lim OFFSET :off")
            .map_err(|e| OrcError::store(e.to_string()))?;
        let rows = stmt
            .query_map(
                rusqlite::named_params! { ":p": like_pattern, ":lim": limit as i64, ":off": offset as i64 },
                |row| {
                    Ok(ClassQueryRow { id: row.get(0)?, file_path: row.get(1)?, name: row.get(2)?, language: row.get(3)? })
                },
            )
            .map_err(|e| OrcError::store(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| OrcError::store(e.to_string()))
    }

    pub fn query_files(&self, pattern: Option<&str>, limit: usize, offset: usize) -> OrcResult<Vec<FileRecord>> {
        let conn = self.conn.lock().unwrap();
        let like_pattern = pattern.map(|p| format!("%{p}%"));
        let mut stmt = conn
            .prepare(
                "SELECT path, language, framework, loc, last_modified, hash, metadata_json FROM file_index
                 WHERE (:p IS NULL OR path LIKE :p) ORDER BY path LIMIT :lim OFFSET :off",
            )
            .map_err(|e| OrcError::store(e.to_string()))?;
        let rows = stmt
            .query_map(
                rusqlite::named_params! { ":p": like_pattern, ":lim": limit as i64, ":off": offset as i64 },
                |row| {
                    let language: String = row.get(1)?;
                    let metadata_json: String = row.get(6)?;
                    Ok((row.get::<_, String>(0)?, language, row.get::<_, Option<String>>(2)?, row.get::<_, u64>(3)?, row.get::<_, f64>(4)?, row.get::<_, String>(5)?, metadata_json))
                },
            )
            .map_err(|e| OrcError::store(e.to_string()))?;

        let mut files = Vec::new();
        for row in rows {
            let (path, language, framework, loc, last_modified, hash, metadata_json) = row.map_err(|e| OrcError::store(e.to_string()))?;
            let metadata: std::collections::BTreeMap<String, Value> = serde_json::from_str(&metadata_json).unwrap_or_default();
            files.push(FileRecord {
                path,
                language: crate::model::Language::from_name(&language),
                loc,
                framework,
                content_hash: hash,
                last_modified,
                metadata,
            });
        }
        Ok(files)
    }

    pub fn get_complex_functions(&self, threshold: u32) -> OrcResult<Vec<FunctionQueryRow>> {
        self.query_functions(None, Some(threshold), None, usize::MAX / 2, 0)
    }

    pub fn get_statistics(&self) -> OrcResult<Statistics> {
        let conn = self.conn.lock().unwrap();
        let total_files: u64 = conn.query_row("SELECT COUNT(*) FROM file_index", [], |r| r.get(0)).map_err(|e| OrcError::store(e.to_string()))?;
        let total_functions: u64 = conn.query_row("SELECT COUNT(*) FROM function_index", [], |r| r.get(0)).map_err(|e| OrcError::store(e.to_string()))?;
        let total_classes: u64 = conn.query_row("SELECT COUNT(*) FROM class_index", [], |r| r.get(0)).map_err(|e| OrcError::store(e.to_string()))?;

        let (average_complexity, max_complexity): (Option<f64>, Option<u32>) = conn
            .query_row("SELECT AVG(complexity), MAX(complexity) FROM function_index", [], |r| Ok((r.get(0)?, r.get(1)?)))
            .map_err(|e| OrcError::store(e.to_string()))?;

        let mut stmt = conn
            .prepare("SELECT language, COUNT(*) FROM file_index GROUP BY language ORDER BY language")
            .map_err(|e| OrcError::store(e.to_string()))?;
        let by_language = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))
            .map_err(|e| OrcError::store(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| OrcError::store(e.to_string()))?;

        Ok(Statistics {
            total_files,
            total_functions,
            total_classes,
            by_language,
            average_complexity: average_complexity.unwrap_or(0.0),
            max_complexity: max_complexity.unwrap_or(0),
        })
    }

    pub fn save_graph(&self, graph_type: &str, resolved: &ResolvedDependencies) -> OrcResult<()> {
        let conn = self.conn.lock().unwrap();
        let blob = serde_json::to_vec(resolved).map_err(|e| OrcError::store(e.to_string()))?;
        conn.execute("INSERT OR REPLACE INTO graphs (graph_type, data) VALUES (?1, ?2)", params![graph_type, blob])
            .map_err(|e| OrcError::store(e.to_string()))?;
        Ok(())
    }

    pub fn load_graph(&self, graph_type: &str) -> OrcResult<Option<ResolvedDependencies>> {
        let conn = self.conn.lock().unwrap();
        let blob: Option<Vec<u8>> = conn
            .query_row("SELECT data FROM graphs WHERE graph_type = ?1", params![graph_type], |row| row.get(0))
            .optional()
            .map_err(|e| OrcError::store(e.to_string()))?;
        match blob {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(|e| OrcError::store(e.to_string()))?)),
            None => Ok(None),
        }
    }

    /// Applies a full parse run following spec.md §4.8's durability rule:
    /// clear then rewrite every scanned file's rows, then drop manifest
    /// entries for paths no longer present in `result`.
    pub fn apply_parse_run(&self, result: &ParseResult, indexed_at: f64) -> OrcResult<()> {
        let scanned_paths: std::collections::BTreeSet<&String> = result.files.keys().collect();

        for (path, file) in &result.files {
            self.clear_file_index_for_path(path)?;
            self.upsert_file_index(file)?;

            let functions: std::collections::BTreeMap<String, FunctionRecord> =
                result.functions.iter().filter(|(_, f)| &f.file_path == path).map(|(k, v)| (k.clone(), v.clone())).collect();
            self.bulk_upsert_functions(&functions)?;

            let classes: std::collections::BTreeMap<String, ClassRecord> =
                result.classes.iter().filter(|(_, c)| &c.file_path == path).map(|(k, v)| (k.clone(), v.clone())).collect();
            self.bulk_upsert_classes(&classes)?;

            if let Some(imports) = result.imports.get(path) {
                self.bulk_upsert_imports(path, imports)?;
            }
            if let Some(exports) = result.exports.get(path) {
                self.bulk_upsert_exports(path, exports)?;
            }

            self.bulk_upsert_overlays_for_file(
                path,
                result.api_endpoints.get(path).map(Vec::as_slice).unwrap_or(&[]),
                result.database_queries.get(path).map(Vec::as_slice).unwrap_or(&[]),
                result.error_handlers.get(path).map(Vec::as_slice).unwrap_or(&[]),
                result.config_usage.get(path).map(Vec::as_slice).unwrap_or(&[]),
                result.side_effects.get(path).map(Vec::as_slice).unwrap_or(&[]),
                result.cross_cutting_concerns.get(path).map(Vec::as_slice).unwrap_or(&[]),
                result.security_risks.get(path).map(Vec::as_slice).unwrap_or(&[]),
                result.data_models.get(path).map(Vec::as_slice).unwrap_or(&[]),
                result.concurrency_patterns.get(path).map(Vec::as_slice).unwrap_or(&[]),
            )?;

            self.upsert_manifest_entry(&ManifestEntry {
                path: path.clone(),
                language: file.language,
                last_modified: file.last_modified,
                content_hash: file.content_hash.clone(),
                last_indexed_at: indexed_at,
            })?;
        }

        for stale in self.iter_manifest_paths()? {
            if !scanned_paths.contains(&stale) {
                self.clear_file_index_for_path(&stale)?;
                self.delete_manifest_entry(&stale)?;
            }
        }

        Ok(())
    }

    /// Reconstructs a full [`ParseResult`] by projecting every table back
    /// into its in-memory shape — the read-side mirror of `apply_parse_run`.
    /// Analytical queries (complexity, dead-code, codebase map) run against
    /// this rather than re-parsing the tree, matching spec.md §4.10's "pure
    /// projections over the Store" framing.
    pub fn load_parse_result(&self) -> OrcResult<ParseResult> {
        let conn = self.conn.lock().unwrap();
        let mut result = ParseResult::default();

        {
            let mut stmt = conn
                .prepare("SELECT path, language, framework, loc, last_modified, hash, metadata_json FROM file_index")
                .map_err(|e| OrcError::store(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, u64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                })
                .map_err(|e| OrcError::store(e.to_string()))?;
            for row in rows {
                let (path, language, framework, loc, last_modified, hash, metadata_json) = row.map_err(|e| OrcError::store(e.to_string()))?;
                let metadata = serde_json::from_str(&metadata_json).unwrap_or_default();
                result.files.insert(
                    path.clone(),
                    FileRecord {
                        path,
                        language: crate::model::Language::from_name(&language),
                        loc,
                        framework,
                        content_hash: hash,
                        last_modified,
                        metadata,
                    },
                );
            }
        }

        {
            let mut stmt = conn
                .prepare("SELECT id, file_path, name, language, line_start, line_end, complexity, calls_json, extras_json FROM function_index")
                .map_err(|e| OrcError::store(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, u32>(4)?,
                        row.get::<_, u32>(5)?,
                        row.get::<_, u32>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, String>(8)?,
                    ))
                })
                .map_err(|e| OrcError::store(e.to_string()))?;
            for row in rows {
                let (id, file_path, name, language, line_start, line_end, complexity, calls_json, extras_json) =
                    row.map_err(|e| OrcError::store(e.to_string()))?;
                let calls: Vec<String> = serde_json::from_str(&calls_json).unwrap_or_default();
                let extras: Value = serde_json::from_str(&extras_json).unwrap_or_default();
                let parameters = serde_json::from_value(extras.get("parameters").cloned().unwrap_or_default()).unwrap_or_default();
                let decorators = serde_json::from_value(extras.get("decorators").cloned().unwrap_or_default()).unwrap_or_default();
                result.functions.insert(
                    id.clone(),
                    FunctionRecord {
                        id,
                        file_path,
                        name,
                        language: crate::model::Language::from_name(&language),
                        line_start,
                        line_end,
                        complexity,
                        parameters,
                        calls,
                        docstring: extras.get("docstring").and_then(|v| v.as_str()).map(str::to_string),
                        is_exported: extras.get("is_exported").and_then(|v| v.as_bool()).unwrap_or(false),
                        is_async: extras.get("is_async").and_then(|v| v.as_bool()).unwrap_or(false),
                        return_type: extras.get("return_type").and_then(|v| v.as_str()).map(str::to_string),
                        decorators,
                        source: String::new(),
                    },
                );
            }
        }

        {
            let mut stmt = conn
                .prepare("SELECT id, file_path, name, language, bases_json, extras_json FROM class_index")
                .map_err(|e| OrcError::store(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })
                .map_err(|e| OrcError::store(e.to_string()))?;
            for row in rows {
                let (id, file_path, name, language, bases_json, extras_json) = row.map_err(|e| OrcError::store(e.to_string()))?;
                let bases: Vec<String> = serde_json::from_str(&bases_json).unwrap_or_default();
                let extras: Value = serde_json::from_str(&extras_json).unwrap_or_default();
                let methods = serde_json::from_value(extras.get("methods").cloned().unwrap_or_default()).unwrap_or_default();
                let decorators = serde_json::from_value(extras.get("decorators").cloned().unwrap_or_default()).unwrap_or_default();
                let line_start = extras.get("line_start").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                let line_end = extras.get("line_end").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                result.classes.insert(
                    id.clone(),
                    ClassRecord {
                        id,
                        file_path,
                        name,
                        language: crate::model::Language::from_name(&language),
                        line_start,
                        line_end,
                        bases,
                        methods,
                        docstring: extras.get("docstring").and_then(|v| v.as_str()).map(str::to_string),
                        decorators,
                    },
                );
            }
        }

        {
            let mut stmt = conn
                .prepare("SELECT file_path, module, count FROM import_index")
                .map_err(|e| OrcError::store(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, u64>(2)?)))
                .map_err(|e| OrcError::store(e.to_string()))?;
            for row in rows {
                let (file_path, module, count) = row.map_err(|e| OrcError::store(e.to_string()))?;
                result.imports.entry(file_path).or_default().insert(module, count);
            }
        }

        {
            let mut stmt = conn
                .prepare("SELECT file_path, symbol, kind FROM export_index")
                .map_err(|e| OrcError::store(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)))
                .map_err(|e| OrcError::store(e.to_string()))?;
            for row in rows {
                let (file_path, symbol, kind) = row.map_err(|e| OrcError::store(e.to_string()))?;
                let kind = match kind.as_str() {
                    "function" => ExportKind::Function,
                    "class" => ExportKind::Class,
                    _ => ExportKind::Default,
                };
                result.exports.entry(file_path).or_default().insert(symbol, ExportRecord { kind, line: 0 });
            }
        }

        macro_rules! load_overlay {
            ($table:literal, $field:ident) => {
                let mut stmt = conn.prepare(concat!("SELECT file_path, data_json FROM ", $table)).map_err(|e| OrcError::store(e.to_string()))?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
                    .map_err(|e| OrcError::store(e.to_string()))?;
                for row in rows {
                    let (file_path, data_json) = row.map_err(|e| OrcError::store(e.to_string()))?;
                    if let Ok(value) = serde_json::from_str(&data_json) {
                        result.$field.entry(file_path).or_default().push(value);
                    }
                }
            };
        }
        load_overlay!("api_endpoints", api_endpoints);
        load_overlay!("database_queries", database_queries);
        load_overlay!("error_handlers", error_handlers);
        load_overlay!("config_usage", config_usage);
        load_overlay!("side_effects", side_effects);
        load_overlay!("cross_cutting_concerns", cross_cutting_concerns);
        load_overlay!("security_risks", security_risks);
        load_overlay!("data_models", data_models);
        load_overlay!("concurrency_patterns", concurrency_patterns);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;
    use std::collections::BTreeMap;

    fn sample_file(path: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            language: Language::Python,
            loc: 10,
            framework: None,
            content_hash: "abc".to_string(),
            last_modified: 100.0,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn round_trips_a_file_and_function() {
        let store = Store::in_memory().unwrap();
        store.upsert_file_index(&sample_file("a.py")).unwrap();

        let mut functions = BTreeMap::new();
        functions.insert(
            "a.py::foo".to_string(),
            FunctionRecord {
                id: "a.py::foo".into(),
                file_path: "a.py".into(),
                name: "foo".into(),
                language: Language::Python,
                line_start: 1,
                line_end: 3,
                complexity: 12,
                parameters: vec![],
                calls: vec!["bar".into()],
                docstring: None,
                is_exported: true,
                is_async: false,
                return_type: None,
                decorators: vec![],
                source: String::new(),
            },
        );
        store.bulk_upsert_functions(&functions).unwrap();

        let matches = store.search_symbols("foo", 10).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].kind, "function");

        let complex = store.get_complex_functions(10).unwrap();
        assert_eq!(complex.len(), 1);
        assert_eq!(complex[0].id, "a.py::foo");

        let stats = store.get_statistics().unwrap();
        assert_eq!(stats.total_files, 1);
        assert_eq!(stats.total_functions, 1);
        assert_eq!(stats.max_complexity, 12);
    }

    #[test]
    fn clear_file_index_cascades() {
        let store = Store::in_memory().unwrap();
        store.upsert_file_index(&sample_file("a.py")).unwrap();
        store
            .upsert_manifest_entry(&ManifestEntry {
                path: "a.py".into(),
                language: Language::Python,
                last_modified: 1.0,
                content_hash: "abc".into(),
                last_indexed_at: 2.0,
            })
            .unwrap();

        store.clear_file_index_for_path("a.py").unwrap();

        assert!(store.get_manifest_entry("a.py").unwrap().is_none());
        let stats = store.get_statistics().unwrap();
        assert_eq!(stats.total_files, 0);
    }

    #[test]
    fn apply_parse_run_drops_stale_manifest_entries() {
        let store = Store::in_memory().unwrap();
        let mut result = ParseResult::default();
        result.files.insert("a.py".into(), sample_file("a.py"));
        store.apply_parse_run(&result, 10.0).unwrap();
        assert_eq!(store.iter_manifest_paths().unwrap(), vec!["a.py".to_string()]);

        let empty = ParseResult::default();
        store.apply_parse_run(&empty, 20.0).unwrap();
        assert!(store.iter_manifest_paths().unwrap().is_empty());
    }

    #[test]
    fn load_parse_result_round_trips_functions_and_calls() {
        let store = Store::in_memory().unwrap();
        let mut result = ParseResult::default();
        result.files.insert("a.py".into(), sample_file("a.py"));
        result.functions.insert(
            "a.py::helper".into(),
            crate::model::FunctionRecord {
                id: "a.py::helper".into(),
                file_path: "a.py".into(),
                name: "helper".into(),
                language: Language::Python,
                line_start: 1,
                line_end: 3,
                complexity: 2,
                parameters: vec![],
                calls: vec!["other".into()],
                docstring: Some("does things".into()),
                is_exported: true,
                is_async: false,
                return_type: None,
                decorators: vec![],
                source: String::new(),
            },
        );
        store.apply_parse_run(&result, 1.0).unwrap();

        let loaded = store.load_parse_result().unwrap();
        let func = &loaded.functions["a.py::helper"];
        assert_eq!(func.calls, vec!["other".to_string()]);
        assert_eq!(func.complexity, 2);
        assert!(func.is_exported);
        assert_eq!(func.docstring.as_deref(), Some("does things"));
    }
}
