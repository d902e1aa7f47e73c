use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, CachedStatement, Connection, OptionalExtension, Row, Transaction};

use crate::error::{IndexerError, Result};
use crate::index::{
    validate_input, CallContext, ContextDefinition, FileMetadata, IndexStats, Symbol, SymbolKind,
    SymbolRef, SymbolStore, SymbolSummary, WriteOutcome,
};

/// Deepest call-context expansion accepted.
pub const MAX_CONTEXT_DEPTH: u32 = 10;
/// Largest `limit` accepted by prefix search.
pub const MAX_SEARCH_LIMIT: usize = 100;

const SYMBOL_COLUMNS: &str = "name, file_path, kind, signature, body, full_definition, \
     definition_hash, calls, start_line, start_col, end_line, end_col, start_byte, end_byte";

const UPSERT_SYMBOL: &str = r#"
    INSERT INTO symbols (name, file_path, kind, signature, body, full_definition,
                         definition_hash, calls, start_line, start_col, end_line,
                         end_col, start_byte, end_byte)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
    ON CONFLICT(name, file_path) DO UPDATE SET
        kind = excluded.kind,
        signature = excluded.signature,
        body = excluded.body,
        full_definition = excluded.full_definition,
        definition_hash = excluded.definition_hash,
        calls = excluded.calls,
        start_line = excluded.start_line,
        start_col = excluded.start_col,
        end_line = excluded.end_line,
        end_col = excluded.end_col,
        start_byte = excluded.start_byte,
        end_byte = excluded.end_byte
"#;

/// name -> definition hashes present anywhere in the store
type HashIndex = HashMap<String, HashSet<u32>>;

pub struct SqliteIndex {
    conn: Mutex<Connection>,
    hashes: Mutex<HashIndex>,
}

/// Hash index edits produced by a committed transaction.
#[derive(Default)]
struct HashChanges {
    added: Vec<(String, u32)>,
    removed: Vec<(String, u32)>,
    /// Remembered duplicates moved into `symbols`; their hashes stay known
    promoted: Vec<Symbol>,
}

impl HashChanges {
    /// Updates `index` and hands back the promoted symbols.
    fn apply(self, index: &mut HashIndex) -> Vec<Symbol> {
        for (name, hash) in self.removed {
            if let Some(set) = index.get_mut(&name) {
                set.remove(&hash);
                if set.is_empty() {
                    index.remove(&name);
                }
            }
        }
        for (name, hash) in self.added {
            index.entry(name).or_default().insert(hash);
        }
        self.promoted
    }
}

impl SqliteIndex {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::open(Connection::open(db_path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(Connection::open_in_memory()?)
    }

    fn open(conn: Connection) -> Result<Self> {
        Self::configure_pragmas(&conn)?;
        Self::init_schema(&conn)?;
        let hashes = Self::load_hashes(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            hashes: Mutex::new(hashes),
        })
    }

    /// Configure SQLite PRAGMA settings.
    /// - WAL mode: readers are not blocked by the writer
    /// - NORMAL synchronous: durable enough with WAL, much faster
    /// - 64MB cache and in-memory temp tables
    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;
        Ok(())
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS symbols (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                kind TEXT NOT NULL,
                signature TEXT NOT NULL,
                body TEXT NOT NULL,
                full_definition TEXT NOT NULL,
                definition_hash INTEGER NOT NULL,
                calls TEXT NOT NULL DEFAULT '[]',
                start_line INTEGER NOT NULL,
                start_col INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                end_col INTEGER NOT NULL,
                start_byte INTEGER NOT NULL,
                end_byte INTEGER NOT NULL,
                UNIQUE(name, file_path)
            );

            CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);
            CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_path);

            -- Definitions skipped because an identical one is stored for another file.
            CREATE TABLE IF NOT EXISTS symbol_duplicates (
                name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                kind TEXT NOT NULL,
                signature TEXT NOT NULL,
                body TEXT NOT NULL,
                full_definition TEXT NOT NULL,
                definition_hash INTEGER NOT NULL,
                calls TEXT NOT NULL DEFAULT '[]',
                start_line INTEGER NOT NULL,
                start_col INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                end_col INTEGER NOT NULL,
                start_byte INTEGER NOT NULL,
                end_byte INTEGER NOT NULL,
                UNIQUE(name, file_path)
            );

            CREATE INDEX IF NOT EXISTS idx_duplicates_hash ON symbol_duplicates(name, definition_hash);
            CREATE INDEX IF NOT EXISTS idx_duplicates_file ON symbol_duplicates(file_path);

            CREATE TABLE IF NOT EXISTS file_metadata (
                file_path TEXT PRIMARY KEY,
                last_modified REAL NOT NULL,
                content_hash TEXT NOT NULL,
                symbol_count INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn load_hashes(conn: &Connection) -> Result<HashIndex> {
        let mut stmt = conn.prepare("SELECT name, definition_hash FROM symbols")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32))
        })?;

        let mut index = HashIndex::new();
        for row in rows {
            let (name, hash) = row?;
            index.entry(name).or_default().insert(hash);
        }
        Ok(index)
    }

    fn symbol_from_row(row: &Row) -> rusqlite::Result<Symbol> {
        let kind: String = row.get(2)?;
        let calls: String = row.get(7)?;
        Ok(Symbol {
            name: row.get(0)?,
            file_path: row.get(1)?,
            kind: SymbolKind::from_str(&kind).unwrap_or(SymbolKind::Function),
            signature: row.get(3)?,
            body: row.get(4)?,
            full_definition: row.get(5)?,
            definition_hash: row.get::<_, i64>(6)? as u32,
            calls: serde_json::from_str(&calls).unwrap_or_default(),
            start_line: row.get(8)?,
            start_col: row.get(9)?,
            end_line: row.get(10)?,
            end_col: row.get(11)?,
            start_byte: row.get::<_, i64>(12)? as usize,
            end_byte: row.get::<_, i64>(13)? as usize,
        })
    }

    fn metadata_from_row(row: &Row) -> rusqlite::Result<FileMetadata> {
        Ok(FileMetadata {
            file_path: row.get(0)?,
            last_modified: row.get(1)?,
            content_hash: row.get(2)?,
            symbol_count: row.get::<_, i64>(3)? as usize,
        })
    }

    fn bind_symbol(
        stmt: &mut CachedStatement,
        symbol: &Symbol,
        file_path: &str,
        calls_json: &str,
    ) -> rusqlite::Result<usize> {
        stmt.execute(params![
            symbol.name,
            file_path,
            symbol.kind.as_str(),
            symbol.signature,
            symbol.body,
            symbol.full_definition,
            symbol.definition_hash as i64,
            calls_json,
            symbol.start_line,
            symbol.start_col,
            symbol.end_line,
            symbol.end_col,
            symbol.start_byte as i64,
            symbol.end_byte as i64,
        ])
    }

    /// Upserts the symbols whose definition hash is not yet known for their name.
    /// Known definitions stored for another file are kept in `symbol_duplicates`.
    fn write_symbols(
        tx: &Transaction,
        hashes: &HashIndex,
        file_path: &str,
        symbols: &[Symbol],
        calls_json: &[String],
        changes: &mut HashChanges,
    ) -> rusqlite::Result<(Vec<usize>, usize)> {
        let mut written = Vec::new();
        let mut skipped = 0;
        let mut pending: HashSet<(&str, u32)> = HashSet::new();

        for (i, symbol) in symbols.iter().enumerate() {
            let hash = symbol.definition_hash;
            if !pending.insert((symbol.name.as_str(), hash)) {
                skipped += 1;
                continue;
            }

            let previous: Option<u32> = tx
                .prepare_cached(
                    "SELECT definition_hash FROM symbols WHERE name = ?1 AND file_path = ?2",
                )?
                .query_row(params![symbol.name, file_path], |row| row.get::<_, i64>(0))
                .optional()?
                .map(|h| h as u32);

            let known = hashes
                .get(&symbol.name)
                .is_some_and(|set| set.contains(&hash));
            if known {
                skipped += 1;
                if previous == Some(hash) {
                    continue;
                }
                Self::bind_symbol(
                    &mut tx.prepare_cached(&format!(
                        "INSERT OR REPLACE INTO symbol_duplicates ({}) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                        SYMBOL_COLUMNS
                    ))?,
                    symbol,
                    file_path,
                    &calls_json[i],
                )?;
                if let Some(previous) = previous {
                    tx.prepare_cached("DELETE FROM symbols WHERE name = ?1 AND file_path = ?2")?
                        .execute(params![symbol.name, file_path])?;
                    Self::release(tx, &symbol.name, previous, file_path, changes)?;
                }
                continue;
            }

            Self::bind_symbol(
                &mut tx.prepare_cached(UPSERT_SYMBOL)?,
                symbol,
                file_path,
                &calls_json[i],
            )?;
            tx.prepare_cached("DELETE FROM symbol_duplicates WHERE name = ?1 AND file_path = ?2")?
                .execute(params![symbol.name, file_path])?;

            if let Some(previous) = previous {
                Self::release(tx, &symbol.name, previous, file_path, changes)?;
            }
            changes.added.push((symbol.name.clone(), hash));
            written.push(i);
        }

        Ok((written, skipped))
    }

    /// Called after the row `(name, hash)` of `file_path` is gone. An identical
    /// definition remembered for another file takes its place; otherwise the
    /// hash leaves the index.
    fn release(
        tx: &Transaction,
        name: &str,
        hash: u32,
        file_path: &str,
        changes: &mut HashChanges,
    ) -> rusqlite::Result<()> {
        let candidate = tx
            .prepare_cached(&format!(
                "SELECT {} FROM symbol_duplicates \
                 WHERE name = ?1 AND definition_hash = ?2 AND file_path != ?3 \
                 ORDER BY file_path LIMIT 1",
                SYMBOL_COLUMNS
            ))?
            .query_row(params![name, hash as i64, file_path], Self::symbol_from_row)
            .optional()?;

        if let Some(symbol) = candidate {
            let calls_json = serde_json::to_string(&symbol.calls)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            tx.prepare_cached("DELETE FROM symbol_duplicates WHERE name = ?1 AND file_path = ?2")?
                .execute(params![symbol.name, symbol.file_path])?;
            let inserted = Self::bind_symbol(
                &mut tx.prepare_cached(&format!(
                    "INSERT INTO symbols ({}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) \
                     ON CONFLICT(name, file_path) DO NOTHING",
                    SYMBOL_COLUMNS
                ))?,
                &symbol,
                &symbol.file_path,
                &calls_json,
            )?;
            if inserted == 1 {
                tracing::debug!("{} in {} takes over from {}", name, symbol.file_path, file_path);
                changes.promoted.push(symbol);
                return Ok(());
            }
        }

        changes.removed.push((name.to_string(), hash));
        Ok(())
    }

    /// Deletes rows of `file_path` whose names are not in `keep`.
    fn prune_missing(
        tx: &Transaction,
        file_path: &str,
        keep: &HashSet<&str>,
        changes: &mut HashChanges,
    ) -> rusqlite::Result<usize> {
        let stale: Vec<(String, i64)> = {
            let mut stmt =
                tx.prepare_cached("SELECT name, definition_hash FROM symbols WHERE file_path = ?1")?;
            let rows = stmt.query_map(params![file_path], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut stale = Vec::new();
            for row in rows {
                let (name, hash) = row?;
                if !keep.contains(name.as_str()) {
                    stale.push((name, hash));
                }
            }
            stale
        };

        for (name, hash) in &stale {
            tx.prepare_cached("DELETE FROM symbols WHERE name = ?1 AND file_path = ?2")?
                .execute(params![name, file_path])?;
            Self::release(tx, name, *hash as u32, file_path, changes)?;
        }
        Ok(stale.len())
    }

    fn write_metadata(conn: &Connection, metadata: &FileMetadata) -> rusqlite::Result<()> {
        conn.execute(
            r#"
            INSERT INTO file_metadata (file_path, last_modified, content_hash, symbol_count)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(file_path) DO UPDATE SET
                last_modified = excluded.last_modified,
                content_hash = excluded.content_hash,
                symbol_count = excluded.symbol_count
            "#,
            params![
                metadata.file_path,
                metadata.last_modified,
                metadata.content_hash,
                metadata.symbol_count as i64,
            ],
        )?;
        Ok(())
    }

    fn write_file(
        &self,
        file_path: &str,
        symbols: &[Symbol],
        metadata: Option<&FileMetadata>,
    ) -> Result<WriteOutcome> {
        let calls_json = symbols
            .iter()
            .map(|s| serde_json::to_string(&s.calls))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut conn = self.conn.lock();
        let mut hashes = self.hashes.lock();
        let mut changes = HashChanges::default();

        let result = (|| -> rusqlite::Result<(Vec<usize>, usize, usize)> {
            let tx = conn.transaction()?;
            if metadata.is_some() {
                tx.execute(
                    "DELETE FROM symbol_duplicates WHERE file_path = ?1",
                    params![file_path],
                )?;
            }
            let (written, skipped) =
                Self::write_symbols(&tx, &hashes, file_path, symbols, &calls_json, &mut changes)?;
            let mut pruned = 0;
            if let Some(metadata) = metadata {
                let keep: HashSet<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
                pruned = Self::prune_missing(&tx, file_path, &keep, &mut changes)?;
                Self::write_metadata(&tx, metadata)?;
            }
            tx.commit()?;
            Ok((written, skipped, pruned))
        })();

        let (written, skipped, pruned) = result.map_err(|source| IndexerError::StoreWrite {
            file: file_path.to_string(),
            source,
        })?;
        let promoted = changes.apply(&mut hashes);

        tracing::debug!(
            "Stored {}: {} written, {} unchanged, {} pruned",
            file_path,
            written.len(),
            skipped,
            pruned
        );

        Ok(WriteOutcome {
            written: written.into_iter().map(|i| symbols[i].clone()).collect(),
            skipped,
            pruned,
            promoted,
        })
    }

    /// `(name, file_path, calls, full_definition)` for every definition of `name`.
    fn definitions_of(
        conn: &Connection,
        name: &str,
    ) -> rusqlite::Result<Vec<(String, String, Vec<String>, String)>> {
        let mut stmt = conn.prepare_cached(
            "SELECT name, file_path, calls, full_definition FROM symbols \
             WHERE name = ?1 ORDER BY file_path",
        )?;
        let rows = stmt.query_map(params![name], |row| {
            let calls: String = row.get(2)?;
            Ok((
                row.get(0)?,
                row.get(1)?,
                serde_json::from_str(&calls).unwrap_or_default(),
                row.get(3)?,
            ))
        })?;
        rows.collect()
    }
}

/// Escapes LIKE wildcards so user text matches literally (used with `ESCAPE '\'`).
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Names a call may refer to: the call itself, and for `self.x` / `this.x`
/// inside `Class.method`, the sibling `Class.x`.
fn call_candidates(call: &str, caller: &str) -> Vec<String> {
    let mut candidates = vec![call.to_string()];
    for receiver in ["self.", "this.", "cls."] {
        if let (Some(member), Some((class, _))) = (call.strip_prefix(receiver), caller.rsplit_once('.')) {
            candidates.push(format!("{}.{}", class, member));
        }
    }
    candidates
}

impl SymbolStore for SqliteIndex {
    fn upsert(&self, symbols: &[Symbol], file_path: &str) -> Result<WriteOutcome> {
        self.write_file(file_path, symbols, None)
    }

    fn index_file(
        &self,
        file_path: &str,
        symbols: &[Symbol],
        metadata: &FileMetadata,
    ) -> Result<WriteOutcome> {
        self.write_file(file_path, symbols, Some(metadata))
    }

    fn search_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<SymbolRef>> {
        let prefix = validate_input(prefix)?;
        if !(1..=MAX_SEARCH_LIMIT).contains(&limit) {
            return Err(IndexerError::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_SEARCH_LIMIT
            )));
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT name, file_path FROM symbols WHERE name LIKE ?1 ESCAPE '\\' \
             ORDER BY name, file_path LIMIT ?2",
        )?;
        let rows = stmt.query_map(
            params![format!("{}%", escape_like(prefix)), limit as i64],
            |row| {
                Ok(SymbolRef {
                    name: row.get(0)?,
                    file_path: row.get(1)?,
                })
            },
        )?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn get(&self, name: &str, file_path: Option<&str>) -> Result<Vec<Symbol>> {
        let name = validate_input(name)?;
        let file_path = file_path.map(validate_input).transpose()?;

        let conn = self.conn.lock();
        let symbols = match file_path {
            Some(file) => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {} FROM symbols WHERE name = ?1 AND file_path LIKE ?2 ESCAPE '\\' \
                     ORDER BY file_path",
                    SYMBOL_COLUMNS
                ))?;
                let rows = stmt.query_map(
                    params![name, format!("%{}%", escape_like(file))],
                    Self::symbol_from_row,
                )?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {} FROM symbols WHERE name = ?1 ORDER BY file_path",
                    SYMBOL_COLUMNS
                ))?;
                let rows = stmt.query_map(params![name], Self::symbol_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(symbols)
    }

    fn get_call_context(
        &self,
        name: &str,
        file_path: Option<&str>,
        max_depth: u32,
    ) -> Result<CallContext> {
        let name = validate_input(name)?;
        let hint = file_path.map(validate_input).transpose()?;
        if max_depth > MAX_CONTEXT_DEPTH {
            return Err(IndexerError::InvalidInput(format!(
                "max_depth must be between 0 and {}",
                MAX_CONTEXT_DEPTH
            )));
        }

        let conn = self.conn.lock();
        let mut resolved: BTreeMap<String, ContextDefinition> = BTreeMap::new();
        let mut root: Option<ContextDefinition> = None;
        // (candidate names, file of the caller)
        let mut frontier: Vec<(Vec<String>, Option<String>)> = vec![(vec![name.to_string()], None)];

        for depth in 0..=max_depth {
            let mut next = Vec::new();

            for (candidates, caller_file) in frontier {
                let found = candidates.iter().find_map(|candidate| {
                    match Self::definitions_of(&conn, candidate) {
                        Ok(rows) if !rows.is_empty() => Some(Ok(rows)),
                        Ok(_) => None,
                        Err(e) => Some(Err(e)),
                    }
                });
                let rows = match found {
                    Some(rows) => rows?,
                    None => continue,
                };

                let chosen = rows
                    .iter()
                    .find(|(_, file, _, _)| hint.is_some_and(|h| file == h))
                    .or_else(|| rows.iter().find(|(_, file, _, _)| hint.is_some_and(|h| file.contains(h))))
                    .or_else(|| rows.iter().find(|(_, file, _, _)| caller_file.as_deref() == Some(file.as_str())))
                    .unwrap_or(&rows[0]);
                let (symbol_name, symbol_file, calls, full_definition) = chosen;

                if root.as_ref().is_some_and(|r| &r.name == symbol_name)
                    || resolved.contains_key(symbol_name)
                {
                    continue;
                }

                let definition = ContextDefinition {
                    name: symbol_name.clone(),
                    file_path: symbol_file.clone(),
                    full_definition: full_definition.clone(),
                };
                if root.is_none() {
                    root = Some(definition);
                } else {
                    resolved.insert(symbol_name.clone(), definition);
                }

                if depth < max_depth {
                    for call in calls {
                        next.push((call_candidates(call, symbol_name), Some(symbol_file.clone())));
                    }
                }
            }

            if root.is_none() {
                return Err(IndexerError::SymbolNotFound(name.to_string()));
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        let mut definitions: Vec<ContextDefinition> = root.into_iter().collect();
        definitions.extend(resolved.into_values());

        Ok(CallContext {
            symbol_name: name.to_string(),
            file_path: hint.map(str::to_string),
            max_depth,
            definitions,
        })
    }

    fn fuzzy_search(
        &self,
        name_fragment: &str,
        limit: usize,
        file_fragment: Option<&str>,
    ) -> Result<Vec<SymbolRef>> {
        let mut conditions = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if !name_fragment.trim().is_empty() {
            conditions.push("name LIKE ? ESCAPE '\\'");
            values.push(format!("%{}%", escape_like(validate_input(name_fragment)?)));
        }
        if let Some(file) = file_fragment.filter(|f| !f.trim().is_empty()) {
            conditions.push("file_path LIKE ? ESCAPE '\\'");
            values.push(format!("%{}%", escape_like(validate_input(file)?)));
        }
        if conditions.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT name, file_path FROM symbols WHERE {} ORDER BY name, file_path LIMIT {}",
            conditions.join(" AND "),
            limit.clamp(1, MAX_SEARCH_LIMIT)
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), |row| {
            Ok(SymbolRef {
                name: row.get(0)?,
                file_path: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn symbols_in_file(&self, file_fragment: &str) -> Result<Vec<Symbol>> {
        let file_fragment = validate_input(file_fragment)?;
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM symbols WHERE file_path LIKE ?1 ESCAPE '\\' \
             ORDER BY file_path, start_byte",
            SYMBOL_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![format!("%{}%", escape_like(file_fragment))],
            Self::symbol_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT DISTINCT file_path FROM symbols ORDER BY file_path")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn file_metadata(&self, file_path: &str) -> Result<Option<FileMetadata>> {
        let conn = self.conn.lock();
        let metadata = conn
            .query_row(
                "SELECT file_path, last_modified, content_hash, symbol_count \
                 FROM file_metadata WHERE file_path = ?1",
                params![file_path],
                Self::metadata_from_row,
            )
            .optional()?;
        Ok(metadata)
    }

    fn all_file_metadata(&self) -> Result<Vec<FileMetadata>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT file_path, last_modified, content_hash, symbol_count \
             FROM file_metadata ORDER BY file_path",
        )?;
        let rows = stmt.query_map([], Self::metadata_from_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn remove_file(&self, file_path: &str) -> Result<WriteOutcome> {
        let mut conn = self.conn.lock();
        let mut hashes = self.hashes.lock();
        let mut changes = HashChanges::default();

        let result = (|| -> rusqlite::Result<usize> {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM symbol_duplicates WHERE file_path = ?1",
                params![file_path],
            )?;
            let removed =
                Self::prune_missing(&tx, file_path, &HashSet::new(), &mut changes)?;
            tx.execute(
                "DELETE FROM file_metadata WHERE file_path = ?1",
                params![file_path],
            )?;
            tx.commit()?;
            Ok(removed)
        })();

        let pruned = result.map_err(|source| IndexerError::StoreWrite {
            file: file_path.to_string(),
            source,
        })?;
        Ok(WriteOutcome {
            pruned,
            promoted: changes.apply(&mut hashes),
            ..WriteOutcome::default()
        })
    }

    fn reload_hash_index(&self) -> Result<()> {
        let conn = self.conn.lock();
        let fresh = Self::load_hashes(&conn)?;
        *self.hashes.lock() = fresh;
        Ok(())
    }

    fn all_summaries(&self) -> Result<Vec<(String, SymbolSummary)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT name, file_path, signature, definition_hash FROM symbols \
             ORDER BY name, file_path",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                SymbolSummary {
                    file_path: row.get(1)?,
                    signature: row.get(2)?,
                    definition_hash: row.get::<_, i64>(3)? as u32,
                },
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn stats(&self) -> Result<IndexStats> {
        let conn = self.conn.lock();
        let total_symbols: i64 = conn.query_row("SELECT COUNT(*) FROM symbols", [], |r| r.get(0))?;
        let total_files: i64 =
            conn.query_row("SELECT COUNT(*) FROM file_metadata", [], |r| r.get(0))?;

        let mut stmt = conn.prepare_cached(
            "SELECT kind, COUNT(*) FROM symbols GROUP BY kind ORDER BY COUNT(*) DESC, kind",
        )?;
        let symbols_by_kind = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(IndexStats {
            total_files: total_files as usize,
            total_symbols: total_symbols as usize,
            symbols_by_kind,
        })
    }
}
