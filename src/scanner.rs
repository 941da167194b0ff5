//! Dump scanner collaborator (spec.md §1: "File discovery and classification"
//! is out of scope — only the interface is specified).
//!
//! A minimal directory-convention scanner is included (`SPEC_FULL.md` §2 item
//! 15) so the dispatcher has real `FileRecord`s to drive in tests. Real dumps
//! vary in naming convention; production deployments are expected to swap in
//! their own `DumpScanner` impl without touching the scheduler.

use std::path::{Path, PathBuf};

use crate::model::Compression;

/// What kind of restore job a discovered file should become.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    DatabaseSchema,
    TableSchema { table: String },
    ViewSchema { table: String },
    SequenceSchema { table: String },
    TableIndex { table: String },
    Data { table: String, chunk: u32 },
}

/// One file discovered in the dump directory, classified by naming
/// convention.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub database: String,
    pub kind: FileKind,
    pub path: PathBuf,
    pub compression: Compression,
}

pub trait DumpScanner {
    /// Walk the dump directory and return every classified file. Order is not
    /// guaranteed to be meaningful; the schema pipeline handles out-of-order
    /// discovery by design (spec.md §4.3).
    fn scan(&self) -> std::io::Result<Vec<FileRecord>>;
}

/// Classifies dump files by suffix convention, mirroring the common
/// `mydumper`-style naming:
///   `<db>-schema-create.sql[.gz|.zst]`
///   `<db>.<table>-schema.sql[...]`
///   `<db>.<table>-schema-view.sql[...]`
///   `<db>.<table>-schema-sequence.sql[...]`
///   `<db>.<table>-schema-indexes.sql[...]`
///   `<db>.<table>.<chunk>.sql[...]`
pub struct DirScanner {
    root: PathBuf,
}

impl DirScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn classify(name: &str) -> Option<(String, FileKind, Compression)> {
        let (stem, compression) = if let Some(s) = name.strip_suffix(".sql.gz") {
            (s, Compression::Gzip)
        } else if let Some(s) = name.strip_suffix(".sql.zst") {
            (s, Compression::Zstd)
        } else if let Some(s) = name.strip_suffix(".sql") {
            (s, Compression::None)
        } else {
            return None;
        };

        if let Some(db) = stem.strip_suffix("-schema-create") {
            return Some((db.to_string(), FileKind::DatabaseSchema, compression));
        }

        let mut parts = stem.splitn(2, '.');
        let db = parts.next()?.to_string();
        let rest = parts.next()?;

        if let Some(table) = rest.strip_suffix("-schema-view") {
            return Some((db, FileKind::ViewSchema { table: table.into() }, compression));
        }
        if let Some(table) = rest.strip_suffix("-schema-sequence") {
            return Some((
                db,
                FileKind::SequenceSchema { table: table.into() },
                compression,
            ));
        }
        if let Some(table) = rest.strip_suffix("-schema-indexes") {
            return Some((db, FileKind::TableIndex { table: table.into() }, compression));
        }
        if let Some(table) = rest.strip_suffix("-schema") {
            return Some((db, FileKind::TableSchema { table: table.into() }, compression));
        }
        // `<table>.<chunk>` data chunk.
        let mut rest_parts = rest.rsplitn(2, '.');
        let chunk_str = rest_parts.next()?;
        let table = rest_parts.next()?;
        let chunk: u32 = chunk_str.parse().ok()?;
        Some((db, FileKind::Data { table: table.into(), chunk }, compression))
    }
}

impl DumpScanner for DirScanner {
    fn scan(&self) -> std::io::Result<Vec<FileRecord>> {
        let mut records = Vec::new();
        scan_dir(&self.root, &mut records)?;
        Ok(records)
    }
}

fn scan_dir(dir: &Path, out: &mut Vec<FileRecord>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some((database, kind, compression)) = DirScanner::classify(name) {
            out.push(FileRecord {
                database,
                kind,
                path: path.clone(),
                compression,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_database_schema() {
        let (db, kind, comp) = DirScanner::classify("shop-schema-create.sql").unwrap();
        assert_eq!(db, "shop");
        assert_eq!(kind, FileKind::DatabaseSchema);
        assert_eq!(comp, Compression::None);
    }

    #[test]
    fn classifies_table_schema_compressed() {
        let (db, kind, comp) = DirScanner::classify("shop.orders-schema.sql.gz").unwrap();
        assert_eq!(db, "shop");
        assert_eq!(kind, FileKind::TableSchema { table: "orders".into() });
        assert_eq!(comp, Compression::Gzip);
    }

    #[test]
    fn classifies_data_chunk() {
        let (db, kind, _) = DirScanner::classify("shop.orders.00001.sql.zst").unwrap();
        assert_eq!(db, "shop");
        assert_eq!(
            kind,
            FileKind::Data {
                table: "orders".into(),
                chunk: 1
            }
        );
    }

    #[test]
    fn classifies_view_and_sequence_and_index() {
        assert_eq!(
            DirScanner::classify("shop.v_orders-schema-view.sql").unwrap().1,
            FileKind::ViewSchema { table: "v_orders".into() }
        );
        assert_eq!(
            DirScanner::classify("shop.seq_id-schema-sequence.sql").unwrap().1,
            FileKind::SequenceSchema { table: "seq_id".into() }
        );
        assert_eq!(
            DirScanner::classify("shop.orders-schema-indexes.sql").unwrap().1,
            FileKind::TableIndex { table: "orders".into() }
        );
    }

    #[test]
    fn rejects_unrelated_files() {
        assert!(DirScanner::classify("README.md").is_none());
        assert!(DirScanner::classify("metadata").is_none());
    }
}
