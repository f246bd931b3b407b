//! A [`IndexStore`] backed by a `rusqlite` database, mirroring the auxiliary
//! indexed store the original C tool keeps alongside each XML stream.
use std::io;

use rusqlite::{params, Connection};

use crate::record::PackageRecord;
use crate::sink::IndexStore;

/// Mirrors each inserted [`PackageRecord`] into a `packages` table. One
/// `SqliteIndex` is meant to back a single sink (primary, filelists, or other);
/// run separate databases per sink if you want them queryable independently.
pub struct SqliteIndex {
    conn: Connection,
}

impl SqliteIndex {
    pub fn open(path: impl AsRef<std::path::Path>) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS packages (
                name            TEXT NOT NULL,
                pkg_id          TEXT NOT NULL,
                checksum_type   TEXT NOT NULL,
                size_package    INTEGER NOT NULL,
                time_file       INTEGER NOT NULL,
                location_href   TEXT NOT NULL,
                location_base   TEXT NOT NULL
            )",
            [],
        )?;
        Ok(SqliteIndex { conn })
    }

    pub fn in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS packages (
                name            TEXT NOT NULL,
                pkg_id          TEXT NOT NULL,
                checksum_type   TEXT NOT NULL,
                size_package    INTEGER NOT NULL,
                time_file       INTEGER NOT NULL,
                location_href   TEXT NOT NULL,
                location_base   TEXT NOT NULL
            )",
            [],
        )?;
        Ok(SqliteIndex { conn })
    }
}

impl IndexStore for SqliteIndex {
    fn insert(&mut self, record: &PackageRecord) -> io::Result<()> {
        self.conn
            .execute(
                "INSERT INTO packages
                    (name, pkg_id, checksum_type, size_package, time_file, location_href, location_base)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.name,
                    record.pkg_id,
                    record.checksum_type_name,
                    record.size_package,
                    record.time_file,
                    record.location_href,
                    record.location_base,
                ],
            )
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(())
    }
}
