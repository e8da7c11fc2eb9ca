use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{Connection, OpenFlags, Params, Row};
use tracing::{debug, info, warn};

use crate::model::RouteRecord;
use crate::text;

// Results keep storage (rowid) order; `id` is not a key and may be out of order.
const SELECT_ROUTES: &str = "SELECT id, route_name, route_link FROM routes";

/// Read-only accessor over the `routes` table.
///
/// The connection is opened once by the service and released with
/// [`RouteStore::close`]; queries after that return an error.
pub struct RouteStore {
    conn: Mutex<Option<Connection>>,
}

impl RouteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open route store {:?}", path))?;

        let has_routes: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'routes'",
                [],
                |r| r.get(0),
            )
            .with_context(|| format!("Failed to read schema of {:?}", path))?;
        if !has_routes {
            bail!("Route store {:?} has no `routes` table", path);
        }

        info!("Opened route store {:?}", path);
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
        }
    }

    /// Match a route name fragment or numeric id. The first non-empty
    /// result of plain substring, fallback spelling, then exact id wins.
    pub fn find_by_query(&self, query: &str) -> Result<Vec<RouteRecord>> {
        self.with_conn(|conn| {
            let rows = by_name_fragment(conn, query)?;
            if !rows.is_empty() {
                debug!(query, matched = rows.len(), "substring match");
                return Ok(rows);
            }

            let variant = text::fallback_variant(query);
            if variant != query {
                let rows = by_name_fragment(conn, &variant)?;
                if !rows.is_empty() {
                    debug!(query, variant = %variant, matched = rows.len(), "fallback spelling match");
                    return Ok(rows);
                }
            }

            match query.trim().parse::<i64>() {
                Ok(id) => {
                    let rows = query_routes(conn, &format!("{SELECT_ROUTES} WHERE id = ?1"), [id])?;
                    debug!(query, matched = rows.len(), "id match");
                    Ok(rows)
                }
                Err(_) => Ok(Vec::new()),
            }
        })
    }

    pub fn list_all(&self) -> Result<Vec<RouteRecord>> {
        self.with_conn(|conn| query_routes(conn, &format!("{SELECT_ROUTES} ORDER BY rowid"), []))
    }

    /// Release the connection. Safe to call more than once.
    pub fn close(&self) -> Result<()> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("route store lock poisoned"))?;
        match guard.take() {
            Some(conn) => {
                if let Err((_, e)) = conn.close() {
                    warn!("Route store closed with error: {}", e);
                    return Err(e).context("Failed to close route store");
                }
                info!("Route store closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("route store lock poisoned"))?;
        let conn = guard.as_ref().ok_or_else(|| anyhow!("route store is closed"))?;
        f(conn)
    }
}

fn by_name_fragment(conn: &Connection, fragment: &str) -> Result<Vec<RouteRecord>> {
    query_routes(
        conn,
        &format!("{SELECT_ROUTES} WHERE instr(route_name, ?1) > 0 ORDER BY rowid"),
        [fragment],
    )
}

fn query_routes(conn: &Connection, sql: &str, params: impl Params) -> Result<Vec<RouteRecord>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map(params, route_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn route_from_row(row: &Row<'_>) -> rusqlite::Result<RouteRecord> {
    Ok(RouteRecord {
        id: row.get(0)?,
        route_name: row.get(1)?,
        route_link: row.get(2)?,
    })
}

#[cfg(test)]
pub(crate) fn in_memory(rows: &[(i64, &str, &str)]) -> RouteStore {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE routes (id INTEGER, route_name TEXT, route_link TEXT);")
        .unwrap();
    {
        let mut stmt = conn
            .prepare("INSERT INTO routes (id, route_name, route_link) VALUES (?1, ?2, ?3)")
            .unwrap();
        for (id, name, link) in rows {
            stmt.execute(rusqlite::params![id, name, link]).unwrap();
        }
    }
    RouteStore::from_connection(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RouteStore {
        in_memory(&[
            (1, "Pik Lenina", "https://mountain.kz/routes/1"),
            (2, "Pik Lenina by the NE ridge", "https://mountain.kz/routes/2"),
            (3, "Belukha 2A", "https://mountain.kz/routes/3"),
            (4, "Talgar TN", "https://mountain.kz/routes/4"),
        ])
    }

    fn ids(rows: &[RouteRecord]) -> Vec<i64> {
        rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn substring_match_returns_all_matches() {
        let rows = store().find_by_query("Pik Lenina").unwrap();
        assert_eq!(ids(&rows), vec![1, 2]);
        assert_eq!(rows[0].route_link, "https://mountain.kz/routes/1");
    }

    #[test]
    fn substring_match_is_case_sensitive() {
        assert_eq!(ids(&store().find_by_query("ridge").unwrap()), vec![2]);
        assert!(store().find_by_query("RIDGE").unwrap().is_empty());
    }

    #[test]
    fn fallback_spelling_is_tried_second() {
        // "belukha 2a" -> "Belukha 2A"
        assert_eq!(ids(&store().find_by_query("belukha 2a").unwrap()), vec![3]);
        // "talgar tn" -> "Talgar tN", no match; not numeric either
        assert!(store().find_by_query("talgar tn").unwrap().is_empty());
    }

    #[test]
    fn id_lookup_is_last_resort() {
        assert_eq!(ids(&store().find_by_query("4").unwrap()), vec![4]);
        assert!(store().find_by_query("99").unwrap().is_empty());
    }

    #[test]
    fn name_match_beats_id_match() {
        // "2" appears in "Belukha 2A", so the id lookup never runs
        assert_eq!(ids(&store().find_by_query("2").unwrap()), vec![3]);
    }

    #[test]
    fn list_all_preserves_order() {
        let rows = store().list_all().unwrap();
        assert_eq!(ids(&rows), vec![1, 2, 3, 4]);
        assert!(in_memory(&[]).list_all().unwrap().is_empty());
    }

    #[test]
    fn results_follow_storage_order_not_id() {
        let s = in_memory(&[
            (2, "Pik B", "https://mountain.kz/routes/2"),
            (1, "Pik A", "https://mountain.kz/routes/1"),
            (3, "Pik C", "https://mountain.kz/routes/3"),
        ]);
        assert_eq!(ids(&s.list_all().unwrap()), vec![2, 1, 3]);
        assert_eq!(ids(&s.find_by_query("Pik").unwrap()), vec![2, 1, 3]);
        assert_eq!(ids(&s.find_by_query("1").unwrap()), vec![1]);
    }

    #[test]
    fn close_is_idempotent_and_final() {
        let s = store();
        s.close().unwrap();
        s.close().unwrap();
        assert!(s.list_all().is_err());
        assert!(s.find_by_query("Pik").is_err());
    }

    #[test]
    fn open_missing_file_fails() {
        let err = RouteStore::open("does/not/exist.db").err().unwrap();
        assert!(err.to_string().contains("Failed to open route store"));
    }

    #[test]
    fn open_without_routes_table_fails() {
        let path = std::env::temp_dir().join(format!("alpine_routes_empty_{}.db", std::process::id()));
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE other (id INTEGER);")
            .unwrap();
        let err = RouteStore::open(&path).err().unwrap();
        assert!(err.to_string().contains("no `routes` table"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn open_reads_existing_file() {
        let path = std::env::temp_dir().join(format!("alpine_routes_ok_{}.db", std::process::id()));
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE routes (id INTEGER, route_name TEXT, route_link TEXT);
                 INSERT INTO routes VALUES (10, 'Amangeldy', 'https://mountain.kz/routes/10');",
            )
            .unwrap();
        }
        let s = RouteStore::open(&path).unwrap();
        assert_eq!(s.find_by_query("amangeldy").unwrap().len(), 0);
        assert_eq!(ids(&s.find_by_query("Amangeldy").unwrap()), vec![10]);
        s.close().unwrap();
        std::fs::remove_file(&path).ok();
    }
}
