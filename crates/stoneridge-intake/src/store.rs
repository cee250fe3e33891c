//! Pending-push ledger (spec §6's `srenqueuer`): every `/srpush` submission
//! is recorded here before the attempt to publish it on the `intake` queue.
//! A submission that publishes successfully is marked handled immediately;
//! one whose publish failed is left unhandled so `srenqueuer` can retry it
//! without the original caller having to resubmit.
//!
//! Same transactional pop-and-mark-done shape as `stoneridge-bridge`'s
//! `RetentionQueue`, applied to a different row shape.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use stoneridge_types::request::RunRequest;
use stoneridge_types::{Result, StoneRidgeError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPush {
    pub pushid: i64,
    pub ldap: String,
    pub sha: String,
    pub netconfigs: Vec<String>,
    pub operating_systems: Vec<String>,
    pub srid: String,
}

pub struct PushStore {
    conn: Connection,
}

impl PushStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("opening {path:?}: {e}")))?;
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("opening in-memory db: {e}")))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS pushes (
                pushid INTEGER PRIMARY KEY AUTOINCREMENT,
                ldap TEXT NOT NULL,
                sha TEXT NOT NULL,
                netconfigs TEXT NOT NULL,
                operating_systems TEXT NOT NULL,
                srid TEXT NOT NULL,
                handled INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("creating pushes table: {e}")))?;
        Ok(PushStore { conn })
    }

    /// Record a push. `handled` is set by the caller depending on whether
    /// the intake-queue publish that triggered this record succeeded.
    pub fn insert(&self, request: &RunRequest, handled: bool) -> Result<i64> {
        let netconfigs = serde_json::to_string(&request.netconfigs)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!(e)))?;
        let operating_systems = serde_json::to_string(&request.operating_systems)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!(e)))?;
        self.conn
            .execute(
                "INSERT INTO pushes (ldap, sha, netconfigs, operating_systems, srid, handled)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    request.ldap,
                    request.sha,
                    netconfigs,
                    operating_systems,
                    request.srid,
                    handled as i64
                ],
            )
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("inserting push: {e}")))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn mark_handled(&self, pushid: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE pushes SET handled = 1 WHERE pushid = ?1",
                params![pushid],
            )
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("marking push handled: {e}")))?;
        Ok(rows > 0)
    }

    pub fn list_unhandled(&self) -> Result<Vec<PendingPush>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT pushid, ldap, sha, netconfigs, operating_systems, srid
                 FROM pushes WHERE handled = 0 ORDER BY pushid",
            )
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!(e)))?;
        let rows = stmt
            .query_map([], |row| {
                let netconfigs: String = row.get(3)?;
                let operating_systems: String = row.get(4)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    netconfigs,
                    operating_systems,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!(e)))?;

        let mut out = Vec::new();
        for row in rows {
            let (pushid, ldap, sha, netconfigs, operating_systems, srid) =
                row.map_err(|e| StoneRidgeError::Other(anyhow::anyhow!(e)))?;
            out.push(PendingPush {
                pushid,
                ldap,
                sha,
                netconfigs: serde_json::from_str(&netconfigs)
                    .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!(e)))?,
                operating_systems: serde_json::from_str(&operating_systems)
                    .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!(e)))?,
                srid,
            });
        }
        Ok(out)
    }

    #[cfg(test)]
    pub fn lookup_handled(&self, pushid: i64) -> Result<Option<bool>> {
        self.conn
            .query_row(
                "SELECT handled FROM pushes WHERE pushid = ?1",
                params![pushid],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map(|v| v.map(|n| n != 0))
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stoneridge_types::request::{NetConfig, OperatingSystem};

    fn sample() -> RunRequest {
        RunRequest {
            srid: "alice-abcdef012345".into(),
            nightly: false,
            ldap: "alice".into(),
            sha: "abcdef012345".into(),
            operating_systems: vec![OperatingSystem::Linux],
            netconfigs: vec![NetConfig::Broadband],
            attempt: 1,
            tstamp: None,
        }
    }

    #[test]
    fn unhandled_push_is_listed() {
        let store = PushStore::open_in_memory().unwrap();
        let id = store.insert(&sample(), false).unwrap();
        let unhandled = store.list_unhandled().unwrap();
        assert_eq!(unhandled.len(), 1);
        assert_eq!(unhandled[0].pushid, id);
        assert_eq!(unhandled[0].srid, "alice-abcdef012345");
    }

    #[test]
    fn handled_push_is_not_listed() {
        let store = PushStore::open_in_memory().unwrap();
        store.insert(&sample(), true).unwrap();
        assert!(store.list_unhandled().unwrap().is_empty());
    }

    #[test]
    fn mark_handled_removes_it_from_the_unhandled_list() {
        let store = PushStore::open_in_memory().unwrap();
        let id = store.insert(&sample(), false).unwrap();
        assert!(store.mark_handled(id).unwrap());
        assert!(store.list_unhandled().unwrap().is_empty());
        assert_eq!(store.lookup_handled(id).unwrap(), Some(true));
    }

    #[test]
    fn mark_handled_on_unknown_id_reports_false() {
        let store = PushStore::open_in_memory().unwrap();
        assert!(!store.mark_handled(999).unwrap());
    }
}
