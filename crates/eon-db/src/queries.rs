use crate::Database;
use crate::models::{DeviceRow, StorageItemRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Devices --

    /// Registers the device on first sight and bumps `last_seen_at` after that.
    pub fn touch_device(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| upsert_device(conn, id))
    }

    pub fn get_device(&self, id: &str) -> Result<Option<DeviceRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, created_at, last_seen_at FROM devices WHERE id = ?1",
                [id],
                |row| {
                    Ok(DeviceRow {
                        id: row.get(0)?,
                        created_at: row.get(1)?,
                        last_seen_at: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    // -- Storage items --

    pub fn get_item(&self, device_id: &str, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM device_storage WHERE device_id = ?1 AND key = ?2",
                [device_id, key],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn set_item(&self, device_id: &str, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            upsert_device(conn, device_id)?;
            conn.execute(
                "INSERT INTO device_storage (device_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(device_id, key)
                 DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                (device_id, key, value),
            )?;
            Ok(())
        })
    }

    /// Returns whether a value was actually removed.
    pub fn remove_item(&self, device_id: &str, key: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM device_storage WHERE device_id = ?1 AND key = ?2",
                [device_id, key],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn list_items(&self, device_id: &str) -> Result<Vec<StorageItemRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT device_id, key, value, updated_at FROM device_storage
                 WHERE device_id = ?1 ORDER BY key",
            )?;

            let rows = stmt
                .query_map([device_id], |row| {
                    Ok(StorageItemRow {
                        device_id: row.get(0)?,
                        key: row.get(1)?,
                        value: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn upsert_device(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO devices (id) VALUES (?1)
         ON CONFLICT(id) DO UPDATE SET last_seen_at = datetime('now')",
        [id],
    )?;
    Ok(())
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
