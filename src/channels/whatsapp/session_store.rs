//! SQLite-backed WhatsApp session persistence.
//!
//! Implements `wacore::store` backend traits on top of `sqlx`, so pairing
//! survives restarts. Holds Signal protocol keys, app-state sync data and
//! the serialized device record; bridge message data never touches this
//! database.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use wacore::appstate::hash::HashState;
use wacore::appstate::processor::AppStateMutationMAC;
use wacore::store::error::{db_err, Result, StoreError};
use wacore::store::traits::{
    AppStateSyncKey, AppSyncStore, DeviceListRecord, DeviceStore, LidPnMappingEntry, ProtocolStore,
    SignalStore,
};
use wacore::store::Device;

const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS device (
        id          INTEGER PRIMARY KEY,
        data        BLOB NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS signal_identities (
        address     TEXT NOT NULL,
        device_id   INTEGER NOT NULL,
        key         BLOB NOT NULL,
        PRIMARY KEY (address, device_id)
    )",
    "CREATE TABLE IF NOT EXISTS signal_sessions (
        address     TEXT NOT NULL,
        device_id   INTEGER NOT NULL,
        record      BLOB NOT NULL,
        PRIMARY KEY (address, device_id)
    )",
    "CREATE TABLE IF NOT EXISTS signal_prekeys (
        id          INTEGER NOT NULL,
        device_id   INTEGER NOT NULL,
        record      BLOB NOT NULL,
        uploaded    INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (id, device_id)
    )",
    "CREATE TABLE IF NOT EXISTS signal_signed_prekeys (
        id          INTEGER NOT NULL,
        device_id   INTEGER NOT NULL,
        record      BLOB NOT NULL,
        PRIMARY KEY (id, device_id)
    )",
    "CREATE TABLE IF NOT EXISTS signal_sender_keys (
        address     TEXT NOT NULL,
        device_id   INTEGER NOT NULL,
        record      BLOB NOT NULL,
        PRIMARY KEY (address, device_id)
    )",
    "CREATE TABLE IF NOT EXISTS appstate_keys (
        key_id      BLOB NOT NULL,
        device_id   INTEGER NOT NULL,
        data        TEXT NOT NULL,
        PRIMARY KEY (key_id, device_id)
    )",
    "CREATE TABLE IF NOT EXISTS appstate_versions (
        name        TEXT NOT NULL,
        device_id   INTEGER NOT NULL,
        data        TEXT NOT NULL,
        PRIMARY KEY (name, device_id)
    )",
    "CREATE TABLE IF NOT EXISTS appstate_mutation_macs (
        name        TEXT NOT NULL,
        version     INTEGER NOT NULL,
        index_mac   BLOB NOT NULL,
        value_mac   BLOB NOT NULL,
        device_id   INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_appstate_macs_lookup
        ON appstate_mutation_macs (name, index_mac, device_id)",
    "CREATE TABLE IF NOT EXISTS skdm_recipients (
        group_jid   TEXT NOT NULL,
        device_jid  TEXT NOT NULL,
        device_id   INTEGER NOT NULL,
        PRIMARY KEY (group_jid, device_jid, device_id)
    )",
    "CREATE TABLE IF NOT EXISTS lid_pn_map (
        lid             TEXT NOT NULL,
        phone_number    TEXT NOT NULL,
        created_at      INTEGER NOT NULL,
        updated_at      INTEGER NOT NULL,
        learning_source TEXT NOT NULL DEFAULT '',
        device_id       INTEGER NOT NULL,
        PRIMARY KEY (lid, device_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_lid_pn_phone
        ON lid_pn_map (phone_number, device_id)",
    "CREATE TABLE IF NOT EXISTS base_keys (
        address     TEXT NOT NULL,
        message_id  TEXT NOT NULL,
        base_key    BLOB NOT NULL,
        device_id   INTEGER NOT NULL,
        PRIMARY KEY (address, message_id, device_id)
    )",
    "CREATE TABLE IF NOT EXISTS device_lists (
        user        TEXT NOT NULL,
        device_id   INTEGER NOT NULL,
        data        TEXT NOT NULL,
        PRIMARY KEY (user, device_id)
    )",
    "CREATE TABLE IF NOT EXISTS sender_key_forget (
        group_jid   TEXT NOT NULL,
        participant TEXT NOT NULL,
        device_id   INTEGER NOT NULL,
        PRIMARY KEY (group_jid, participant, device_id)
    )",
];

/// Session database handle. Clone-cheap (pool is shared).
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
    device_id: i32,
}

impl SessionStore {
    /// Open or create the session database at `path` (`:memory:` in tests).
    pub async fn open(path: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        for stmt in MIGRATIONS {
            sqlx::query(stmt).execute(&pool).await.map_err(db_err)?;
        }

        Ok(Self { pool, device_id: 1 })
    }

    /// Whether a usable paired device record is present.
    pub async fn has_paired_device(&self) -> Result<bool> {
        let row = sqlx::query("SELECT data FROM device WHERE id = ?")
            .bind(self.device_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            Some(r) => {
                let data: Vec<u8> = r.get("data");
                Ok(rmp_serde::from_slice::<Device>(&data).is_ok())
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl DeviceStore for SessionStore {
    async fn save(&self, device: &Device) -> Result<()> {
        let bytes =
            rmp_serde::to_vec(device).map_err(|e| StoreError::Serialization(e.to_string()))?;
        sqlx::query(
            "INSERT INTO device (id, data) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data",
        )
        .bind(self.device_id)
        .bind(&bytes)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Device>> {
        let row = sqlx::query("SELECT data FROM device WHERE id = ?")
            .bind(self.device_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            Some(r) => {
                let data: Vec<u8> = r.get("data");
                match rmp_serde::from_slice(&data) {
                    Ok(device) => Ok(Some(device)),
                    Err(_) => {
                        // Unreadable device record forces a clean re-pair.
                        tracing::warn!("clearing unreadable device record, re-pair required");
                        let _ = sqlx::query("DELETE FROM device WHERE id = ?")
                            .bind(self.device_id)
                            .execute(&self.pool)
                            .await;
                        Ok(None)
                    }
                }
            }
            None => Ok(None),
        }
    }

    async fn exists(&self) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM device WHERE id = ?")
            .bind(self.device_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn create(&self) -> Result<i32> {
        Ok(self.device_id)
    }
}

#[async_trait]
impl SignalStore for SessionStore {
    async fn put_identity(&self, address: &str, key: [u8; 32]) -> Result<()> {
        sqlx::query(
            "INSERT INTO signal_identities (address, device_id, key) VALUES (?, ?, ?)
             ON CONFLICT(address, device_id) DO UPDATE SET key = excluded.key",
        )
        .bind(address)
        .bind(self.device_id)
        .bind(key.as_slice())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn load_identity(&self, address: &str) -> Result<Option<Vec<u8>>> {
        let row =
            sqlx::query("SELECT key FROM signal_identities WHERE address = ? AND device_id = ?")
                .bind(address)
                .bind(self.device_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(|r| r.get("key")))
    }

    async fn delete_identity(&self, address: &str) -> Result<()> {
        sqlx::query("DELETE FROM signal_identities WHERE address = ? AND device_id = ?")
            .bind(address)
            .bind(self.device_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_session(&self, address: &str) -> Result<Option<Vec<u8>>> {
        let row =
            sqlx::query("SELECT record FROM signal_sessions WHERE address = ? AND device_id = ?")
                .bind(address)
                .bind(self.device_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(|r| r.get("record")))
    }

    async fn put_session(&self, address: &str, session: &[u8]) -> Result<()> {
        sqlx::query(
            "INSERT INTO signal_sessions (address, device_id, record) VALUES (?, ?, ?)
             ON CONFLICT(address, device_id) DO UPDATE SET record = excluded.record",
        )
        .bind(address)
        .bind(self.device_id)
        .bind(session)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn delete_session(&self, address: &str) -> Result<()> {
        sqlx::query("DELETE FROM signal_sessions WHERE address = ? AND device_id = ?")
            .bind(address)
            .bind(self.device_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn store_prekey(&self, id: u32, record: &[u8], uploaded: bool) -> Result<()> {
        sqlx::query(
            "INSERT INTO signal_prekeys (id, device_id, record, uploaded) VALUES (?, ?, ?, ?)
             ON CONFLICT(id, device_id) DO UPDATE SET record = excluded.record, uploaded = excluded.uploaded",
        )
        .bind(id)
        .bind(self.device_id)
        .bind(record)
        .bind(uploaded)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn load_prekey(&self, id: u32) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT record FROM signal_prekeys WHERE id = ? AND device_id = ?")
            .bind(id)
            .bind(self.device_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|r| r.get("record")))
    }

    async fn remove_prekey(&self, id: u32) -> Result<()> {
        sqlx::query("DELETE FROM signal_prekeys WHERE id = ? AND device_id = ?")
            .bind(id)
            .bind(self.device_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn store_signed_prekey(&self, id: u32, record: &[u8]) -> Result<()> {
        sqlx::query(
            "INSERT INTO signal_signed_prekeys (id, device_id, record) VALUES (?, ?, ?)
             ON CONFLICT(id, device_id) DO UPDATE SET record = excluded.record",
        )
        .bind(id)
        .bind(self.device_id)
        .bind(record)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn load_signed_prekey(&self, id: u32) -> Result<Option<Vec<u8>>> {
        let row =
            sqlx::query("SELECT record FROM signal_signed_prekeys WHERE id = ? AND device_id = ?")
                .bind(id)
                .bind(self.device_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(|r| r.get("record")))
    }

    async fn load_all_signed_prekeys(&self) -> Result<Vec<(u32, Vec<u8>)>> {
        let rows = sqlx::query("SELECT id, record FROM signal_signed_prekeys WHERE device_id = ?")
            .bind(self.device_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let id: u32 = r.get::<i64, _>("id") as u32;
                let record: Vec<u8> = r.get("record");
                (id, record)
            })
            .collect())
    }

    async fn remove_signed_prekey(&self, id: u32) -> Result<()> {
        sqlx::query("DELETE FROM signal_signed_prekeys WHERE id = ? AND device_id = ?")
            .bind(id)
            .bind(self.device_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn put_sender_key(&self, address: &str, record: &[u8]) -> Result<()> {
        sqlx::query(
            "INSERT INTO signal_sender_keys (address, device_id, record) VALUES (?, ?, ?)
             ON CONFLICT(address, device_id) DO UPDATE SET record = excluded.record",
        )
        .bind(address)
        .bind(self.device_id)
        .bind(record)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_sender_key(&self, address: &str) -> Result<Option<Vec<u8>>> {
        let row =
            sqlx::query("SELECT record FROM signal_sender_keys WHERE address = ? AND device_id = ?")
                .bind(address)
                .bind(self.device_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(|r| r.get("record")))
    }

    async fn delete_sender_key(&self, address: &str) -> Result<()> {
        sqlx::query("DELETE FROM signal_sender_keys WHERE address = ? AND device_id = ?")
            .bind(address)
            .bind(self.device_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl AppSyncStore for SessionStore {
    async fn get_sync_key(&self, key_id: &[u8]) -> Result<Option<AppStateSyncKey>> {
        let row = sqlx::query("SELECT data FROM appstate_keys WHERE key_id = ? AND device_id = ?")
            .bind(key_id)
            .bind(self.device_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            Some(r) => {
                let json: String = r.get("data");
                let key: AppStateSyncKey = serde_json::from_str(&json)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(key))
            }
            None => Ok(None),
        }
    }

    async fn set_sync_key(&self, key_id: &[u8], key: AppStateSyncKey) -> Result<()> {
        let json =
            serde_json::to_string(&key).map_err(|e| StoreError::Serialization(e.to_string()))?;
        sqlx::query(
            "INSERT INTO appstate_keys (key_id, device_id, data) VALUES (?, ?, ?)
             ON CONFLICT(key_id, device_id) DO UPDATE SET data = excluded.data",
        )
        .bind(key_id)
        .bind(self.device_id)
        .bind(&json)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_version(&self, name: &str) -> Result<HashState> {
        let row = sqlx::query("SELECT data FROM appstate_versions WHERE name = ? AND device_id = ?")
            .bind(name)
            .bind(self.device_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            Some(r) => {
                let json: String = r.get("data");
                serde_json::from_str(&json).map_err(|e| StoreError::Serialization(e.to_string()))
            }
            None => Ok(HashState::default()),
        }
    }

    async fn set_version(&self, name: &str, state: HashState) -> Result<()> {
        let json =
            serde_json::to_string(&state).map_err(|e| StoreError::Serialization(e.to_string()))?;
        sqlx::query(
            "INSERT INTO appstate_versions (name, device_id, data) VALUES (?, ?, ?)
             ON CONFLICT(name, device_id) DO UPDATE SET data = excluded.data",
        )
        .bind(name)
        .bind(self.device_id)
        .bind(&json)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn put_mutation_macs(
        &self,
        name: &str,
        version: u64,
        mutations: &[AppStateMutationMAC],
    ) -> Result<()> {
        for m in mutations {
            sqlx::query(
                "INSERT INTO appstate_mutation_macs (name, version, index_mac, value_mac, device_id)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(name)
            .bind(version as i64)
            .bind(&m.index_mac)
            .bind(&m.value_mac)
            .bind(self.device_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }
        Ok(())
    }

    async fn get_mutation_mac(&self, name: &str, index_mac: &[u8]) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query(
            "SELECT value_mac FROM appstate_mutation_macs
             WHERE name = ? AND index_mac = ? AND device_id = ?",
        )
        .bind(name)
        .bind(index_mac)
        .bind(self.device_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(|r| r.get("value_mac")))
    }

    async fn delete_mutation_macs(&self, name: &str, index_macs: &[Vec<u8>]) -> Result<()> {
        for mac in index_macs {
            sqlx::query(
                "DELETE FROM appstate_mutation_macs
                 WHERE name = ? AND index_mac = ? AND device_id = ?",
            )
            .bind(name)
            .bind(mac.as_slice())
            .bind(self.device_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProtocolStore for SessionStore {
    async fn get_skdm_recipients(&self, group_jid: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT device_jid FROM skdm_recipients WHERE group_jid = ? AND device_id = ?",
        )
        .bind(group_jid)
        .bind(self.device_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(|r| r.get("device_jid")).collect())
    }

    async fn add_skdm_recipients(&self, group_jid: &str, device_jids: &[String]) -> Result<()> {
        for jid in device_jids {
            sqlx::query(
                "INSERT OR IGNORE INTO skdm_recipients (group_jid, device_jid, device_id)
                 VALUES (?, ?, ?)",
            )
            .bind(group_jid)
            .bind(jid)
            .bind(self.device_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }
        Ok(())
    }

    async fn clear_skdm_recipients(&self, group_jid: &str) -> Result<()> {
        sqlx::query("DELETE FROM skdm_recipients WHERE group_jid = ? AND device_id = ?")
            .bind(group_jid)
            .bind(self.device_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_lid_mapping(&self, lid: &str) -> Result<Option<LidPnMappingEntry>> {
        let row = sqlx::query(
            "SELECT lid, phone_number, created_at, updated_at, learning_source
             FROM lid_pn_map WHERE lid = ? AND device_id = ?",
        )
        .bind(lid)
        .bind(self.device_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(map_lid_entry))
    }

    async fn get_pn_mapping(&self, phone: &str) -> Result<Option<LidPnMappingEntry>> {
        let row = sqlx::query(
            "SELECT lid, phone_number, created_at, updated_at, learning_source
             FROM lid_pn_map WHERE phone_number = ? AND device_id = ?",
        )
        .bind(phone)
        .bind(self.device_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(map_lid_entry))
    }

    async fn put_lid_mapping(&self, entry: &LidPnMappingEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO lid_pn_map (lid, phone_number, created_at, updated_at, learning_source, device_id)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(lid, device_id) DO UPDATE SET
                phone_number = excluded.phone_number,
                updated_at = excluded.updated_at,
                learning_source = excluded.learning_source",
        )
        .bind(&entry.lid)
        .bind(&entry.phone_number)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .bind(&entry.learning_source)
        .bind(self.device_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_all_lid_mappings(&self) -> Result<Vec<LidPnMappingEntry>> {
        let rows = sqlx::query(
            "SELECT lid, phone_number, created_at, updated_at, learning_source
             FROM lid_pn_map WHERE device_id = ?",
        )
        .bind(self.device_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(map_lid_entry).collect())
    }

    async fn save_base_key(&self, address: &str, message_id: &str, base_key: &[u8]) -> Result<()> {
        sqlx::query(
            "INSERT INTO base_keys (address, message_id, base_key, device_id) VALUES (?, ?, ?, ?)
             ON CONFLICT(address, message_id, device_id) DO UPDATE SET base_key = excluded.base_key",
        )
        .bind(address)
        .bind(message_id)
        .bind(base_key)
        .bind(self.device_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn has_same_base_key(
        &self,
        address: &str,
        message_id: &str,
        current_base_key: &[u8],
    ) -> Result<bool> {
        let row = sqlx::query(
            "SELECT base_key FROM base_keys
             WHERE address = ? AND message_id = ? AND device_id = ?",
        )
        .bind(address)
        .bind(message_id)
        .bind(self.device_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        match row {
            Some(r) => {
                let stored: Vec<u8> = r.get("base_key");
                Ok(stored == current_base_key)
            }
            None => Ok(false),
        }
    }

    async fn delete_base_key(&self, address: &str, message_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM base_keys WHERE address = ? AND message_id = ? AND device_id = ?")
            .bind(address)
            .bind(message_id)
            .bind(self.device_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_device_list(&self, record: DeviceListRecord) -> Result<()> {
        let json =
            serde_json::to_string(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        sqlx::query(
            "INSERT INTO device_lists (user, device_id, data) VALUES (?, ?, ?)
             ON CONFLICT(user, device_id) DO UPDATE SET data = excluded.data",
        )
        .bind(&record.user)
        .bind(self.device_id)
        .bind(&json)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_devices(&self, user: &str) -> Result<Option<DeviceListRecord>> {
        let row = sqlx::query("SELECT data FROM device_lists WHERE user = ? AND device_id = ?")
            .bind(user)
            .bind(self.device_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            Some(r) => {
                let json: String = r.get("data");
                let record: DeviceListRecord = serde_json::from_str(&json)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn mark_forget_sender_key(&self, group_jid: &str, participant: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO sender_key_forget (group_jid, participant, device_id)
             VALUES (?, ?, ?)",
        )
        .bind(group_jid)
        .bind(participant)
        .bind(self.device_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn consume_forget_marks(&self, group_jid: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT participant FROM sender_key_forget WHERE group_jid = ? AND device_id = ?",
        )
        .bind(group_jid)
        .bind(self.device_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let participants: Vec<String> = rows.into_iter().map(|r| r.get("participant")).collect();

        if !participants.is_empty() {
            sqlx::query("DELETE FROM sender_key_forget WHERE group_jid = ? AND device_id = ?")
                .bind(group_jid)
                .bind(self.device_id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }
        Ok(participants)
    }
}

fn map_lid_entry(r: sqlx::sqlite::SqliteRow) -> LidPnMappingEntry {
    LidPnMappingEntry {
        lid: r.get("lid"),
        phone_number: r.get("phone_number"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
        learning_source: r.get("learning_source"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn open_memory() -> SessionStore {
        SessionStore::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_unpaired_by_default() {
        let store = open_memory().await;
        assert!(!store.has_paired_device().await.unwrap());
        assert!(!store.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_identity_roundtrip() {
        let store = open_memory().await;
        let key = [7u8; 32];
        store.put_identity("5511999999999.0", key).await.unwrap();
        let loaded = store.load_identity("5511999999999.0").await.unwrap();
        assert_eq!(loaded.unwrap(), key.to_vec());

        store.delete_identity("5511999999999.0").await.unwrap();
        assert!(store.load_identity("5511999999999.0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_upsert() {
        let store = open_memory().await;
        store.put_session("peer", b"v1").await.unwrap();
        store.put_session("peer", b"v2").await.unwrap();
        assert_eq!(store.get_session("peer").await.unwrap().unwrap(), b"v2");
        assert!(store.get_session("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prekey_lifecycle() {
        let store = open_memory().await;
        store.store_prekey(3, b"pk", false).await.unwrap();
        assert_eq!(store.load_prekey(3).await.unwrap().unwrap(), b"pk");
        store.remove_prekey(3).await.unwrap();
        assert!(store.load_prekey(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_signed_prekeys_listed() {
        let store = open_memory().await;
        store.store_signed_prekey(1, b"a").await.unwrap();
        store.store_signed_prekey(2, b"b").await.unwrap();
        let mut all = store.load_all_signed_prekeys().await.unwrap();
        all.sort_by_key(|(id, _)| *id);
        assert_eq!(all, vec![(1, b"a".to_vec()), (2, b"b".to_vec())]);
    }

    #[tokio::test]
    async fn test_version_defaults_to_empty_state() {
        let store = open_memory().await;
        let state = store.get_version("regular").await.unwrap();
        assert_eq!(state.version, 0);
    }

    #[tokio::test]
    async fn test_mutation_macs() {
        let store = open_memory().await;
        let macs = vec![
            AppStateMutationMAC {
                index_mac: vec![1],
                value_mac: vec![2],
            },
            AppStateMutationMAC {
                index_mac: vec![3],
                value_mac: vec![4],
            },
        ];
        store.put_mutation_macs("regular", 7, &macs).await.unwrap();
        assert_eq!(
            store.get_mutation_mac("regular", &[1]).await.unwrap(),
            Some(vec![2])
        );
        store.delete_mutation_macs("regular", &[vec![1]]).await.unwrap();
        assert!(store.get_mutation_mac("regular", &[1]).await.unwrap().is_none());
        assert!(store.get_mutation_mac("regular", &[3]).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lid_mapping_both_directions() {
        let store = open_memory().await;
        let entry = LidPnMappingEntry {
            lid: "12345@lid".into(),
            phone_number: "5511999999999".into(),
            created_at: 10,
            updated_at: 20,
            learning_source: "message".into(),
        };
        store.put_lid_mapping(&entry).await.unwrap();
        assert_eq!(
            store.get_lid_mapping("12345@lid").await.unwrap().unwrap().phone_number,
            "5511999999999"
        );
        assert_eq!(
            store.get_pn_mapping("5511999999999").await.unwrap().unwrap().lid,
            "12345@lid"
        );
        assert_eq!(store.get_all_lid_mappings().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_base_key_comparison() {
        let store = open_memory().await;
        store.save_base_key("peer", "m1", b"bk").await.unwrap();
        assert!(store.has_same_base_key("peer", "m1", b"bk").await.unwrap());
        assert!(!store.has_same_base_key("peer", "m1", b"other").await.unwrap());
        assert!(!store.has_same_base_key("peer", "m2", b"bk").await.unwrap());
    }

    #[tokio::test]
    async fn test_forget_marks_consumed_once() {
        let store = open_memory().await;
        store.mark_forget_sender_key("g1", "p1").await.unwrap();
        store.mark_forget_sender_key("g1", "p2").await.unwrap();
        assert_eq!(store.consume_forget_marks("g1").await.unwrap().len(), 2);
        assert!(store.consume_forget_marks("g1").await.unwrap().is_empty());
    }
}
