use crate::users::upsert_user_tx;
use crate::{from_secs, now_secs, Store, StoreError, Subscription, UserProfile};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

const SELECT_SUBSCRIPTION: &str = r#"
    SELECT s.id, s.user_id, u.tg_id, s.folder_path, s.last_modified, s.created_at
    FROM folder_subscriptions s
    JOIN users u ON u.id = s.user_id
"#;

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        tg_id: row.get(2)?,
        folder_path: row.get(3)?,
        last_modified: row.get::<_, Option<i64>>(4)?.map(from_secs),
        created_at: from_secs(row.get(5)?),
    })
}

impl Store {
    /// Subscribes the user to `folder_path`, registering the user if needed.
    /// Returns `false` when the subscription already existed.
    pub fn subscribe(&self, profile: &UserProfile, folder_path: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let user_id = upsert_user_tx(&tx, profile)?;
            let inserted = tx.execute(
                r#"
                INSERT OR IGNORE INTO folder_subscriptions(user_id, folder_path, last_modified, created_at)
                VALUES (?1, ?2, NULL, ?3)
                "#,
                params![user_id, folder_path, now_secs()],
            )?;
            tx.commit()?;
            Ok(inserted > 0)
        })
    }

    /// Returns `false` when there was nothing to delete.
    pub fn unsubscribe(&self, tg_id: i64, folder_path: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute(
                r#"
                DELETE FROM folder_subscriptions
                WHERE folder_path = ?2
                  AND user_id = (SELECT id FROM users WHERE tg_id = ?1)
                "#,
                params![tg_id, folder_path],
            )?;
            tx.commit()?;
            Ok(deleted > 0)
        })
    }

    pub fn user_subscriptions(&self, tg_id: i64) -> Result<Vec<Subscription>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("{SELECT_SUBSCRIPTION} WHERE u.tg_id = ?1 ORDER BY s.folder_path");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![tg_id], subscription_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Snapshot of every subscription, in creation order. This is what one polling pass iterates.
    pub fn all_subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("{SELECT_SUBSCRIPTION} ORDER BY s.id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], subscription_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Stores the observed modification time, truncated to whole seconds.
    ///
    /// The stored value only ever moves forward: the update is skipped when the
    /// row already holds an equal or newer time, or when the row was deleted.
    /// Returns whether a row changed.
    pub fn record_modified(&self, subscription_id: i64, modified: DateTime<Utc>) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                r#"
                UPDATE folder_subscriptions
                SET last_modified = ?2
                WHERE id = ?1 AND (last_modified IS NULL OR last_modified < ?2)
                "#,
                params![subscription_id, modified.timestamp()],
            )?;
            tx.commit()?;
            Ok(updated > 0)
        })
    }
}
