use crate::{from_secs, now_secs, Store, StoreError, UserOverview, UserProfile};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;

impl Store {
    /// Creates the user on first contact, otherwise refreshes the display fields.
    pub fn upsert_user(&self, profile: &UserProfile) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            upsert_user_tx(&tx, profile)?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Every user with the folders they follow, for the admin listing.
    pub fn users_overview(&self) -> Result<Vec<UserOverview>, StoreError> {
        self.with_conn(|conn| {
            let mut users: BTreeMap<i64, UserOverview> = BTreeMap::new();

            let mut stmt = conn.prepare(
                "SELECT id, tg_id, username, first_name, last_name, created_at FROM users ORDER BY id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(UserOverview {
                    id: row.get(0)?,
                    profile: UserProfile {
                        tg_id: row.get(1)?,
                        username: row.get(2)?,
                        first_name: row.get(3)?,
                        last_name: row.get(4)?,
                    },
                    created_at: from_secs(row.get(5)?),
                    folders: Vec::new(),
                })
            })?;
            for user in rows {
                let user = user?;
                users.insert(user.id, user);
            }

            let mut stmt = conn.prepare(
                "SELECT user_id, folder_path FROM folder_subscriptions ORDER BY user_id, id",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
            for row in rows {
                let (user_id, folder) = row?;
                if let Some(user) = users.get_mut(&user_id) {
                    user.folders.push(folder);
                }
            }

            Ok(users.into_values().collect())
        })
    }
}

/// Upserts inside an open transaction and returns the internal user id.
pub(crate) fn upsert_user_tx(conn: &Connection, profile: &UserProfile) -> Result<i64, StoreError> {
    conn.execute(
        r#"
        INSERT INTO users(tg_id, username, first_name, last_name, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(tg_id) DO UPDATE SET
          username=excluded.username,
          first_name=excluded.first_name,
          last_name=excluded.last_name
        "#,
        params![
            profile.tg_id,
            profile.username,
            profile.first_name,
            profile.last_name,
            now_secs()
        ],
    )?;
    Ok(conn.query_row(
        "SELECT id FROM users WHERE tg_id = ?1",
        params![profile.tg_id],
        |row| row.get(0),
    )?)
}
