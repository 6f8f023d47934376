#![forbid(unsafe_code)]

use crate::{NewUser, SqliteStore, StoreError, UserRow, now_ms};
use rusqlite::{OptionalExtension, Transaction, params};
use st_core::model::GlobalRole;

impl SqliteStore {
    /// Register a user record. Credentials live with the outer auth layer;
    /// the store only keeps the identity fields the engine needs.
    pub fn user_create(&mut self, request: NewUser) -> Result<UserRow, StoreError> {
        let NewUser {
            id,
            email,
            username,
            display_name,
            role,
        } = request;

        if id.trim().is_empty() {
            return Err(StoreError::InvalidInput("user id must not be empty"));
        }
        if email.trim().is_empty() || !email.contains('@') {
            return Err(StoreError::InvalidInput("email must contain @"));
        }
        if username.trim().is_empty() {
            return Err(StoreError::InvalidInput("username must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        let email_taken = tx
            .query_row(
                "SELECT 1 FROM users WHERE email = ?1",
                params![&email],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if email_taken {
            return Err(StoreError::UserExists("email"));
        }
        let username_taken = tx
            .query_row(
                "SELECT 1 FROM users WHERE username = ?1",
                params![&username],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if username_taken {
            return Err(StoreError::UserExists("username"));
        }
        let id_taken = tx
            .query_row("SELECT 1 FROM users WHERE id = ?1", params![&id], |_| Ok(()))
            .optional()?
            .is_some();
        if id_taken {
            return Err(StoreError::UserExists("id"));
        }

        tx.execute(
            r#"
            INSERT INTO users(id, email, username, display_name, role, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![&id, &email, &username, &display_name, role.as_str(), now_ms],
        )?;
        tx.commit()?;

        Ok(UserRow {
            id,
            email,
            username,
            display_name,
            role,
            created_at_ms: now_ms,
        })
    }

    pub fn user_get(&self, id: &str) -> Result<Option<UserRow>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, email, username, display_name, role, created_at_ms FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()?)
    }

    pub fn user_get_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, email, username, display_name, role, created_at_ms FROM users WHERE username = ?1",
                params![username],
                user_from_row,
            )
            .optional()?)
    }
}

pub(crate) fn user_exists_tx(tx: &Transaction<'_>, user_id: &str) -> Result<bool, StoreError> {
    Ok(tx
        .query_row("SELECT 1 FROM users WHERE id = ?1", params![user_id], |_| {
            Ok(())
        })
        .optional()?
        .is_some())
}

pub(crate) fn user_id_by_username_tx(
    tx: &Transaction<'_>,
    username: &str,
) -> Result<Option<String>, StoreError> {
    Ok(tx
        .query_row(
            "SELECT id FROM users WHERE username = ?1",
            params![username],
            |row| row.get::<_, String>(0),
        )
        .optional()?)
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    let raw_role: String = row.get(4)?;
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        display_name: row.get(3)?,
        role: GlobalRole::parse(&raw_role).unwrap_or(GlobalRole::User),
        created_at_ms: row.get(5)?,
    })
}
