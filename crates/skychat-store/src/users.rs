use rusqlite::{params, OptionalExtension};

use skychat_shared::{RepositoryError, User, UserRepository};

use crate::database::Database;
use crate::error::StoreError;

impl UserRepository for Database {
    fn get_user(&self) -> Result<User, RepositoryError> {
        let conn = self.conn()?;
        let doc: Option<String> = conn
            .query_row("SELECT document FROM local_user WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(StoreError::from)?;
        let doc = doc.ok_or(RepositoryError::UserNotFound)?;
        Ok(serde_json::from_str(&doc).map_err(StoreError::from)?)
    }

    fn set_user(&self, user: User) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        let doc = serde_json::to_string(&user).map_err(StoreError::from)?;
        conn.execute(
            "INSERT INTO local_user (id, document) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET document = excluded.document",
            params![doc],
        )
        .map_err(StoreError::from)?;
        Ok(())
    }
}
