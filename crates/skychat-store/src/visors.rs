use rusqlite::{params, Connection, OptionalExtension};

use skychat_shared::repository::Mutation;
use skychat_shared::{PeerId, RepositoryError, Visor, VisorRepository};

use crate::database::Database;
use crate::error::{Result, StoreError};

fn load(conn: &Connection, pk: &PeerId) -> Result<Option<Visor>> {
    let doc: Option<String> = conn
        .query_row(
            "SELECT document FROM visors WHERE pubkey = ?1",
            params![pk.to_hex()],
            |row| row.get(0),
        )
        .optional()?;
    match doc {
        Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
        None => Ok(None),
    }
}

fn store(conn: &Connection, visor: &Visor) -> Result<()> {
    let doc = serde_json::to_string(visor)?;
    conn.execute(
        "INSERT INTO visors (pubkey, document) VALUES (?1, ?2)
         ON CONFLICT(pubkey) DO UPDATE SET document = excluded.document",
        params![visor.pk().to_hex(), doc],
    )?;
    Ok(())
}

fn remove(conn: &Connection, pk: &PeerId) -> Result<bool> {
    let affected = conn.execute("DELETE FROM visors WHERE pubkey = ?1", params![pk.to_hex()])?;
    Ok(affected > 0)
}

impl Database {
    /// Read, mutate and write back inside one transaction.
    fn mutate(
        &self,
        pk: &PeerId,
        init: Option<&dyn Fn() -> Visor>,
        mutation: Mutation<'_>,
    ) -> std::result::Result<Visor, RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(StoreError::from)?;

        let mut visor = match (load(&tx, pk)?, init) {
            (Some(visor), _) => visor,
            (None, Some(init)) => init(),
            (None, None) => return Err(RepositoryError::NotFound(*pk)),
        };
        mutation(&mut visor)?;

        store(&tx, &visor)?;
        tx.commit().map_err(StoreError::from)?;

        tracing::debug!(visor = %pk.short(), "visor document updated");
        Ok(visor)
    }
}

impl VisorRepository for Database {
    fn get_by_pk(&self, pk: &PeerId) -> std::result::Result<Visor, RepositoryError> {
        let conn = self.conn()?;
        load(&conn, pk)?.ok_or(RepositoryError::NotFound(*pk))
    }

    fn get_all(&self) -> std::result::Result<Vec<Visor>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT document FROM visors ORDER BY pubkey")
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(StoreError::from)?;

        let mut visors = Vec::new();
        for row in rows {
            let doc = row.map_err(StoreError::from)?;
            visors.push(serde_json::from_str(&doc).map_err(StoreError::from)?);
        }
        Ok(visors)
    }

    fn add(&self, visor: Visor) -> std::result::Result<(), RepositoryError> {
        let conn = self.conn()?;
        if load(&conn, &visor.pk())?.is_some() {
            return Err(RepositoryError::AlreadyExists(visor.pk()));
        }
        store(&conn, &visor)?;
        Ok(())
    }

    fn set(&self, visor: Visor) -> std::result::Result<(), RepositoryError> {
        let conn = self.conn()?;
        if load(&conn, &visor.pk())?.is_none() {
            return Err(RepositoryError::NotFound(visor.pk()));
        }
        store(&conn, &visor)?;
        Ok(())
    }

    fn delete(&self, pk: &PeerId) -> std::result::Result<(), RepositoryError> {
        let conn = self.conn()?;
        if !remove(&conn, pk)? {
            return Err(RepositoryError::NotFound(*pk));
        }
        Ok(())
    }

    fn update(
        &self,
        pk: &PeerId,
        mutation: Mutation<'_>,
    ) -> std::result::Result<Visor, RepositoryError> {
        self.mutate(pk, None, mutation)
    }

    fn upsert(
        &self,
        pk: &PeerId,
        init: &dyn Fn() -> Visor,
        mutation: Mutation<'_>,
    ) -> std::result::Result<Visor, RepositoryError> {
        self.mutate(pk, Some(init), mutation)
    }

    fn delete_if(
        &self,
        pk: &PeerId,
        pred: &dyn Fn(&Visor) -> bool,
    ) -> std::result::Result<bool, RepositoryError> {
        let conn = self.conn()?;
        match load(&conn, pk)? {
            Some(visor) if pred(&visor) => Ok(remove(&conn, pk)?),
            _ => Ok(false),
        }
    }
}
