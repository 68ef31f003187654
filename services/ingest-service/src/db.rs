use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::Client;

use crate::models::Cell;
use crate::tabular::TabularStore;

const SQL_CREATE_SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE TABLE IF NOT EXISTS sheets (
    document_id TEXT NOT NULL REFERENCES documents (id),
    name TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (document_id, name)
);
CREATE TABLE IF NOT EXISTS sheet_rows (
    id BIGSERIAL PRIMARY KEY,
    document_id TEXT NOT NULL,
    sheet_name TEXT NOT NULL,
    cells JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    FOREIGN KEY (document_id, sheet_name) REFERENCES sheets (document_id, name)
);";
const SQL_REGISTER_DOCUMENT: &str =
    "INSERT INTO documents (id) VALUES ($1) ON CONFLICT (id) DO NOTHING";
const SQL_SELECT_DOCUMENT: &str = "SELECT id FROM documents WHERE id = $1";
const SQL_SELECT_SHEET: &str = "SELECT name FROM sheets WHERE document_id = $1 AND name = $2";
const SQL_INSERT_SHEET: &str = "INSERT INTO sheets (document_id, name) VALUES ($1, $2) \
ON CONFLICT (document_id, name) DO NOTHING";
const SQL_INSERT_ROW: &str =
    "INSERT INTO sheet_rows (document_id, sheet_name, cells) VALUES ($1, $2, $3)";

/// Tabular store backed by PostgreSQL. Rows are JSONB arrays ordered by
/// their serial id.
#[derive(Clone)]
pub struct PostgresTabularStore {
    db: Arc<Mutex<Client>>,
}

impl PostgresTabularStore {
    pub fn new(db: Client) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Creates the backing tables and registers `document_id` so that
    /// `open_document` can find it.
    pub async fn ensure_schema(&self, document_id: &str) -> Result<(), String> {
        let db = self.db.lock().await;
        db.batch_execute(SQL_CREATE_SCHEMA)
            .await
            .map_err(|err| format!("create schema failed: {err}"))?;
        db.execute(SQL_REGISTER_DOCUMENT, &[&document_id])
            .await
            .map_err(|err| format!("register document failed: {err}"))?;
        Ok(())
    }
}

fn row_json(row: &[Cell]) -> Result<serde_json::Value, String> {
    serde_json::to_value(row).map_err(|err| format!("encode row failed: {err}"))
}

#[async_trait]
impl TabularStore for PostgresTabularStore {
    async fn open_document(&self, document_id: &str) -> Result<(), String> {
        let db = self.db.lock().await;
        let row = db
            .query_opt(SQL_SELECT_DOCUMENT, &[&document_id])
            .await
            .map_err(|err| format!("open document failed: {err}"))?;
        match row {
            Some(_) => Ok(()),
            None => Err(format!("document {document_id} not found")),
        }
    }

    async fn find_sheet(&self, document_id: &str, name: &str) -> Result<bool, String> {
        let db = self.db.lock().await;
        let row = db
            .query_opt(SQL_SELECT_SHEET, &[&document_id, &name])
            .await
            .map_err(|err| format!("select sheet failed: {err}"))?;
        Ok(row.is_some())
    }

    async fn create_sheet(
        &self,
        document_id: &str,
        name: &str,
        header: &[&str],
    ) -> Result<bool, String> {
        let header_row: Vec<Cell> = header.iter().map(|column| Cell::from(*column)).collect();
        let header_json = row_json(&header_row)?;

        let mut db = self.db.lock().await;
        let transaction = db
            .transaction()
            .await
            .map_err(|err| format!("start transaction failed: {err}"))?;
        // The primary key decides the race; only the winner writes a header.
        let inserted = transaction
            .execute(SQL_INSERT_SHEET, &[&document_id, &name])
            .await
            .map_err(|err| format!("create sheet failed: {err}"))?;
        if inserted == 0 {
            return Ok(false);
        }
        transaction
            .execute(SQL_INSERT_ROW, &[&document_id, &name, &header_json])
            .await
            .map_err(|err| format!("write header failed: {err}"))?;
        transaction
            .commit()
            .await
            .map_err(|err| format!("commit failed: {err}"))?;
        Ok(true)
    }

    async fn append_row(&self, document_id: &str, name: &str, row: &[Cell]) -> Result<(), String> {
        let cells = row_json(row)?;
        let db = self.db.lock().await;
        db.execute(SQL_INSERT_ROW, &[&document_id, &name, &cells])
            .await
            .map_err(|err| format!("append row failed: {err}"))?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), String> {
        let db = self.db.lock().await;
        db.simple_query("SELECT 1")
            .await
            .map_err(|err| format!("ping failed: {err}"))?;
        Ok(())
    }
}
