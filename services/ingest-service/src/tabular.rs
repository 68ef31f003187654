use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

use crate::models::Cell;

/// Append-only spreadsheet-like store: documents hold named sheets, sheets
/// hold ordered rows. The first row of a sheet is its header.
#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn open_document(&self, document_id: &str) -> Result<(), String>;

    async fn find_sheet(&self, document_id: &str, name: &str) -> Result<bool, String>;

    /// Creates the sheet with `header` as its first row unless it already
    /// exists. Sheet and header appear atomically. Returns whether this call
    /// created it.
    async fn create_sheet(
        &self,
        document_id: &str,
        name: &str,
        header: &[&str],
    ) -> Result<bool, String>;

    async fn append_row(&self, document_id: &str, name: &str, row: &[Cell]) -> Result<(), String>;

    async fn ping(&self) -> Result<(), String>;
}

#[derive(Default)]
struct MemoryDocuments {
    known: HashSet<String>,
    sheets: HashMap<(String, String), Vec<Vec<Cell>>>,
}

/// Process-local backend for development runs and tests.
#[derive(Default)]
pub struct MemoryTabularStore {
    inner: Mutex<MemoryDocuments>,
}

impl MemoryTabularStore {
    pub fn with_document(document_id: &str) -> Self {
        let mut documents = MemoryDocuments::default();
        documents.known.insert(document_id.to_string());
        Self {
            inner: Mutex::new(documents),
        }
    }

    #[cfg(test)]
    pub async fn rows(&self, document_id: &str, name: &str) -> Vec<Vec<Cell>> {
        let inner = self.inner.lock().await;
        inner
            .sheets
            .get(&(document_id.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TabularStore for MemoryTabularStore {
    async fn open_document(&self, document_id: &str) -> Result<(), String> {
        let inner = self.inner.lock().await;
        if inner.known.contains(document_id) {
            Ok(())
        } else {
            Err(format!("document {document_id} not found"))
        }
    }

    async fn find_sheet(&self, document_id: &str, name: &str) -> Result<bool, String> {
        let inner = self.inner.lock().await;
        Ok(inner
            .sheets
            .contains_key(&(document_id.to_string(), name.to_string())))
    }

    async fn create_sheet(
        &self,
        document_id: &str,
        name: &str,
        header: &[&str],
    ) -> Result<bool, String> {
        let mut inner = self.inner.lock().await;
        if !inner.known.contains(document_id) {
            return Err(format!("document {document_id} not found"));
        }
        let key = (document_id.to_string(), name.to_string());
        if inner.sheets.contains_key(&key) {
            return Ok(false);
        }
        let header_row = header.iter().map(|column| Cell::from(*column)).collect();
        inner.sheets.insert(key, vec![header_row]);
        Ok(true)
    }

    async fn append_row(&self, document_id: &str, name: &str, row: &[Cell]) -> Result<(), String> {
        let mut inner = self.inner.lock().await;
        let rows = inner
            .sheets
            .get_mut(&(document_id.to_string(), name.to_string()))
            .ok_or_else(|| format!("sheet {name} not found"))?;
        rows.push(row.to_vec());
        Ok(())
    }

    async fn ping(&self) -> Result<(), String> {
        Ok(())
    }
}
