//! LanceDB connection helpers.

use arrow_array::RecordBatchIterator;
use arrow_schema::Schema;
use lancedb::{connect, Connection, Table};
use std::sync::Arc;

use docqa_core::{Error, Result};

pub(crate) fn store_err(e: impl std::fmt::Display) -> Error {
	Error::StoreUnavailable(e.to_string())
}

pub async fn open_db(uri: &str) -> Result<Connection> {
	connect(uri).execute().await.map_err(store_err)
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<()> {
	let names = conn.table_names().execute().await.map_err(store_err)?;
	if names.iter().any(|n| n == name) {
		return Ok(());
	}
	// create empty table with 0 rows
	let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
	conn.create_table(name, Box::new(iter)).execute().await.map_err(store_err)?;
	Ok(())
}

pub async fn open_or_create(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<Table> {
	ensure_table(conn, name, schema).await?;
	conn.open_table(name).execute().await.map_err(store_err)
}
