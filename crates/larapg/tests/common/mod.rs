use larapg::{OrmError, OrmResult};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_postgres::{Client, NoTls};

/// A connection whose `search_path` is a fresh, empty schema.
pub struct ScratchDb {
    pub client: Client,
    pub schema: String,
}

impl ScratchDb {
    /// `None` when `DATABASE_URL` is unset.
    pub async fn connect(test: &str) -> OrmResult<Option<Self>> {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(v) => v,
            Err(_) => {
                eprintln!("DATABASE_URL is not set; skipping {test}");
                return Ok(None);
            }
        };

        let (client, connection) = tokio_postgres::connect(&database_url, NoTls)
            .await
            .map_err(OrmError::from_db_error)?;
        tokio::spawn(async move {
            let _ = connection.await;
        });

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before UNIX_EPOCH")
            .as_nanos();
        let schema = format!("larapg_{test}_{}_{nanos}", std::process::id());
        client
            .batch_execute(&format!(
                "CREATE SCHEMA \"{schema}\"; SET search_path TO \"{schema}\""
            ))
            .await
            .map_err(OrmError::from_db_error)?;

        Ok(Some(Self { client, schema }))
    }

    pub async fn cleanup(self) -> OrmResult<()> {
        self.client
            .batch_execute(&format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", self.schema))
            .await
            .map_err(OrmError::from_db_error)
    }
}
