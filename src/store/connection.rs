//! Reusable MongoDB handle.
//!
//! A process may serve many requests before it is recycled, so the client is
//! built once and its [`Database`] handle reused until something marks it
//! broken. The cache is an ordinary value owned by the server state, not a
//! global. Concurrent first callers share one in-flight connect attempt and
//! see the same outcome; a failed attempt leaves the cache empty.

use futures::future::{BoxFuture, FutureExt, Shared};
use mongodb::bson::doc;
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ServiceConfig, MONGO_URI_ENV};
use crate::errors::{LeadError, LeadResult};

const APP_NAME: &str = "slv-leads";

type ConnectAttempt = Shared<BoxFuture<'static, LeadResult<Database>>>;

enum Slot {
    Empty,
    Connecting(ConnectAttempt),
    Ready(Database),
}

pub struct ConnectionCache {
    uri: Option<String>,
    db_name: String,
    max_pool_size: u32,
    slot: Mutex<Slot>,
}

impl ConnectionCache {
    pub fn new(uri: Option<String>, db_name: impl Into<String>, max_pool_size: u32) -> Self {
        Self {
            uri,
            db_name: db_name.into(),
            max_pool_size,
            slot: Mutex::new(Slot::Empty),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.mongo_uri.clone(),
            config.db_name.clone(),
            config.max_pool_size,
        )
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// Return the cached handle, connecting first if there is none.
    ///
    /// A missing connection string fails before any network activity. A
    /// failed connect is reported to every caller that joined the attempt
    /// and leaves the cache empty; the next call tries again.
    pub async fn handle(&self) -> LeadResult<Database> {
        let attempt = {
            let mut slot = self.slot.lock();
            match &*slot {
                Slot::Ready(database) => return Ok(database.clone()),
                Slot::Connecting(attempt) => attempt.clone(),
                Slot::Empty => {
                    let uri = self.uri.clone().ok_or_else(|| {
                        LeadError::configuration(format!("{MONGO_URI_ENV} missing in env"))
                    })?;
                    let attempt = connect(uri, self.db_name.clone(), self.max_pool_size)
                        .boxed()
                        .shared();
                    *slot = Slot::Connecting(attempt.clone());
                    attempt
                }
            }
        };

        let outcome = attempt.clone().await;

        let mut slot = self.slot.lock();
        let still_current =
            matches!(&*slot, Slot::Connecting(current) if current.ptr_eq(&attempt));
        if still_current {
            *slot = match &outcome {
                Ok(database) => Slot::Ready(database.clone()),
                Err(_) => Slot::Empty,
            };
        }
        outcome
    }

    /// Forget the cached handle so the next [`handle`](Self::handle) call
    /// reconnects. An attempt still in flight is left alone.
    pub fn invalidate(&self) {
        let mut slot = self.slot.lock();
        if matches!(&*slot, Slot::Ready(_)) {
            *slot = Slot::Empty;
            warn!(db = %self.db_name, "dropping cached database handle");
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(&*self.slot.lock(), Slot::Ready(_))
    }

    #[cfg(test)]
    pub(crate) fn install(&self, database: Database) {
        *self.slot.lock() = Slot::Ready(database);
    }
}

async fn connect(uri: String, db_name: String, max_pool_size: u32) -> LeadResult<Database> {
    let options = client_options(&uri, max_pool_size).await?;
    let client = Client::with_options(options).map_err(LeadError::connectivity)?;
    let database = client.database(&db_name);

    debug!(db = %db_name, "pinging MongoDB");
    database
        .run_command(doc! { "ping": 1 }, None)
        .await
        .map_err(LeadError::connectivity)?;

    info!(db = %db_name, max_pool_size, "connected to MongoDB");
    Ok(database)
}

async fn client_options(uri: &str, max_pool_size: u32) -> LeadResult<ClientOptions> {
    let mut options = ClientOptions::parse(uri).await.map_err(|err| {
        if matches!(*err.kind, ErrorKind::InvalidArgument { .. }) {
            LeadError::configuration(format!("invalid {MONGO_URI_ENV}: {err}"))
        } else {
            LeadError::connectivity(err)
        }
    })?;
    options.max_pool_size = Some(max_pool_size);
    if options.app_name.is_none() {
        options.app_name = Some(APP_NAME.to_string());
    }
    Ok(options)
}

/// Errors after which the cached handle should not be trusted.
pub(crate) fn is_connection_fault(err: &MongoError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. }
    )
}

/// A client for `uri` that has not contacted any server yet.
#[cfg(test)]
pub(crate) async fn lazy_database(uri: &str, db_name: &str) -> Database {
    let options = client_options(uri, 1).await.unwrap();
    Client::with_options(options).unwrap().database(db_name)
}
