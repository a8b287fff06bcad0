use std::sync::Arc;

use slog::Logger;

use crate::accounts::AccountRegistry;
use crate::credentials::Credentials;
use crate::ids::ConnIdGenerator;
use crate::tables::TableRegistry;

/// Everything a connection handler needs a shared reference to.
/// Cloneable cheaply (everything inside is itself an `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<Credentials>,
    pub accounts: Arc<AccountRegistry>,
    pub tables: Arc<TableRegistry>,
    pub conn_ids: Arc<ConnIdGenerator>,
    pub log: Logger,
}
