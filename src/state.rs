use std::sync::Arc;

use crate::db::DbConnection;
use crate::storage::FileStorage;

#[derive(Clone)]
pub struct AppState {
    pub db: DbConnection,
    pub storage: Arc<FileStorage>,
    pub bcrypt_cost: u32,
}

impl AppState {
    pub fn new(db: DbConnection, storage: FileStorage, bcrypt_cost: u32) -> Self {
        Self {
            db,
            storage: Arc::new(storage),
            bcrypt_cost,
        }
    }
}
