use std::sync::Arc;

mod collection;
mod database;
mod synclient;

pub use database::PostgresStore;

type DbConnection = Arc<synclient::SynClient>;
