mod open;
mod models;
mod insert;
mod query;
mod schema;
mod store;

pub use open::Db;
pub use models::*;
pub use insert::*;
pub use query::*;
