pub mod catalogue;
pub mod db;
pub mod error;
pub(crate) mod schema;
