pub mod archive;
pub mod config;
pub mod db;
pub mod drivers;
pub mod error;
pub mod loader;
pub mod logging;
pub mod lookup;
pub mod normalize;
pub mod seed;
pub mod source;
pub mod store;
pub mod types;
pub mod validation;
