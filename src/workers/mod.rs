//! Worker pools (spec.md §4.4, §4.5, §4.6): schema workers execute DDL, data
//! workers execute DML/bulk-load, index workers execute post-data index
//! creation. Each worker owns one connection for its entire lifetime
//! (spec.md §4.4 "Connection discipline").

pub mod data;
pub mod index;
pub mod schema;
