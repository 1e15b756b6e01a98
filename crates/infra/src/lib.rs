//! Infrastructure layer: persistence, order commit and pour tracking services,
//! realtime fan-out, configuration.

pub mod commit;
pub mod config;
pub mod pour;
pub mod realtime;
pub mod seed;
pub mod store;
