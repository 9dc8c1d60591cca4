//! Port traits between the domain and its I/O.

pub mod config_port;
pub mod data_port;
pub mod result_port;
