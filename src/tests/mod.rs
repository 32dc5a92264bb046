//! tests/mod.rs
//! Pruebas del motor de campañas (SQLite en memoria + transporte falso).

mod support;

mod config_tests;
mod instrumentation_tests;
mod personalization_tests;
mod resolver_tests;
mod status_tests;
