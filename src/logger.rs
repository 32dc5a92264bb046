//! logger.rs
//! Configuración del logger usando env_logger.

/// `RUST_LOG` tiene prioridad; si no está, se usa el nivel configurado.
pub fn init_logger(default_level: &str) {
    let log_env = std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string());

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_env))
        .format_timestamp_secs()
        .init();
}
