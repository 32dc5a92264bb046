//! config/app_config.rs
//! Configuración del servicio: HTTP, base de datos, SMTP, despacho y scheduler.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Relay SMTP compartido por todas las campañas.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_pass: String,
    /// Conexiones simultáneas máximas hacia el relay.
    pub max_connections: usize,
    /// Emails por segundo (0 = sin límite).
    pub rate_per_second: u32,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_user: String::new(),
            smtp_pass: String::new(),
            max_connections: 5,
            rate_per_second: 14,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Parámetros del envío por lotes.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub tracking_base_url: String,
    pub default_sender_name: String,
    pub default_sender_email: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            batch_size: 10,
            batch_pause: Duration::from_millis(1000),
            tracking_base_url: "http://localhost:5022".to_string(),
            default_sender_name: "Club de Golf".to_string(),
            default_sender_email: "no-reply@localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub port: u16,
    pub http_workers: usize,
    pub log_level: String,
    /// Token bearer de las rutas autenticadas. Sin token, todas responden 401.
    pub api_token: Option<String>,
    pub scheduler_interval: Duration,
    pub transport: TransportConfig,
    pub dispatch: DispatchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_url: "sqlite:data/crm.db".to_string(),
            bind_addr: "0.0.0.0".to_string(),
            port: 5022,
            http_workers: 2,
            log_level: "info".to_string(),
            api_token: None,
            scheduler_interval: Duration::from_secs(60),
            transport: TransportConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Lee la configuración de variables de entorno, con los defaults de arriba.
    pub fn from_env() -> Self {
        let defaults = AppConfig::default();
        let transport_defaults = defaults.transport.clone();
        let dispatch_defaults = defaults.dispatch.clone();

        let smtp_user = env_string("SMTP_USER", &transport_defaults.smtp_user);
        let default_sender_email = if smtp_user.is_empty() {
            dispatch_defaults.default_sender_email.clone()
        } else {
            smtp_user.clone()
        };

        AppConfig {
            database_url: env_string("DATABASE_URL", &defaults.database_url),
            bind_addr: env_string("BIND_ADDR", &defaults.bind_addr),
            port: env_parse("PORT", defaults.port),
            http_workers: env_parse("HTTP_WORKERS", defaults.http_workers),
            log_level: log_level_from_env(),
            api_token: env::var("API_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            // Un intervalo de 0 haría entrar en pánico a `tokio::time::interval`.
            scheduler_interval: Duration::from_secs(
                env_parse(
                    "SCHEDULER_INTERVAL_SECS",
                    defaults.scheduler_interval.as_secs(),
                )
                .max(1),
            ),
            transport: TransportConfig {
                smtp_host: env_string("SMTP_HOST", &transport_defaults.smtp_host),
                smtp_port: env_parse("SMTP_PORT", transport_defaults.smtp_port),
                smtp_user,
                smtp_pass: env_string("SMTP_PASS", &transport_defaults.smtp_pass),
                max_connections: env_parse(
                    "SMTP_MAX_CONNECTIONS",
                    transport_defaults.max_connections,
                ),
                rate_per_second: env_parse("SMTP_RATE_LIMIT", transport_defaults.rate_per_second),
                timeout: Duration::from_secs(env_parse(
                    "SMTP_TIMEOUT_SECS",
                    transport_defaults.timeout.as_secs(),
                )),
            },
            dispatch: DispatchConfig {
                batch_size: env_parse("DISPATCH_BATCH_SIZE", dispatch_defaults.batch_size).max(1),
                batch_pause: Duration::from_millis(env_parse(
                    "DISPATCH_BATCH_PAUSE_MS",
                    dispatch_defaults.batch_pause.as_millis() as u64,
                )),
                tracking_base_url: env_string(
                    "TRACKING_BASE_URL",
                    &dispatch_defaults.tracking_base_url,
                ),
                default_sender_name: env_string(
                    "DEFAULT_SENDER_NAME",
                    &dispatch_defaults.default_sender_name,
                ),
                default_sender_email,
            },
        }
    }
}

/// Nivel de log leído antes que el resto de la configuración, para que el
/// logger ya esté activo cuando `from_env` avise de valores inválidos.
pub fn log_level_from_env() -> String {
    env_string("LOG_LEVEL", &AppConfig::default().log_level)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Valor numérico del entorno; si no parsea, se usa el default y se avisa.
pub(crate) fn env_parse<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                log::warn!("{}='{}' is not valid, using default {}", name, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}
