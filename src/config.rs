use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub haravan: HaravanConfig,
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub fulfillment: FulfillmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 允许的跨域来源, 为空则不限制
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaravanConfig {
    pub access_token: String,
    pub shop_domain: String,
    /// Overrides `https://{shop_domain}/admin` (used for staging shops)
    #[serde(default)]
    pub api_base_url: Option<String>,
}

impl HaravanConfig {
    pub fn admin_base_url(&self) -> String {
        match &self.api_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}/admin", self.shop_domain),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// Shop product that represents a xu top-up
    pub product_id: i64,
    /// Shop money units per 1 xu (e.g. 100 VND = 1 xu)
    #[serde(default = "default_exchange_rate")]
    pub exchange_rate: i64,
}

fn default_exchange_rate() -> i64 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_retry_interval_secs() -> u64 {
    300
}

fn default_max_attempts() -> i32 {
    5
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            retry_interval_secs: default_retry_interval_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Config {
    /// 读取 CONFIG_PATH (默认 config.toml), 再用环境变量覆盖
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        fn get_env(name: &str) -> Option<String> {
            env::var(name).ok()
        }
        fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
            env::var(name)
                .ok()
                .and_then(|v| v.parse::<T>().ok())
                .unwrap_or(default)
        }

        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => toml::from_str(&config_str).map_err(|e| {
                AppError::ConfigError(format!("Failed to parse {config_path}: {e}"))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // 无配置文件：使用环境变量与默认值构建
                let database_url = get_env("DATABASE_URL").ok_or_else(|| {
                    AppError::ConfigError(format!(
                        "DATABASE_URL is not set and {config_path} was not found"
                    ))
                })?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 3000u16),
                        cors_allowed_origins: Vec::new(),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    haravan: HaravanConfig {
                        access_token: get_env("HARAVAN_ACCESS_TOKEN").unwrap_or_default(),
                        shop_domain: get_env("HARAVAN_SHOP_DOMAIN").unwrap_or_default(),
                        api_base_url: get_env("HARAVAN_API_BASE_URL"),
                    },
                    currency: CurrencyConfig {
                        product_id: get_env_parse("CURRENCY_PRODUCT_ID", 0i64),
                        exchange_rate: get_env_parse(
                            "CURRENCY_EXCHANGE_RATE",
                            default_exchange_rate(),
                        ),
                    },
                    fulfillment: FulfillmentConfig::default(),
                }
            }
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "Cannot read config file {config_path}: {e}"
                )));
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("CORS_ALLOWED_ORIGINS") {
            config.server.cors_allowed_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("HARAVAN_ACCESS_TOKEN") {
            config.haravan.access_token = v;
        }
        if let Ok(v) = env::var("HARAVAN_SHOP_DOMAIN") {
            config.haravan.shop_domain = v;
        }
        if let Ok(v) = env::var("HARAVAN_API_BASE_URL") {
            config.haravan.api_base_url = Some(v);
        }
        if let Ok(v) = env::var("CURRENCY_PRODUCT_ID")
            && let Ok(id) = v.parse()
        {
            config.currency.product_id = id;
        }
        if let Ok(v) = env::var("CURRENCY_EXCHANGE_RATE")
            && let Ok(rate) = v.parse()
        {
            config.currency.exchange_rate = rate;
        }
        if let Ok(v) = env::var("FULFILLMENT_REQUEST_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            config.fulfillment.request_timeout_secs = n;
        }
        if let Ok(v) = env::var("FULFILLMENT_RETRY_INTERVAL_SECS")
            && let Ok(n) = v.parse()
        {
            config.fulfillment.retry_interval_secs = n;
        }
        if let Ok(v) = env::var("FULFILLMENT_MAX_ATTEMPTS")
            && let Ok(n) = v.parse()
        {
            config.fulfillment.max_attempts = n;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without consulting the environment.
    pub fn from_toml_str(config_str: &str) -> AppResult<Self> {
        let config: Config = toml::from_str(config_str)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.currency.exchange_rate <= 0 {
            return Err(AppError::ConfigError(
                "currency.exchange_rate must be positive".to_string(),
            ));
        }
        if self.fulfillment.max_attempts <= 0 {
            return Err(AppError::ConfigError(
                "fulfillment.max_attempts must be positive".to_string(),
            ));
        }
        if self.currency.product_id == 0 {
            log::warn!("currency.product_id is not set; no payment will ever be credited");
        }
        Ok(())
    }
}
