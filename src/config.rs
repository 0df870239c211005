use crate::common::constants::{CART_COOKIE_DAYS, CART_COOKIE_NAME};
use crate::common::error::{Result, ShopError};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const DEV_CART_SECRET: &str = "family-coffee-dev-cart-secret";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cart: CartConfig,
    pub mail: MailConfig,
    pub shop: ShopConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Absolute origin used to build media URLs, e.g. `https://familycoffee.hu`.
    pub public_base_url: String,
    pub media_url: String,
    pub media_root: String,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            public_base_url: "http://localhost:8000".to_string(),
            media_url: "/media/".to_string(),
            media_root: "media".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/family_coffee.db".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CartConfig {
    pub cookie_name: String,
    pub cookie_days: i64,
    pub cookie_secure: bool,
    /// HMAC key for the cart cookie signature.
    pub secret: SecretString,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            cookie_name: CART_COOKIE_NAME.to_string(),
            cookie_days: CART_COOKIE_DAYS,
            cookie_secure: false,
            secret: SecretString::new(DEV_CART_SECRET.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// No host means e-mails are logged instead of sent.
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    pub smtp_starttls: bool,
    pub smtp_timeout_secs: u64,
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_starttls: true,
            smtp_timeout_secs: 10,
            from: "FamilyCoffee <no-reply@familycoffee.hu>".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShopConfig {
    pub name: String,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            name: "FamilyCoffee".to_string(),
        }
    }
}

impl Config {
    /// Read `path` when it exists, then apply `FC_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let config_content = fs::read_to_string(path).map_err(|e| {
                ShopError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            toml::from_str(&config_content)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Config::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        if config.uses_dev_cart_secret() {
            warn!("FC_CART_SECRET is not set; cart cookies are signed with the development key");
        }
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FC_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("FC_PORT") {
            self.server.port = parse_number("FC_PORT", &v)?;
        }
        if let Some(v) = lookup("FC_PUBLIC_BASE_URL") {
            self.server.public_base_url = v;
        }
        if let Some(v) = lookup("FC_MEDIA_URL") {
            self.server.media_url = v;
        }
        if let Some(v) = lookup("FC_MEDIA_ROOT") {
            self.server.media_root = v;
        }
        if let Some(v) = lookup("FC_CORS_ORIGINS") {
            self.server.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("FC_DATABASE_PATH") {
            self.database.path = v;
        }
        if let Some(v) = lookup("FC_CART_COOKIE_NAME") {
            self.cart.cookie_name = v;
        }
        if let Some(v) = lookup("FC_CART_COOKIE_DAYS") {
            self.cart.cookie_days = parse_number("FC_CART_COOKIE_DAYS", &v)?;
        }
        if let Some(v) = lookup("FC_CART_COOKIE_SECURE") {
            self.cart.cookie_secure = parse_bool("FC_CART_COOKIE_SECURE", &v)?;
        }
        if let Some(v) = lookup("FC_CART_SECRET") {
            self.cart.secret = SecretString::new(v);
        }
        if let Some(v) = lookup("FC_SMTP_HOST") {
            self.mail.smtp_host = Some(v).filter(|h| !h.trim().is_empty());
        }
        if let Some(v) = lookup("FC_SMTP_PORT") {
            self.mail.smtp_port = parse_number("FC_SMTP_PORT", &v)?;
        }
        if let Some(v) = lookup("FC_SMTP_USERNAME") {
            self.mail.smtp_username = Some(v);
        }
        if let Some(v) = lookup("FC_SMTP_PASSWORD") {
            self.mail.smtp_password = Some(SecretString::new(v));
        }
        if let Some(v) = lookup("FC_SMTP_STARTTLS") {
            self.mail.smtp_starttls = parse_bool("FC_SMTP_STARTTLS", &v)?;
        }
        if let Some(v) = lookup("FC_MAIL_FROM") {
            self.mail.from = v;
        }
        if let Some(v) = lookup("FC_SHOP_NAME") {
            self.shop.name = v;
        }
        if self.cart.cookie_days < 1 {
            return Err(ShopError::Config(
                "cart.cookie_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn uses_dev_cart_secret(&self) -> bool {
        use secrecy::ExposeSecret;
        self.cart.secret.expose_secret() == DEV_CART_SECRET
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ShopError::Config(format!("{key} must be a number, got '{value}'")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ShopError::Config(format!(
            "{key} must be a boolean, got '{value}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9000\n\n[shop]\nname = \"Teszt Kávé\"").unwrap();
        let mut config: Config =
            toml::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.shop.name, "Teszt Kávé");
        assert_eq!(config.cart.cookie_name, "fc_cart");

        config
            .apply_overrides(lookup_from(&[
                ("FC_PORT", "8080"),
                ("FC_CORS_ORIGINS", "https://a.hu, https://b.hu,"),
                ("FC_CART_COOKIE_SECURE", "true"),
                ("FC_SMTP_HOST", "smtp.example.com"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.cors_origins, vec!["https://a.hu", "https://b.hu"]);
        assert!(config.cart.cookie_secure);
        assert_eq!(config.mail.smtp_host.as_deref(), Some("smtp.example.com"));
    }

    #[test]
    fn invalid_numbers_and_booleans_are_config_errors() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(lookup_from(&[("FC_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ShopError::Config(_)));

        let err = config
            .apply_overrides(lookup_from(&[("FC_SMTP_STARTTLS", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ShopError::Config(_)));
    }

    #[test]
    fn defaults_use_dev_secret_until_overridden() {
        let mut config = Config::default();
        assert!(config.uses_dev_cart_secret());
        config
            .apply_overrides(lookup_from(&[("FC_CART_SECRET", "s3cret")]))
            .unwrap();
        assert!(!config.uses_dev_cart_secret());
    }
}
