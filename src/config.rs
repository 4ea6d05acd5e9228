use std::{env, str::FromStr};

use anyhow::Context;
use rust_decimal::Decimal;

use crate::ordering::OrderingRules;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub min_order_total: Decimal,
    pub frontend_url: Option<String>,
    pub unapproved_ttl_days: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 3000);
        let token_ttl_hours = parse_or("TOKEN_TTL_HOURS", 24 * 7);
        let min_order_total = parse_or("MIN_ORDER_TOTAL", Decimal::from(2000));
        let unapproved_ttl_days = parse_or("UNAPPROVED_TTL_DAYS", 7);
        let frontend_url = env::var("FRONTEND_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            token_ttl_hours,
            min_order_total,
            frontend_url,
            unapproved_ttl_days,
        })
    }

    pub fn ordering_rules(&self) -> OrderingRules {
        OrderingRules {
            min_order_total: self.min_order_total,
        }
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    parse_value(env::var(key).ok().as_deref(), default)
}

fn parse_value<T: FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_on_missing_or_malformed_values() {
        assert_eq!(parse_value::<u16>(None, 3000), 3000);
        assert_eq!(parse_value::<u16>(Some("not-a-port"), 3000), 3000);
        assert_eq!(parse_value::<u16>(Some(" 8080 "), 3000), 8080);
    }

    #[test]
    fn parses_decimal_threshold() {
        let parsed = parse_value(Some("1500.50"), Decimal::from(2000));
        assert_eq!(parsed, Decimal::new(150050, 2));
    }
}
