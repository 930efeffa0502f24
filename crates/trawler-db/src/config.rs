use trawler_core::CrawlError;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Configuration for the database connection pool.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Read configuration from environment variables.
    ///
    /// - `DATABASE_URL` (required)
    /// - `DATABASE_MAX_CONNECTIONS` (optional, defaults to 5)
    pub fn from_env() -> Result<Self, CrawlError> {
        let url = std::env::var("DATABASE_URL").map_err(|_| {
            CrawlError::Config("DATABASE_URL not set. Required for --save and items.".into())
        })?;

        let max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Err(_) => DEFAULT_MAX_CONNECTIONS,
            Ok(raw) => parse_max_connections(&raw)?,
        };

        Ok(Self {
            url,
            max_connections,
        })
    }
}

fn parse_max_connections(raw: &str) -> Result<u32, CrawlError> {
    match raw.trim().parse::<u32>() {
        Ok(0) => Err(CrawlError::Config(
            "DATABASE_MAX_CONNECTIONS must be at least 1".into(),
        )),
        Ok(n) => Ok(n),
        Err(_) => Err(CrawlError::Config(format!(
            "Invalid DATABASE_MAX_CONNECTIONS '{raw}': must be a positive integer"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_pool_size() {
        let config = DatabaseConfig::new("postgres://localhost/trawler");
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_parse_max_connections() {
        assert_eq!(parse_max_connections("12").unwrap(), 12);
        assert_eq!(parse_max_connections(" 3 ").unwrap(), 3);
        assert!(parse_max_connections("0").is_err());
        assert!(matches!(
            parse_max_connections("many"),
            Err(CrawlError::Config(_))
        ));
    }
}
