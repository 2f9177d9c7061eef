//! Application configuration loaded from environment variables.

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `JWT_SECRET` — bearer-token signing secret
/// - `RAZORPAY_KEY_ID` / `RAZORPAY_KEY_SECRET` — gateway credentials; the
///   key secret also keys callback signature verification
/// - `DATABASE_URL` — when set, switches to the distributed deployment:
///   Postgres persistence, HTTP cart/product clients, live gateway
/// - `CART_SERVICE_URL` / `PRODUCT_SERVICE_URL` — upstream base URLs for
///   the distributed deployment
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub jwt_secret: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub database_url: Option<String>,
    pub cart_service_url: String,
    pub product_service_url: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string()),
            razorpay_key_id: std::env::var("RAZORPAY_KEY_ID")
                .unwrap_or_else(|_| "rzp_test_key".to_string()),
            razorpay_key_secret: std::env::var("RAZORPAY_KEY_SECRET")
                .unwrap_or_else(|_| "rzp_test_secret".to_string()),
            database_url: std::env::var("DATABASE_URL").ok(),
            cart_service_url: std::env::var("CART_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:3002".to_string()),
            product_service_url: std::env::var("PRODUCT_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            jwt_secret: "dev-secret".to_string(),
            razorpay_key_id: "rzp_test_key".to_string(),
            razorpay_key_secret: "rzp_test_secret".to_string(),
            database_url: None,
            cart_service_url: "http://localhost:3002".to_string(),
            product_service_url: "http://localhost:3001".to_string(),
        }
    }
}
