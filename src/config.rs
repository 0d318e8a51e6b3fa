use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub register_burst: u32,
    pub register_refill_per_sec: f64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        // Sign-up throttle: burst of attempts per email, then a slow refill.
        let register_burst = env::var("REGISTER_RATE_BURST")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(5);
        let register_refill_per_sec = env::var("REGISTER_RATE_REFILL_PER_SEC")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(1.0 / 30.0);
        Ok(Self {
            port,
            database_url,
            host,
            register_burst,
            register_refill_per_sec,
        })
    }
}
