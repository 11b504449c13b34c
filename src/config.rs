use std::env;
use std::path::Path;

// Default configuration constants
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_UPTIME_REFRESH_SECS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub fn load_env_file(env_file: Option<&str>) {
    if let Some(path) = env_file {
        dotenvy::from_path(Path::new(path)).ok();
    } else {
        dotenvy::dotenv().ok();
    }
}

pub fn get_api_base_url() -> String {
    sanitize_base_url(&env::var("API_BASE_URL").unwrap_or_default())
}

pub fn get_uptime_refresh_secs() -> u64 {
    env::var("UPTIME_REFRESH_SECS")
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_UPTIME_REFRESH_SECS)
}

pub fn sanitize_base_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_API_BASE_URL.to_string();
    }
    trimmed.trim_end_matches('/').to_string()
}
