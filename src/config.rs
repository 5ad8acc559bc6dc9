//! Process configuration sourced from environment variables.
//!
//! The credential pair for each of the two fixed principals comes from the
//! same variables the deployment scripts already set (ADMIN_USERNAME etc.);
//! development defaults keep the server bootable out of the box.

pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_UPLOAD_ROOT: &str = "uploads";

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    /// Root folder the vault stores blobs under.
    pub upload_root: String,
    pub admin_username: String,
    pub admin_password: String,
    pub user_username: String,
    pub user_password: String,
}

impl Config {
    pub fn from_env() -> Self {
        let http_port = std::env::var("BYTEVAULT_HTTP_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(DEFAULT_HTTP_PORT);
        let upload_root = std::env::var("BYTEVAULT_UPLOAD_ROOT")
            .unwrap_or_else(|_| DEFAULT_UPLOAD_ROOT.to_string());
        let admin_username = std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
        let admin_password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "bytevault".to_string());
        let user_username = std::env::var("USER_USERNAME").unwrap_or_else(|_| "user".to_string());
        let user_password = std::env::var("USER_PASSWORD").unwrap_or_else(|_| "bytevault".to_string());
        Self { http_port, upload_root, admin_username, admin_password, user_username, user_password }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            upload_root: DEFAULT_UPLOAD_ROOT.to_string(),
            admin_username: "admin".to_string(),
            admin_password: "bytevault".to_string(),
            user_username: "user".to_string(),
            user_password: "bytevault".to_string(),
        }
    }
}
