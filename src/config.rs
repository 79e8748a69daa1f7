use std::path::PathBuf;

use crate::errors::AppError;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_APP_URL: &str = "http://localhost:3000";
const DEFAULT_RESET_TTL_MINUTES: i64 = 60;
const DEFAULT_STORAGE_DIR: &str = "./uploads";
const DEFAULT_BUCKET: &str = "project-photos";

/// Runtime settings read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub app_url: String,
    pub reset_token_ttl_minutes: i64,
    pub storage: StorageConfig,
    pub mail: Option<MailConfig>,
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local { dir: PathBuf, public_url: String },
    Supabase { url: String, key: String, bucket: String },
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let port = parse_or("APP_PORT", DEFAULT_PORT)?;
        let app_url = optional("APP_URL").unwrap_or_else(|| DEFAULT_APP_URL.to_string());
        let reset_token_ttl_minutes = parse_or("RESET_TOKEN_TTL_MINUTES", DEFAULT_RESET_TTL_MINUTES)?;

        let storage = match optional("STORAGE_BACKEND").as_deref().unwrap_or("local") {
            "local" => StorageConfig::Local {
                dir: PathBuf::from(optional("STORAGE_DIR").unwrap_or_else(|| DEFAULT_STORAGE_DIR.to_string())),
                public_url: optional("STORAGE_PUBLIC_URL")
                    .unwrap_or_else(|| format!("http://localhost:{port}/uploads")),
            },
            "supabase" => StorageConfig::Supabase {
                url: required("SUPABASE_URL")?,
                key: required("SUPABASE_KEY")?,
                bucket: optional("SUPABASE_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            },
            other => {
                return Err(AppError::configuration(format!(
                    "STORAGE_BACKEND must be `local` or `supabase`, got `{other}`"
                )))
            }
        };

        let mail = match (optional("MAIL_API_URL"), optional("MAIL_API_KEY")) {
            (Some(api_url), Some(api_key)) => Some(MailConfig {
                api_url,
                api_key,
                from: optional("MAIL_FROM").unwrap_or_else(|| "no-reply@managrr.local".to_string()),
            }),
            (None, None) => None,
            _ => return Err(AppError::configuration("MAIL_API_URL and MAIL_API_KEY must be set together")),
        };

        let tls = match (optional("TLS_CERT_PATH"), optional("TLS_KEY_PATH")) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            _ => None,
        };

        Ok(Self {
            port,
            app_url,
            reset_token_ttl_minutes,
            storage,
            mail,
            tls,
        })
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn required(name: &str) -> Result<String, AppError> {
    optional(name).ok_or_else(|| AppError::configuration(format!("{name} not set")))
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match optional(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| AppError::configuration(format!("{name} has an invalid value `{raw}`"))),
        None => Ok(default),
    }
}
