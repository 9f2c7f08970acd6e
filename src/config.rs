use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Result;

use crate::paths::database_file_path;

pub(crate) const DEFAULT_SERVER_URL: &str = "http://localhost:3000";
pub(crate) const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub(crate) const DEFAULT_PORT: &str = "3000";

/// Flag, then `SKIPINTRO_SERVER_URL`, then the local default. Trailing
/// slashes are dropped so paths can be appended.
pub(crate) fn resolve_server_url(flag: Option<&str>) -> String {
    resolve_server_url_from_env(flag, env::var("SKIPINTRO_SERVER_URL").ok())
}

pub(crate) fn resolve_server_url_from_env(flag: Option<&str>, env_value: Option<String>) -> String {
    let raw = flag
        .map(str::to_string)
        .or(env_value)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    raw.trim_end_matches('/').to_string()
}

/// Flag, then `SKIPINTRO_BIND`, then `0.0.0.0:$PORT`.
pub(crate) fn resolve_bind_addr(flag: Option<&str>) -> String {
    resolve_bind_addr_from_env(
        flag,
        env::var("SKIPINTRO_BIND").ok(),
        env::var("PORT").ok(),
    )
}

pub(crate) fn resolve_bind_addr_from_env(
    flag: Option<&str>,
    bind: Option<String>,
    port: Option<String>,
) -> String {
    if let Some(addr) = flag
        .map(str::to_string)
        .or(bind)
        .filter(|value| !value.trim().is_empty())
    {
        return addr.trim().to_string();
    }
    let port = port
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty() && value.parse::<u16>().is_ok())
        .unwrap_or_else(|| DEFAULT_PORT.to_string());
    format!("{DEFAULT_BIND_HOST}:{port}")
}

pub(crate) fn resolve_database_path(flag: Option<PathBuf>) -> Result<PathBuf> {
    match resolve_database_path_from_env(flag, env::var_os("SKIPINTRO_DB")) {
        Some(path) => Ok(path),
        None => database_file_path(),
    }
}

pub(crate) fn resolve_database_path_from_env(
    flag: Option<PathBuf>,
    env_value: Option<OsString>,
) -> Option<PathBuf> {
    flag.or_else(|| {
        env_value
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    })
}

/// Version the server advertises and the client compares against.
pub(crate) fn resolve_plugin_version() -> String {
    resolve_plugin_version_from_env(env::var("SKIPINTRO_PLUGIN_VERSION").ok())
}

pub(crate) fn resolve_plugin_version_from_env(env_value: Option<String>) -> String {
    env_value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
}
