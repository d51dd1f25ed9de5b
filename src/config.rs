//! Layered configuration: global file, local `.tabularc`, then CLI flags.
//!
//! Files hold the same flags the CLI accepts, one per line, with `#`
//! comments. Layers merge through [`ConfigFlags::union`], later layers
//! winning for valued options.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::store::ConnectionParams;

/// Remote open timeout when none is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub database: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub listen: Option<u16>,
    pub timeout_ms: Option<u64>,
    pub no_highlight: bool,
}

impl ConfigFlags {
    pub fn union(&self, other: &Self) -> Self {
        Self {
            database: other.database.clone().or_else(|| self.database.clone()),
            host: other.host.clone().or_else(|| self.host.clone()),
            port: other.port.or(self.port),
            dbname: other.dbname.clone().or_else(|| self.dbname.clone()),
            user: other.user.clone().or_else(|| self.user.clone()),
            password: other.password.clone().or_else(|| self.password.clone()),
            listen: other.listen.or(self.listen),
            timeout_ms: other.timeout_ms.or(self.timeout_ms),
            no_highlight: self.no_highlight || other.no_highlight,
        }
    }

    /// Connection bag with defaults filled in for anything unset.
    pub fn connection_params(&self) -> ConnectionParams {
        let defaults = ConnectionParams::default();
        ConnectionParams {
            host: self.host.clone().unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            dbname: self.dbname.clone().unwrap_or(defaults.dbname),
            user: self.user.clone().unwrap_or(defaults.user),
            password: self.password.clone().unwrap_or(defaults.password),
            database: self.database.clone().unwrap_or(defaults.database),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("tabula").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("tabula")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("tabula").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join("tabula").join("config");
        }
    }

    PathBuf::from(".tabularc")
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".tabularc")
}

pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

/// Write `flags` as defaults. The password is left out.
pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = vec!["# tabula defaults (saved with --save)".to_string()];
    if let Some(database) = &flags.database {
        lines.push(format!("--database {}", database.display()));
    }
    if let Some(host) = &flags.host {
        lines.push(format!("--host {host}"));
    }
    if let Some(port) = flags.port {
        lines.push(format!("--port {port}"));
    }
    if let Some(dbname) = &flags.dbname {
        lines.push(format!("--dbname {dbname}"));
    }
    if let Some(user) = &flags.user {
        lines.push(format!("--user {user}"));
    }
    if let Some(listen) = flags.listen {
        lines.push(format!("--listen {listen}"));
    }
    if let Some(timeout_ms) = flags.timeout_ms {
        lines.push(format!("--timeout-ms {timeout_ms}"));
    }
    if flags.no_highlight {
        lines.push("--no-highlight".to_string());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Pick known flags out of `tokens`, accepting `--flag value` and
/// `--flag=value`. Unknown tokens and unparsable values are skipped.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        if token == "--no-highlight" {
            flags.no_highlight = true;
            i += 1;
            continue;
        }
        let (key, inline) = match token.split_once('=') {
            Some((key, value)) => (key, Some(value.to_string())),
            None => (token, None),
        };
        if !is_valued_flag(key) {
            i += 1;
            continue;
        }
        let value = match inline {
            Some(value) => value,
            None => {
                let Some(next) = tokens.get(i + 1) else {
                    break;
                };
                i += 1;
                next.clone()
            }
        };
        apply_value(&mut flags, key, value);
        i += 1;
    }
    flags
}

fn is_valued_flag(key: &str) -> bool {
    matches!(
        key,
        "--database"
            | "--host"
            | "--port"
            | "--dbname"
            | "--user"
            | "--password"
            | "--listen"
            | "--timeout-ms"
    )
}

fn apply_value(flags: &mut ConfigFlags, key: &str, value: String) {
    match key {
        "--database" => flags.database = Some(PathBuf::from(value)),
        "--host" => flags.host = Some(value),
        "--port" => flags.port = value.parse().ok().or(flags.port),
        "--dbname" => flags.dbname = Some(value),
        "--user" => flags.user = Some(value),
        "--password" => flags.password = Some(value),
        "--listen" => flags.listen = value.parse().ok().or(flags.listen),
        "--timeout-ms" => flags.timeout_ms = value.parse().ok().or(flags.timeout_ms),
        _ => {}
    }
}
