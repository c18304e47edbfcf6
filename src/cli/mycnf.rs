//! Credentials from a MySQL option file (`.my.cnf`).

use secrecy::SecretString;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use thiserror::Error;
use url::Url;

const CLIENT_SECTION: &str = "client";
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3306;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed reading ini file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no user specified under [client] in {0}")]
    MissingUser(PathBuf),

    #[error("password or ssl-key should be specified under [client] in {0}")]
    MissingCredentials(PathBuf),

    #[error("invalid port {value:?} under [client] in {path}")]
    InvalidPort { path: PathBuf, value: String },

    #[error("failed to build connection string: {0}")]
    Dsn(String),
}

/// Sections of an option file, keys lowercased. Bare keys map to an empty
/// value.
pub type OptionFile = HashMap<String, HashMap<String, String>>;

/// Parses the INI dialect of MySQL option files.
///
/// Lines before the first section header and lines that are neither a
/// header nor an option are ignored.
#[must_use]
pub fn parse(content: &str) -> OptionFile {
    let mut sections = OptionFile::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = header.trim().to_ascii_lowercase();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }

        let Some(section) = current.as_ref().and_then(|s| sections.get_mut(s)) else {
            continue;
        };

        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key.trim(), unquote(value.trim())),
            None => (line, String::new()),
        };

        if !key.is_empty() {
            section.insert(key.to_ascii_lowercase(), value);
        }
    }

    sections
}

fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }

    // unquoted values may carry a trailing comment
    value
        .split_once(" #")
        .map_or(value, |(v, _)| v.trim_end())
        .to_string()
}

/// The `[client]` options the exporter cares about.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub user: String,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
    pub socket: Option<String>,
    pub ssl_ca: Option<String>,
    pub ssl_cert: Option<String>,
    pub ssl_key: Option<String>,
}

impl ClientConfig {
    /// Validates the `[client]` section of a parsed option file.
    ///
    /// # Errors
    ///
    /// Fails without a user, without both password and ssl-key, or with a
    /// port that is not a number.
    pub fn from_options(options: &OptionFile, path: &Path) -> Result<Self, ConfigError> {
        let empty = HashMap::new();
        let client = options.get(CLIENT_SECTION).unwrap_or(&empty);
        let get = |key: &str| client.get(key).filter(|v| !v.is_empty()).cloned();

        let user = get("user").ok_or_else(|| ConfigError::MissingUser(path.to_path_buf()))?;
        let password = get("password");
        let ssl_key = get("ssl-key");

        if password.is_none() && ssl_key.is_none() {
            return Err(ConfigError::MissingCredentials(path.to_path_buf()));
        }

        let port = match get("port") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidPort {
                path: path.to_path_buf(),
                value,
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            user,
            password,
            host: get("host").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            socket: get("socket"),
            ssl_ca: get("ssl-ca"),
            ssl_cert: get("ssl-cert"),
            ssl_key,
        })
    }

    /// Builds a `mysql://` connection string. With a socket the host part is
    /// irrelevant and the path travels as the `socket` parameter.
    ///
    /// # Errors
    ///
    /// Fails when the user, password or host cannot be encoded into a URL.
    pub fn dsn(&self) -> Result<SecretString, ConfigError> {
        let mut url = Url::parse("mysql://localhost/").map_err(|e| ConfigError::Dsn(e.to_string()))?;

        if self.socket.is_none() {
            url.set_host(Some(&self.host))
                .map_err(|e| ConfigError::Dsn(format!("host {}: {e}", self.host)))?;
            url.set_port(Some(self.port))
                .map_err(|()| ConfigError::Dsn("cannot set port".to_string()))?;
        }

        url.set_username(&self.user)
            .map_err(|()| ConfigError::Dsn("cannot set user".to_string()))?;
        url.set_password(self.password.as_deref())
            .map_err(|()| ConfigError::Dsn("cannot set password".to_string()))?;

        {
            let mut query = url.query_pairs_mut();
            if let Some(socket) = &self.socket {
                query.append_pair("socket", socket);
            }
            for (key, value) in [
                ("ssl-ca", &self.ssl_ca),
                ("ssl-cert", &self.ssl_cert),
                ("ssl-key", &self.ssl_key),
            ] {
                if let Some(value) = value {
                    query.append_pair(key, value);
                }
            }
        }

        // no parameters at all leaves a dangling '?'
        if url.query() == Some("") {
            url.set_query(None);
        }

        Ok(SecretString::from(url.to_string()))
    }
}

/// Reads an option file and derives the connection string from it.
///
/// # Errors
///
/// See [`ConfigError`].
pub fn load(path: &Path) -> Result<SecretString, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    ClientConfig::from_options(&parse(&content), path)?.dsn()
}
