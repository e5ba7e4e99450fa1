use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use thiserror::Error;
use tracing::debug;

/// Option groups read for client credentials, later groups override earlier ones.
const CLIENT_GROUPS: &[&str] = &["client", "graphetl"];

/// Maximum nesting of `!include` directives.
const MAX_INCLUDE_DEPTH: usize = 8;

/// Errors raised while reading a MySQL option file.
#[derive(Debug, Error)]
pub enum OptionFileError {
    #[error("failed to read option file `{path}`: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("{path}:{line}: {message}")]
    Syntax {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("invalid port `{0}` in option file")]
    InvalidPort(String),

    #[error("option file includes are nested deeper than {MAX_INCLUDE_DEPTH} levels")]
    IncludeDepth,
}

/// Client connection defaults taken from an option file.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<SecretString>,
    pub socket: Option<PathBuf>,
    pub database: Option<String>,
}

/// A parsed MySQL option file such as `~/.my.cnf`.
///
/// Supports `[group]` headers, `key = value` and bare `key` lines, `#`/`;` comments, quoted
/// values with backslash escapes, and the `!include`/`!includedir` directives. Dashes and
/// underscores in keys are equivalent.
#[derive(Debug, Clone, Default)]
pub struct MySqlOptionFile {
    groups: BTreeMap<String, BTreeMap<String, String>>,
}

impl MySqlOptionFile {
    /// Returns `~/.my.cnf` when `HOME` is set.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".my.cnf"))
    }

    /// Reads and parses the option file at `path`, following includes.
    pub fn load(path: &Path) -> Result<Self, OptionFileError> {
        let mut option_file = MySqlOptionFile::default();
        option_file.read_file(path, 0)?;

        debug!(path = %path.display(), groups = option_file.groups.len(), "loaded mysql option file");

        Ok(option_file)
    }

    /// Parses option file contents. Relative includes resolve against the working directory.
    pub fn parse(contents: &str) -> Result<Self, OptionFileError> {
        let mut option_file = MySqlOptionFile::default();
        option_file.parse_into(contents, Path::new("<memory>"), 0)?;

        Ok(option_file)
    }

    /// Returns the raw value of `key` in `group`.
    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        self.groups
            .get(group)
            .and_then(|options| options.get(&normalize_key(key)))
            .map(String::as_str)
    }

    /// Collects client connection defaults from the `[client]` and `[graphetl]` groups.
    pub fn client_options(&self) -> Result<ClientOptions, OptionFileError> {
        let mut options = ClientOptions::default();

        for group in CLIENT_GROUPS {
            if let Some(host) = self.get(group, "host") {
                options.host = Some(host.to_string());
            }
            if let Some(port) = self.get(group, "port") {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| OptionFileError::InvalidPort(port.to_string()))?;
                options.port = Some(port);
            }
            if let Some(user) = self.get(group, "user") {
                options.user = Some(user.to_string());
            }
            if let Some(password) = self.get(group, "password") {
                options.password = Some(SecretString::new(password.to_string()));
            }
            if let Some(socket) = self.get(group, "socket") {
                options.socket = Some(PathBuf::from(socket));
            }
            if let Some(database) = self.get(group, "database") {
                options.database = Some(database.to_string());
            }
        }

        Ok(options)
    }

    fn read_file(&mut self, path: &Path, depth: usize) -> Result<(), OptionFileError> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(OptionFileError::IncludeDepth);
        }

        let contents = std::fs::read_to_string(path).map_err(|source| OptionFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        self.parse_into(&contents, path, depth)
    }

    fn parse_into(&mut self, contents: &str, path: &Path, depth: usize) -> Result<(), OptionFileError> {
        let mut current_group: Option<String> = None;

        for (index, raw_line) in contents.lines().enumerate() {
            let line_number = index + 1;
            let line = raw_line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(directive) = line.strip_prefix('!') {
                self.apply_directive(directive, path, line_number, depth)?;
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Err(syntax_error(path, line_number, "unterminated group header"));
                };
                let name = name.trim().to_ascii_lowercase();
                self.groups.entry(name.clone()).or_default();
                current_group = Some(name);
                continue;
            }

            let Some(group) = current_group.as_ref() else {
                return Err(syntax_error(
                    path,
                    line_number,
                    "option found before any group header",
                ));
            };

            let (key, value) = match line.split_once('=') {
                Some((key, value)) => (key.trim(), parse_value(value.trim(), path, line_number)?),
                None => (line, String::new()),
            };

            if key.is_empty() {
                return Err(syntax_error(path, line_number, "missing option name"));
            }

            self.groups
                .entry(group.clone())
                .or_default()
                .insert(normalize_key(key), value);
        }

        Ok(())
    }

    fn apply_directive(
        &mut self,
        directive: &str,
        path: &Path,
        line_number: usize,
        depth: usize,
    ) -> Result<(), OptionFileError> {
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        if let Some(target) = directive.strip_prefix("includedir") {
            let dir = base_dir.join(target.trim());
            let entries = std::fs::read_dir(&dir).map_err(|source| OptionFileError::Read {
                path: dir.clone(),
                source,
            })?;

            let mut files: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "cnf"))
                .collect();
            files.sort();

            for file in files {
                self.read_file(&file, depth + 1)?;
            }

            return Ok(());
        }

        if let Some(target) = directive.strip_prefix("include") {
            return self.read_file(&base_dir.join(target.trim()), depth + 1);
        }

        Err(syntax_error(
            path,
            line_number,
            &format!("unknown directive `!{directive}`"),
        ))
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('-', "_")
}

fn parse_value(value: &str, path: &Path, line_number: usize) -> Result<String, OptionFileError> {
    let quote = match value.chars().next() {
        Some(quote @ ('"' | '\'')) => quote,
        _ => {
            // Unquoted values end at an inline comment.
            let value = value.split(" #").next().unwrap_or(value);
            return Ok(value.trim().to_string());
        }
    };

    let mut result = String::new();
    let mut chars = value[1..].chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('b') => result.push('\u{8}'),
                Some('s') => result.push(' '),
                Some(other) => result.push(other),
                None => break,
            },
            c if c == quote => return Ok(result),
            c => result.push(c),
        }
    }

    Err(syntax_error(path, line_number, "unterminated quoted value"))
}

fn syntax_error(path: &Path, line: usize, message: &str) -> OptionFileError {
    OptionFileError::Syntax {
        path: path.to_path_buf(),
        line,
        message: message.to_string(),
    }
}
