use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use url::Url;

use crate::cli::ApiArgs;

/// Environment variable consulted when no token dotfile is found.
pub const TOKEN_ENV: &str = "PREPRINT_API_TOKEN";
/// Dotfile name looked up in the working directory, then in the home directory.
pub const TOKEN_DOTFILE: &str = ".preprint-token";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid base URL {url:?}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("cannot read token file {}", path.display())]
    TokenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no API token found (tried {TOKEN_DOTFILE} and ${TOKEN_ENV})")]
    MissingToken,
}

/// Where the API token came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Dotfile(PathBuf),
    Env,
    Anonymous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: Option<String>,
    pub source: TokenSource,
}

/// Settings needed to talk to the metadata API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    pub token: Option<String>,
    pub check_path: String,
}

impl ApiConfig {
    pub fn from_args(args: &ApiArgs) -> Result<Self, ConfigError> {
        let base_url = parse_base_url(&args.base_url)?;
        let token = resolve_token(
            args.token_file.as_deref(),
            |key| std::env::var(key).ok(),
            dirs::home_dir(),
        )?;
        log::debug!("API token source: {:?}", token.source);
        if args.require_token && token.value.is_none() {
            return Err(ConfigError::MissingToken);
        }
        Ok(ApiConfig {
            base_url,
            token: token.value,
            check_path: "items".to_string(),
        })
    }
}

pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    // A trailing slash keeps `Url::join` from dropping the last path segment.
    let with_slash = format!("{}/", raw.trim_end_matches('/'));
    Url::parse(&with_slash).map_err(|source| ConfigError::BaseUrl {
        url: raw.to_string(),
        source,
    })
}

/// Resolve the API token from its sources in priority order: dotfile, environment, anonymous.
///
/// An explicit `token_file` must be readable. The implicit dotfiles (working directory, then
/// `home`) are skipped when absent. Blank tokens count as absent.
pub fn resolve_token(
    token_file: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
    home: Option<PathBuf>,
) -> Result<Token, ConfigError> {
    if let Some(path) = token_file {
        let value = read_token(path).map_err(|source| ConfigError::TokenFile {
            path: path.to_path_buf(),
            source,
        })?;
        if value.is_some() {
            return Ok(Token {
                value,
                source: TokenSource::Dotfile(path.to_path_buf()),
            });
        }
    }

    let candidates = std::iter::once(PathBuf::from(TOKEN_DOTFILE))
        .chain(home.map(|h| h.join(TOKEN_DOTFILE)));
    for path in candidates {
        if !path.is_file() {
            continue;
        }
        match read_token(&path) {
            Ok(Some(value)) => {
                return Ok(Token {
                    value: Some(value),
                    source: TokenSource::Dotfile(path),
                });
            }
            Ok(None) => {}
            Err(e) => log::warn!("ignoring unreadable token file {}: {e}", path.display()),
        }
    }

    if let Some(value) = env(TOKEN_ENV).and_then(non_blank) {
        return Ok(Token {
            value: Some(value),
            source: TokenSource::Env,
        });
    }

    Ok(Token {
        value: None,
        source: TokenSource::Anonymous,
    })
}

fn read_token(path: &Path) -> io::Result<Option<String>> {
    Ok(non_blank(fs::read_to_string(path)?))
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn explicit_token_file_wins_over_env() {
        let mut tmp = NamedTempFile::new().expect("tmp file");
        writeln!(tmp, "  secret-token  ").unwrap();
        let token = resolve_token(Some(tmp.path()), |_| Some("from-env".into()), None).unwrap();
        assert_eq!(token.value.as_deref(), Some("secret-token"));
        assert_eq!(token.source, TokenSource::Dotfile(tmp.path().to_path_buf()));
    }

    #[test]
    fn home_dotfile_is_used_when_present() {
        let home = TempDir::new().unwrap();
        fs::write(home.path().join(TOKEN_DOTFILE), "home-token\n").unwrap();
        let token = resolve_token(None, |_| Some("from-env".into()), Some(home.path().into()))
            .unwrap();
        assert_eq!(token.value.as_deref(), Some("home-token"));
    }

    #[test]
    fn env_is_used_without_dotfiles() {
        let home = TempDir::new().unwrap();
        let token = resolve_token(
            None,
            |key| (key == TOKEN_ENV).then(|| "from-env".to_string()),
            Some(home.path().into()),
        )
        .unwrap();
        assert_eq!(token.value.as_deref(), Some("from-env"));
        assert_eq!(token.source, TokenSource::Env);
    }

    #[test]
    fn falls_back_to_anonymous() {
        let home = TempDir::new().unwrap();
        let token = resolve_token(None, |_| Some("   ".into()), Some(home.path().into())).unwrap();
        assert_eq!(token.value, None);
        assert_eq!(token.source, TokenSource::Anonymous);
    }

    #[test]
    fn missing_explicit_token_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = resolve_token(Some(&dir.path().join("nope")), no_env, None).unwrap_err();
        assert!(matches!(err, ConfigError::TokenFile { .. }));
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let url = parse_base_url("https://example.org/api/v1").unwrap();
        assert_eq!(url.join("items").unwrap().as_str(), "https://example.org/api/v1/items");
        assert!(parse_base_url("not a url").is_err());
    }
}
