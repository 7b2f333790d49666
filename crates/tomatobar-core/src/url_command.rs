//! `tomatobar://` command URLs.
//!
//! Scheme and host are matched case-insensitively; anything else about the
//! URL (path, query) is ignored.

use serde::Serialize;
use std::fmt;
use url::Url;

use crate::error::UrlCommandError;

pub const URL_SCHEME: &str = "tomatobar";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UrlCommand {
    StartStop,
}

impl fmt::Display for UrlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlCommand::StartStop => f.write_str("startStop"),
        }
    }
}

pub fn parse_command_url(input: &str) -> Result<UrlCommand, UrlCommandError> {
    let url = Url::parse(input.trim()).map_err(|e| UrlCommandError::Malformed(e.to_string()))?;

    // `Url` lowercases the scheme; special-scheme hosts are lowercased too,
    // but custom schemes keep the host as written.
    if url.scheme() != URL_SCHEME {
        return Err(UrlCommandError::UnknownScheme(url.scheme().to_string()));
    }
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(UrlCommandError::MissingCommand)?;

    match host.to_ascii_lowercase().as_str() {
        "startstop" => Ok(UrlCommand::StartStop),
        _ => Err(UrlCommandError::UnknownCommand(host.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_stop_in_any_case() {
        for input in ["tomatobar://startstop", "TomatoBar://StartStop", "tomatobar://STARTSTOP/"] {
            assert_eq!(parse_command_url(input), Ok(UrlCommand::StartStop), "{input}");
        }
    }

    #[test]
    fn rejects_other_schemes() {
        assert_eq!(
            parse_command_url("https://startstop"),
            Err(UrlCommandError::UnknownScheme("https".into()))
        );
    }

    #[test]
    fn rejects_unknown_commands() {
        assert_eq!(
            parse_command_url("tomatobar://pause"),
            Err(UrlCommandError::UnknownCommand("pause".into()))
        );
        assert_eq!(parse_command_url("tomatobar:startstop"), Err(UrlCommandError::MissingCommand));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_command_url("not a url"), Err(UrlCommandError::Malformed(_))));
    }
}
