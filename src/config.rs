//! Server configuration.
//!
//! Two small knobs-and-limits structs: [`MessageConfig`] bounds what the
//! wire parser will accept, [`EnvConfig`] shapes the application-facing
//! environment. Both come with conservative defaults; the builder-style
//! setters apply the documented clamping so callers cannot configure the
//! parser into an unbounded state by accident.

use crate::error::{Error, Result};

/// Hard ceiling for the request line, in bytes.
pub const MAX_REQUEST_LINE: usize = 8190;
/// Hard ceiling for the number of header fields.
pub const MAX_HEADERS: usize = 32768;
/// Fallback per-field size when a negative limit is requested.
pub const DEFAULT_MAX_HEADERFIELD_SIZE: usize = 8190;

/// Limits and permissions for the message parser.
#[derive(Debug, Clone)]
pub struct MessageConfig {
    /// Cap on the request line, in bytes.
    pub limit_request_line: usize,
    /// Cap on the number of header lines.
    pub limit_request_fields: usize,
    /// Cap on a single header line, in bytes.
    pub limit_request_field_size: usize,
    /// Allow lowercase/`#` methods and lengths outside `3..=20`.
    pub permit_unconventional_http_method: bool,
    /// Allow versions outside `[1.0, 2.0)`.
    pub permit_unconventional_http_version: bool,
    /// Declared for compatibility; obsolete line folding is not
    /// implemented and requesting it is refused.
    pub permit_obsolete_folding: bool,
    /// Declared for compatibility; the PROXY protocol preamble is not
    /// interpreted by this core.
    pub proxy_protocol: bool,
    /// Declared for compatibility; methods are matched as sent.
    pub casefold_http_method: bool,
}

impl Default for MessageConfig {
    fn default() -> MessageConfig {
        MessageConfig {
            limit_request_line: 4094,
            limit_request_fields: 100,
            limit_request_field_size: 8190,
            permit_unconventional_http_method: false,
            permit_unconventional_http_version: false,
            permit_obsolete_folding: false,
            proxy_protocol: false,
            casefold_http_method: false,
        }
    }
}

impl MessageConfig {
    /// The default limits.
    pub fn new() -> MessageConfig {
        MessageConfig::default()
    }

    /// Sets the request-line limit. Negative values fall back to the
    /// hard ceiling, zero disables the limit, anything else is clamped
    /// to [`MAX_REQUEST_LINE`].
    pub fn limit_request_line(mut self, limit: i64) -> MessageConfig {
        self.limit_request_line = if limit < 0 {
            MAX_REQUEST_LINE
        } else if limit == 0 {
            usize::MAX
        } else {
            (limit as usize).min(MAX_REQUEST_LINE)
        };
        self
    }

    /// Sets the header-count limit, clamped to [`MAX_HEADERS`].
    pub fn limit_request_fields(mut self, limit: u64) -> MessageConfig {
        self.limit_request_fields = (limit as usize).min(MAX_HEADERS);
        self
    }

    /// Sets the per-field size limit. Negative values fall back to
    /// [`DEFAULT_MAX_HEADERFIELD_SIZE`], zero disables the limit.
    pub fn limit_request_field_size(mut self, limit: i64) -> MessageConfig {
        self.limit_request_field_size = if limit < 0 {
            DEFAULT_MAX_HEADERFIELD_SIZE
        } else if limit == 0 {
            usize::MAX
        } else {
            limit as usize
        };
        self
    }

    /// Permits unconventional methods (lowercase, `#`, unusual lengths).
    pub fn permit_unconventional_http_method(mut self, permit: bool) -> MessageConfig {
        self.permit_unconventional_http_method = permit;
        self
    }

    /// Permits versions outside `[1.0, 2.0)`.
    pub fn permit_unconventional_http_version(mut self, permit: bool) -> MessageConfig {
        self.permit_unconventional_http_version = permit;
        self
    }

    /// Requests obsolete line-folding support. Only `false` is accepted;
    /// folding is not implemented.
    pub fn permit_obsolete_folding(mut self, permit: bool) -> Result<MessageConfig> {
        if permit {
            return Err(Error::Config(
                "obsolete line folding is not implemented".into(),
            ));
        }
        self.permit_obsolete_folding = false;
        Ok(self)
    }
}

/// Configuration of the application-facing environment.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    /// Path prefix split off into `SCRIPT_NAME`; the remainder becomes
    /// `PATH_INFO`.
    pub script_name: String,
}

impl EnvConfig {
    /// An empty script name: the whole path is `PATH_INFO`.
    pub fn new() -> EnvConfig {
        EnvConfig::default()
    }

    /// Sets the script-name prefix.
    pub fn script_name(mut self, prefix: &str) -> EnvConfig {
        self.script_name = prefix.to_owned();
        self
    }
}

/// Complete server configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parser limits.
    pub message: MessageConfig,
    /// Environment shaping.
    pub env: EnvConfig,
}

impl Config {
    /// Defaults throughout.
    pub fn new() -> Config {
        Config::default()
    }

    /// Builds from parts.
    pub fn with(message: MessageConfig, env: EnvConfig) -> Config {
        Config { message, env }
    }

    /// Splits a request path into `(SCRIPT_NAME, PATH_INFO)` using the
    /// configured prefix. A path that does not carry the prefix is a
    /// deployment mistake, not a client error.
    pub fn parse_path(&self, path: &str) -> Result<(String, String)> {
        if !path.starts_with(&self.env.script_name) {
            return Err(Error::Config(format!(
                "request path {} does not start with SCRIPT_NAME {}",
                path, self.env.script_name
            )));
        }
        let trimmed = self.env.script_name.trim_end_matches('/');
        Ok((self.env.script_name.clone(), path[trimmed.len()..].to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matches::assert_matches;

    #[test]
    fn request_line_limit_clamps() {
        assert_eq!(
            MessageConfig::new().limit_request_line(-1).limit_request_line,
            MAX_REQUEST_LINE
        );
        assert_eq!(
            MessageConfig::new().limit_request_line(0).limit_request_line,
            usize::MAX
        );
        assert_eq!(
            MessageConfig::new()
                .limit_request_line(100_000)
                .limit_request_line,
            MAX_REQUEST_LINE
        );
        assert_eq!(
            MessageConfig::new().limit_request_line(1).limit_request_line,
            1
        );
    }

    #[test]
    fn field_limits_clamp() {
        assert_eq!(
            MessageConfig::new()
                .limit_request_fields(1_000_000)
                .limit_request_fields,
            MAX_HEADERS
        );
        assert_eq!(
            MessageConfig::new()
                .limit_request_field_size(-5)
                .limit_request_field_size,
            DEFAULT_MAX_HEADERFIELD_SIZE
        );
        assert_eq!(
            MessageConfig::new()
                .limit_request_field_size(0)
                .limit_request_field_size,
            usize::MAX
        );
    }

    #[test]
    fn obsolete_folding_refused() {
        assert_matches!(
            MessageConfig::new().permit_obsolete_folding(true),
            Err(Error::Config(_))
        );
        assert!(MessageConfig::new().permit_obsolete_folding(false).is_ok());
    }

    #[test]
    fn parse_path_with_prefix() {
        let cfg = Config::with(MessageConfig::new(), EnvConfig::new().script_name("/app"));
        let (script, info) = cfg.parse_path("/app/path/to/resource").unwrap();
        assert_eq!(script, "/app");
        assert_eq!(info, "/path/to/resource");
    }

    #[test]
    fn parse_path_empty_prefix() {
        let cfg = Config::new();
        let (script, info) = cfg.parse_path("/anything").unwrap();
        assert_eq!(script, "");
        assert_eq!(info, "/anything");
    }

    #[test]
    fn parse_path_mismatch_is_config_error() {
        let cfg = Config::with(MessageConfig::new(), EnvConfig::new().script_name("/app"));
        assert_matches!(cfg.parse_path("/other"), Err(Error::Config(_)));
    }
}
