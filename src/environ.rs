//! The application-facing environment.
//!
//! A parsed request is handed to the application as a CGI-flavoured
//! mapping: `REQUEST_METHOD`, `SCRIPT_NAME`/`PATH_INFO` (split on the
//! configured prefix), `QUERY_STRING`, server identity, and the request
//! headers rekeyed as `HTTP_<NAME>` — except `Content-Type` and
//! `Content-Length`, which keep their bare CGI names. The body rides
//! along as `input`, the error stream as `errors`.

use crate::body::RequestBody;
use crate::config::Config;
use crate::error::Result;
use crate::headers::title_case;
use crate::request::{Request, RequestHead};
use crate::sink::ErrorSink;
use crate::version::HttpVersion;

/// The environment handed to the application for one request.
#[derive(Debug)]
pub struct Environ {
    /// The request method token.
    pub request_method: String,
    /// The configured path prefix this application is mounted at.
    pub script_name: String,
    /// The request path past the script name.
    pub path_info: String,
    /// The raw query string.
    pub query_string: String,
    /// Bare CGI `CONTENT_TYPE`, when the request carried one.
    pub content_type: Option<String>,
    /// Bare CGI `CONTENT_LENGTH`, when the request carried one.
    pub content_length: Option<String>,
    /// The server host name or address.
    pub server_name: String,
    /// The server port, as text.
    pub server_port: String,
    /// `HTTP/M.N` of the driving request.
    pub server_protocol: String,
    /// Request headers rekeyed as `HTTP_<UPPER_UNDERSCORED>`, duplicate
    /// values joined with commas in arrival order.
    pub http_headers: Vec<(String, String)>,
    /// The URL scheme presented to the application.
    pub url_scheme: String,
    /// Whether the application may be entered from several threads.
    pub multithread: bool,
    /// Whether several server processes run this application.
    pub multiprocess: bool,
    /// Whether the server runs each application instance only once.
    pub run_once: bool,
    /// The request body stream.
    pub input: RequestBody,
    /// The application error stream.
    pub errors: ErrorSink,
    version: HttpVersion,
}

impl Environ {
    /// Builds the environment for `request`, consuming its body.
    pub fn build(cfg: &Config, server: (&str, &str), request: Request) -> Result<Environ> {
        let (script_name, path_info) = cfg.parse_path(&request.head.path)?;

        let mut content_type = None;
        let mut content_length = None;
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for (name, value) in &request.head.headers {
            let uname = name.to_uppercase().replace('-', "_");
            if uname == "CONTENT_TYPE" {
                content_type = Some(value.clone());
                continue;
            }
            if uname == "CONTENT_LENGTH" {
                content_length = Some(value.clone());
                continue;
            }
            let key = format!("HTTP_{}", uname);
            match grouped.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(value.clone()),
                None => grouped.push((key, vec![value.clone()])),
            }
        }
        let http_headers = grouped
            .into_iter()
            .map(|(key, values)| (key, values.join(",")))
            .collect();

        let version = request.head.version;
        Ok(Environ {
            request_method: request.head.method,
            script_name,
            path_info,
            query_string: request.head.query,
            content_type,
            content_length,
            server_name: server.0.to_owned(),
            server_port: server.1.to_owned(),
            server_protocol: version.to_string(),
            http_headers,
            url_scheme: "http".to_owned(),
            multithread: false,
            multiprocess: false,
            run_once: false,
            input: request.body,
            errors: ErrorSink::with_stderr(),
            version,
        })
    }

    /// The environment as flat CGI variables, headers included.
    pub fn vars(&self) -> Vec<(String, String)> {
        let mut vars = vec![
            ("REQUEST_METHOD".to_owned(), self.request_method.clone()),
            ("SCRIPT_NAME".to_owned(), self.script_name.clone()),
            ("PATH_INFO".to_owned(), self.path_info.clone()),
            ("QUERY_STRING".to_owned(), self.query_string.clone()),
            ("SERVER_NAME".to_owned(), self.server_name.clone()),
            ("SERVER_PORT".to_owned(), self.server_port.clone()),
            ("SERVER_PROTOCOL".to_owned(), self.server_protocol.clone()),
        ];
        if let Some(ref ct) = self.content_type {
            vars.push(("CONTENT_TYPE".to_owned(), ct.clone()));
        }
        if let Some(ref cl) = self.content_length {
            vars.push(("CONTENT_LENGTH".to_owned(), cl.clone()));
        }
        vars.extend(self.http_headers.iter().cloned());
        vars
    }

    /// Reconstructs the request head this environment was built from;
    /// the response draft works off it.
    pub(crate) fn request_head(&self) -> RequestHead {
        let mut headers: Vec<(String, String)> = self
            .http_headers
            .iter()
            .map(|(name, value)| {
                let bare = name["HTTP_".len()..].replace('_', "-");
                (title_case(&bare), value.clone())
            })
            .collect();
        if let Some(ref ct) = self.content_type {
            headers.push(("Content-Type".to_owned(), ct.clone()));
        }
        if let Some(ref cl) = self.content_length {
            headers.push(("Content-Length".to_owned(), cl.clone()));
        }
        RequestHead {
            method: self.request_method.clone(),
            path: format!("{}{}", self.script_name, self.path_info),
            query: self.query_string.clone(),
            fragment: String::new(),
            version: self.version,
            headers,
        }
    }
}
