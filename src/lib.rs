//! # hearth
//!
//! hearth is a small and **correct** HTTP/1.x origin server core.
//!
//! It covers the hard wire-level ground and nothing else: a strict
//! byte-at-a-time request parser with RFC 9110/9112 token and framing
//! rules, three interchangeable body readers (length-framed, chunked
//! with trailers, read-to-close), a buffered socket reader with
//! look-ahead and bounded delimiter scans, and a response assembler
//! that enforces status-dependent framing — chunked streaming,
//! `Content-Length` verification, hop-by-hop header filtering, and
//! connection persistence.
//!
//! Applications plug in through a CGI-flavoured gateway: they receive
//! an [`Environ`] and a [`Responder`](cycle::Responder), declare status
//! and headers through `start_response`, and hand back (or stream) the
//! body as byte blocks.
//!
//! ```no_run
//! use bytes::Bytes;
//! use hearth::{Environ, Responder, Worker};
//! use std::net::TcpListener;
//!
//! let app = |_environ: &mut Environ,
//!            responder: &mut dyn Responder|
//!  -> hearth::Result<Vec<Bytes>> {
//!     responder.start_response(
//!         "200 OK",
//!         &[("Content-Type".to_owned(), "text/plain".to_owned())],
//!         None,
//!     )?;
//!     Ok(vec![Bytes::from_static(b"Hello, World!")])
//! };
//!
//! let listener = TcpListener::bind("127.0.0.1:8000").unwrap();
//! Worker::new(listener, app).run().unwrap();
//! ```
//!
//! Out of scope by design: HTTP/2 and beyond, TLS, routing, and any
//! worker-pool orchestration past a single stop-accepting flag.

pub mod body;
pub mod buffer;
pub mod config;
pub mod cycle;
pub mod environ;
pub mod error;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod server;
pub mod sink;
pub mod uri;
pub mod version;

#[cfg(test)]
pub(crate) mod mock;

pub use crate::body::{BodyReader, Chunk, Chunks, RequestBody};
pub use crate::buffer::SocketReader;
pub use crate::config::{Config, EnvConfig, MessageConfig};
pub use crate::cycle::{Application, Cycle, Responder};
pub use crate::environ::Environ;
pub use crate::error::{Error, Result};
pub use crate::parser::{should_close, RequestParser};
pub use crate::request::{Request, RequestHead};
pub use crate::response::Response;
pub use crate::server::{serve_requests, Worker, WorkerHandle};
pub use crate::sink::ErrorSink;
pub use crate::version::HttpVersion;
