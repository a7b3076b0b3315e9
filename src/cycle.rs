//! The per-request cycle.
//!
//! One [`Cycle`] binds a parsed request, its environment, and the
//! connection writer for the duration of one request/response exchange.
//! The application signals status and headers through
//! [`Responder::start_response`] and streams payload through
//! [`Responder::write`]; both are methods on the cycle, and the
//! "headers already sent" rule is a field on it.

use std::io::Write;

use bytes::Bytes;
use log::debug;

use crate::environ::Environ;
use crate::error::{Error, Result};
use crate::request::RequestHead;
use crate::response::Response;

/// The response side of the application contract.
pub trait Responder {
    /// Declares the response status and headers.
    ///
    /// The first call drafts the response. Once headers have been
    /// flushed, a later call must carry `exc_info`; it is handed back
    /// as the error so the failure propagates with its original
    /// diagnostic. Before the flush, a call with `exc_info` replaces
    /// the in-progress response wholesale.
    ///
    /// # Panics
    ///
    /// Panics on a repeated call without `exc_info` — that is an
    /// application bug, not a wire condition.
    fn start_response(
        &mut self,
        status: &str,
        headers: &[(String, String)],
        exc_info: Option<Error>,
    ) -> Result<()>;

    /// Streams one block of response payload, flushing the headers
    /// first if they have not gone out yet.
    ///
    /// # Panics
    ///
    /// Panics when called before `start_response`.
    fn write(&mut self, data: &[u8]) -> Result<()>;
}

/// The application callable: gets the environment and a [`Responder`],
/// returns the response body as a sequence of byte blocks.
pub trait Application {
    /// Handles one request.
    fn call(&mut self, environ: &mut Environ, responder: &mut dyn Responder)
        -> Result<Vec<Bytes>>;
}

impl<F> Application for F
where
    F: FnMut(&mut Environ, &mut dyn Responder) -> Result<Vec<Bytes>>,
{
    fn call(
        &mut self,
        environ: &mut Environ,
        responder: &mut dyn Responder,
    ) -> Result<Vec<Bytes>> {
        (self)(environ, responder)
    }
}

/// Per-request glue between parser output, application, and the wire.
pub struct Cycle<'a, W: Write> {
    conn: &'a mut W,
    request_head: RequestHead,
    environ: Option<Environ>,
    resp: Option<Response>,
    headers_sent: bool,
    chunk_terminated: bool,
}

impl<'a, W: Write> Cycle<'a, W> {
    /// Builds the cycle for one request.
    pub fn new(conn: &'a mut W, environ: Environ) -> Cycle<'a, W> {
        Cycle {
            conn,
            request_head: environ.request_head(),
            environ: Some(environ),
            resp: None,
            headers_sent: false,
            chunk_terminated: false,
        }
    }

    /// Whether the response head has been flushed to the connection.
    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    /// Invokes the application and streams its response out.
    ///
    /// The returned block sequence becomes the response body; each
    /// block is flushed through [`Responder::write`]. An application
    /// that never wrote still gets its head and body flushed at the
    /// end.
    pub fn handle_request<A: Application + ?Sized>(&mut self, app: &mut A) -> Result<()> {
        let mut environ = self.environ.take().expect("cycle already ran");
        let result = app.call(&mut environ, self);
        self.environ = Some(environ);
        let blocks = result?;

        {
            let resp = self
                .resp
                .as_mut()
                .ok_or_else(|| Error::App("application never called start_response".into()))?;
            if !resp.has_body() {
                resp.set_body(blocks.iter().cloned())?;
            }
        }
        for block in &blocks {
            self.write(block)?;
        }
        self.finish()
    }

    /// Completes the exchange: flushes the head and body if the
    /// application never wrote, or the terminating chunk if a chunked
    /// stream was left open.
    pub fn finish(&mut self) -> Result<()> {
        if !self.headers_sent {
            let resp = self
                .resp
                .as_ref()
                .ok_or_else(|| Error::App("application never called start_response".into()))?;
            self.conn.write_all(&resp.headers_data())?;
            self.headers_sent = true;
            for frame in resp.body_stream() {
                self.conn.write_all(&frame)?;
            }
            if resp.is_chunked() {
                self.chunk_terminated = true;
            }
        } else if !self.chunk_terminated
            && self.resp.as_ref().map_or(false, Response::is_chunked)
        {
            self.chunk_terminated = true;
            self.conn.write_all(b"0\r\n\r\n")?;
        }
        self.conn.flush()?;
        Ok(())
    }
}

impl<'a, W: Write> Responder for Cycle<'a, W> {
    fn start_response(
        &mut self,
        status: &str,
        headers: &[(String, String)],
        exc_info: Option<Error>,
    ) -> Result<()> {
        if self.headers_sent {
            match exc_info {
                Some(err) => {
                    debug!("late start_response after flush: {}", err);
                    return Err(err);
                }
                None => panic!("Response headers already set!"),
            }
        }
        if self.resp.is_some() && exc_info.is_none() {
            panic!("Response headers already set!");
        }

        let mut resp = Response::draft(&self.request_head);
        resp.set_status(status);
        resp.extend_headers(headers)?;
        self.resp = Some(resp);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let resp = match self.resp.as_mut() {
            Some(resp) => resp,
            None => panic!("Response headers not set!"),
        };
        if !self.headers_sent {
            if !resp.has_body() {
                resp.set_body(vec![Bytes::copy_from_slice(data)])?;
            }
            self.conn.write_all(&resp.headers_data())?;
            self.headers_sent = true;
        }
        if resp.is_chunked() {
            if data.is_empty() {
                if !self.chunk_terminated {
                    self.chunk_terminated = true;
                    self.conn.write_all(b"0\r\n\r\n")?;
                }
            } else {
                let mut frame = Vec::with_capacity(data.len() + 8);
                write!(frame, "{:x}\r\n", data.len()).expect("writing to a Vec");
                frame.extend_from_slice(data);
                frame.extend_from_slice(b"\r\n");
                self.conn.write_all(&frame)?;
            }
        } else {
            self.conn.write_all(data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Cycle, Responder};
    use crate::body::RequestBody;
    use crate::config::Config;
    use crate::environ::Environ;
    use crate::error::Error;
    use crate::request::{Request, RequestHead};
    use crate::response::Response;
    use crate::version::{HttpVersion, HTTP_11};
    use bytes::Bytes;

    fn environ(version: HttpVersion) -> Environ {
        let request = Request {
            head: RequestHead {
                method: "GET".into(),
                path: "/path/to/resource".into(),
                query: "query=string".into(),
                fragment: String::new(),
                version,
                headers: Vec::new(),
            },
            body: RequestBody::empty(),
            trailers: Vec::new(),
        };
        Environ::build(&Config::new(), ("localhost", "8000"), request).unwrap()
    }

    fn ready_response(headers: &[(&str, &str)]) -> Response {
        Response::from_parts(
            HTTP_11,
            Some("200 OK".into()),
            headers
                .iter()
                .map(|&(n, v)| (n.to_owned(), v.to_owned()))
                .collect(),
            None,
        )
    }

    #[test]
    fn write_flushes_headers_once_then_payload() {
        let mut out: Vec<u8> = Vec::new();
        let mut cycle = Cycle::new(&mut out, environ(HTTP_11));
        let mut resp = ready_response(&[
            ("Date", "Fri, 07 Jul 2025 10:00:00 GMT"),
            ("Server", "hearth-test"),
            ("Connection", "keep-alive"),
            ("Content-Type", "text/plain"),
        ]);
        resp.set_body(vec![Bytes::from_static(b"Hello, World!")]).unwrap();
        cycle.resp = Some(resp);

        cycle.write(b"Hello, World!").unwrap();
        assert_eq!(
            out,
            &b"HTTP/1.1 200 OK\r\n\
               Date: Fri, 07 Jul 2025 10:00:00 GMT\r\n\
               Server: hearth-test\r\n\
               Connection: keep-alive\r\n\
               Content-Type: text/plain\r\n\
               Content-Length: 13\r\n\
               \r\n\
               Hello, World!"[..]
        );
    }

    #[test]
    fn write_frames_chunked_payload() {
        let mut out: Vec<u8> = Vec::new();
        let mut cycle = Cycle::new(&mut out, environ(HTTP_11));
        let mut resp = ready_response(&[
            ("Date", "Fri, 07 Jul 2025 10:00:00 GMT"),
            ("Server", "hearth-test"),
            ("Connection", "keep-alive"),
            ("Transfer-Encoding", "chunked"),
        ]);
        resp.set_body(vec![
            Bytes::from_static(b"Hello, "),
            Bytes::from_static(b"World!"),
            Bytes::new(),
        ])
        .unwrap();
        cycle.resp = Some(resp);

        cycle.write(b"Hello, ").unwrap();
        cycle.write(b"World!").unwrap();
        cycle.write(b"").unwrap();

        let text = String::from_utf8(out).unwrap();
        let body = text.splitn(2, "\r\n\r\n").nth(1).unwrap();
        assert_eq!(body, "7\r\nHello, \r\n6\r\nWorld!\r\n0\r\n\r\n");
    }

    #[test]
    fn start_response_drafts_and_write_flushes() {
        use std::cell::RefCell;
        use std::rc::Rc;

        #[derive(Clone, Default)]
        struct SharedBuf(Rc<RefCell<Vec<u8>>>);

        impl std::io::Write for SharedBuf {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.borrow_mut().write(buf)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buf = SharedBuf::default();
        let mut writer = buf.clone();
        let mut cycle = Cycle::new(&mut writer, environ(HTTP_11));
        cycle
            .start_response(
                "200 OK",
                &[("Content-Type".to_owned(), "text/plain".to_owned())],
                None,
            )
            .unwrap();
        assert!(
            buf.0.borrow().is_empty(),
            "headers must not flush before a write"
        );
        cycle.write(b"Hello, World!").unwrap();

        let text = String::from_utf8(buf.0.borrow().clone()).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\nDate: "));
        assert!(text.contains("\r\nConnection: keep-alive\r\n"));
        assert!(text.contains("\r\nContent-Type: text/plain\r\n"));
        assert!(text.contains("\r\nContent-Length: 13\r\n"));
        assert!(text.ends_with("\r\n\r\nHello, World!"));
    }

    #[test]
    fn start_response_with_exc_info_replaces_before_flush() {
        let mut out: Vec<u8> = Vec::new();
        let mut cycle = Cycle::new(&mut out, environ(HTTP_11));
        cycle.start_response("200 OK", &[], None).unwrap();
        cycle
            .start_response(
                "404 Not Found",
                &[],
                Some(Error::App("Test error".into())),
            )
            .unwrap();
        cycle.write(b"gone").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[test]
    fn start_response_after_flush_reraises() {
        let mut out: Vec<u8> = Vec::new();
        let mut cycle = Cycle::new(&mut out, environ(HTTP_11));
        cycle.start_response("200 OK", &[], None).unwrap();
        cycle.write(b"partial").unwrap();
        let err = cycle
            .start_response(
                "500 Internal Server Error",
                &[],
                Some(Error::App("Test error".into())),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "Test error");
    }

    #[test]
    #[should_panic(expected = "Response headers already set!")]
    fn start_response_twice_without_exc_info_panics() {
        let mut out: Vec<u8> = Vec::new();
        let mut cycle = Cycle::new(&mut out, environ(HTTP_11));
        cycle.start_response("200 OK", &[], None).unwrap();
        let _ = cycle.start_response("200 OK", &[], None);
    }

    #[test]
    #[should_panic(expected = "Response headers not set!")]
    fn write_before_start_response_panics() {
        let mut out: Vec<u8> = Vec::new();
        let mut cycle = Cycle::new(&mut out, environ(HTTP_11));
        let _ = cycle.write(b"payload");
    }

    #[test]
    fn handle_request_streams_app_blocks() {
        let mut app = |_environ: &mut Environ, responder: &mut dyn Responder|
                      -> crate::Result<Vec<Bytes>> {
            responder.start_response(
                "200 OK",
                &[("Content-Type".to_owned(), "text/plain".to_owned())],
                None,
            )?;
            Ok(vec![Bytes::from_static(b"Hello, "), Bytes::from_static(b"World!")])
        };
        let mut out: Vec<u8> = Vec::new();
        let mut cycle = Cycle::new(&mut out, environ(HTTP_11));
        cycle.handle_request(&mut app).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\r\nContent-Length: 13\r\n"));
        assert!(text.ends_with("\r\n\r\nHello, World!"));
    }

    #[test]
    fn handle_request_flushes_even_without_writes() {
        let mut app = |_environ: &mut Environ, responder: &mut dyn Responder|
                      -> crate::Result<Vec<Bytes>> {
            responder.start_response("204 No Content", &[], None)?;
            Ok(Vec::new())
        };
        let mut out: Vec<u8> = Vec::new();
        let mut cycle = Cycle::new(&mut out, environ(HTTP_11));
        cycle.handle_request(&mut app).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(text.contains("\r\nContent-Length: 0\r\n"));
    }

    #[test]
    fn handle_request_without_start_response_is_an_app_error() {
        let mut app = |_environ: &mut Environ, _responder: &mut dyn Responder|
                      -> crate::Result<Vec<Bytes>> { Ok(vec![Bytes::new()]) };
        let mut out: Vec<u8> = Vec::new();
        let mut cycle = Cycle::new(&mut out, environ(HTTP_11));
        let err = cycle.handle_request(&mut app).unwrap_err();
        assert!(!err.is_parse());
        assert!(!cycle.headers_sent());
    }

    #[test]
    fn app_error_propagates_before_flush() {
        let mut app = |_environ: &mut Environ, _responder: &mut dyn Responder|
                      -> crate::Result<Vec<Bytes>> {
            Err(Error::App("exploded".into()))
        };
        let mut out: Vec<u8> = Vec::new();
        let mut cycle = Cycle::new(&mut out, environ(HTTP_11));
        let err = cycle.handle_request(&mut app).unwrap_err();
        assert_eq!(err.to_string(), "exploded");
        assert!(!cycle.headers_sent());
        assert!(out.is_empty());
    }
}
