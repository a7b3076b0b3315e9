//! The accept loop.
//!
//! One [`Worker`] owns a listener and an application. Connections are
//! handled to completion, one at a time: the parser drains the
//! pipelined requests, each runs through a [`Cycle`], and wire failures
//! short-circuit into synthetic 400/500 responses. A shutdown handle
//! flips a stop-accepting flag; in-flight connections finish.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info};

use crate::buffer::SocketReader;
use crate::config::Config;
use crate::cycle::{Application, Cycle};
use crate::environ::Environ;
use crate::error::Result;
use crate::parser::RequestParser;
use crate::response::Response;

/// A single-threaded accept-and-serve loop.
pub struct Worker<A> {
    listener: TcpListener,
    app: A,
    cfg: Config,
    alive: Arc<AtomicBool>,
}

/// Flips the worker's stop-accepting flag from another thread.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    alive: Arc<AtomicBool>,
}

impl WorkerHandle {
    /// Asks the worker to stop accepting new connections.
    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl<A: Application> Worker<A> {
    /// A worker with default configuration.
    pub fn new(listener: TcpListener, app: A) -> Worker<A> {
        Worker::with_config(listener, app, Config::new())
    }

    /// A worker with explicit configuration.
    pub fn with_config(listener: TcpListener, app: A, cfg: Config) -> Worker<A> {
        Worker {
            listener,
            app,
            cfg,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A handle for shutting this worker down.
    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            alive: self.alive.clone(),
        }
    }

    /// Accepts and serves connections until shut down.
    pub fn run(&mut self) -> io::Result<()> {
        info!("worker listening on {}", self.listener.local_addr()?);
        while self.alive.load(Ordering::SeqCst) {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) => {
                    if !self.alive.load(Ordering::SeqCst) {
                        break;
                    }
                    error!("accept failed: {}", e);
                    continue;
                }
            };
            debug!("connection from {}", peer);
            if let Err(e) = self.handle_connection(stream) {
                debug!("connection from {} ended with error: {}", peer, e);
            }
        }
        info!("worker stopped");
        Ok(())
    }

    fn handle_connection(&mut self, stream: TcpStream) -> Result<()> {
        let local = stream.local_addr()?;
        let server_name = local.ip().to_string();
        let server_port = local.port().to_string();
        let mut conn = stream.try_clone()?;
        let mut parser = RequestParser::new(self.cfg.message.clone(), SocketReader::new(stream));
        serve_requests(
            &self.cfg,
            &mut self.app,
            &mut parser,
            &mut conn,
            (&server_name, &server_port),
        )
    }
}

/// Drains one connection's request sequence through the application.
///
/// Error mapping per request: wire-parse failures answer with a 400 and
/// close; anything else answers with a 500 when the response head has
/// not been flushed, and just closes when it has. Generic over the
/// stream halves so in-memory transports can drive it.
pub fn serve_requests<R, W, A>(
    cfg: &Config,
    app: &mut A,
    parser: &mut RequestParser<R>,
    conn: &mut W,
    server: (&str, &str),
) -> Result<()>
where
    R: Read,
    W: Write,
    A: Application + ?Sized,
{
    let mut requests = parser.parse();
    loop {
        match requests.next() {
            None => return Ok(()),
            Some(Ok(request)) => {
                let environ = match Environ::build(cfg, server, request) {
                    Ok(environ) => environ,
                    Err(e) => {
                        error!("environment build failed: {}", e);
                        return send_error(conn, Response::internal_server_error(&e));
                    }
                };
                let mut cycle = Cycle::new(conn, environ);
                match cycle.handle_request(app) {
                    Ok(()) => continue,
                    Err(e) => {
                        let flushed = cycle.headers_sent();
                        drop(cycle);
                        if flushed {
                            debug!("application failed after headers were flushed: {}", e);
                            return Ok(());
                        }
                        let resp = if e.is_parse() {
                            Response::bad_request(&e)
                        } else {
                            Response::internal_server_error(&e)
                        };
                        return send_error(conn, resp);
                    }
                }
            }
            Some(Err(e)) => {
                debug!("request parsing failed: {}", e);
                let resp = if e.is_parse() {
                    Response::bad_request(&e)
                } else {
                    Response::internal_server_error(&e)
                };
                return send_error(conn, resp);
            }
        }
    }
}

fn send_error<W: Write>(conn: &mut W, resp: Response) -> Result<()> {
    conn.write_all(&resp.headers_data())?;
    for frame in resp.body_stream() {
        conn.write_all(&frame)?;
    }
    conn.flush()?;
    Ok(())
}
