//! A hello-world application on the hearth core.
//!
//! Run with `cargo run --example hello`, then:
//!
//! ```notrust
//! curl -v http://127.0.0.1:8000/
//! ```

use std::net::TcpListener;

use bytes::Bytes;
use hearth::{Environ, Responder, Worker};

fn app(environ: &mut Environ, responder: &mut dyn Responder) -> hearth::Result<Vec<Bytes>> {
    let greeting = format!(
        "Hello, World! You asked for {}{}\n",
        environ.script_name, environ.path_info
    );
    responder.start_response(
        "200 OK",
        &[("Content-Type".to_owned(), "text/plain".to_owned())],
        None,
    )?;
    Ok(vec![Bytes::from(greeting.into_bytes())])
}

fn main() -> std::io::Result<()> {
    pretty_env_logger::init();
    let listener = TcpListener::bind("127.0.0.1:8000")?;
    Worker::new(listener, app).run()
}
