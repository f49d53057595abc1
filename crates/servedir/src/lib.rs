//! > An HTTP static file server for local directories
//!
//! `servedir` puts a directory on your filesystem behind a loopback HTTP
//! address with zero setup.  It prioritizes small size and compile times over
//! speed, scalability, or hardening.
//!
//! # Example
//!
//! ```rust,no_run
//! let path = std::env::current_dir().unwrap();
//! let server = servedir::Server::new(&path);
//!
//! server.bind().unwrap();
//! println!("Serving {} at http://{}/", path.display(), server.addr());
//! println!("Hit CTRL-C to stop");
//!
//! server.serve().unwrap();
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

use std::sync::{RwLock, TryLockError};

mod handler;

use handler::static_file_handler;

/// Custom server settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerBuilder {
    source: std::path::PathBuf,
    hostname: Option<String>,
    port: Option<u16>,
    workers: Option<usize>,
}

impl ServerBuilder {
    pub fn new(source: impl Into<std::path::PathBuf>) -> Self {
        Self {
            source: source.into(),
            hostname: None,
            port: None,
            workers: None,
        }
    }

    /// Override the hostname
    ///
    /// By default, the server only answers on the loopback interface
    /// (`127.0.0.1`).
    pub fn hostname(&mut self, hostname: impl Into<String>) -> &mut Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Override the port
    ///
    /// By default, port `8000`.  If the port is taken, [`Server::serve`] errors
    /// out rather than hunting for a free one.
    pub fn port(&mut self, port: u16) -> &mut Self {
        self.port = Some(port);
        self
    }

    /// Override how many threads answer requests
    ///
    /// By default, `4`.  More than one keeps a slow client from stalling
    /// everyone else.
    pub fn workers(&mut self, workers: usize) -> &mut Self {
        self.workers = Some(workers);
        self
    }

    /// Create a server
    ///
    /// This is needed for accessing the address before serving
    pub fn build(&self) -> Server {
        let source = self.source.clone();
        let hostname = self.hostname.as_deref().unwrap_or("127.0.0.1");
        let port = self.port.unwrap_or(8000);
        // zero workers would mean nobody ever calls `recv`
        let workers = self.workers.unwrap_or(4).max(1);

        Server {
            source,
            addr: format!("{hostname}:{port}"),
            workers,
            server: RwLock::new(None),
        }
    }

    /// Start the webserver
    pub fn serve(&self) -> Result<(), Error> {
        self.build().serve()
    }
}

pub struct Server {
    source: std::path::PathBuf,
    addr: String,
    workers: usize,
    server: RwLock<Option<Bound>>,
}

struct Bound {
    server: tiny_http::Server,
    serving: bool,
}

impl Server {
    /// Serve on `127.0.0.1:8000`
    pub fn new(source: impl Into<std::path::PathBuf>) -> Self {
        ServerBuilder::new(source).build()
    }

    /// The location being served
    pub fn source(&self) -> &std::path::Path {
        self.source.as_path()
    }

    /// The address the server is available at
    ///
    /// This is useful for telling users how to access the served up files.
    pub fn addr(&self) -> &str {
        self.addr.as_str()
    }

    /// Whether the server was running at the instant the call happened
    pub fn is_running(&self) -> bool {
        matches!(self.server.read().as_deref(), Ok(Some(_)))
    }

    /// Claim the socket without serving yet
    ///
    /// Splitting this out of [`Server::serve`] lets callers announce the
    /// address, or hand it to a browser, only once the port is actually held.
    pub fn bind(&self) -> Result<(), Error> {
        match self.server.try_write().as_deref_mut() {
            Ok(slot @ None) => {
                // attempts to create a server
                *slot = Some(Bound {
                    server: tiny_http::Server::http(self.addr()).map_err(Error::new)?,
                    serving: false,
                });
                Ok(())
            }
            Ok(Some(_)) | Err(TryLockError::WouldBlock) => {
                Err(Error::new("the server is running"))
            }
            Err(error @ TryLockError::Poisoned(_)) => Err(Error::new(error)),
        }
    }

    /// Start the webserver
    ///
    /// Binds first if [`Server::bind`] hasn't.  Blocks until [`Server::close`]
    /// is called from another thread.
    pub fn serve(&self) -> Result<(), Error> {
        match self.server.try_write().as_deref_mut() {
            Ok(Some(Bound {
                serving: serving @ false,
                ..
            })) => {
                // `bind` already claimed the socket
                *serving = true;
            }
            Ok(slot @ None) => {
                // attempts to create a server
                *slot = Some(Bound {
                    server: tiny_http::Server::http(self.addr()).map_err(Error::new)?,
                    serving: true,
                });
            }
            Ok(Some(_)) | Err(TryLockError::WouldBlock) => {
                return Err(Error::new("the server is running"))
            }
            Err(error @ TryLockError::Poisoned(_)) => return Err(Error::new(error)),
        }

        {
            let bound = self.server.read().map_err(Error::new)?;
            // unwrap is safe here
            let server = &bound.as_ref().unwrap().server;
            std::thread::scope(|scope| {
                for _ in 1..self.workers {
                    scope.spawn(|| request_loop(server, &self.source));
                }
                request_loop(server, &self.source);
            });
        }

        *self.server.write().map_err(Error::new)? = None;

        Ok(())
    }

    /// Closes the server gracefully
    pub fn close(&self) {
        if let Ok(Some(bound)) = self.server.read().as_deref() {
            // each `unblock` wakes exactly one worker out of `recv`
            for _ in 0..self.workers {
                bound.server.unblock();
            }
        }
    }
}

/// Serve Error
#[derive(Debug)]
pub struct Error {
    message: String,
}

impl Error {
    fn new(message: impl ToString) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.message.fmt(fmt)
    }
}

impl std::error::Error for Error {}

fn request_loop(server: &tiny_http::Server, source: &std::path::Path) {
    while let Ok(request) = server.recv() {
        // handles the request
        if let Err(e) = static_file_handler(source, request) {
            log::error!("{e}");
        }
    }
}
