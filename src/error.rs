// Error types shared by the reader, the terminal handlers and config loading
use std::io;

use thiserror::Error;

/// Failure while reading one HTTP message off a socket.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("timed out waiting for request")]
    TimedOut,
    #[error("connection closed before a request arrived")]
    Closed,
    #[error("headers too large")]
    HeadersTooLarge,
    #[error("body too large")]
    BodyTooLarge,
    #[error("invalid header encoding")]
    InvalidEncoding,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failure inside the forwarder or the tunnel.
///
/// None of these ever reach the client as a response; the connection is
/// simply closed and the error logged.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("invalid request target '{target}': {source}")]
    BadTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request target '{0}' has no host")]
    MissingHost(String),
    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("invalid CONNECT target '{0}'")]
    BadConnectTarget(String),
    #[error("could not resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid TLS server name '{0}'")]
    ServerName(String),
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("parse error in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
