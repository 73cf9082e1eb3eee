//! A small HTTP/1.0-1.1 front end that serves static files and gateways
//! `?query` URLs to a datagram search backend, streaming the backend's
//! multi-packet reply back as one response body.
//!
//! One request per connection, GET only. The backend speaks raw UDP: body
//! chunks followed by an exact-match sentinel datagram, `DONE` or
//! `File Not Found`, with a 5 second bound on each receive.

pub mod gateway;
pub mod http;
pub mod server;

pub use gateway::{
    classify_datagram, run_exchange, DatagramKind, ExchangeOutcome, ExchangeState,
    MAX_DATAGRAM_SIZE, RECV_TIMEOUT, SENTINEL_DONE, SENTINEL_NOT_FOUND,
};
pub use http::{
    classify_url, decode_query, error_body, first_line, get_mime_type, parse_request,
    ParseOutcome, Request, Status, UrlClassification, MAX_REQUEST_SIZE,
};
pub use server::{Config, Server, DB_HOST, DEFAULT_DOC_ROOT};
