use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::gateway::{self, ExchangeOutcome};
use crate::http::{self, ParseOutcome, Status, UrlClassification};

/// The backend host is fixed; only its port is configurable.
pub const DB_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Directory the site is served from.
pub const DEFAULT_DOC_ROOT: &str = "Webpage";

const INDEX_DOCUMENT: &str = "index.html";

/// How long we wait for a client to finish sending its request head.
const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub backend_addr: SocketAddr,
    pub doc_root: PathBuf,
    /// Per-receive bound on the UDP exchange.
    pub recv_timeout: Duration,
}

impl Config {
    pub fn new(http_port: u16, db_port: u16) -> Self {
        Config {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), http_port),
            backend_addr: SocketAddr::new(DB_HOST, db_port),
            doc_root: PathBuf::from(DEFAULT_DOC_ROOT),
            recv_timeout: gateway::RECV_TIMEOUT,
        }
    }
}

pub struct Server {
    listener: TcpListener,
    config: Arc<Config>,
}

impl Server {
    pub async fn bind(config: Config) -> io::Result<Server> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        Ok(Server {
            listener,
            config: Arc::new(config),
        })
    }

    /// Actual bound address; useful when the config asked for port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop. Each connection runs in its own task so a stalled
    /// backend or a misbehaving client only ever holds up its own request.
    /// Accept errors are logged and the loop keeps going.
    pub async fn serve(self) -> io::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let _ = stream.set_nodelay(true);
                    let config = Arc::clone(&self.config);
                    tokio::spawn(async move {
                        handle_connection(stream, peer, config).await;
                    });
                }
                Err(e) => {
                    eprintln!("accept failed: {}", e);
                }
            }
        }
    }
}

/// One access-log line per completed request.
fn log_request(peer: &SocketAddr, first_line: &str, status: &str) {
    println!("{} \"{}\" {}", peer.ip(), first_line, status);
}

/// Serve one connection start to finish: read, parse, route, respond,
/// close. Never propagates an error past itself.
async fn handle_connection(mut stream: TcpStream, peer: SocketAddr, config: Arc<Config>) {
    if let Err(e) = handle_request(&mut stream, &peer, &config).await {
        eprintln!("{}: connection error: {}", peer.ip(), e);
    }
    let _ = stream.shutdown().await;
}

async fn handle_request(
    stream: &mut TcpStream,
    peer: &SocketAddr,
    config: &Config,
) -> io::Result<()> {
    let (head, truncated) = match read_request_head(stream).await? {
        Some(head) => head,
        None => {
            // Client went quiet before finishing its headers.
            let line = String::new();
            stream.write_all(&http::error_response(Status::RequestTimeout)).await?;
            log_request(peer, &line, &Status::RequestTimeout.phrase());
            return Ok(());
        }
    };
    let first_line = http::first_line(&head);

    let request = match http::parse_request(&head, truncated) {
        ParseOutcome::Malformed => {
            return respond_error(stream, peer, &first_line, Status::BadRequest).await;
        }
        ParseOutcome::TooLarge => {
            return respond_error(stream, peer, &first_line, Status::TooLarge).await;
        }
        ParseOutcome::NotImplemented => {
            return respond_error(stream, peer, &first_line, Status::NotImplemented).await;
        }
        ParseOutcome::Request(request) => request,
    };

    match http::classify_url(&request.url) {
        UrlClassification::Rejected => {
            respond_error(stream, peer, &first_line, Status::BadRequest).await
        }
        UrlClassification::StaticPath(url) => {
            let status = serve_static(stream, &config.doc_root, &url).await?;
            log_request(peer, &first_line, &status.phrase());
            Ok(())
        }
        UrlClassification::SearchQuery(term) => {
            serve_query(stream, peer, &first_line, &term, config).await
        }
    }
}

async fn respond_error(
    stream: &mut TcpStream,
    peer: &SocketAddr,
    first_line: &str,
    status: Status,
) -> io::Result<()> {
    stream.write_all(&http::error_response(status)).await?;
    log_request(peer, first_line, &status.phrase());
    Ok(())
}

/// Read until the blank line ending the headers, EOF, or the size bound.
/// Returns `None` on client read timeout; the boolean is true when the
/// size bound cut the read short.
async fn read_request_head(stream: &mut TcpStream) -> io::Result<Option<(Vec<u8>, bool)>> {
    use tokio::io::AsyncReadExt;

    let mut head = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        if http::has_header_terminator(&head) {
            return Ok(Some((head, false)));
        }
        if head.len() >= http::MAX_REQUEST_SIZE {
            return Ok(Some((head, true)));
        }
        let n = match timeout(CLIENT_READ_TIMEOUT, stream.read(&mut chunk)).await {
            Ok(result) => result?,
            Err(_) => return Ok(None),
        };
        if n == 0 {
            // EOF before the terminator.
            return Ok(Some((head, false)));
        }
        head.extend_from_slice(&chunk[..n]);
    }
}

/// Map a validated static URL onto the document root. `/` and directories
/// both resolve to the index document.
async fn resolve_path(doc_root: &Path, url: &str) -> PathBuf {
    if url == "/" {
        return doc_root.join(INDEX_DOCUMENT);
    }
    let path = doc_root.join(url.trim_start_matches('/'));
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => path.join(INDEX_DOCUMENT),
        _ => path,
    }
}

/// Stream a static file: 200 with the bytes verbatim, or 404.
async fn serve_static(stream: &mut TcpStream, doc_root: &Path, url: &str) -> io::Result<Status> {
    let path = resolve_path(doc_root, url).await;
    let mut file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(_) => {
            stream.write_all(&http::error_response(Status::NotFound)).await?;
            return Ok(Status::NotFound);
        }
    };
    let len = match file.metadata().await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => {
            stream.write_all(&http::error_response(Status::NotFound)).await?;
            return Ok(Status::NotFound);
        }
    };

    let head = http::file_response_head(&path.to_string_lossy(), len);
    stream.write_all(&head).await?;
    tokio::io::copy(&mut file, stream).await?;
    stream.flush().await?;
    Ok(Status::Ok)
}

/// Route a search query through the UDP backend and finish the response.
async fn serve_query(
    stream: &mut TcpStream,
    peer: &SocketAddr,
    first_line: &str,
    term: &str,
    config: &Config,
) -> io::Result<()> {
    let outcome =
        gateway::run_exchange(stream, term, config.backend_addr, config.recv_timeout).await?;

    match outcome {
        ExchangeOutcome::Done => {
            log_request(peer, first_line, &Status::Ok.phrase());
        }
        ExchangeOutcome::NotFound => {
            stream.write_all(&http::error_response(Status::NotFound)).await?;
            log_request(peer, first_line, &Status::NotFound.phrase());
        }
        ExchangeOutcome::TimedOut => {
            stream.write_all(&http::error_response(Status::RequestTimeout)).await?;
            log_request(peer, first_line, &Status::RequestTimeout.phrase());
        }
        ExchangeOutcome::AbortedNotFound | ExchangeOutcome::AbortedTimeout => {
            // The 200 header is already on the wire. Closing early is the
            // only remaining signal; the client sees a truncated body.
            eprintln!(
                "{}: backend failed mid-stream ({:?}), closing connection",
                peer.ip(),
                outcome
            );
            log_request(peer, first_line, &Status::Ok.phrase());
        }
    }
    Ok(())
}
