use std::process;

use tokio::signal;

use searchgate::{Config, Server};

fn parse_args() -> Option<(u16, u16)> {
    let mut args = std::env::args().skip(1);
    let http_port = args.next()?.parse().ok()?;
    let db_port = args.next()?.parse().ok()?;
    if args.next().is_some() {
        return None;
    }
    Some((http_port, db_port))
}

#[tokio::main]
async fn main() {
    let (http_port, db_port) = match parse_args() {
        Some(ports) => ports,
        None => {
            eprintln!("usage: searchgate [server port] [DB port]");
            process::exit(1);
        }
    };

    let config = Config::new(http_port, db_port);
    let backend = config.backend_addr;
    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("failed to bind port {}: {}", http_port, e);
            process::exit(1);
        }
    };

    println!("searchgate listening on port {}, DB backend {}", http_port, backend);

    tokio::select! {
        result = server.serve() => {
            if let Err(e) = result {
                eprintln!("server error: {}", e);
                process::exit(1);
            }
        }
        _ = shutdown_signal() => {
            println!("shutdown signal received, stopping server");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
