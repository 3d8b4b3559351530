use std::net::SocketAddr;

use async_stream::stream;
use futures_util::Stream;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, trace};

/// Turn a bound listener into a stream of accepted connections.
///
/// Accept errors are logged and skipped; the stream never ends on its own.
pub fn tcp_accept_stream(listener: TcpListener) -> impl Stream<Item = (TcpStream, SocketAddr)> {
    stream! {
        loop {
            let (stream, addr): (TcpStream, SocketAddr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!("TCP accept error: {}", e);
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                error!("Failed to set TCP_NODELAY for {}: {}", addr, e);
            }
            trace!("Accepted scrape connection from {}", addr);
            yield (stream, addr);
        }
    }
}
