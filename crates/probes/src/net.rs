//! TCP connect helper shared by all probes.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

use relayscan_common::{ScanError, ScanResult};

/// Open a TCP connection to `addr`, giving up after `limit`.
pub(crate) async fn connect(addr: SocketAddr, limit: Duration) -> ScanResult<TcpStream> {
    match timeout(limit, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            let _ = stream.set_nodelay(true);
            Ok(stream)
        }
        Ok(Err(e)) if e.kind() == ErrorKind::TimedOut => {
            Err(ScanError::ConnectTimeout(addr.to_string()))
        }
        Ok(Err(e)) => Err(ScanError::Connect {
            addr: addr.to_string(),
            source: e,
        }),
        Err(_) => Err(ScanError::ConnectTimeout(addr.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = connect(addr, Duration::from_secs(1)).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap(), addr);
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = connect(addr, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ScanError::Connect { .. }));
    }
}
