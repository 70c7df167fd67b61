use anyhow::Result;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// Start listening TCP on address and return the listener.
/// Consumer should `accept().await` and hand streams to Connection::spawn.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let l = TcpListener::bind(addr).await?;
    Ok(l)
}

pub async fn connect(addr: &str, timeout: Duration) -> Result<TcpStream> {
    let s = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| anyhow::anyhow!("connect to {} timed out", addr))??;
    s.set_nodelay(true)?;
    Ok(s)
}
