use redis::{Client, Connection};
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, time::Duration};

use super::BackendError;
use crate::config::RedisSettings;
use crate::pool::Connector;

// -----------------------------------------------------------------------------
// ----- RedisConnector --------------------------------------------------------

/// Key-value-store flavor of the pool. Authenticates with `AUTH` right after
/// connecting when a password is configured.
///
/// Every connection carries read and write timeouts equal to the connect
/// timeout, so a probe against a half-open socket fails instead of hanging
/// the sweep thread.
pub struct RedisConnector {
    client: Client,
    password: Option<SecretString>,
    connect_timeout: Duration,
    target: String,
}

impl RedisConnector {
    pub fn new(settings: &RedisSettings) -> Result<Self, BackendError> {
        let target = format!("{}:{}", settings.host, settings.port);
        let client = Client::open(format!("redis://{target}/"))?;

        Ok(Self {
            client,
            password: settings.password.clone(),
            connect_timeout: settings.pool.connect_timeout,
            target,
        })
    }
}

impl Connector for RedisConnector {
    type Connection = Connection;
    type Error = BackendError;

    fn connect(&self) -> Result<Connection, BackendError> {
        let mut conn = self.client.get_connection_with_timeout(self.connect_timeout)?;
        conn.set_read_timeout(Some(self.connect_timeout))?;
        conn.set_write_timeout(Some(self.connect_timeout))?;

        if let Some(password) = &self.password {
            redis::cmd("AUTH")
                .arg(password.expose_secret())
                .query::<()>(&mut conn)?;
        }

        Ok(conn)
    }

    fn is_alive(&self, conn: &mut Connection) -> Result<(), BackendError> {
        let reply: String = redis::cmd("PING").query(conn)?;
        if reply != "PONG" {
            return Err(BackendError::UnexpectedReply {
                command: "PING",
                reply,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for RedisConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConnector")
            .field("target", &self.target)
            .field("auth", &self.password.is_some())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolSettings;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    // Answers `+OK` to every command until it sees PING, then stops talking
    // while keeping the socket open.
    fn stalling_server() -> (u16, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let mut stalled = false;
            loop {
                let n = match stream.read(&mut buf) {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                let chunk = &buf[..n];
                if stalled || chunk.windows(4).any(|w| w == b"PING") {
                    stalled = true;
                    continue;
                }
                for _ in 0..command_count(chunk) {
                    if stream.write_all(b"+OK\r\n").is_err() {
                        return;
                    }
                }
            }
        });

        (port, server)
    }

    fn command_count(chunk: &[u8]) -> usize {
        let leading = usize::from(chunk.first() == Some(&b'*'));
        leading + chunk.windows(3).filter(|w| *w == b"\r\n*").count()
    }

    fn settings(port: u16) -> RedisSettings {
        RedisSettings {
            host: "127.0.0.1".into(),
            port,
            password: None,
            pool: PoolSettings {
                pool_size: 1,
                acquire_timeout: Duration::from_secs(1),
                sweep_interval: Duration::from_secs(60),
                connect_timeout: Duration::from_millis(200),
            },
        }
    }

    #[test]
    fn probe_on_stalled_socket_times_out() {
        let (port, server) = stalling_server();
        let connector = RedisConnector::new(&settings(port)).unwrap();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let mut conn = connector.connect().unwrap();
            let started = Instant::now();
            let probe = connector.is_alive(&mut conn);
            tx.send((probe.is_err(), started.elapsed())).unwrap();
        });

        let (failed, waited) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(failed);
        assert!(waited < Duration::from_secs(2), "probe took {waited:?}");

        // The client hung up, so the server sees EOF.
        server.join().unwrap();
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
