// TCP control session
//
// Wraps a `Framed<TcpStream, LinesCodec>` behind a tokio `Mutex` so that
// concurrent callers are serialized into one command/reply exchange at a
// time. Reply framing follows the server's conventions: listings end with
// a bare `STAT:` line, setters usually answer nothing at all.
//
// An exchange dropped mid-reply (the response timeout) leaves the session
// desynchronized for good; every later exchange fails until reconnect.

use std::time::Duration;

use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::session::{Response, SendOptions, Session, tidy_line};
use crate::transport::TransportConfig;

const GREETING_PREFIX: &str = "Snowmix version";

/// The framed socket plus the exchange that currently owns it.
struct Connection {
    framed: Framed<TcpStream, LinesCodec>,
    /// Set while a command's reply is being read. Still set when the next
    /// exchange starts means the previous one was abandoned mid-reply.
    in_flight: Option<String>,
}

/// A control session over one TCP connection.
pub struct TcpSession {
    addr: String,
    version: String,
    config: TransportConfig,
    conn: Mutex<Connection>,
}

impl TcpSession {
    /// Connect to `host:port` and consume the server greeting.
    pub async fn connect(host: &str, port: u16, config: TransportConfig) -> Result<Self, Error> {
        let addr = format!("{host}:{port}");

        let stream = timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Connect {
                addr: addr.clone(),
                reason: format!("timed out after {}ms", millis(config.connect_timeout)),
            })?
            .map_err(|e| Error::Connect {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;

        let mut framed = Framed::new(
            stream,
            LinesCodec::new_with_max_length(config.max_line_length),
        );

        let greeting = timeout(config.connect_timeout, framed.next())
            .await
            .map_err(|_| Error::Connect {
                addr: addr.clone(),
                reason: "no greeting received".into(),
            })?
            .ok_or(Error::Closed)??;

        let version = parse_greeting(&greeting)
            .ok_or_else(|| Error::UnexpectedGreeting {
                line: greeting.clone(),
            })?
            .to_owned();
        debug!(%addr, %version, "control session established");

        Ok(Self {
            addr,
            version,
            config,
            conn: Mutex::new(Connection {
                framed,
                in_flight: None,
            }),
        })
    }

    /// Server version announced in the greeting (e.g. `0.5.1`).
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The `host:port` this session is connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn exchange(&self, command: &str, options: SendOptions) -> Result<Response, Error> {
        let mut conn = self.conn.lock().await;
        if let Some(abandoned) = &conn.in_flight {
            return Err(Error::Desynchronized {
                command: abandoned.clone(),
            });
        }

        discard_stale_lines(&mut conn.framed)?;
        conn.in_flight = Some(command.to_owned());
        conn.framed.send(command).await?;

        let response = if options.expect_multiline {
            read_listing(&mut conn.framed, command, options.tidy).await
        } else {
            self.read_single(&mut conn.framed, command, options.tidy).await
        };

        // Reached only when the reply was consumed in full (or the socket is
        // gone, which later exchanges report on their own).
        conn.in_flight = None;
        response
    }

    async fn read_single(
        &self,
        framed: &mut Framed<TcpStream, LinesCodec>,
        command: &str,
        tidy: bool,
    ) -> Result<Response, Error> {
        match timeout(self.config.reply_window, framed.next()).await {
            // Silence inside the window is the normal success reply.
            Err(_) => Ok(Response::Line(String::new())),
            Ok(None) => Err(Error::Closed),
            Ok(Some(line)) => {
                let line = line?;
                check_rejection(command, &line)?;
                let line = if tidy {
                    tidy_line(&line).unwrap_or_default()
                } else {
                    line
                };
                Ok(Response::Line(line))
            }
        }
    }
}

/// Read a listing through its terminator. A rejection inside the block is
/// reported only after the whole block has been consumed.
async fn read_listing(
    framed: &mut Framed<TcpStream, LinesCodec>,
    command: &str,
    tidy: bool,
) -> Result<Response, Error> {
    let mut lines = Vec::new();
    let mut rejection = None;
    loop {
        let line = framed.next().await.ok_or(Error::Closed)??;
        if is_terminator(&line) {
            break;
        }
        if let Err(e) = check_rejection(command, &line) {
            if rejection.is_none() {
                rejection = Some(e);
            }
            continue;
        }
        lines.push(line);
    }

    if let Some(e) = rejection {
        return Err(e);
    }
    let lines = if tidy {
        lines.iter().filter_map(|l| tidy_line(l)).collect()
    } else {
        lines
    };
    Ok(Response::Lines(lines))
}

/// Drop lines that are already buffered before a new command goes out.
/// They belong to an earlier exchange, e.g. a setter reply that arrived
/// after its reply window closed.
fn discard_stale_lines(framed: &mut Framed<TcpStream, LinesCodec>) -> Result<(), Error> {
    while let Some(next) = framed.next().now_or_never() {
        let line = next.ok_or(Error::Closed)??;
        warn!(line = %line, "discarding late reply from an earlier command");
    }
    Ok(())
}

impl Session for TcpSession {
    async fn send_command(&self, command: &str, options: SendOptions) -> Result<Response, Error> {
        if options.log_at_silly_level {
            trace!(command, "sending");
        } else {
            debug!(command, "sending");
        }

        let response = timeout(self.config.response_timeout, self.exchange(command, options))
            .await
            .map_err(|_| Error::Timeout {
                command: command.to_owned(),
                timeout_ms: millis(self.config.response_timeout),
            })??;

        if options.log_at_silly_level {
            trace!(command, ?response, "reply");
        } else {
            debug!(command, ?response, "reply");
        }
        Ok(response)
    }
}

/// Extract the version from `Snowmix version 0.5.1.` style greetings.
fn parse_greeting(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix(GREETING_PREFIX)?;
    let version = rest.trim().trim_end_matches('.');
    if version.is_empty() { None } else { Some(version) }
}

fn is_terminator(line: &str) -> bool {
    line.trim() == "STAT:"
}

/// `MSG:` lines that report an unknown or invalid command end the exchange.
fn check_rejection(command: &str, line: &str) -> Result<(), Error> {
    let Some(message) = line.trim().strip_prefix("MSG:") else {
        return Ok(());
    };
    let lower = message.to_ascii_lowercase();
    if lower.contains("unknown command") || lower.contains("invalid") {
        return Err(Error::Rejected {
            command: command.to_owned(),
            message: message.trim().to_owned(),
        });
    }
    Ok(())
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
