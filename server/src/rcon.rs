//! RCON transport to the game server.
//!
//! Commands travel as single UDP datagrams in the Quake 3 out-of-band
//! framing: four `0xff` bytes, `rcon <password> <command>`. Replies start
//! with the same marker followed by `print\n`.
//!
//! Fire-and-forget commands and queries use separate sockets, so a late
//! reply to a `say` or `kick` never lands in a status reply.

use crate::escalation::PlayerPing;
use log::debug;
use shared::DISCONNECTED_PING;
use std::io;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::timeout;

const OOB_MARKER: &[u8] = b"\xff\xff\xff\xff";
const PRINT_HEADER: &[u8] = b"print\n";
/// Wait for further datagrams of a multi-part reply
const TRAILING_REPLY_WAIT: Duration = Duration::from_millis(150);

#[derive(Debug, thiserror::Error)]
pub enum RconError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("No reply within {0:?}")]
    Timeout(Duration),

    #[error("Malformed reply: {0}")]
    Malformed(String),
}

pub struct RconClient {
    socket: UdpSocket,
    /// Only one query is in flight at a time
    query_socket: Mutex<UdpSocket>,
    password: String,
    timeout: Duration,
}

impl RconClient {
    pub async fn connect(
        host: &str,
        port: u16,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, RconError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect((host, port)).await?;
        let query_socket = UdpSocket::bind("0.0.0.0:0").await?;
        query_socket.connect((host, port)).await?;
        debug!(
            "RCON sockets {} and {} -> {}:{}",
            socket.local_addr()?,
            query_socket.local_addr()?,
            host,
            port
        );
        Ok(Self {
            socket,
            query_socket: Mutex::new(query_socket),
            password: password.to_string(),
            timeout,
        })
    }

    /// Sends a command without waiting for the reply
    pub async fn send(&self, command: &str) -> Result<(), RconError> {
        self.socket.send(&frame(&self.password, command)).await?;
        Ok(())
    }

    /// Sends a command and collects its reply text
    pub async fn query(&self, command: &str) -> Result<String, RconError> {
        let socket = self.query_socket.lock().await;
        let mut buffer = vec![0u8; 8192];
        // late parts of an earlier query that timed out
        while socket.try_recv(&mut buffer).is_ok() {}
        socket.send(&frame(&self.password, command)).await?;

        let len = timeout(self.timeout, socket.recv(&mut buffer))
            .await
            .map_err(|_| RconError::Timeout(self.timeout))??;
        let mut reply = strip_header(&buffer[..len]).to_string();

        // long replies arrive split over several datagrams
        while let Ok(result) = timeout(TRAILING_REPLY_WAIT, socket.recv(&mut buffer)).await {
            let len = result?;
            reply.push_str(&strip_header(&buffer[..len]));
        }
        Ok(reply)
    }

    /// Current pings of every listed slot
    pub async fn status(&self) -> Result<Vec<PlayerPing>, RconError> {
        let reply = self.query("status").await?;
        parse_status(&reply)
    }
}

/// Out-of-band datagram for an RCON command
pub fn frame(password: &str, command: &str) -> Vec<u8> {
    let mut datagram = OOB_MARKER.to_vec();
    datagram.extend_from_slice(format!("rcon {} {}", password, command).as_bytes());
    datagram
}

fn strip_header(datagram: &[u8]) -> std::borrow::Cow<'_, str> {
    let body = datagram.strip_prefix(OOB_MARKER).unwrap_or(datagram);
    let body = body.strip_prefix(PRINT_HEADER).unwrap_or(body);
    String::from_utf8_lossy(body)
}

/// Slot and ping columns of a `status` reply.
///
/// Clients still connecting (`CNCT`) or timing out (`ZMBI`) report the
/// disconnected sentinel.
pub fn parse_status(text: &str) -> Result<Vec<PlayerPing>, RconError> {
    let mut lines = text.lines();
    if !lines.any(|line| line.trim_start().starts_with("---")) {
        return Err(RconError::Malformed(
            "status reply without player table".to_string(),
        ));
    }

    let mut pings = Vec::new();
    for line in lines {
        let columns: Vec<&str> = line.split_whitespace().collect();
        let [slot, _score, ping, ..] = columns.as_slice() else {
            continue;
        };
        let Ok(slot) = slot.parse() else {
            continue;
        };
        let ping = match *ping {
            "CNCT" | "ZMBI" => DISCONNECTED_PING,
            value => match value.parse() {
                Ok(ping) => ping,
                Err(_) => continue,
            },
        };
        pings.push(PlayerPing { slot, ping });
    }
    Ok(pings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "map: ut4_abbey\n\
        num score ping name            lastmsg address               qport rate\n\
        --- ----- ---- --------------- ------- --------------------- ----- -----\n\
          0     5   48 Bob^7                 0 1.2.3.4:27960          1234 25000\n\
          3     0 CNCT Alice^7               0 5.6.7.8:27960          4321 25000\n\
          4     1  ZMBI Carl^7               0 9.9.9.9:27960          1111 25000\n\
        \n";

    #[test]
    fn test_frame() {
        let datagram = frame("secret", "say ^3hi");
        assert_eq!(&datagram[..4], OOB_MARKER);
        assert_eq!(&datagram[4..], b"rcon secret say ^3hi");
    }

    #[test]
    fn test_strip_header() {
        let reply = b"\xff\xff\xff\xffprint\nhello";
        assert_eq!(strip_header(reply), "hello");
        assert_eq!(strip_header(b"plain"), "plain");
    }

    #[test]
    fn test_parse_status() {
        let pings = parse_status(STATUS).unwrap();
        assert_eq!(
            pings,
            vec![
                PlayerPing { slot: 0, ping: 48 },
                PlayerPing {
                    slot: 3,
                    ping: DISCONNECTED_PING
                },
                PlayerPing {
                    slot: 4,
                    ping: DISCONNECTED_PING
                },
            ]
        );
    }

    #[test]
    fn test_parse_status_without_table() {
        assert!(matches!(
            parse_status("Bad rconpassword.\n"),
            Err(RconError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_query_round_trip() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let client = RconClient::connect("127.0.0.1", port, "pw", Duration::from_secs(2))
            .await
            .unwrap();

        let responder = tokio::spawn(async move {
            let mut buffer = [0u8; 1024];
            let (len, addr) = server.recv_from(&mut buffer).await.unwrap();
            assert_eq!(&buffer[4..len], b"rcon pw status");
            let mut reply = b"\xff\xff\xff\xffprint\n".to_vec();
            reply.extend_from_slice(STATUS.as_bytes());
            server.send_to(&reply, addr).await.unwrap();
        });

        let pings = client.status().await.unwrap();
        responder.await.unwrap();
        assert_eq!(pings.len(), 3);
        assert_eq!(pings[0], PlayerPing { slot: 0, ping: 48 });
    }

    #[tokio::test]
    async fn test_command_replies_stay_out_of_status() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let client = RconClient::connect("127.0.0.1", port, "pw", Duration::from_secs(2))
            .await
            .unwrap();

        client.send("say hello").await.unwrap();
        let mut buffer = [0u8; 1024];
        let (_, command_peer) = server.recv_from(&mut buffer).await.unwrap();

        let responder = tokio::spawn(async move {
            let mut buffer = [0u8; 1024];
            let (len, query_peer) = server.recv_from(&mut buffer).await.unwrap();
            assert_eq!(&buffer[4..len], b"rcon pw status");
            assert_ne!(query_peer, command_peer);
            server
                .send_to(b"\xff\xff\xff\xffprint\nbroadcast: hello\n", command_peer)
                .await
                .unwrap();
            let mut reply = b"\xff\xff\xff\xffprint\n".to_vec();
            reply.extend_from_slice(STATUS.as_bytes());
            server.send_to(&reply, query_peer).await.unwrap();
        });

        let reply = client.query("status").await.unwrap();
        responder.await.unwrap();
        assert!(!reply.contains("broadcast"));
        assert_eq!(parse_status(&reply).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_query_timeout() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let client = RconClient::connect("127.0.0.1", port, "pw", Duration::from_millis(50))
            .await
            .unwrap();

        assert!(matches!(
            client.query("status").await,
            Err(RconError::Timeout(_))
        ));
    }
}
