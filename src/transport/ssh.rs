//! russh transport.
//!
//! ## Connection lifecycle
//!
//! 1. **Address parsing**: `host:port`, default port 22.
//! 2. **Client configuration**: keepalive and compression. Cached sessions are
//!    long-lived, so there is no inactivity timeout; a dead peer is detected
//!    by unanswered keepalives instead.
//! 3. **Connection**: TCP connect plus SSH handshake under the connect timeout.
//! 4. **Authentication**: exactly one strategy, chosen from the resolved
//!    credentials. A rejection is reported as an authentication failure and is
//!    never retried.
//!
//! Commands run on a fresh session channel each, so one connection serves any
//! number of concurrent commands.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::{ChannelMsg, Disconnect, client};
use tracing::{debug, error, info, warn};

use crate::auth::{AuthFailure, strategy_for};
use crate::config::{KEEPALIVE_INTERVAL, KEEPALIVE_MAX, resolve_compression, resolve_connect_timeout};
use crate::error::SessionError;
use crate::registry::HostDescriptor;
use crate::resolver::AuthParams;

use super::handler::SshClientHandler;
use super::{Connection, Connector, ExecFailure, RawOutput};

/// Connect-time settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectSettings {
    /// Bound on TCP connect plus handshake.
    pub timeout: Duration,
    pub compress: bool,
}

impl ConnectSettings {
    pub fn from_env() -> Self {
        Self {
            timeout: resolve_connect_timeout(None),
            compress: resolve_compression(None),
        }
    }
}

/// Build russh client configuration.
///
/// Keepalive every 30 seconds, dropping the connection after 3 unanswered
/// probes. ZLIB is preferred when `compress` is set.
pub(crate) fn build_client_config(compress: bool) -> Arc<client::Config> {
    let compression = if compress {
        (&[russh::compression::ZLIB, russh::compression::NONE][..]).into()
    } else {
        (&[russh::compression::NONE][..]).into()
    };

    let preferred = russh::Preferred {
        compression,
        ..Default::default()
    };

    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(KEEPALIVE_INTERVAL),
        keepalive_max: KEEPALIVE_MAX,
        preferred,
        ..Default::default()
    })
}

/// Parse address string into host and port components.
///
/// A bare IP (v4 or v6) gets port 22. IPv6 with a port must be bracketed,
/// `[::1]:2222`, and the brackets are stripped from the host.
pub(crate) fn parse_address(address: &str) -> Result<(String, u16), String> {
    if address.parse::<IpAddr>().is_ok() {
        return Ok((address.to_string(), 22));
    }

    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| format!("Unclosed '[' in address: {}", address))?;
        let port = match tail {
            "" => 22,
            _ => tail
                .strip_prefix(':')
                .ok_or_else(|| format!("Unexpected text after ']': {}", tail))?
                .parse::<u16>()
                .map_err(|e| format!("Invalid port number: {}", e))?,
        };
        return Ok((host.to_string(), port));
    }

    if let Some((host, port_str)) = address.rsplit_once(':') {
        let port = port_str
            .parse::<u16>()
            .map_err(|e| format!("Invalid port number: {}", e))?;
        Ok((host.to_string(), port))
    } else {
        Ok((address.to_string(), 22))
    }
}

/// Connector establishing russh sessions.
#[derive(Debug, Clone)]
pub struct SshConnector {
    settings: ConnectSettings,
}

impl SshConnector {
    pub fn new(settings: ConnectSettings) -> Self {
        Self { settings }
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new(ConnectSettings::from_env())
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        host_key: &str,
        descriptor: &HostDescriptor,
        auth: AuthParams,
    ) -> Result<Arc<dyn Connection>, SessionError> {
        let (host, port) = parse_address(&descriptor.hostname)
            .map_err(|e| SessionError::Configuration(format!("host {}: {}", host_key, e)))?;
        let config = build_client_config(self.settings.compress);
        let timeout = self.settings.timeout;

        let connect_future = client::connect(
            config,
            (host.as_str(), port),
            SshClientHandler::new(host_key),
        );
        let mut handle = match tokio::time::timeout(timeout, connect_future).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                error!("Failed to connect to {}:{} for {}: {}", host, port, host_key, e);
                return Err(SessionError::transport(
                    host_key,
                    format!("Failed to connect: {}", e),
                ));
            }
            Err(_) => {
                error!("Connection to {}:{} timed out after {:?}", host, port, timeout);
                return Err(SessionError::transport(
                    host_key,
                    format!("Connection timed out after {:?}", timeout),
                ));
            }
        };

        let (username, strategy) = strategy_for(auth);
        debug!(
            "Authenticating {}@{} with {} strategy",
            username,
            host_key,
            strategy.name()
        );

        let auth_result =
            tokio::time::timeout(timeout, strategy.authenticate(&mut handle, &username)).await;
        let rejected = |reason: String| SessionError::AuthenticationFailed {
            host_key: host_key.to_string(),
            username: username.clone(),
            reason,
        };
        let failure = match auth_result {
            Ok(Ok(true)) => None,
            Ok(Ok(false)) => Some(rejected(format!(
                "{} authentication rejected by server",
                strategy.name()
            ))),
            Ok(Err(AuthFailure::Credential(reason))) => Some(rejected(reason)),
            Ok(Err(AuthFailure::Transport(reason))) => {
                Some(SessionError::transport(host_key, reason))
            }
            Err(_) => Some(SessionError::transport(
                host_key,
                format!("Authentication timed out after {:?}", timeout),
            )),
        };
        if let Some(e) = failure {
            error!("SSH connection to {}@{} failed: {}", username, host_key, e);
            let _ = handle
                .disconnect(Disconnect::ByApplication, "", "en")
                .await;
            return Err(e);
        }

        info!("Connected to {}@{} ({}:{})", username, host_key, host, port);
        Ok(Arc::new(SshConnection {
            handle,
            host_key: host_key.to_string(),
        }))
    }
}

/// An authenticated russh session.
pub struct SshConnection {
    handle: client::Handle<SshClientHandler>,
    host_key: String,
}

#[async_trait]
impl Connection for SshConnection {
    async fn exec(&self, command: &str) -> Result<RawOutput, ExecFailure> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| ExecFailure::new(format!("Failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| ExecFailure::new(format!("Failed to execute command: {}", e)))?;

        let mut out = RawOutput {
            stdout: Vec::with_capacity(4096),
            stderr: Vec::with_capacity(1024),
            exit_code: None,
            complete: false,
        };
        let mut eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    out.stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    // ext == 1 is stderr in SSH protocol
                    if ext == 1 {
                        out.stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    out.exit_code = Some(exit_status);
                    if eof {
                        break;
                    }
                }
                Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                    debug!("Command on {} terminated by signal {:?}", self.host_key, signal_name);
                }
                Some(ChannelMsg::Eof) => {
                    eof = true;
                    if out.exit_code.is_some() {
                        break;
                    }
                }
                Some(ChannelMsg::Close) => {
                    eof = true;
                    break;
                }
                Some(_) => {}
                None => break,
            }
        }

        // A channel that vanished before EOF lost output along the way
        if !eof {
            warn!(
                "Channel on {} closed mid-command ({} bytes stdout, {} bytes stderr)",
                self.host_key,
                out.stdout.len(),
                out.stderr.len()
            );
            return Err(ExecFailure {
                reason: "channel closed before the command finished".to_string(),
                partial: out,
            });
        }

        let _ = channel.close().await;
        out.complete = true;
        Ok(out)
    }

    async fn disconnect(&self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            warn!("Error disconnecting from {}: {}", self.host_key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod address_parsing {
        use super::*;

        #[test]
        fn test_host_with_port() {
            let (host, port) = parse_address("192.168.1.1:22").unwrap();
            assert_eq!(host, "192.168.1.1");
            assert_eq!(port, 22);
        }

        #[test]
        fn test_hostname_with_port() {
            let (host, port) = parse_address("db.example.com:2222").unwrap();
            assert_eq!(host, "db.example.com");
            assert_eq!(port, 2222);
        }

        #[test]
        fn test_host_without_port_defaults_to_22() {
            let (host, port) = parse_address("66.179.208.72").unwrap();
            assert_eq!(host, "66.179.208.72");
            assert_eq!(port, 22);
        }

        #[test]
        fn test_invalid_port_returns_error() {
            let result = parse_address("example.com:invalid");
            assert!(result.unwrap_err().contains("Invalid port number"));
        }

        #[test]
        fn test_port_out_of_range() {
            assert!(parse_address("example.com:99999").is_err());
        }

        #[test]
        fn test_bracketed_ipv6_with_port() {
            let (host, port) = parse_address("[::1]:2222").unwrap();
            assert_eq!(host, "::1");
            assert_eq!(port, 2222);
        }

        #[test]
        fn test_bare_ipv6_defaults_to_22() {
            let (host, port) = parse_address("2001:db8::10").unwrap();
            assert_eq!(host, "2001:db8::10");
            assert_eq!(port, 22);

            let (host, port) = parse_address("::1").unwrap();
            assert_eq!(host, "::1");
            assert_eq!(port, 22);
        }

        #[test]
        fn test_bracketed_ipv6_without_port() {
            let (host, port) = parse_address("[fe80::1]").unwrap();
            assert_eq!(host, "fe80::1");
            assert_eq!(port, 22);
        }

        #[test]
        fn test_unclosed_bracket_is_error() {
            assert!(parse_address("[::1:22").is_err());
        }
    }

    mod client_config {
        use super::*;

        #[test]
        fn test_no_inactivity_timeout() {
            let config = build_client_config(true);
            assert_eq!(config.inactivity_timeout, None);
        }

        #[test]
        fn test_builds_config_with_keepalive() {
            let config = build_client_config(false);
            assert_eq!(config.keepalive_interval, Some(Duration::from_secs(30)));
            assert_eq!(config.keepalive_max, 3);
        }

        #[test]
        fn test_compression_enabled_prefers_zlib() {
            let config = build_client_config(true);
            assert_eq!(config.preferred.compression.len(), 2);
        }

        #[test]
        fn test_compression_disabled_offers_none_only() {
            let config = build_client_config(false);
            assert_eq!(config.preferred.compression.len(), 1);
        }
    }

    mod connect {
        use super::*;

        #[tokio::test]
        async fn test_invalid_port_is_configuration_error() {
            let connector = SshConnector::new(ConnectSettings {
                timeout: Duration::from_secs(1),
                compress: false,
            });
            let descriptor = HostDescriptor::key("example.com:notaport", "/k");
            let auth = AuthParams::Key {
                username: "root".to_string(),
                key_path: "/k".into(),
            };
            let result = connector.connect("bad", &descriptor, auth).await;
            assert!(matches!(result, Err(SessionError::Configuration(_))));
        }

        #[tokio::test]
        async fn test_refused_connection_is_transport_error() {
            // Bind then drop a listener to get a port nothing is listening on
            let port = std::net::TcpListener::bind("127.0.0.1:0")
                .unwrap()
                .local_addr()
                .unwrap()
                .port();
            let connector = SshConnector::new(ConnectSettings {
                timeout: Duration::from_secs(5),
                compress: false,
            });
            let descriptor = HostDescriptor::key(format!("127.0.0.1:{}", port), "/k");
            let auth = AuthParams::Key {
                username: "root".to_string(),
                key_path: "/k".into(),
            };
            let result = connector.connect("local", &descriptor, auth).await;
            assert!(matches!(result, Err(SessionError::Transport { .. })));
        }
    }
}
