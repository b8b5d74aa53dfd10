// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT broker transport.
//!
//! Devices publish snapshots to `device/<uuid>/data`; an [`MqttSource`]
//! subscribes to that topic and hands out messages as they arrive. It is a
//! [`PushSource`], so the blanket adapter lets subscription workers use it
//! wherever a [`crate::Fetcher`] is expected; each "fetch" simply waits for
//! the next published snapshot.
//!
//! AWS-style brokers require mutual TLS; [`MqttSourceConfig::with_tls`]
//! takes the CA, client certificate and private key PEMs.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rumqttc::{Client, Connection, Event, Incoming, MqttOptions, QoS, TlsConfiguration, Transport};
use uuid::Uuid;

use crate::error::{FetchError, Result};
use crate::fetch::PushSource;
use crate::payload::Payload;

/// Returns the data topic a device with `id` publishes on.
#[must_use]
pub fn data_topic(id: &str) -> String {
    format!("device/{id}/data")
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Configuration for an MQTT snapshot source.
///
/// # Examples
///
/// ```no_run
/// use iort_client::MqttSourceConfig;
///
/// # fn main() -> iort_client::Result<()> {
/// # let (ca, cert, key) = (vec![], vec![], vec![]);
/// let source = MqttSourceConfig::new("broker.example.com")
///     .with_tls(ca, cert, key)
///     .connect("3b241101-e2bb-4255-8caf-4136c566a962")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MqttSourceConfig {
    host: String,
    port: u16,
    client_id: Option<String>,
    keep_alive: Duration,
    tls: Option<TlsFiles>,
}

#[derive(Debug, Clone)]
struct TlsFiles {
    ca: Vec<u8>,
    client_cert: Vec<u8>,
    client_key: Vec<u8>,
}

impl MqttSourceConfig {
    /// Default plaintext MQTT port.
    pub const DEFAULT_PORT: u16 = 1883;
    /// Default MQTT-over-TLS port.
    pub const DEFAULT_TLS_PORT: u16 = 8883;
    /// Default keep-alive interval.
    pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

    /// Creates a configuration for the given broker host.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            client_id: None,
            keep_alive: Self::DEFAULT_KEEP_ALIVE,
            tls: None,
        }
    }

    /// Sets a custom port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets an explicit client id. A random one is generated otherwise.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Enables mutual TLS with the given CA, client certificate and private
    /// key (all PEM-encoded).
    ///
    /// If the port hasn't been explicitly set, it is changed to 8883.
    #[must_use]
    pub fn with_tls(mut self, ca: Vec<u8>, client_cert: Vec<u8>, client_key: Vec<u8>) -> Self {
        self.tls = Some(TlsFiles {
            ca,
            client_cert,
            client_key,
        });
        if self.port == Self::DEFAULT_PORT {
            self.port = Self::DEFAULT_TLS_PORT;
        }
        self
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Connects to the broker and subscribes to the data topic of the
    /// device `id`.
    ///
    /// The connection is driven lazily: the subscribe request is flushed the
    /// first time a caller waits for a message.
    ///
    /// # Errors
    ///
    /// Returns a fetch error when the subscribe request cannot be queued.
    pub fn connect(self, id: &str) -> Result<MqttSource> {
        let client_id = self
            .client_id
            .unwrap_or_else(|| format!("iort-client-{}", Uuid::new_v4().simple()));

        let mut options = MqttOptions::new(client_id, self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if let Some(tls) = self.tls {
            options.set_transport(Transport::Tls(TlsConfiguration::Simple {
                ca: tls.ca,
                alpn: None,
                client_auth: Some((tls.client_cert, tls.client_key)),
            }));
        }

        let topic = data_topic(id);
        let (client, connection) = Client::new(options, 10);
        client
            .subscribe(&topic, QoS::AtLeastOnce)
            .map_err(FetchError::Mqtt)?;
        tracing::debug!(%topic, "subscribed to device data topic");

        Ok(MqttSource {
            client,
            connection: Mutex::new(connection),
            topic,
        })
    }
}

/// A push-style snapshot source bound to one device's data topic.
pub struct MqttSource {
    client: Client,
    connection: Mutex<Connection>,
    topic: String,
}

impl MqttSource {
    /// Returns the subscribed data topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl PushSource for MqttSource {
    fn next_message(&self, timeout: Duration) -> std::result::Result<Payload, FetchError> {
        let deadline = Instant::now() + timeout;
        let mut connection = self.connection.lock();

        // Keep-alives, acks and publishes on other topics all arrive through
        // the same event stream; skip past them until the deadline.
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(FetchError::Timeout(millis(timeout)));
            }

            match connection.recv_timeout(remaining) {
                Ok(Ok(Event::Incoming(Incoming::Publish(publish))))
                    if publish.topic == self.topic =>
                {
                    tracing::trace!(topic = %self.topic, bytes = publish.payload.len(), "snapshot received");
                    return Ok(serde_json::from_slice(&publish.payload)?);
                }
                Ok(Ok(_)) => {}
                Ok(Err(err)) => return Err(FetchError::MqttConnection(err)),
                Err(_) => return Err(FetchError::Timeout(millis(timeout))),
            }
        }
    }
}

impl Drop for MqttSource {
    fn drop(&mut self) {
        // Best effort; the broker also notices the dropped socket.
        let _ = self.client.disconnect();
    }
}

impl std::fmt::Debug for MqttSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSource")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}
