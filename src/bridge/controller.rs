//! Bridge controller with statum state machine for protocol translation
//!
//! Implements a 5-state lifecycle for the MQTT↔device bridge with
//! compile-time state safety. The bridge runs in its own tokio task and
//! drives two activities from one select loop: inbound command messages
//! and the periodic status poll. Both funnel into the device client, whose
//! transaction lock keeps the UDP socket to a single in-flight exchange.
//!
//! # State Machine
//!
//! ```text
//! Initializing ──► Configured ──► Active ──► Deactivating ──► Deactivated
//!                     │              │            ▲
//!                     └──────────────┘            │
//!                      (activate/deactivate)  (shutdown)
//! ```
//!
//! # Data Flow
//!
//! ```text
//! <base>/<param>/set ──► TopicMapper ──► DeviceClient ──► UDP unit
//!                                             │
//! <base>/<param>/state ◄── Publication ◄──────┘
//! <base>/service       ◄── availability transitions
//! ```

use std::collections::{BTreeMap, HashMap};

use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS};
use statum::{machine, state};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::error::BridgeError;
use super::topics::TopicMapper;
use crate::config::BridgeConfig;
use crate::device::{DeviceClient, DeviceError};
use crate::protocol::params::{self, Value};

/// Service topic payload while the unit answers polls
pub const SERVICE_ONLINE: &str = "Online";
/// Service topic payload after the unit stopped answering
pub const SERVICE_TIMEOUT: &str = "TimeOut";
/// Service topic payload when the bridge goes away (also the last will)
pub const SERVICE_DOWN: &str = "Service Down";

/// One pending MQTT publish produced by the command or poll path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
    Reconnecting,
}

/// Runtime bookkeeping surfaced through debug logging
#[derive(Clone, Debug, Default)]
pub struct BridgeStatus {
    pub connection_state: ConnectionState,
    pub commands_handled: usize,
    pub poll_cycles: usize,
    pub values_published: usize,
    pub last_activity: Option<chrono::DateTime<chrono::Local>>,
}

/// States for the bridge lifecycle using statum
#[state]
#[derive(Debug, Clone)]
pub enum BridgeState {
    Initializing, // Setting up bridge structure
    Configured,   // Configuration validated, topic bindings built
    Active,       // Translating in the main loop
    Deactivating, // Shutting down gracefully
    Deactivated,  // Fully stopped
}

/// Protocol bridge with compile-time state safety via statum
///
/// Owns the device client, the topic bindings and the last-published
/// cache; nothing else in the process touches them.
#[machine]
pub struct Bridge<S: BridgeState> {
    config: BridgeConfig,
    mapper: TopicMapper,
    client: DeviceClient,
    last_published: HashMap<u8, Value>,
    device_online: Option<bool>,
    status: BridgeStatus,
}

impl<S: BridgeState> Bridge<S> {
    pub fn status(&self) -> &BridgeStatus {
        &self.status
    }

    pub fn mapper(&self) -> &TopicMapper {
        &self.mapper
    }
}

impl Bridge<Initializing> {
    pub fn create(config: BridgeConfig, client: DeviceClient) -> Self {
        info!("Initializing bridge for device {}", client.device_id());
        let mapper = TopicMapper::new(config.base_topic.clone());

        Self::new(
            config,
            mapper,
            client,
            HashMap::new(),          // last_published
            None,                    // device_online
            BridgeStatus::default(), // status
        )
    }

    /// Validates the configuration and transitions to Configured
    pub fn configure(self) -> Result<Bridge<Configured>, BridgeError> {
        if self.mapper.base().is_empty() {
            return Err(BridgeError::Config("Base topic must not be empty".to_string()));
        }
        if self.mapper.base().contains(['+', '#']) {
            return Err(BridgeError::Config(
                "Base topic must not contain MQTT wildcards".to_string(),
            ));
        }
        if self.config.poll_interval_secs == 0 {
            return Err(BridgeError::Config(
                "Poll interval must be at least one second".to_string(),
            ));
        }

        for param in params::PARAMETERS {
            match self.mapper.command_topic(param) {
                Some(topic) => debug!(
                    "Binding {} <-> {} / {}",
                    param.name,
                    topic,
                    self.mapper.status_topic(param)
                ),
                None => debug!("Binding {} -> {}", param.name, self.mapper.status_topic(param)),
            }
        }
        info!(
            "Bridge configured: {} parameters, {} command topics, base '{}'",
            params::PARAMETERS.len(),
            self.mapper.command_topics().len(),
            self.mapper.base()
        );

        Ok(self.transition())
    }
}

impl Bridge<Configured> {
    pub fn activate(self) -> Bridge<Active> {
        info!("Activating bridge");
        self.transition()
    }
}

impl Bridge<Active> {
    /// Translates one inbound MQTT message into a device write
    ///
    /// Messages on unrecognized topics are ignored. Returns the status
    /// publishes confirming the new value, already de-duplicated against
    /// the last published state.
    pub async fn handle_command(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> Result<Vec<Publication>, BridgeError> {
        let param = match self.mapper.parameter_for_command_topic(topic) {
            Some(param) => param,
            None => {
                debug!("Ignoring message on unrelated topic: {}", topic);
                return Ok(Vec::new());
            }
        };

        let text = String::from_utf8_lossy(payload);
        let value = self.mapper.decode_payload(param, &text)?;
        info!("Command: {} = {:?}", param.name, value);

        let acked = self.client.set_parameter(param, value).await?;
        self.status.commands_handled += 1;
        self.touch();
        Ok(self.publications_for(&acked))
    }

    /// Reads the full device state and returns the changed values
    pub async fn poll_cycle(&mut self) -> Result<Vec<Publication>, BridgeError> {
        let values = self.client.query().await?;
        self.status.poll_cycles += 1;
        self.touch();
        Ok(self.publications_for(&values))
    }

    /// Service topic publication when the device's reachability flips
    ///
    /// Retained, and emitted only on transitions so an unchanged state
    /// never produces redundant traffic.
    fn availability_publication(&mut self, online: bool) -> Option<Publication> {
        if self.device_online == Some(online) {
            return None;
        }
        self.device_online = Some(online);
        let payload = if online { SERVICE_ONLINE } else { SERVICE_TIMEOUT };
        info!("Device availability changed: {}", payload);
        Some(Publication {
            topic: self.mapper.service_topic(),
            payload: payload.to_string(),
            retain: true,
        })
    }

    /// De-duplicates reported values against the last published state
    fn publications_for(&mut self, values: &BTreeMap<u8, Value>) -> Vec<Publication> {
        let mut publications = Vec::new();
        for (code, value) in values {
            let param = match params::by_code(*code) {
                Some(param) => param,
                None => continue,
            };
            if self.last_published.get(code) == Some(value) {
                continue;
            }
            self.last_published.insert(*code, *value);
            publications.push(Publication {
                topic: self.mapper.status_topic(param),
                payload: self.mapper.encode_payload(param, *value),
                retain: false,
            });
        }
        publications
    }

    fn touch(&mut self) {
        self.status.last_activity = Some(chrono::Local::now());
    }

    async fn publish_all(
        &mut self,
        client: &AsyncClient,
        publications: Vec<Publication>,
    ) -> Result<(), BridgeError> {
        for publication in publications {
            debug!("Publishing {} = {}", publication.topic, publication.payload);
            client
                .publish(
                    publication.topic.as_str(),
                    QoS::AtLeastOnce,
                    publication.retain,
                    publication.payload,
                )
                .await?;
            self.status.values_published += 1;
        }
        Ok(())
    }

    async fn subscribe_commands(&self, client: &AsyncClient) -> Result<(), BridgeError> {
        for topic in self.mapper.command_topics() {
            debug!("Subscribing to {}", topic);
            client.subscribe(topic, QoS::AtLeastOnce).await?;
        }
        Ok(())
    }

    /// Publishes the outcome of one device round and tracks availability
    ///
    /// Device errors are contained here: they cost the affected publishes,
    /// never the bridge.
    async fn finish_device_round(
        &mut self,
        client: &AsyncClient,
        result: Result<Vec<Publication>, BridgeError>,
        context: &str,
    ) {
        match result {
            Ok(mut publications) => {
                if let Some(service) = self.availability_publication(true) {
                    publications.insert(0, service);
                }
                if let Err(e) = self.publish_all(client, publications).await {
                    warn!("Publish failed after {}: {}", context, e);
                }
            }
            Err(BridgeError::Device(DeviceError::Unreachable { .. })) => {
                warn!("Device unreachable during {}", context);
                if let Some(service) = self.availability_publication(false) {
                    if let Err(e) = self.publish_all(client, vec![service]).await {
                        warn!("Publish failed after {}: {}", context, e);
                    }
                }
            }
            Err(e) => warn!("Error during {}: {}", context, e),
        }
    }

    /// Main translation loop with graceful shutdown support
    ///
    /// Runs until the shutdown signal fires. Poll cycles and command
    /// handling alternate on one task, so device access is serialized
    /// twice over (here and by the client's transaction lock).
    pub async fn run_until_shutdown(
        mut self,
        client: &AsyncClient,
        eventloop: &mut EventLoop,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> Result<Bridge<Deactivating>, BridgeError> {
        info!(
            "Starting bridge loop (poll interval {:?})",
            self.config.poll_interval()
        );
        let mut poll = interval(self.config.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Shutdown signal received");
                    break;
                }

                _ = poll.tick() => {
                    let result = self.poll_cycle().await;
                    self.finish_device_round(client, result, "poll cycle").await;
                    debug!("Bridge status: {:?}", self.status);
                }

                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected to MQTT broker");
                        self.status.connection_state = ConnectionState::Connected;
                        if let Err(e) = self.subscribe_commands(client).await {
                            warn!("Subscribe failed: {}", e);
                        }
                        // Re-announce availability after a broker reconnect
                        if let Some(online) = self.device_online {
                            let payload = if online { SERVICE_ONLINE } else { SERVICE_TIMEOUT };
                            let topic = self.mapper.service_topic();
                            if let Err(e) = client
                                .publish(topic.as_str(), QoS::AtLeastOnce, true, payload)
                                .await
                            {
                                warn!("Availability publish failed: {}", e);
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(message))) => {
                        let topic = message.topic.clone();
                        let result = self.handle_command(&topic, &message.payload).await;
                        self.finish_device_round(client, result, "command").await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        // Reconnection is the MQTT library's job; just slow
                        // the loop down while the broker is away.
                        self.status.connection_state = ConnectionState::Reconnecting;
                        error!("MQTT connection error: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        info!("Transitioning to Deactivating state");
        Ok(self.transition())
    }

    pub fn deactivate(self) -> Bridge<Deactivating> {
        info!("Deactivating bridge");
        self.transition()
    }
}

impl Bridge<Deactivating> {
    /// Announces the shutdown on the service topic and disconnects
    pub async fn shutdown(
        self,
        client: &AsyncClient,
        eventloop: &mut EventLoop,
    ) -> Bridge<Deactivated> {
        info!("Shutting down bridge");

        let topic = self.mapper.service_topic();
        if let Err(e) = client
            .publish(topic.as_str(), QoS::AtLeastOnce, true, SERVICE_DOWN)
            .await
        {
            warn!("Could not announce shutdown: {}", e);
        }
        if let Err(e) = client.disconnect().await {
            debug!("MQTT disconnect: {}", e);
        }

        // Drain the event loop until the disconnect leaves, bounded so
        // shutdown stays prompt even with a dead broker.
        let drained = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        })
        .await;
        if drained.is_err() {
            debug!("MQTT event loop did not drain in time");
        }

        info!("Bridge shut down");
        self.transition()
    }
}

impl Bridge<Deactivated> {}

/// Handle for managing the bridge in a tokio task
///
/// Provides lifecycle management for the bridge running in a background
/// task: spawning, graceful shutdown, and resource cleanup.
#[derive(Debug)]
pub struct BridgeHandle {
    task_handle: Option<JoinHandle<Result<(), BridgeError>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl BridgeHandle {
    /// Builds, configures and activates the bridge, then spawns its loop
    pub fn start(config: BridgeConfig, client: DeviceClient) -> Result<Self, BridgeError> {
        let bridge = Bridge::create(config.clone(), client).configure()?;

        let options = mqtt_options(&config, &bridge.mapper().service_topic());
        let (mqtt_client, mut eventloop) = AsyncClient::new(options, 100);

        let active = bridge.activate();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task_handle = tokio::spawn(async move {
            match active
                .run_until_shutdown(&mqtt_client, &mut eventloop, shutdown_rx)
                .await
            {
                Ok(deactivating) => {
                    let _ = deactivating.shutdown(&mqtt_client, &mut eventloop).await;
                    Ok(())
                }
                Err(e) => {
                    error!("Bridge loop failed: {}", e);
                    Err(e)
                }
            }
        });

        info!("Bridge task spawned");
        Ok(Self {
            task_handle: Some(task_handle),
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Gracefully shuts down the bridge and waits for task completion
    pub async fn shutdown(&mut self) -> Result<(), BridgeError> {
        debug!("Sending shutdown signal to bridge");

        if let Some(tx) = self.shutdown_tx.take() {
            if tx.send(()).is_err() {
                warn!("Bridge task already terminated");
            }
        }

        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(result) => {
                    debug!("Bridge task completed");
                    result
                }
                Err(e) => {
                    error!("Bridge task panicked: {}", e);
                    Err(BridgeError::Task(format!("Bridge task panicked: {}", e)))
                }
            }
        } else {
            debug!("Bridge already shut down");
            Ok(())
        }
    }
}

fn mqtt_options(config: &BridgeConfig, service_topic: &str) -> MqttOptions {
    let mut options = MqttOptions::new(
        config.mqtt.client_id.clone(),
        config.mqtt.host.clone(),
        config.mqtt.port,
    );
    options.set_keep_alive(Duration::from_secs(5));
    if let Some(username) = &config.mqtt.username {
        options.set_credentials(
            username.clone(),
            config.mqtt.password.clone().unwrap_or_default(),
        );
    }
    options.set_last_will(LastWill::new(
        service_topic,
        SERVICE_DOWN,
        QoS::AtLeastOnce,
        true,
    ));
    options
}
