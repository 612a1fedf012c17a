//! Per-connection driver state machine.
//!
//! Pure `process_event(event) -> Result<Vec<EndpointAction>, EndpointError>`
//! logic with no I/O of its own; a thin runtime executes the returned
//! actions against a real transport and clock. Generic over `I` (the
//! instant type) so the same logic drives both a real clock and a
//! deterministic simulation one.
//!
//! ```text
//! Initial -> CapabilityNegotiating -> Authenticating
//!         -> Ready <-> {session ops, data flow, heartbeat} -> Closed
//! On fatal error at any stage -> Closed
//! ```
//!
//! `Initial` plays the role the design calls `VersionNegotiating`: the
//! driver starts already waiting for the client's `VersionNegotiation`
//! frame, so the two are the same wait state here.

use std::{
    collections::{HashMap, HashSet},
    ops::Sub,
    sync::Arc,
    time::Duration,
};

use termstream_proto::{
    Frame, FrameHeader, Payload,
    payloads::{control, data, flow, session, state},
};

use crate::{
    env::Environment,
    errors::EndpointError,
    reconnection::ReconnectionManager,
    service::{RegistrationResult, StreamingDataService},
};

/// Driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Awaiting the client's `VersionNegotiation` frame.
    Initial,
    /// Version accepted; awaiting `CapabilityExchange`.
    CapabilityNegotiating,
    /// Capabilities negotiated; awaiting `AuthenticationRequest`.
    Authenticating,
    /// Authenticated; accepting session, data, flow, and heartbeat frames.
    Ready,
    /// Terminal. No further frames are processed.
    Closed,
}

impl EndpointState {
    const fn label(self) -> &'static str {
        match self {
            Self::Initial => "Initial",
            Self::CapabilityNegotiating => "CapabilityNegotiating",
            Self::Authenticating => "Authenticating",
            Self::Ready => "Ready",
            Self::Closed => "Closed",
        }
    }
}

/// Delegated credential check. Validating against whatever store the
/// surrounding agent uses (OS keychain, paired-device list, ...) is out of
/// scope here; this trait is the seam.
pub trait Authenticator: Send + Sync {
    /// Validate `token`, returning a stable client id on success.
    fn authenticate(&self, token: &str) -> Option<String>;
}

/// Tunables for [`ProtocolEndpoint`], independent of the shared
/// [`crate::config::ServiceConfig`] but usually derived from it so the
/// advertised heartbeat cadence matches what the service actually expects.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Only protocol version this server accepts.
    pub server_version: u32,
    /// Largest payload this server is willing to receive.
    pub server_max_message_size: u32,
    /// Compression schemes this server can encode/decode.
    pub supported_compression: Vec<control::CompressionType>,
    /// Heartbeat cadence advertised during capability negotiation.
    pub heartbeat_interval: Duration,
    /// Missed-heartbeat count before the connection is declared dead.
    pub heartbeat_missed_limit: u32,
    /// Lifetime advertised for a successful authentication's session token.
    pub auth_token_ttl: Duration,
}

impl EndpointConfig {
    /// Derive endpoint tunables from the shared service configuration, so
    /// the heartbeat cadence advertised to clients matches what the service
    /// actually enforces.
    #[must_use]
    pub fn from_service_config(service_config: &crate::config::ServiceConfig) -> Self {
        Self {
            heartbeat_interval: service_config.heartbeat_interval,
            heartbeat_missed_limit: service_config.heartbeat_missed_limit,
            ..Self::default()
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            server_version: u32::from(FrameHeader::VERSION),
            server_max_message_size: 1024 * 1024,
            supported_compression: vec![control::CompressionType::None, control::CompressionType::Deflate],
            heartbeat_interval: Duration::from_secs(15),
            heartbeat_missed_limit: 3,
            auth_token_ttl: Duration::from_secs(3600),
        }
    }
}

/// Actions returned by [`ProtocolEndpoint::process_event`] for the runtime
/// to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointAction {
    /// Send this frame to the peer.
    SendFrame(Frame),
    /// Close the connection.
    Close {
        /// Human-readable reason.
        reason: String,
        /// Whether this closure reflects a fatal protocol-level error.
        fatal: bool,
    },
    /// The runtime should record this client's disconnection from
    /// `session_id` with [`crate::reconnection::ReconnectionManager`].
    RecordDisconnection {
        /// Session the client was attached to.
        session_id: u32,
        /// Last output sequence the runtime had delivered to this client.
        last_sequence_number: u64,
        /// Last terminal-state sequence the runtime had delivered, if any.
        last_state_sequence: Option<u64>,
    },
}

/// Input events fed into [`ProtocolEndpoint::process_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointEvent {
    /// A frame arrived from the transport.
    Frame(Frame),
    /// Periodic maintenance tick (timeout and heartbeat checks).
    Tick,
    /// The transport failed to write; the connection is being torn down.
    TransportError(String),
}

/// Per-connection state machine: version/capability negotiation, auth
/// handshake, heartbeat, and frame dispatch into a shared
/// [`StreamingDataService`].
pub struct ProtocolEndpoint<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    state: EndpointState,
    config: EndpointConfig,
    authenticator: Arc<dyn Authenticator>,
    client_id: Option<String>,
    negotiated_version: u32,
    negotiated_max_message_size: u32,
    negotiated_compression: Vec<control::CompressionType>,
    attached_sessions: HashSet<u32>,
    paused_sessions: HashSet<u32>,
    last_delivered_sequence: HashMap<u32, u64>,
    last_delivered_state_sequence: HashMap<u32, u64>,
    heartbeat_seq: u64,
    last_heartbeat_sent: Option<I>,
    last_activity: I,
    last_timestamp_ms: u64,
    missed_heartbeats: u32,
}

impl<I> ProtocolEndpoint<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a driver in [`EndpointState::Initial`].
    #[must_use]
    pub fn new(now: I, config: EndpointConfig, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            state: EndpointState::Initial,
            config,
            authenticator,
            client_id: None,
            negotiated_version: 0,
            negotiated_max_message_size: 0,
            negotiated_compression: Vec::new(),
            attached_sessions: HashSet::new(),
            paused_sessions: HashSet::new(),
            last_delivered_sequence: HashMap::new(),
            last_delivered_state_sequence: HashMap::new(),
            heartbeat_seq: 0,
            last_heartbeat_sent: None,
            last_activity: now,
            last_timestamp_ms: 0,
            missed_heartbeats: 0,
        }
    }

    /// Current driver state.
    #[must_use]
    pub fn state(&self) -> EndpointState {
        self.state
    }

    /// `true` once the driver has reached [`EndpointState::Closed`].
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == EndpointState::Closed
    }

    /// Authenticated client id, if the handshake has completed.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Sessions this connection is currently attached to.
    #[must_use]
    pub fn attached_sessions(&self) -> &HashSet<u32> {
        &self.attached_sessions
    }

    /// Negotiated max message size, valid once past
    /// [`EndpointState::CapabilityNegotiating`].
    #[must_use]
    pub fn negotiated_max_message_size(&self) -> u32 {
        self.negotiated_max_message_size
    }

    /// Record the output sequence most recently delivered to this
    /// connection for `session_id`, so a later disconnection can be
    /// reported accurately.
    pub fn note_delivered_sequence(&mut self, session_id: u32, sequence: u64) {
        self.last_delivered_sequence.insert(session_id, sequence);
    }

    /// Record the state sequence most recently delivered for `session_id`.
    pub fn note_delivered_state_sequence(&mut self, session_id: u32, sequence: u64) {
        self.last_delivered_state_sequence.insert(session_id, sequence);
    }

    /// `true` if output delivery for `session_id` is currently paused.
    #[must_use]
    pub fn is_paused(&self, session_id: u32) -> bool {
        self.paused_sessions.contains(&session_id)
    }

    /// Drive the state machine with one event.
    ///
    /// # Errors
    ///
    /// See the individual frame handlers; broadly, malformed frames,
    /// frames arriving in the wrong state, and delegated service/session
    /// errors all surface here.
    pub fn process_event<E>(
        &mut self,
        event: EndpointEvent,
        now: I,
        timestamp_ms: u64,
        env: &E,
        service: &mut StreamingDataService,
        reconnection: &mut ReconnectionManager,
    ) -> Result<Vec<EndpointAction>, EndpointError>
    where
        E: Environment<Instant = I>,
    {
        match event {
            EndpointEvent::Tick => Ok(self.tick(now)?),
            EndpointEvent::TransportError(reason) => Ok(self.handle_transport_error(reason)),
            EndpointEvent::Frame(frame) => {
                self.last_activity = now;
                self.last_timestamp_ms = timestamp_ms;
                self.handle_frame(&frame, env, service, reconnection)
            },
        }
    }

    fn tick(&mut self, now: I) -> Result<Vec<EndpointAction>, EndpointError> {
        if self.state != EndpointState::Ready {
            return Ok(Vec::new());
        }

        let interval_elapsed = match self.last_heartbeat_sent {
            None => true,
            Some(last) => now - last >= self.config.heartbeat_interval,
        };
        if !interval_elapsed {
            return Ok(Vec::new());
        }

        if self.last_heartbeat_sent.is_some() {
            self.missed_heartbeats += 1;
        }

        if self.missed_heartbeats >= self.config.heartbeat_missed_limit {
            self.state = EndpointState::Closed;
            let mut actions = self.build_disconnection_actions();
            actions.push(EndpointAction::Close { reason: "heartbeat timeout".to_string(), fatal: true });
            return Ok(actions);
        }

        self.heartbeat_seq += 1;
        self.last_heartbeat_sent = Some(now);

        let heartbeat = control::Heartbeat {
            sequence_number: self.heartbeat_seq,
            timestamp_ms: self.last_timestamp_ms,
            pending_acks: self.missed_heartbeats,
        };
        let frame = Payload::Heartbeat(heartbeat).into_frame(FrameHeader::CONTROL_SESSION)?;
        Ok(vec![EndpointAction::SendFrame(frame)])
    }

    fn handle_transport_error(&mut self, reason: String) -> Vec<EndpointAction> {
        self.state = EndpointState::Closed;
        let mut actions = self.build_disconnection_actions();
        actions.push(EndpointAction::Close { reason, fatal: false });
        actions
    }

    fn build_disconnection_actions(&self) -> Vec<EndpointAction> {
        self.attached_sessions
            .iter()
            .map(|&session_id| EndpointAction::RecordDisconnection {
                session_id,
                last_sequence_number: self.last_delivered_sequence.get(&session_id).copied().unwrap_or(0),
                last_state_sequence: self.last_delivered_state_sequence.get(&session_id).copied(),
            })
            .collect()
    }

    fn handle_frame<E: Environment<Instant = I>>(
        &mut self,
        frame: &Frame,
        env: &E,
        service: &mut StreamingDataService,
        reconnection: &mut ReconnectionManager,
    ) -> Result<Vec<EndpointAction>, EndpointError> {
        if self.state == EndpointState::Closed {
            return Err(EndpointError::UnexpectedEvent {
                state: EndpointState::Closed.label(),
                detail: "frame arrived after close".to_string(),
            });
        }

        let payload = Payload::from_frame(frame)?;

        match (self.state, payload) {
            (EndpointState::Initial, Payload::VersionNegotiation(negotiation)) => {
                self.handle_version_negotiation(&negotiation)
            },

            (EndpointState::CapabilityNegotiating, Payload::CapabilityExchange(exchange)) => {
                self.handle_capability_exchange(&exchange)
            },

            (EndpointState::Authenticating, Payload::Authentication(request)) => {
                self.handle_authentication(&request)
            },

            (EndpointState::Ready, Payload::Heartbeat(heartbeat)) => {
                Ok(vec![self.handle_heartbeat(&heartbeat)?])
            },
            (EndpointState::Ready, Payload::HeartbeatAck(_ack)) => {
                self.missed_heartbeats = 0;
                Ok(vec![])
            },

            (EndpointState::Ready, Payload::SessionCreate(create)) => {
                self.handle_session_create(&create, env, service)
            },
            (EndpointState::Ready, Payload::SessionAttach(attach)) => {
                self.handle_session_attach(&attach, service, reconnection)
            },
            (EndpointState::Ready, Payload::SessionDetach(detach)) => {
                self.handle_session_detach(&detach, service)
            },
            (EndpointState::Ready, Payload::SessionClose(close)) => {
                self.handle_session_close(&close, service)
            },
            (EndpointState::Ready, Payload::SessionList(_)) => self.handle_session_list(service),

            (EndpointState::Ready, Payload::TerminalInput(input)) => {
                self.handle_terminal_input(&input, service)
            },
            (EndpointState::Ready, Payload::Resize(resize)) => {
                self.ensure_session(resize.session_id, service)?;
                Ok(vec![])
            },
            (EndpointState::Ready, Payload::Signal(signal)) => {
                self.ensure_session(signal.session_id, service)?;
                Ok(vec![])
            },

            (EndpointState::Ready, Payload::ScrollbackRequest(request)) => {
                self.handle_scrollback_request(&request, service)
            },

            (EndpointState::Ready, Payload::FlowControl(message)) => {
                self.handle_flow_control(&message, service)
            },
            (EndpointState::Ready, Payload::WindowUpdate(update)) => {
                self.handle_window_update(&update, service)
            },
            (EndpointState::Ready, Payload::Pause(pause)) => {
                self.paused_sessions.insert(pause.session_id);
                Ok(vec![])
            },
            (EndpointState::Ready, Payload::Resume(resume)) => {
                self.paused_sessions.remove(&resume.session_id);
                Ok(vec![])
            },

            (EndpointState::Ready, Payload::CompressionControl(control)) => {
                self.handle_compression_control(&control, service)
            },

            (state, Payload::Close(close)) if state != EndpointState::Closed => {
                self.state = EndpointState::Closed;
                let ack = Payload::Close(control::Close { reason: "ack".to_string() })
                    .into_frame(FrameHeader::CONTROL_SESSION)?;
                let mut actions = vec![EndpointAction::SendFrame(ack)];
                actions.extend(self.build_disconnection_actions());
                actions.push(EndpointAction::Close {
                    reason: format!("peer close: {}", close.reason),
                    fatal: false,
                });
                Ok(actions)
            },

            (state, _unexpected) => Err(EndpointError::UnexpectedEvent {
                state: state.label(),
                detail: "frame not valid for current state".to_string(),
            }),
        }
    }

    fn ensure_session(&self, session_id: u32, service: &StreamingDataService) -> Result<(), EndpointError> {
        if service.session_exists(session_id) {
            Ok(())
        } else {
            Err(EndpointError::Service(crate::errors::ServiceError::SessionNotFound(session_id)))
        }
    }

    fn handle_version_negotiation(
        &mut self,
        negotiation: &control::VersionNegotiation,
    ) -> Result<Vec<EndpointAction>, EndpointError> {
        let overlap_min = negotiation.min_version.max(self.config.server_version);
        let overlap_max = negotiation.max_version.min(self.config.server_version);

        if overlap_min > overlap_max {
            self.state = EndpointState::Closed;
            let response = control::VersionResponse {
                selected_version: 0,
                accepted: false,
                rejection_reason: Some("no overlapping version range".to_string()),
            };
            let frame = Payload::VersionResponse(response).into_frame(FrameHeader::CONTROL_SESSION)?;
            return Ok(vec![
                EndpointAction::SendFrame(frame),
                EndpointAction::Close { reason: "version mismatch".to_string(), fatal: true },
            ]);
        }

        self.negotiated_version = overlap_min;
        self.state = EndpointState::CapabilityNegotiating;

        let response =
            control::VersionResponse { selected_version: self.negotiated_version, accepted: true, rejection_reason: None };
        let frame = Payload::VersionResponse(response).into_frame(FrameHeader::CONTROL_SESSION)?;
        Ok(vec![EndpointAction::SendFrame(frame)])
    }

    fn handle_capability_exchange(
        &mut self,
        exchange: &control::CapabilityExchange,
    ) -> Result<Vec<EndpointAction>, EndpointError> {
        self.negotiated_max_message_size = exchange.max_message_size.min(self.config.server_max_message_size);
        self.negotiated_compression = exchange
            .compression_list
            .iter()
            .copied()
            .filter(|scheme| self.config.supported_compression.contains(scheme))
            .collect();

        self.state = EndpointState::Authenticating;

        let heartbeat_interval_ms = u32::try_from(self.config.heartbeat_interval.as_millis()).unwrap_or(u32::MAX);
        let response = control::CapabilityResponse {
            compression_list: self.negotiated_compression.clone(),
            features: Vec::new(),
            max_message_size: self.negotiated_max_message_size,
            heartbeat_interval_ms,
        };
        let frame = Payload::CapabilityResponse(response).into_frame(FrameHeader::CONTROL_SESSION)?;
        Ok(vec![EndpointAction::SendFrame(frame)])
    }

    fn handle_authentication(
        &mut self,
        request: &control::AuthenticationRequest,
    ) -> Result<Vec<EndpointAction>, EndpointError> {
        match self.authenticator.authenticate(&request.token) {
            Some(client_id) => {
                self.client_id = Some(client_id);
                self.state = EndpointState::Ready;

                let expires_in_ms = u64::try_from(self.config.auth_token_ttl.as_millis()).unwrap_or(u64::MAX);
                let response = control::AuthenticationResponse {
                    success: true,
                    session_token: Some(request.token.clone()),
                    expires_in_ms: Some(expires_in_ms),
                };
                let frame = Payload::AuthResponse(response).into_frame(FrameHeader::CONTROL_SESSION)?;
                Ok(vec![EndpointAction::SendFrame(frame)])
            },
            None => {
                self.state = EndpointState::Closed;
                let response =
                    control::AuthenticationResponse { success: false, session_token: None, expires_in_ms: None };
                let frame = Payload::AuthResponse(response).into_frame(FrameHeader::CONTROL_SESSION)?;
                Ok(vec![
                    EndpointAction::SendFrame(frame),
                    EndpointAction::Close { reason: "authentication failed".to_string(), fatal: true },
                ])
            },
        }
    }

    fn handle_heartbeat(&mut self, heartbeat: &control::Heartbeat) -> Result<EndpointAction, EndpointError> {
        let ack = control::HeartbeatAck {
            sequence_number: heartbeat.sequence_number,
            server_timestamp_ms: self.last_timestamp_ms,
            latency_ms: self.last_timestamp_ms.saturating_sub(heartbeat.timestamp_ms),
        };
        let frame = Payload::HeartbeatAck(ack).into_frame(FrameHeader::CONTROL_SESSION)?;
        Ok(EndpointAction::SendFrame(frame))
    }

    fn handle_session_create<E: Environment>(
        &mut self,
        _create: &session::SessionCreate,
        env: &E,
        service: &mut StreamingDataService,
    ) -> Result<Vec<EndpointAction>, EndpointError> {
        let session_id = self.allocate_session_id(env, service);
        service.create_session(session_id)?;

        let created = session::SessionCreated { session_id };
        let frame = Payload::SessionCreated(created).into_frame(session_id)?;
        Ok(vec![EndpointAction::SendFrame(frame)])
    }

    fn allocate_session_id<E: Environment>(&self, env: &E, service: &StreamingDataService) -> u32 {
        loop {
            let candidate = (env.random_u64() as u32).max(1);
            if !service.session_exists(candidate) {
                return candidate;
            }
        }
    }

    fn handle_session_attach(
        &mut self,
        attach: &session::SessionAttach,
        service: &mut StreamingDataService,
        reconnection: &mut ReconnectionManager,
    ) -> Result<Vec<EndpointAction>, EndpointError> {
        let client_id = self.client_id.clone().ok_or(EndpointError::AuthenticationRequired)?;
        let now = Duration::from_millis(self.last_timestamp_ms);

        let registration = if reconnection.has_pending_disconnection(&client_id) {
            let outcome = reconnection.attempt_reconnection(
                &client_id,
                attach.session_id,
                attach.replay_from_sequence,
                attach.last_known_state_sequence,
                now,
                service,
            );
            if outcome.success {
                RegistrationResult {
                    chunks_replayed: outcome.chunks_replayed as usize,
                    oldest_available_sequence: outcome.oldest_sequence_available,
                    data_lost: outcome.data_lost,
                    state_snapshot: outcome.state_snapshot,
                    replayed_chunks: outcome.replayed_chunks,
                }
            } else {
                tracing::debug!(
                    client_id = %client_id,
                    error_code = outcome.error_code.as_deref().unwrap_or("unknown"),
                    "reconnection attempt failed, falling back to a fresh attach",
                );
                service.register_client(
                    attach.session_id,
                    client_id.clone(),
                    attach.replay_from_sequence,
                    attach.last_known_state_sequence,
                )?
            }
        } else {
            service.register_client(
                attach.session_id,
                client_id.clone(),
                attach.replay_from_sequence,
                attach.last_known_state_sequence,
            )?
        };

        self.attached_sessions.insert(attach.session_id);

        let mut actions = Vec::new();
        let attached = session::SessionAttached {
            chunks_replayed: u32::try_from(registration.chunks_replayed).unwrap_or(u32::MAX),
            oldest_available_sequence: registration.oldest_available_sequence.unwrap_or(0),
            data_lost: registration.data_lost,
        };
        actions.push(EndpointAction::SendFrame(
            Payload::SessionAttached(attached).into_frame(attach.session_id)?,
        ));

        if let Some(snapshot) = registration.state_snapshot {
            self.note_delivered_state_sequence(attach.session_id, snapshot.sequence_number);
            actions.push(EndpointAction::SendFrame(
                Payload::StateSnapshot(snapshot).into_frame(attach.session_id)?,
            ));
        }

        for chunk in registration.replayed_chunks {
            self.note_delivered_sequence(attach.session_id, chunk.sequence_number);
            let output = data::TerminalOutputData {
                session_id: attach.session_id,
                data: chunk.data,
                sequence_number: chunk.sequence_number,
                compressed: chunk.compressed,
                is_replay: true,
            };
            actions.push(EndpointAction::SendFrame(
                Payload::TerminalOutput(output).into_frame(attach.session_id)?,
            ));
        }

        Ok(actions)
    }

    fn handle_session_detach(
        &mut self,
        detach: &session::SessionDetach,
        service: &mut StreamingDataService,
    ) -> Result<Vec<EndpointAction>, EndpointError> {
        let client_id = self.client_id.clone().ok_or(EndpointError::AuthenticationRequired)?;

        service.unregister_client(detach.session_id, &client_id)?;
        self.attached_sessions.remove(&detach.session_id);

        let detached = session::SessionDetached { session_id: detach.session_id };
        let frame = Payload::SessionDetached(detached).into_frame(detach.session_id)?;
        Ok(vec![EndpointAction::SendFrame(frame)])
    }

    fn handle_session_close(
        &mut self,
        close: &session::SessionClose,
        service: &mut StreamingDataService,
    ) -> Result<Vec<EndpointAction>, EndpointError> {
        service.destroy_session(close.session_id)?;
        self.attached_sessions.remove(&close.session_id);

        let closed = session::SessionClosed { session_id: close.session_id };
        let frame = Payload::SessionClosed(closed).into_frame(close.session_id)?;
        Ok(vec![EndpointAction::SendFrame(frame)])
    }

    fn handle_session_list(
        &self,
        service: &StreamingDataService,
    ) -> Result<Vec<EndpointAction>, EndpointError> {
        let mut summaries = Vec::new();
        for session_id in service.session_ids() {
            let client_count = service.client_count(session_id)?;
            let (columns, rows) =
                service.state_snapshot(session_id)?.map_or((0, 0), |snapshot| (snapshot.columns, snapshot.rows));
            summaries.push(session::SessionSummary {
                session_id,
                columns,
                rows,
                client_count: u32::try_from(client_count).unwrap_or(u32::MAX),
            });
        }

        let response = session::SessionListResponse { sessions: summaries };
        let frame = Payload::SessionListResponse(response).into_frame(FrameHeader::CONTROL_SESSION)?;
        Ok(vec![EndpointAction::SendFrame(frame)])
    }

    fn handle_terminal_input(
        &mut self,
        input: &data::TerminalInputData,
        service: &mut StreamingDataService,
    ) -> Result<Vec<EndpointAction>, EndpointError> {
        let client_id = self.client_id.clone().ok_or(EndpointError::AuthenticationRequired)?;
        service.process_client_input(&client_id, input.session_id, input.data.clone());
        Ok(vec![])
    }

    fn handle_scrollback_request(
        &mut self,
        request: &state::ScrollbackRequest,
        service: &mut StreamingDataService,
    ) -> Result<Vec<EndpointAction>, EndpointError> {
        let page = service.scrollback_page(request.session_id, request.start_line, request.line_count)?;
        let response = state::ScrollbackResponse {
            start_line: page.start_line,
            total_lines: page.total_lines,
            lines: page.lines,
            has_more: page.has_more,
        };
        let frame = Payload::ScrollbackResponse(response).into_frame(request.session_id)?;
        Ok(vec![EndpointAction::SendFrame(frame)])
    }

    fn handle_flow_control(
        &mut self,
        message: &flow::FlowControlMessage,
        service: &mut StreamingDataService,
    ) -> Result<Vec<EndpointAction>, EndpointError> {
        let client_id = self.client_id.clone().ok_or(EndpointError::AuthenticationRequired)?;
        service.handle_flow_control(message.session_id, &client_id, message.window_size, message.bytes_acknowledged)?;
        Ok(vec![])
    }

    fn handle_window_update(
        &mut self,
        update: &flow::WindowUpdate,
        service: &mut StreamingDataService,
    ) -> Result<Vec<EndpointAction>, EndpointError> {
        let client_id = self.client_id.clone().ok_or(EndpointError::AuthenticationRequired)?;
        service.handle_window_update(update.session_id, &client_id, update.window_increment)?;
        Ok(vec![])
    }

    fn handle_compression_control(
        &mut self,
        control: &control::CompressionControl,
        service: &mut StreamingDataService,
    ) -> Result<Vec<EndpointAction>, EndpointError> {
        service.set_compression_override(control.session_id, control.enabled, control.level)?;
        Ok(vec![])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::config::{ReconnectionConfig, ServiceConfig};

    #[derive(Clone)]
    struct TestEnv;

    impl Environment for TestEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            Instant::now()
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            async {}
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = i as u8;
            }
        }
    }

    struct AcceptAnyAuthenticator;

    impl Authenticator for AcceptAnyAuthenticator {
        fn authenticate(&self, token: &str) -> Option<String> {
            if token == "good-token" { Some("client-a".to_string()) } else { None }
        }
    }

    fn running_service() -> StreamingDataService {
        let mut service = StreamingDataService::new(ServiceConfig::default());
        service.start();
        service
    }

    fn new_endpoint(now: Instant) -> ProtocolEndpoint<Instant> {
        ProtocolEndpoint::new(now, EndpointConfig::default(), Arc::new(AcceptAnyAuthenticator))
    }

    fn reconnection_manager() -> ReconnectionManager {
        ReconnectionManager::new(ReconnectionConfig::default())
    }

    fn advance_to_ready(
        endpoint: &mut ProtocolEndpoint<Instant>,
        env: &TestEnv,
        service: &mut StreamingDataService,
        reconnection: &mut ReconnectionManager,
        now: Instant,
    ) {
        let negotiation = control::VersionNegotiation { client_version: 1, min_version: 1, max_version: 1 };
        let frame = Payload::VersionNegotiation(negotiation).into_frame(0).unwrap();
        endpoint.process_event(EndpointEvent::Frame(frame), now, 0, env, service, reconnection).unwrap();

        let exchange = control::CapabilityExchange {
            compression_list: vec![control::CompressionType::None],
            features: vec![],
            max_message_size: 65536,
            max_concurrent_sessions: 4,
        };
        let frame = Payload::CapabilityExchange(exchange).into_frame(0).unwrap();
        endpoint.process_event(EndpointEvent::Frame(frame), now, 0, env, service, reconnection).unwrap();

        let auth = control::AuthenticationRequest { token: "good-token".to_string() };
        let frame = Payload::Authentication(auth).into_frame(0).unwrap();
        endpoint.process_event(EndpointEvent::Frame(frame), now, 0, env, service, reconnection).unwrap();
    }

    #[test]
    fn full_handshake_reaches_ready() {
        let env = TestEnv;
        let mut service = running_service();
        let mut reconnection = reconnection_manager();
        let t0 = env.now();
        let mut endpoint = new_endpoint(t0);

        advance_to_ready(&mut endpoint, &env, &mut service, &mut reconnection, t0);

        assert_eq!(endpoint.state(), EndpointState::Ready);
        assert_eq!(endpoint.client_id(), Some("client-a"));
    }

    #[test]
    fn version_mismatch_closes_the_connection() {
        let env = TestEnv;
        let mut service = running_service();
        let mut reconnection = reconnection_manager();
        let t0 = env.now();
        let mut endpoint = new_endpoint(t0);

        let negotiation = control::VersionNegotiation { client_version: 99, min_version: 99, max_version: 99 };
        let frame = Payload::VersionNegotiation(negotiation).into_frame(0).unwrap();
        let actions =
            endpoint.process_event(EndpointEvent::Frame(frame), t0, 0, &env, &mut service, &mut reconnection).unwrap();

        assert_eq!(endpoint.state(), EndpointState::Closed);
        assert!(actions.iter().any(|action| matches!(action, EndpointAction::Close { fatal: true, .. })));
    }

    #[test]
    fn authentication_failure_closes_the_connection() {
        let env = TestEnv;
        let mut service = running_service();
        let mut reconnection = reconnection_manager();
        let t0 = env.now();
        let mut endpoint = new_endpoint(t0);

        let negotiation = control::VersionNegotiation { client_version: 1, min_version: 1, max_version: 1 };
        let frame = Payload::VersionNegotiation(negotiation).into_frame(0).unwrap();
        endpoint.process_event(EndpointEvent::Frame(frame), t0, 0, &env, &mut service, &mut reconnection).unwrap();

        let exchange = control::CapabilityExchange {
            compression_list: vec![control::CompressionType::None],
            features: vec![],
            max_message_size: 65536,
            max_concurrent_sessions: 4,
        };
        let frame = Payload::CapabilityExchange(exchange).into_frame(0).unwrap();
        endpoint.process_event(EndpointEvent::Frame(frame), t0, 0, &env, &mut service, &mut reconnection).unwrap();

        let auth = control::AuthenticationRequest { token: "wrong".to_string() };
        let frame = Payload::Authentication(auth).into_frame(0).unwrap();
        let actions =
            endpoint.process_event(EndpointEvent::Frame(frame), t0, 0, &env, &mut service, &mut reconnection).unwrap();

        assert_eq!(endpoint.state(), EndpointState::Closed);
        assert!(actions.iter().any(|action| matches!(action, EndpointAction::Close { fatal: true, .. })));
    }

    #[test]
    fn session_create_attach_and_input_round_trip() {
        let env = TestEnv;
        let mut service = running_service();
        let mut reconnection = reconnection_manager();
        let t0 = env.now();
        let mut endpoint = new_endpoint(t0);
        advance_to_ready(&mut endpoint, &env, &mut service, &mut reconnection, t0);

        let create = session::SessionCreate { columns: 80, rows: 24 };
        let frame = Payload::SessionCreate(create).into_frame(0).unwrap();
        let actions =
            endpoint.process_event(EndpointEvent::Frame(frame), t0, 0, &env, &mut service, &mut reconnection).unwrap();
        let session_id = match &actions[0] {
            EndpointAction::SendFrame(frame) => frame.header.session_id(),
            _ => panic!("expected SendFrame"),
        };

        let attach = session::SessionAttach { session_id, replay_from_sequence: None, last_known_state_sequence: None };
        let frame = Payload::SessionAttach(attach).into_frame(session_id).unwrap();
        endpoint.process_event(EndpointEvent::Frame(frame), t0, 0, &env, &mut service, &mut reconnection).unwrap();
        assert!(endpoint.attached_sessions().contains(&session_id));

        let mut input_receiver = service.take_input_receiver().unwrap();
        let input = data::TerminalInputData { session_id, data: b"ls\n".to_vec(), sequence_number: 0 };
        let frame = Payload::TerminalInput(input).into_frame(session_id).unwrap();
        endpoint.process_event(EndpointEvent::Frame(frame), t0, 0, &env, &mut service, &mut reconnection).unwrap();

        let event = input_receiver.try_recv().unwrap();
        assert_eq!(event.data, b"ls\n");
    }

    #[test]
    fn session_attach_replays_ring_buffer_chunks_ahead_of_live_output() {
        let env = TestEnv;
        let mut service = running_service();
        let mut reconnection = reconnection_manager();
        let t0 = env.now();
        let mut endpoint = new_endpoint(t0);
        advance_to_ready(&mut endpoint, &env, &mut service, &mut reconnection, t0);

        let create = session::SessionCreate { columns: 80, rows: 24 };
        let frame = Payload::SessionCreate(create).into_frame(0).unwrap();
        let actions =
            endpoint.process_event(EndpointEvent::Frame(frame), t0, 0, &env, &mut service, &mut reconnection).unwrap();
        let session_id = match &actions[0] {
            EndpointAction::SendFrame(frame) => frame.header.session_id(),
            _ => panic!("expected SendFrame"),
        };
        service.process_terminal_output(session_id, b"hello", 0).unwrap();
        service.process_terminal_output(session_id, b"world", 0).unwrap();

        let attach =
            session::SessionAttach { session_id, replay_from_sequence: Some(1), last_known_state_sequence: None };
        let frame = Payload::SessionAttach(attach).into_frame(session_id).unwrap();
        let actions =
            endpoint.process_event(EndpointEvent::Frame(frame), t0, 0, &env, &mut service, &mut reconnection).unwrap();

        let replayed: Vec<_> = actions
            .iter()
            .filter_map(|action| match action {
                EndpointAction::SendFrame(frame) => Payload::from_frame(frame).ok(),
                _ => None,
            })
            .filter_map(|payload| match payload {
                Payload::TerminalOutput(output) => Some(output),
                _ => None,
            })
            .collect();

        assert_eq!(replayed.len(), 2);
        assert!(replayed.iter().all(|output| output.is_replay));
        assert_eq!(replayed[0].sequence_number, 1);
        assert_eq!(replayed[1].sequence_number, 2);
    }

    #[test]
    fn heartbeat_timeout_closes_after_missed_limit() {
        let env = TestEnv;
        let mut service = running_service();
        let mut reconnection = reconnection_manager();
        let t0 = env.now();
        let mut endpoint = new_endpoint(t0);
        advance_to_ready(&mut endpoint, &env, &mut service, &mut reconnection, t0);

        let interval = endpoint.config.heartbeat_interval;
        let limit = endpoint.config.heartbeat_missed_limit;

        let mut now = t0;
        let mut closed = false;
        for _ in 0..=limit {
            now += interval;
            let actions =
                endpoint.process_event(EndpointEvent::Tick, now, 0, &env, &mut service, &mut reconnection).unwrap();
            if actions.iter().any(|action| matches!(action, EndpointAction::Close { .. })) {
                closed = true;
                break;
            }
        }

        assert!(closed);
        assert_eq!(endpoint.state(), EndpointState::Closed);
    }

    #[test]
    fn frame_in_wrong_state_is_rejected() {
        let env = TestEnv;
        let mut service = running_service();
        let mut reconnection = reconnection_manager();
        let t0 = env.now();
        let mut endpoint = new_endpoint(t0);

        let heartbeat = control::Heartbeat { sequence_number: 1, timestamp_ms: 0, pending_acks: 0 };
        let frame = Payload::Heartbeat(heartbeat).into_frame(0).unwrap();
        let result =
            endpoint.process_event(EndpointEvent::Frame(frame), t0, 0, &env, &mut service, &mut reconnection);

        assert!(matches!(result, Err(EndpointError::UnexpectedEvent { .. })));
    }

    #[test]
    fn transport_error_records_disconnection_for_attached_sessions() {
        let env = TestEnv;
        let mut service = running_service();
        let mut reconnection = reconnection_manager();
        let t0 = env.now();
        let mut endpoint = new_endpoint(t0);
        advance_to_ready(&mut endpoint, &env, &mut service, &mut reconnection, t0);

        let create = session::SessionCreate { columns: 80, rows: 24 };
        let frame = Payload::SessionCreate(create).into_frame(0).unwrap();
        let actions =
            endpoint.process_event(EndpointEvent::Frame(frame), t0, 0, &env, &mut service, &mut reconnection).unwrap();
        let session_id = match &actions[0] {
            EndpointAction::SendFrame(frame) => frame.header.session_id(),
            _ => panic!("expected SendFrame"),
        };
        let attach = session::SessionAttach { session_id, replay_from_sequence: None, last_known_state_sequence: None };
        let frame = Payload::SessionAttach(attach).into_frame(session_id).unwrap();
        endpoint.process_event(EndpointEvent::Frame(frame), t0, 0, &env, &mut service, &mut reconnection).unwrap();

        let actions = endpoint
            .process_event(
                EndpointEvent::TransportError("write failed".to_string()),
                t0,
                0,
                &env,
                &mut service,
                &mut reconnection,
            )
            .unwrap();

        assert!(actions.iter().any(|action| matches!(action, EndpointAction::RecordDisconnection { session_id: s, .. } if *s == session_id)));
        assert_eq!(endpoint.state(), EndpointState::Closed);
    }

    #[test]
    fn reattach_after_disconnection_replays_missed_output_and_clears_pending_state() {
        let env = TestEnv;
        let mut service = running_service();
        let mut reconnection = reconnection_manager();
        let t0 = env.now();
        let mut endpoint = new_endpoint(t0);
        advance_to_ready(&mut endpoint, &env, &mut service, &mut reconnection, t0);

        let create = session::SessionCreate { columns: 80, rows: 24 };
        let frame = Payload::SessionCreate(create).into_frame(0).unwrap();
        let actions =
            endpoint.process_event(EndpointEvent::Frame(frame), t0, 0, &env, &mut service, &mut reconnection).unwrap();
        let session_id = match &actions[0] {
            EndpointAction::SendFrame(frame) => frame.header.session_id(),
            _ => panic!("expected SendFrame"),
        };
        let attach = session::SessionAttach { session_id, replay_from_sequence: None, last_known_state_sequence: None };
        let frame = Payload::SessionAttach(attach).into_frame(session_id).unwrap();
        endpoint.process_event(EndpointEvent::Frame(frame), t0, 0, &env, &mut service, &mut reconnection).unwrap();

        reconnection.record_disconnection("client-a", session_id, 0, None, Duration::ZERO);
        service.unregister_client(session_id, "client-a").unwrap();
        service.process_terminal_output(session_id, b"missed", 0).unwrap();

        let reattach =
            session::SessionAttach { session_id, replay_from_sequence: Some(0), last_known_state_sequence: None };
        let frame = Payload::SessionAttach(reattach).into_frame(session_id).unwrap();
        let actions =
            endpoint.process_event(EndpointEvent::Frame(frame), t0, 0, &env, &mut service, &mut reconnection).unwrap();

        let replayed_count = actions
            .iter()
            .filter(|action| {
                matches!(action, EndpointAction::SendFrame(frame) if matches!(Payload::from_frame(frame), Ok(Payload::TerminalOutput(_))))
            })
            .count();
        assert_eq!(replayed_count, 1);
        assert!(!reconnection.has_pending_disconnection("client-a"));
    }
}
