//! Production "glue" wrapping [`termstream_core`]'s Sans-IO driver with real
//! I/O.
//!
//! A connection is driven by a single [`ProtocolEndpoint`], fed frames read
//! off a generic transport and ticked on a timer for heartbeat bookkeeping.
//! [`execute_actions`] is the only place that touches the socket or the
//! shared driver state, mirroring the read-loop/action-executor split used
//! elsewhere in this codebase's network services.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{StreamExt, StreamMap};

use termstream_core::endpoint::{Authenticator, EndpointConfig, EndpointEvent, ProtocolEndpoint};
use termstream_core::env::Environment;
use termstream_core::reconnection::ReconnectionManager;
use termstream_core::service::{SessionOutput, StreamingDataService};
use termstream_proto::payloads::{control::CompressionType, data::TerminalOutputData};
use termstream_proto::{Frame, FrameHeader, Payload};

use crate::error::ServerError;

type OutputStreams = StreamMap<u32, BroadcastStream<SessionOutput>>;

/// State shared by every connection this server hosts.
pub struct SharedDriver {
    /// Session registry, ring buffers, and flow control.
    pub service: Mutex<StreamingDataService>,
    /// Disconnection bookkeeping for reattach.
    pub reconnection: Mutex<ReconnectionManager>,
    /// Validates bearer tokens presented during the auth handshake.
    pub authenticator: Arc<dyn Authenticator>,
    /// Reference instant `ReconnectionManager`'s `Duration`-based clock is
    /// measured against.
    pub started_at: Instant,
}

impl SharedDriver {
    /// Build shared state from a service configuration.
    ///
    /// `started_at` is the epoch `ReconnectionManager`'s `Duration`-based
    /// clock is measured against; callers pass their `Environment`'s
    /// current instant so the same constructor works against a real clock
    /// or a simulation's virtual one.
    #[must_use]
    pub fn new(
        service: StreamingDataService,
        reconnection_config: termstream_core::config::ReconnectionConfig,
        authenticator: Arc<dyn Authenticator>,
        started_at: Instant,
    ) -> Self {
        Self {
            service: Mutex::new(service),
            reconnection: Mutex::new(ReconnectionManager::new(reconnection_config)),
            authenticator,
            started_at,
        }
    }
}

/// Drive a single connection to completion.
///
/// Accepts anything satisfying `AsyncRead + AsyncWrite + Unpin + Send` so the
/// same logic serves a plain TCP stream, a TLS stream, or (in simulation) a
/// Turmoil-backed one.
pub async fn handle_connection<T, E>(
    stream: T,
    shared: Arc<SharedDriver>,
    env: E,
    config: EndpointConfig,
) -> Result<(), ServerError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
    E: Environment<Instant = Instant>,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    let handshake_max_message_size = config.server_max_message_size;
    let mut endpoint = ProtocolEndpoint::new(env.now(), config, Arc::clone(&shared.authenticator));
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut output_streams: OutputStreams = StreamMap::new();

    let close_reason = loop {
        if endpoint.is_closed() {
            break "closed by driver".to_string();
        }

        let read_max_message_size = match endpoint.negotiated_max_message_size() {
            0 => handshake_max_message_size,
            negotiated => negotiated,
        };

        let event = tokio::select! {
            biased;

            frame = read_frame(&mut reader, read_max_message_size) => {
                match frame {
                    Ok(Some(frame)) => EndpointEvent::Frame(frame),
                    Ok(None) => break "peer closed connection".to_string(),
                    Err(err) => break format!("read error: {err}"),
                }
            },

            Some((_, chunk)) = output_streams.next(), if !output_streams.is_empty() => {
                if let Err(err) =
                    deliver_live_output(chunk, &mut endpoint, &shared, &mut writer, read_max_message_size).await
                {
                    break format!("write error: {err}");
                }
                continue;
            },

            _ = ticker.tick() => EndpointEvent::Tick,
        };

        let now = env.now();
        let timestamp_ms = wall_clock_ms(shared.started_at, now);

        let actions = {
            let mut service = shared.service.lock().await;
            let mut reconnection = shared.reconnection.lock().await;
            match endpoint.process_event(event, now, timestamp_ms, &env, &mut service, &mut reconnection) {
                Ok(actions) => actions,
                Err(err) => {
                    tracing::warn!("endpoint error: {err}");
                    break err.to_string();
                },
            }
        };

        sync_output_subscriptions(&mut output_streams, endpoint.attached_sessions(), &shared).await;

        let write_max_message_size = match endpoint.negotiated_max_message_size() {
            0 => handshake_max_message_size,
            negotiated => negotiated,
        };
        if execute_actions(&mut writer, &shared, endpoint.client_id(), write_max_message_size, actions)
            .await
            .is_err()
        {
            break "write error".to_string();
        }
    };

    tracing::debug!(%close_reason, "connection ending");

    if !endpoint.is_closed() {
        let now = env.now();
        let timestamp_ms = wall_clock_ms(shared.started_at, now);
        let mut service = shared.service.lock().await;
        let mut reconnection = shared.reconnection.lock().await;
        if let Ok(actions) = endpoint.process_event(
            EndpointEvent::TransportError(close_reason),
            now,
            timestamp_ms,
            &env,
            &mut service,
            &mut reconnection,
        ) {
            drop(service);
            drop(reconnection);
            let max_message_size = match endpoint.negotiated_max_message_size() {
                0 => handshake_max_message_size,
                negotiated => negotiated,
            };
            let _ = execute_actions(&mut writer, &shared, endpoint.client_id(), max_message_size, actions).await;
        }
    }

    let _ = writer.shutdown().await;
    Ok(())
}

/// Milliseconds since the server started, used as the wire timestamp.
fn wall_clock_ms(started_at: Instant, now: Instant) -> u64 {
    now.saturating_duration_since(started_at)
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Keep `streams` subscribed to exactly the sessions `attached` names:
/// dropping receivers for sessions the connection has detached from, and
/// subscribing to newly attached ones via [`StreamingDataService::subscribe_output`].
async fn sync_output_subscriptions(streams: &mut OutputStreams, attached: &HashSet<u32>, shared: &SharedDriver) {
    let stale: Vec<u32> = streams.keys().copied().filter(|session_id| !attached.contains(session_id)).collect();
    for session_id in stale {
        streams.remove(&session_id);
    }

    for &session_id in attached {
        if streams.contains_key(&session_id) {
            continue;
        }
        let service = shared.service.lock().await;
        if let Ok(receiver) = service.subscribe_output(session_id) {
            streams.insert(session_id, BroadcastStream::new(receiver));
        }
    }
}

/// Encode and write one live or replayed output chunk, subject to the
/// client's flow control window. Lag (the client fell far enough behind
/// that the broadcast channel overwrote unread chunks) is logged and
/// skipped rather than treated as a connection error.
async fn deliver_live_output<W: AsyncWrite + Unpin>(
    chunk: Result<SessionOutput, BroadcastStreamRecvError>,
    endpoint: &mut ProtocolEndpoint<Instant>,
    shared: &SharedDriver,
    writer: &mut W,
    max_message_size: u32,
) -> Result<(), ServerError> {
    let output = match chunk {
        Ok(output) => output,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "client lagged behind live output, dropping missed chunks");
            return Ok(());
        },
    };

    if endpoint.is_paused(output.session_id) {
        return Ok(());
    }
    let Some(client_id) = endpoint.client_id().map(str::to_string) else {
        return Ok(());
    };

    let reserved = {
        let mut service = shared.service.lock().await;
        service
            .try_reserve_credit(output.session_id, &client_id, output.output_data.len() as u64)
            .unwrap_or(false)
    };
    if !reserved {
        tracing::debug!(session_id = output.session_id, "flow control window exhausted, dropping live chunk");
        return Ok(());
    }

    let sequence = output.sequence;
    let payload = TerminalOutputData {
        session_id: output.session_id,
        data: output.output_data,
        sequence_number: sequence,
        compressed: output.compression_type != CompressionType::None,
        is_replay: output.is_replay,
    };
    let frame = Payload::TerminalOutput(payload).into_frame(output.session_id)?;
    let mut buf = Vec::new();
    frame.encode(&mut buf, max_message_size)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;

    endpoint.note_delivered_sequence(output.session_id, sequence);
    Ok(())
}

/// Read one frame off `reader`, or `None` on a clean EOF before any header
/// bytes arrive.
async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_message_size: u32,
) -> std::io::Result<Option<Frame>> {
    let mut header_buf = [0u8; FrameHeader::SIZE];

    let first_byte = reader.read(&mut header_buf[..1]).await?;
    if first_byte == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut header_buf[1..]).await?;

    let header = FrameHeader::from_bytes(&header_buf)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string()))?;
    let payload_length = header.payload_length();

    if payload_length > max_message_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("payload length {payload_length} exceeds negotiated max {max_message_size}"),
        ));
    }

    let mut full = BytesMut::with_capacity(FrameHeader::SIZE + payload_length as usize);
    full.extend_from_slice(&header_buf);
    full.resize(FrameHeader::SIZE + payload_length as usize, 0);
    reader.read_exact(&mut full[FrameHeader::SIZE..]).await?;

    let frame = Frame::decode(&full, max_message_size)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string()))?;
    Ok(Some(frame))
}

/// Execute the actions a single `process_event` call produced.
async fn execute_actions<W: AsyncWrite + Unpin>(
    writer: &mut W,
    shared: &SharedDriver,
    client_id: Option<&str>,
    max_message_size: u32,
    actions: Vec<termstream_core::endpoint::EndpointAction>,
) -> Result<(), ServerError> {
    use termstream_core::endpoint::EndpointAction;

    for action in actions {
        match action {
            EndpointAction::SendFrame(frame) => {
                let mut buf = Vec::new();
                frame.encode(&mut buf, max_message_size)?;
                writer.write_all(&buf).await?;
            },
            EndpointAction::Close { reason, fatal } => {
                tracing::debug!(%reason, fatal, "closing connection");
            },
            EndpointAction::RecordDisconnection { session_id, last_sequence_number, last_state_sequence } => {
                let Some(client_id) = client_id else {
                    tracing::warn!(session_id, "disconnection recorded before authentication completed");
                    continue;
                };
                let mut reconnection = shared.reconnection.lock().await;
                let now = shared.started_at.elapsed();
                reconnection.record_disconnection(
                    client_id,
                    session_id,
                    last_sequence_number,
                    last_state_sequence,
                    now,
                );
            },
        }
    }

    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_ms_tracks_elapsed_time() {
        let started = Instant::now();
        let later = started + Duration::from_millis(250);
        assert_eq!(wall_clock_ms(started, later), 250);
    }

    #[tokio::test]
    async fn read_frame_returns_none_on_clean_eof() {
        let mut empty: &[u8] = &[];
        let result = read_frame(&mut empty, 1024).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn read_frame_decodes_a_full_frame() {
        let header = FrameHeader::new(0, 0x01);
        let frame = Frame::new(header, Vec::<u8>::new());
        let mut wire = Vec::new();
        frame.encode(&mut wire, 1024).unwrap();

        let mut cursor = wire.as_slice();
        let result = read_frame(&mut cursor, 1024).await.unwrap();
        assert_eq!(result.unwrap().header.session_id(), 0);
    }
}
