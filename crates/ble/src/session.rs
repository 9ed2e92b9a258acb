//! Request/response session over a [`Transport`].
//!
//! A reader task decodes every notification and broadcasts the typed
//! [`Response`]. Queries subscribe before writing, then wait for the first
//! frame carrying the expected function code. Only one exchange runs at a
//! time.

use crate::error::{BleError, Result};
use crate::transport::{NotificationStream, Transport};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use meteo_core::config::ConfigSchema;
use meteo_protocol::{
    Channel, Coefficients, DeviceId, DeviceInfo, FirmwareVersion, FrameDecoder,
    HumidityTemperature, LogAssembler, LogControl, LogEntry, PressureTemperature, Query,
    RawPayload, Request, Response,
};
use meteo_telemetry::{metrics, names, Timer};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Log transfers burst hundreds of frames
const RESPONSE_CHANNEL_CAPACITY: usize = 1024;

/// Timing knobs for a session.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// How long a query waits for its answer
    pub response_timeout: Duration,
    /// Silence after which a log transfer is considered finished
    pub log_idle_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(2),
            log_idle_timeout: Duration::from_secs(5),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &ConfigSchema) -> Self {
        Self {
            response_timeout: config.ble.response_timeout(),
            log_idle_timeout: config.log.idle_timeout(),
        }
    }
}

/// Values read right after connecting.
///
/// Each field is `None` when the station did not answer that query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StationSnapshot {
    pub firmware: Option<FirmwareVersion>,
    pub device_info: Option<DeviceInfo>,
    pub period_ms: Option<u32>,
    pub pressure_temperature: Option<PressureTemperature>,
    pub humidity_temperature: Option<HumidityTemperature>,
}

/// Result of a log transfer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogDownload {
    pub entries: Vec<LogEntry>,
    /// The station signalled the end of the log and no frame was lost
    pub completed: bool,
    /// Frames the session fell too far behind to read
    pub dropped_frames: u64,
}

impl LogDownload {
    /// Entries missing at least one partial record
    pub fn incomplete(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_complete()).count()
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::from(LogEntry::csv_header());
        out.push('\n');
        for entry in &self.entries {
            out.push_str(&entry.csv_row());
            out.push('\n');
        }
        out
    }
}

pub struct StationSession<T: Transport> {
    transport: T,
    responses: broadcast::Receiver<Response>,
    reader: JoinHandle<()>,
    settings: SessionSettings,
    exchange: Mutex<()>,
}

impl<T: Transport> StationSession<T> {
    /// Take over the transport's notification stream and start decoding.
    pub async fn new(transport: T, settings: SessionSettings) -> Result<Self> {
        let notifications = transport.notifications().await?;
        let (tx, responses) = broadcast::channel(RESPONSE_CHANNEL_CAPACITY);
        let reader = tokio::spawn(read_notifications(notifications, tx));

        Ok(Self {
            transport,
            responses,
            reader,
            settings,
            exchange: Mutex::new(()),
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// Every decoded response from now on, including unsolicited ones.
    pub fn subscribe(&self) -> broadcast::Receiver<Response> {
        self.responses.resubscribe()
    }

    /// Write a request without waiting for an answer.
    pub async fn send(&self, request: impl Into<Request>) -> Result<()> {
        if !self.transport.is_connected().await {
            return Err(BleError::NotConnected);
        }
        let frame = request.into().encode();
        tracing::debug!(frame = %hex::encode(&frame), "sending");
        self.transport.write(&frame).await?;
        metrics().increment(names::FRAMES_SENT);
        Ok(())
    }

    /// Write a query and wait for the response that answers it.
    pub async fn query(&self, query: Query) -> Result<Response> {
        let _exchange = self.exchange.lock().await;
        let mut rx = self.responses.resubscribe();
        self.send(query).await?;

        let expected = query.expected_response();
        let timer = Timer::start(names::QUERY_RTT_MS);
        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(response) if response.code() == expected => return Ok(response),
                    Ok(other) => tracing::trace!(
                        "ignoring 0x{:02X} while waiting for 0x{:02X}",
                        other.code(),
                        expected
                    ),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "response channel lagged")
                    }
                    Err(RecvError::Closed) => return Err(BleError::StreamClosed),
                }
            }
        };

        match tokio::time::timeout(self.settings.response_timeout, wait).await {
            Ok(Ok(response)) => {
                timer.stop();
                Ok(response)
            }
            Ok(Err(err)) => {
                timer.cancel();
                Err(err)
            }
            Err(_) => {
                timer.cancel();
                metrics().increment(names::QUERY_TIMEOUTS);
                Err(BleError::Timeout {
                    what: format!("response 0x{:02X} to {:?}", expected, query),
                    after: self.settings.response_timeout,
                })
            }
        }
    }

    async fn expect<R>(&self, query: Query, extract: impl FnOnce(Response) -> Option<R>) -> Result<R> {
        let response = self.query(query).await?;
        let actual = response.code();
        extract(response).ok_or(BleError::UnexpectedResponse {
            expected: query.expected_response(),
            actual,
        })
    }

    pub async fn read_pressure_temperature(&self) -> Result<PressureTemperature> {
        self.expect(Query::PressureTemperature, |r| match r {
            Response::PressureTemperature(v) => Some(v),
            _ => None,
        })
        .await
    }

    pub async fn read_humidity_temperature(&self) -> Result<HumidityTemperature> {
        self.expect(Query::HumidityTemperature, |r| match r {
            Response::HumidityTemperature(v) => Some(v),
            _ => None,
        })
        .await
    }

    pub async fn read_coefficients(&self, channel: Channel) -> Result<Coefficients> {
        self.expect(Query::Coefficients(channel), |r| match r {
            Response::Coefficients { coefficients, .. } => Some(coefficients),
            _ => None,
        })
        .await
    }

    pub async fn write_coefficients(&self, channel: Channel, coefficients: Coefficients) -> Result<()> {
        tracing::info!(%channel, a = coefficients.a, b = coefficients.b, "writing coefficients");
        self.send(Request::SetCoefficients {
            channel,
            coefficients,
        })
        .await
    }

    /// Measurement period in milliseconds
    pub async fn read_measurement_period(&self) -> Result<u32> {
        self.expect(Query::MeasurementPeriod, |r| match r {
            Response::MeasurementPeriod { period_ms } => Some(period_ms),
            _ => None,
        })
        .await
    }

    pub async fn write_measurement_period(&self, period_ms: u32) -> Result<()> {
        tracing::info!(period_ms, "writing measurement period");
        self.send(Request::SetMeasurementPeriod { period_ms }).await
    }

    /// Station clock as a unix timestamp
    pub async fn read_datetime(&self) -> Result<u32> {
        self.expect(Query::DateTime, |r| match r {
            Response::DateTime { timestamp } => Some(timestamp),
            _ => None,
        })
        .await
    }

    /// Set the station clock to `now`; returns the timestamp written.
    pub async fn sync_datetime(&self, now: DateTime<Utc>) -> Result<u32> {
        let timestamp =
            u32::try_from(now.timestamp()).map_err(|_| BleError::InvalidTimestamp(now.timestamp()))?;
        tracing::info!(timestamp, "setting station clock");
        self.send(Request::SetDateTime { timestamp }).await?;
        Ok(timestamp)
    }

    pub async fn read_device_info(&self) -> Result<DeviceInfo> {
        self.expect(Query::DeviceInfo, |r| match r {
            Response::DeviceInfo(info) => Some(info),
            _ => None,
        })
        .await
    }

    pub async fn write_device_info(&self, info: DeviceInfo) -> Result<()> {
        tracing::info!(serial = info.serial_number, "writing device info");
        self.send(Request::SetDeviceInfo { info }).await
    }

    pub async fn read_firmware_version(&self) -> Result<FirmwareVersion> {
        self.expect(Query::FirmwareVersion, |r| match r {
            Response::FirmwareVersion { version } => Some(version),
            _ => None,
        })
        .await
    }

    /// Both hardware identifiers
    pub async fn read_device_ids(&self) -> Result<(DeviceId, DeviceId)> {
        let first = self
            .expect(Query::DeviceId1, |r| match r {
                Response::DeviceId1(id) => Some(id),
                _ => None,
            })
            .await?;
        let second = self
            .expect(Query::DeviceId2, |r| match r {
                Response::DeviceId2(id) => Some(id),
                _ => None,
            })
            .await?;
        Ok((first, second))
    }

    pub async fn read_device_status(&self) -> Result<Vec<u8>> {
        self.expect(Query::DeviceStatus, |r| match r {
            Response::DeviceStatus { payload } => Some(payload),
            _ => None,
        })
        .await
    }

    /// Number of records stored in the log
    pub async fn read_log_size(&self) -> Result<u32> {
        let records = self
            .expect(Query::LogSize, |r| match r {
                Response::LogSize { records } => Some(records),
                _ => None,
            })
            .await?;
        metrics().gauge(names::LOG_SIZE, i64::from(records));
        Ok(records)
    }

    pub async fn read_log_params(&self) -> Result<Vec<u8>> {
        self.expect(Query::LogParams, |r| match r {
            Response::LogParams { payload } => Some(payload),
            _ => None,
        })
        .await
    }

    pub async fn write_log_params(&self, payload: RawPayload) -> Result<()> {
        self.send(Request::SetLogParams { payload }).await
    }

    pub async fn pause_log(&self) -> Result<()> {
        self.send(LogControl::Pause).await
    }

    pub async fn resume_log(&self) -> Result<()> {
        self.send(LogControl::Resume).await
    }

    pub async fn stop_log(&self) -> Result<()> {
        self.send(LogControl::Stop).await
    }

    /// Erase the station's log
    pub async fn reset_log(&self) -> Result<()> {
        tracing::warn!("erasing station log");
        self.send(LogControl::Reset).await
    }

    /// Read the values the station reports after connecting.
    pub async fn snapshot(&self) -> Result<StationSnapshot> {
        if !self.transport.is_connected().await {
            return Err(BleError::NotConnected);
        }
        Ok(StationSnapshot {
            firmware: optional("firmware version", self.read_firmware_version().await),
            device_info: optional("device info", self.read_device_info().await),
            period_ms: optional("measurement period", self.read_measurement_period().await),
            pressure_temperature: optional("pressure", self.read_pressure_temperature().await),
            humidity_temperature: optional("humidity", self.read_humidity_temperature().await),
        })
    }

    /// Stream the whole log, calling `progress` for each reassembled entry.
    ///
    /// Ends on the station's completion frame, or after the idle timeout
    /// with whatever arrived.
    pub async fn download_log<F: FnMut(&LogEntry)>(&self, mut progress: F) -> Result<LogDownload> {
        let _exchange = self.exchange.lock().await;
        let mut rx = self.responses.resubscribe();
        self.send(LogControl::Start).await?;

        let idle = self.settings.log_idle_timeout;
        let mut assembler = LogAssembler::new();
        let mut download = LogDownload::default();

        loop {
            let response = match tokio::time::timeout(idle, rx.recv()).await {
                Ok(Ok(response)) => response,
                Ok(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "log frames dropped");
                    download.dropped_frames += skipped;
                    continue;
                }
                Ok(Err(RecvError::Closed)) => {
                    tracing::warn!("link closed during log transfer");
                    break;
                }
                Err(_) => {
                    tracing::warn!(?idle, received = download.entries.len(), "log transfer went idle");
                    break;
                }
            };
            match response {
                Response::LogRecord { record } => {
                    if let Some(entry) = assembler.push(record) {
                        progress(&entry);
                        download.entries.push(entry);
                    }
                }
                Response::LogComplete => {
                    download.completed = download.dropped_frames == 0;
                    break;
                }
                _ => {}
            }
        }

        if let Some(entry) = assembler.finish() {
            progress(&entry);
            download.entries.push(entry);
        }

        metrics().increment_by(names::LOG_ENTRIES, download.entries.len() as u64);
        metrics().increment_by(names::LOG_INCOMPLETE, download.incomplete() as u64);
        tracing::info!(
            entries = download.entries.len(),
            incomplete = download.incomplete(),
            completed = download.completed,
            dropped = download.dropped_frames,
            "log transfer finished"
        );
        Ok(download)
    }

    /// Disconnect and stop the reader.
    pub async fn close(self) -> Result<()> {
        self.transport.disconnect().await
    }

    /// Disconnect, then hand back `outcome` unchanged.
    ///
    /// Commands run their exchanges first and close through here so the link
    /// is released on error paths too. A failed disconnect is only logged.
    pub async fn finish<R, E>(self, outcome: std::result::Result<R, E>) -> std::result::Result<R, E> {
        if let Err(err) = self.close().await {
            tracing::warn!(error = %err, "disconnect failed");
        }
        outcome
    }
}

impl<T: Transport> Drop for StationSession<T> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn optional<V>(what: &str, result: Result<V>) -> Option<V> {
    result
        .map_err(|err| tracing::warn!(error = %err, "could not read {}", what))
        .ok()
}

async fn read_notifications(mut notifications: NotificationStream, responses: broadcast::Sender<Response>) {
    let mut decoder = FrameDecoder::new();
    while let Some(chunk) = notifications.next().await {
        tracing::trace!(chunk = %hex::encode(&chunk), "notification");
        for frame in decoder.decode(&chunk) {
            match frame {
                Ok(response) => {
                    metrics().increment(names::FRAMES_RECEIVED);
                    tracing::debug!("received 0x{:02X}", response.code());
                    // no subscribers between exchanges
                    let _ = responses.send(response);
                }
                Err(err) => {
                    metrics().increment(names::DECODE_ERRORS);
                    tracing::warn!(error = %err, "dropping malformed frame");
                }
            }
        }
    }
    tracing::debug!("notification stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn frame(code: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![code, payload.len() as u8];
        out.extend_from_slice(payload);
        out
    }

    fn pair_f32(a: f32, b: f32) -> Vec<u8> {
        let mut out = a.to_le_bytes().to_vec();
        out.extend_from_slice(&b.to_le_bytes());
        out
    }

    fn log_frames(record: u16, with_external: bool) -> Vec<u8> {
        let mut out = Vec::new();
        let mut r1 = record.to_le_bytes().to_vec();
        r1.extend_from_slice(&(1_700_000_000 + u32::from(record)).to_le_bytes());
        r1.extend_from_slice(&100.5f32.to_le_bytes());
        out.extend(frame(0xB1, &r1));

        let mut r2 = record.to_le_bytes().to_vec();
        r2.extend(pair_f32(21.0, 40.0));
        out.extend(frame(0xB2, &r2));

        if with_external {
            let mut r3 = record.to_le_bytes().to_vec();
            r3.extend_from_slice(&(-4.0f32).to_le_bytes());
            out.extend(frame(0xB3, &r3));
        }
        out
    }

    /// Simulated station answering every read.
    fn station(request: &[u8]) -> Vec<Vec<u8>> {
        match request[0] {
            0x87 => vec![frame(0x17, &pair_f32(101.3, 22.5))],
            0x88 => vec![frame(0x18, &pair_f32(45.0, 19.0))],
            0x8A => vec![frame(0x1A, &pair_f32(1.5, -0.25))],
            0x15 => vec![frame(0x15, &1000u32.to_le_bytes())],
            0x90 => vec![frame(0x20, &1_700_000_000u32.to_le_bytes())],
            0x91 => vec![frame(0x21, &[1, 0, 0, 0, 0, 0, 0, 0])],
            0x92 => vec![frame(0x22, &[2, 0, 0, 0, 0, 0, 0, 0])],
            0x93 => {
                let mut info = 1_690_000_000u32.to_le_bytes().to_vec();
                info.extend_from_slice(&77u32.to_le_bytes());
                vec![frame(0x23, &info)]
            }
            0x94 => vec![frame(0x24, &0x0102_0304u32.to_le_bytes())],
            0xA0 => vec![frame(0xB0, &3u32.to_le_bytes())],
            0xA1 => {
                // record 2 lacks the external sensor; record 3 arrives split
                let mut burst = log_frames(1, true);
                burst.extend(log_frames(2, false));
                let tail = log_frames(3, true);
                let (head, rest) = tail.split_at(5);
                vec![burst, head.to_vec(), rest.to_vec(), vec![0xB5, 0x00]]
            }
            _ => Vec::new(),
        }
    }

    fn fast() -> SessionSettings {
        SessionSettings {
            response_timeout: Duration::from_millis(200),
            log_idle_timeout: Duration::from_millis(500),
        }
    }

    async fn session(transport: MemoryTransport) -> StationSession<MemoryTransport> {
        StationSession::new(transport, fast()).await.unwrap()
    }

    #[tokio::test]
    async fn test_typed_reads() {
        let session = session(MemoryTransport::new(station)).await;

        let pt = session.read_pressure_temperature().await.unwrap();
        assert_eq!(pt.pressure, 101.3);
        assert_eq!(pt.temperature, 22.5);

        let coeffs = session.read_coefficients(Channel::Humidity).await.unwrap();
        assert_eq!(coeffs, Coefficients::new(1.5, -0.25));

        assert_eq!(session.read_measurement_period().await.unwrap(), 1000);
        assert_eq!(session.read_log_size().await.unwrap(), 3);

        let (id1, id2) = session.read_device_ids().await.unwrap();
        assert_eq!((id1.value(), id2.value()), (1, 2));

        assert_eq!(
            session.transport().written()[..2],
            [vec![0x87, 0x00], vec![0x8A, 0x00]]
        );
    }

    #[tokio::test]
    async fn test_snapshot_collects_everything() {
        let session = session(MemoryTransport::new(station)).await;
        let snapshot = session.snapshot().await.unwrap();

        assert_eq!(snapshot.firmware.unwrap().to_string(), "v1.2.3.4");
        assert_eq!(snapshot.device_info.unwrap().serial_number, 77);
        assert_eq!(snapshot.period_ms, Some(1000));
        assert_eq!(snapshot.humidity_temperature.unwrap().humidity, 45.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_tolerates_missing_answers() {
        let session = session(MemoryTransport::new(|request| match request[0] {
            0x94 => vec![frame(0x24, &0x0100_0000u32.to_le_bytes())],
            _ => Vec::new(),
        }))
        .await;

        let snapshot = session.snapshot().await.unwrap();
        assert_eq!(snapshot.firmware.unwrap().to_string(), "v1.0.0.0");
        assert!(snapshot.device_info.is_none());
        assert!(snapshot.pressure_temperature.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_times_out() {
        let session = session(MemoryTransport::silent()).await;
        let err = assert_err!(session.read_datetime().await);
        assert!(matches!(err, BleError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_unrelated_and_malformed_frames_are_skipped() {
        let session = session(MemoryTransport::new(|request| match request[0] {
            0x87 => vec![
                frame(0x18, &pair_f32(50.0, 10.0)),
                vec![0x17, 0x02, 0x00, 0x00],
                frame(0x17, &pair_f32(99.0, 1.0)),
            ],
            _ => Vec::new(),
        }))
        .await;

        let pt = assert_ok!(session.read_pressure_temperature().await);
        assert_eq!(pt.pressure, 99.0);
    }

    #[tokio::test]
    async fn test_setters_write_frames() {
        let session = session(MemoryTransport::silent()).await;

        session
            .write_coefficients(Channel::Pressure, Coefficients::new(1.0, 0.0))
            .await
            .unwrap();
        session.write_measurement_period(5000).await.unwrap();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(session.sync_datetime(now).await.unwrap(), 1_700_000_000);
        session.reset_log().await.unwrap();

        let written = session.transport().written();
        assert_eq!(written[0][..2], [0x54, 8]);
        assert_eq!(written[1], vec![0x55, 4, 0x88, 0x13, 0, 0]);
        assert_eq!(written[2], vec![0x60, 4, 0x00, 0xF1, 0x53, 0x65]);
        assert_eq!(written[3], vec![0xA5, 0]);
    }

    #[tokio::test]
    async fn test_send_after_disconnect_fails() {
        let session = session(MemoryTransport::new(station)).await;
        session.transport().disconnect().await.unwrap();

        assert!(matches!(session.pause_log().await, Err(BleError::NotConnected)));
        assert!(matches!(session.snapshot().await, Err(BleError::NotConnected)));
    }

    #[tokio::test]
    async fn test_download_log() {
        let session = session(MemoryTransport::new(station)).await;

        let mut seen = Vec::new();
        let download = session.download_log(|entry| seen.push(entry.record)).await.unwrap();

        assert!(download.completed);
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(download.entries.len(), 3);
        assert_eq!(download.incomplete(), 1);
        assert_eq!(download.entries[1].temperature_ext, None);
        assert_eq!(download.entries[2].pressure, Some(100.5));
        assert_eq!(download.to_csv().lines().count(), 4);
        assert_eq!(session.transport().written(), vec![vec![0xA1, 0x00]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_log_stops_when_idle() {
        let session = session(MemoryTransport::new(|request| match request[0] {
            0xA1 => vec![log_frames(9, false)],
            _ => Vec::new(),
        }))
        .await;

        let download = session.download_log(|_| {}).await.unwrap();
        assert!(!download.completed);
        assert_eq!(download.entries.len(), 1);
        assert_eq!(download.entries[0].record, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_log_counts_dropped_frames() {
        let session = session(MemoryTransport::new(|request| match request[0] {
            0xA1 => {
                // one chunk with more frames than the response channel holds
                let mut burst = log_frames(1, true);
                for _ in 0..RESPONSE_CHANNEL_CAPACITY + 76 {
                    burst.extend(frame(0xB0, &7u32.to_le_bytes()));
                }
                burst.extend([0xB5, 0x00]);
                vec![burst]
            }
            _ => Vec::new(),
        }))
        .await;

        let download = session.download_log(|_| {}).await.unwrap();
        assert!(download.dropped_frames > 0);
        assert!(!download.completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_disconnects_after_failed_query() {
        let transport = Arc::new(MemoryTransport::silent());
        let session = StationSession::new(Arc::clone(&transport), fast()).await.unwrap();

        let period = session.read_measurement_period().await;
        let period = session.finish(period).await;

        assert!(matches!(period, Err(BleError::Timeout { .. })));
        assert!(!transport.is_connected().await);
    }

    #[tokio::test]
    async fn test_finish_keeps_successful_outcome() {
        let transport = Arc::new(MemoryTransport::new(station));
        let session = StationSession::new(Arc::clone(&transport), fast()).await.unwrap();

        let period = session.read_measurement_period().await;
        assert_eq!(session.finish(period).await.unwrap(), 1000);
        assert!(!transport.is_connected().await);
    }

    #[tokio::test]
    async fn test_subscribe_sees_unsolicited_frames() {
        let session = session(MemoryTransport::silent()).await;
        let mut rx = session.subscribe();

        session.transport().notify(vec![0xB5, 0x00]);
        assert_eq!(rx.recv().await.unwrap(), Response::LogComplete);
    }
}
