//! Tick loop orchestrating the sensor fleet.

use std::time::Duration;

use futures::future::join_all;
use icewatch_client::{ConnectError, PublishError, PublishSession, SessionState, Transport};
use icewatch_core::{RunConfig, SafetyStatus, Sensor, SensorConfig};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::RunError;

/// Outcome summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Ticks executed with at least one active sensor.
    pub ticks: u64,
    /// Readings accepted by the endpoint.
    pub published: u64,
    /// Publishes skipped on transient failures.
    pub skipped: u64,
    /// Sensors that never joined the run.
    pub connect_failures: Vec<ConnectError>,
    /// Sensors excluded mid-run by fatal publish failures.
    pub failed_sensors: Vec<String>,
    /// Whether the run ended on external cancellation.
    pub cancelled: bool,
}

/// One sensor's scheduling slot: its state plus its session. Slots own
/// disjoint state, so per-tick fan-out borrows them independently and
/// needs no locks.
struct Slot<T: Transport> {
    sensor: Sensor,
    session: PublishSession<T>,
}

enum TickOutcome {
    Published,
    Skipped,
    Failed,
}

impl<T: Transport> Slot<T> {
    fn new(config: &SensorConfig, transport: T) -> Self {
        Self {
            sensor: Sensor::new(config.device_id.as_str(), config.location.as_str()),
            session: PublishSession::new(
                config.device_id.as_str(),
                config.location.as_str(),
                config.credential.clone(),
                transport,
            ),
        }
    }

    /// Produce, classify, and publish one reading.
    async fn tick(&mut self) -> TickOutcome {
        let reading = self.sensor.next_reading();
        let status = SafetyStatus::classify(reading.ice_thickness, reading.surface_temp);

        // Operator display line; the status itself is never transmitted.
        tracing::info!(
            "{status:7} | {:15} | ice {:6.2}cm | surface {:6.2}C | snow {:5.2}cm | external {:6.2}C",
            self.sensor.location(),
            reading.ice_thickness,
            reading.surface_temp,
            reading.snow_accumulation,
            reading.external_temp,
        );

        // The session logs failures with sensor identity and cause.
        match self.session.publish(&reading).await {
            Ok(()) => TickOutcome::Published,
            Err(PublishError::Transient { .. }) => TickOutcome::Skipped,
            Err(PublishError::Fatal { .. } | PublishError::NotConnected { .. }) => {
                TickOutcome::Failed
            },
        }
    }
}

/// Run the simulation: connect all sensors concurrently, tick on a fixed
/// drift-correcting interval, and close every session on the way out.
///
/// Per-sensor failures are isolated: a failed connect excludes that sensor
/// only, transient publish failures skip a tick, fatal ones retire the
/// slot. The run itself only fails if no sensor connects at startup.
///
/// Cancelling `cancel` stops scheduling new ticks, lets in-flight
/// publishes settle for [`RunConfig::cancel_grace`], then abandons them.
/// The close path runs on every exit route.
///
/// # Errors
///
/// - [`RunError::NoSensorsConfigured`] on an empty sensor list
/// - [`RunError::NoSensorsConnected`] when every connect fails
pub async fn run<T, F>(
    sensors: &[SensorConfig],
    config: &RunConfig,
    cancel: CancellationToken,
    mut make_transport: F,
) -> Result<RunReport, RunError>
where
    T: Transport,
    F: FnMut(&SensorConfig) -> T,
{
    if sensors.is_empty() {
        return Err(RunError::NoSensorsConfigured);
    }

    let mut slots: Vec<Slot<T>> =
        sensors.iter().map(|cfg| Slot::new(cfg, make_transport(cfg))).collect();

    // Concurrent connect fan-out. Failures are isolated: the session logs
    // them and the slot is excluded below. Cancellation during startup
    // abandons the in-flight connects and tears the sessions down.
    let results = {
        let connect_all = join_all(slots.iter_mut().map(|slot| slot.session.connect()));
        tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            results = connect_all => Some(results),
        }
    };
    let Some(results) = results else {
        tracing::info!("cancelled during startup");
        join_all(slots.iter_mut().map(|slot| slot.session.close())).await;
        return Ok(RunReport { cancelled: true, ..RunReport::default() });
    };
    let connect_failures: Vec<ConnectError> =
        results.into_iter().filter_map(Result::err).collect();

    let mut active: Vec<Slot<T>> = slots
        .into_iter()
        .filter(|slot| slot.session.state() == SessionState::Connected)
        .collect();

    if active.is_empty() {
        return Err(RunError::NoSensorsConnected(connect_failures));
    }
    if !connect_failures.is_empty() {
        tracing::warn!(
            "partial startup: {} of {} sensors connected",
            active.len(),
            sensors.len(),
        );
    }

    let mut report = RunReport { connect_failures, ..RunReport::default() };
    let deadline = config.duration.map(|d| Instant::now() + d);

    // Period measured from the start of the previous tick's processing; an
    // overrunning tick makes the next one fire immediately instead of
    // stacking delays. Ticks never overlap because the loop awaits the
    // fan-out before asking for the next one.
    let mut interval = tokio::time::interval(config.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                report.cancelled = true;
                break;
            },
            () = wait_deadline(deadline) => break,
            _ = interval.tick() => {},
        }

        if active.is_empty() {
            // A bounded run keeps idling after the last sensor fails so a
            // fatal publish never turns into a crash; an unbounded run
            // with nothing left to publish exits instead.
            if deadline.is_none() {
                tracing::warn!("no sensors remain connected, stopping unbounded run");
                break;
            }
            continue;
        }

        report.ticks += 1;

        let outcomes = tokio::select! {
            outcomes = tick_all(&mut active) => Some(outcomes),
            () = cancelled_after(&cancel, config.cancel_grace) => None,
        };

        let Some(outcomes) = outcomes else {
            tracing::warn!("cancelled mid-tick; abandoning in-flight publishes");
            report.cancelled = true;
            break;
        };

        for outcome in outcomes {
            match outcome {
                TickOutcome::Published => report.published += 1,
                TickOutcome::Skipped => report.skipped += 1,
                TickOutcome::Failed => {},
            }
        }

        let (still_active, failed): (Vec<_>, Vec<_>) = active
            .into_iter()
            .partition(|slot| slot.session.state() == SessionState::Connected);
        active = still_active;
        for slot in failed {
            tracing::warn!(
                "sensor {} excluded from remaining ticks",
                slot.session.device_id(),
            );
            report.failed_sensors.push(slot.session.device_id().to_string());
        }
    }

    // Cleanup runs on every exit path. close() is idempotent and a no-op
    // on failed sessions.
    join_all(active.iter_mut().map(|slot| slot.session.close())).await;

    Ok(report)
}

/// All active slots publish concurrently; the tick completes once every
/// publish has settled. No cross-sensor ordering within a tick.
async fn tick_all<T: Transport>(active: &mut [Slot<T>]) -> Vec<TickOutcome> {
    join_all(active.iter_mut().map(Slot::tick)).await
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn cancelled_after(cancel: &CancellationToken, grace: Duration) {
    cancel.cancelled().await;
    tokio::time::sleep(grace).await;
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use icewatch_client::TransportError;
    use icewatch_core::Credential;

    use super::*;

    /// Scripted in-memory transport; the wire-level double lives in
    /// `icewatch-harness`.
    #[derive(Clone)]
    struct MockTransport {
        accept_connect: bool,
        connect_delay: Duration,
        send_delay: Duration,
        script: Arc<Mutex<VecDeque<Result<(), TransportError>>>>,
        closes: Arc<AtomicUsize>,
    }

    impl MockTransport {
        fn accepting(closes: &Arc<AtomicUsize>) -> Self {
            Self::scripted(closes, vec![])
        }

        fn scripted(
            closes: &Arc<AtomicUsize>,
            script: Vec<Result<(), TransportError>>,
        ) -> Self {
            Self {
                accept_connect: true,
                connect_delay: Duration::ZERO,
                send_delay: Duration::ZERO,
                script: Arc::new(Mutex::new(script.into())),
                closes: Arc::clone(closes),
            }
        }

        fn refusing(closes: &Arc<AtomicUsize>) -> Self {
            Self { accept_connect: false, ..Self::accepting(closes) }
        }

        fn slow_send(closes: &Arc<AtomicUsize>, send_delay: Duration) -> Self {
            Self { send_delay, ..Self::accepting(closes) }
        }

        fn slow_connect(closes: &Arc<AtomicUsize>, connect_delay: Duration) -> Self {
            Self { connect_delay, ..Self::accepting(closes) }
        }
    }

    impl Transport for MockTransport {
        async fn connect(&mut self, _credential: &Credential) -> Result<(), TransportError> {
            tokio::time::sleep(self.connect_delay).await;
            if self.accept_connect {
                Ok(())
            } else {
                Err(TransportError::Refused("scripted".to_string()))
            }
        }

        async fn send(&mut self, _payload: &[u8]) -> Result<(), TransportError> {
            tokio::time::sleep(self.send_delay).await;
            let next = {
                let mut script = self.script.lock().unwrap();
                script.pop_front()
            };
            next.unwrap_or(Ok(()))
        }

        async fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sensor_config(key: &str) -> SensorConfig {
        SensorConfig {
            key: key.to_string(),
            device_id: format!("{key}-sensor"),
            location: key.to_string(),
            credential: Credential {
                host: "127.0.0.1:1".to_string(),
                device_id: format!("{key}-sensor"),
                shared_access_key: "k".to_string(),
            },
        }
    }

    fn run_config(duration: Option<Duration>) -> RunConfig {
        RunConfig {
            tick_interval: Duration::from_secs(10),
            duration,
            cancel_grace: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_ticks_three_sensors_publish_six_readings() {
        let sensors: Vec<_> =
            ["dows-lake", "fifth-avenue", "nac"].map(sensor_config).into_iter().collect();
        let closes = Arc::new(AtomicUsize::new(0));

        // 15s covers the immediate tick at t=0 and the tick at t=10.
        let report = run(
            &sensors,
            &run_config(Some(Duration::from_secs(15))),
            CancellationToken::new(),
            |_| MockTransport::accepting(&closes),
        )
        .await
        .unwrap();

        assert_eq!(report.ticks, 2);
        assert_eq!(report.published, 6);
        assert_eq!(report.skipped, 0);
        assert!(report.failed_sensors.is_empty());
        assert!(!report.cancelled);
        assert_eq!(closes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_excludes_only_that_sensor() {
        let sensors = vec![sensor_config("dows-lake"), sensor_config("nac")];
        let closes = Arc::new(AtomicUsize::new(0));

        let report = run(
            &sensors,
            &run_config(Some(Duration::from_secs(15))),
            CancellationToken::new(),
            |cfg| {
                if cfg.key == "nac" {
                    MockTransport::refusing(&closes)
                } else {
                    MockTransport::accepting(&closes)
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(report.connect_failures.len(), 1);
        assert_eq!(report.connect_failures[0].sensor, "nac-sensor");
        // The surviving sensor still publishes on every tick.
        assert_eq!(report.published, 2);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn all_connects_failing_is_a_fatal_startup_condition() {
        let sensors = vec![sensor_config("dows-lake"), sensor_config("nac")];
        let closes = Arc::new(AtomicUsize::new(0));

        let err = run(
            &sensors,
            &run_config(Some(Duration::from_secs(15))),
            CancellationToken::new(),
            |_| MockTransport::refusing(&closes),
        )
        .await
        .unwrap_err();

        match err {
            RunError::NoSensorsConnected(failures) => assert_eq!(failures.len(), 2),
            other => unreachable!("unexpected error {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_fleet_is_rejected() {
        let closes = Arc::new(AtomicUsize::new(0));
        let err = run(
            &[],
            &run_config(None),
            CancellationToken::new(),
            |_| MockTransport::accepting(&closes),
        )
        .await
        .unwrap_err();

        assert_eq!(err, RunError::NoSensorsConfigured);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_skips_one_tick_only() {
        let sensors = vec![sensor_config("dows-lake")];
        let closes = Arc::new(AtomicUsize::new(0));

        let report = run(
            &sensors,
            &run_config(Some(Duration::from_secs(15))),
            CancellationToken::new(),
            |_| MockTransport::scripted(&closes, vec![Err(TransportError::Throttled)]),
        )
        .await
        .unwrap();

        assert_eq!(report.ticks, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.published, 1);
        assert!(report.failed_sensors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_failure_retires_the_sensor_and_the_run_survives() {
        let sensors = vec![sensor_config("dows-lake")];
        let closes = Arc::new(AtomicUsize::new(0));

        // Sole sensor dies on the first tick; the bounded run idles out
        // the remaining duration with zero active sensors.
        let report = run(
            &sensors,
            &run_config(Some(Duration::from_secs(25))),
            CancellationToken::new(),
            |_| MockTransport::scripted(&closes, vec![Err(TransportError::Unauthorized)]),
        )
        .await
        .unwrap();

        assert_eq!(report.ticks, 1);
        assert_eq!(report.published, 0);
        assert_eq!(report.failed_sensors, vec!["dows-lake-sensor".to_string()]);
        // Failed sessions are not closed again.
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_run_stops_when_no_sensors_remain() {
        let sensors = vec![sensor_config("dows-lake")];
        let closes = Arc::new(AtomicUsize::new(0));

        let report = run(
            &sensors,
            &run_config(None),
            CancellationToken::new(),
            |_| MockTransport::scripted(&closes, vec![Err(TransportError::ConnectionLost(
                "reset".to_string(),
            ))]),
        )
        .await
        .unwrap();

        assert_eq!(report.failed_sensors.len(), 1);
        assert!(!report.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_closes_every_session_exactly_once() {
        let sensors: Vec<_> =
            ["dows-lake", "fifth-avenue", "nac"].map(sensor_config).into_iter().collect();
        let closes = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let handle = {
            let closes = Arc::clone(&closes);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                run(&sensors, &run_config(None), cancel, |_| {
                    MockTransport::accepting(&closes)
                })
                .await
            })
        };

        // Let the first tick land, then interrupt the run.
        tokio::time::sleep(Duration::from_millis(5)).await;
        cancel.cancel();

        let report = handle.await.unwrap().unwrap();
        assert!(report.cancelled);
        assert_eq!(report.published, 3);
        assert_eq!(closes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn overrunning_ticks_fire_immediately_instead_of_stacking_delays() {
        let sensors = vec![sensor_config("dows-lake")];
        let closes = Arc::new(AtomicUsize::new(0));

        // Each publish takes 15s against a 10s interval. The next tick
        // fires as soon as the overrunning one settles, so a 40s run
        // ticks at t=0, t=15, and t=30. A schedule that slept a full
        // interval between ticks would only manage two.
        let report = run(
            &sensors,
            &run_config(Some(Duration::from_secs(40))),
            CancellationToken::new(),
            |_| MockTransport::slow_send(&closes, Duration::from_secs(15)),
        )
        .await
        .unwrap();

        assert_eq!(report.ticks, 3);
        assert_eq!(report.published, 3);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_stuck_publishes_after_the_grace_period() {
        let sensors: Vec<_> =
            ["dows-lake", "fifth-avenue", "nac"].map(sensor_config).into_iter().collect();
        let closes = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        // Publishes hang for an hour; the run must still return within
        // the 5s grace once cancelled.
        let handle = {
            let closes = Arc::clone(&closes);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                run(&sensors, &run_config(Some(Duration::from_secs(3600))), cancel, |_| {
                    MockTransport::slow_send(&closes, Duration::from_secs(3600))
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(1)).await;
        let cancelled_at = tokio::time::Instant::now();
        cancel.cancel();

        let report = handle.await.unwrap().unwrap();
        assert!(report.cancelled);
        assert_eq!(report.ticks, 1);
        assert_eq!(report.published, 0);
        assert!(cancelled_at.elapsed() < Duration::from_secs(10));
        // The abandoned sessions are still torn down exactly once.
        assert_eq!(closes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_connect_aborts_startup() {
        let sensors: Vec<_> =
            ["dows-lake", "fifth-avenue", "nac"].map(sensor_config).into_iter().collect();
        let closes = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let handle = {
            let closes = Arc::clone(&closes);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                run(&sensors, &run_config(None), cancel, |_| {
                    MockTransport::slow_connect(&closes, Duration::from_secs(3600))
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(1)).await;
        let cancelled_at = tokio::time::Instant::now();
        cancel.cancel();

        let report = handle.await.unwrap().unwrap();
        assert!(report.cancelled);
        assert_eq!(report.ticks, 0);
        assert_eq!(report.published, 0);
        assert!(cancelled_at.elapsed() < Duration::from_secs(10));
        assert_eq!(closes.load(Ordering::SeqCst), 3);
    }
}
