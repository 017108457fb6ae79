//! Wakeup/transmit/shutdown cycle controller.
//!
//! A single long-lived [`CycleController`] instance owns the collaborator
//! handles and drives one fixed measurement cycle per periodic wakeup:
//! wake, acquire, encode, transmit, optional display refresh, shutdown.
//!
//! The controller is single-threaded and interrupt-driven. The platform
//! forwards each hardware signal as a typed [`Event`] into
//! [`dispatch`](CycleController::dispatch); every handler runs to completion,
//! never blocks on hardware, and re-validates the current state first so
//! spurious or duplicate interrupts are ignored. A one-shot watchdog armed at
//! wakeup forces shutdown if the completion signals never arrive, bounding
//! the powered-on time of every cycle.

use log::{debug, error, warn};
use micromath::F32Ext;

use crate::config::NodeConfig;
use crate::hal::{Adc, Clock, Display, Power, Radio, Reading, RefreshKind, SleepMode, ThSensor};
use crate::measurement::MovingAverage;
use crate::oregon::OregonEncoder;

/// Radio/session state of the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    /// Shut down, waiting for the next periodic wakeup.
    Off,
    /// Wake signaled, radio powering up.
    Enabled,
    /// Radio hardware ready.
    Active,
    /// Radio configured for transmission.
    Ready,
    /// Frame handed to the radio, transmission in flight.
    Transmitting,
}

/// Hardware signals delivered by the platform's interrupt handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Periodic wakeup timer fired.
    TimerFire,
    /// Radio finished powering up.
    RadioReady,
    /// Radio finished transmitting the frame.
    PacketSent,
    /// Watchdog deadline elapsed before the cycle completed.
    WatchdogExpired,
}

/// Last content pushed to the display, used by the refresh policy.
#[derive(Debug, Clone, Copy)]
struct RefreshSnapshot {
    temperature: f32,
    humidity: f32,
    at_ms: u64,
}

/// The measurement/transmit cycle state machine.
///
/// Radio, sensor and display are runtime-optional: a peripheral that failed
/// to initialize is simply passed as `None` and the cycle degrades around it
/// (no transmission, proxy readings, no refreshes) instead of failing.
pub struct CycleController<C, P, A, R, S, D>
where
    C: Clock,
    P: Power,
    A: Adc,
    R: Radio,
    S: ThSensor,
    D: Display,
{
    config: NodeConfig,
    clock: C,
    power: P,
    adc: A,
    radio: Option<R>,
    sensor: Option<S>,
    display: Option<D>,

    encoder: OregonEncoder,
    temperature_avg: MovingAverage,
    humidity_avg: MovingAverage,

    state: RadioState,
    wake_ms: u64,
    supply_voltage: f32,
    temperature: f32,
    humidity: f32,
    last_refresh: Option<RefreshSnapshot>,
    refresh_count: u32,
}

impl<C, P, A, R, S, D> CycleController<C, P, A, R, S, D>
where
    C: Clock,
    P: Power,
    A: Adc,
    R: Radio,
    S: ThSensor,
    D: Display,
{
    pub fn new(
        config: NodeConfig,
        clock: C,
        power: P,
        adc: A,
        radio: Option<R>,
        sensor: Option<S>,
        display: Option<D>,
    ) -> Self {
        let window = config.smoothing_window;
        Self {
            config,
            clock,
            power,
            adc,
            radio,
            sensor,
            display,
            encoder: OregonEncoder::new(),
            temperature_avg: MovingAverage::new(window),
            humidity_avg: MovingAverage::new(window),
            state: RadioState::Off,
            wake_ms: 0,
            supply_voltage: 0.0,
            temperature: 0.0,
            humidity: 0.0,
            last_refresh: None,
            refresh_count: 0,
        }
    }

    /// Initialize the display, start the periodic wakeup and run the
    /// initial cycle immediately.
    pub fn start(&mut self) {
        if let Some(display) = self.display.as_mut() {
            display.init();
        }
        self.clock.start_periodic(self.config.transmit_period_ms);
        self.dispatch(Event::TimerFire);
    }

    /// Deliver one hardware signal to the state machine.
    ///
    /// Handlers run to completion; signals received outside their valid
    /// state are ignored without side effects.
    pub fn dispatch(&mut self, event: Event) {
        debug!("event {:?} in state {:?}", event, self.state);
        match event {
            Event::TimerFire => self.on_timer_fire(),
            Event::RadioReady => self.on_radio_ready(),
            Event::PacketSent => self.on_packet_sent(),
            Event::WatchdogExpired => self.on_watchdog_expired(),
        }
    }

    /// Current session state.
    pub fn state(&self) -> RadioState {
        self.state
    }

    /// Last smoothed temperature in degrees Celsius.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Last smoothed relative humidity in percent.
    pub fn humidity(&self) -> f32 {
        self.humidity
    }

    /// Last sampled supply voltage in volts.
    pub fn supply_voltage(&self) -> f32 {
        self.supply_voltage
    }

    /// True when the last supply voltage sample falls inside the configured
    /// low-battery band. Values outside the band (healthy, or implausible
    /// readings pointing at a measurement fault) are not flagged.
    pub fn low_battery(&self) -> bool {
        self.supply_voltage >= self.config.low_battery_min_volts
            && self.supply_voltage < self.config.low_battery_max_volts
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn power(&self) -> &P {
        &self.power
    }

    pub fn radio(&self) -> Option<&R> {
        self.radio.as_ref()
    }

    pub fn sensor(&self) -> Option<&S> {
        self.sensor.as_ref()
    }

    pub fn display(&self) -> Option<&D> {
        self.display.as_ref()
    }

    /// Periodic wakeup: the only entry point into a cycle.
    fn on_timer_fire(&mut self) {
        if self.state != RadioState::Off {
            warn!("timer fired mid-cycle in state {:?}, ignoring", self.state);
            return;
        }

        self.wake_ms = self.clock.now_ms();
        self.power.set_indicator(true);
        self.clock.start_watchdog(self.config.execution_timeout_ms);
        self.state = RadioState::Enabled;

        // Radio power-up completion arrives later as RadioReady.
        let radio_present = self.radio.is_some();
        if let Some(radio) = self.radio.as_mut() {
            radio.power_up();
        }

        self.supply_voltage = self.adc.read_supply_voltage();

        if let Some(sensor) = self.sensor.as_mut() {
            if sensor.is_connected() {
                if let Err(e) = sensor.start_acquisition() {
                    warn!("acquisition request failed: {}", e);
                }
            } else {
                warn!("sensor not connected");
            }
        }

        if radio_present {
            // Keep timers clocked; the radio-ready interrupt resumes the
            // cycle.
            self.power.request_sleep(SleepMode::Idle);
        } else {
            // Degraded mode: complete the cycle synchronously without a
            // transmission.
            self.acquire_and_update();
            self.maybe_refresh_display();
            self.shutdown();
        }
    }

    /// Radio finished powering up: read, encode, hand off for transmission.
    fn on_radio_ready(&mut self) {
        if self.state != RadioState::Enabled {
            warn!("radio-ready in state {:?}, ignoring", self.state);
            return;
        }
        self.state = RadioState::Active;

        if let Some(radio) = self.radio.as_mut() {
            radio.prepare_transmit();
        }
        self.state = RadioState::Ready;

        self.acquire_and_update();

        let low_battery = self.low_battery();
        let humidity = self.humidity.round() as u8;
        let frame = self.encoder.encode_th(
            self.config.device_id,
            self.config.channel,
            self.config.rolling_code,
            low_battery,
            self.temperature,
            humidity,
        );
        if frame.is_empty() {
            error!("frame encoding failed, skipping transmission");
            self.shutdown();
            return;
        }

        if let Some(radio) = self.radio.as_mut() {
            radio.transmit(frame);
        }
        self.state = RadioState::Transmitting;

        // The refresh does not depend on transmission completion, so it runs
        // concurrently with the in-flight frame.
        self.maybe_refresh_display();
    }

    /// Transmission complete: the one place the watchdog is cancelled.
    fn on_packet_sent(&mut self) {
        if self.state != RadioState::Transmitting {
            warn!("packet-sent in state {:?}, ignoring", self.state);
            return;
        }
        self.clock.cancel_watchdog();
        self.shutdown();
    }

    /// Deadline elapsed: force shutdown regardless of cycle progress.
    fn on_watchdog_expired(&mut self) {
        if self.state == RadioState::Off {
            return;
        }
        warn!(
            "execution budget exceeded in state {:?}, forcing shutdown",
            self.state
        );
        self.shutdown();
    }

    /// Feed the smoother with a fresh reading, or decay the window on a miss
    /// so it keeps forgetting old data at the normal rate.
    fn acquire_and_update(&mut self) {
        match self.try_read() {
            Some(reading) => {
                self.temperature_avg.add(reading.temperature);
                self.humidity_avg.add(reading.humidity);
            }
            None => {
                warn!("acquisition miss, holding last estimate");
                self.temperature_avg.remove_oldest();
                self.humidity_avg.remove_oldest();
            }
        }
        if !self.temperature_avg.is_empty() {
            self.temperature = self.temperature_avg.average(0);
        }
        if !self.humidity_avg.is_empty() {
            self.humidity = self.humidity_avg.average(0);
        }
    }

    fn try_read(&mut self) -> Option<Reading> {
        match self.sensor.as_mut() {
            Some(sensor) => {
                let mut budget = self.config.acquisition_poll_budget;
                while !sensor.is_ready() {
                    if budget == 0 {
                        return None;
                    }
                    budget -= 1;
                }
                match sensor.read() {
                    Ok(reading) => Some(reading),
                    Err(e) => {
                        warn!("sensor read failed: {}", e);
                        None
                    }
                }
            }
            None => {
                // No external sensor: use the internal temperature proxy and
                // report the tens/hundreds of millivolts of the supply rail
                // as a pseudo humidity so the frame stays well-formed.
                let temperature =
                    self.adc.read_chip_temperature() + self.config.chip_temp_offset;
                let scaled = self.supply_voltage * 10.0;
                let humidity = ((scaled - scaled.floor()) * 100.0).round();
                Some(Reading {
                    temperature,
                    humidity,
                })
            }
        }
    }

    /// Refresh the display when the reading moved enough and the panel has
    /// rested long enough. Every Nth qualifying refresh redraws fully to
    /// clear ghosting.
    fn maybe_refresh_display(&mut self) {
        if self.display.is_none() {
            return;
        }
        let now = self.clock.now_ms();
        let due = match &self.last_refresh {
            None => true,
            Some(last) => {
                let changed = (self.temperature - last.temperature).abs()
                    >= self.config.display_temp_delta
                    || (self.humidity - last.humidity).abs()
                        >= self.config.display_humidity_delta;
                changed && now.saturating_sub(last.at_ms) >= self.config.display_min_interval_ms
            }
        };
        if !due {
            return;
        }

        self.refresh_count += 1;
        let kind = if self.refresh_count % self.config.display_full_refresh_every == 0 {
            RefreshKind::Full
        } else {
            RefreshKind::Partial
        };
        if let Some(display) = self.display.as_mut() {
            display.draw_reading(self.temperature, self.humidity);
            display.refresh(kind);
        }
        debug!("display refresh #{} ({:?})", self.refresh_count, kind);
        self.last_refresh = Some(RefreshSnapshot {
            temperature: self.temperature,
            humidity: self.humidity,
            at_ms: now,
        });
    }

    /// Power everything down before standby. Safe to call twice: every
    /// effect tolerates an already-off peripheral.
    fn shutdown(&mut self) {
        if let Some(radio) = self.radio.as_mut() {
            radio.power_down();
        }
        if let Some(display) = self.display.as_mut() {
            if !display.is_asleep() {
                display.sleep();
            }
        }
        if let Some(sensor) = self.sensor.as_mut() {
            sensor.release();
        }
        self.power.set_indicator(false);
        self.state = RadioState::Off;
        self.power.request_sleep(SleepMode::Standby);
        debug!(
            "cycle done in {} ms",
            self.clock.now_ms().saturating_sub(self.wake_ms)
        );
    }
}
