//! Capability traits for the platform collaborators the core drives.
//!
//! The platform crate owns the real peripherals (RTC, Si4432-class
//! transceiver, SHT2x-class sensor, e-paper panel, ADC) and implements these
//! traits on top of its drivers. Presence of the radio, sensor and display is
//! a runtime property: the controller holds them as `Option` handles and
//! skips absent peripherals, so a failed init at startup degrades the node
//! instead of crashing it.
//!
//! All completion reporting is asynchronous: a handle call starts an
//! operation, the platform delivers the matching interrupt later as a
//! [`crate::controller::Event`]. None of these methods may block on hardware
//! completion.

use thiserror_no_std::Error;

/// Millisecond timekeeping plus the two timers the cycle needs: the periodic
/// wakeup and the one-shot watchdog deadline.
pub trait Clock {
    /// Milliseconds elapsed since an arbitrary epoch (e.g. boot).
    fn now_ms(&self) -> u64;

    /// Start the periodic wakeup. Each expiry must be delivered as
    /// [`crate::controller::Event::TimerFire`].
    fn start_periodic(&mut self, period_ms: u32);

    /// Arm the one-shot watchdog. Expiry must be delivered as
    /// [`crate::controller::Event::WatchdogExpired`]. Re-arming replaces a
    /// pending deadline.
    fn start_watchdog(&mut self, timeout_ms: u32);

    /// Cancel a pending watchdog deadline, if any.
    fn cancel_watchdog(&mut self);
}

/// Transmit-only radio transceiver.
///
/// Power-up completion is signaled as
/// [`crate::controller::Event::RadioReady`], transmission completion as
/// [`crate::controller::Event::PacketSent`].
pub trait Radio {
    /// Begin powering up the transceiver. Asynchronous.
    fn power_up(&mut self);

    /// Shut the transceiver down. Safe to call when already off.
    fn power_down(&mut self);

    /// Configure modulation/rate for the upcoming transmission.
    fn prepare_transmit(&mut self);

    /// Start transmitting the frame. Asynchronous.
    fn transmit(&mut self, frame: &[u8]);
}

/// One combined temperature/humidity reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature: f32,
    pub humidity: f32,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("sensor not connected")]
    NotConnected,
    #[error("acquisition not complete")]
    NotReady,
    #[error("sensor read failed: {details}")]
    ReadFailed { details: &'static str },
}

/// Humidity/temperature sensor with a non-blocking acquisition cycle.
pub trait ThSensor {
    /// Probe the sensor on its bus.
    fn is_connected(&mut self) -> bool;

    /// Start a combined acquisition. Returns immediately; poll
    /// [`is_ready`](ThSensor::is_ready) for completion.
    fn start_acquisition(&mut self) -> Result<(), SensorError>;

    /// True once the pending acquisition has completed.
    fn is_ready(&mut self) -> bool;

    /// Fetch the completed acquisition result.
    fn read(&mut self) -> Result<Reading, SensorError>;

    /// Release the sensor bus before the node powers down.
    fn release(&mut self);
}

/// Redraw scope for a display refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// Update only the regions that changed. Cheap, accumulates ghosting.
    Partial,
    /// Redraw the whole panel, clearing accumulated ghosting.
    Full,
}

/// Low-rate status display (e-paper class).
pub trait Display {
    /// Bring the panel out of reset, once at startup.
    fn init(&mut self);

    /// Draw the reading into the fixed layout without refreshing the panel.
    fn draw_reading(&mut self, temperature: f32, humidity: f32);

    /// Push the drawn content to the panel.
    fn refresh(&mut self, kind: RefreshKind);

    /// Put the panel into its low-power state.
    fn sleep(&mut self);

    /// True while the panel is in its low-power state.
    fn is_asleep(&self) -> bool;
}

/// Synchronous analog sampling.
pub trait Adc {
    /// Supply voltage in volts.
    fn read_supply_voltage(&mut self) -> f32;

    /// Internal MCU temperature proxy in degrees Celsius, used when no
    /// external sensor is present.
    fn read_chip_temperature(&mut self) -> f32;
}

/// MCU sleep depth requested at the end of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepMode {
    /// Core halted, timers and pending radio interrupts still live.
    Idle,
    /// Lowest available mode until the next periodic wakeup.
    Standby,
}

/// Power/indicator control of the platform itself.
pub trait Power {
    /// Drive the activity indicator output (LED).
    fn set_indicator(&mut self, on: bool);

    /// Select the sleep mode to enter once the current handler returns.
    fn request_sleep(&mut self, mode: SleepMode);
}
