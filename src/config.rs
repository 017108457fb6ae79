//! Construction-time configuration for the cycle controller.

/// Node configuration, supplied once at construction.
///
/// Defaults match the reference deployment: an Oregon Scientific THGN801
/// class id transmitting every 3 minutes on channel 1 with a 200 ms
/// execution budget per wakeup.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Oregon Scientific model id (selects the v2.1 or v3.0 frame layout).
    pub device_id: u16,
    /// Transmit channel, 1..=3.
    pub channel: u8,
    /// House code distinguishing transmitters of the same model.
    pub rolling_code: u8,
    /// Wakeup period in milliseconds.
    pub transmit_period_ms: u32,
    /// Watchdog budget from wakeup to end of transmission, in milliseconds.
    pub execution_timeout_ms: u32,
    /// Moving-average window for temperature and humidity smoothing.
    pub smoothing_window: usize,
    /// Readiness polls granted to a pending acquisition before it counts as
    /// a miss (one poll per bus round trip, ~1 ms each).
    pub acquisition_poll_budget: u32,
    /// Supply voltage band flagged as low battery: `min <= v < max`.
    /// Values outside the band are deliberately not flagged.
    pub low_battery_min_volts: f32,
    pub low_battery_max_volts: f32,
    /// Correction added to the internal temperature proxy; the MCU reads low
    /// immediately after standby.
    pub chip_temp_offset: f32,
    /// Minimum temperature change that qualifies a display refresh.
    pub display_temp_delta: f32,
    /// Minimum humidity change that qualifies a display refresh.
    pub display_humidity_delta: f32,
    /// Minimum spacing between display refreshes in milliseconds.
    pub display_min_interval_ms: u64,
    /// Every Nth qualifying refresh redraws the whole panel.
    pub display_full_refresh_every: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device_id: 0xF824,
            channel: 1,
            rolling_code: 0x12,
            transmit_period_ms: 3 * 60 * 1000,
            execution_timeout_ms: 200,
            smoothing_window: 4,
            acquisition_poll_budget: 20,
            low_battery_min_volts: 2.55,
            low_battery_max_volts: 3.40,
            chip_temp_offset: 1.3,
            display_temp_delta: 0.5,
            display_humidity_delta: 3.0,
            display_min_interval_ms: 180_000,
            display_full_refresh_every: 6,
        }
    }
}
