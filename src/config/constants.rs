// src/config/constants.rs
//! System-wide configuration constants

/// Acquisition and session constants
pub mod session {
    pub const DEFAULT_WINDOW_SIZE_SECONDS: usize = 5;
    pub const MAX_WINDOW_SIZE_SECONDS: usize = 60;
    pub const DEFAULT_NUM_PLAYERS: usize = 2;
    pub const MIN_PLAYERS: usize = 1;
    pub const MAX_PLAYERS: usize = 4;
    pub const DEFAULT_ACTIVE_CHANNELS: &[usize] = &[1, 2];
    pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 20;
    pub const MAX_UPDATE_INTERVAL_MS: u64 = 1000;
}

/// Board / acquisition library constants
pub mod board {
    pub const DEFAULT_STREAM_BUFFER_SIZE: usize = 450_000;
    pub const DEFAULT_TIMEOUT_S: u32 = 0;

    pub const SYNTHETIC_SAMPLING_RATE_HZ: u32 = 250;
    pub const SYNTHETIC_EEG_CHANNELS: usize = 8;

    /// Channel settings for an active channel in differential mode:
    /// powered up, default gain, normal input, bias on, SRB off.
    pub const CHANNEL_ON_SETTINGS: &str = "060100X";
    /// Channel settings for an unused channel: powered down, shorted input.
    pub const CHANNEL_OFF_SETTINGS: &str = "161000X";
}

/// Signal filter constants
pub mod filters {
    pub const DEFAULT_MAINS_FREQUENCY_HZ: f64 = 50.0;
    pub const DEFAULT_NOTCH_BANDWIDTH_HZ: f64 = 4.0;
    pub const DEFAULT_BANDPASS_LOW_HZ: f64 = 1.0;
    pub const DEFAULT_BANDPASS_HIGH_HZ: f64 = 50.0;
    pub const DEFAULT_FILTER_ORDER: usize = 2;
    pub const MAX_FILTER_ORDER: usize = 8;
}

/// Band power constants
pub mod bands {
    pub const BAND_COUNT: usize = 5;
    /// (low, high) edges in Hz for Delta, Theta, Alpha, Beta, Gamma
    pub const CANONICAL_BANDS_HZ: [(f64, f64); BAND_COUNT] = [
        (1.0, 4.0),
        (4.0, 8.0),
        (8.0, 13.0),
        (13.0, 30.0),
        (30.0, 50.0),
    ];
    pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
    pub const FEATURE_VECTOR_LEN: usize = 2 * BAND_COUNT;
    /// Total power below this is treated as an empty spectrum
    pub const MIN_TOTAL_POWER: f64 = 1e-12;
}

/// Peak detection and debounce constants
pub mod decision {
    pub const DEFAULT_MIN_PEAK_HEIGHT: f64 = 0.95;
    pub const DEFAULT_MIN_PEAK_WIDTH_SAMPLES: usize = 70;
    pub const DEFAULT_DEBOUNCE_SAMPLES: usize = 125;
}

/// Maze servo constants, in degrees
pub mod actuation {
    pub const INNER_SERVO_LEFT_DEG: u8 = 80;
    pub const INNER_SERVO_RIGHT_DEG: u8 = 120;
    pub const OUTER_SERVO_LEFT_DEG: u8 = 120;
    pub const OUTER_SERVO_RIGHT_DEG: u8 = 75;
    pub const DEFAULT_COMMAND_QUEUE_SIZE: usize = 256;
}

/// Configuration file locations
pub mod paths {
    pub const DEFAULT_CONFIG_FILE: &str = "braingame.toml";
    pub const LOCAL_CONFIG_FILE: &str = "braingame.local.toml";
    pub const USER_CONFIG_DIR: &str = ".config/braingame";
    pub const ENV_PREFIX: &str = "BRAINGAME_";
}
