//! Shared fixtures for signage-axum integration tests.

use std::time::Duration;

use signage_axum::bootstrap::ServerConfig;

pub const TEST_DISPLAY: &str = "disp-1";
pub const TEST_OTHER_DISPLAY: &str = "disp-2";
pub const TEST_PLAYLIST: &str = "pl-1";

/// Config with two known displays; only the first uses the test playlist.
pub fn test_config() -> ServerConfig {
    ServerConfig::with_defaults()
        .with_port(0)
        .with_keep_alive(Duration::from_secs(30))
        .with_displays([TEST_DISPLAY, TEST_OTHER_DISPLAY])
        .with_assignment(TEST_PLAYLIST, TEST_DISPLAY)
}
