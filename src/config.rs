use std::time::Duration;

use crate::codec::DEFAULT_FRAME_DELAY;
use crate::store::STILL_IMAGE_DELAY;
use crate::zoom::ScaleFilter;

/// Tunables for an [`crate::ImageView`].
///
/// Every field has a default, so a partial `animview.toml` is enough.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ViewConfig {
    /// Delay used when a container carries no readable timing, in ms
    pub fallback_delay_ms: u64,
    /// Delay given to a single still image, in ms
    pub still_image_delay_ms: u64,
    /// Minimum factor change applied while a zoom control is still moving
    pub zoom_hysteresis: f64,
    /// Size of the recompute pool
    pub worker_threads: usize,
    pub filter: ScaleFilter,
    /// Largest zoomed frame allowed, in pixels
    pub max_scaled_pixels: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            fallback_delay_ms: DEFAULT_FRAME_DELAY.as_millis() as u64,
            still_image_delay_ms: STILL_IMAGE_DELAY.as_millis() as u64,
            zoom_hysteresis: 0.10,
            worker_threads: 2,
            filter: ScaleFilter::CatmullRom,
            max_scaled_pixels: 64 * 1024 * 1024,
        }
    }
}

impl ViewConfig {
    /// Parse an `animview.toml` string into `ViewConfig`.
    #[cfg(feature = "toml")]
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    #[inline]
    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }

    #[inline]
    pub fn still_image_delay(&self) -> Duration {
        Duration::from_millis(self.still_image_delay_ms)
    }
}
