//! Size and placement of frames on a render surface.

/// Preferred surface size for a keyframe of `width` x `height` at `zoom`.
///
/// Truncates toward zero, matching how surfaces size themselves to content.
#[inline]
pub fn preferred_size(width: u32, height: u32, zoom: f64) -> (u32, u32) {
    (
        (f64::from(width) * zoom) as u32,
        (f64::from(height) * zoom) as u32,
    )
}

/// Top-left position that centers a frame on a surface.
///
/// Negative when the frame is larger than the surface.
///
/// ## Example
///
/// ```rust
/// use animview_core::layout::centered_origin;
///
/// assert_eq!(centered_origin((100, 50), (40, 20)), (30, 15));
/// assert_eq!(centered_origin((10, 10), (15, 15)), (-2, -2));
/// ```
#[inline]
pub fn centered_origin(surface: (u32, u32), frame: (u32, u32)) -> (i64, i64) {
    (
        (i64::from(surface.0) - i64::from(frame.0)) / 2,
        (i64::from(surface.1) - i64::from(frame.1)) / 2,
    )
}

/// Zoom-to-fit calculation.
///
/// Finds the largest zoom at which a frame fits inside a container while
/// keeping its aspect ratio.
#[derive(Clone, Debug)]
pub struct ZoomFit {
    /// Padding to subtract from container dimensions
    pub padding: f64,
    /// Minimum allowed zoom factor
    pub min_zoom: f64,
    /// Maximum allowed zoom factor
    pub max_zoom: f64,
}

impl Default for ZoomFit {
    fn default() -> Self {
        Self {
            padding: 0.0,
            min_zoom: 0.05,
            max_zoom: 8.0,
        }
    }
}

impl ZoomFit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate the zoom that fits a `width` x `height` frame in the container.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use animview_core::layout::ZoomFit;
    ///
    /// // A 200x100 frame in a 400x400 container is width-bound at 2x.
    /// let zoom = ZoomFit::default().calculate(200, 100, 400.0, 400.0);
    /// assert_eq!(zoom, 2.0);
    /// ```
    pub fn calculate(&self, width: u32, height: u32, container_width: f64, container_height: f64) -> f64 {
        if width == 0 || height == 0 {
            return self.min_zoom;
        }

        let available_width = container_width - self.padding;
        let available_height = container_height - self.padding;

        if available_width <= 0.0 || available_height <= 0.0 {
            return self.min_zoom;
        }

        let from_width = available_width / f64::from(width);
        let from_height = available_height / f64::from(height);

        from_width.min(from_height).clamp(self.min_zoom, self.max_zoom)
    }
}
