//! Monitor metadata gathered from a `wl_output`.
//!
//! An output describes itself across several events (geometry, mode, scale,
//! name, description) and closes the batch with `done`. [`MonitorBuilder`]
//! accumulates the batch and [`MonitorBuilder::finish`] produces the
//! immutable [`Monitor`].

/// Converts a refresh rate reported in milli-Hertz to whole Hertz.
pub fn millihertz_to_hertz(refresh_mhz: i32) -> u32 {
    refresh_mhz.max(0) as u32 / 1000
}

/// A finalized description of the output the window appears on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Monitor {
    /// Width of the current mode in pixels.
    pub width: u32,
    /// Height of the current mode in pixels.
    pub height: u32,
    /// Refresh rate of the current mode in Hz.
    pub refresh_rate: u32,
    /// Integer content scale factor.
    pub scale: i32,
    /// Position within the compositor's global space.
    pub x: i32,
    pub y: i32,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mode {
    width: u32,
    height: u32,
    refresh_rate: u32,
}

/// Accumulates output events until `done`.
#[derive(Debug, Clone, Default)]
pub struct MonitorBuilder {
    origin: Option<(i32, i32)>,
    current_mode: Option<Mode>,
    fallback_mode: Option<Mode>,
    scale: Option<i32>,
    name: Option<String>,
    description: Option<String>,
}

impl MonitorBuilder {
    pub fn geometry(&mut self, x: i32, y: i32) {
        self.origin = Some((x, y));
    }

    /// Records a mode. The mode flagged current wins; otherwise the first mode
    /// seen is used.
    pub fn mode(&mut self, current: bool, width: i32, height: i32, refresh_mhz: i32) {
        let mode = Mode {
            width: width.max(0) as u32,
            height: height.max(0) as u32,
            refresh_rate: millihertz_to_hertz(refresh_mhz),
        };
        if current {
            self.current_mode = Some(mode);
        } else if self.fallback_mode.is_none() {
            self.fallback_mode = Some(mode);
        }
    }

    pub fn scale(&mut self, factor: i32) {
        self.scale = Some(factor);
    }

    pub fn name(&mut self, name: String) {
        self.name = Some(name);
    }

    pub fn description(&mut self, description: String) {
        self.description = Some(description);
    }

    /// Finalizes the batch. Scale defaults to 1 when the output never sent one.
    pub fn finish(self) -> Monitor {
        let mode = self.current_mode.or(self.fallback_mode).unwrap_or(Mode {
            width: 0,
            height: 0,
            refresh_rate: 0,
        });
        let (x, y) = self.origin.unwrap_or((0, 0));
        Monitor {
            width: mode.width,
            height: mode.height,
            refresh_rate: mode.refresh_rate,
            scale: self.scale.unwrap_or(1),
            x,
            y,
            name: self.name,
            description: self.description,
        }
    }
}
