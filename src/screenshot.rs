// SPDX-License-Identifier: GPL-3.0-only

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error_handling::{report_error, ErrorSeverity};

/// Which part of the display a capture targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum CaptureMode {
    #[default]
    Fullscreen,
    ActiveWindow,
    Select,
}

impl CaptureMode {
    pub const ALL: [CaptureMode; 3] = [Self::Fullscreen, Self::ActiveWindow, Self::Select];
}

impl From<CaptureMode> for i32 {
    fn from(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::Fullscreen => 1,
            CaptureMode::ActiveWindow => 2,
            CaptureMode::Select => 3,
        }
    }
}

impl TryFrom<i32> for CaptureMode {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Fullscreen),
            2 => Ok(Self::ActiveWindow),
            3 => Ok(Self::Select),
            other => Err(format!("unknown capture mode {other}")),
        }
    }
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fullscreen => write!(f, "Entire screen"),
            Self::ActiveWindow => write!(f, "Active window"),
            Self::Select => write!(f, "Select a region"),
        }
    }
}

/// A rectangle in screen pixels, parsed from `X,Y,WxH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid geometry `{s}`, expected X,Y,WxH");

        let (origin, size) = s.trim().rsplit_once(',').ok_or_else(invalid)?;
        let (x, y) = origin.split_once(',').ok_or_else(invalid)?;
        let (width, height) = size.split_once('x').ok_or_else(invalid)?;

        let parse = |v: &str| v.trim().parse::<u32>().map_err(|_| invalid());
        let region = Region {
            x: parse(x)?,
            y: parse(y)?,
            width: parse(width)?,
            height: parse(height)?,
        };

        if region.width == 0 || region.height == 0 {
            return Err(format!("geometry `{s}` has an empty area"));
        }
        Ok(region)
    }
}

/// Crops `image` to `region`, clamped to the image bounds.
///
/// # Errors
/// Returns `ScreenshotError::InvalidRegion` when nothing of the region lies inside the image.
pub fn crop_to_region(image: &DynamicImage, region: Region) -> Result<DynamicImage, ScreenshotError> {
    let crop_x = region.x.min(image.width());
    let crop_y = region.y.min(image.height());
    let crop_width = region.width.min(image.width() - crop_x);
    let crop_height = region.height.min(image.height() - crop_y);

    if crop_width == 0 || crop_height == 0 {
        return Err(ScreenshotError::InvalidRegion(region));
    }

    Ok(image.crop_imm(crop_x, crop_y, crop_width, crop_height))
}

#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    pub mode: CaptureMode,
    pub delay: Duration,
    pub show_mouse: bool,
    /// Screen area to keep when `mode` is `Select`. Taken from a fullscreen capture
    /// instead of an interactive selection.
    pub region: Option<Region>,
}

#[derive(thiserror::Error, Debug)]
pub enum ScreenshotError {
    #[error("Portal error: {0}")]
    Portal(String),
    #[error("KWin error: {0}")]
    KWin(String),
    #[error("DBus error: {0}")]
    DBus(#[from] zbus::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Region {0:?} lies outside the captured image")]
    InvalidRegion(Region),
    #[error("Screengrabber not available")]
    NotAvailable,
    #[error("Operation cancelled")]
    Cancelled,
}

#[async_trait]
pub trait Screengrabber: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn take_screenshot(&self, options: &CaptureOptions) -> Result<DynamicImage, ScreenshotError>;

    fn name(&self) -> &'static str;

    fn supports_mode(&self, mode: CaptureMode) -> bool;
}

pub mod freedesktop_portal;
pub mod kwin_screenshot2;

#[derive(Clone)]
pub struct ScreenshotManager {
    grabbers: Arc<Vec<Box<dyn Screengrabber>>>,
}

impl Default for ScreenshotManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenshotManager {
    #[must_use]
    pub fn new() -> Self {
        // KWin first: it can grab the active window without user interaction
        let grabbers: Vec<Box<dyn Screengrabber>> = vec![
            Box::new(kwin_screenshot2::KWinScreengrabber::new()),
            Box::new(freedesktop_portal::PortalScreengrabber::new()),
        ];

        Self { grabbers: Arc::new(grabbers) }
    }

    #[must_use]
    pub fn with_grabbers(grabbers: Vec<Box<dyn Screengrabber>>) -> Self {
        Self { grabbers: Arc::new(grabbers) }
    }

    /// Waits for the requested delay, then captures with the first backend that succeeds.
    ///
    /// # Errors
    /// Returns the last backend error, or `NotAvailable` when no backend supports the mode.
    pub async fn capture(&self, options: &CaptureOptions) -> Result<DynamicImage, ScreenshotError> {
        if !options.delay.is_zero() {
            log::debug!("Waiting {:?} before capture", options.delay);
            tokio::time::sleep(options.delay).await;
        }

        // A given region is cut out of the whole screen without asking the user
        let region = match options.mode {
            CaptureMode::Select => options.region,
            _ => None,
        };
        let grab = CaptureOptions {
            mode: if region.is_some() { CaptureMode::Fullscreen } else { options.mode },
            region: None,
            ..options.clone()
        };

        let mut last_error = None;
        for grabber in self.grabbers.iter() {
            if !grabber.supports_mode(grab.mode) || !grabber.is_available().await {
                continue;
            }

            match grabber.take_screenshot(&grab).await {
                Ok(image) => {
                    log::info!(
                        "Captured {}x{} image with {}",
                        image.width(),
                        image.height(),
                        grabber.name()
                    );
                    return match region {
                        Some(region) => crop_to_region(&image, region),
                        None => Ok(image),
                    };
                }
                Err(ScreenshotError::Cancelled) => return Err(ScreenshotError::Cancelled),
                Err(err) => {
                    report_error(
                        ErrorSeverity::Warning,
                        "Backend Fallback",
                        &format!("Backend {} failed: {}, trying next backend...", grabber.name(), err),
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or(ScreenshotError::NotAvailable))
    }
}
