// SPDX-License-Identifier: GPL-3.0-only

use super::{CaptureMode, CaptureOptions, ScreenshotError, Screengrabber};
use crate::error_handling::{report_error, ErrorSeverity};
use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use std::{collections::HashMap, fs::File, os::fd::OwnedFd};
use tokio::io::AsyncReadExt;
use zbus::zvariant::Fd;
use zbus::fdo::DBusProxy;
use zbus::names::BusName;
use zbus::{proxy, zvariant::{OwnedValue, Value}, Connection};

const KWIN_BUS_NAME: &str = "org.kde.KWin.ScreenShot2";

/// QImage pixel formats KWin is known to hand out.
const QIMAGE_FORMAT_ARGB32: u32 = 5;
const QIMAGE_FORMAT_ARGB32_PREMULTIPLIED: u32 = 6;
const QIMAGE_FORMAT_RGB888: u32 = 13;

#[proxy(
    interface = "org.kde.KWin.ScreenShot2",
    default_service = "org.kde.KWin.ScreenShot2",
    default_path = "/org/kde/KWin/ScreenShot2"
)]
trait KWinScreenShot2 {
    /// Capture the active window
    fn capture_active_window(
        &self,
        options: HashMap<&str, &Value<'_>>,
        pipe: Fd<'_>,
    ) -> zbus::Result<HashMap<String, OwnedValue>>;

    /// Interactive capture with user selection
    fn capture_interactive(
        &self,
        kind: u32, // 0 = window, 1 = screen
        options: HashMap<&str, &Value<'_>>,
        pipe: Fd<'_>,
    ) -> zbus::Result<HashMap<String, OwnedValue>>;

    /// Capture the entire workspace
    fn capture_workspace(
        &self,
        options: HashMap<&str, &Value<'_>>,
        pipe: Fd<'_>,
    ) -> zbus::Result<HashMap<String, OwnedValue>>;
}

pub struct KWinScreengrabber {
    _private: (),
}

impl Default for KWinScreengrabber {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
enum KWinRequest {
    Workspace,
    ActiveWindow,
    Interactive(u32),
}

impl KWinScreengrabber {
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }

    async fn read_image_from_pipe(read_end: OwnedFd) -> Result<Vec<u8>, ScreenshotError> {
        let mut async_file = tokio::fs::File::from_std(File::from(read_end));
        let mut buffer = Vec::new();
        async_file.read_to_end(&mut buffer).await?;
        Ok(buffer)
    }

    async fn capture(
        proxy: &KWinScreenShot2Proxy<'_>,
        request: KWinRequest,
        show_mouse: bool,
    ) -> Result<DynamicImage, ScreenshotError> {
        let (read_end, write_end) = nix::unistd::pipe()
            .map_err(|errno| ScreenshotError::Io(std::io::Error::from(errno)))?;
        let fd = Fd::from(write_end);

        let include_cursor = Value::Bool(show_mouse);
        let include_decoration = Value::Bool(true);
        let native_resolution = Value::Bool(true);
        let mut kwin_options = HashMap::new();
        kwin_options.insert("include-cursor", &include_cursor);
        kwin_options.insert("include-decoration", &include_decoration);
        kwin_options.insert("native-resolution", &native_resolution);

        let call = async {
            match request {
                KWinRequest::Workspace => proxy.capture_workspace(kwin_options, fd).await,
                KWinRequest::ActiveWindow => proxy.capture_active_window(kwin_options, fd).await,
                KWinRequest::Interactive(kind) => proxy.capture_interactive(kind, kwin_options, fd).await,
            }
        };

        // Our write end is dropped once the call is sent, so the read sees EOF when KWin is done
        let (metadata, pixels) = tokio::join!(call, Self::read_image_from_pipe(read_end));
        decode_image(pixels?, &metadata?)
    }
}

fn metadata_u32(metadata: &HashMap<String, OwnedValue>, key: &str) -> Result<u32, ScreenshotError> {
    metadata
        .get(key)
        .and_then(|v| v.downcast_ref::<u32>().ok())
        .ok_or_else(|| ScreenshotError::KWin(format!("Missing {key} in KWin response")))
}

fn argb_to_rgba(data: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(data.len());
    for chunk in data.chunks_exact(4) {
        let argb = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let [a, r, g, b] = argb.to_be_bytes();
        rgba.extend_from_slice(&[r, g, b, a]);
    }
    rgba
}

/// Turns KWin's raw QImage bytes into an RGBA image.
fn decode_image(data: Vec<u8>, metadata: &HashMap<String, OwnedValue>) -> Result<DynamicImage, ScreenshotError> {
    let width = metadata_u32(metadata, "width")?;
    let height = metadata_u32(metadata, "height")?;
    let format = metadata_u32(metadata, "format")?;
    log::debug!("KWin image {width}x{height}, QImage format {format}");

    let rgba = match format {
        QIMAGE_FORMAT_ARGB32 | QIMAGE_FORMAT_ARGB32_PREMULTIPLIED => argb_to_rgba(&data),
        QIMAGE_FORMAT_RGB888 => data
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect(),
        other => {
            log::warn!("Unknown QImage format {other}, trying as RGBA");
            data
        }
    };

    RgbaImage::from_raw(width, height, rgba)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| ScreenshotError::KWin(format!("Pixel data does not match {width}x{height} (format {format})")))
}

#[async_trait]
impl Screengrabber for KWinScreengrabber {
    async fn is_available(&self) -> bool {
        let Ok(connection) = Connection::session().await else {
            return false;
        };
        let Ok(dbus) = DBusProxy::new(&connection).await else {
            return false;
        };
        let Ok(name) = BusName::try_from(KWIN_BUS_NAME) else {
            return false;
        };
        dbus.name_has_owner(name).await.unwrap_or(false)
    }

    async fn take_screenshot(&self, options: &CaptureOptions) -> Result<DynamicImage, ScreenshotError> {
        let connection = Connection::session().await?;
        let proxy = KWinScreenShot2Proxy::new(&connection).await?;

        let request = match options.mode {
            CaptureMode::Fullscreen => KWinRequest::Workspace,
            CaptureMode::ActiveWindow => KWinRequest::ActiveWindow,
            CaptureMode::Select => KWinRequest::Interactive(1),
        };

        match Self::capture(&proxy, request, options.show_mouse).await {
            Err(ScreenshotError::DBus(zbus_error)) if zbus_error.to_string().contains("NoAuthorized") => {
                if options.mode == CaptureMode::Fullscreen {
                    // Interactive capture cannot grab the whole workspace
                    return Err(ScreenshotError::DBus(zbus_error));
                }
                report_error(
                    ErrorSeverity::Warning,
                    "KWin Authorization",
                    "Screenshot permission not granted for org.kde.KWin.ScreenShot2. Falling back to interactive mode...",
                );
                let kind = u32::from(options.mode != CaptureMode::ActiveWindow);
                Self::capture(&proxy, KWinRequest::Interactive(kind), options.show_mouse).await
            }
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        "KWin ScreenShot2"
    }

    fn supports_mode(&self, mode: CaptureMode) -> bool {
        // Region selection is left to the portal's rubber-band UI
        mode != CaptureMode::Select
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argb_pixels_are_reordered() {
        let argb = u32::from_be_bytes([0x80, 0x10, 0x20, 0x30]).to_ne_bytes();
        assert_eq!(argb_to_rgba(&argb), vec![0x10, 0x20, 0x30, 0x80]);
    }
}
