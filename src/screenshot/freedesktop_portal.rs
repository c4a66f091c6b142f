// SPDX-License-Identifier: GPL-3.0-only

use super::{CaptureMode, CaptureOptions, ScreenshotError, Screengrabber};
use ashpd::desktop::{screenshot::Screenshot, ResponseError};
use async_trait::async_trait;
use image::DynamicImage;
use std::{fs, path::PathBuf};
use zbus::{fdo::DBusProxy, names::BusName, Connection};

const PORTAL_BUS_NAME: &str = "org.freedesktop.portal.Desktop";

pub struct PortalScreengrabber {
    _private: (),
}

impl Default for PortalScreengrabber {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalScreengrabber {
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

#[async_trait]
impl Screengrabber for PortalScreengrabber {
    async fn is_available(&self) -> bool {
        let Ok(connection) = Connection::session().await else {
            return false;
        };
        let Ok(dbus) = DBusProxy::new(&connection).await else {
            return false;
        };
        let Ok(name) = BusName::try_from(PORTAL_BUS_NAME) else {
            return false;
        };
        dbus.name_has_owner(name).await.unwrap_or(false)
    }

    async fn take_screenshot(&self, options: &CaptureOptions) -> Result<DynamicImage, ScreenshotError> {
        // Non-interactive requests always grab the whole workspace; anything
        // narrower goes through the portal's own window/region picker.
        let interactive = options.mode != CaptureMode::Fullscreen;

        let response = Screenshot::request()
            .interactive(interactive)
            .modal(interactive)
            .send()
            .await
            .map_err(|e| ScreenshotError::Portal(e.to_string()))?
            .response();

        let response = match response {
            Ok(response) => response,
            Err(ashpd::Error::Response(ResponseError::Cancelled)) => return Err(ScreenshotError::Cancelled),
            Err(e) => return Err(ScreenshotError::Portal(e.to_string())),
        };

        let uri = response.uri();
        match uri.scheme() {
            "file" => {
                let temp_path = PathBuf::from(uri.path());
                let image = image::open(&temp_path)?;
                // The portal leaves its copy behind; the dispatcher decides where the image ends up
                if let Err(e) = fs::remove_file(&temp_path) {
                    log::debug!("Could not remove portal file {}: {e}", temp_path.display());
                }
                Ok(image)
            }
            scheme => Err(ScreenshotError::Portal(format!("Unsupported scheme: {scheme}"))),
        }
    }

    fn name(&self) -> &'static str {
        "Freedesktop Portal"
    }

    fn supports_mode(&self, mode: CaptureMode) -> bool {
        match mode {
            CaptureMode::Fullscreen | CaptureMode::ActiveWindow | CaptureMode::Select => true,
        }
    }
}
