// SPDX-License-Identifier: GPL-3.0-only

use std::process::ExitCode;
use std::sync::Arc;

use clap::error::ErrorKind;

use screenshooter::cli::{Args, HELP_HINT};
use screenshooter::error_handling::{self, set_desktop_notices};
use screenshooter::output::{OutputDependencies, WaylandClipboard};
use screenshooter::settings::SettingsManager;
use screenshooter::ui::ConsoleUi;
use screenshooter::upload::{JobController, Transports};
use screenshooter::{version_string, Error, Screenshooter, ScreenshotManager};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = match Args::try_parse_with_build(std::env::args_os()) {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            eprintln!("{HELP_HINT}");
            return ExitCode::from(1);
        }
    };

    log::info!("screenshooter {}", version_string());

    let settings = match SettingsManager::new() {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("{e}, settings will not be kept");
            SettingsManager::open(std::env::temp_dir().join("screenshooter.toml"))
        }
    };

    let preferences = args.preferences;
    let request = args.into_request(&settings.settings);
    // Interactive sessions already talk to the user on the terminal
    set_desktop_notices(!request.interactive);

    let clipboard = Arc::new(WaylandClipboard);
    let ui = Arc::new(ConsoleUi::stdio(clipboard.clone()));
    let outputs = OutputDependencies {
        clipboard,
        ..OutputDependencies::new(ui.clone())
    };
    let controller = JobController::new(
        ui.clone(),
        Transports::new(&settings.settings.imgur_client_id),
    );

    let mut app = Screenshooter::new(settings, ScreenshotManager::new(), outputs, ui, controller);

    if preferences {
        let result = app.edit_preferences();
        if let Err(e) = &result {
            report(e);
        }
        error_handling::flush().await;
        return if result.is_ok() { ExitCode::SUCCESS } else { ExitCode::from(1) };
    }

    let result = app.run(request).await;
    if let Err(e) = &result {
        report(e);
    }
    error_handling::flush().await;

    // Upload failures are reported to the user but are not a process failure
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) if e.cancelled() => ExitCode::SUCCESS,
        Err(_) => ExitCode::from(1),
    }
}

fn report(e: &Error) {
    log::error!("{e}");
    screenshooter::report_error!("Screenshot", &e.to_user_facing());
}
