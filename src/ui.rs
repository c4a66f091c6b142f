// SPDX-License-Identifier: GPL-3.0-only

//! Terminal rendition of the screenshooter dialogs

use std::fmt::Display;
use std::io::{self, BufRead, BufReader, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::app::SetupDialog;
use crate::output::{Clipboard, SaveDialog};
use crate::request::{Action, ScreenshotRequest};
use crate::screenshot::CaptureMode;
use crate::upload::{
    CredentialFieldSet, CredentialPrompt, FieldKind, JobFrontend, JobType, ProgressDisplay,
    PromptResponse, ResultPresenter, UploadLinks,
};

type Output = Arc<Mutex<Box<dyn Write + Send>>>;

fn say(output: &Output, text: impl Display) {
    if let Ok(mut out) = output.lock() {
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }
}

/// Where secret answers are typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SecretInput {
    /// Keys read from the terminal with echo off
    Terminal,
    /// Lines from the input stream, like every other answer
    Lines,
}

enum HiddenKey {
    Typing,
    Done,
    Abort,
}

/// Applies one key press to a secret being typed.
fn hidden_key(secret: &mut String, key: &KeyEvent) -> HiddenKey {
    if key.kind != KeyEventKind::Press {
        return HiddenKey::Typing;
    }
    match key.code {
        KeyCode::Enter => HiddenKey::Done,
        KeyCode::Esc => HiddenKey::Abort,
        KeyCode::Char('c' | 'd') if key.modifiers.contains(KeyModifiers::CONTROL) => HiddenKey::Abort,
        KeyCode::Backspace => {
            secret.pop();
            HiddenKey::Typing
        }
        KeyCode::Char(c) => {
            secret.push(c);
            HiddenKey::Typing
        }
        _ => HiddenKey::Typing,
    }
}

/// Reads keys in raw mode until Enter. `None` when aborted.
fn read_hidden() -> io::Result<Option<String>> {
    terminal::enable_raw_mode()?;
    let mut secret = String::new();
    let result = loop {
        match event::read() {
            Ok(Event::Key(key)) => match hidden_key(&mut secret, &key) {
                HiddenKey::Typing => {}
                HiddenKey::Done => break Ok(Some(secret)),
                HiddenKey::Abort => break Ok(None),
            },
            Ok(_) => {}
            Err(e) => break Err(e),
        }
    };
    terminal::disable_raw_mode()?;
    result
}

/// Dialogs read from one input stream and write to one output stream.
pub struct ConsoleUi {
    input: Mutex<Box<dyn BufRead + Send>>,
    output: Output,
    clipboard: Arc<dyn Clipboard>,
    secret_input: SecretInput,
}

impl ConsoleUi {
    pub fn new(
        input: Box<dyn BufRead + Send>,
        output: Box<dyn Write + Send>,
        clipboard: Arc<dyn Clipboard>,
    ) -> Self {
        Self {
            input: Mutex::new(input),
            output: Arc::new(Mutex::new(output)),
            clipboard,
            secret_input: SecretInput::Lines,
        }
    }

    /// Dialogs on the process' stdin and stderr. Secrets are not echoed on a terminal.
    pub fn stdio(clipboard: Arc<dyn Clipboard>) -> Self {
        let mut ui = Self::new(
            Box::new(BufReader::new(io::stdin())),
            Box::new(io::stderr()),
            clipboard,
        );
        if io::stdin().is_terminal() {
            ui.secret_input = SecretInput::Terminal;
        }
        ui
    }

    fn say(&self, text: impl Display) {
        say(&self.output, text);
    }

    /// Shows `prompt` and reads one line. `None` on end of input.
    fn ask(&self, prompt: &str) -> Option<String> {
        if let Ok(mut out) = self.output.lock() {
            let _ = write!(out, "{prompt}");
            let _ = out.flush();
        }

        let mut line = String::new();
        let mut input = self.input.lock().ok()?;
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }

    /// Like [`ConsoleUi::ask`], without showing what is typed on a terminal.
    fn ask_secret(&self, prompt: &str) -> Option<String> {
        if self.secret_input == SecretInput::Lines {
            return self.ask(prompt);
        }

        if let Ok(mut out) = self.output.lock() {
            let _ = write!(out, "{prompt}");
            let _ = out.flush();
        }
        // Keeps line reads from interleaving with the raw key reads
        let _input = self.input.lock().ok()?;
        let answer = read_hidden().unwrap_or_else(|e| {
            log::warn!("Could not read from the terminal: {e}");
            None
        });
        self.say("");
        answer
    }

    /// Numbered menu, returning the chosen index. Empty input keeps `current`.
    fn choose<T: Display>(&self, title: &str, items: &[T], current: usize) -> Option<usize> {
        self.say(title);
        for (i, item) in items.iter().enumerate() {
            let marker = if i == current { '*' } else { ' ' };
            self.say(format!(" {marker} {}) {item}", i + 1));
        }

        loop {
            let answer = self.ask(&format!("Choice [{}]: ", current + 1))?;
            let answer = answer.trim();
            if answer.is_empty() {
                return Some(current);
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=items.len()).contains(&n) => return Some(n - 1),
                _ => self.say(format!("Please enter a number between 1 and {}.", items.len())),
            }
        }
    }

    fn confirm(&self, question: &str, default: bool) -> Option<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            let answer = self.ask(&format!("{question} [{hint}]: "))?;
            match answer.trim().to_lowercase().as_str() {
                "" => return Some(default),
                "y" | "yes" => return Some(true),
                "n" | "no" => return Some(false),
                _ => self.say("Please answer y or n."),
            }
        }
    }
}

impl SetupDialog for ConsoleUi {
    fn configure(&self, request: &mut ScreenshotRequest) -> bool {
        self.configure_request(request).is_some()
    }

    fn choose_save_folder(&self, current: &Path) -> Option<PathBuf> {
        self.say("Default save folder");
        loop {
            let answer = self.ask(&format!("Folder [{}]: ", current.display()))?;
            let answer = answer.trim();
            if answer.is_empty() {
                return Some(current.to_path_buf());
            }

            let mut folder = match answer.strip_prefix("~/") {
                Some(rest) => dirs::home_dir().map_or_else(|| PathBuf::from(answer), |home| home.join(rest)),
                None => PathBuf::from(answer),
            };
            if folder.is_relative() {
                if let Ok(cwd) = std::env::current_dir() {
                    folder = cwd.join(folder);
                }
            }

            if folder.is_dir() {
                return Some(folder);
            }
            self.say(format!("{} is not a folder.", folder.display()));
        }
    }
}

impl ConsoleUi {
    fn configure_request(&self, request: &mut ScreenshotRequest) -> Option<()> {
        let mut draft = request.clone();

        let modes = CaptureMode::ALL;
        let current = modes.iter().position(|m| *m == draft.mode).unwrap_or(0);
        draft.mode = modes[self.choose("Region to capture", &modes, current)?];

        draft.show_mouse = self.confirm("Capture the mouse pointer?", draft.show_mouse)?;

        loop {
            let answer = self.ask(&format!("Delay before capturing, in seconds [{}]: ", draft.delay))?;
            let answer = answer.trim();
            if answer.is_empty() {
                break;
            }
            match answer.parse() {
                Ok(delay) => {
                    draft.delay = delay;
                    break;
                }
                Err(_) => self.say("Please enter a number of seconds."),
            }
        }

        let actions = Action::ALL;
        let current = actions.iter().position(|a| *a == draft.action).unwrap_or(0);
        draft.action = actions[self.choose("Action", &actions, current)?];

        match draft.action {
            Action::Save => {
                draft.show_save_dialog =
                    self.confirm("Ask where to save the screenshot?", draft.show_save_dialog)?;
            }
            Action::Open => {
                let current = draft.app.clone().unwrap_or_default();
                let app = self.ask(&format!(
                    "Application (empty for the default viewer) [{current}]: "
                ))?;
                let app = if app.trim().is_empty() { current } else { app.trim().to_string() };
                draft.app = (!app.is_empty()).then_some(app);
            }
            Action::Upload => {
                let services = [JobType::Imgur, JobType::ImgurCopy, JobType::ZimageZ];
                let current = services
                    .iter()
                    .position(|s| *s == draft.upload_service)
                    .unwrap_or(0);
                draft.upload_service = services[self.choose("Image hosting service", &services, current)?];
            }
            Action::Clipboard => {}
        }

        *request = draft;
        Some(())
    }
}

impl SaveDialog for ConsoleUi {
    fn choose_location(&self, suggested: &Path) -> Option<PathBuf> {
        let answer = self.ask(&format!("Save as [{}]: ", suggested.display()))?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Some(suggested.to_path_buf());
        }

        let chosen = PathBuf::from(answer);
        if chosen.is_absolute() {
            Some(chosen)
        } else {
            let dir = suggested.parent().unwrap_or_else(|| Path::new("."));
            Some(dir.join(chosen))
        }
    }
}

impl CredentialPrompt for ConsoleUi {
    fn ask_for_information(&self, fields: &CredentialFieldSet, message: &str) -> PromptResponse {
        self.say(message);

        let mut answers = fields.clone();
        for (kind, value) in fields.iter() {
            let shown = if kind.is_secret() && !value.is_empty() { "********" } else { value };
            let prompt = format!("{} [{shown}]: ", kind.label());
            let answer = if kind.is_secret() { self.ask_secret(&prompt) } else { self.ask(&prompt) };
            let Some(answer) = answer else {
                return PromptResponse::Cancelled;
            };
            if !answer.is_empty() {
                answers.set(kind, answer);
            }
        }

        match self.confirm("Upload with these details?", true) {
            Some(true) => PromptResponse::Confirmed(answers),
            Some(false) | None => PromptResponse::Cancelled,
        }
    }
}

impl ResultPresenter for ConsoleUi {
    fn present_links(&self, title: &str, links: &UploadLinks) {
        self.say(title);
        self.say(format!("Full size image: {}", links.image_url));
        self.say(format!("Large thumbnail: {}", links.thumbnail_url));
        self.say(format!("Small thumbnail: {}", links.small_thumbnail_url));
        self.say(format!("HTML code:\n{}", links.html()));
        self.say(format!("BBCode for forums:\n{}", links.bbcode()));
    }

    fn copy_link(&self, url: &str) {
        match self.clipboard.copy_text(url) {
            Ok(()) => self.say(format!("Copied {url} to the clipboard")),
            Err(e) => {
                crate::report_warning!("Clipboard", &format!("Could not copy the link: {e}"));
                self.say(url);
            }
        }
    }
}

impl JobFrontend for ConsoleUi {
    fn open_progress(&self, title: &str) -> Arc<dyn ProgressDisplay> {
        self.say(title);
        Arc::new(ConsoleProgress {
            output: Arc::clone(&self.output),
            closed: Mutex::new(false),
        })
    }

    fn show_error(&self, message: &str) {
        crate::report_error!("Upload failed", message);
        self.say(format!("Error: {message}"));
    }
}

/// Status lines of a running upload
pub struct ConsoleProgress {
    output: Output,
    closed: Mutex<bool>,
}

impl ProgressDisplay for ConsoleProgress {
    fn update(&self, message: &str) {
        let closed = self.closed.lock().map_or(true, |closed| *closed);
        if !closed {
            say(&self.output, format!("  {message}"));
        }
    }

    fn close(&self) {
        if let Ok(mut closed) = self.closed.lock() {
            *closed = true;
        }
    }
}
