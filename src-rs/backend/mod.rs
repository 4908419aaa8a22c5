//! Capability interfaces for input injection, screen capture and window
//! activation, and the providers that implement them.
//!
//! Providers are ranked per capability and probed once at startup against a
//! [`HostEnvironment`] snapshot. [`BackendSet`] binds the winners for the
//! lifetime of the run; nothing outside this module spawns a provider
//! command directly.

mod capture;
mod command;
mod input;
mod window;

pub use capture::{GrimCapture, ImportCapture, NoOpCapture, ScreencaptureCapture};
pub use input::{NoOpInput, OsascriptInput, WtypeInput, XdotoolInput};
pub use window::{HyprctlWindow, OsascriptWindow, WmctrlWindow, XdotoolWindow};

use serde::Serialize;
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of a single provider operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutcome<T = ()> {
    Success(T),
    /// This environment cannot do it at all. Not worth retrying.
    Unsupported,
    /// This attempt failed; the next one may not.
    TransientFailure(String),
}

impl<T> BackendOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, BackendOutcome::Success(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> BackendOutcome<U> {
        match self {
            BackendOutcome::Success(v) => BackendOutcome::Success(f(v)),
            BackendOutcome::Unsupported => BackendOutcome::Unsupported,
            BackendOutcome::TransientFailure(msg) => BackendOutcome::TransientFailure(msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    InputInjection,
    ScreenCapture,
    WindowActivation,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::InputInjection,
        Capability::ScreenCapture,
        Capability::WindowActivation,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Capability::InputInjection => "input_injection",
            Capability::ScreenCapture => "screen_capture",
            Capability::WindowActivation => "window_activation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendFamily {
    NativeAutomation,
    CompositorCli,
    CliScreenshot,
    NoOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Xdotool,
    Osascript,
    Hyprctl,
    Wtype,
    Wmctrl,
    Grim,
    ImageMagickImport,
    Screencapture,
    NoOp,
}

impl Provider {
    pub fn family(self) -> BackendFamily {
        match self {
            Provider::Xdotool | Provider::Osascript => BackendFamily::NativeAutomation,
            Provider::Hyprctl | Provider::Wtype | Provider::Wmctrl => BackendFamily::CompositorCli,
            Provider::Grim | Provider::ImageMagickImport | Provider::Screencapture => {
                BackendFamily::CliScreenshot
            }
            Provider::NoOp => BackendFamily::NoOp,
        }
    }

    pub fn executable(self) -> Option<&'static str> {
        match self {
            Provider::Xdotool => Some("xdotool"),
            Provider::Osascript => Some("osascript"),
            Provider::Hyprctl => Some("hyprctl"),
            Provider::Wtype => Some("wtype"),
            Provider::Wmctrl => Some("wmctrl"),
            Provider::Grim => Some("grim"),
            Provider::ImageMagickImport => Some("import"),
            Provider::Screencapture => Some("screencapture"),
            Provider::NoOp => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Provider::ImageMagickImport => "imagemagick-import",
            Provider::NoOp => "noop",
            other => other.executable().unwrap_or("noop"),
        }
    }

    /// Whether the provider can run here: its executable is on PATH and the
    /// session it talks to is present.
    pub fn is_available(self, env: &HostEnvironment) -> bool {
        let Some(exe) = self.executable() else {
            return true;
        };
        let session_ok = match self {
            Provider::Xdotool | Provider::ImageMagickImport | Provider::Wmctrl => env.x11_display,
            Provider::Wtype | Provider::Grim => env.wayland_display,
            Provider::Hyprctl => env.is_hyprland(),
            Provider::Osascript | Provider::Screencapture => env.os == "macos",
            Provider::NoOp => true,
        };
        session_ok && env.has_executable(exe)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static preference order per capability, best first.
pub fn ranking(capability: Capability) -> &'static [Provider] {
    match capability {
        Capability::InputInjection => &[
            Provider::Xdotool,
            Provider::Osascript,
            Provider::Wtype,
            Provider::NoOp,
        ],
        Capability::ScreenCapture => &[
            Provider::Grim,
            Provider::Screencapture,
            Provider::ImageMagickImport,
            Provider::NoOp,
        ],
        Capability::WindowActivation => &[
            Provider::Hyprctl,
            Provider::Wmctrl,
            Provider::Xdotool,
            Provider::Osascript,
            Provider::NoOp,
        ],
    }
}

/// Available providers for `capability`, best first. Always ends with `NoOp`.
pub fn probe(capability: Capability, env: &HostEnvironment) -> Vec<Provider> {
    ranking(capability)
        .iter()
        .copied()
        .filter(|p| p.is_available(env))
        .collect()
}

/// Snapshot of everything provider probing looks at.
#[derive(Debug, Clone, Default)]
pub struct HostEnvironment {
    pub os: String,
    pub path: Option<OsString>,
    pub session_desktop: Option<String>,
    pub hyprland_signature: bool,
    pub wayland_display: bool,
    pub x11_display: bool,
}

impl HostEnvironment {
    pub fn detect() -> Self {
        let present = |key: &str| {
            env::var_os(key)
                .map(|v| !v.is_empty())
                .unwrap_or(false)
        };
        Self {
            os: env::consts::OS.to_string(),
            path: env::var_os("PATH"),
            session_desktop: env::var("XDG_SESSION_DESKTOP").ok(),
            hyprland_signature: present("HYPRLAND_INSTANCE_SIGNATURE"),
            wayland_display: present("WAYLAND_DISPLAY"),
            x11_display: present("DISPLAY"),
        }
    }

    pub fn is_hyprland(&self) -> bool {
        self.hyprland_signature || self.session_desktop.as_deref() == Some("Hyprland")
    }

    pub fn has_executable(&self, name: &str) -> bool {
        let Some(path) = self.path.as_ref() else {
            return false;
        };
        which::which_in(name, Some(path), Path::new(".")).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Tab,
    Space,
    Escape,
    Enter,
    Up,
    Down,
    Left,
    Right,
}

impl Key {
    pub const ALL: [Key; 8] = [
        Key::Tab,
        Key::Space,
        Key::Escape,
        Key::Enter,
        Key::Up,
        Key::Down,
        Key::Left,
        Key::Right,
    ];

    /// X keysym name, understood by both xdotool and wtype.
    pub fn keysym(self) -> &'static str {
        match self {
            Key::Tab => "Tab",
            Key::Space => "space",
            Key::Escape => "Escape",
            Key::Enter => "Return",
            Key::Up => "Up",
            Key::Down => "Down",
            Key::Left => "Left",
            Key::Right => "Right",
        }
    }

    /// macOS virtual key code for System Events.
    pub fn mac_key_code(self) -> u16 {
        match self {
            Key::Tab => 48,
            Key::Space => 49,
            Key::Escape => 53,
            Key::Enter => 36,
            Key::Left => 123,
            Key::Right => 124,
            Key::Down => 125,
            Key::Up => 126,
        }
    }
}

pub trait InputInjector {
    fn provider(&self) -> &str;

    /// `false` only for the no-op injector: nothing will ever be delivered.
    fn is_available(&self) -> bool {
        true
    }

    fn screen_size(&self) -> BackendOutcome<(u32, u32)>;
    fn click(&self, x: i32, y: i32) -> BackendOutcome;
    fn press(&self, key: Key) -> BackendOutcome;
    /// Positive scrolls up, negative down.
    fn scroll(&self, amount: i32) -> BackendOutcome;
}

pub trait ScreenCapturer {
    fn provider(&self) -> &str;
    fn capture(&self, out_path: &Path) -> BackendOutcome;
}

pub trait WindowActivator {
    fn provider(&self) -> &str;
    fn activate(&self, title: &str) -> BackendOutcome;
}

/// Provider names bound for a run, as recorded in the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendSummary {
    pub input_injection: String,
    pub screen_capture: String,
    pub window_activation: Vec<String>,
}

/// The providers bound for one run.
pub struct BackendSet {
    input: Box<dyn InputInjector>,
    capture: Box<dyn ScreenCapturer>,
    activators: Vec<Box<dyn WindowActivator>>,
}

impl BackendSet {
    pub fn new(
        input: Box<dyn InputInjector>,
        capture: Box<dyn ScreenCapturer>,
        activators: Vec<Box<dyn WindowActivator>>,
    ) -> Self {
        Self {
            input,
            capture,
            activators,
        }
    }

    /// Every capability bound to its no-op provider.
    pub fn noop() -> Self {
        Self::new(Box::new(NoOpInput), Box::new(NoOpCapture), Vec::new())
    }

    /// Probe `env` and bind the best available provider per capability.
    pub fn probe(env: &HostEnvironment, command_timeout: Duration) -> Self {
        let input_ranked = probe(Capability::InputInjection, env);
        let input: Box<dyn InputInjector> = match input_ranked.first().copied() {
            Some(Provider::Xdotool) => Box::new(XdotoolInput::new(command_timeout)),
            Some(Provider::Osascript) => Box::new(OsascriptInput::new(command_timeout)),
            Some(Provider::Wtype) => Box::new(WtypeInput::new(command_timeout)),
            _ => Box::new(NoOpInput),
        };

        let capture_ranked = probe(Capability::ScreenCapture, env);
        let capture: Box<dyn ScreenCapturer> = match capture_ranked.first().copied() {
            Some(Provider::Grim) => Box::new(GrimCapture::new(command_timeout)),
            Some(Provider::Screencapture) => Box::new(ScreencaptureCapture::new(command_timeout)),
            Some(Provider::ImageMagickImport) => Box::new(ImportCapture::new(command_timeout)),
            _ => Box::new(NoOpCapture),
        };

        let activators: Vec<Box<dyn WindowActivator>> = probe(Capability::WindowActivation, env)
            .into_iter()
            .filter_map(|provider| -> Option<Box<dyn WindowActivator>> {
                match provider {
                    Provider::Hyprctl => Some(Box::new(HyprctlWindow::new(command_timeout))),
                    Provider::Wmctrl => Some(Box::new(WmctrlWindow::new(command_timeout))),
                    Provider::Xdotool => Some(Box::new(XdotoolWindow::new(command_timeout))),
                    Provider::Osascript => Some(Box::new(OsascriptWindow::new(command_timeout))),
                    _ => None,
                }
            })
            .collect();

        let set = Self::new(input, capture, activators);
        set.log_degraded();
        set
    }

    fn log_degraded(&self) {
        let summary = self.summary();
        debug!(?summary, "bound backends");
        if !self.input.is_available() {
            warn!("no input injection backend available; chaos runs will only poll liveness");
        }
        if summary.screen_capture == Provider::NoOp.name() {
            warn!("no screenshot backend available; checkpoints will not be captured");
        }
        if self.activators.is_empty() {
            warn!("no window activation backend available; focus will be a no-op");
        }
    }

    pub fn input(&self) -> &dyn InputInjector {
        self.input.as_ref()
    }

    pub fn capture(&self) -> &dyn ScreenCapturer {
        self.capture.as_ref()
    }

    pub fn activators(&self) -> &[Box<dyn WindowActivator>] {
        &self.activators
    }

    pub fn summary(&self) -> BackendSummary {
        BackendSummary {
            input_injection: self.input.provider().to_string(),
            screen_capture: self.capture.provider().to_string(),
            window_activation: self
                .activators
                .iter()
                .map(|a| a.provider().to_string())
                .collect(),
        }
    }
}
