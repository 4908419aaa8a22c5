use super::command::{args, run_bounded};
use super::{BackendOutcome, InputInjector, Key, Provider};
use std::time::Duration;

/// X11 automation through xdotool: keys, pointer, wheel and display geometry.
pub struct XdotoolInput {
    timeout: Duration,
}

impl XdotoolInput {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn xdotool(&self, argv: Vec<String>) -> BackendOutcome<String> {
        run_bounded("xdotool", &argv, self.timeout)
    }
}

impl InputInjector for XdotoolInput {
    fn provider(&self) -> &str {
        Provider::Xdotool.name()
    }

    fn screen_size(&self) -> BackendOutcome<(u32, u32)> {
        match self.xdotool(args(["getdisplaygeometry"])) {
            BackendOutcome::Success(raw) => match parse_geometry(&raw) {
                Some(size) => BackendOutcome::Success(size),
                None => BackendOutcome::TransientFailure(format!(
                    "unparseable display geometry: {raw:?}"
                )),
            },
            BackendOutcome::Unsupported => BackendOutcome::Unsupported,
            BackendOutcome::TransientFailure(msg) => BackendOutcome::TransientFailure(msg),
        }
    }

    fn click(&self, x: i32, y: i32) -> BackendOutcome {
        self.xdotool(vec![
            "mousemove".to_string(),
            x.to_string(),
            y.to_string(),
            "click".to_string(),
            "1".to_string(),
        ])
        .map(|_| ())
    }

    fn press(&self, key: Key) -> BackendOutcome {
        self.xdotool(args(["key", key.keysym()])).map(|_| ())
    }

    fn scroll(&self, amount: i32) -> BackendOutcome {
        if amount == 0 {
            return BackendOutcome::Success(());
        }
        // Wheel up is button 4, wheel down is button 5.
        let button = if amount > 0 { "4" } else { "5" };
        self.xdotool(vec![
            "click".to_string(),
            "--repeat".to_string(),
            amount.unsigned_abs().to_string(),
            button.to_string(),
        ])
        .map(|_| ())
    }
}

/// Wayland virtual keyboard. Keys only; no pointer.
pub struct WtypeInput {
    timeout: Duration,
}

impl WtypeInput {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl InputInjector for WtypeInput {
    fn provider(&self) -> &str {
        Provider::Wtype.name()
    }

    fn screen_size(&self) -> BackendOutcome<(u32, u32)> {
        BackendOutcome::Unsupported
    }

    fn click(&self, _x: i32, _y: i32) -> BackendOutcome {
        BackendOutcome::Unsupported
    }

    fn press(&self, key: Key) -> BackendOutcome {
        run_bounded("wtype", &args(["-k", key.keysym()]), self.timeout).map(|_| ())
    }

    fn scroll(&self, _amount: i32) -> BackendOutcome {
        BackendOutcome::Unsupported
    }
}

/// macOS System Events key codes. Pointer events need a helper we do not ship.
pub struct OsascriptInput {
    timeout: Duration,
}

impl OsascriptInput {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl InputInjector for OsascriptInput {
    fn provider(&self) -> &str {
        Provider::Osascript.name()
    }

    fn screen_size(&self) -> BackendOutcome<(u32, u32)> {
        let script = "tell application \"Finder\" to get bounds of window of desktop";
        match run_bounded("osascript", &args(["-e", script]), self.timeout) {
            BackendOutcome::Success(raw) => match parse_finder_bounds(&raw) {
                Some(size) => BackendOutcome::Success(size),
                None => BackendOutcome::TransientFailure(format!("unparseable bounds: {raw:?}")),
            },
            BackendOutcome::Unsupported => BackendOutcome::Unsupported,
            BackendOutcome::TransientFailure(msg) => BackendOutcome::TransientFailure(msg),
        }
    }

    fn click(&self, _x: i32, _y: i32) -> BackendOutcome {
        BackendOutcome::Unsupported
    }

    fn press(&self, key: Key) -> BackendOutcome {
        let script = format!(
            "tell application \"System Events\" to key code {}",
            key.mac_key_code()
        );
        run_bounded("osascript", &args(["-e", script.as_str()]), self.timeout).map(|_| ())
    }

    fn scroll(&self, _amount: i32) -> BackendOutcome {
        BackendOutcome::Unsupported
    }
}

pub struct NoOpInput;

impl InputInjector for NoOpInput {
    fn provider(&self) -> &str {
        Provider::NoOp.name()
    }

    fn is_available(&self) -> bool {
        false
    }

    fn screen_size(&self) -> BackendOutcome<(u32, u32)> {
        BackendOutcome::Unsupported
    }

    fn click(&self, _x: i32, _y: i32) -> BackendOutcome {
        BackendOutcome::Unsupported
    }

    fn press(&self, _key: Key) -> BackendOutcome {
        BackendOutcome::Unsupported
    }

    fn scroll(&self, _amount: i32) -> BackendOutcome {
        BackendOutcome::Unsupported
    }
}

/// `xdotool getdisplaygeometry` prints `"<w> <h>"`.
fn parse_geometry(raw: &str) -> Option<(u32, u32)> {
    let mut parts = raw.split_whitespace();
    let w = parts.next()?.parse::<u32>().ok()?;
    let h = parts.next()?.parse::<u32>().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

/// Finder desktop bounds come back as `"x1, y1, x2, y2"`.
fn parse_finder_bounds(raw: &str) -> Option<(u32, u32)> {
    let values: Vec<i64> = raw
        .split(',')
        .map(|v| v.trim().parse::<i64>())
        .collect::<Result<_, _>>()
        .ok()?;
    let [x1, y1, x2, y2] = values.as_slice() else {
        return None;
    };
    let w = u32::try_from(x2 - x1).ok()?;
    let h = u32::try_from(y2 - y1).ok()?;
    (w > 0 && h > 0).then_some((w, h))
}
