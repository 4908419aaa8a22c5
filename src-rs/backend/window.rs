use super::command::{args, run_bounded};
use super::{BackendOutcome, Provider, WindowActivator};
use std::time::Duration;

/// `hyprctl dispatch focuswindow title:^<title>$`. The title is matched
/// exactly, so regex metacharacters in it are escaped.
pub struct HyprctlWindow {
    program: String,
    timeout: Duration,
}

impl HyprctlWindow {
    pub fn new(timeout: Duration) -> Self {
        Self::with_program("hyprctl", timeout)
    }

    pub(crate) fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

pub(crate) fn hyprland_title_selector(title: &str) -> String {
    format!("title:^{}$", regex::escape(title))
}

impl WindowActivator for HyprctlWindow {
    fn provider(&self) -> &str {
        Provider::Hyprctl.name()
    }

    fn activate(&self, title: &str) -> BackendOutcome {
        let selector = hyprland_title_selector(title);
        match run_bounded(
            &self.program,
            &args(["dispatch", "focuswindow", selector.as_str()]),
            self.timeout,
        ) {
            // hyprctl exits 0 even when the dispatcher rejects the request.
            BackendOutcome::Success(reply) if reply == "ok" => BackendOutcome::Success(()),
            BackendOutcome::Success(reply) => {
                BackendOutcome::TransientFailure(format!("hyprctl: {reply}"))
            }
            other => other.map(|_| ()),
        }
    }
}

/// `wmctrl -a <title>`: activates the first window whose title contains it.
pub struct WmctrlWindow {
    program: String,
    timeout: Duration,
}

impl WmctrlWindow {
    pub fn new(timeout: Duration) -> Self {
        Self::with_program("wmctrl", timeout)
    }

    pub(crate) fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl WindowActivator for WmctrlWindow {
    fn provider(&self) -> &str {
        Provider::Wmctrl.name()
    }

    fn activate(&self, title: &str) -> BackendOutcome {
        run_bounded(&self.program, &args(["-a", title]), self.timeout).map(|_| ())
    }
}

/// Native enumeration: `xdotool search --name`, then activate the first hit.
pub struct XdotoolWindow {
    program: String,
    timeout: Duration,
}

impl XdotoolWindow {
    pub fn new(timeout: Duration) -> Self {
        Self::with_program("xdotool", timeout)
    }

    pub(crate) fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl WindowActivator for XdotoolWindow {
    fn provider(&self) -> &str {
        Provider::Xdotool.name()
    }

    fn activate(&self, title: &str) -> BackendOutcome {
        let pattern = regex::escape(title);
        let ids = match run_bounded(
            &self.program,
            &args(["search", "--name", pattern.as_str()]),
            self.timeout,
        ) {
            BackendOutcome::Success(raw) => raw,
            // xdotool search exits 1 when nothing matches.
            BackendOutcome::TransientFailure(_) => String::new(),
            BackendOutcome::Unsupported => return BackendOutcome::Unsupported,
        };
        let Some(first) = ids.lines().map(str::trim).find(|l| !l.is_empty()) else {
            return BackendOutcome::TransientFailure(format!("no window titled like {title:?}"));
        };
        run_bounded(&self.program, &args(["windowactivate", first]), self.timeout).map(|_| ())
    }
}

/// macOS: raise the first window, across regular applications, whose title
/// contains the target title. The title is passed as a script argument.
pub struct OsascriptWindow {
    program: String,
    timeout: Duration,
}

impl OsascriptWindow {
    pub fn new(timeout: Duration) -> Self {
        Self::with_program("osascript", timeout)
    }

    pub(crate) fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

pub(crate) const ACTIVATION_SCRIPT: &str = r#"
on run argv
  set wanted to item 1 of argv
  try
    tell application "System Events"
      repeat with procRef in (every process whose background only is false)
        set hits to (every window of procRef whose name contains wanted)
        if (count of hits) > 0 then
          set frontmost of procRef to true
          perform action "AXRaise" of item 1 of hits
          return "ok"
        end if
      end repeat
    end tell
    return "err:no_window"
  on error errMsg number errNum
    return "err:" & errNum & ":" & errMsg
  end try
end run
"#;

impl WindowActivator for OsascriptWindow {
    fn provider(&self) -> &str {
        Provider::Osascript.name()
    }

    fn activate(&self, title: &str) -> BackendOutcome {
        match run_bounded(
            &self.program,
            &args(["-e", ACTIVATION_SCRIPT, title]),
            self.timeout,
        ) {
            BackendOutcome::Success(reply) if reply.starts_with("err:") => {
                BackendOutcome::TransientFailure(reply)
            }
            other => other.map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyprland_selector_is_anchored_and_escaped() {
        assert_eq!(hyprland_title_selector("BetterWallpaper"), "title:^BetterWallpaper$");
        assert_eq!(hyprland_title_selector("App (beta)"), r"title:^App \(beta\)$");
    }

    #[test]
    fn activation_script_matches_windows_by_title() {
        assert!(ACTIVATION_SCRIPT.contains("every window of procRef whose name contains wanted"));
        assert!(ACTIVATION_SCRIPT.contains("set wanted to item 1 of argv"));
        assert!(!ACTIVATION_SCRIPT.contains("tell application wanted"));
    }

    #[cfg(unix)]
    mod fake_tools {
        use super::*;
        use crate::backend::tests::{fake_bin_dir, fake_tool};

        const TIMEOUT: Duration = Duration::from_secs(5);

        #[test]
        fn hyprctl_ok_reply_is_success() {
            let bins = fake_bin_dir(&[]);
            let hyprctl = fake_tool(bins.path(), "hyprctl", "echo ok");
            let outcome = HyprctlWindow::with_program(hyprctl, TIMEOUT).activate("BetterWallpaper");
            assert_eq!(outcome, BackendOutcome::Success(()));
        }

        #[test]
        fn hyprctl_rejection_with_zero_exit_is_transient() {
            let bins = fake_bin_dir(&[]);
            let hyprctl = fake_tool(bins.path(), "hyprctl", "echo 'No such window found'");
            match HyprctlWindow::with_program(hyprctl, TIMEOUT).activate("BetterWallpaper") {
                BackendOutcome::TransientFailure(msg) => {
                    assert!(msg.contains("No such window found"), "{msg}")
                }
                other => panic!("expected transient failure, got {other:?}"),
            }
        }

        #[test]
        fn xdotool_without_matches_is_transient() {
            let bins = fake_bin_dir(&[]);
            let xdotool = fake_tool(bins.path(), "xdotool", "exit 1");
            match XdotoolWindow::with_program(xdotool, TIMEOUT).activate("BetterWallpaper") {
                BackendOutcome::TransientFailure(msg) => {
                    assert!(msg.contains("no window titled"), "{msg}")
                }
                other => panic!("expected transient failure, got {other:?}"),
            }
        }

        #[test]
        fn xdotool_activates_first_search_hit() {
            let bins = fake_bin_dir(&[]);
            let xdotool = fake_tool(
                bins.path(),
                "xdotool",
                r#"case "$1" in
  search) printf '4242\n4343\n' ;;
  windowactivate) [ "$2" = 4242 ] ;;
  *) exit 9 ;;
esac"#,
            );
            let outcome = XdotoolWindow::with_program(xdotool, TIMEOUT).activate("BetterWallpaper");
            assert_eq!(outcome, BackendOutcome::Success(()));
        }

        #[test]
        fn osascript_error_reply_is_transient() {
            let bins = fake_bin_dir(&[]);
            let osascript = fake_tool(
                bins.path(),
                "osascript",
                r#"[ "$3" = "My App" ] && echo err:no_window"#,
            );
            match OsascriptWindow::with_program(osascript, TIMEOUT).activate("My App") {
                BackendOutcome::TransientFailure(msg) => assert_eq!(msg, "err:no_window"),
                other => panic!("expected transient failure, got {other:?}"),
            }
        }
    }
}
