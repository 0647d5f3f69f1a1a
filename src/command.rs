use std::str::FromStr;

use anyhow::{Context, Result, bail};

use crate::types::Direction;

pub const HELP: &str = "\
commands:
  notify on|off        desktop notifications
  sound on|off         bell on changes
  volume <0-100>       bell volume
  direction all|bull|bear
  key [value]          set access key (empty clears it) and reconnect
  test                 show a sample alert
  dismiss <id>         remove one alert
  clear                remove every alert
  alerts               list alerts
  settings             show current settings
  help
  quit";

/// A line typed on stdin.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Notifications(bool),
    Sound(bool),
    /// Volume in `0.0..=1.0`.
    Volume(f64),
    Direction(Direction),
    Key(String),
    Test,
    Dismiss(u64),
    Clear,
    Alerts,
    Settings,
    Help,
    Quit,
}

fn parse_toggle(arg: &str) -> Result<bool> {
    match arg.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "off" | "false" | "0" | "no" => Ok(false),
        other => bail!("expected on or off, got {other:?}"),
    }
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };

        let cmd = match word.to_ascii_lowercase().as_str() {
            "notify" | "notifications" => Command::Notifications(parse_toggle(rest)?),
            "sound" => Command::Sound(parse_toggle(rest)?),
            "volume" | "vol" => {
                let pct: f64 = rest
                    .trim_end_matches('%')
                    .parse()
                    .with_context(|| format!("invalid volume {rest:?}"))?;
                if !(0.0..=100.0).contains(&pct) {
                    bail!("volume must be between 0 and 100");
                }
                Command::Volume(pct / 100.0)
            }
            "direction" | "dir" => Command::Direction(rest.parse()?),
            "key" => Command::Key(rest.to_string()),
            "test" => Command::Test,
            "dismiss" => Command::Dismiss(
                rest.trim_start_matches('#')
                    .parse()
                    .with_context(|| format!("invalid alert id {rest:?}"))?,
            ),
            "clear" => Command::Clear,
            "alerts" => Command::Alerts,
            "settings" | "status" => Command::Settings,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            "" => bail!("empty command"),
            other => bail!("unknown command {other:?} (type help)"),
        };
        Ok(cmd)
    }
}
