//! Line-oriented operator console on stdin.

use std::io::BufRead;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use chrono::Local;
use plunge_core::gateways::{NotificationSink, PersistenceGateway, SensorGateway};
use plunge_runtime::{MonitorSupervisor, StatusSnapshot};
use tokio::sync::mpsc;

pub const HELP: &str = "\
Commands:
  ozone start <minutes>   start (or restart) an ozone run
  ozone stop              stop the current ozone run
  target <°F>             notify once when the water reaches this temperature
  target clear            stop watching the water temperature
  pump on|off|status      control or query the pump
  status                  show current readings and state
  help                    show this help
  quit                    shut down the monitor";

// ── Commands ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpAction {
    On,
    Off,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleCommand {
    OzoneStart { minutes: u32 },
    OzoneStop,
    Target(f64),
    ClearTarget,
    Pump(PumpAction),
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> anyhow::Result<Self> {
        let words: Vec<String> = line.split_whitespace().map(str::to_lowercase).collect();
        let words: Vec<&str> = words.iter().map(String::as_str).collect();

        let command = match words.as_slice() {
            ["ozone", "start", minutes] => Self::OzoneStart {
                minutes: minutes
                    .parse()
                    .with_context(|| format!("invalid minutes: {minutes}"))?,
            },
            ["ozone", "stop"] => Self::OzoneStop,
            ["target", "clear" | "off"] => Self::ClearTarget,
            ["target", temp] => Self::Target(
                temp.parse()
                    .with_context(|| format!("invalid temperature: {temp}"))?,
            ),
            ["pump", "on"] => Self::Pump(PumpAction::On),
            ["pump", "off"] => Self::Pump(PumpAction::Off),
            ["pump", "status"] => Self::Pump(PumpAction::Status),
            ["status"] => Self::Status,
            ["help" | "?"] => Self::Help,
            ["quit" | "exit"] => Self::Quit,
            [] => bail!("empty command"),
            _ => return Err(anyhow!("unknown command: {}", line.trim())),
        };
        Ok(command)
    }
}

// ── Status rendering ──────────────────────────────────────────────────────────

fn fmt_temp(value: Option<f64>) -> String {
    value.map_or_else(|| "--".to_string(), |v| format!("{v:.1}°F"))
}

/// `"14m 05s"` style remaining-time text.
fn fmt_remaining(secs: i64) -> String {
    format!("{}m {:02}s", secs / 60, secs % 60)
}

pub fn format_status(status: &StatusSnapshot) -> String {
    let sampled = status
        .last_sample_at
        .map(|at| at.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());

    let ozone = if status.ozone.running {
        let left = status.ozone_remaining_secs.map(fmt_remaining).unwrap_or_default();
        format!("running, {left} left ({})", status.ozone.status_message)
    } else {
        format!("off ({})", status.ozone.status_message)
    };

    let leak = match (&status.latest_leak, status.leak_present) {
        (Some(record), true) => format!(
            "DETECTED since {}",
            record.detected_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        ),
        (None, true) => "DETECTED".to_string(),
        (_, false) => "none".to_string(),
    };

    let target = match status.target {
        Some(t) if t.active => format!("{:.1}°F (watching)", t.target_temp_f),
        Some(t) => format!("{:.1}°F (reached)", t.target_temp_f),
        None => "none".to_string(),
    };

    format!(
        "Water:  {}\nRoom:   {}\nSample: {sampled}\nOzone:  {ozone}\nLeak:   {leak}\nTarget: {target}",
        fmt_temp(status.water_temp_f),
        fmt_temp(status.room_temp_f),
    )
}

// ── Execution ─────────────────────────────────────────────────────────────────

/// Apply `command` and return the text to print. `Quit` is handled by the
/// caller.
pub async fn execute<S, P, N>(
    monitor: &MonitorSupervisor<S, P, N>,
    command: ConsoleCommand,
) -> anyhow::Result<String>
where
    S: SensorGateway,
    P: PersistenceGateway,
    N: NotificationSink,
{
    let reply = match command {
        ConsoleCommand::OzoneStart { minutes } => {
            monitor.ozone_control().start(minutes).await?;
            format!("Ozone started for {minutes} minutes")
        }
        ConsoleCommand::OzoneStop => {
            monitor.ozone_control().stop().await?;
            "Ozone stopped".to_string()
        }
        ConsoleCommand::Target(temp) => {
            monitor.temperature_control().set_target(temp).await?;
            format!("Watching for water at {temp:.1}°F")
        }
        ConsoleCommand::ClearTarget => {
            monitor.temperature_control().clear_target().await?;
            "Target cleared".to_string()
        }
        ConsoleCommand::Pump(PumpAction::On) => {
            if monitor.status().leak_present {
                bail!("leak present; pump stays off");
            }
            monitor.sensors().turn_pump_on().await?;
            "Pump on".to_string()
        }
        ConsoleCommand::Pump(PumpAction::Off) => {
            monitor.sensors().turn_pump_off().await?;
            "Pump off".to_string()
        }
        ConsoleCommand::Pump(PumpAction::Status) => {
            let on = monitor.sensors().is_pump_on().await?;
            format!("Pump is {}", if on { "on" } else { "off" })
        }
        ConsoleCommand::Status => format_status(&monitor.status()),
        ConsoleCommand::Help | ConsoleCommand::Quit => HELP.to_string(),
    };
    Ok(reply)
}

/// Forward stdin lines from a plain thread. Blocking stdin reads cannot be
/// cancelled, so the reader stays off the runtime's blocking pool.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Serve console commands until `quit`. If stdin closes the console goes
/// quiet and this never returns.
pub async fn run<S, P, N>(
    monitor: &MonitorSupervisor<S, P, N>,
    mut lines: mpsc::Receiver<String>,
) -> anyhow::Result<()>
where
    S: SensorGateway,
    P: PersistenceGateway,
    N: NotificationSink,
{
    loop {
        let Some(line) = lines.recv().await else {
            tracing::debug!("stdin closed; console disabled");
            std::future::pending::<()>().await;
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<ConsoleCommand>() {
            Ok(ConsoleCommand::Quit) => return Ok(()),
            Ok(command) => match execute(monitor, command).await {
                Ok(reply) => println!("{reply}"),
                Err(e) => println!("error: {e}"),
            },
            Err(e) => println!("error: {e} (type 'help')"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
