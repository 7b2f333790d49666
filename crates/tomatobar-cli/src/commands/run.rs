//! Interactive timer session.
//!
//! One line per command on stdin; notifications and prompts go to stdout.

use clap::Args;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use tomatobar_core::storage::{log_path, JsonlEventLog};
use tomatobar_core::timer::{EngineSnapshot, Notification, Notifier, Player, State, SystemClock, TimerHandle};
use tomatobar_core::url_command::URL_SCHEME;
use tomatobar_core::{parse_command_url, Config, TimerService, UrlCommand};

#[derive(Args)]
pub struct RunArgs {
    /// Declare a goal and start working on it right away
    #[arg(long)]
    goal: Option<String>,
    /// Run the goal as a single dash of this many minutes
    #[arg(long, requires = "goal")]
    dash: Option<u32>,
}

const HELP: &str = "\
commands:
  s               start / stop
  p               pause / resume
  k               skip rest
  g <goal>        start working on a goal
  d <min> <goal>  dash on a goal for <min> minutes
  c               continue the last completed goal
  y | n           answer the back-to-work prompt
  status          print the timer state as JSON
  tomatobar://... run a command URL
  q               quit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Empty,
    StartStop,
    Pause,
    SkipRest,
    Goal(String),
    Dash { minutes: u32, goal: String },
    Continue,
    Answer(bool),
    Url(UrlCommand),
    Status,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Result<Input, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    if line
        .get(..URL_SCHEME.len() + 1)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("tomatobar:"))
    {
        return parse_command_url(line).map(Input::Url).map_err(|e| e.to_string());
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let input = match word.to_ascii_lowercase().as_str() {
        "s" | "start" | "stop" => Input::StartStop,
        "p" | "pause" | "resume" => Input::Pause,
        "k" | "skip" => Input::SkipRest,
        "c" | "continue" => Input::Continue,
        "y" | "yes" => Input::Answer(true),
        "n" | "no" => Input::Answer(false),
        "status" => Input::Status,
        "h" | "help" | "?" => Input::Help,
        "q" | "quit" | "exit" => Input::Quit,
        "g" | "goal" if !rest.is_empty() => Input::Goal(rest.to_string()),
        "g" | "goal" => return Err("usage: g <goal>".into()),
        "d" | "dash" => {
            let (minutes, goal) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "usage: d <minutes> <goal>".to_string())?;
            let minutes = minutes
                .parse::<u32>()
                .map_err(|_| format!("not a number of minutes: {minutes}"))?;
            Input::Dash {
                minutes,
                goal: goal.trim().to_string(),
            }
        }
        other => return Err(format!("unknown command: {other} (try 'help')")),
    };
    Ok(input)
}

/// Prints notifications and the back-to-work prompt to stdout.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn send(&self, notification: Notification) {
        println!("[{}] {}", notification.title, notification.body);
    }

    fn request_return_confirmation(&self, countdown: Duration, goal: &str) {
        let goal = if goal.is_empty() { "work" } else { goal };
        println!(
            "Back to {goal}? [y/n] (stops in {}s without an answer)",
            countdown.as_secs()
        );
    }
}

/// Rings the terminal bell for the end-of-interval ding; other cues are
/// only traced.
struct ConsolePlayer;

impl Player for ConsolePlayer {
    fn play_windup(&self) {
        debug!("windup");
    }

    fn start_ticking(&self) {
        debug!("ticking on");
    }

    fn stop_ticking(&self) {
        debug!("ticking off");
    }

    fn play_ding(&self) {
        print!("\x07");
        let _ = std::io::stdout().flush();
    }
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let log = JsonlEventLog::open(log_path()?)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(session(config, log, args))
}

async fn session(config: Config, log: JsonlEventLog, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (service, handle) = TimerService::new(
        config.timer,
        Arc::new(SystemClock),
        Box::new(log),
        Box::new(ConsoleNotifier),
        Box::new(ConsolePlayer),
    );
    let mut service_task = tokio::spawn(service.run());

    if let Some(goal) = args.goal {
        handle.start_with_goal(goal, args.dash.is_some(), args.dash)?;
    }
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut finished = None;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_input(&line) {
                    Ok(Input::Quit) => break,
                    Ok(input) => {
                        if let Err(e) = dispatch(&handle, input).await {
                            debug!(error = %e, "service is gone");
                            break;
                        }
                    }
                    Err(message) => eprintln!("{message}"),
                }
            }
            result = &mut service_task => {
                finished = Some(result);
                break;
            }
        }
    }

    let result = match finished {
        Some(result) => result,
        None => {
            let _ = handle.shutdown();
            service_task.await
        }
    };
    result??;
    Ok(())
}

/// Why `input` cannot be sent in the current state, if it cannot. Pause and
/// skip-rest outside their states are protocol violations that would end
/// the session, so they are refused here instead.
fn unavailable(input: &Input, snapshot: &EngineSnapshot) -> Option<&'static str> {
    let allowed = match input {
        Input::Pause => matches!(snapshot.state, State::Work | State::Rest | State::Paused),
        Input::SkipRest => snapshot.state == State::Rest,
        _ => return None,
    };
    if snapshot.return_pending {
        Some("answer the back-to-work prompt first (y/n)")
    } else if !allowed {
        Some(match input {
            Input::Pause => "nothing to pause",
            _ => "skip is only available during a rest",
        })
    } else {
        None
    }
}

async fn dispatch(handle: &TimerHandle, input: Input) -> tomatobar_core::error::Result<()> {
    if matches!(input, Input::Pause | Input::SkipRest) {
        let snapshot = handle.snapshot().await?;
        if let Some(message) = unavailable(&input, &snapshot) {
            eprintln!("{message}");
            return Ok(());
        }
    }
    match input {
        Input::Empty | Input::Quit => Ok(()),
        Input::Help => {
            println!("{HELP}");
            Ok(())
        }
        Input::StartStop => handle.start_stop(),
        Input::Pause => handle.pause(),
        Input::SkipRest => handle.skip_rest(),
        Input::Goal(goal) => handle.start_with_goal(goal, false, None),
        Input::Dash { minutes, goal } => handle.start_with_goal(goal, true, Some(minutes)),
        Input::Continue => handle.continue_goal(),
        Input::Answer(accepted) => handle.confirm_return_to_work(accepted),
        Input::Url(command) => handle.url_command(command),
        Input::Status => {
            let snapshot = handle.snapshot().await?;
            match serde_json::to_string_pretty(&snapshot) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("cannot render status: {e}"),
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tomatobar_core::timer::Session;
    use tomatobar_core::TimerConfig;

    fn snapshot(state: State, return_pending: bool) -> EngineSnapshot {
        EngineSnapshot {
            state,
            remaining_secs: None,
            session: Session::new(&TimerConfig::default()),
            return_pending,
            last_completed_goal: None,
            at: Utc::now(),
        }
    }

    #[test]
    fn single_letter_commands() {
        assert_eq!(parse_input("s"), Ok(Input::StartStop));
        assert_eq!(parse_input(" P "), Ok(Input::Pause));
        assert_eq!(parse_input("k"), Ok(Input::SkipRest));
        assert_eq!(parse_input("y"), Ok(Input::Answer(true)));
        assert_eq!(parse_input("n"), Ok(Input::Answer(false)));
        assert_eq!(parse_input(""), Ok(Input::Empty));
        assert_eq!(parse_input("quit"), Ok(Input::Quit));
    }

    #[test]
    fn goal_and_dash_take_arguments() {
        assert_eq!(
            parse_input("g write the intro"),
            Ok(Input::Goal("write the intro".into()))
        );
        assert_eq!(
            parse_input("d 15 clear inbox"),
            Ok(Input::Dash {
                minutes: 15,
                goal: "clear inbox".into()
            })
        );
        assert!(parse_input("g").is_err());
        assert!(parse_input("d soon inbox").is_err());
        assert!(parse_input("d 15").is_err());
    }

    #[test]
    fn urls_are_recognized() {
        assert_eq!(
            parse_input("TomatoBar://startstop"),
            Ok(Input::Url(UrlCommand::StartStop))
        );
        assert!(parse_input("tomatobar://launch").is_err());
    }

    #[test]
    fn unknown_words_are_rejected() {
        assert!(parse_input("dance").is_err());
    }

    #[test]
    fn pause_and_skip_are_refused_outside_their_states() {
        assert!(unavailable(&Input::Pause, &snapshot(State::Idle, false)).is_some());
        assert!(unavailable(&Input::SkipRest, &snapshot(State::Idle, false)).is_some());
        assert!(unavailable(&Input::SkipRest, &snapshot(State::Work, false)).is_some());
        assert!(unavailable(&Input::SkipRest, &snapshot(State::Paused, false)).is_some());

        for state in [State::Work, State::Rest, State::Paused] {
            assert_eq!(unavailable(&Input::Pause, &snapshot(state, false)), None);
        }
        assert_eq!(unavailable(&Input::SkipRest, &snapshot(State::Rest, false)), None);
    }

    #[test]
    fn pending_return_prompt_blocks_pause_and_skip() {
        let pending = snapshot(State::Rest, true);
        assert!(unavailable(&Input::Pause, &pending).is_some());
        assert!(unavailable(&Input::SkipRest, &pending).is_some());
        assert_eq!(unavailable(&Input::StartStop, &pending), None);
        assert_eq!(unavailable(&Input::Answer(true), &pending), None);
    }
}
