use clap::Parser;
use crossterm::{
    event::{KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
    tty::IsTty,
};
use std::io::{self, stdin, Write};
use std::time::Duration;
use typometer::{
    metrics::TestResult,
    runtime::{CrosstermEvents, Event, Runner},
    session::TestSession,
    TICK_RATE_MS,
};

const DEFAULT_PASSAGE: &str =
    "the quick brown fox jumps over the lazy dog while the typist races the clock";

/// real-time typing speed test in your terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Type the passage shown; live WPM, accuracy, and progress update as you go. Esc ends the test early."
)]
struct Cli {
    /// custom passage to type
    #[clap(short = 'p', long)]
    passage: Option<String>,

    /// debounce delay for stat notifications, in milliseconds (floor 10)
    #[clap(short = 'u', long, default_value_t = 100)]
    update_frequency: u64,

    /// print the final result as JSON
    #[clap(long)]
    json: bool,
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        eprintln!("typometer needs an interactive terminal");
        std::process::exit(2);
    }

    let target = cli.passage.unwrap_or_else(|| DEFAULT_PASSAGE.to_string());

    let mut session = TestSession::new();
    session.set_update_frequency(Duration::from_millis(cli.update_frequency));

    println!("Type the following, then press Esc or finish the passage:\n");
    println!("  {target}\n");

    enable_raw_mode()?;
    let outcome = run(&mut session, &target);
    disable_raw_mode()?;

    let result = session.end_test();
    println!();
    outcome?;
    report(&result, cli.json)
}

fn run(session: &mut TestSession, target: &str) -> io::Result<()> {
    let runner = Runner::new(
        CrosstermEvents::new(),
        Duration::from_millis(TICK_RATE_MS),
    );
    let mut typed = String::new();
    let mut stdout = io::stdout();

    session.start_test();
    // Seed the target so progress fields are meaningful before the first
    // keystroke and the untyped passage does not read as complete.
    session.update_progress(Some(""), Some(target));
    render_status(&mut stdout, session)?;

    loop {
        match runner.step() {
            Event::Key(key) if key.kind != KeyEventKind::Release => match key.code {
                KeyCode::Esc => break,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                KeyCode::Backspace => {
                    typed.pop();
                    session.update_progress(Some(&typed), Some(target));
                    render_status(&mut stdout, session)?;
                }
                KeyCode::Char(c) => {
                    typed.push(c);
                    session.update_progress(Some(&typed), Some(target));
                    render_status(&mut stdout, session)?;
                }
                _ => {}
            },
            Event::Key(_) | Event::Resize => {}
            Event::Tick => {
                if session.on_tick() {
                    render_status(&mut stdout, session)?;
                }
            }
        }

        if session.stats().is_complete {
            break;
        }
    }

    Ok(())
}

fn render_status(out: &mut impl Write, session: &TestSession) -> io::Result<()> {
    let stats = session.stats();
    write!(
        out,
        "\r{:>3} wpm | {:>3}% acc | {:>3}/{} chars | {:>6.2}% | {:>4}s   ",
        stats.wpm,
        stats.accuracy,
        stats.characters_typed,
        stats.total_characters,
        stats.completion_percentage,
        stats.time_elapsed_ms / 1000,
    )?;
    out.flush()
}

fn report(result: &TestResult, json: bool) -> io::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    let fmt_time = |t: Option<std::time::SystemTime>| {
        t.map_or_else(
            || "-".to_string(),
            |t| {
                chrono::DateTime::<chrono::Local>::from(t)
                    .format("%H:%M:%S")
                    .to_string()
            },
        )
    };

    println!(
        "{} wpm, {}% accuracy over {:.1}s ({} of {} characters, {})",
        result.wpm,
        result.accuracy,
        result.duration_ms as f64 / 1000.0,
        result.characters_typed,
        result.total_characters,
        if result.is_complete {
            "completed"
        } else {
            "abandoned"
        },
    );
    println!(
        "started {} / ended {}",
        fmt_time(result.start_time),
        fmt_time(result.end_time)
    );
    Ok(())
}
