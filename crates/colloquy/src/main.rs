//! Runs a coder and a product manager in a group chat, with the human
//! behind a code executing user proxy.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::time::Duration;

use colloquy::TeamBuilder;
use colloquy::core::{HumanInputRequest, TranscriptRecord};
use colloquy_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

enum TeamEvent {
    Transcript(TranscriptRecord),
    HumanInput(HumanInputRequest),
}

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Ok(api_key) = env::var("OPENAI_API_KEY") else {
        eprintln!("OPENAI_API_KEY environment variable is not set");
        return;
    };
    let mut config = OpenAIConfigBuilder::with_api_key(api_key);
    if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    if let Ok(model) = env::var("OPENAI_MODEL") {
        config = config.with_model(model);
    }
    let model_provider = OpenAIProvider::new(config.build());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut team = TeamBuilder::with_model_provider(model_provider)
        .on_transcript({
            let event_tx = event_tx.clone();
            move |record| {
                event_tx.send(TeamEvent::Transcript(record.clone())).ok();
            }
        })
        .on_human_input({
            let event_tx = event_tx.clone();
            move |req| {
                event_tx.send(TeamEvent::HumanInput(req)).ok();
            }
        });
    if let Ok(work_dir) = env::var("COLLOQUY_WORK_DIR") {
        team = team.with_work_dir(work_dir);
    }
    let team = match team.build() {
        Ok(team) => team,
        Err(err) => {
            eprintln!("failed to set up the team: {err}");
            return;
        }
    };

    let args: Vec<_> = env::args().skip(1).collect();
    let task = if args.is_empty() {
        print!("Task: ");
        std::io::stdout().flush().ok();
        let Some(line) = read_line().await else {
            return;
        };
        line.trim().to_owned()
    } else {
        args.join(" ")
    };
    if task.is_empty() {
        eprintln!("no task was given");
        return;
    }

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .expect("template is valid")
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let run = team.run(task);
    tokio::pin!(run);
    let mut progress_bar = None;

    loop {
        progress_bar
            .get_or_insert_with(|| {
                let progress_bar = ProgressBar::new_spinner();
                progress_bar.set_style(progress_style.clone());
                progress_bar.set_message("🤔 Thinking...");
                progress_bar
            })
            .inc(1);

        let event = select! {
            result = &mut run => {
                if let Some(progress_bar) = progress_bar.take() {
                    progress_bar.finish_and_clear();
                }
                // Records emitted right before the chat ended.
                while let Ok(event) = event_rx.try_recv() {
                    if let TeamEvent::Transcript(record) = event {
                        print_record(&record);
                    }
                }
                if let Err(err) = result {
                    eprintln!("{} {err}", "error:".bright_red().bold());
                }
                break;
            },
            event = event_rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                event
            },
            _ = sleep(Duration::from_millis(100)) => {
                continue;
            }
        };

        // Finish the progress bar before printing anything else.
        if let Some(progress_bar) = progress_bar.take() {
            progress_bar.finish_and_clear();
        }

        match event {
            TeamEvent::Transcript(record) => print_record(&record),
            TeamEvent::HumanInput(req) => {
                let bar = BAR_CHAR.bright_yellow();
                println!("{bar}{}", req.prompt().bright_white().bold());
                print!("> ");
                std::io::stdout().flush().ok();

                match read_line().await {
                    Some(line) => req.respond(line.trim()),
                    // Treat EOF like an explicit exit.
                    None => req.respond("exit"),
                }
                println!();
            }
        }
    }
}

fn print_record(record: &TranscriptRecord) {
    let bar = if record.message.is_function() || record.message.function_call.is_some() {
        BAR_CHAR.bright_magenta().to_string()
    } else {
        BAR_CHAR.bright_cyan().to_string()
    };
    let text = record.to_string();
    let mut lines = text.lines();
    if let Some(header) = lines.next() {
        println!("{bar}{}", header.bright_white().bold());
    }
    for line in lines {
        println!("{bar}{line}");
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
