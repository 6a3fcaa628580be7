#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;
mod setup;

use std::io::Write;

use args::Args;
use clap::Parser;
use futures_util::StreamExt;
use moonshot_chat::{ChatModel, ChatOptions, ChatResponse, Message, MessageAggregator, Prompt, Usage};
use moonshot_config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    let telemetry = moonshot_telemetry::init(config.telemetry.as_ref(), &args.log)?;

    tracing::debug!(
        config_path = %args.config.display(),
        stream = args.stream,
        otlp = telemetry.is_exporting(),
        "starting moonshot"
    );

    let model = setup::chat_model(config)?;
    let prompt = prompt(&args);

    tokio::select! {
        result = run(&model, prompt, args.stream) => result,
        () = interrupted() => {
            tracing::info!("interrupted");
            Ok(())
        }
    }
}

fn prompt(args: &Args) -> Prompt {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &args.system {
        messages.push(Message::system(system.clone()));
    }
    messages.push(Message::user(args.prompt.clone()));

    let mut options = ChatOptions::default();
    options.model.clone_from(&args.model);

    Prompt::new(messages).with_options(options)
}

async fn run(model: &ChatModel, prompt: Prompt, stream: bool) -> anyhow::Result<()> {
    let response = if stream {
        stream_to_stdout(model, prompt).await?
    } else {
        let response = model.call(prompt).await?;
        println!("{}", response.text().unwrap_or_default());
        response
    };

    print_usage(response.usage());
    Ok(())
}

/// Print each snapshot's text as it arrives, returning the coalesced response
async fn stream_to_stdout(model: &ChatModel, prompt: Prompt) -> anyhow::Result<ChatResponse> {
    let mut snapshots = model.stream(prompt);
    let mut aggregator = MessageAggregator::new();
    let mut stdout = std::io::stdout();

    while let Some(snapshot) = snapshots.next().await {
        let snapshot = snapshot?;
        if let Some(text) = snapshot.text() {
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
        aggregator.push(&snapshot);
    }

    writeln!(stdout)?;
    Ok(aggregator.finish())
}

fn print_usage(usage: Usage) {
    eprintln!(
        "usage: prompt={} completion={} total={}",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
    );
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
