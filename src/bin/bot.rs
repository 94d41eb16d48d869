use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use arena_bot::agent::Agent;
use arena_bot::config::AgentConfig;
use arena_bot::protocol::{encode_actions, parse_inbound, InboundMessage};
use clap::Parser;
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, env = "ARENA_BOT_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "ARENA_BOT_NAME")]
    name: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AgentConfig::load(cli.config.as_deref())?;
    if let Some(name) = cli.name {
        config.name = name;
    }
    config.validate()?;
    tracing::info!(name = %config.name, grid_size = config.grid_size, "bot ready");

    let mut agent = Agent::new(config);
    let stdin = io::stdin();
    let stdout = io::stdout();
    let ticks = run_session(&mut agent, stdin.lock(), stdout.lock())?;
    tracing::info!(ticks, "session closed");
    Ok(())
}

// Returns the number of ticks answered. Stops at `end` or end of input.
fn run_session<R: BufRead, W: Write>(agent: &mut Agent, input: R, mut output: W) -> anyhow::Result<u64> {
    let mut ticks = 0;
    for (idx, line) in input.lines().enumerate() {
        let line = line.context("failed to read inbound message")?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_inbound(&line) {
            Some(InboundMessage::Start { state }) => agent.on_start(state),
            Some(InboundMessage::Tick { state }) => {
                let actions = agent.on_tick(&state);
                writeln!(output, "{}", encode_actions(&actions)?)?;
                output.flush()?;
                ticks += 1;
            }
            Some(InboundMessage::MalformedTick { tick }) => {
                tracing::warn!(line = idx + 1, ?tick, "tick state did not parse, answering with no actions");
                writeln!(output, "{}", encode_actions(&[])?)?;
                output.flush()?;
                ticks += 1;
            }
            Some(InboundMessage::End) => {
                agent.on_end();
                break;
            }
            None => tracing::warn!(line = idx + 1, "skipping malformed message"),
        }
    }
    Ok(ticks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_answers_every_tick_and_stops_at_end() {
        let input = [
            r#"{"type":"start","state":{"size":10}}"#,
            r#"{"type":"tick","state":{"tick":1,"players":[{"name":"Isabella","health":100,"pos":{"x":15,"y":15},"dest":{"x":15,"y":15},"current_weapon":1}],"coins":[{"id":"c","pos":{"x":285,"y":285}}]}}"#,
            "garbage",
            r#"{"type":"tick","state":{"tick":2,"players":[]}}"#,
            r#"{"type":"end"}"#,
            r#"{"type":"tick","state":{"tick":3}}"#,
        ]
        .join("\n");

        let mut agent = Agent::new(AgentConfig::default());
        let mut output = Vec::new();
        let ticks = run_session(&mut agent, input.as_bytes(), &mut output)
            .expect("session should run");

        assert_eq!(ticks, 2);
        let text = String::from_utf8(output).expect("output should be utf-8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![r#"[{"type":"dest","destination":{"x":1.5,"y":0.5}}]"#, "[]"]
        );
        assert!(agent.grid().is_none());
    }

    #[test]
    fn unparsable_tick_still_gets_an_answer() {
        let input = [
            r#"{"type":"start","state":{"size":10}}"#,
            r#"{"type":"tick","state":{"tick":1,"players":[{"name":"Isabella","health":99.5,"pos":{"x":15,"y":15},"dest":{"x":15,"y":15},"current_weapon":1}]}}"#,
            r#"{"type":"tick","state":{"tick":2,"players":[{"name":"Isabella","health":"full"}]}}"#,
            r#"{"type":"end"}"#,
        ]
        .join("\n");

        let mut agent = Agent::new(AgentConfig::default());
        let mut output = Vec::new();
        let ticks = run_session(&mut agent, input.as_bytes(), &mut output)
            .expect("session should run");

        assert_eq!(ticks, 2);
        let text = String::from_utf8(output).expect("output should be utf-8");
        assert_eq!(text.lines().collect::<Vec<_>>(), vec!["[]", "[]"]);
    }
}
