use arena_bot::actions::{Action, ActionKind};
use arena_bot::agent::{Agent, AgentStats};
use arena_bot::arena::{Arena, ArenaOptions, ArenaReport};
use arena_bot::config::AgentConfig;
use arena_bot::constants::{CELL_SIZE, MAX_GRID_SIZE};
use arena_bot::geometry::{Cell, Direction};
use arena_bot::occlusion::OcclusionGrid;
use arena_bot::types::GameState;
use chrono::{SecondsFormat, Utc};
use clap::Parser;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    single: bool,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    ticks: Option<u64>,
    #[arg(long)]
    size: Option<usize>,
    #[arg(long)]
    wall_chance: Option<f64>,
    #[arg(long)]
    coins: Option<usize>,
    #[arg(long)]
    rounds: Option<u32>,
    #[arg(long, env = "ARENA_BOT_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    seed: u64,
    size: usize,
    #[serde(rename = "wallChance")]
    wall_chance: f64,
    coins: usize,
    rounds: u32,
    ticks: u64,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u64,
    size: usize,
    #[serde(rename = "wallChance")]
    wall_chance: f64,
    rounds: u32,
    ticks: u64,
    #[serde(rename = "coinsCollected")]
    coins_collected: u64,
    #[serde(rename = "shotsFired")]
    shots_fired: u64,
    hits: u64,
    kills: u64,
    #[serde(rename = "hiddenWalls")]
    hidden_walls: usize,
    #[serde(rename = "wallsLearned")]
    walls_learned: usize,
    agent: AgentStats,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    round: u32,
    tick: u64,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioRunResult {
    #[serde(flatten)]
    result: ScenarioResultLine,
    #[serde(rename = "anomalyRecords")]
    anomaly_records: Vec<AnomalyRecord>,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAt")]
    started_at: String,
    #[serde(rename = "finishedAt")]
    finished_at: String,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageCoins")]
    average_coins: u64,
    scenarios: Vec<ScenarioResultLine>,
}

#[derive(Default)]
struct AnomalyLog {
    anomalies: Vec<String>,
    records: Vec<AnomalyRecord>,
    seen: HashSet<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let base_config = match AgentConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "config_load_failed");
            std::process::exit(2);
        }
    };
    let scenarios = resolve_scenarios(&cli);
    let started_at = Utc::now();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed_hint, started_at.timestamp_millis()));
    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        tracing::info!(
            match_id = %match_id,
            scenario = %scenario.name,
            seed = scenario.seed,
            size = scenario.size,
            wall_chance = scenario.wall_chance,
            rounds = scenario.rounds,
            ticks = scenario.ticks,
            "scenario_started"
        );
        let scenario_run = match run_scenario(&scenario, &base_config) {
            Ok(run) => run,
            Err(error) => {
                tracing::error!(match_id = %match_id, scenario = %scenario.name, %error, "scenario_config_invalid");
                std::process::exit(2);
            }
        };

        for anomaly in &scenario_run.anomaly_records {
            tracing::warn!(
                match_id = %match_id,
                scenario = %scenario.name,
                seed = scenario.seed,
                round = anomaly.round,
                tick = anomaly.tick,
                message = %anomaly.message,
                "anomaly_detected"
            );
        }

        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();

        tracing::info!(
            match_id = %match_id,
            scenario = %scenario.name,
            seed = scenario.seed,
            coins = scenario_run.result.coins_collected,
            hits = scenario_run.result.hits,
            walls_learned = scenario_run.result.walls_learned,
            hidden_walls = scenario_run.result.hidden_walls,
            anomaly_count = scenario_run.anomaly_records.len(),
            "scenario_finished"
        );

        match serde_json::to_string(&scenario_run.result) {
            Ok(line) => println!("{line}"),
            Err(error) => tracing::error!(%error, "scenario_result_encode_failed"),
        }
        scenario_results.push(scenario_run.result);
    }

    let summary = build_run_summary(
        match_id.clone(),
        started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        scenario_results,
        total_anomalies,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            tracing::error!(
                match_id = %match_id,
                path = %path.display(),
                %error,
                "summary_write_failed"
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    tracing::info!(
        match_id = %match_id,
        scenario_count = summary.scenario_count,
        anomaly_count = summary.anomaly_count,
        average_coins = summary.average_coins,
        summary_out = ?summary_out_written,
        "run_finished"
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn run_scenario(
    scenario: &Scenario,
    base_config: &AgentConfig,
) -> Result<ScenarioRunResult, arena_bot::config::ConfigError> {
    let config = AgentConfig {
        grid_size: scenario.size,
        ..base_config.clone()
    };
    config.validate()?;
    let name = config.name.clone();
    let mut agent = Agent::new(config);
    let mut log = AnomalyLog::default();
    let mut totals = ArenaReport::default();
    let mut walls_learned = 0usize;
    let mut save: Vec<u8> = Vec::new();

    for round in 1..=scenario.rounds {
        if !save.is_empty() && OcclusionGrid::from_save_blob(scenario.size, &save).is_none() {
            push_anomaly(&mut log, round, 0, "saved blob does not restore".to_string());
        }
        let mut arena = Arena::new(
            &name,
            ArenaOptions {
                size: scenario.size,
                wall_chance: scenario.wall_chance,
                coin_count: scenario.coins,
                seed: scenario.seed,
                ..ArenaOptions::default()
            },
            save.clone(),
        );
        agent.on_start(arena.map_state());

        for _ in 0..scenario.ticks {
            let snapshot = arena.snapshot();
            for message in collect_snapshot_anomalies(&snapshot, scenario.size) {
                push_anomaly(&mut log, round, snapshot.tick, message);
            }
            let actions = agent.on_tick(&snapshot);
            for message in collect_action_anomalies(&actions) {
                push_anomaly(&mut log, round, snapshot.tick, message);
            }
            arena.apply(&name, &actions);
            arena.step();
        }

        if let Some(learned) = agent.grid() {
            walls_learned = learned.blocked_interior_edges();
            for message in phantom_wall_anomalies(learned, arena.hidden_walls()) {
                push_anomaly(&mut log, round, arena.tick(), message);
            }
        }
        let report = arena.report();
        totals.coins_collected += report.coins_collected;
        totals.shots_fired += report.shots_fired;
        totals.hits += report.hits;
        totals.kills += report.kills;
        totals.hidden_walls = report.hidden_walls;
        tracing::debug!(
            scenario = %scenario.name,
            round,
            coins = report.coins_collected,
            walls_learned,
            "round_finished"
        );
        if let Some(saved) = arena.saved() {
            save = saved.to_vec();
        }
        agent.on_end();
    }

    Ok(ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            size: scenario.size,
            wall_chance: scenario.wall_chance,
            rounds: scenario.rounds,
            ticks: scenario.ticks,
            coins_collected: totals.coins_collected,
            shots_fired: totals.shots_fired,
            hits: totals.hits,
            kills: totals.kills,
            hidden_walls: totals.hidden_walls,
            walls_learned,
            agent: agent.stats().clone(),
            anomalies: log.anomalies,
        },
        anomaly_records: log.records,
    })
}

fn collect_action_anomalies(actions: &[Action]) -> Vec<String> {
    let mut anomalies = Vec::new();
    let mut kinds: BTreeSet<ActionKind> = BTreeSet::new();
    for action in actions {
        let kind = action.kind();
        if !kinds.insert(kind) {
            anomalies.push(format!("duplicate {kind:?} action in one tick"));
        }
        if action.is_inert() {
            anomalies.push(format!("inert {kind:?} action emitted"));
        }
    }
    anomalies
}

fn collect_snapshot_anomalies(snapshot: &GameState, size: usize) -> Vec<String> {
    let extent = size as f64 * CELL_SIZE;
    let in_bounds = |x: f64, y: f64| x.is_finite() && y.is_finite() && (0.0..=extent).contains(&x) && (0.0..=extent).contains(&y);
    let mut anomalies = Vec::new();

    for player in &snapshot.players {
        if !in_bounds(player.pos.x, player.pos.y) {
            anomalies.push(format!(
                "player outside arena: {} at ({}, {})",
                player.name, player.pos.x, player.pos.y
            ));
        }
    }
    for coin in &snapshot.coins {
        if !in_bounds(coin.pos.x, coin.pos.y) {
            anomalies.push(format!("coin outside arena: {}", coin.id));
        }
    }
    if snapshot.coins.is_empty() {
        anomalies.push("no coins on the field".to_string());
    }
    anomalies
}

fn phantom_wall_anomalies(learned: &OcclusionGrid, hidden: &OcclusionGrid) -> Vec<String> {
    let mut anomalies = Vec::new();
    let size = learned.size().min(hidden.size()) as i32;
    for y in 0..size {
        for x in 0..size {
            let cell = Cell::new(x, y);
            for dir in [Direction::Right, Direction::Down] {
                if !learned.is_passable(cell, dir) && hidden.is_passable(cell, dir) {
                    anomalies.push(format!("phantom wall learned: ({x}, {y}) {dir:?}"));
                }
            }
        }
    }
    anomalies
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = cli
        .seed
        .unwrap_or_else(|| Utc::now().timestamp_millis().unsigned_abs());

    if cli.single
        || cli.ticks.is_some()
        || cli.size.is_some()
        || cli.wall_chance.is_some()
        || cli.coins.is_some()
        || cli.rounds.is_some()
    {
        let size = cli.size.unwrap_or(10).clamp(2, MAX_GRID_SIZE);
        return vec![Scenario {
            name: format!("custom-size{size}"),
            seed,
            size,
            wall_chance: cli.wall_chance.unwrap_or(0.2).clamp(0.0, 1.0),
            coins: cli.coins.unwrap_or(3).clamp(1, 50),
            rounds: cli.rounds.unwrap_or(1).clamp(1, 20),
            ticks: cli.ticks.unwrap_or(900).clamp(1, 100_000),
        }];
    }

    vec![
        Scenario {
            name: "open-field".to_string(),
            seed,
            size: 10,
            wall_chance: 0.0,
            coins: 3,
            rounds: 1,
            ticks: 600,
        },
        Scenario {
            name: "maze-learning".to_string(),
            seed: seed.wrapping_add(1),
            size: 10,
            wall_chance: 0.25,
            coins: 3,
            rounds: 3,
            ticks: 900,
        },
    ]
}

fn push_anomaly(log: &mut AnomalyLog, round: u32, tick: u64, message: String) {
    log.records.push(AnomalyRecord {
        round,
        tick,
        message: message.clone(),
    });
    if log.seen.insert(message.clone()) {
        log.anomalies.push(message);
    }
}

fn default_match_id(seed: u64, timestamp_ms: i64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at: String,
    finished_at: String,
    scenarios: Vec<ScenarioResultLine>,
    anomaly_count: usize,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let total_coins: u64 = scenarios.iter().map(|scenario| scenario.coins_collected).sum();
    let average_coins = if scenario_count == 0 {
        0
    } else {
        total_coins / scenario_count as u64
    };
    RunSummary {
        match_id,
        started_at,
        finished_at,
        scenario_count,
        anomaly_count,
        average_coins,
        scenarios,
    }
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_bot::geometry::Point;
    use arena_bot::types::Coin;

    fn make_scenario_result(coins_collected: u64) -> ScenarioResultLine {
        ScenarioResultLine {
            scenario: "test".to_string(),
            seed: 42,
            size: 10,
            wall_chance: 0.2,
            rounds: 1,
            ticks: 100,
            coins_collected,
            shots_fired: 0,
            hits: 0,
            kills: 0,
            hidden_walls: 0,
            walls_learned: 0,
            agent: AgentStats::default(),
            anomalies: Vec::new(),
        }
    }

    #[test]
    fn default_match_id_contains_seed_and_timestamp() {
        assert_eq!(default_match_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn build_run_summary_calculates_average_coins() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            "2026-01-01T00:00:00.000Z".to_string(),
            "2026-01-01T00:00:01.000Z".to_string(),
            vec![make_scenario_result(4), make_scenario_result(8)],
            1,
        );
        assert_eq!(summary.average_coins, 6);
        assert_eq!(summary.scenario_count, 2);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let target = dir.path().join("missing").join("summary.json");
        let summary = build_run_summary(
            "sim-1-1".to_string(),
            String::new(),
            String::new(),
            vec![make_scenario_result(1)],
            0,
        );
        assert!(write_summary(&target, &summary).is_err());

        let target = dir.path().join("summary.json");
        write_summary(&target, &summary).expect("summary should be written");
        let raw = std::fs::read_to_string(&target).expect("summary should be readable");
        assert!(raw.contains("\"matchId\": \"sim-1-1\""));
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut log = AnomalyLog::default();
        push_anomaly(&mut log, 1, 10, "same anomaly".to_string());
        push_anomaly(&mut log, 1, 11, "same anomaly".to_string());

        assert_eq!(log.anomalies.len(), 1);
        assert_eq!(log.records.len(), 2);
        assert_eq!(log.records[0].tick, 10);
        assert_eq!(log.records[1].tick, 11);
    }

    #[test]
    fn action_anomalies_flag_duplicates_and_inert_actions() {
        let clean = vec![
            Action::move_to(Point::new(30.0, 30.0)),
            Action::shoot_at(Point::new(60.0, 60.0)),
        ];
        assert!(collect_action_anomalies(&clean).is_empty());

        let broken = vec![
            Action::move_to(Point::new(30.0, 30.0)),
            Action::move_to(Point::new(f64::NAN, 0.0)),
        ];
        let anomalies = collect_action_anomalies(&broken);
        assert_eq!(anomalies.len(), 2);
        assert!(anomalies[0].starts_with("duplicate Move"));
        assert!(anomalies[1].starts_with("inert Move"));
    }

    #[test]
    fn snapshot_anomalies_flag_out_of_bounds_coins() {
        let snapshot = GameState {
            tick: 1,
            round: 1,
            players: Vec::new(),
            coins: vec![Coin {
                id: "coin_1".to_string(),
                pos: Point::new(400.0, 15.0),
                value: 1,
            }],
        };
        assert_eq!(
            collect_snapshot_anomalies(&snapshot, 10),
            vec!["coin outside arena: coin_1".to_string()]
        );
    }

    #[test]
    fn phantom_walls_are_reported_once_per_edge() {
        let hidden = OcclusionGrid::new(4);
        let mut learned = OcclusionGrid::new(4);
        learned.block_edge(Cell::new(1, 1), Direction::Right);
        let anomalies = phantom_wall_anomalies(&learned, &hidden);
        assert_eq!(anomalies, vec!["phantom wall learned: (1, 1) Right".to_string()]);
        assert!(phantom_wall_anomalies(&hidden, &learned).is_empty());
    }

    #[test]
    fn open_field_scenario_runs_clean() {
        let scenario = Scenario {
            name: "open".to_string(),
            seed: 3,
            size: 8,
            wall_chance: 0.0,
            coins: 3,
            rounds: 2,
            ticks: 300,
        };
        let run = run_scenario(&scenario, &AgentConfig::default()).expect("config is valid");
        assert!(run.result.anomalies.is_empty(), "{:?}", run.result.anomalies);
        assert!(run.result.coins_collected > 0);
        assert_eq!(run.result.hidden_walls, 0);
        assert_eq!(run.result.agent.ticks, 600);
    }
}
