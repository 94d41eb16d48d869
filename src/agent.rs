use serde::Serialize;

use crate::actions::Action;
use crate::config::AgentConfig;
use crate::constants::CELL_SIZE;
use crate::geometry::{distance, manhattan, Axis, Cell, Point};
use crate::intercept::{self, ShotSpec, NO_SOLUTION};
use crate::occlusion::OcclusionGrid;
use crate::pathfinding::{next_step, PathStep};
use crate::types::{Coin, GameState, MapState, Player, Weapon};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AgentStats {
    pub ticks: u64,
    #[serde(rename = "missedSelf")]
    pub missed_self: u64,
    pub stalls: u64,
    #[serde(rename = "wallsLearned")]
    pub walls_learned: u64,
    #[serde(rename = "pathFallbacks")]
    pub path_fallbacks: u64,
    pub shots: u64,
    #[serde(rename = "sentinelShots")]
    pub sentinel_shots: u64,
}

#[derive(Clone, Debug)]
struct AgentMemory {
    grid: OcclusionGrid,
    last_position: Option<Point>,
    last_destination: Option<Point>,
    last_axis: Option<Axis>,
    grid_dirty: bool,
}

impl AgentMemory {
    fn new(grid: OcclusionGrid) -> Self {
        Self {
            grid,
            last_position: None,
            last_destination: None,
            last_axis: None,
            grid_dirty: false,
        }
    }
}

pub struct Agent {
    config: AgentConfig,
    map: Option<MapState>,
    memory: Option<AgentMemory>,
    stats: AgentStats,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            map: None,
            memory: None,
            stats: AgentStats::default(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn stats(&self) -> &AgentStats {
        &self.stats
    }

    pub fn map(&self) -> Option<&MapState> {
        self.map.as_ref()
    }

    pub fn grid(&self) -> Option<&OcclusionGrid> {
        self.memory.as_ref().map(|memory| &memory.grid)
    }

    pub fn on_start(&mut self, map: MapState) {
        let size = self.config.grid_size;
        let grid = if map.save.is_empty() {
            OcclusionGrid::new(size)
        } else {
            match OcclusionGrid::from_save_blob(size, &map.save) {
                Some(grid) => {
                    tracing::info!(
                        walls = grid.blocked_interior_edges(),
                        "restored occlusion grid from save"
                    );
                    grid
                }
                None => {
                    tracing::warn!(
                        bytes = map.save.len(),
                        grid_size = size,
                        "save blob does not match grid, starting fresh"
                    );
                    OcclusionGrid::new(size)
                }
            }
        };
        if map.size != 0 && map.size != size {
            tracing::warn!(
                map_size = map.size,
                grid_size = size,
                "map size differs from occlusion grid, positions will be clamped"
            );
        }
        tracing::debug!(map_size = map.size, walls = map.walls.len(), "game started");
        self.memory = Some(AgentMemory::new(grid));
        self.map = Some(map);
    }

    pub fn on_tick(&mut self, state: &GameState) -> Vec<Action> {
        self.stats.ticks += 1;
        let Some(me) = state.find_player(&self.config.name) else {
            self.stats.missed_self += 1;
            tracing::warn!(
                tick = state.tick,
                name = %self.config.name,
                "self not found in snapshot"
            );
            return Vec::new();
        };

        let config = &self.config;
        let stats = &mut self.stats;
        let memory = self.memory.get_or_insert_with(|| {
            tracing::warn!(tick = state.tick, "tick received before start");
            AgentMemory::new(OcclusionGrid::new(config.grid_size))
        });

        let position = me.pos;
        observe_movement(memory, position, config, stats);

        let destination = nearest_coin(state, position)
            .map(|coin| navigation_point(&memory.grid, position, coin.pos, config.edge_band, stats));
        let aim = nearest_opponent(state, me).map(|opponent| aim_point(position, opponent, config, stats));

        memory.last_position = Some(position);
        memory.last_destination = destination;

        let mut actions = Vec::with_capacity(4);
        if let Some(destination) = destination {
            actions.push(Action::move_to(destination));
        }
        if me.weapon() != Some(config.preferred_weapon) {
            actions.push(Action::switch_weapon(config.preferred_weapon));
        }
        if let Some(aim) = aim {
            match config.preferred_weapon {
                Weapon::Ranged => actions.push(Action::shoot_at(aim)),
                Weapon::Melee => {
                    let delta = aim - position;
                    actions.push(Action::blade_rotate(delta.y.atan2(delta.x)));
                }
                Weapon::None => {}
            }
        }
        if memory.grid_dirty {
            if let Some(blob) = memory.grid.to_save_blob() {
                actions.push(Action::save(&blob));
            }
            memory.grid_dirty = false;
        }
        actions
    }

    pub fn on_end(&mut self) {
        tracing::info!(
            ticks = self.stats.ticks,
            walls = self.stats.walls_learned,
            shots = self.stats.shots,
            "game ended"
        );
        self.memory = None;
        self.map = None;
    }
}

fn observe_movement(memory: &mut AgentMemory, position: Point, config: &AgentConfig, stats: &mut AgentStats) {
    let (Some(previous), Some(destination)) = (memory.last_position, memory.last_destination) else {
        return;
    };

    if distance(previous, position) > config.stall_tolerance {
        memory.last_axis = Axis::dominant(position - previous).or(memory.last_axis);
        return;
    }
    if distance(position, destination) <= config.stall_tolerance {
        return;
    }

    stats.stalls += 1;
    let learned = memory.grid.observe(
        previous,
        position,
        destination,
        memory.last_axis,
        config.edge_band,
        config.stall_tolerance,
    );
    if let Some(edge) = learned {
        stats.walls_learned += 1;
        memory.grid_dirty = true;
        tracing::debug!(
            x = edge.cell.x,
            y = edge.cell.y,
            dir = ?edge.dir,
            "learned wall from stalled move"
        );
    }
}

fn nearest_coin(state: &GameState, position: Point) -> Option<&Coin> {
    state
        .coins
        .iter()
        .min_by(|a, b| manhattan(a.pos, position).total_cmp(&manhattan(b.pos, position)))
}

fn nearest_opponent<'a>(state: &'a GameState, me: &Player) -> Option<&'a Player> {
    state
        .players
        .iter()
        .filter(|player| player.name != me.name && player.is_alive())
        .min_by(|a, b| manhattan(a.pos, me.pos).total_cmp(&manhattan(b.pos, me.pos)))
}

fn navigation_point(
    grid: &OcclusionGrid,
    position: Point,
    goal: Point,
    edge_band: f64,
    stats: &mut AgentStats,
) -> Point {
    match next_step(grid, position, goal) {
        Some(PathStep::Step(next)) => step_target(grid.cell_of(position), next, position, edge_band),
        Some(PathStep::AtGoal) => goal,
        None => {
            stats.path_fallbacks += 1;
            tracing::debug!(x = goal.x, y = goal.y, "no known path, moving straight at goal");
            goal
        }
    }
}

fn step_target(from: Cell, next: Cell, position: Point, edge_band: f64) -> Point {
    let center = next.center();
    let origin = next.origin();
    let low = CELL_SIZE * edge_band;
    let high = CELL_SIZE * (1.0 - edge_band);
    if next.x != from.x {
        Point::new(center.x, origin.y + (position.y - origin.y).clamp(low, high))
    } else {
        Point::new(origin.x + (position.x - origin.x).clamp(low, high), center.y)
    }
}

fn aim_point(shooter: Point, opponent: &Player, config: &AgentConfig, stats: &mut AgentStats) -> Point {
    let spec = ShotSpec {
        shooter,
        target: opponent.pos,
        target_dest: opponent.dest,
        target_speed: config.target_speed,
        projectile_speed: config.projectile_speed,
    };
    stats.shots += 1;
    let aim = intercept::solve(&spec, config.target_hitbox);
    if aim != NO_SOLUTION {
        return aim;
    }
    stats.sentinel_shots += 1;
    let half = config.target_hitbox * 0.5;
    opponent.pos + Point::new(half, half)
}
