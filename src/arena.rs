use std::collections::{HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::actions::Action;
use crate::constants::{
    CELL_SIZE, DEFAULT_PROJECTILE_SPEED, DEFAULT_TARGET_HITBOX, DEFAULT_TARGET_SPEED, EPSILON,
};
use crate::geometry::{distance, Axis, Cell, Direction, Point};
use crate::occlusion::OcclusionGrid;
use crate::types::{Blade, Coin, GameState, MapState, Player, Projectile, Weapon};

const WALL_GAP: f64 = 0.01;
const MAX_HEALTH: f64 = 100.0;

#[derive(Clone, Debug)]
pub struct ArenaOptions {
    pub size: usize,
    pub wall_chance: f64,
    pub coin_count: usize,
    pub seed: u64,
    pub player_speed: f64,
    pub projectile_speed: f64,
    pub hitbox: f64,
    pub shot_cooldown: u64,
    pub damage: f64,
}

impl Default for ArenaOptions {
    fn default() -> Self {
        Self {
            size: 10,
            wall_chance: 0.2,
            coin_count: 3,
            seed: 1,
            player_speed: DEFAULT_TARGET_SPEED,
            projectile_speed: DEFAULT_PROJECTILE_SPEED,
            hitbox: DEFAULT_TARGET_HITBOX,
            shot_cooldown: 10,
            damage: 25.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ArenaReport {
    #[serde(rename = "coinsCollected")]
    pub coins_collected: u64,
    #[serde(rename = "shotsFired")]
    pub shots_fired: u64,
    pub hits: u64,
    pub kills: u64,
    #[serde(rename = "hiddenWalls")]
    pub hidden_walls: usize,
}

#[derive(Clone, Debug)]
struct ArenaPlayer {
    view: Player,
    cooldown: u64,
    last_pos: Point,
}

pub struct Arena {
    options: ArenaOptions,
    rng: StdRng,
    walls: OcclusionGrid,
    reachable: Vec<Cell>,
    save: Vec<u8>,
    saved: Option<Vec<u8>>,
    tick: u64,
    players: Vec<ArenaPlayer>,
    coins: Vec<Coin>,
    next_id: u64,
    report: ArenaReport,
}

impl Arena {
    pub fn new(bot_name: &str, options: ArenaOptions, save: Vec<u8>) -> Self {
        let mut rng = StdRng::seed_from_u64(options.seed);
        let walls = generate_walls(options.size, options.wall_chance, &mut rng);
        let spawn = Cell::new(0, 0);
        let mut reachable: Vec<Cell> = reachable_cells(&walls, spawn).into_iter().collect();
        reachable.sort();

        let report = ArenaReport {
            hidden_walls: walls.blocked_interior_edges(),
            ..ArenaReport::default()
        };
        let mut arena = Self {
            options,
            rng,
            walls,
            reachable,
            save,
            saved: None,
            tick: 0,
            players: Vec::new(),
            coins: Vec::new(),
            next_id: 1,
            report,
        };

        arena.players.push(spawn_player(bot_name, spawn.center(), 0x3366ff));
        let opponent_cell = arena.random_reachable_cell();
        arena
            .players
            .push(spawn_player("Rival", opponent_cell.center(), 0xff6633));
        for _ in 0..arena.options.coin_count {
            let coin = arena.make_coin();
            arena.coins.push(coin);
        }
        arena
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn report(&self) -> &ArenaReport {
        &self.report
    }

    pub fn hidden_walls(&self) -> &OcclusionGrid {
        &self.walls
    }

    pub fn saved(&self) -> Option<&[u8]> {
        self.saved.as_deref()
    }

    pub fn map_state(&self) -> MapState {
        MapState {
            map: vec![vec![0; self.options.size]; self.options.size],
            walls: Vec::new(),
            size: self.options.size,
            save: self.save.clone(),
        }
    }

    pub fn snapshot(&self) -> GameState {
        GameState {
            tick: self.tick,
            round: 1,
            players: self.players.iter().map(|player| player.view.clone()).collect(),
            coins: self.coins.clone(),
        }
    }

    pub fn apply(&mut self, name: &str, actions: &[Action]) {
        let Some(idx) = self.players.iter().position(|player| player.view.name == name) else {
            return;
        };
        for action in actions {
            if action.is_inert() {
                continue;
            }
            match action {
                Action::Move { .. } => {
                    if let Some(dest) = action.world_point() {
                        self.players[idx].view.dest = dest;
                    }
                }
                Action::Shoot { .. } => {
                    if let Some(target) = action.world_point() {
                        self.fire(idx, target);
                    }
                }
                Action::Save { data } => self.saved = data.clone(),
                Action::SwitchWeapon { weapon } => {
                    if let Some(weapon) = weapon {
                        self.players[idx].view.current_weapon = weapon.id();
                    }
                }
                Action::BladeRotate { rad } => {
                    if let Some(rad) = rad {
                        let pos = self.players[idx].view.pos;
                        let reach = CELL_SIZE;
                        self.players[idx].view.blade = Blade {
                            start: pos,
                            end: pos + Point::new(rad.cos(), rad.sin()).scale(reach),
                            rotation: *rad,
                        };
                    }
                }
            }
        }
    }

    pub fn step(&mut self) {
        self.tick += 1;
        self.steer_opponents();

        for idx in 0..self.players.len() {
            let player = &mut self.players[idx];
            player.last_pos = player.view.pos;
            player.view.pos = move_toward(
                &self.walls,
                player.view.pos,
                player.view.dest,
                self.options.player_speed,
            );
            player.cooldown = player.cooldown.saturating_sub(1);
        }

        self.collect_coins();
        self.advance_projectiles();
    }

    fn steer_opponents(&mut self) {
        for idx in 1..self.players.len() {
            let player = &self.players[idx];
            let arrived = distance(player.view.pos, player.view.dest) <= EPSILON;
            let stuck = self.tick > 1 && distance(player.view.pos, player.last_pos) <= EPSILON;
            if arrived || stuck {
                let cell = self.random_reachable_cell();
                self.players[idx].view.dest = cell.center();
            }
        }
    }

    fn collect_coins(&mut self) {
        let bot_pos = self.players[0].view.pos;
        let pickup = CELL_SIZE * 0.5;
        let mut collected = 0;
        self.coins.retain(|coin| {
            let hit = distance(coin.pos, bot_pos) <= pickup;
            if hit {
                collected += 1;
            }
            !hit
        });
        for _ in 0..collected {
            self.report.coins_collected += 1;
            let coin = self.make_coin();
            self.coins.push(coin);
        }
    }

    fn fire(&mut self, idx: usize, target: Point) {
        let shooter = &self.players[idx];
        if shooter.cooldown > 0 || shooter.view.weapon() != Some(Weapon::Ranged) {
            return;
        }
        let id = self.make_id("shot");
        let shooter = &mut self.players[idx];
        shooter.cooldown = self.options.shot_cooldown;
        shooter.view.projectiles.push(Projectile {
            id,
            pos: shooter.view.pos,
            dest: target,
        });
        self.report.shots_fired += 1;
    }

    fn advance_projectiles(&mut self) {
        let speed = self.options.projectile_speed;
        let half = self.options.hitbox * 0.5;
        let mut impacts = Vec::new();

        for (owner, player) in self.players.iter_mut().enumerate() {
            player.view.projectiles.retain_mut(|projectile| {
                let delta = projectile.dest - projectile.pos;
                let remaining = delta.magnitude();
                if remaining <= speed {
                    impacts.push((owner, projectile.dest));
                    return false;
                }
                projectile.pos = projectile.pos + delta.scale(speed / remaining);
                true
            });
        }

        for (owner, point) in impacts {
            for idx in 0..self.players.len() {
                if idx == owner || !self.players[idx].view.is_alive() {
                    continue;
                }
                let center = self.players[idx].view.pos + Point::new(half, half);
                if distance(center, point) > self.options.hitbox {
                    continue;
                }
                if owner == 0 {
                    self.report.hits += 1;
                }
                self.players[idx].view.health -= self.options.damage;
                if self.players[idx].view.health <= 0.0 {
                    if owner == 0 {
                        self.report.kills += 1;
                    }
                    let cell = self.random_reachable_cell();
                    let view = &mut self.players[idx].view;
                    view.health = MAX_HEALTH;
                    view.pos = cell.center();
                    view.dest = cell.center();
                }
            }
        }
    }

    fn random_reachable_cell(&mut self) -> Cell {
        let idx = self.rng.random_range(0..self.reachable.len());
        self.reachable[idx]
    }

    fn make_coin(&mut self) -> Coin {
        let cell = self.random_reachable_cell();
        Coin {
            id: self.make_id("coin"),
            pos: cell.center(),
            value: 1,
        }
    }

    fn make_id(&mut self, prefix: &str) -> String {
        let id = format!("{}_{}", prefix, self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        id
    }
}

fn spawn_player(name: &str, pos: Point, color: u32) -> ArenaPlayer {
    ArenaPlayer {
        view: Player {
            name: name.to_string(),
            color,
            health: MAX_HEALTH,
            pos,
            dest: pos,
            current_weapon: Weapon::None.id(),
            projectiles: Vec::new(),
            blade: Blade::default(),
        },
        cooldown: 0,
        last_pos: pos,
    }
}

fn generate_walls(size: usize, wall_chance: f64, rng: &mut StdRng) -> OcclusionGrid {
    let mut walls = OcclusionGrid::new(size);
    let chance = wall_chance.clamp(0.0, 1.0);
    for y in 0..size as i32 {
        for x in 0..size as i32 {
            let cell = Cell::new(x, y);
            for dir in [Direction::Right, Direction::Down] {
                if walls.contains(cell.neighbor(dir)) && rng.random_bool(chance) {
                    walls.block_edge(cell, dir);
                }
            }
        }
    }
    walls
}

pub fn reachable_cells(walls: &OcclusionGrid, start: Cell) -> HashSet<Cell> {
    let mut out = HashSet::new();
    if !walls.contains(start) {
        return out;
    }
    let mut queue = VecDeque::new();
    out.insert(start);
    queue.push_back(start);

    while let Some(cell) = queue.pop_front() {
        for dir in Direction::ALL {
            if !walls.is_passable(cell, dir) {
                continue;
            }
            let next = cell.neighbor(dir);
            if out.insert(next) {
                queue.push_back(next);
            }
        }
    }

    out
}

pub fn move_toward(walls: &OcclusionGrid, pos: Point, dest: Point, speed: f64) -> Point {
    let delta = dest - pos;
    let length = delta.magnitude();
    if length <= EPSILON {
        return pos;
    }
    let step = if length <= speed {
        delta
    } else {
        delta.scale(speed / length)
    };
    let x = slide(walls, pos, step.x, Axis::Horizontal);
    let y = slide(walls, Point::new(x, pos.y), step.y, Axis::Vertical);
    Point::new(x, y)
}

fn slide(walls: &OcclusionGrid, pos: Point, delta: f64, axis: Axis) -> f64 {
    let cell = walls.cell_of(pos);
    let (coord, cell_coord, forward, backward) = match axis {
        Axis::Horizontal => (pos.x, cell.x, Direction::Right, Direction::Left),
        Axis::Vertical => (pos.y, cell.y, Direction::Down, Direction::Up),
    };
    let target = coord + delta;
    if delta > 0.0 {
        let boundary = (cell_coord + 1) as f64 * CELL_SIZE;
        if target >= boundary && !walls.is_passable(cell, forward) {
            return boundary - WALL_GAP;
        }
    } else if delta < 0.0 {
        let boundary = cell_coord as f64 * CELL_SIZE;
        if target < boundary && !walls.is_passable(cell, backward) {
            return boundary;
        }
    }
    target
}
