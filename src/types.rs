use serde::{Deserialize, Deserializer, Serialize};

use crate::geometry::Point;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Weapon {
    None,
    Ranged,
    Melee,
}

impl Weapon {
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(Self::None),
            1 => Some(Self::Ranged),
            2 => Some(Self::Melee),
            _ => None,
        }
    }

    pub fn id(self) -> i64 {
        match self {
            Self::None => 0,
            Self::Ranged => 1,
            Self::Melee => 2,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "ranged" => Some(Self::Ranged),
            "melee" => Some(Self::Melee),
            _ => None,
        }
    }
}

impl TryFrom<i64> for Weapon {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_id(value).ok_or_else(|| format!("unknown weapon id {value}"))
    }
}

impl From<Weapon> for i64 {
    fn from(value: Weapon) -> Self {
        value.id()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub id: String,
    pub pos: Point,
    pub dest: Point,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Blade {
    pub start: Point,
    pub end: Point,
    pub rotation: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub color: u32,
    pub health: f64,
    pub pos: Point,
    pub dest: Point,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub current_weapon: i64,
    #[serde(default)]
    pub projectiles: Vec<Projectile>,
    #[serde(default)]
    pub blade: Blade,
}

impl Player {
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    pub fn weapon(&self) -> Option<Weapon> {
        Weapon::from_id(self.current_weapon)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    pub id: String,
    pub pos: Point,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub value: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    #[serde(deserialize_with = "lenient_u64")]
    pub tick: u64,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub round: u32,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub coins: Vec<Coin>,
}

impl GameState {
    pub fn find_player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.name == name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapState {
    #[serde(default)]
    pub map: Vec<Vec<i32>>,
    #[serde(default)]
    pub walls: Vec<Vec<Point>>,
    #[serde(default)]
    pub size: usize,
    #[serde(default)]
    pub save: Vec<u8>,
}

// Wire numbers are plain JSON numbers; a fractional or out-of-range value
// must not reject the whole snapshot.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    Ok(if value.is_finite() { value.round() } else { 0.0 })
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    lenient_number(deserializer).map(|value| value as u64)
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    lenient_number(deserializer).map(|value| value as i64)
}

fn lenient_i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    lenient_number(deserializer).map(|value| value as i32)
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    lenient_number(deserializer).map(|value| value as u32)
}
