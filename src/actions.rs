use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{ACTION_SCALE, SAVE_LIMIT};
use crate::geometry::Point;
use crate::types::Weapon;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ActionError {
    #[error("action \"{action}\" rejected: expected finite \"x\" and \"y\", got ({x}, {y})")]
    NonFinitePoint { action: &'static str, x: f64, y: f64 },
    #[error("action \"switch\" rejected: unknown weapon id {0}")]
    UnknownWeapon(i64),
    #[error("action \"rotate_blade\" rejected: expected a finite angle, got {0}")]
    NonFiniteAngle(f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Move,
    Shoot,
    Save,
    SwitchWeapon,
    BladeRotate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    #[serde(rename = "dest")]
    Move {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<Point>,
    },
    #[serde(rename = "shoot")]
    Shoot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pos: Option<Point>,
    },
    #[serde(rename = "save")]
    Save {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Vec<u8>>,
    },
    #[serde(rename = "switch")]
    SwitchWeapon {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weapon: Option<Weapon>,
    },
    #[serde(rename = "rotate_blade")]
    BladeRotate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rad: Option<f64>,
    },
}

impl Action {
    pub fn try_move_to(destination: Point) -> Result<Self, ActionError> {
        Ok(Self::Move {
            destination: Some(normalize("dest", destination)?),
        })
    }

    pub fn move_to(destination: Point) -> Self {
        Self::try_move_to(destination).unwrap_or_else(|error| {
            tracing::warn!(%error, "inert move action");
            Self::Move { destination: None }
        })
    }

    pub fn try_shoot_at(position: Point) -> Result<Self, ActionError> {
        Ok(Self::Shoot {
            pos: Some(normalize("shoot", position)?),
        })
    }

    pub fn shoot_at(position: Point) -> Self {
        Self::try_shoot_at(position).unwrap_or_else(|error| {
            tracing::warn!(%error, "inert shoot action");
            Self::Shoot { pos: None }
        })
    }

    pub fn save(data: &[u8]) -> Self {
        let len = data.len().min(SAVE_LIMIT);
        if len < data.len() {
            tracing::debug!(dropped = data.len() - len, "save blob truncated");
        }
        Self::Save {
            data: Some(data[..len].to_vec()),
        }
    }

    pub fn switch_weapon(weapon: Weapon) -> Self {
        Self::SwitchWeapon {
            weapon: Some(weapon),
        }
    }

    pub fn try_switch_weapon_id(id: i64) -> Result<Self, ActionError> {
        let weapon = Weapon::from_id(id).ok_or(ActionError::UnknownWeapon(id))?;
        Ok(Self::switch_weapon(weapon))
    }

    pub fn switch_weapon_id(id: i64) -> Self {
        Self::try_switch_weapon_id(id).unwrap_or_else(|error| {
            tracing::warn!(%error, "inert switch action");
            Self::SwitchWeapon { weapon: None }
        })
    }

    pub fn try_blade_rotate(rad: f64) -> Result<Self, ActionError> {
        if !rad.is_finite() {
            return Err(ActionError::NonFiniteAngle(rad));
        }
        Ok(Self::BladeRotate { rad: Some(rad) })
    }

    pub fn blade_rotate(rad: f64) -> Self {
        Self::try_blade_rotate(rad).unwrap_or_else(|error| {
            tracing::warn!(%error, "inert blade action");
            Self::BladeRotate { rad: None }
        })
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Move { .. } => ActionKind::Move,
            Self::Shoot { .. } => ActionKind::Shoot,
            Self::Save { .. } => ActionKind::Save,
            Self::SwitchWeapon { .. } => ActionKind::SwitchWeapon,
            Self::BladeRotate { .. } => ActionKind::BladeRotate,
        }
    }

    pub fn is_inert(&self) -> bool {
        match self {
            Self::Move { destination } => destination.is_none(),
            Self::Shoot { pos } => pos.is_none(),
            Self::Save { data } => data.is_none(),
            Self::SwitchWeapon { weapon } => weapon.is_none(),
            Self::BladeRotate { rad } => rad.is_none(),
        }
    }

    pub fn world_point(&self) -> Option<Point> {
        match self {
            Self::Move { destination } => destination.map(|p| p.scale(ACTION_SCALE)),
            Self::Shoot { pos } => pos.map(|p| p.scale(ACTION_SCALE)),
            _ => None,
        }
    }
}

fn normalize(action: &'static str, point: Point) -> Result<Point, ActionError> {
    if !point.is_finite() {
        return Err(ActionError::NonFinitePoint {
            action,
            x: point.x,
            y: point.y,
        });
    }
    Ok(Point::new(point.x / ACTION_SCALE, point.y / ACTION_SCALE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_divides_by_scale() {
        let action = Action::move_to(Point::new(300.0, 600.0));
        assert_eq!(
            action,
            Action::Move {
                destination: Some(Point::new(10.0, 20.0))
            }
        );
        assert_eq!(action.world_point(), Some(Point::new(300.0, 600.0)));
    }

    #[test]
    fn move_serializes_with_wire_tag() {
        let raw = serde_json::to_string(&Action::move_to(Point::new(300.0, 600.0)))
            .expect("action should serialize");
        assert_eq!(raw, r#"{"type":"dest","destination":{"x":10.0,"y":20.0}}"#);
    }

    #[test]
    fn non_finite_shoot_is_inert() {
        let error = Action::try_shoot_at(Point::new(f64::NAN, 1.0)).expect_err("NaN is rejected");
        assert!(matches!(error, ActionError::NonFinitePoint { action: "shoot", .. }));

        let action = Action::shoot_at(Point::new(f64::INFINITY, 1.0));
        assert!(action.is_inert());
        assert_eq!(action.kind(), ActionKind::Shoot);
        let raw = serde_json::to_string(&action).expect("inert action should serialize");
        assert_eq!(raw, r#"{"type":"shoot"}"#);
    }

    #[test]
    fn save_truncates_to_limit() {
        let data = vec![7u8; 140];
        let Action::Save { data: Some(saved) } = Action::save(&data) else {
            panic!("expected save payload");
        };
        assert_eq!(saved.len(), SAVE_LIMIT);

        let short = Action::save(b"Hello, world!");
        assert!(!short.is_inert());
    }

    #[test]
    fn switch_rejects_unknown_weapon_id() {
        assert_eq!(
            Action::try_switch_weapon_id(5),
            Err(ActionError::UnknownWeapon(5))
        );
        assert!(Action::switch_weapon_id(-1).is_inert());
        let raw = serde_json::to_string(&Action::switch_weapon_id(2))
            .expect("switch should serialize");
        assert_eq!(raw, r#"{"type":"switch","weapon":2}"#);
    }

    #[test]
    fn blade_rotate_requires_finite_angle() {
        assert!(Action::blade_rotate(f64::NAN).is_inert());
        assert_eq!(
            Action::blade_rotate(1.5),
            Action::BladeRotate { rad: Some(1.5) }
        );
    }

    #[test]
    fn actions_parse_back_from_wire() {
        let parsed: Action = serde_json::from_str(r#"{"type":"rotate_blade","rad":0.25}"#)
            .expect("blade action should parse");
        assert_eq!(parsed, Action::BladeRotate { rad: Some(0.25) });

        let parsed: Action =
            serde_json::from_str(r#"{"type":"dest"}"#).expect("inert move should parse");
        assert!(parsed.is_inert());
    }
}
