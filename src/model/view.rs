use serde::Serialize;

use super::components::MeshTag;
use super::vec2::Vec2;
use super::world::World;
use crate::id::{EntityId, TeamId};

/// What a renderer needs to draw one entity this frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderEntry {
    pub id: EntityId,
    pub mesh: MeshTag,
    pub visible: bool,
    pub position: Vec2,
    pub rotation: f64,
    pub elevation: f64,
    pub health_ratio: Option<f64>,
    pub team: Option<TeamId>,
    /// Scattering with broken morale.
    pub broken: bool,
    pub glow: f64,
}

impl World {
    /// Pull-based render snapshot: every alive entity with a `Renderable`
    /// and a `Transform`, in id order.
    pub fn render_view(&self) -> Vec<RenderEntry> {
        let c = &self.components;
        c.renderable
            .iter()
            .filter(|(id, _)| self.entities.is_alive(*id))
            .filter_map(|(id, renderable)| {
                let transform = c.transform.get(id)?;
                let team = c
                    .team
                    .get(id)
                    .map(|t| t.id)
                    .or_else(|| c.banner_leader.get(id).map(|b| b.team))
                    .or_else(|| c.crown.get(id).map(|cr| cr.origin_team));
                Some(RenderEntry {
                    id,
                    mesh: renderable.mesh,
                    visible: renderable.visible,
                    position: transform.position,
                    rotation: transform.rotation,
                    elevation: transform.elevation,
                    health_ratio: c.health.get(id).map(|h| h.ratio()),
                    team,
                    broken: c.cohesion.get(id).is_some_and(|co| co.broken),
                    glow: c.crown_bearer.get(id).map_or(0.0, |b| b.glow),
                })
            })
            .collect()
    }
}
