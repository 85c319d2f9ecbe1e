use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::components::*;
use crate::id::EntityId;

/// One typed component table: entity id → component data.
///
/// Backed by a `BTreeMap` so every iteration is in ascending id order, which
/// keeps systems deterministic without extra sorting.
#[derive(Debug, Clone)]
pub struct ComponentStore<T> {
    data: BTreeMap<EntityId, T>,
}

impl<T> Default for ComponentStore<T> {
    fn default() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }
}

impl<T: Clone> ComponentStore<T> {
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.data.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.data.get_mut(&id)
    }

    pub fn insert(&mut self, id: EntityId, value: T) -> Option<T> {
        self.data.insert(id, value)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        self.data.remove(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.data.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.data.iter().map(|(id, v)| (*id, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.data.iter_mut().map(|(id, v)| (*id, v))
    }

    /// Ids in ascending order, detached from the store so callers can mutate
    /// while walking them.
    pub fn ids(&self) -> Vec<EntityId> {
        self.data.keys().copied().collect()
    }

    pub fn to_pairs(&self) -> Vec<(EntityId, T)> {
        self.data.iter().map(|(id, v)| (*id, v.clone())).collect()
    }

    pub fn from_pairs(pairs: Vec<(EntityId, T)>) -> Self {
        Self {
            data: pairs.into_iter().collect(),
        }
    }
}

/// A component type with a fixed home in [`Components`].
pub trait Component: Clone + Serialize + DeserializeOwned + 'static {
    const STORE: StoreKey;

    fn store(components: &Components) -> &ComponentStore<Self>;
    fn store_mut(components: &mut Components) -> &mut ComponentStore<Self>;
}

component_stores! {
    transform: Transform => Transform,
    health: Health => Health,
    team: Team => Team,
    unit: Unit => Unit,
    combatant: Combatant => Combatant,
    banner_leader: BannerLeader => BannerLeader,
    warband_member: WarbandMember => WarbandMember,
    movable: Movable => Movable,
    cohesion: Cohesion => Cohesion,
    ai_controller: AiController => AiController,
    essence_shard: EssenceShard => EssenceShard,
    shard_fountain: ShardFountain => ShardFountain,
    crown: Crown => Crown,
    crown_bearer: CrownBearer => CrownBearer,
    renderable: Renderable => Renderable,
}

impl Components {
    pub fn get<T: Component>(&self, id: EntityId) -> Option<&T> {
        T::store(self).get(id)
    }

    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        T::store_mut(self).get_mut(id)
    }

    pub fn insert<T: Component>(&mut self, id: EntityId, value: T) -> Option<T> {
        T::store_mut(self).insert(id, value)
    }

    pub fn remove<T: Component>(&mut self, id: EntityId) -> Option<T> {
        T::store_mut(self).remove(id)
    }

    pub fn has<T: Component>(&self, id: EntityId) -> bool {
        T::store(self).contains(id)
    }

    pub fn store<T: Component>(&self) -> &ComponentStore<T> {
        T::store(self)
    }

    pub fn position(&self, id: EntityId) -> Option<super::Vec2> {
        self.transform.get(id).map(|t| t.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Vec2;

    #[test]
    fn typed_access_hits_the_right_table() {
        let mut c = Components::default();
        c.insert(3, Health::new(10.0));
        c.insert(3, Team { id: 2 });
        assert_eq!(c.get::<Health>(3).map(|h| h.max), Some(10.0));
        assert_eq!(c.team.get(3), Some(&Team { id: 2 }));
        assert!(!c.has::<Unit>(3));
        assert_eq!(<Health as Component>::STORE.as_str(), "health");
    }

    #[test]
    fn remove_entity_clears_every_table() {
        let mut c = Components::default();
        c.insert(1, Transform::at(Vec2::new(1.0, 2.0)));
        c.insert(1, Health::new(5.0));
        c.insert(2, Health::new(5.0));
        assert_eq!(c.remove_entity(1), 2);
        assert!(c.get::<Transform>(1).is_none());
        assert_eq!(c.entity_ids().into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn iteration_is_in_id_order() {
        let mut c = Components::default();
        for id in [9, 2, 5] {
            c.insert(id, Team { id: 1 });
        }
        assert_eq!(c.team.ids(), vec![2, 5, 9]);
    }

    #[test]
    fn snapshot_uses_store_names() {
        let mut c = Components::default();
        c.insert(4, Team { id: 7 });
        let json = serde_json::to_value(c.to_snapshot()).unwrap();
        assert_eq!(json["team"][0][0], 4);
        assert_eq!(json["team"][0][1]["id"], 7);
        let back = Components::from_snapshot(serde_json::from_value(json).unwrap());
        assert_eq!(back.team.get(4), Some(&Team { id: 7 }));
    }

    #[test]
    fn unknown_store_name_is_rejected() {
        let json = serde_json::json!({ "team": [], "spaceship": [] });
        assert!(serde_json::from_value::<StoreSnapshot>(json).is_err());
    }

    #[test]
    fn store_keys_cover_every_table() {
        assert_eq!(StoreKey::ALL.len(), 15);
        assert_eq!(StoreKey::BannerLeader.as_str(), "banner_leader");
    }
}
