/// Item templates and item instances
///
/// A template carries the shared stats (name, value, weight, capacity); an
/// item is one instance of a template and may itself contain other items.
/// Container weight is computed recursively through the store, locking each
/// contained item on its own and never while another lock is held. The
/// result is therefore not an atomic snapshot when contents change
/// concurrently.

use crate::core::{Contents, Entity, EntityData, EntityKind, EntityStore, Id, Locked};
use crate::error::{MudError, Result};
use crate::world::format_name;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateData {
    pub name: String,

    #[serde(default)]
    pub value: i64,

    #[serde(default)]
    pub weight: i64,

    #[serde(default)]
    pub capacity: i64,
}

impl TemplateData {
    pub fn new(name: &str) -> Self {
        Self {
            name: format_name(name),
            value: 0,
            weight: 0,
            capacity: 0,
        }
    }
}

pub type Template = Locked<TemplateData>;

impl Template {
    pub fn name(&self) -> String {
        self.read(|t| t.name.clone())
    }

    pub fn set_name(&self, name: &str) -> bool {
        self.update(format_name(name), |t| &t.name, |t| &mut t.name)
    }

    pub fn value(&self) -> i64 {
        self.read(|t| t.value)
    }

    pub fn set_value(&self, value: i64) -> bool {
        self.update(value, |t| &t.value, |t| &mut t.value)
    }

    pub fn weight(&self) -> i64 {
        self.read(|t| t.weight)
    }

    pub fn set_weight(&self, weight: i64) -> bool {
        self.update(weight, |t| &t.weight, |t| &mut t.weight)
    }

    pub fn capacity(&self) -> i64 {
        self.read(|t| t.capacity)
    }

    pub fn set_capacity(&self, capacity: i64) -> bool {
        self.update(capacity, |t| &t.capacity, |t| &mut t.capacity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemData {
    pub template_id: Id,

    #[serde(default)]
    pub locked: bool,

    #[serde(default)]
    pub items: Vec<Id>,
}

impl ItemData {
    pub fn new(template_id: Id) -> Self {
        Self {
            template_id,
            locked: false,
            items: Vec::new(),
        }
    }
}

impl Contents for ItemData {
    fn contents(&self) -> &Vec<Id> {
        &self.items
    }

    fn contents_mut(&mut self) -> &mut Vec<Id> {
        &mut self.items
    }
}

pub type Item = Locked<ItemData>;

impl Item {
    pub fn template_id(&self) -> Id {
        self.read(|i| i.template_id)
    }

    pub fn template(&self, store: &EntityStore) -> Result<Arc<Template>> {
        store.template(self.template_id())
    }

    pub fn name(&self, store: &EntityStore) -> Result<String> {
        Ok(self.template(store)?.name())
    }

    pub fn value(&self, store: &EntityStore) -> Result<i64> {
        Ok(self.template(store)?.value())
    }

    pub fn capacity(&self, store: &EntityStore) -> Result<i64> {
        Ok(self.template(store)?.capacity())
    }

    pub fn is_locked(&self) -> bool {
        self.read(|i| i.locked)
    }

    pub fn set_locked(&self, locked: bool) -> bool {
        self.update(locked, |i| &i.locked, |i| &mut i.locked)
    }

    /// Template weight plus the weight of everything inside, recursively
    ///
    /// Fails with `ContainmentCycle` if an item is (transitively) inside
    /// itself.
    pub fn weight(&self, store: &EntityStore) -> Result<i64> {
        let mut path = HashSet::new();
        self.weight_along(store, &mut path)
    }

    /// Weight of the contents alone
    pub fn contents_weight(&self, store: &EntityStore) -> Result<i64> {
        let mut path = HashSet::from([self.id()]);
        self.children_weight(store, &mut path)
    }

    /// Whether `other` can be put inside this item without exceeding its
    /// capacity or creating a cycle
    pub fn fits(&self, store: &EntityStore, other: &Item) -> Result<bool> {
        if other.id() == self.id() || self.is_inside(store, other)? {
            return Ok(false);
        }
        let used = self.contents_weight(store)?;
        Ok(used + other.weight(store)? <= self.capacity(store)?)
    }

    /// Whether this item sits somewhere inside `container`
    fn is_inside(&self, store: &EntityStore, container: &Item) -> Result<bool> {
        let mut pending = container.items();
        let mut seen = HashSet::new();
        while let Some(id) = pending.pop() {
            if id == self.id() {
                return Ok(true);
            }
            if seen.insert(id) {
                pending.extend(store.item(id)?.items());
            }
        }
        Ok(false)
    }

    fn weight_along(&self, store: &EntityStore, path: &mut HashSet<Id>) -> Result<i64> {
        if !path.insert(self.id()) {
            warn!("Containment cycle through item {}", self.id());
            return Err(MudError::ContainmentCycle { id: self.id() });
        }

        let weight = self.template(store)?.weight() + self.children_weight(store, path)?;

        path.remove(&self.id());
        Ok(weight)
    }

    fn children_weight(&self, store: &EntityStore, path: &mut HashSet<Id>) -> Result<i64> {
        let mut weight = 0;
        for id in self.items() {
            weight += store.item(id)?.weight_along(store, path)?;
        }
        Ok(weight)
    }
}

impl EntityData for TemplateData {
    const KIND: EntityKind = EntityKind::Template;

    fn wrap(entity: Arc<Template>) -> Entity {
        Entity::Template(entity)
    }

    fn unwrap(entity: &Entity) -> Option<Arc<Template>> {
        match entity {
            Entity::Template(template) => Some(template.clone()),
            _ => None,
        }
    }
}

impl EntityData for ItemData {
    const KIND: EntityKind = EntityKind::Item;

    fn wrap(entity: Arc<Item>) -> Entity {
        Entity::Item(entity)
    }

    fn unwrap(entity: &Entity) -> Option<Arc<Item>> {
        match entity {
            Entity::Item(item) => Some(item.clone()),
            _ => None,
        }
    }
}
