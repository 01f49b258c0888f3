/// Locked entity base shared by every persistent world object
///
/// A `Locked<T>` owns the fields of one entity behind a reader-writer lock.
/// Getters copy data out under the read lock. Setters compare the new value
/// against the current one and only write (and notify) on an actual change.
/// The change hook always runs after the lock has been released, so a hook
/// that touches other entities can never form a lock-ordering cycle.

use crate::core::{EntityKind, EventBus, Event, Id};
use crate::error::Result;
use crate::persistence::Persister;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, trace};

/// Serialized snapshot of one entity's fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Id,
    pub kind: EntityKind,
    pub data: serde_json::Value,
}

/// Notification produced by a committed mutation
#[derive(Debug, Clone)]
pub struct Change {
    /// Current state of the entity, to be persisted
    pub record: Record,

    /// Event to broadcast, for mutations with world-visible effect
    pub event: Option<Event>,
}

/// Receives every committed entity mutation
#[cfg_attr(test, mockall::automock)]
pub trait ChangeHook: Send + Sync {
    /// Called outside the entity lock, once per effective change
    fn modified(&self, change: Change);
}

/// Entity fields that hold a list of contained item ids
pub trait Contents {
    fn contents(&self) -> &Vec<Id>;
    fn contents_mut(&mut self) -> &mut Vec<Id>;
}

/// A world object's fields guarded by a reader-writer lock
pub struct Locked<T> {
    id: Id,
    kind: EntityKind,
    fields: RwLock<T>,
    hook: Arc<dyn ChangeHook>,
}

impl<T> Locked<T> {
    pub fn new(id: Id, kind: EntityKind, fields: T, hook: Arc<dyn ChangeHook>) -> Self {
        Self {
            id,
            kind,
            fields: RwLock::new(fields),
            hook,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Run `f` under the read lock and return its result
    ///
    /// Keep `f` short and never resolve other entities from inside it.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let fields = self.fields.read();
        f(&fields)
    }
}

impl<T: Serialize> Locked<T> {
    /// Serialize the current fields into a record
    pub fn snapshot(&self) -> Result<Record> {
        let data = {
            let fields = self.fields.read();
            serde_json::to_value(&*fields)?
        };

        Ok(Record {
            id: self.id,
            kind: self.kind,
            data,
        })
    }

    /// Hand the current state to the change hook without modifying anything
    pub fn persist(&self) {
        self.notify(None);
    }

    /// Set one field, comparing first
    ///
    /// Returns `true` if the value changed. Setting the current value is a
    /// no-op and does not reach the hook.
    pub fn update<V: PartialEq>(
        &self,
        value: V,
        read: impl FnOnce(&T) -> &V,
        write: impl FnOnce(&mut T) -> &mut V,
    ) -> bool {
        self.update_with(value, read, write, || None)
    }

    /// Like `update`, also publishing the event built by `event` on change
    pub fn update_with<V: PartialEq>(
        &self,
        value: V,
        read: impl FnOnce(&T) -> &V,
        write: impl FnOnce(&mut T) -> &mut V,
        event: impl FnOnce() -> Option<Event>,
    ) -> bool {
        // Upgradable read: concurrent with readers, exclusive against writers,
        // so the comparison still holds when the write happens.
        let fields = self.fields.upgradable_read();
        if read(&*fields) == &value {
            return false;
        }

        let mut fields = RwLockUpgradableReadGuard::upgrade(fields);
        *write(&mut *fields) = value;
        drop(fields);

        self.notify(event());
        true
    }

    /// Apply `apply` only if `needed` holds, for mutations that are not a
    /// plain assignment (collections, toggles)
    pub fn mutate_if(
        &self,
        needed: impl FnOnce(&T) -> bool,
        apply: impl FnOnce(&mut T),
        event: impl FnOnce() -> Option<Event>,
    ) -> bool {
        let fields = self.fields.upgradable_read();
        if !needed(&*fields) {
            return false;
        }

        let mut fields = RwLockUpgradableReadGuard::upgrade(fields);
        apply(&mut *fields);
        drop(fields);

        self.notify(event());
        true
    }

    fn notify(&self, event: Option<Event>) {
        match self.snapshot() {
            Ok(record) => {
                trace!("{} {} modified", self.kind, self.id);
                self.hook.modified(Change { record, event });
            }
            Err(e) => error!("Failed to snapshot {} {}: {}", self.kind, self.id, e),
        }
    }
}

impl<T: Contents + Serialize> Locked<T> {
    /// Ids of the directly contained items
    pub fn items(&self) -> Vec<Id> {
        self.read(|fields| fields.contents().clone())
    }

    pub fn has_item(&self, id: Id) -> bool {
        self.read(|fields| fields.contents().contains(&id))
    }

    pub fn add_item(&self, id: Id) -> bool {
        self.mutate_if(
            |fields| !fields.contents().contains(&id),
            |fields| fields.contents_mut().push(id),
            || None,
        )
    }

    pub fn remove_item(&self, id: Id) -> bool {
        self.mutate_if(
            |fields| fields.contents().contains(&id),
            |fields| fields.contents_mut().retain(|item| *item != id),
            || None,
        )
    }
}

impl<T> fmt::Debug for Locked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locked")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Change hook wiring mutations to persistence and the event bus
pub struct WorldHook {
    persister: Arc<dyn Persister>,
    bus: Arc<EventBus>,
}

impl WorldHook {
    pub fn new(persister: Arc<dyn Persister>, bus: Arc<EventBus>) -> Self {
        Self { persister, bus }
    }
}

impl ChangeHook for WorldHook {
    fn modified(&self, change: Change) {
        self.persister.save(change.record);
        if let Some(event) = change.event {
            self.bus.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::OnceLock;
    use std::thread;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Sample {
        name: String,
        level: i32,
        gold: i32,
        items: Vec<Id>,
    }

    impl Contents for Sample {
        fn contents(&self) -> &Vec<Id> {
            &self.items
        }

        fn contents_mut(&mut self) -> &mut Vec<Id> {
            &mut self.items
        }
    }

    #[derive(Default)]
    struct RecordingHook {
        changes: Mutex<Vec<Change>>,
        entity: OnceLock<Arc<Locked<Sample>>>,
        saw_lock_held: Mutex<bool>,
    }

    impl ChangeHook for RecordingHook {
        fn modified(&self, change: Change) {
            if let Some(entity) = self.entity.get() {
                if entity.fields.is_locked() {
                    *self.saw_lock_held.lock() = true;
                }
            }
            self.changes.lock().push(change);
        }
    }

    fn sample(hook: Arc<dyn ChangeHook>) -> Locked<Sample> {
        Locked::new(Id::new(), EntityKind::Character, Sample::default(), hook)
    }

    fn set_name(entity: &Locked<Sample>, name: &str) -> bool {
        entity.update(name.to_string(), |s| &s.name, |s| &mut s.name)
    }

    #[test]
    fn test_update_changes_value_and_notifies() {
        let hook = Arc::new(RecordingHook::default());
        let entity = sample(hook.clone());

        assert!(set_name(&entity, "Bob"));
        assert_eq!(entity.read(|s| s.name.clone()), "Bob");

        let changes = hook.changes.lock();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].record.id, entity.id());
        assert_eq!(changes[0].record.data["name"], "Bob");
        assert!(changes[0].event.is_none());
    }

    #[test]
    fn test_setting_current_value_does_not_notify() {
        let mut mock = MockChangeHook::new();
        mock.expect_modified().times(1).return_const(());
        let entity = sample(Arc::new(mock));

        assert!(set_name(&entity, "Bob"));
        assert!(!set_name(&entity, "Bob"), "Same value must be a no-op");
    }

    #[test]
    fn test_hook_runs_outside_the_lock() {
        let hook = Arc::new(RecordingHook::default());
        let entity = Arc::new(sample(hook.clone()));
        hook.entity.set(entity.clone()).unwrap();

        set_name(&entity, "Alice");
        entity.update(7, |s| &s.level, |s| &mut s.level);
        entity.add_item(Id::new());

        assert_eq!(hook.changes.lock().len(), 3);
        assert!(!*hook.saw_lock_held.lock(), "Hook must not run under the entity lock");
    }

    #[test]
    fn test_concurrent_setters_on_distinct_fields() {
        let hook = Arc::new(RecordingHook::default());
        let entity = Arc::new(sample(hook));

        let levels = {
            let entity = entity.clone();
            thread::spawn(move || {
                for level in 1..=500 {
                    entity.update(level, |s| &s.level, |s| &mut s.level);
                }
            })
        };
        let gold = {
            let entity = entity.clone();
            thread::spawn(move || {
                for gold in 1..=500 {
                    entity.update(gold * 2, |s| &s.gold, |s| &mut s.gold);
                }
            })
        };
        let names = {
            let entity = entity.clone();
            thread::spawn(move || {
                for i in 1..=500 {
                    set_name(&entity, &format!("name{}", i));
                }
            })
        };

        levels.join().unwrap();
        gold.join().unwrap();
        names.join().unwrap();

        assert_eq!(entity.read(|s| s.level), 500);
        assert_eq!(entity.read(|s| s.gold), 1000);
        assert_eq!(entity.read(|s| s.name.clone()), "name500");
    }

    #[test]
    fn test_contents_add_and_remove() {
        let hook = Arc::new(RecordingHook::default());
        let entity = sample(hook.clone());
        let sword = Id::new();

        assert!(entity.add_item(sword));
        assert!(!entity.add_item(sword), "Adding twice is a no-op");
        assert!(entity.has_item(sword));
        assert_eq!(entity.items(), vec![sword]);

        assert!(entity.remove_item(sword));
        assert!(!entity.remove_item(sword), "Removing an absent item is a no-op");
        assert!(entity.items().is_empty());

        assert_eq!(hook.changes.lock().len(), 2);
    }

    #[test]
    fn test_mutate_if_skips_when_not_needed() {
        let mut mock = MockChangeHook::new();
        mock.expect_modified().never();
        let entity = sample(Arc::new(mock));

        let changed = entity.mutate_if(|s| s.level > 0, |s| s.level += 1, || None);

        assert!(!changed);
        assert_eq!(entity.read(|s| s.level), 0);
    }

    #[test]
    fn test_snapshot_round_trips_fields() {
        let hook = Arc::new(RecordingHook::default());
        let entity = sample(hook);
        set_name(&entity, "Carol");

        let record = entity.snapshot().unwrap();
        let fields: Sample = serde_json::from_value(record.data).unwrap();

        assert_eq!(record.kind, EntityKind::Character);
        assert_eq!(fields.name, "Carol");
    }
}
