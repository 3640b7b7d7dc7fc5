//! Lifecycle notifications delivered to the owning level.

use rgb_spatial::{EntityAccess, EntityId, Visibility};

/// Hooks the managers invoke as entities enter, leave and move through the
/// world. All calls happen on the simulation thread.
///
/// Ticking callbacks are always nested inside tracking ones for the same
/// entity: `on_tracking_start` precedes `on_ticking_start`, and
/// `on_ticking_end` precedes `on_tracking_end`.
pub trait LevelCallback<T> {
    fn on_created(&mut self, entity: &T);

    fn on_destroyed(&mut self, entity: &T);

    fn on_tracking_start(&mut self, entity: &T);

    fn on_tracking_end(&mut self, entity: &T);

    fn on_ticking_start(&mut self, entity: &T);

    fn on_ticking_end(&mut self, entity: &T);

    /// The entity's section changed, or it moved within a visible one.
    fn on_section_change(&mut self, entity: &T);
}

/// Ignores everything.
impl<T> LevelCallback<T> for () {
    fn on_created(&mut self, _: &T) {}

    fn on_destroyed(&mut self, _: &T) {}

    fn on_tracking_start(&mut self, _: &T) {}

    fn on_tracking_end(&mut self, _: &T) {}

    fn on_ticking_start(&mut self, _: &T) {}

    fn on_ticking_end(&mut self, _: &T) {}

    fn on_section_change(&mut self, _: &T) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Created,
    Destroyed,
    TrackingStart,
    TrackingEnd,
    TickingStart,
    TickingEnd,
    SectionChange,
}

/// Records every callback in order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<(LifecycleEvent, EntityId)>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> &[(LifecycleEvent, EntityId)] {
        &self.events
    }

    /// Events recorded for one entity, in order.
    pub fn for_entity(&self, id: EntityId) -> impl Iterator<Item = LifecycleEvent> + '_ {
        self.events
            .iter()
            .filter(move |(_, entity)| *entity == id)
            .map(|(event, _)| *event)
    }

    #[must_use]
    pub fn count(&self, event: LifecycleEvent) -> usize {
        self.events.iter().filter(|(e, _)| *e == event).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    fn push<T: EntityAccess>(&mut self, event: LifecycleEvent, entity: &T) {
        self.events.push((event, entity.id()));
    }
}

impl<T: EntityAccess> LevelCallback<T> for EventLog {
    fn on_created(&mut self, entity: &T) {
        self.push(LifecycleEvent::Created, entity);
    }

    fn on_destroyed(&mut self, entity: &T) {
        self.push(LifecycleEvent::Destroyed, entity);
    }

    fn on_tracking_start(&mut self, entity: &T) {
        self.push(LifecycleEvent::TrackingStart, entity);
    }

    fn on_tracking_end(&mut self, entity: &T) {
        self.push(LifecycleEvent::TrackingEnd, entity);
    }

    fn on_ticking_start(&mut self, entity: &T) {
        self.push(LifecycleEvent::TickingStart, entity);
    }

    fn on_ticking_end(&mut self, entity: &T) {
        self.push(LifecycleEvent::TickingEnd, entity);
    }

    fn on_section_change(&mut self, entity: &T) {
        self.push(LifecycleEvent::SectionChange, entity);
    }
}

/// Fire the callbacks for `entities` moving from `old` to `new`.
///
/// Phases run across the whole batch: stop ticking, then tracking changes,
/// then start ticking.
pub(crate) fn fire_transitions<T, C: LevelCallback<T>>(
    callbacks: &mut C,
    entities: &[T],
    old: Visibility,
    new: Visibility,
) {
    if old.is_ticking() && !new.is_ticking() {
        for entity in entities {
            callbacks.on_ticking_end(entity);
        }
    }

    if old.is_accessible() && !new.is_accessible() {
        for entity in entities {
            callbacks.on_tracking_end(entity);
        }
    } else if !old.is_accessible() && new.is_accessible() {
        for entity in entities {
            callbacks.on_tracking_start(entity);
        }
    }

    if !old.is_ticking() && new.is_ticking() {
        for entity in entities {
            callbacks.on_ticking_start(entity);
        }
    }
}
