use std::collections::HashMap;

use crate::dispatch::Handler;
use crate::interface::Interface;
use crate::proxy::ObjectRef;

/// Which kind of wrapper currently holds a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Owner {
    /// Created or received by this side; destroying it notifies the peer.
    Managed,
    /// Bound to an existing handle; destroying it only forgets the binding.
    Unmanaged,
}

/// Handler slot of one event.
#[derive(Default)]
pub(crate) struct Slot {
    handler: Option<Handler>,
    /// Bumped on every install or clear.
    epoch: u32,
    running: bool,
}

impl Slot {
    /// Installs `handler` (or clears the slot) and returns the previous one.
    pub(crate) fn replace(&mut self, handler: Option<Handler>) -> Option<Handler> {
        self.epoch = self.epoch.wrapping_add(1);
        std::mem::replace(&mut self.handler, handler)
    }

    /// Takes the handler out for one call.
    pub(crate) fn enter(&mut self) -> Option<(Handler, u32)> {
        let handler = self.handler.take()?;
        self.running = true;
        Some((handler, self.epoch))
    }

    /// Ends a call started by `enter`. The handler goes back only if nothing
    /// installed or cleared the slot meanwhile; otherwise it is handed back
    /// to be dropped.
    pub(crate) fn leave(&mut self, handler: Handler, epoch: u32) -> Option<Handler> {
        self.running = false;
        if self.epoch == epoch {
            self.handler = Some(handler);
            None
        } else {
            Some(handler)
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running
    }
}

pub(crate) struct Record {
    pub(crate) interface: &'static Interface,
    pub(crate) version: u32,
    pub(crate) serial: u32,
    pub(crate) owner: Option<Owner>,
    /// Whether the peer knows the id. A record created here is not announced
    /// until a request carrying it as a new id has been sent.
    pub(crate) announced: bool,
    pub(crate) handlers: Vec<Slot>,
}

impl Record {
    pub(crate) fn object_ref(&self, id: u32) -> ObjectRef {
        ObjectRef::new(id, self.serial, self.interface)
    }
}

pub(crate) enum Entry {
    Live(Record),
    /// Destroyed here, not yet acknowledged by the peer. Events are decoded
    /// and thrown away.
    Zombie(&'static Interface),
}

/// Records of one connection, keyed by object id.
#[derive(Default)]
pub(crate) struct ObjectMap {
    entries: HashMap<u32, Entry>,
    serial: u32,
}

impl ObjectMap {
    /// A map holding only the unowned root object, usually the display.
    pub(crate) fn with_root(id: u32, interface: &'static Interface, version: u32) -> (ObjectMap, ObjectRef) {
        let mut map = ObjectMap::default();
        map.serial = 1;
        let handlers = std::iter::repeat_with(Slot::default).take(interface.events.len()).collect();
        let record = Record { interface, version, serial: map.serial, owner: None, announced: true, handlers };
        let root = record.object_ref(id);
        map.entries.insert(id, Entry::Live(record));
        (map, root)
    }

    /// Registers a live managed record. Fails if `id` is null or already taken.
    pub(crate) fn insert(
        &mut self,
        id: u32,
        interface: &'static Interface,
        version: u32,
        announced: bool,
    ) -> Option<ObjectRef> {
        if id == 0 || self.entries.contains_key(&id) {
            return None;
        }
        self.serial = self.serial.wrapping_add(1);
        let handlers = std::iter::repeat_with(Slot::default).take(interface.events.len()).collect();
        let owner = Some(Owner::Managed);
        let record = Record { interface, version, serial: self.serial, owner, announced, handlers };
        let obj = record.object_ref(id);
        self.entries.insert(id, Entry::Live(record));
        Some(obj)
    }

    pub(crate) fn entry(&self, id: u32) -> Option<&Entry> {
        self.entries.get(&id)
    }

    pub(crate) fn live(&self, id: u32) -> Option<&Record> {
        match self.entries.get(&id)? {
            Entry::Live(record) => Some(record),
            Entry::Zombie(_) => None,
        }
    }

    pub(crate) fn live_mut(&mut self, id: u32) -> Option<&mut Record> {
        match self.entries.get_mut(&id)? {
            Entry::Live(record) => Some(record),
            Entry::Zombie(_) => None,
        }
    }

    /// The record `obj` was issued for, if it is still live.
    pub(crate) fn lookup(&self, obj: ObjectRef) -> Option<&Record> {
        self.live(obj.id()).filter(|r| r.serial == obj.serial())
    }

    pub(crate) fn lookup_mut(&mut self, obj: ObjectRef) -> Option<&mut Record> {
        self.live_mut(obj.id()).filter(|r| r.serial == obj.serial())
    }

    pub(crate) fn slot(&self, obj: ObjectRef, event: u16) -> Option<&Slot> {
        self.lookup(obj)?.handlers.get(usize::from(event))
    }

    pub(crate) fn slot_mut(&mut self, obj: ObjectRef, event: u16) -> Option<&mut Slot> {
        self.lookup_mut(obj)?.handlers.get_mut(usize::from(event))
    }

    /// Turns a live record into a zombie and hands the record back so the
    /// caller can drop its handlers outside any borrow of the map.
    pub(crate) fn zombify(&mut self, id: u32) -> Option<Record> {
        let entry = self.entries.get_mut(&id)?;
        let Entry::Live(record) = entry else {
            return None;
        };
        let interface = record.interface;
        match std::mem::replace(entry, Entry::Zombie(interface)) {
            Entry::Live(record) => Some(record),
            Entry::Zombie(_) => None,
        }
    }

    pub(crate) fn remove(&mut self, id: u32) -> Option<Entry> {
        self.entries.remove(&id)
    }

    pub(crate) fn live_count(&self) -> usize {
        self.entries.values().filter(|e| matches!(e, Entry::Live(_))).count()
    }
}
