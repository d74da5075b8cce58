use std::fmt;
use std::hash::{Hash, Hasher};
use std::os::fd::BorrowedFd;
use std::rc::Weak;

use crate::connection::{Connection, Inner};
use crate::dispatch::Args;
use crate::interface::Interface;
use crate::wire::Fixed;
use crate::Result;

/// Non-owning reference to a registry record.
///
/// Carries the serial the record was registered with, so a reference to an
/// object whose id has since been recycled never matches the new object.
#[derive(Clone, Copy)]
pub struct ObjectRef {
    id: u32,
    serial: u32,
    interface: &'static Interface,
}

impl ObjectRef {
    pub(crate) fn new(id: u32, serial: u32, interface: &'static Interface) -> ObjectRef {
        ObjectRef { id, serial, interface }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub(crate) fn serial(&self) -> u32 {
        self.serial
    }

    pub fn interface(&self) -> &'static Interface {
        self.interface
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &ObjectRef) -> bool {
        self.id == other.id && self.serial == other.serial
    }
}

impl Eq for ObjectRef {}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.serial.hash(state);
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.interface.name, self.id)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.interface.name, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    /// Never associated with a handle.
    Unbound,
    Live,
    /// Destroyed, moved from, or outlived its record. Every operation is a no-op.
    Inert,
}

/// A request argument.
#[derive(Debug, Clone, Copy)]
pub enum Arg<'a> {
    Int(i32),
    Uint(u32),
    Fixed(Fixed),
    Str(Option<&'a str>),
    /// `None`, or a reference that is no longer live, encodes as null.
    Object(Option<ObjectRef>),
    /// A wrapper created for this request; it must be registered already.
    NewId(&'a Proxy),
    Array(&'a [u8]),
    Fd(BorrowedFd<'a>),
}

impl Arg<'_> {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Arg::Int(_) => "int",
            Arg::Uint(_) => "uint",
            Arg::Fixed(_) => "fixed",
            Arg::Str(_) => "string",
            Arg::Object(_) => "object",
            Arg::NewId(_) => "new_id",
            Arg::Array(_) => "array",
            Arg::Fd(_) => "fd",
        }
    }
}

/// Implemented by every typed wrapper.
pub trait Object: Sized {
    const INTERFACE: &'static Interface;

    fn from_proxy(proxy: Proxy) -> Self;
    fn proxy(&self) -> &Proxy;
    fn proxy_mut(&mut self) -> &mut Proxy;

    fn object(&self) -> Option<ObjectRef> {
        self.proxy().object()
    }

    fn is_live(&self) -> bool {
        self.proxy().is_live()
    }
}

enum Binding {
    Unbound,
    Bound {
        conn: Weak<Inner>,
        obj: ObjectRef,
        managed: bool,
    },
    Inert,
}

/// Owner of one registry record.
///
/// A managed proxy was created by a request or handed over by an event, and
/// destroying it tells the peer. An unmanaged proxy was bound to an existing
/// handle and destroying it only forgets the binding. Dropping a proxy
/// destroys it.
pub struct Proxy {
    binding: Binding,
}

impl Proxy {
    pub const fn unbound() -> Proxy {
        Proxy { binding: Binding::Unbound }
    }

    pub(crate) const fn inert() -> Proxy {
        Proxy { binding: Binding::Inert }
    }

    pub(crate) fn bound(conn: Weak<Inner>, obj: ObjectRef, managed: bool) -> Proxy {
        Proxy { binding: Binding::Bound { conn, obj, managed } }
    }

    fn target(&self) -> Option<(Connection, ObjectRef)> {
        match &self.binding {
            Binding::Bound { conn, obj, .. } => Some((Connection::from_inner(conn.upgrade()?), *obj)),
            Binding::Unbound | Binding::Inert => None,
        }
    }

    /// The bound reference without checking that it is still live.
    pub(crate) fn bound_ref(&self) -> Option<ObjectRef> {
        match &self.binding {
            Binding::Bound { obj, .. } => Some(*obj),
            Binding::Unbound | Binding::Inert => None,
        }
    }

    pub fn state(&self) -> ProxyState {
        match &self.binding {
            Binding::Unbound => ProxyState::Unbound,
            Binding::Inert => ProxyState::Inert,
            Binding::Bound { .. } => match self.target() {
                Some((conn, obj)) if conn.is_live(obj) => ProxyState::Live,
                _ => ProxyState::Inert,
            },
        }
    }

    pub fn is_live(&self) -> bool {
        self.state() == ProxyState::Live
    }

    pub fn is_managed(&self) -> bool {
        matches!(self.binding, Binding::Bound { managed: true, .. })
    }

    /// Reference to the record, only while live.
    pub fn object(&self) -> Option<ObjectRef> {
        self.target().filter(|(conn, obj)| conn.is_live(*obj)).map(|(_, obj)| obj)
    }

    pub fn id(&self) -> Option<u32> {
        self.object().map(|o| o.id())
    }

    pub fn interface(&self) -> Option<&'static Interface> {
        self.object().map(|o| o.interface())
    }

    pub fn version(&self) -> Option<u32> {
        let (conn, obj) = self.target()?;
        conn.version_of(obj)
    }

    pub fn connection(&self) -> Option<Connection> {
        self.target().map(|(conn, _)| conn)
    }

    /// Marshals request `opcode`. A no-op once the proxy is not live.
    pub fn send(&self, opcode: u16, args: &[Arg<'_>]) -> Result<()> {
        let Some((conn, obj)) = self.target() else {
            return Ok(());
        };
        conn.send_request(obj, opcode, args)
    }

    /// Allocates a managed child with this proxy's version.
    ///
    /// The child is registered before this returns, so it can be passed as a
    /// new-id argument to the request that creates it on the peer.
    pub fn create(&self, interface: &'static Interface) -> Result<Proxy> {
        let Some((conn, obj)) = self.target() else {
            return Ok(Proxy::inert());
        };
        let Some(version) = conn.version_of(obj) else {
            return Ok(Proxy::inert());
        };
        conn.create_object(interface, version)
    }

    pub fn create_versioned(&self, interface: &'static Interface, version: u32) -> Result<Proxy> {
        let Some((conn, obj)) = self.target() else {
            return Ok(Proxy::inert());
        };
        if !conn.is_live(obj) {
            return Ok(Proxy::inert());
        }
        conn.create_object(interface, version)
    }

    pub fn create_object<T: Object>(&self) -> Result<T> {
        self.create(T::INTERFACE).map(T::from_proxy)
    }

    /// Installs the handler for event `event`, replacing any previous one.
    ///
    /// The handler must not own the [`Connection`]; it receives one on every call.
    pub fn set_handler<F>(&self, event: u16, handler: F) -> Result<()>
    where
        F: FnMut(&Connection, ObjectRef, Args) -> Result<()> + 'static,
    {
        let Some((conn, obj)) = self.target() else {
            return Ok(());
        };
        conn.set_handler(obj, event, Some(Box::new(handler)))
    }

    pub fn clear_handler(&self, event: u16) -> Result<()> {
        let Some((conn, obj)) = self.target() else {
            return Ok(());
        };
        conn.set_handler(obj, event, None)
    }

    /// Ends this proxy's association with its record.
    ///
    /// Managed: sends the destructor request if the interface has one at this
    /// version, then retires the record. Unmanaged: releases the binding and
    /// drops the handlers. Idempotent.
    pub fn destroy(&mut self) {
        let binding = std::mem::replace(&mut self.binding, Binding::Inert);
        match binding {
            Binding::Unbound => self.binding = Binding::Unbound,
            Binding::Inert => {}
            Binding::Bound { conn, obj, managed } => {
                if let Some(inner) = conn.upgrade() {
                    Connection::from_inner(inner).destroy_object(obj, managed);
                }
            }
        }
    }

    /// Moves the binding out, leaving this proxy inert.
    pub fn take(&mut self) -> Proxy {
        Proxy { binding: std::mem::replace(&mut self.binding, Binding::Inert) }
    }
}

impl Default for Proxy {
    fn default() -> Self {
        Proxy::unbound()
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.binding {
            Binding::Unbound => f.write_str("Proxy(unbound)"),
            Binding::Inert => f.write_str("Proxy(inert)"),
            Binding::Bound { obj, managed, .. } => {
                let kind = if *managed { "managed" } else { "unmanaged" };
                write!(f, "Proxy({obj}, {kind})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::os::fd::AsFd;

    use super::*;
    use crate::protocol::wl_display;
    use crate::testing::{self, connection, connection_with_ids, factory, CHILD, FACTORY};
    use crate::{Error, IdAllocator, DISPLAY_ID};

    #[test]
    fn create_then_destroy_sends_destructor_once() {
        let (conn, wire) = connection();
        let mut f = factory(&conn, 1);
        assert_eq!(f.state(), ProxyState::Live);
        assert!(f.is_managed());
        let id = f.id().unwrap();
        assert_eq!(conn.object_count(), 2);

        f.destroy();
        assert_eq!(f.state(), ProxyState::Inert);
        assert_eq!(wire.borrow().ops(), vec![(id, 0)]);
        f.destroy();
        drop(f);
        assert_eq!(wire.borrow().ops(), vec![(id, 0)]);
        assert_eq!(conn.object_count(), 1);
    }

    #[test]
    fn destructor_request_makes_wrapper_inert() {
        let (conn, wire) = connection();
        let f = factory(&conn, 1);
        let id = f.id().unwrap();
        f.send(0, &[]).unwrap();
        assert_eq!(f.state(), ProxyState::Inert);
        drop(f);
        let wire = wire.borrow();
        assert_eq!(wire.ops(), vec![(id, 0)]);
        assert!(wire.sent[0].body.is_empty());
    }

    #[test]
    fn unmanaged_destroy_sends_nothing() {
        let (conn, wire) = connection();
        let mut display = conn.bind(DISPLAY_ID, &wl_display::INTERFACE);
        assert!(display.is_live());
        assert!(!display.is_managed());
        display.destroy();
        assert_eq!(display.state(), ProxyState::Inert);
        assert!(wire.borrow().sent.is_empty());
        assert!(conn.bind(DISPLAY_ID, &wl_display::INTERFACE).is_live());
    }

    #[test]
    fn bind_rejects_null_unknown_and_owned() {
        let (conn, wire) = connection();
        let f = factory(&conn, 1);
        let fid = f.id().unwrap();

        let null = conn.bind(0, &FACTORY);
        assert_eq!(null.state(), ProxyState::Inert);
        assert!(matches!(conn.try_bind(0, &FACTORY), Err(Error::InvalidHandle(0))));
        assert!(matches!(conn.try_bind(77, &FACTORY), Err(Error::InvalidHandle(77))));
        assert!(matches!(conn.try_bind(fid, &FACTORY), Err(Error::InvalidHandle(_))));
        assert!(matches!(conn.try_bind(DISPLAY_ID, &FACTORY), Err(Error::InvalidHandle(1))));

        let _display = conn.bind(DISPLAY_ID, &wl_display::INTERFACE);
        assert!(matches!(conn.try_bind(DISPLAY_ID, &wl_display::INTERFACE), Err(Error::InvalidHandle(1))));

        for op in 0..8 {
            null.send(op, &[]).unwrap();
        }
        assert!(wire.borrow().sent.is_empty());
    }

    #[test]
    fn unbound_proxy() {
        let mut p = Proxy::default();
        assert_eq!(p.state(), ProxyState::Unbound);
        assert_eq!(p.id(), None);
        p.send(0, &[]).unwrap();
        p.destroy();
        assert_eq!(p.state(), ProxyState::Unbound);
    }

    #[test]
    fn child_is_registered_before_its_request() {
        let (conn, wire) = connection();
        let f = factory(&conn, 2);
        let fid = f.id().unwrap();
        let child = f.create(&CHILD).unwrap();
        assert_eq!(child.version(), Some(2));
        assert!(child.is_managed());
        let cid = child.id().unwrap();
        assert_eq!(wire.borrow().allocated, vec![fid, cid]);
        assert!(wire.borrow().sent.is_empty());

        f.send(1, &[Arg::NewId(&child)]).unwrap();
        let wire = wire.borrow();
        assert_eq!(wire.ops(), vec![(fid, 1)]);
        assert_eq!(wire.sent[0].body, cid.to_ne_bytes());
    }

    #[test]
    fn new_id_must_be_registered() {
        let (conn, _wire) = connection();
        let f = factory(&conn, 1);
        let mut child = f.create(&CHILD).unwrap();
        child.destroy();
        assert!(matches!(f.send(1, &[Arg::NewId(&child)]), Err(Error::InvalidArgument { .. })));
        assert!(matches!(f.send(1, &[Arg::NewId(&Proxy::unbound())]), Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn versioned_destructor_is_skipped_below_its_version() {
        let (conn, wire) = connection();
        let old = factory(&conn, 1);
        let new = factory(&conn, 2);
        let (oid, nid) = (old.id().unwrap(), new.id().unwrap());
        let c1 = old.create(&CHILD).unwrap();
        let c2 = new.create(&CHILD).unwrap();
        old.send(1, &[Arg::NewId(&c1)]).unwrap();
        new.send(1, &[Arg::NewId(&c2)]).unwrap();
        let id2 = c2.id().unwrap();
        drop(c1);
        drop(c2);
        assert_eq!(wire.borrow().ops(), vec![(oid, 1), (nid, 1), (id2, 0)]);
    }

    #[test]
    fn child_of_a_rejected_request_is_forgotten() {
        let (conn, wire) = connection();
        let f = factory(&conn, 2);
        let child = f.create(&CHILD).unwrap();
        let cid = child.id().unwrap();
        let mut gone = f.create(&CHILD).unwrap();
        let stale = gone.object();
        gone.destroy();

        let res = f.send(8, &[Arg::NewId(&child), Arg::Object(stale)]);
        assert!(matches!(res, Err(Error::InvalidArgument { .. })));
        drop(child);
        assert!(wire.borrow().sent.is_empty());
        assert!(wire.borrow().released.contains(&cid));
        assert!(!conn.has_entry(cid));
        assert_eq!(conn.object_count(), 2);

        let old = factory(&conn, 1);
        let child = old.create(&CHILD).unwrap();
        let res = old.send(8, &[Arg::NewId(&child), Arg::Object(f.object())]);
        assert!(matches!(res, Err(Error::UnsupportedVersion { since: 2, version: 1, .. })));
        drop(child);
        assert!(wire.borrow().sent.is_empty());

        let again = f.create(&CHILD).unwrap();
        f.send(1, &[Arg::NewId(&again)]).unwrap();
        let aid = again.id().unwrap();
        drop(again);
        assert_eq!(wire.borrow().ops(), vec![(f.id().unwrap(), 1), (aid, 0)]);
        assert!(conn.has_entry(aid));
    }

    #[test]
    fn handle_is_returned_when_registration_fails() {
        let (conn, wire) = connection();
        let mut f = factory(&conn, 1);
        let id = f.id().unwrap();
        f.destroy();
        // The allocator hands out an id that is still a zombie here.
        wire.borrow_mut().ids.release(id);

        let g = factory_of(&conn);
        assert!(matches!(g, Err(Error::InvalidHandle(i)) if i == id));
        assert_eq!(wire.borrow().released, vec![id]);
    }

    fn factory_of(conn: &Connection) -> Result<Proxy> {
        conn.display().proxy().create_versioned(&FACTORY, 1)
    }

    #[test]
    fn exhausted_handles() {
        let (conn, wire) = connection_with_ids(IdAllocator::with_limit(2));
        let f = factory(&conn, 1);
        assert!(f.is_live());
        assert!(matches!(f.create(&CHILD), Err(Error::ResourceExhausted)));
        assert_eq!(conn.object_count(), 2);
        assert!(wire.borrow().sent.is_empty());
    }

    #[test]
    fn take_moves_ownership() {
        let (conn, wire) = connection();
        let mut a = factory(&conn, 1);
        let id = a.id().unwrap();
        let mut b = a.take();
        assert_eq!(a.state(), ProxyState::Inert);
        assert_eq!(b.id(), Some(id));
        drop(a);
        assert!(wire.borrow().sent.is_empty());
        b.destroy();
        assert_eq!(wire.borrow().ops(), vec![(id, 0)]);
    }

    #[test]
    fn inert_factory_creates_inert_children() {
        let (conn, wire) = connection();
        let mut f = factory(&conn, 1);
        f.destroy();
        let child = f.create(&CHILD).unwrap();
        assert_eq!(child.state(), ProxyState::Inert);
        assert_eq!(wire.borrow().allocated.len(), 1);
    }

    #[test]
    fn proxy_outliving_its_connection_is_inert() {
        let (conn, _wire) = connection();
        let mut f = factory(&conn, 1);
        drop(conn);
        assert_eq!(f.state(), ProxyState::Inert);
        f.send(2, &[Arg::Object(None), Arg::Int(0)]).unwrap();
        f.destroy();
    }

    #[test]
    fn send_validates_arguments() {
        let (conn, wire) = connection();
        let f = factory(&conn, 1);
        let fid = f.id().unwrap();
        let child = f.create(&CHILD).unwrap();
        let cid = child.id().unwrap();
        let mut gone = f.create(&CHILD).unwrap();
        let stale = gone.object();
        gone.destroy();

        f.send(2, &[Arg::Object(gone.object()), Arg::Int(5)]).unwrap();
        f.send(2, &[Arg::Object(stale), Arg::Int(5)]).unwrap();
        f.send(2, &[Arg::Object(child.object()), Arg::Int(5)]).unwrap();
        f.send(3, &[Arg::Str(None)]).unwrap();

        let invalid = |r: Result<()>| matches!(r, Err(Error::InvalidArgument { .. }));
        assert!(invalid(f.send(4, &[Arg::Object(None)])));
        assert!(invalid(f.send(4, &[Arg::Object(stale)])));
        assert!(invalid(f.send(4, &[Arg::Object(f.object())])));
        assert!(invalid(f.send(2, &[Arg::Object(None)])));
        assert!(invalid(f.send(2, &[Arg::Uint(1), Arg::Int(5)])));
        assert!(invalid(f.send(42, &[])));
        assert!(invalid(f.send(7, &[Arg::Str(None)])));
        assert!(invalid(f.send(7, &[Arg::Str(Some("nul\0inside"))])));
        assert!(matches!(
            f.send(5, &[Arg::Int(2)]),
            Err(Error::UnsupportedVersion { since: 2, version: 1, .. })
        ));

        let wire = wire.borrow();
        assert_eq!(wire.ops(), vec![(fid, 2), (fid, 2), (fid, 2), (fid, 3)]);
        let null_then_5 = [0u32.to_ne_bytes(), 5i32.to_ne_bytes()].concat();
        assert_eq!(wire.sent[0].body, null_then_5);
        assert_eq!(wire.sent[1].body, null_then_5);
        assert_eq!(wire.sent[2].body, [cid.to_ne_bytes(), 5i32.to_ne_bytes()].concat());
        assert_eq!(wire.sent[3].body, 0u32.to_ne_bytes());
    }

    #[test]
    fn fd_arguments_are_duplicated() {
        let (conn, wire) = connection();
        let f = factory(&conn, 1);
        let fd = testing::devnull();
        f.send(6, &[Arg::Fd(fd.as_fd())]).unwrap();
        let wire = wire.borrow();
        assert_eq!(wire.sent[0].fds.len(), 1);
        assert!(wire.sent[0].body.is_empty());
    }
}
