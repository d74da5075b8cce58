use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::os::fd::AsRawFd;
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace, warn};

use crate::config::{Config, DropPolicy};
use crate::dispatch::{decode, Args, Decoded, Handler, Value};
use crate::interface::{ArgKind, Interface, MessageDesc};
use crate::object::{Entry, ObjectMap, Owner, Slot};
use crate::protocol::{wl_callback, wl_display};
use crate::proxy::{Arg, Object, ObjectRef, Proxy};
use crate::sockio::UnixTransport;
use crate::transport::{Transport, SERVER_ID_START};
use crate::wire::{Message, RawMessage, ReadBuf, WriteBuf, HEADER_SIZE, MAX_MESSAGE_SIZE};
use crate::{Error, Result};

pub const DISPLAY_ID: u32 = 1;

pub(crate) struct Inner {
    transport: RefCell<Box<dyn Transport>>,
    objects: RefCell<ObjectMap>,
    /// Events that arrived while their handler was running.
    deferred: RefCell<VecDeque<Deferred>>,
    display: ObjectRef,
    config: Config,
}

struct Deferred {
    target: ObjectRef,
    opcode: u16,
    values: Vec<Value>,
}

/// Shared handle to one protocol connection.
///
/// Owns the transport and the registry of live objects. All dispatch runs on
/// the thread that owns the connection. Cloning is cheap and every clone
/// refers to the same registry.
#[derive(Clone)]
pub struct Connection {
    inner: Rc<Inner>,
}

impl Connection {
    pub fn new(transport: impl Transport + 'static) -> Connection {
        Connection::with_config(transport, Config::from_env())
    }

    pub fn with_config(transport: impl Transport + 'static, config: Config) -> Connection {
        let (objects, display) = ObjectMap::with_root(DISPLAY_ID, &wl_display::INTERFACE, 1);
        let inner = Inner {
            transport: RefCell::new(Box::new(transport)),
            objects: RefCell::new(objects),
            deferred: RefCell::default(),
            display,
            config,
        };
        Connection { inner: Rc::new(inner) }
    }

    /// Connects to the compositor named by the environment.
    pub fn connect_to_env() -> Result<Connection> {
        Ok(Connection::new(UnixTransport::connect_to_env()?))
    }

    pub(crate) fn from_inner(inner: Rc<Inner>) -> Connection {
        Connection { inner }
    }

    fn downgrade(&self) -> Weak<Inner> {
        Rc::downgrade(&self.inner)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Wraps the display object. Only one wrapper can hold it at a time.
    pub fn display(&self) -> wl_display::WlDisplay {
        self.bind_object(DISPLAY_ID)
    }

    /// Binds an unmanaged wrapper to a handle this side already knows.
    ///
    /// Returns an inert wrapper if the handle is null, unknown, of another
    /// interface, or owned by another wrapper.
    pub fn bind(&self, id: u32, interface: &'static Interface) -> Proxy {
        self.try_bind(id, interface).unwrap_or_else(|err| {
            debug!("bind {}@{id}: {err}", interface.name);
            Proxy::inert()
        })
    }

    pub fn try_bind(&self, id: u32, interface: &'static Interface) -> Result<Proxy> {
        let mut objects = self.inner.objects.borrow_mut();
        let Some(record) = objects.live_mut(id) else {
            return Err(Error::InvalidHandle(id));
        };
        if record.owner.is_some() || !record.interface.same_as(interface) {
            return Err(Error::InvalidHandle(id));
        }
        record.owner = Some(Owner::Unmanaged);
        Ok(Proxy::bound(self.downgrade(), record.object_ref(id), false))
    }

    pub fn bind_object<T: Object>(&self, id: u32) -> T {
        T::from_proxy(self.bind(id, T::INTERFACE))
    }

    pub fn is_live(&self, obj: ObjectRef) -> bool {
        self.inner.objects.borrow().lookup(obj).is_some()
    }

    pub fn version_of(&self, obj: ObjectRef) -> Option<u32> {
        self.inner.objects.borrow().lookup(obj).map(|r| r.version)
    }

    /// Number of live records, the display included.
    pub fn object_count(&self) -> usize {
        self.inner.objects.borrow().live_count()
    }

    /// Whether the registry holds anything for `id`, zombies included.
    #[cfg(test)]
    pub(crate) fn has_entry(&self, id: u32) -> bool {
        self.inner.objects.borrow().entry(id).is_some()
    }

    pub(crate) fn create_object(&self, interface: &'static Interface, version: u32) -> Result<Proxy> {
        let id = self.inner.transport.borrow_mut().new_handle();
        let Some(id) = id else {
            return Err(Error::ResourceExhausted);
        };
        let obj = self.inner.objects.borrow_mut().insert(id, interface, version, false);
        match obj {
            Some(obj) => Ok(Proxy::bound(self.downgrade(), obj, true)),
            None => {
                self.inner.transport.borrow_mut().release_handle(id);
                Err(Error::InvalidHandle(id))
            }
        }
    }

    /// Marks a record as known to the peer.
    pub(crate) fn announce(&self, obj: ObjectRef) {
        if let Some(record) = self.inner.objects.borrow_mut().lookup_mut(obj) {
            record.announced = true;
        }
    }

    pub(crate) fn send_request(&self, obj: ObjectRef, opcode: u16, args: &[Arg<'_>]) -> Result<()> {
        let (msg, desc) = {
            let objects = self.inner.objects.borrow();
            let Some(record) = objects.lookup(obj) else {
                return Ok(());
            };
            let interface = record.interface;
            let Some(desc) = interface.request(opcode) else {
                return Err(Error::InvalidArgument {
                    interface: interface.name,
                    message: "?",
                    reason: format!("no request with opcode {opcode}"),
                });
            };
            if desc.since() > record.version {
                return Err(Error::UnsupportedVersion {
                    interface: interface.name,
                    message: desc.name,
                    since: desc.since(),
                    version: record.version,
                });
            }
            let buf = encode(&objects, interface, desc, args)?;
            (Message { object: obj.id(), opcode, body: buf.body, fds: buf.fds }, desc)
        };

        if self.inner.config.debug {
            debug!(target: "wlproxy::wire", "{obj}.{}({}) ->", desc.name, ShowArgs(args));
        }
        self.inner.transport.borrow_mut().send(msg)?;
        for arg in args {
            if let Arg::NewId(proxy) = arg {
                if let Some(child) = proxy.bound_ref() {
                    self.announce(child);
                }
            }
        }
        if desc.destructor {
            self.retire(obj);
        }
        Ok(())
    }

    pub(crate) fn destroy_object(&self, obj: ObjectRef, managed: bool) {
        if !managed {
            self.unbind(obj);
            return;
        }
        let record = self.inner.objects.borrow().lookup(obj).map(|r| (r.version, r.announced));
        let Some((version, announced)) = record else {
            return;
        };
        if !announced {
            self.forget(obj);
            return;
        }
        let interface = obj.interface();
        if let Some(op) = interface.destructor() {
            let since = interface.request(op).map_or(1, MessageDesc::since);
            if since <= version {
                if let Err(err) = self.send_request(obj, op, &[]) {
                    warn!("{obj}: destructor request failed: {err}");
                }
            }
        }
        self.retire(obj);
    }

    /// Drops a record the peer never heard of and hands its id back.
    fn forget(&self, obj: ObjectRef) {
        let removed = self.inner.objects.borrow_mut().remove(obj.id());
        if obj.id() < SERVER_ID_START {
            self.inner.transport.borrow_mut().release_handle(obj.id());
        }
        trace!("forgot unannounced {obj}");
        drop(removed);
    }

    fn unbind(&self, obj: ObjectRef) {
        let handlers: Vec<Option<Handler>> = {
            let mut objects = self.inner.objects.borrow_mut();
            let Some(record) = objects.lookup_mut(obj) else {
                return;
            };
            record.owner = None;
            record.handlers.iter_mut().map(|slot| slot.replace(None)).collect()
        };
        drop(handlers);
    }

    /// Forgets a record whose object is gone on the peer or about to be.
    ///
    /// Client-allocated ids stay reserved as zombies until `delete_id`.
    /// Wrappers of the record become inert.
    pub fn retire(&self, obj: ObjectRef) {
        let removed = {
            let mut objects = self.inner.objects.borrow_mut();
            if objects.lookup(obj).is_none() || obj.id() == DISPLAY_ID {
                return;
            }
            if obj.id() >= SERVER_ID_START {
                objects.remove(obj.id())
            } else {
                objects.zombify(obj.id()).map(Entry::Live)
            }
        };
        trace!("retired {obj}");
        drop(removed);
    }

    pub(crate) fn set_handler(&self, obj: ObjectRef, event: u16, handler: Option<Handler>) -> Result<()> {
        let mut handler = handler;
        let res = {
            let mut objects = self.inner.objects.borrow_mut();
            match objects.lookup_mut(obj) {
                None => Ok(()),
                Some(record) => match record.handlers.get_mut(usize::from(event)) {
                    Some(slot) => {
                        handler = slot.replace(handler.take());
                        Ok(())
                    }
                    None => Err(Error::InvalidArgument {
                        interface: record.interface.name,
                        message: "?",
                        reason: format!("no event with opcode {event}"),
                    }),
                },
            }
        };
        drop(handler);
        res
    }

    fn dropped(&self, object: u32, opcode: u16, why: &str) {
        match self.inner.config.dropped_events {
            DropPolicy::Silent => trace!("dropped event {object}:{opcode}: {why}"),
            DropPolicy::Warn => warn!("dropped event {object}:{opcode}: {why}"),
        }
    }

    fn violation(object: u32, opcode: u16, reason: impl Into<String>) -> Error {
        Error::ProtocolViolation { object, opcode, reason: reason.into() }
    }

    /// Decodes one inbound message and runs the handler of its target.
    ///
    /// Messages for unknown handles, for destroyed objects, and for events
    /// without a handler are dropped without error. The handler runs with no
    /// registry borrow held and may call back into the connection freely,
    /// dispatching included. An event that arrives while the handler for it
    /// is still running is delivered once that handler returns.
    pub fn dispatch(&self, msg: RawMessage) -> Result<()> {
        let RawMessage { object, opcode, body } = msg;
        if object == DISPLAY_ID {
            return self.dispatch_display(opcode, &body);
        }

        let target = {
            let objects = self.inner.objects.borrow();
            match objects.entry(object) {
                None => None,
                Some(Entry::Zombie(interface)) => Some((*interface, None)),
                Some(Entry::Live(r)) => Some((r.interface, Some((r.object_ref(object), r.version)))),
            }
        };
        let Some((interface, live)) = target else {
            self.dropped(object, opcode, "unknown object");
            return Ok(());
        };
        let Some(desc) = interface.event(opcode) else {
            return Err(Connection::violation(object, opcode, format!("{interface} has no event {opcode}")));
        };

        let objects = self.inner.objects.borrow();
        let mut transport = self.inner.transport.borrow_mut();
        let decoded = decode(desc, &body, || transport.take_fd(), |id| objects.live(id).map(|r| r.object_ref(id)));
        drop(transport);
        drop(objects);
        let decoded = decoded.map_err(|reason| Connection::violation(object, opcode, reason))?;

        // Objects introduced by an event to a destroyed object are not
        // registered. Their ids are the peer's and are never acknowledged.
        let Some((target, version)) = live else {
            self.dropped(object, opcode, "object was destroyed");
            return Ok(());
        };

        let values = self.adopt(target, opcode, version, decoded)?;
        if self.inner.config.debug {
            debug!(target: "wlproxy::wire", "{target}.{}({}) <-", desc.name, ShowValues(&values));
        }
        self.deliver(target, opcode, values)?;
        self.run_deferred()
    }

    fn deliver(&self, target: ObjectRef, opcode: u16, values: Vec<Value>) -> Result<()> {
        let entered = {
            let mut objects = self.inner.objects.borrow_mut();
            match objects.slot_mut(target, opcode) {
                Some(slot) if slot.is_running() => None,
                slot => Some(slot.and_then(|s| s.enter())),
            }
        };
        let Some(entered) = entered else {
            trace!("deferred event {target}:{opcode}");
            self.inner.deferred.borrow_mut().push_back(Deferred { target, opcode, values });
            return Ok(());
        };
        let Some((mut handler, epoch)) = entered else {
            self.dropped(target.id(), opcode, "no handler");
            return Ok(());
        };

        let result = handler(self, target, Args::new(target.id(), opcode, values));

        let replaced = {
            let mut objects = self.inner.objects.borrow_mut();
            match objects.slot_mut(target, opcode) {
                Some(slot) => slot.leave(handler, epoch),
                None => Some(handler),
            }
        };
        drop(replaced);
        result
    }

    /// Delivers queued events whose handler has returned.
    fn run_deferred(&self) -> Result<()> {
        loop {
            let next = {
                let objects = self.inner.objects.borrow();
                let mut deferred = self.inner.deferred.borrow_mut();
                let ready = deferred
                    .iter()
                    .position(|d| !objects.slot(d.target, d.opcode).is_some_and(Slot::is_running));
                ready.and_then(|i| deferred.remove(i))
            };
            let Some(Deferred { target, opcode, values }) = next else {
                return Ok(());
            };
            self.deliver(target, opcode, values)?;
        }
    }

    /// Registers the objects an event introduces and wraps them.
    ///
    /// Either every new id is registered or none is.
    fn adopt(&self, target: ObjectRef, opcode: u16, version: u32, decoded: Vec<Decoded>) -> Result<Vec<Value>> {
        let mut adopted = Vec::new();
        let mut clash = None;
        let rolled_back: Vec<Entry> = {
            let mut objects = self.inner.objects.borrow_mut();
            for d in &decoded {
                if let Decoded::NewId(id, interface) = *d {
                    match objects.insert(id, interface, version, true) {
                        Some(obj) => adopted.push(obj),
                        None => {
                            clash = Some(id);
                            break;
                        }
                    }
                }
            }
            match clash {
                Some(_) => adopted.iter().filter_map(|obj| objects.remove(obj.id())).collect(),
                None => Vec::new(),
            }
        };
        if let Some(id) = clash {
            drop(rolled_back);
            return Err(Connection::violation(target.id(), opcode, format!("new id {id} already in use")));
        }

        let mut adopted = adopted.into_iter();
        let mut values = Vec::with_capacity(decoded.len());
        for d in decoded {
            match d {
                Decoded::Value(v) => values.push(v),
                Decoded::NewId(..) => {
                    if let Some(obj) = adopted.next() {
                        values.push(Value::NewObject(Proxy::bound(self.downgrade(), obj, true)));
                    }
                }
            }
        }
        Ok(values)
    }

    fn dispatch_display(&self, opcode: u16, body: &[u8]) -> Result<()> {
        let mut rd = ReadBuf::new(body);
        let violation = |reason| Connection::violation(DISPLAY_ID, opcode, reason);
        match opcode {
            wl_display::event::ERROR => {
                let object = rd.get_u32().map_err(violation)?;
                let code = rd.get_u32().map_err(violation)?;
                let message = rd.get_str().map_err(violation)?.unwrap_or_default();
                error!("server error on object {object}, code {code}: {message}");
                Err(Error::Server { object, code, message })
            }
            wl_display::event::DELETE_ID => {
                let id = rd.get_u32().map_err(violation)?;
                if self.inner.config.debug {
                    debug!(target: "wlproxy::wire", "wl_display@1.delete_id({id}) <-");
                }
                self.delete_id(id);
                Ok(())
            }
            _ => Err(violation("wl_display has no such event")),
        }
    }

    fn delete_id(&self, id: u32) {
        if id == DISPLAY_ID {
            return;
        }
        let removed = self.inner.objects.borrow_mut().remove(id);
        if removed.is_some() && id < SERVER_ID_START {
            self.inner.transport.borrow_mut().release_handle(id);
        }
        drop(removed);
    }

    /// Dispatches every message the transport has buffered.
    pub fn dispatch_pending(&self) -> Result<usize> {
        let mut n = 0;
        loop {
            let msg = self.inner.transport.borrow_mut().recv()?;
            let Some(msg) = msg else {
                return Ok(n);
            };
            self.dispatch(msg)?;
            n += 1;
        }
    }

    /// Flushes, then waits for the peer if nothing is buffered.
    pub fn blocking_dispatch(&self) -> Result<usize> {
        self.flush()?;
        let n = self.dispatch_pending()?;
        if n > 0 {
            return Ok(n);
        }
        let read = self.inner.transport.borrow_mut().read()?;
        if read == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed the connection").into());
        }
        self.dispatch_pending()
    }

    pub fn flush(&self) -> Result<()> {
        self.inner.transport.borrow_mut().flush()?;
        Ok(())
    }

    /// Blocks until the peer has processed every request sent so far.
    pub fn roundtrip(&self) -> Result<()> {
        let proxy = self.create_object(&wl_callback::INTERFACE, 1)?;
        self.send_request(self.inner.display, wl_display::request::SYNC, &[Arg::NewId(&proxy)])?;
        let callback = wl_callback::WlCallback::from_proxy(proxy);
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();
        callback.on_done(move |_| flag.set(true))?;
        while !done.get() {
            self.blocking_dispatch()?;
        }
        Ok(())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("objects", &self.inner.objects.try_borrow().map(|o| o.live_count()).ok())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

fn encode(objects: &ObjectMap, interface: &'static Interface, desc: &MessageDesc, args: &[Arg<'_>]) -> Result<WriteBuf> {
    let invalid = |reason: String| Error::InvalidArgument { interface: interface.name, message: desc.name, reason };
    let expected = desc.arg_count();
    if args.len() != expected {
        return Err(invalid(format!("expected {expected} arguments, got {}", args.len())));
    }

    let mut w = WriteBuf::default();
    for (i, (slot, arg)) in desc.args().zip(args).enumerate() {
        let slot = slot?;
        let live = |obj: ObjectRef| objects.lookup(obj).map(|_| obj);
        let check_interface = |obj: ObjectRef| match slot.interface {
            Some(want) if !obj.interface().same_as(want) => {
                Err(invalid(format!("argument {i} expects {want}, got {obj}")))
            }
            _ => Ok(obj.id()),
        };
        match (slot.kind, arg) {
            (ArgKind::Int, Arg::Int(v)) => w.put_i32(*v),
            (ArgKind::Uint, Arg::Uint(v)) => w.put_u32(*v),
            (ArgKind::Fixed, Arg::Fixed(v)) => w.put_i32(v.as_raw()),
            (ArgKind::Str, Arg::Str(s)) => {
                if s.is_none() && !slot.nullable {
                    return Err(invalid(format!("argument {i} is not nullable")));
                }
                w.put_str(*s).map_err(|e| invalid(format!("argument {i}: {e}")))?;
            }
            (ArgKind::Object, Arg::Object(obj)) => match obj.and_then(live) {
                Some(obj) => w.put_u32(check_interface(obj)?),
                None if slot.nullable => w.put_u32(0),
                None => return Err(invalid(format!("argument {i} needs a live object"))),
            },
            (ArgKind::NewId, Arg::NewId(proxy)) => {
                let Some(obj) = proxy.bound_ref().and_then(live) else {
                    return Err(invalid(format!("argument {i}: new object is not registered")));
                };
                w.put_u32(check_interface(obj)?);
            }
            (ArgKind::Array, Arg::Array(a)) => {
                w.put_array(a).map_err(|e| invalid(format!("argument {i}: {e}")))?;
            }
            (ArgKind::Fd, Arg::Fd(fd)) => w.put_fd(fd.try_clone_to_owned()?),
            (kind, arg) => {
                return Err(invalid(format!("argument {i} expects '{}', got {}", kind.tag(), arg.kind_name())));
            }
        }
    }
    if HEADER_SIZE + w.body.len() > MAX_MESSAGE_SIZE {
        return Err(invalid(format!("message exceeds {MAX_MESSAGE_SIZE} bytes")));
    }
    Ok(w)
}

struct ShowArgs<'a, 'b>(&'a [Arg<'b>]);

impl fmt::Display for ShowArgs<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match arg {
                Arg::Int(v) => write!(f, "{v}")?,
                Arg::Uint(v) => write!(f, "{v}")?,
                Arg::Fixed(v) => write!(f, "{v}")?,
                Arg::Str(Some(s)) => write!(f, "{s:?}")?,
                Arg::Str(None) | Arg::Object(None) => f.write_str("nil")?,
                Arg::Object(Some(obj)) => write!(f, "{obj}")?,
                Arg::NewId(p) => match p.bound_ref() {
                    Some(obj) => write!(f, "new id {obj}")?,
                    None => f.write_str("new id nil")?,
                },
                Arg::Array(a) => write!(f, "array[{}]", a.len())?,
                Arg::Fd(fd) => write!(f, "fd {}", fd.as_raw_fd())?,
            }
        }
        Ok(())
    }
}

struct ShowValues<'a>(&'a [Value]);

impl fmt::Display for ShowValues<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match value {
                Value::Int(v) => write!(f, "{v}")?,
                Value::Uint(v) => write!(f, "{v}")?,
                Value::Fixed(v) => write!(f, "{v}")?,
                Value::Str(Some(s)) => write!(f, "{s:?}")?,
                Value::Str(None) | Value::Object(None) => f.write_str("nil")?,
                Value::Object(Some(obj)) => write!(f, "{obj}")?,
                Value::NewObject(p) => write!(f, "new id {p:?}")?,
                Value::Array(a) => write!(f, "array[{}]", a.len())?,
                Value::Fd(fd) => write!(f, "fd {}", fd.as_raw_fd())?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, connection_with_config, event, CHILD, FACTORY};
    use crate::transport::IdAllocator;
    use crate::wire::Fixed;

    #[test]
    fn wire_trace_formats_arguments() {
        let config = Config { debug: true, dropped_events: DropPolicy::Warn };
        let (conn, wire) = connection_with_config(IdAllocator::new(), config);
        let f = testing::factory(&conn, 2);
        let id = f.id().unwrap();
        let child = f.create(&CHILD).unwrap();
        f.send(1, &[Arg::NewId(&child)]).unwrap();
        f.send(3, &[Arg::Str(Some("title"))]).unwrap();
        f.send(2, &[Arg::Object(None), Arg::Int(-4)]).unwrap();
        conn.dispatch(event(id, 5, |w| w.put_str(Some("x")).unwrap())).unwrap();
        conn.dispatch(event(99, 0, |_| {})).unwrap();
        assert_eq!(wire.borrow().sent.len(), 3);

        let args = [Arg::Object(child.object()), Arg::Str(None), Arg::Fixed(Fixed::from_int(2))];
        assert_eq!(ShowArgs(&args).to_string(), format!("test_child@{}, nil, 2", child.id().unwrap()));
        let values = [Value::Uint(7), Value::Str(Some("a".into())), Value::Array(vec![1, 2])];
        assert_eq!(ShowValues(&values).to_string(), "7, \"a\", array[2]");
    }

    #[test]
    fn descriptors_are_checked_before_sending() {
        let (conn, wire) = testing::connection();
        let f = testing::factory(&conn, 1);
        let big = "a".repeat(MAX_MESSAGE_SIZE);
        let err = f.send(3, &[Arg::Str(Some(&big))]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { interface: "test_factory", message: "set_title", .. }));
        assert!(wire.borrow().sent.is_empty());
        assert!(FACTORY.validate().is_ok());
    }

    #[test]
    fn connection_debug_output() {
        let (conn, _wire) = testing::connection();
        let shown = format!("{conn:?}");
        assert!(shown.starts_with("Connection {"));
        assert!(shown.contains("objects: Some(1)"));
    }
}
