//! In-memory transport and fixture interfaces for unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::os::fd::OwnedFd;
use std::rc::Rc;

use crate::transport::{IdAllocator, Transport};
use crate::wire::{Message, RawMessage, WriteBuf};
use crate::{Config, Connection, Interface, MessageDesc, Object, Proxy};

pub(crate) static FACTORY: Interface = Interface {
    name: "test_factory",
    version: 2,
    requests: &[
        MessageDesc { name: "destroy", signature: "", types: &[], destructor: true },
        MessageDesc { name: "create_child", signature: "n", types: &[Some(&CHILD)], destructor: false },
        MessageDesc { name: "attach", signature: "?oi", types: &[Some(&CHILD), None], destructor: false },
        MessageDesc { name: "set_title", signature: "?s", types: &[None], destructor: false },
        MessageDesc { name: "set_parent", signature: "o", types: &[Some(&CHILD)], destructor: false },
        MessageDesc { name: "set_scale", signature: "2i", types: &[None], destructor: false },
        MessageDesc { name: "send_fd", signature: "h", types: &[None], destructor: false },
        MessageDesc { name: "set_name", signature: "s", types: &[None], destructor: false },
        MessageDesc {
            name: "create_child_of",
            signature: "2no",
            types: &[Some(&CHILD), Some(&CHILD)],
            destructor: false,
        },
    ],
    events: &[
        MessageDesc { name: "value", signature: "u", types: &[None], destructor: false },
        MessageDesc { name: "child", signature: "n", types: &[Some(&CHILD)], destructor: false },
        MessageDesc { name: "focus", signature: "?o", types: &[Some(&CHILD)], destructor: false },
        MessageDesc { name: "target", signature: "o", types: &[Some(&CHILD)], destructor: false },
        MessageDesc { name: "keymap", signature: "hu", types: &[None, None], destructor: false },
        MessageDesc { name: "title", signature: "s", types: &[None], destructor: false },
        MessageDesc { name: "pair", signature: "nn", types: &[Some(&CHILD), Some(&CHILD)], destructor: false },
    ],
};

pub(crate) static CHILD: Interface = Interface {
    name: "test_child",
    version: 2,
    requests: &[MessageDesc { name: "release", signature: "2", types: &[], destructor: true }],
    events: &[MessageDesc { name: "ping", signature: "u", types: &[None], destructor: false }],
};

/// Everything the connection pushed through or pulled from the transport.
#[derive(Debug)]
pub(crate) struct Wire {
    pub(crate) sent: Vec<Message>,
    pub(crate) inbox: VecDeque<RawMessage>,
    pub(crate) fds: VecDeque<OwnedFd>,
    pub(crate) ids: IdAllocator,
    pub(crate) allocated: Vec<u32>,
    pub(crate) released: Vec<u32>,
}

impl Wire {
    pub(crate) fn ops(&self) -> Vec<(u32, u16)> {
        self.sent.iter().map(|m| (m.object, m.opcode)).collect()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TestTransport(pub(crate) Rc<RefCell<Wire>>);

impl Transport for TestTransport {
    fn send(&mut self, msg: Message) -> io::Result<()> {
        self.0.borrow_mut().sent.push(msg);
        Ok(())
    }

    fn recv(&mut self) -> io::Result<Option<RawMessage>> {
        Ok(self.0.borrow_mut().inbox.pop_front())
    }

    fn take_fd(&mut self) -> Option<OwnedFd> {
        self.0.borrow_mut().fds.pop_front()
    }

    fn new_handle(&mut self) -> Option<u32> {
        let mut wire = self.0.borrow_mut();
        let id = wire.ids.alloc()?;
        wire.allocated.push(id);
        Some(id)
    }

    fn release_handle(&mut self, id: u32) {
        let mut wire = self.0.borrow_mut();
        wire.ids.release(id);
        wire.released.push(id);
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub(crate) fn connection_with_config(ids: IdAllocator, config: Config) -> (Connection, Rc<RefCell<Wire>>) {
    init_logging();
    let wire = Rc::new(RefCell::new(Wire {
        sent: vec![],
        inbox: VecDeque::new(),
        fds: VecDeque::new(),
        ids,
        allocated: vec![],
        released: vec![],
    }));
    let conn = Connection::with_config(TestTransport(wire.clone()), config);
    (conn, wire)
}

pub(crate) fn connection_with_ids(ids: IdAllocator) -> (Connection, Rc<RefCell<Wire>>) {
    connection_with_config(ids, Config::default())
}

pub(crate) fn connection() -> (Connection, Rc<RefCell<Wire>>) {
    connection_with_ids(IdAllocator::new())
}

/// A managed factory object at `version`, created off the display and
/// treated as known to the peer.
pub(crate) fn factory(conn: &Connection, version: u32) -> Proxy {
    let display = conn.display();
    let f = display.proxy().create_versioned(&FACTORY, version).unwrap();
    conn.announce(f.object().unwrap());
    f
}

pub(crate) fn event(object: u32, opcode: u16, args: impl FnOnce(&mut WriteBuf)) -> RawMessage {
    let mut w = WriteBuf::default();
    args(&mut w);
    RawMessage { object, opcode, body: w.body }
}

pub(crate) fn devnull() -> OwnedFd {
    OwnedFd::from(std::fs::File::open("/dev/null").unwrap())
}
