//! Core interfaces every client needs before it can reach anything else.
//!
//! The modules follow the layout `gen` emits for protocol files: a `static
//! INTERFACE`, opcode constants, and a typed wrapper.

use crate::{Arg, Interface, MessageDesc, Object, Proxy, Result};

pub use wl_callback::WlCallback;
pub use wl_display::WlDisplay;
pub use wl_registry::WlRegistry;

/// core global object
pub mod wl_display {
    use super::*;

    pub static INTERFACE: Interface = Interface {
        name: "wl_display",
        version: 1,
        requests: &[
            MessageDesc {
                name: "sync",
                signature: "n",
                types: &[Some(&wl_callback::INTERFACE)],
                destructor: false,
            },
            MessageDesc {
                name: "get_registry",
                signature: "n",
                types: &[Some(&wl_registry::INTERFACE)],
                destructor: false,
            },
        ],
        events: &[
            MessageDesc { name: "error", signature: "ous", types: &[None, None, None], destructor: false },
            MessageDesc { name: "delete_id", signature: "u", types: &[None], destructor: false },
        ],
    };

    pub mod request {
        pub const SYNC: u16 = 0;
        pub const GET_REGISTRY: u16 = 1;
    }

    pub mod event {
        pub const ERROR: u16 = 0;
        pub const DELETE_ID: u16 = 1;
    }

    /// global error values
    #[repr(u32)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Error {
        /// server couldn't find object
        InvalidObject = 0,
        /// method doesn't exist on the specified interface or malformed request
        InvalidMethod = 1,
        /// server is out of memory
        NoMemory = 2,
        /// implementation error in compositor
        Implementation = 3,
    }

    impl From<Error> for u32 {
        fn from(v: Error) -> u32 {
            v as u32
        }
    }

    impl TryFrom<u32> for Error {
        type Error = u32;
        fn try_from(v: u32) -> std::result::Result<Self, u32> {
            match v {
                0 => Ok(Error::InvalidObject),
                1 => Ok(Error::InvalidMethod),
                2 => Ok(Error::NoMemory),
                3 => Ok(Error::Implementation),
                _ => Err(v),
            }
        }
    }

    /// The `error` and `delete_id` events are consumed by the connection.
    #[derive(Debug, Default)]
    pub struct WlDisplay(Proxy);

    impl Object for WlDisplay {
        const INTERFACE: &'static Interface = &INTERFACE;
        fn from_proxy(proxy: Proxy) -> Self {
            WlDisplay(proxy)
        }
        fn proxy(&self) -> &Proxy {
            &self.0
        }
        fn proxy_mut(&mut self) -> &mut Proxy {
            &mut self.0
        }
    }

    impl WlDisplay {
        /// asynchronous roundtrip
        pub fn sync(&self) -> Result<wl_callback::WlCallback> {
            let callback: wl_callback::WlCallback = self.0.create_object()?;
            self.0.send(request::SYNC, &[Arg::NewId(callback.proxy())])?;
            Ok(callback)
        }

        /// get global registry object
        pub fn get_registry(&self) -> Result<wl_registry::WlRegistry> {
            let registry: wl_registry::WlRegistry = self.0.create_object()?;
            self.0.send(request::GET_REGISTRY, &[Arg::NewId(registry.proxy())])?;
            Ok(registry)
        }
    }
}

/// global registry object
pub mod wl_registry {
    use super::*;

    pub static INTERFACE: Interface = Interface {
        name: "wl_registry",
        version: 1,
        requests: &[MessageDesc {
            name: "bind",
            signature: "usun",
            types: &[None, None, None, None],
            destructor: false,
        }],
        events: &[
            MessageDesc { name: "global", signature: "usu", types: &[None, None, None], destructor: false },
            MessageDesc { name: "global_remove", signature: "u", types: &[None], destructor: false },
        ],
    };

    pub mod request {
        pub const BIND: u16 = 0;
    }

    pub mod event {
        pub const GLOBAL: u16 = 0;
        pub const GLOBAL_REMOVE: u16 = 1;
    }

    #[derive(Debug, Default)]
    pub struct WlRegistry(Proxy);

    impl Object for WlRegistry {
        const INTERFACE: &'static Interface = &INTERFACE;
        fn from_proxy(proxy: Proxy) -> Self {
            WlRegistry(proxy)
        }
        fn proxy(&self) -> &Proxy {
            &self.0
        }
        fn proxy_mut(&mut self) -> &mut Proxy {
            &mut self.0
        }
    }

    impl WlRegistry {
        /// bind an object to the display
        pub fn bind<T: Object>(&self, name: u32, version: u32) -> Result<T> {
            let id = self.0.create_versioned(T::INTERFACE, version)?;
            self.0.send(
                request::BIND,
                &[
                    Arg::Uint(name),
                    Arg::Str(Some(T::INTERFACE.name)),
                    Arg::Uint(version),
                    Arg::NewId(&id),
                ],
            )?;
            Ok(T::from_proxy(id))
        }

        /// announce global object
        pub fn on_global<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(u32, String, u32) + 'static,
        {
            self.0.set_handler(event::GLOBAL, move |_, _, mut args| {
                let name = args.uint()?;
                let interface = args.string()?;
                let version = args.uint()?;
                f(name, interface, version);
                Ok(())
            })
        }

        /// announce removal of global object
        pub fn on_global_remove<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(u32) + 'static,
        {
            self.0.set_handler(event::GLOBAL_REMOVE, move |_, _, mut args| {
                let name = args.uint()?;
                f(name);
                Ok(())
            })
        }
    }
}

/// callback object
pub mod wl_callback {
    use super::*;

    pub static INTERFACE: Interface = Interface {
        name: "wl_callback",
        version: 1,
        requests: &[],
        events: &[MessageDesc { name: "done", signature: "u", types: &[None], destructor: true }],
    };

    pub mod event {
        pub const DONE: u16 = 0;
    }

    #[derive(Debug, Default)]
    pub struct WlCallback(Proxy);

    impl Object for WlCallback {
        const INTERFACE: &'static Interface = &INTERFACE;
        fn from_proxy(proxy: Proxy) -> Self {
            WlCallback(proxy)
        }
        fn proxy(&self) -> &Proxy {
            &self.0
        }
        fn proxy_mut(&mut self) -> &mut Proxy {
            &mut self.0
        }
    }

    impl WlCallback {
        /// done event
        pub fn on_done<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(u32) + 'static,
        {
            self.0.set_handler(event::DONE, move |conn, this, mut args| {
                let callback_data = args.uint()?;
                f(callback_data);
                conn.retire(this);
                Ok(())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::testing::{connection, event};
    use crate::DISPLAY_ID;

    #[test]
    fn core_tables_are_valid() {
        wl_display::INTERFACE.validate().unwrap();
        wl_registry::INTERFACE.validate().unwrap();
        wl_callback::INTERFACE.validate().unwrap();
        assert_eq!(wl_callback::INTERFACE.destructor(), None);
        assert_eq!(wl_display::Error::try_from(2u32), Ok(wl_display::Error::NoMemory));
        assert_eq!(wl_display::Error::try_from(9u32), Err(9));
    }

    #[test]
    fn registry_bind_carries_the_interface_name() {
        let (conn, wire) = connection();
        let registry = conn.display().get_registry().unwrap();
        let rid = registry.proxy().id().unwrap();
        let bound: WlCallback = registry.bind(7, 1).unwrap();
        let bid = bound.proxy().id().unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&7u32.to_ne_bytes());
        expected.extend_from_slice(&12u32.to_ne_bytes());
        expected.extend_from_slice(b"wl_callback\0");
        expected.extend_from_slice(&1u32.to_ne_bytes());
        expected.extend_from_slice(&bid.to_ne_bytes());

        let wire = wire.borrow();
        assert_eq!(wire.ops(), vec![(DISPLAY_ID, 1), (rid, 0)]);
        assert_eq!(wire.sent[1].body, expected);
    }

    #[test]
    fn globals_reach_the_handler() {
        let (conn, _wire) = connection();
        let registry = conn.display().get_registry().unwrap();
        let rid = registry.proxy().id().unwrap();
        let globals: Rc<RefCell<Vec<(u32, String, u32)>>> = Rc::default();
        let g = globals.clone();
        registry.on_global(move |name, interface, version| g.borrow_mut().push((name, interface, version))).unwrap();
        let removed = Rc::new(Cell::new(0));
        let r = removed.clone();
        registry.on_global_remove(move |name| r.set(name)).unwrap();

        conn.dispatch(event(rid, 0, |w| {
            w.put_u32(1);
            w.put_str(Some("wl_compositor")).unwrap();
            w.put_u32(6);
        }))
        .unwrap();
        conn.dispatch(event(rid, 1, |w| w.put_u32(1))).unwrap();

        assert_eq!(*globals.borrow(), vec![(1, "wl_compositor".to_owned(), 6)]);
        assert_eq!(removed.get(), 1);
    }

    #[test]
    fn callback_retires_on_done() {
        let (conn, wire) = connection();
        let callback = conn.display().sync().unwrap();
        let id = callback.proxy().id().unwrap();
        let done = Rc::new(Cell::new(0));
        let d = done.clone();
        callback.on_done(move |data| d.set(data)).unwrap();

        conn.dispatch(event(id, 0, |w| w.put_u32(99))).unwrap();
        assert_eq!(done.get(), 99);
        assert!(!callback.is_live());

        conn.dispatch(event(DISPLAY_ID, 1, |w| w.put_u32(id))).unwrap();
        assert_eq!(wire.borrow().released, vec![id]);
        drop(callback);
        assert_eq!(wire.borrow().ops(), vec![(DISPLAY_ID, 0)]);
    }

    #[test]
    fn roundtrip_waits_for_done() {
        let (conn, wire) = connection();
        wire.borrow_mut().inbox.push_back(event(2, 0, |w| w.put_u32(0)));
        conn.roundtrip().unwrap();
        assert_eq!(wire.borrow().ops(), vec![(DISPLAY_ID, 0)]);
        assert_eq!(conn.object_count(), 1);
    }

    #[test]
    fn roundtrip_fails_when_the_peer_is_gone() {
        let (conn, _wire) = connection();
        assert!(matches!(conn.roundtrip(), Err(crate::Error::Io(_))));
    }
}
