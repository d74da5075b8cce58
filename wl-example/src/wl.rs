// Generated by `gen` from Wayland protocol XML files. Do not edit.
#![allow(dead_code, unused_imports, unused_mut, non_upper_case_globals, clippy::all)]

use std::os::fd::{BorrowedFd, OwnedFd};

use wlproxy::protocol::*;
use wlproxy::{Arg, Fixed, Interface, MessageDesc, Object, ObjectRef, Proxy, Result};

// protocol wayland
// Copyright © 2008-2011 Kristian Høgsberg, © 2010-2011 Intel Corporation, © 2012-2013 Collabora, Ltd.

/// the compositor singleton
///
/// A compositor. This object is a singleton global. The compositor is in
/// charge of combining the contents of multiple surfaces into one
/// displayable output.
pub mod wl_compositor {
    use super::*;

    pub static INTERFACE: Interface = Interface {
        name: "wl_compositor",
        version: 4,
        requests: &[
            MessageDesc {
                name: "create_surface",
                signature: "n",
                types: &[Some(&wl_surface::INTERFACE)],
                destructor: false,
            },
        ],
        events: &[],
    };

    pub mod request {
        pub const CREATE_SURFACE: u16 = 0;
    }

    #[derive(Debug, Default)]
    pub struct WlCompositor(Proxy);

    impl Object for WlCompositor {
        const INTERFACE: &'static Interface = &INTERFACE;
        fn from_proxy(proxy: Proxy) -> Self {
            WlCompositor(proxy)
        }
        fn proxy(&self) -> &Proxy {
            &self.0
        }
        fn proxy_mut(&mut self) -> &mut Proxy {
            &mut self.0
        }
    }

    impl WlCompositor {
        /// create new surface
        pub fn create_surface(&self) -> Result<wl_surface::WlSurface> {
            let id: wl_surface::WlSurface = self.0.create_object()?;
            self.0.send(request::CREATE_SURFACE, &[Arg::NewId(id.proxy())])?;
            Ok(id)
        }
    }
}

/// a shared memory pool
///
/// The wl_shm_pool object encapsulates a piece of memory shared between
/// the compositor and client.
pub mod wl_shm_pool {
    use super::*;

    pub static INTERFACE: Interface = Interface {
        name: "wl_shm_pool",
        version: 1,
        requests: &[
            MessageDesc {
                name: "create_buffer",
                signature: "niiiiu",
                types: &[Some(&wl_buffer::INTERFACE), None, None, None, None, None],
                destructor: false,
            },
            MessageDesc {
                name: "destroy",
                signature: "",
                types: &[],
                destructor: true,
            },
            MessageDesc {
                name: "resize",
                signature: "i",
                types: &[None],
                destructor: false,
            },
        ],
        events: &[],
    };

    pub mod request {
        pub const CREATE_BUFFER: u16 = 0;
        pub const DESTROY: u16 = 1;
        pub const RESIZE: u16 = 2;
    }

    #[derive(Debug, Default)]
    pub struct WlShmPool(Proxy);

    impl Object for WlShmPool {
        const INTERFACE: &'static Interface = &INTERFACE;
        fn from_proxy(proxy: Proxy) -> Self {
            WlShmPool(proxy)
        }
        fn proxy(&self) -> &Proxy {
            &self.0
        }
        fn proxy_mut(&mut self) -> &mut Proxy {
            &mut self.0
        }
    }

    impl WlShmPool {
        /// create a buffer from the pool
        pub fn create_buffer(&self, offset: i32, width: i32, height: i32, stride: i32, format: u32) -> Result<wl_buffer::WlBuffer> {
            let id: wl_buffer::WlBuffer = self.0.create_object()?;
            self.0.send(request::CREATE_BUFFER, &[Arg::NewId(id.proxy()), Arg::Int(offset), Arg::Int(width), Arg::Int(height), Arg::Int(stride), Arg::Uint(format)])?;
            Ok(id)
        }

        /// destroy the pool
        pub fn destroy(mut self) {
            self.0.destroy();
        }

        /// change the size of the pool mapping
        pub fn resize(&self, size: i32) -> Result<()> {
            self.0.send(request::RESIZE, &[Arg::Int(size)])?;
            Ok(())
        }
    }
}

/// shared memory support
///
/// A singleton global object that provides support for shared memory.
pub mod wl_shm {
    use super::*;

    pub static INTERFACE: Interface = Interface {
        name: "wl_shm",
        version: 1,
        requests: &[
            MessageDesc {
                name: "create_pool",
                signature: "nhi",
                types: &[Some(&wl_shm_pool::INTERFACE), None, None],
                destructor: false,
            },
        ],
        events: &[
            MessageDesc {
                name: "format",
                signature: "u",
                types: &[None],
                destructor: false,
            },
        ],
    };

    pub mod request {
        pub const CREATE_POOL: u16 = 0;
    }

    pub mod event {
        pub const FORMAT: u16 = 0;
    }

    /// wl_shm error values
    #[repr(u32)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Error {
        /// buffer format is not known
        InvalidFormat = 0,
        /// invalid size or stride during pool or buffer creation
        InvalidStride = 1,
        /// mmapping the file descriptor failed
        InvalidFd = 2,
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
                0 => Ok(Error::InvalidFormat),
                1 => Ok(Error::InvalidStride),
                2 => Ok(Error::InvalidFd),
                _ => Err(v),
            }
        }
    }

    /// pixel formats
    #[repr(u32)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Format {
        /// 32-bit ARGB format, little endian
        Argb8888 = 0,
        /// 32-bit RGB format, little endian
        Xrgb8888 = 1,
        /// 16-bit RGB format, little endian
        Rgb565 = 540422482,
    }

    impl From<Format> for u32 {
        fn from(v: Format) -> u32 {
            v as u32
        }
    }

    impl TryFrom<u32> for Format {
        type Error = u32;
        fn try_from(v: u32) -> std::result::Result<Self, u32> {
            match v {
                0 => Ok(Format::Argb8888),
                1 => Ok(Format::Xrgb8888),
                540422482 => Ok(Format::Rgb565),
                _ => Err(v),
            }
        }
    }

    #[derive(Debug, Default)]
    pub struct WlShm(Proxy);

    impl Object for WlShm {
        const INTERFACE: &'static Interface = &INTERFACE;
        fn from_proxy(proxy: Proxy) -> Self {
            WlShm(proxy)
        }
        fn proxy(&self) -> &Proxy {
            &self.0
        }
        fn proxy_mut(&mut self) -> &mut Proxy {
            &mut self.0
        }
    }

    impl WlShm {
        /// create a shm pool
        pub fn create_pool(&self, fd: BorrowedFd<'_>, size: i32) -> Result<wl_shm_pool::WlShmPool> {
            let id: wl_shm_pool::WlShmPool = self.0.create_object()?;
            self.0.send(request::CREATE_POOL, &[Arg::NewId(id.proxy()), Arg::Fd(fd), Arg::Int(size)])?;
            Ok(id)
        }

        /// pixel format description
        pub fn on_format<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(u32) + 'static,
        {
            self.0.set_handler(event::FORMAT, move |_, _, mut args| {
                let format = args.uint()?;
                f(format);
                Ok(())
            })
        }
    }
}

/// content for a wl_surface
pub mod wl_buffer {
    use super::*;

    pub static INTERFACE: Interface = Interface {
        name: "wl_buffer",
        version: 1,
        requests: &[
            MessageDesc {
                name: "destroy",
                signature: "",
                types: &[],
                destructor: true,
            },
        ],
        events: &[
            MessageDesc {
                name: "release",
                signature: "",
                types: &[],
                destructor: false,
            },
        ],
    };

    pub mod request {
        pub const DESTROY: u16 = 0;
    }

    pub mod event {
        pub const RELEASE: u16 = 0;
    }

    #[derive(Debug, Default)]
    pub struct WlBuffer(Proxy);

    impl Object for WlBuffer {
        const INTERFACE: &'static Interface = &INTERFACE;
        fn from_proxy(proxy: Proxy) -> Self {
            WlBuffer(proxy)
        }
        fn proxy(&self) -> &Proxy {
            &self.0
        }
        fn proxy_mut(&mut self) -> &mut Proxy {
            &mut self.0
        }
    }

    impl WlBuffer {
        /// destroy a buffer
        pub fn destroy(mut self) {
            self.0.destroy();
        }

        /// compositor releases buffer
        pub fn on_release<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut() + 'static,
        {
            self.0.set_handler(event::RELEASE, move |_, _, _| {
                f();
                Ok(())
            })
        }
    }
}

/// an onscreen surface
///
/// A surface is a rectangular area that may be displayed on zero
/// or more outputs, and shown any number of times at the compositor's
/// discretion.
pub mod wl_surface {
    use super::*;

    pub static INTERFACE: Interface = Interface {
        name: "wl_surface",
        version: 4,
        requests: &[
            MessageDesc {
                name: "destroy",
                signature: "",
                types: &[],
                destructor: true,
            },
            MessageDesc {
                name: "attach",
                signature: "?oii",
                types: &[Some(&wl_buffer::INTERFACE), None, None],
                destructor: false,
            },
            MessageDesc {
                name: "damage",
                signature: "iiii",
                types: &[None, None, None, None],
                destructor: false,
            },
            MessageDesc {
                name: "frame",
                signature: "n",
                types: &[Some(&wl_callback::INTERFACE)],
                destructor: false,
            },
            MessageDesc {
                name: "commit",
                signature: "",
                types: &[],
                destructor: false,
            },
            MessageDesc {
                name: "set_buffer_scale",
                signature: "3i",
                types: &[None],
                destructor: false,
            },
            MessageDesc {
                name: "damage_buffer",
                signature: "4iiii",
                types: &[None, None, None, None],
                destructor: false,
            },
        ],
        events: &[
            MessageDesc {
                name: "enter",
                signature: "o",
                types: &[Some(&wl_output::INTERFACE)],
                destructor: false,
            },
            MessageDesc {
                name: "leave",
                signature: "o",
                types: &[Some(&wl_output::INTERFACE)],
                destructor: false,
            },
        ],
    };

    pub mod request {
        pub const DESTROY: u16 = 0;
        pub const ATTACH: u16 = 1;
        pub const DAMAGE: u16 = 2;
        pub const FRAME: u16 = 3;
        pub const COMMIT: u16 = 4;
        pub const SET_BUFFER_SCALE: u16 = 5;
        pub const DAMAGE_BUFFER: u16 = 6;
    }

    pub mod event {
        pub const ENTER: u16 = 0;
        pub const LEAVE: u16 = 1;
    }

    /// wl_surface error values
    #[repr(u32)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Error {
        /// buffer scale value is invalid
        InvalidScale = 0,
        /// buffer transform value is invalid
        InvalidTransform = 1,
        /// buffer size is invalid
        InvalidSize = 2,
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
                0 => Ok(Error::InvalidScale),
                1 => Ok(Error::InvalidTransform),
                2 => Ok(Error::InvalidSize),
                _ => Err(v),
            }
        }
    }

    #[derive(Debug, Default)]
    pub struct WlSurface(Proxy);

    impl Object for WlSurface {
        const INTERFACE: &'static Interface = &INTERFACE;
        fn from_proxy(proxy: Proxy) -> Self {
            WlSurface(proxy)
        }
        fn proxy(&self) -> &Proxy {
            &self.0
        }
        fn proxy_mut(&mut self) -> &mut Proxy {
            &mut self.0
        }
    }

    impl WlSurface {
        /// delete surface
        pub fn destroy(mut self) {
            self.0.destroy();
        }

        /// set the surface contents
        pub fn attach(&self, buffer: Option<&wl_buffer::WlBuffer>, x: i32, y: i32) -> Result<()> {
            self.0.send(request::ATTACH, &[Arg::Object(buffer.and_then(|o| o.object())), Arg::Int(x), Arg::Int(y)])?;
            Ok(())
        }

        /// mark part of the surface damaged
        pub fn damage(&self, x: i32, y: i32, width: i32, height: i32) -> Result<()> {
            self.0.send(request::DAMAGE, &[Arg::Int(x), Arg::Int(y), Arg::Int(width), Arg::Int(height)])?;
            Ok(())
        }

        /// request a frame throttling hint
        pub fn frame(&self) -> Result<wl_callback::WlCallback> {
            let callback: wl_callback::WlCallback = self.0.create_object()?;
            self.0.send(request::FRAME, &[Arg::NewId(callback.proxy())])?;
            Ok(callback)
        }

        /// commit pending surface state
        pub fn commit(&self) -> Result<()> {
            self.0.send(request::COMMIT, &[])?;
            Ok(())
        }

        /// sets the buffer scaling factor
        pub fn set_buffer_scale(&self, scale: i32) -> Result<()> {
            self.0.send(request::SET_BUFFER_SCALE, &[Arg::Int(scale)])?;
            Ok(())
        }

        /// mark part of the surface damaged using buffer coordinates
        pub fn damage_buffer(&self, x: i32, y: i32, width: i32, height: i32) -> Result<()> {
            self.0.send(request::DAMAGE_BUFFER, &[Arg::Int(x), Arg::Int(y), Arg::Int(width), Arg::Int(height)])?;
            Ok(())
        }

        /// surface enters an output
        pub fn on_enter<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(Option<ObjectRef>) + 'static,
        {
            self.0.set_handler(event::ENTER, move |_, _, mut args| {
                let output = args.object()?;
                f(output);
                Ok(())
            })
        }

        /// surface leaves an output
        pub fn on_leave<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(Option<ObjectRef>) + 'static,
        {
            self.0.set_handler(event::LEAVE, move |_, _, mut args| {
                let output = args.object()?;
                f(output);
                Ok(())
            })
        }
    }
}

/// group of input devices
pub mod wl_seat {
    use super::*;

    pub static INTERFACE: Interface = Interface {
        name: "wl_seat",
        version: 5,
        requests: &[
            MessageDesc {
                name: "get_pointer",
                signature: "n",
                types: &[Some(&wl_pointer::INTERFACE)],
                destructor: false,
            },
            MessageDesc {
                name: "get_keyboard",
                signature: "n",
                types: &[Some(&wl_keyboard::INTERFACE)],
                destructor: false,
            },
            MessageDesc {
                name: "release",
                signature: "5",
                types: &[],
                destructor: true,
            },
        ],
        events: &[
            MessageDesc {
                name: "capabilities",
                signature: "u",
                types: &[None],
                destructor: false,
            },
            MessageDesc {
                name: "name",
                signature: "2s",
                types: &[None],
                destructor: false,
            },
        ],
    };

    pub mod request {
        pub const GET_POINTER: u16 = 0;
        pub const GET_KEYBOARD: u16 = 1;
        pub const RELEASE: u16 = 2;
    }

    pub mod event {
        pub const CAPABILITIES: u16 = 0;
        pub const NAME: u16 = 1;
    }

    /// seat capability bitmask
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capability {
        flags: u32,
    }

    impl std::fmt::Debug for Capability {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            let mut first = true;
            for (name, val) in Self::EACH {
                if val.flags != 0 && self.contains(val) {
                    if !first {
                        f.write_str("|")?;
                    }
                    first = false;
                    f.write_str(name)?;
                }
            }
            if first {
                f.write_str("EMPTY")?;
            }
            Ok(())
        }
    }

    impl std::fmt::LowerHex for Capability {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            <u32 as std::fmt::LowerHex>::fmt(&self.flags, f)
        }
    }

    impl std::ops::BitOr for Capability {
        type Output = Self;
        fn bitor(self, rhs: Self) -> Self {
            Capability { flags: self.flags | rhs.flags }
        }
    }

    impl std::ops::BitAnd for Capability {
        type Output = Self;
        fn bitand(self, rhs: Self) -> Self {
            Capability { flags: self.flags & rhs.flags }
        }
    }

    impl From<Capability> for u32 {
        fn from(v: Capability) -> u32 {
            v.flags
        }
    }

    impl From<u32> for Capability {
        fn from(flags: u32) -> Capability {
            Capability { flags }
        }
    }

    impl Capability {
        pub fn contains(&self, rhs: Capability) -> bool {
            (self.flags & rhs.flags) == rhs.flags
        }

        /// the seat has pointer devices
        pub const POINTER: Capability = Capability { flags: 1 };
        /// the seat has one or more keyboards
        pub const KEYBOARD: Capability = Capability { flags: 2 };
        /// the seat has touch devices
        pub const TOUCH: Capability = Capability { flags: 4 };
        pub const EMPTY: Capability = Capability { flags: 0 };
        pub const ALL: Capability = Capability { flags: Self::EMPTY.flags | Self::POINTER.flags | Self::KEYBOARD.flags | Self::TOUCH.flags };
        pub const EACH: [(&'static str, Capability); 3] = [("pointer", Self::POINTER), ("keyboard", Self::KEYBOARD), ("touch", Self::TOUCH)];
    }

    #[derive(Debug, Default)]
    pub struct WlSeat(Proxy);

    impl Object for WlSeat {
        const INTERFACE: &'static Interface = &INTERFACE;
        fn from_proxy(proxy: Proxy) -> Self {
            WlSeat(proxy)
        }
        fn proxy(&self) -> &Proxy {
            &self.0
        }
        fn proxy_mut(&mut self) -> &mut Proxy {
            &mut self.0
        }
    }

    impl WlSeat {
        /// return pointer object
        pub fn get_pointer(&self) -> Result<wl_pointer::WlPointer> {
            let id: wl_pointer::WlPointer = self.0.create_object()?;
            self.0.send(request::GET_POINTER, &[Arg::NewId(id.proxy())])?;
            Ok(id)
        }

        /// return keyboard object
        pub fn get_keyboard(&self) -> Result<wl_keyboard::WlKeyboard> {
            let id: wl_keyboard::WlKeyboard = self.0.create_object()?;
            self.0.send(request::GET_KEYBOARD, &[Arg::NewId(id.proxy())])?;
            Ok(id)
        }

        /// release the seat object
        pub fn release(mut self) {
            self.0.destroy();
        }

        /// seat capabilities changed
        pub fn on_capabilities<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(u32) + 'static,
        {
            self.0.set_handler(event::CAPABILITIES, move |_, _, mut args| {
                let capabilities = args.uint()?;
                f(capabilities);
                Ok(())
            })
        }

        /// unique identifier for this seat
        pub fn on_name<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(String) + 'static,
        {
            self.0.set_handler(event::NAME, move |_, _, mut args| {
                let name = args.string()?;
                f(name);
                Ok(())
            })
        }
    }
}

/// pointer input device
pub mod wl_pointer {
    use super::*;

    pub static INTERFACE: Interface = Interface {
        name: "wl_pointer",
        version: 5,
        requests: &[
            MessageDesc {
                name: "set_cursor",
                signature: "u?oii",
                types: &[None, Some(&wl_surface::INTERFACE), None, None],
                destructor: false,
            },
            MessageDesc {
                name: "release",
                signature: "3",
                types: &[],
                destructor: true,
            },
        ],
        events: &[
            MessageDesc {
                name: "enter",
                signature: "uoff",
                types: &[None, Some(&wl_surface::INTERFACE), None, None],
                destructor: false,
            },
            MessageDesc {
                name: "leave",
                signature: "uo",
                types: &[None, Some(&wl_surface::INTERFACE)],
                destructor: false,
            },
            MessageDesc {
                name: "motion",
                signature: "uff",
                types: &[None, None, None],
                destructor: false,
            },
            MessageDesc {
                name: "button",
                signature: "uuuu",
                types: &[None, None, None, None],
                destructor: false,
            },
        ],
    };

    pub mod request {
        pub const SET_CURSOR: u16 = 0;
        pub const RELEASE: u16 = 1;
    }

    pub mod event {
        pub const ENTER: u16 = 0;
        pub const LEAVE: u16 = 1;
        pub const MOTION: u16 = 2;
        pub const BUTTON: u16 = 3;
    }

    /// physical button state
    #[repr(u32)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum ButtonState {
        /// the button is not pressed
        Released = 0,
        /// the button is pressed
        Pressed = 1,
    }

    impl From<ButtonState> for u32 {
        fn from(v: ButtonState) -> u32 {
            v as u32
        }
    }

    impl TryFrom<u32> for ButtonState {
        type Error = u32;
        fn try_from(v: u32) -> std::result::Result<Self, u32> {
            match v {
                0 => Ok(ButtonState::Released),
                1 => Ok(ButtonState::Pressed),
                _ => Err(v),
            }
        }
    }

    #[derive(Debug, Default)]
    pub struct WlPointer(Proxy);

    impl Object for WlPointer {
        const INTERFACE: &'static Interface = &INTERFACE;
        fn from_proxy(proxy: Proxy) -> Self {
            WlPointer(proxy)
        }
        fn proxy(&self) -> &Proxy {
            &self.0
        }
        fn proxy_mut(&mut self) -> &mut Proxy {
            &mut self.0
        }
    }

    impl WlPointer {
        /// set the pointer surface
        pub fn set_cursor(&self, serial: u32, surface: Option<&wl_surface::WlSurface>, hotspot_x: i32, hotspot_y: i32) -> Result<()> {
            self.0.send(request::SET_CURSOR, &[Arg::Uint(serial), Arg::Object(surface.and_then(|o| o.object())), Arg::Int(hotspot_x), Arg::Int(hotspot_y)])?;
            Ok(())
        }

        /// release the pointer object
        pub fn release(mut self) {
            self.0.destroy();
        }

        /// enter event
        pub fn on_enter<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(u32, Option<ObjectRef>, Fixed, Fixed) + 'static,
        {
            self.0.set_handler(event::ENTER, move |_, _, mut args| {
                let serial = args.uint()?;
                let surface = args.object()?;
                let surface_x = args.fixed()?;
                let surface_y = args.fixed()?;
                f(serial, surface, surface_x, surface_y);
                Ok(())
            })
        }

        /// leave event
        pub fn on_leave<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(u32, Option<ObjectRef>) + 'static,
        {
            self.0.set_handler(event::LEAVE, move |_, _, mut args| {
                let serial = args.uint()?;
                let surface = args.object()?;
                f(serial, surface);
                Ok(())
            })
        }

        /// pointer motion event
        pub fn on_motion<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(u32, Fixed, Fixed) + 'static,
        {
            self.0.set_handler(event::MOTION, move |_, _, mut args| {
                let time = args.uint()?;
                let surface_x = args.fixed()?;
                let surface_y = args.fixed()?;
                f(time, surface_x, surface_y);
                Ok(())
            })
        }

        /// pointer button event
        pub fn on_button<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(u32, u32, u32, u32) + 'static,
        {
            self.0.set_handler(event::BUTTON, move |_, _, mut args| {
                let serial = args.uint()?;
                let time = args.uint()?;
                let button = args.uint()?;
                let state = args.uint()?;
                f(serial, time, button, state);
                Ok(())
            })
        }
    }
}

/// keyboard input device
pub mod wl_keyboard {
    use super::*;

    pub static INTERFACE: Interface = Interface {
        name: "wl_keyboard",
        version: 5,
        requests: &[
            MessageDesc {
                name: "release",
                signature: "3",
                types: &[],
                destructor: true,
            },
        ],
        events: &[
            MessageDesc {
                name: "keymap",
                signature: "uhu",
                types: &[None, None, None],
                destructor: false,
            },
            MessageDesc {
                name: "enter",
                signature: "uoa",
                types: &[None, Some(&wl_surface::INTERFACE), None],
                destructor: false,
            },
            MessageDesc {
                name: "leave",
                signature: "uo",
                types: &[None, Some(&wl_surface::INTERFACE)],
                destructor: false,
            },
            MessageDesc {
                name: "key",
                signature: "uuuu",
                types: &[None, None, None, None],
                destructor: false,
            },
        ],
    };

    pub mod request {
        pub const RELEASE: u16 = 0;
    }

    pub mod event {
        pub const KEYMAP: u16 = 0;
        pub const ENTER: u16 = 1;
        pub const LEAVE: u16 = 2;
        pub const KEY: u16 = 3;
    }

    /// keyboard mapping format
    #[repr(u32)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum KeymapFormat {
        /// no keymap; client must understand how to interpret the raw keycode
        NoKeymap = 0,
        /// libxkbcommon compatible, null-terminated string
        XkbV1 = 1,
    }

    impl From<KeymapFormat> for u32 {
        fn from(v: KeymapFormat) -> u32 {
            v as u32
        }
    }

    impl TryFrom<u32> for KeymapFormat {
        type Error = u32;
        fn try_from(v: u32) -> std::result::Result<Self, u32> {
            match v {
                0 => Ok(KeymapFormat::NoKeymap),
                1 => Ok(KeymapFormat::XkbV1),
                _ => Err(v),
            }
        }
    }

    /// physical key state
    #[repr(u32)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum KeyState {
        /// key is not pressed
        Released = 0,
        /// key is pressed
        Pressed = 1,
    }

    impl From<KeyState> for u32 {
        fn from(v: KeyState) -> u32 {
            v as u32
        }
    }

    impl TryFrom<u32> for KeyState {
        type Error = u32;
        fn try_from(v: u32) -> std::result::Result<Self, u32> {
            match v {
                0 => Ok(KeyState::Released),
                1 => Ok(KeyState::Pressed),
                _ => Err(v),
            }
        }
    }

    #[derive(Debug, Default)]
    pub struct WlKeyboard(Proxy);

    impl Object for WlKeyboard {
        const INTERFACE: &'static Interface = &INTERFACE;
        fn from_proxy(proxy: Proxy) -> Self {
            WlKeyboard(proxy)
        }
        fn proxy(&self) -> &Proxy {
            &self.0
        }
        fn proxy_mut(&mut self) -> &mut Proxy {
            &mut self.0
        }
    }

    impl WlKeyboard {
        /// release the keyboard object
        pub fn release(mut self) {
            self.0.destroy();
        }

        /// keyboard mapping
        pub fn on_keymap<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(u32, OwnedFd, u32) + 'static,
        {
            self.0.set_handler(event::KEYMAP, move |_, _, mut args| {
                let format = args.uint()?;
                let fd = args.fd()?;
                let size = args.uint()?;
                f(format, fd, size);
                Ok(())
            })
        }

        /// enter event
        pub fn on_enter<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(u32, Option<ObjectRef>, Vec<u8>) + 'static,
        {
            self.0.set_handler(event::ENTER, move |_, _, mut args| {
                let serial = args.uint()?;
                let surface = args.object()?;
                let keys = args.array()?;
                f(serial, surface, keys);
                Ok(())
            })
        }

        /// leave event
        pub fn on_leave<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(u32, Option<ObjectRef>) + 'static,
        {
            self.0.set_handler(event::LEAVE, move |_, _, mut args| {
                let serial = args.uint()?;
                let surface = args.object()?;
                f(serial, surface);
                Ok(())
            })
        }

        /// key event
        pub fn on_key<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(u32, u32, u32, u32) + 'static,
        {
            self.0.set_handler(event::KEY, move |_, _, mut args| {
                let serial = args.uint()?;
                let time = args.uint()?;
                let key = args.uint()?;
                let state = args.uint()?;
                f(serial, time, key, state);
                Ok(())
            })
        }
    }
}

/// compositor output region
pub mod wl_output {
    use super::*;

    pub static INTERFACE: Interface = Interface {
        name: "wl_output",
        version: 3,
        requests: &[
            MessageDesc {
                name: "release",
                signature: "3",
                types: &[],
                destructor: true,
            },
        ],
        events: &[
            MessageDesc {
                name: "geometry",
                signature: "iiiiissi",
                types: &[None, None, None, None, None, None, None, None],
                destructor: false,
            },
            MessageDesc {
                name: "mode",
                signature: "uiii",
                types: &[None, None, None, None],
                destructor: false,
            },
            MessageDesc {
                name: "done",
                signature: "2",
                types: &[],
                destructor: false,
            },
            MessageDesc {
                name: "scale",
                signature: "2i",
                types: &[None],
                destructor: false,
            },
        ],
    };

    pub mod request {
        pub const RELEASE: u16 = 0;
    }

    pub mod event {
        pub const GEOMETRY: u16 = 0;
        pub const MODE: u16 = 1;
        pub const DONE: u16 = 2;
        pub const SCALE: u16 = 3;
    }

    /// subpixel geometry information
    #[repr(u32)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Subpixel {
        /// unknown geometry
        Unknown = 0,
        /// no geometry
        None = 1,
        /// horizontal RGB
        HorizontalRgb = 2,
        /// horizontal BGR
        HorizontalBgr = 3,
        /// vertical RGB
        VerticalRgb = 4,
        /// vertical BGR
        VerticalBgr = 5,
    }

    impl From<Subpixel> for u32 {
        fn from(v: Subpixel) -> u32 {
            v as u32
        }
    }

    impl TryFrom<u32> for Subpixel {
        type Error = u32;
        fn try_from(v: u32) -> std::result::Result<Self, u32> {
            match v {
                0 => Ok(Subpixel::Unknown),
                1 => Ok(Subpixel::None),
                2 => Ok(Subpixel::HorizontalRgb),
                3 => Ok(Subpixel::HorizontalBgr),
                4 => Ok(Subpixel::VerticalRgb),
                5 => Ok(Subpixel::VerticalBgr),
                _ => Err(v),
            }
        }
    }

    /// transform from framebuffer to output
    #[repr(u32)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Transform {
        /// no transform
        Normal = 0,
        /// 90 degrees counter-clockwise
        N90 = 1,
        /// 180 degrees counter-clockwise
        N180 = 2,
        /// 270 degrees counter-clockwise
        N270 = 3,
        /// 180 degree flip around a vertical axis
        Flipped = 4,
        /// flip and rotate 90 degrees counter-clockwise
        Flipped90 = 5,
        /// flip and rotate 180 degrees counter-clockwise
        Flipped180 = 6,
        /// flip and rotate 270 degrees counter-clockwise
        Flipped270 = 7,
    }

    impl From<Transform> for u32 {
        fn from(v: Transform) -> u32 {
            v as u32
        }
    }

    impl TryFrom<u32> for Transform {
        type Error = u32;
        fn try_from(v: u32) -> std::result::Result<Self, u32> {
            match v {
                0 => Ok(Transform::Normal),
                1 => Ok(Transform::N90),
                2 => Ok(Transform::N180),
                3 => Ok(Transform::N270),
                4 => Ok(Transform::Flipped),
                5 => Ok(Transform::Flipped90),
                6 => Ok(Transform::Flipped180),
                7 => Ok(Transform::Flipped270),
                _ => Err(v),
            }
        }
    }

    /// mode information
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Mode {
        flags: u32,
    }

    impl std::fmt::Debug for Mode {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            let mut first = true;
            for (name, val) in Self::EACH {
                if val.flags != 0 && self.contains(val) {
                    if !first {
                        f.write_str("|")?;
                    }
                    first = false;
                    f.write_str(name)?;
                }
            }
            if first {
                f.write_str("EMPTY")?;
            }
            Ok(())
        }
    }

    impl std::fmt::LowerHex for Mode {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            <u32 as std::fmt::LowerHex>::fmt(&self.flags, f)
        }
    }

    impl std::ops::BitOr for Mode {
        type Output = Self;
        fn bitor(self, rhs: Self) -> Self {
            Mode { flags: self.flags | rhs.flags }
        }
    }

    impl std::ops::BitAnd for Mode {
        type Output = Self;
        fn bitand(self, rhs: Self) -> Self {
            Mode { flags: self.flags & rhs.flags }
        }
    }

    impl From<Mode> for u32 {
        fn from(v: Mode) -> u32 {
            v.flags
        }
    }

    impl From<u32> for Mode {
        fn from(flags: u32) -> Mode {
            Mode { flags }
        }
    }

    impl Mode {
        pub fn contains(&self, rhs: Mode) -> bool {
            (self.flags & rhs.flags) == rhs.flags
        }

        /// indicates this is the current mode
        pub const CURRENT: Mode = Mode { flags: 1 };
        /// indicates this is the preferred mode
        pub const PREFERRED: Mode = Mode { flags: 2 };
        pub const EMPTY: Mode = Mode { flags: 0 };
        pub const ALL: Mode = Mode { flags: Self::EMPTY.flags | Self::CURRENT.flags | Self::PREFERRED.flags };
        pub const EACH: [(&'static str, Mode); 2] = [("current", Self::CURRENT), ("preferred", Self::PREFERRED)];
    }

    #[derive(Debug, Default)]
    pub struct WlOutput(Proxy);

    impl Object for WlOutput {
        const INTERFACE: &'static Interface = &INTERFACE;
        fn from_proxy(proxy: Proxy) -> Self {
            WlOutput(proxy)
        }
        fn proxy(&self) -> &Proxy {
            &self.0
        }
        fn proxy_mut(&mut self) -> &mut Proxy {
            &mut self.0
        }
    }

    impl WlOutput {
        /// release the output object
        pub fn release(mut self) {
            self.0.destroy();
        }

        /// properties of the output
        pub fn on_geometry<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(i32, i32, i32, i32, i32, String, String, i32) + 'static,
        {
            self.0.set_handler(event::GEOMETRY, move |_, _, mut args| {
                let x = args.int()?;
                let y = args.int()?;
                let physical_width = args.int()?;
                let physical_height = args.int()?;
                let subpixel = args.int()?;
                let make = args.string()?;
                let model = args.string()?;
                let transform = args.int()?;
                f(x, y, physical_width, physical_height, subpixel, make, model, transform);
                Ok(())
            })
        }

        /// advertise available modes for the output
        pub fn on_mode<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(u32, i32, i32, i32) + 'static,
        {
            self.0.set_handler(event::MODE, move |_, _, mut args| {
                let flags = args.uint()?;
                let width = args.int()?;
                let height = args.int()?;
                let refresh = args.int()?;
                f(flags, width, height, refresh);
                Ok(())
            })
        }

        /// sent all information about output
        pub fn on_done<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut() + 'static,
        {
            self.0.set_handler(event::DONE, move |_, _, _| {
                f();
                Ok(())
            })
        }

        /// output scaling properties
        pub fn on_scale<F>(&self, mut f: F) -> Result<()>
        where
            F: FnMut(i32) + 'static,
        {
            self.0.set_handler(event::SCALE, move |_, _, mut args| {
                let factor = args.int()?;
                f(factor);
                Ok(())
            })
        }
    }
}
