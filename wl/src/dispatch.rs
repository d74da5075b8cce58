use std::os::fd::OwnedFd;

use crate::connection::Connection;
use crate::interface::{ArgKind, Interface, MessageDesc};
use crate::proxy::{Object, ObjectRef, Proxy};
use crate::wire::{Fixed, ReadBuf};
use crate::{Error, Result};

/// Event handler stored in a record's slot.
pub(crate) type Handler = Box<dyn FnMut(&Connection, ObjectRef, Args) -> Result<()>>;

/// One decoded event argument.
#[derive(Debug)]
pub enum Value {
    Int(i32),
    Uint(u32),
    Fixed(Fixed),
    Str(Option<String>),
    /// `None` for null, or for an id that is not live on this side.
    Object(Option<ObjectRef>),
    /// An object the peer created; ownership moves to the handler.
    NewObject(Proxy),
    Array(Vec<u8>),
    Fd(OwnedFd),
}

impl Value {
    fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Fixed(_) => "fixed",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::NewObject(_) => "new_id",
            Value::Array(_) => "array",
            Value::Fd(_) => "fd",
        }
    }
}

/// Decoded arguments of one event, consumed in signature order.
#[derive(Debug)]
pub struct Args {
    object: u32,
    opcode: u16,
    values: std::vec::IntoIter<Value>,
}

macro_rules! getter {
    ($name:ident, $variant:ident, $ty:ty, $what:literal) => {
        pub fn $name(&mut self) -> Result<$ty> {
            match self.next_value($what)? {
                Value::$variant(v) => Ok(v),
                other => Err(self.mismatch($what, &other)),
            }
        }
    };
}

impl Args {
    pub(crate) fn new(object: u32, opcode: u16, values: Vec<Value>) -> Args {
        Args { object, opcode, values: values.into_iter() }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.len() == 0
    }

    fn violation(&self, reason: String) -> Error {
        Error::ProtocolViolation { object: self.object, opcode: self.opcode, reason }
    }

    fn mismatch(&self, expected: &str, got: &Value) -> Error {
        self.violation(format!("expected {expected} argument, got {}", got.kind_name()))
    }

    fn next_value(&mut self, expected: &str) -> Result<Value> {
        match self.values.next() {
            Some(v) => Ok(v),
            None => Err(self.violation(format!("missing {expected} argument"))),
        }
    }

    getter!(int, Int, i32, "int");
    getter!(uint, Uint, u32, "uint");
    getter!(fixed, Fixed, Fixed, "fixed");
    getter!(opt_string, Str, Option<String>, "string");
    getter!(object, Object, Option<ObjectRef>, "object");
    getter!(proxy, NewObject, Proxy, "new_id");
    getter!(array, Array, Vec<u8>, "array");
    getter!(fd, Fd, OwnedFd, "fd");

    pub fn string(&mut self) -> Result<String> {
        match self.opt_string()? {
            Some(s) => Ok(s),
            None => Err(self.violation("null string".to_owned())),
        }
    }

    pub fn new_object<T: Object>(&mut self) -> Result<T> {
        self.proxy().map(T::from_proxy)
    }
}

impl Iterator for Args {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.values.next()
    }
}

pub(crate) enum Decoded {
    Value(Value),
    NewId(u32, &'static Interface),
}

/// Decodes an event body against its descriptor.
///
/// Descriptors are taken from `take_fd` for every `h` slot, so they are
/// consumed even when the event ends up discarded. `resolve` maps a non-null
/// object id to a live reference.
pub(crate) fn decode(
    desc: &MessageDesc,
    body: &[u8],
    mut take_fd: impl FnMut() -> Option<OwnedFd>,
    resolve: impl Fn(u32) -> Option<ObjectRef>,
) -> Result<Vec<Decoded>, &'static str> {
    let mut rd = ReadBuf::new(body);
    let mut out = Vec::new();
    for slot in desc.args() {
        let slot = slot.map_err(|_| "malformed signature")?;
        let value = match slot.kind {
            ArgKind::Int => Value::Int(rd.get_i32()?),
            ArgKind::Uint => Value::Uint(rd.get_u32()?),
            ArgKind::Fixed => Value::Fixed(Fixed::from_raw(rd.get_i32()?)),
            ArgKind::Str => {
                let s = rd.get_str()?;
                if s.is_none() && !slot.nullable {
                    return Err("null string in non-nullable argument");
                }
                Value::Str(s)
            }
            ArgKind::Object => match rd.get_u32()? {
                0 if !slot.nullable => return Err("null object in non-nullable argument"),
                0 => Value::Object(None),
                id => {
                    let obj = resolve(id);
                    if let (Some(obj), Some(want)) = (obj, slot.interface) {
                        if !obj.interface().same_as(want) {
                            return Err("object argument has the wrong interface");
                        }
                    }
                    Value::Object(obj)
                }
            },
            ArgKind::NewId => {
                let id = rd.get_u32()?;
                if id == 0 {
                    return Err("null new_id");
                }
                let Some(interface) = slot.interface else {
                    return Err("new_id without interface in event");
                };
                out.push(Decoded::NewId(id, interface));
                continue;
            }
            ArgKind::Array => Value::Array(rd.get_array()?),
            ArgKind::Fd => Value::Fd(take_fd().ok_or("missing file descriptor")?),
        };
        out.push(Decoded::Value(value));
    }
    if rd.remaining() != 0 {
        return Err("trailing bytes after arguments");
    }
    Ok(out)
}
