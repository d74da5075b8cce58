//! Static per-interface tables.
//!
//! An [`Interface`] lists the requests and events of one protocol interface as
//! [`MessageDesc`]s. Every message carries its wire signature as a tag string
//! (`"?oii"`, `"2i"`, `"usun"`) together with the interfaces of its object and
//! new-id arguments. Tables are plain `static` items and may refer to each
//! other in cycles.

use std::fmt;

use crate::{Error, Result};

/// Wire type of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Int,
    Uint,
    Fixed,
    Str,
    Object,
    NewId,
    Array,
    Fd,
}

impl ArgKind {
    pub fn from_tag(tag: u8) -> Option<ArgKind> {
        Some(match tag {
            b'i' => ArgKind::Int,
            b'u' => ArgKind::Uint,
            b'f' => ArgKind::Fixed,
            b's' => ArgKind::Str,
            b'o' => ArgKind::Object,
            b'n' => ArgKind::NewId,
            b'a' => ArgKind::Array,
            b'h' => ArgKind::Fd,
            _ => return None,
        })
    }

    pub fn tag(self) -> char {
        match self {
            ArgKind::Int => 'i',
            ArgKind::Uint => 'u',
            ArgKind::Fixed => 'f',
            ArgKind::Str => 's',
            ArgKind::Object => 'o',
            ArgKind::NewId => 'n',
            ArgKind::Array => 'a',
            ArgKind::Fd => 'h',
        }
    }
}

/// One argument slot of a message, as read from its signature.
#[derive(Debug, Clone, Copy)]
pub struct ArgDesc {
    pub kind: ArgKind,
    pub nullable: bool,
    /// Expected interface of an object or new-id argument, `None` for "any".
    pub interface: Option<&'static Interface>,
}

/// A request or an event.
pub struct MessageDesc {
    pub name: &'static str,
    pub signature: &'static str,
    /// One entry per argument; only object and new-id slots are `Some`.
    pub types: &'static [Option<&'static Interface>],
    pub destructor: bool,
}

impl MessageDesc {
    /// First protocol version the message exists in.
    pub fn since(&self) -> u32 {
        let since = self
            .signature
            .bytes()
            .take_while(u8::is_ascii_digit)
            .fold(0u32, |n, d| n.saturating_mul(10).saturating_add(u32::from(d - b'0')));
        since.max(1)
    }

    pub fn args(&self) -> ArgIter {
        ArgIter {
            signature: self.signature,
            pos: 0,
            index: 0,
            types: self.types,
        }
    }

    pub fn arg_count(&self) -> usize {
        self.args().count()
    }
}

impl fmt::Debug for MessageDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<_> = self.types.iter().map(|t| t.map(|i| i.name)).collect();
        f.debug_struct("MessageDesc")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("types", &types)
            .field("destructor", &self.destructor)
            .finish()
    }
}

/// Iterator over the argument slots of a signature.
///
/// Digits between arguments are skipped. A malformed signature yields one
/// error and then ends.
#[derive(Debug, Clone)]
pub struct ArgIter {
    signature: &'static str,
    pos: usize,
    index: usize,
    types: &'static [Option<&'static Interface>],
}

impl ArgIter {
    fn invalid(&mut self, reason: &'static str) -> Error {
        self.pos = self.signature.len();
        Error::InvalidSignature { signature: self.signature, reason }
    }
}

impl Iterator for ArgIter {
    type Item = Result<ArgDesc>;

    fn next(&mut self) -> Option<Self::Item> {
        let sig = self.signature.as_bytes();
        let mut nullable = false;
        while let Some(&c) = sig.get(self.pos) {
            self.pos += 1;
            match c {
                b'0'..=b'9' => {}
                b'?' if !nullable => nullable = true,
                _ => {
                    let Some(kind) = ArgKind::from_tag(c) else {
                        return Some(Err(self.invalid("unknown argument tag")));
                    };
                    let interface = self.types.get(self.index).copied().flatten();
                    self.index += 1;
                    return Some(Ok(ArgDesc { kind, nullable, interface }));
                }
            }
        }
        if nullable {
            return Some(Err(self.invalid("'?' without an argument")));
        }
        None
    }
}

/// Descriptor of one protocol interface.
pub struct Interface {
    pub name: &'static str,
    pub version: u32,
    pub requests: &'static [MessageDesc],
    pub events: &'static [MessageDesc],
}

impl Interface {
    pub fn request(&self, opcode: u16) -> Option<&MessageDesc> {
        self.requests.get(usize::from(opcode))
    }

    pub fn event(&self, opcode: u16) -> Option<&MessageDesc> {
        self.events.get(usize::from(opcode))
    }

    /// Opcode of the request that destroys the object, if the interface has one.
    pub fn destructor(&self) -> Option<u16> {
        let op = self.requests.iter().position(|m| m.destructor)?;
        u16::try_from(op).ok()
    }

    pub fn same_as(&self, other: &Interface) -> bool {
        std::ptr::eq(self, other) || self.name == other.name
    }

    /// Checks every signature of the table and the length of its `types`.
    pub fn validate(&self) -> Result<()> {
        for msg in self.requests.iter().chain(self.events) {
            let mut n = 0;
            for arg in msg.args() {
                arg?;
                n += 1;
            }
            if n != msg.types.len() {
                return Err(Error::InvalidSignature {
                    signature: msg.signature,
                    reason: "types table does not match argument count",
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interface")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static BUFFER: Interface = Interface { name: "wl_buffer", version: 1, requests: &[], events: &[] };

    static SURFACE: Interface = Interface {
        name: "wl_surface",
        version: 3,
        requests: &[
            MessageDesc { name: "destroy", signature: "", types: &[], destructor: true },
            MessageDesc {
                name: "attach",
                signature: "?oii",
                types: &[Some(&BUFFER), None, None],
                destructor: false,
            },
            MessageDesc { name: "set_buffer_scale", signature: "3i", types: &[None], destructor: false },
        ],
        events: &[],
    };

    fn kinds(msg: &MessageDesc) -> Vec<(char, bool)> {
        msg.args().map(|a| a.map(|a| (a.kind.tag(), a.nullable)).unwrap()).collect()
    }

    #[test]
    fn nullable_object_signature() {
        let attach = &SURFACE.requests[1];
        assert_eq!(attach.since(), 1);
        assert_eq!(kinds(attach), vec![('o', true), ('i', false), ('i', false)]);
        let first = attach.args().next().unwrap().unwrap();
        assert!(first.interface.unwrap().same_as(&BUFFER));
    }

    #[test]
    fn version_prefix() {
        let scale = &SURFACE.requests[2];
        assert_eq!(scale.since(), 3);
        assert_eq!(kinds(scale), vec![('i', false)]);

        let release = MessageDesc { name: "release", signature: "3", types: &[], destructor: true };
        assert_eq!(release.since(), 3);
        assert_eq!(release.arg_count(), 0);
    }

    #[test]
    fn untyped_new_id_expansion() {
        let bind = MessageDesc { name: "bind", signature: "usun", types: &[None, None, None, None], destructor: false };
        assert_eq!(kinds(&bind), vec![('u', false), ('s', false), ('u', false), ('n', false)]);
    }

    #[test]
    fn malformed_signature() {
        let bad = MessageDesc { name: "bad", signature: "ix", types: &[None, None], destructor: false };
        let mut args = bad.args();
        assert!(args.next().unwrap().is_ok());
        assert!(matches!(args.next(), Some(Err(Error::InvalidSignature { .. }))));
        assert!(args.next().is_none());

        let dangling = MessageDesc { name: "bad", signature: "u?", types: &[None], destructor: false };
        assert!(dangling.args().any(|a| a.is_err()));
    }

    #[test]
    fn destructor_lookup_and_validate() {
        assert_eq!(SURFACE.destructor(), Some(0));
        assert_eq!(BUFFER.destructor(), None);
        SURFACE.validate().unwrap();

        static SHORT: Interface = Interface {
            name: "short",
            version: 1,
            requests: &[MessageDesc { name: "m", signature: "oi", types: &[None], destructor: false }],
            events: &[],
        };
        assert!(SHORT.validate().is_err());
    }
}
