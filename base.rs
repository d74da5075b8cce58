// Generated by `gen` from Wayland protocol XML files. Do not edit.
#![allow(dead_code, unused_imports, unused_mut, non_upper_case_globals, clippy::all)]

use std::os::fd::{BorrowedFd, OwnedFd};

use wlproxy::protocol::*;
use wlproxy::{Arg, Fixed, Interface, MessageDesc, Object, ObjectRef, Proxy, Result};
