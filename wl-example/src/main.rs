//! Lists the globals a running compositor advertises, then the details of
//! the ones `wl.rs` knows about: shm formats, seat capabilities, outputs.
//!
//! `wl.rs` is `gen` output for `protocol/wayland-client.xml`:
//!
//! ```text
//! cargo run --bin gen -- -o wl-example/src/wl.rs wl-example/protocol/wayland-client.xml
//! ```

mod wl;

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::os::fd::AsFd;
use std::rc::Rc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use wlproxy::{Connection, Object};

use crate::wl::{wl_compositor, wl_output, wl_seat, wl_shm};

fn init_logging() {
    if let Ok(env_filter) = tracing_subscriber::EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt().compact().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().compact().init();
    }
}

#[derive(Debug, Default)]
struct Output {
    make: String,
    model: String,
    scale: i32,
    modes: Vec<(i32, i32, i32, wl_output::Mode)>,
}

fn main() -> Result<()> {
    init_logging();

    let conn = Connection::connect_to_env().context("connecting to the compositor")?;
    let registry = conn.display().get_registry()?;

    let globals = Rc::new(RefCell::new(Vec::new()));
    let seen = globals.clone();
    registry.on_global(move |name, interface, version| seen.borrow_mut().push((name, interface, version)))?;
    registry.on_global_remove(|name| info!("global {name} removed"))?;

    conn.roundtrip().context("waiting for the registry")?;

    let formats = Rc::new(RefCell::new(Vec::new()));
    let capabilities = Rc::new(Cell::new(wl_seat::Capability::EMPTY));
    let outputs: Rc<RefCell<Vec<Output>>> = Rc::default();
    let mut shm = None;
    let mut compositor = None;
    let mut seats = Vec::new();
    let mut heads = Vec::new();

    for (name, interface, version) in globals.borrow().iter() {
        println!("{name:>4} {interface} v{version}");
        match interface.as_str() {
            "wl_compositor" => {
                compositor = Some(registry.bind::<wl_compositor::WlCompositor>(*name, (*version).min(4))?);
            }
            "wl_shm" => {
                let s: wl_shm::WlShm = registry.bind(*name, 1)?;
                let f = formats.clone();
                s.on_format(move |format| f.borrow_mut().push(format))?;
                shm = Some(s);
            }
            "wl_seat" => {
                let seat: wl_seat::WlSeat = registry.bind(*name, (*version).min(5))?;
                let c = capabilities.clone();
                seat.on_capabilities(move |caps| c.set(c.get() | wl_seat::Capability::from(caps)))?;
                seat.on_name(|name| debug!("seat {name}"))?;
                seats.push(seat);
            }
            "wl_output" => {
                let output: wl_output::WlOutput = registry.bind(*name, (*version).min(3))?;
                let index = outputs.borrow().len();
                outputs.borrow_mut().push(Output::default());
                let o = outputs.clone();
                output.on_geometry(move |_, _, _, _, _, make, model, _| {
                    let mut outputs = o.borrow_mut();
                    outputs[index].make = make;
                    outputs[index].model = model;
                })?;
                let o = outputs.clone();
                output.on_mode(move |flags, width, height, refresh| {
                    o.borrow_mut()[index].modes.push((width, height, refresh, wl_output::Mode::from(flags)));
                })?;
                let o = outputs.clone();
                output.on_scale(move |factor| o.borrow_mut()[index].scale = factor)?;
                heads.push(output);
            }
            _ => {}
        }
    }

    conn.roundtrip().context("waiting for global details")?;

    for format in formats.borrow().iter() {
        match wl_shm::Format::try_from(*format) {
            Ok(known) => println!("shm format {known:?}"),
            Err(code) => println!("shm format {code:#010x}"),
        }
    }
    if !seats.is_empty() {
        println!("seat capabilities {:?}", capabilities.get());
    }
    for output in outputs.borrow().iter() {
        println!("output {} {} scale {}", output.make, output.model, output.scale);
        for (width, height, refresh, flags) in &output.modes {
            let current = if flags.contains(wl_output::Mode::CURRENT) { " current" } else { "" };
            println!("  {width}x{height} @ {}.{:03} Hz{current}", refresh / 1000, refresh % 1000);
        }
    }

    if let (Some(compositor), Some(shm)) = (&compositor, &shm) {
        draw(&conn, compositor, shm).context("drawing a test buffer")?;
    }

    info!("{} globals, {} live objects", globals.borrow().len(), conn.object_count());
    Ok(())
}

/// Pushes one small shm buffer through a fresh surface.
fn draw(conn: &Connection, compositor: &wl_compositor::WlCompositor, shm: &wl_shm::WlShm) -> Result<()> {
    const SIZE: i32 = 4;
    let stride = SIZE * 4;
    let path = std::env::temp_dir().join(format!("wlproxy-example-{}", std::process::id()));
    let file = File::options()
        .read(true)
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    std::fs::remove_file(&path)?;
    file.set_len(u64::try_from(stride * SIZE)?)?;

    let surface = compositor.create_surface()?;
    let pool = shm.create_pool(file.as_fd(), stride * SIZE)?;
    let buffer = pool.create_buffer(0, SIZE, SIZE, stride, wl_shm::Format::Xrgb8888.into())?;
    pool.destroy();

    let released = Rc::new(Cell::new(false));
    let r = released.clone();
    buffer.on_release(move || r.set(true))?;
    surface.attach(Some(&buffer), 0, 0)?;
    surface.damage(0, 0, SIZE, SIZE)?;
    surface.commit()?;
    conn.roundtrip()?;

    info!("committed {:?}, released: {}", buffer.object(), released.get());
    surface.destroy();
    buffer.destroy();
    Ok(())
}
