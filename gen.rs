//! Generates typed proxy modules from Wayland protocol XML files.
//!
//! Every interface becomes a module holding its `static INTERFACE`
//! descriptor, request and event opcode constants, its enums, and a typed
//! wrapper with one method per request and one `on_<event>` setter per event.

use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use quick_xml::events::{BytesStart, Event as xmlEvent};
use tracing::{debug, info};

macro_rules! emit {
    ($($t:tt)*) => {{
        write!($($t)*)?
    }};
}
macro_rules! emitln {
    ($($t:tt)*) => {{
        writeln!($($t)*)?
    }};
}

#[derive(Debug, Clone, Default)]
struct Protocol {
    name: String,
    copyright: String,
    description: Description,
    interfaces: Vec<Interface>,
}

#[derive(Debug, Clone, Default)]
struct Description {
    summary: String,
    body: String,
}

#[derive(Debug, Clone, Default)]
struct Interface {
    name: String,
    version: u32,
    description: Description,
    requests: Vec<Message>,
    events: Vec<Message>,
    enums: Vec<Enum>,
}

#[derive(Debug, Clone, Default)]
struct Message {
    name: String,
    r#type: String,
    since: u32,
    description: Description,
    args: Vec<Arg>,
}

impl Message {
    fn is_destructor(&self) -> bool {
        self.r#type == "destructor"
    }
}

#[derive(Debug, Clone, Default)]
struct Enum {
    name: String,
    description: Description,
    bitfield: bool,
    entries: Vec<Entry>,
}

#[derive(Debug, Clone, Default)]
struct Arg {
    name: String,
    r#type: String,
    interface: String,
    nullable: bool,
}

#[derive(Debug, Clone, Default)]
struct Entry {
    name: String,
    description: Description,
    value: i64,
}

struct Rdr<R> {
    xml: quick_xml::Reader<R>,
    buf: Vec<u8>,
}

fn get_attr(bs: &BytesStart<'_>, name: &str) -> Option<String> {
    let attr = bs.try_get_attribute(name).ok().flatten();
    attr.and_then(|a| a.unescape_value().ok()).map(|v| v.into_owned())
}

fn req_attr(bs: &BytesStart<'_>, name: &str, what: &str) -> Result<String> {
    get_attr(bs, name).with_context(|| format!("{what} must have a {name}"))
}

fn parse_number(s: &str) -> Result<i64> {
    let v = match s.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    v.with_context(|| format!("not a number: {s:?}"))
}

/// Reads one protocol document.
fn parse<R: BufRead>(mut xml: quick_xml::Reader<R>) -> Result<Protocol> {
    xml.trim_text(false);
    xml.expand_empty_elements(true);
    let mut rdr = Rdr { xml, buf: Vec::with_capacity(1024) };
    loop {
        match rdr.xml.read_event_into(&mut rdr.buf)? {
            xmlEvent::Comment(_) => {}
            xmlEvent::Text(txt) if txt.iter().all(|b| b.is_ascii_whitespace()) => {}
            xmlEvent::Start(start) if start.local_name().as_ref() == b"protocol" => {
                let name = req_attr(&start, "name", "protocol")?;
                return read_protocol(&mut rdr, name);
            }
            xmlEvent::Decl(_) => {}
            xmlEvent::PI(_) => {}
            xmlEvent::DocType(_) => {}
            xmlEvent::Eof => bail!("no <protocol> element"),
            evt => bail!("unexpected xml event:{}: {evt:?}", rdr.xml.buffer_position()),
        }
    }
}

fn read_protocol<R: BufRead>(rdr: &mut Rdr<R>, name: String) -> Result<Protocol> {
    if name.is_empty() {
        bail!("protocol must have a name");
    }
    let mut copyright = String::new();
    let mut description = Description::default();
    let mut interfaces = vec![];
    loop {
        match rdr.xml.read_event_into(&mut rdr.buf)? {
            xmlEvent::Start(start) => match start.local_name().as_ref() {
                b"copyright" => copyright = read_copyright(rdr)?,
                b"description" => {
                    let summary = get_attr(&start, "summary");
                    description = read_description(rdr, summary.unwrap_or_default())?;
                }
                b"interface" => {
                    let iname = req_attr(&start, "name", "interface")?;
                    let iversion = req_attr(&start, "version", "interface")?;
                    interfaces.push(read_interface(rdr, iname, iversion)?);
                }
                tag => bail!(
                    "protocol: unexpected tag:{}: {:?}",
                    rdr.xml.buffer_position(),
                    String::from_utf8_lossy(tag)
                ),
            },
            xmlEvent::End(end) => {
                if end.local_name().as_ref() == b"protocol" {
                    break;
                }
                bail!(
                    "protocol: unexpected end tag:{}: {:?}",
                    rdr.xml.buffer_position(),
                    String::from_utf8_lossy(end.local_name().as_ref())
                );
            }
            xmlEvent::Eof => bail!("protocol:{name}: unterminated"),
            _ => {}
        }
    }
    Ok(Protocol { name, copyright, description, interfaces })
}

fn read_copyright<R: BufRead>(rdr: &mut Rdr<R>) -> Result<String> {
    let mut copyright = String::new();
    loop {
        match rdr.xml.read_event_into(&mut rdr.buf)? {
            xmlEvent::Comment(_) => {}
            xmlEvent::Text(txt) if txt.iter().all(|b| b.is_ascii_whitespace()) => {}
            xmlEvent::End(end) if end.local_name().as_ref() == b"copyright" => return Ok(copyright),
            xmlEvent::Text(txt) => copyright += &txt.unescape()?,
            xmlEvent::CData(txt) => copyright += &String::from_utf8_lossy(&txt),
            evt => bail!("copyright: unexpected xml event:{}: {evt:?}", rdr.xml.buffer_position()),
        }
    }
}

fn read_interface<R: BufRead>(rdr: &mut Rdr<R>, name: String, version: String) -> Result<Interface> {
    let Ok(version) = version.parse::<u32>() else {
        bail!("interface:{name}: version must be u32:{}: {version}", rdr.xml.buffer_position())
    };
    let mut description = Description::default();
    let mut events = vec![];
    let mut requests = vec![];
    let mut enums = vec![];
    loop {
        match rdr.xml.read_event_into(&mut rdr.buf)? {
            xmlEvent::Comment(_) => {}
            xmlEvent::Text(txt) if txt.iter().all(|b| b.is_ascii_whitespace()) => {}
            xmlEvent::Start(start) => match start.local_name().as_ref() {
                b"description" => {
                    let summary = get_attr(&start, "summary");
                    description = read_description(rdr, summary.unwrap_or_default())?;
                }
                b"event" | b"request" => {
                    let end = if start.local_name().as_ref() == b"event" { "event" } else { "request" };
                    let mname = req_attr(&start, "name", end)?;
                    let r#type = get_attr(&start, "type").unwrap_or_default();
                    let since = match get_attr(&start, "since") {
                        Some(since) => since.parse().with_context(|| format!("{end}:{mname}: bad since"))?,
                        None => 1,
                    };
                    let msg = read_message(rdr, end, mname, r#type, since)?;
                    if end == "event" {
                        events.push(msg);
                    } else {
                        requests.push(msg);
                    }
                }
                b"enum" => {
                    let ename = req_attr(&start, "name", "enum")?;
                    let bitfield = get_attr(&start, "bitfield");
                    enums.push(read_enum(rdr, ename, bitfield.unwrap_or_default())?);
                }
                _ => bail!("interface:{name}: unexpected xml event:{}: {start:?}", rdr.xml.buffer_position()),
            },
            xmlEvent::End(end) if end.local_name().as_ref() == b"interface" => {
                return Ok(Interface { name, version, description, requests, events, enums });
            }
            evt => bail!("interface:{name}: unexpected xml event:{}: {evt:?}", rdr.xml.buffer_position()),
        }
    }
}

fn read_description<R: BufRead>(rdr: &mut Rdr<R>, summary: String) -> Result<Description> {
    let mut body = String::new();
    loop {
        match rdr.xml.read_event_into(&mut rdr.buf)? {
            xmlEvent::Comment(_) => {}
            xmlEvent::Text(txt) if txt.iter().all(|b| b.is_ascii_whitespace()) => {}
            xmlEvent::Text(txt) => body += &txt.unescape()?,
            xmlEvent::CData(cdata) => body += &String::from_utf8_lossy(&cdata),
            xmlEvent::End(end) if end.local_name().as_ref() == b"description" => {
                return Ok(Description { summary, body });
            }
            evt => bail!("description: unexpected xml event:{}: {evt:?}", rdr.xml.buffer_position()),
        }
    }
}

fn read_message<R: BufRead>(
    rdr: &mut Rdr<R>,
    end: &str,
    name: String,
    r#type: String,
    since: u32,
) -> Result<Message> {
    let mut description = Description::default();
    let mut args = vec![];
    loop {
        match rdr.xml.read_event_into(&mut rdr.buf)? {
            xmlEvent::Comment(_) => {}
            xmlEvent::Text(txt) if txt.iter().all(|b| b.is_ascii_whitespace()) => {}
            xmlEvent::Start(start) => match start.local_name().as_ref() {
                b"arg" => {
                    let aname = req_attr(&start, "name", "arg")?;
                    let atype = req_attr(&start, "type", "arg")?;
                    let aifac = get_attr(&start, "interface").unwrap_or_default();
                    let nullable = get_attr(&start, "allow-null").unwrap_or_default();
                    args.push(read_arg(rdr, aname, atype, aifac, nullable)?);
                }
                b"description" => {
                    let summary = get_attr(&start, "summary");
                    description = read_description(rdr, summary.unwrap_or_default())?;
                }
                _ => bail!("{end}:{name}: unexpected xml start: {start:?}"),
            },
            xmlEvent::End(bend) if bend.local_name().as_ref() == end.as_bytes() => {
                return Ok(Message { name, r#type, since, description, args });
            }
            evt => bail!("{end}:{name}: unexpected xml event:{}: {evt:?}", rdr.xml.buffer_position()),
        }
    }
}

fn read_arg<R: BufRead>(
    rdr: &mut Rdr<R>,
    name: String,
    r#type: String,
    iface: String,
    allow_null: String,
) -> Result<Arg> {
    match r#type.as_str() {
        "int" | "uint" | "fixed" | "object" | "new_id" | "string" | "array" | "fd" => {}
        _ => bail!("arg:{name}: unexpected type: {type}"),
    }
    loop {
        match rdr.xml.read_event_into(&mut rdr.buf)? {
            xmlEvent::Comment(_) => {}
            xmlEvent::Text(txt) if txt.iter().all(|b| b.is_ascii_whitespace()) => {}
            // Argument descriptions carry nothing the bindings use.
            xmlEvent::Start(start) if start.local_name().as_ref() == b"description" => {
                read_description(rdr, String::new())?;
            }
            xmlEvent::End(end) if end.local_name().as_ref() == b"arg" => {
                return Ok(Arg { name, r#type, interface: iface, nullable: allow_null == "true" });
            }
            evt => bail!("arg:{name}: unexpected xml event:{}: {evt:?}", rdr.xml.buffer_position()),
        }
    }
}

fn read_enum<R: BufRead>(rdr: &mut Rdr<R>, name: String, bitfield: String) -> Result<Enum> {
    let mut description = Description::default();
    let mut entries = vec![];
    loop {
        match rdr.xml.read_event_into(&mut rdr.buf)? {
            xmlEvent::Comment(_) => {}
            xmlEvent::Text(txt) if txt.iter().all(|b| b.is_ascii_whitespace()) => {}
            xmlEvent::Start(start) => match start.local_name().as_ref() {
                b"description" => {
                    let summary = get_attr(&start, "summary").unwrap_or_default();
                    description = read_description(rdr, summary)?;
                }
                b"entry" => {
                    let ename = req_attr(&start, "name", "entry")?;
                    let value = req_attr(&start, "value", "entry")?;
                    let summary = get_attr(&start, "summary").unwrap_or_default();
                    entries.push(read_entry(rdr, ename, value, summary)?);
                }
                _ => bail!("enum:{name}: unexpected xml start event:{}: {start:?}", rdr.xml.buffer_position()),
            },
            xmlEvent::End(end) if end.local_name().as_ref() == b"enum" => {
                return Ok(Enum { name, description, bitfield: bitfield == "true", entries });
            }
            evt => bail!("enum:{name}: unexpected xml event:{}: {evt:?}", rdr.xml.buffer_position()),
        }
    }
}

fn read_entry<R: BufRead>(rdr: &mut Rdr<R>, name: String, value: String, summary: String) -> Result<Entry> {
    let value = parse_number(&value).with_context(|| format!("entry:{name}"))?;
    let mut description = Description { summary, body: String::new() };
    loop {
        match rdr.xml.read_event_into(&mut rdr.buf)? {
            xmlEvent::Comment(_) => {}
            xmlEvent::Text(txt) if txt.iter().all(|b| b.is_ascii_whitespace()) => {}
            xmlEvent::Start(start) if start.local_name().as_ref() == b"description" => {
                let summary = get_attr(&start, "summary").unwrap_or_default();
                description = read_description(rdr, summary)?;
            }
            xmlEvent::End(end) if end.local_name().as_ref() == b"entry" => {
                return Ok(Entry { name, description, value });
            }
            evt => bail!("entry:{name}: unexpected xml event:{}: {evt:?}", rdr.xml.buffer_position()),
        }
    }
}

struct Gen<'g> {
    out: &'g mut dyn Write,
}

impl Write for Gen<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }
}

const HEADER: &str = include_str!("base.rs");

/// Writes the header followed by the modules of every protocol.
fn generate(out: &mut dyn Write, protocols: &[Protocol]) -> Result<()> {
    let mut g = Gen { out };
    emit!(g, "{HEADER}");
    for p in protocols {
        gen_protocol(&mut g, p)?;
    }
    Ok(())
}

fn gen_protocol(g: &mut Gen<'_>, p: &Protocol) -> Result<()> {
    emitln!(g);
    emitln!(g, "// protocol {}", p.name);
    if !p.description.summary.is_empty() {
        emitln!(g, "// {}", p.description.summary.trim());
    }
    for line in p.copyright.lines() {
        emitln!(g, "// {}", line.trim());
    }
    for iface in p.interfaces.iter() {
        debug!("{}: {} v{}", p.name, iface.name, iface.version);
        gen_iface(g, iface)?;
    }
    Ok(())
}

fn gen_doccomment(g: &mut Gen<'_>, indent: &str, Description { summary, body }: &Description) -> Result<()> {
    for line in summary.lines() {
        emitln!(g, "{indent}/// {}", line.trim());
    }
    if !summary.is_empty() && !body.trim().is_empty() {
        emitln!(g, "{indent}///");
    }
    for line in body.trim().lines() {
        let line = line.trim();
        if line.is_empty() {
            emitln!(g, "{indent}///");
        } else {
            emitln!(g, "{indent}/// {line}");
        }
    }
    Ok(())
}

/// Escapes names that are not usable as Rust identifiers.
struct Ident<'s>(&'s str);

const RESERVED: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate", "do", "dyn",
    "else", "enum", "extern", "false", "final", "fn", "for", "if", "impl", "in", "let", "loop", "macro",
    "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return", "static", "struct", "super",
    "trait", "true", "try", "type", "typeof", "unsafe", "unsized", "use", "virtual", "where", "while",
    "yield",
    // locals of the generated bodies
    "f", "args", "conn", "this", "version",
];

impl std::fmt::Display for Ident<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.0;
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            write!(f, "N{name}")
        } else if RESERVED.contains(&name) {
            write!(f, "{name}_")
        } else {
            f.write_str(name)
        }
    }
}

/// `snake_case` to `CamelCase`.
struct Camel<'s>(&'s str);

impl std::fmt::Display for Camel<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.starts_with(|c: char| c.is_ascii_digit()) {
            f.write_str("N")?;
        }
        for word in self.0.split('_').filter(|w| !w.is_empty()) {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                write!(f, "{}{}", first.to_ascii_uppercase(), chars.as_str())?;
            }
        }
        Ok(())
    }
}

/// `snake_case` to `UPPER_CASE`.
struct Upper<'s>(&'s str);

impl std::fmt::Display for Upper<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.starts_with(|c: char| c.is_ascii_digit()) {
            f.write_str("N")?;
        }
        f.write_str(&self.0.to_ascii_uppercase())
    }
}

/// Path of an interface's wrapper type from inside a sibling module.
fn wrapper_path(interface: &str) -> String {
    format!("{}::{}", Ident(interface), Camel(interface))
}

fn signature(msg: &Message) -> Result<String> {
    let mut sig = String::new();
    if msg.since > 1 {
        sig += &msg.since.to_string();
    }
    for arg in &msg.args {
        if arg.nullable {
            sig.push('?');
        }
        sig += match (arg.r#type.as_str(), arg.interface.is_empty()) {
            ("int", _) => "i",
            ("uint", _) => "u",
            ("fixed", _) => "f",
            ("string", _) => "s",
            ("object", _) => "o",
            ("new_id", true) => "sun",
            ("new_id", false) => "n",
            ("array", _) => "a",
            ("fd", _) => "h",
            (other, _) => bail!("{}.{}: unexpected type {other}", msg.name, arg.name),
        };
    }
    Ok(sig)
}

/// One entry per signature slot; an untyped new_id takes three.
fn types(msg: &Message) -> Vec<Option<&str>> {
    let mut types = vec![];
    for arg in &msg.args {
        let iface = (!arg.interface.is_empty()).then_some(arg.interface.as_str());
        let slots = if arg.r#type == "new_id" && iface.is_none() { 3 } else { 1 };
        types.extend(std::iter::repeat(iface).take(slots));
    }
    types
}

fn gen_descs(g: &mut Gen<'_>, field: &str, msgs: &[Message]) -> Result<()> {
    if msgs.is_empty() {
        emitln!(g, "        {field}: &[],");
        return Ok(());
    }
    emitln!(g, "        {field}: &[");
    for msg in msgs {
        emitln!(g, "            MessageDesc {{");
        emitln!(g, "                name: {:?},", msg.name);
        emitln!(g, "                signature: {:?},", signature(msg)?);
        emit!(g, "                types: &[");
        for (i, ty) in types(msg).into_iter().enumerate() {
            if i > 0 {
                emit!(g, ", ");
            }
            match ty {
                Some(iface) => emit!(g, "Some(&{}::INTERFACE)", Ident(iface)),
                None => emit!(g, "None"),
            }
        }
        emitln!(g, "],");
        emitln!(g, "                destructor: {},", msg.is_destructor());
        emitln!(g, "            }},");
    }
    emitln!(g, "        ],");
    Ok(())
}

fn gen_opcodes(g: &mut Gen<'_>, module: &str, msgs: &[Message]) -> Result<()> {
    if msgs.is_empty() {
        return Ok(());
    }
    emitln!(g);
    emitln!(g, "    pub mod {module} {{");
    for (op, msg) in msgs.iter().enumerate() {
        emitln!(g, "        pub const {}: u16 = {op};", Upper(&msg.name));
    }
    emitln!(g, "    }}");
    Ok(())
}

fn gen_iface(g: &mut Gen<'_>, iface: &Interface) -> Result<()> {
    let Interface { name, version, description, requests, events, enums } = iface;
    let ty = Camel(name);
    emitln!(g);
    gen_doccomment(g, "", description)?;
    emitln!(g, "pub mod {} {{", Ident(name));
    emitln!(g, "    use super::*;");
    emitln!(g);
    emitln!(g, "    pub static INTERFACE: Interface = Interface {{");
    emitln!(g, "        name: {name:?},");
    emitln!(g, "        version: {version},");
    gen_descs(g, "requests", requests)?;
    gen_descs(g, "events", events)?;
    emitln!(g, "    }};");
    gen_opcodes(g, "request", requests)?;
    gen_opcodes(g, "event", events)?;
    for enm in enums {
        emitln!(g);
        if enm.bitfield {
            gen_bitfield(g, enm)?;
        } else {
            gen_enum(g, enm)?;
        }
    }

    emitln!(
        g,
        r#"
    #[derive(Debug, Default)]
    pub struct {ty}(Proxy);

    impl Object for {ty} {{
        const INTERFACE: &'static Interface = &INTERFACE;
        fn from_proxy(proxy: Proxy) -> Self {{
            {ty}(proxy)
        }}
        fn proxy(&self) -> &Proxy {{
            &self.0
        }}
        fn proxy_mut(&mut self) -> &mut Proxy {{
            &mut self.0
        }}
    }}
"#
    );

    emitln!(g, "    impl {ty} {{");
    let mut sep = "";
    let first_destructor = requests.iter().position(Message::is_destructor);
    for (op, req) in requests.iter().enumerate() {
        emit!(g, "{sep}");
        sep = "\n";
        gen_request(g, req, Some(op) == first_destructor)?;
    }
    // The connection consumes wl_display events itself.
    if name != "wl_display" {
        for evt in events {
            emit!(g, "{sep}");
            sep = "\n";
            gen_event(g, evt)?;
        }
    }
    emitln!(g, "    }}");
    emitln!(g, "}}");
    Ok(())
}

fn param_ty(arg: &Arg) -> Result<String> {
    let ty = match arg.r#type.as_str() {
        "int" => "i32".to_owned(),
        "uint" => "u32".to_owned(),
        "fixed" => "Fixed".to_owned(),
        "string" => "&str".to_owned(),
        "array" => "&[u8]".to_owned(),
        "fd" => "BorrowedFd<'_>".to_owned(),
        "object" if arg.interface.is_empty() => "&Proxy".to_owned(),
        "object" => format!("&{}", wrapper_path(&arg.interface)),
        other => bail!("arg:{}: {other} is not a request parameter", arg.name),
    };
    match arg.r#type.as_str() {
        "string" | "object" if arg.nullable => Ok(format!("Option<{ty}>")),
        _ => Ok(ty),
    }
}

fn arg_expr(arg: &Arg) -> String {
    let name = Ident(&arg.name);
    match (arg.r#type.as_str(), arg.nullable) {
        ("int", _) => format!("Arg::Int({name})"),
        ("uint", _) => format!("Arg::Uint({name})"),
        ("fixed", _) => format!("Arg::Fixed({name})"),
        ("string", true) => format!("Arg::Str({name})"),
        ("string", false) => format!("Arg::Str(Some({name}))"),
        ("object", true) => format!("Arg::Object({name}.and_then(|o| o.object()))"),
        ("object", false) => format!("Arg::Object({name}.object())"),
        ("new_id", _) if arg.interface.is_empty() => {
            format!("Arg::Str(Some(T::INTERFACE.name)), Arg::Uint(version), Arg::NewId({name}.proxy())")
        }
        ("new_id", _) => format!("Arg::NewId({name}.proxy())"),
        ("array", _) => format!("Arg::Array({name})"),
        _ => format!("Arg::Fd({name})"),
    }
}

fn gen_request(g: &mut Gen<'_>, msg: &Message, destroys: bool) -> Result<()> {
    let new_ids: Vec<&Arg> = msg.args.iter().filter(|a| a.r#type == "new_id").collect();
    if new_ids.len() > 1 {
        bail!("request:{}: more than one new_id argument", msg.name);
    }
    let new_id = new_ids.first().copied();
    let generic = new_id.is_some_and(|a| a.interface.is_empty());
    let opcode = Upper(&msg.name);

    gen_doccomment(g, "        ", &msg.description)?;
    if destroys && msg.args.is_empty() {
        emitln!(g, "        pub fn {}(mut self) {{", Ident(&msg.name));
        emitln!(g, "            self.0.destroy();");
        emitln!(g, "        }}");
        return Ok(());
    }

    emit!(g, "        pub fn {}", Ident(&msg.name));
    if generic {
        emit!(g, "<T: Object>");
    }
    emit!(g, "({}", if msg.is_destructor() { "&mut self" } else { "&self" });
    for arg in msg.args.iter().filter(|a| a.r#type != "new_id") {
        emit!(g, ", {}: {}", Ident(&arg.name), param_ty(arg)?);
    }
    if generic {
        emit!(g, ", version: u32");
    }
    match new_id {
        None => emitln!(g, ") -> Result<()> {{"),
        Some(_) if generic => emitln!(g, ") -> Result<T> {{"),
        Some(a) => emitln!(g, ") -> Result<{}> {{", wrapper_path(&a.interface)),
    }

    match new_id {
        Some(a) if generic => {
            emitln!(g, "            let {} = T::from_proxy(self.0.create_versioned(T::INTERFACE, version)?);", Ident(&a.name))
        }
        Some(a) => {
            emitln!(g, "            let {}: {} = self.0.create_object()?;", Ident(&a.name), wrapper_path(&a.interface))
        }
        None => {}
    }
    let args: Vec<String> = msg.args.iter().map(arg_expr).collect();
    emitln!(g, "            self.0.send(request::{opcode}, &[{}])?;", args.join(", "));
    if msg.is_destructor() {
        emitln!(g, "            self.0.destroy();");
    }
    match new_id {
        Some(a) => emitln!(g, "            Ok({})", Ident(&a.name)),
        None => emitln!(g, "            Ok(())"),
    }
    emitln!(g, "        }}");
    Ok(())
}

/// Closure parameter type and `Args` getter for an event argument.
fn event_arg(arg: &Arg) -> Result<(String, String)> {
    Ok(match (arg.r#type.as_str(), arg.nullable) {
        ("int", _) => ("i32".to_owned(), "int()".to_owned()),
        ("uint", _) => ("u32".to_owned(), "uint()".to_owned()),
        ("fixed", _) => ("Fixed".to_owned(), "fixed()".to_owned()),
        ("string", false) => ("String".to_owned(), "string()".to_owned()),
        ("string", true) => ("Option<String>".to_owned(), "opt_string()".to_owned()),
        ("object", _) => ("Option<ObjectRef>".to_owned(), "object()".to_owned()),
        ("new_id", _) if arg.interface.is_empty() => ("Proxy".to_owned(), "proxy()".to_owned()),
        ("new_id", _) => {
            let path = wrapper_path(&arg.interface);
            (path.clone(), format!("new_object::<{path}>()"))
        }
        ("array", _) => ("Vec<u8>".to_owned(), "array()".to_owned()),
        ("fd", _) => ("OwnedFd".to_owned(), "fd()".to_owned()),
        (other, _) => bail!("arg:{}: unexpected type {other}", arg.name),
    })
}

fn gen_event(g: &mut Gen<'_>, msg: &Message) -> Result<()> {
    let args = msg.args.iter().map(event_arg).collect::<Result<Vec<_>>>()?;
    let tys: Vec<&str> = args.iter().map(|(ty, _)| ty.as_str()).collect();
    let names: Vec<String> = msg.args.iter().map(|a| Ident(&a.name).to_string()).collect();
    let (conn, this) = if msg.is_destructor() { ("conn", "this") } else { ("_", "_") };
    let params = if msg.args.is_empty() { "_" } else { "mut args" };

    gen_doccomment(g, "        ", &msg.description)?;
    emitln!(g, "        pub fn on_{}<F>(&self, mut f: F) -> Result<()>", msg.name);
    emitln!(g, "        where");
    emitln!(g, "            F: FnMut({}) + 'static,", tys.join(", "));
    emitln!(g, "        {{");
    emitln!(g, "            self.0.set_handler(event::{}, move |{conn}, {this}, {params}| {{", Upper(&msg.name));
    for (name, (_, getter)) in names.iter().zip(&args) {
        emitln!(g, "                let {name} = args.{getter}?;");
    }
    emitln!(g, "                f({});", names.join(", "));
    if msg.is_destructor() {
        emitln!(g, "                conn.retire(this);");
    }
    emitln!(g, "                Ok(())");
    emitln!(g, "            }})");
    emitln!(g, "        }}");
    Ok(())
}

fn gen_bitfield(g: &mut Gen<'_>, Enum { name, description, entries, .. }: &Enum) -> Result<()> {
    gen_doccomment(g, "    ", description)?;
    let name = Camel(name);
    emitln!(
        g,
        r#"    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct {name} {{
        flags: u32,
    }}

    impl std::fmt::Debug for {name} {{
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {{
            let mut first = true;
            for (name, val) in Self::EACH {{
                if val.flags != 0 && self.contains(val) {{
                    if !first {{
                        f.write_str("|")?;
                    }}
                    first = false;
                    f.write_str(name)?;
                }}
            }}
            if first {{
                f.write_str("EMPTY")?;
            }}
            Ok(())
        }}
    }}

    impl std::fmt::LowerHex for {name} {{
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {{
            <u32 as std::fmt::LowerHex>::fmt(&self.flags, f)
        }}
    }}

    impl std::ops::BitOr for {name} {{
        type Output = Self;
        fn bitor(self, rhs: Self) -> Self {{
            {name} {{ flags: self.flags | rhs.flags }}
        }}
    }}

    impl std::ops::BitAnd for {name} {{
        type Output = Self;
        fn bitand(self, rhs: Self) -> Self {{
            {name} {{ flags: self.flags & rhs.flags }}
        }}
    }}

    impl From<{name}> for u32 {{
        fn from(v: {name}) -> u32 {{
            v.flags
        }}
    }}

    impl From<u32> for {name} {{
        fn from(flags: u32) -> {name} {{
            {name} {{ flags }}
        }}
    }}

    impl {name} {{
        pub fn contains(&self, rhs: {name}) -> bool {{
            (self.flags & rhs.flags) == rhs.flags
        }}
"#
    );
    for Entry { name: n, description, value } in entries {
        gen_doccomment(g, "        ", description)?;
        emitln!(g, "        pub const {}: {name} = {name} {{ flags: {value} }};", Upper(n));
    }
    emitln!(g, "        pub const EMPTY: {name} = {name} {{ flags: 0 }};");
    emit!(g, "        pub const ALL: {name} = {name} {{ flags: Self::EMPTY.flags");
    for Entry { name, .. } in entries {
        emit!(g, " | Self::{}.flags", Upper(name));
    }
    emitln!(g, " }};");
    let each: Vec<String> = entries.iter().map(|e| format!("({:?}, Self::{})", e.name, Upper(&e.name))).collect();
    emitln!(g, "        pub const EACH: [(&'static str, {name}); {}] = [{}];", entries.len(), each.join(", "));
    emitln!(g, "    }}");
    Ok(())
}

fn gen_enum(g: &mut Gen<'_>, Enum { name, description, entries, .. }: &Enum) -> Result<()> {
    gen_doccomment(g, "    ", description)?;
    let neg = entries.iter().any(|Entry { value, .. }| *value < 0);
    let repr = if neg { "i32" } else { "u32" };
    let name = Camel(name);

    // Entries that repeat an earlier value become aliases.
    let mut variants: Vec<&Entry> = vec![];
    let mut aliases: Vec<(&Entry, &Entry)> = vec![];
    for entry in entries {
        match variants.iter().find(|v| v.value == entry.value) {
            Some(first) => aliases.push((entry, first)),
            None => variants.push(entry),
        }
    }

    emitln!(g, "    #[repr({repr})]");
    emitln!(g, "    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]");
    emitln!(g, "    pub enum {name} {{");
    for Entry { name, description, value } in &variants {
        gen_doccomment(g, "        ", description)?;
        emitln!(g, "        {} = {value},", Camel(name));
    }
    emitln!(g, "    }}");

    if !aliases.is_empty() {
        emitln!(g, "    #[allow(non_upper_case_globals)]");
        emitln!(g, "    impl {name} {{");
        for (alias, first) in &aliases {
            gen_doccomment(g, "        ", &alias.description)?;
            emitln!(g, "        pub const {}: {name} = {name}::{};", Camel(&alias.name), Camel(&first.name));
        }
        emitln!(g, "    }}");
    }

    emitln!(
        g,
        r#"
    impl From<{name}> for {repr} {{
        fn from(v: {name}) -> {repr} {{
            v as {repr}
        }}
    }}

    impl TryFrom<{repr}> for {name} {{
        type Error = {repr};
        fn try_from(v: {repr}) -> std::result::Result<Self, {repr}> {{
            match v {{"#
    );
    for Entry { name: n, value, .. } in &variants {
        emitln!(g, "                {value} => Ok({name}::{}),", Camel(n));
    }
    emitln!(
        g,
        r#"                _ => Err(v),
            }}
        }}
    }}"#
    );
    Ok(())
}

/// Generate typed proxy modules from Wayland protocol XML files.
#[derive(Parser, Debug)]
#[command(name = "gen")]
struct Cli {
    /// Write the bindings to this file instead of stdout (`-` is stdout).
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Protocol XML files, emitted in order into one module tree.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn init_logging() {
    if let Ok(env_filter) = tracing_subscriber::EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt()
            .compact()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().compact().with_writer(std::io::stderr).init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let mut protocols = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let xml = quick_xml::Reader::from_file(path).with_context(|| format!("opening {}", path.display()))?;
        let protocol = parse(xml).with_context(|| format!("reading {}", path.display()))?;
        info!("{}: {} interfaces", protocol.name, protocol.interfaces.len());
        protocols.push(protocol);
    }

    match cli.output.as_deref().filter(|p| *p != Path::new("-")) {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            let mut out = BufWriter::new(file);
            generate(&mut out, &protocols)?;
            out.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            generate(&mut out, &protocols)?;
            out.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<protocol name="demo">
  <copyright>Copyright demo authors</copyright>
  <interface name="demo_manager" version="3">
    <description summary="makes things">
      Hands out things.

      Keeps nothing.
    </description>
    <request name="destroy" type="destructor"/>
    <request name="get_thing">
      <arg name="id" type="new_id" interface="demo_thing"/>
      <arg name="parent" type="object" interface="demo_thing" allow-null="true"/>
    </request>
    <request name="bind" since="2">
      <arg name="name" type="uint"/>
      <arg name="id" type="new_id"/>
    </request>
    <request name="set_title">
      <arg name="type" type="string"/>
    </request>
    <event name="done" since="3">
      <arg name="serial" type="uint"/>
      <arg name="label" type="string" allow-null="true"/>
    </event>
    <event name="thing">
      <arg name="id" type="new_id" interface="demo_thing"/>
    </event>
    <enum name="error">
      <entry name="role" value="0" summary="bad role"/>
      <entry name="invalid_size" value="1"/>
      <entry name="bad_size" value="1"/>
    </enum>
    <enum name="mode" bitfield="true">
      <entry name="none" value="0"/>
      <entry name="move" value="0x1"/>
      <entry name="90" value="0x2"/>
    </enum>
  </interface>
  <interface name="demo_thing" version="1">
    <request name="release" type="destructor">
      <description summary="let go of the thing"/>
      <arg name="reason" type="uint"/>
    </request>
    <event name="closed" type="destructor"/>
  </interface>
</protocol>
"#;

    fn demo() -> Protocol {
        parse(quick_xml::Reader::from_str(DEMO)).unwrap()
    }

    fn generated() -> String {
        let mut out = Vec::new();
        generate(&mut out, &[demo()]).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn parses_interfaces() {
        let p = demo();
        assert_eq!(p.name, "demo");
        assert_eq!(p.copyright, "Copyright demo authors");
        assert_eq!(p.interfaces.len(), 2);

        let manager = &p.interfaces[0];
        assert_eq!(manager.version, 3);
        assert_eq!(manager.description.summary, "makes things");
        assert_eq!(manager.requests.len(), 4);
        assert!(manager.requests[0].is_destructor());
        assert_eq!(manager.requests[2].since, 2);
        assert!(manager.requests[1].args[1].nullable);
        assert_eq!(manager.events[0].since, 3);
        assert!(manager.enums[1].bitfield);
        assert_eq!(manager.enums[1].entries[1].value, 1);
    }

    #[test]
    fn signatures() {
        let p = demo();
        let manager = &p.interfaces[0];
        assert_eq!(signature(&manager.requests[0]).unwrap(), "");
        assert_eq!(signature(&manager.requests[1]).unwrap(), "n?o");
        assert_eq!(signature(&manager.requests[2]).unwrap(), "2usun");
        assert_eq!(signature(&manager.events[0]).unwrap(), "3u?s");
        assert_eq!(types(&manager.requests[1]), vec![Some("demo_thing"), Some("demo_thing")]);
        assert_eq!(types(&manager.requests[2]), vec![None; 4]);
    }

    #[test]
    fn names() {
        assert_eq!(Ident("move").to_string(), "move_");
        assert_eq!(Ident("args").to_string(), "args_");
        assert_eq!(Ident("90").to_string(), "N90");
        assert_eq!(Ident("attach").to_string(), "attach");
        assert_eq!(Camel("zwp_linux_dmabuf_v1").to_string(), "ZwpLinuxDmabufV1");
        assert_eq!(Camel("90").to_string(), "N90");
        assert_eq!(Upper("invalid_size").to_string(), "INVALID_SIZE");
    }

    #[test]
    fn emits_descriptors_and_wrappers() {
        let out = generated();
        assert!(out.starts_with(HEADER));
        assert!(out.contains("// Copyright demo authors"));
        assert!(out.contains("pub mod demo_manager {"));
        assert!(out.contains("        name: \"demo_manager\",\n        version: 3,"));
        assert!(out.contains("signature: \"2usun\","));
        assert!(out.contains("types: &[Some(&demo_thing::INTERFACE), Some(&demo_thing::INTERFACE)],"));
        assert!(out.contains("        pub const GET_THING: u16 = 1;"));
        assert!(out.contains("/// makes things\n///\n/// Hands out things.\n///\n/// Keeps nothing.\n"));
        assert!(out.contains("pub struct DemoManager(Proxy);"));
    }

    #[test]
    fn emits_request_methods() {
        let out = generated();
        assert!(out.contains("        pub fn destroy(mut self) {\n            self.0.destroy();\n"));
        assert!(out.contains(
            "        pub fn get_thing(&self, parent: Option<&demo_thing::DemoThing>) -> Result<demo_thing::DemoThing> {"
        ));
        assert!(out.contains("Arg::NewId(id.proxy()), Arg::Object(parent.and_then(|o| o.object()))"));
        assert!(out.contains("        pub fn bind<T: Object>(&self, name: u32, version: u32) -> Result<T> {"));
        assert!(out.contains("Arg::Uint(name), Arg::Str(Some(T::INTERFACE.name)), Arg::Uint(version), Arg::NewId(id.proxy())"));
        assert!(out.contains("        pub fn set_title(&self, type_: &str) -> Result<()> {"));
        assert!(out.contains(
            "        /// let go of the thing\n        pub fn release(&mut self, reason: u32) -> Result<()> {\n            self.0.send(request::RELEASE, &[Arg::Uint(reason)])?;\n            self.0.destroy();\n"
        ));
    }

    #[test]
    fn emits_event_setters() {
        let out = generated();
        assert!(out.contains("        pub fn on_done<F>(&self, mut f: F) -> Result<()>"));
        assert!(out.contains("            F: FnMut(u32, Option<String>) + 'static,"));
        assert!(out.contains("                let label = args.opt_string()?;"));
        assert!(out.contains("                let id = args.new_object::<demo_thing::DemoThing>()?;"));
        assert!(out.contains("self.0.set_handler(event::CLOSED, move |conn, this, _| {"));
        assert!(out.contains("                conn.retire(this);"));
    }

    #[test]
    fn emits_enums() {
        let out = generated();
        assert!(out.contains("    pub enum Error {"));
        assert!(out.contains("        InvalidSize = 1,"));
        assert!(!out.contains("        BadSize = 1,"));
        assert!(out.contains("        pub const BadSize: Error = Error::InvalidSize;"));
        assert!(out.contains("                1 => Ok(Error::InvalidSize),"));
        assert!(out.contains("        pub const MOVE: Mode = Mode { flags: 1 };"));
        assert!(out.contains("        pub const N90: Mode = Mode { flags: 2 };"));
        assert!(out.contains("(\"move\", Self::MOVE), (\"90\", Self::N90)];"));
    }

    #[test]
    fn example_bindings_are_current() {
        let xml = quick_xml::Reader::from_str(include_str!("wl-example/protocol/wayland-client.xml"));
        let mut out = Vec::new();
        generate(&mut out, &[parse(xml).unwrap()]).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out == include_str!("wl-example/src/wl.rs"), "wl-example/src/wl.rs is stale, rerun gen");
    }

    #[test]
    fn rejects_malformed_protocols() {
        let bad_type = r#"<protocol name="p"><interface name="i" version="1">
            <request name="r"><arg name="a" type="float"/></request>
        </interface></protocol>"#;
        assert!(parse(quick_xml::Reader::from_str(bad_type)).is_err());

        let no_version = r#"<protocol name="p"><interface name="i"></interface></protocol>"#;
        assert!(parse(quick_xml::Reader::from_str(no_version)).is_err());

        assert!(parse(quick_xml::Reader::from_str("")).is_err());
    }
}
