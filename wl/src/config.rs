/// What to do with an event nobody consumes: one for an unknown handle, for a
/// destroyed object, or for an event without a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropPolicy {
    /// Logged at `trace` level only.
    #[default]
    Silent,
    /// Logged at `warn` level.
    Warn,
}

/// Runtime settings of a [`Connection`](crate::Connection).
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Trace every message crossing the wire at `debug` level.
    pub debug: bool,
    pub dropped_events: DropPolicy,
}

impl Config {
    /// Reads `WAYLAND_DEBUG` and `WLPROXY_DROPPED_EVENTS`.
    pub fn from_env() -> Config {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Config {
        let debug = lookup("WAYLAND_DEBUG").is_some_and(|v| !v.is_empty() && v != "0");
        let dropped_events = match lookup("WLPROXY_DROPPED_EVENTS").as_deref() {
            Some("warn") => DropPolicy::Warn,
            _ => DropPolicy::Silent,
        };
        Config { debug, dropped_events }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &[(&str, &str)]) -> Config {
        Config::from_lookup(|key| vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string()))
    }

    #[test]
    fn defaults() {
        let c = config(&[]);
        assert!(!c.debug);
        assert_eq!(c.dropped_events, DropPolicy::Silent);
    }

    #[test]
    fn wayland_debug() {
        assert!(config(&[("WAYLAND_DEBUG", "1")]).debug);
        assert!(config(&[("WAYLAND_DEBUG", "client")]).debug);
        assert!(!config(&[("WAYLAND_DEBUG", "0")]).debug);
        assert!(!config(&[("WAYLAND_DEBUG", "")]).debug);
    }

    #[test]
    fn dropped_events() {
        assert_eq!(config(&[("WLPROXY_DROPPED_EVENTS", "warn")]).dropped_events, DropPolicy::Warn);
        assert_eq!(config(&[("WLPROXY_DROPPED_EVENTS", "loud")]).dropped_events, DropPolicy::Silent);
    }
}
