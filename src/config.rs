//! `resolv.conf` snapshot.

use std::path::Path;
use std::time::Duration;

use crate::error::ConfError;
use crate::util;

/// Nameservers used when `resolv.conf` names none.
const DEFAULT_SERVERS: [&str; 2] = ["127.0.0.1:53", "[::1]:53"];

/// glibc's `MAXNS`.
const MAX_SERVERS: usize = 3;

/// Parsed `resolv.conf`.
///
/// Only `lookup`, `unknown_opt` and `err` feed the lookup-order decision; the
/// remaining fields are kept so a built-in resolver can share the snapshot.
///
/// # Example
///
/// ```
/// use host_lookup_order::ResolvConfig;
///
/// let conf = ResolvConfig::parse("nameserver 10.0.0.1\noptions ndots:2\n");
/// assert_eq!(conf.servers, vec!["10.0.0.1:53"]);
/// assert_eq!(conf.ndots, 2);
/// assert!(!conf.unknown_opt);
/// ```
#[derive(Debug)]
pub struct ResolvConfig {
    /// Servers as `host:port`, at most three.
    pub servers: Vec<String>,

    /// Rooted search domains.
    pub search: Vec<String>,

    /// Dots required before an initial absolute query, `0..=15`.
    pub ndots: u8,

    /// Per-query timeout, at least one second.
    pub timeout: Duration,

    /// Attempts per server, at least one.
    pub attempts: u8,

    /// Round-robin across servers.
    pub rotate: bool,

    /// Serialise A and AAAA queries.
    pub single_request: bool,

    /// Query over TCP only.
    pub use_tcp: bool,

    /// Set the AD bit in queries.
    pub trust_ad: bool,

    /// Do not re-read the file on change.
    pub no_reload: bool,

    /// OpenBSD `lookup` tokens, e.g. `["file", "bind"]`. Empty means the
    /// platform default order, not "no sources".
    pub lookup: Vec<String>,

    /// An unrecognised keyword or option was present.
    pub unknown_opt: bool,

    /// Why the file could not be read, if it could not.
    pub err: Option<ConfError>,
}

impl Default for ResolvConfig {
    /// Defaults that apply when nothing was read. `err` is `None`.
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            search: Vec::new(),
            ndots: 1,
            timeout: Duration::from_secs(5),
            attempts: 2,
            rotate: false,
            single_request: false,
            use_tcp: false,
            trust_ad: false,
            no_reload: false,
            lookup: Vec::new(),
            unknown_opt: false,
            err: None,
        }
    }
}

impl ResolvConfig {
    /// Reads and parses the file at `path`.
    ///
    /// Never fails: a read error is stored in [`err`](Self::err) and the
    /// defaults are returned alongside it.
    #[must_use]
    pub fn read(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Could not read resolv.conf");
                let mut conf = Self::default();
                conf.fill_defaults();
                conf.err = Some(ConfError::Io(e));
                conf
            }
        }
    }

    /// Parses `resolv.conf` content.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut conf = Self::default();
        for line in content.lines() {
            if line.starts_with(['#', ';']) {
                continue;
            }
            let mut fields = line.split_ascii_whitespace();
            let Some(keyword) = fields.next() else {
                continue;
            };
            match keyword {
                "nameserver" => {
                    if let Some(addr) = fields.next() {
                        conf.push_server(addr);
                    }
                }
                "domain" => {
                    if let Some(domain) = fields.next() {
                        conf.search = vec![ensure_rooted(domain)];
                    }
                }
                "search" => {
                    conf.search = fields
                        .map(ensure_rooted)
                        .filter(|name| name != ".")
                        .collect();
                }
                "options" => fields.for_each(|opt| conf.apply_option(opt)),
                "lookup" => conf.lookup = fields.map(str::to_owned).collect(),
                _ => conf.unknown_opt = true,
            }
        }
        conf.fill_defaults();
        conf
    }

    /// Returns `true` if the file did not exist.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.err.as_ref().is_some_and(ConfError::is_not_found)
    }

    fn push_server(&mut self, addr: &str) {
        if self.servers.len() >= MAX_SERVERS {
            return;
        }
        // Zone suffixes (`fe80::1%eth0`) are allowed on link-local addresses.
        let ip = addr.split_once('%').map_or(addr, |(ip, _)| ip);
        match ip.parse::<std::net::IpAddr>() {
            Ok(std::net::IpAddr::V4(_)) => self.servers.push(format!("{addr}:53")),
            Ok(std::net::IpAddr::V6(_)) => self.servers.push(format!("[{addr}]:53")),
            Err(_) => tracing::debug!(addr, "Ignoring unparsable nameserver"),
        }
    }

    fn apply_option(&mut self, opt: &str) {
        if let Some(n) = opt.strip_prefix("ndots:") {
            self.ndots = u8::try_from(leading_int(n).min(15)).unwrap_or(15);
        } else if let Some(n) = opt.strip_prefix("timeout:") {
            self.timeout = Duration::from_secs(u64::from(leading_int(n).max(1)));
        } else if let Some(n) = opt.strip_prefix("attempts:") {
            self.attempts = u8::try_from(leading_int(n).max(1)).unwrap_or(u8::MAX);
        } else {
            match opt {
                "rotate" => self.rotate = true,
                "single-request" | "single-request-reopen" => self.single_request = true,
                "use-vc" | "usevc" | "tcp" => self.use_tcp = true,
                "trust-ad" => self.trust_ad = true,
                "edns0" => {}
                "no-reload" => self.no_reload = true,
                _ => self.unknown_opt = true,
            }
        }
    }

    fn fill_defaults(&mut self) {
        if self.servers.is_empty() {
            self.servers = DEFAULT_SERVERS.iter().map(|s| (*s).to_owned()).collect();
        }
        if self.search.is_empty() {
            self.search = default_search();
        }
    }
}

/// Search list derived from the domain part of the machine's hostname.
fn default_search() -> Vec<String> {
    let Ok(hostname) = util::hostname() else {
        return Vec::new();
    };
    match hostname.split_once('.') {
        Some((_, domain)) if !domain.is_empty() => vec![ensure_rooted(domain)],
        _ => Vec::new(),
    }
}

fn ensure_rooted(name: &str) -> String {
    if name.ends_with('.') {
        name.to_owned()
    } else {
        format!("{name}.")
    }
}

/// Parses leading decimal digits, saturating; no digits yields 0.
fn leading_int(s: &str) -> u32 {
    s.bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u32, |n, d| n.saturating_mul(10).saturating_add(u32::from(d - b'0')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_empty_file() {
        let c = ResolvConfig::parse("");
        assert_eq!(c.servers, vec!["127.0.0.1:53", "[::1]:53"]);
        assert_eq!(c.ndots, 1);
        assert_eq!(c.timeout, Duration::from_secs(5));
        assert_eq!(c.attempts, 2);
        assert!(c.lookup.is_empty());
        assert!(!c.unknown_opt);
        assert!(c.err.is_none());
    }

    #[test]
    fn parses_servers_and_search() {
        let c = ResolvConfig::parse(
            "# comment\n; other comment\nnameserver 8.8.8.8\nnameserver 2001:4860:4860::8888\n\
             nameserver fe80::1%lo0\nnameserver 1.1.1.1\nsearch example.com corp.example. .\n",
        );
        assert_eq!(
            c.servers,
            vec!["8.8.8.8:53", "[2001:4860:4860::8888]:53", "[fe80::1%lo0]:53"]
        );
        assert_eq!(c.search, vec!["example.com.", "corp.example."]);
    }

    #[test]
    fn domain_replaces_search() {
        let c = ResolvConfig::parse("search a.com b.com\ndomain c.com\n");
        assert_eq!(c.search, vec!["c.com."]);
    }

    #[test]
    fn options_are_clamped() {
        let c = ResolvConfig::parse("options ndots:99 timeout:0 attempts:0 rotate edns0\n");
        assert_eq!(c.ndots, 15);
        assert_eq!(c.timeout, Duration::from_secs(1));
        assert_eq!(c.attempts, 1);
        assert!(c.rotate);
        assert!(!c.unknown_opt);
    }

    #[test]
    fn flag_options() {
        let c = ResolvConfig::parse("options single-request-reopen use-vc trust-ad no-reload\n");
        assert!(c.single_request);
        assert!(c.use_tcp);
        assert!(c.trust_ad);
        assert!(c.no_reload);
    }

    #[test]
    fn unknown_option_and_keyword() {
        assert!(ResolvConfig::parse("options inet6\n").unknown_opt);
        assert!(ResolvConfig::parse("sortlist 130.155.160.0\n").unknown_opt);
    }

    #[test]
    fn lookup_tokens() {
        let c = ResolvConfig::parse("lookup file bind\n");
        assert_eq!(c.lookup, vec!["file", "bind"]);
    }

    #[test]
    fn read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let c = ResolvConfig::read(dir.path().join("resolv.conf"));
        assert!(c.is_missing());
        assert_eq!(c.servers.len(), 2);
    }

    #[test]
    fn read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resolv.conf");
        std::fs::write(&path, "nameserver 9.9.9.9\nlookup bind\n").unwrap();

        let c = ResolvConfig::read(&path);
        assert!(c.err.is_none());
        assert_eq!(c.servers, vec!["9.9.9.9:53"]);
        assert_eq!(c.lookup, vec!["bind"]);
    }
}
