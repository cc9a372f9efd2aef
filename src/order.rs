//! Lookup-order decision.
//!
//! [`SystemConfig::host_lookup_order`] decides, per hostname, whether the
//! built-in resolver can reproduce what libc would do, and in which order it
//! should consult `/etc/hosts` and DNS. Anything it cannot model precisely is
//! handed to the native resolver.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::nss::{NssConf, SourceKind};
use crate::nss_cache;
use crate::system::{OsFamily, SystemConfig, system_config};
use crate::util::{self, has_suffix_fold};

/// Where a hostname lookup should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupOrder {
    /// Let the system resolver (libc/NSS) handle it.
    NativeOnly,
    /// Built-in DNS only.
    BuiltinDns,
    /// `/etc/hosts`, then built-in DNS.
    FilesThenDns,
    /// Built-in DNS, then `/etc/hosts`.
    DnsThenFiles,
    /// `/etc/hosts` only.
    FilesOnly,
}

impl fmt::Display for LookupOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NativeOnly => "native",
            Self::BuiltinDns => "dns",
            Self::FilesThenDns => "files,dns",
            Self::DnsThenFiles => "dns,files",
            Self::FilesOnly => "files",
        })
    }
}

/// Mutable machine state the decision reads.
pub trait SystemState {
    /// Current `nsswitch.conf`.
    fn nss(&self) -> Arc<NssConf>;

    /// The machine's hostname.
    ///
    /// # Errors
    ///
    /// Returns [`ConfError::Hostname`](crate::ConfError::Hostname) if the
    /// hostname cannot be determined.
    fn hostname(&self) -> Result<String>;
}

/// The real machine: the process-wide NSS cache and `gethostname(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveSystem;

impl SystemState for LiveSystem {
    fn nss(&self) -> Arc<NssConf> {
        nss_cache::system_nss()
    }

    fn hostname(&self) -> Result<String> {
        util::hostname()
    }
}

/// Decides the lookup order for `hostname` using the process-wide
/// configuration.
#[must_use]
pub fn lookup_order(hostname: &str) -> LookupOrder {
    system_config().host_lookup_order(false, hostname)
}

impl SystemConfig {
    /// Reports whether the native resolver may be used for non-hostname
    /// lookups.
    #[must_use]
    pub fn can_use_native(&self) -> bool {
        self.host_lookup_order(false, "") == LookupOrder::NativeOnly
    }

    /// Decides how to resolve `hostname` against the live system.
    ///
    /// `prefer_builtin` is a per-call request for the built-in resolver; it
    /// changes what "fall back" means, not whether the fallback is taken.
    #[must_use]
    pub fn host_lookup_order(&self, prefer_builtin: bool, hostname: &str) -> LookupOrder {
        self.host_lookup_order_with(&LiveSystem, prefer_builtin, hostname)
    }

    /// Like [`host_lookup_order`](Self::host_lookup_order), reading NSS and
    /// the machine hostname from `state`.
    #[must_use]
    pub fn host_lookup_order_with(
        &self,
        state: &dyn SystemState,
        prefer_builtin: bool,
        hostname: &str,
    ) -> LookupOrder {
        let order = self.decide(state, prefer_builtin, hostname);
        if self.debug_level > 1 {
            tracing::debug!(hostname, %order, "host_lookup_order");
        }
        order
    }

    fn decide(&self, state: &dyn SystemState, prefer_builtin: bool, hostname: &str) -> LookupOrder {
        let fallback = if self.builtin || prefer_builtin {
            if self.os == OsFamily::Windows {
                // No files-based lookup on Windows.
                LookupOrder::BuiltinDns
            } else {
                LookupOrder::FilesThenDns
            }
        } else {
            LookupOrder::NativeOnly
        };

        if self.os.lacks_native_resolver() {
            return fallback;
        }
        if self.force_native_lookup || self.resolv.unknown_opt || self.os == OsFamily::Android {
            return fallback;
        }
        // glibc escapes and IPv6 zone suffixes.
        if hostname.contains(['\\', '%']) {
            return fallback;
        }

        if self.os == OsFamily::OpenBsd {
            return self.openbsd_order(fallback);
        }

        let hostname = hostname.strip_suffix('.').unwrap_or(hostname);
        // RFC 6762: `.local` may be served by mDNS through NSS.
        if has_suffix_fold(hostname, ".local") {
            return fallback;
        }

        let nss = state.nss();
        let sources = nss.hosts();
        match &nss.err {
            None if sources.is_empty() => return self.nss_absent_order(fallback),
            Some(e) if e.is_not_found() => return self.nss_absent_order(fallback),
            Some(_) => return fallback,
            None => {}
        }

        let mut files = false;
        let mut dns = false;
        let mut mdns = false;
        let mut first = None;
        for src in sources {
            match src.kind {
                SourceKind::MyHostname => {
                    if is_localhost(hostname) || is_gateway(hostname) || is_outbound(hostname) {
                        return fallback;
                    }
                    match state.hostname() {
                        Ok(own) if !own.eq_ignore_ascii_case(hostname) => {}
                        Ok(_) => return fallback,
                        Err(e) => {
                            tracing::debug!(error = %e, "Deferring myhostname lookup to native");
                            return fallback;
                        }
                    }
                }
                SourceKind::Files | SourceKind::Dns => {
                    if !src.has_standard_criteria() {
                        return fallback;
                    }
                    if src.kind == SourceKind::Files {
                        files = true;
                    } else {
                        dns = true;
                    }
                    first.get_or_insert(src.kind);
                }
                // `.local` was already sent to the fallback.
                SourceKind::Mdns => mdns = true,
                SourceKind::Other => return fallback,
            }
        }

        // mdns.allow may widen mDNS beyond `.local`; it isn't parsed.
        if mdns && self.has_mdns_allow {
            return fallback;
        }

        match (files, dns) {
            (true, true) if first == Some(SourceKind::Files) => LookupOrder::FilesThenDns,
            (true, true) => LookupOrder::DnsThenFiles,
            (true, false) => LookupOrder::FilesOnly,
            (false, true) => LookupOrder::BuiltinDns,
            (false, false) => fallback,
        }
    }

    /// OpenBSD has no NSS; `resolv.conf`'s `lookup` line decides.
    fn openbsd_order(&self, fallback: LookupOrder) -> LookupOrder {
        // resolv.conf(5): without the file, only "file" is consulted.
        if self.resolv.is_missing() {
            return LookupOrder::FilesOnly;
        }
        let lookup: Vec<&str> = self.resolv.lookup.iter().map(String::as_str).collect();
        match lookup.as_slice() {
            // resolv.conf(5): the default is "bind file".
            [] => LookupOrder::DnsThenFiles,
            ["bind"] => LookupOrder::BuiltinDns,
            ["bind", "file"] => LookupOrder::DnsThenFiles,
            ["file"] => LookupOrder::FilesOnly,
            ["file", "bind"] => LookupOrder::FilesThenDns,
            _ => fallback,
        }
    }

    /// Order when `nsswitch.conf` is missing or lists nothing for `hosts`.
    fn nss_absent_order(&self, fallback: LookupOrder) -> LookupOrder {
        if self.os == OsFamily::Solaris {
            // illumos defaults to "nis [NOTFOUND=return] files".
            fallback
        } else {
            LookupOrder::FilesThenDns
        }
    }
}

/// Names `myhostname` answers as localhost.
fn is_localhost(h: &str) -> bool {
    h.eq_ignore_ascii_case("localhost")
        || h.eq_ignore_ascii_case("localhost.localdomain")
        || has_suffix_fold(h, ".localhost")
        || has_suffix_fold(h, ".localhost.localdomain")
}

fn is_gateway(h: &str) -> bool {
    h.eq_ignore_ascii_case("_gateway")
}

fn is_outbound(h: &str) -> bool {
    h.eq_ignore_ascii_case("_outbound")
}
