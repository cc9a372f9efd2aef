//! Process-wide resolver configuration.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::ResolvConfig;

/// Environment variable carrying the `mode+level` debug setting.
pub const NETDNS_ENV: &str = "NETDNS";

/// Operating system family, as far as resolver behaviour is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    /// Linux and other NSS-based Unixes without special handling.
    Linux,
    /// FreeBSD. Uses NSS like Linux.
    FreeBsd,
    /// macOS and iOS. Direct DNS traffic triggers OS prompts.
    Darwin,
    /// Windows. No libc resolver, no `/etc/hosts`-first lookup.
    Windows,
    /// Plan 9. No libc resolver.
    Plan9,
    /// OpenBSD. No NSS; order comes from `resolv.conf`'s `lookup`.
    OpenBsd,
    /// Solaris and illumos. NSS default is not files-first.
    Solaris,
    /// Android. Always resolves natively.
    Android,
    /// Anything else.
    Other,
}

impl OsFamily {
    /// The family this binary was compiled for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(any(target_os = "macos", target_os = "ios")) {
            Self::Darwin
        } else if cfg!(target_os = "android") {
            Self::Android
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "freebsd") {
            Self::FreeBsd
        } else if cfg!(target_os = "openbsd") {
            Self::OpenBsd
        } else if cfg!(any(target_os = "solaris", target_os = "illumos")) {
            Self::Solaris
        } else if cfg!(windows) {
            Self::Windows
        } else {
            Self::Other
        }
    }

    /// Families with no libc resolver to delegate to.
    #[must_use]
    pub const fn lacks_native_resolver(self) -> bool {
        matches!(self, Self::Windows | Self::Plan9)
    }
}

/// Resolver selected by the debug setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsMode {
    /// `builtin`: use the built-in resolver.
    Builtin,
    /// `native`: use the system resolver.
    Native,
}

/// Parsed `NETDNS` value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugSetting {
    /// Forced resolver, if any.
    pub mode: Option<DnsMode>,
    /// Debug verbosity; `0` is silent.
    pub level: u8,
}

impl DebugSetting {
    /// Parses values such as `1`, `native`, `builtin+2` or `2+native`.
    ///
    /// Unknown mode tokens are ignored.
    ///
    /// ```
    /// use host_lookup_order::{DebugSetting, DnsMode};
    ///
    /// let s = DebugSetting::parse("2+native");
    /// assert_eq!(s.mode, Some(DnsMode::Native));
    /// assert_eq!(s.level, 2);
    /// ```
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let mut setting = Self::default();
        let parts = value
            .split_once('+')
            .map_or([value, ""], |(a, b)| [a, b]);
        for part in parts {
            if part.is_empty() {
                continue;
            }
            if part.as_bytes()[0].is_ascii_digit() {
                setting.level = part
                    .bytes()
                    .take_while(u8::is_ascii_digit)
                    .fold(0u8, |n, d| n.saturating_mul(10).saturating_add(d - b'0'));
            } else {
                match part {
                    "builtin" => setting.mode = Some(DnsMode::Builtin),
                    "native" => setting.mode = Some(DnsMode::Native),
                    _ => tracing::debug!(mode = part, "Ignoring unknown NETDNS mode"),
                }
            }
        }
        setting
    }
}

/// Locations of the files consulted during bootstrap.
#[derive(Debug, Clone)]
pub struct SystemPaths {
    /// `resolv.conf`.
    pub resolv_conf: PathBuf,
    /// mDNS allow-list; only its existence matters.
    pub mdns_allow: PathBuf,
}

impl Default for SystemPaths {
    fn default() -> Self {
        Self::with_dir("/etc")
    }
}

impl SystemPaths {
    /// Uses `resolv.conf` and `mdns.allow` under `dir` (useful for testing).
    #[must_use]
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            resolv_conf: dir.join("resolv.conf"),
            mdns_allow: dir.join("mdns.allow"),
        }
    }
}

/// The machine's resolver configuration.
///
/// Produced once per process by [`system_config`]; tests and embedders may
/// assemble their own with [`SystemConfig::new`] or [`SystemConfig::probe`].
#[derive(Debug)]
pub struct SystemConfig {
    /// Platform family.
    pub os: OsFamily,

    /// Always resolve natively, whatever NSS says.
    pub force_native_lookup: bool,

    /// Built-in resolver forced by build feature or `NETDNS=builtin`.
    pub builtin: bool,

    /// Native resolver forced by build feature or `NETDNS=native`.
    pub native: bool,

    /// An mDNS allow-list file exists.
    pub has_mdns_allow: bool,

    /// `NETDNS` debug level.
    pub debug_level: u8,

    /// `resolv.conf` as read at bootstrap. Left at its defaults on
    /// platforms that return before reading it.
    pub resolv: ResolvConfig,
}

static SYSTEM_CONFIG: OnceLock<SystemConfig> = OnceLock::new();

/// Returns the process-wide configuration, probing the system on first use.
///
/// Environment and file reads happen once; every later call returns the same
/// reference.
pub fn system_config() -> &'static SystemConfig {
    SYSTEM_CONFIG.get_or_init(|| {
        SystemConfig::probe(OsFamily::current(), &SystemPaths::default(), |key| {
            std::env::var_os(key)
        })
    })
}

impl SystemConfig {
    /// Creates a configuration with nothing forced and default `resolv.conf`
    /// values.
    #[must_use]
    pub fn new(os: OsFamily) -> Self {
        Self {
            os,
            force_native_lookup: false,
            builtin: false,
            native: false,
            has_mdns_allow: false,
            debug_level: 0,
            resolv: ResolvConfig::default(),
        }
    }

    /// Overrides the `resolv.conf` snapshot.
    #[must_use]
    pub fn with_resolv(mut self, resolv: ResolvConfig) -> Self {
        self.resolv = resolv;
        self
    }

    /// Inspects the environment and filesystem the way libc would.
    ///
    /// `env` looks up environment variables; a variable that is set to the
    /// empty string must return `Some("")`.
    #[must_use]
    pub fn probe<F>(os: OsFamily, paths: &SystemPaths, env: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let setting = env(NETDNS_ENV)
            .map(|v| DebugSetting::parse(&v.to_string_lossy()))
            .unwrap_or_default();

        let mut conf = Self::new(os);
        conf.debug_level = setting.level;
        conf.builtin = cfg!(feature = "force-builtin") || setting.mode == Some(DnsMode::Builtin);
        conf.native = cfg!(feature = "force-native") || setting.mode == Some(DnsMode::Native);
        if !conf.builtin && !conf.native && os.lacks_native_resolver() {
            // "Native" on these platforms means the OS API, not libc.
            conf.native = true;
        }

        conf.probe_files(paths, &env);

        if conf.debug_level > 0 {
            conf.log_mode();
        }
        conf
    }

    fn probe_files(&mut self, paths: &SystemPaths, env: &dyn Fn(&str) -> Option<OsString>) {
        // Resolving directly pops up permission dialogs on Darwin.
        if self.os == OsFamily::Darwin {
            self.force_native_lookup = true;
            return;
        }
        if self.os.lacks_native_resolver() {
            return;
        }

        let non_empty = |key: &str| env(key).is_some_and(|v| !v.is_empty());
        // LOCALDOMAIN changes libc behaviour even when empty.
        if non_empty("RES_OPTIONS")
            || non_empty("HOSTALIASES")
            || self.native
            || env("LOCALDOMAIN").is_some()
        {
            self.force_native_lookup = true;
            return;
        }

        if self.os == OsFamily::OpenBsd && non_empty("ASR_CONFIG") {
            self.force_native_lookup = true;
            return;
        }

        self.apply_resolv(ResolvConfig::read(&paths.resolv_conf), &paths.resolv_conf);
        self.has_mdns_allow = paths.mdns_allow.exists();
    }

    /// Stores a `resolv.conf` snapshot. A missing or permission-denied file
    /// is tolerated; any other read error defers to the native resolver.
    fn apply_resolv(&mut self, resolv: ResolvConfig, path: &Path) {
        if let Some(err) = &resolv.err {
            if !err.is_not_found() && !err.is_permission_denied() {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Unreadable resolv.conf, deferring to the native resolver"
                );
                self.force_native_lookup = true;
            }
        }
        self.resolv = resolv;
    }

    fn log_mode(&self) {
        if self.debug_level > 1 {
            tracing::debug!(native = self.native, builtin = self.builtin, "Resolver overrides");
        }
        if self.builtin {
            tracing::debug!("Using the built-in DNS resolver");
        } else if self.force_native_lookup {
            tracing::debug!("Using the native DNS resolver");
        } else {
            tracing::debug!("Dynamic selection of DNS resolver");
        }
    }
}
