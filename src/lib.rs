//! # host-lookup-order
//!
//! Decide whether a hostname lookup should go through a built-in DNS
//! resolver or be handed to the system resolver (libc and NSS).
//!
//! A built-in resolver is only safe when it can reproduce what libc would
//! have done. This crate reads the same configuration libc reads
//! (`/etc/resolv.conf`, `/etc/nsswitch.conf`, resolver environment
//! variables, platform quirks) and answers with a [`LookupOrder`]. It never
//! sends a query itself.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use host_lookup_order::{LookupOrder, lookup_order};
//!
//! match lookup_order("example.com") {
//!     LookupOrder::NativeOnly => { /* call getaddrinfo */ }
//!     LookupOrder::FilesThenDns => { /* /etc/hosts, then DNS */ }
//!     other => println!("lookup order: {other}"),
//! }
//! ```
//!
//! ## Configuration
//!
//! The system is probed once per process by [`system_config`]. Two knobs
//! override what it finds:
//!
//! - `NETDNS=builtin` / `NETDNS=native` (optionally `+N` or `N+` for a debug
//!   level, e.g. `native+2`). Debug output goes through `tracing`.
//! - The `force-builtin` / `force-native` cargo features.
//!
//! `nsswitch.conf` is cached and re-checked at most every few seconds; see
//! [`nss_cache`].
//!
//! ## Testing
//!
//! [`SystemConfig::host_lookup_order_with`] takes the NSS snapshot and the
//! machine hostname through [`SystemState`], so decisions can be checked
//! without touching `/etc`.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod nss;
pub mod nss_cache;
pub mod order;
pub mod system;
pub mod util;

pub use config::ResolvConfig;
pub use error::{ConfError, Result};
pub use nss::{Criterion, NssConf, NssSource, SourceKind};
pub use nss_cache::{NssCache, set_system_nss, system_nss};
pub use order::{LiveSystem, LookupOrder, SystemState, lookup_order};
pub use system::{DebugSetting, DnsMode, OsFamily, SystemConfig, SystemPaths, system_config};
