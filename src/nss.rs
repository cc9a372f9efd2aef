//! `nsswitch.conf` model and parser.

use std::collections::HashMap;
use std::path::Path;
use std::time::SystemTime;

use crate::error::ConfError;

/// What kind of source an `nsswitch.conf` entry names.
///
/// Computed once at parse time so the decision engine matches on a tag
/// instead of re-inspecting the raw token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `files` (`/etc/hosts`).
    Files,
    /// `dns`.
    Dns,
    /// systemd's `myhostname`.
    MyHostname,
    /// Any name starting with `mdns` (`mdns4_minimal`, `mdns6`, ...).
    Mdns,
    /// Anything else (`nis`, `resolve`, `wins`, ...).
    Other,
}

impl SourceKind {
    fn classify(name: &str) -> Self {
        match name {
            "files" => Self::Files,
            "dns" => Self::Dns,
            "myhostname" => Self::MyHostname,
            _ if name.starts_with("mdns") => Self::Mdns,
            _ => Self::Other,
        }
    }
}

/// One `[STATUS=action]` item, lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criterion {
    /// Written as `!STATUS=action`.
    pub negate: bool,
    /// `success`, `notfound`, `unavail`, `tryagain`, or unknown.
    pub status: String,
    /// `return`, `continue`, `merge`, ...
    pub action: String,
}

impl Criterion {
    /// Whether this criterion restates glibc's default action for its status.
    ///
    /// The last criterion of a block may also say `return`, which glibc
    /// treats identically to falling through to the next source.
    fn is_standard(&self, last: bool) -> bool {
        if self.negate {
            return false;
        }
        let default = match self.status.as_str() {
            "success" => "return",
            "notfound" | "unavail" | "tryagain" => "continue",
            _ => return false,
        };
        (last && self.action == "return") || self.action == default
    }
}

/// A source listed for a database, with its bracketed criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NssSource {
    /// Raw source name.
    pub name: String,
    /// Classified name.
    pub kind: SourceKind,
    /// Criteria immediately following the name, possibly empty.
    pub criteria: Vec<Criterion>,
}

impl NssSource {
    /// Creates a source with no criteria.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: SourceKind::classify(&name),
            name,
            criteria: Vec::new(),
        }
    }

    /// Returns `true` if every criterion matches glibc's defaults, so the
    /// source behaves as if it had none.
    #[must_use]
    pub fn has_standard_criteria(&self) -> bool {
        let last = self.criteria.len().saturating_sub(1);
        self.criteria
            .iter()
            .enumerate()
            .all(|(i, c)| c.is_standard(i == last))
    }
}

/// Parsed `nsswitch.conf`.
#[derive(Debug, Default)]
pub struct NssConf {
    /// Sources per database, in file order.
    pub sources: HashMap<String, Vec<NssSource>>,
    /// Why the file could not be read or parsed, if it could not.
    pub err: Option<ConfError>,
    /// Modification time of the file this was parsed from.
    pub mtime: Option<SystemTime>,
}

impl NssConf {
    /// Reads and parses the file at `path`.
    ///
    /// A missing file yields an `Io(NotFound)` error, not a parse failure.
    #[must_use]
    pub fn read(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mtime = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        let mut conf = match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) => Self {
                err: Some(ConfError::Io(e)),
                ..Self::default()
            },
        };
        conf.mtime = mtime;
        if let Some(err) = conf.err.as_ref().filter(|e| !e.is_not_found()) {
            tracing::warn!(path = %path.display(), error = %err, "Failed to load nsswitch.conf");
        }
        conf
    }

    /// Parses `nsswitch.conf` content.
    ///
    /// Parsing stops at the first malformed line; sources collected before
    /// it are kept and `err` is set.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut conf = Self::default();
        for (idx, raw) in content.lines().enumerate() {
            let line = raw.split_once('#').map_or(raw, |(before, _)| before).trim();
            if line.is_empty() {
                continue;
            }
            let Some((db, rest)) = line.split_once(':') else {
                conf.err = Some(ConfError::parse(idx + 1, "no colon on line"));
                return conf;
            };
            let sources = conf.sources.entry(db.trim().to_owned()).or_default();
            if let Err(reason) = parse_sources(rest, sources) {
                conf.err = Some(ConfError::parse(idx + 1, reason));
                return conf;
            }
        }
        conf
    }

    /// Sources for the `hosts` database, empty if none were listed.
    #[must_use]
    pub fn hosts(&self) -> &[NssSource] {
        self.sources.get("hosts").map_or(&[], Vec::as_slice)
    }
}

fn parse_sources(mut rest: &str, out: &mut Vec<NssSource>) -> Result<(), String> {
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(());
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let mut source = NssSource::new(&rest[..end]);
        rest = rest[end..].trim_start();

        if let Some(block) = rest.strip_prefix('[') {
            let Some((inner, after)) = block.split_once(']') else {
                return Err("unclosed criterion bracket".to_owned());
            };
            source.criteria = parse_criteria(inner)?;
            rest = after;
        }
        out.push(source);
    }
}

fn parse_criteria(block: &str) -> Result<Vec<Criterion>, String> {
    block
        .split_whitespace()
        .map(|field| {
            let (negate, field) = field
                .strip_prefix('!')
                .map_or((false, field), |f| (true, f));
            match field.split_once('=') {
                Some((status, action)) if field.len() >= 3 => Ok(Criterion {
                    negate,
                    status: status.to_ascii_lowercase(),
                    action: action.to_ascii_lowercase(),
                }),
                _ => Err(format!("invalid criteria: {block}")),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(srcs: &[NssSource]) -> Vec<&str> {
        srcs.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn ubuntu_avahi_line() {
        let conf = NssConf::parse("hosts: files mdns4_minimal [NOTFOUND=return] dns mdns4\n");
        assert!(conf.err.is_none());
        let hosts = conf.hosts();
        assert_eq!(names(hosts), vec!["files", "mdns4_minimal", "dns", "mdns4"]);
        assert_eq!(hosts[1].kind, SourceKind::Mdns);
        assert_eq!(
            hosts[1].criteria,
            vec![Criterion {
                negate: false,
                status: "notfound".to_owned(),
                action: "return".to_owned(),
            }]
        );
        assert!(hosts[0].criteria.is_empty());
    }

    #[test]
    fn comments_blank_lines_and_other_databases() {
        let conf = NssConf::parse(
            "# /etc/nsswitch.conf\n\npasswd:  files systemd\nhosts:   files dns # trailing\n",
        );
        assert!(conf.err.is_none());
        assert_eq!(names(conf.hosts()), vec!["files", "dns"]);
        assert_eq!(names(&conf.sources["passwd"]), vec!["files", "systemd"]);
    }

    #[test]
    fn classifies_sources() {
        let conf = NssConf::parse("hosts: files myhostname mdns dns resolve\n");
        let kinds: Vec<_> = conf.hosts().iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SourceKind::Files,
                SourceKind::MyHostname,
                SourceKind::Mdns,
                SourceKind::Dns,
                SourceKind::Other,
            ]
        );
    }

    #[test]
    fn missing_colon_is_error() {
        let conf = NssConf::parse("hosts files dns\n");
        assert!(matches!(conf.err, Some(ConfError::Parse { line: 1, .. })));
    }

    #[test]
    fn unclosed_bracket_is_error() {
        let conf = NssConf::parse("hosts: dns [NOTFOUND=return\n");
        assert!(matches!(conf.err, Some(ConfError::Parse { .. })));
    }

    #[test]
    fn bad_criterion_is_error() {
        let conf = NssConf::parse("hosts: dns [return]\n");
        assert!(matches!(conf.err, Some(ConfError::Parse { .. })));
    }

    #[test]
    fn negated_criterion() {
        let conf = NssConf::parse("hosts: dns [!UNAVAIL=return] files\n");
        let dns = &conf.hosts()[0];
        assert!(dns.criteria[0].negate);
        assert!(!dns.has_standard_criteria());
    }

    #[test]
    fn standard_criteria() {
        let conf = NssConf::parse(
            "hosts: dns [success=return notfound=continue unavail=continue tryagain=continue] \
             files [notfound=return]\n",
        );
        assert!(conf.hosts().iter().all(NssSource::has_standard_criteria));

        // `return` is only tolerated on the last criterion.
        let conf = NssConf::parse("hosts: dns [notfound=return unavail=continue]\n");
        assert!(!conf.hosts()[0].has_standard_criteria());

        let conf = NssConf::parse("hosts: files [success=continue]\n");
        assert!(!conf.hosts()[0].has_standard_criteria());

        let conf = NssConf::parse("hosts: files [bogus=continue]\n");
        assert!(!conf.hosts()[0].has_standard_criteria());

        assert!(NssSource::new("dns").has_standard_criteria());
    }

    #[test]
    fn empty_file_has_no_hosts() {
        let conf = NssConf::parse("");
        assert!(conf.err.is_none());
        assert!(conf.hosts().is_empty());
    }

    #[test]
    fn read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let conf = NssConf::read(dir.path().join("nsswitch.conf"));
        assert!(conf.err.as_ref().is_some_and(ConfError::is_not_found));
        assert!(conf.mtime.is_none());
    }

    #[test]
    fn read_records_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nsswitch.conf");
        std::fs::write(&path, "hosts: dns files\n").unwrap();

        let conf = NssConf::read(&path);
        assert!(conf.err.is_none());
        assert!(conf.mtime.is_some());
        assert_eq!(names(conf.hosts()), vec!["dns", "files"]);
    }
}
