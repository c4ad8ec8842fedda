use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::model::MediaItem;
use crate::sanitize::{sanitize_dir_name, sanitize_name};

/// Hash used when none can be inferred from the url.
pub const UNKNOWN_HASH: &str = "unknown";

const IMAGE_HOST: &str = "i.groupimg.com";
const IMAGE_EXTENSIONS: &str = "png|jpeg|jpg|gif|bmp|webp";
const VIDEO_EXTENSIONS: &str = "mp4|mov|wmv|mkv|webm";

static TRAILING_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9A-Za-z]{32})$").expect("valid hash pattern"));

static DEFAULT_RULES: LazyLock<MediaRules> = LazyLock::new(|| {
    MediaRules::new(
        vec![(IMAGE_HOST.to_string(), MediaKind::Image)],
        ExtensionRule::new(IMAGE_EXTENSIONS, ".jpg").expect("valid image pattern"),
        ExtensionRule::new(VIDEO_EXTENSIONS, ".mp4").expect("valid video pattern"),
    )
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

/// Extension lookup for one media kind: a pattern searched in the url and a fallback.
#[derive(Debug, Clone)]
pub struct ExtensionRule {
    pattern: Regex,
    default_extension: String,
}

impl ExtensionRule {
    /// `alternatives` is a `|`-separated list of extensions without dots.
    pub fn new(alternatives: &str, default_extension: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(r"(?i)\.({alternatives})(?:$|[^0-9a-z])"))?;
        Ok(Self {
            pattern,
            default_extension: default_extension.to_string(),
        })
    }

    /// First recognized extension in `url`, lowercased and dotted, or the default.
    pub fn extension_for(&self, url: &str) -> String {
        self.pattern
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| format!(".{}", m.as_str().to_ascii_lowercase()))
            .unwrap_or_else(|| self.default_extension.clone())
    }

    pub fn default_extension(&self) -> &str {
        &self.default_extension
    }
}

/// Classification table: `{host pattern -> kind}` plus an extension rule per kind.
///
/// Hosts absent from the table are treated as video.
#[derive(Debug, Clone)]
pub struct MediaRules {
    hosts: Vec<(String, MediaKind)>,
    image: ExtensionRule,
    video: ExtensionRule,
}

impl Default for MediaRules {
    fn default() -> Self {
        DEFAULT_RULES.clone()
    }
}

impl MediaRules {
    pub fn new(hosts: Vec<(String, MediaKind)>, image: ExtensionRule, video: ExtensionRule) -> Self {
        Self {
            hosts,
            image,
            video,
        }
    }

    /// Same extension rules, different host table.
    pub fn with_hosts(mut self, hosts: Vec<(String, MediaKind)>) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn classify(&self, url: &str) -> MediaKind {
        let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_owned))
        else {
            return MediaKind::Video;
        };
        self.hosts
            .iter()
            .find(|(pattern, _)| host_matches(&host, pattern))
            .map(|(_, kind)| *kind)
            .unwrap_or(MediaKind::Video)
    }

    pub fn extension_rule(&self, kind: MediaKind) -> &ExtensionRule {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Video => &self.video,
        }
    }

    /// Content identity inferred from the url; [`UNKNOWN_HASH`] when nothing matches.
    pub fn media_hash(&self, url: &str, kind: MediaKind) -> String {
        let bare = strip_query(url);
        let hash = match kind {
            MediaKind::Image => TRAILING_HASH
                .captures(bare)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
            MediaKind::Video => last_segment_stem(bare).map(sanitize_name),
        };
        hash.filter(|h| !h.is_empty())
            .unwrap_or_else(|| UNKNOWN_HASH.to_string())
    }

    /// `{user}-{hash}{extension}`
    pub fn file_name(&self, item: &MediaItem) -> String {
        let kind = self.classify(&item.url);
        let hash = self.media_hash(&item.url, kind);
        let extension = self.extension_rule(kind).extension_for(&item.url);
        format!("{}-{}{}", sanitize_name(&item.user), hash, extension)
    }

    /// `{base_dir}/{group_dir}/{user}-{hash}{extension}`
    pub fn resolve_path(&self, base_dir: &Path, group_dir: &str, item: &MediaItem) -> PathBuf {
        base_dir
            .join(sanitize_dir_name(group_dir))
            .join(self.file_name(item))
    }
}

/// Resolves the local path for `item` using the default classification table.
pub fn resolve_path(base_dir: &Path, group_dir: &str, item: &MediaItem) -> PathBuf {
    DEFAULT_RULES.resolve_path(base_dir, group_dir, item)
}

fn host_matches(host: &str, pattern: &str) -> bool {
    host.eq_ignore_ascii_case(pattern)
        || host
            .to_ascii_lowercase()
            .ends_with(&format!(".{}", pattern.to_ascii_lowercase()))
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

fn last_segment_stem(url: &str) -> Option<&str> {
    let segment = url.trim_end_matches('/').rsplit('/').next()?;
    if segment.is_empty() {
        return None;
    }
    match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            Some(stem)
        }
        _ => Some(segment),
    }
}
