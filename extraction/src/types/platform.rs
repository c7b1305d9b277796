//! The closed social-media platform enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Platforms recognized by the social link extractor (C8).
///
/// This is a closed set: `social_media` map keys are drawn from here only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialPlatform {
    Facebook,
    Twitter,
    LinkedIn,
    Instagram,
    YouTube,
    TikTok,
    GitHub,
    Pinterest,
    Medium,
    Reddit,
    Discord,
    Twitch,
    Vimeo,
    Threads,
    Mastodon,
}

impl SocialPlatform {
    /// All platforms, in the order used to break ties in the host table.
    pub const ALL: &'static [SocialPlatform] = &[
        SocialPlatform::Facebook,
        SocialPlatform::Twitter,
        SocialPlatform::LinkedIn,
        SocialPlatform::Instagram,
        SocialPlatform::YouTube,
        SocialPlatform::TikTok,
        SocialPlatform::GitHub,
        SocialPlatform::Pinterest,
        SocialPlatform::Medium,
        SocialPlatform::Reddit,
        SocialPlatform::Discord,
        SocialPlatform::Twitch,
        SocialPlatform::Vimeo,
        SocialPlatform::Threads,
        SocialPlatform::Mastodon,
    ];

    /// Hosts (suffix-matched) that identify this platform.
    pub fn hosts(self) -> &'static [&'static str] {
        match self {
            SocialPlatform::Facebook => &["facebook.com", "fb.com"],
            SocialPlatform::Twitter => &["twitter.com", "x.com"],
            SocialPlatform::LinkedIn => &["linkedin.com"],
            SocialPlatform::Instagram => &["instagram.com"],
            SocialPlatform::YouTube => &["youtube.com", "youtu.be"],
            SocialPlatform::TikTok => &["tiktok.com"],
            SocialPlatform::GitHub => &["github.com"],
            SocialPlatform::Pinterest => &["pinterest.com"],
            SocialPlatform::Medium => &["medium.com"],
            SocialPlatform::Reddit => &["reddit.com"],
            SocialPlatform::Discord => &["discord.com", "discord.gg"],
            SocialPlatform::Twitch => &["twitch.tv"],
            SocialPlatform::Vimeo => &["vimeo.com"],
            SocialPlatform::Threads => &["threads.net"],
            SocialPlatform::Mastodon => &["mastodon.social"],
        }
    }

    /// Resolve a host to a platform, matching exact host or `www.`-stripped suffix.
    pub fn from_host(host: &str) -> Option<SocialPlatform> {
        let host = host.trim_start_matches("www.");
        SocialPlatform::ALL
            .iter()
            .copied()
            .find(|p| p.hosts().iter().any(|h| host == *h || host.ends_with(&format!(".{h}"))))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SocialPlatform::Facebook => "facebook",
            SocialPlatform::Twitter => "twitter",
            SocialPlatform::LinkedIn => "linkedin",
            SocialPlatform::Instagram => "instagram",
            SocialPlatform::YouTube => "youtube",
            SocialPlatform::TikTok => "tiktok",
            SocialPlatform::GitHub => "github",
            SocialPlatform::Pinterest => "pinterest",
            SocialPlatform::Medium => "medium",
            SocialPlatform::Reddit => "reddit",
            SocialPlatform::Discord => "discord",
            SocialPlatform::Twitch => "twitch",
            SocialPlatform::Vimeo => "vimeo",
            SocialPlatform::Threads => "threads",
            SocialPlatform::Mastodon => "mastodon",
        }
    }
}

impl fmt::Display for SocialPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
