//! Site content served through the resilience layer.
//!
//! Store-backed sections (call to action, about hero, team) go through the
//! `Executor`; API-backed sections (stats, events, impact) go through the
//! `Fetcher` and a `DataLoader`. Every section has a built-in default so a
//! request for content always has something to show.

pub mod remote;
pub mod sections;
pub mod service;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

pub use remote::RemoteContent;
pub use sections::{
    fallback_stats, AboutHero, CtaSection, EventsSection, ImpactSection, StatItem, TeamMember,
    TeamSection, TeamSettings,
};
pub use service::ContentService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Cta,
    AboutHero,
    Team,
    Stats,
    Events,
    Impact,
}

impl SectionKind {
    pub const ALL: [SectionKind; 6] = [
        SectionKind::Cta,
        SectionKind::AboutHero,
        SectionKind::Team,
        SectionKind::Stats,
        SectionKind::Events,
        SectionKind::Impact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Cta => "cta",
            SectionKind::AboutHero => "about-hero",
            SectionKind::Team => "team",
            SectionKind::Stats => "stats",
            SectionKind::Events => "events",
            SectionKind::Impact => "impact",
        }
    }

    /// The section's built-in default.
    pub fn fallback(&self) -> Section {
        match self {
            SectionKind::Cta => Section::Cta(CtaSection::default()),
            SectionKind::AboutHero => Section::AboutHero(AboutHero::default()),
            SectionKind::Team => Section::Team(TeamSection::default()),
            SectionKind::Stats => Section::Stats(fallback_stats()),
            SectionKind::Events => Section::Events(EventsSection::default()),
            SectionKind::Impact => Section::Impact(ImpactSection::default()),
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        SectionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                let names: Vec<&str> = SectionKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown section '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// One section of site content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum Section {
    Cta(CtaSection),
    AboutHero(AboutHero),
    Team(TeamSection),
    Stats(Vec<StatItem>),
    Events(EventsSection),
    Impact(ImpactSection),
}

impl Section {
    pub fn kind(&self) -> SectionKind {
        match self {
            Section::Cta(_) => SectionKind::Cta,
            Section::AboutHero(_) => SectionKind::AboutHero,
            Section::Team(_) => SectionKind::Team,
            Section::Stats(_) => SectionKind::Stats,
            Section::Events(_) => SectionKind::Events,
            Section::Impact(_) => SectionKind::Impact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("cta".parse::<SectionKind>(), Ok(SectionKind::Cta));
        assert_eq!("About_Hero".parse::<SectionKind>(), Ok(SectionKind::AboutHero));
        let err = "footer".parse::<SectionKind>().unwrap_err();
        assert!(err.contains("expected one of: cta, about-hero, team, stats, events, impact"));
    }

    #[test]
    fn test_fallback_matches_kind() {
        for kind in SectionKind::ALL {
            assert_eq!(kind.fallback().kind(), kind);
            assert_eq!(kind.to_string().parse::<SectionKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_section_serializes_tagged() {
        let value = serde_json::to_value(SectionKind::AboutHero.fallback()).unwrap();
        assert_eq!(value["kind"], "about-hero");
        assert_eq!(value["data"]["ctaUrl"], "/about");
    }
}
