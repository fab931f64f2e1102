//! Typed site content. Each section's `Default` is the content served when
//! the store or API cannot provide it.

use serde::{Deserialize, Serialize};

// ===== Call to action =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CtaButton {
    pub text: String,
    pub url: String,
    #[serde(default)]
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtaAnimation {
    pub title: String,
    pub description: String,
    pub buttons: String,
}

impl Default for CtaAnimation {
    fn default() -> Self {
        Self {
            title: "fadeIn".into(),
            description: "fadeIn".into(),
            buttons: "fadeIn".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CtaSection {
    pub id: String,
    pub title: String,
    pub description: String,
    pub primary_button: CtaButton,
    pub secondary_button: CtaButton,
    pub background_style: String,
    pub gradient_from: String,
    pub gradient_to: String,
    pub text_color: String,
    pub enabled: bool,
    #[serde(default)]
    pub animation: CtaAnimation,
}

impl Default for CtaSection {
    fn default() -> Self {
        Self {
            id: "main-cta".into(),
            title: "Transform Lives Through Education".into(),
            description: "Join us in making a difference. Your support helps provide quality \
                          education to underprivileged children."
                .into(),
            primary_button: CtaButton {
                text: "Donate Now".into(),
                url: "/donate".into(),
                style: "bg-blue-600 hover:bg-blue-700 text-white".into(),
            },
            secondary_button: CtaButton {
                text: "Learn More".into(),
                url: "/about".into(),
                style: "bg-transparent border-2 border-white text-white hover:bg-white hover:text-blue-600"
                    .into(),
            },
            background_style: "gradient".into(),
            gradient_from: "#3b82f6".into(),
            gradient_to: "#8b5cf6".into(),
            text_color: "#ffffff".into(),
            enabled: true,
            animation: CtaAnimation::default(),
        }
    }
}

// ===== About =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutHero {
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub cta_text: String,
    #[serde(default)]
    pub cta_url: String,
}

impl Default for AboutHero {
    fn default() -> Self {
        Self {
            title: "About Our Organization".into(),
            subtitle: "Making a difference in communities worldwide".into(),
            description: "We are dedicated to creating positive change through innovative \
                          solutions and community engagement."
                .into(),
            image_url: "/images/about-hero-default.jpg".into(),
            cta_text: "Learn More".into(),
            cta_url: "/about".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub role: String,
    pub bio: String,
    pub image_url: String,
    pub social_links: Vec<SocialLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamSettings {
    pub title: String,
    pub subtitle: String,
    pub description: String,
}

impl TeamSettings {
    pub fn fallback() -> Self {
        Self {
            title: "Our Leadership Team".into(),
            subtitle: "Meet the people leading our mission".into(),
            description: "Our dedicated team brings diverse expertise and passion to drive \
                          positive change in communities worldwide."
                .into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSection {
    #[serde(default)]
    pub section_settings: TeamSettings,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

impl TeamSection {
    /// What a freshly created team document holds.
    pub fn empty() -> Self {
        Self {
            section_settings: TeamSettings::default(),
            members: Vec::new(),
        }
    }
}

impl Default for TeamSection {
    fn default() -> Self {
        let member = |id: &str, name: &str, role: &str, bio: &str, image: &str| TeamMember {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            bio: bio.into(),
            image_url: image.into(),
            social_links: Vec::new(),
        };
        Self {
            section_settings: TeamSettings::fallback(),
            members: vec![
                member(
                    "1",
                    "John Smith",
                    "Chief Executive Officer",
                    "Leading our organization with over 15 years of nonprofit experience.",
                    "/images/team/default-ceo.jpg",
                ),
                member(
                    "2",
                    "Sarah Johnson",
                    "Director of Operations",
                    "Ensuring our programs run efficiently and effectively.",
                    "/images/team/default-director.jpg",
                ),
            ],
        }
    }
}

// ===== Stats =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatItem {
    pub id: String,
    pub value: f64,
    pub label: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

pub fn fallback_stats() -> Vec<StatItem> {
    let stat = |id: &str, value: f64, label: &str, icon: &str, suffix: Option<&str>| StatItem {
        id: id.into(),
        value,
        label: label.into(),
        icon: icon.into(),
        prefix: None,
        suffix: suffix.map(Into::into),
        decimals: None,
    };
    vec![
        stat("1", 5000.0, "People Helped", "👥", Some("+")),
        stat("2", 150.0, "Active Volunteers", "🤝", Some("+")),
        stat("3", 25.0, "Successful Projects", "🏆", Some("+")),
        stat("4", 10.0, "Years of Service", "📅", None),
    ]
}

// ===== Events =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSettings {
    pub section_visible: bool,
    pub section_title: String,
    #[serde(default)]
    pub section_subtitle: String,
    #[serde(default)]
    pub background_gradient: String,
    #[serde(default)]
    pub show_only_featured: bool,
    /// 0 shows every event.
    #[serde(default)]
    pub max_events_to_show: usize,
    #[serde(default)]
    pub show_view_all_button: bool,
    #[serde(default)]
    pub view_all_button_text: String,
    #[serde(default)]
    pub view_all_button_link: String,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            section_visible: true,
            section_title: "Upcoming Events".into(),
            section_subtitle: "Join us in making a difference".into(),
            background_gradient: "from-blue-50 to-purple-50".into(),
            show_only_featured: false,
            max_events_to_show: 3,
            show_view_all_button: true,
            view_all_button_text: "View All Events".into(),
            view_all_button_link: "/events".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: u64,
    pub title: String,
    pub date: String,
    pub time: String,
    pub location: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub registrations: u32,
    #[serde(default)]
    pub max_capacity: u32,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsSection {
    pub section_settings: EventSettings,
    pub events: Vec<Event>,
}

impl EventsSection {
    /// Events to display: visible ones, featured only if configured, capped
    /// at `max_events_to_show`. Empty when the section is hidden.
    pub fn displayed_events(&self) -> Vec<&Event> {
        let settings = &self.section_settings;
        if !settings.section_visible {
            return Vec::new();
        }
        let events = self
            .events
            .iter()
            .filter(|e| e.visible)
            .filter(|e| !settings.show_only_featured || e.featured);
        if settings.max_events_to_show > 0 {
            events.take(settings.max_events_to_show).collect()
        } else {
            events.collect()
        }
    }
}

impl Default for EventsSection {
    fn default() -> Self {
        #[allow(clippy::too_many_arguments)]
        fn event(
            id: u64,
            title: &str,
            date: &str,
            time: &str,
            location: &str,
            image: &str,
            description: &str,
            registrations: u32,
            max_capacity: u32,
            category: &str,
        ) -> Event {
            Event {
                id,
                title: title.into(),
                date: date.into(),
                time: time.into(),
                location: location.into(),
                image: image.into(),
                description: description.into(),
                featured: true,
                visible: true,
                registrations,
                max_capacity,
                category: category.into(),
            }
        }

        Self {
            section_settings: EventSettings::default(),
            events: vec![
                event(
                    1,
                    "Community Health Camp",
                    "2025-01-15",
                    "09:00 AM",
                    "Chennai, Tamil Nadu",
                    "https://images.unsplash.com/photo-1576091160399-112ba8d25d1d?w=800",
                    "Free health checkup and medical consultation for underprivileged communities",
                    45,
                    100,
                    "Healthcare",
                ),
                event(
                    2,
                    "Education Drive 2025",
                    "2025-01-20",
                    "10:00 AM",
                    "Coimbatore, Tamil Nadu",
                    "https://images.unsplash.com/photo-1503676260728-1c00da094a0b?w=800",
                    "Distribution of educational materials and scholarship program launch",
                    78,
                    150,
                    "Education",
                ),
                event(
                    3,
                    "Tree Plantation Campaign",
                    "2025-01-25",
                    "07:00 AM",
                    "Madurai, Tamil Nadu",
                    "https://images.unsplash.com/photo-1542601906990-b4d3fb778b09?w=800",
                    "Join our mission to plant 1000 trees for a greener future",
                    120,
                    200,
                    "Environment",
                ),
            ],
        }
    }
}

// ===== Impact =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactStat {
    pub id: String,
    pub icon: String,
    pub number: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub year: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactCta {
    pub title: String,
    pub description: String,
    pub button_text: String,
    pub button_link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactSection {
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stats: Vec<ImpactStat>,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    pub cta: Option<ImpactCta>,
}

impl Default for ImpactSection {
    fn default() -> Self {
        let stat = |id: &str, icon: &str, number: &str, label: &str, description: &str, color: &str| {
            ImpactStat {
                id: id.into(),
                icon: icon.into(),
                number: number.into(),
                label: label.into(),
                description: description.into(),
                color: color.into(),
            }
        };
        let achievement =
            |id: &str, title: &str, description: &str, image: &str, category: &str, year: &str| Achievement {
                id: id.into(),
                title: title.into(),
                description: description.into(),
                image: image.into(),
                category: category.into(),
                year: year.into(),
            };

        Self {
            title: "Our Impact Across Tamil Nadu".into(),
            subtitle: "TRANSFORMING LIVES TOGETHER".into(),
            description: "Through dedication and your generous support, Bharat Samarth Trust is \
                          making a real difference in communities across Tamil Nadu. Our impact \
                          spans education, healthcare, and social welfare with measurable results."
                .into(),
            stats: vec![
                stat("1", "👥", "50,000+", "Lives Impacted", "Across Tamil Nadu", "blue"),
                stat("2", "🏫", "50+", "Schools Supported", "With Educational Resources", "green"),
                stat("3", "🏥", "25,000+", "Patients Served", "Through Medical Camps", "red"),
                stat("4", "🌳", "50,000+", "Trees Planted", "For Sustainable Future", "amber"),
            ],
            achievements: vec![
                achievement(
                    "1",
                    "Priya's Education Journey",
                    "From a small village in Madurai to becoming the first female engineer in \
                     her community, Priya's success story exemplifies the transformative power \
                     of our education scholarship program.",
                    "https://images.unsplash.com/photo-1503676260728-1c00da094a0b?w=800",
                    "Education",
                    "2024",
                ),
                achievement(
                    "2",
                    "Theni Village Healthcare",
                    "A village transformed by our mobile medical units. Disease rates have \
                     dropped by 60%, while healthcare accessibility has improved dramatically \
                     for 2,000+ families.",
                    "https://images.unsplash.com/photo-1576091160399-112ba8d25d1d?w=800",
                    "Healthcare",
                    "2023",
                ),
                achievement(
                    "3",
                    "Women Empowerment Success",
                    "500+ women across Tamil Nadu gained financial independence through our \
                     vocational training programs in tailoring, handicrafts, and \
                     entrepreneurship.",
                    "https://images.unsplash.com/photo-1573497491208-6b1acb260507?w=800",
                    "Social Welfare",
                    "2023",
                ),
            ],
            cta: Some(ImpactCta {
                title: "Join Our Mission".into(),
                description: "Together, we can create lasting change in more communities".into(),
                button_text: "Get Involved".into(),
                button_link: "/volunteer".into(),
            }),
        }
    }
}
