//! Typed seed records.
//!
//! One struct per managed content type plus the components they embed.
//! Field names follow the store's camelCase attribute names; unknown fields
//! are rejected at parse time so a typo in the dataset fails loudly instead
//! of being silently dropped.
//!
//! Length limits mirror the hosted store's component schema. Checking them
//! here means a bad dataset is reported in full before the first write.

use std::fmt;
use std::str::FromStr;

use cms_seed_store::ContentType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::check::Checker;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Layout of a [`Section`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Hero,
    Features,
    Cta,
    Testimonials,
    Faq,
    Stats,
    Content,
    Pricing,
    Logos,
    Process,
    Comparison,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CtaStyle {
    #[default]
    Primary,
    Secondary,
    Ghost,
    Destructive,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundStyle {
    #[default]
    Light,
    Dark,
    Brand,
    Gradient,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementStyle {
    #[default]
    Info,
    Success,
    Warning,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Linkedin,
    Twitter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKey {
    Essential,
    Professional,
}

/// Icon shown next to a [`Feature`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureIcon {
    Checkmark,
    Shield,
    Clock,
    Users,
    Chart,
    Star,
    Lock,
    Globe,
    Briefcase,
    Award,
    TrendingUp,
    FileCheck,
    MessageCircle,
    Zap,
    Target,
    Layers,
}

/// Content locale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocaleCode {
    #[default]
    #[serde(rename = "fr")]
    Fr,
    #[serde(rename = "en-GB")]
    EnGb,
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "de")]
    De,
    #[serde(rename = "it")]
    It,
    #[serde(rename = "es")]
    Es,
}

impl LocaleCode {
    pub const ALL: [Self; 6] = [Self::Fr, Self::EnGb, Self::EnUs, Self::De, Self::It, Self::Es];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fr => "fr",
            Self::EnGb => "en-GB",
            Self::EnUs => "en-US",
            Self::De => "de",
            Self::It => "it",
            Self::Es => "es",
        }
    }
}

impl fmt::Display for LocaleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocaleCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|c| c.as_str()).collect();
                format!("unknown locale '{s}'. Use one of: {}", known.join(", "))
            })
    }
}

const fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// SeedEntity
// ---------------------------------------------------------------------------

/// A seed record that maps onto one store document.
pub trait SeedEntity: Serialize {
    /// Store content type the record is written to.
    const KIND: ContentType;

    /// Value of the natural key, `None` for single types.
    fn natural_key(&self) -> Option<&str>;

    /// Store attributes for this record. Optional fields that are unset are
    /// omitted, so an update never clears what the dataset does not mention.
    ///
    /// # Errors
    /// Returns an error if the record does not serialize to a JSON object.
    fn payload(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                "expected an object, got {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// SiteSettings
// ---------------------------------------------------------------------------

/// Global site configuration (single type).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SiteSettings {
    pub site_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_meta_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announcement_bar: Option<AnnouncementBar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub social_links: Vec<SocialLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available_locales: Vec<LocaleConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AnnouncementBar {
    #[serde(default)]
    pub enabled: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_label: Option<String>,
    #[serde(default)]
    pub style: AnnouncementStyle,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SocialLink {
    pub platform: SocialPlatform,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LocaleConfig {
    pub code: LocaleCode,
    pub label: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl SiteSettings {
    pub(crate) fn check(&self, path: &str, checker: &mut Checker) {
        checker.required(&format!("{path}.siteName"), &self.site_name);
        if let Some(bar) = &self.announcement_bar {
            let path = format!("{path}.announcementBar");
            checker.required_max(&format!("{path}.message"), &bar.message, 80);
            checker.max_len(&format!("{path}.linkLabel"), bar.link_label.as_deref(), 20);
        }
        for (i, link) in self.social_links.iter().enumerate() {
            checker.required(&format!("{path}.socialLinks[{i}].url"), &link.url);
        }
        for (i, locale) in self.available_locales.iter().enumerate() {
            checker.required(&format!("{path}.availableLocales[{i}].label"), &locale.label);
        }
        if self.available_locales.iter().filter(|l| l.is_default).count() > 1 {
            checker.push(
                format!("{path}.availableLocales"),
                "more than one locale is marked as default",
            );
        }
    }
}

impl SeedEntity for SiteSettings {
    const KIND: ContentType = ContentType::SiteSetting;

    fn natural_key(&self) -> Option<&str> {
        None
    }
}

// ---------------------------------------------------------------------------
// Footer
// ---------------------------------------------------------------------------

/// Site footer (single type).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Footer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright_text: Option<String>,
    #[serde(default)]
    pub columns: Vec<FooterColumn>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FooterColumn {
    pub title: String,
    #[serde(default)]
    pub links: Vec<FooterLink>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FooterLink {
    pub label: String,
    pub href: String,
}

impl Footer {
    pub(crate) fn check(&self, path: &str, checker: &mut Checker) {
        for (i, column) in self.columns.iter().enumerate() {
            let col = format!("{path}.columns[{i}]");
            checker.required_max(&format!("{col}.title"), &column.title, 25);
            for (j, link) in column.links.iter().enumerate() {
                checker.required_max(&format!("{col}.links[{j}].label"), &link.label, 30);
                checker.required(&format!("{col}.links[{j}].href"), &link.href);
            }
        }
    }
}

impl SeedEntity for Footer {
    const KIND: ContentType = ContentType::Footer;

    fn natural_key(&self) -> Option<&str> {
        None
    }
}

// ---------------------------------------------------------------------------
// NavigationItem
// ---------------------------------------------------------------------------

/// Menu entry, identified by `href`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NavigationItem {
    pub label: String,
    pub href: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub open_in_new_tab: bool,
    #[serde(default)]
    pub is_external: bool,
    #[serde(default = "default_true")]
    pub show_in_header: bool,
    #[serde(default)]
    pub show_in_footer: bool,
    #[serde(default = "default_true")]
    pub show_in_mobile: bool,
    #[serde(default)]
    pub highlight: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    /// Slug of the page this item points at. Wired as a relation after all
    /// documents exist, never sent as an attribute.
    #[serde(default, skip_serializing)]
    pub page: Option<String>,
}

impl NavigationItem {
    pub(crate) fn check(&self, path: &str, checker: &mut Checker) {
        checker.required_max(&format!("{path}.label"), &self.label, 30);
        checker.required(&format!("{path}.href"), &self.href);
    }
}

impl SeedEntity for NavigationItem {
    const KIND: ContentType = ContentType::NavigationItem;

    fn natural_key(&self) -> Option<&str> {
        Some(&self.href)
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// Routable page, identified by `slug`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Page {
    pub title: String,
    pub slug: String,
    /// Falls back to the configured default locale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<LocaleCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_image_alt: Option<String>,
}

impl Page {
    pub(crate) fn check(&self, path: &str, checker: &mut Checker) {
        checker.required_max(&format!("{path}.title"), &self.title, 80);
        checker.identifier(&format!("{path}.slug"), &self.slug);
        checker.max_len(&format!("{path}.metaTitle"), self.meta_title.as_deref(), 60);
        checker.max_len(
            &format!("{path}.metaDescription"),
            self.meta_description.as_deref(),
            160,
        );
    }
}

impl SeedEntity for Page {
    const KIND: ContentType = ContentType::Page;

    fn natural_key(&self) -> Option<&str> {
        Some(&self.slug)
    }
}

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// Page building block. `anchor` is local to the owning page; the stored
/// anchor may be page-qualified (see [`stored_anchor`](super::stored_anchor)).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Section {
    #[serde(rename = "type")]
    pub section_type: SectionType,
    pub anchor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eyebrow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subheading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_link: Option<String>,
    #[serde(default)]
    pub cta_style: CtaStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_text2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_link2: Option<String>,
    #[serde(default)]
    pub background_style: BackgroundStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub hide_mobile: bool,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub pricing_tiers: Vec<PricingTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_state: Option<EmptyState>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Feature {
    pub icon: FeatureIcon,
    pub heading: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_label: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PricingTier {
    pub tier_key: TierKey,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default)]
    pub highlighted: bool,
    #[serde(default)]
    pub features: Vec<PricingFeature>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PricingFeature {
    pub text: String,
    #[serde(default = "default_true")]
    pub included: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EmptyState {
    pub heading: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_link: Option<String>,
}

impl Section {
    pub(crate) fn check(&self, path: &str, checker: &mut Checker) {
        let field = |name: &str| format!("{path}.{name}");
        checker.identifier(&field("anchor"), &self.anchor);
        checker.max_len(&field("eyebrow"), self.eyebrow.as_deref(), 30);
        checker.max_len(&field("heading"), self.heading.as_deref(), 80);
        checker.max_len(&field("subheading"), self.subheading.as_deref(), 120);
        checker.max_len(&field("ctaText"), self.cta_text.as_deref(), 25);
        checker.max_len(&field("ctaText2"), self.cta_text2.as_deref(), 25);
        checker.max_len(&field("ariaLabel"), self.aria_label.as_deref(), 100);
        checker.max_len(&field("helpText"), self.help_text.as_deref(), 200);

        for (i, feature) in self.features.iter().enumerate() {
            let p = format!("{path}.features[{i}]");
            checker.required_max(&format!("{p}.heading"), &feature.heading, 50);
            checker.required_max(&format!("{p}.description"), &feature.description, 150);
            checker.max_len(&format!("{p}.linkLabel"), feature.link_label.as_deref(), 25);
        }
        for (i, tier) in self.pricing_tiers.iter().enumerate() {
            let p = format!("{path}.pricingTiers[{i}]");
            checker.required_max(&format!("{p}.name"), &tier.name, 30);
            checker.required_max(&format!("{p}.description"), &tier.description, 100);
            checker.max_len(&format!("{p}.badge"), tier.badge.as_deref(), 20);
            for (j, item) in tier.features.iter().enumerate() {
                checker.required_max(&format!("{p}.features[{j}].text"), &item.text, 60);
                checker.max_len(&format!("{p}.features[{j}].tooltip"), item.tooltip.as_deref(), 150);
            }
        }
        if let Some(empty) = &self.empty_state {
            let p = field("emptyState");
            checker.required_max(&format!("{p}.heading"), &empty.heading, 60);
            checker.max_len(&format!("{p}.body"), empty.body.as_deref(), 150);
            checker.max_len(&format!("{p}.ctaText"), empty.cta_text.as_deref(), 25);
        }
    }
}

impl SeedEntity for Section {
    const KIND: ContentType = ContentType::Section;

    fn natural_key(&self) -> Option<&str> {
        Some(&self.anchor)
    }
}
