//! Seed data model: typed records, the dataset, and its validation.

pub mod check;
pub mod dataset;
pub mod entities;

pub use check::{Checker, Violation};
pub use dataset::{DatasetError, SeedDataset, stored_anchor};
pub use entities::{
    AnnouncementBar, AnnouncementStyle, BackgroundStyle, CtaStyle, EmptyState, Feature,
    FeatureIcon, Footer, FooterColumn, FooterLink, LocaleCode, LocaleConfig, NavigationItem, Page,
    PricingFeature, PricingTier, Section, SectionType, SeedEntity, SiteSettings, SocialLink,
    SocialPlatform, TierKey,
};
