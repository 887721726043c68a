//! Shipped vendor catalogues
//!
//! Sourcepoint ids are the property's custom-vendor object ids. LiveRamp ids
//! follow the IAB global vendor list where the vendor is registered there and
//! the property's custom-vendor range otherwise.

use crate::domain::{CmpBackend, Purpose, PurposeId, Vendor, VendorId};

use super::{BaselinePurposePolicy, VendorPurposeRegistry};

pub mod vendor {
    pub const FACEBOOK: &str = "facebook";
    pub const GOOGLE_MAPS: &str = "google_maps";
    pub const INSTAGRAM: &str = "instagram";
    pub const PINTEREST: &str = "pinterest";
    pub const TARGETVIDEO_GMBH: &str = "targetvideo_gmbh";
    pub const TWITTER: &str = "twitter";
    pub const VIMEO: &str = "vimeo";
    pub const XANDR: &str = "xandr";
    pub const YOUTUBE: &str = "youtube";
}

/// Sourcepoint purpose ids
pub mod sp_purpose {
    pub const STORE_AND_OR_ACCESS_INFORMATION_ON_A_DEVICE: &str = "6489861f44cf6406ddda4023";
    pub const USE_LIMITED_DATA_TO_SELECT_ADVERTISING: &str = "6489861e44cf6406ddda28e9";
    pub const CREATE_PROFILES_FOR_PERSONALISED_ADVERTISING: &str = "6489861e44cf6406ddda2c78";
    pub const USE_PROFILES_TO_SELECT_PERSONALISED_ADVERTISING: &str = "6489861e44cf6406ddda2fa3";
    pub const CREATE_PROFILES_TO_PERSONALISE_CONTENT: &str = "6489861e44cf6406ddda32bb";
    pub const USE_PROFILES_TO_SELECT_PERSONALISED_CONTENT: &str = "6489861e44cf6406ddda33c5";
    pub const MEASURE_ADVERTISING_PERFORMANCE: &str = "6489861e44cf6406ddda34a9";
    pub const MEASURE_CONTENT_PERFORMANCE: &str = "6489861f44cf6406ddda38dc";
    pub const UNDERSTAND_AUDIENCES_THROUGH_STATISTICS: &str = "6489861f44cf6406ddda3a8c";
    pub const DEVELOP_AND_IMPROVE_SERVICES: &str = "6489861f44cf6406ddda3cba";
    pub const USE_LIMITED_DATA_TO_SELECT_CONTENT: &str = "652692cc25bbd005067b4994";
    pub const ABSOLUTELY_REQUIRED_COOKIES: &str = "6489861f44cf6406ddda4011";
    pub const FUNCTIONAL: &str = "6489861f44cf6406ddda4016";
    pub const ANALYTIC: &str = "6489861f44cf6406ddda401a";
    pub const ADS_NON_IAB: &str = "6489861f44cf6406ddda401d";
    pub const SOCIAL_MEDIA: &str = "6489861f44cf6406ddda401f";
    pub const DIRECT_MARKETING: &str = "6493f84f36160804ecc46e5f";
    pub const DATA_EXCHANGE: &str = "6493f84f36160804ecc46e64";
}

/// IAB TCF v2 purpose numbers used by LiveRamp
pub mod lr_purpose {
    pub const STORE_AND_OR_ACCESS_INFORMATION_ON_A_DEVICE: u32 = 1;
    pub const SELECT_BASIC_ADS: u32 = 2;
    pub const CREATE_PERSONALISED_ADS_PROFILE: u32 = 3;
    pub const SELECT_PERSONALISED_ADS: u32 = 4;
    pub const CREATE_PERSONALISED_CONTENT_PROFILE: u32 = 5;
    pub const SELECT_PERSONALISED_CONTENT: u32 = 6;
    pub const MEASURE_AD_PERFORMANCE: u32 = 7;
    pub const MEASURE_CONTENT_PERFORMANCE: u32 = 8;
    pub const APPLY_MARKET_RESEARCH: u32 = 9;
    pub const DEVELOP_AND_IMPROVE_PRODUCTS: u32 = 10;
}

fn sp(ids: &[&str]) -> Vec<PurposeId> {
    ids.iter().map(|s| PurposeId::Opaque((*s).to_string())).collect()
}

fn lr(ids: &[u32]) -> Vec<PurposeId> {
    ids.iter().copied().map(PurposeId::Numeric).collect()
}

fn opaque(id: &str) -> VendorId {
    VendorId::Opaque(id.to_string())
}

pub(super) fn sourcepoint() -> VendorPurposeRegistry {
    use sp_purpose::*;

    let social = [
        STORE_AND_OR_ACCESS_INFORMATION_ON_A_DEVICE,
        FUNCTIONAL,
        SOCIAL_MEDIA,
    ];

    let vendors = vec![
        Vendor::new(
            vendor::FACEBOOK,
            opaque("5e716fc09a0b5040d575080f"),
            "Facebook",
            Some("Facebook-Posts anzeigen"),
            sp(&social),
        ),
        Vendor::new(
            vendor::GOOGLE_MAPS,
            opaque("5eb97b265852312e6a9fbf31"),
            "Google Maps",
            Some("Google Maps anzeigen"),
            sp(&[STORE_AND_OR_ACCESS_INFORMATION_ON_A_DEVICE, SOCIAL_MEDIA]),
        ),
        Vendor::new(
            vendor::INSTAGRAM,
            opaque("6054c53ca228639c6f285121"),
            "Instagram",
            Some("Instagram-Posts anzeigen"),
            sp(&social),
        ),
        Vendor::new(
            vendor::PINTEREST,
            opaque("5e839a38b8e05c4e491e738e"),
            "Pinterest",
            Some("Pinterest-Posts anzeigen"),
            sp(&social),
        ),
        Vendor::new(
            vendor::TARGETVIDEO_GMBH,
            opaque("5f0838a5b8e05c065164a384"),
            "TargetVideo GmbH",
            None,
            sp(&[MEASURE_CONTENT_PERFORMANCE]),
        ),
        Vendor::new(
            vendor::TWITTER,
            opaque("5e71760b69966540e4554f01"),
            "Twitter",
            Some("Twitter-Posts anzeigen"),
            sp(&social),
        ),
        Vendor::new(
            vendor::VIMEO,
            opaque("5eac148d4bfee33e7280d13b"),
            "Vimeo",
            Some("Vimeo-Videos anzeigen"),
            sp(&social),
        ),
        // TODO: confirm Xandr's purpose set with the Sourcepoint vendor list;
        // the advertising purposes below are provisional.
        Vendor::new(
            vendor::XANDR,
            opaque("5e7ced57b8e05c4854221bba"),
            "Xandr, Inc.",
            None,
            sp(&[
                STORE_AND_OR_ACCESS_INFORMATION_ON_A_DEVICE,
                USE_LIMITED_DATA_TO_SELECT_ADVERTISING,
                CREATE_PROFILES_FOR_PERSONALISED_ADVERTISING,
                USE_PROFILES_TO_SELECT_PERSONALISED_ADVERTISING,
                MEASURE_ADVERTISING_PERFORMANCE,
                DEVELOP_AND_IMPROVE_SERVICES,
            ]),
        ),
        Vendor::new(
            vendor::YOUTUBE,
            opaque("5e7ac3fae30e7d1bc1ebf5e8"),
            "YouTube",
            Some("YouTube-Videos anzeigen"),
            sp(&social),
        ),
    ];

    VendorPurposeRegistry::new(
        CmpBackend::Sourcepoint,
        BaselinePurposePolicy::new(PurposeId::Opaque(
            STORE_AND_OR_ACCESS_INFORMATION_ON_A_DEVICE.to_string(),
        )),
        vendors,
    )
    .expect("shipped sourcepoint catalogue is consistent")
}

pub(super) fn liveramp() -> VendorPurposeRegistry {
    use lr_purpose::*;

    let social = [
        STORE_AND_OR_ACCESS_INFORMATION_ON_A_DEVICE,
        CREATE_PERSONALISED_CONTENT_PROFILE,
        SELECT_PERSONALISED_CONTENT,
    ];

    let vendors = vec![
        Vendor::new(
            vendor::FACEBOOK,
            VendorId::Numeric(10187),
            "Facebook",
            Some("Facebook-Posts anzeigen"),
            lr(&social),
        ),
        Vendor::new(
            vendor::GOOGLE_MAPS,
            VendorId::Numeric(10188),
            "Google Maps",
            Some("Google Maps anzeigen"),
            lr(&[STORE_AND_OR_ACCESS_INFORMATION_ON_A_DEVICE]),
        ),
        Vendor::new(
            vendor::INSTAGRAM,
            VendorId::Numeric(10189),
            "Instagram",
            Some("Instagram-Posts anzeigen"),
            lr(&social),
        ),
        Vendor::new(
            vendor::PINTEREST,
            VendorId::Numeric(10190),
            "Pinterest",
            Some("Pinterest-Posts anzeigen"),
            lr(&social),
        ),
        Vendor::new(
            vendor::TARGETVIDEO_GMBH,
            VendorId::Numeric(786),
            "TargetVideo GmbH",
            None,
            lr(&[MEASURE_CONTENT_PERFORMANCE]),
        ),
        Vendor::new(
            vendor::TWITTER,
            VendorId::Numeric(10191),
            "Twitter",
            Some("Twitter-Posts anzeigen"),
            lr(&social),
        ),
        Vendor::new(
            vendor::VIMEO,
            VendorId::Numeric(10192),
            "Vimeo",
            Some("Vimeo-Videos anzeigen"),
            lr(&social),
        ),
        Vendor::new(
            vendor::XANDR,
            VendorId::Numeric(32),
            "Xandr, Inc.",
            None,
            lr(&[
                STORE_AND_OR_ACCESS_INFORMATION_ON_A_DEVICE,
                SELECT_BASIC_ADS,
                CREATE_PERSONALISED_ADS_PROFILE,
                SELECT_PERSONALISED_ADS,
                MEASURE_AD_PERFORMANCE,
                DEVELOP_AND_IMPROVE_PRODUCTS,
            ]),
        ),
        Vendor::new(
            vendor::YOUTUBE,
            VendorId::Numeric(10193),
            "YouTube",
            Some("YouTube-Videos anzeigen"),
            lr(&social),
        ),
    ];

    VendorPurposeRegistry::new(
        CmpBackend::LiveRamp,
        BaselinePurposePolicy::new(PurposeId::Numeric(
            STORE_AND_OR_ACCESS_INFORMATION_ON_A_DEVICE,
        )),
        vendors,
    )
    .expect("shipped liveramp catalogue is consistent")
}

/// Labelled LiveRamp purposes, for consent UIs and diagnostics
pub fn liveramp_purposes() -> Vec<Purpose> {
    use lr_purpose::*;
    vec![
        Purpose::new(PurposeId::Numeric(STORE_AND_OR_ACCESS_INFORMATION_ON_A_DEVICE), "Store and/or access information on a device"),
        Purpose::new(PurposeId::Numeric(SELECT_BASIC_ADS), "Select basic ads"),
        Purpose::new(PurposeId::Numeric(CREATE_PERSONALISED_ADS_PROFILE), "Create a personalised ads profile"),
        Purpose::new(PurposeId::Numeric(SELECT_PERSONALISED_ADS), "Select personalised ads"),
        Purpose::new(PurposeId::Numeric(CREATE_PERSONALISED_CONTENT_PROFILE), "Create a personalised content profile"),
        Purpose::new(PurposeId::Numeric(SELECT_PERSONALISED_CONTENT), "Select personalised content"),
        Purpose::new(PurposeId::Numeric(MEASURE_AD_PERFORMANCE), "Measure ad performance"),
        Purpose::new(PurposeId::Numeric(MEASURE_CONTENT_PERFORMANCE), "Measure content performance"),
        Purpose::new(PurposeId::Numeric(APPLY_MARKET_RESEARCH), "Apply market research to generate audience insights"),
        Purpose::new(PurposeId::Numeric(DEVELOP_AND_IMPROVE_PRODUCTS), "Develop and improve products"),
    ]
}

/// Labelled Sourcepoint purposes, for consent UIs and diagnostics
pub fn sourcepoint_purposes() -> Vec<Purpose> {
    use sp_purpose::*;
    let labelled = [
        (STORE_AND_OR_ACCESS_INFORMATION_ON_A_DEVICE, "Store and/or access information on a device"),
        (USE_LIMITED_DATA_TO_SELECT_ADVERTISING, "Use limited data to select advertising"),
        (CREATE_PROFILES_FOR_PERSONALISED_ADVERTISING, "Create profiles for personalised advertising"),
        (USE_PROFILES_TO_SELECT_PERSONALISED_ADVERTISING, "Use profiles to select personalised advertising"),
        (CREATE_PROFILES_TO_PERSONALISE_CONTENT, "Create profiles to personalise content"),
        (USE_PROFILES_TO_SELECT_PERSONALISED_CONTENT, "Use profiles to select personalised content"),
        (MEASURE_ADVERTISING_PERFORMANCE, "Measure advertising performance"),
        (MEASURE_CONTENT_PERFORMANCE, "Measure content performance"),
        (UNDERSTAND_AUDIENCES_THROUGH_STATISTICS, "Understand audiences through statistics or combinations of data from different sources"),
        (DEVELOP_AND_IMPROVE_SERVICES, "Develop and improve services"),
        (USE_LIMITED_DATA_TO_SELECT_CONTENT, "Use limited data to select content"),
        (ABSOLUTELY_REQUIRED_COOKIES, "Unbedingt erforderliche Cookies"),
        (FUNCTIONAL, "Funktional"),
        (ANALYTIC, "Analytik"),
        (ADS_NON_IAB, "Werbung (Nicht-IAB Anbieter)"),
        (SOCIAL_MEDIA, "Soziale Medien"),
        (DIRECT_MARKETING, "Direktes Marketing"),
        (DATA_EXCHANGE, "Datenaustausch"),
    ];
    labelled
        .iter()
        .map(|(id, label)| Purpose::new(PurposeId::Opaque((*id).to_string()), label))
        .collect()
}
