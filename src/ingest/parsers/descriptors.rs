// src/ingest/parsers/descriptors.rs
//! Built-in source families. Each family is data only; [`super::site::SiteParser`]
//! and [`super::feed::FeedParser`] run them through one engine.
//!
//! Selector lists are ordered from the current layout to older ones. When a site
//! changes its markup, add a group in front rather than editing the old one.

use super::html::SelectorGroup;
use super::DatePolicy;

#[derive(Debug)]
pub struct SiteDescriptor {
    pub name: &'static str,
    /// Lowercase substrings matched against `name + url` by the dispatcher.
    pub triggers: &'static [&'static str],
    /// Fixed pages fetched instead of the source URL (news sections, archives).
    pub auxiliary_urls: &'static [&'static str],
    pub selector_groups: &'static [SelectorGroup],
    pub fallback_subject: Option<&'static str>,
    pub fallback_position: Option<&'static str>,
    pub date_policy: DatePolicy,
}

#[derive(Debug)]
pub struct FeedDescriptor {
    pub name: &'static str,
    pub triggers: &'static [&'static str],
    /// Fixed feed endpoints; empty means "use the source URL".
    pub feed_urls: &'static [&'static str],
    pub fallback_subject: Option<&'static str>,
    pub date_policy: DatePolicy,
}

pub static FNS: SiteDescriptor = SiteDescriptor {
    name: "ФНС России",
    triggers: &["nalog.gov.ru", "nalog.ru", "фнс"],
    auxiliary_urls: &[
        "https://www.nalog.gov.ru/rn77/news/activities_fts/",
        "https://www.nalog.gov.ru/rn77/news/tax_doc_news/",
    ],
    selector_groups: &[
        SelectorGroup {
            container: ".news-list__item",
            title: &[".news-list__title", ".news-list__link", "a"],
            summary: &[".news-list__text", ".news-list__anons", "p"],
            link: &[".news-list__title a", "a[href]"],
            date: &[".news-list__date", "time", ".date"],
        },
        SelectorGroup {
            container: ".news_item, .b-news__item",
            title: &[".news_title", ".b-news__title", "a"],
            summary: &[".news_text", ".b-news__text", "p"],
            link: &["a[href]"],
            date: &[".news_date", ".b-news__date", ".date"],
        },
    ],
    fallback_subject: Some("ФНС России"),
    fallback_position: None,
    date_policy: DatePolicy::Require,
};

pub static MINFIN: SiteDescriptor = SiteDescriptor {
    name: "Минфин России",
    triggers: &["minfin.gov.ru", "minfin.ru", "минфин"],
    auxiliary_urls: &[],
    selector_groups: &[
        SelectorGroup {
            container: ".news_list .news_item, .document_list .document_item",
            title: &[".news_title", ".document_title", "a"],
            summary: &[".news_announce", ".document_announce", "p"],
            link: &["a.news_title", "a[href]"],
            date: &[".news_date", ".document_date", "time"],
        },
        SelectorGroup {
            container: "article",
            title: &["h2", "h3", "a"],
            summary: &["p"],
            link: &["a[href]"],
            date: &["time", ".date"],
        },
    ],
    fallback_subject: Some("Минфин России"),
    fallback_position: Some("Письмо Минфина"),
    date_policy: DatePolicy::Require,
};

pub static CONSULTANT: SiteDescriptor = SiteDescriptor {
    name: "КонсультантПлюс",
    triggers: &["consultant.ru", "консультант"],
    auxiliary_urls: &[],
    selector_groups: &[
        SelectorGroup {
            container: ".listing-news__item",
            title: &[".listing-news__item-title", "a"],
            summary: &[".listing-news__item-description", "p"],
            link: &["a.listing-news__item-title", "a[href]"],
            date: &[".listing-news__item-date", "time"],
        },
        SelectorGroup {
            container: ".news-list .news-item",
            title: &[".news-item__title", "a"],
            summary: &[".news-item__text", "p"],
            link: &["a[href]"],
            date: &[".news-item__date", ".date"],
        },
    ],
    fallback_subject: None,
    fallback_position: Some("Обзор законодательства"),
    date_policy: DatePolicy::Require,
};

pub static GARANT: SiteDescriptor = SiteDescriptor {
    name: "Гарант",
    triggers: &["garant.ru", "гарант"],
    auxiliary_urls: &[],
    selector_groups: &[SelectorGroup {
        container: "ul.news-list li, .news-item",
        title: &[".title", "a"],
        summary: &[".announce", ".text", "p"],
        link: &["a[href]"],
        date: &[".date", "time"],
    }],
    fallback_subject: None,
    fallback_position: None,
    date_policy: DatePolicy::Require,
};

pub static KLERK: SiteDescriptor = SiteDescriptor {
    name: "Клерк",
    triggers: &["klerk.ru", "клерк"],
    auxiliary_urls: &[],
    selector_groups: &[
        SelectorGroup {
            container: "article.feed-item, .feed-item",
            title: &[".feed-item__title", "h2", "a"],
            summary: &[".feed-item__lead", ".feed-item__text", "p"],
            link: &["a.feed-item__link", "a[href]"],
            date: &["time", ".feed-item__date"],
        },
        SelectorGroup {
            container: "article",
            title: &["h2", "h3"],
            summary: &["p"],
            link: &["a[href]"],
            date: &["time"],
        },
    ],
    fallback_subject: None,
    fallback_position: None,
    date_policy: DatePolicy::AssumeNow,
};

pub static BUH: SiteDescriptor = SiteDescriptor {
    name: "Бухгалтерия.ру",
    triggers: &["buh.ru", "glavbukh", "главбух", "бухгалтерия"],
    auxiliary_urls: &[],
    selector_groups: &[SelectorGroup {
        container: ".news-list__item, .article-item",
        title: &[".news-list__title", ".article-item__title", "a"],
        summary: &[".news-list__lead", ".article-item__lead", "p"],
        link: &["a[href]"],
        date: &["time", ".news-list__date", ".article-item__date"],
    }],
    fallback_subject: None,
    fallback_position: None,
    date_policy: DatePolicy::AssumeNow,
};

pub static REGULATION: SiteDescriptor = SiteDescriptor {
    name: "Федеральный портал проектов НПА",
    triggers: &["regulation.gov.ru", "проекты нпа"],
    auxiliary_urls: &[],
    selector_groups: &[SelectorGroup {
        container: ".project-item, .npa-item",
        title: &[".project-item__title", ".npa-item__title", "a"],
        summary: &[".project-item__stage", ".npa-item__desc"],
        link: &["a[href]"],
        date: &[".project-item__date", ".npa-item__date", "time"],
    }],
    fallback_subject: Some("Проект НПА"),
    fallback_position: Some("Проект"),
    date_policy: DatePolicy::Require,
};

pub static AUDIT_IT: SiteDescriptor = SiteDescriptor {
    name: "Audit-it.ru",
    triggers: &["audit-it"],
    auxiliary_urls: &[],
    selector_groups: &[SelectorGroup {
        container: ".news-list .item, .lenta-item",
        title: &[".title", "a"],
        summary: &[".lead", ".annot", "p"],
        link: &["a[href]"],
        date: &[".date", "time"],
    }],
    fallback_subject: None,
    fallback_position: None,
    date_policy: DatePolicy::Require,
};

pub static RG: SiteDescriptor = SiteDescriptor {
    name: "Российская газета",
    triggers: &["//rg.ru", ".rg.ru", "российская газета"],
    auxiliary_urls: &[],
    selector_groups: &[SelectorGroup {
        container: ".ItemOfListStandard, .b-news__list-item",
        title: &[".ItemOfListStandard_title", ".b-link__title", "a"],
        summary: &[".ItemOfListStandard_lead", ".b-news__list-item-lead", "p"],
        link: &["a[href]"],
        date: &[".ItemOfListStandard_datetime", "time"],
    }],
    fallback_subject: None,
    fallback_position: None,
    date_policy: DatePolicy::Require,
};

/// Registration order is dispatch order.
pub static SITES: &[&SiteDescriptor] = &[
    &FNS,
    &MINFIN,
    &CONSULTANT,
    &GARANT,
    &KLERK,
    &BUH,
    &REGULATION,
    &AUDIT_IT,
    &RG,
];

pub static INTERFAX_FEED: FeedDescriptor = FeedDescriptor {
    name: "Интерфакс RSS",
    triggers: &["interfax"],
    feed_urls: &["https://www.interfax.ru/rss.asp", "https://www.interfax.ru/rss.asp?r=business"],
    fallback_subject: None,
    date_policy: DatePolicy::Require,
};

pub static GENERIC_FEED: FeedDescriptor = FeedDescriptor {
    name: "RSS",
    triggers: &["/rss", ".rss", "//rss.", "rss ", "/feed", ".xml", "/atom", "//atom."],
    feed_urls: &[],
    fallback_subject: None,
    date_policy: DatePolicy::Require,
};

pub static FEEDS: &[&FeedDescriptor] = &[&INTERFAX_FEED, &GENERIC_FEED];

/// Layouts common to arbitrary news sites, used by the universal parser.
pub static GENERIC_GROUPS: &[SelectorGroup] = &[
    SelectorGroup {
        container: "article",
        title: &["h1", "h2", "h3", ".title", "a"],
        summary: &[".lead", ".summary", ".excerpt", "p"],
        link: &["h2 a[href]", "h3 a[href]", "a[href]"],
        date: &["time", ".date", ".published"],
    },
    SelectorGroup {
        container: ".news-item, .news__item, .news-list__item, .post, .entry",
        title: &[".title", ".news-item__title", "h2", "h3", "a"],
        summary: &[".text", ".lead", ".excerpt", "p"],
        link: &["a[href]"],
        date: &["time", ".date", ".news-item__date"],
    },
];
