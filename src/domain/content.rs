use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row id of the site content and site settings singletons.
pub const SINGLETON_ID: i64 = 1;

/// Editable storefront texts and images.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteContent {
    pub id: i64,
    pub hero_image: Option<String>,
    pub hero_title: String,
    pub hero_subtitle: String,
    pub hero_button_text: String,
    pub hero_button_url: String,
    pub about_image: Option<String>,
    pub about_title: String,
    pub about_subtitle: String,
    pub about_body: String,
    pub webshop_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SiteContent {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            id: SINGLETON_ID,
            hero_image: None,
            hero_title: String::new(),
            hero_subtitle: String::new(),
            hero_button_text: String::new(),
            hero_button_url: String::new(),
            about_image: None,
            about_title: String::new(),
            about_subtitle: String::new(),
            about_body: String::new(),
            webshop_image: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SiteContentPatch {
    pub hero_title: Option<String>,
    pub hero_subtitle: Option<String>,
    pub hero_button_text: Option<String>,
    pub hero_button_url: Option<String>,
    pub about_title: Option<String>,
    pub about_subtitle: Option<String>,
    pub about_body: Option<String>,
}

impl SiteContentPatch {
    pub fn apply(self, content: &mut SiteContent) {
        let fields = [
            (self.hero_title, &mut content.hero_title),
            (self.hero_subtitle, &mut content.hero_subtitle),
            (self.hero_button_text, &mut content.hero_button_text),
            (self.hero_button_url, &mut content.hero_button_url),
            (self.about_title, &mut content.about_title),
            (self.about_subtitle, &mut content.about_subtitle),
            (self.about_body, &mut content.about_body),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSettings {
    pub id: i64,
    /// Where new-order notifications go; unset disables them.
    pub merchant_order_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SiteSettings {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            id: SINGLETON_ID,
            merchant_order_email: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SiteSettingsPatch {
    pub merchant_order_email: Option<String>,
}

impl SiteSettingsPatch {
    pub fn apply(self, settings: &mut SiteSettings) {
        if let Some(email) = self.merchant_order_email {
            let email = email.trim().to_string();
            settings.merchant_order_email = if email.is_empty() { None } else { Some(email) };
        }
    }
}
