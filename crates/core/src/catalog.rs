use serde::{Deserialize, Serialize};

use crate::intent::normalize_text;
use crate::models::{CarouselItem, PromptFragment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayColor {
    Default,
    White,
    Cropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FakeColor {
    pub key: &'static str,
    pub title: &'static str,
    pub text: &'static str,
    pub image_url: &'static str,
    pub image_alt_text: &'static str,
    pub synonyms: &'static [&'static str],
    pub display: DisplayColor,
}

impl FakeColor {
    pub fn card(&self) -> PromptFragment {
        PromptFragment::RichCard {
            title: self.title.to_string(),
            text: self.text.to_string(),
            image_url: self.image_url.to_string(),
            image_alt_text: self.image_alt_text.to_string(),
            display_color: self.display,
        }
    }

    pub fn carousel_item(&self) -> CarouselItem {
        CarouselItem {
            key: self.key.to_string(),
            title: self.title.to_string(),
            synonyms: self.synonyms.iter().map(ToString::to_string).collect(),
            image_url: self.image_url.to_string(),
            image_alt_text: self.image_alt_text.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct FakeColorCatalog {
    entries: &'static [FakeColor],
}

pub static FAKE_COLOR_CATALOG: FakeColorCatalog = FakeColorCatalog {
    entries: &[
        FakeColor {
            key: "indigo taco",
            title: "Indigo Taco",
            text: "Indigo Taco is a subtle bluish tone.",
            image_url: "https://storage.googleapis.com/material-design/publish/material_v_12/assets/0BxFyKV4eeNjDN1JRbF9ZMHZsa1k/style-color-uiapplication-palette1.png",
            image_alt_text: "Indigo Taco Color",
            synonyms: &["indigo", "taco"],
            display: DisplayColor::White,
        },
        FakeColor {
            key: "pink unicorn",
            title: "Pink Unicorn",
            text: "Pink Unicorn is an imaginative reddish hue.",
            image_url: "https://storage.googleapis.com/material-design/publish/material_v_12/assets/0BxFyKV4eeNjDbFVfTXpoaEE5Vzg/style-color-uiapplication-palette2.png",
            image_alt_text: "Pink Unicorn Color",
            synonyms: &["pink", "unicorn"],
            display: DisplayColor::White,
        },
        FakeColor {
            key: "blue grey coffee",
            title: "Blue Grey Coffee",
            text: "Calling out to rainy days, Blue Grey Coffee brings to mind your favorite coffee shop.",
            image_url: "https://storage.googleapis.com/material-design/publish/material_v_12/assets/0BxFyKV4eeNjDZUdpeURtaTUwLUk/style-color-colorsystem-gray-secondary-161116.png",
            image_alt_text: "Blue Grey Coffee Color",
            synonyms: &["blue", "grey", "coffee"],
            display: DisplayColor::White,
        },
    ],
};

impl FakeColorCatalog {
    pub fn entries(&self) -> &'static [FakeColor] {
        self.entries
    }

    /// Exact key lookup after whitespace and case normalization.
    pub fn get(&self, key: &str) -> Option<&'static FakeColor> {
        let key = normalize_text(key).to_lowercase();
        self.entries.iter().find(|entry| entry.key == key)
    }

    pub fn carousel(&self) -> PromptFragment {
        PromptFragment::Carousel {
            items: self.entries.iter().map(FakeColor::carousel_item).collect(),
        }
    }

    /// Titles of every entry except `key`, in catalog order.
    pub fn other_titles(&self, key: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.key != key)
            .map(|entry| entry.title.to_string())
            .collect()
    }
}
