use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// One listing extracted from a marketplace page.
///
/// Identity is the normalized `link` alone: two records with the same link are
/// the same listing even when title or price text differ between observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    title: String,
    price: String,
    image: Option<String>,
    link: String,
}

impl Record {
    pub fn new(
        title: impl Into<String>,
        price: impl Into<String>,
        image: Option<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            price: price.into(),
            image,
            link: link.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Price text as shown on the page, empty when the page had none.
    pub fn price(&self) -> &str {
        &self.price
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn has_price(&self) -> bool {
        !self.price.is_empty()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.link == other.link
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.link.hash(state);
    }
}
