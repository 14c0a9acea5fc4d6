//! Output category classification based on canonical channel names.
//!
//! Categories are decided by three membership tests evaluated in a fixed
//! order:
//!
//! ```text
//! name contains primary marker ("CCTV")                 -> PrimaryNetwork
//! name contains regional marker ("卫视"), not primary    -> Regional
//! neither, and not a test/placeholder channel ("测试")   -> Other
//! ```
//!
//! Test channels that are neither primary nor regional get no category.

use serde::{Deserialize, Serialize};

/// Output section a ranked channel is written under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// National network channels (央视).
    PrimaryNetwork,
    /// Provincial satellite channels (卫视).
    Regional,
    /// Everything else.
    Other,
}

impl Category {
    /// Sections in output order.
    pub const ALL: [Category; 3] = [Category::PrimaryNetwork, Category::Regional, Category::Other];

    /// Section header label.
    pub fn label(self) -> &'static str {
        match self {
            Category::PrimaryNetwork => "央视频道",
            Category::Regional => "卫视频道",
            Category::Other => "其他频道",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::PrimaryNetwork => "primary-network",
            Category::Regional => "regional",
            Category::Other => "other",
        }
    }
}

/// Marker tokens used by [`CategoryMarkers::classify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMarkers {
    /// Token identifying primary-network channels.
    pub primary: String,
    /// Token identifying regional satellite channels.
    pub regional: String,
    /// Token identifying test/placeholder channels.
    pub test: String,
}

impl Default for CategoryMarkers {
    fn default() -> Self {
        Self {
            primary: "CCTV".to_string(),
            regional: "卫视".to_string(),
            test: "测试".to_string(),
        }
    }
}

impl CategoryMarkers {
    /// Assign a canonical name to a category, or `None` for excluded test channels.
    pub fn classify(&self, name: &str) -> Option<Category> {
        if name.contains(&self.primary) {
            Some(Category::PrimaryNetwork)
        } else if name.contains(&self.regional) {
            Some(Category::Regional)
        } else if name.contains(&self.test) {
            None
        } else {
            Some(Category::Other)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_order() {
        let markers = CategoryMarkers::default();
        assert_eq!(markers.classify("CCTV5+"), Some(Category::PrimaryNetwork));
        assert_eq!(markers.classify("湖南卫视"), Some(Category::Regional));
        // Primary wins over regional.
        assert_eq!(markers.classify("CCTV卫视"), Some(Category::PrimaryNetwork));
        assert_eq!(markers.classify("凤凰资讯台"), Some(Category::Other));
    }

    #[test]
    fn test_classify_excludes_test_channels_from_other() {
        let markers = CategoryMarkers::default();
        assert_eq!(markers.classify("测试频道1"), None);
        // The test marker only excludes from the catch-all section.
        assert_eq!(markers.classify("CCTV测试"), Some(Category::PrimaryNetwork));
        assert_eq!(markers.classify("测试卫视"), Some(Category::Regional));
    }

    #[test]
    fn test_labels() {
        assert_eq!(Category::PrimaryNetwork.label(), "央视频道");
        assert_eq!(Category::Regional.label(), "卫视频道");
        assert_eq!(Category::Other.label(), "其他频道");
        assert_eq!(Category::Regional.as_str(), "regional");
    }
}
