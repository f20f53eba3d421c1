/// Static catalogs of replacement items and design styles.
///
/// These are fixed collaborator lists; the editor treats the ids as
/// opaque selector values and forwards them to the service unchanged.

use std::fmt;

/// One selectable catalog entry: service id plus display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: &'static str,
    pub name: &'static str,
    pub emoji: &'static str,
}

impl fmt::Display for CatalogItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.emoji, self.name)
    }
}

/// Which catalog the replacement panel is browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceKind {
    Furniture,
    Decoration,
}

impl ReplaceKind {
    pub fn label(&self) -> &'static str {
        match self {
            ReplaceKind::Furniture => "furniture",
            ReplaceKind::Decoration => "decoration",
        }
    }

    pub fn items(&self) -> &'static [CatalogItem] {
        match self {
            ReplaceKind::Furniture => FURNITURE,
            ReplaceKind::Decoration => DECORATIONS,
        }
    }
}

pub const FURNITURE: &[CatalogItem] = &[
    CatalogItem { id: "sofa", name: "沙发", emoji: "🛋️" },
    CatalogItem { id: "chair", name: "椅子", emoji: "🪑" },
    CatalogItem { id: "table", name: "桌子", emoji: "🪵" },
    CatalogItem { id: "bed", name: "床", emoji: "🛏️" },
    CatalogItem { id: "lamp", name: "灯具", emoji: "💡" },
    CatalogItem { id: "cabinet", name: "柜子", emoji: "🗄️" },
];

pub const DECORATIONS: &[CatalogItem] = &[
    CatalogItem { id: "painting", name: "挂画", emoji: "🖼️" },
    CatalogItem { id: "plant", name: "绿植", emoji: "🌿" },
    CatalogItem { id: "vase", name: "花瓶", emoji: "🏺" },
    CatalogItem { id: "curtain", name: "窗帘", emoji: "🪟" },
    CatalogItem { id: "rug", name: "地毯", emoji: "🧶" },
];

pub const STYLES: &[CatalogItem] = &[
    CatalogItem { id: "modern_minimalist", name: "现代简约", emoji: "🏢" },
    CatalogItem { id: "scandinavian", name: "北欧风格", emoji: "🌲" },
    CatalogItem { id: "chinese_modern", name: "新中式", emoji: "🏮" },
    CatalogItem { id: "light_luxury", name: "轻奢风格", emoji: "✨" },
    CatalogItem { id: "japanese_wood", name: "日式原木", emoji: "🎋" },
    CatalogItem { id: "industrial", name: "工业风", emoji: "🔩" },
    CatalogItem { id: "american_country", name: "美式田园", emoji: "🌻" },
    CatalogItem { id: "french_romantic", name: "法式浪漫", emoji: "🌹" },
    CatalogItem { id: "mediterranean", name: "地中海", emoji: "🌊" },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_unique() {
        for catalog in [FURNITURE, DECORATIONS, STYLES] {
            for (i, a) in catalog.iter().enumerate() {
                for b in &catalog[i + 1..] {
                    assert_ne!(a.id, b.id);
                }
            }
        }
    }

    #[test]
    fn replace_kind_selects_its_catalog() {
        assert_eq!(ReplaceKind::Furniture.items().len(), 6);
        assert_eq!(ReplaceKind::Decoration.items().len(), 5);
    }
}
