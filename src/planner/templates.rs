// src/planner/templates.rs — Deterministic plan templates
//
// Fallback plans are served from a registry mapping a domain tag to a
// builder function, selected by keyword-rule evaluation. New domains are
// registered additively.

use crate::core::types::Style;

/// One budgeted category inside a template, before amounts are distributed.
#[derive(Debug, Clone)]
pub struct TemplateNeed {
    pub key: &'static str,
    pub name: String,
    pub specs: String,
    /// Percent of the total budget.
    pub percent: f64,
    pub priority: u8,
}

pub type TemplateBuilder = fn(Style) -> Vec<TemplateNeed>;

pub struct TemplateEntry {
    pub tag: &'static str,
    keywords: &'static [&'static str],
    pub builder: TemplateBuilder,
}

pub struct TemplateRegistry {
    entries: Vec<TemplateEntry>,
    default_builder: TemplateBuilder,
}

impl TemplateRegistry {
    /// Registry with the standard domain templates.
    pub fn standard() -> Self {
        let mut registry = Self {
            entries: Vec::new(),
            default_builder: generic_template,
        };
        registry.register(
            "gaming",
            &["gaming", "gamer", "battlestation", "esports", "streaming"],
            gaming_template,
        );
        registry.register(
            "office",
            &["office", "work", "desk", "workspace", "wfh", "study", "home office"],
            office_template,
        );
        registry.register(
            "bedroom",
            &["bedroom", "bed", "sleep", "dorm"],
            bedroom_template,
        );
        registry.register(
            "kitchen",
            &["kitchen", "cooking", "cook", "chef", "baking"],
            kitchen_template,
        );
        registry.register(
            "living-room",
            &["living room", "livingroom", "lounge", "tv room", "entertainment"],
            living_room_template,
        );
        registry
    }

    pub fn register(
        &mut self,
        tag: &'static str,
        keywords: &'static [&'static str],
        builder: TemplateBuilder,
    ) {
        self.entries.push(TemplateEntry {
            tag,
            keywords,
            builder,
        });
    }

    /// Pick the template whose keywords best match the query; the generic
    /// template serves queries matching no domain.
    pub fn select(&self, query: &str) -> (&'static str, TemplateBuilder) {
        let lower = query.to_lowercase();
        let best = self
            .entries
            .iter()
            .map(|e| {
                let hits = e.keywords.iter().filter(|k| lower.contains(*k)).count();
                (hits, e)
            })
            .filter(|(hits, _)| *hits > 0)
            .max_by_key(|(hits, _)| *hits);

        match best {
            Some((_, entry)) => (entry.tag, entry.builder),
            None => ("generic", self.default_builder),
        }
    }
}

fn styled(style: Style, premium: &str, casual: &str) -> String {
    match style {
        Style::Premium => premium.to_string(),
        Style::Casual => casual.to_string(),
    }
}

fn gaming_template(style: Style) -> Vec<TemplateNeed> {
    vec![
        TemplateNeed {
            key: "pc",
            name: styled(style, "High-end gaming PC", "Gaming PC"),
            specs: styled(
                style,
                "RTX-class GPU, 32GB RAM, 1TB NVMe",
                "Mid-range GPU, 16GB RAM, 512GB SSD",
            ),
            percent: 45.0,
            priority: 10,
        },
        TemplateNeed {
            key: "monitor",
            name: styled(style, "High-refresh gaming monitor", "Gaming monitor"),
            specs: styled(style, "27\" 1440p 165Hz IPS", "24\" 1080p 144Hz"),
            percent: 20.0,
            priority: 9,
        },
        TemplateNeed {
            key: "chair",
            name: styled(style, "Ergonomic gaming chair", "Gaming chair"),
            specs: styled(style, "Lumbar support, 4D armrests", "Adjustable height"),
            percent: 15.0,
            priority: 8,
        },
        TemplateNeed {
            key: "desk",
            name: styled(style, "Sit-stand gaming desk", "Gaming desk"),
            specs: styled(style, "Electric height adjust, 140cm", "120cm, cable tray"),
            percent: 8.0,
            priority: 7,
        },
        TemplateNeed {
            key: "keyboard",
            name: styled(style, "Mechanical keyboard", "Gaming keyboard"),
            specs: styled(style, "Hot-swappable switches, TKL", "Membrane RGB"),
            percent: 4.0,
            priority: 6,
        },
        TemplateNeed {
            key: "mouse",
            name: styled(style, "Lightweight gaming mouse", "Gaming mouse"),
            specs: styled(style, "Sub-60g wireless", "Wired optical"),
            percent: 3.0,
            priority: 5,
        },
        TemplateNeed {
            key: "headset",
            name: styled(style, "Wireless gaming headset", "Gaming headset"),
            specs: styled(style, "Low-latency wireless, mic", "Wired stereo, mic"),
            percent: 3.0,
            priority: 4,
        },
        TemplateNeed {
            key: "mousepad",
            name: "Extended mousepad".into(),
            specs: "900x400mm cloth".into(),
            percent: 2.0,
            priority: 3,
        },
    ]
}

fn office_template(style: Style) -> Vec<TemplateNeed> {
    vec![
        TemplateNeed {
            key: "desk",
            name: styled(style, "Electric standing desk", "Office desk"),
            specs: styled(style, "Dual-motor sit-stand, 150cm", "120cm with drawer"),
            percent: 25.0,
            priority: 10,
        },
        TemplateNeed {
            key: "chair",
            name: styled(style, "Ergonomic task chair", "Office chair"),
            specs: styled(style, "Mesh back, adjustable lumbar", "Padded, height adjust"),
            percent: 25.0,
            priority: 9,
        },
        TemplateNeed {
            key: "monitor",
            name: styled(style, "4K productivity monitor", "Office monitor"),
            specs: styled(style, "27\" 4K IPS, USB-C", "24\" 1080p"),
            percent: 20.0,
            priority: 8,
        },
        TemplateNeed {
            key: "keyboard",
            name: styled(style, "Low-profile mechanical keyboard", "Wireless keyboard"),
            specs: "Full-size layout".into(),
            percent: 8.0,
            priority: 7,
        },
        TemplateNeed {
            key: "lamp",
            name: "Desk lamp".into(),
            specs: styled(style, "Monitor light bar", "LED lamp, dimmable"),
            percent: 6.0,
            priority: 6,
        },
        TemplateNeed {
            key: "webcam",
            name: styled(style, "4K webcam", "HD webcam"),
            specs: styled(style, "4K30, autofocus", "1080p30"),
            percent: 6.0,
            priority: 5,
        },
        TemplateNeed {
            key: "mouse",
            name: "Wireless mouse".into(),
            specs: "Ergonomic shape".into(),
            percent: 5.0,
            priority: 4,
        },
        TemplateNeed {
            key: "organizer",
            name: "Desk organizer".into(),
            specs: "Cable management, trays".into(),
            percent: 5.0,
            priority: 3,
        },
    ]
}

fn bedroom_template(style: Style) -> Vec<TemplateNeed> {
    vec![
        TemplateNeed {
            key: "bed",
            name: styled(style, "Upholstered bed frame", "Bed frame"),
            specs: "Queen size".into(),
            percent: 30.0,
            priority: 10,
        },
        TemplateNeed {
            key: "mattress",
            name: styled(style, "Hybrid mattress", "Memory foam mattress"),
            specs: "Queen, medium-firm".into(),
            percent: 30.0,
            priority: 9,
        },
        TemplateNeed {
            key: "dresser",
            name: "Dresser".into(),
            specs: "6-drawer".into(),
            percent: 15.0,
            priority: 8,
        },
        TemplateNeed {
            key: "bedding",
            name: styled(style, "Sateen bedding set", "Bedding set"),
            specs: "Duvet, sheets, pillowcases".into(),
            percent: 10.0,
            priority: 7,
        },
        TemplateNeed {
            key: "nightstand",
            name: "Nightstand".into(),
            specs: "With drawer".into(),
            percent: 8.0,
            priority: 6,
        },
        TemplateNeed {
            key: "lamp",
            name: "Bedside lamp".into(),
            specs: "Warm light, dimmable".into(),
            percent: 7.0,
            priority: 5,
        },
    ]
}

fn kitchen_template(style: Style) -> Vec<TemplateNeed> {
    vec![
        TemplateNeed {
            key: "cookware",
            name: styled(style, "Stainless cookware set", "Nonstick cookware set"),
            specs: "10-piece".into(),
            percent: 25.0,
            priority: 10,
        },
        TemplateNeed {
            key: "airfryer",
            name: "Air fryer".into(),
            specs: styled(style, "Dual-zone 8L", "4L basket"),
            percent: 18.0,
            priority: 9,
        },
        TemplateNeed {
            key: "knives",
            name: styled(style, "Forged knife set", "Knife set"),
            specs: "Chef, paring, bread + block".into(),
            percent: 15.0,
            priority: 8,
        },
        TemplateNeed {
            key: "blender",
            name: styled(style, "High-power blender", "Blender"),
            specs: styled(style, "1400W, glass jar", "600W"),
            percent: 12.0,
            priority: 7,
        },
        TemplateNeed {
            key: "dinnerware",
            name: "Dinnerware set".into(),
            specs: "Service for 4".into(),
            percent: 12.0,
            priority: 6,
        },
        TemplateNeed {
            key: "kettle",
            name: styled(style, "Gooseneck kettle", "Electric kettle"),
            specs: styled(style, "Temperature control", "1.7L"),
            percent: 10.0,
            priority: 5,
        },
        TemplateNeed {
            key: "storage",
            name: "Food storage set".into(),
            specs: "Airtight containers".into(),
            percent: 8.0,
            priority: 4,
        },
    ]
}

fn living_room_template(style: Style) -> Vec<TemplateNeed> {
    vec![
        TemplateNeed {
            key: "sofa",
            name: styled(style, "Sectional sofa", "Sofa"),
            specs: styled(style, "3-seat with chaise", "3-seat"),
            percent: 40.0,
            priority: 10,
        },
        TemplateNeed {
            key: "coffee-table",
            name: "Coffee table".into(),
            specs: "With storage shelf".into(),
            percent: 15.0,
            priority: 9,
        },
        TemplateNeed {
            key: "tv-stand",
            name: "TV stand".into(),
            specs: "Fits up to 65\"".into(),
            percent: 12.0,
            priority: 8,
        },
        TemplateNeed {
            key: "rug",
            name: styled(style, "Wool area rug", "Area rug"),
            specs: "200x300cm".into(),
            percent: 10.0,
            priority: 7,
        },
        TemplateNeed {
            key: "shelving",
            name: "Bookshelf".into(),
            specs: "5-tier".into(),
            percent: 10.0,
            priority: 6,
        },
        TemplateNeed {
            key: "lamp",
            name: "Floor lamp".into(),
            specs: "Arc or tripod".into(),
            percent: 8.0,
            priority: 5,
        },
        TemplateNeed {
            key: "pillows",
            name: "Throw pillow set".into(),
            specs: "Set of 4".into(),
            percent: 5.0,
            priority: 4,
        },
    ]
}

/// Catch-all for queries matching no domain: one main item plus supporting
/// pieces, so unknown setups still get a usable plan.
fn generic_template(style: Style) -> Vec<TemplateNeed> {
    vec![
        TemplateNeed {
            key: "main",
            name: styled(style, "Premium main item", "Main item"),
            specs: "Best match for the query".into(),
            percent: 40.0,
            priority: 10,
        },
        TemplateNeed {
            key: "secondary",
            name: "Supporting item".into(),
            specs: "Complements the main item".into(),
            percent: 25.0,
            priority: 8,
        },
        TemplateNeed {
            key: "accessory-1",
            name: "Accessory".into(),
            specs: "Frequently bought together".into(),
            percent: 15.0,
            priority: 6,
        },
        TemplateNeed {
            key: "accessory-2",
            name: "Accessory".into(),
            specs: "Frequently bought together".into(),
            percent: 10.0,
            priority: 5,
        },
        TemplateNeed {
            key: "extra",
            name: "Optional extra".into(),
            specs: "Nice to have".into(),
            percent: 10.0,
            priority: 3,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_gaming() {
        let registry = TemplateRegistry::standard();
        let (tag, _) = registry.select("gaming setup for my room");
        assert_eq!(tag, "gaming");
    }

    #[test]
    fn test_select_office() {
        let registry = TemplateRegistry::standard();
        let (tag, _) = registry.select("home office setup");
        assert_eq!(tag, "office");
    }

    #[test]
    fn test_select_falls_back_to_generic() {
        let registry = TemplateRegistry::standard();
        let (tag, _) = registry.select("scuba diving gear");
        assert_eq!(tag, "generic");
    }

    #[test]
    fn test_select_most_hits_wins() {
        let registry = TemplateRegistry::standard();
        // "desk" alone hits office; "gaming battlestation" hits gaming twice.
        let (tag, _) = registry.select("gaming battlestation desk");
        assert_eq!(tag, "gaming");
    }

    #[test]
    fn test_all_templates_sum_to_100() {
        let registry = TemplateRegistry::standard();
        for entry in &registry.entries {
            for style in [Style::Premium, Style::Casual] {
                let needs = (entry.builder)(style);
                let total: f64 = needs.iter().map(|n| n.percent).sum();
                assert!(
                    (total - 100.0).abs() < 0.001,
                    "template '{}' sums to {}",
                    entry.tag,
                    total
                );
            }
        }
        let total: f64 = generic_template(Style::Casual).iter().map(|n| n.percent).sum();
        assert!((total - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_gaming_allocation_shape() {
        let needs = gaming_template(Style::Casual);
        assert_eq!(needs[0].key, "pc");
        assert!((needs[0].percent - 45.0).abs() < 0.001);
        assert!((needs[1].percent - 20.0).abs() < 0.001);
        // Priorities strictly descending
        for pair in needs.windows(2) {
            assert!(pair[0].priority > pair[1].priority);
        }
    }

    #[test]
    fn test_style_changes_naming_not_shape() {
        let premium = gaming_template(Style::Premium);
        let casual = gaming_template(Style::Casual);
        assert_eq!(premium.len(), casual.len());
        for (p, c) in premium.iter().zip(casual.iter()) {
            assert!((p.percent - c.percent).abs() < 0.001);
            assert_eq!(p.priority, c.priority);
        }
        assert_ne!(premium[0].name, casual[0].name);
    }

    #[test]
    fn test_register_is_additive() {
        let mut registry = TemplateRegistry::standard();
        registry.register("garage", &["garage", "workshop"], generic_template);
        let (tag, _) = registry.select("garage workshop tools");
        assert_eq!(tag, "garage");
    }
}
