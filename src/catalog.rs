/// Every subsector the processing service knows about, in display order.
pub const SUBSECTORS: [&str; 69] = [
    // Commercial
    "commercial air conditioning",
    "commercial cooking",
    "commercial lighting",
    "commercial other",
    "commercial refrigeration",
    "commercial space heating",
    "commercial ventilation",
    "commercial water heating",
    "data center cooling",
    "data center it",
    "district services",
    "office equipment (non-p.c.)",
    "office equipment (p.c.)",
    "streetlights",
    // Industrial
    "agriculture-crops",
    "agriculture-other",
    "aluminum industry",
    "balance of manufacturing other",
    "bulk chemicals",
    "cement",
    "coal mining",
    "computer and electronic products",
    "construction",
    "electrical equip., appliances, and components",
    "fabricated metal products",
    "food and kindred products",
    "glass and glass products",
    "machinery",
    "metal and other non-metallic mining",
    "oil & gas mining",
    "paper and allied products",
    "petroleum refining",
    "plastic and rubber products",
    "transportation equipment",
    "wood products",
    // Residential
    "residential air conditioning",
    "residential ceiling fans",
    "residential clothes drying",
    "residential clothes washing",
    "residential cooking",
    "residential cooking - secondary",
    "residential dehumidifiers",
    "residential dishwashing",
    "residential freezing",
    "residential furnace fans and boiler pumps",
    "residential hot tubs",
    "residential humidifiers",
    "residential lighting",
    "residential microwaves",
    "residential other",
    "residential pool pumps",
    "residential refrigeration",
    "residential secondary heating",
    "residential space heating",
    "residential tv and peripherals",
    "residential water heating",
    // Transportation
    "combination long-haul truck",
    "combination short-haul truck",
    "light-commercial truck",
    "motor home",
    "other bus",
    "passenger car",
    "passenger rail",
    "passenger truck",
    "refuse truck",
    "school bus",
    "single unit long-haul truck",
    "single unit short-haul truck",
    "transit bus",
];

/// An immutable, ordered list of subsector names.
///
/// The form builder and the payload builder both take a `Catalog` rather than
/// reaching for [`SUBSECTORS`] directly, so tests can run against a short list.
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    names: &'static [&'static str],
}

impl Catalog {
    pub const fn new(names: &'static [&'static str]) -> Self {
        Catalog { names }
    }

    pub fn names(&self) -> &'static [&'static str] {
        self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, subsector: &str) -> bool {
        self.names.iter().any(|n| *n == subsector)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.names.iter().copied()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog::new(&SUBSECTORS)
    }
}
