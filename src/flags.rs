//! Country name → flag image URL for player nationalities.

/// ISO 3166-1 alpha-2 codes keyed by the country names the provider uses.
/// flagcdn only serves ISO2 codes, so the home nations all map to "gb".
const ISO2_BY_NAME: &[(&str, &str)] = &[
    // Europe
    ("Italy", "it"),
    ("Spain", "es"),
    ("France", "fr"),
    ("Germany", "de"),
    ("Portugal", "pt"),
    ("Netherlands", "nl"),
    ("Belgium", "be"),
    ("Switzerland", "ch"),
    ("Austria", "at"),
    ("Poland", "pl"),
    ("Sweden", "se"),
    ("Norway", "no"),
    ("Denmark", "dk"),
    ("Turkey", "tr"),
    ("Türkiye", "tr"),
    ("Greece", "gr"),
    ("Ukraine", "ua"),
    ("Russia", "ru"),
    ("Croatia", "hr"),
    ("Serbia", "rs"),
    ("Albania", "al"),
    ("Bosnia", "ba"),
    ("Bosnia and Herzegovina", "ba"),
    ("Montenegro", "me"),
    ("Kosovo", "xk"),
    ("North Macedonia", "mk"),
    ("Slovakia", "sk"),
    ("Slovenia", "si"),
    ("Romania", "ro"),
    ("Bulgaria", "bg"),
    ("Hungary", "hu"),
    ("Czech Republic", "cz"),
    ("Ireland", "ie"),
    ("England", "gb"),
    ("Scotland", "gb"),
    ("Wales", "gb"),
    ("Northern Ireland", "gb"),
    // South America
    ("Argentina", "ar"),
    ("Brazil", "br"),
    ("Uruguay", "uy"),
    ("Colombia", "co"),
    ("Chile", "cl"),
    ("Peru", "pe"),
    ("Venezuela", "ve"),
    ("Ecuador", "ec"),
    // North America
    ("United States", "us"),
    ("USA", "us"),
    ("Mexico", "mx"),
    // Africa
    ("Morocco", "ma"),
    ("Algeria", "dz"),
    ("Tunisia", "tn"),
    ("Egypt", "eg"),
    ("Nigeria", "ng"),
    ("Ghana", "gh"),
    ("Senegal", "sn"),
    ("Cameroon", "cm"),
    ("Ivory Coast", "ci"),
    ("Côte d'Ivoire", "ci"),
    ("Cote d'Ivoire", "ci"),
    ("Gambia", "gm"),
    // Asia
    ("Iran", "ir"),
    ("Japan", "jp"),
    ("South Korea", "kr"),
    ("Korea Republic", "kr"),
];

/// Provider spellings that differ from the table's canonical names.
const ALIASES: &[(&str, &str)] = &[
    ("IR Iran", "Iran"),
    ("Russian Federation", "Russia"),
    ("Czechia", "Czech Republic"),
    ("Curaçao", "Curacao"),
];

/// Image widths flagcdn serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagSize {
    W40,
    W48,
    W64,
}

impl FlagSize {
    /// Width from a query parameter; anything unsupported is `None`.
    pub fn from_width(px: u32) -> Option<Self> {
        match px {
            40 => Some(FlagSize::W40),
            48 => Some(FlagSize::W48),
            64 => Some(FlagSize::W64),
            _ => None,
        }
    }

    fn px(self) -> u32 {
        match self {
            FlagSize::W40 => 40,
            FlagSize::W48 => 48,
            FlagSize::W64 => 64,
        }
    }
}

pub fn normalize_country_name(name: &str) -> &str {
    let n = name.trim();
    ALIASES
        .iter()
        .find(|(from, _)| *from == n)
        .map(|(_, to)| *to)
        .unwrap_or(n)
}

pub fn iso2_for(name: &str) -> Option<&'static str> {
    let n = normalize_country_name(name);
    if n.is_empty() {
        return None;
    }
    ISO2_BY_NAME
        .iter()
        .find(|(country, _)| *country == n)
        .map(|(_, code)| *code)
}

/// `https://flagcdn.com/w{size}/{code}.png`, or `None` for unknown countries.
pub fn flag_url_from_country_name(name: &str, size: FlagSize) -> Option<String> {
    iso2_for(name).map(|code| format!("https://flagcdn.com/w{}/{}.png", size.px(), code))
}
