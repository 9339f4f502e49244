//! Country token normalization for bundle coverage lists.
//!
//! Catalog entries and run parameters may name either individual ISO 3166-1
//! alpha-2 country codes or whole region groups ("africa", "europe", ...).
//! Region tokens expand to their member codes; plain tokens pass through
//! uppercased. Duplicates are dropped keeping the first occurrence, so the
//! output order follows the input order.

/// Countries of the African continent (ISO 3166-1 alpha-2).
const AFRICA: &[&str] = &[
    "DZ", "AO", "BJ", "BW", "BF", "BI", "CM", "CV", "CF", "TD", "KM", "CG", "CD", "CI", "DJ",
    "EG", "GQ", "ER", "SZ", "ET", "GA", "GM", "GH", "GN", "GW", "KE", "LS", "LR", "LY", "MG",
    "MW", "ML", "MR", "MU", "MA", "MZ", "NA", "NE", "NG", "RW", "ST", "SN", "SC", "SL", "SO",
    "ZA", "SS", "SD", "TZ", "TG", "TN", "UG", "ZM", "ZW",
];

/// Countries of the Asian continent.
const ASIA: &[&str] = &[
    "AE", "AF", "AM", "AZ", "BD", "BH", "BN", "BT", "CN", "GE", "ID", "IL", "IN", "IQ", "IR",
    "JO", "JP", "KG", "KH", "KP", "KR", "KW", "KZ", "LA", "LB", "LK", "MM", "MN", "MY", "NP",
    "OM", "PH", "PK", "PS", "QA", "SA", "SG", "SY", "TH", "TJ", "TL", "TM", "TR", "TW", "UZ",
    "VN", "YE",
];

/// Countries of the European continent.
const EUROPE: &[&str] = &[
    "AL", "AD", "AT", "BA", "BE", "BG", "BY", "CH", "CY", "CZ", "DE", "DK", "EE", "ES", "FI",
    "FR", "GB", "GR", "HR", "HU", "IE", "IS", "IT", "LI", "LT", "LU", "LV", "MC", "MD", "ME",
    "MK", "MT", "NL", "NO", "PL", "PT", "RO", "RS", "SE", "SI", "SK", "SM", "UA", "XK",
];

/// Countries of Oceania.
const OCEANIA: &[&str] = &[
    "AU", "CK", "FJ", "FM", "KI", "MH", "NR", "NU", "NZ", "PG", "PW", "SB", "TO", "TV", "VU",
    "WS",
];

/// Countries of North and Central America plus the Caribbean.
const NORTH_AMERICA: &[&str] = &[
    "AG", "BB", "BS", "BZ", "CA", "CR", "CU", "DM", "DO", "GD", "GT", "HN", "HT", "JM", "KN",
    "LC", "MX", "NI", "PA", "SV", "TT", "US", "VC",
];

/// Countries of South America.
const SOUTH_AMERICA: &[&str] = &[
    "AR", "BO", "BR", "CL", "CO", "EC", "GY", "PE", "PY", "SR", "UY", "VE",
];

/// Looks up the member codes for a region group token.
///
/// Matching is case-insensitive and ignores spaces, hyphens, and underscores,
/// so "North America", "north_america", and "NORTHAMERICA" all resolve.
/// Returns `None` for tokens that are not region groups.
#[must_use]
pub fn region_members(token: &str) -> Option<&'static [&'static str]> {
    let key: String = token
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .to_lowercase();
    match key.as_str() {
        "africa" => Some(AFRICA),
        "asia" => Some(ASIA),
        "europe" => Some(EUROPE),
        "oceania" => Some(OCEANIA),
        "northamerica" => Some(NORTH_AMERICA),
        "southamerica" => Some(SOUTH_AMERICA),
        _ => None,
    }
}

/// Expands a mixed list of country codes and region tokens into a country
/// code list.
///
/// Region tokens contribute their members in table order; other tokens pass
/// through uppercased. The first occurrence of a code wins, so the output is
/// duplicate-free and its order is reproducible from the input.
#[must_use]
pub fn normalize<S: AsRef<str>>(tokens: &[S]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for token in tokens {
        let token = token.as_ref();
        if let Some(members) = region_members(token) {
            for code in members {
                push_unique(&mut seen, (*code).to_string());
            }
        } else {
            push_unique(&mut seen, token.trim().to_uppercase());
        }
    }
    seen.retain(|code| !code.is_empty());
    seen
}

fn push_unique(list: &mut Vec<String>, code: String) {
    if !list.iter().any(|existing| *existing == code) {
        list.push(code);
    }
}
