//! Country detection from filenames and titles (§4.2), grounded in the
//! original `core/parsers/country.py`: an ISO-3166 alpha-2 table plus
//! an ordered list of regex patterns, bracketed/parenthesized codes
//! preferred over bare ones, full country-name match as the fallback.

use std::sync::LazyLock;

use regex::Regex;

/// ISO-3166-1 alpha-2 codes plus the historical/regional codes the
/// original table carries (`SU`, `YU`, `CS`, `XE`, `XW`, `XU`, `EU`).
const ISO_COUNTRIES: &[(&str, &str)] = &[
    ("US", "United States"),
    ("CA", "Canada"),
    ("MX", "Mexico"),
    ("UK", "United Kingdom"),
    ("DE", "Germany"),
    ("FR", "France"),
    ("IT", "Italy"),
    ("ES", "Spain"),
    ("PT", "Portugal"),
    ("NL", "Netherlands"),
    ("BE", "Belgium"),
    ("CH", "Switzerland"),
    ("AT", "Austria"),
    ("SE", "Sweden"),
    ("NO", "Norway"),
    ("DK", "Denmark"),
    ("FI", "Finland"),
    ("PL", "Poland"),
    ("CZ", "Czech Republic"),
    ("HU", "Hungary"),
    ("RO", "Romania"),
    ("BG", "Bulgaria"),
    ("GR", "Greece"),
    ("IE", "Ireland"),
    ("SK", "Slovakia"),
    ("HR", "Croatia"),
    ("SI", "Slovenia"),
    ("LT", "Lithuania"),
    ("LV", "Latvia"),
    ("EE", "Estonia"),
    ("IS", "Iceland"),
    ("LU", "Luxembourg"),
    ("MT", "Malta"),
    ("CY", "Cyprus"),
    ("JP", "Japan"),
    ("CN", "China"),
    ("KR", "South Korea"),
    ("IN", "India"),
    ("ID", "Indonesia"),
    ("TH", "Thailand"),
    ("MY", "Malaysia"),
    ("SG", "Singapore"),
    ("PH", "Philippines"),
    ("VN", "Vietnam"),
    ("TW", "Taiwan"),
    ("HK", "Hong Kong"),
    ("BD", "Bangladesh"),
    ("PK", "Pakistan"),
    ("NP", "Nepal"),
    ("LK", "Sri Lanka"),
    ("MM", "Myanmar"),
    ("KH", "Cambodia"),
    ("LA", "Laos"),
    ("MN", "Mongolia"),
    ("BT", "Bhutan"),
    ("MO", "Macao"),
    ("TR", "Turkey"),
    ("SA", "Saudi Arabia"),
    ("AE", "United Arab Emirates"),
    ("IL", "Israel"),
    ("IR", "Iran"),
    ("IQ", "Iraq"),
    ("JO", "Jordan"),
    ("LB", "Lebanon"),
    ("SY", "Syria"),
    ("YE", "Yemen"),
    ("OM", "Oman"),
    ("KW", "Kuwait"),
    ("QA", "Qatar"),
    ("BH", "Bahrain"),
    ("PS", "Palestine"),
    ("AM", "Armenia"),
    ("AZ", "Azerbaijan"),
    ("GE", "Georgia"),
    ("AU", "Australia"),
    ("NZ", "New Zealand"),
    ("FJ", "Fiji"),
    ("PG", "Papua New Guinea"),
    ("NC", "New Caledonia"),
    ("PF", "French Polynesia"),
    ("WS", "Samoa"),
    ("TO", "Tonga"),
    ("VU", "Vanuatu"),
    ("SB", "Solomon Islands"),
    ("KI", "Kiribati"),
    ("BR", "Brazil"),
    ("AR", "Argentina"),
    ("CL", "Chile"),
    ("CO", "Colombia"),
    ("PE", "Peru"),
    ("VE", "Venezuela"),
    ("EC", "Ecuador"),
    ("BO", "Bolivia"),
    ("PY", "Paraguay"),
    ("UY", "Uruguay"),
    ("GY", "Guyana"),
    ("SR", "Suriname"),
    ("GF", "French Guiana"),
    ("GT", "Guatemala"),
    ("HN", "Honduras"),
    ("NI", "Nicaragua"),
    ("CR", "Costa Rica"),
    ("PA", "Panama"),
    ("SV", "El Salvador"),
    ("BZ", "Belize"),
    ("CU", "Cuba"),
    ("DO", "Dominican Republic"),
    ("HT", "Haiti"),
    ("JM", "Jamaica"),
    ("TT", "Trinidad and Tobago"),
    ("BB", "Barbados"),
    ("BS", "Bahamas"),
    ("PR", "Puerto Rico"),
    ("ZA", "South Africa"),
    ("EG", "Egypt"),
    ("NG", "Nigeria"),
    ("KE", "Kenya"),
    ("ET", "Ethiopia"),
    ("GH", "Ghana"),
    ("MA", "Morocco"),
    ("DZ", "Algeria"),
    ("TN", "Tunisia"),
    ("UG", "Uganda"),
    ("TZ", "Tanzania"),
    ("ZW", "Zimbabwe"),
    ("SD", "Sudan"),
    ("AO", "Angola"),
    ("MZ", "Mozambique"),
    ("MG", "Madagascar"),
    ("CM", "Cameroon"),
    ("CI", "Ivory Coast"),
    ("SN", "Senegal"),
    ("ZM", "Zambia"),
    ("RW", "Rwanda"),
    ("SO", "Somalia"),
    ("ML", "Mali"),
    ("BW", "Botswana"),
    ("NA", "Namibia"),
    ("MW", "Malawi"),
    ("LY", "Libya"),
    ("BJ", "Benin"),
    ("BF", "Burkina Faso"),
    ("NE", "Niger"),
    ("TD", "Chad"),
    ("GA", "Gabon"),
    ("GN", "Guinea"),
    ("TG", "Togo"),
    ("LR", "Liberia"),
    ("MR", "Mauritania"),
    ("ER", "Eritrea"),
    ("GM", "Gambia"),
    ("LS", "Lesotho"),
    ("SZ", "Eswatini"),
    ("GQ", "Equatorial Guinea"),
    ("MU", "Mauritius"),
    ("DJ", "Djibouti"),
    ("KM", "Comoros"),
    ("SC", "Seychelles"),
    ("CV", "Cape Verde"),
    ("ST", "Sao Tome and Principe"),
    ("RU", "Russia"),
    ("UA", "Ukraine"),
    ("BY", "Belarus"),
    ("KZ", "Kazakhstan"),
    ("UZ", "Uzbekistan"),
    ("TM", "Turkmenistan"),
    ("KG", "Kyrgyzstan"),
    ("TJ", "Tajikistan"),
    ("MD", "Moldova"),
    ("SU", "Soviet Union"),
    ("YU", "Yugoslavia"),
    ("CS", "Czechoslovakia"),
    ("XE", "Europe"),
    ("XW", "Worldwide"),
    ("XU", "Unknown Country"),
    ("EU", "European Union"),
    ("AF", "Afghanistan"),
    ("AL", "Albania"),
    ("AD", "Andorra"),
    ("AG", "Antigua and Barbuda"),
    ("LC", "Saint Lucia"),
    ("VC", "Saint Vincent and the Grenadines"),
    ("GD", "Grenada"),
    ("DM", "Dominica"),
    ("KN", "Saint Kitts and Nevis"),
    ("LI", "Liechtenstein"),
    ("MC", "Monaco"),
    ("SM", "San Marino"),
    ("VA", "Vatican City"),
    ("BA", "Bosnia and Herzegovina"),
    ("ME", "Montenegro"),
    ("MK", "North Macedonia"),
    ("RS", "Serbia"),
    ("XK", "Kosovo"),
];

/// Ordered regex patterns for locating a country code embedded in
/// text. Earlier patterns (bracketed/parenthesized codes) take
/// priority over bare trailing/leading codes.
static COUNTRY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\[([A-Z]{2,3})\]",
        r"\(([A-Z]{2,3})\s+EDITION\)",
        r"\(([A-Z]{2,3})\)",
        r"\.([A-Z]{2,3})\.",
        r"-([A-Z]{2,3})-",
        r"/([A-Z]{2,3})/",
        r"\s([A-Z]{2,3})\s+[-\x{2013}\x{2014}]",
        r"[-\s]([A-Z]{2,3})$",
        r"^([A-Z]{2,3})[-\s]",
        r"\b([A-Z]{2,3})\s+EDITION\b",
        r"\s([A-Z]{2,3})\s+\w+\s+EDITION",
        r"\s([A-Z]{2,3})\s+[\x{00c9}\x{00e9}\x{00c8}\x{00e8}\x{00ca}\x{00ea}]DITION",
        r"\s([A-Z]{2,3})\)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("country pattern is a fixed valid regex"))
    .collect()
});

/// Looks up a country by 2-letter code, 3-letter code (first two
/// chars used), or full name.
#[must_use]
pub fn find_country(code_or_name: &str) -> Option<&'static str> {
    let search = code_or_name.trim();
    if search.is_empty() {
        return None;
    }
    let search = search.to_uppercase();

    if search.len() == 2 {
        return ISO_COUNTRIES.iter().find(|(code, _)| *code == search).map(|(_, name)| *name);
    }
    if search.len() == 3 {
        return ISO_COUNTRIES.iter().find(|(code, _)| *code == search[..2]).map(|(_, name)| *name);
    }

    ISO_COUNTRIES
        .iter()
        .find(|(_, name)| name.to_uppercase() == search)
        .map(|(_, name)| *name)
}

/// Detects a 2-letter country code embedded in `text`, preferring
/// bracketed/parenthesized forms, then falling back to a full
/// country-name search.
#[must_use]
pub fn detect_country(text: &str) -> Option<&'static str> {
    if text.is_empty() {
        return None;
    }
    let text_upper = text.to_uppercase();

    for pattern in COUNTRY_PATTERNS.iter() {
        for capture in pattern.captures_iter(&text_upper) {
            let Some(code_match) = capture.get(1) else { continue };
            let candidate = code_match.as_str();

            if let Some((code, _)) = ISO_COUNTRIES.iter().find(|(code, _)| *code == candidate) {
                return Some(code);
            }
            if candidate.len() == 3 {
                if let Some((code, _)) = ISO_COUNTRIES.iter().find(|(code, _)| *code == candidate[..2]) {
                    return Some(code);
                }
            }
        }
    }

    for (code, name) in ISO_COUNTRIES {
        let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(name)))
            .expect("country name pattern is always a valid regex");
        if pattern.is_match(text) {
            return Some(code);
        }
    }

    None
}
