//! Unit of measure codes accepted on invoice lines.
//!
//! The authority's unit table follows UN/CEFACT Recommendation 20 plus the
//! legacy "94" (unidad) code. This covers the codes seen on retail and
//! service invoices.

/// Check whether `code` is an accepted unit of measure code.
pub fn is_known_unit_code(code: &str) -> bool {
    UNIT_CODES.binary_search(&code).is_ok()
}

/// Sorted for binary search.
static UNIT_CODES: &[&str] = &[
    "94",  // Unidad
    "BX",  // Box
    "C62", // One (piece/unit)
    "CMT", // Centimetre
    "DAY", // Day
    "DZN", // Dozen
    "EA",  // Each
    "GLL", // Gallon (US)
    "GRM", // Gram
    "HUR", // Hour
    "KGM", // Kilogram
    "KWH", // Kilowatt-hour
    "LBR", // Pound
    "LTR", // Litre
    "MIN", // Minute
    "MLT", // Millilitre
    "MON", // Month
    "MTK", // Square metre
    "MTQ", // Cubic metre
    "MTR", // Metre
    "NAR", // Number of articles
    "PR",  // Pair
    "SET", // Set
    "TNE", // Tonne (metric ton)
    "WEE", // Week
    "XBG", // Bag
    "XPK", // Package
];
