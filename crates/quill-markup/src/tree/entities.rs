//! Named HTML entities the XML tokenizer does not know.
//!
//! Authors write raw HTML with `&nbsp;`, `&mdash;` and friends. These are
//! replaced by their characters before tokenizing; the five XML entities and
//! numeric references are left for the tokenizer.

/// Decode an entity reference body (`amp`, `#39`, `#x27`) as reported by the
/// tokenizer. Unknown references are kept literally.
pub(crate) fn decode_reference(entity: &str) -> String {
    let decoded = match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => entity.strip_prefix('#').and_then(|num| {
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => num.parse().ok(),
            };
            code.and_then(char::from_u32)
        }),
    };
    decoded.map_or_else(|| format!("&{entity};"), String::from)
}

/// Character for a named HTML entity outside the XML set.
pub(super) fn named_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "nbsp" => "\u{00a0}",
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "zwnj" => "\u{200c}",
        "zwj" => "\u{200d}",
        "shy" => "\u{00ad}",

        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "bull" => "\u{2022}",
        "middot" => "\u{00b7}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "laquo" => "\u{00ab}",
        "raquo" => "\u{00bb}",

        "larr" => "\u{2190}",
        "uarr" => "\u{2191}",
        "rarr" => "\u{2192}",
        "darr" => "\u{2193}",
        "harr" => "\u{2194}",

        "times" => "\u{00d7}",
        "divide" => "\u{00f7}",
        "plusmn" => "\u{00b1}",
        "le" => "\u{2264}",
        "ge" => "\u{2265}",
        "ne" => "\u{2260}",
        "deg" => "\u{00b0}",
        "micro" => "\u{00b5}",

        "copy" => "\u{00a9}",
        "reg" => "\u{00ae}",
        "trade" => "\u{2122}",
        "sect" => "\u{00a7}",
        "para" => "\u{00b6}",

        "euro" => "\u{20ac}",
        "pound" => "\u{00a3}",
        "yen" => "\u{00a5}",
        "cent" => "\u{00a2}",

        "frac12" => "\u{00bd}",
        "frac14" => "\u{00bc}",
        "frac34" => "\u{00be}",
        "sup2" => "\u{00b2}",
        "sup3" => "\u{00b3}",
        _ => return None,
    })
}
