/// Keyword → glyph, checked in order; the first keyword found in the header wins.
pub const SECTION_GLYPHS: &[(&str, &str)] = &[
    ("HEADLINES", "📰"),
    ("LAUNCHES", "🚀"),
    ("DEEP DIVES", "🧠"),
    ("ANALYSIS", "🔍"),
    ("ENGINEERING", "🧑‍💻"),
    ("RESEARCH", "🔬"),
    ("MISCELLANEOUS", "🎁"),
    ("QUICK LINKS", "⚡"),
    ("BIG TECH", "🏢"),
    ("STARTUPS", "🌱"),
    ("SCIENCE", "🔭"),
    ("PROGRAMMING", "💻"),
    ("SECURITY", "🔒"),
    ("OPINIONS", "💭"),
];

/// Turn an all-caps header ("DEEP DIVES & ANALYSIS") into a section label
/// ("🧠 Deep Dives & Analysis").
pub fn classify_section(header: &str) -> String {
    let header = header.trim();
    let title = title_case(header);
    let upper = header.to_uppercase();

    match SECTION_GLYPHS.iter().find(|(key, _)| upper.contains(key)) {
        Some((_, glyph)) => format!("{} {}", glyph, title),
        None => title,
    }
}

/// Upper-case the first letter of each alphabetic run, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

// ── Tests ──
