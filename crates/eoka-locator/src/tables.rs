//! Fixed region and element-kind lookup tables.

/// Matches any element.
pub const ANY: &[&str] = &["*"];

const NAVIGATION: &[&str] = &["nav", "[role=\"navigation\"]", "[class*=\"nav\"]"];
const HEADER: &[&str] = &["header", "[role=\"banner\"]", "[class*=\"header\"]"];
const FOOTER: &[&str] = &["footer", "[role=\"contentinfo\"]", "[class*=\"footer\"]"];
const SIDEBAR: &[&str] = &["aside", "[role=\"complementary\"]", "[class*=\"sidebar\"]"];
const MAIN: &[&str] = &["main", "[role=\"main\"]", "[class*=\"content\"]"];
const FORM: &[&str] = &["form", "[role=\"form\"]", "[role=\"search\"]"];
const DIALOG: &[&str] = &["[role=\"dialog\"]", "[aria-modal=\"true\"]", "[class*=\"modal\"]"];

const BUTTON: &[&str] = &[
    "button",
    "[role=\"button\"]",
    "input[type=\"submit\"]",
    "input[type=\"button\"]",
];
const LINK: &[&str] = &["a", "[role=\"link\"]"];
const TAB: &[&str] = &["[role=\"tab\"]", "[class*=\"tab\"]", "[data-tab]"];
const MENU_ITEM: &[&str] = &["[role=\"menuitem\"]", "[role=\"menu\"] a", "li > a"];
const CHECKBOX: &[&str] = &["input[type=\"checkbox\"]", "[role=\"checkbox\"]", "label"];
const SELECT: &[&str] = &["select", "[role=\"combobox\"]", "[role=\"listbox\"]"];
const HEADING: &[&str] = &["h1", "h2", "h3", "[role=\"heading\"]"];
const IMAGE: &[&str] = &["img", "[role=\"img\"]", "svg"];

/// Element kinds that accept typed text.
pub const INPUT: &[&str] = &["input", "textarea", "[contenteditable=\"true\"]"];

/// Locators for a page region. Unknown regions match anything.
pub fn region_locators(region: &str) -> &'static [&'static str] {
    let r = region.trim().to_lowercase();
    if r.contains("nav") || r.contains("menu bar") {
        NAVIGATION
    } else if r.contains("header") || r.contains("banner") || r == "top" {
        HEADER
    } else if r.contains("footer") || r == "bottom" {
        FOOTER
    } else if r.contains("sidebar") || r.contains("side panel") || r.contains("aside") {
        SIDEBAR
    } else if r.contains("main") || r.contains("content") || r == "body" {
        MAIN
    } else if r.contains("form") || r.contains("search") {
        FORM
    } else if r.contains("modal") || r.contains("dialog") || r.contains("popup") {
        DIALOG
    } else {
        ANY
    }
}

/// Locators for an element kind. Unknown kinds match anything.
pub fn kind_locators(kind: &str) -> &'static [&'static str] {
    let k = kind.trim().to_lowercase();
    match k.as_str() {
        "button" | "btn" | "submit" => BUTTON,
        "link" | "anchor" | "a" | "hyperlink" => LINK,
        "tab" => TAB,
        "menuitem" | "menu item" | "menu" => MENU_ITEM,
        "input" | "field" | "textbox" | "text field" | "input field" | "search box"
        | "textarea" => INPUT,
        "checkbox" | "toggle" => CHECKBOX,
        "select" | "dropdown" | "combobox" => SELECT,
        "heading" | "header" | "title" => HEADING,
        "image" | "icon" | "img" => IMAGE,
        _ => ANY,
    }
}

/// Whether a region resolves to a concrete table entry.
pub fn is_known_region(region: &str) -> bool {
    region_locators(region) != ANY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_region() {
        assert_eq!(region_locators("main navigation")[0], "nav");
        assert_eq!(region_locators("Navigation")[1], "[role=\"navigation\"]");
        assert!(is_known_region("nav"));
    }

    #[test]
    fn unknown_falls_back_to_any() {
        assert_eq!(region_locators("unknown"), ANY);
        assert_eq!(kind_locators("unknown"), ANY);
        assert!(!is_known_region(""));
    }

    #[test]
    fn button_kind() {
        let b = kind_locators("Button");
        assert_eq!(b[0], "button");
        assert!(b.contains(&"input[type=\"submit\"]"));
    }
}
