//! User agent generation

use rand::seq::SliceRandom;
use rand::Rng;

const CHROME_VERSIONS: [&str; 6] = [
    "120.0.0.0",
    "121.0.0.0",
    "122.0.0.0",
    "123.0.0.0",
    "124.0.0.0",
    "125.0.0.0",
];

const FIREFOX_VERSIONS: [&str; 5] = ["121.0", "122.0", "123.0", "124.0", "125.0"];

const OS_STRINGS: [&str; 6] = [
    "Windows NT 10.0; Win64; x64",
    "Windows NT 11.0; Win64; x64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "Macintosh; Intel Mac OS X 14_2_1",
    "X11; Linux x86_64",
    "X11; Ubuntu; Linux x86_64",
];

/// Generate a random but realistic desktop browser user agent
pub fn generate_user_agent() -> String {
    let mut rng = rand::thread_rng();
    let os = OS_STRINGS.choose(&mut rng).copied().unwrap_or(OS_STRINGS[0]);

    // 2 in 3 Chrome, rest Firefox
    if rng.gen_ratio(2, 3) {
        let chrome = CHROME_VERSIONS
            .choose(&mut rng)
            .copied()
            .unwrap_or(CHROME_VERSIONS[0]);
        format!(
            "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
            os, chrome
        )
    } else {
        let firefox = FIREFOX_VERSIONS
            .choose(&mut rng)
            .copied()
            .unwrap_or(FIREFOX_VERSIONS[0]);
        format!(
            "Mozilla/5.0 ({}; rv:{}) Gecko/20100101 Firefox/{}",
            os, firefox, firefox
        )
    }
}

/// Standard accept header for HTML requests
pub fn accept_html() -> &'static str {
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
}

/// Standard accept header for JSON requests
pub fn accept_json() -> &'static str {
    "application/json,text/javascript,*/*;q=0.01"
}

/// Accept-Language header for an optional language filter
pub fn accept_language(lang: &str) -> String {
    if lang.is_empty() || lang == "en" {
        "en-US,en;q=0.9".to_string()
    } else {
        format!("{},en-US;q=0.9,en;q=0.8", lang)
    }
}
