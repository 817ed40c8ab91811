//! Realistic client signatures for outbound requests

use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

/// Browser engine family; decides which companion headers are consistent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserFamily {
    Chromium,
    Firefox,
    Safari,
}

/// A user agent together with the headers that browser actually sends
#[derive(Debug, Clone, Copy)]
pub struct ClientProfile {
    pub user_agent: &'static str,
    pub family: BrowserFamily,
    /// `sec-ch-ua` brand list, Chromium only
    pub client_hints: Option<&'static str>,
    pub platform: &'static str,
}

pub const PROFILES: &[ClientProfile] = &[
    ClientProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        family: BrowserFamily::Chromium,
        client_hints: Some(r#""Google Chrome";v="131", "Chromium";v="131", "Not_A Brand";v="24""#),
        platform: r#""Windows""#,
    },
    ClientProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
        family: BrowserFamily::Chromium,
        client_hints: Some(r#""Google Chrome";v="130", "Chromium";v="130", "Not?A_Brand";v="99""#),
        platform: r#""macOS""#,
    },
    ClientProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
        family: BrowserFamily::Chromium,
        client_hints: Some(r#""Microsoft Edge";v="131", "Chromium";v="131", "Not_A Brand";v="24""#),
        platform: r#""Windows""#,
    },
    ClientProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
        family: BrowserFamily::Firefox,
        client_hints: None,
        platform: r#""Windows""#,
    },
    ClientProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:132.0) Gecko/20100101 Firefox/132.0",
        family: BrowserFamily::Firefox,
        client_hints: None,
        platform: r#""macOS""#,
    },
    ClientProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
        family: BrowserFamily::Safari,
        client_hints: None,
        platform: r#""macOS""#,
    },
];

impl ClientProfile {
    /// Picks a profile uniformly at random
    pub fn random() -> &'static ClientProfile {
        PROFILES
            .choose(&mut rand::thread_rng())
            .unwrap_or(&PROFILES[0])
    }

    /// Header set matching this profile
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(self.user_agent));

        let accept = match self.family {
            BrowserFamily::Chromium => {
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
            }
            BrowserFamily::Firefox | BrowserFamily::Safari => {
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
            }
        };
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        if let Some(hints) = self.client_hints {
            headers.insert("sec-ch-ua", HeaderValue::from_static(hints));
            headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
            headers.insert("sec-ch-ua-platform", HeaderValue::from_static(self.platform));
        }

        headers
    }
}
