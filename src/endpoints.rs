//! Endpoint URLs for the Mail.tm API.

use reqwest::Url;

use crate::{Error, Result};

/// Default REST API base URL.
pub const BASE_URL: &str = "https://api.mail.tm";
/// Default Mercure hub used for live events.
pub const SSE_URL: &str = "https://mercure.mail.tm/.well-known/mercure";

/// URL builder anchored at a base URL and an SSE hub URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
    sse: Url,
}

impl Endpoints {
    /// Parse and validate both base URLs.
    pub fn new(base: &str, sse: &str) -> Result<Self> {
        Ok(Self {
            base: parse_base(base)?,
            sse: parse_base(sse)?,
        })
    }

    /// `token`: exchange credentials for a JWT.
    pub fn token(&self) -> Url {
        self.join(&["token"])
    }

    /// `me`: the account owning the token.
    pub fn me(&self) -> Url {
        self.join(&["me"])
    }

    /// `accounts`: account registration.
    pub fn accounts(&self) -> Url {
        self.join(&["accounts"])
    }

    /// `accounts/<id>`.
    pub fn account(&self, id: &str) -> Url {
        self.join(&["accounts", id])
    }

    /// `domains`: available domains.
    pub fn domains(&self) -> Url {
        self.join(&["domains"])
    }

    /// `domains/<id>`.
    pub fn domain(&self, id: &str) -> Url {
        self.join(&["domains", id])
    }

    /// `messages` without a page query.
    pub fn messages(&self) -> Url {
        self.join(&["messages"])
    }

    /// `messages?page=<page>`; page 0 is treated as 1.
    pub fn messages_page(&self, page: u32) -> Url {
        let mut url = self.messages();
        url.query_pairs_mut()
            .append_pair("page", &page.max(1).to_string());
        url
    }

    /// `messages/<id>`.
    pub fn message(&self, id: &str) -> Url {
        self.join(&["messages", id])
    }

    /// `sources/<id>`: raw message source.
    pub fn source(&self, id: &str) -> Url {
        self.join(&["sources", id])
    }

    /// Live event stream for one account: `<sse>?topic=/accounts/<id>`.
    pub fn live(&self, account_id: &str) -> Url {
        let mut url = self.sse.clone();
        url.query_pairs_mut()
            .append_pair("topic", &format!("/accounts/{account_id}"));
        url
    }

    fn join(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Bases are validated in `new`, so they always have path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

fn parse_base(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::Config(format!("invalid URL {raw:?}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(Error::Config(format!("URL {raw:?} cannot be used as a base")));
    }
    Ok(url)
}
