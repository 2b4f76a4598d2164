use url::Url;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Blocking transport used by cache workers. Transport failures are `Err`; HTTP error statuses
/// come back as a response and are judged by the cache.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &Url) -> anyhow::Result<FetchResponse>;
}

/// Fetcher that refuses every request; for offline hosts that only read already-cached files.
#[derive(Debug, Default)]
pub struct OfflineFetcher;

impl Fetch for OfflineFetcher {
    fn fetch(&self, url: &Url) -> anyhow::Result<FetchResponse> {
        anyhow::bail!("offline: refusing to fetch '{url}'")
    }
}

#[cfg(feature = "http")]
pub use http::HttpFetcher;

#[cfg(feature = "http")]
mod http {
    use anyhow::Context as _;

    use super::{Fetch, FetchResponse};

    #[derive(Debug)]
    pub struct HttpFetcher {
        client: reqwest::blocking::Client,
    }

    impl HttpFetcher {
        pub fn new() -> anyhow::Result<Self> {
            let client = reqwest::blocking::Client::builder()
                .user_agent(concat!("swipebook/", env!("CARGO_PKG_VERSION")))
                .build()
                .context("build http client")?;
            Ok(Self { client })
        }
    }

    impl Fetch for HttpFetcher {
        fn fetch(&self, url: &url::Url) -> anyhow::Result<FetchResponse> {
            let res = self
                .client
                .get(url.as_str())
                .send()
                .with_context(|| format!("GET {url}"))?;
            let status = res.status().as_u16();
            let body = res.bytes().context("read response body")?.to_vec();
            Ok(FetchResponse { status, body })
        }
    }
}
