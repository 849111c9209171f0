//! Query-string parsing for the compression endpoint.
//!
//! `url` may repeat: clients that fail to escape `&` inside the source URL
//! end up splitting it across several `url` parameters.

/// Raw query parameters of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// Every `url` value, in order.
    pub urls: Vec<String>,
    /// `jpeg`: present means "do not use WebP".
    pub jpeg: Option<String>,
    /// `bw`: grayscale switch.
    pub bw: Option<String>,
    /// `l`: quality.
    pub l: Option<String>,
}

impl QueryParams {
    /// Parse a raw (still percent-encoded) query string.
    pub fn parse(query: Option<&str>) -> Self {
        let mut params = Self::default();
        let Some(query) = query else {
            return params;
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "url" => params.urls.push(value.into_owned()),
                "jpeg" => params.jpeg = Some(value.into_owned()),
                "bw" => params.bw = Some(value.into_owned()),
                "l" => params.l = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}
