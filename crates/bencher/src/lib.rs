//! Shared inputs of the benchmarks.

use plumb_http::protocol::{Headers, ResponseHead};

/// Raw request bytes kept under `resources/request`.
#[derive(Debug, Copy, Clone)]
pub struct RequestFixture {
    name: &'static str,
    content: &'static str,
}

impl RequestFixture {
    pub const fn new(name: &'static str, content: &'static str) -> Self {
        Self { name, content }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn content(&self) -> &'static str {
        self.content
    }
}

pub static SMALL_GET: RequestFixture = RequestFixture::new("small_get", include_str!("../resources/request/get_small.txt"));
pub static LARGE_GET: RequestFixture = RequestFixture::new("large_get", include_str!("../resources/request/get_large.txt"));
pub static CHUNKED_POST: RequestFixture =
    RequestFixture::new("chunked_post", include_str!("../resources/request/post_chunked.txt"));

pub fn request_fixtures() -> [RequestFixture; 3] {
    [SMALL_GET, LARGE_GET, CHUNKED_POST]
}

/// Response heads from the cheapest to the most expensive to encode.
pub fn response_heads() -> Vec<(&'static str, ResponseHead)> {
    let plain = {
        let mut head = ResponseHead::new(200);
        head.set_content_length(Some(13));
        head
    };

    let typical = {
        let mut headers = Headers::with_capacity(4);
        headers.push("Content-Type", "text/html; charset=utf-8");
        headers.push("Cache-Control", "no-cache");
        headers.push("X-Request-Id", "0f6c1f1e-3d2b-4f8e-9f55-3c1a7e0d2b44");
        let mut head = ResponseHead::new(200);
        head.set_headers(headers);
        head
    };

    let cookies = {
        let mut headers = Headers::with_capacity(2);
        headers.push("Content-Type", "application/json");
        headers.push("Set-Cookie", "session=8f1c2b7e4d3a9f60; HttpOnly\ntheme=dark\ntz=Europe%2FBerlin");
        let mut head = ResponseHead::new(404);
        head.set_headers(headers);
        head.set_content_length(Some(2));
        head
    };

    vec![("status_only", plain), ("typical_chunked", typical), ("multiline_cookies", cookies)]
}
