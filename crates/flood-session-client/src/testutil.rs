//! Shared test utilities and fixtures.

use flood_session_types::ClientConfig;
use serde_json::json;

use crate::transport::{HttpResponse, MockHttpTransport};

pub(crate) const TEST_HOST: &str = "https://example.com:1234/";
pub(crate) const TEST_USERNAME: &str = "testuser";
pub(crate) const TEST_PASSWORD: &str = "testpassw0rd";

/// A minimal single-file torrent.
pub(crate) const TEST_TORRENT: &[u8] = b"d8:announce39:udp://tracker.example.com:1337/announce\
4:infod6:lengthi20e4:name8:file.txt12:piece lengthi16384e6:pieces20:aaaaaaaaaaaaaaaaaaaaee";

pub(crate) fn test_config() -> ClientConfig {
    ClientConfig::try_new(TEST_USERNAME, TEST_PASSWORD, TEST_HOST).unwrap()
}

pub(crate) fn auth_success() -> HttpResponse {
    HttpResponse::json_body(
        200,
        &json!({ "success": true, "username": TEST_USERNAME, "level": 10 }),
    )
}

pub(crate) fn auth_failure() -> HttpResponse {
    HttpResponse::json_body(401, &json!({ "message": "Failed login." }))
}

/// Expects exactly one authenticate POST carrying the test credentials.
pub(crate) fn expect_login(mock: &mut MockHttpTransport, response: HttpResponse) {
    mock.expect_post_json()
        .withf(|url, body| {
            url.as_str() == "https://example.com:1234/api/auth/authenticate"
                && *body == json!({ "username": TEST_USERNAME, "password": TEST_PASSWORD })
        })
        .times(1)
        .returning(move |_, _| Ok(response.clone()));
}
