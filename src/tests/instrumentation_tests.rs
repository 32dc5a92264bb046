//! tests/instrumentation_tests.rs

use crate::services::instrumentation_service::{
    embed_open_beacon, tracking_pixel, tracking_urls,
};

#[test]
fn tracking_urls_encode_campaign_and_contact() {
    let urls = tracking_urls("https://crm.example.com/", 12, 345);

    assert_eq!(urls.open_url, "https://crm.example.com/api/tracking/open/12/345");
    assert_eq!(urls.click_url, "https://crm.example.com/api/tracking/click/12/345");
    assert_eq!(
        urls.unsubscribe_url,
        "https://crm.example.com/api/tracking/unsubscribe/12/345"
    );
}

#[test]
fn beacon_goes_right_before_closing_body() {
    let html = "<html><body><p>Hi</p></body></html>";
    let out = embed_open_beacon(html, "https://t/open/1/2");

    assert!(out.starts_with("<html><body><p>Hi</p><img src=\"https://t/open/1/2\""));
    assert!(out.ends_with("</body></html>"));
    assert_eq!(out.matches("<img").count(), 1);
}

#[test]
fn beacon_is_appended_without_body_marker() {
    let out = embed_open_beacon("<p>fragment</p>", "https://t/open/1/2");

    assert!(out.starts_with("<p>fragment</p><img"));
    assert!(out.contains("width=\"1\" height=\"1\""));
}

#[test]
fn pixel_is_a_png() {
    let pixel = tracking_pixel();
    assert!(pixel.len() > 8);
    assert_eq!(&pixel[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
}
