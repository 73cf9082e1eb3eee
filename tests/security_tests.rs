use std::time::Duration;

use searchgate::*;

mod common;

#[cfg(test)]
mod traversal_guard_tests {
    use super::*;

    #[test]
    fn test_relative_urls_rejected() {
        assert_eq!(classify_url("index.html"), UrlClassification::Rejected);
        assert_eq!(classify_url("../secret"), UrlClassification::Rejected);
        assert_eq!(classify_url(""), UrlClassification::Rejected);
        assert_eq!(classify_url("http://evil/"), UrlClassification::Rejected);
    }

    #[test]
    fn test_embedded_parent_dir_rejected() {
        assert_eq!(classify_url("/../etc/passwd"), UrlClassification::Rejected);
        assert_eq!(classify_url("/a/../b"), UrlClassification::Rejected);
        assert_eq!(classify_url("/a/b/../../c"), UrlClassification::Rejected);
    }

    #[test]
    fn test_trailing_parent_dir_rejected() {
        assert_eq!(classify_url("/.."), UrlClassification::Rejected);
        assert_eq!(classify_url("/a/.."), UrlClassification::Rejected);
        assert_eq!(classify_url("/a/b/.."), UrlClassification::Rejected);
    }

    #[test]
    fn test_lookalike_paths_allowed() {
        // Dots that are not a parent-dir component pass the guard.
        assert!(matches!(
            classify_url("/..a"),
            UrlClassification::StaticPath(_)
        ));
        assert!(matches!(
            classify_url("/a..b/c"),
            UrlClassification::StaticPath(_)
        ));
        assert!(matches!(
            classify_url("/a.../b"),
            UrlClassification::StaticPath(_)
        ));
    }

    #[test]
    fn test_encoded_traversal_not_caught() {
        // Known gap: the guard does no percent-decoding, so an encoded
        // traversal classifies as a static path.
        assert!(matches!(
            classify_url("/%2e%2e/secret"),
            UrlClassification::StaticPath(_)
        ));
    }
}

#[cfg(test)]
mod rejection_e2e_tests {
    use super::*;

    #[tokio::test]
    async fn test_traversal_url_gets_400_regardless_of_filesystem() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("index.html"), b"hello").unwrap();

        // No backend at all; rejection must never reach it.
        let backend = "127.0.0.1:9".parse().unwrap();
        let addr = common::spawn_server(root.path(), backend, Duration::from_secs(5)).await;

        for url in ["/../index.html", "/a/../index.html", "/a/.."] {
            let response = common::send_get(addr, url).await;
            assert_eq!(
                common::status_line(&response),
                "HTTP/1.0 400 Bad Request",
                "url {} should be rejected",
                url
            );
            let (_, body) = common::split_response(&response);
            assert_eq!(body, b"<html><body><h1>400 Bad Request</h1></body></html>");
        }
    }

    #[tokio::test]
    async fn test_relative_url_gets_400() {
        let root = tempfile::tempdir().unwrap();
        let backend = "127.0.0.1:9".parse().unwrap();
        let addr = common::spawn_server(root.path(), backend, Duration::from_secs(5)).await;

        let response = common::send_raw(addr, b"GET etc/passwd HTTP/1.1\r\n\r\n").await;
        assert_eq!(common::status_line(&response), "HTTP/1.0 400 Bad Request");
    }
}
