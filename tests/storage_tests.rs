use sta_clara::storage::{MockStorageService, S3StorageClient, StorageService, sanitize_key};
use uuid::Uuid;

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockStorageService::new();
        let key = "photos/sunset.jpg";
        let url = mock
            .get_presigned_upload_url(key, "image/jpeg")
            .await
            .unwrap();

        assert!(url.contains("signature=fake"));
        assert!(url.contains(key));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockStorageService::new_failing();
        assert!(
            mock.get_presigned_upload_url("photos/a.png", "image/png")
                .await
                .is_err()
        );
        assert!(mock.delete_object("photos/a.png").await.is_err());
        assert!(mock.deleted_keys().is_empty());
    }

    #[tokio::test]
    async fn test_mock_sanitization() {
        let mock = MockStorageService::new();
        let url = mock
            .get_presigned_upload_url("../../etc/passwd", "image/png")
            .await
            .unwrap();
        assert!(!url.contains(".."));

        mock.delete_object("photos/../a.jpg").await.unwrap();
        assert_eq!(mock.deleted_keys(), vec!["photos/a.jpg"]);
    }
}

mod public_url_tests {
    use super::*;

    #[test]
    fn test_public_url_joins_base_and_key() {
        let mock = MockStorageService::with_public_base("https://cdn.example/bucket/");
        assert_eq!(
            mock.public_url("/photos//a.jpg"),
            "https://cdn.example/bucket/photos/a.jpg"
        );
    }

    #[test]
    fn test_key_from_public_url_round_trips() {
        let mock = MockStorageService::with_public_base("https://cdn.example/bucket");
        let url = mock.public_url("foods/b.png");
        assert_eq!(mock.key_from_public_url(&url).as_deref(), Some("foods/b.png"));
        assert_eq!(
            mock.key_from_public_url("https://cdn.example/bucket/foods/b.png?v=2#top")
                .as_deref(),
            Some("foods/b.png")
        );
    }

    #[test]
    fn test_key_from_public_url_ignores_foreign_urls() {
        let mock = MockStorageService::with_public_base("https://cdn.example/bucket");
        assert!(mock.key_from_public_url("https://elsewhere.example/x.png").is_none());
        // Same prefix, different bucket.
        assert!(mock.key_from_public_url("https://cdn.example/bucket-two/x.png").is_none());
        assert!(mock.key_from_public_url("https://cdn.example/bucket/").is_none());
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("a/./b/../c"), "a/b/c");
        assert_eq!(sanitize_key("//lead/trail//"), "lead/trail");
        assert_eq!(sanitize_key(".."), "");
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    async fn client() -> S3StorageClient {
        S3StorageClient::new(
            "http://localhost:9000",
            "us-east-1",
            "testkey",
            "testsecret",
            "testbucket",
            "http://localhost:9000/testbucket",
        )
        .await
    }

    // Presigning is computed locally; no server needs to be running.
    #[tokio::test]
    async fn test_s3_presigned_url_format() {
        let client = client().await;
        let key = format!("photos/{}.jpg", Uuid::new_v4());

        let url = client
            .get_presigned_upload_url(&key, "image/jpeg")
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:9000/testbucket/"));
        assert!(url.contains(&key));
        assert!(url.contains("X-Amz-Signature"));
    }

    #[tokio::test]
    async fn test_s3_public_url() {
        let client = client().await;
        assert_eq!(
            client.public_url("photos/a.jpg"),
            "http://localhost:9000/testbucket/photos/a.jpg"
        );
    }
}
