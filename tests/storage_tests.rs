use base64::{Engine as _, engine::general_purpose::STANDARD};
use pettech_store::storage::{
    ImagePayload, ImageStore, MAX_UPLOAD_BYTES, MockImageStore, S3ImageStore, StorageError,
    decode_image_payload, object_key, sanitize_key,
};

fn payload() -> ImagePayload {
    ImagePayload {
        bytes: b"fake png".to_vec(),
        content_type: "image/png".to_string(),
    }
}

fn invalid_message(result: Result<ImagePayload, StorageError>) -> String {
    match result {
        Err(StorageError::InvalidPayload(message)) => message,
        other => panic!("expected an invalid payload error, got {:?}", other),
    }
}

#[cfg(test)]
mod decode_tests {
    use super::*;

    #[test]
    fn test_plain_base64_uses_extension_for_content_type() {
        let decoded = decode_image_payload("aGVsbG8=", "Feeder.JPG").unwrap();
        assert_eq!(decoded.bytes, b"hello");
        assert_eq!(decoded.content_type, "image/jpeg");

        let unknown = decode_image_payload("aGVsbG8=", "notes").unwrap();
        assert_eq!(unknown.content_type, "application/octet-stream");
    }

    #[test]
    fn test_data_url_declares_content_type() {
        let decoded = decode_image_payload("data:image/webp;base64,aGVsbG8=", "feeder.png").unwrap();
        assert_eq!(decoded.bytes, b"hello");
        assert_eq!(decoded.content_type, "image/webp");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(
            invalid_message(decode_image_payload("data:image/png;base64", "a.png")),
            "Malformed data URL"
        );
        assert_eq!(
            invalid_message(decode_image_payload("not*base64!", "a.png")),
            "Invalid base64 image data"
        );
        assert_eq!(
            invalid_message(decode_image_payload("", "a.png")),
            "Image data is empty"
        );
    }

    #[test]
    fn test_size_limit() {
        let at_limit = STANDARD.encode(vec![0u8; MAX_UPLOAD_BYTES]);
        assert!(decode_image_payload(&at_limit, "big.png").is_ok());

        let over_limit = STANDARD.encode(vec![0u8; MAX_UPLOAD_BYTES + 1]);
        assert_eq!(
            invalid_message(decode_image_payload(&over_limit, "big.png")),
            "Image exceeds the 5 MB limit"
        );
    }
}

#[cfg(test)]
mod key_tests {
    use super::*;

    #[test]
    fn test_sanitize_key_drops_traversal_segments() {
        assert_eq!(sanitize_key("../../etc/passwd"), "etc/passwd");
        assert_eq!(sanitize_key("/products//./toys/"), "products/toys");
        assert_eq!(sanitize_key(".."), "");
    }

    #[test]
    fn test_object_key_layout() {
        let key = object_key(None, "My Collar (1).png");
        let (folder, rest) = key.split_once('/').unwrap();
        assert_eq!(folder, "products");
        // uuid (36 chars) + '-' + cleaned name
        assert_eq!(&rest[37..], "My-Collar--1-.png");

        let nested = object_key(Some("../banners/home"), "..\\..\\hero.webp");
        assert!(nested.starts_with("banners/home/"));
        assert!(nested.ends_with("-hero.webp"));
        assert!(!nested.contains(".."));
    }

    #[test]
    fn test_object_keys_are_unique() {
        assert_ne!(object_key(None, "a.png"), object_key(None, "a.png"));
    }
}

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_put_and_delete() {
        let mock = MockImageStore::new();
        let stored = mock.put_image("products/abc-collar.png", payload()).await.unwrap();

        assert_eq!(stored.file_id, "products/abc-collar.png");
        assert!(stored.url.ends_with("/products/abc-collar.png"));
        assert_eq!(mock.stored_keys(), vec!["products/abc-collar.png".to_string()]);

        mock.delete_image(&stored.file_id).await.unwrap();
        assert!(mock.stored_keys().is_empty());
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockImageStore::new_failing();
        let result = mock.put_image("products/x.png", payload()).await;
        assert!(matches!(result, Err(StorageError::Backend(_))));
        assert!(mock.delete_image("products/x.png").await.is_err());
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    #[tokio::test]
    async fn test_s3_client_creation() {
        let _client = S3ImageStore::new(
            "http://localhost:9000",
            "us-east-1",
            "testkey",
            "testsecret",
            "testbucket",
            "http://localhost:9000/testbucket",
        );
        // Construction alone must not panic or touch the network.
    }
}
