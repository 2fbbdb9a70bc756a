//! Store interaction contracts, verified with mock repositories
//!
//! The extension path has a hard rule: invalid extension numbers must be
//! rejected before any store call. A mock with no configured expectations
//! panics on contact, so these tests fail if the tracker ever reaches the
//! repository.

mod common;

use common::{tracker_with_extensions, AmiEventBuilder};
use mockall::mock;
use vigia_core::models::Extension;
use vigia_core::traits::ExtensionRepository;
use vigia_core::AppError;

mock! {
    pub ExtRepo {}

    #[async_trait::async_trait]
    impl ExtensionRepository for ExtRepo {
        async fn find_by_number(&self, number: &str) -> Result<Option<Extension>, AppError>;
        async fn update_status(&self, extension: &Extension) -> Result<(), AppError>;
    }
}

#[tokio::test]
async fn feature_code_is_rejected_before_any_store_call() {
    // no expectations: any repository call panics the test
    let repo = MockExtRepo::new();
    let tracker = tracker_with_extensions(std::sync::Arc::new(repo));

    let result = tracker
        .handle_extension_status(
            &AmiEventBuilder::new("ExtensionStatus")
                .field("Exten", "*47*1001*600")
                .field("Status", "8")
                .build(),
        )
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn short_and_long_numbers_are_rejected_before_any_store_call() {
    let repo = MockExtRepo::new();
    let tracker = tracker_with_extensions(std::sync::Arc::new(repo));

    for exten in ["12", "123456", "1a01", ""] {
        let result = tracker
            .handle_extension_status(
                &AmiEventBuilder::new("ExtensionStatus")
                    .field("Exten", exten)
                    .field("Status", "0")
                    .build(),
            )
            .await;
        assert!(result.is_ok(), "exten {:?} must be a defined no-op", exten);
    }
}

#[tokio::test]
async fn unmonitored_extension_reads_but_never_writes() {
    let mut repo = MockExtRepo::new();
    repo.expect_find_by_number()
        .withf(|number| number == "2002")
        .times(1)
        .returning(|_| Ok(None));
    // update_status has no expectation: a write would panic

    let tracker = tracker_with_extensions(std::sync::Arc::new(repo));

    let result = tracker
        .handle_extension_status(
            &AmiEventBuilder::new("ExtensionStatus")
                .field("Exten", "2002")
                .field("Status", "8")
                .build(),
        )
        .await;

    assert!(result.is_ok());
}
