//! Container resolution priority.

use proptest::prelude::*;
use wsh::{ContainerRef, ContainerSelection, ContainerSpec, SessionError, resolve};
use wsh_test_utils::{Call, FakeService, Op};

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("Failed to build runtime")
        .block_on(future)
}

#[tokio::test]
async fn lookup_of_unknown_handle_fails() {
    let service = FakeService::with_containers(["a"]);
    let err = resolve(&service, &ContainerSelection::Handle("web-1".into()))
        .await
        .unwrap_err();

    match err {
        SessionError::LookupFailed { handle, source } => {
            assert_eq!(handle, "web-1");
            assert!(source.is_not_found());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn enumeration_failure_is_reported_as_such() {
    let service = FakeService::with_containers(["a"]).fail(Op::List);
    let err = resolve(&service, &ContainerSelection::MostRecent(Default::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::EnumerationFailed(_)));
}

#[tokio::test]
async fn create_failure_is_reported_as_such() {
    let service = FakeService::with_containers(["a"]).fail(Op::Create);
    let err = resolve(&service, &ContainerSelection::Create(ContainerSpec::new("raw:///")))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::CreateFailed(_)));
}

proptest! {
    #[test]
    fn priority_is_create_then_handle_then_newest(
        create in any::<bool>(),
        handle in proptest::option::of("[a-z]{1,8}"),
        listed in proptest::collection::vec("[a-z]{1,8}", 1..6),
    ) {
        let mut containers = listed.clone();
        if let Some(handle) = &handle {
            containers.push(handle.clone());
        }
        let service = FakeService::with_containers(containers.clone());
        let selection = ContainerSelection::new(
            create,
            handle.as_deref(),
            ContainerSpec::new("docker:///ubuntu#14.04"),
        );

        let resolved = block_on(resolve(&service, &selection)).unwrap();
        let calls = service.calls();
        prop_assert_eq!(calls.len(), 1);

        if create {
            prop_assert!(matches!(&calls[0], Call::Create(spec) if spec.rootfs == "docker:///ubuntu#14.04"));
            prop_assert!(resolved.handle().starts_with("created-"));
        } else if let Some(handle) = &handle {
            prop_assert_eq!(&calls[0], &Call::Lookup(handle.clone()));
            prop_assert_eq!(resolved, ContainerRef::new(handle.clone()));
        } else {
            prop_assert!(matches!(&calls[0], Call::List(_)));
            prop_assert_eq!(resolved, ContainerRef::new(containers.last().unwrap().clone()));
        }
    }
}
