//! Module bindings stay with their own unit of work under interleaving.

use std::time::Duration;

use modrouter::{ModuleContext, ModuleKey, RouterError};

async fn observe_after(delay_ms: u64) -> Option<ModuleKey> {
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    ModuleContext::current()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tasks_see_only_their_own_module() {
    let mut handles = Vec::new();
    for i in 0..64u64 {
        let module = if i % 2 == 0 {
            ModuleKey::Doing
        } else {
            ModuleKey::Content
        };
        handles.push(tokio::spawn(ModuleContext::run_as(module, async move {
            let mut seen = Vec::new();
            for step in 0..5 {
                seen.push(observe_after((i + step) % 3).await);
                tokio::task::yield_now().await;
            }
            (module, seen)
        })));
    }

    for handle in handles {
        let (module, seen) = handle.await.unwrap();
        assert!(seen.iter().all(|m| *m == Some(module)), "{module} saw {seen:?}");
    }
}

#[tokio::test]
async fn test_joined_siblings_in_one_task_are_isolated() {
    let a = ModuleContext::run_as(ModuleKey::Messaging, async {
        let before = ModuleContext::current();
        let after = observe_after(20).await;
        (before, after)
    });
    let b = ModuleContext::run_as(ModuleKey::Giving, async {
        let before = ModuleContext::current();
        let after = observe_after(5).await;
        (before, after)
    });

    let (a, b) = tokio::join!(a, b);
    assert_eq!(a, (Some(ModuleKey::Messaging), Some(ModuleKey::Messaging)));
    assert_eq!(b, (Some(ModuleKey::Giving), Some(ModuleKey::Giving)));
    assert_eq!(ModuleContext::current(), None);
}

#[tokio::test]
async fn test_failed_unit_of_work_does_not_leak_binding() {
    let result: Result<(), RouterError> = ModuleContext::run_as(ModuleKey::Reporting, async {
        tokio::task::yield_now().await;
        Err(RouterError::NoActiveContext)
    })
    .await;

    assert!(result.is_err());
    assert_eq!(ModuleContext::current(), None);

    let next = ModuleContext::run_as(ModuleKey::Attendance, async { ModuleContext::current() }).await;
    assert_eq!(next, Some(ModuleKey::Attendance));
}

#[tokio::test]
async fn test_panicking_unit_of_work_does_not_leak_binding() {
    let handle = tokio::spawn(ModuleContext::run_as(ModuleKey::Content, async {
        tokio::task::yield_now().await;
        panic!("job blew up");
    }));
    assert!(handle.await.unwrap_err().is_panic());

    let after = ModuleContext::run_as(ModuleKey::Doing, async {
        tokio::task::yield_now().await;
        ModuleContext::current()
    })
    .await;
    assert_eq!(after, Some(ModuleKey::Doing));
    assert_eq!(ModuleContext::current(), None);
}
