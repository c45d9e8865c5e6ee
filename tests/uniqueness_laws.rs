//! Property-based tests for cache consistency under mutation sequences.
//!
//! 1. **Uniqueness**: no two cached tasks ever share an identifier
//! 2. **Rollback**: a failed mutation leaves the cache exactly as it was
//!    before the mutation was submitted

mod common;

use std::collections::HashSet;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use proptest::prelude::*;

use common::{Harness, task};
use taskboard::coordinator::{CoordinatorOptions, RefetchPolicy};
use taskboard::domain::{NewTask, Task, TaskId, TaskPatch, TaskStatus};
use taskboard::remote::RemoteOperation;

#[derive(Debug, Clone)]
enum Op {
    Create { title: String, fail: bool },
    Update { id: i64, fail: bool },
    Delete { id: i64, fail: bool },
}

impl Op {
    const fn fails(&self) -> bool {
        match self {
            Self::Create { fail, .. } | Self::Update { fail, .. } | Self::Delete { fail, .. } => {
                *fail
            }
        }
    }

    const fn operation(&self) -> RemoteOperation {
        match self {
            Self::Create { .. } => RemoteOperation::Create,
            Self::Update { .. } => RemoteOperation::Update,
            Self::Delete { .. } => RemoteOperation::Delete,
        }
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        ("[a-z]{1,8}", any::<bool>()).prop_map(|(title, fail)| Op::Create { title, fail }),
        (1_i64..8, any::<bool>()).prop_map(|(id, fail)| Op::Update { id, fail }),
        (1_i64..8, any::<bool>()).prop_map(|(id, fail)| Op::Delete { id, fail }),
    ]
}

fn seed() -> Vec<Task> {
    (1..=4).map(|id| task(id, "seed")).collect()
}

fn assert_unique(entries: &[Task]) -> Result<(), TestCaseError> {
    let mut seen = HashSet::new();
    for entry in entries {
        prop_assert!(seen.insert(entry.id), "duplicate identifier {}", entry.id);
    }
    Ok(())
}

fn submit<'a>(harness: &'a Harness, op: &Op) -> BoxFuture<'a, bool> {
    if op.fails() {
        harness.remote.fail_next(op.operation(), None);
    }
    match op {
        Op::Create { title, .. } => harness
            .coordinator
            .create(NewTask::new(title.clone()))
            .map(|result| result.is_ok())
            .boxed(),
        Op::Update { id, .. } => harness
            .coordinator
            .update(TaskId::new(*id), TaskPatch::status(TaskStatus::Completed))
            .map(|result| result.is_ok())
            .boxed(),
        Op::Delete { id, .. } => harness
            .coordinator
            .delete(TaskId::new(*id))
            .map(|result| result.is_ok())
            .boxed(),
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn prop_sequential_mutations_keep_ids_unique_and_roll_back(
        ops in prop::collection::vec(op_strategy(), 1..20),
        refetch in prop_oneof![
            Just(RefetchPolicy::AfterSettlement),
            Just(RefetchPolicy::Never)
        ],
    ) {
        runtime().block_on(async {
            let harness = Harness::loaded(
                seed(),
                CoordinatorOptions::default().with_refetch(refetch),
            )
            .await;

            for op in &ops {
                let before = harness.entries();
                let pending = submit(&harness, op);
                assert_unique(&harness.entries())?;
                let succeeded = pending.await;
                let after = harness.entries();
                assert_unique(&after)?;
                if !succeeded && refetch == RefetchPolicy::Never {
                    prop_assert_eq!(after, before);
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_interleaved_mutations_keep_ids_unique(
        ops in prop::collection::vec(op_strategy(), 1..12),
        reverse in any::<bool>(),
    ) {
        runtime().block_on(async {
            let harness = Harness::loaded(seed(), CoordinatorOptions::default()).await;

            let mut pending: Vec<_> = ops.iter().map(|op| submit(&harness, op)).collect();
            assert_unique(&harness.entries())?;
            if reverse {
                pending.reverse();
                for future in pending {
                    future.await;
                    assert_unique(&harness.entries())?;
                }
            } else {
                join_all(pending).await;
            }

            assert_unique(&harness.entries())?;
            Ok::<(), TestCaseError>(())
        })?;
    }
}
